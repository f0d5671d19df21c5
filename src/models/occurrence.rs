use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One concrete dated, timed shift instance expanded from a recurrence
/// rule. Immutable once produced; carries no persistent identity until it
/// is committed as a booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Occurrence {
    pub date: NaiveDate,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    pub duration_minutes: i64,
}

/// A previously committed shift for a caregiver-client pair, supplied by
/// the schedule store as read-only reference data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExistingBooking {
    pub id: String,
    pub date: NaiveDate,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
}

/// Input for persisting one accepted occurrence as a booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingInsert {
    pub caregiver_id: String,
    pub client_id: String,
    pub occurrence: Occurrence,
}

/// Whose calendar a double-booking was found on. A caregiver overlap and
/// a client overlap are independent findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictParty {
    Caregiver,
    Client,
}

impl ConflictParty {
    pub fn as_str(self) -> &'static str {
        match self {
            ConflictParty::Caregiver => "caregiver",
            ConflictParty::Client => "client",
        }
    }
}

impl fmt::Display for ConflictParty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One proposed occurrence that overlaps an existing booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccurrenceConflict {
    pub date: NaiveDate,
    pub party: ConflictParty,
    pub booking_id: String,
}
