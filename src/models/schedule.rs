use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::models::authorization::UnitType;
use crate::models::occurrence::{ConflictParty, Occurrence};
use crate::models::recurrence::RecurrenceSpec;

/// How to interpret an end time-of-day that is not after the start.
/// The default rejects it; crossing midnight is an explicit opt-in, not
/// an inference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OvernightPolicy {
    #[default]
    Reject,
    EndsNextDay,
}

/// Input shape shared by preview and commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkScheduleRequest {
    pub client_id: String,
    pub caregiver_id: String,
    pub spec: RecurrenceSpec,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub overnight: OvernightPolicy,
    /// false = AllOrNothing: any conflict aborts the whole commit.
    /// true = skip policy: conflicting occurrences are dropped, the rest
    /// proceed.
    pub skip_conflicts: bool,
    /// Explicit acknowledgement that the commit may overshoot the
    /// authorization budget. Absent by default.
    pub allow_over_authorization: bool,
    /// Conflict dates the caller saw at preview time. At commit, fresh
    /// conflicts not in this set are reported as concurrent modification
    /// rather than plain conflicts.
    pub previewed_conflicts: Option<Vec<NaiveDate>>,
}

impl BulkScheduleRequest {
    pub fn new(
        client_id: impl Into<String>,
        caregiver_id: impl Into<String>,
        spec: RecurrenceSpec,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            caregiver_id: caregiver_id.into(),
            spec,
            start_time,
            end_time,
            overnight: OvernightPolicy::default(),
            skip_conflicts: false,
            allow_over_authorization: false,
            previewed_conflicts: None,
        }
    }
}

/// Outcome tag for one occurrence in a batch report. Conflict takes
/// precedence over the authorization-window tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OccurrenceStatus {
    Ok,
    Conflict { party: ConflictParty },
    OutsideAuthorization,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEntry {
    pub occurrence: Occurrence,
    pub status: OccurrenceStatus,
}

impl ReportEntry {
    pub fn is_conflict(&self) -> bool {
        matches!(self.status, OccurrenceStatus::Conflict { .. })
    }
}

/// Authorization budget before and after the proposed batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationSnapshot {
    pub authorization_id: String,
    pub unit_type: UnitType,
    pub authorized_units: f64,
    pub consumed_before: f64,
    pub consumed_after: f64,
    pub has_insufficient_units: bool,
}

/// Full result of a preview (and the validation half of a commit).
/// Always complete even when occurrences are invalid, so the caller can
/// render a diagnostic view before committing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub entries: Vec<ReportEntry>,
    pub total_occurrences: usize,
    pub total_duration_minutes: i64,
    pub units_requested: f64,
    pub authorization: Option<AuthorizationSnapshot>,
    pub warnings: Vec<String>,
    pub can_commit: bool,
}

impl BatchReport {
    pub fn conflict_dates(&self) -> Vec<NaiveDate> {
        self.entries
            .iter()
            .filter(|entry| entry.is_conflict())
            .map(|entry| entry.occurrence.date)
            .collect()
    }

    pub fn accepted_occurrences(&self) -> Vec<&Occurrence> {
        self.entries
            .iter()
            .filter(|entry| !entry.is_conflict())
            .map(|entry| &entry.occurrence)
            .collect()
    }

    pub fn outside_authorization_dates(&self) -> Vec<NaiveDate> {
        self.entries
            .iter()
            .filter(|entry| entry.status == OccurrenceStatus::OutsideAuthorization)
            .map(|entry| entry.occurrence.date)
            .collect()
    }
}

/// Result of a commit: how many occurrences were written, how many were
/// dropped by the skip policy, and the report the decision was based on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitOutcome {
    pub created: usize,
    pub skipped: usize,
    pub report: BatchReport,
}
