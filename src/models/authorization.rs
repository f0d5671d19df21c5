use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fmt;

/// Billing granularity governing how shift duration converts to units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnitType {
    Hourly,
    QuarterHourly,
    Daily,
}

impl UnitType {
    pub fn as_str(self) -> &'static str {
        match self {
            UnitType::Hourly => "hourly",
            UnitType::QuarterHourly => "quarter_hourly",
            UnitType::Daily => "daily",
        }
    }
}

impl TryFrom<&str> for UnitType {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "hourly" => Ok(UnitType::Hourly),
            "quarter_hourly" => Ok(UnitType::QuarterHourly),
            "daily" => Ok(UnitType::Daily),
            _ => Err(format!("unknown unit type: {}", value)),
        }
    }
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A client's approved quota of billable service units for a coverage
/// period. `consumed_units` only ever grows as shifts are committed; the
/// unit accountant predicts overshoot and the orchestrator prevents it
/// under a lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authorization {
    pub id: String,
    pub client_id: String,
    pub unit_type: UnitType,
    pub authorized_units: f64,
    pub consumed_units: f64,
    pub valid_from: NaiveDate,
    pub valid_to: NaiveDate,
}

impl Authorization {
    pub fn remaining_units(&self) -> f64 {
        self.authorized_units - self.consumed_units
    }

    pub fn covers(&self, date: NaiveDate) -> bool {
        date >= self.valid_from && date <= self.valid_to
    }
}

/// Input for creating an authorization row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationInsert {
    pub client_id: String,
    pub unit_type: UnitType,
    pub authorized_units: f64,
    pub consumed_units: f64,
    pub valid_from: NaiveDate,
    pub valid_to: NaiveDate,
}

/// Predicted effect of a proposed batch on an authorization budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitAssessment {
    pub units_requested: f64,
    pub units_after_commit: f64,
    pub has_insufficient_units: bool,
    /// Occurrence dates outside the authorization's validity period;
    /// excluded from the assessed set, never silently included or dropped.
    pub outside_period: Vec<NaiveDate>,
}
