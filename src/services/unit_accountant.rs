use tracing::debug;

use crate::models::authorization::{Authorization, UnitAssessment, UnitType};
use crate::models::occurrence::Occurrence;

/// Predicts the effect of a proposed batch on a client's authorization
/// budget. Pure; the orchestrator is responsible for enforcing the
/// prediction transactionally.
pub struct UnitAccountant;

impl UnitAccountant {
    pub fn assess(occurrences: &[Occurrence], authorization: &Authorization) -> UnitAssessment {
        let mut units_requested = 0.0;
        let mut outside_period = Vec::new();

        for occurrence in occurrences {
            if !authorization.covers(occurrence.date) {
                outside_period.push(occurrence.date);
                continue;
            }
            units_requested +=
                Self::unit_cost(authorization.unit_type, occurrence.duration_minutes);
        }

        let units_after_commit = authorization.consumed_units + units_requested;
        let has_insufficient_units = units_after_commit > authorization.authorized_units;

        debug!(
            target: "app::units",
            authorization_id = %authorization.id,
            units_requested,
            units_after_commit,
            has_insufficient_units,
            outside_period = outside_period.len(),
            "batch assessed"
        );

        UnitAssessment {
            units_requested,
            units_after_commit,
            has_insufficient_units,
            outside_period,
        }
    }

    /// Billable units for one occurrence. Quarter-hour billing rounds
    /// partial quarters UP to the provider's minimum billable increment;
    /// that is a financial rule, not display rounding.
    pub fn unit_cost(unit_type: UnitType, duration_minutes: i64) -> f64 {
        match unit_type {
            UnitType::Hourly => duration_minutes as f64 / 60.0,
            UnitType::QuarterHourly => {
                let quarters = (duration_minutes + 14) / 15;
                quarters as f64 * 0.25
            }
            UnitType::Daily => 1.0,
        }
    }
}
