use chrono::{Duration, NaiveDate, NaiveTime};

use crate::error::{AppError, AppResult};
use crate::models::occurrence::Occurrence;
use crate::models::schedule::OvernightPolicy;

/// Combines generated dates with a start/end time-of-day pair into
/// concrete occurrences.
///
/// An end time at or before the start time is rejected unless the caller
/// opted into `OvernightPolicy::EndsNextDay`, in which case the shift ends
/// on the following day (an equal end time means a full 24 hours). The
/// overnight reading is never inferred.
pub struct SlotResolver;

impl SlotResolver {
    pub fn resolve(
        dates: &[NaiveDate],
        start_time: NaiveTime,
        end_time: NaiveTime,
        overnight: OvernightPolicy,
    ) -> AppResult<Vec<Occurrence>> {
        let crosses_midnight = end_time <= start_time;
        if crosses_midnight && overnight == OvernightPolicy::Reject {
            return Err(AppError::invalid_time_range(
                "end time must be after start time; set the overnight policy to allow shifts crossing midnight",
            ));
        }

        let mut occurrences = Vec::with_capacity(dates.len());
        for &date in dates {
            let start_at = date.and_time(start_time);
            let end_at = if crosses_midnight {
                (date + Duration::days(1)).and_time(end_time)
            } else {
                date.and_time(end_time)
            };
            let duration_minutes = end_at.signed_duration_since(start_at).num_minutes();

            occurrences.push(Occurrence {
                date,
                start_at,
                end_at,
                duration_minutes,
            });
        }

        Ok(occurrences)
    }
}
