use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{AppError, AppResult};

/// How a shift series repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecurrencePattern {
    Once,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl FromStr for RecurrencePattern {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ONCE" => Ok(RecurrencePattern::Once),
            "DAILY" => Ok(RecurrencePattern::Daily),
            "WEEKLY" => Ok(RecurrencePattern::Weekly),
            "MONTHLY" => Ok(RecurrencePattern::Monthly),
            "YEARLY" => Ok(RecurrencePattern::Yearly),
            _ => Err(AppError::validation(format!("Invalid pattern: {}", s))),
        }
    }
}

impl fmt::Display for RecurrencePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecurrencePattern::Once => write!(f, "ONCE"),
            RecurrencePattern::Daily => write!(f, "DAILY"),
            RecurrencePattern::Weekly => write!(f, "WEEKLY"),
            RecurrencePattern::Monthly => write!(f, "MONTHLY"),
            RecurrencePattern::Yearly => write!(f, "YEARLY"),
        }
    }
}

/// Which occurrence of a weekday inside a month ("the 2nd Tuesday of ...").
/// `Last` counts from month-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrdinalWeek {
    First,
    Second,
    Third,
    Fourth,
    Fifth,
    Last,
}

impl OrdinalWeek {
    /// Index into the ascending list of matching weekdays of a month, if
    /// the month has enough of them.
    pub fn index_in(self, matching_days: usize) -> Option<usize> {
        let idx = match self {
            OrdinalWeek::First => 0,
            OrdinalWeek::Second => 1,
            OrdinalWeek::Third => 2,
            OrdinalWeek::Fourth => 3,
            OrdinalWeek::Fifth => 4,
            OrdinalWeek::Last => return matching_days.checked_sub(1),
        };
        if idx < matching_days {
            Some(idx)
        } else {
            None
        }
    }
}

/// Abstract description of how a shift series repeats.
///
/// Built fresh per request, handed to the calendar rule engine, then
/// discarded. Field combinations are pattern-specific; `validate` rejects
/// the ones the engine cannot interpret rather than guessing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceSpec {
    pub pattern: RecurrencePattern,
    pub interval: u32,
    pub weekday_set: Vec<Weekday>,
    pub month_day_set: Vec<u32>,
    pub nth_weekday: Option<(OrdinalWeek, Weekday)>,
    pub month_set: Vec<u32>,
    pub range_start: NaiveDate,
    pub range_end: Option<NaiveDate>,
    pub occurrence_count: Option<u32>,
}

impl RecurrenceSpec {
    /// Create a new spec with the given pattern and first eligible date.
    pub fn new(pattern: RecurrencePattern, range_start: NaiveDate) -> Self {
        Self {
            pattern,
            interval: 1,
            weekday_set: Vec::new(),
            month_day_set: Vec::new(),
            nth_weekday: None,
            month_set: Vec::new(),
            range_start,
            range_end: None,
            occurrence_count: None,
        }
    }

    /// Set the step between periods (every N days/weeks/months/years).
    pub fn with_interval(mut self, interval: u32) -> AppResult<Self> {
        if interval == 0 {
            return Err(AppError::invalid_spec(
                "interval",
                "interval must be greater than 0",
            ));
        }
        if interval > 999 {
            return Err(AppError::invalid_spec(
                "interval",
                "interval must be less than 1000",
            ));
        }
        self.interval = interval;
        Ok(self)
    }

    /// Set the weekdays (Weekly pattern, or the Daily business-day shorthand).
    pub fn with_weekday_set(mut self, weekdays: Vec<Weekday>) -> Self {
        self.weekday_set = weekdays;
        self
    }

    /// Set the day-of-month numbers (Monthly/Yearly day-of-month mode).
    pub fn with_month_day_set(mut self, month_days: Vec<u32>) -> AppResult<Self> {
        for &day in &month_days {
            if day == 0 || day > 31 {
                return Err(AppError::invalid_spec(
                    "month_day_set",
                    format!("day of month must be between 1 and 31: {}", day),
                ));
            }
        }
        self.month_day_set = month_days;
        Ok(self)
    }

    /// Set the nth-weekday rule (Monthly/Yearly nth-weekday mode).
    pub fn with_nth_weekday(mut self, ordinal: OrdinalWeek, weekday: Weekday) -> Self {
        self.nth_weekday = Some((ordinal, weekday));
        self
    }

    /// Set the months (Yearly only).
    pub fn with_month_set(mut self, months: Vec<u32>) -> AppResult<Self> {
        for &month in &months {
            if month == 0 || month > 12 {
                return Err(AppError::invalid_spec(
                    "month_set",
                    format!("month must be between 1 and 12: {}", month),
                ));
            }
        }
        self.month_set = months;
        Ok(self)
    }

    /// Set the last eligible date (inclusive).
    pub fn with_range_end(mut self, range_end: NaiveDate) -> Self {
        self.range_end = Some(range_end);
        self
    }

    /// Set the maximum number of generated dates.
    pub fn with_occurrence_count(mut self, count: u32) -> AppResult<Self> {
        if count == 0 {
            return Err(AppError::invalid_spec(
                "occurrence_count",
                "occurrence count must be greater than 0",
            ));
        }
        self.occurrence_count = Some(count);
        Ok(self)
    }

    /// Validate field values and pattern-specific combinations.
    ///
    /// Both termination conditions may be present (whichever is reached
    /// first wins) or both absent (the engine's hard cap bounds the run).
    pub fn validate(&self) -> AppResult<()> {
        if self.interval == 0 {
            return Err(AppError::invalid_spec(
                "interval",
                "interval must be greater than 0",
            ));
        }
        if self.occurrence_count == Some(0) {
            return Err(AppError::invalid_spec(
                "occurrence_count",
                "occurrence count must be greater than 0",
            ));
        }
        if let Some(&day) = self.month_day_set.iter().find(|&&d| d == 0 || d > 31) {
            return Err(AppError::invalid_spec(
                "month_day_set",
                format!("day of month must be between 1 and 31: {}", day),
            ));
        }
        if let Some(&month) = self.month_set.iter().find(|&&m| m == 0 || m > 12) {
            return Err(AppError::invalid_spec(
                "month_set",
                format!("month must be between 1 and 12: {}", month),
            ));
        }

        match self.pattern {
            RecurrencePattern::Once => {}
            RecurrencePattern::Daily => {
                if !self.month_day_set.is_empty() {
                    return Err(AppError::invalid_spec(
                        "month_day_set",
                        "Daily pattern cannot use day-of-month numbers",
                    ));
                }
                if self.nth_weekday.is_some() {
                    return Err(AppError::invalid_spec(
                        "nth_weekday",
                        "Daily pattern cannot use an nth-weekday rule",
                    ));
                }
                if !self.month_set.is_empty() {
                    return Err(AppError::invalid_spec(
                        "month_set",
                        "Daily pattern cannot use a month set",
                    ));
                }
            }
            RecurrencePattern::Weekly => {
                if !self.month_day_set.is_empty() {
                    return Err(AppError::invalid_spec(
                        "month_day_set",
                        "Weekly pattern cannot use day-of-month numbers",
                    ));
                }
                if self.nth_weekday.is_some() {
                    return Err(AppError::invalid_spec(
                        "nth_weekday",
                        "Weekly pattern cannot use an nth-weekday rule",
                    ));
                }
                if !self.month_set.is_empty() {
                    return Err(AppError::invalid_spec(
                        "month_set",
                        "Weekly pattern cannot use a month set",
                    ));
                }
            }
            RecurrencePattern::Monthly => {
                self.validate_month_modes()?;
                if !self.month_set.is_empty() {
                    return Err(AppError::invalid_spec(
                        "month_set",
                        "Monthly pattern cannot use a month set",
                    ));
                }
            }
            RecurrencePattern::Yearly => {
                self.validate_month_modes()?;
            }
        }

        Ok(())
    }

    /// The weekdays the Weekly pattern expands to; an empty set defaults
    /// to the weekday of `range_start`.
    pub fn effective_weekdays(&self) -> Vec<Weekday> {
        let mut weekdays = if self.weekday_set.is_empty() {
            vec![self.range_start.weekday()]
        } else {
            self.weekday_set.clone()
        };
        weekdays.sort_by_key(|w| w.num_days_from_monday());
        weekdays.dedup();
        weekdays
    }

    fn validate_month_modes(&self) -> AppResult<()> {
        if !self.weekday_set.is_empty() {
            return Err(AppError::invalid_spec(
                "weekday_set",
                "monthly forms express weekdays through the nth-weekday rule",
            ));
        }
        match (self.month_day_set.is_empty(), self.nth_weekday.is_none()) {
            (false, false) => Err(AppError::invalid_spec(
                "month_day_set",
                "day-of-month and nth-weekday modes are mutually exclusive",
            )),
            (true, true) => Err(AppError::invalid_spec(
                "month_day_set",
                "either day-of-month numbers or an nth-weekday rule is required",
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[test]
    fn test_builder_defaults() {
        let spec = RecurrenceSpec::new(RecurrencePattern::Daily, start());
        assert_eq!(spec.interval, 1);
        assert!(spec.weekday_set.is_empty());
        assert!(spec.range_end.is_none());
        assert!(spec.occurrence_count.is_none());
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let result = RecurrenceSpec::new(RecurrencePattern::Daily, start()).with_interval(0);
        assert!(result.is_err());

        let mut spec = RecurrenceSpec::new(RecurrencePattern::Daily, start());
        spec.interval = 0;
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_zero_occurrence_count_rejected() {
        let result = RecurrenceSpec::new(RecurrencePattern::Daily, start()).with_occurrence_count(0);
        assert!(result.is_err());
    }

    #[test]
    fn test_weekly_with_month_days_rejected() {
        let mut spec = RecurrenceSpec::new(RecurrencePattern::Weekly, start());
        spec.month_day_set = vec![15];
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_monthly_requires_exactly_one_mode() {
        let neither = RecurrenceSpec::new(RecurrencePattern::Monthly, start());
        assert!(neither.validate().is_err());

        let both = RecurrenceSpec::new(RecurrencePattern::Monthly, start())
            .with_month_day_set(vec![15])
            .unwrap()
            .with_nth_weekday(OrdinalWeek::First, Weekday::Mon);
        assert!(both.validate().is_err());

        let day_mode = RecurrenceSpec::new(RecurrencePattern::Monthly, start())
            .with_month_day_set(vec![15])
            .unwrap();
        assert!(day_mode.validate().is_ok());

        let nth_mode = RecurrenceSpec::new(RecurrencePattern::Monthly, start())
            .with_nth_weekday(OrdinalWeek::Last, Weekday::Fri);
        assert!(nth_mode.validate().is_ok());
    }

    #[test]
    fn test_monthly_rejects_month_set() {
        let spec = RecurrenceSpec::new(RecurrencePattern::Monthly, start())
            .with_month_day_set(vec![1])
            .unwrap()
            .with_month_set(vec![6])
            .unwrap();
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_invalid_month_day_value() {
        let result =
            RecurrenceSpec::new(RecurrencePattern::Monthly, start()).with_month_day_set(vec![32]);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_month_value() {
        let result =
            RecurrenceSpec::new(RecurrencePattern::Yearly, start()).with_month_set(vec![13]);
        assert!(result.is_err());
    }

    #[test]
    fn test_effective_weekdays_default_and_sorted() {
        let spec = RecurrenceSpec::new(RecurrencePattern::Weekly, start());
        assert_eq!(spec.effective_weekdays(), vec![Weekday::Mon]);

        let spec = RecurrenceSpec::new(RecurrencePattern::Weekly, start())
            .with_weekday_set(vec![Weekday::Fri, Weekday::Mon, Weekday::Wed, Weekday::Mon]);
        assert_eq!(
            spec.effective_weekdays(),
            vec![Weekday::Mon, Weekday::Wed, Weekday::Fri]
        );
    }

    #[test]
    fn test_ordinal_index() {
        assert_eq!(OrdinalWeek::First.index_in(4), Some(0));
        assert_eq!(OrdinalWeek::Fifth.index_in(4), None);
        assert_eq!(OrdinalWeek::Fifth.index_in(5), Some(4));
        assert_eq!(OrdinalWeek::Last.index_in(4), Some(3));
        assert_eq!(OrdinalWeek::Last.index_in(0), None);
    }

    #[test]
    fn test_pattern_round_trip() {
        for raw in ["ONCE", "DAILY", "WEEKLY", "MONTHLY", "YEARLY"] {
            let pattern: RecurrencePattern = raw.parse().unwrap();
            assert_eq!(pattern.to_string(), raw);
        }
        assert!("HOURLY".parse::<RecurrencePattern>().is_err());
    }
}
