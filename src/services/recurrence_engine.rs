use chrono::{Datelike, Duration, NaiveDate, Weekday};

use crate::error::AppResult;
use crate::models::recurrence::{OrdinalWeek, RecurrencePattern, RecurrenceSpec};

/// Safety bounds for date generation, applied regardless of whatever
/// range end or occurrence count the caller supplied.
#[derive(Debug, Clone)]
pub struct GenerationBounds {
    /// Hard ceiling on emitted dates (two years' worth of daily shifts).
    pub max_occurrences: usize,
    /// Consecutive periods that may pass without emitting anything before
    /// the scan gives up (a Monthly {30} spec scoped to February never
    /// fires).
    pub max_barren_periods: usize,
}

impl Default for GenerationBounds {
    fn default() -> Self {
        Self {
            max_occurrences: 731,
            max_barren_periods: 120,
        }
    }
}

/// Expands a recurrence spec into an ordered, deduplicated sequence of
/// calendar dates. Pure: no side effects, no I/O, deterministic for a
/// given spec.
pub struct RecurrenceEngine;

impl RecurrenceEngine {
    pub fn generate(spec: &RecurrenceSpec) -> AppResult<Vec<NaiveDate>> {
        Self::generate_with_bounds(spec, &GenerationBounds::default())
    }

    pub fn generate_with_bounds(
        spec: &RecurrenceSpec,
        bounds: &GenerationBounds,
    ) -> AppResult<Vec<NaiveDate>> {
        spec.validate()?;

        let mut collector = DateCollector::new(spec, bounds);
        match spec.pattern {
            RecurrencePattern::Once => {
                collector.dates.push(spec.range_start);
            }
            RecurrencePattern::Daily => Self::expand_daily(spec, bounds, &mut collector),
            RecurrencePattern::Weekly => Self::expand_weekly(spec, bounds, &mut collector),
            RecurrencePattern::Monthly => Self::expand_monthly(spec, bounds, &mut collector),
            RecurrencePattern::Yearly => Self::expand_yearly(spec, bounds, &mut collector),
        }

        Ok(collector.into_dates())
    }

    fn expand_daily(spec: &RecurrenceSpec, bounds: &GenerationBounds, out: &mut DateCollector) {
        if spec.weekday_set.is_empty() {
            let mut current = spec.range_start;
            loop {
                if out.offer(current) == Offer::Exhausted {
                    break;
                }
                current += Duration::days(i64::from(spec.interval));
            }
        } else {
            // "Every weekday" shorthand: enumerate matching days one by
            // one; the interval does not apply here.
            let weekdays = spec.effective_weekdays();
            let mut current = spec.range_start;
            let mut barren = 0usize;
            loop {
                if weekdays.contains(&current.weekday()) {
                    if out.offer(current) == Offer::Exhausted {
                        break;
                    }
                    barren = 0;
                } else {
                    barren += 1;
                    if barren >= bounds.max_barren_periods {
                        break;
                    }
                }
                current += Duration::days(1);
            }
        }
    }

    fn expand_weekly(spec: &RecurrenceSpec, bounds: &GenerationBounds, out: &mut DateCollector) {
        let weekdays = spec.effective_weekdays();
        // Weeks are Monday-based; the first window is the week containing
        // the range start, with earlier days rejected by the collector.
        let mut week_start = spec.range_start
            - Duration::days(i64::from(spec.range_start.weekday().num_days_from_monday()));
        let mut barren = 0usize;

        'weeks: loop {
            let before = out.len();
            for weekday in &weekdays {
                let candidate =
                    week_start + Duration::days(i64::from(weekday.num_days_from_monday()));
                if out.offer(candidate) == Offer::Exhausted {
                    break 'weeks;
                }
            }
            if out.len() == before {
                barren += 1;
                if barren >= bounds.max_barren_periods {
                    break;
                }
            } else {
                barren = 0;
            }
            week_start += Duration::weeks(i64::from(spec.interval));
        }
    }

    fn expand_monthly(spec: &RecurrenceSpec, bounds: &GenerationBounds, out: &mut DateCollector) {
        let mut year = spec.range_start.year();
        let mut month = spec.range_start.month();
        let mut barren = 0usize;

        'months: loop {
            let before = out.len();
            for candidate in Self::month_candidates(year, month, spec) {
                if out.offer(candidate) == Offer::Exhausted {
                    break 'months;
                }
            }
            if out.len() == before {
                barren += 1;
                if barren >= bounds.max_barren_periods {
                    break;
                }
            } else {
                barren = 0;
            }
            (year, month) = step_months(year, month, spec.interval);
        }
    }

    fn expand_yearly(spec: &RecurrenceSpec, bounds: &GenerationBounds, out: &mut DateCollector) {
        let months = if spec.month_set.is_empty() {
            vec![spec.range_start.month()]
        } else {
            let mut months = spec.month_set.clone();
            months.sort_unstable();
            months.dedup();
            months
        };

        let mut year = spec.range_start.year();
        let mut barren = 0usize;

        'years: loop {
            let before = out.len();
            for &month in &months {
                for candidate in Self::month_candidates(year, month, spec) {
                    if out.offer(candidate) == Offer::Exhausted {
                        break 'years;
                    }
                }
            }
            if out.len() == before {
                barren += 1;
                if barren >= bounds.max_barren_periods {
                    break;
                }
            } else {
                barren = 0;
            }
            year += spec.interval as i32;
        }
    }

    /// Ascending candidates for one month under the spec's monthly
    /// sub-mode. Day numbers that exceed the month's length are skipped,
    /// not clamped: a {31} spec yields nothing for February.
    fn month_candidates(year: i32, month: u32, spec: &RecurrenceSpec) -> Vec<NaiveDate> {
        if !spec.month_day_set.is_empty() {
            let last_day = match last_day_of_month(year, month) {
                Some(day) => day,
                None => return Vec::new(),
            };
            let mut days = spec.month_day_set.clone();
            days.sort_unstable();
            days.dedup();
            days.into_iter()
                .filter(|&day| day <= last_day)
                .filter_map(|day| NaiveDate::from_ymd_opt(year, month, day))
                .collect()
        } else if let Some((ordinal, weekday)) = spec.nth_weekday {
            nth_weekday_in_month(year, month, ordinal, weekday)
                .into_iter()
                .collect()
        } else {
            Vec::new()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Offer {
    Accepted,
    Rejected,
    Exhausted,
}

/// Applies range, count, cap and dedup rules to candidates offered in
/// ascending order.
struct DateCollector<'a> {
    spec: &'a RecurrenceSpec,
    bounds: &'a GenerationBounds,
    dates: Vec<NaiveDate>,
}

impl<'a> DateCollector<'a> {
    fn new(spec: &'a RecurrenceSpec, bounds: &'a GenerationBounds) -> Self {
        Self {
            spec,
            bounds,
            dates: Vec::new(),
        }
    }

    fn offer(&mut self, candidate: NaiveDate) -> Offer {
        if self.is_full() {
            return Offer::Exhausted;
        }
        if candidate < self.spec.range_start {
            return Offer::Rejected;
        }
        if let Some(range_end) = self.spec.range_end {
            if candidate > range_end {
                return Offer::Exhausted;
            }
        }
        if self.dates.last() == Some(&candidate) {
            return Offer::Rejected;
        }
        self.dates.push(candidate);
        Offer::Accepted
    }

    fn is_full(&self) -> bool {
        if self.dates.len() >= self.bounds.max_occurrences {
            return true;
        }
        match self.spec.occurrence_count {
            Some(count) => self.dates.len() >= count as usize,
            None => false,
        }
    }

    fn len(&self) -> usize {
        self.dates.len()
    }

    fn into_dates(self) -> Vec<NaiveDate> {
        let mut dates = self.dates;
        dates.sort_unstable();
        dates.dedup();
        dates
    }
}

fn step_months(year: i32, month: u32, delta: u32) -> (i32, u32) {
    let total = year * 12 + month as i32 - 1 + delta as i32;
    (total.div_euclid(12), (total.rem_euclid(12) + 1) as u32)
}

fn last_day_of_month(year: i32, month: u32) -> Option<u32> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
}

/// Resolve "the nth <weekday> of <month>" by collecting the month's
/// matching days in ascending order and indexing by the ordinal.
fn nth_weekday_in_month(
    year: i32,
    month: u32,
    ordinal: OrdinalWeek,
    weekday: Weekday,
) -> Option<NaiveDate> {
    let last_day = last_day_of_month(year, month)?;

    let mut matching = Vec::new();
    for day in 1..=last_day {
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            if date.weekday() == weekday {
                matching.push(date);
            }
        }
    }

    ordinal
        .index_in(matching.len())
        .map(|index| matching[index])
}
