use caresched::db::repositories::authorization_repository::AuthorizationRepository;
use caresched::db::repositories::booking_repository::BookingRepository;
use caresched::db::DbPool;
use caresched::error::AppError;
use caresched::models::authorization::{AuthorizationInsert, UnitType};
use caresched::models::occurrence::{BookingInsert, Occurrence};
use caresched::models::recurrence::{RecurrencePattern, RecurrenceSpec};
use caresched::models::schedule::{BulkScheduleRequest, OvernightPolicy};
use caresched::services::bulk_schedule_service::BulkScheduleService;
use chrono::{NaiveDate, NaiveTime, Weekday};
use tempfile::tempdir;

fn date(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, month, day).unwrap()
}

fn time(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

fn seed_authorization(pool: &DbPool, unit_type: UnitType, authorized: f64, consumed: f64) -> String {
    pool.with_connection(|conn| {
        AuthorizationRepository::insert(
            conn,
            &AuthorizationInsert {
                client_id: "client-1".into(),
                unit_type,
                authorized_units: authorized,
                consumed_units: consumed,
                valid_from: date(1, 1),
                valid_to: date(12, 31),
            },
        )
    })
    .expect("seed authorization")
}

fn seed_booking(pool: &DbPool, caregiver_id: &str, client_id: &str, day: u32, hours: (u32, u32)) {
    pool.with_connection(|conn| {
        BookingRepository::insert(
            conn,
            &BookingInsert {
                caregiver_id: caregiver_id.into(),
                client_id: client_id.into(),
                occurrence: Occurrence {
                    date: date(1, day),
                    start_at: date(1, day).and_hms_opt(hours.0, 0, 0).unwrap(),
                    end_at: date(1, day).and_hms_opt(hours.1, 0, 0).unwrap(),
                    duration_minutes: i64::from(hours.1 - hours.0) * 60,
                },
            },
        )
    })
    .expect("seed booking");
}

fn tue_thu_request(count: u32) -> BulkScheduleRequest {
    // 2024-01-02 is a Tuesday.
    let spec = RecurrenceSpec::new(RecurrencePattern::Weekly, date(1, 2))
        .with_weekday_set(vec![Weekday::Tue, Weekday::Thu])
        .with_occurrence_count(count)
        .unwrap();
    BulkScheduleRequest::new("client-1", "caregiver-1", spec, time(9, 0), time(13, 0))
}

#[test]
fn preview_then_commit_then_repreview_flow() {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("flow.sqlite")).expect("db pool");
    let service = BulkScheduleService::new(pool.clone());
    let auth_id = seed_authorization(&pool, UnitType::Hourly, 100.0, 10.0);

    let request = tue_thu_request(4);

    let preview = service.preview_bulk_schedule(&request).expect("preview");
    assert_eq!(preview.total_occurrences, 4);
    assert_eq!(preview.units_requested, 16.0);
    assert!(preview.conflict_dates().is_empty());
    assert!(preview.can_commit);

    let outcome = service.commit_bulk_schedule(&request).expect("commit");
    assert_eq!(outcome.created, 4);
    assert_eq!(outcome.skipped, 0);

    let authorization = pool
        .with_connection(|conn| AuthorizationRepository::find_by_id(conn, &auth_id))
        .expect("reload authorization");
    assert_eq!(authorization.consumed_units, 26.0);

    // The committed shifts are now existing bookings: the same request
    // previews as fully conflicted.
    let repreview = service.preview_bulk_schedule(&request).expect("re-preview");
    assert_eq!(repreview.conflict_dates().len(), 4);
    assert!(!repreview.can_commit);
}

#[test]
fn skip_policy_commit_matches_preview() {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("skip.sqlite")).expect("db pool");
    let service = BulkScheduleService::new(pool.clone());
    seed_authorization(&pool, UnitType::Hourly, 500.0, 0.0);

    // 2 of 10 proposed Tue/Thu shifts overlap existing bookings.
    seed_booking(&pool, "caregiver-1", "client-x", 4, (12, 14));
    seed_booking(&pool, "other-caregiver", "client-1", 9, (8, 10));

    let mut request = tue_thu_request(10);
    request.skip_conflicts = true;

    let preview = service.preview_bulk_schedule(&request).expect("preview");
    assert_eq!(preview.conflict_dates(), vec![date(1, 4), date(1, 9)]);
    let expected: Vec<NaiveDate> = preview
        .accepted_occurrences()
        .iter()
        .map(|occ| occ.date)
        .collect();
    assert_eq!(expected.len(), 8);

    let outcome = service.commit_bulk_schedule(&request).expect("commit");
    assert_eq!(outcome.created, 8);
    assert_eq!(outcome.skipped, 2);

    let created: Vec<NaiveDate> = pool
        .with_connection(|conn| {
            BookingRepository::list_for_caregiver(conn, "caregiver-1", date(1, 1), date(2, 29))
        })
        .expect("list")
        .into_iter()
        .filter(|booking| booking.start_at.time() == time(9, 0))
        .map(|booking| booking.date)
        .collect();
    assert_eq!(created, expected);
}

#[test]
fn all_or_nothing_commit_creates_zero_rows_on_conflict() {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("atomic.sqlite")).expect("db pool");
    let service = BulkScheduleService::new(pool.clone());
    seed_authorization(&pool, UnitType::Hourly, 500.0, 0.0);
    seed_booking(&pool, "caregiver-1", "client-x", 4, (12, 14));

    let request = tue_thu_request(10);
    let result = service.commit_bulk_schedule(&request);
    assert!(matches!(result, Err(AppError::ConflictDetected { .. })));

    let total = pool
        .with_connection(|conn| BookingRepository::count_all(conn))
        .expect("count");
    assert_eq!(total, 1); // only the seeded booking
}

#[test]
fn insufficient_units_fail_commit_even_with_skip_policy() {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("units.sqlite")).expect("db pool");
    let service = BulkScheduleService::new(pool.clone());
    seed_authorization(&pool, UnitType::Hourly, 30.0, 25.0);

    let mut request = tue_thu_request(10); // 40 hourly units
    request.skip_conflicts = true;

    let result = service.commit_bulk_schedule(&request);
    assert!(matches!(result, Err(AppError::InsufficientUnits { .. })));

    let total = pool
        .with_connection(|conn| BookingRepository::count_all(conn))
        .expect("count");
    assert_eq!(total, 0);
}

#[test]
fn quarter_hourly_batch_rounds_each_shift_up() {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("quarter.sqlite")).expect("db pool");
    let service = BulkScheduleService::new(pool.clone());
    let auth_id = seed_authorization(&pool, UnitType::QuarterHourly, 50.0, 0.0);

    // 46-minute shifts bill as four quarters each.
    let spec = RecurrenceSpec::new(RecurrencePattern::Daily, date(1, 1))
        .with_occurrence_count(3)
        .unwrap();
    let request = BulkScheduleRequest::new(
        "client-1",
        "caregiver-1",
        spec,
        time(9, 0),
        time(9, 46),
    );

    let preview = service.preview_bulk_schedule(&request).expect("preview");
    assert_eq!(preview.units_requested, 3.0);

    service.commit_bulk_schedule(&request).expect("commit");
    let authorization = pool
        .with_connection(|conn| AuthorizationRepository::find_by_id(conn, &auth_id))
        .expect("reload");
    assert_eq!(authorization.consumed_units, 3.0);
}

#[test]
fn monthly_day_31_flow_skips_short_months() {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("monthly.sqlite")).expect("db pool");
    let service = BulkScheduleService::new(pool.clone());
    seed_authorization(&pool, UnitType::Daily, 10.0, 0.0);

    let spec = RecurrenceSpec::new(RecurrencePattern::Monthly, date(1, 1))
        .with_month_day_set(vec![31])
        .unwrap()
        .with_range_end(date(4, 30));
    let request =
        BulkScheduleRequest::new("client-1", "caregiver-1", spec, time(9, 0), time(17, 0));

    let outcome = service.commit_bulk_schedule(&request).expect("commit");
    assert_eq!(outcome.created, 2);

    let created: Vec<NaiveDate> = pool
        .with_connection(|conn| {
            BookingRepository::list_for_caregiver(conn, "caregiver-1", date(1, 1), date(12, 31))
        })
        .expect("list")
        .into_iter()
        .map(|booking| booking.date)
        .collect();
    assert_eq!(created, vec![date(1, 31), date(3, 31)]);
}

#[test]
fn overnight_shift_requires_opt_in_and_spans_midnight() {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("overnight.sqlite")).expect("db pool");
    let service = BulkScheduleService::new(pool.clone());
    seed_authorization(&pool, UnitType::Hourly, 100.0, 0.0);

    let spec = RecurrenceSpec::new(RecurrencePattern::Once, date(1, 1));
    let mut request = BulkScheduleRequest::new(
        "client-1",
        "caregiver-1",
        spec,
        time(22, 0),
        time(6, 0),
    );

    let rejected = service.preview_bulk_schedule(&request);
    assert!(matches!(rejected, Err(AppError::InvalidTimeRange { .. })));

    request.overnight = OvernightPolicy::EndsNextDay;
    let preview = service.preview_bulk_schedule(&request).expect("preview");
    assert_eq!(preview.total_duration_minutes, 480);

    let outcome = service.commit_bulk_schedule(&request).expect("commit");
    assert_eq!(outcome.created, 1);

    // The committed shift blocks the next morning for the caregiver.
    let morning_spec = RecurrenceSpec::new(RecurrencePattern::Once, date(1, 2));
    let morning = BulkScheduleRequest::new(
        "client-2",
        "caregiver-1",
        morning_spec,
        time(5, 0),
        time(7, 0),
    );
    let report = service.preview_bulk_schedule(&morning).expect("preview");
    assert_eq!(report.conflict_dates(), vec![date(1, 2)]);
}

#[test]
fn invalid_spec_surfaces_offending_field() {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("invalid.sqlite")).expect("db pool");
    let service = BulkScheduleService::new(pool);

    let mut spec = RecurrenceSpec::new(RecurrencePattern::Monthly, date(1, 1));
    spec.month_day_set = vec![15];
    spec.nth_weekday = Some((
        caresched::models::recurrence::OrdinalWeek::First,
        Weekday::Mon,
    ));
    let request =
        BulkScheduleRequest::new("client-1", "caregiver-1", spec, time(9, 0), time(13, 0));

    match service.preview_bulk_schedule(&request) {
        Err(AppError::InvalidRecurrenceSpec { field, .. }) => {
            assert_eq!(field, "month_day_set");
        }
        other => panic!("expected InvalidRecurrenceSpec, got {:?}", other.map(|_| ())),
    }
}
