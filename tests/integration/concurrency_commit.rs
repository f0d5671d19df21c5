use std::sync::Arc;
use std::thread;

use caresched::db::repositories::authorization_repository::AuthorizationRepository;
use caresched::db::repositories::booking_repository::BookingRepository;
use caresched::db::DbPool;
use caresched::error::{AppError, AppResult};
use caresched::models::authorization::{AuthorizationInsert, UnitType};
use caresched::models::recurrence::{RecurrencePattern, RecurrenceSpec};
use caresched::models::schedule::{BulkScheduleRequest, CommitOutcome};
use chrono::{NaiveDate, NaiveTime};
use tempfile::tempdir;

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
}

fn time(hour: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, 0, 0).unwrap()
}

fn once_request(
    client_id: &str,
    caregiver_id: &str,
    day: u32,
    hours: (u32, u32),
) -> BulkScheduleRequest {
    let spec = RecurrenceSpec::new(RecurrencePattern::Once, date(day));
    BulkScheduleRequest::new(client_id, caregiver_id, spec, time(hours.0), time(hours.1))
}

fn run_concurrently(
    service: Arc<caresched::services::bulk_schedule_service::BulkScheduleService>,
    first: BulkScheduleRequest,
    second: BulkScheduleRequest,
) -> (AppResult<CommitOutcome>, AppResult<CommitOutcome>) {
    let service_a = Arc::clone(&service);
    let service_b = Arc::clone(&service);
    let handle_a = thread::spawn(move || service_a.commit_bulk_schedule(&first));
    let handle_b = thread::spawn(move || service_b.commit_bulk_schedule(&second));
    (handle_a.join().unwrap(), handle_b.join().unwrap())
}

#[test]
fn concurrent_commits_cannot_double_book_a_caregiver() {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("race_calendar.sqlite")).expect("db pool");
    let service = Arc::new(
        caresched::services::bulk_schedule_service::BulkScheduleService::new(pool.clone()),
    );

    // Two clients requesting the same caregiver for the same slot.
    let (left, right) = run_concurrently(
        Arc::clone(&service),
        once_request("client-a", "caregiver-1", 8, (9, 13)),
        once_request("client-b", "caregiver-1", 8, (9, 13)),
    );

    let successes = [&left, &right].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one commit must win the slot");

    let loser = if left.is_err() { left } else { right };
    assert!(matches!(loser, Err(AppError::ConflictDetected { .. })));

    let total = pool
        .with_connection(|conn| BookingRepository::count_all(conn))
        .expect("count");
    assert_eq!(total, 1);
}

#[test]
fn concurrent_commits_cannot_overshoot_a_unit_budget() {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("race_budget.sqlite")).expect("db pool");
    let service = Arc::new(
        caresched::services::bulk_schedule_service::BulkScheduleService::new(pool.clone()),
    );

    let auth_id = pool
        .with_connection(|conn| {
            AuthorizationRepository::insert(
                conn,
                &AuthorizationInsert {
                    client_id: "client-1".into(),
                    unit_type: UnitType::Hourly,
                    authorized_units: 10.0,
                    consumed_units: 0.0,
                    valid_from: date(1),
                    valid_to: date(31),
                },
            )
        })
        .expect("seed authorization");

    // Two 8-unit batches on different caregivers and non-overlapping
    // times: each fits the 10-unit budget alone, never together.
    let spec_a = RecurrenceSpec::new(RecurrencePattern::Daily, date(8))
        .with_occurrence_count(2)
        .unwrap();
    let mut first = BulkScheduleRequest::new("client-1", "caregiver-1", spec_a, time(8), time(12));
    first.skip_conflicts = false;

    let spec_b = RecurrenceSpec::new(RecurrencePattern::Daily, date(8))
        .with_occurrence_count(2)
        .unwrap();
    let second = BulkScheduleRequest::new("client-1", "caregiver-2", spec_b, time(14), time(18));

    let (left, right) = run_concurrently(Arc::clone(&service), first, second);

    let successes = [&left, &right].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one commit must fit the budget");

    let loser = if left.is_err() { left } else { right };
    assert!(matches!(loser, Err(AppError::InsufficientUnits { .. })));

    let authorization = pool
        .with_connection(|conn| AuthorizationRepository::find_by_id(conn, &auth_id))
        .expect("reload");
    assert_eq!(authorization.consumed_units, 8.0);
    assert!(authorization.consumed_units <= authorization.authorized_units);
}
