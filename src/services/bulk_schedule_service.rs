use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{Duration, NaiveDate};
use rusqlite::Connection;
use tracing::{debug, info};

use crate::db::repositories::authorization_repository::AuthorizationRepository;
use crate::db::repositories::booking_repository::BookingRepository;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::authorization::Authorization;
use crate::models::occurrence::{BookingInsert, Occurrence};
use crate::models::schedule::{
    AuthorizationSnapshot, BatchReport, BulkScheduleRequest, CommitOutcome, OccurrenceStatus,
    ReportEntry,
};
use crate::services::conflict_detector::ConflictDetector;
use crate::services::recurrence_engine::RecurrenceEngine;
use crate::services::slot_resolver::SlotResolver;
use crate::services::unit_accountant::UnitAccountant;

/// Serializes commits per affected resource. Two concurrent bulk commits
/// touching the same caregiver calendar or the same authorization budget
/// must not both validate against the same stale snapshot.
#[derive(Clone)]
struct ScopeLocks {
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl ScopeLocks {
    fn new() -> Self {
        Self {
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn handle(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        Arc::clone(
            locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }
}

/// Two-phase bulk generation workflow over the scheduling store.
///
/// Preview assembles a full report without writing anything and may be
/// repeated freely. Commit re-runs every check against the latest store
/// data under scope locks and only then writes; a stale preview is never
/// trusted.
#[derive(Clone)]
pub struct BulkScheduleService {
    db: DbPool,
    scope_locks: ScopeLocks,
}

impl BulkScheduleService {
    pub fn new(db: DbPool) -> Self {
        Self {
            db,
            scope_locks: ScopeLocks::new(),
        }
    }

    /// Read-only dry run: expand the recurrence, resolve time slots, and
    /// report conflicts and unit impact. Always returns a complete report
    /// even when occurrences are conflicted or unbudgeted, so the caller
    /// can render a diagnostic view before committing.
    pub fn preview_bulk_schedule(&self, request: &BulkScheduleRequest) -> AppResult<BatchReport> {
        let occurrences = Self::expand(request)?;
        debug!(
            target: "app::schedule",
            client_id = %request.client_id,
            caregiver_id = %request.caregiver_id,
            occurrences = occurrences.len(),
            "previewing bulk schedule"
        );

        self.db
            .with_connection(|conn| Ok(Self::build_report(conn, request, &occurrences)?.0))
    }

    /// Validate against the latest store data and write the accepted
    /// occurrences. AllOrNothing (`skip_conflicts = false`) creates all
    /// occurrences in a single transaction or none at all; the skip
    /// policy commits each accepted occurrence independently.
    pub fn commit_bulk_schedule(&self, request: &BulkScheduleRequest) -> AppResult<CommitOutcome> {
        let occurrences = Self::expand(request)?;
        let window = Self::batch_window(&occurrences);

        // Resolve the budget scope before locking: the calendar is keyed
        // by caregiver, the budget by the authorization grant (falling
        // back to the client when no grant is active).
        let authorization_scope = match window {
            Some((from, to)) => self.db.with_connection(|conn| {
                Ok(AuthorizationRepository::find_active_for_client(
                    conn,
                    &request.client_id,
                    from,
                    to,
                )?
                .map(|authorization| format!("authorization:{}", authorization.id)))
            })?,
            None => None,
        };

        let mut keys = vec![format!("caregiver:{}", request.caregiver_id)];
        keys.push(
            authorization_scope.unwrap_or_else(|| format!("client:{}", request.client_id)),
        );
        keys.sort();
        let handles: Vec<Arc<Mutex<()>>> = keys
            .iter()
            .map(|key| self.scope_locks.handle(key))
            .collect();
        let _guards: Vec<_> = handles.iter().map(|handle| handle.lock().unwrap()).collect();

        let mut conn = self.db.get_connection()?;
        let (report, authorization) = Self::build_report(&conn, request, &occurrences)?;

        let conflict_dates = report.conflict_dates();
        if !conflict_dates.is_empty() && !request.skip_conflicts {
            if let Some(stamp) = &request.previewed_conflicts {
                let fresh = conflict_dates
                    .iter()
                    .filter(|date| !stamp.contains(date))
                    .count();
                if fresh > 0 {
                    return Err(AppError::concurrent_modification(format!(
                        "{} conflicting occurrence(s) appeared after the preview; re-run preview and commit again",
                        fresh
                    )));
                }
            }
            return Err(AppError::conflict_detected(conflict_dates.len()));
        }

        let accepted: Vec<Occurrence> = report
            .accepted_occurrences()
            .into_iter()
            .cloned()
            .collect();
        let skipped = report.entries.len() - accepted.len();

        // The budget gate applies to what will actually be written, which
        // under the skip policy is smaller than the previewed batch.
        let commit_assessment = authorization
            .as_ref()
            .map(|auth| UnitAccountant::assess(&accepted, auth));
        if let Some(assessment) = &commit_assessment {
            if assessment.has_insufficient_units && !request.allow_over_authorization {
                let remaining = authorization
                    .as_ref()
                    .map(Authorization::remaining_units)
                    .unwrap_or_default();
                return Err(AppError::insufficient_units(
                    assessment.units_requested,
                    remaining,
                ));
            }
        }

        let billable_units = commit_assessment
            .as_ref()
            .map(|assessment| assessment.units_requested)
            .unwrap_or_default();

        let created = if request.skip_conflicts {
            Self::create_each(&mut conn, request, &accepted, authorization.as_ref())?
        } else {
            Self::create_all_or_nothing(
                &mut conn,
                request,
                &accepted,
                authorization.as_ref(),
                billable_units,
            )?
        };

        info!(
            target: "app::schedule",
            client_id = %request.client_id,
            caregiver_id = %request.caregiver_id,
            created,
            skipped,
            billable_units,
            "bulk schedule committed"
        );

        Ok(CommitOutcome {
            created,
            skipped,
            report,
        })
    }

    /// The client's active authorization for the window, as a hard
    /// requirement. Preview treats absence as a warning; callers whose
    /// service types mandate an authorization use this instead.
    pub fn require_active_authorization(
        &self,
        client_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<Authorization> {
        self.db.with_connection(|conn| {
            AuthorizationRepository::find_active_for_client(conn, client_id, from, to)?
                .ok_or_else(|| AppError::no_authorization(client_id))
        })
    }

    fn expand(request: &BulkScheduleRequest) -> AppResult<Vec<Occurrence>> {
        let dates = RecurrenceEngine::generate(&request.spec)?;
        SlotResolver::resolve(
            &dates,
            request.start_time,
            request.end_time,
            request.overnight,
        )
    }

    /// Date window the store is queried over, widened by a day on each
    /// side so shifts crossing midnight are compared against neighbours.
    fn batch_window(occurrences: &[Occurrence]) -> Option<(NaiveDate, NaiveDate)> {
        let first = occurrences.iter().map(|occ| occ.date).min()?;
        let last = occurrences.iter().map(|occ| occ.date).max()?;
        Some((first - Duration::days(1), last + Duration::days(1)))
    }

    fn build_report(
        conn: &Connection,
        request: &BulkScheduleRequest,
        occurrences: &[Occurrence],
    ) -> AppResult<(BatchReport, Option<Authorization>)> {
        let window = Self::batch_window(occurrences);

        let (caregiver_bookings, client_bookings, authorization) = match window {
            Some((from, to)) => (
                BookingRepository::list_for_caregiver(conn, &request.caregiver_id, from, to)?,
                BookingRepository::list_for_client(conn, &request.client_id, from, to)?,
                AuthorizationRepository::find_active_for_client(
                    conn,
                    &request.client_id,
                    from,
                    to,
                )?,
            ),
            None => (Vec::new(), Vec::new(), None),
        };

        let conflicts =
            ConflictDetector::detect(occurrences, &caregiver_bookings, &client_bookings);
        // One party per report entry; the detector lists caregiver
        // findings first, so a double double-booking reads as a
        // caregiver conflict.
        let mut conflict_by_date = HashMap::new();
        for conflict in &conflicts {
            conflict_by_date.entry(conflict.date).or_insert(conflict.party);
        }

        let assessment = authorization
            .as_ref()
            .map(|auth| UnitAccountant::assess(occurrences, auth));
        let outside_period: Vec<NaiveDate> = assessment
            .as_ref()
            .map(|a| a.outside_period.clone())
            .unwrap_or_default();

        let entries: Vec<ReportEntry> = occurrences
            .iter()
            .map(|occurrence| {
                let status = if let Some(&party) = conflict_by_date.get(&occurrence.date) {
                    OccurrenceStatus::Conflict { party }
                } else if outside_period.contains(&occurrence.date) {
                    OccurrenceStatus::OutsideAuthorization
                } else {
                    OccurrenceStatus::Ok
                };
                ReportEntry {
                    occurrence: occurrence.clone(),
                    status,
                }
            })
            .collect();

        let mut warnings = Vec::new();
        if authorization.is_none() && !occurrences.is_empty() {
            warnings.push(format!(
                "no active authorization found for client {}; requested units will not be budgeted",
                request.client_id
            ));
        }

        let units_requested = assessment
            .as_ref()
            .map(|a| a.units_requested)
            .unwrap_or_default();
        let units_ok = assessment
            .as_ref()
            .map(|a| !a.has_insufficient_units || request.allow_over_authorization)
            .unwrap_or(true);
        let conflicts_ok = request.skip_conflicts || conflicts.is_empty();

        let snapshot = match (&authorization, &assessment) {
            (Some(auth), Some(a)) => Some(AuthorizationSnapshot {
                authorization_id: auth.id.clone(),
                unit_type: auth.unit_type,
                authorized_units: auth.authorized_units,
                consumed_before: auth.consumed_units,
                consumed_after: a.units_after_commit,
                has_insufficient_units: a.has_insufficient_units,
            }),
            _ => None,
        };

        let report = BatchReport {
            total_occurrences: entries.len(),
            total_duration_minutes: entries
                .iter()
                .map(|entry| entry.occurrence.duration_minutes)
                .sum(),
            units_requested,
            authorization: snapshot,
            warnings,
            can_commit: units_ok && conflicts_ok,
            entries,
        };

        Ok((report, authorization))
    }

    fn create_all_or_nothing(
        conn: &mut Connection,
        request: &BulkScheduleRequest,
        accepted: &[Occurrence],
        authorization: Option<&Authorization>,
        billable_units: f64,
    ) -> AppResult<usize> {
        let tx = conn.transaction()?;

        for occurrence in accepted {
            BookingRepository::insert(
                &tx,
                &BookingInsert {
                    caregiver_id: request.caregiver_id.clone(),
                    client_id: request.client_id.clone(),
                    occurrence: occurrence.clone(),
                },
            )?;
        }
        if let Some(auth) = authorization {
            if billable_units > 0.0 {
                AuthorizationRepository::increment_consumed_units(&tx, &auth.id, billable_units)?;
            }
        }

        tx.commit()?;
        Ok(accepted.len())
    }

    fn create_each(
        conn: &mut Connection,
        request: &BulkScheduleRequest,
        accepted: &[Occurrence],
        authorization: Option<&Authorization>,
    ) -> AppResult<usize> {
        let mut created = 0usize;

        for occurrence in accepted {
            let tx = conn.transaction()?;
            BookingRepository::insert(
                &tx,
                &BookingInsert {
                    caregiver_id: request.caregiver_id.clone(),
                    client_id: request.client_id.clone(),
                    occurrence: occurrence.clone(),
                },
            )?;
            if let Some(auth) = authorization {
                if auth.covers(occurrence.date) {
                    let cost =
                        UnitAccountant::unit_cost(auth.unit_type, occurrence.duration_minutes);
                    AuthorizationRepository::increment_consumed_units(&tx, &auth.id, cost)?;
                }
            }
            tx.commit()?;
            created += 1;
        }

        Ok(created)
    }
}
