use std::convert::TryFrom;

use chrono::Utc;
use rusqlite::{named_params, Connection, Row};

use crate::error::AppResult;
use crate::models::occurrence::{BookingInsert, ExistingBooking};
use crate::services::schedule_utils;

const BASE_SELECT: &str = r#"
    SELECT
        id,
        service_date,
        start_at,
        end_at
    FROM bookings
"#;

#[derive(Debug, Clone)]
pub struct BookingRow {
    pub id: String,
    pub service_date: String,
    pub start_at: String,
    pub end_at: String,
}

impl BookingRow {
    pub fn into_booking(self) -> AppResult<ExistingBooking> {
        Ok(ExistingBooking {
            id: self.id,
            date: schedule_utils::parse_date(&self.service_date)?,
            start_at: schedule_utils::parse_datetime(&self.start_at)?,
            end_at: schedule_utils::parse_datetime(&self.end_at)?,
        })
    }
}

impl TryFrom<&Row<'_>> for BookingRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get(0)?,
            service_date: row.get(1)?,
            start_at: row.get(2)?,
            end_at: row.get(3)?,
        })
    }
}

/// Schedule-store collaborator: committed bookings per caregiver or
/// client. Responses are the single source of truth at commit time.
pub struct BookingRepository;

impl BookingRepository {
    pub fn insert(conn: &Connection, insert: &BookingInsert) -> AppResult<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            r#"
            INSERT INTO bookings (
                id, caregiver_id, client_id, service_date, start_at, end_at,
                duration_minutes, created_at, updated_at
            ) VALUES (
                :id, :caregiver_id, :client_id, :service_date, :start_at, :end_at,
                :duration_minutes, :created_at, :updated_at
            )
            "#,
            named_params! {
                ":id": id,
                ":caregiver_id": insert.caregiver_id,
                ":client_id": insert.client_id,
                ":service_date": schedule_utils::format_date(insert.occurrence.date),
                ":start_at": schedule_utils::format_datetime(insert.occurrence.start_at),
                ":end_at": schedule_utils::format_datetime(insert.occurrence.end_at),
                ":duration_minutes": insert.occurrence.duration_minutes,
                ":created_at": now,
                ":updated_at": now,
            },
        )?;

        Ok(id)
    }

    pub fn list_for_caregiver(
        conn: &Connection,
        caregiver_id: &str,
        from: chrono::NaiveDate,
        to: chrono::NaiveDate,
    ) -> AppResult<Vec<ExistingBooking>> {
        Self::list_by_column(conn, "caregiver_id", caregiver_id, from, to)
    }

    pub fn list_for_client(
        conn: &Connection,
        client_id: &str,
        from: chrono::NaiveDate,
        to: chrono::NaiveDate,
    ) -> AppResult<Vec<ExistingBooking>> {
        Self::list_by_column(conn, "client_id", client_id, from, to)
    }

    pub fn count_all(conn: &Connection) -> AppResult<i64> {
        let count = conn.query_row("SELECT COUNT(*) FROM bookings", [], |row| row.get(0))?;
        Ok(count)
    }

    fn list_by_column(
        conn: &Connection,
        column: &str,
        value: &str,
        from: chrono::NaiveDate,
        to: chrono::NaiveDate,
    ) -> AppResult<Vec<ExistingBooking>> {
        let sql = format!(
            "{BASE_SELECT} WHERE {column} = :value AND service_date >= :from AND service_date <= :to ORDER BY start_at"
        );
        let mut stmt = conn.prepare(&sql)?;

        let rows = stmt.query_map(
            named_params! {
                ":value": value,
                ":from": schedule_utils::format_date(from),
                ":to": schedule_utils::format_date(to),
            },
            |row| BookingRow::try_from(row),
        )?;

        let mut bookings = Vec::new();
        for row in rows {
            bookings.push(row?.into_booking()?);
        }
        Ok(bookings)
    }
}
