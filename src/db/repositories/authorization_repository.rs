use std::convert::TryFrom;

use chrono::{NaiveDate, Utc};
use rusqlite::{named_params, Connection, OptionalExtension, Row};

use crate::error::{AppError, AppResult};
use crate::models::authorization::{Authorization, AuthorizationInsert, UnitType};
use crate::services::schedule_utils;

const BASE_SELECT: &str = r#"
    SELECT
        id,
        client_id,
        unit_type,
        authorized_units,
        consumed_units,
        valid_from,
        valid_to
    FROM authorizations
"#;

#[derive(Debug, Clone)]
pub struct AuthorizationRow {
    pub id: String,
    pub client_id: String,
    pub unit_type: String,
    pub authorized_units: f64,
    pub consumed_units: f64,
    pub valid_from: String,
    pub valid_to: String,
}

impl AuthorizationRow {
    pub fn into_record(self) -> AppResult<Authorization> {
        let unit_type =
            UnitType::try_from(self.unit_type.as_str()).map_err(AppError::validation)?;

        Ok(Authorization {
            id: self.id,
            client_id: self.client_id,
            unit_type,
            authorized_units: self.authorized_units,
            consumed_units: self.consumed_units,
            valid_from: schedule_utils::parse_date(&self.valid_from)?,
            valid_to: schedule_utils::parse_date(&self.valid_to)?,
        })
    }
}

impl TryFrom<&Row<'_>> for AuthorizationRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get(0)?,
            client_id: row.get(1)?,
            unit_type: row.get(2)?,
            authorized_units: row.get(3)?,
            consumed_units: row.get(4)?,
            valid_from: row.get(5)?,
            valid_to: row.get(6)?,
        })
    }
}

/// Authorization-store collaborator: a client's active service-unit
/// grants and their running consumption.
pub struct AuthorizationRepository;

impl AuthorizationRepository {
    pub fn insert(conn: &Connection, insert: &AuthorizationInsert) -> AppResult<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            r#"
            INSERT INTO authorizations (
                id, client_id, unit_type, authorized_units, consumed_units,
                valid_from, valid_to, is_active, created_at, updated_at
            ) VALUES (
                :id, :client_id, :unit_type, :authorized_units, :consumed_units,
                :valid_from, :valid_to, 1, :created_at, :updated_at
            )
            "#,
            named_params! {
                ":id": id,
                ":client_id": insert.client_id,
                ":unit_type": insert.unit_type.as_str(),
                ":authorized_units": insert.authorized_units,
                ":consumed_units": insert.consumed_units,
                ":valid_from": schedule_utils::format_date(insert.valid_from),
                ":valid_to": schedule_utils::format_date(insert.valid_to),
                ":created_at": now,
                ":updated_at": now,
            },
        )?;

        Ok(id)
    }

    /// The client's active authorization whose coverage period intersects
    /// the requested window; the most recently starting grant wins when
    /// several do.
    pub fn find_active_for_client(
        conn: &Connection,
        client_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<Option<Authorization>> {
        let sql = format!(
            "{BASE_SELECT} WHERE client_id = :client_id AND is_active = 1 \
             AND valid_from <= :to AND valid_to >= :from \
             ORDER BY valid_from DESC LIMIT 1"
        );
        let mut stmt = conn.prepare(&sql)?;

        let row = stmt
            .query_row(
                named_params! {
                    ":client_id": client_id,
                    ":from": schedule_utils::format_date(from),
                    ":to": schedule_utils::format_date(to),
                },
                |row| AuthorizationRow::try_from(row),
            )
            .optional()?;

        row.map(AuthorizationRow::into_record).transpose()
    }

    pub fn find_by_id(conn: &Connection, id: &str) -> AppResult<Authorization> {
        let sql = format!("{BASE_SELECT} WHERE id = :id");
        let mut stmt = conn.prepare(&sql)?;

        let row = stmt.query_row(named_params! { ":id": id }, |row| {
            AuthorizationRow::try_from(row)
        })?;

        row.into_record()
    }

    pub fn increment_consumed_units(conn: &Connection, id: &str, delta: f64) -> AppResult<()> {
        let now = Utc::now().to_rfc3339();
        let affected = conn.execute(
            "UPDATE authorizations SET consumed_units = consumed_units + :delta, updated_at = :now WHERE id = :id",
            named_params! {
                ":delta": delta,
                ":now": now,
                ":id": id,
            },
        )?;

        if affected == 0 {
            return Err(AppError::not_found());
        }
        Ok(())
    }
}
