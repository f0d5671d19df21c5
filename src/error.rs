use rusqlite;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{error, warn};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("database error: {message}")]
    Database { message: String },

    #[error("record not found")]
    NotFound,

    #[error("record conflict: {message}")]
    Conflict { message: String },

    #[error("validation failed: {message}")]
    Validation {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        details: Option<JsonValue>,
    },

    #[error("invalid recurrence spec ({field}): {message}")]
    InvalidRecurrenceSpec { field: &'static str, message: String },

    #[error("invalid time range: {message}")]
    InvalidTimeRange { message: String },

    #[error("no active authorization found for client {client_id}")]
    NoAuthorizationFound { client_id: String },

    #[error("{count} occurrence(s) conflict with existing bookings")]
    ConflictDetected { count: usize },

    #[error("insufficient authorization units: {requested} requested, {remaining} remaining")]
    InsufficientUnits { requested: f64, remaining: f64 },

    #[error("schedule changed since preview: {message}")]
    ConcurrentModification { message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "app::validation", %message, "validation error");
        AppError::Validation {
            message,
            source: None,
            details: None,
        }
    }

    pub fn validation_with_details(message: impl Into<String>, details: JsonValue) -> Self {
        let message = message.into();
        warn!(target: "app::validation", %message, details = %details, "validation error with details");
        AppError::Validation {
            message,
            source: None,
            details: Some(details),
        }
    }

    pub fn invalid_spec(field: &'static str, message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "app::validation", field, %message, "invalid recurrence spec");
        AppError::InvalidRecurrenceSpec { field, message }
    }

    pub fn invalid_time_range(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "app::validation", %message, "invalid time range");
        AppError::InvalidTimeRange { message }
    }

    pub fn no_authorization(client_id: impl Into<String>) -> Self {
        let client_id = client_id.into();
        warn!(target: "app::units", %client_id, "no active authorization");
        AppError::NoAuthorizationFound { client_id }
    }

    pub fn conflict_detected(count: usize) -> Self {
        warn!(target: "app::schedule", count, "conflicting occurrences block commit");
        AppError::ConflictDetected { count }
    }

    pub fn insufficient_units(requested: f64, remaining: f64) -> Self {
        warn!(target: "app::units", requested, remaining, "unit budget exceeded");
        AppError::InsufficientUnits {
            requested,
            remaining,
        }
    }

    pub fn concurrent_modification(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "app::schedule", %message, "re-validation diverged from preview; re-preview required");
        AppError::ConcurrentModification { message }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "app::conflict", %message, "conflict error");
        AppError::Conflict { message }
    }

    pub fn not_found() -> Self {
        warn!(target: "app::database", "resource not found");
        AppError::NotFound
    }

    pub fn database(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(target: "app::database", %message, "database error");
        AppError::Database { message }
    }

    pub fn other(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(target: "app::other", %message, "other error");
        AppError::Other(message)
    }

    /// Whether retrying the same call can succeed without new information.
    /// Only a concurrent-modification rejection is worth re-previewing for;
    /// everything else is deterministic in its inputs.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::ConcurrentModification { .. })
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(error: rusqlite::Error) -> Self {
        use rusqlite::Error::{QueryReturnedNoRows, SqliteFailure};
        use rusqlite::ErrorCode;

        match &error {
            QueryReturnedNoRows => AppError::not_found(),
            SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
                AppError::conflict("unique or constraint violation")
            }
            _ => {
                error!(target: "app::database", error = ?error, "sqlite error");
                AppError::database(error.to_string())
            }
        }
    }
}
