use sqlx::PgPool;

use crate::app_error::AppError;

const MAX_JSON_LOG_LEN: usize = 200;

/// Parse JSON value to target type, logging a warning on failure.
///
/// SQL NULL becomes `Value::Null` and yields the default without logging.
pub fn parse_json_with_fallback<T: serde::de::DeserializeOwned + Default>(
    json: &serde_json::Value,
    field_name: &str,
    entity_type: &str,
    entity_id: &str,
) -> T {
    if json.is_null() {
        return T::default();
    }

    serde_json::from_value(json.clone()).unwrap_or_else(|err| {
        let raw_str = json.to_string();
        let truncated = if raw_str.len() > MAX_JSON_LOG_LEN {
            format!("{}...", raw_str.chars().take(MAX_JSON_LOG_LEN).collect::<String>())
        } else {
            raw_str
        };

        tracing::warn!(
            field = field_name,
            entity_type = entity_type,
            entity_id = entity_id,
            raw_json = %truncated,
            error = %err,
            "Failed to parse JSON field, using default value"
        );
        T::default()
    })
}

pub mod audit_log;
pub mod member;
pub mod payment;
pub mod payment_account;
pub mod plan;
pub mod settlement;
pub mod subscription;

#[derive(Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    pub fn new(pool: PgPool) -> Self {
        PostgresPersistence { pool }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => {
                tracing::error!(error = ?err, "Expected row is missing");
                AppError::Database("Expected row is missing".into())
            }
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() {
                    // One pending payment per subscription is also enforced by an index
                    if db_err.constraint() == Some("payments_one_pending_per_subscription") {
                        AppError::AlreadyProcessed
                    } else {
                        AppError::InvalidInput("A record with this value already exists".into())
                    }
                } else if db_err.is_foreign_key_violation() {
                    AppError::InvalidInput("Referenced record not found".into())
                } else if db_err.is_check_violation() {
                    AppError::InvalidInput("Value is out of the allowed range".into())
                } else if db_err.message().contains("null value")
                    && db_err.message().contains("violates not-null")
                {
                    AppError::InvalidInput("Required field is missing".into())
                } else {
                    tracing::error!(error = ?err, "Database error");
                    AppError::Database("Database operation failed".into())
                }
            }
            _ => {
                tracing::error!(error = ?err, "Database error");
                AppError::Database("Database operation failed".into())
            }
        }
    }
}
