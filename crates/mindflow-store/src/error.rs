//! Mapping from SQLx errors to `DomainError`.
//!
//! | SQLx error | Postgres code | `DomainError` |
//! |------------|---------------|---------------|
//! | unique violation | `23505` | `Infrastructure`, unless the caller maps the constraint |
//! | foreign key violation | `23503` | `Infrastructure`, unless the caller maps the constraint |
//! | check violation | `23514` | `Validation` |
//! | string data right truncation | `22001` | `Validation` |
//! | anything else | | `Infrastructure` |

use mindflow_core::error::DomainError;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";
const STRING_DATA_RIGHT_TRUNCATION: &str = "22001";

pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> DomainError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some(CHECK_VIOLATION | STRING_DATA_RIGHT_TRUNCATION) => {
                    DomainError::Validation(msg)
                }
                _ => DomainError::Infrastructure(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            DomainError::Infrastructure(format!("connection pool closed in {operation}"))
        }
        other => DomainError::Infrastructure(format!("sqlx error in {operation}: {other}")),
    }
}

fn violated(err: &sqlx::Error, code: &str) -> Option<String> {
    match err {
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(code) => {
            Some(db_err.constraint().unwrap_or_default().to_owned())
        }
        _ => None,
    }
}

/// Returns the violated constraint's name for a unique violation.
pub(crate) fn unique_violation(err: &sqlx::Error) -> Option<String> {
    violated(err, UNIQUE_VIOLATION)
}

/// Returns the violated constraint's name for a foreign key violation.
pub(crate) fn foreign_key_violation(err: &sqlx::Error) -> Option<String> {
    violated(err, FOREIGN_KEY_VIOLATION)
}
