//! Error type for `library-store-sqlite`.

use library_core::{import::Table, maintenance::ConstraintViolation};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] library_core::Error),

  #[error("database error: {0}")]
  Database(tokio_rusqlite::Error),

  /// A write was rejected by a uniqueness, check or foreign-key constraint.
  #[error("constraint failed: {0}")]
  Constraint(String),

  /// Existing rows prevent foreign keys from being applied. Nothing was
  /// changed.
  #[error("{} row(s) violate foreign-key constraints", .0.len())]
  ConstraintViolation(Vec<ConstraintViolation>),

  #[error("{table} row not found: {id}")]
  NotFound { table: Table, id: String },

  #[error("invalid member id prefix: {0:?}")]
  InvalidPrefix(String),

  #[error("date parse error: {0}")]
  DateParse(String),
}

/// Constraint failures are surfaced as [`Error::Constraint`] so callers can
/// tell rejected data apart from I/O or SQL errors.
impl From<tokio_rusqlite::Error> for Error {
  fn from(err: tokio_rusqlite::Error) -> Self {
    match err {
      tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(code, msg))
        if code.code == rusqlite::ErrorCode::ConstraintViolation =>
      {
        Error::Constraint(msg.unwrap_or_else(|| code.to_string()))
      }
      other => Error::Database(other),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
