//! Memo repository: storage, validation, and queries over the
//! `users`/`memos`/`tags`/`memo_tags` schema.
//!
//! Every function here trusts the `user_id`/`id` it is given. Ownership checks
//! live in the HTTP layer ([`crate::api`]).

pub mod list;
pub mod stats;
pub mod store;
pub mod tags;
pub mod transfer;
pub mod types;
pub mod users;
pub mod validate;

use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

use validate::FieldViolation;

/// Errors raised by repository operations.
#[derive(Debug, Error)]
pub enum MemoError {
    #[error("validation failed: {}", summarize(.0))]
    Validation(Vec<FieldViolation>),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("metadata serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl MemoError {
    pub(crate) fn invalid(field: &str, code: &str, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldViolation::new(field, code, message)])
    }
}

fn summarize(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("{}: {}", v.field, v.message))
        .collect::<Vec<_>>()
        .join("; ")
}

pub type MemoResult<T> = Result<T, MemoError>;

/// Canonical timestamp format: RFC 3339, UTC, microsecond precision, `Z` suffix.
/// Fixed width, so lexical order in SQLite matches chronological order.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn now_timestamp() -> String {
    timestamp(Utc::now())
}

/// Parse any RFC 3339 timestamp and re-render it in canonical form.
pub fn normalize_timestamp(raw: &str) -> Option<String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| timestamp(dt.with_timezone(&Utc)))
}

/// [`normalize_timestamp`] for stored records: an unparseable value is a
/// validation error on `field`.
pub(crate) fn canonical_timestamp(field: &str, raw: &str) -> MemoResult<String> {
    normalize_timestamp(raw).ok_or_else(|| {
        MemoError::invalid(field, "invalid_format", format!("{field} must be an RFC 3339 timestamp"))
    })
}
