//! Repository layer contracts and SQLite implementations.
//!
//! # Responsibility
//! - Define per-record data access contracts (`UserRepository`,
//!   `RoleRepository`, `AgendaRepository`).
//! - Map rows to records explicitly and SQLite failures to semantic errors.
//!
//! # Invariants
//! - Write paths validate input before any SQL runs.
//! - Unique and foreign-key violations surface as `Duplicate` / `NotFound`,
//!   never as raw SQLite errors.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::DbError;
use crate::model::agenda::AgendaId;
use crate::model::user::UserId;
use crate::model::validation::ValidationError;
use rusqlite::ffi;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod agenda_repo;
pub mod role_repo;
mod schema;
pub mod user_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Error taxonomy shared by all repositories.
#[derive(Debug)]
pub enum RepoError {
    /// Malformed input field.
    Validation(ValidationError),
    /// Unique constraint violation (duplicate key).
    Duplicate {
        entity: &'static str,
        field: &'static str,
        value: String,
    },
    /// Referenced record does not exist.
    NotFound { entity: &'static str, key: String },
    /// Agenda exists but belongs to another user.
    Forbidden {
        agenda_id: AgendaId,
        requesting_user_id: UserId,
    },
    Db(DbError),
    /// Persisted data cannot be converted to a valid record.
    InvalidData(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl RepoError {
    pub(crate) fn not_found(entity: &'static str, key: impl Display) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Stable short code for logs and callers that branch on error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Duplicate { .. } => "duplicate_key",
            Self::NotFound { .. } => "not_found",
            Self::Forbidden { .. } => "forbidden",
            Self::Db(_) => "db",
            Self::InvalidData(_) => "invalid_data",
            Self::UninitializedConnection { .. } => "uninitialized_connection",
            Self::MissingRequiredTable(_) => "missing_table",
            Self::MissingRequiredColumn { .. } => "missing_column",
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Duplicate {
                entity,
                field,
                value,
            } => write!(f, "{entity} with {field} `{value}` already exists"),
            Self::NotFound { entity, key } => write!(f, "{entity} not found: {key}"),
            Self::Forbidden {
                agenda_id,
                requesting_user_id,
            } => write!(
                f,
                "user {requesting_user_id} does not own agenda {agenda_id}"
            ),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "repository requires column `{column}` in table `{table}`"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<r2d2::Error> for RepoError {
    fn from(value: r2d2::Error) -> Self {
        Self::Db(DbError::Pool(value))
    }
}

/// A unique column and the value an insert tried to put into it.
pub(crate) struct UniqueColumn<'a> {
    /// `table.column`, as SQLite reports it.
    pub qualified: &'static str,
    pub field: &'static str,
    pub value: &'a str,
}

/// Maps a unique-constraint failure on one of `columns` to `Duplicate`.
/// Any other error is passed through.
pub(crate) fn map_unique_violation(
    err: rusqlite::Error,
    entity: &'static str,
    columns: &[UniqueColumn<'_>],
) -> RepoError {
    if let rusqlite::Error::SqliteFailure(failure, Some(message)) = &err {
        if failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE {
            if let Some(column) = columns
                .iter()
                .find(|column| message.contains(column.qualified))
            {
                return RepoError::Duplicate {
                    entity,
                    field: column.field,
                    value: column.value.to_string(),
                };
            }
        }
    }
    err.into()
}

pub(crate) fn is_foreign_key_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == ffi::SQLITE_CONSTRAINT_FOREIGNKEY
    )
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(crate) fn int_to_bool(value: i64, column: &str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}

/// Converts an assigned rowid into a 32-bit record id.
pub(crate) fn narrow_rowid(rowid: i64, entity: &str) -> RepoResult<i32> {
    i32::try_from(rowid)
        .map_err(|_| RepoError::InvalidData(format!("{entity} id `{rowid}` exceeds 32-bit range")))
}
