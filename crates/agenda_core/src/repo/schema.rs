//! Connection readiness checks shared by repository constructors.

use super::{RepoError, RepoResult};
use crate::db::migrations::{current_user_version, latest_version};
use rusqlite::Connection;

pub(crate) const USERS_COLUMNS: &[&str] = &["id", "enabled", "email", "username", "password"];
pub(crate) const ROLES_COLUMNS: &[&str] = &["id", "role"];
pub(crate) const USERS_TO_ROLES_COLUMNS: &[&str] = &["usersid", "rolesid"];
pub(crate) const AGENDA_COLUMNS: &[&str] =
    &["id", "usersid", "day", "time", "accessible", "note"];

/// Verifies schema version, then each `(table, columns)` pair.
pub(crate) fn ensure_connection_ready(
    conn: &Connection,
    tables: &[(&'static str, &'static [&'static str])],
) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for &(table, columns) in tables {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
        for &column in columns {
            if !table_has_column(conn, table, column)? {
                return Err(RepoError::MissingRequiredColumn { table, column });
            }
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
