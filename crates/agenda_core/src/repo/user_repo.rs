//! User repository contract and SQLite implementation.
//!
//! # Responsibility
//! - CRUD over the `users` table.
//! - Explicit joined reads (`UserDetails`) over users, roles and agendas.
//!
//! # Invariants
//! - Username/email uniqueness is enforced by the `UNIQUE` constraints; the
//!   insert itself is the check, so concurrent creates cannot both succeed.
//! - Deleting a user cascades to its agendas and role associations.

use super::agenda_repo::load_agendas_for_user;
use super::role_repo::load_roles_for_user;
use super::schema::{
    ensure_connection_ready, AGENDA_COLUMNS, ROLES_COLUMNS, USERS_COLUMNS, USERS_TO_ROLES_COLUMNS,
};
use super::{
    bool_to_int, int_to_bool, map_unique_violation, narrow_rowid, RepoError, RepoResult,
    UniqueColumn,
};
use crate::model::user::{NewUser, User, UserDetails, UserId};
use crate::model::validation::require_text;
use log::{info, warn};
use rusqlite::{params, Connection, Row};

const USER_SELECT_SQL: &str = "SELECT
    id,
    enabled,
    email,
    username,
    password
FROM users";

/// Repository interface for user records.
pub trait UserRepository {
    /// Inserts a user and returns the stored row with its assigned id.
    fn create_user(&self, new_user: &NewUser) -> RepoResult<User>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    /// Lookup by external login key.
    fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    /// All users ordered by id.
    fn list_users(&self) -> RepoResult<Vec<User>>;
    /// Ban (`false`) or unban (`true`) a user.
    fn set_user_enabled(&self, username: &str, enabled: bool) -> RepoResult<()>;
    /// Replaces the stored credential with another pre-hashed value.
    fn update_password(&self, id: UserId, password_hash: &str) -> RepoResult<()>;
    /// Deletes a user together with its agendas and role associations.
    fn delete_user(&self, id: UserId) -> RepoResult<()>;
    /// User joined with roles and agendas, read from one snapshot.
    fn load_user_details(&self, id: UserId) -> RepoResult<Option<UserDetails>>;
    fn find_user_details_by_username(&self, username: &str) -> RepoResult<Option<UserDetails>>;
}

/// SQLite-backed user repository.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    /// Creates a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(
            conn,
            &[
                ("users", USERS_COLUMNS),
                ("roles", ROLES_COLUMNS),
                ("users_to_roles", USERS_TO_ROLES_COLUMNS),
                ("agenda", AGENDA_COLUMNS),
            ],
        )?;
        Ok(Self { conn })
    }

    fn query_one(&self, filter: &str, key: &dyn rusqlite::ToSql) -> RepoResult<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} WHERE {filter};"))?;
        let mut rows = stmt.query([key])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_user_row(row)?));
        }
        Ok(None)
    }

    fn details_for(&self, user: Option<User>) -> RepoResult<Option<UserDetails>> {
        let Some(user) = user else {
            return Ok(None);
        };
        let roles = load_roles_for_user(self.conn, user.id)?;
        let agendas = load_agendas_for_user(self.conn, user.id, false, None)?;
        Ok(Some(UserDetails {
            user,
            roles,
            agendas,
        }))
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_user(&self, new_user: &NewUser) -> RepoResult<User> {
        new_user.validate()?;

        let inserted = self.conn.execute(
            "INSERT INTO users (enabled, email, username, password)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                bool_to_int(new_user.enabled),
                new_user.email.as_str(),
                new_user.username.as_str(),
                new_user.password.as_str(),
            ],
        );
        if let Err(err) = inserted {
            let err = map_unique_violation(
                err,
                "user",
                &[
                    UniqueColumn {
                        qualified: "users.username",
                        field: "username",
                        value: &new_user.username,
                    },
                    UniqueColumn {
                        qualified: "users.email",
                        field: "email",
                        value: &new_user.email,
                    },
                ],
            );
            warn!(
                "event=user_create module=repo status=error error_code={}",
                err.code()
            );
            return Err(err);
        }

        let id = narrow_rowid(self.conn.last_insert_rowid(), "user")?;
        info!("event=user_create module=repo status=ok user_id={id}");
        Ok(User {
            id,
            enabled: new_user.enabled,
            email: new_user.email.clone(),
            username: new_user.username.clone(),
            password: new_user.password.clone(),
        })
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        self.query_one("id = ?1", &id)
    }

    fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        self.query_one("username = ?1", &username)
    }

    fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        self.query_one("email = ?1", &email)
    }

    fn list_users(&self) -> RepoResult<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} ORDER BY id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut users = Vec::new();
        while let Some(row) = rows.next()? {
            users.push(parse_user_row(row)?);
        }
        Ok(users)
    }

    fn set_user_enabled(&self, username: &str, enabled: bool) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE users SET enabled = ?1 WHERE username = ?2;",
            params![bool_to_int(enabled), username],
        )?;

        if changed == 0 {
            return Err(RepoError::not_found("user", username));
        }

        info!("event=user_set_enabled module=repo status=ok enabled={enabled}");
        Ok(())
    }

    fn update_password(&self, id: UserId, password_hash: &str) -> RepoResult<()> {
        require_text("password", password_hash)?;

        let changed = self.conn.execute(
            "UPDATE users SET password = ?1 WHERE id = ?2;",
            params![password_hash, id],
        )?;

        if changed == 0 {
            return Err(RepoError::not_found("user", id));
        }

        Ok(())
    }

    fn delete_user(&self, id: UserId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM users WHERE id = ?1;", [id])?;

        if changed == 0 {
            return Err(RepoError::not_found("user", id));
        }

        info!("event=user_delete module=repo status=ok user_id={id}");
        Ok(())
    }

    fn load_user_details(&self, id: UserId) -> RepoResult<Option<UserDetails>> {
        // One read transaction so roles and agendas match the user row.
        let tx = self.conn.unchecked_transaction()?;
        let details = self.details_for(self.get_user(id)?)?;
        tx.commit()?;
        Ok(details)
    }

    fn find_user_details_by_username(&self, username: &str) -> RepoResult<Option<UserDetails>> {
        let tx = self.conn.unchecked_transaction()?;
        let details = self.details_for(self.find_user_by_username(username)?)?;
        tx.commit()?;
        Ok(details)
    }
}

/// Maps one `users` row selected with `USER_SELECT_SQL`.
pub(crate) fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    Ok(User {
        id: row.get("id")?,
        enabled: int_to_bool(row.get("enabled")?, "users.enabled")?,
        email: row.get("email")?,
        username: row.get("username")?,
        password: row.get("password")?,
    })
}

pub(crate) fn user_exists(conn: &Connection, id: UserId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1);",
        [id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
