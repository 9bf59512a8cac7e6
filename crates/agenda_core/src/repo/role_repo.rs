//! Role repository contract and SQLite implementation.
//!
//! # Responsibility
//! - CRUD over `roles`.
//! - Own the `users_to_roles` association (User is the owning side in the
//!   domain, but the association rows are managed here).
//!
//! # Invariants
//! - Role names are unique.
//! - Each `(user, role)` pair is stored at most once; assigning twice is a
//!   no-op.
//! - Deleting a role removes its association rows, never the users.

use super::schema::{ensure_connection_ready, ROLES_COLUMNS, USERS_COLUMNS, USERS_TO_ROLES_COLUMNS};
use super::user_repo::{parse_user_row, user_exists};
use super::{
    is_foreign_key_violation, map_unique_violation, narrow_rowid, RepoError, RepoResult,
    UniqueColumn,
};
use crate::model::role::{validate_role_name, Role, RoleId};
use crate::model::user::{User, UserId};
use log::{info, warn};
use rusqlite::{params, Connection, Row};

/// Repository interface for roles and user-role associations.
pub trait RoleRepository {
    fn create_role(&self, name: &str) -> RepoResult<Role>;
    fn get_role(&self, id: RoleId) -> RepoResult<Option<Role>>;
    fn find_role_by_name(&self, name: &str) -> RepoResult<Option<Role>>;
    /// All roles ordered by name.
    fn list_roles(&self) -> RepoResult<Vec<Role>>;
    fn delete_role(&self, id: RoleId) -> RepoResult<()>;
    /// Grants `role_id` to `user_id`. Idempotent.
    fn assign_role(&self, user_id: UserId, role_id: RoleId) -> RepoResult<()>;
    /// Removes the grant if present. Idempotent for existing ids.
    fn revoke_role(&self, user_id: UserId, role_id: RoleId) -> RepoResult<()>;
    /// Roles held by a user, ordered by name.
    fn roles_for_user(&self, user_id: UserId) -> RepoResult<Vec<Role>>;
    /// Users holding a role, ordered by id.
    fn users_with_role(&self, role_id: RoleId) -> RepoResult<Vec<User>>;
}

/// SQLite-backed role repository.
pub struct SqliteRoleRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRoleRepository<'conn> {
    /// Creates a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(
            conn,
            &[
                ("users", USERS_COLUMNS),
                ("roles", ROLES_COLUMNS),
                ("users_to_roles", USERS_TO_ROLES_COLUMNS),
            ],
        )?;
        Ok(Self { conn })
    }

    /// Resolves which side of an association is missing.
    fn missing_side(&self, user_id: UserId, role_id: RoleId) -> RepoResult<Option<RepoError>> {
        if !user_exists(self.conn, user_id)? {
            return Ok(Some(RepoError::not_found("user", user_id)));
        }
        if !role_exists(self.conn, role_id)? {
            return Ok(Some(RepoError::not_found("role", role_id)));
        }
        Ok(None)
    }
}

impl RoleRepository for SqliteRoleRepository<'_> {
    fn create_role(&self, name: &str) -> RepoResult<Role> {
        validate_role_name(name)?;

        if let Err(err) = self
            .conn
            .execute("INSERT INTO roles (role) VALUES (?1);", [name])
        {
            let err = map_unique_violation(
                err,
                "role",
                &[UniqueColumn {
                    qualified: "roles.role",
                    field: "role",
                    value: name,
                }],
            );
            warn!(
                "event=role_create module=repo status=error error_code={}",
                err.code()
            );
            return Err(err);
        }

        let id = narrow_rowid(self.conn.last_insert_rowid(), "role")?;
        info!("event=role_create module=repo status=ok role_id={id}");
        Ok(Role {
            id,
            name: name.to_string(),
        })
    }

    fn get_role(&self, id: RoleId) -> RepoResult<Option<Role>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, role FROM roles WHERE id = ?1;")?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_role_row(row)?));
        }
        Ok(None)
    }

    fn find_role_by_name(&self, name: &str) -> RepoResult<Option<Role>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, role FROM roles WHERE role = ?1;")?;
        let mut rows = stmt.query([name])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_role_row(row)?));
        }
        Ok(None)
    }

    fn list_roles(&self) -> RepoResult<Vec<Role>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, role FROM roles ORDER BY role ASC, id ASC;")?;
        let mut rows = stmt.query([])?;
        let mut roles = Vec::new();
        while let Some(row) = rows.next()? {
            roles.push(parse_role_row(row)?);
        }
        Ok(roles)
    }

    fn delete_role(&self, id: RoleId) -> RepoResult<()> {
        let changed = self.conn.execute("DELETE FROM roles WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::not_found("role", id));
        }
        info!("event=role_delete module=repo status=ok role_id={id}");
        Ok(())
    }

    fn assign_role(&self, user_id: UserId, role_id: RoleId) -> RepoResult<()> {
        // OR IGNORE covers the duplicate pair only; foreign keys still fire.
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO users_to_roles (usersid, rolesid) VALUES (?1, ?2);",
            params![user_id, role_id],
        );

        match inserted {
            Ok(_) => {
                info!(
                    "event=role_assign module=repo status=ok user_id={user_id} role_id={role_id}"
                );
                Ok(())
            }
            Err(err) if is_foreign_key_violation(&err) => {
                let missing = self
                    .missing_side(user_id, role_id)?
                    .unwrap_or_else(|| err.into());
                warn!(
                    "event=role_assign module=repo status=error error_code={}",
                    missing.code()
                );
                Err(missing)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn revoke_role(&self, user_id: UserId, role_id: RoleId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM users_to_roles WHERE usersid = ?1 AND rolesid = ?2;",
            params![user_id, role_id],
        )?;

        if changed == 0 {
            if let Some(missing) = self.missing_side(user_id, role_id)? {
                return Err(missing);
            }
        }

        Ok(())
    }

    fn roles_for_user(&self, user_id: UserId) -> RepoResult<Vec<Role>> {
        if !user_exists(self.conn, user_id)? {
            return Err(RepoError::not_found("user", user_id));
        }
        load_roles_for_user(self.conn, user_id)
    }

    fn users_with_role(&self, role_id: RoleId) -> RepoResult<Vec<User>> {
        if !role_exists(self.conn, role_id)? {
            return Err(RepoError::not_found("role", role_id));
        }

        let mut stmt = self.conn.prepare(
            "SELECT
                u.id AS id,
                u.enabled AS enabled,
                u.email AS email,
                u.username AS username,
                u.password AS password
             FROM users u
             INNER JOIN users_to_roles ur ON ur.usersid = u.id
             WHERE ur.rolesid = ?1
             ORDER BY u.id ASC;",
        )?;
        let mut rows = stmt.query([role_id])?;
        let mut users = Vec::new();
        while let Some(row) = rows.next()? {
            users.push(parse_user_row(row)?);
        }
        Ok(users)
    }
}

/// Loads the roles held by one user, ordered by name.
pub(crate) fn load_roles_for_user(conn: &Connection, user_id: UserId) -> RepoResult<Vec<Role>> {
    let mut stmt = conn.prepare(
        "SELECT r.id AS id, r.role AS role
         FROM roles r
         INNER JOIN users_to_roles ur ON ur.rolesid = r.id
         WHERE ur.usersid = ?1
         ORDER BY r.role ASC, r.id ASC;",
    )?;
    let mut rows = stmt.query([user_id])?;
    let mut roles = Vec::new();
    while let Some(row) = rows.next()? {
        roles.push(parse_role_row(row)?);
    }
    Ok(roles)
}

fn role_exists(conn: &Connection, id: RoleId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM roles WHERE id = ?1);",
        [id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn parse_role_row(row: &Row<'_>) -> RepoResult<Role> {
    Ok(Role {
        id: row.get("id")?,
        name: row.get("role")?,
    })
}
