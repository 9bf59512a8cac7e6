//! Thread-safe entry point over a pooled SQLite database.
//!
//! # Responsibility
//! - Own the connection pool and hand each operation its own connection.
//! - Expose every repository and service operation through `&self`.
//!
//! # Invariants
//! - One operation uses one pooled connection for its whole duration.
//! - Multi-statement writes run in `BEGIN IMMEDIATE` transactions and roll
//!   back on any error.
//! - Multi-statement reads run in one deferred transaction so they see a
//!   single snapshot.
//! - `AgendaStore` is `Send + Sync`; share it with `Arc`.

use crate::config::{ConfigError, StoreConfig};
use crate::db::{open_pool, DbError, DbPool};
use crate::model::agenda::{Agenda, AgendaId, AgendaUpdate, NewAgenda};
use crate::model::role::{Role, RoleId};
use crate::model::user::{NewUser, User, UserDetails, UserId};
use crate::repo::agenda_repo::{AgendaListQuery, AgendaRepository, SqliteAgendaRepository};
use crate::repo::role_repo::{RoleRepository, SqliteRoleRepository};
use crate::repo::user_repo::{SqliteUserRepository, UserRepository};
use crate::repo::{RepoError, RepoResult};
use crate::service::account_service::AccountService;
use crate::service::agenda_service::{AgendaService, SharedAgendas, WeeklySchedule};
use log::{debug, info, warn};
use rusqlite::{Connection, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

type SqliteAccountService<'conn> =
    AccountService<SqliteUserRepository<'conn>, SqliteRoleRepository<'conn>>;
type SqliteAgendaService<'conn> =
    AgendaService<SqliteAgendaRepository<'conn>, SqliteUserRepository<'conn>>;

/// Failure to open a store.
#[derive(Debug)]
pub enum StoreError {
    Config(ConfigError),
    Db(DbError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "invalid store config: {err}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Db(err) => Some(err),
        }
    }
}

impl From<ConfigError> for StoreError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

/// Pooled agenda store.
#[derive(Clone)]
pub struct AgendaStore {
    pool: DbPool,
}

impl AgendaStore {
    /// Validates `config`, opens the pool and migrates the schema.
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        config.validate()?;
        let pool = open_pool(config)?;
        info!("event=store_open module=store status=ok");
        Ok(Self { pool })
    }

    /// Runs `f` on a pooled connection outside any explicit transaction.
    fn with_conn<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&Connection) -> RepoResult<T>,
    ) -> RepoResult<T> {
        let started_at = Instant::now();
        let result = self
            .pool
            .get()
            .map_err(RepoError::from)
            .and_then(|conn| f(&conn));
        log_outcome(op, started_at, &result);
        result
    }

    /// Runs `f` inside an IMMEDIATE transaction, committed only on success.
    fn with_tx<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&Connection) -> RepoResult<T>,
    ) -> RepoResult<T> {
        self.in_transaction(op, TransactionBehavior::Immediate, f)
    }

    /// Runs a multi-statement read on one snapshot.
    fn with_read_tx<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&Connection) -> RepoResult<T>,
    ) -> RepoResult<T> {
        self.in_transaction(op, TransactionBehavior::Deferred, f)
    }

    fn in_transaction<T>(
        &self,
        op: &'static str,
        behavior: TransactionBehavior,
        f: impl FnOnce(&Connection) -> RepoResult<T>,
    ) -> RepoResult<T> {
        let started_at = Instant::now();
        let result = self.pool.get().map_err(RepoError::from).and_then(|mut conn| {
            let tx = conn.transaction_with_behavior(behavior)?;
            let value = f(&tx)?;
            tx.commit()?;
            Ok(value)
        });
        log_outcome(op, started_at, &result);
        result
    }

    // Users

    pub fn create_user(&self, new_user: &NewUser) -> RepoResult<User> {
        self.with_conn("create_user", |conn| {
            SqliteUserRepository::try_new(conn)?.create_user(new_user)
        })
    }

    pub fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        self.with_conn("get_user", |conn| {
            SqliteUserRepository::try_new(conn)?.get_user(id)
        })
    }

    pub fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        self.with_conn("find_user_by_username", |conn| {
            SqliteUserRepository::try_new(conn)?.find_user_by_username(username)
        })
    }

    pub fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        self.with_conn("find_user_by_email", |conn| {
            SqliteUserRepository::try_new(conn)?.find_user_by_email(email)
        })
    }

    pub fn list_users(&self) -> RepoResult<Vec<User>> {
        self.with_conn("list_users", |conn| {
            SqliteUserRepository::try_new(conn)?.list_users()
        })
    }

    pub fn set_user_enabled(&self, username: &str, enabled: bool) -> RepoResult<()> {
        self.with_conn("set_user_enabled", |conn| {
            SqliteUserRepository::try_new(conn)?.set_user_enabled(username, enabled)
        })
    }

    pub fn update_password(&self, id: UserId, password_hash: &str) -> RepoResult<()> {
        self.with_conn("update_password", |conn| {
            SqliteUserRepository::try_new(conn)?.update_password(id, password_hash)
        })
    }

    pub fn delete_user(&self, id: UserId) -> RepoResult<()> {
        self.with_conn("delete_user", |conn| {
            SqliteUserRepository::try_new(conn)?.delete_user(id)
        })
    }

    pub fn load_user_details(&self, id: UserId) -> RepoResult<Option<UserDetails>> {
        self.with_conn("load_user_details", |conn| {
            SqliteUserRepository::try_new(conn)?.load_user_details(id)
        })
    }

    pub fn find_user_details_by_username(&self, username: &str) -> RepoResult<Option<UserDetails>> {
        self.with_conn("find_user_details_by_username", |conn| {
            SqliteUserRepository::try_new(conn)?.find_user_details_by_username(username)
        })
    }

    // Roles

    pub fn create_role(&self, name: &str) -> RepoResult<Role> {
        self.with_conn("create_role", |conn| {
            SqliteRoleRepository::try_new(conn)?.create_role(name)
        })
    }

    pub fn get_role(&self, id: RoleId) -> RepoResult<Option<Role>> {
        self.with_conn("get_role", |conn| {
            SqliteRoleRepository::try_new(conn)?.get_role(id)
        })
    }

    pub fn find_role_by_name(&self, name: &str) -> RepoResult<Option<Role>> {
        self.with_conn("find_role_by_name", |conn| {
            SqliteRoleRepository::try_new(conn)?.find_role_by_name(name)
        })
    }

    pub fn list_roles(&self) -> RepoResult<Vec<Role>> {
        self.with_conn("list_roles", |conn| {
            SqliteRoleRepository::try_new(conn)?.list_roles()
        })
    }

    pub fn delete_role(&self, id: RoleId) -> RepoResult<()> {
        self.with_conn("delete_role", |conn| {
            SqliteRoleRepository::try_new(conn)?.delete_role(id)
        })
    }

    pub fn assign_role(&self, user_id: UserId, role_id: RoleId) -> RepoResult<()> {
        self.with_tx("assign_role", |conn| {
            SqliteRoleRepository::try_new(conn)?.assign_role(user_id, role_id)
        })
    }

    pub fn revoke_role(&self, user_id: UserId, role_id: RoleId) -> RepoResult<()> {
        self.with_tx("revoke_role", |conn| {
            SqliteRoleRepository::try_new(conn)?.revoke_role(user_id, role_id)
        })
    }

    pub fn roles_for_user(&self, user_id: UserId) -> RepoResult<Vec<Role>> {
        self.with_conn("roles_for_user", |conn| {
            SqliteRoleRepository::try_new(conn)?.roles_for_user(user_id)
        })
    }

    pub fn users_with_role(&self, role_id: RoleId) -> RepoResult<Vec<User>> {
        self.with_conn("users_with_role", |conn| {
            SqliteRoleRepository::try_new(conn)?.users_with_role(role_id)
        })
    }

    // Agendas

    pub fn create_agenda(&self, new_agenda: &NewAgenda) -> RepoResult<Agenda> {
        self.with_conn("create_agenda", |conn| {
            SqliteAgendaRepository::try_new(conn)?.create_agenda(new_agenda)
        })
    }

    pub fn get_agenda(&self, id: AgendaId) -> RepoResult<Option<Agenda>> {
        self.with_conn("get_agenda", |conn| {
            SqliteAgendaRepository::try_new(conn)?.get_agenda(id)
        })
    }

    pub fn list_agendas_for_user(
        &self,
        user_id: UserId,
        query: &AgendaListQuery,
    ) -> RepoResult<Vec<Agenda>> {
        self.with_conn("list_agendas_for_user", |conn| {
            SqliteAgendaRepository::try_new(conn)?.list_agendas_for_user(user_id, query)
        })
    }

    pub fn list_accessible_agendas(&self, excluding_user_id: UserId) -> RepoResult<Vec<Agenda>> {
        self.with_conn("list_accessible_agendas", |conn| {
            SqliteAgendaRepository::try_new(conn)?.list_accessible_agendas(excluding_user_id)
        })
    }

    pub fn update_agenda(
        &self,
        id: AgendaId,
        requesting_user_id: UserId,
        changes: &AgendaUpdate,
    ) -> RepoResult<Agenda> {
        self.with_tx("update_agenda", |conn| {
            SqliteAgendaRepository::try_new(conn)?.update_agenda(id, requesting_user_id, changes)
        })
    }

    pub fn delete_agenda(&self, id: AgendaId, requesting_user_id: UserId) -> RepoResult<()> {
        self.with_tx("delete_agenda", |conn| {
            SqliteAgendaRepository::try_new(conn)?.delete_agenda(id, requesting_user_id)
        })
    }

    // Use cases

    /// Creates a user holding `default_role` in one transaction.
    pub fn register(&self, new_user: &NewUser, default_role: &str) -> RepoResult<UserDetails> {
        self.with_tx("register", |conn| {
            account_service(conn)?.register(new_user, default_role)
        })
    }

    pub fn grant_role(&self, username: &str, role_name: &str) -> RepoResult<Role> {
        self.with_tx("grant_role", |conn| {
            account_service(conn)?.grant_role(username, role_name)
        })
    }

    pub fn ban(&self, username: &str) -> RepoResult<()> {
        self.with_conn("ban", |conn| account_service(conn)?.ban(username))
    }

    pub fn unban(&self, username: &str) -> RepoResult<()> {
        self.with_conn("unban", |conn| account_service(conn)?.unban(username))
    }

    pub fn details(&self, username: &str) -> RepoResult<Option<UserDetails>> {
        self.with_conn("details", |conn| account_service(conn)?.details(username))
    }

    pub fn weekly_schedule(&self, user_id: UserId) -> RepoResult<WeeklySchedule> {
        self.with_read_tx("weekly_schedule", |conn| {
            agenda_service(conn)?.weekly_schedule(user_id)
        })
    }

    pub fn shared_schedule(&self, viewer_id: UserId) -> RepoResult<Vec<SharedAgendas>> {
        self.with_read_tx("shared_schedule", |conn| {
            agenda_service(conn)?.shared_schedule(viewer_id)
        })
    }
}

fn account_service(conn: &Connection) -> RepoResult<SqliteAccountService<'_>> {
    Ok(AccountService::new(
        SqliteUserRepository::try_new(conn)?,
        SqliteRoleRepository::try_new(conn)?,
    ))
}

fn agenda_service(conn: &Connection) -> RepoResult<SqliteAgendaService<'_>> {
    Ok(AgendaService::new(
        SqliteAgendaRepository::try_new(conn)?,
        SqliteUserRepository::try_new(conn)?,
    ))
}

fn log_outcome<T>(op: &'static str, started_at: Instant, result: &RepoResult<T>) {
    let duration_ms = started_at.elapsed().as_millis();
    match result {
        Ok(_) => debug!("event={op} module=store status=ok duration_ms={duration_ms}"),
        Err(err) => warn!(
            "event={op} module=store status=error duration_ms={duration_ms} error_code={}",
            err.code()
        ),
    }
}
