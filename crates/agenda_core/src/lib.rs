//! Relational storage core for users, roles and weekly agenda entries.
//! This crate is the single source of truth for storage invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod store;

pub use config::{ConfigError, DatabaseLocation, LoggingConfig, StoreConfig};
pub use logging::{default_log_level, init_logging, init_logging_with, logging_status};
pub use model::agenda::{Agenda, AgendaId, AgendaUpdate, NewAgenda, Weekday};
pub use model::role::{Role, RoleId, ROLE_ADMIN, ROLE_USER};
pub use model::user::{NewUser, User, UserDetails, UserId};
pub use model::validation::ValidationError;
pub use repo::agenda_repo::{AgendaListQuery, AgendaRepository, SqliteAgendaRepository};
pub use repo::role_repo::{RoleRepository, SqliteRoleRepository};
pub use repo::user_repo::{SqliteUserRepository, UserRepository};
pub use repo::{RepoError, RepoResult};
pub use service::account_service::AccountService;
pub use service::agenda_service::{AgendaService, DaySchedule, SharedAgendas, WeeklySchedule};
pub use store::{AgendaStore, StoreError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
