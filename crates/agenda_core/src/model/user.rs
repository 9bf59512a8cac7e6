//! User records.
//!
//! # Invariants
//! - `email` and `username` are unique across all users.
//! - `password` holds an already-hashed credential; this crate never hashes
//!   or compares it.
//! - `enabled=false` marks a banned account.

use crate::model::agenda::Agenda;
use crate::model::role::Role;
use crate::model::validation::{require_text, ValidationError};
use serde::{Deserialize, Serialize};

/// Storage-assigned user identifier.
pub type UserId = i32;

/// Persisted user row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub enabled: bool,
    pub email: String,
    /// External login key.
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password: String,
}

/// Input for creating a user.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    /// Pre-hashed credential.
    pub password: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl NewUser {
    /// Creates an enabled user input.
    pub fn new(
        email: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            username: username.into(),
            password: password.into(),
            enabled: true,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Checks required fields before persistence.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("email", &self.email)?;
        require_text("username", &self.username)?;
        require_text("password", &self.password)?;
        Ok(())
    }
}

/// A user joined with its roles and agendas.
///
/// Only produced by explicit detail lookups; plain user reads never load
/// relationships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserDetails {
    pub user: User,
    /// Sorted by role name.
    pub roles: Vec<Role>,
    /// Sorted by weekday, time, id.
    pub agendas: Vec<Agenda>,
}

impl UserDetails {
    pub fn has_role(&self, name: &str) -> bool {
        self.roles.iter().any(|role| role.name == name)
    }
}
