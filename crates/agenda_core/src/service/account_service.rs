//! Account use-case service.
//!
//! # Responsibility
//! - Register users with a default role.
//! - Ban/unban accounts and resolve login details.

use crate::model::role::Role;
use crate::model::user::{NewUser, UserDetails};
use crate::repo::role_repo::RoleRepository;
use crate::repo::user_repo::UserRepository;
use crate::repo::{RepoError, RepoResult};

/// Account service over user and role repositories.
pub struct AccountService<U: UserRepository, R: RoleRepository> {
    users: U,
    roles: R,
}

impl<U: UserRepository, R: RoleRepository> AccountService<U, R> {
    pub fn new(users: U, roles: R) -> Self {
        Self { users, roles }
    }

    /// Creates a user and grants `default_role`, creating the role on first
    /// use.
    ///
    /// # Contract
    /// - Not atomic by itself: run inside one transaction so a failed step
    ///   leaves no user or role behind.
    /// - A fresh account has no agendas, so the returned details are built
    ///   from the writes without a read-back join.
    pub fn register(&self, new_user: &NewUser, default_role: &str) -> RepoResult<UserDetails> {
        let user = self.users.create_user(new_user)?;
        let role = self.ensure_role(default_role)?;
        self.roles.assign_role(user.id, role.id)?;

        Ok(UserDetails {
            user,
            roles: vec![role],
            agendas: Vec::new(),
        })
    }

    /// Finds a role by name or creates it.
    pub fn ensure_role(&self, name: &str) -> RepoResult<Role> {
        match self.roles.find_role_by_name(name)? {
            Some(role) => Ok(role),
            None => self.roles.create_role(name),
        }
    }

    /// Grants a role (created if missing) to the user with `username`.
    pub fn grant_role(&self, username: &str, role_name: &str) -> RepoResult<Role> {
        let user = self
            .users
            .find_user_by_username(username)?
            .ok_or_else(|| RepoError::not_found("user", username))?;
        let role = self.ensure_role(role_name)?;
        self.roles.assign_role(user.id, role.id)?;
        Ok(role)
    }

    /// Disables login for `username`.
    pub fn ban(&self, username: &str) -> RepoResult<()> {
        self.users.set_user_enabled(username, false)
    }

    /// Re-enables login for `username`.
    pub fn unban(&self, username: &str) -> RepoResult<()> {
        self.users.set_user_enabled(username, true)
    }

    /// Eager user lookup for the authentication collaborator.
    pub fn details(&self, username: &str) -> RepoResult<Option<UserDetails>> {
        self.users.find_user_details_by_username(username)
    }
}
