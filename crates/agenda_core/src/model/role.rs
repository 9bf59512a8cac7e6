//! Role records.

use crate::model::validation::{require_text, ValidationError};
use serde::{Deserialize, Serialize};

/// Storage-assigned role identifier.
pub type RoleId = i32;

/// Role granted to every registered account.
pub const ROLE_USER: &str = "ROLE_USER";
/// Role allowed to ban and unban accounts.
pub const ROLE_ADMIN: &str = "ROLE_ADMIN";

/// Persisted role row. `name` is unique across roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
}

pub(crate) fn validate_role_name(name: &str) -> Result<(), ValidationError> {
    require_text("role", name)
}
