//! Field validation shared by all records.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// A field value that can never be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required text field is empty or whitespace only.
    BlankField(&'static str),
    /// Agenda time is not a `HH:MM` clock time.
    InvalidTime(String),
    /// Day name is not one of MONDAY..SUNDAY.
    UnknownWeekday(String),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankField(field) => write!(f, "field `{field}` must not be blank"),
            Self::InvalidTime(value) => write!(f, "time `{value}` is not in HH:MM format"),
            Self::UnknownWeekday(value) => write!(f, "unknown day of week `{value}`"),
        }
    }
}

impl Error for ValidationError {}

pub(crate) fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::BlankField(field));
    }
    Ok(())
}
