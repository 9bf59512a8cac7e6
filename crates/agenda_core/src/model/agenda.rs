//! Agenda (weekly calendar entry) records.
//!
//! # Responsibility
//! - Define the agenda row, its insert/update inputs and the weekday enum.
//! - Validate the `HH:MM` time format before persistence.
//!
//! # Invariants
//! - Every agenda belongs to exactly one existing user.
//! - `time` is a 24-hour clock time `HH:MM` (`00:00`..`23:59`).
//! - `day` is stored as its upper-case English name.

use crate::model::user::UserId;
use crate::model::validation::{require_text, ValidationError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

static TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([01][0-9]|2[0-3]):[0-5][0-9]$").expect("valid time regex"));

/// Storage-assigned agenda identifier.
pub type AgendaId = i64;

/// Day of the week an agenda repeats on.
///
/// Declaration order is calendar order starting Monday, so `Ord` sorts a
/// week the way it is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
        Weekday::Sunday,
    ];

    /// Stored textual name.
    pub fn as_str(self) -> &'static str {
        match self {
            Weekday::Monday => "MONDAY",
            Weekday::Tuesday => "TUESDAY",
            Weekday::Wednesday => "WEDNESDAY",
            Weekday::Thursday => "THURSDAY",
            Weekday::Friday => "FRIDAY",
            Weekday::Saturday => "SATURDAY",
            Weekday::Sunday => "SUNDAY",
        }
    }

    /// Zero-based position in the week, Monday first.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl Display for Weekday {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Weekday {
    type Err = ValidationError;

    /// Accepts the stored name in any letter case.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let upper = value.trim().to_ascii_uppercase();
        Weekday::ALL
            .into_iter()
            .find(|day| day.as_str() == upper)
            .ok_or_else(|| ValidationError::UnknownWeekday(value.to_string()))
    }
}

/// Persisted agenda row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agenda {
    pub id: AgendaId,
    /// Owning user.
    pub user_id: UserId,
    pub day: Weekday,
    /// `HH:MM`.
    pub time: String,
    /// Whether other users may see this entry.
    pub accessible: bool,
    pub note: String,
}

/// Input for creating an agenda.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewAgenda {
    pub user_id: UserId,
    pub day: Weekday,
    pub time: String,
    pub accessible: bool,
    pub note: String,
}

impl NewAgenda {
    pub fn new(
        user_id: UserId,
        day: Weekday,
        time: impl Into<String>,
        accessible: bool,
        note: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            day,
            time: time.into(),
            accessible,
            note: note.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_time(&self.time)?;
        require_text("note", &self.note)?;
        Ok(())
    }
}

/// Partial update of an agenda. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AgendaUpdate {
    pub day: Option<Weekday>,
    pub time: Option<String>,
    pub accessible: Option<bool>,
    pub note: Option<String>,
}

impl AgendaUpdate {
    pub fn is_empty(&self) -> bool {
        self.day.is_none() && self.time.is_none() && self.accessible.is_none() && self.note.is_none()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(time) = &self.time {
            validate_time(time)?;
        }
        if let Some(note) = &self.note {
            require_text("note", note)?;
        }
        Ok(())
    }

    /// Applies the changes onto a loaded row.
    pub fn apply_to(&self, agenda: &mut Agenda) {
        if let Some(day) = self.day {
            agenda.day = day;
        }
        if let Some(time) = &self.time {
            agenda.time = time.clone();
        }
        if let Some(accessible) = self.accessible {
            agenda.accessible = accessible;
        }
        if let Some(note) = &self.note {
            agenda.note = note.clone();
        }
    }
}

/// Checks that `value` is a `HH:MM` clock time.
pub fn validate_time(value: &str) -> Result<(), ValidationError> {
    if TIME_RE.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidTime(value.to_string()))
    }
}
