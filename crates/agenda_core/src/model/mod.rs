//! Domain model for the agenda store.
//!
//! # Responsibility
//! - Define the persisted records (`User`, `Role`, `Agenda`) and their
//!   insert/update inputs.
//! - Own field-level validation that runs before any SQL.
//!
//! # Invariants
//! - Relationships are expressed as foreign-key ids, never as nested
//!   records. Joined views (`UserDetails`) are assembled explicitly.
//! - Ids are assigned by storage; input records carry no id.

pub mod agenda;
pub mod role;
pub mod user;
pub mod validation;
