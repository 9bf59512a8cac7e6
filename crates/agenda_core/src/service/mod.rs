//! Use-case services composed from repositories.
//!
//! # Responsibility
//! - Orchestrate multi-repository use cases (registration, schedules).
//! - Stay storage-agnostic: services only see repository traits.
//!
//! # Invariants
//! - Services never bypass repository validation.
//! - Atomicity of multi-step writes is the caller's transaction boundary
//!   (see `store::AgendaStore`).

pub mod account_service;
pub mod agenda_service;
