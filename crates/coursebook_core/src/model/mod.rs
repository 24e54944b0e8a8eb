//! Domain model for course-management records.
//!
//! # Responsibility
//! - Define the generic record shape passed between façade, validation and
//!   storage.
//! - Provide role-typed projections where callers need more than a field map.
//!
//! # Invariants
//! - Every record is identified by a stable `RecordId`.
//! - Deletion is physical; the deletion orchestrator decides what goes with it.

pub mod record;
pub mod user;
