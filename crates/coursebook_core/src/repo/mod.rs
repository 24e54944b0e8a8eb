//! Repository layer: storage contract and SQLite persistence.
//!
//! # Responsibility
//! - Define the storage collaborator contract (`RecordStore`).
//! - Isolate SQLite query details from validation and deletion logic.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`NotFound`, `StorageConflict`)
//!   in addition to DB transport errors.

#[cfg(test)]
pub(crate) mod memory_store;
pub mod query;
pub mod record_store;
