//! Deletion orchestration over the association graph.
//!
//! # Responsibility
//! - Resolve every record affected by deleting a root record.
//! - Apply cascade, restrict and detach policies as one unit.
//!
//! # Invariants
//! - A restricted plan performs no writes.
//! - Callers run `apply` inside the transaction that planned it.

pub mod orchestrator;
pub mod plan;

pub use orchestrator::DeletionOrchestrator;
pub use plan::{DeletionPlan, Detachment, PlanOutcome, RestrictedDeletion};
