//! Schema registry: entities, fields, rules and associations.
//!
//! # Responsibility
//! - Hold the single declaration of every field, validation rule and
//!   association deletion policy.
//! - Stay behavior-free; validation, deletion and storage read from it.
//!
//! # Invariants
//! - Changing an association policy happens in `catalog` only.

pub mod association;
mod catalog;
pub mod registry;

pub use association::{Association, Cardinality, DeletePolicy, JoinTarget};
pub use registry::{
    EntitySchema, FieldKind, FieldSpec, FormatPattern, Registry, RegistryError, Rule, RulePhase,
};
