//! Validation engine over registry-declared rules.
//!
//! # Responsibility
//! - Normalize caller input to the declared field kinds.
//! - Evaluate presence, format, uniqueness, contextual and role rules.
//!
//! # Invariants
//! - A record that fails any rule is never written.

pub mod engine;
pub mod normalize;

pub use engine::{FailureKind, LifecyclePhase, RuleFailure, ValidationError, Validator};
pub use normalize::{normalize_input, with_defaults};
