//! Persistence core for course management.
//! Schools, terms, courses, lessons, readings, assignments and their members,
//! with registry-declared validation and deletion policies.

pub mod config;
pub mod db;
pub mod deletion;
pub mod logging;
pub mod model;
pub mod repo;
pub mod schema;
pub mod service;
pub mod validation;

pub use config::{ConfigError, CoreConfig};
pub use db::{open_configured_db, open_db, open_db_in_memory, DbError, DbResult};
pub use deletion::{
    DeletionOrchestrator, DeletionPlan, Detachment, PlanOutcome, RestrictedDeletion,
};
pub use logging::{default_log_level, init_logging, init_logging_from_config};
pub use model::record::{
    field_map, EntityType, FieldMap, FieldValue, Record, RecordId, RecordRef,
};
pub use model::user::{User, UserIdentity, UserRole};
pub use repo::query::{
    FieldFilter, ReadingOrder, ReadingPhase, ReadingQuery, RecordQuery, SortDirection,
};
pub use repo::record_store::{RecordStore, RepoError, RepoResult, SqliteRecordStore};
pub use schema::{Association, Cardinality, DeletePolicy, Registry};
pub use service::record_service::{DestroyOutcome, RecordService};
pub use validation::{FailureKind, LifecyclePhase, RuleFailure, ValidationError, Validator};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
