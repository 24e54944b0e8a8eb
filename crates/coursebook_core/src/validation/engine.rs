//! Rule evaluation for candidate records.
//!
//! # Responsibility
//! - Check field names and value kinds against the entity schema.
//! - Evaluate every declared rule for the lifecycle phase and collect all
//!   failures, not just the first.
//!
//! # Invariants
//! - Evaluation is read-only; the store is only queried.
//! - On-create rules are never evaluated for updates.

use crate::model::record::{EntityType, FieldValue, Record, RecordRef};
use crate::repo::query::FieldFilter;
use crate::repo::record_store::{RecordStore, RepoError, RepoResult};
use crate::schema::{EntitySchema, FieldKind, Registry, Rule, RulePhase};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Lifecycle phase of the write being validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Create,
    Update,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    MissingField,
    InvalidFormat,
    Duplicate,
    UnknownField,
    TypeMismatch,
    RoleMismatch,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingField => "missing_field",
            Self::InvalidFormat => "invalid_format",
            Self::Duplicate => "duplicate",
            Self::UnknownField => "unknown_field",
            Self::TypeMismatch => "type_mismatch",
            Self::RoleMismatch => "role_mismatch",
        }
    }
}

/// One failed rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleFailure {
    pub field: String,
    pub kind: FailureKind,
    pub message: String,
}

impl RuleFailure {
    fn new(field: impl Into<String>, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind,
            message: message.into(),
        }
    }
}

/// Every rule that rejected a candidate record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub entity: EntityType,
    pub failures: Vec<RuleFailure>,
}

impl ValidationError {
    pub fn failures(&self) -> &[RuleFailure] {
        &self.failures
    }

    /// Whether `field` failed with `kind`.
    pub fn has(&self, field: &str, kind: FailureKind) -> bool {
        self.failures
            .iter()
            .any(|failure| failure.field == field && failure.kind == kind)
    }

    pub fn fields(&self) -> Vec<&str> {
        self.failures
            .iter()
            .map(|failure| failure.field.as_str())
            .collect()
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let messages = self
            .failures
            .iter()
            .map(|failure| failure.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        write!(f, "{} is invalid: {messages}", self.entity)
    }
}

impl Error for ValidationError {}

/// Evaluates registry rules against candidate records.
pub struct Validator<'r> {
    registry: &'r Registry,
}

impl<'r> Validator<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    /// Returns `Err(RepoError::Validation)` carrying every failure, if any.
    pub fn validate(
        &self,
        store: &dyn RecordStore,
        candidate: &Record,
        phase: LifecyclePhase,
    ) -> RepoResult<()> {
        let failures = self.check(store, candidate, phase)?;
        if failures.is_empty() {
            return Ok(());
        }
        Err(ValidationError {
            entity: candidate.entity,
            failures,
        }
        .into())
    }

    /// Collects all failures. Storage errors abort evaluation.
    pub fn check(
        &self,
        store: &dyn RecordStore,
        candidate: &Record,
        phase: LifecyclePhase,
    ) -> RepoResult<Vec<RuleFailure>> {
        let schema = self
            .registry
            .schema(candidate.entity)
            .ok_or(RepoError::UnregisteredEntity(candidate.entity))?;

        let mut failures = check_field_kinds(schema, candidate);
        for rule in &schema.rules {
            if let Some(failure) = evaluate_rule(store, candidate, rule, phase)? {
                failures.push(failure);
            }
        }
        Ok(failures)
    }

    /// Fails with `NotFound` for the first non-null reference whose target
    /// record does not exist.
    pub fn ensure_references_exist(
        &self,
        store: &dyn RecordStore,
        candidate: &Record,
    ) -> RepoResult<()> {
        let schema = self
            .registry
            .schema(candidate.entity)
            .ok_or(RepoError::UnregisteredEntity(candidate.entity))?;

        for spec in &schema.fields {
            let FieldKind::Reference(target) = spec.kind else {
                continue;
            };
            if let Some(id) = candidate.reference_to(spec.name) {
                let reference = RecordRef::new(target, id);
                if !store.exists(reference)? {
                    return Err(RepoError::NotFound(reference));
                }
            }
        }
        Ok(())
    }
}

fn check_field_kinds(schema: &EntitySchema, candidate: &Record) -> Vec<RuleFailure> {
    let mut failures = Vec::new();
    for (name, value) in &candidate.fields {
        match schema.field(name) {
            None => failures.push(RuleFailure::new(
                name.as_str(),
                FailureKind::UnknownField,
                format!("{name} is not a field of {}", schema.entity),
            )),
            Some(spec) if !spec.kind.accepts(value) => failures.push(RuleFailure::new(
                name.as_str(),
                FailureKind::TypeMismatch,
                format!(
                    "{name} expects a {} value, got {}",
                    spec.kind.name(),
                    value.kind_name()
                ),
            )),
            Some(_) => {}
        }
    }
    failures
}

fn evaluate_rule(
    store: &dyn RecordStore,
    candidate: &Record,
    rule: &Rule,
    phase: LifecyclePhase,
) -> RepoResult<Option<RuleFailure>> {
    let failure = match *rule {
        Rule::Presence { field } => candidate.get(field).is_blank().then(|| {
            RuleFailure::new(field, FailureKind::MissingField, format!("{field} can't be blank"))
        }),
        Rule::Format {
            field,
            pattern,
            phase: rule_phase,
        } => {
            let applies = rule_phase == RulePhase::Always || phase == LifecyclePhase::Create;
            match candidate.get(field) {
                FieldValue::Text(text)
                    if applies && !text.trim().is_empty() && !pattern.regex().is_match(text) =>
                {
                    Some(RuleFailure::new(
                        field,
                        FailureKind::InvalidFormat,
                        format!("{field} must be {}", pattern.describe()),
                    ))
                }
                _ => None,
            }
        }
        Rule::Unique { field, scope } => {
            check_unique(store, candidate, field, scope)?.then(|| {
                RuleFailure::new(
                    field,
                    FailureKind::Duplicate,
                    format!("{field} has already been taken"),
                )
            })
        }
        Rule::RequiredWhen { field, present } => {
            let required = !candidate.get(present).is_blank();
            (required && candidate.get(field).is_blank()).then(|| {
                RuleFailure::new(
                    field,
                    FailureKind::MissingField,
                    format!("{field} is required once {present} is set"),
                )
            })
        }
        Rule::InstructorRole { field } => match candidate.reference_to(field) {
            Some(user_id) => {
                let user = store.get(RecordRef::new(EntityType::User, user_id))?;
                user.filter(|user| user.boolean("instructor") != Some(true))
                    .map(|_| {
                        RuleFailure::new(
                            field,
                            FailureKind::RoleMismatch,
                            format!("{field} must reference an instructor"),
                        )
                    })
            }
            None => None,
        },
    };
    Ok(failure)
}

/// Whether another persisted record already holds the value within scope.
fn check_unique(
    store: &dyn RecordStore,
    candidate: &Record,
    field: &'static str,
    scope: Option<&'static str>,
) -> RepoResult<bool> {
    let value = candidate.get(field);
    if value.is_blank() {
        return Ok(false);
    }

    let mut filters = vec![FieldFilter::new(field, value.clone())];
    if let Some(scope) = scope {
        let scope_value = candidate.get(scope);
        if scope_value.is_null() {
            return Ok(false);
        }
        filters.push(FieldFilter::new(scope, scope_value.clone()));
    }

    let ids = store.find_ids(candidate.entity, &filters)?;
    Ok(ids.into_iter().any(|id| id != candidate.id))
}
