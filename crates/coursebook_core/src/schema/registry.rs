//! Entity schemas, validation rule declarations and the registry holding them.
//!
//! # Responsibility
//! - Describe fields, rules and associations as data.
//! - Reject internally inconsistent schema declarations at construction.
//!
//! # Invariants
//! - Every association foreign key is a `Reference` field on the child that
//!   targets the association parent.
//! - Every rule names a declared field.

use crate::model::record::{EntityType, FieldValue};
use crate::schema::association::{Association, Cardinality};
use crate::schema::catalog::course_catalog;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

static DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\A(?<year>[0-9]{4})-(?<month>[0-9]{2})-(?<day>[0-9]{2})\z")
        .expect("valid date regex")
});
// ASCII only: `\w` and `(?i)` would otherwise admit non-ASCII letters.
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\A[A-Za-z0-9_+\-.]+@[A-Za-z0-9\-.]+\.[A-Za-z]+\z").expect("valid email regex")
});
static HTTP_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\A(http|https)://\S+").expect("valid url regex"));
static COURSE_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\A[a-zA-Z]{3}[0-9]{3}\z").expect("valid course code regex"));

static STANDARD_REGISTRY: Lazy<Registry> =
    Lazy::new(|| course_catalog().expect("course catalog schema is consistent"));

/// Semantic type of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Real,
    Boolean,
    /// `YYYY-MM-DD` text.
    Date,
    /// Epoch milliseconds.
    Timestamp,
    Reference(EntityType),
}

impl FieldKind {
    /// Whether `value` is an acceptable value for this kind. Null always is.
    pub fn accepts(self, value: &FieldValue) -> bool {
        match (self, value) {
            (_, FieldValue::Null) => true,
            (Self::Text, FieldValue::Text(_)) => true,
            (Self::Integer | Self::Timestamp, FieldValue::Integer(_)) => true,
            (Self::Real, FieldValue::Real(value)) => value.is_finite(),
            (Self::Real, FieldValue::Integer(_)) => true,
            (Self::Boolean, FieldValue::Boolean(_)) => true,
            (Self::Date, FieldValue::Text(text)) => is_calendar_date(text),
            (Self::Reference(_), FieldValue::Reference(_)) => true,
            _ => false,
        }
    }

    /// Value stored when a create request omits the field.
    pub fn default_value(self) -> FieldValue {
        match self {
            Self::Boolean => FieldValue::Boolean(false),
            _ => FieldValue::Null,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Timestamp => "timestamp",
            Self::Reference(_) => "reference",
        }
    }
}

/// `YYYY-MM-DD` naming a real day of the proleptic Gregorian calendar.
fn is_calendar_date(text: &str) -> bool {
    let Some(caps) = DATE_RE.captures(text) else {
        return false;
    };
    let part = |name: &str| caps[name].parse::<u32>().unwrap_or(0);
    let (year, month, day) = (part("year"), part("month"), part("day"));
    let leap = (year % 4 == 0 && year % 100 != 0) || year % 400 == 0;
    let days_in_month = match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if leap => 29,
        2 => 28,
        _ => return false,
    };
    (1..=days_in_month).contains(&day)
}

/// One declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind }
    }
}

/// Named text patterns used by format rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatPattern {
    Email,
    HttpUrl,
    CourseCode,
}

impl FormatPattern {
    pub fn regex(self) -> &'static Regex {
        match self {
            Self::Email => &EMAIL_RE,
            Self::HttpUrl => &HTTP_URL_RE,
            Self::CourseCode => &COURSE_CODE_RE,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::Email => "an email address",
            Self::HttpUrl => "an http(s) url",
            Self::CourseCode => "three letters followed by three digits",
        }
    }
}

/// When a rule is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RulePhase {
    Always,
    /// Only while the record is being created.
    OnCreate,
}

/// Declarative validation rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Field must be non-null and non-blank.
    Presence { field: &'static str },
    /// Non-blank field must match `pattern`.
    Format {
        field: &'static str,
        pattern: FormatPattern,
        phase: RulePhase,
    },
    /// Field must be unique, globally or among records sharing `scope`.
    Unique {
        field: &'static str,
        scope: Option<&'static str>,
    },
    /// `field` becomes required once `present` is non-blank.
    RequiredWhen {
        field: &'static str,
        present: &'static str,
    },
    /// Reference field must point at a user holding the instructor role.
    InstructorRole { field: &'static str },
}

impl Rule {
    /// Fields the rule reads.
    pub fn fields(&self) -> Vec<&'static str> {
        match *self {
            Self::Presence { field }
            | Self::Format { field, .. }
            | Self::InstructorRole { field } => vec![field],
            Self::Unique { field, scope } => std::iter::once(field).chain(scope).collect(),
            Self::RequiredWhen { field, present } => vec![field, present],
        }
    }
}

/// Fields and rules of one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySchema {
    pub entity: EntityType,
    pub fields: Vec<FieldSpec>,
    pub rules: Vec<Rule>,
}

impl EntitySchema {
    pub fn new(entity: EntityType, fields: Vec<FieldSpec>, rules: Vec<Rule>) -> Self {
        Self {
            entity,
            fields,
            rules,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|spec| spec.name == name)
    }

    pub fn table_name(&self) -> &'static str {
        self.entity.table_name()
    }
}

/// Schema declaration inconsistencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    DuplicateEntity(EntityType),
    DuplicateField {
        entity: EntityType,
        field: &'static str,
    },
    DuplicateAssociation(&'static str),
    UnknownEntity {
        context: String,
        entity: EntityType,
    },
    UnknownRuleField {
        entity: EntityType,
        field: &'static str,
    },
    /// Foreign key is missing or does not reference the expected entity.
    InvalidForeignKey {
        association: &'static str,
        field: &'static str,
    },
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateEntity(entity) => write!(f, "entity `{entity}` declared twice"),
            Self::DuplicateField { entity, field } => {
                write!(f, "field `{field}` declared twice on `{entity}`")
            }
            Self::DuplicateAssociation(name) => write!(f, "association `{name}` declared twice"),
            Self::UnknownEntity { context, entity } => {
                write!(f, "{context} refers to unregistered entity `{entity}`")
            }
            Self::UnknownRuleField { entity, field } => {
                write!(f, "rule on `{entity}` refers to undeclared field `{field}`")
            }
            Self::InvalidForeignKey { association, field } => write!(
                f,
                "association `{association}` foreign key `{field}` is not a reference to its parent"
            ),
        }
    }
}

impl Error for RegistryError {}

/// Static description of every entity and association.
#[derive(Debug, Clone)]
pub struct Registry {
    entities: BTreeMap<EntityType, EntitySchema>,
    associations: Vec<Association>,
}

impl Registry {
    /// Builds a registry after checking declarations against each other.
    pub fn new(
        entities: Vec<EntitySchema>,
        associations: Vec<Association>,
    ) -> Result<Self, RegistryError> {
        let mut by_type = BTreeMap::new();
        for schema in entities {
            let mut seen = HashSet::new();
            for spec in &schema.fields {
                if !seen.insert(spec.name) {
                    return Err(RegistryError::DuplicateField {
                        entity: schema.entity,
                        field: spec.name,
                    });
                }
            }
            for rule in &schema.rules {
                if let Some(field) = rule.fields().into_iter().find(|f| !seen.contains(f)) {
                    return Err(RegistryError::UnknownRuleField {
                        entity: schema.entity,
                        field,
                    });
                }
            }
            let entity = schema.entity;
            if by_type.insert(entity, schema).is_some() {
                return Err(RegistryError::DuplicateEntity(entity));
            }
        }

        for schema in by_type.values() {
            for spec in &schema.fields {
                if let FieldKind::Reference(target) = spec.kind {
                    if !by_type.contains_key(&target) {
                        return Err(RegistryError::UnknownEntity {
                            context: format!("field `{}.{}`", schema.entity, spec.name),
                            entity: target,
                        });
                    }
                }
            }
        }

        let mut names = HashSet::new();
        for association in &associations {
            if !names.insert(association.name) {
                return Err(RegistryError::DuplicateAssociation(association.name));
            }
            for entity in [association.parent, association.child] {
                if !by_type.contains_key(&entity) {
                    return Err(RegistryError::UnknownEntity {
                        context: format!("association `{}`", association.name),
                        entity,
                    });
                }
            }
            let links_parent = by_type
                .get(&association.child)
                .and_then(|child| child.field(association.foreign_key))
                .is_some_and(|spec| spec.kind == FieldKind::Reference(association.parent));
            if !links_parent {
                return Err(RegistryError::InvalidForeignKey {
                    association: association.name,
                    field: association.foreign_key,
                });
            }
            if let Some(far) = association.far_side {
                let links_far = by_type
                    .get(&association.child)
                    .and_then(|child| child.field(far.foreign_key))
                    .is_some_and(|spec| spec.kind == FieldKind::Reference(far.entity));
                if !links_far {
                    return Err(RegistryError::InvalidForeignKey {
                        association: association.name,
                        field: far.foreign_key,
                    });
                }
            }
        }

        Ok(Self {
            entities: by_type,
            associations,
        })
    }

    /// The course-management registry used by default.
    pub fn standard() -> &'static Registry {
        &STANDARD_REGISTRY
    }

    pub fn schema(&self, entity: EntityType) -> Option<&EntitySchema> {
        self.entities.get(&entity)
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntitySchema> {
        self.entities.values()
    }

    pub fn associations(&self) -> &[Association] {
        &self.associations
    }

    pub fn association(&self, name: &str) -> Option<&Association> {
        self.associations.iter().find(|edge| edge.name == name)
    }

    /// Edges where `entity` is the parent, in declaration order.
    pub fn children_of(&self, entity: EntityType) -> impl Iterator<Item = &Association> {
        self.associations
            .iter()
            .filter(move |edge| edge.parent == entity)
    }

    /// Every edge touching `entity`, tagged with its multiplicity from there.
    pub fn outgoing(&self, entity: EntityType) -> Vec<(Cardinality, &Association)> {
        self.associations
            .iter()
            .filter_map(|edge| edge.cardinality_from(entity).map(|c| (c, edge)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{EntitySchema, FieldKind, FieldSpec, FormatPattern, Registry, RegistryError};
    use crate::model::record::{EntityType, FieldValue};
    use crate::schema::association::{Association, Cardinality, DeletePolicy};

    #[test]
    fn standard_registry_covers_every_entity() {
        let registry = Registry::standard();
        for entity in EntityType::ALL {
            assert!(registry.schema(entity).is_some(), "{entity} not registered");
        }
    }

    #[test]
    fn course_edges_carry_expected_policies() {
        let registry = Registry::standard();
        let policies: Vec<(EntityType, DeletePolicy)> = registry
            .children_of(EntityType::Course)
            .map(|edge| (edge.child, edge.policy))
            .collect();
        assert_eq!(
            policies,
            vec![
                (EntityType::Lesson, DeletePolicy::Cascade),
                (EntityType::Assignment, DeletePolicy::Cascade),
                (EntityType::CourseInstructor, DeletePolicy::Cascade),
                (EntityType::CourseStudent, DeletePolicy::Restrict),
            ]
        );
    }

    #[test]
    fn outgoing_tags_cardinality_per_endpoint() {
        let registry = Registry::standard();
        let course_edges = registry.outgoing(EntityType::Course);
        assert!(course_edges.iter().any(|(cardinality, edge)| {
            edge.child == EntityType::CourseStudent
                && *cardinality
                    == Cardinality::ManyToManyViaJoin {
                        join: EntityType::CourseStudent,
                        far: EntityType::User,
                    }
        }));
        assert!(course_edges.iter().any(|(cardinality, edge)| {
            edge.parent == EntityType::Term && *cardinality == Cardinality::ManyToOne
        }));
    }

    #[test]
    fn rejects_foreign_key_pointing_elsewhere() {
        let entities = vec![
            EntitySchema::new(
                EntityType::School,
                vec![FieldSpec::new("name", FieldKind::Text)],
                vec![],
            ),
            EntitySchema::new(
                EntityType::Term,
                vec![FieldSpec::new("name", FieldKind::Text)],
                vec![],
            ),
        ];
        let edges = vec![Association::new(
            "terms",
            EntityType::School,
            EntityType::Term,
            "name",
            DeletePolicy::Cascade,
        )];
        let err = Registry::new(entities, edges).unwrap_err();
        assert_eq!(
            err,
            RegistryError::InvalidForeignKey {
                association: "terms",
                field: "name"
            }
        );
    }

    #[test]
    fn date_kind_requires_iso_shape() {
        assert!(FieldKind::Date.accepts(&FieldValue::from("2024-09-01")));
        assert!(!FieldKind::Date.accepts(&FieldValue::from("Sept 1")));
        assert!(FieldKind::Real.accepts(&FieldValue::Integer(40)));
        assert!(!FieldKind::Text.accepts(&FieldValue::Integer(33)));
    }

    #[test]
    fn date_kind_rejects_impossible_days() {
        for text in ["2024-99-99", "2024-00-10", "2024-04-31", "2023-02-29", "2024-01-00"] {
            assert!(!FieldKind::Date.accepts(&FieldValue::from(text)), "{text}");
        }
        assert!(FieldKind::Date.accepts(&FieldValue::from("2024-02-29")));
        assert!(FieldKind::Date.accepts(&FieldValue::from("2000-02-29")));
        assert!(!FieldKind::Date.accepts(&FieldValue::from("1900-02-29")));
        assert!(!FieldKind::Date.accepts(&FieldValue::from("２０24-01-01")));
    }

    #[test]
    fn real_kind_rejects_non_finite_values() {
        assert!(FieldKind::Real.accepts(&FieldValue::Real(12.5)));
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(!FieldKind::Real.accepts(&FieldValue::Real(value)));
        }
    }

    #[test]
    fn format_patterns_match_known_examples() {
        assert!(FormatPattern::CourseCode.regex().is_match("abc321"));
        assert!(!FormatPattern::CourseCode.regex().is_match("/\\A[a-zA-Z]{3},[0-9]{3}\\z"));
        assert!(FormatPattern::HttpUrl.regex().is_match("https://sugarbeanfarm.com"));
        assert!(!FormatPattern::HttpUrl.regex().is_match("www.sugarbeanfarm.com"));
        assert!(FormatPattern::Email.regex().is_match("Grace.Hopper@Navy.mil"));
        assert!(!FormatPattern::Email.regex().is_match("grace@localhost"));
        assert!(!FormatPattern::Email.regex().is_match("jösé@x.com"));
        assert!(!FormatPattern::Email.regex().is_match("jose@exämple.com"));
    }
}
