//! Generic record shape shared by every course-management entity.
//!
//! # Responsibility
//! - Name the entity types known to core and their storage tables.
//! - Carry caller-supplied field maps through validation and persistence.
//!
//! # Invariants
//! - `Record::id` is assigned on construction and never changes afterwards.
//! - Field names are plain column names; the schema registry decides which
//!   names are legal for a given entity.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Surrogate identifier for every persisted record.
pub type RecordId = Uuid;

/// Field values keyed by field name.
pub type FieldMap = BTreeMap<String, FieldValue>;

static NULL_VALUE: FieldValue = FieldValue::Null;

/// Entity types persisted by the course-management core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    School,
    Term,
    Course,
    Lesson,
    Reading,
    Assignment,
    /// Instructors and students share one entity type.
    User,
    /// Join record between a course and an instructor user.
    CourseInstructor,
    /// Join record between a course and a student user.
    CourseStudent,
}

impl EntityType {
    /// Every entity type, in parent-before-child order.
    pub const ALL: [EntityType; 9] = [
        EntityType::School,
        EntityType::Term,
        EntityType::Course,
        EntityType::Lesson,
        EntityType::Reading,
        EntityType::Assignment,
        EntityType::User,
        EntityType::CourseInstructor,
        EntityType::CourseStudent,
    ];

    /// Stable snake_case name used in logs and diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::School => "school",
            Self::Term => "term",
            Self::Course => "course",
            Self::Lesson => "lesson",
            Self::Reading => "reading",
            Self::Assignment => "assignment",
            Self::User => "user",
            Self::CourseInstructor => "course_instructor",
            Self::CourseStudent => "course_student",
        }
    }

    /// Backing table name.
    pub fn table_name(self) -> &'static str {
        match self {
            Self::School => "schools",
            Self::Term => "terms",
            Self::Course => "courses",
            Self::Lesson => "lessons",
            Self::Reading => "readings",
            Self::Assignment => "assignments",
            Self::User => "users",
            Self::CourseInstructor => "course_instructors",
            Self::CourseStudent => "course_students",
        }
    }
}

impl Display for EntityType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One already-parsed field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Null,
    Text(String),
    Integer(i64),
    Real(f64),
    Boolean(bool),
    /// Identifier of another record.
    Reference(RecordId),
}

impl FieldValue {
    /// Null and whitespace-only text count as blank.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(value) => value.trim().is_empty(),
            _ => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            Self::Real(value) => Some(*value),
            Self::Integer(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<RecordId> {
        match self {
            Self::Reference(value) => Some(*value),
            _ => None,
        }
    }

    /// Short kind label for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Text(_) => "text",
            Self::Integer(_) => "integer",
            Self::Real(_) => "real",
            Self::Boolean(_) => "boolean",
            Self::Reference(_) => "reference",
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<Uuid> for FieldValue {
    fn from(value: Uuid) -> Self {
        Self::Reference(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Builds a field map from `(name, value)` pairs.
pub fn field_map<'a, I>(entries: I) -> FieldMap
where
    I: IntoIterator<Item = (&'a str, FieldValue)>,
{
    entries
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

/// Typed pointer to one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordRef {
    pub entity: EntityType,
    pub id: RecordId,
}

impl RecordRef {
    pub fn new(entity: EntityType, id: RecordId) -> Self {
        Self { entity, id }
    }
}

impl Display for RecordRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.entity, self.id)
    }
}

/// One entity instance with its field values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub entity: EntityType,
    pub fields: FieldMap,
}

impl Record {
    /// Creates an unsaved record with a freshly generated id.
    pub fn new(entity: EntityType, fields: FieldMap) -> Self {
        Self::with_id(Uuid::new_v4(), entity, fields)
    }

    /// Creates a record with a caller-provided id (storage read path).
    pub fn with_id(id: RecordId, entity: EntityType, fields: FieldMap) -> Self {
        Self { id, entity, fields }
    }

    pub fn reference(&self) -> RecordRef {
        RecordRef::new(self.entity, self.id)
    }

    /// Returns the field value, or `Null` when the field is absent.
    pub fn get(&self, field: &str) -> &FieldValue {
        self.fields.get(field).unwrap_or(&NULL_VALUE)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field).as_text()
    }

    pub fn integer(&self, field: &str) -> Option<i64> {
        self.get(field).as_integer()
    }

    pub fn boolean(&self, field: &str) -> Option<bool> {
        self.get(field).as_bool()
    }

    pub fn reference_to(&self, field: &str) -> Option<RecordId> {
        self.get(field).as_reference()
    }

    /// Unsaved copy with a new id and the same field values.
    pub fn duplicate(&self) -> Self {
        Self::new(self.entity, self.fields.clone())
    }
}
