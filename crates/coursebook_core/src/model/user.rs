//! Role-typed view over `users` records.
//!
//! # Invariants
//! - The stored `instructor` flag is the only role discriminator.
//! - Identity fields are shared by every role.

use crate::model::record::{field_map, EntityType, FieldMap, Record, RecordId};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Role capability set of one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// May be linked to courses through `CourseInstructor`.
    Instructor,
    /// May be enrolled in courses through `CourseStudent`.
    Student,
}

impl UserRole {
    pub fn from_instructor_flag(instructor: bool) -> Self {
        if instructor {
            Self::Instructor
        } else {
            Self::Student
        }
    }

    pub fn is_instructor(self) -> bool {
        matches!(self, Self::Instructor)
    }

    pub fn can_teach(self) -> bool {
        self.is_instructor()
    }

    pub fn can_enroll(self) -> bool {
        matches!(self, Self::Student)
    }
}

/// Identity fields shared by instructors and students.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub photo_url: Option<String>,
    pub admin: bool,
}

impl UserIdentity {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
            photo_url: None,
            admin: false,
        }
    }
}

/// Persisted user projected into its role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: RecordId,
    pub identity: UserIdentity,
    pub role: UserRole,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.identity.first_name, self.identity.last_name)
    }

    /// Field map accepted by `create(EntityType::User, ..)`.
    pub fn fields_for(identity: &UserIdentity, role: UserRole) -> FieldMap {
        field_map([
            ("first_name", identity.first_name.as_str().into()),
            ("last_name", identity.last_name.as_str().into()),
            ("email", identity.email.as_str().into()),
            ("photo_url", identity.photo_url.as_deref().into()),
            ("admin", identity.admin.into()),
            ("instructor", role.is_instructor().into()),
        ])
    }
}

/// A record could not be projected into a `User`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserDecodeError {
    WrongEntity(EntityType),
    MissingField(&'static str),
}

impl Display for UserDecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WrongEntity(entity) => write!(f, "expected user record, got {entity}"),
            Self::MissingField(field) => write!(f, "user record is missing `{field}`"),
        }
    }
}

impl Error for UserDecodeError {}

impl TryFrom<&Record> for User {
    type Error = UserDecodeError;

    fn try_from(record: &Record) -> Result<Self, Self::Error> {
        if record.entity != EntityType::User {
            return Err(UserDecodeError::WrongEntity(record.entity));
        }

        let required = |field: &'static str| {
            record
                .text(field)
                .map(str::to_string)
                .ok_or(UserDecodeError::MissingField(field))
        };

        Ok(Self {
            id: record.id,
            identity: UserIdentity {
                first_name: required("first_name")?,
                last_name: required("last_name")?,
                email: required("email")?,
                photo_url: record.text("photo_url").map(str::to_string),
                admin: record.boolean("admin").unwrap_or(false),
            },
            role: UserRole::from_instructor_flag(record.boolean("instructor").unwrap_or(false)),
        })
    }
}
