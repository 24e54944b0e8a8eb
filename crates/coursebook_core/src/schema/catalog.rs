//! Course-management schema declarations.
//!
//! Association policies live here and nowhere else. Students restrict course
//! deletion while instructor links cascade; keep that asymmetry.

use crate::model::record::EntityType;
use crate::schema::association::{Association, DeletePolicy};
use crate::schema::registry::{
    EntitySchema, FieldKind, FieldSpec, FormatPattern, Registry, RegistryError, Rule, RulePhase,
};

use EntityType::{
    Assignment, Course, CourseInstructor, CourseStudent, Lesson, Reading, School, Term, User,
};
use FieldKind::{Boolean, Date, Integer, Real, Reference, Text, Timestamp};

const ASSOCIATIONS: &[Association] = &[
    Association::new("school_terms", School, Term, "school_id", DeletePolicy::Cascade),
    Association::new("term_courses", Term, Course, "term_id", DeletePolicy::Cascade),
    Association::new("course_lessons", Course, Lesson, "course_id", DeletePolicy::Cascade),
    Association::new("course_assignments", Course, Assignment, "course_id", DeletePolicy::Cascade),
    Association::new(
        "course_instructors",
        Course,
        CourseInstructor,
        "course_id",
        DeletePolicy::Cascade,
    )
    .through_join(User, "instructor_id"),
    Association::new(
        "course_students",
        Course,
        CourseStudent,
        "course_id",
        DeletePolicy::Restrict,
    )
    .through_join(User, "student_id"),
    Association::new("lesson_readings", Lesson, Reading, "lesson_id", DeletePolicy::Cascade),
    Association::new(
        "pre_class_lessons",
        Assignment,
        Lesson,
        "pre_class_assignment_id",
        DeletePolicy::Detach,
    ),
    Association::new(
        "in_class_lessons",
        Assignment,
        Lesson,
        "in_class_assignment_id",
        DeletePolicy::Detach,
    ),
    Association::new(
        "instructor_courses",
        User,
        CourseInstructor,
        "instructor_id",
        DeletePolicy::Cascade,
    )
    .through_join(Course, "course_id"),
    Association::new(
        "student_courses",
        User,
        CourseStudent,
        "student_id",
        DeletePolicy::Cascade,
    )
    .through_join(Course, "course_id"),
];

fn presence(fields: &[&'static str]) -> Vec<Rule> {
    fields
        .iter()
        .map(|&field| Rule::Presence { field })
        .collect()
}

/// Builds the registry describing schools, terms, courses and their members.
pub(crate) fn course_catalog() -> Result<Registry, RegistryError> {
    let entities = vec![
        EntitySchema::new(
            School,
            vec![FieldSpec::new("name", Text)],
            presence(&["name"]),
        ),
        EntitySchema::new(
            Term,
            vec![
                FieldSpec::new("name", Text),
                FieldSpec::new("starts_on", Date),
                FieldSpec::new("ends_on", Date),
                FieldSpec::new("school_id", Reference(School)),
            ],
            presence(&["name", "starts_on", "ends_on", "school_id"]),
        ),
        EntitySchema::new(
            Course,
            vec![
                FieldSpec::new("name", Text),
                FieldSpec::new("course_code", Text),
                FieldSpec::new("term_id", Reference(Term)),
            ],
            [
                presence(&["name"]),
                vec![Rule::Format {
                    field: "course_code",
                    pattern: FormatPattern::CourseCode,
                    phase: RulePhase::Always,
                }],
            ]
            .concat(),
        ),
        EntitySchema::new(
            Lesson,
            vec![
                FieldSpec::new("name", Text),
                FieldSpec::new("description", Text),
                FieldSpec::new("outline", Text),
                FieldSpec::new("lead_in_question", Text),
                FieldSpec::new("slide_html", Text),
                FieldSpec::new("course_id", Reference(Course)),
                FieldSpec::new("pre_class_assignment_id", Reference(Assignment)),
                FieldSpec::new("in_class_assignment_id", Reference(Assignment)),
            ],
            presence(&["name"]),
        ),
        EntitySchema::new(
            Reading,
            vec![
                FieldSpec::new("order_number", Integer),
                FieldSpec::new("lesson_id", Reference(Lesson)),
                FieldSpec::new("url", Text),
                FieldSpec::new("caption", Text),
                FieldSpec::new("before_lesson", Boolean),
            ],
            [
                presence(&["order_number", "lesson_id", "url"]),
                vec![Rule::Format {
                    field: "url",
                    pattern: FormatPattern::HttpUrl,
                    phase: RulePhase::OnCreate,
                }],
            ]
            .concat(),
        ),
        EntitySchema::new(
            Assignment,
            vec![
                FieldSpec::new("name", Text),
                FieldSpec::new("course_id", Reference(Course)),
                FieldSpec::new("percent_of_grade", Real),
                FieldSpec::new("active_at", Timestamp),
                FieldSpec::new("due_at", Timestamp),
                FieldSpec::new("grades_released", Boolean),
                FieldSpec::new("students_can_submit", Boolean),
                FieldSpec::new("maximum_grade", Real),
            ],
            [
                presence(&["name", "course_id"]),
                vec![
                    Rule::Unique {
                        field: "name",
                        scope: Some("course_id"),
                    },
                    Rule::RequiredWhen {
                        field: "percent_of_grade",
                        present: "course_id",
                    },
                ],
            ]
            .concat(),
        ),
        EntitySchema::new(
            User,
            vec![
                FieldSpec::new("first_name", Text),
                FieldSpec::new("last_name", Text),
                FieldSpec::new("email", Text),
                FieldSpec::new("photo_url", Text),
                FieldSpec::new("instructor", Boolean),
                FieldSpec::new("admin", Boolean),
            ],
            [
                presence(&["first_name", "last_name", "email"]),
                vec![
                    Rule::Format {
                        field: "email",
                        pattern: FormatPattern::Email,
                        phase: RulePhase::Always,
                    },
                    Rule::Unique {
                        field: "email",
                        scope: None,
                    },
                    Rule::Format {
                        field: "photo_url",
                        pattern: FormatPattern::HttpUrl,
                        phase: RulePhase::Always,
                    },
                ],
            ]
            .concat(),
        ),
        EntitySchema::new(
            CourseInstructor,
            vec![
                FieldSpec::new("course_id", Reference(Course)),
                FieldSpec::new("instructor_id", Reference(User)),
                FieldSpec::new("primary", Boolean),
            ],
            [
                presence(&["course_id", "instructor_id"]),
                vec![Rule::InstructorRole {
                    field: "instructor_id",
                }],
            ]
            .concat(),
        ),
        EntitySchema::new(
            CourseStudent,
            vec![
                FieldSpec::new("course_id", Reference(Course)),
                FieldSpec::new("student_id", Reference(User)),
            ],
            presence(&["course_id", "student_id"]),
        ),
    ];

    Registry::new(entities, ASSOCIATIONS.to_vec())
}
