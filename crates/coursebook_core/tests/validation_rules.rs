use coursebook_core::{
    field_map, open_db_in_memory, EntityType, FailureKind, FieldMap, FieldValue, Record,
    RecordService, RepoError, UserIdentity, UserRole, ValidationError,
};
use rusqlite::Connection;
use uuid::Uuid;

#[test]
fn term_presence_is_satisfied_field_by_field() {
    let conn = open_db_in_memory().unwrap();
    let service = RecordService::try_new(&conn).unwrap();
    let school = create(&service, EntityType::School, field_map([("name", "S1".into())]));

    let err = validation_error(service.create(EntityType::Term, FieldMap::new()));
    assert_eq!(
        err.fields(),
        vec!["name", "starts_on", "ends_on", "school_id"]
    );

    let err = validation_error(
        service.create(EntityType::Term, field_map([("name", "Fall".into())])),
    );
    assert_eq!(err.fields(), vec!["starts_on", "ends_on", "school_id"]);

    let err = validation_error(service.create(
        EntityType::Term,
        field_map([
            ("name", "Fall".into()),
            ("starts_on", "2024-09-01".into()),
            ("ends_on", "2024-12-20".into()),
        ]),
    ));
    assert_eq!(err.fields(), vec!["school_id"]);
    assert!(err.has("school_id", FailureKind::MissingField));

    let term = service
        .create(
            EntityType::Term,
            field_map([
                ("name", "Fall".into()),
                ("starts_on", "2024-09-01".into()),
                ("ends_on", "2024-12-20".into()),
                ("school_id", school.id.into()),
            ]),
        )
        .unwrap();
    assert_eq!(term.reference_to("school_id"), Some(school.id));
}

#[test]
fn whitespace_only_text_counts_as_missing() {
    let conn = open_db_in_memory().unwrap();
    let service = RecordService::try_new(&conn).unwrap();

    let err = validation_error(
        service.create(EntityType::Lesson, field_map([("name", " \t ".into())])),
    );
    assert!(err.has("name", FailureKind::MissingField));
}

#[test]
fn reading_url_format_is_checked_only_on_create() {
    let conn = open_db_in_memory().unwrap();
    let service = RecordService::try_new(&conn).unwrap();
    let lesson = create(&service, EntityType::Lesson, field_map([("name", "Intro".into())]));

    let err = validation_error(service.create(
        EntityType::Reading,
        reading_fields(lesson.id, 1, "www.example.com"),
    ));
    assert!(err.has("url", FailureKind::InvalidFormat));
    assert_eq!(count(&conn, "readings"), 0);

    let reading = create(
        &service,
        EntityType::Reading,
        reading_fields(lesson.id, 1, "https://example.com/ch1"),
    );
    let updated = service
        .update(
            reading.reference(),
            field_map([("url", "not a url".into())]),
        )
        .unwrap();
    assert_eq!(updated.text("url"), Some("not a url"));
    assert_eq!(
        service.get(reading.reference()).unwrap().text("url"),
        Some("not a url")
    );
}

#[test]
fn assignment_names_are_unique_within_a_course() {
    let conn = open_db_in_memory().unwrap();
    let service = RecordService::try_new(&conn).unwrap();
    let course_a = create(&service, EntityType::Course, field_map([("name", "A".into())]));
    let course_b = create(&service, EntityType::Course, field_map([("name", "B".into())]));

    create(
        &service,
        EntityType::Assignment,
        assignment_fields(course_a.id, "Duplicate"),
    );

    let err = validation_error(service.create(
        EntityType::Assignment,
        assignment_fields(course_a.id, "Duplicate"),
    ));
    assert_eq!(err.failures().len(), 1);
    assert!(err.has("name", FailureKind::Duplicate));

    create(
        &service,
        EntityType::Assignment,
        assignment_fields(course_b.id, "Duplicate"),
    );
    create(
        &service,
        EntityType::Assignment,
        assignment_fields(course_a.id, "duplicate"),
    );
    assert_eq!(count(&conn, "assignments"), 3);
}

#[test]
fn renaming_an_assignment_keeps_its_own_name_available() {
    let conn = open_db_in_memory().unwrap();
    let service = RecordService::try_new(&conn).unwrap();
    let course = create(&service, EntityType::Course, field_map([("name", "A".into())]));
    let homework = create(
        &service,
        EntityType::Assignment,
        assignment_fields(course.id, "Homework 1"),
    );
    create(
        &service,
        EntityType::Assignment,
        assignment_fields(course.id, "Homework 2"),
    );

    service
        .update(
            homework.reference(),
            field_map([("maximum_grade", 10.0_f64.into())]),
        )
        .unwrap();

    let err = validation_error(service.update(
        homework.reference(),
        field_map([("name", "Homework 2".into())]),
    ));
    assert!(err.has("name", FailureKind::Duplicate));
    assert_eq!(
        service.get(homework.reference()).unwrap().text("name"),
        Some("Homework 1")
    );
}

#[test]
fn percent_of_grade_is_required_once_attached_to_a_course() {
    let conn = open_db_in_memory().unwrap();
    let service = RecordService::try_new(&conn).unwrap();
    let course = create(&service, EntityType::Course, field_map([("name", "A".into())]));

    let detached = validation_error(
        service.create(EntityType::Assignment, field_map([("name", "Quiz".into())])),
    );
    assert_eq!(detached.fields(), vec!["course_id"]);

    let attached = validation_error(service.create(
        EntityType::Assignment,
        field_map([("name", "Quiz".into()), ("course_id", course.id.into())]),
    ));
    assert_eq!(attached.fields(), vec!["percent_of_grade"]);
    assert!(attached.has("percent_of_grade", FailureKind::MissingField));
}

#[test]
fn non_finite_percent_of_grade_is_a_type_mismatch() {
    let conn = open_db_in_memory().unwrap();
    let service = RecordService::try_new(&conn).unwrap();
    let course = create(&service, EntityType::Course, field_map([("name", "A".into())]));

    for value in [f64::NAN, f64::INFINITY] {
        let err = validation_error(service.create(
            EntityType::Assignment,
            field_map([
                ("name", "Quiz".into()),
                ("course_id", course.id.into()),
                ("percent_of_grade", value.into()),
            ]),
        ));
        assert!(err.has("percent_of_grade", FailureKind::TypeMismatch));
    }
    assert_eq!(count(&conn, "assignments"), 0);

    let quiz = create(
        &service,
        EntityType::Assignment,
        assignment_fields(course.id, "Quiz"),
    );
    let err = validation_error(service.update(
        quiz.reference(),
        field_map([("percent_of_grade", f64::NAN.into())]),
    ));
    assert!(err.has("percent_of_grade", FailureKind::TypeMismatch));
    assert_eq!(
        service.get(quiz.reference()).unwrap().get("percent_of_grade"),
        &FieldValue::Real(10.0)
    );
}

#[test]
fn term_dates_must_name_real_days() {
    let conn = open_db_in_memory().unwrap();
    let service = RecordService::try_new(&conn).unwrap();
    let school = create(&service, EntityType::School, field_map([("name", "S1".into())]));

    let err = validation_error(service.create(
        EntityType::Term,
        field_map([
            ("name", "Fall".into()),
            ("starts_on", "2024-99-99".into()),
            ("ends_on", "2023-02-29".into()),
            ("school_id", school.id.into()),
        ]),
    ));
    assert!(err.has("starts_on", FailureKind::TypeMismatch));
    assert!(err.has("ends_on", FailureKind::TypeMismatch));
    assert_eq!(count(&conn, "terms"), 0);

    create(
        &service,
        EntityType::Term,
        field_map([
            ("name", "Winter".into()),
            ("starts_on", "2024-01-08".into()),
            ("ends_on", "2024-02-29".into()),
            ("school_id", school.id.into()),
        ]),
    );
}

#[test]
fn user_email_must_be_well_formed_and_unique() {
    let conn = open_db_in_memory().unwrap();
    let service = RecordService::try_new(&conn).unwrap();

    let err = validation_error(service.create(
        EntityType::User,
        user_fields("ada@", UserRole::Student),
    ));
    assert!(err.has("email", FailureKind::InvalidFormat));
    let err = validation_error(service.create(
        EntityType::User,
        user_fields("jösé@example.com", UserRole::Student),
    ));
    assert!(err.has("email", FailureKind::InvalidFormat));

    service
        .create_user(&UserIdentity::new("Ada", "Lovelace", "ada@example.com"), UserRole::Student)
        .unwrap();
    let err = validation_error(service.create(
        EntityType::User,
        user_fields("ada@example.com", UserRole::Instructor),
    ));
    assert!(err.has("email", FailureKind::Duplicate));

    service
        .create(
            EntityType::User,
            user_fields("ADA@example.com", UserRole::Instructor),
        )
        .unwrap();
}

#[test]
fn photo_url_is_checked_only_when_present() {
    let conn = open_db_in_memory().unwrap();
    let service = RecordService::try_new(&conn).unwrap();

    let mut fields = user_fields("grace@example.com", UserRole::Instructor);
    fields.insert("photo_url".to_string(), "ftp://photos/grace.png".into());
    let err = validation_error(service.create(EntityType::User, fields.clone()));
    assert_eq!(err.fields(), vec!["photo_url"]);

    fields.insert("photo_url".to_string(), "".into());
    service.create(EntityType::User, fields).unwrap();
}

#[test]
fn course_code_needs_three_letters_and_three_digits() {
    let conn = open_db_in_memory().unwrap();
    let service = RecordService::try_new(&conn).unwrap();

    for code in ["CS101", "CSC10A", "CSC1010"] {
        let err = validation_error(service.create(
            EntityType::Course,
            field_map([("name", "Algorithms".into()), ("course_code", code.into())]),
        ));
        assert!(err.has("course_code", FailureKind::InvalidFormat), "{code}");
    }

    create(
        &service,
        EntityType::Course,
        field_map([("name", "Algorithms".into()), ("course_code", "csc373".into())]),
    );
    create(
        &service,
        EntityType::Course,
        field_map([("name", "Seminar".into())]),
    );
}

#[test]
fn undeclared_fields_and_wrong_kinds_are_rejected() {
    let conn = open_db_in_memory().unwrap();
    let service = RecordService::try_new(&conn).unwrap();

    let err = validation_error(service.create(
        EntityType::School,
        field_map([("name", 42_i64.into()), ("motto", "Lux".into())]),
    ));
    assert!(err.has("name", FailureKind::TypeMismatch));
    assert!(err.has("motto", FailureKind::UnknownField));

    let err = validation_error(service.create(
        EntityType::Term,
        field_map([
            ("name", "Fall".into()),
            ("starts_on", "September".into()),
            ("ends_on", "".into()),
        ]),
    ));
    assert!(err.has("starts_on", FailureKind::TypeMismatch));
    assert!(err.has("ends_on", FailureKind::MissingField));
}

#[test]
fn dangling_reference_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let service = RecordService::try_new(&conn).unwrap();
    let missing_school = Uuid::new_v4();

    let err = service
        .create(
            EntityType::Term,
            field_map([
                ("name", "Fall".into()),
                ("starts_on", "2024-09-01".into()),
                ("ends_on", "2024-12-20".into()),
                ("school_id", missing_school.into()),
            ]),
        )
        .unwrap_err();
    match err {
        RepoError::NotFound(target) => {
            assert_eq!(target.entity, EntityType::School);
            assert_eq!(target.id, missing_school);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(count(&conn, "terms"), 0);
}

#[test]
fn instructor_links_require_an_instructor() {
    let conn = open_db_in_memory().unwrap();
    let service = RecordService::try_new(&conn).unwrap();
    let course = create(&service, EntityType::Course, field_map([("name", "A".into())]));
    let student = service
        .create_user(&UserIdentity::new("Sam", "Student", "sam@example.com"), UserRole::Student)
        .unwrap();
    let teacher = service
        .create_user(&UserIdentity::new("Tia", "Teacher", "tia@example.com"), UserRole::Instructor)
        .unwrap();

    let err = validation_error(service.create(
        EntityType::CourseInstructor,
        field_map([
            ("course_id", course.id.into()),
            ("instructor_id", student.id.into()),
        ]),
    ));
    assert!(err.has("instructor_id", FailureKind::RoleMismatch));

    let link = create(
        &service,
        EntityType::CourseInstructor,
        field_map([
            ("course_id", course.id.into()),
            ("instructor_id", teacher.id.into()),
        ]),
    );
    assert_eq!(link.boolean("primary"), Some(false));
}

#[test]
fn rejected_update_leaves_the_stored_record_untouched() {
    let conn = open_db_in_memory().unwrap();
    let service = RecordService::try_new(&conn).unwrap();
    let school = create(&service, EntityType::School, field_map([("name", "S1".into())]));

    let err = validation_error(
        service.update(school.reference(), field_map([("name", FieldValue::Null)])),
    );
    assert!(err.has("name", FailureKind::MissingField));
    assert_eq!(
        service.get(school.reference()).unwrap().text("name"),
        Some("S1")
    );
}

fn create(service: &RecordService<'_>, entity: EntityType, fields: FieldMap) -> Record {
    service.create(entity, fields).unwrap()
}

fn validation_error<T: std::fmt::Debug>(result: Result<T, RepoError>) -> ValidationError {
    match result {
        Err(RepoError::Validation(err)) => err,
        other => panic!("expected validation error, got {other:?}"),
    }
}

fn reading_fields(lesson_id: Uuid, order_number: i64, url: &str) -> FieldMap {
    field_map([
        ("lesson_id", lesson_id.into()),
        ("order_number", order_number.into()),
        ("url", url.into()),
    ])
}

fn assignment_fields(course_id: Uuid, name: &str) -> FieldMap {
    field_map([
        ("name", name.into()),
        ("course_id", course_id.into()),
        ("percent_of_grade", 10.0_f64.into()),
    ])
}

fn user_fields(email: &str, role: UserRole) -> FieldMap {
    field_map([
        ("first_name", "Test".into()),
        ("last_name", "User".into()),
        ("email", email.into()),
        ("instructor", role.is_instructor().into()),
    ])
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}
