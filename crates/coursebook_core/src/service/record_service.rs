//! Repository façade for course records.
//!
//! # Responsibility
//! - Expose create/update/destroy entry points that validate before writing.
//! - Run each mutation in one `IMMEDIATE` transaction.
//! - Provide typed read helpers for readings, courses and course members.
//!
//! # Invariants
//! - A rejected or restricted mutation leaves storage untouched.
//! - `update` merges supplied fields into the stored record.
//! - Log lines carry entity type and id, never field values.

use crate::deletion::{DeletionOrchestrator, Detachment, PlanOutcome, RestrictedDeletion};
use crate::model::record::{EntityType, FieldMap, Record, RecordId, RecordRef};
use crate::model::user::{User, UserIdentity, UserRole};
use crate::repo::query::{ReadingQuery, RecordQuery, SortDirection};
use crate::repo::record_store::{
    ensure_store_ready, RecordStore, RepoError, RepoResult, SqliteRecordStore,
};
use crate::schema::{EntitySchema, Registry};
use crate::validation::{normalize_input, with_defaults, LifecyclePhase, Validator};
use log::{error, info, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::time::Instant;

/// Result of `destroy`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestroyOutcome {
    /// Every removed record in removal order, plus cleared links.
    Destroyed {
        removed: Vec<RecordRef>,
        detached: Vec<Detachment>,
    },
    /// A restrict edge blocked the delete; nothing changed.
    Restricted(RestrictedDeletion),
}

impl DestroyOutcome {
    pub fn is_destroyed(&self) -> bool {
        matches!(self, Self::Destroyed { .. })
    }
}

/// Validating, transactional entry point over a migrated connection.
pub struct RecordService<'conn> {
    conn: &'conn Connection,
    registry: &'conn Registry,
}

impl<'conn> RecordService<'conn> {
    /// Creates a service over the standard course registry.
    ///
    /// # Errors
    /// - Returns an error when the connection is not migrated to the
    ///   version the registry expects.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        Self::with_registry(conn, Registry::standard())
    }

    pub fn with_registry(conn: &'conn Connection, registry: &'conn Registry) -> RepoResult<Self> {
        ensure_store_ready(conn, registry)?;
        Ok(Self { conn, registry })
    }

    pub fn registry(&self) -> &Registry {
        self.registry
    }

    /// Validates and inserts a new record with a fresh id.
    ///
    /// Omitted fields take their kind default.
    pub fn create(&self, entity: EntityType, fields: FieldMap) -> RepoResult<Record> {
        let started_at = Instant::now();
        let result = self.create_inner(entity, fields);
        let id = result.as_ref().ok().map(|record| record.id);
        log_mutation("record_create", entity, id, started_at, &result);
        result
    }

    /// Merges `fields` into the stored record, re-validates and saves it.
    ///
    /// `FieldValue::Null` clears a field.
    pub fn update(&self, target: RecordRef, fields: FieldMap) -> RepoResult<Record> {
        let started_at = Instant::now();
        let result = self.update_inner(target, fields);
        log_mutation(
            "record_update",
            target.entity,
            Some(target.id),
            started_at,
            &result,
        );
        result
    }

    /// Deletes `target` and everything its associations cascade to.
    ///
    /// A restricted delete is rolled back and reported as
    /// `DestroyOutcome::Restricted`, not as an error.
    pub fn destroy(&self, target: RecordRef) -> RepoResult<DestroyOutcome> {
        let started_at = Instant::now();
        let result = self.destroy_inner(target);
        match &result {
            Ok(DestroyOutcome::Destroyed { removed, detached }) => info!(
                "event=record_destroy module=service status=ok entity={} id={} removed={} detached={} duration_ms={}",
                target.entity,
                target.id,
                removed.len(),
                detached.len(),
                started_at.elapsed().as_millis()
            ),
            Ok(DestroyOutcome::Restricted(restricted)) => warn!(
                "event=record_destroy module=service status=restricted entity={} id={} association={} blocking={} duration_ms={}",
                target.entity,
                target.id,
                restricted.association.name,
                restricted.blocking.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => log_failure(
                "record_destroy",
                target.entity,
                Some(target.id),
                started_at,
                err,
            ),
        }
        result
    }

    /// Loads one record.
    ///
    /// # Errors
    /// - `NotFound` when the record does not exist.
    pub fn get(&self, target: RecordRef) -> RepoResult<Record> {
        self.store()
            .get(target)?
            .ok_or(RepoError::NotFound(target))
    }

    pub fn list(&self, query: &RecordQuery) -> RepoResult<Vec<Record>> {
        self.store().list(query)
    }

    /// Lists readings, by default in `order_number` order.
    pub fn list_readings(&self, query: ReadingQuery) -> RepoResult<Vec<Record>> {
        self.store().list(&RecordQuery::from(query))
    }

    /// Courses of every term of `school_id`, grouped by term.
    pub fn courses_for_school(&self, school_id: RecordId) -> RepoResult<Vec<Record>> {
        let store = self.store();
        let school = RecordRef::new(EntityType::School, school_id);
        if !store.exists(school)? {
            return Err(RepoError::NotFound(school));
        }

        let terms = store.list(&RecordQuery::new(EntityType::Term).filter("school_id", school_id))?;
        let mut courses = Vec::new();
        for term in terms {
            courses.extend(
                store.list(&RecordQuery::new(EntityType::Course).filter("term_id", term.id))?,
            );
        }
        Ok(courses)
    }

    /// Creates a user with the given identity and role.
    pub fn create_user(&self, identity: &UserIdentity, role: UserRole) -> RepoResult<User> {
        let record = self.create(EntityType::User, User::fields_for(identity, role))?;
        Ok(User::try_from(&record)?)
    }

    pub fn get_user(&self, user_id: RecordId) -> RepoResult<User> {
        let record = self.get(RecordRef::new(EntityType::User, user_id))?;
        Ok(User::try_from(&record)?)
    }

    /// Instructors linked to `course_id`, primary instructors first.
    ///
    /// Links to users who no longer hold the instructor role are skipped.
    pub fn instructors_for_course(&self, course_id: RecordId) -> RepoResult<Vec<User>> {
        let query = RecordQuery::new(EntityType::CourseInstructor)
            .filter("course_id", course_id)
            .order_by("primary", SortDirection::Desc);
        let mut instructors = self.members_for_course(course_id, query, "instructor_id")?;
        instructors.retain(|user| user.role.can_teach());
        Ok(instructors)
    }

    /// Students enrolled in `course_id`, in enrollment order.
    pub fn students_for_course(&self, course_id: RecordId) -> RepoResult<Vec<User>> {
        let query = RecordQuery::new(EntityType::CourseStudent).filter("course_id", course_id);
        self.members_for_course(course_id, query, "student_id")
    }

    fn members_for_course(
        &self,
        course_id: RecordId,
        links: RecordQuery,
        user_field: &str,
    ) -> RepoResult<Vec<User>> {
        let store = self.store();
        let course = RecordRef::new(EntityType::Course, course_id);
        if !store.exists(course)? {
            return Err(RepoError::NotFound(course));
        }

        let mut users = Vec::new();
        for link in store.list(&links)? {
            let user_id = link.reference_to(user_field).ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "{} {} has no `{user_field}`",
                    link.entity, link.id
                ))
            })?;
            let target = RecordRef::new(EntityType::User, user_id);
            let record = store.get(target)?.ok_or(RepoError::NotFound(target))?;
            users.push(User::try_from(&record)?);
        }
        Ok(users)
    }

    fn create_inner(&self, entity: EntityType, fields: FieldMap) -> RepoResult<Record> {
        let schema = self.schema(entity)?;
        let fields = with_defaults(schema, normalize_input(schema, fields));
        let record = Record::new(entity, fields);

        let tx = self.begin()?;
        let store = SqliteRecordStore::new(&tx, self.registry);
        let validator = Validator::new(self.registry);
        validator.ensure_references_exist(&store, &record)?;
        validator.validate(&store, &record, LifecyclePhase::Create)?;
        store.insert(&record)?;
        tx.commit()?;
        Ok(record)
    }

    fn update_inner(&self, target: RecordRef, fields: FieldMap) -> RepoResult<Record> {
        let schema = self.schema(target.entity)?;

        let tx = self.begin()?;
        let store = SqliteRecordStore::new(&tx, self.registry);
        let mut record = store.get(target)?.ok_or(RepoError::NotFound(target))?;
        record.fields.extend(normalize_input(schema, fields));

        let validator = Validator::new(self.registry);
        validator.ensure_references_exist(&store, &record)?;
        validator.validate(&store, &record, LifecyclePhase::Update)?;
        store.update(&record)?;
        tx.commit()?;
        Ok(record)
    }

    fn destroy_inner(&self, target: RecordRef) -> RepoResult<DestroyOutcome> {
        self.schema(target.entity)?;

        let tx = self.begin()?;
        let store = SqliteRecordStore::new(&tx, self.registry);
        let orchestrator = DeletionOrchestrator::new(self.registry);
        match orchestrator.plan(&store, target)? {
            PlanOutcome::Ready(plan) => {
                orchestrator.apply(&store, &plan)?;
                tx.commit()?;
                Ok(DestroyOutcome::Destroyed {
                    removed: plan.removals,
                    detached: plan.detachments,
                })
            }
            PlanOutcome::Restricted(restricted) => {
                tx.rollback()?;
                Ok(DestroyOutcome::Restricted(restricted))
            }
        }
    }

    fn begin(&self) -> RepoResult<Transaction<'conn>> {
        Ok(Transaction::new_unchecked(
            self.conn,
            TransactionBehavior::Immediate,
        )?)
    }

    fn store(&self) -> SqliteRecordStore<'_> {
        SqliteRecordStore::new(self.conn, self.registry)
    }

    fn schema(&self, entity: EntityType) -> RepoResult<&'conn EntitySchema> {
        self.registry
            .schema(entity)
            .ok_or(RepoError::UnregisteredEntity(entity))
    }
}

fn log_mutation(
    event: &str,
    entity: EntityType,
    id: Option<RecordId>,
    started_at: Instant,
    result: &RepoResult<Record>,
) {
    match result {
        Ok(_) => info!(
            "event={event} module=service status=ok entity={entity} id={} duration_ms={}",
            display_id(id),
            started_at.elapsed().as_millis()
        ),
        Err(err) => log_failure(event, entity, id, started_at, err),
    }
}

fn log_failure(
    event: &str,
    entity: EntityType,
    id: Option<RecordId>,
    started_at: Instant,
    err: &RepoError,
) {
    match err {
        RepoError::Validation(validation) => warn!(
            "event={event} module=service status=rejected entity={entity} id={} failed_fields={} duration_ms={}",
            display_id(id),
            validation.fields().join(","),
            started_at.elapsed().as_millis()
        ),
        other => error!(
            "event={event} module=service status=error entity={entity} id={} duration_ms={} error_code={} error={other}",
            display_id(id),
            started_at.elapsed().as_millis(),
            error_code(other)
        ),
    }
}

fn display_id(id: Option<RecordId>) -> String {
    id.map_or_else(|| "none".to_string(), |id| id.to_string())
}

fn error_code(err: &RepoError) -> &'static str {
    match err {
        RepoError::Validation(_) => "validation_failed",
        RepoError::NotFound(_) => "not_found",
        RepoError::StorageConflict(_) => "storage_conflict",
        RepoError::Db(_) => "db_error",
        RepoError::InvalidData(_) => "invalid_data",
        RepoError::InvalidQuery(_) => "invalid_query",
        RepoError::UnregisteredEntity(_) => "unregistered_entity",
        RepoError::UninitializedConnection { .. }
        | RepoError::MissingRequiredTable(_)
        | RepoError::MissingRequiredColumn { .. } => "store_not_ready",
    }
}
