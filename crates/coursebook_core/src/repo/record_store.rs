//! Record storage contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide row-level read/write/delete over every registered entity table.
//! - Derive table and column names from the schema registry only.
//!
//! # Invariants
//! - Identifiers in generated SQL come from the registry, never from callers.
//! - Read paths reject undecodable rows instead of masking them.
//! - The store never validates; callers run the validation engine first.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::record::{EntityType, FieldMap, FieldValue, Record, RecordId, RecordRef};
use crate::model::user::UserDecodeError;
use crate::repo::query::{FieldFilter, RecordQuery, SortDirection};
use crate::schema::{EntitySchema, FieldKind, FieldSpec, Registry};
use crate::validation::ValidationError;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, ErrorCode, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors from record persistence and the façade built on it.
#[derive(Debug)]
pub enum RepoError {
    /// One or more validation rules failed; nothing was written.
    Validation(ValidationError),
    /// Target record or reference target does not exist.
    NotFound(RecordRef),
    /// Storage refused the write because of a concurrent writer or a
    /// constraint it enforces itself. Retry after re-reading.
    StorageConflict(rusqlite::Error),
    Db(DbError),
    /// Persisted data cannot be converted to a valid record.
    InvalidData(String),
    /// Query names a field the entity does not declare.
    InvalidQuery(String),
    UnregisteredEntity(EntityType),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(target) => write!(f, "record not found: {target}"),
            Self::StorageConflict(err) => write!(f, "storage conflict: {err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted record data: {message}"),
            Self::InvalidQuery(message) => write!(f, "invalid record query: {message}"),
            Self::UnregisteredEntity(entity) => write!(f, "entity `{entity}` is not registered"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "record store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "record store requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "record store requires column `{column}` in table `{table}`"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::StorageConflict(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::Sqlite(err) => err.into(),
            other => Self::Db(other),
        }
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        if is_conflict(&value) {
            Self::StorageConflict(value)
        } else {
            Self::Db(DbError::Sqlite(value))
        }
    }
}

impl From<UserDecodeError> for RepoError {
    fn from(value: UserDecodeError) -> Self {
        Self::InvalidData(value.to_string())
    }
}

fn is_conflict(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::ConstraintViolation)
    )
}

/// Storage contract consumed by validation, deletion and the façade.
///
/// Implementations do not open transactions; the caller scopes every
/// mutation so that all calls made for it commit or roll back together.
pub trait RecordStore {
    fn get(&self, target: RecordRef) -> RepoResult<Option<Record>>;
    fn exists(&self, target: RecordRef) -> RepoResult<bool>;
    /// Ids of records matching every filter, in insertion order.
    fn find_ids(&self, entity: EntityType, filters: &[FieldFilter]) -> RepoResult<Vec<RecordId>>;
    fn list(&self, query: &RecordQuery) -> RepoResult<Vec<Record>>;
    fn insert(&self, record: &Record) -> RepoResult<()>;
    /// Overwrites every declared field of an existing record.
    fn update(&self, record: &Record) -> RepoResult<()>;
    /// Sets one field to null.
    fn clear_field(&self, target: RecordRef, field: &str) -> RepoResult<()>;
    fn delete(&self, target: RecordRef) -> RepoResult<()>;
}

/// SQLite-backed record store.
///
/// Accepts any `Connection`, including a `Transaction` through deref.
pub struct SqliteRecordStore<'a> {
    conn: &'a Connection,
    registry: &'a Registry,
}

impl<'a> SqliteRecordStore<'a> {
    /// Wraps an already verified connection.
    pub fn new(conn: &'a Connection, registry: &'a Registry) -> Self {
        Self { conn, registry }
    }

    /// Wraps a connection after checking it carries every registered table
    /// and column.
    pub fn try_new(conn: &'a Connection, registry: &'a Registry) -> RepoResult<Self> {
        ensure_store_ready(conn, registry)?;
        Ok(Self::new(conn, registry))
    }

    fn schema(&self, entity: EntityType) -> RepoResult<&'a EntitySchema> {
        self.registry
            .schema(entity)
            .ok_or(RepoError::UnregisteredEntity(entity))
    }
}

impl RecordStore for SqliteRecordStore<'_> {
    fn get(&self, target: RecordRef) -> RepoResult<Option<Record>> {
        let schema = self.schema(target.entity)?;
        let sql = format!(
            "SELECT {} FROM {} WHERE \"id\" = ?1;",
            select_columns(schema),
            quote(schema.table_name())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([target.id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_record_row(schema, row)?));
        }
        Ok(None)
    }

    fn exists(&self, target: RecordRef) -> RepoResult<bool> {
        let schema = self.schema(target.entity)?;
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE \"id\" = ?1);",
            quote(schema.table_name())
        );
        let exists: i64 = self
            .conn
            .query_row(&sql, [target.id.to_string()], |row| row.get(0))?;
        Ok(exists == 1)
    }

    fn find_ids(&self, entity: EntityType, filters: &[FieldFilter]) -> RepoResult<Vec<RecordId>> {
        let schema = self.schema(entity)?;
        let mut sql = format!("SELECT \"id\" FROM {} WHERE 1 = 1", quote(schema.table_name()));
        let bind_values = push_filters(schema, filters, &mut sql)?;
        sql.push_str(" ORDER BY rowid ASC;");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            ids.push(parse_uuid(&value, schema.table_name(), "id")?);
        }
        Ok(ids)
    }

    fn list(&self, query: &RecordQuery) -> RepoResult<Vec<Record>> {
        let schema = self.schema(query.entity)?;
        let mut sql = format!(
            "SELECT {} FROM {} WHERE 1 = 1",
            select_columns(schema),
            quote(schema.table_name())
        );
        let mut bind_values = push_filters(schema, &query.filters, &mut sql)?;

        sql.push_str(" ORDER BY ");
        for order in &query.order {
            let column = column_for(schema, &order.field)?;
            let direction = match order.direction {
                SortDirection::Asc => "ASC",
                SortDirection::Desc => "DESC",
            };
            sql.push_str(&format!("{} {direction}, ", quote(column)));
        }
        sql.push_str("rowid ASC");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_record_row(schema, row)?);
        }
        Ok(records)
    }

    fn insert(&self, record: &Record) -> RepoResult<()> {
        let schema = self.schema(record.entity)?;
        let mut columns = vec![quote("id")];
        let mut bind_values = vec![Value::Text(record.id.to_string())];
        for spec in &schema.fields {
            columns.push(quote(spec.name));
            bind_values.push(to_sql_value(record.get(spec.name)));
        }
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({placeholders});",
            quote(schema.table_name()),
            columns.join(", ")
        );
        self.conn.execute(&sql, params_from_iter(bind_values))?;
        Ok(())
    }

    fn update(&self, record: &Record) -> RepoResult<()> {
        let schema = self.schema(record.entity)?;
        let mut assignments = Vec::with_capacity(schema.fields.len() + 1);
        let mut bind_values = Vec::with_capacity(schema.fields.len() + 1);
        for spec in &schema.fields {
            assignments.push(format!("{} = ?", quote(spec.name)));
            bind_values.push(to_sql_value(record.get(spec.name)));
        }
        assignments.push("\"updated_at\" = (strftime('%s', 'now') * 1000)".to_string());
        bind_values.push(Value::Text(record.id.to_string()));

        let sql = format!(
            "UPDATE {} SET {} WHERE \"id\" = ?;",
            quote(schema.table_name()),
            assignments.join(", ")
        );
        let changed = self.conn.execute(&sql, params_from_iter(bind_values))?;
        if changed == 0 {
            return Err(RepoError::NotFound(record.reference()));
        }
        Ok(())
    }

    fn clear_field(&self, target: RecordRef, field: &str) -> RepoResult<()> {
        let schema = self.schema(target.entity)?;
        let spec = schema.field(field).ok_or_else(|| {
            RepoError::InvalidQuery(format!("unknown field `{field}` on {}", target.entity))
        })?;
        let sql = format!(
            "UPDATE {} SET {} = NULL, \"updated_at\" = (strftime('%s', 'now') * 1000) WHERE \"id\" = ?1;",
            quote(schema.table_name()),
            quote(spec.name)
        );
        let changed = self.conn.execute(&sql, [target.id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound(target));
        }
        Ok(())
    }

    fn delete(&self, target: RecordRef) -> RepoResult<()> {
        let schema = self.schema(target.entity)?;
        let sql = format!(
            "DELETE FROM {} WHERE \"id\" = ?1;",
            quote(schema.table_name())
        );
        let changed = self.conn.execute(&sql, [target.id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound(target));
        }
        Ok(())
    }
}

/// Checks that `conn` is migrated and carries every registered column.
pub fn ensure_store_ready(conn: &Connection, registry: &Registry) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for schema in registry.entities() {
        let table = schema.table_name();
        let columns = table_columns(conn, table)?;
        if columns.is_empty() {
            return Err(RepoError::MissingRequiredTable(table));
        }
        let declared = std::iter::once("id").chain(schema.fields.iter().map(|spec| spec.name));
        for column in declared {
            if !columns.iter().any(|current| current == column) {
                return Err(RepoError::MissingRequiredColumn { table, column });
            }
        }
    }
    Ok(())
}

fn table_columns(conn: &Connection, table: &str) -> RepoResult<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({});", quote(table)))?;
    let mut rows = stmt.query([])?;
    let mut columns = Vec::new();
    while let Some(row) = rows.next()? {
        columns.push(row.get(1)?);
    }
    Ok(columns)
}

fn quote(identifier: &str) -> String {
    format!("\"{identifier}\"")
}

fn select_columns(schema: &EntitySchema) -> String {
    std::iter::once(quote("id"))
        .chain(schema.fields.iter().map(|spec| quote(spec.name)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn column_for(schema: &EntitySchema, field: &str) -> RepoResult<&'static str> {
    if field == "id" {
        return Ok("id");
    }
    schema.field(field).map(|spec| spec.name).ok_or_else(|| {
        RepoError::InvalidQuery(format!("unknown field `{field}` on {}", schema.entity))
    })
}

fn push_filters(
    schema: &EntitySchema,
    filters: &[FieldFilter],
    sql: &mut String,
) -> RepoResult<Vec<Value>> {
    let mut bind_values = Vec::new();
    for filter in filters {
        let column = quote(column_for(schema, &filter.field)?);
        if filter.value.is_null() {
            sql.push_str(&format!(" AND {column} IS NULL"));
        } else {
            sql.push_str(&format!(" AND {column} = ?"));
            bind_values.push(to_sql_value(&filter.value));
        }
    }
    Ok(bind_values)
}

fn to_sql_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Text(text) => Value::Text(text.clone()),
        FieldValue::Integer(number) => Value::Integer(*number),
        FieldValue::Real(number) => Value::Real(*number),
        FieldValue::Boolean(flag) => Value::Integer(i64::from(*flag)),
        FieldValue::Reference(id) => Value::Text(id.to_string()),
    }
}

fn parse_record_row(schema: &EntitySchema, row: &Row<'_>) -> RepoResult<Record> {
    let table = schema.table_name();
    let id_text: String = row.get("id")?;
    let id = parse_uuid(&id_text, table, "id")?;

    let mut fields = FieldMap::new();
    for spec in &schema.fields {
        let raw: Value = row.get(spec.name)?;
        fields.insert(spec.name.to_string(), decode_value(table, spec, raw)?);
    }
    Ok(Record::with_id(id, schema.entity, fields))
}

fn decode_value(table: &str, spec: &FieldSpec, raw: Value) -> RepoResult<FieldValue> {
    let value = match (spec.kind, raw) {
        (_, Value::Null) => FieldValue::Null,
        (FieldKind::Text | FieldKind::Date, Value::Text(text)) => FieldValue::Text(text),
        (FieldKind::Integer | FieldKind::Timestamp, Value::Integer(number)) => {
            FieldValue::Integer(number)
        }
        (FieldKind::Real, Value::Real(number)) => FieldValue::Real(number),
        (FieldKind::Real, Value::Integer(number)) => FieldValue::Real(number as f64),
        (FieldKind::Boolean, Value::Integer(0)) => FieldValue::Boolean(false),
        (FieldKind::Boolean, Value::Integer(1)) => FieldValue::Boolean(true),
        (FieldKind::Reference(_), Value::Text(text)) => {
            FieldValue::Reference(parse_uuid(&text, table, spec.name)?)
        }
        (kind, other) => {
            return Err(RepoError::InvalidData(format!(
                "invalid {} value `{other:?}` in {table}.{}",
                kind.name(),
                spec.name
            )));
        }
    };
    Ok(value)
}

fn parse_uuid(value: &str, table: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {table}.{column}")))
}
