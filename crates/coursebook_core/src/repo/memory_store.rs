//! In-memory `RecordStore` used by unit tests of validation and deletion.

use crate::model::record::{EntityType, FieldValue, Record, RecordId, RecordRef};
use crate::repo::query::{FieldFilter, RecordQuery};
use crate::repo::record_store::{RecordStore, RepoError, RepoResult};
use std::cell::RefCell;

#[derive(Default)]
pub(crate) struct MemoryStore {
    records: RefCell<Vec<Record>>,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn put(&self, record: Record) -> RecordRef {
        let reference = record.reference();
        self.records.borrow_mut().push(record);
        reference
    }

    pub(crate) fn len(&self) -> usize {
        self.records.borrow().len()
    }

    fn matches(record: &Record, filters: &[FieldFilter]) -> bool {
        filters.iter().all(|filter| {
            if filter.field == "id" {
                return filter.value == FieldValue::Reference(record.id);
            }
            record.get(&filter.field) == &filter.value
        })
    }
}

impl RecordStore for MemoryStore {
    fn get(&self, target: RecordRef) -> RepoResult<Option<Record>> {
        Ok(self
            .records
            .borrow()
            .iter()
            .find(|record| record.reference() == target)
            .cloned())
    }

    fn exists(&self, target: RecordRef) -> RepoResult<bool> {
        Ok(self.get(target)?.is_some())
    }

    fn find_ids(&self, entity: EntityType, filters: &[FieldFilter]) -> RepoResult<Vec<RecordId>> {
        Ok(self
            .records
            .borrow()
            .iter()
            .filter(|record| record.entity == entity && Self::matches(record, filters))
            .map(|record| record.id)
            .collect())
    }

    fn list(&self, query: &RecordQuery) -> RepoResult<Vec<Record>> {
        Ok(self
            .records
            .borrow()
            .iter()
            .filter(|record| record.entity == query.entity && Self::matches(record, &query.filters))
            .cloned()
            .collect())
    }

    fn insert(&self, record: &Record) -> RepoResult<()> {
        self.put(record.clone());
        Ok(())
    }

    fn update(&self, record: &Record) -> RepoResult<()> {
        let mut records = self.records.borrow_mut();
        let slot = records
            .iter_mut()
            .find(|current| current.reference() == record.reference())
            .ok_or(RepoError::NotFound(record.reference()))?;
        *slot = record.clone();
        Ok(())
    }

    fn clear_field(&self, target: RecordRef, field: &str) -> RepoResult<()> {
        let mut records = self.records.borrow_mut();
        let slot = records
            .iter_mut()
            .find(|current| current.reference() == target)
            .ok_or(RepoError::NotFound(target))?;
        slot.set(field, FieldValue::Null);
        Ok(())
    }

    fn delete(&self, target: RecordRef) -> RepoResult<()> {
        let mut records = self.records.borrow_mut();
        let before = records.len();
        records.retain(|record| record.reference() != target);
        if records.len() == before {
            return Err(RepoError::NotFound(target));
        }
        Ok(())
    }
}
