//! Read-path query options.
//!
//! Ordering is always explicit on the query; the store falls back to
//! insertion order only when a query names none.

use crate::model::record::{EntityType, FieldValue, RecordId};

/// Equality filter on one field. `Null` matches missing values.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub value: FieldValue,
}

impl FieldFilter {
    pub fn new(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: SortDirection,
}

/// Filter, order and pagination options for listing one entity type.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordQuery {
    pub entity: EntityType,
    pub filters: Vec<FieldFilter>,
    pub order: Vec<OrderBy>,
    pub limit: Option<u32>,
    pub offset: u32,
}

impl RecordQuery {
    pub fn new(entity: EntityType) -> Self {
        Self {
            entity,
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: 0,
        }
    }

    pub fn filter(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.filters.push(FieldFilter::new(field, value));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.order.push(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }
}

/// Which readings to return relative to the lesson itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadingPhase {
    #[default]
    All,
    /// `before_lesson = true`.
    Pre,
    /// `before_lesson = false`.
    Post,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadingOrder {
    /// `order_number` ascending.
    #[default]
    OrderNumber,
    Insertion,
}

/// Reading list options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadingQuery {
    pub lesson_id: Option<RecordId>,
    pub phase: ReadingPhase,
    pub order: ReadingOrder,
}

impl ReadingQuery {
    pub fn for_lesson(lesson_id: RecordId) -> Self {
        Self {
            lesson_id: Some(lesson_id),
            ..Self::default()
        }
    }

    pub fn phase(mut self, phase: ReadingPhase) -> Self {
        self.phase = phase;
        self
    }

    pub fn order(mut self, order: ReadingOrder) -> Self {
        self.order = order;
        self
    }
}

impl From<ReadingQuery> for RecordQuery {
    fn from(value: ReadingQuery) -> Self {
        let mut query = RecordQuery::new(EntityType::Reading);
        if let Some(lesson_id) = value.lesson_id {
            query = query.filter("lesson_id", lesson_id);
        }
        query = match value.phase {
            ReadingPhase::All => query,
            ReadingPhase::Pre => query.filter("before_lesson", true),
            ReadingPhase::Post => query.filter("before_lesson", false),
        };
        match value.order {
            ReadingOrder::OrderNumber => query.order_by("order_number", SortDirection::Asc),
            ReadingOrder::Insertion => query,
        }
    }
}
