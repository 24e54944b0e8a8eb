//! Input normalization applied before rule evaluation.

use crate::model::record::{FieldMap, FieldValue};
use crate::schema::{EntitySchema, FieldKind};

/// Coerces caller-supplied values toward the declared kinds.
///
/// - blank text for a non-text field becomes null
/// - integers for real fields become reals
/// - null booleans become `false`
///
/// Undeclared fields pass through untouched so validation can report them.
pub fn normalize_input(schema: &EntitySchema, fields: FieldMap) -> FieldMap {
    fields
        .into_iter()
        .map(|(name, value)| {
            let value = match schema.field(&name) {
                Some(spec) => normalize_value(spec.kind, value),
                None => value,
            };
            (name, value)
        })
        .collect()
}

/// Fills every declared field the map omits with its kind default.
pub fn with_defaults(schema: &EntitySchema, mut fields: FieldMap) -> FieldMap {
    for spec in &schema.fields {
        fields
            .entry(spec.name.to_string())
            .or_insert_with(|| spec.kind.default_value());
    }
    fields
}

fn normalize_value(kind: FieldKind, value: FieldValue) -> FieldValue {
    match (kind, value) {
        (FieldKind::Text, value) => value,
        (FieldKind::Boolean, FieldValue::Null) => FieldValue::Boolean(false),
        (FieldKind::Real, FieldValue::Integer(number)) => FieldValue::Real(number as f64),
        (_, FieldValue::Text(text)) if text.trim().is_empty() => FieldValue::Null,
        (_, value) => value,
    }
}
