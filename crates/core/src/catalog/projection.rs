//! Allow-list projection of raw catalog payloads.

use serde_json::{Map, Number, Value};
use tracing::warn;

use super::RawCatalogItem;
use crate::error::WriteError;

#[derive(Clone, Copy)]
enum FieldKind {
    Text,
    Integer,
    Decimal,
}

/// The fields that survive projection, besides `id`.
const FIELDS: &[(&str, FieldKind)] = &[
    ("name", FieldKind::Text),
    ("catalogNumber", FieldKind::Text),
    ("description", FieldKind::Text),
    ("country", FieldKind::Text),
    ("seriesName", FieldKind::Text),
    ("issueYear", FieldKind::Integer),
    ("denomination", FieldKind::Text),
    ("color", FieldKind::Text),
    ("paper", FieldKind::Text),
    ("watermark", FieldKind::Text),
    ("perforation", FieldKind::Text),
    ("itemType", FieldKind::Text),
    ("imageUrl", FieldKind::Text),
    ("mintValue", FieldKind::Decimal),
    ("usedValue", FieldKind::Decimal),
    ("parentStampId", FieldKind::Text),
    ("stampGroupId", FieldKind::Text),
    ("categoryId", FieldKind::Text),
    ("releaseId", FieldKind::Text),
];

/// Bring `value` to the shape `kind` expects, or `None` if it cannot be.
fn coerce(value: &Value, kind: FieldKind) -> Option<Value> {
    match (kind, value) {
        (FieldKind::Text, Value::String(_)) => Some(value.clone()),
        (FieldKind::Text, Value::Number(n)) => Some(Value::String(n.to_string())),
        (FieldKind::Integer, Value::Number(n)) => n
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .map(Value::from),
        (FieldKind::Integer, Value::String(s)) => s.trim().parse::<i32>().ok().map(Value::from),
        (FieldKind::Decimal, Value::Number(_)) => Some(value.clone()),
        (FieldKind::Decimal, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),
        _ => None,
    }
}

impl RawCatalogItem {
    /// Keep the allow-listed fields of `payload` and drop everything else.
    ///
    /// Numbers in text fields (ids, catalog numbers) are stored as strings,
    /// and numeric strings in number fields are parsed. A listed field that
    /// still does not fit is dropped with a warning. Only a payload that is
    /// not an object or has no usable `id` is rejected.
    pub fn project(payload: &Value) -> Result<Self, WriteError> {
        let object = payload
            .as_object()
            .ok_or_else(|| WriteError::Projection("payload is not an object".to_string()))?;

        let id = match object.get("id") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                return Err(WriteError::Projection(
                    "payload has no usable id".to_string(),
                ))
            }
        };

        let mut projected = Map::new();
        projected.insert("id".to_string(), Value::String(id.clone()));
        for &(field, kind) in FIELDS {
            match object.get(field) {
                None | Some(Value::Null) => {}
                Some(value) => match coerce(value, kind) {
                    Some(value) => {
                        projected.insert(field.to_string(), value);
                    }
                    None => warn!(id = %id, field, %value, "Dropping catalog field of unexpected type"),
                },
            }
        }

        serde_json::from_value(Value::Object(projected))
            .map_err(|e| WriteError::Projection(format!("item {}: {}", id, e)))
    }
}

/// Project a batch, failing on the first unusable payload.
pub fn project_raw_items(payloads: &[Value]) -> Result<Vec<RawCatalogItem>, WriteError> {
    payloads.iter().map(RawCatalogItem::project).collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_unknown_fields_are_dropped() {
        let payload = json!({
            "id": "raw-1",
            "name": "Inverted Jenny",
            "parentStampId": "stamp-9",
            "extraneousField": "x",
            "internalNotes": {"reviewer": "ops"}
        });

        let item = RawCatalogItem::project(&payload).unwrap();
        let stored = serde_json::to_value(&item).unwrap();

        assert_eq!(stored["id"], "raw-1");
        assert_eq!(stored["parentStampId"], "stamp-9");
        assert!(stored.get("extraneousField").is_none());
        assert!(stored.get("internalNotes").is_none());
    }

    #[test]
    fn test_hierarchy_links_survive() {
        let payload = json!({
            "id": "raw-2",
            "stampGroupId": "g1",
            "categoryId": "c1",
            "releaseId": "r1",
            "issueYear": 1918
        });

        let item = RawCatalogItem::project(&payload).unwrap();

        assert_eq!(item.stamp_group_id.as_deref(), Some("g1"));
        assert_eq!(item.category_id.as_deref(), Some("c1"));
        assert_eq!(item.release_id.as_deref(), Some("r1"));
        assert_eq!(item.issue_year, Some(1918));
    }

    #[test]
    fn test_numeric_id_becomes_string() {
        let item = RawCatalogItem::project(&json!({"id": 4711})).unwrap();
        assert_eq!(item.id, "4711");
    }

    #[test]
    fn test_missing_or_blank_id_is_rejected() {
        for payload in [json!({"name": "x"}), json!({"id": "  "}), json!({"id": null})] {
            assert!(matches!(
                RawCatalogItem::project(&payload),
                Err(WriteError::Projection(_))
            ));
        }
    }

    #[test]
    fn test_non_object_is_rejected() {
        assert!(RawCatalogItem::project(&json!(["id", "x"])).is_err());
    }

    #[test]
    fn test_numeric_links_become_strings() {
        let item = RawCatalogItem::project(&json!({
            "id": "a",
            "parentStampId": 42,
            "categoryId": 7,
            "catalogNumber": 1
        }))
        .unwrap();

        assert_eq!(item.parent_stamp_id.as_deref(), Some("42"));
        assert_eq!(item.category_id.as_deref(), Some("7"));
        assert_eq!(item.catalog_number.as_deref(), Some("1"));
    }

    #[test]
    fn test_numeric_strings_are_parsed() {
        let item = RawCatalogItem::project(&json!({
            "id": "b",
            "issueYear": "1918",
            "mintValue": " 12.5 "
        }))
        .unwrap();

        assert_eq!(item.issue_year, Some(1918));
        assert_eq!(item.mint_value, Some(12.5));
    }

    #[test]
    fn test_unfit_listed_field_is_dropped() {
        let item = RawCatalogItem::project(&json!({
            "id": "c",
            "name": "Kept",
            "issueYear": "nineteen",
            "usedValue": {"amount": 3},
            "releaseId": ["r1"],
            "country": null
        }))
        .unwrap();

        assert_eq!(item.name.as_deref(), Some("Kept"));
        assert_eq!(item.issue_year, None);
        assert_eq!(item.used_value, None);
        assert_eq!(item.release_id, None);
        assert_eq!(item.country, None);
    }

    #[test]
    fn test_batch_projection_stops_on_bad_item() {
        let batch = vec![json!({"id": "a"}), json!({"name": "no id"})];
        assert!(project_raw_items(&batch).is_err());

        let batch = vec![
            json!({"id": "a", "parentStampId": 42}),
            json!({"id": "b", "issueYear": "1918", "junk": 1}),
        ];
        assert_eq!(project_raw_items(&batch).unwrap().len(), 2);
    }
}
