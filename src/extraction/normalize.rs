//! Coercion of the extraction service's JSON into typed entities.
//!
//! The response is untrusted: a schema was requested, but every field is
//! checked and coerced here.

use serde_json::{Map, Value};

use crate::errors::AppError;
use crate::models::{CodeEntry, ContentItem, ExtractedEntities, Unit, UnitStatus};

/// Type given to content items that arrive without one.
pub const DEFAULT_CONTENT_TYPE: &str = "Stage";

/// Type given to QoL items that arrive without one.
pub const DEFAULT_QOL_TYPE: &str = "Optimization";

/// Parse and normalize a raw response body.
pub fn normalize_response(raw: &str) -> Result<ExtractedEntities, AppError> {
    let raw = raw.trim();
    let value: Value = if raw.is_empty() {
        Value::Object(Map::new())
    } else {
        serde_json::from_str(raw)
            .map_err(|e| AppError::Extraction(format!("Response is not valid JSON: {}", e)))?
    };

    let Value::Object(root) = value else {
        return Err(AppError::Extraction(
            "Response is not a JSON object".to_string(),
        ));
    };

    let units = objects(&root, "units")?
        .into_iter()
        .map(|item| Unit {
            id: new_id(),
            name: text(item.get("name")),
            image_url: String::new(),
            status: UnitStatus::from_str(&text(item.get("status"))).unwrap_or_default(),
        })
        .collect();

    let codes = objects(&root, "codes")?
        .into_iter()
        .map(|item| CodeEntry {
            code: text(item.get("code")).to_uppercase(),
            reward: text(item.get("reward")),
        })
        .collect();

    let content_items = objects(&root, "contentItems")?
        .into_iter()
        .map(|item| content_item(item, DEFAULT_CONTENT_TYPE))
        .collect();

    let qol = objects(&root, "qol")?
        .into_iter()
        .map(|item| content_item(item, DEFAULT_QOL_TYPE))
        .collect();

    Ok(ExtractedEntities {
        units,
        codes,
        content_items,
        qol,
    })
}

fn content_item(item: &Map<String, Value>, default_type: &str) -> ContentItem {
    let kind = text(item.get("type"));
    ContentItem {
        id: new_id(),
        kind: if kind.is_empty() {
            default_type.to_string()
        } else {
            kind
        },
        title: text(item.get("title")),
        description: text(item.get("description")),
    }
}

/// The object items of one top-level array. Absent or null means empty.
fn objects<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Vec<&'a Map<String, Value>>, AppError> {
    match root.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_object().ok_or_else(|| {
                    AppError::Extraction(format!("Item in {:?} is not an object", key))
                })
            })
            .collect(),
        Some(_) => Err(AppError::Extraction(format!("{:?} is not an array", key))),
    }
}

fn text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_new_unit_gets_id_and_base_status() {
        let batch = normalize_response(
            r#"{"units":[{"name":"Goku"}],"codes":[],"contentItems":[],"qol":[]}"#,
        )
        .unwrap();

        assert_eq!(batch.units.len(), 1);
        let unit = &batch.units[0];
        assert_eq!(unit.name, "Goku");
        assert_eq!(unit.status, UnitStatus::Unevo);
        assert!(unit.image_url.is_empty());
        assert!(!unit.id.is_empty());
        assert!(batch.codes.is_empty());
        assert!(batch.content_items.is_empty());
        assert!(batch.qol.is_empty());
    }

    #[test]
    fn test_unknown_status_falls_back_to_unevo() {
        let batch =
            normalize_response(r#"{"units":[{"name":"A","status":"Evo"},{"name":"B","status":"Mega"}]}"#)
                .unwrap();

        assert_eq!(batch.units[0].status, UnitStatus::Evo);
        assert_eq!(batch.units[1].status, UnitStatus::Unevo);
        assert_ne!(batch.units[0].id, batch.units[1].id);
    }

    #[test]
    fn test_missing_type_gets_list_default() {
        let batch = normalize_response(
            r#"{"contentItems":[{"title":"Namek"}],"qol":[{"title":"Faster summons","type":""},{"title":"Goku","type":"Buff"}]}"#,
        )
        .unwrap();

        assert_eq!(batch.content_items[0].kind, "Stage");
        assert_eq!(batch.content_items[0].description, "");
        assert_eq!(batch.qol[0].kind, "Optimization");
        assert_eq!(batch.qol[1].kind, "Buff");
    }

    #[test]
    fn test_fields_coerced_to_text() {
        let batch = normalize_response(
            r#"{"codes":[{"code":"summer2025","reward":500},{"code":true}],"units":[{"name":42}]}"#,
        )
        .unwrap();

        assert_eq!(batch.codes[0].code, "SUMMER2025");
        assert_eq!(batch.codes[0].reward, "500");
        assert_eq!(batch.codes[1].code, "TRUE");
        assert_eq!(batch.codes[1].reward, "");
        assert_eq!(batch.units[0].name, "42");
    }

    #[test]
    fn test_empty_body_is_empty_batch() {
        assert!(normalize_response("").unwrap().is_empty());
        assert!(normalize_response("{}").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_responses_are_rejected() {
        for raw in [
            "not json",
            "[1, 2]",
            r#"{"units": "Goku"}"#,
            r#"{"codes": ["FREE"]}"#,
        ] {
            assert!(
                matches!(normalize_response(raw), Err(AppError::Extraction(_))),
                "accepted {}",
                raw
            );
        }
    }
}
