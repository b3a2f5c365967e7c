//! Structural validation of externally supplied roadmap documents.
//!
//! Documents arrive as untyped JSON. [`validate_document`] checks them rule by
//! rule, stopping at the first violation, and returns a normalized
//! [`ImportedRoadmap`] on success. Nothing here touches storage.

use chrono::NaiveDate;
use serde_json::{Map, Value};
use std::collections::HashSet;
use thiserror::Error;

use crate::model::{Item, ItemId, ProgressEntry, ProgressMap, Resource, Roadmap, Status};

const DEADLINE_FORMAT: &str = "%Y-%m-%d";

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// First rule an import document violated.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ImportError {
    #[error("document is not valid JSON: {0}")]
    ParseFailure(String),

    #[error("invalid document: expected a JSON object")]
    MalformedDocument,

    #[error("invalid document: missing roadmap title")]
    MissingTitle,

    #[error("invalid document: missing items array")]
    MissingItems,

    #[error("invalid document: item at index {position} has no id")]
    MissingItemId { position: usize },

    #[error("invalid document: item {id} has no title")]
    MissingItemTitle { id: ItemId },

    #[error("invalid document: item id {id} is used more than once")]
    DuplicateItemId { id: ItemId },

    #[error("invalid document: userProgress must be an object")]
    MalformedProgress,

    #[error("invalid progress for item {id}: {reason}")]
    InvalidProgress { id: String, reason: String },
}

//
// ─── RESULT ────────────────────────────────────────────────────────────────────
//

/// A validated document: the roadmap plus the progress map it carried, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedRoadmap {
    pub roadmap: Roadmap,
    /// `None` when the document had no `userProgress`; importers reset progress then.
    pub progress: Option<ProgressMap>,
}

//
// ─── ENTRY POINTS ──────────────────────────────────────────────────────────────
//

/// Decode raw document text.
///
/// # Errors
///
/// Returns `ImportError::ParseFailure` if `text` is not JSON.
pub fn parse_document(text: &str) -> Result<Value, ImportError> {
    serde_json::from_str(text).map_err(|err| ImportError::ParseFailure(err.to_string()))
}

/// Validate a decoded document.
///
/// Rules are checked in order: object, title, items array, then each item's
/// id and title in array order, id uniqueness, and finally `userProgress`.
///
/// # Errors
///
/// Returns the `ImportError` for the first violated rule.
pub fn validate_document(doc: &Value) -> Result<ImportedRoadmap, ImportError> {
    let Value::Object(fields) = doc else {
        return Err(ImportError::MalformedDocument);
    };

    let title = non_empty_str(fields.get("title")).ok_or(ImportError::MissingTitle)?;

    let Some(Value::Array(raw_items)) = fields.get("items") else {
        return Err(ImportError::MissingItems);
    };

    let mut items = Vec::with_capacity(raw_items.len());
    for (position, raw) in raw_items.iter().enumerate() {
        items.push(validate_item(position, raw)?);
    }

    let mut seen = HashSet::with_capacity(items.len());
    for item in &items {
        if !seen.insert(item.id.as_str()) {
            return Err(ImportError::DuplicateItemId {
                id: item.id.clone(),
            });
        }
    }

    let progress = match fields.get("userProgress") {
        None | Some(Value::Null) => None,
        Some(Value::Object(entries)) => Some(validate_progress(entries)?),
        Some(_) => return Err(ImportError::MalformedProgress),
    };

    Ok(ImportedRoadmap {
        roadmap: Roadmap {
            title: title.to_owned(),
            description: string_or_empty(fields.get("description")),
            items,
        },
        progress,
    })
}

/// Parse and validate in one step.
///
/// # Errors
///
/// Returns `ImportError::ParseFailure` for non-JSON text, otherwise the first
/// violated validation rule.
pub fn import_text(text: &str) -> Result<ImportedRoadmap, ImportError> {
    validate_document(&parse_document(text)?)
}

/// Strict `YYYY-MM-DD` date: zero-padded, ten characters, a real calendar day.
#[must_use]
pub fn parse_deadline(raw: &str) -> Option<NaiveDate> {
    let bytes = raw.as_bytes();
    let shaped = bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !shaped {
        return None;
    }
    NaiveDate::parse_from_str(raw, DEADLINE_FORMAT).ok()
}

//
// ─── ITEMS ─────────────────────────────────────────────────────────────────────
//

fn validate_item(position: usize, raw: &Value) -> Result<Item, ImportError> {
    let Some(fields) = raw.as_object() else {
        return Err(ImportError::MissingItemId { position });
    };
    let id = item_id(fields.get("id")).ok_or(ImportError::MissingItemId { position })?;

    let Some(title) = non_empty_str(fields.get("title")) else {
        return Err(ImportError::MissingItemTitle { id });
    };

    Ok(Item {
        id,
        title: title.to_owned(),
        description: string_or_empty(fields.get("description")),
        resources: resources(fields.get("resources")),
    })
}

/// Non-empty strings are used as-is, non-zero numbers by their decimal form.
fn item_id(value: Option<&Value>) -> Option<ItemId> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(ItemId::new(s.clone())),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(ItemId::new(n.to_string())),
        _ => None,
    }
}

fn resources(value: Option<&Value>) -> Vec<Resource> {
    let Some(Value::Array(raw)) = value else {
        return Vec::new();
    };
    raw.iter()
        .filter_map(Value::as_object)
        .map(|fields| Resource {
            title: string_or_empty(fields.get("title")),
            url: string_or_empty(fields.get("url")),
        })
        .collect()
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn string_or_empty(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_default()
}

//
// ─── PROGRESS ──────────────────────────────────────────────────────────────────
//

fn validate_progress(entries: &Map<String, Value>) -> Result<ProgressMap, ImportError> {
    let mut progress = ProgressMap::new();
    for (id, raw) in entries {
        progress.insert(ItemId::new(id.clone()), progress_entry(id, raw)?);
    }
    Ok(progress)
}

fn progress_entry(id: &str, raw: &Value) -> Result<ProgressEntry, ImportError> {
    let invalid = |reason: String| ImportError::InvalidProgress {
        id: id.to_owned(),
        reason,
    };

    let Value::Object(fields) = raw else {
        return Err(invalid("entry must be an object".into()));
    };

    let status = match fields.get("status") {
        None | Some(Value::Null) => Status::default(),
        Some(Value::String(s)) if s.is_empty() => Status::default(),
        Some(Value::String(s)) => s.parse::<Status>().map_err(|err| invalid(err.to_string()))?,
        Some(_) => return Err(invalid("status must be a string".into())),
    };

    let notes = match fields.get("notes") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(_) => return Err(invalid("notes must be a string".into())),
    };

    let deadline = match fields.get("deadline") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::String(s)) => Some(
            parse_deadline(s)
                .ok_or_else(|| invalid(format!("deadline {s:?} is not a YYYY-MM-DD date")))?,
        ),
        Some(_) => return Err(invalid("deadline must be a YYYY-MM-DD string".into())),
    };

    Ok(ProgressEntry {
        status,
        notes,
        deadline,
    })
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_minimal_document() {
        let imported = validate_document(&json!({
            "title": "T",
            "items": [{"id": "a", "title": "A"}]
        }))
        .unwrap();

        assert_eq!(imported.roadmap.title, "T");
        assert_eq!(imported.roadmap.description, "");
        assert_eq!(imported.roadmap.items, vec![Item::new("a", "A")]);
        assert!(imported.progress.is_none());
    }

    #[test]
    fn rejects_non_object() {
        for doc in [json!([]), json!("roadmap"), json!(null), json!(3)] {
            assert_eq!(validate_document(&doc), Err(ImportError::MalformedDocument));
        }
    }

    #[test]
    fn title_is_checked_before_items() {
        let err = validate_document(&json!({"description": "no title, no items"})).unwrap_err();
        assert_eq!(err, ImportError::MissingTitle);

        let err = validate_document(&json!({"title": "", "items": []})).unwrap_err();
        assert_eq!(err, ImportError::MissingTitle);

        let err = validate_document(&json!({"title": 7, "items": []})).unwrap_err();
        assert_eq!(err, ImportError::MissingTitle);
    }

    #[test]
    fn items_must_be_an_array() {
        let err = validate_document(&json!({"title": "T"})).unwrap_err();
        assert_eq!(err, ImportError::MissingItems);

        let err = validate_document(&json!({"title": "T", "items": {"a": 1}})).unwrap_err();
        assert_eq!(err, ImportError::MissingItems);
    }

    #[test]
    fn empty_items_array_is_valid() {
        let imported = validate_document(&json!({"title": "T", "items": []})).unwrap();
        assert!(imported.roadmap.items.is_empty());
    }

    #[test]
    fn first_bad_item_wins() {
        let err = validate_document(&json!({
            "title": "T",
            "items": [
                {"id": "a", "title": "A"},
                {"id": "b"},
                {"title": "no id"}
            ]
        }))
        .unwrap_err();
        assert_eq!(
            err,
            ImportError::MissingItemTitle {
                id: ItemId::new("b")
            }
        );

        let err = validate_document(&json!({
            "title": "T",
            "items": [{"id": "a", "title": "A"}, {"id": "", "title": "B"}]
        }))
        .unwrap_err();
        assert_eq!(err, ImportError::MissingItemId { position: 1 });
    }

    #[test]
    fn numeric_ids_are_normalized() {
        let imported = validate_document(&json!({
            "title": "T",
            "items": [{"id": 12, "title": "A"}]
        }))
        .unwrap();
        assert_eq!(imported.roadmap.items[0].id, ItemId::new("12"));

        let err = validate_document(&json!({
            "title": "T",
            "items": [{"id": 0, "title": "A"}]
        }))
        .unwrap_err();
        assert_eq!(err, ImportError::MissingItemId { position: 0 });
    }

    #[test]
    fn non_object_item_has_no_id() {
        let err = validate_document(&json!({"title": "T", "items": ["a"]})).unwrap_err();
        assert_eq!(err, ImportError::MissingItemId { position: 0 });
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = validate_document(&json!({
            "title": "T",
            "items": [{"id": "a", "title": "A"}, {"id": "a", "title": "Again"}]
        }))
        .unwrap_err();
        assert_eq!(
            err,
            ImportError::DuplicateItemId {
                id: ItemId::new("a")
            }
        );
    }

    #[test]
    fn optional_fields_default_and_extras_are_ignored() {
        let imported = validate_document(&json!({
            "title": "T",
            "description": "roadmap",
            "version": 3,
            "items": [{
                "id": "a",
                "title": "A",
                "description": "topic",
                "difficulty": "hard",
                "resources": [
                    {"title": "Book", "url": "https://example.com/book"},
                    "not a resource",
                    {"url": "https://example.com/untitled"}
                ]
            }]
        }))
        .unwrap();

        assert_eq!(imported.roadmap.description, "roadmap");
        let item = &imported.roadmap.items[0];
        assert_eq!(item.description, "topic");
        assert_eq!(item.resources.len(), 2);
        assert_eq!(item.resources[0].title, "Book");
        assert_eq!(item.resources[1].title, "");
    }

    #[test]
    fn user_progress_is_parsed() {
        let imported = validate_document(&json!({
            "title": "T",
            "items": [{"id": "a", "title": "A"}],
            "userProgress": {
                "a": {"status": "in_progress", "notes": "n", "deadline": "2024-05-01"},
                "orphan": {"status": "completed"}
            }
        }))
        .unwrap();

        let progress = imported.progress.unwrap();
        assert_eq!(progress.len(), 2);
        let entry = progress.get("a").unwrap();
        assert_eq!(entry.status, Status::InProgress);
        assert_eq!(entry.notes, "n");
        assert_eq!(entry.deadline, NaiveDate::from_ymd_opt(2024, 5, 1));
        assert_eq!(progress.get("orphan").unwrap().status, Status::Completed);
    }

    #[test]
    fn null_user_progress_counts_as_absent() {
        let imported = validate_document(&json!({
            "title": "T",
            "items": [],
            "userProgress": null
        }))
        .unwrap();
        assert!(imported.progress.is_none());
    }

    #[test]
    fn unknown_status_literal_is_rejected() {
        let err = validate_document(&json!({
            "title": "T",
            "items": [{"id": "a", "title": "A"}],
            "userProgress": {"a": {"status": "done"}}
        }))
        .unwrap_err();
        assert!(matches!(err, ImportError::InvalidProgress { ref id, .. } if id == "a"));
    }

    #[test]
    fn bad_deadline_is_rejected() {
        let err = validate_document(&json!({
            "title": "T",
            "items": [{"id": "a", "title": "A"}],
            "userProgress": {"a": {"deadline": "01/02/2024"}}
        }))
        .unwrap_err();
        assert!(matches!(err, ImportError::InvalidProgress { .. }));
    }

    #[test]
    fn deadline_must_be_zero_padded() {
        for raw in ["2024-1-5", "2024-01-5", "24-01-05", "2024/01/05", "2024-02-30", "2024-01-05T00:00"] {
            let err = validate_document(&json!({
                "title": "T",
                "items": [{"id": "a", "title": "A"}],
                "userProgress": {"a": {"deadline": raw}}
            }))
            .unwrap_err();
            assert!(
                matches!(err, ImportError::InvalidProgress { .. }),
                "{raw} should be rejected"
            );
        }

        assert_eq!(parse_deadline("2024-02-29"), NaiveDate::from_ymd_opt(2024, 2, 29));
        assert_eq!(parse_deadline("2024-1-5"), None);
    }

    #[test]
    fn non_object_user_progress_is_rejected() {
        let err = validate_document(&json!({
            "title": "T",
            "items": [],
            "userProgress": ["a"]
        }))
        .unwrap_err();
        assert_eq!(err, ImportError::MalformedProgress);
    }

    #[test]
    fn parse_failure_is_distinct_from_schema_errors() {
        let err = import_text("{\"title\": ").unwrap_err();
        assert!(matches!(err, ImportError::ParseFailure(_)));

        let err = import_text("[]").unwrap_err();
        assert_eq!(err, ImportError::MalformedDocument);
    }
}
