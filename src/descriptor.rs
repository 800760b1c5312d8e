//! Declarative per-entity configuration and the wire shapes derived from it.
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::StoreError;
use crate::model::{ReferenceItem, SortOrder, SortState};

/// Fields owned by the server; never part of a create or update body.
pub const RESERVED_FIELDS: &[&str] = &[
    "id",
    "isDeleted",
    "createdAt",
    "updatedAt",
    "createAt",
    "updateAt",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub default_column: &'static str,
    pub columns: &'static [&'static str],
}

impl SortSpec {
    pub fn default_state(&self) -> SortState {
        SortState::new(self.default_column, SortOrder::Asc)
    }

    pub fn allows(&self, column: &str) -> bool {
        self.columns.contains(&column)
    }
}

/// Small lookup collection loaded unpaginated for foreign-key selectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceKind {
    /// Slot name on the owning store.
    pub name: &'static str,
    pub route: &'static str,
    /// Key holding the array when the server wraps it in an object.
    pub list_key: Option<&'static str>,
    pub label_field: &'static str,
    pub writable: &'static [&'static str],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub name: &'static str,
    pub route: &'static str,
    /// Key of the page array in list responses; `None` when the server
    /// answers with a bare array.
    pub list_key: Option<&'static str>,
    pub writable: &'static [&'static str],
    pub sorting: Option<SortSpec>,
    pub read_only: bool,
    pub references: &'static [ReferenceKind],
}

impl ResourceDescriptor {
    pub fn item_path(&self, id: &str) -> String {
        format!("{}/{}", self.route, id)
    }

    pub fn reference(&self, name: &str) -> Option<&'static ReferenceKind> {
        self.references.iter().find(|kind| kind.name == name)
    }

    /// Names of reserved fields wrongly listed as writable.
    pub fn validate(&self) -> Result<(), Vec<&'static str>> {
        let mut bad: Vec<&'static str> = reserved_in(self.writable);
        for kind in self.references {
            bad.extend(reserved_in(kind.writable));
        }
        if bad.is_empty() {
            Ok(())
        } else {
            Err(bad)
        }
    }
}

fn reserved_in(fields: &'static [&'static str]) -> Vec<&'static str> {
    fields
        .iter()
        .copied()
        .filter(|f| RESERVED_FIELDS.contains(f))
        .collect()
}

/// Project a record onto the writable allow-list.
///
/// Reserved fields are dropped even when the allow-list names them.
pub fn project_payload<P: Serialize + ?Sized>(
    writable: &[&str],
    record: &P,
) -> Result<Value, StoreError> {
    let value = serde_json::to_value(record).map_err(|e| StoreError::Payload(e.to_string()))?;
    let Value::Object(fields) = value else {
        return Err(StoreError::Payload(format!("expected an object, got {value}")));
    };
    let projected: Map<String, Value> = fields
        .into_iter()
        .filter(|(key, _)| {
            writable.contains(&key.as_str()) && !RESERVED_FIELDS.contains(&key.as_str())
        })
        .collect();
    Ok(Value::Object(projected))
}

/// Decode one list response into the page records and the reported total.
pub fn decode_page<T: DeserializeOwned>(
    descriptor: &ResourceDescriptor,
    body: &str,
) -> Result<(Vec<T>, u64), StoreError> {
    let value: Value = serde_json::from_str(body).map_err(|e| StoreError::Decode(e.to_string()))?;
    let (items, total) = match value {
        Value::Array(items) => {
            let total = items.len() as u64;
            (items, total)
        }
        Value::Object(mut obj) => {
            let key = descriptor.list_key.ok_or_else(|| {
                StoreError::Decode(format!("{} list is expected as a bare array", descriptor.name))
            })?;
            let items = match obj.remove(key) {
                Some(Value::Array(items)) => items,
                _ => return Err(StoreError::Decode(format!("missing '{key}' array"))),
            };
            let total = obj
                .get("total")
                .and_then(as_count)
                .ok_or_else(|| StoreError::Decode("missing numeric 'total'".into()))?;
            (items, total)
        }
        other => return Err(StoreError::Decode(format!("unexpected list body {other}"))),
    };
    let items = items
        .into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<T>, _>>()
        .map_err(|e| StoreError::Decode(format!("{} record: {e}", descriptor.name)))?;
    Ok((items, total))
}

fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Decode a reference list, accepting a bare array or an object wrapping it.
pub fn decode_references(kind: &ReferenceKind, body: &str) -> Result<Vec<ReferenceItem>, StoreError> {
    let value: Value = serde_json::from_str(body).map_err(|e| StoreError::Decode(e.to_string()))?;
    let entries = match value {
        Value::Array(entries) => entries,
        Value::Object(mut obj) => match kind.list_key.and_then(|key| obj.remove(key)) {
            Some(Value::Array(entries)) => entries,
            _ => {
                return Err(StoreError::Decode(format!(
                    "{} reference list has no array",
                    kind.name
                )))
            }
        },
        other => return Err(StoreError::Decode(format!("unexpected reference body {other}"))),
    };
    Ok(entries
        .iter()
        .filter_map(|entry| reference_item(kind, entry))
        .collect())
}

fn reference_item(kind: &ReferenceKind, entry: &Value) -> Option<ReferenceItem> {
    let id = match entry.get("id")? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let label = entry
        .get(kind.label_field)
        .or_else(|| entry.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| id.clone());
    Some(ReferenceItem { id, label })
}

/// Body of a successful mutation; empty bodies carry nothing.
pub fn decode_mutation_body(body: &str) -> Option<Value> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string())))
}
