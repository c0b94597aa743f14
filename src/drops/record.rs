use crate::clock::Timestamp;
use crate::persistence::{normalize_id, Document, ID_FIELD};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Store-assigned drop identifier, always in string form
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DropId(String);

impl DropId {
    pub fn new(id: impl Into<String>) -> Self {
        DropId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DropId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DropId {
    fn from(id: &str) -> Self {
        DropId(id.to_string())
    }
}

impl From<String> for DropId {
    fn from(id: String) -> Self {
        DropId(id)
    }
}

/// World coordinate
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Position { x, y, z }
    }
}

/// A stored inventory item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredItem {
    /// Catalog identifier
    pub db_name: String,
    pub quantity: u32,
    /// Free-form item metadata
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub data: serde_json::Map<String, Value>,
    /// Any other top-level item fields, kept as-is
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl StoredItem {
    pub fn new(db_name: &str, quantity: u32) -> Self {
        StoredItem {
            db_name: db_name.to_string(),
            quantity,
            data: serde_json::Map::new(),
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_data(mut self, key: &str, value: Value) -> Self {
        self.data.insert(key.to_string(), value);
        self
    }
}

/// What a picked-up drop hands back: the item plus the metadata resolved
/// when it was dropped. Carries no id and no position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropContents {
    #[serde(flatten)]
    pub item: StoredItem,
    pub name: String,
    pub model: String,
    pub expiration: Timestamp,
}

/// A drop that has not been persisted yet
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingDrop {
    #[serde(flatten)]
    pub contents: DropContents,
    #[serde(rename = "pos")]
    pub position: Position,
}

impl PendingDrop {
    pub fn to_document(&self) -> Result<Document, serde_json::Error> {
        match serde_json::to_value(self)? {
            Value::Object(document) => Ok(document),
            _ => Err(serde::ser::Error::custom("drop did not serialize to an object")),
        }
    }
}

/// A persisted, live drop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropRecord {
    #[serde(rename = "_id")]
    pub id: DropId,
    #[serde(flatten)]
    pub contents: DropContents,
    #[serde(rename = "pos")]
    pub position: Position,
}

/// Why a stored document could not become a `DropRecord`
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("document has no usable _id")]
    MissingId,
    #[error("malformed drop document: {0}")]
    Decode(#[from] serde_json::Error),
}

impl DropRecord {
    /// Decode a stored document, normalizing its `_id` to a string.
    pub fn from_document(mut document: Document) -> Result<Self, RecordError> {
        let id = document
            .get(ID_FIELD)
            .and_then(normalize_id)
            .ok_or(RecordError::MissingId)?;
        document.insert(ID_FIELD.to_string(), Value::String(id));
        Ok(serde_json::from_value(Value::Object(document))?)
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.contents.expiration.has_passed(now)
    }

    /// Drop the id and position, keeping only what the picker receives.
    pub fn into_contents(self) -> DropContents {
        self.contents
    }
}
