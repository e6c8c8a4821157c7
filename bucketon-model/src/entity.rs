use crate::Record;
use bucketon_types::KeyError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A generic record with a JSON payload.
///
/// The `data` field holds arbitrary JSON. Field names used by bucketing
/// conditions resolve first against the built-in attributes (`id`,
/// `entity_type`, `created_at`, `modified_at`, `created_by`), then against
/// top-level keys of `data`. Names starting with `/` are JSON pointers into
/// `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub entity_type: String,
    pub data: Value,
    pub created_at: i64,
    pub modified_at: i64,
    pub created_by: String,
}

impl Entity {
    /// Creates an entity with a fresh UUID v7 id, stamped with the current time.
    pub fn new(entity_type: impl Into<String>, data: Value, created_by: impl Into<String>) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            entity_type: entity_type.into(),
            data,
            created_at: now,
            modified_at: now,
            created_by: created_by.into(),
        }
    }

    /// Extract a string value from `data` using a JSON pointer (e.g., "/title").
    pub fn get_str(&self, pointer: &str) -> Option<&str> {
        self.data.pointer(pointer).and_then(|v| v.as_str())
    }
}

impl Record for Entity {
    fn record_type(&self) -> &str {
        &self.entity_type
    }

    fn record_id(&self) -> &str {
        &self.id
    }

    fn is_recognized_record(&self) -> bool {
        !self.id.trim().is_empty() && !self.entity_type.trim().is_empty()
    }

    fn field(&self, name: &str) -> Result<Value, KeyError> {
        let value = match name {
            "id" => Some(Value::from(self.id.as_str())),
            "entity_type" => Some(Value::from(self.entity_type.as_str())),
            "created_at" => Some(Value::from(self.created_at)),
            "modified_at" => Some(Value::from(self.modified_at)),
            "created_by" => Some(Value::from(self.created_by.as_str())),
            pointer if pointer.starts_with('/') => self.data.pointer(pointer).cloned(),
            key => self.data.get(key).cloned(),
        };
        value.ok_or_else(|| KeyError::MissingField(name.to_string()))
    }
}
