//! Versioned JSON blob envelope with lenient, field-by-field decoding.
//!
//! Blobs are JSON objects carrying a `schemaVersion` field next to their data
//! fields. On load each field is decoded independently so a corrupted field
//! falls back to its default without discarding the rest of the blob.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// Current blob schema version.
///
/// Increment this when a persisted shape changes and add a migration step to
/// [`BlobReader::parse`].
pub const SCHEMA_VERSION: u32 = 1;

const VERSION_FIELD: &str = "schemaVersion";

/// Serialize `value` (which must serialize to an object) with the current
/// schema version stamped in.
pub fn encode_blob<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let mut json = serde_json::to_value(value)?;
    match json.as_object_mut() {
        Some(obj) => {
            obj.insert(VERSION_FIELD.to_string(), Value::from(SCHEMA_VERSION));
        }
        None => {
            let mut obj = Map::new();
            obj.insert(VERSION_FIELD.to_string(), Value::from(SCHEMA_VERSION));
            obj.insert("data".to_string(), json);
            json = Value::Object(obj);
        }
    }
    serde_json::to_string(&json)
}

/// Reader over a decoded blob object.
#[derive(Debug)]
pub struct BlobReader {
    blob: &'static str,
    version: u32,
    fields: Map<String, Value>,
}

impl BlobReader {
    /// Parse a raw blob. Returns `None` (after logging) if the text is not a
    /// JSON object at all.
    pub fn parse(raw: &str, blob: &'static str) -> Option<Self> {
        let value: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(blob, error = %e, "persisted blob is not valid JSON, using defaults");
                return None;
            }
        };
        let Value::Object(fields) = value else {
            tracing::warn!(blob, "persisted blob is not a JSON object, using defaults");
            return None;
        };

        let stored = fields
            .get(VERSION_FIELD)
            .and_then(Value::as_u64)
            .map(|v| u32::try_from(v).unwrap_or(u32::MAX))
            .unwrap_or(0);

        let mut reader = Self {
            blob,
            version: stored,
            fields,
        };
        reader.migrate();
        Some(reader)
    }

    fn migrate(&mut self) {
        if self.version > SCHEMA_VERSION {
            tracing::warn!(
                blob = self.blob,
                version = self.version,
                "persisted blob is newer than this build, reading known fields only"
            );
            return;
        }
        if self.version < 1 {
            // v0 blobs predate the envelope; their field names already match v1.
            self.version = 1;
        }
    }

    /// Raw JSON of a field.
    pub fn raw(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).filter(|v| !v.is_null())
    }

    /// Reader over a nested object field, sharing this blob's version.
    /// Missing or null fields yield `None` silently; non-objects with a
    /// warning.
    pub fn object(&self, name: &str) -> Option<BlobReader> {
        match self.raw(name)? {
            Value::Object(fields) => Some(Self {
                blob: self.blob,
                version: self.version,
                fields: fields.clone(),
            }),
            _ => {
                tracing::warn!(blob = self.blob, field = name, "expected a JSON object, using defaults");
                None
            }
        }
    }

    /// Decode a single field. Missing or null fields yield `None` silently;
    /// fields of the wrong shape yield `None` with a warning.
    pub fn field<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let value = self.raw(name)?;
        match T::deserialize(value) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(blob = self.blob, field = name, error = %e, "dropping malformed field");
                None
            }
        }
    }

    /// Decode a field, falling back to `default`.
    pub fn field_or<T: DeserializeOwned>(&self, name: &str, default: T) -> T {
        self.field(name).unwrap_or(default)
    }
}

/// Decode a JSON array element by element, skipping entries that fail.
pub fn decode_each<T: DeserializeOwned>(value: Option<&Value>, what: &str) -> Vec<T> {
    let Some(Value::Array(items)) = value else {
        if value.is_some() {
            tracing::warn!(what, "expected a JSON array, using empty list");
        }
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match T::deserialize(item) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(what, error = %e, "dropping malformed entry");
                None
            }
        })
        .collect()
}
