//! Persisted state record
//!
//! The one record a caller persists per resource: the serialized id plus the
//! encoded model. The engine never interprets the storage medium — records
//! are handed back verbatim on every subsequent Read/Update/Delete/Import.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use totonoe_core::ResourceId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateRecord {
    /// Serialized resource id; round-trips through `ResourceId::parse`
    pub id: String,

    /// Encoded model attributes
    pub attributes: Value,

    /// When the record was last written
    pub updated_at: DateTime<Utc>,
}

impl StateRecord {
    pub fn new(id: &ResourceId, attributes: Value) -> Self {
        Self {
            id: id.to_string(),
            attributes,
            updated_at: Utc::now(),
        }
    }

    /// Replace the attributes after a successful Read or Update
    pub fn refresh(&mut self, attributes: Value) {
        self.attributes = attributes;
        self.updated_at = Utc::now();
    }
}
