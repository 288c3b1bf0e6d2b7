//! The generic stored entity and its builder.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::owner::OwnerType;
use crate::window::TimeWindow;

/// A record of some concrete entity type.
///
/// The capability fields (`parent_id`, `window`, `status_id`) are populated
/// only for types that compose the matching capability. Domain-specific
/// fields live in `attributes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Empty until the store assigns an id.
    #[serde(default)]
    pub id: String,

    pub owner_type: OwnerType,

    pub label: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<TimeWindow>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_id: Option<String>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Record {
    /// A node without a parent.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Returns the attribute value for `key`, if present.
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// False for records without a window.
    pub fn is_in_effect_now(&self) -> bool {
        self.window.is_some_and(|w| w.is_in_effect_now())
    }

    /// False for records without a window.
    pub fn is_in_effect_as_of(&self, now: DateTime<Utc>) -> bool {
        self.window.is_some_and(|w| w.is_in_effect_as_of(now))
    }

    /// False for records without a window.
    pub fn is_in_effect_at(&self, instant: DateTime<Utc>) -> bool {
        self.window.is_some_and(|w| w.is_in_effect_at(instant))
    }
}

/// Referential-integrity policy applied when a referenced record is deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletePolicy {
    /// Reject the delete while references exist.
    #[default]
    Protect,
    /// Delete the dependents along with the record.
    Cascade,
}

/// Builder for [`Record`].
pub struct RecordBuilder {
    record: Record,
}

impl RecordBuilder {
    /// Creates a builder for a record of `owner_type` with the given label.
    pub fn new(owner_type: impl Into<OwnerType>, label: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            record: Record {
                id: String::new(),
                owner_type: owner_type.into(),
                label: label.into(),
                parent_id: None,
                window: None,
                status_id: None,
                attributes: Map::new(),
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.record.id = id.into();
        self
    }

    pub fn parent(mut self, parent_id: impl Into<String>) -> Self {
        self.record.parent_id = Some(parent_id.into());
        self
    }

    pub fn window(mut self, window: TimeWindow) -> Self {
        self.record.window = Some(window);
        self
    }

    pub fn status(mut self, status_id: impl Into<String>) -> Self {
        self.record.status_id = Some(status_id.into());
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.record.attributes.insert(key.into(), value.into());
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.record.created_at = at;
        self.record.updated_at = at;
        self
    }

    pub fn build(self) -> Record {
        self.record
    }
}
