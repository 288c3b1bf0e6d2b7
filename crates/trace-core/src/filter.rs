//! Filter types for querying records and statuses.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::owner::OwnerType;
use crate::validation::{ValidationError, validate_attribute_key, validate_filter_value};
use crate::window::WindowPredicate;

/// Predicate on a single attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrMatch {
    /// The attribute equals the value. `Value::Null` matches a missing or
    /// null attribute.
    Eq(Value),
    /// The attribute equals any of the values (OR).
    AnyOf(Vec<Value>),
    /// The attribute is missing or null.
    IsNull,
}

impl AttrMatch {
    /// Evaluates the predicate against an in-memory attribute value.
    pub fn matches(&self, value: Option<&Value>) -> bool {
        let value = value.unwrap_or(&Value::Null);
        match self {
            Self::Eq(expected) => value == expected,
            Self::AnyOf(options) => options.iter().any(|o| o == value),
            Self::IsNull => value.is_null(),
        }
    }
}

/// Attribute predicates, combined with AND across keys.
///
/// This is also the root filter captured by a hierarchy root selection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeFilter {
    predicates: BTreeMap<String, AttrMatch>,
}

impl AttributeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an equality predicate.
    pub fn eq(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.predicates.insert(key.into(), AttrMatch::Eq(value.into()));
        self
    }

    /// Adds an OR predicate over several values.
    pub fn any_of<V: Into<Value>>(
        mut self,
        key: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.predicates.insert(key.into(), AttrMatch::AnyOf(values));
        self
    }

    /// Adds a null/missing predicate.
    pub fn is_null(mut self, key: impl Into<String>) -> Self {
        self.predicates.insert(key.into(), AttrMatch::IsNull);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrMatch)> {
        self.predicates.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Evaluates every predicate against an attribute map. An empty filter
    /// matches everything.
    pub fn matches(&self, attributes: &serde_json::Map<String, Value>) -> bool {
        self.predicates
            .iter()
            .all(|(key, pred)| pred.matches(attributes.get(key)))
    }

    /// Checks that keys and values can be pushed down to a store.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (key, pred) in &self.predicates {
            validate_attribute_key(key)?;
            match pred {
                AttrMatch::Eq(v) => validate_filter_value(key, v)?,
                AttrMatch::AnyOf(vs) => {
                    for v in vs {
                        validate_filter_value(key, v)?;
                    }
                }
                AttrMatch::IsNull => {}
            }
        }
        Ok(())
    }
}

/// Restriction on the parent reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ParentMatch {
    #[default]
    Any,
    /// `parent_id IS NULL`
    Root,
    /// `parent_id = <id>`
    ChildOf(String),
}

/// Result ordering for record queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecordOrder {
    #[default]
    Id,
    Label,
    CreatedAt,
    Start,
}

/// Filter for record queries.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub owner_type: Option<OwnerType>,

    /// Restrict to these ids (empty = any).
    pub ids: Vec<String>,

    pub parent: ParentMatch,

    pub attributes: AttributeFilter,

    /// Only records whose window satisfies the predicate.
    pub window: Option<WindowPredicate>,

    pub status_id: Option<String>,

    pub order: RecordOrder,

    pub limit: Option<usize>,
}

impl RecordFilter {
    /// Filter over all records of one owner type.
    pub fn for_owner(owner_type: &OwnerType) -> Self {
        Self {
            owner_type: Some(owner_type.clone()),
            ..Self::default()
        }
    }

    pub fn parent(mut self, parent: ParentMatch) -> Self {
        self.parent = parent;
        self
    }

    pub fn attributes(mut self, attributes: AttributeFilter) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn window(mut self, predicate: WindowPredicate) -> Self {
        self.window = Some(predicate);
        self
    }

    pub fn order(mut self, order: RecordOrder) -> Self {
        self.order = order;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Filter for status queries. Results are in insertion order.
#[derive(Debug, Clone, Default)]
pub struct StatusFilter {
    pub owner_type: Option<OwnerType>,
    pub is_default: Option<bool>,
    pub ids: Vec<String>,
    pub limit: Option<usize>,
}

impl StatusFilter {
    pub fn for_owner(owner_type: &OwnerType) -> Self {
        Self {
            owner_type: Some(owner_type.clone()),
            ..Self::default()
        }
    }
}
