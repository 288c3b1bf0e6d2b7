//! Status definitions.

use serde::{Deserialize, Serialize};

use crate::owner::OwnerType;

/// A status value available to records of one owner type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusDefinition {
    /// Empty until the store assigns an id.
    #[serde(default)]
    pub id: String,

    pub label: String,

    /// Entity type this status applies to.
    pub owner_type: OwnerType,

    /// Default status for new records of `owner_type`. At most one per owner
    /// type is expected; this is not enforced.
    #[serde(default)]
    pub is_default: bool,
}

impl StatusDefinition {
    pub fn new(owner_type: impl Into<OwnerType>, label: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            label: label.into(),
            owner_type: owner_type.into(),
            is_default: false,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn default_status(mut self) -> Self {
        self.is_default = true;
        self
    }

    /// True iff this status may be assigned to records of `owner_type`.
    pub fn applies_to(&self, owner_type: &OwnerType) -> bool {
        self.owner_type == *owner_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_only_to_its_owner_type() {
        let status = StatusDefinition::new("invoice", "Draft").default_status();
        assert!(status.is_default);
        assert!(status.applies_to(&OwnerType::from("invoice")));
        assert!(!status.applies_to(&OwnerType::from("order")));
    }
}
