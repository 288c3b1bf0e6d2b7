//! Owner types and entity descriptors.
//!
//! An [`OwnerType`] is the stable tag identifying a concrete entity type. It
//! is the only thing the discriminator of a record is used for: statuses are
//! scoped by it and hierarchies never cross it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

/// Stable identifier of a concrete entity type, conventionally
/// `"<app_label>.<model_name>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerType(String);

impl OwnerType {
    /// Builds the namespaced owner type for a model.
    ///
    /// The model name is lower-cased so that `Actor` and `actor` resolve to
    /// the same scope.
    pub fn namespaced(app_label: &str, model_name: &str) -> Self {
        Self(format!("{}.{}", app_label, model_name.to_lowercase()))
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the segment after the last `.`, or the whole tag.
    pub fn model_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for OwnerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OwnerType {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for OwnerType {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for OwnerType {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The set of capabilities an entity type composes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Records carry a `[start, end]` validity window.
    #[serde(default)]
    pub time_framed: bool,
    /// Records carry a self-referential parent.
    #[serde(default)]
    pub hierarchy: bool,
    /// Records carry a status scoped to their owner type.
    #[serde(default)]
    pub status: bool,
}

impl Capabilities {
    pub const NONE: Self = Self {
        time_framed: false,
        hierarchy: false,
        status: false,
    };
    pub const TIME_FRAMED: Self = Self {
        time_framed: true,
        ..Self::NONE
    };
    pub const HIERARCHY: Self = Self {
        hierarchy: true,
        ..Self::NONE
    };
    pub const STATUS: Self = Self {
        status: true,
        ..Self::NONE
    };

    /// Const-friendly union, usable in associated constants.
    pub const fn with(self, other: Self) -> Self {
        Self {
            time_framed: self.time_framed || other.time_framed,
            hierarchy: self.hierarchy || other.hierarchy,
            status: self.status || other.status,
        }
    }
}

impl BitOr for Capabilities {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.with(rhs)
    }
}

/// Runtime description of an entity type, used at registration time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    /// Namespace of the type. `None` until the type is finalized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_label: Option<String>,

    pub model_name: String,

    /// Template-only types are never instantiated and get no scoping.
    #[serde(default)]
    pub is_abstract: bool,

    #[serde(default)]
    pub capabilities: Capabilities,
}

impl EntityDescriptor {
    /// Creates an unfinalized, concrete descriptor with no capabilities.
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            app_label: None,
            model_name: model_name.into(),
            is_abstract: false,
            capabilities: Capabilities::NONE,
        }
    }

    pub fn app_label(mut self, app_label: impl Into<String>) -> Self {
        self.app_label = Some(app_label.into());
        self
    }

    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Whether both descriptors name the same model, ignoring case as owner
    /// types do.
    pub fn same_model(&self, other: &EntityDescriptor) -> bool {
        self.model_name.to_lowercase() == other.model_name.to_lowercase()
    }

    /// Returns the owner type, or `None` for abstract types and for types
    /// that are not finalized yet (no app label, empty model name).
    pub fn owner_type(&self) -> Option<OwnerType> {
        if self.is_abstract || self.model_name.is_empty() {
            return None;
        }
        let app_label = self.app_label.as_deref().filter(|l| !l.is_empty())?;
        Some(OwnerType::namespaced(app_label, &self.model_name))
    }
}

/// Compile-time declaration of a concrete entity type.
///
/// ```
/// use trace_core::owner::{Capabilities, EntityType};
///
/// struct Directory;
///
/// impl EntityType for Directory {
///     const APP_LABEL: &'static str = "docs";
///     const MODEL_NAME: &'static str = "Directory";
///     const CAPABILITIES: Capabilities = Capabilities::HIERARCHY;
/// }
///
/// assert_eq!(Directory::owner_type().unwrap().as_str(), "docs.directory");
/// ```
pub trait EntityType {
    const APP_LABEL: &'static str;
    const MODEL_NAME: &'static str;
    const ABSTRACT: bool = false;
    const CAPABILITIES: Capabilities = Capabilities::NONE;

    fn descriptor() -> EntityDescriptor {
        EntityDescriptor {
            app_label: Some(Self::APP_LABEL.to_owned()),
            model_name: Self::MODEL_NAME.to_owned(),
            is_abstract: Self::ABSTRACT,
            capabilities: Self::CAPABILITIES,
        }
    }

    fn owner_type() -> Option<OwnerType> {
        Self::descriptor().owner_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Actor;

    impl EntityType for Actor {
        const APP_LABEL: &'static str = "actor";
        const MODEL_NAME: &'static str = "Actor";
        const ABSTRACT: bool = true;
        const CAPABILITIES: Capabilities = Capabilities::STATUS;
    }

    struct Company;

    impl EntityType for Company {
        const APP_LABEL: &'static str = "actor";
        const MODEL_NAME: &'static str = "Company";
        const CAPABILITIES: Capabilities = Capabilities::STATUS.with(Capabilities::HIERARCHY);
    }

    #[test]
    fn namespaced_owner_type_lowercases_model() {
        let owner = OwnerType::namespaced("actor", "Company");
        assert_eq!(owner.as_str(), "actor.company");
        assert_eq!(owner.model_name(), "company");
    }

    #[test]
    fn bare_tag_model_name_is_whole_tag() {
        assert_eq!(OwnerType::from("invoice").model_name(), "invoice");
    }

    #[test]
    fn abstract_types_have_no_owner_type() {
        assert!(Actor::owner_type().is_none());
        assert_eq!(
            Company::owner_type(),
            Some(OwnerType::from("actor.company"))
        );
    }

    #[test]
    fn unfinalized_descriptor_has_no_owner_type() {
        let descriptor = EntityDescriptor::new("invoice");
        assert!(descriptor.owner_type().is_none());
        assert_eq!(
            descriptor.app_label("billing").owner_type(),
            Some(OwnerType::from("billing.invoice"))
        );
    }

    #[test]
    fn same_model_ignores_case_and_app_label() {
        let draft = EntityDescriptor::new("ticket");
        assert!(draft.same_model(&EntityDescriptor::new("Ticket").app_label("support")));
        assert!(!draft.same_model(&EntityDescriptor::new("Tickets")));
    }

    #[test]
    fn capabilities_union() {
        let caps = Capabilities::TIME_FRAMED | Capabilities::STATUS;
        assert!(caps.time_framed);
        assert!(caps.status);
        assert!(!caps.hierarchy);
        assert_eq!(Company::CAPABILITIES, Capabilities::HIERARCHY | Capabilities::STATUS);
    }
}
