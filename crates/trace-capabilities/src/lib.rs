//! Reusable capabilities for entity types stored in an [`EntityStore`].
//!
//! - [`interval`]: validity windows and "in effect" queries.
//! - [`hierarchy`]: parent/child traversal with filter propagation.
//! - [`status`]: status values scoped to an owner type, with defaults.
//! - [`schema`]: bootstrap registration tying entity types to the above.
//!
//! [`EntityStore`]: trace_storage::EntityStore

pub mod error;
pub mod hierarchy;
pub mod interval;
pub mod schema;
pub mod status;

pub use error::{CapabilityError, Result};
pub use hierarchy::{Hierarchy, HierarchyOptions, Roots, TraversalContext};
pub use schema::{Registration, Schema};
pub use status::{StatusScope, assign_status, default_status};
