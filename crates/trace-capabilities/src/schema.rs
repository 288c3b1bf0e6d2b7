//! Entity type registration.
//!
//! Applications register every concrete entity type once at bootstrap.
//! Registration computes the owner type, records which capabilities the type
//! composes and installs a [`StatusScope`] for types with a status field.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use tracing::{debug, warn};

use trace_core::owner::{EntityDescriptor, EntityType, OwnerType};
use trace_core::record::Record;
use trace_core::validation::validate_record_for;
use trace_storage::EntityStore;

use crate::error::{CapabilityError, Result};
use crate::hierarchy::{Hierarchy, HierarchyOptions};
use crate::status::StatusScope;

/// Outcome of [`Schema::register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    Registered(OwnerType),
    /// Abstract types are templates and get no scoping.
    Skipped,
    /// The owner type cannot be derived yet; see [`Schema::pending`].
    Deferred,
}

/// Registry of entity types and their status scopes.
#[derive(Debug, Default)]
pub struct Schema {
    types: HashMap<OwnerType, EntityDescriptor>,
    status_scopes: HashMap<OwnerType, StatusScope>,
    pending: Vec<EntityDescriptor>,
    hierarchy_options: HierarchyOptions,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds handed to hierarchies built by [`Schema::hierarchy`].
    pub fn with_hierarchy_options(mut self, options: HierarchyOptions) -> Self {
        self.hierarchy_options = options;
        self
    }

    /// Registers a type. Re-registering replaces the previous entry, including
    /// its status scope, and registering the finalized form of a deferred
    /// descriptor completes it.
    ///
    /// Deferred descriptors carry no app label yet, so a finalized descriptor
    /// clears every pending one with the same model name (case-insensitive).
    pub fn register(&mut self, descriptor: EntityDescriptor) -> Registration {
        if descriptor.is_abstract {
            debug!(model = %descriptor.model_name, "skipping abstract entity type");
            return Registration::Skipped;
        }

        self.pending.retain(|d| !d.same_model(&descriptor));

        let Some(owner_type) = descriptor.owner_type() else {
            warn!(model = %descriptor.model_name, "owner type not derivable yet, deferring");
            self.pending.push(descriptor);
            return Registration::Deferred;
        };

        if descriptor.capabilities.status {
            self.register_status_scope(owner_type.clone());
        } else if self.status_scopes.remove(&owner_type).is_some() {
            debug!(owner_type = %owner_type, "status capability dropped, scope removed");
        }
        debug!(owner_type = %owner_type, capabilities = ?descriptor.capabilities, "entity type registered");
        self.types.insert(owner_type.clone(), descriptor);
        Registration::Registered(owner_type)
    }

    pub fn register_type<T: EntityType>(&mut self) -> Registration {
        self.register(T::descriptor())
    }

    /// Installs the status scope for `owner_type`. Calling it again replaces
    /// the scope instead of adding a second one.
    pub fn register_status_scope(&mut self, owner_type: OwnerType) -> &StatusScope {
        let scope = StatusScope::new(owner_type.clone());
        match self.status_scopes.entry(owner_type) {
            Entry::Occupied(mut entry) => {
                entry.insert(scope);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(scope),
        }
    }

    /// Descriptors waiting for an owner type.
    pub fn pending(&self) -> &[EntityDescriptor] {
        &self.pending
    }

    pub fn descriptor(&self, owner_type: &OwnerType) -> Option<&EntityDescriptor> {
        self.types.get(owner_type)
    }

    pub fn status_scope(&self, owner_type: &OwnerType) -> Option<&StatusScope> {
        self.status_scopes.get(owner_type)
    }

    pub fn status_scope_count(&self) -> usize {
        self.status_scopes.len()
    }

    /// A hierarchy over a registered hierarchical type.
    pub fn hierarchy<'s, S: EntityStore + ?Sized>(
        &self,
        store: &'s S,
        owner_type: &OwnerType,
    ) -> Result<Hierarchy<'s, S>> {
        match self.descriptor(owner_type) {
            Some(d) if d.capabilities.hierarchy => {
                Ok(Hierarchy::new(store, owner_type.clone()).with_options(self.hierarchy_options))
            }
            _ => Err(CapabilityError::UnregisteredType(owner_type.to_string())),
        }
    }

    /// Validates a record against its registered type and inserts it.
    ///
    /// For types with a status field, a missing status is filled with the
    /// type's default.
    pub fn create_record<S: EntityStore + ?Sized>(
        &self,
        store: &S,
        mut record: Record,
    ) -> Result<String> {
        let descriptor = self
            .descriptor(&record.owner_type)
            .ok_or_else(|| CapabilityError::UnregisteredType(record.owner_type.to_string()))?;

        if descriptor.capabilities.status {
            let scope = self
                .status_scope(&record.owner_type)
                .ok_or_else(|| CapabilityError::UnregisteredType(record.owner_type.to_string()))?;
            let status = scope.resolve_initial(store, record.status_id.as_deref())?;
            record.status_id = Some(status.id);
        }

        validate_record_for(&record, descriptor)?;
        Ok(store.insert_record(&record)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trace_core::owner::Capabilities;

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
    fn abstract_type_is_skipped() {
        let mut schema = Schema::new();
        assert_eq!(schema.register_type::<Actor>(), Registration::Skipped);
        assert_eq!(schema.status_scope_count(), 0);
    }

    #[test]
    fn concrete_status_type_gets_a_scope() {
        let mut schema = Schema::new();
        let owner = OwnerType::from("actor.company");
        assert_eq!(
            schema.register_type::<Company>(),
            Registration::Registered(owner.clone())
        );
        assert_eq!(schema.status_scope(&owner).unwrap().owner_type(), &owner);
    }

    #[test]
    fn re_registration_is_idempotent() {
        let mut schema = Schema::new();
        schema.register_type::<Company>();
        schema.register_type::<Company>();
        schema.register_status_scope(OwnerType::from("actor.company"));
        assert_eq!(schema.status_scope_count(), 1);
    }

    #[test]
    fn deferred_until_finalized() {
        let mut schema = Schema::new();
        let draft = EntityDescriptor::new("Ticket").capabilities(Capabilities::STATUS);
        assert_eq!(schema.register(draft.clone()), Registration::Deferred);
        assert_eq!(schema.pending().len(), 1);
        assert_eq!(schema.status_scope_count(), 0);

        let finalized = draft.app_label("support");
        assert_eq!(
            schema.register(finalized),
            Registration::Registered(OwnerType::from("support.ticket"))
        );
        assert!(schema.pending().is_empty());
        assert_eq!(schema.status_scope_count(), 1);
    }

    #[test]
    fn re_registration_without_status_drops_scope() {
        let mut schema = Schema::new();
        let owner = OwnerType::from("support.ticket");
        let ticket = EntityDescriptor::new("Ticket").app_label("support");
        schema.register(ticket.clone().capabilities(Capabilities::STATUS));
        assert!(schema.status_scope(&owner).is_some());

        schema.register(ticket.capabilities(Capabilities::NONE));
        assert!(schema.status_scope(&owner).is_none());
        assert!(!schema.descriptor(&owner).unwrap().capabilities.status);
    }

    #[test]
    fn finalizing_clears_pending_regardless_of_case() {
        let mut schema = Schema::new();
        schema.register(EntityDescriptor::new("ticket").capabilities(Capabilities::STATUS));
        schema.register(EntityDescriptor::new("Invoice").capabilities(Capabilities::STATUS));
        assert_eq!(schema.pending().len(), 2);

        schema.register(
            EntityDescriptor::new("Ticket")
                .app_label("support")
                .capabilities(Capabilities::STATUS),
        );
        let pending: Vec<&str> = schema.pending().iter().map(|d| d.model_name.as_str()).collect();
        assert_eq!(pending, vec!["Invoice"]);
    }

    #[test]
    fn hierarchy_requires_capability() {
        let store = trace_storage::SqliteStore::open_in_memory().unwrap();
        let mut schema = Schema::new();
        schema.register(
            EntityDescriptor::new("Contract")
                .app_label("billing")
                .capabilities(Capabilities::TIME_FRAMED),
        );
        schema.register_type::<Company>();

        assert!(schema.hierarchy(&store, &OwnerType::from("actor.company")).is_ok());
        let err = schema
            .hierarchy(&store, &OwnerType::from("billing.contract"))
            .err()
            .unwrap();
        assert!(matches!(err, CapabilityError::UnregisteredType(_)));
    }
}
