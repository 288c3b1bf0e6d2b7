//! Status values scoped to an owner type.
//!
//! Each owner type that composes the status capability has its own set of
//! legal statuses and at most one default. A status defined for `shop.order`
//! can never be assigned to a `shop.invoice` record.

use tracing::debug;

use trace_core::filter::StatusFilter;
use trace_core::owner::OwnerType;
use trace_core::status::StatusDefinition;
use trace_storage::{EntityStore, RecordUpdates};

use crate::error::{CapabilityError, Result};

/// The status field of one owner type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusScope {
    owner_type: OwnerType,
}

impl StatusScope {
    pub fn new(owner_type: OwnerType) -> Self {
        Self { owner_type }
    }

    pub fn owner_type(&self) -> &OwnerType {
        &self.owner_type
    }

    /// Statuses legal for this owner type, in insertion order.
    pub fn candidates<S: EntityStore + ?Sized>(&self, store: &S) -> Result<Vec<StatusDefinition>> {
        Ok(store.query_statuses(&StatusFilter::for_owner(&self.owner_type))?)
    }

    pub fn default_status<S: EntityStore + ?Sized>(
        &self,
        store: &S,
    ) -> Result<Option<StatusDefinition>> {
        default_status(store, &self.owner_type)
    }

    /// Rejects a status owned by another type.
    pub fn validate(&self, status: &StatusDefinition) -> Result<()> {
        if status.applies_to(&self.owner_type) {
            Ok(())
        } else {
            Err(CapabilityError::InvalidStatusAssignment {
                status_id: status.id.clone(),
                status_owner: status.owner_type.to_string(),
                owner_type: self.owner_type.to_string(),
            })
        }
    }

    /// Status for a new record: the explicit one if given, else the default.
    ///
    /// Fails with [`CapabilityError::StatusRequired`] when neither exists.
    pub fn resolve_initial<S: EntityStore + ?Sized>(
        &self,
        store: &S,
        explicit: Option<&str>,
    ) -> Result<StatusDefinition> {
        match explicit {
            Some(id) => {
                let status = store.get_status(id)?;
                self.validate(&status)?;
                Ok(status)
            }
            None => self
                .default_status(store)?
                .ok_or_else(|| CapabilityError::StatusRequired {
                    owner_type: self.owner_type.to_string(),
                }),
        }
    }

    /// Sets the status of an existing record of this owner type.
    pub fn assign<S: EntityStore + ?Sized>(
        &self,
        store: &S,
        record_id: &str,
        status_id: &str,
    ) -> Result<()> {
        let record = store.get_record(record_id)?;
        if record.owner_type != self.owner_type {
            return Err(CapabilityError::OwnerTypeMismatch {
                record_id: record.id,
                expected: self.owner_type.to_string(),
                actual: record.owner_type.to_string(),
            });
        }

        let status = store.get_status(status_id)?;
        self.validate(&status)?;

        let updates = RecordUpdates {
            status_id: Some(Some(status.id)),
            ..RecordUpdates::default()
        };
        store.update_record(record_id, &updates)?;
        debug!(record_id, status_id, "status assigned");
        Ok(())
    }
}

/// The default status of `owner_type`, or `None` when it has none.
///
/// When several statuses are flagged default, the first one inserted wins.
pub fn default_status<S: EntityStore + ?Sized>(
    store: &S,
    owner_type: &OwnerType,
) -> Result<Option<StatusDefinition>> {
    let filter = StatusFilter {
        is_default: Some(true),
        limit: Some(1),
        ..StatusFilter::for_owner(owner_type)
    };
    Ok(store.query_statuses(&filter)?.into_iter().next())
}

/// Assigns `status_id` to a record, scoped by the record's own owner type.
pub fn assign_status<S: EntityStore + ?Sized>(
    store: &S,
    record_id: &str,
    status_id: &str,
) -> Result<()> {
    let record = store.get_record(record_id)?;
    StatusScope::new(record.owner_type).assign(store, record_id, status_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use trace_core::record::RecordBuilder;
    use trace_storage::SqliteStore;

    const ORDER: &str = "shop.order";
    const INVOICE: &str = "shop.invoice";

    fn store_with_statuses() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        for status in [
            StatusDefinition::new(ORDER, "Placed").with_id("placed"),
            StatusDefinition::new(ORDER, "New").with_id("new").default_status(),
            StatusDefinition::new(INVOICE, "Draft").with_id("draft"),
        ] {
            store.insert_status_impl(&status).unwrap();
        }
        store
    }

    #[test]
    fn candidates_are_scoped() {
        let store = store_with_statuses();
        let scope = StatusScope::new(OwnerType::from(ORDER));
        let labels: Vec<String> = scope
            .candidates(&store)
            .unwrap()
            .into_iter()
            .map(|s| s.label)
            .collect();
        assert_eq!(labels, vec!["Placed", "New"]);
    }

    #[test]
    fn missing_default_is_none() {
        let store = store_with_statuses();
        assert!(default_status(&store, &OwnerType::from(INVOICE)).unwrap().is_none());
        assert_eq!(
            default_status(&store, &OwnerType::from(ORDER)).unwrap().unwrap().id,
            "new"
        );
    }

    #[test]
    fn resolve_initial_prefers_explicit() {
        let store = store_with_statuses();
        let scope = StatusScope::new(OwnerType::from(ORDER));
        assert_eq!(scope.resolve_initial(&store, Some("placed")).unwrap().id, "placed");
        assert_eq!(scope.resolve_initial(&store, None).unwrap().id, "new");

        let invoices = StatusScope::new(OwnerType::from(INVOICE));
        let err = invoices.resolve_initial(&store, None).unwrap_err();
        assert!(matches!(err, CapabilityError::StatusRequired { .. }));
        let err = invoices.resolve_initial(&store, Some("placed")).unwrap_err();
        assert!(matches!(err, CapabilityError::InvalidStatusAssignment { .. }));
    }

    #[test]
    fn assign_updates_record() {
        let store = store_with_statuses();
        let id = store
            .insert_record_impl(&RecordBuilder::new(ORDER, "O-1").status("new").build())
            .unwrap();

        assign_status(&store, &id, "placed").unwrap();
        assert_eq!(store.get_record_impl(&id).unwrap().status_id.as_deref(), Some("placed"));

        let err = assign_status(&store, &id, "draft").unwrap_err();
        assert!(matches!(err, CapabilityError::InvalidStatusAssignment { .. }));
        assert_eq!(store.get_record_impl(&id).unwrap().status_id.as_deref(), Some("placed"));
    }

    #[test]
    fn scope_rejects_record_of_other_type() {
        let store = store_with_statuses();
        let id = store
            .insert_record_impl(&RecordBuilder::new(INVOICE, "I-1").build())
            .unwrap();
        let scope = StatusScope::new(OwnerType::from(ORDER));
        let err = scope.assign(&store, &id, "placed").unwrap_err();
        assert!(matches!(err, CapabilityError::OwnerTypeMismatch { .. }));
    }
}
