//! Traversal of self-referential hierarchies.
//!
//! A [`Hierarchy`] is scoped to one owner type and never crosses it. Root
//! selection returns a [`TraversalContext`] that carries the root filter;
//! passing that context to [`Hierarchy::children`] or
//! [`Hierarchy::filtered_descendants`] applies the same filter at every
//! level. Calls made without a context are unfiltered.

use std::collections::{HashSet, VecDeque};

use tracing::{debug, info, warn};

use trace_config::HierarchyConfig;
use trace_core::filter::{AttributeFilter, ParentMatch, RecordFilter};
use trace_core::owner::OwnerType;
use trace_core::record::Record;
use trace_storage::{EntityStore, RecordUpdates, StorageError};

use crate::error::{CapabilityError, Result};

/// Traversal bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HierarchyOptions {
    /// Deepest level a walk may reach before failing.
    pub max_depth: usize,
}

impl Default for HierarchyOptions {
    fn default() -> Self {
        Self::from(&HierarchyConfig::default())
    }
}

impl From<&HierarchyConfig> for HierarchyOptions {
    fn from(config: &HierarchyConfig) -> Self {
        Self {
            max_depth: config.max_depth,
        }
    }
}

/// The root filter captured by a root selection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraversalContext {
    root_filter: AttributeFilter,
}

impl TraversalContext {
    pub fn new(root_filter: AttributeFilter) -> Self {
        Self { root_filter }
    }

    pub fn root_filter(&self) -> &AttributeFilter {
        &self.root_filter
    }
}

/// Result of [`Hierarchy::roots`].
#[derive(Debug, Clone)]
pub struct Roots {
    pub nodes: Vec<Record>,
    /// Hand this to child and descendant queries to keep the filter.
    pub context: TraversalContext,
}

/// Hierarchy operations over the records of one owner type.
pub struct Hierarchy<'s, S: EntityStore + ?Sized> {
    store: &'s S,
    owner_type: OwnerType,
    options: HierarchyOptions,
}

impl<'s, S: EntityStore + ?Sized> Hierarchy<'s, S> {
    pub fn new(store: &'s S, owner_type: OwnerType) -> Self {
        Self {
            store,
            owner_type,
            options: HierarchyOptions::default(),
        }
    }

    pub fn with_options(mut self, options: HierarchyOptions) -> Self {
        self.options = options;
        self
    }

    pub fn owner_type(&self) -> &OwnerType {
        &self.owner_type
    }

    // -- Queries -------------------------------------------------------------

    /// Parentless nodes matching `filter`, plus the context that carries it.
    pub fn roots(&self, filter: AttributeFilter) -> Result<Roots> {
        let query = RecordFilter::for_owner(&self.owner_type)
            .parent(ParentMatch::Root)
            .attributes(filter.clone());
        let nodes = self.store.query_records(&query)?;
        debug!(owner_type = %self.owner_type, roots = nodes.len(), "selected roots");
        Ok(Roots {
            nodes,
            context: TraversalContext::new(filter),
        })
    }

    /// Direct children of `node_id`, ordered by id. With a context, only
    /// children matching its root filter are returned.
    pub fn children(
        &self,
        node_id: &str,
        context: Option<&TraversalContext>,
    ) -> Result<Vec<Record>> {
        Ok(self.store.query_records(&self.child_filter(node_id, context))?)
    }

    /// Existence check for [`children`](Self::children).
    pub fn has_children(&self, node_id: &str, context: Option<&TraversalContext>) -> Result<bool> {
        Ok(self.store.exists_records(&self.child_filter(node_id, context))?)
    }

    /// Every node below `node_id`, breadth first, excluding `node_id`.
    pub fn descendants(&self, node_id: &str) -> Result<Vec<Record>> {
        self.collect_descendants(node_id, None)
    }

    /// Like [`descendants`](Self::descendants), applying the context's root
    /// filter at every level. A filtered-out node hides its whole subtree.
    pub fn filtered_descendants(
        &self,
        node_id: &str,
        context: &TraversalContext,
    ) -> Result<Vec<Record>> {
        self.collect_descendants(node_id, Some(context))
    }

    /// The chain of nodes from the root down to `node_id`, inclusive.
    pub fn path_from_root(&self, node_id: &str) -> Result<Vec<Record>> {
        let node = self.node(node_id)?;
        let mut visited: HashSet<String> = HashSet::from([node.id.clone()]);
        let mut path = vec![node];

        while let Some(parent_id) = path.last().and_then(|n| n.parent_id.clone()) {
            if path.len() > self.options.max_depth {
                return Err(CapabilityError::DepthLimitExceeded {
                    node_id: node_id.to_owned(),
                    max_depth: self.options.max_depth,
                });
            }
            if !visited.insert(parent_id.clone()) {
                warn!(node_id = %parent_id, "cycle in parent links");
                return Err(CapabilityError::CycleDetected { node_id: parent_id });
            }
            path.push(self.store.get_record(&parent_id)?);
        }

        path.reverse();
        Ok(path)
    }

    // -- Mutation ------------------------------------------------------------

    /// Reparents `node_id` under `new_parent`, or makes it a root.
    ///
    /// Fails with [`CapabilityError::CycleDetected`] when the new parent is
    /// the node itself or one of its descendants. The check and the update
    /// run in one store transaction.
    pub fn move_node(&self, node_id: &str, new_parent: Option<&str>) -> Result<()> {
        self.node(node_id)?;
        if let Some(parent_id) = new_parent {
            self.node(parent_id)?;
        }

        let node_id = node_id.to_owned();
        let new_parent = new_parent.map(str::to_owned);
        self.store.run_in_transaction(&|tx| {
            if let Some(ref parent_id) = new_parent {
                // Walk up from the new parent; meeting the node means it would
                // become its own ancestor.
                let mut seen: HashSet<String> = HashSet::new();
                let mut current = Some(parent_id.clone());
                while let Some(id) = current {
                    if id == node_id || !seen.insert(id.clone()) {
                        return Err(StorageError::CycleDetected { node_id: id });
                    }
                    current = tx.get_record(&id)?.parent_id;
                }
            }
            let updates = RecordUpdates {
                parent_id: Some(new_parent.clone()),
                ..RecordUpdates::default()
            };
            tx.update_record(&node_id, &updates)
        })?;

        info!(node_id = %node_id, parent = ?new_parent, "node moved");
        Ok(())
    }

    // -- Helpers -------------------------------------------------------------

    /// Fetches a node and checks it belongs to this hierarchy.
    fn node(&self, id: &str) -> Result<Record> {
        let record = self.store.get_record(id)?;
        if record.owner_type != self.owner_type {
            return Err(CapabilityError::OwnerTypeMismatch {
                record_id: record.id,
                expected: self.owner_type.to_string(),
                actual: record.owner_type.to_string(),
            });
        }
        Ok(record)
    }

    fn child_filter(&self, node_id: &str, context: Option<&TraversalContext>) -> RecordFilter {
        let filter = RecordFilter::for_owner(&self.owner_type)
            .parent(ParentMatch::ChildOf(node_id.to_owned()));
        match context {
            Some(ctx) => filter.attributes(ctx.root_filter.clone()),
            None => filter,
        }
    }

    fn collect_descendants(
        &self,
        node_id: &str,
        context: Option<&TraversalContext>,
    ) -> Result<Vec<Record>> {
        let mut result = Vec::new();
        let mut visited: HashSet<String> = HashSet::from([node_id.to_owned()]);
        let mut queue: VecDeque<(String, usize)> = VecDeque::from([(node_id.to_owned(), 0)]);

        while let Some((current, depth)) = queue.pop_front() {
            let children = self.children(&current, context)?;
            if children.is_empty() {
                continue;
            }
            if depth >= self.options.max_depth {
                return Err(CapabilityError::DepthLimitExceeded {
                    node_id: node_id.to_owned(),
                    max_depth: self.options.max_depth,
                });
            }
            for child in children {
                if !visited.insert(child.id.clone()) {
                    warn!(node_id = %child.id, start = node_id, "cycle in parent links");
                    return Err(CapabilityError::CycleDetected { node_id: child.id });
                }
                queue.push_back((child.id.clone(), depth + 1));
                result.push(child);
            }
        }

        debug!(node_id, found = result.len(), "collected descendants");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use trace_core::record::RecordBuilder;
    use trace_storage::SqliteStore;

    const DIR: &str = "docs.directory";

    fn insert(store: &SqliteStore, id: &str, parent: Option<&str>, region: &str) {
        let mut builder = RecordBuilder::new(DIR, id).id(id).attribute("region", region);
        if let Some(parent) = parent {
            builder = builder.parent(parent);
        }
        store.insert_record_impl(&builder.build()).unwrap();
    }

    fn ids(records: &[Record]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    /// a -> b -> d, a -> c
    fn sample() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        insert(&store, "a", None, "EU");
        insert(&store, "b", Some("a"), "EU");
        insert(&store, "c", Some("a"), "US");
        insert(&store, "d", Some("b"), "EU");
        store
    }

    #[test]
    fn descendants_exclude_start() {
        let store = sample();
        let h = Hierarchy::new(&store, OwnerType::from(DIR));
        assert_eq!(ids(&h.descendants("a").unwrap()), vec!["b", "c", "d"]);
        assert_eq!(ids(&h.descendants("b").unwrap()), vec!["d"]);
        assert!(h.descendants("d").unwrap().is_empty());
    }

    #[test]
    fn depth_limit() {
        let store = sample();
        let h = Hierarchy::new(&store, OwnerType::from(DIR))
            .with_options(HierarchyOptions { max_depth: 1 });
        let err = h.descendants("a").unwrap_err();
        assert!(matches!(err, CapabilityError::DepthLimitExceeded { max_depth: 1, .. }));

        let err = h.path_from_root("d").unwrap_err();
        assert!(matches!(err, CapabilityError::DepthLimitExceeded { .. }));
        assert_eq!(ids(&h.path_from_root("b").unwrap()), vec!["a", "b"]);
    }

    #[test]
    fn path_from_root_is_root_first() {
        let store = sample();
        let h = Hierarchy::new(&store, OwnerType::from(DIR));
        assert_eq!(ids(&h.path_from_root("d").unwrap()), vec!["a", "b", "d"]);
        assert_eq!(ids(&h.path_from_root("a").unwrap()), vec!["a"]);
    }

    #[test]
    fn has_children_respects_context() {
        let store = sample();
        let h = Hierarchy::new(&store, OwnerType::from(DIR));
        let us = TraversalContext::new(AttributeFilter::new().eq("region", "US"));
        assert!(h.has_children("a", None).unwrap());
        assert!(h.has_children("a", Some(&us)).unwrap());
        assert!(!h.has_children("b", Some(&us)).unwrap());
        assert!(!h.has_children("d", None).unwrap());
    }

    #[test]
    fn move_node_reparents() {
        let store = sample();
        let h = Hierarchy::new(&store, OwnerType::from(DIR));
        h.move_node("d", Some("c")).unwrap();
        assert_eq!(ids(&h.children("c", None).unwrap()), vec!["d"]);
        h.move_node("c", None).unwrap();
        assert_eq!(ids(&h.roots(AttributeFilter::new()).unwrap().nodes), vec!["a", "c"]);
    }

    #[test]
    fn move_under_own_descendant_is_a_cycle() {
        let store = sample();
        let h = Hierarchy::new(&store, OwnerType::from(DIR));
        let err = h.move_node("a", Some("d")).unwrap_err();
        assert!(err.is_cycle());
        assert!(h.move_node("b", Some("b")).unwrap_err().is_cycle());
        // Nothing changed.
        assert_eq!(ids(&h.path_from_root("d").unwrap()), vec!["a", "b", "d"]);
    }

    #[test]
    fn other_owner_type_is_rejected() {
        let store = sample();
        store
            .insert_record_impl(&RecordBuilder::new("docs.folder", "F").id("f").build())
            .unwrap();
        let h = Hierarchy::new(&store, OwnerType::from(DIR));
        let err = h.path_from_root("f").unwrap_err();
        assert!(matches!(err, CapabilityError::OwnerTypeMismatch { .. }));
        assert!(matches!(
            h.move_node("d", Some("f")).unwrap_err(),
            CapabilityError::OwnerTypeMismatch { .. }
        ));
    }

    #[test]
    fn missing_node_is_not_found() {
        let store = sample();
        let h = Hierarchy::new(&store, OwnerType::from(DIR));
        assert!(h.path_from_root("ghost").unwrap_err().is_not_found());
    }
}
