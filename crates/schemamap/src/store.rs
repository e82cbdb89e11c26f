//! In-memory mapping collection with commit-time and import-time upserts.
//!
//! Both upserts are read-then-write sequences. [`MappingStore`] assumes a
//! single writer; embeddings with several writers go through
//! [`SharedMappingStore`], which serializes every mutation behind one lock.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::SchemaMapError;
use crate::mapping::{FieldRef, Mapping, MappingBatch, TargetNode};
use crate::node::TreeNode;
use crate::reconcile::find_conflict;

/// Result of a single commit.
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    Inserted,
    /// The field was already mapped; the previous mapping is returned.
    Replaced(Mapping),
}

/// Counts from a bulk import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: usize,
    pub replaced: usize,
}

/// Caller's answer to a duplicate-target conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Unconfirmed,
    Confirmed,
}

/// Ordered mapping collection. Order matters: later entries win reconciliation ties.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappingStore {
    mappings: Vec<Mapping>,
}

impl MappingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mapping> {
        self.mappings.iter()
    }

    /// Upsert keyed by field identity. A field maps to one target at a time,
    /// so an existing mapping for the same field is replaced without asking.
    pub fn commit(&mut self, mapping: Mapping) -> CommitOutcome {
        let previous = self
            .mappings
            .iter()
            .position(|m| m.field_key() == mapping.field_key())
            .map(|idx| self.mappings.remove(idx));
        self.mappings.push(mapping);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            replaced = previous.is_some(),
            size = self.mappings.len(),
            "committed mapping"
        );

        match previous {
            Some(old) => CommitOutcome::Replaced(old),
            None => CommitOutcome::Inserted,
        }
    }

    /// [`commit`](Self::commit) behind the duplicate-target gate.
    ///
    /// Fails with [`SchemaMapError::MappingConflict`] when the target already
    /// carries a different field, unless the caller has confirmed.
    pub fn commit_guarded(
        &mut self,
        mapping: Mapping,
        confirmation: Confirmation,
    ) -> Result<CommitOutcome, SchemaMapError> {
        if confirmation == Confirmation::Unconfirmed {
            if let Some(existing) =
                find_conflict(&mapping.target_node, &mapping.field, &self.mappings)
            {
                return Err(SchemaMapError::MappingConflict {
                    target: mapping.target_node.clone(),
                    existing: existing.field.clone(),
                    candidate: mapping.field.clone(),
                });
            }
        }
        Ok(self.commit(mapping))
    }

    /// Merge keyed by `(target name, target type, field name, field type)`.
    /// Entries differing in any part coexist; within the batch later entries win.
    pub fn import_batch(&mut self, mappings: impl IntoIterator<Item = Mapping>) -> ImportSummary {
        let mut summary = ImportSummary::default();
        for mapping in mappings {
            match self
                .mappings
                .iter()
                .position(|m| m.import_key() == mapping.import_key())
            {
                Some(idx) => {
                    self.mappings.remove(idx);
                    summary.replaced += 1;
                }
                None => summary.inserted += 1,
            }
            self.mappings.push(mapping);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            inserted = summary.inserted,
            replaced = summary.replaced,
            size = self.mappings.len(),
            "imported mappings"
        );

        summary
    }

    /// Import a validated batch.
    pub fn import(&mut self, batch: MappingBatch) -> Result<ImportSummary, SchemaMapError> {
        batch.validate()?;
        Ok(self.import_batch(batch.mappings))
    }

    /// Drop the mapping for one external field.
    pub fn remove_field(&mut self, name: &str, field_type: &str) -> Option<Mapping> {
        let idx = self
            .mappings
            .iter()
            .position(|m| m.field_key() == (name, field_type))?;
        Some(self.mappings.remove(idx))
    }

    /// Whether mapping `field` onto `target` needs confirmation.
    pub fn has_conflict(&self, target: &TargetNode, field: &FieldRef) -> bool {
        find_conflict(target, field, &self.mappings).is_some()
    }

    /// Empty the store, returning how many mappings were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.mappings.len();
        self.mappings.clear();

        #[cfg(feature = "tracing")]
        tracing::debug!(dropped, "cleared mapping store");

        dropped
    }

    pub fn to_batch(&self) -> MappingBatch {
        MappingBatch::new(self.mappings.clone())
    }
}

/// Empty `store` and strip every annotation from `tree`.
pub fn clear(store: &mut MappingStore, tree: &mut TreeNode) -> usize {
    let dropped = store.clear();
    tree.strip_excel_meta();
    dropped
}

/// Clonable handle that serializes mutations of one [`MappingStore`].
#[derive(Debug, Clone, Default)]
pub struct SharedMappingStore {
    inner: Arc<Mutex<MappingStore>>,
}

impl SharedMappingStore {
    pub fn new(store: MappingStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    pub fn commit(&self, mapping: Mapping) -> CommitOutcome {
        self.inner.lock().commit(mapping)
    }

    /// Conflict check and write happen under the same lock.
    pub fn commit_guarded(
        &self,
        mapping: Mapping,
        confirmation: Confirmation,
    ) -> Result<CommitOutcome, SchemaMapError> {
        self.inner.lock().commit_guarded(mapping, confirmation)
    }

    pub fn import_batch(&self, mappings: impl IntoIterator<Item = Mapping>) -> ImportSummary {
        self.inner.lock().import_batch(mappings)
    }

    pub fn remove_field(&self, name: &str, field_type: &str) -> Option<Mapping> {
        self.inner.lock().remove_field(name, field_type)
    }

    pub fn clear(&self, tree: &mut TreeNode) -> usize {
        clear(&mut self.inner.lock(), tree)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Copy of the current mappings, in store order.
    pub fn snapshot(&self) -> Vec<Mapping> {
        self.inner.lock().mappings().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{ExcelMeta, NodeType};

    fn target(name: &str, node_type: NodeType) -> TargetNode {
        TargetNode {
            id: format!("{name}:1"),
            name: name.into(),
            node_type,
            path: name.into(),
        }
    }

    fn mapping(target_name: &str, field: &str) -> Mapping {
        Mapping::new(target(target_name, NodeType::String), FieldRef::new(field, "text"))
    }

    #[test]
    fn commit_replaces_same_field() {
        let mut store = MappingStore::new();
        assert_eq!(store.commit(mapping("a", "F")), CommitOutcome::Inserted);
        let outcome = store.commit(mapping("b", "F"));
        assert!(matches!(outcome, CommitOutcome::Replaced(old) if old.target_node.name == "a"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.mappings()[0].target_node.name, "b");
    }

    #[test]
    fn commit_keeps_distinct_field_types() {
        let mut store = MappingStore::new();
        store.commit(mapping("a", "F"));
        store.commit(Mapping::new(
            target("a", NodeType::String),
            FieldRef::new("F", "number"),
        ));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn replaced_commit_moves_to_end() {
        let mut store = MappingStore::new();
        store.commit(mapping("a", "F1"));
        store.commit(mapping("b", "F2"));
        store.commit(mapping("c", "F1"));
        let fields: Vec<_> = store.iter().map(|m| m.field.name.as_str()).collect();
        assert_eq!(fields, ["F2", "F1"]);
    }

    #[test]
    fn import_merges_on_four_part_key() {
        let mut store = MappingStore::new();
        let first = mapping("a", "F").with_details("first");
        let second = mapping("a", "F").with_details("second");
        let summary = store.import_batch([first, second]);
        assert_eq!(summary, ImportSummary { inserted: 1, replaced: 1 });
        assert_eq!(store.len(), 1);
        assert_eq!(store.mappings()[0].mapping_details, "second");

        // same field, different target: coexists under import, unlike commit
        store.import_batch([mapping("b", "F")]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn guarded_commit_requires_confirmation_on_conflict() {
        let mut store = MappingStore::new();
        store.commit(mapping("X", "F1"));

        let err = store
            .commit_guarded(mapping("X", "F2"), Confirmation::Unconfirmed)
            .expect_err("conflict expected");
        match err {
            SchemaMapError::MappingConflict {
                existing,
                candidate,
                ..
            } => {
                assert_eq!(existing.name, "F1");
                assert_eq!(candidate.name, "F2");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(store.len(), 1);

        // re-saving the same field onto the same target is not a conflict
        let outcome = store
            .commit_guarded(mapping("X", "F1").with_details("v2"), Confirmation::Unconfirmed)
            .expect("identical field is not a conflict");
        assert!(matches!(outcome, CommitOutcome::Replaced(_)));

        store
            .commit_guarded(mapping("X", "F2"), Confirmation::Confirmed)
            .expect("confirmed commit proceeds");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn remove_field_unmaps() {
        let mut store = MappingStore::new();
        store.commit(mapping("a", "F"));
        assert!(store.remove_field("F", "number").is_none());
        assert_eq!(store.remove_field("F", "text").unwrap().target_node.name, "a");
        assert!(store.is_empty());
    }

    #[test]
    fn clear_empties_store_and_tree() {
        let mut store = MappingStore::new();
        store.commit(mapping("a", "F"));
        let mut tree = TreeNode::new(":0", "root", NodeType::Object);
        let mut leaf = TreeNode::new("a:1", "a", NodeType::String);
        leaf.excel_meta = Some(ExcelMeta::default());
        tree.children = Some(vec![leaf]);

        assert_eq!(clear(&mut store, &mut tree), 1);
        assert!(store.is_empty());
        assert!(tree.walk().all(|n| n.excel_meta.is_none()));
    }

    #[test]
    fn shared_store_serializes_writers() {
        let shared = SharedMappingStore::default();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = shared.clone();
                std::thread::spawn(move || {
                    for j in 0..25 {
                        store.commit(mapping(&format!("t{i}"), &format!("F{}", j % 5)));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        // five distinct fields, each mapped exactly once
        assert_eq!(shared.len(), 5);
        let mut fields: Vec<_> = shared.snapshot().into_iter().map(|m| m.field.name).collect();
        fields.sort();
        assert_eq!(fields, ["F0", "F1", "F2", "F3", "F4"]);
    }
}
