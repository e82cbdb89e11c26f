//! Annotate a tree with mapping metadata and detect duplicate-target conflicts.

use rustc_hash::FxHashMap;

use crate::mapping::{FieldRef, Mapping, TargetNode};
use crate::node::{NodeType, TreeNode};

/// Lookup tables over a mapping collection. Later mappings overwrite earlier
/// ones with the same key.
struct MappingIndex<'a> {
    by_path: FxHashMap<&'a str, &'a Mapping>,
    /// Fallback keyed by type, then name.
    by_name_type: FxHashMap<NodeType, FxHashMap<&'a str, &'a Mapping>>,
}

impl<'a> MappingIndex<'a> {
    fn new(mappings: &'a [Mapping]) -> Self {
        let mut by_path = FxHashMap::default();
        let mut by_name_type: FxHashMap<NodeType, FxHashMap<&'a str, &'a Mapping>> =
            FxHashMap::default();
        for mapping in mappings {
            by_path.insert(mapping.target_node.path.as_str(), mapping);
            let (name, node_type) = mapping.target_key();
            by_name_type
                .entry(node_type)
                .or_default()
                .insert(name, mapping);
        }
        Self {
            by_path,
            by_name_type,
        }
    }

    /// Exact path first, then the `(name, type)` fallback.
    fn lookup(&self, node: &TreeNode) -> Option<&'a Mapping> {
        self.by_path
            .get(node.path_key())
            .or_else(|| {
                self.by_name_type
                    .get(&node.node_type)
                    .and_then(|by_name| by_name.get(node.name.as_str()))
            })
            .copied()
    }
}

/// Return a copy of `tree` with every matching leaf's `excel_meta` replaced.
///
/// Only leaves carry annotations: containers come out with none, unmatched
/// leaves keep whatever they already had, so the operation is idempotent for a
/// fixed mapping set.
pub fn reconcile(tree: &TreeNode, mappings: &[Mapping]) -> TreeNode {
    let index = MappingIndex::new(mappings);
    let mut annotated = 0usize;
    let out = annotate(tree, &index, &mut annotated);

    #[cfg(feature = "tracing")]
    tracing::debug!(
        mappings = mappings.len(),
        by_path = index.by_path.len(),
        by_name_type = index.by_name_type.values().map(|m| m.len()).sum::<usize>(),
        annotated,
        "reconciled tree"
    );

    out
}

fn annotate(node: &TreeNode, index: &MappingIndex<'_>, annotated: &mut usize) -> TreeNode {
    let children = node
        .children
        .as_ref()
        .map(|children| {
            children
                .iter()
                .map(|child| annotate(child, index, annotated))
                .collect()
        });

    let excel_meta = if node.is_leaf() {
        match index.lookup(node) {
            Some(mapping) => {
                *annotated += 1;
                Some(mapping.excel_meta())
            }
            None => node.excel_meta.clone(),
        }
    } else {
        None
    };

    TreeNode {
        id: node.id.clone(),
        name: node.name.clone(),
        node_type: node.node_type,
        description: node.description.clone(),
        rules: node.rules.clone(),
        required_state: node.required_state,
        preview: node.preview.clone(),
        children,
        excel_meta,
    }
}

/// The stored mapping that would conflict with mapping `field` onto `target`, if any.
///
/// A conflict is a stored mapping with the same target `(name, type)` but a
/// different field identity.
pub fn find_conflict<'a>(
    target: &TargetNode,
    field: &FieldRef,
    existing: &'a [Mapping],
) -> Option<&'a Mapping> {
    let hit = existing.iter().find(|m| {
        m.target_node.name == target.name
            && m.target_node.node_type == target.node_type
            && !m.field.same_identity(field)
    });

    #[cfg(feature = "tracing")]
    {
        if let Some(m) = hit {
            tracing::debug!(
                node = %target.name,
                existing = %m.field.name,
                candidate = %field.name,
                "duplicate-target conflict"
            );
        }
    }

    hit
}

/// Whether mapping `field` onto `target` needs explicit confirmation.
pub fn detect_conflict(target: &TargetNode, field: &FieldRef, existing: &[Mapping]) -> bool {
    find_conflict(target, field, existing).is_some()
}
