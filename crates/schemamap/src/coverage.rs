//! Summary of how much of a reconciled tree is mapped.

use serde::{Deserialize, Serialize};

use crate::node::{RequiredState, TreeNode};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageReport {
    pub leaves: usize,
    pub mapped: usize,
    pub required_leaves: usize,
    pub required_mapped: usize,
    /// Path keys of `required` leaves without a mapping, in pre-order.
    pub unmapped_required: Vec<String>,
}

impl CoverageReport {
    /// True when every required leaf is mapped.
    pub fn is_complete(&self) -> bool {
        self.unmapped_required.is_empty()
    }
}

pub fn report(tree: &TreeNode) -> CoverageReport {
    let mut out = CoverageReport::default();
    for leaf in tree.leaves() {
        out.leaves += 1;
        let mapped = leaf.is_mapped();
        if mapped {
            out.mapped += 1;
        }
        if leaf.required_state == Some(RequiredState::Required) {
            out.required_leaves += 1;
            if mapped {
                out.required_mapped += 1;
            } else {
                out.unmapped_required.push(leaf.path_key().to_string());
            }
        }
    }
    out
}
