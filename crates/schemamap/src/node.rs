//! Normalized tree representation shared by the schema and value builders.
//!
//! A [`TreeNode`] id has the form `<dotted.path>:<sequence>`. The dotted path
//! is empty for the root and is the only part downstream matching relies on;
//! the sequence is unique within one build and nothing else.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Normalized node type.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Object,
    Array,
    String,
    Number,
    Integer,
    Boolean,
    Null,
    #[default]
    #[serde(other)]
    Unknown,
}

impl NodeType {
    /// Parse a JSON Schema `type` keyword value. Unrecognized names map to `Unknown`.
    pub fn from_keyword(s: &str) -> Self {
        match s {
            "object" => Self::Object,
            "array" => Self::Array,
            "string" => Self::String,
            "number" => Self::Number,
            "integer" => Self::Integer,
            "boolean" => Self::Boolean,
            "null" => Self::Null,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Object => "object",
            Self::Array => "array",
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Null => "null",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a schema field must always, conditionally, or never be supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequiredState {
    /// Listed in the parent's `required` and every ancestor is required too.
    Required,
    /// Listed in the parent's `required`, but some ancestor is optional.
    Conditional,
    /// Not listed in the parent's `required`.
    Optional,
}

/// Mapping annotation attached to a leaf by the reconciler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExcelMeta {
    #[serde(default)]
    pub field_essence: String,
    #[serde(default)]
    pub dgh: String,
    #[serde(default)]
    pub always: String,
    #[serde(default)]
    pub mapping_details: String,
    #[serde(default)]
    pub outputs: String,
}

impl ExcelMeta {
    /// True when at least one sub-value is non-empty.
    pub fn has_content(&self) -> bool {
        [
            &self.field_essence,
            &self.dgh,
            &self.always,
            &self.mapping_details,
            &self.outputs,
        ]
        .iter()
        .any(|s| !s.is_empty())
    }
}

/// One schema or value element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Constraint strings. Never `Some(vec![])`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<String>>,
    /// Only set on schema-derived, non-root nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_state: Option<RequiredState>,
    /// Short rendering of the underlying value (value trees only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<TreeNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excel_meta: Option<ExcelMeta>,
}

impl TreeNode {
    pub fn new(id: impl Into<String>, name: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            node_type,
            description: None,
            rules: None,
            required_state: None,
            preview: None,
            children: None,
            excel_meta: None,
        }
    }

    /// The dotted-path portion of the id (everything before the first `:`).
    pub fn path_key(&self) -> &str {
        path_key(&self.id)
    }

    pub fn is_leaf(&self) -> bool {
        self.children.as_ref().is_none_or(|c| c.is_empty())
    }

    pub fn is_mapped(&self) -> bool {
        self.excel_meta.as_ref().is_some_and(ExcelMeta::has_content)
    }

    pub fn children(&self) -> &[TreeNode] {
        self.children.as_deref().unwrap_or_default()
    }

    /// Pre-order traversal starting at (and including) this node.
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }

    pub fn leaves(&self) -> impl Iterator<Item = &TreeNode> {
        self.walk().filter(|n| n.is_leaf())
    }

    /// First node in pre-order whose path key equals `path`.
    pub fn find_by_path(&self, path: &str) -> Option<&TreeNode> {
        self.walk().find(|n| n.path_key() == path)
    }

    /// Remove `excel_meta` from every node in the subtree. Returns how many were removed.
    pub fn strip_excel_meta(&mut self) -> usize {
        let mut stripped = usize::from(self.excel_meta.take().is_some());
        if let Some(children) = &mut self.children {
            for child in children {
                stripped += child.strip_excel_meta();
            }
        }
        stripped
    }

    /// Equality that ignores the per-build sequence suffix of every id.
    pub fn structurally_eq(&self, other: &TreeNode) -> bool {
        self.path_key() == other.path_key()
            && self.name == other.name
            && self.node_type == other.node_type
            && self.description == other.description
            && self.rules == other.rules
            && self.required_state == other.required_state
            && self.preview == other.preview
            && self.excel_meta == other.excel_meta
            && self.children.is_some() == other.children.is_some()
            && self.children().len() == other.children().len()
            && self
                .children()
                .iter()
                .zip(other.children())
                .all(|(a, b)| a.structurally_eq(b))
    }
}

/// Pre-order iterator over a [`TreeNode`] subtree.
pub struct Walk<'a> {
    stack: Vec<&'a TreeNode>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a TreeNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children().iter().rev());
        Some(node)
    }
}

/// Everything before the first `:` of a node id.
pub fn path_key(id: &str) -> &str {
    id.split_once(':').map_or(id, |(path, _)| path)
}

/// Sequence generator scoped to one build invocation.
///
/// Each builder entry point creates a fresh sequence, so concurrent or
/// repeated builds never share counter state.
#[derive(Debug, Default)]
pub struct IdSequence {
    next: u64,
}

impl IdSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one tick and format an id for `path`.
    pub fn next_id(&mut self, path: &[String]) -> String {
        let seq = self.next;
        self.next += 1;
        format!("{}:{}", path.join("."), seq)
    }

    pub fn issued(&self) -> u64 {
        self.next
    }
}
