//! Compile plain JSON data (no schema) into the same [`TreeNode`] shape.
//!
//! Value trees never carry `required_state`. Pre-annotated placeholders are
//! expressed with [`ValueNode::LeafOverride`]. [`ValueNode::from_json`] is the
//! only place that recognizes them in raw JSON (objects with a `preview` or
//! `excelMeta` key); [`ValueNode::Json`] content is always expanded.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::node::{ExcelMeta, IdSequence, NodeType, TreeNode};

/// Root name used by [`build_value_tree`].
pub const VALUE_ROOT_NAME: &str = "root";

const ELLIPSIS: &str = "…";

/// Preview tunables.
#[derive(Debug, Clone)]
pub struct ValueTreeOptions {
    /// Array items or object keys listed in a container preview.
    pub preview_items: usize,
    /// Characters kept from a string before it is cut with `…`.
    pub preview_string_chars: usize,
}

impl Default for ValueTreeOptions {
    fn default() -> Self {
        Self {
            preview_items: 5,
            preview_string_chars: 64,
        }
    }
}

/// Input to the value tree builder.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueNode {
    /// Plain JSON, expanded structurally.
    Json(JsonValue),
    /// Object whose members may themselves be overrides.
    Object(Vec<(String, ValueNode)>),
    /// Array whose items may themselves be overrides.
    Array(Vec<ValueNode>),
    /// Opaque, already-annotated leaf that is emitted as-is.
    LeafOverride(LeafOverride),
}

impl ValueNode {
    /// Convert raw JSON, turning placeholder objects into [`ValueNode::LeafOverride`].
    ///
    /// A placeholder that does not deserialize as a [`LeafOverride`] is
    /// expanded like any other object.
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Object(map) if map.contains_key("preview") || map.contains_key("excelMeta") => {
                match LeafOverride::deserialize(value) {
                    Ok(leaf) => ValueNode::LeafOverride(leaf),
                    Err(err) => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(error = %err, "placeholder leaf expanded as object");
                        #[cfg(not(feature = "tracing"))]
                        let _ = err;
                        Self::object(map)
                    }
                }
            }
            JsonValue::Object(map) => Self::object(map),
            JsonValue::Array(items) => ValueNode::Array(items.iter().map(Self::from_json).collect()),
            other => ValueNode::Json(other.clone()),
        }
    }

    fn object(map: &serde_json::Map<String, JsonValue>) -> Self {
        ValueNode::Object(
            map.iter()
                .map(|(key, value)| (key.clone(), Self::from_json(value)))
                .collect(),
        )
    }
}

impl From<JsonValue> for ValueNode {
    fn from(value: JsonValue) -> Self {
        ValueNode::Json(value)
    }
}

/// Externally injected leaf placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeafOverride {
    /// `unknown` when the placeholder does not say.
    #[serde(rename = "type", default)]
    pub node_type: NodeType,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub preview: Option<String>,
    #[serde(default)]
    pub excel_meta: Option<ExcelMeta>,
}

/// Build a value tree rooted at [`VALUE_ROOT_NAME`] with default options.
///
/// Placeholder objects become opaque leaves, see [`ValueNode::from_json`].
pub fn build_value_tree(value: &JsonValue) -> TreeNode {
    build_named_value_tree(
        VALUE_ROOT_NAME,
        &ValueNode::from_json(value),
        &[],
        &ValueTreeOptions::default(),
    )
}

/// Build a value tree for `value` named `name`, positioned at `path`.
pub fn build_named_value_tree(
    name: &str,
    value: &ValueNode,
    path: &[String],
    options: &ValueTreeOptions,
) -> TreeNode {
    let mut builder = ValueTreeBuilder::new(options.clone());
    let tree = builder.value(name.to_string(), value, &mut path.to_vec());

    #[cfg(feature = "tracing")]
    tracing::debug!(nodes = builder.seq.issued(), "built value tree");

    tree
}

struct ValueTreeBuilder {
    seq: IdSequence,
    options: ValueTreeOptions,
}

impl ValueTreeBuilder {
    fn new(options: ValueTreeOptions) -> Self {
        Self {
            seq: IdSequence::new(),
            options,
        }
    }

    fn value(&mut self, name: String, value: &ValueNode, path: &mut Vec<String>) -> TreeNode {
        match value {
            ValueNode::Json(json) => self.json(name, json, path),
            ValueNode::Object(entries) => {
                let mut node = TreeNode::new(self.seq.next_id(path), name, NodeType::Object);
                node.description = Some(describe_object(entries.len()));
                let mut sorted: Vec<&(String, ValueNode)> = entries.iter().collect();
                sorted.sort_by(|a, b| a.0.cmp(&b.0));
                node.preview = Some(self.list_preview(
                    '{',
                    '}',
                    sorted.iter().map(|(key, _)| key.clone()),
                    sorted.len(),
                ));
                let children = sorted
                    .into_iter()
                    .map(|(key, child)| self.nested(key.clone(), path, |b, n, p| b.value(n, child, p)))
                    .collect();
                node.children = non_empty(children);
                node
            }
            ValueNode::Array(items) => {
                let mut node = TreeNode::new(self.seq.next_id(path), name, NodeType::Array);
                node.description = Some(describe_array(items.len(), items.first().map(node_type)));
                node.preview = Some(self.list_preview(
                    '[',
                    ']',
                    items.iter().map(|item| self.item_preview(item)),
                    items.len(),
                ));
                let children = items
                    .iter()
                    .enumerate()
                    .map(|(idx, item)| self.nested(format!("[{idx}]"), path, |b, n, p| b.value(n, item, p)))
                    .collect();
                node.children = non_empty(children);
                node
            }
            ValueNode::LeafOverride(leaf) => {
                let mut node = TreeNode::new(self.seq.next_id(path), name, leaf.node_type);
                node.description = leaf.description.clone();
                node.preview = leaf.preview.clone();
                node.excel_meta = leaf.excel_meta.clone();
                node
            }
        }
    }

    fn json(&mut self, name: String, value: &JsonValue, path: &mut Vec<String>) -> TreeNode {
        let mut node = TreeNode::new(self.seq.next_id(path), name, json_type(value));
        node.description = describe_json(value);
        node.preview = Some(self.json_preview(value));

        let children = match value {
            JsonValue::Object(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                keys.into_iter()
                    .map(|key| {
                        self.nested(key.clone(), path, |b, n, p| b.json(n, &map[key.as_str()], p))
                    })
                    .collect()
            }
            JsonValue::Array(items) => items
                .iter()
                .enumerate()
                .map(|(idx, item)| self.nested(format!("[{idx}]"), path, |b, n, p| b.json(n, item, p)))
                .collect(),
            _ => Vec::new(),
        };
        node.children = non_empty(children);
        node
    }

    fn nested<F>(&mut self, name: String, path: &mut Vec<String>, build: F) -> TreeNode
    where
        F: FnOnce(&mut Self, String, &mut Vec<String>) -> TreeNode,
    {
        path.push(name.clone());
        let node = build(self, name, path);
        path.pop();
        node
    }

    fn json_preview(&self, value: &JsonValue) -> String {
        match value {
            JsonValue::Object(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                self.list_preview('{', '}', keys.into_iter().cloned(), map.len())
            }
            JsonValue::Array(items) => self.list_preview(
                '[',
                ']',
                items.iter().map(|item| self.scalar_preview(item)),
                items.len(),
            ),
            other => self.scalar_preview(other),
        }
    }

    /// Short form used for items inside a container preview.
    fn scalar_preview(&self, value: &JsonValue) -> String {
        match value {
            JsonValue::String(s) => format!("\"{}\"", truncate(s, self.options.preview_string_chars)),
            JsonValue::Object(_) => format!("{{{ELLIPSIS}}}"),
            JsonValue::Array(_) => format!("[{ELLIPSIS}]"),
            other => other.to_string(),
        }
    }

    fn item_preview(&self, value: &ValueNode) -> String {
        match value {
            ValueNode::Json(json) => self.scalar_preview(json),
            ValueNode::Object(_) => format!("{{{ELLIPSIS}}}"),
            ValueNode::Array(_) => format!("[{ELLIPSIS}]"),
            ValueNode::LeafOverride(leaf) => leaf.preview.clone().unwrap_or_else(|| ELLIPSIS.to_string()),
        }
    }

    fn list_preview(
        &self,
        open: char,
        close: char,
        items: impl Iterator<Item = String>,
        total: usize,
    ) -> String {
        let mut shown: Vec<String> = items.take(self.options.preview_items).collect();
        if total > shown.len() {
            shown.push(ELLIPSIS.to_string());
        }
        format!("{open}{}{close}", shown.join(", "))
    }
}

fn non_empty(children: Vec<TreeNode>) -> Option<Vec<TreeNode>> {
    (!children.is_empty()).then_some(children)
}

/// Runtime type of a JSON value. Whole-valued floats count as integers.
pub fn json_type(value: &JsonValue) -> NodeType {
    match value {
        JsonValue::Object(_) => NodeType::Object,
        JsonValue::Array(_) => NodeType::Array,
        JsonValue::String(_) => NodeType::String,
        JsonValue::Bool(_) => NodeType::Boolean,
        JsonValue::Null => NodeType::Null,
        JsonValue::Number(n) => {
            if n.is_i64() || n.is_u64() {
                NodeType::Integer
            } else {
                match n.as_f64() {
                    Some(f) if f.is_finite() && f.fract() == 0.0 => NodeType::Integer,
                    _ => NodeType::Number,
                }
            }
        }
    }
}

fn node_type(value: &ValueNode) -> NodeType {
    match value {
        ValueNode::Json(json) => json_type(json),
        ValueNode::Object(_) => NodeType::Object,
        ValueNode::Array(_) => NodeType::Array,
        ValueNode::LeafOverride(leaf) => leaf.node_type,
    }
}

fn describe_json(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(format!("string ({} chars)", s.chars().count())),
        JsonValue::Array(items) => Some(describe_array(items.len(), items.first().map(json_type))),
        JsonValue::Object(map) => Some(describe_object(map.len())),
        _ => None,
    }
}

fn describe_array(len: usize, first: Option<NodeType>) -> String {
    match first {
        Some(t) => format!("array of {len} {} (first: {t})", plural(len, "item")),
        None => "array of 0 items".to_string(),
    }
}

fn describe_object(keys: usize) -> String {
    format!("object with {keys} {}", plural(keys, "key"))
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        word.to_string()
    } else {
        format!("{word}s")
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let mut cut: String = s.chars().take(max_chars).collect();
        cut.push_str(ELLIPSIS);
        cut
    }
}
