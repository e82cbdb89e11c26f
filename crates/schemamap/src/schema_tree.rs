//! Compile a JSON Schema document into a [`TreeNode`] graph.
//!
//! Supported keywords are the 2020-12 subset listed in the crate docs.
//! `$ref`, `oneOf` and `anyOf` are not resolved; a cyclic schema would
//! recurse without bound.

use std::collections::HashSet;

use serde_json::Value as JsonValue;

use crate::error::SchemaMapError;
use crate::node::{IdSequence, NodeType, RequiredState, TreeNode};
use crate::rules::extract_rules;

/// Root name used when the schema has no `title`.
pub const DEFAULT_ROOT_NAME: &str = "root";

/// Build a tree for a whole schema document.
pub fn build_schema_tree(schema: &JsonValue) -> TreeNode {
    build_schema_subtree(schema, &[], true)
}

/// Build a tree for `schema` as if it sat at `path` below an ancestor chain
/// whose required-ness is `ancestor_chain_required`.
///
/// The returned node carries no `required_state`; that is decided by the
/// parent. Ids restart from zero on every call.
pub fn build_schema_subtree(
    schema: &JsonValue,
    path: &[String],
    ancestor_chain_required: bool,
) -> TreeNode {
    let mut builder = SchemaTreeBuilder {
        seq: IdSequence::new(),
    };
    let name = schema
        .get("title")
        .and_then(JsonValue::as_str)
        .or(path.last().map(String::as_str))
        .unwrap_or(DEFAULT_ROOT_NAME)
        .to_string();
    let mut path = path.to_vec();
    let root = builder.node(schema, name, &mut path, ancestor_chain_required, None);

    #[cfg(feature = "tracing")]
    tracing::debug!(nodes = builder.seq.issued(), "built schema tree");

    root
}

struct SchemaTreeBuilder {
    seq: IdSequence,
}

impl SchemaTreeBuilder {
    /// `chain_required` is true when this node and every ancestor are required.
    fn node(
        &mut self,
        schema: &JsonValue,
        name: String,
        path: &mut Vec<String>,
        chain_required: bool,
        required_state: Option<RequiredState>,
    ) -> TreeNode {
        let node_type = schema_type(schema);
        let mut node = TreeNode::new(self.seq.next_id(path), name, node_type);
        node.required_state = required_state;
        node.rules = extract_rules(schema);
        node.description = description(schema, path).unwrap_or_else(|err| {
            report(&err);
            None
        });

        let mut children = Vec::new();
        match node_type {
            NodeType::Object => self.properties(schema, path, chain_required, &mut children),
            NodeType::Array => {
                let inherited = pass_through(required_state, chain_required);
                match schema.get("items") {
                    Some(JsonValue::Array(tuple)) => {
                        for (idx, item) in tuple.iter().enumerate() {
                            let item_name = format!("[{idx}]");
                            children.push(self.child(item, item_name, path, chain_required, inherited));
                        }
                    }
                    Some(item @ JsonValue::Object(_)) => {
                        children.push(self.child(
                            item,
                            "[item]".to_string(),
                            path,
                            chain_required,
                            inherited,
                        ));
                    }
                    _ => {}
                }
            }
            _ => {}
        }

        if let Some(JsonValue::Array(branches)) = schema.get("allOf") {
            let inherited = pass_through(required_state, chain_required);
            for (idx, branch) in branches.iter().enumerate() {
                let branch_name = branch
                    .get("title")
                    .and_then(JsonValue::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("allOf_{idx}"));
                children.push(self.child(branch, branch_name, path, chain_required, inherited));
            }
        }

        node.children = (!children.is_empty()).then_some(children);
        node
    }

    fn properties(
        &mut self,
        schema: &JsonValue,
        path: &mut Vec<String>,
        chain_required: bool,
        children: &mut Vec<TreeNode>,
    ) {
        let Some(props) = schema.get("properties").and_then(JsonValue::as_object) else {
            return;
        };
        let required = required_names(schema, path).unwrap_or_else(|err| {
            report(&err);
            HashSet::new()
        });

        let mut keys: Vec<&String> = props.keys().collect();
        keys.sort();
        for key in keys {
            let listed = required.contains(key.as_str());
            let state = match (listed, chain_required) {
                (false, _) => RequiredState::Optional,
                (true, true) => RequiredState::Required,
                (true, false) => RequiredState::Conditional,
            };
            children.push(self.child(
                &props[key.as_str()],
                key.clone(),
                path,
                listed && chain_required,
                state,
            ));
        }
    }

    fn child(
        &mut self,
        schema: &JsonValue,
        name: String,
        path: &mut Vec<String>,
        chain_required: bool,
        state: RequiredState,
    ) -> TreeNode {
        path.push(name.clone());
        let node = self.node(schema, name, path, chain_required, Some(state));
        path.pop();
        node
    }
}

/// Required state for positional children (array items, `allOf` branches),
/// which have no `required` list of their own to consult.
fn pass_through(parent: Option<RequiredState>, chain_required: bool) -> RequiredState {
    match parent {
        Some(state) => state,
        None if chain_required => RequiredState::Required,
        None => RequiredState::Optional,
    }
}

/// Normalized type of a schema node.
pub fn schema_type(schema: &JsonValue) -> NodeType {
    match schema.get("type") {
        Some(JsonValue::String(s)) => NodeType::from_keyword(s),
        Some(JsonValue::Array(types)) => types
            .first()
            .and_then(JsonValue::as_str)
            .map_or(NodeType::Unknown, NodeType::from_keyword),
        Some(_) => NodeType::Unknown,
        None if ["properties", "allOf", "oneOf", "anyOf"]
            .iter()
            .any(|k| schema.get(k).is_some()) =>
        {
            NodeType::Object
        }
        None if schema.get("items").is_some() => NodeType::Array,
        None => NodeType::Unknown,
    }
}

fn description(schema: &JsonValue, path: &[String]) -> Result<Option<String>, SchemaMapError> {
    match schema.get("description") {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(malformed(path, "description", format!("expected a string, found {other}"))),
    }
}

fn required_names<'a>(
    schema: &'a JsonValue,
    path: &[String],
) -> Result<HashSet<&'a str>, SchemaMapError> {
    match schema.get("required") {
        None => Ok(HashSet::new()),
        Some(JsonValue::Array(names)) => Ok(names.iter().filter_map(JsonValue::as_str).collect()),
        Some(other) => Err(malformed(path, "required", format!("expected an array, found {other}"))),
    }
}

fn malformed(path: &[String], keyword: &'static str, message: String) -> SchemaMapError {
    SchemaMapError::MalformedKeyword {
        path: if path.is_empty() {
            "<root>".to_string()
        } else {
            path.join(".")
        },
        keyword,
        message,
    }
}

fn report(err: &SchemaMapError) {
    #[cfg(feature = "tracing")]
    tracing::warn!(error = %err, "schema keyword ignored");
    #[cfg(not(feature = "tracing"))]
    let _ = err;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn child<'a>(node: &'a TreeNode, name: &str) -> &'a TreeNode {
        node.children()
            .iter()
            .find(|c| c.name == name)
            .unwrap_or_else(|| panic!("missing child {name}"))
    }

    #[test]
    fn root_uses_title_and_has_no_required_state() {
        let tree = build_schema_tree(&json!({"title": "Person", "type": "object"}));
        assert_eq!(tree.name, "Person");
        assert_eq!(tree.id, ":0");
        assert_eq!(tree.required_state, None);
        assert!(tree.is_leaf());
    }

    #[test]
    fn untitled_root_is_named_root() {
        let tree = build_schema_tree(&json!({"type": "string"}));
        assert_eq!(tree.name, DEFAULT_ROOT_NAME);
        assert_eq!(tree.node_type, NodeType::String);
    }

    #[test]
    fn properties_are_sorted_and_ids_follow_preorder() {
        let tree = build_schema_tree(&json!({
            "type": "object",
            "properties": {
                "zeta": {"type": "string"},
                "alpha": {"type": "object", "properties": {"inner": {"type": "number"}}}
            }
        }));
        let ids: Vec<_> = tree.walk().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, [":0", "alpha:1", "alpha.inner:2", "zeta:3"]);
    }

    #[test]
    fn type_defaults_and_type_arrays() {
        assert_eq!(schema_type(&json!({"properties": {}})), NodeType::Object);
        assert_eq!(schema_type(&json!({"oneOf": []})), NodeType::Object);
        assert_eq!(schema_type(&json!({"items": {}})), NodeType::Array);
        assert_eq!(schema_type(&json!({"type": ["integer", "null"]})), NodeType::Integer);
        assert_eq!(schema_type(&json!({"type": "decimal"})), NodeType::Unknown);
        assert_eq!(schema_type(&json!({})), NodeType::Unknown);
        assert_eq!(schema_type(&json!(true)), NodeType::Unknown);
    }

    #[test]
    fn one_of_only_is_an_object_leaf() {
        let tree = build_schema_tree(&json!({
            "properties": {"choice": {"oneOf": [{"type": "string"}, {"type": "number"}]}}
        }));
        let choice = child(&tree, "choice");
        assert_eq!(choice.node_type, NodeType::Object);
        assert!(choice.is_leaf());
    }

    #[test]
    fn array_items_single_and_tuple() {
        let tree = build_schema_tree(&json!({
            "type": "object",
            "required": ["tags"],
            "properties": {
                "tags": {"type": "array", "items": {"type": "string", "maxLength": 8}},
                "point": {"type": "array", "items": [{"type": "number"}, {"type": "number"}]}
            }
        }));
        let tags = child(&tree, "tags");
        let item = child(tags, "[item]");
        assert_eq!(item.path_key(), "tags.[item]");
        assert_eq!(item.required_state, Some(RequiredState::Required));
        assert_eq!(item.rules.as_deref(), Some(&["maxLength: 8".to_string()][..]));

        let point = child(&tree, "point");
        let names: Vec<_> = point.children().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["[0]", "[1]"]);
        assert!(point
            .children()
            .iter()
            .all(|c| c.required_state == Some(RequiredState::Optional)));
    }

    #[test]
    fn all_of_branches_follow_regular_children() {
        let tree = build_schema_tree(&json!({
            "type": "object",
            "properties": {"id": {"type": "string"}},
            "allOf": [
                {"title": "Audit", "properties": {"createdBy": {"type": "string"}}, "required": ["createdBy"]},
                {"properties": {"note": {"type": "string"}}}
            ]
        }));
        let names: Vec<_> = tree.children().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["id", "Audit", "allOf_1"]);
        let audit = child(&tree, "Audit");
        assert_eq!(audit.required_state, Some(RequiredState::Required));
        assert_eq!(
            child(audit, "createdBy").required_state,
            Some(RequiredState::Required)
        );
        assert_eq!(child(&tree, "id").required_state, Some(RequiredState::Optional));
    }

    #[test]
    fn malformed_description_and_required_degrade() {
        let tree = build_schema_tree(&json!({
            "type": "object",
            "required": "name",
            "properties": {
                "name": {"type": "string", "description": 42, "minLength": 1}
            }
        }));
        let name = child(&tree, "name");
        assert_eq!(name.description, None);
        assert_eq!(name.rules.as_deref(), Some(&["minLength: 1".to_string()][..]));
        assert_eq!(name.required_state, Some(RequiredState::Optional));
    }

    #[test]
    fn subtree_build_honours_path_and_chain() {
        let schema = json!({"type": "object", "required": ["a"], "properties": {"a": {"type": "string"}}});
        let sub = build_schema_subtree(&schema, &["outer".to_string()], false);
        assert_eq!(sub.name, "outer");
        assert_eq!(sub.id, "outer:0");
        let a = child(&sub, "a");
        assert_eq!(a.id, "outer.a:1");
        assert_eq!(a.required_state, Some(RequiredState::Conditional));
    }
}
