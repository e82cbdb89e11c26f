//! Mapping records and the batch format used to move them between the
//! store and an external spreadsheet tool.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use semver::Version;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::SchemaMapError;
use crate::node::{ExcelMeta, NodeType, TreeNode};

/// Current mapping batch format version.
pub const MAPPING_FORMAT_VERSION: &str = "1.0.0";

/// Snapshot of the tree node a mapping points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TargetNode {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Dotted path of the node (its id without the sequence suffix).
    pub path: String,
}

impl TargetNode {
    pub fn from_node(node: &TreeNode) -> Self {
        Self {
            id: node.id.clone(),
            name: node.name.clone(),
            node_type: node.node_type,
            path: node.path_key().to_string(),
        }
    }
}

/// External (spreadsheet-origin) field descriptor. Identity is `(name, field_type)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FieldRef {
    pub name: String,
    pub field_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_essence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dgh: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub always: Option<String>,
}

impl FieldRef {
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            field_essence: None,
            dgh: None,
            always: None,
        }
    }

    /// Same external field, ignoring descriptive metadata.
    pub fn same_identity(&self, other: &FieldRef) -> bool {
        self.name == other.name && self.field_type == other.field_type
    }
}

/// Association between one tree leaf and one external field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Mapping {
    pub target_node: TargetNode,
    pub field: FieldRef,
    /// Free-text transformation description.
    #[serde(default)]
    pub mapping_details: String,
    /// Output contexts this mapping is limited to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Mapping {
    pub fn new(target_node: TargetNode, field: FieldRef) -> Self {
        Self {
            target_node,
            field,
            mapping_details: String::new(),
            outputs: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.mapping_details = details.into();
        self
    }

    pub fn with_outputs(mut self, outputs: impl Into<String>) -> Self {
        self.outputs = Some(outputs.into());
        self
    }

    /// Commit-time dedup key.
    pub fn field_key(&self) -> (&str, &str) {
        (&self.field.name, &self.field.field_type)
    }

    /// Name/type pair used for fallback matching and conflict detection.
    pub fn target_key(&self) -> (&str, NodeType) {
        (&self.target_node.name, self.target_node.node_type)
    }

    /// Import-time dedup key.
    pub fn import_key(&self) -> (&str, NodeType, &str, &str) {
        (
            &self.target_node.name,
            self.target_node.node_type,
            &self.field.name,
            &self.field.field_type,
        )
    }

    /// Annotation attached to the matched leaf. Missing values become empty strings.
    pub fn excel_meta(&self) -> ExcelMeta {
        ExcelMeta {
            field_essence: self.field.field_essence.clone().unwrap_or_default(),
            dgh: self.field.dgh.clone().unwrap_or_default(),
            always: self.field.always.clone().unwrap_or_default(),
            mapping_details: self.mapping_details.clone(),
            outputs: self.outputs.clone().unwrap_or_default(),
        }
    }
}

/// Versioned collection of mappings as exchanged with external tools.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[schemars(
    title = "Schema Mapping Batch",
    description = "Mappings between JSON Schema leaves and external spreadsheet fields."
)]
#[serde(deny_unknown_fields)]
pub struct MappingBatch {
    /// Semantic version of the batch format.
    pub version: String,
    /// Mappings in application order; later entries win ties.
    #[serde(default)]
    pub mappings: Vec<Mapping>,
}

impl MappingBatch {
    pub fn new(mappings: Vec<Mapping>) -> Self {
        Self {
            version: MAPPING_FORMAT_VERSION.to_string(),
            mappings,
        }
    }

    /// Parse and validate a batch from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, SchemaMapError> {
        let batch: Self = serde_json::from_str(json)?;
        batch.validate()?;
        Ok(batch)
    }

    /// Parse and validate a batch from YAML.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, SchemaMapError> {
        let batch: Self = serde_yaml::from_str(yaml)?;
        batch.validate()?;
        Ok(batch)
    }

    pub fn to_json_pretty(&self) -> Result<String, SchemaMapError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_yaml(&self) -> Result<String, SchemaMapError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Check the format version is semver and shares the supported major version.
    pub fn validate(&self) -> Result<(), SchemaMapError> {
        let found = Version::parse(&self.version).map_err(|err| SchemaMapError::InvalidBatch {
            message: format!("invalid version `{}`: {err}", self.version),
        })?;
        let supported =
            Version::parse(MAPPING_FORMAT_VERSION).map_err(|err| SchemaMapError::InvalidBatch {
                message: format!("unsupported format constant: {err}"),
            })?;
        if found.major != supported.major {
            return Err(SchemaMapError::InvalidBatch {
                message: format!(
                    "incompatible major version `{found}` (expected `{}`)",
                    supported.major
                ),
            });
        }
        Ok(())
    }
}

/// JSON Schema describing [`MappingBatch`].
pub fn mapping_batch_schema() -> Result<JsonValue, SchemaMapError> {
    Ok(serde_json::to_value(schemars::schema_for!(MappingBatch))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping() -> Mapping {
        let mut field = FieldRef::new("Surname", "text");
        field.dgh = Some("DGH-7".into());
        Mapping::new(
            TargetNode {
                id: "person.lastName:4".into(),
                name: "lastName".into(),
                node_type: NodeType::String,
                path: "person.lastName".into(),
            },
            field,
        )
        .with_details("trim")
    }

    #[test]
    fn excel_meta_defaults_missing_values() {
        let meta = mapping().excel_meta();
        assert_eq!(meta.dgh, "DGH-7");
        assert_eq!(meta.mapping_details, "trim");
        assert_eq!(meta.field_essence, "");
        assert_eq!(meta.outputs, "");
        assert!(meta.has_content());
    }

    #[test]
    fn keys_project_identity() {
        let m = mapping();
        assert_eq!(m.field_key(), ("Surname", "text"));
        assert_eq!(m.target_key(), ("lastName", NodeType::String));
        assert_eq!(
            m.import_key(),
            ("lastName", NodeType::String, "Surname", "text")
        );
    }

    #[test]
    fn target_from_node_strips_sequence() {
        let node = TreeNode::new("a.b:9", "b", NodeType::Integer);
        let target = TargetNode::from_node(&node);
        assert_eq!(target.path, "a.b");
        assert_eq!(target.id, "a.b:9");
    }

    #[test]
    fn batch_json_and_yaml_parse() {
        let json = MappingBatch::new(vec![mapping()]).to_json_pretty().unwrap();
        let parsed = MappingBatch::from_json_str(&json).unwrap();
        assert_eq!(parsed.mappings, vec![mapping_with_ts(&parsed.mappings[0])]);

        let yaml = r#"
version: "1.2.0"
mappings:
  - targetNode: { id: "x:1", name: x, type: string, path: x }
    field: { name: F, fieldType: text }
    timestamp: "2024-05-01T10:00:00Z"
"#;
        let parsed = MappingBatch::from_yaml_str(yaml).unwrap();
        assert_eq!(parsed.mappings[0].mapping_details, "");
        assert_eq!(parsed.mappings[0].field.name, "F");
    }

    fn mapping_with_ts(parsed: &Mapping) -> Mapping {
        let mut m = mapping();
        m.timestamp = parsed.timestamp;
        m
    }

    #[test]
    fn batch_rejects_bad_versions() {
        let err = MappingBatch::from_json_str(r#"{"version": "2.0.0", "mappings": []}"#)
            .expect_err("major mismatch");
        assert!(matches!(err, SchemaMapError::InvalidBatch { .. }));
        let err = MappingBatch::from_json_str(r#"{"version": "one", "mappings": []}"#)
            .expect_err("not semver");
        assert!(err.to_string().contains("invalid version"));
    }

    #[test]
    fn batch_schema_is_an_object() {
        let schema = mapping_batch_schema().unwrap();
        assert!(schema.is_object());
        assert_eq!(schema["title"], "Schema Mapping Batch");
    }
}
