use thiserror::Error;

use crate::mapping::{FieldRef, TargetNode};

/// Errors surfaced by the schema tree and mapping layers.
///
/// Tree builders never return these for malformed schema content; they
/// degrade per node instead. `MalformedKeyword` is produced internally and
/// logged at the node where it happened.
#[derive(Debug, Error)]
pub enum SchemaMapError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(
        "target `{}` ({}) is already mapped to field `{}` ({}); refusing to map `{}` ({}) without confirmation",
        .target.name,
        .target.node_type,
        .existing.name,
        .existing.field_type,
        .candidate.name,
        .candidate.field_type
    )]
    MappingConflict {
        target: TargetNode,
        existing: FieldRef,
        candidate: FieldRef,
    },

    #[error("invalid mapping batch: {message}")]
    InvalidBatch { message: String },

    #[error("malformed `{keyword}` at `{path}`: {message}")]
    MalformedKeyword {
        path: String,
        keyword: &'static str,
        message: String,
    },
}
