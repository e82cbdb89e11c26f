//! Schema tree model and mapping reconciliation.
//!
//! This crate compiles JSON Schema documents (or plain JSON values) into a
//! normalized [`TreeNode`] tree, reconciles a collection of [`Mapping`]
//! records between tree leaves and external spreadsheet fields against that
//! tree, and offers a flat search index with snippet extraction. Everything
//! here is synchronous and performs no I/O; rendering, file formats of the
//! spreadsheet side and persistence belong to the embedding application.
//!
//! Accepted schema keywords: `$schema`, `title`, `description`, `type`,
//! `properties`, `items`, `required`, `allOf`, `enum`, `const`, `pattern`,
//! `minLength`, `maxLength`, `format`, `minimum`, `maximum`,
//! `exclusiveMinimum`, `exclusiveMaximum`, `multipleOf`.

pub mod coverage;
mod error;
mod mapping;
mod node;
mod reconcile;
pub mod rules;
mod schema_tree;
pub mod search;
mod store;
mod value_tree;

pub use coverage::{CoverageReport, report as coverage_report};
pub use error::SchemaMapError;
pub use mapping::{
    FieldRef, MAPPING_FORMAT_VERSION, Mapping, MappingBatch, TargetNode, mapping_batch_schema,
};
pub use node::{ExcelMeta, IdSequence, NodeType, RequiredState, TreeNode, Walk, path_key};
pub use reconcile::{detect_conflict, find_conflict, reconcile};
pub use rules::extract_rules;
pub use schema_tree::{DEFAULT_ROOT_NAME, build_schema_subtree, build_schema_tree, schema_type};
pub use search::{SearchEntry, SearchOptions, SearchResult, flatten, search};
pub use store::{
    CommitOutcome, Confirmation, ImportSummary, MappingStore, SharedMappingStore, clear,
};
pub use value_tree::{
    LeafOverride, VALUE_ROOT_NAME, ValueNode, ValueTreeOptions, build_named_value_tree,
    build_value_tree, json_type,
};
