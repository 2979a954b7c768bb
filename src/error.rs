use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::domain::{EntityKind, GraphKind};

#[derive(Debug, Error, Diagnostic)]
pub enum DirectoryError {
    #[error("duplicate id in {graph} graph: {id}")]
    #[diagnostic(help("the catalog snapshot contains two records sharing this identifier"))]
    DuplicateId { graph: GraphKind, id: String },

    #[error("dangling reference in {graph} graph: {from} -> {to}")]
    #[diagnostic(help("the referenced record does not exist in the snapshot"))]
    DanglingReference {
        graph: GraphKind,
        from: String,
        to: String,
    },

    #[error("collection {id} is listed as a sub-collection of {listed_by} but its parent is {parent:?}")]
    #[diagnostic(help("`sub_collections` must agree with the sub-collection's `parent_collection`"))]
    ConflictingParent {
        id: String,
        parent: Option<String>,
        listed_by: String,
    },

    #[error("cycle in collection hierarchy involving {id}")]
    HierarchyCycle { id: String },

    #[error("{graph} graph is frozen")]
    GraphFrozen { graph: GraphKind },

    #[error("unsupported countability metric: {0}")]
    UnsupportedMetric(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("invalid entity kind: {0}")]
    InvalidEntityKind(String),

    #[error("failed to parse {kind} record: {message}")]
    RecordParse { kind: EntityKind, message: String },

    #[error("catalog source failed: {0}")]
    Catalog(String),

    #[error("missing config file kira-bd.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl DirectoryError {
    /// Errors meaning the snapshot itself cannot be trusted.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            DirectoryError::DuplicateId { .. }
                | DirectoryError::DanglingReference { .. }
                | DirectoryError::ConflictingParent { .. }
                | DirectoryError::HierarchyCycle { .. }
                | DirectoryError::GraphFrozen { .. }
        )
    }
}
