//! Engine error types

use crate::config::ConfigError;
use crate::node::NodeId;
use crate::store::TableKey;
use thiserror::Error;

/// Errors that abort a run
///
/// A run that returns one of these publishes nothing; the caller's previous
/// driver state stays valid.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Run cancelled")]
    Cancelled,

    #[error("Table {key} holds a different value type than requested")]
    TableTypeMismatch { key: TableKey },

    #[error("Generator '{generator}' produced hint name '{hint}' more than once")]
    DuplicateHintName { generator: String, hint: String },

    #[error("Handle for node {node} was issued by another pipeline")]
    ForeignHandle { node: NodeId },

    #[error("Marker name is not a valid identifier: '{0}'")]
    InvalidMarkerName(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Why a batch of pending edits could not be absorbed incrementally
///
/// Never returned as an error: the driver records it and the caller falls
/// back to a full run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditFailure {
    #[error("No prior run to apply edits against")]
    NoPriorRun,

    #[error("Incremental edit application is disabled")]
    IncrementalEditsDisabled,

    #[error("Syntax trees changed since the last run")]
    SyntaxTreesChanged,

    #[error("Added text '{path}' already exists")]
    AddedExistingText { path: String },

    #[error("Removed text '{path}' was never observed")]
    RemovedUnknownText { path: String },

    #[error("Changed text '{path}' was never observed")]
    ChangedUnknownText { path: String },

    #[error("Changed text '{path}' does not match the observed content")]
    StaleChange { path: String },

    #[error("Change renames '{old}' to '{new}'")]
    PathMismatch { old: String, new: String },
}
