use crate::flow::FlowId;
use std::collections::TryReserveError;
use thiserror::Error;

/// Top-level error of a whole clustering run, from reading the input to the final snapshot.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Input format error: {0}")]
    Input(#[from] InputFormatError),

    #[error("Clustering error: {0}")]
    Clustering(#[from] ClusteringError),
}

/// Errors in user supplied run parameters.
///
/// These are detected before any input is read.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Weight `{name}` must not be negative, got {value}")]
    NegativeWeight { name: &'static str, value: f64 },

    #[error("Weight `{name}` must be a finite number, got {value}")]
    NonFiniteWeight { name: &'static str, value: f64 },

    #[error("Target cluster count must be positive")]
    NonPositiveTarget,
}

/// Errors in the flow input file.
///
/// Each variant carries enough context to locate the offending record.
#[derive(Debug, Error)]
pub enum InputFormatError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Input is empty, expected a `count=<N>` line")]
    MissingCountLine,

    #[error("Malformed count line: {line:?}")]
    MalformedCountLine { line: String },

    #[error("Malformed flow on line {line_number}: {reason}")]
    MalformedFlowLine { line_number: usize, reason: String },

    #[error("Invalid IPv4 address {address:?} on line {line_number}")]
    InvalidIpAddress { line_number: usize, address: String },

    #[error("Negative flow id {id} on line {line_number}")]
    NegativeFlowId { line_number: usize, id: i64 },

    #[error("Flow {flow_id} on line {line_number} has zero packets")]
    ZeroPacketCount { line_number: usize, flow_id: FlowId },

    #[error("Expected {expected} flows, found {actual}")]
    FlowCountMismatch { expected: usize, actual: usize },
}

/// Errors raised by the clustering engine and its store.
#[derive(Debug, Error)]
pub enum ClusteringError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to allocate working memory: {0}")]
    AllocationFailure(#[from] TryReserveError),

    #[error("Target of {target} clusters is unreachable from {flows} flows")]
    TargetUnreachable { target: usize, flows: usize },

    #[error("Neighbor cache of cluster {cluster} has no entry for cluster {peer}")]
    InconsistentCache { cluster: FlowId, peer: FlowId },

    #[error("Flow id {0} occurs more than once")]
    DuplicateFlowId(FlowId),

    #[error("Clustering aborted after {merges_done} merges: {reason}")]
    Aborted { merges_done: usize, reason: String },
}

impl ClusteringError {
    /// Short machine-friendly name of the failure, used by the engine's `Failed` state.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClusteringError::Config(_) => ErrorKind::Config,
            ClusteringError::AllocationFailure(_) => ErrorKind::AllocationFailure,
            ClusteringError::TargetUnreachable { .. } => ErrorKind::TargetUnreachable,
            ClusteringError::InconsistentCache { .. } => ErrorKind::InconsistentCache,
            ClusteringError::DuplicateFlowId(_) => ErrorKind::DuplicateFlowId,
            ClusteringError::Aborted { .. } => ErrorKind::Aborted,
        }
    }
}

/// Discriminant of [`ClusteringError`] without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    AllocationFailure,
    TargetUnreachable,
    InconsistentCache,
    DuplicateFlowId,
    Aborted,
}
