//! MeshRegridError: Unified error type for mesh-regrid public APIs
//!
//! Every fallible operation in this crate returns this error instead of
//! panicking. All variants are fatal for the operation that produced them;
//! none stem from transient conditions, so nothing here is retried.

use thiserror::Error;

/// Unified error type for mesh-regrid operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MeshRegridError {
    /// The partition catalog could not be parsed or has the wrong entry count.
    #[error("malformed partition catalog: {0}")]
    MalformedPartitionFile(String),
    /// A per-partition mesh table is truncated or unparsable.
    #[error("malformed mesh table: {0}")]
    MalformedMeshFile(String),
    /// A global node id outside `1..=count` was queried.
    #[error("global id {id} out of range (1..={count})")]
    GlobalIdOutOfRange { id: u32, count: usize },
    /// Element connectivity references a present node that does not exist.
    #[error("element {element} references present node {index}, but only {present} are present")]
    ConnectivityOutOfRange {
        element: u32,
        index: usize,
        present: usize,
    },
    /// A global id appears twice in one rank's present set.
    #[error("global id {0} appears more than once in the present set")]
    DuplicateGlobalId(u32),
    /// Ownership information from two sources disagrees, or does not add up.
    #[error("partition mismatch: {0}")]
    PartitionMismatch(String),
    /// A rank id is not valid for the communicator size.
    #[error("rank {rank} out of range for {size} ranks")]
    RankOutOfRange { rank: usize, size: usize },
    /// The hotstart stream is truncated or inconsistent with the expected layout.
    #[error("hotstart format error: {0}")]
    HotstartFormat(String),
    /// A field handed to a collective or the regrid engine has the wrong length.
    #[error("field length mismatch: expected {expected}, found {found}")]
    FieldLengthMismatch { expected: usize, found: usize },
    /// The external interpolator failed to build or apply an operator.
    #[error("regrid failed: {0}")]
    RegridFailed(String),
    /// Point-to-point communication with a peer failed.
    #[error("communication error with rank {neighbor}: {source}")]
    CommError {
        neighbor: usize,
        #[source]
        source: CommErrorSource,
    },
    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(String),
    /// Configuration could not be parsed or is invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Message payload carried by [`MeshRegridError::CommError`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct CommErrorSource(pub String);

impl From<String> for CommErrorSource {
    fn from(msg: String) -> Self {
        CommErrorSource(msg)
    }
}

impl From<&str> for CommErrorSource {
    fn from(msg: &str) -> Self {
        CommErrorSource(msg.to_string())
    }
}

impl From<std::io::Error> for MeshRegridError {
    fn from(err: std::io::Error) -> Self {
        MeshRegridError::Io(err.to_string())
    }
}
