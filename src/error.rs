//! Error types for the shared-storage administration layer
//!
//! Every driver and executor operation returns a classified failure so
//! callers can distinguish a broken command from a malformed control file
//! or an operation the backend simply does not support yet.

use thiserror::Error;

/// Unified error type for the administration layer
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Process / Execution Errors
    // =========================================================================
    #[error("command `{command}` exited with status {exit_code}: {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("failed to spawn command `{command}`: {source}")]
    CommandSpawn {
        command: String,
        source: std::io::Error,
    },

    // =========================================================================
    // Parsing Errors
    // =========================================================================
    #[error("failed to parse {what}: found {found:?}")]
    Parse { what: String, found: String },

    // =========================================================================
    // Contract Errors
    // =========================================================================
    #[error("operation not implemented: {operation}")]
    NotImplemented { operation: &'static str },

    // =========================================================================
    // Configuration / Internal Errors
    // =========================================================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure class of an [`Error`], as presented to operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The underlying command could not be run or exited non-zero
    Process,
    /// Control-file content did not match the expected shape
    Parsing,
    /// The operation is declared in the contract but has no backend support
    NotImplemented,
    /// Everything outside the driver contract (settings, internal faults)
    Configuration,
}

impl Error {
    /// Classify this error for presentation
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::CommandFailed { .. } | Error::CommandSpawn { .. } => FailureKind::Process,
            Error::Parse { .. } => FailureKind::Parsing,
            Error::NotImplemented { .. } => FailureKind::NotImplemented,
            Error::Configuration(_)
            | Error::JsonParse(_)
            | Error::Io(_)
            | Error::Internal(_) => FailureKind::Configuration,
        }
    }

    /// Check whether this is an "unsupported", not a "broken", failure
    pub fn is_not_implemented(&self) -> bool {
        matches!(self.kind(), FailureKind::NotImplemented)
    }

    /// Check whether this is a parsing failure
    pub fn is_parse(&self) -> bool {
        matches!(self.kind(), FailureKind::Parsing)
    }
}

/// Result type alias for the administration layer
pub type Result<T> = std::result::Result<T, Error>;
