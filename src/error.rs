//! Error types for sandbox lifecycle operations.

use thiserror::Error;

/// Top-level error type for registry and workflow operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Bad or ambiguous input, rejected before any workflow step runs.
    #[error("usage error: {0}")]
    Usage(String),

    /// An external command reported failure or could not complete.
    #[error("collaborator failed during {step}: {detail}")]
    Collaborator {
        step: String,
        command: Option<String>,
        detail: String,
    },

    /// Duplicate identity at registration time.
    #[error("sandbox id {id} is already registered")]
    RegistryConflict { id: u32 },

    /// An operation targeted a sandbox that does not exist.
    #[error("sandbox not found: {0}")]
    NotFound(String),

    /// A persisted record failed schema validation.
    #[error("invalid sandbox record: {0}")]
    Schema(String),

    /// Settings file missing or malformed.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error during registry or teardown operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for sandbox operations.
pub type Result<T> = std::result::Result<T, Error>;
