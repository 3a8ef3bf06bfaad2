//! Error types crossing the engine's layers

use thiserror::Error;

/// Registration-time errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("section '{0}' is already registered")]
    DuplicateSection(String),

    #[error("check '{0}' is already registered")]
    DuplicateCheck(String),

    #[error("check '{check}' depends on unknown section '{section}'")]
    UnknownSection { check: String, section: String },

    #[error("section '{section}' supersedes unknown section '{superseded}'")]
    UnknownSuperseded { section: String, superseded: String },
}

/// Errors returned by discovery and check functions
#[derive(Error, Debug)]
pub enum CheckError {
    /// No result this cycle; the caller should try again next cycle
    #[error("{0}")]
    IgnoreResults(String),

    #[error("invalid parameters: {0}")]
    InvalidParameters(#[from] serde_json::Error),

    #[error("section '{section}' does not have the expected type")]
    SectionMismatch { section: String },
}

/// Errors surfaced by the evaluation driver to its caller
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("no check plugin named '{0}'")]
    UnknownCheck(String),

    #[error("discovery of '{check}' failed: {source}")]
    DiscoveryFailed {
        check: String,
        #[source]
        source: CheckError,
    },

    #[error("check '{check}' failed for item {item:?}: {source}")]
    CheckFailed {
        check: String,
        item: Option<String>,
        #[source]
        source: CheckError,
    },
}
