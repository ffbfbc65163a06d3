//! Unified error type for the execution engine.

/// Errors surfaced while executing a job.
///
/// Variants group the failure classes the engine distinguishes: validation
/// and resolution failures are fatal to the action, dependency failures
/// abort before anything executes, remote failures carry the transport
/// cause, execution failures abort the job.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid dependency: action '{action}' depends on unknown action '{dependency}'")]
    InvalidDependency { action: String, dependency: String },

    #[error("Circular dependency detected in job '{job}'")]
    CircularDependency { job: String },

    #[error("Template '{0}' not found")]
    UnknownTemplate(String),

    #[error("Resolution error: {0}")]
    Resolution(String),

    #[error("Artifact error: {0}")]
    Artifact(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Post-execution check failed for '{name}': skip conditions did not hold after execution")]
    PostCheckFailed { name: String },

    #[error("Verification error: {0}")]
    Verification(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Hex decode error: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
