//! Unified error types for the sampling engine.
//!
//! Nothing in the engine is fatal: every error eventually becomes an
//! [`Alert`](crate::sampling::Alert) for the consumer. The types here keep
//! enough structure for callers (and tests) to tell the categories apart.

use thiserror::Error;

/// Maximum number of stderr characters carried into an error message.
const STDERR_MESSAGE_LIMIT: usize = 200;

/// Top-level error type encompassing all engine error categories.
#[derive(Error, Debug)]
pub enum CoreError {
    /// An interactive session error.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// A one-shot script error.
    #[error("Script error: {0}")]
    Script(#[from] ScriptError),

    /// A sampling error surfaced by an item.
    #[error("Sampling error: {0}")]
    Sampling(#[from] SamplingError),

    /// A configuration error (invalid values, missing fields, parse failures).
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// A low-level I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to interactive shell session lifecycle and I/O.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The session subprocess failed to start.
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    /// The session was used before `init()` or after `close()`.
    #[error("Session not running: {0}")]
    NotRunning(String),

    /// The session variant is not available on this platform or build.
    #[error("{0} is not supported on this platform")]
    Unsupported(String),

    /// The session process reported errors on stderr.
    #[error("{0}")]
    Stderr(String),

    /// A low-level I/O error during session operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from one-shot `sh -c` invocations.
#[derive(Error, Debug)]
pub enum ScriptError {
    /// The shell could not be spawned at all.
    #[error("Failed to run script: {0}")]
    Spawn(#[from] std::io::Error),

    /// The script ran and exited unsuccessfully.
    ///
    /// Displays the (truncated) stderr when there is any, otherwise the
    /// exit status.
    #[error("{}", failure_message(.code, .stderr))]
    Failed {
        /// Exit code, `None` when terminated by a signal.
        code: Option<i32>,
        /// Captured stderr.
        stderr: String,
    },
}

fn failure_message(code: &Option<i32>, stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        match code {
            Some(code) => format!("exit status {code}"),
            None => "terminated by signal".to_string(),
        }
    } else {
        stderr.chars().take(STDERR_MESSAGE_LIMIT).collect()
    }
}

/// Errors produced by [`Item::next_value`](crate::sampling::Item::next_value).
#[derive(Error, Debug)]
pub enum SamplingError {
    /// The interactive session could not be initialized.
    #[error("Failed to init interactive shell: {0}")]
    Init(SessionError),

    /// Writing the sample command to the session failed.
    #[error("Failed to execute interactive shell cmd: {0}")]
    Write(SessionError),

    /// Collecting the session response failed.
    #[error("{0}")]
    Read(SessionError),

    /// The stateless sample script failed.
    #[error("{0}")]
    Script(ScriptError),

    /// The transform script failed.
    #[error("Transform failed: {0}")]
    Transform(ScriptError),
}

/// A single validation error for a configuration field.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Dot-path to the offending field (e.g. `"components.0.items.1.label"`).
    pub field: String,
    /// Human-readable error message.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Errors related to the engine configuration surface.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration document could not be parsed.
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A `name=value` variable was malformed.
    #[error("Invalid variable '{0}': expected name=value")]
    InvalidVariable(String),

    /// One or more fields failed validation.
    #[error("{}", join_validation(.0))]
    Invalid(Vec<ValidationError>),
}

fn join_validation(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
