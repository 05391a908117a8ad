//! Error taxonomy for the VibeGuard engine.
//!
//! Load-time problems are [`ConfigError`] — fatal, mapped to exit code 2 by
//! callers. Runtime faults during a run are captured into the failing check's
//! own result and never abort the run, so [`EngineError`] only covers
//! engine-level misuse (e.g. requesting an unknown check id).

use std::path::PathBuf;

/// Configuration errors raised by the loader and validator.
///
/// Each variant corresponds to one kind slug in the error taxonomy; the slug
/// is available via [`ConfigError::kind`] for structured reporting.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no configuration file found (searched {0:?})")]
    NotFound(Vec<String>),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // serde_yaml's message already names the line and column when known;
    // `location` carries them separately for structured reporting.
    #[error("invalid YAML in {}: {message}", .path.display())]
    Yaml {
        path: PathBuf,
        message: String,
        location: Option<(usize, usize)>,
    },

    #[error("unsupported config version {found:?} (expected \"1\")")]
    UnsupportedVersion { found: String },

    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("invalid variable name {name:?}")]
    BadVarName { name: String },

    #[error("check {index}: invalid id {id:?}")]
    BadCheckId { index: usize, id: String },

    #[error("duplicate check id {id:?}")]
    DuplicateId { id: String },

    #[error("check {id:?}: run command must not be empty")]
    EmptyCommand { id: String },

    #[error("check {id:?}: invalid severity {value:?} (expected \"error\" or \"warning\")")]
    BadSeverity { id: String, value: String },

    #[error("check {id:?}: timeout must be positive, got {value:?}")]
    BadTimeout { id: String, value: String },

    #[error("check {id:?} requires unknown check {target:?}")]
    UnknownRequires { id: String, target: String },

    #[error("dependency cycle: {}", .witness.join(" -> "))]
    Cycle { witness: Vec<String> },

    #[error("check {id:?}: invalid assertion: {message}")]
    BadAssert { id: String, message: String },

    #[error("check {id:?}: grok pattern {pattern:?} does not compile: {message}")]
    BadGrok {
        id: String,
        pattern: String,
        message: String,
    },

    #[error("check {id:?}: invalid tag {tag:?}")]
    BadTag { id: String, tag: String },

    #[error("check {id:?} references unknown prompt {prompt:?}")]
    UnknownPrompt { id: String, prompt: String },
}

impl ConfigError {
    /// Stable kind slug for structured error reporting.
    pub fn kind(&self) -> &'static str {
        match self {
            ConfigError::NotFound(_) => "not-found",
            ConfigError::Io { .. } => "io",
            // serde reports rejected extra fields inside the YAML error text
            ConfigError::Yaml { message, .. } => {
                if message.contains("unknown field") {
                    "unknown-field"
                } else {
                    "invalid-schema"
                }
            }
            ConfigError::UnsupportedVersion { .. } => "invalid-schema",
            ConfigError::InvalidSchema(_) => "invalid-schema",
            ConfigError::BadVarName { .. } => "invalid-schema",
            ConfigError::BadCheckId { .. } => "invalid-schema",
            ConfigError::DuplicateId { .. } => "duplicate-id",
            ConfigError::EmptyCommand { .. } => "invalid-schema",
            ConfigError::BadSeverity { .. } => "bad-severity",
            ConfigError::BadTimeout { .. } => "bad-timeout",
            ConfigError::UnknownRequires { .. } => "unknown-requires",
            ConfigError::Cycle { .. } => "cycle",
            ConfigError::BadAssert { .. } => "bad-assert",
            ConfigError::BadGrok { .. } => "bad-grok",
            ConfigError::BadTag { .. } => "bad-tag",
            ConfigError::UnknownPrompt { .. } => "unknown-prompt",
        }
    }
}

/// Engine-level errors outside the per-check result flow.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("unknown check id {0:?}")]
    UnknownCheck(String),

    #[error("parallelism must be at least 1")]
    ZeroParallelism,
}

/// Result type for engine operations.
pub type Result<T, E = EngineError> = std::result::Result<T, E>;
