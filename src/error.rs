use std::path::PathBuf;

use thiserror::Error;

/// Number of trailing characters of external tool output kept in diagnostics
pub const DIAGNOSTIC_TAIL_CHARS: usize = 400;

/// Main error type for the reel-studio library
#[derive(Error, Debug)]
pub enum StudioError {
    #[error("External tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Composition error: {0}")]
    Composition(#[from] CompositionError),

    #[error("Generation service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Failures spawning or waiting on an external process
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("{program} not found on PATH")]
    NotFound { program: String },

    #[error("{program} timed out after {secs}s")]
    Timeout { program: String, secs: u64 },

    #[error("failed to run {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Why a probe degraded to an empty [`MediaInfo`](crate::video::MediaInfo)
///
/// Never propagated as an error; carried inside the probe result instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeFailure {
    #[error("file not found or unreadable")]
    Unreadable,

    #[error("ffprobe is not installed")]
    ToolMissing,

    #[error("ffprobe timed out")]
    Timeout,

    #[error("ffprobe exited with an error")]
    NonZeroExit,

    #[error("ffprobe output could not be parsed")]
    Unparseable,
}

/// Composition-specific errors
#[derive(Error, Debug)]
pub enum CompositionError {
    #[error("No input clips to compose")]
    NoInput,

    #[error("Error {label}: {detail}")]
    Normalize { label: String, detail: String },

    #[error("Output {path} is also an input clip")]
    OutputIsInput { path: PathBuf },

        #[error("Concat error: {detail}")]
    Concat { detail: String },

    #[error("Failed to copy {path}: {source}")]
    Copy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures reported by the external generation service
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{stage} failed: {detail}")]
    Failed { stage: String, detail: String },

    #[error("{stage} timed out after {secs}s")]
    Timeout { stage: String, secs: u64 },

    #[error("generation client '{program}' is not installed")]
    NotInstalled { program: String },

    #[error("project created but no project id found in output: {output}")]
    MissingProjectId { output: String },

    #[error("fetched artifact is missing or empty: {path}")]
    EmptyArtifact { path: PathBuf },
}

/// Job-level errors raised before the service is contacted
#[derive(Error, Debug)]
pub enum JobError {
    #[error("source document is not readable: {path}")]
    SourceUnreadable { path: PathBuf },
}

/// Batch queue errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum QueueError {
    #[error("'{name}' is already in the queue")]
    Duplicate { name: String },

    #[error("no queue item with id {id}")]
    NotFound { id: u64 },

    #[error("queue item {id} is being processed")]
    Busy { id: u64 },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}")]
    ParseFailed { path: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Auth state invalid: {reason}")]
    AuthState { reason: String },
}

/// Convenience type alias for Results using StudioError
pub type Result<T> = std::result::Result<T, StudioError>;

impl StudioError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// Check if this error is recoverable (can be retried)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io(_) => true,
            Self::Tool(ToolError::Timeout { .. }) => true,
            Self::Service(ServiceError::Timeout { .. }) => true,
            Self::Service(ServiceError::Failed { .. }) => true,
            _ => false,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        let message = match self {
            Self::Job(JobError::SourceUnreadable { path }) => {
                format!("Could not read '{}'. Please check the file exists.", path.display())
            }
            Self::Service(ServiceError::NotInstalled { program }) => {
                format!("'{}' not found. Install the generation client and log in first.", program)
            }
            Self::Composition(e) => e.to_string(),
            Self::Service(e) => e.to_string(),
            _ => self.to_string(),
        };
        tail(&message, DIAGNOSTIC_TAIL_CHARS)
    }
}

/// Keep the last `max_chars` characters of `text`, trimmed
pub fn tail(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    let count = text.chars().count();
    if count <= max_chars {
        return text.to_string();
    }
    text.chars().skip(count - max_chars).collect()
}
