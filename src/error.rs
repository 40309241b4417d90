//! Error types for SignPipe
//!
//! Every failure inside the pipeline is fatal for the run that hit it. Stages
//! never recover; the executor returns the root-cause error and drops any
//! partial output.

use crate::core::ItemKind;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for SignPipe operations
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A stage received an item of the wrong kind
    #[error("Stage '{stage}' expected {expected} item, got {found}")]
    TypeMismatch {
        stage: &'static str,
        expected: ItemKind,
        found: ItemKind,
    },

    /// The content digest was entered while another call was in flight
    #[error("Content digest overheated: concurrent invocation detected")]
    DigestOverheat,

    /// A stage tried to send after its downstream receiver went away
    #[error("Output channel of stage '{stage}' closed before all items were sent")]
    ChannelClosed { stage: &'static str },

    /// A stage or item worker panicked
    #[error("Worker in stage '{stage}' panicked: {message}")]
    WorkerPanicked { stage: &'static str, message: String },

    /// The digest lock was poisoned by a panicking holder
    #[error("Digest lock of stage '{stage}' poisoned")]
    LockPoisoned { stage: &'static str },

    /// The terminal stage did not produce exactly one signature
    #[error("Pipeline produced {count} terminal items, expected exactly one")]
    UnexpectedOutput { count: usize },

    /// Worker pool could not be built
    #[error("Thread pool error: {0}")]
    ThreadPoolError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// I/O error while reading or writing configuration
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config or report (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PipelineError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }

    /// Create a type mismatch error
    pub fn type_mismatch(stage: &'static str, expected: ItemKind, found: ItemKind) -> Self {
        Self::TypeMismatch {
            stage,
            expected,
            found,
        }
    }

    /// True for errors induced by a neighbouring stage going away.
    pub fn is_channel_closed(&self) -> bool {
        matches!(self, Self::ChannelClosed { .. })
    }

    /// Name of the stage the error originated in, if any
    pub fn stage(&self) -> Option<&'static str> {
        match self {
            Self::TypeMismatch { stage, .. }
            | Self::ChannelClosed { stage }
            | Self::WorkerPanicked { stage, .. }
            | Self::LockPoisoned { stage } => Some(stage),
            _ => None,
        }
    }
}

/// Result type alias for SignPipe operations
pub type Result<T> = std::result::Result<T, PipelineError>;

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Serialization(err.to_string())
    }
}

/// Extension trait for adding path context to std::io::Result
pub trait IoResultExt<T> {
    /// Add path context to an I/O error
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| PipelineError::io(path, e))
    }
}

/// Extract a readable message from a thread panic payload
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
