//! Error hierarchy for trainsync
//!
//! Fatal failures are `TrainSyncError`s. Recoverable data problems are
//! reported as [`DataQualityIssue`] values alongside the results; they never
//! abort a run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for all trainsync operations
#[derive(Debug, Error)]
pub enum TrainSyncError {
    /// The log could not be written atomically
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// An input file could not be read or is not a JSON array
    #[error("Input error in {path}: {reason}")]
    Input { path: PathBuf, reason: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Failures while replacing the persisted log
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Failed to serialize log for {path}: {reason}")]
    Serialize { path: PathBuf, reason: String },

    #[error("Failed to write temp file {path}: {reason}")]
    TempWrite { path: PathBuf, reason: String },

    #[error("Failed to sync {path}: {reason}")]
    Sync { path: PathBuf, reason: String },

    #[error("Failed to move temp file into place at {path}: {reason}")]
    Rename { path: PathBuf, reason: String },
}

/// Result type alias for trainsync operations
pub type Result<T> = std::result::Result<T, TrainSyncError>;

impl TrainSyncError {
    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TrainSyncError::Persistence(_) => ErrorSeverity::Critical,
            TrainSyncError::Input { .. } => ErrorSeverity::Error,
            TrainSyncError::Configuration(_) => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            TrainSyncError::Persistence(_) => {
                "Could not save the training log. The previous log was left unchanged.".to_string()
            }
            TrainSyncError::Input { path, .. } => {
                format!("Could not read input file: {}", path.display())
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Run aborted, nothing committed
    Critical,
    /// Error that prevents operation but system can continue
    Error,
    /// Warning that doesn't prevent operation
    Warning,
    /// Informational message
    Info,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Critical => tracing::Level::ERROR,
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
            ErrorSeverity::Info => tracing::Level::INFO,
        }
    }
}

/// Kinds of recoverable data problems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataQualityKind {
    /// Date field missing or not `YYYY-MM-DD`
    UnparseableDate,
    /// Element could not be decoded for another reason
    MalformedRecord,
    /// Discipline outside Run/Bike/Swim
    UnclassifiedDiscipline,
    /// Second record with an already-seen (date, discipline) key
    DuplicateKey,
    /// No planned and no actual duration on a past date
    EmptyRecord,
    /// Values too large to aggregate
    OutOfRange,
}

/// A record excluded from the run, with where it came from and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataQualityIssue {
    pub kind: DataQualityKind,

    /// Input the record came from, e.g. a file path or `"plan"`
    pub source: String,

    pub detail: String,
}

impl DataQualityIssue {
    pub fn new(kind: DataQualityKind, source: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            source: source.into(),
            detail: detail.into(),
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.kind {
            DataQualityKind::EmptyRecord => ErrorSeverity::Info,
            _ => ErrorSeverity::Warning,
        }
    }
}

impl fmt::Display for DataQualityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} in {}: {}", self.kind, self.source, self.detail)
    }
}
