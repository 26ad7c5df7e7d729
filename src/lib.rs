// Library interface for trainsync
// Reconciles a training plan with recorded activities into one daily log

pub mod bundle;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod reconcile;
pub mod registry;
pub mod sport;
pub mod status;
pub mod store;

// Re-export commonly used types for convenience
pub use bundle::BundleError;
pub use models::*;
pub use config::SyncConfig;
pub use error::{DataQualityIssue, DataQualityKind, PersistenceError, Result, TrainSyncError};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use reconcile::{ReconcileConfig, Reconciler, Reconciliation, SyncReport};
pub use registry::ConsumedIds;
pub use store::{LogStore, Reserved};
