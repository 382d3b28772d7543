//! Error types for the availability store.

use crate::types::{LotId, SpotId};
use thiserror::Error;

/// Main error type for store, refresh and mutation operations.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Spot not found: {0}")]
    SpotNotFound(SpotId),

    #[error("Lot not found: {0}")]
    LotNotFound(LotId),

    #[error("Upstream failure: {0}")]
    Upstream(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Request already in flight: {0}")]
    InFlight(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Refresh scheduler has been shut down")]
    SchedulerStopped,
}

impl SyncError {
    /// True for the "mutation target missing" class of errors.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::SpotNotFound(_) | SyncError::LotNotFound(_))
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for SyncError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        SyncError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for SyncError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        SyncError::Deserialization(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, SyncError>;
