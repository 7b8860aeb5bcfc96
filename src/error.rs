// Wattsim - Energy consumption telemetry simulator
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Error types for Wattsim
//!
//! Generated data never fails validation (readings are clamped), so the
//! only failures the engine knows about come from the document store and
//! from configuration.

use thiserror::Error;

/// Result type alias for Wattsim operations
pub type Result<T> = std::result::Result<T, WattsimError>;

/// Main error type for Wattsim operations
#[derive(Error, Debug)]
pub enum WattsimError {
    /// Document store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// I/O error (config files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by a [`DocumentStore`](crate::store::DocumentStore)
#[derive(Error, Debug)]
pub enum StoreError {
    /// Update targeted a device the store does not know
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// Backend refused or failed the operation
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// File backend I/O failure
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File backend could not encode or decode its document
    #[error("Store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = StoreError::DeviceNotFound("d1".to_string());
        assert_eq!(err.to_string(), "Device not found: d1");
    }

    #[test]
    fn test_store_error_converts() {
        let err: WattsimError = StoreError::Unavailable("offline".to_string()).into();
        assert!(matches!(err, WattsimError::Store(_)));
        assert_eq!(err.to_string(), "Store error: Store unavailable: offline");
    }
}
