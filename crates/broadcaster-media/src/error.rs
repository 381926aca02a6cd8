//! Error types for the media engine seam.

use thiserror::Error;

/// Errors reported by the media engine.
#[derive(Debug, Error)]
pub enum MediaError {
    /// The engine rejected pipeline parameters.
    #[error("Engine rejected {pipeline} parameters: {reason}")]
    ResetRejected {
        pipeline: &'static str,
        reason: String,
    },

    /// The engine could not create an object.
    #[error("Failed to create {kind} '{type_id}'")]
    CreateFailed { kind: &'static str, type_id: String },

    /// The engine is not initialized.
    #[error("Engine is not initialized")]
    NotInitialized,
}
