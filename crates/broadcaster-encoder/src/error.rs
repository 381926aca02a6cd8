//! Error types for the encoder factory.

use broadcaster_media::MediaError;
use thiserror::Error;

/// Errors that can occur while creating or configuring encoders.
#[derive(Debug, Error)]
pub enum EncoderError {
    /// The engine refused to create an encoder.
    #[error("Failed to create encoder '{type_id}': {source}")]
    CreateFailed {
        type_id: String,
        #[source]
        source: MediaError,
    },

    /// No engine encoder produces the requested codec.
    #[error("No encoder available for codec '{0}'")]
    NoEncoderForCodec(String),

    /// An operation referenced an encoder slot that is empty.
    #[error("No {0} encoder has been created")]
    Missing(&'static str),
}
