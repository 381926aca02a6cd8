//! Error types for the session core.

use broadcaster_config::ConfigError;
use broadcaster_encoder::EncoderError;
use broadcaster_ipc::{ErrorCode, OutputType};
use broadcaster_media::MediaError;
use thiserror::Error;

/// Errors surfaced synchronously by session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Encoder creation or configuration failed.
    #[error(transparent)]
    Encoder(#[from] EncoderError),

    /// Config or service document persistence failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The engine refused to create an output or service.
    #[error("Failed to create {kind}: {source}")]
    CreateFailed {
        kind: &'static str,
        #[source]
        source: MediaError,
    },

    /// No engine encoder matches the codec the output requires.
    #[error("Unsupported audio codec: {0}")]
    UnsupportedCodec(String),

    /// An output was started before the video context was reset.
    #[error("Video context has not been reset")]
    VideoContextNotReady,

    /// The output is already running.
    #[error("{0} output is already active")]
    AlreadyActive(OutputType),

    /// The output has not been created.
    #[error("{0} output has not been created")]
    NoOutput(OutputType),

    /// An encoder an association needs does not exist.
    #[error("{output} {kind} encoder has not been created")]
    MissingEncoder {
        output: OutputType,
        kind: &'static str,
    },

    /// No service has been created.
    #[error("No service has been created")]
    NoService,
}

impl SessionError {
    /// Wire-level status code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Encoder(EncoderError::CreateFailed { .. }) => ErrorCode::EncoderCreateFailure,
            Self::Encoder(EncoderError::NoEncoderForCodec(_)) => ErrorCode::UnsupportedCodec,
            Self::Encoder(EncoderError::Missing(_)) => ErrorCode::NotFound,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::CreateFailed { .. } => ErrorCode::EncoderCreateFailure,
            Self::UnsupportedCodec(_) => ErrorCode::UnsupportedCodec,
            Self::VideoContextNotReady | Self::AlreadyActive(_) => ErrorCode::InvalidState,
            Self::NoOutput(_) | Self::MissingEncoder { .. } | Self::NoService => {
                ErrorCode::NotFound
            }
        }
    }
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
