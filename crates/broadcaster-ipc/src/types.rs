//! Common types used across IPC messages.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which output an operation or signal refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    /// Live streaming output bound to a remote service.
    Streaming,

    /// Local recording output (file, replay buffer or custom FFmpeg).
    Recording,
}

impl OutputType {
    /// Wire name of the output type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Streaming => "streaming",
            Self::Recording => "recording",
        }
    }
}

impl fmt::Display for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status code returned with every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Operation completed.
    Ok,

    /// Unclassified failure.
    Error,

    /// A handle the operation needs (encoder, output, service) does not exist.
    NotFound,

    /// Operation is not valid in the current lifecycle state.
    InvalidState,

    /// No engine encoder matches the codec an output requires.
    UnsupportedCodec,

    /// The engine refused to create an encoder, output or service.
    EncoderCreateFailure,

    /// The engine refused to start an output.
    EngineStartFailure,

    /// Config store or service document could not be read or written.
    ConfigError,
}

impl ErrorCode {
    /// Returns true for [`ErrorCode::Ok`].
    pub fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// Output completion codes reported by the engine with a `stop` signal.
pub mod output_code {
    pub const SUCCESS: i64 = 0;
    pub const BAD_PATH: i64 = -1;
    pub const CONNECT_FAILED: i64 = -2;
    pub const INVALID_STREAM: i64 = -3;
    pub const ERROR: i64 = -4;
    pub const DISCONNECTED: i64 = -5;
    pub const UNSUPPORTED: i64 = -6;
    pub const NO_SPACE: i64 = -7;
    pub const ENCODE_ERROR: i64 = -8;
}

/// Snapshot of one output's lifecycle, as reported to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputStatus {
    /// Output this status describes.
    pub output_type: OutputType,

    /// Current lifecycle state.
    pub state: crate::OutputState,

    /// Optimistic flag: set when start succeeds, cleared as soon as a stop is requested.
    pub active_requested: bool,
}

/// Snapshot of both outputs plus the video context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    /// Whether the video context has been reset at least once.
    pub video_context_ready: bool,

    /// Streaming output status.
    pub streaming: OutputStatus,

    /// Recording output status.
    pub recording: OutputStatus,
}
