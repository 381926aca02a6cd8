//! Commands sent from callers to the session core.

use serde::{Deserialize, Serialize};

/// The logical operation set of the session core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceCommand {
    /// Apply sample rate and speaker layout from config to the audio pipeline.
    ResetAudioContext,

    /// Apply resolution, frame rate and color settings to the video pipeline.
    ResetVideoContext { purpose: String },

    /// Create the streaming audio encoder.
    CreateAudioEncoder,

    /// Create and configure the streaming video encoder.
    CreateVideoStreamingEncoder,

    /// Create the default recording video encoder.
    CreateVideoRecordingEncoder,

    /// Load (or default) the service descriptor and create the service.
    CreateService,

    /// Build the recording output settings without applying them.
    CreateRecordingSettings,

    /// Create the streaming output.
    CreateStreamingOutput,

    /// Create the recording output.
    CreateRecordingOutput,

    /// Start streaming.
    StartStreaming,

    /// Start recording.
    StartRecording,

    /// Stop streaming, optionally bypassing graceful shutdown.
    StopStreaming { force_stop: bool },

    /// Stop recording.
    StopRecording,

    /// Bind streaming encoders to the global video/audio pipelines.
    AssociateAudioAndVideoToStreamingContext,

    /// Bind recording encoders to the global video/audio pipelines.
    AssociateAudioAndVideoToRecordingContext,

    /// Bind streaming encoders to the streaming output.
    AssociateEncodersToStreamingOutput,

    /// Bind recording encoders to the recording output.
    AssociateEncodersToRecordingOutput,

    /// Bind the service to the streaming output.
    SetServiceToStreamingOutput,

    /// Build and apply the recording output settings.
    SetRecordingSettings,

    /// Re-subscribe the signal relay to both outputs.
    ConnectOutputSignals,

    /// Pop the oldest queued output signal.
    PollSignal,

    /// Persist the live service descriptor.
    SaveService,

    /// Re-bind the service to the streaming output.
    UpdateService,

    /// Ask the engine whether the streaming output is active.
    IsStreamingOutputActive,

    /// Report the lifecycle state of both outputs.
    QueryState,
}
