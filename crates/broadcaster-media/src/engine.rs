//! The media engine seam.
//!
//! Everything that captures, encodes, muxes or transmits lives behind
//! [`MediaEngine`]. The session core only sequences calls on it.

use std::sync::Arc;

use crate::settings::Settings;
use crate::types::{
    AudioInfo, DelayFlags, EncoderId, OutputId, Resolution, ServiceId, SignalParams,
    SubscriptionId, VideoFormat, VideoInfo,
};
use crate::MediaResult;

/// Callback invoked by the engine, from its own threads, when an output emits a signal.
pub type SignalHandler = Arc<dyn Fn(OutputId, &SignalParams) + Send + Sync>;

/// Capture/encode/mux/output primitives provided by the underlying engine.
///
/// Creation calls return an engine identifier; the caller owns the object
/// and must release it (see [`crate::EngineHandle`]). Operations on unknown
/// identifiers are ignored by the engine.
pub trait MediaEngine: Send + Sync {
    /// Whether the engine is up. Releases are only legal while this holds.
    fn is_initialized(&self) -> bool;

    /// Reset the global audio pipeline.
    fn reset_audio(&self, info: &AudioInfo) -> MediaResult<()>;

    /// Reset the global video pipeline.
    fn reset_video(&self, info: &VideoInfo) -> MediaResult<()>;

    /// Pixel format of the active video pipeline, if one exists.
    fn video_format(&self) -> Option<VideoFormat>;

    /// Resolutions of the attached displays.
    fn available_resolutions(&self) -> Vec<Resolution>;

    /// Identifiers of every encoder type the engine can create, in registration order.
    fn encoder_types(&self) -> Vec<String>;

    /// Codec produced by an encoder type.
    fn encoder_codec(&self, encoder_type: &str) -> Option<String>;

    /// Bitrates (kbps) supported by the AAC encoders.
    fn aac_bitrates(&self) -> Vec<u32>;

    /// AAC encoder type able to encode at `bitrate`.
    fn aac_encoder_for_bitrate(&self, bitrate: u32) -> Option<String>;

    fn create_video_encoder(
        &self,
        encoder_type: &str,
        name: &str,
        settings: Option<&Settings>,
    ) -> MediaResult<EncoderId>;

    fn create_audio_encoder(
        &self,
        encoder_type: &str,
        name: &str,
        settings: Option<&Settings>,
        mixer_idx: usize,
    ) -> MediaResult<EncoderId>;

    fn release_encoder(&self, encoder: EncoderId);

    fn update_encoder(&self, encoder: EncoderId, settings: &Settings);

    fn encoder_settings(&self, encoder: EncoderId) -> Settings;

    /// Values offered by a list property of an encoder (e.g. `rate_control`).
    fn encoder_property_options(&self, encoder: EncoderId, property: &str) -> Vec<String>;

    fn set_preferred_video_format(&self, encoder: EncoderId, format: VideoFormat);

    /// Scale the encoder input; `0x0` disables scaling.
    fn set_scaled_size(&self, encoder: EncoderId, width: u32, height: u32);

    /// Feed the encoder from the global video pipeline.
    fn bind_encoder_video(&self, encoder: EncoderId);

    /// Feed the encoder from the global audio pipeline.
    fn bind_encoder_audio(&self, encoder: EncoderId);

    fn create_output(&self, output_type: &str, name: &str) -> MediaResult<OutputId>;

    fn release_output(&self, output: OutputId);

    /// Audio codecs the output accepts, `;`-separated.
    fn output_supported_audio_codecs(&self, output: OutputId) -> Option<String>;

    fn set_output_video_encoder(&self, output: OutputId, encoder: EncoderId);

    fn set_output_audio_encoder(&self, output: OutputId, encoder: EncoderId, idx: usize);

    fn set_output_service(&self, output: OutputId, service: ServiceId);

    fn set_output_delay(&self, output: OutputId, delay_sec: u32, flags: DelayFlags);

    fn update_output(&self, output: OutputId, settings: &Settings);

    fn set_output_mixer(&self, output: OutputId, mixer_idx: usize);

    /// Feed a raw (non-encoded) output from the global video and audio pipelines.
    fn bind_output_media(&self, output: OutputId);

    /// Start an output. Completion is reported through the `start` signal.
    fn start_output(&self, output: OutputId) -> bool;

    /// Graceful stop; pending data is drained.
    fn stop_output(&self, output: OutputId);

    /// Immediate stop without draining.
    fn force_stop_output(&self, output: OutputId);

    fn output_active(&self, output: OutputId) -> bool;

    fn output_last_error(&self, output: OutputId) -> Option<String>;

    fn create_service(
        &self,
        service_type: &str,
        name: &str,
        settings: Option<&Settings>,
        hotkeys: Option<&Settings>,
    ) -> MediaResult<ServiceId>;

    fn release_service(&self, service: ServiceId);

    fn service_type(&self, service: ServiceId) -> Option<String>;

    fn service_settings(&self, service: ServiceId) -> Settings;

    fn update_service(&self, service: ServiceId, settings: &Settings);

    /// Output type the service prefers (e.g. `rtmp_output`).
    fn service_output_type(&self, service: ServiceId) -> Option<String>;

    /// Let the service clamp encoder settings to its constraints.
    fn apply_service_encoder_settings(
        &self,
        service: ServiceId,
        video: &mut Settings,
        audio: Option<&mut Settings>,
    );

    fn connect_signal(&self, output: OutputId, signal: &str, handler: SignalHandler)
        -> SubscriptionId;

    fn disconnect_signal(&self, output: OutputId, subscription: SubscriptionId);
}
