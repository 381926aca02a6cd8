//! Engine parameter and identifier types.

use serde::{Deserialize, Serialize};

/// Engine-side identifier of an encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EncoderId(pub u64);

/// Engine-side identifier of an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputId(pub u64);

/// Engine-side identifier of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceId(pub u64);

/// Identifier of a signal subscription, used to disconnect it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

/// Speaker layout of the audio pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpeakerLayout {
    Mono,
    Stereo,
}

/// Audio pipeline parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioInfo {
    /// Sample rate in Hz.
    pub samples_per_sec: u32,

    /// Speaker layout.
    pub speakers: SpeakerLayout,
}

/// Raw pixel format of the video pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoFormat {
    I420,
    Nv12,
    I444,
    Rgba,
}

impl VideoFormat {
    /// Formats encoders consume without conversion.
    pub const PREFERRED: [VideoFormat; 2] = [VideoFormat::Nv12, VideoFormat::I420];

    /// Whether encoders can consume this format directly.
    pub fn is_encoder_preferred(self) -> bool {
        Self::PREFERRED.contains(&self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorSpace {
    Bt601,
    Bt709,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorRange {
    Partial,
    Full,
}

/// Scaling filter used when output resolution differs from base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScaleType {
    Bilinear,
    Bicubic,
    Lanczos,
}

/// A display or canvas resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Pixel count, used to pick the largest display.
    pub fn area(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_zero(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Video pipeline parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Graphics backend module name.
    pub graphics_module: String,

    pub base_width: u32,
    pub base_height: u32,
    pub output_width: u32,
    pub output_height: u32,

    /// Frame rate numerator.
    pub fps_num: u32,

    /// Frame rate denominator.
    pub fps_den: u32,

    pub output_format: VideoFormat,
    pub colorspace: ColorSpace,
    pub range: ColorRange,
    pub scale_type: ScaleType,
    pub adapter: u32,
    pub gpu_conversion: bool,
}

/// Streaming delay behaviour on reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DelayFlags {
    /// Keep the delay buffer across reconnects.
    pub preserve: bool,
}

/// Parameters delivered with an engine signal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignalParams {
    /// Output completion code (`stop` signals).
    pub code: i64,
}
