//! Encoder factory for streaming and recording.
//!
//! Turns persisted configuration into encoder profiles for each encoder
//! family (x264, QSV, AMD, NVENC, lossless) and creates, replaces and
//! updates the engine encoders that carry them.

mod audio;
mod error;
mod factory;
mod family;
mod quality;

pub use audio::{closest_aac_bitrate, find_audio_encoder_for_codec};
pub use error::EncoderError;
pub use factory::{
    EncoderFactory, EncoderSlot, RecordingPlan, DEFAULT_VIDEO_BITRATE, RECORDING_ENCODER_NAME,
    STREAMING_ENCODER_NAME,
};
pub use family::{
    EncoderFamily, FamilyDescriptor, ADVANCED_ENCODER_AMD, ADVANCED_ENCODER_NVENC,
    ADVANCED_ENCODER_QSV, ADVANCED_ENCODER_X264, SIMPLE_ENCODER_AMD, SIMPLE_ENCODER_NVENC,
    SIMPLE_ENCODER_QSV, SIMPLE_ENCODER_X264, SIMPLE_ENCODER_X264_LOWCPU,
};
pub use quality::{calc_crf, RecordingQuality};

use broadcaster_media::Settings;

/// Result type for encoder operations.
pub type EncoderResult<T> = Result<T, EncoderError>;

/// Encoder rate-control mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateControl {
    /// Constant bitrate.
    Cbr,
    /// Constant rate factor.
    Crf,
    /// Constant quantization parameter.
    Cqp,
    /// Intelligent constant quality (QSV).
    Icq,
}

impl RateControl {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cbr => "CBR",
            Self::Crf => "CRF",
            Self::Cqp => "CQP",
            Self::Icq => "ICQ",
        }
    }
}

/// What the rate control aims for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Bitrate in kbps.
    Bitrate(u32),
    /// CRF/QP value.
    Quality(i32),
}

/// Everything needed to configure one video encoder.
///
/// Always rebuilt from configuration when settings are updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderProfile {
    pub family: EncoderFamily,

    pub rate_control: RateControl,

    pub target: Target,

    /// Encoder speed/quality preset.
    pub preset: Option<String>,

    /// Custom encoder option string (advanced mode only).
    pub custom_options: Option<String>,

    /// Whether the user's preset and custom options override the defaults.
    pub advanced: bool,
}

impl EncoderProfile {
    /// Bitrate-targeted profile for streaming.
    pub fn streaming(
        family: EncoderFamily,
        bitrate: u32,
        preset: Option<String>,
        custom_options: Option<String>,
        advanced: bool,
    ) -> Self {
        Self {
            family,
            rate_control: RateControl::Cbr,
            target: Target::Bitrate(bitrate),
            preset,
            custom_options,
            advanced,
        }
    }

    /// Quality-targeted profile for a dedicated recording encoder.
    pub fn recording(family: EncoderFamily, crf: i32, icq_available: bool) -> Self {
        let (rate_control, preset) = match family {
            EncoderFamily::X264 => (RateControl::Crf, Some("veryfast")),
            EncoderFamily::X264LowCpu => (RateControl::Crf, Some("ultrafast")),
            EncoderFamily::Qsv if icq_available => (RateControl::Icq, None),
            EncoderFamily::Qsv | EncoderFamily::Amd => (RateControl::Cqp, None),
            EncoderFamily::Nvenc => (RateControl::Cqp, Some("hq")),
            EncoderFamily::LosslessUtVideo => (RateControl::Cqp, None),
        };

        Self {
            family,
            rate_control,
            target: Target::Quality(crf),
            preset: preset.map(str::to_string),
            custom_options: None,
            advanced: false,
        }
    }

    pub fn bitrate(&self) -> Option<u32> {
        match self.target {
            Target::Bitrate(b) => Some(b),
            Target::Quality(_) => None,
        }
    }

    pub fn quality(&self) -> Option<i32> {
        match self.target {
            Target::Quality(q) => Some(q),
            Target::Bitrate(_) => None,
        }
    }

    /// Settings blob for a streaming encoder.
    ///
    /// Family defaults go in first so the generic rate control and bitrate
    /// always win.
    pub fn streaming_settings(&self) -> Settings {
        let bitrate = self.bitrate().unwrap_or(0);
        let mut settings = Settings::new();

        if let Some(defaults) = self.family.descriptor().streaming_defaults {
            defaults(&mut settings, bitrate);
        }

        settings
            .set_string("rate_control", self.rate_control.as_str())
            .set_int("bitrate", bitrate as i64);

        if self.advanced {
            settings
                .set_string("preset", self.preset.as_deref().unwrap_or_default())
                .set_string("x264opts", self.custom_options.as_deref().unwrap_or_default());
        }
        settings
    }

    /// Settings blob for a recording encoder (or, for the lossless family,
    /// for the raw FFmpeg output).
    pub fn recording_settings(&self) -> Settings {
        (self.family.descriptor().recording_settings)(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streaming_settings_generic_wins_over_amd_defaults() {
        let profile = EncoderProfile::streaming(EncoderFamily::Amd, 4500, None, None, false);
        let settings = profile.streaming_settings();

        assert_eq!(settings.get_string("rate_control"), Some("CBR"));
        assert_eq!(settings.get_int("bitrate"), Some(4500));
        assert_eq!(settings.get_int("RateControlMethod"), Some(3));
        assert!(!settings.contains("preset"));
    }

    #[test]
    fn test_streaming_settings_advanced_overrides() {
        let profile = EncoderProfile::streaming(
            EncoderFamily::X264,
            2500,
            Some("faster".into()),
            Some("keyint=60".into()),
            true,
        );
        let settings = profile.streaming_settings();

        assert_eq!(settings.get_string("preset"), Some("faster"));
        assert_eq!(settings.get_string("x264opts"), Some("keyint=60"));
        assert!(!settings.contains("Usage"));
    }

    #[test]
    fn test_recording_x264() {
        let settings = EncoderProfile::recording(EncoderFamily::X264LowCpu, 19, false)
            .recording_settings();
        assert_eq!(settings.get_string("rate_control"), Some("CRF"));
        assert_eq!(settings.get_int("crf"), Some(19));
        assert_eq!(settings.get_string("preset"), Some("ultrafast"));
        assert_eq!(settings.get_string("profile"), Some("high"));
        assert_eq!(settings.get_bool("use_bufsize"), Some(true));
    }

    #[test]
    fn test_recording_qsv_prefers_icq() {
        let icq = EncoderProfile::recording(EncoderFamily::Qsv, 21, true).recording_settings();
        assert_eq!(icq.get_string("rate_control"), Some("ICQ"));
        assert_eq!(icq.get_int("icq_quality"), Some(21));
        assert!(!icq.contains("qpi"));

        let cqp = EncoderProfile::recording(EncoderFamily::Qsv, 21, false).recording_settings();
        assert_eq!(cqp.get_string("rate_control"), Some("CQP"));
        assert_eq!(cqp.get_int("qpi"), Some(21));
        assert_eq!(cqp.get_int("qpb"), Some(21));
        assert_eq!(cqp.get_string("profile"), Some("high"));
    }

    #[test]
    fn test_recording_amd_and_nvenc() {
        let amd = EncoderProfile::recording(EncoderFamily::Amd, 18, false).recording_settings();
        assert_eq!(amd.get_int("RateControlMethod"), Some(0));
        assert_eq!(amd.get_int("QP.PFrame"), Some(18));
        assert_eq!(amd.get_int("VBVBuffer.Size"), Some(100_000));
        assert_eq!(amd.get_int("Profile"), Some(100));

        let nvenc = EncoderProfile::recording(EncoderFamily::Nvenc, 18, false).recording_settings();
        assert_eq!(nvenc.get_string("rate_control"), Some("CQP"));
        assert_eq!(nvenc.get_int("cqp"), Some(18));
        assert_eq!(nvenc.get_string("preset"), Some("hq"));
    }

    #[test]
    fn test_lossless_output_settings() {
        let settings =
            EncoderProfile::recording(EncoderFamily::LosslessUtVideo, 0, false).recording_settings();
        assert_eq!(settings.get_string("format_name"), Some("avi"));
        assert_eq!(settings.get_string("video_encoder"), Some("utvideo"));
        assert_eq!(settings.get_string("audio_encoder"), Some("pcm_s16le"));
    }
}
