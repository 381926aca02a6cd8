//! Encoder families and their dispatch table.

use broadcaster_media::Settings;

use crate::{EncoderProfile, RateControl, Target};

pub const SIMPLE_ENCODER_X264: &str = "x264";
pub const SIMPLE_ENCODER_X264_LOWCPU: &str = "x264_lowcpu";
pub const SIMPLE_ENCODER_QSV: &str = "qsv";
pub const SIMPLE_ENCODER_AMD: &str = "amd";
pub const SIMPLE_ENCODER_NVENC: &str = "nvenc";

pub const ADVANCED_ENCODER_X264: &str = "obs_x264";
pub const ADVANCED_ENCODER_QSV: &str = "obs_qsv11";
pub const ADVANCED_ENCODER_AMD: &str = "amd_amf_h264";
pub const ADVANCED_ENCODER_NVENC: &str = "ffmpeg_nvenc";

/// Video encoder family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncoderFamily {
    X264,
    X264LowCpu,
    Qsv,
    Amd,
    Nvenc,
    /// UtVideo in an AVI container, written by a raw FFmpeg output.
    LosslessUtVideo,
}

/// Per-family constants and settings builders.
pub struct FamilyDescriptor {
    /// Engine encoder type. For the lossless family this is the FFmpeg codec name.
    pub engine_id: &'static str,

    /// Config key under `SimpleOutput` holding the user's preset.
    pub preset_key: &'static str,

    /// Family defaults applied before the generic streaming settings.
    pub streaming_defaults: Option<fn(&mut Settings, u32)>,

    /// Settings for a quality-targeted recording profile.
    pub recording_settings: fn(&EncoderProfile) -> Settings,
}

static X264: FamilyDescriptor = FamilyDescriptor {
    engine_id: ADVANCED_ENCODER_X264,
    preset_key: "Preset",
    streaming_defaults: None,
    recording_settings: x264_recording,
};

static QSV: FamilyDescriptor = FamilyDescriptor {
    engine_id: ADVANCED_ENCODER_QSV,
    preset_key: "QSVPreset",
    streaming_defaults: None,
    recording_settings: qsv_recording,
};

static AMD: FamilyDescriptor = FamilyDescriptor {
    engine_id: ADVANCED_ENCODER_AMD,
    preset_key: "AMDPreset",
    streaming_defaults: Some(amd_streaming_defaults),
    recording_settings: amd_recording,
};

static NVENC: FamilyDescriptor = FamilyDescriptor {
    engine_id: ADVANCED_ENCODER_NVENC,
    preset_key: "NVENCPreset",
    streaming_defaults: None,
    recording_settings: nvenc_recording,
};

static LOSSLESS: FamilyDescriptor = FamilyDescriptor {
    engine_id: "utvideo",
    preset_key: "Preset",
    streaming_defaults: None,
    recording_settings: lossless_recording,
};

impl EncoderFamily {
    /// Family for a configured streaming encoder name. Unknown names use x264.
    pub fn from_stream_name(name: &str) -> Self {
        match name {
            SIMPLE_ENCODER_QSV | ADVANCED_ENCODER_QSV => Self::Qsv,
            SIMPLE_ENCODER_AMD | ADVANCED_ENCODER_AMD => Self::Amd,
            SIMPLE_ENCODER_NVENC | ADVANCED_ENCODER_NVENC => Self::Nvenc,
            _ => Self::X264,
        }
    }

    /// Family for a configured recording encoder name. Unknown names use x264.
    pub fn from_recording_name(name: &str) -> Self {
        match name {
            SIMPLE_ENCODER_X264_LOWCPU => Self::X264LowCpu,
            SIMPLE_ENCODER_QSV | ADVANCED_ENCODER_QSV => Self::Qsv,
            SIMPLE_ENCODER_AMD | ADVANCED_ENCODER_AMD => Self::Amd,
            SIMPLE_ENCODER_NVENC | ADVANCED_ENCODER_NVENC => Self::Nvenc,
            _ => Self::X264,
        }
    }

    pub fn descriptor(self) -> &'static FamilyDescriptor {
        match self {
            Self::X264 | Self::X264LowCpu => &X264,
            Self::Qsv => &QSV,
            Self::Amd => &AMD,
            Self::Nvenc => &NVENC,
            Self::LosslessUtVideo => &LOSSLESS,
        }
    }

    pub fn engine_id(self) -> &'static str {
        self.descriptor().engine_id
    }

    pub fn preset_key(self) -> &'static str {
        self.descriptor().preset_key
    }

    pub fn is_low_cpu(self) -> bool {
        self == Self::X264LowCpu
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::X264 => "x264",
            Self::X264LowCpu => "x264-lowcpu",
            Self::Qsv => "qsv",
            Self::Amd => "amd",
            Self::Nvenc => "nvenc",
            Self::LosslessUtVideo => "lossless-utvideo",
        }
    }
}

fn quality(profile: &EncoderProfile) -> i64 {
    match profile.target {
        Target::Quality(q) => q as i64,
        Target::Bitrate(b) => b as i64,
    }
}

/// Static, rate-control and picture defaults for AMD streaming.
fn amd_streaming_defaults(settings: &mut Settings, bitrate: u32) {
    settings
        .set_int("Usage", 0)
        .set_int("Profile", 100)
        .set_int("RateControlMethod", 3)
        .set_int("Bitrate.Target", bitrate as i64)
        .set_int("FillerData", 1)
        .set_int("VBVBuffer", 1)
        .set_int("VBVBuffer.Size", bitrate as i64)
        .set_double("KeyframeInterval", 2.0)
        .set_int("BFrame.Pattern", 0);
}

fn x264_recording(profile: &EncoderProfile) -> Settings {
    let mut settings = Settings::new();
    settings
        .set_int("crf", quality(profile))
        .set_bool("use_bufsize", true)
        .set_string("rate_control", profile.rate_control.as_str())
        .set_string("profile", "high");
    if let Some(preset) = &profile.preset {
        settings.set_string("preset", preset.as_str());
    }
    settings
}

fn qsv_recording(profile: &EncoderProfile) -> Settings {
    let crf = quality(profile);
    let mut settings = Settings::new();
    settings
        .set_string("profile", "high")
        .set_string("rate_control", profile.rate_control.as_str());

    if profile.rate_control == RateControl::Icq {
        settings.set_int("icq_quality", crf);
    } else {
        settings
            .set_int("qpi", crf)
            .set_int("qpp", crf)
            .set_int("qpb", crf);
    }
    settings
}

fn amd_recording(profile: &EncoderProfile) -> Settings {
    let cqp = quality(profile);
    let mut settings = Settings::new();
    settings
        .set_int("Usage", 0)
        .set_int("Profile", 100)
        .set_int("RateControlMethod", 0)
        .set_int("QP.IFrame", cqp)
        .set_int("QP.PFrame", cqp)
        .set_int("QP.BFrame", cqp)
        .set_int("VBVBuffer", 1)
        .set_int("VBVBuffer.Size", 100_000)
        .set_double("KeyframeInterval", 2.0)
        .set_int("BFrame.Pattern", 0);
    settings
}

fn nvenc_recording(profile: &EncoderProfile) -> Settings {
    let mut settings = Settings::new();
    settings
        .set_string("rate_control", profile.rate_control.as_str())
        .set_string("profile", "high")
        .set_string("preset", profile.preset.as_deref().unwrap_or("hq"))
        .set_int("cqp", quality(profile));
    settings
}

/// Output settings for the raw FFmpeg lossless pipeline.
fn lossless_recording(_profile: &EncoderProfile) -> Settings {
    let mut settings = Settings::new();
    settings
        .set_string("format_name", "avi")
        .set_string("video_encoder", LOSSLESS.engine_id)
        .set_string("audio_encoder", "pcm_s16le");
    settings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_dispatch_table() {
        let cases = [
            ("qsv", "obs_qsv11", "QSVPreset"),
            ("obs_qsv11", "obs_qsv11", "QSVPreset"),
            ("amd", "amd_amf_h264", "AMDPreset"),
            ("amd_amf_h264", "amd_amf_h264", "AMDPreset"),
            ("nvenc", "ffmpeg_nvenc", "NVENCPreset"),
            ("ffmpeg_nvenc", "ffmpeg_nvenc", "NVENCPreset"),
            ("x264", "obs_x264", "Preset"),
            ("x264_lowcpu", "obs_x264", "Preset"),
            ("something_else", "obs_x264", "Preset"),
        ];

        for (name, engine_id, preset_key) in cases {
            let family = EncoderFamily::from_stream_name(name);
            assert_eq!(family.engine_id(), engine_id, "{name}");
            assert_eq!(family.preset_key(), preset_key, "{name}");
        }
    }

    #[test]
    fn test_dispatch_is_independent_of_call_order() {
        let names = ["nvenc", "x264", "amd", "qsv", "nvenc", "amd"];
        let first: Vec<_> = names.iter().map(|n| EncoderFamily::from_stream_name(n)).collect();
        let second: Vec<_> = names
            .iter()
            .rev()
            .map(|n| EncoderFamily::from_stream_name(n))
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_recording_low_cpu_only_from_simple_name() {
        assert_eq!(
            EncoderFamily::from_recording_name("x264_lowcpu"),
            EncoderFamily::X264LowCpu
        );
        assert!(EncoderFamily::from_recording_name("x264_lowcpu").is_low_cpu());
        assert_eq!(EncoderFamily::from_recording_name("obs_x264"), EncoderFamily::X264);
        assert_eq!(EncoderFamily::from_stream_name("x264_lowcpu"), EncoderFamily::X264);
    }

    #[test]
    fn test_amd_defaults() {
        let mut settings = Settings::new();
        amd_streaming_defaults(&mut settings, 4000);
        assert_eq!(settings.get_int("RateControlMethod"), Some(3));
        assert_eq!(settings.get_int("Bitrate.Target"), Some(4000));
        assert_eq!(settings.get_int("VBVBuffer.Size"), Some(4000));
        assert_eq!(settings.get_double("KeyframeInterval"), Some(2.0));
    }
}
