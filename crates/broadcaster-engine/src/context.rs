//! Global audio/video pipeline parameters.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use broadcaster_config::ConfigStore;
use broadcaster_media::{
    AudioInfo, ColorRange, ColorSpace, MediaEngine, Resolution, ScaleType, SpeakerLayout,
    VideoFormat, VideoInfo,
};

/// Largest output resolution picked automatically.
const MAX_AUTO_OUTPUT: Resolution = Resolution::new(1280, 720);

/// Divisors tried, in order, to bring a large base resolution under the auto limit.
const DOWNSCALE_LADDER: [f64; 11] = [
    1.0,
    1.25,
    1.0 / 0.75,
    1.5,
    1.0 / 0.6,
    1.75,
    2.0,
    2.25,
    2.5,
    2.75,
    3.0,
];

const D3D11_MODULE: &str = "libobs-d3d11.dll";
#[cfg(windows)]
const OPENGL_MODULE: &str = "libobs-opengl.dll";
#[cfg(not(windows))]
const OPENGL_MODULE: &str = "libobs-opengl.so";

/// Applies config to the engine's global audio and video pipelines.
pub struct ContextManager {
    engine: Arc<dyn MediaEngine>,
    video_ready: bool,
}

impl ContextManager {
    pub fn new(engine: Arc<dyn MediaEngine>) -> Self {
        Self {
            engine,
            video_ready: false,
        }
    }

    /// Whether a video reset has succeeded.
    pub fn is_video_ready(&self) -> bool {
        self.video_ready
    }

    /// Reset the audio pipeline from `Audio.SampleRate` and `Audio.ChannelSetup`.
    #[instrument(name = "reset_audio_context", skip_all)]
    pub fn reset_audio(&self, config: &ConfigStore) -> bool {
        let info = AudioInfo {
            samples_per_sec: u32::try_from(config.get_uint("Audio", "SampleRate"))
                .unwrap_or(u32::MAX),
            speakers: match config.get_string("Audio", "ChannelSetup") {
                Some("Mono") => SpeakerLayout::Mono,
                _ => SpeakerLayout::Stereo,
            },
        };

        match self.engine.reset_audio(&info) {
            Ok(()) => {
                info!(sample_rate = info.samples_per_sec, speakers = ?info.speakers, "Audio context reset");
                true
            }
            Err(e) => {
                warn!(error = %e, "Audio context reset rejected");
                false
            }
        }
    }

    /// Reset the video pipeline. Derived resolutions and frame-rate defaults
    /// are written back to config before the engine is called.
    #[instrument(name = "reset_video_context", skip(self, config))]
    pub fn reset_video(&mut self, config: &mut ConfigStore, purpose: &str) -> bool {
        let info = self.video_info(config);

        if let Err(e) = config.save_safe("tmp") {
            warn!(error = %e, "Failed to save config");
        }

        match self.engine.reset_video(&info) {
            Ok(()) => {
                info!(
                    base = %format!("{}x{}", info.base_width, info.base_height),
                    output = %format!("{}x{}", info.output_width, info.output_height),
                    fps_num = info.fps_num,
                    fps_den = info.fps_den,
                    "Video context reset"
                );
                self.video_ready = true;
                true
            }
            Err(e) => {
                warn!(error = %e, "Video context reset rejected");
                self.video_ready = false;
                false
            }
        }
    }

    fn video_info(&self, config: &mut ConfigStore) -> VideoInfo {
        let mut base = Resolution::new(
            config_u32(config, "Video", "BaseCX"),
            config_u32(config, "Video", "BaseCY"),
        );
        if base.is_zero() {
            base = largest(&self.engine.available_resolutions()).unwrap_or(base);
            debug!(width = base.width, height = base.height, "Base resolution from display");
        }
        config.set_uint("Video", "BaseCX", base.width as u64);
        config.set_uint("Video", "BaseCY", base.height as u64);

        let mut output = Resolution::new(
            config_u32(config, "Video", "OutputCX"),
            config_u32(config, "Video", "OutputCY"),
        );
        if output.is_zero() {
            output = downscale_output(base);
            config.set_uint("Video", "OutputCX", output.width as u64);
            config.set_uint("Video", "OutputCY", output.height as u64);
        }

        let (fps_num, fps_den) = resolve_fps(config);

        VideoInfo {
            graphics_module: graphics_module(config.get_string("Video", "Renderer")).to_string(),
            base_width: base.width,
            base_height: base.height,
            output_width: output.width,
            output_height: output.height,
            fps_num,
            fps_den,
            output_format: video_format_from_name(config.get_string("Video", "ColorFormat")),
            colorspace: match config.get_string("Video", "ColorSpace") {
                Some(s) if s.eq_ignore_ascii_case("601") => ColorSpace::Bt601,
                _ => ColorSpace::Bt709,
            },
            range: match config.get_string("Video", "ColorRange") {
                Some(s) if s.eq_ignore_ascii_case("Full") => ColorRange::Full,
                _ => ColorRange::Partial,
            },
            scale_type: scale_type_from_name(config.get_string("Video", "ScaleType")),
            adapter: 0,
            gpu_conversion: true,
        }
    }
}

fn config_u32(config: &ConfigStore, section: &str, key: &str) -> u32 {
    u32::try_from(config.get_uint(section, key)).unwrap_or(u32::MAX)
}

fn largest(resolutions: &[Resolution]) -> Option<Resolution> {
    resolutions.iter().copied().max_by_key(|r| r.area())
}

/// Output resolution for `base` when none is configured.
///
/// Bases above 1280x720 are divided by the first ladder entry that fits
/// both dimensions within it. Bases too large for every entry are divided
/// by the exact factor that fits them.
pub fn downscale_output(base: Resolution) -> Resolution {
    if base.width <= MAX_AUTO_OUTPUT.width && base.height <= MAX_AUTO_OUTPUT.height {
        return base;
    }

    let scaled = |divisor: f64| {
        Resolution::new(
            (base.width as f64 / divisor) as u32,
            (base.height as f64 / divisor) as u32,
        )
    };

    DOWNSCALE_LADDER
        .iter()
        .map(|&divisor| scaled(divisor))
        .find(|r| r.width <= MAX_AUTO_OUTPUT.width && r.height <= MAX_AUTO_OUTPUT.height)
        .unwrap_or_else(|| {
            let divisor = f64::max(
                base.width as f64 / MAX_AUTO_OUTPUT.width as f64,
                base.height as f64 / MAX_AUTO_OUTPUT.height as f64,
            );
            debug!(divisor, "Base exceeds the downscale ladder");
            scaled(divisor)
        })
}

/// Frame rate from `Video.FPSType`: 1 = integer, 2 = fraction, otherwise
/// the common preset. Zero values fall back to the common preset.
pub fn resolve_fps(config: &mut ConfigStore) -> (u32, u32) {
    let explicit = match config.get_uint("Video", "FPSType") {
        1 => Some((config_u32(config, "Video", "FPSInt"), 1)),
        2 => Some((
            config_u32(config, "Video", "FPSNum"),
            config_u32(config, "Video", "FPSDen"),
        )),
        _ => None,
    };

    match explicit {
        Some((num, den)) if num != 0 && den != 0 => (num, den),
        Some(_) => {
            debug!("Explicit frame rate is zero, using common preset");
            common_fps(config)
        }
        None => common_fps(config),
    }
}

fn common_fps(config: &mut ConfigStore) -> (u32, u32) {
    let Some(value) = config.get_string("Video", "FPSCommon") else {
        debug!("FPSCommon unset, defaulting to 30");
        config.set_uint("Video", "FPSType", 0);
        config.set_string("Video", "FPSCommon", "30");
        return (30, 1);
    };

    match value {
        "10" => (10, 1),
        "20" => (20, 1),
        "24 NTSC" => (24000, 1001),
        "25" => (25, 1),
        "29.97" => (30000, 1001),
        "48" => (48, 1),
        "59.94" => (60000, 1001),
        "60" => (60, 1),
        _ => (30, 1),
    }
}

fn video_format_from_name(name: Option<&str>) -> VideoFormat {
    match name {
        None => VideoFormat::I420,
        Some(n) if n.eq_ignore_ascii_case("I420") => VideoFormat::I420,
        Some(n) if n.eq_ignore_ascii_case("NV12") => VideoFormat::Nv12,
        Some(n) if n.eq_ignore_ascii_case("I444") => VideoFormat::I444,
        Some(_) => VideoFormat::Rgba,
    }
}

fn scale_type_from_name(name: Option<&str>) -> ScaleType {
    match name {
        Some(n) if n.eq_ignore_ascii_case("bilinear") => ScaleType::Bilinear,
        Some(n) if n.eq_ignore_ascii_case("lanczos") => ScaleType::Lanczos,
        _ => ScaleType::Bicubic,
    }
}

fn graphics_module(renderer: Option<&str>) -> &'static str {
    match renderer {
        None => D3D11_MODULE,
        Some(r) if r.eq_ignore_ascii_case("Direct3D 11") => D3D11_MODULE,
        Some(_) => OPENGL_MODULE,
    }
}
