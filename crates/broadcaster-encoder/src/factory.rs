//! Encoder slots and their creation/update algorithms.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use broadcaster_config::ConfigStore;
use broadcaster_ipc::OutputType;
use broadcaster_media::{
    EncoderHandle, HandleSlot, MediaEngine, Resolution, ServiceId, Settings, VideoFormat,
};

use crate::audio::{closest_aac_bitrate, find_audio_encoder_for_codec};
use crate::error::EncoderError;
use crate::family::{EncoderFamily, ADVANCED_ENCODER_X264};
use crate::quality::{calc_crf, RecordingQuality};
use crate::{EncoderProfile, EncoderResult};

/// Video bitrate written when none is configured.
pub const DEFAULT_VIDEO_BITRATE: u32 = 2500;

pub const STREAMING_ENCODER_NAME: &str = "streaming_h264";
pub const RECORDING_ENCODER_NAME: &str = "simple_h264_recording";
const AUDIO_ENCODER_NAME: &str = "simple_audio";
const ALT_AUDIO_ENCODER_NAME: &str = "alt_audio_enc";

/// A video encoder slot and the profile last applied to it.
#[derive(Debug, Default)]
pub struct EncoderSlot {
    handle: HandleSlot<EncoderHandle>,
    profile: Option<EncoderProfile>,
}

impl EncoderSlot {
    pub fn handle(&self) -> Option<&Arc<EncoderHandle>> {
        self.handle.get()
    }

    pub fn profile(&self) -> Option<&EncoderProfile> {
        self.profile.as_ref()
    }

    pub fn is_bound(&self) -> bool {
        self.handle.is_bound()
    }

    /// Store a new occupant. The previous encoder is released unless
    /// another slot still shares it.
    fn set(&mut self, handle: Option<Arc<EncoderHandle>>, profile: Option<EncoderProfile>) {
        self.handle.set(handle);
        self.profile = profile;
    }
}

/// How the recording pipeline should be built after quality resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordingPlan {
    /// Record through the streaming encoder.
    SharedStream,
    /// Raw FFmpeg output with these settings; no encoder is involved.
    Lossless { output_settings: Settings },
    /// A dedicated recording encoder of this family was created.
    Dedicated { family: EncoderFamily },
}

/// Creates and configures the session's encoders.
pub struct EncoderFactory {
    engine: Arc<dyn MediaEngine>,
    video_streaming: EncoderSlot,
    video_recording: EncoderSlot,
    audio_streaming: HandleSlot<EncoderHandle>,
    audio_recording: HandleSlot<EncoderHandle>,
    using_recording_preset: bool,
    low_cpu_x264: bool,
}

fn config_u32(config: &ConfigStore, section: &str, key: &str) -> u32 {
    u32::try_from(config.get_uint(section, key)).unwrap_or(u32::MAX)
}

fn save_config(config: &ConfigStore) {
    if let Err(e) = config.save_safe("tmp") {
        warn!(error = %e, "Failed to save config");
    }
}

impl EncoderFactory {
    pub fn new(engine: Arc<dyn MediaEngine>) -> Self {
        Self {
            engine,
            video_streaming: EncoderSlot::default(),
            video_recording: EncoderSlot::default(),
            audio_streaming: HandleSlot::new(),
            audio_recording: HandleSlot::new(),
            using_recording_preset: false,
            low_cpu_x264: false,
        }
    }

    pub fn video_streaming(&self) -> &EncoderSlot {
        &self.video_streaming
    }

    pub fn video_recording(&self) -> &EncoderSlot {
        &self.video_recording
    }

    pub fn video(&self, output: OutputType) -> Option<&Arc<EncoderHandle>> {
        match output {
            OutputType::Streaming => self.video_streaming.handle(),
            OutputType::Recording => self.video_recording.handle(),
        }
    }

    pub fn audio(&self, output: OutputType) -> Option<&Arc<EncoderHandle>> {
        match output {
            OutputType::Streaming => self.audio_streaming.get(),
            OutputType::Recording => self.audio_recording.get(),
        }
    }

    fn audio_slot_mut(&mut self, output: OutputType) -> &mut HandleSlot<EncoderHandle> {
        match output {
            OutputType::Streaming => &mut self.audio_streaming,
            OutputType::Recording => &mut self.audio_recording,
        }
    }

    /// Whether recording uses its own encoder or pipeline rather than the
    /// streaming encoder.
    pub fn using_recording_preset(&self) -> bool {
        self.using_recording_preset
    }

    pub fn low_cpu_x264(&self) -> bool {
        self.low_cpu_x264
    }

    /// Whether recording currently shares the streaming video encoder.
    pub fn recording_shares_stream(&self) -> bool {
        self.video_recording.handle.shares_with(&self.video_streaming.handle)
    }

    fn create_video(&self, engine_id: &str, name: &str) -> EncoderResult<Arc<EncoderHandle>> {
        let id = self
            .engine
            .create_video_encoder(engine_id, name, None)
            .map_err(|source| EncoderError::CreateFailed {
                type_id: engine_id.to_string(),
                source,
            })?;

        debug!(encoder_id = ?id, engine_id, name, "Created video encoder");
        Ok(Arc::new(EncoderHandle::new(
            self.engine.clone(),
            id,
            engine_id,
            name,
        )))
    }

    fn create_audio(
        &self,
        type_id: &str,
        name: &str,
        mixer_idx: usize,
    ) -> EncoderResult<Arc<EncoderHandle>> {
        let id = self
            .engine
            .create_audio_encoder(type_id, name, None, mixer_idx)
            .map_err(|source| EncoderError::CreateFailed {
                type_id: type_id.to_string(),
                source,
            })?;

        debug!(encoder_id = ?id, type_id, name, mixer_idx, "Created audio encoder");
        Ok(Arc::new(EncoderHandle::new(
            self.engine.clone(),
            id,
            type_id,
            name,
        )))
    }

    /// Configured audio bitrate snapped to the closest rate the AAC encoders support.
    pub fn audio_bitrate(&self, config: &ConfigStore) -> u32 {
        let configured = config_u32(config, "SimpleOutput", "ABitrate");
        closest_aac_bitrate(&self.engine.aac_bitrates(), configured).unwrap_or(configured)
    }

    /// Create the AAC encoder for `output`.
    ///
    /// Returns `false` and empties the slot when no AAC encoder supports the
    /// resolved bitrate.
    #[instrument(name = "create_audio_encoder", skip(self, config))]
    pub fn create_audio_encoder(
        &mut self,
        config: &ConfigStore,
        output: OutputType,
    ) -> EncoderResult<bool> {
        let bitrate = self.audio_bitrate(config);
        let Some(type_id) = self.engine.aac_encoder_for_bitrate(bitrate) else {
            warn!(bitrate, "No AAC encoder supports bitrate");
            self.audio_slot_mut(output).set(None);
            return Ok(false);
        };

        let handle = self.create_audio(&type_id, AUDIO_ENCODER_NAME, 0)?;
        self.audio_slot_mut(output).replace(handle);
        Ok(true)
    }

    /// Create a streaming audio encoder for a non-AAC codec and feed it
    /// from the global audio pipeline.
    #[instrument(name = "create_codec_audio_encoder", skip(self, config))]
    pub fn create_codec_audio_encoder(
        &mut self,
        config: &ConfigStore,
        codec: &str,
        mixer_idx: usize,
    ) -> EncoderResult<()> {
        let type_id = find_audio_encoder_for_codec(self.engine.as_ref(), codec)
            .ok_or_else(|| EncoderError::NoEncoderForCodec(codec.to_string()))?;

        let mut settings = Settings::new();
        settings.set_int("bitrate", self.audio_bitrate(config) as i64);

        let handle = self.create_audio(&type_id, ALT_AUDIO_ENCODER_NAME, mixer_idx)?;
        self.engine.update_encoder(handle.id(), &settings);
        self.engine.bind_encoder_audio(handle.id());
        self.audio_streaming.replace(handle);
        Ok(())
    }

    /// Create the streaming video encoder from `SimpleOutput.StreamEncoder`.
    ///
    /// On a fresh configuration only the default bitrate is written;
    /// otherwise the current settings are applied right away.
    #[instrument(name = "create_video_streaming_encoder", skip_all)]
    pub fn create_video_streaming_encoder(
        &mut self,
        config: &mut ConfigStore,
        service: Option<ServiceId>,
    ) -> EncoderResult<()> {
        let family = EncoderFamily::from_stream_name(
            config
                .get_string("SimpleOutput", "StreamEncoder")
                .unwrap_or(ADVANCED_ENCODER_X264),
        );
        let handle = self.create_video(family.engine_id(), STREAMING_ENCODER_NAME)?;
        self.video_streaming.set(Some(handle), None);

        if config.is_empty() {
            info!(bitrate = DEFAULT_VIDEO_BITRATE, "Fresh config, writing default video bitrate");
            config.set_uint("SimpleOutput", "VBitrate", DEFAULT_VIDEO_BITRATE as u64);
            save_config(config);
            return Ok(());
        }

        self.update_video_streaming_encoder(config, service)
    }

    /// Rebuild the streaming profile from config and apply it.
    ///
    /// The live encoder is kept when its family is unchanged and replaced
    /// otherwise.
    #[instrument(name = "update_video_streaming_encoder", skip_all)]
    pub fn update_video_streaming_encoder(
        &mut self,
        config: &mut ConfigStore,
        service: Option<ServiceId>,
    ) -> EncoderResult<()> {
        let family = EncoderFamily::from_stream_name(
            config
                .get_string("SimpleOutput", "StreamEncoder")
                .unwrap_or(ADVANCED_ENCODER_X264),
        );
        let audio_bitrate = self.audio_bitrate(config);
        let advanced = config.get_bool("SimpleOutput", "UseAdvanced");
        let enforce_bitrate = config.get_bool("SimpleOutput", "EnforceBitrate");
        let preset = config
            .get_string("SimpleOutput", family.preset_key())
            .map(str::to_string);
        let custom = config
            .get_string("SimpleOutput", "x264Settings")
            .map(str::to_string);

        let reuse = self
            .video_streaming
            .handle()
            .is_some_and(|h| h.type_id() == family.engine_id());
        if !reuse {
            let handle = self.create_video(family.engine_id(), STREAMING_ENCODER_NAME)?;
            self.video_streaming.set(Some(handle), None);
        }

        let mut video_bitrate = config_u32(config, "SimpleOutput", "VBitrate");
        if video_bitrate == 0 {
            debug!(default = DEFAULT_VIDEO_BITRATE, "Video bitrate unset, using default");
            video_bitrate = DEFAULT_VIDEO_BITRATE;
            config.set_uint("SimpleOutput", "VBitrate", video_bitrate as u64);
            save_config(config);
        }

        let profile = EncoderProfile::streaming(family, video_bitrate, preset, custom, advanced);
        let mut video_settings = profile.streaming_settings();
        let mut audio_settings = Settings::new();
        audio_settings
            .set_string("rate_control", "CBR")
            .set_int("bitrate", audio_bitrate as i64);

        if let Some(service) = service {
            self.engine.apply_service_encoder_settings(
                service,
                &mut video_settings,
                Some(&mut audio_settings),
            );
        }

        if advanced && !enforce_bitrate {
            video_settings.set_int("bitrate", video_bitrate as i64);
            audio_settings.set_int("bitrate", audio_bitrate as i64);
        }

        let Some(video) = self.video_streaming.handle() else {
            return Err(EncoderError::Missing("streaming video"));
        };

        if !matches!(self.engine.video_format(), Some(f) if f.is_encoder_preferred()) {
            self.engine
                .set_preferred_video_format(video.id(), VideoFormat::PREFERRED[0]);
        }

        self.engine.update_encoder(video.id(), &video_settings);
        if let Some(audio) = self.audio_streaming.get() {
            self.engine.update_encoder(audio.id(), &audio_settings);
        }

        info!(
            family = family.name(),
            bitrate = video_bitrate,
            audio_bitrate,
            advanced,
            "Updated streaming encoder"
        );
        self.video_streaming.profile = Some(profile);
        Ok(())
    }

    /// Create the initial x264 recording encoder.
    #[instrument(name = "create_video_recording_encoder", skip_all)]
    pub fn create_video_recording_encoder(&mut self) -> EncoderResult<()> {
        let handle = self.create_video(ADVANCED_ENCODER_X264, RECORDING_ENCODER_NAME)?;
        self.video_recording.set(Some(handle), None);
        Ok(())
    }

    /// Point the recording slot at the streaming encoder.
    pub fn share_streaming_with_recording(&mut self) {
        if self.recording_shares_stream() {
            return;
        }
        self.video_recording.set(
            self.video_streaming.handle().cloned(),
            self.video_streaming.profile.clone(),
        );
        self.using_recording_preset = false;
        debug!("Recording with the streaming encoder");
    }

    /// Resolve `SimpleOutput.RecQuality` into a recording encoder setup.
    #[instrument(name = "update_video_recording_encoder", skip(self, config, service))]
    pub fn update_video_recording_encoder(
        &mut self,
        config: &mut ConfigStore,
        service: Option<ServiceId>,
        is_streaming: bool,
    ) -> EncoderResult<RecordingPlan> {
        let quality =
            RecordingQuality::from_config(config.get_string("SimpleOutput", "RecQuality"));

        match quality {
            RecordingQuality::Stream => {
                if !is_streaming {
                    self.update_video_streaming_encoder(config, service)?;
                }
                self.share_streaming_with_recording();
                Ok(RecordingPlan::SharedStream)
            }
            RecordingQuality::Lossless => {
                self.using_recording_preset = true;
                let profile = EncoderProfile::recording(EncoderFamily::LosslessUtVideo, 0, false);
                Ok(RecordingPlan::Lossless {
                    output_settings: profile.recording_settings(),
                })
            }
            RecordingQuality::HighQuality | RecordingQuality::Small => {
                let family = EncoderFamily::from_recording_name(
                    config
                        .get_string("SimpleOutput", "RecEncoder")
                        .unwrap_or(ADVANCED_ENCODER_X264),
                );
                self.low_cpu_x264 = family.is_low_cpu();

                let handle = self.create_video(family.engine_id(), RECORDING_ENCODER_NAME)?;
                self.using_recording_preset = true;

                let output = Resolution::new(
                    config_u32(config, "Video", "OutputCX"),
                    config_u32(config, "Video", "OutputCY"),
                );
                let crf = calc_crf(quality.base_crf(), self.low_cpu_x264, output);
                let icq_available = family == EncoderFamily::Qsv
                    && self
                        .engine
                        .encoder_property_options(handle.id(), "rate_control")
                        .iter()
                        .any(|option| option == "ICQ");

                let profile = EncoderProfile::recording(family, crf, icq_available);
                self.engine
                    .update_encoder(handle.id(), &profile.recording_settings());

                info!(family = family.name(), crf, ?quality, "Created recording encoder");
                self.video_recording.set(Some(handle), Some(profile));
                Ok(RecordingPlan::Dedicated { family })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use broadcaster_config::register_basic_defaults;
    use broadcaster_media::fake::FakeEngine;

    fn setup() -> (Arc<FakeEngine>, EncoderFactory, ConfigStore) {
        let fake = Arc::new(FakeEngine::new());
        let factory = EncoderFactory::new(fake.clone());
        let mut config = ConfigStore::in_memory();
        register_basic_defaults(&mut config);
        (fake, factory, config)
    }

    #[test]
    fn test_fresh_config_gets_default_bitrate_only() {
        let (fake, mut factory, mut config) = setup();
        factory.create_video_streaming_encoder(&mut config, None).unwrap();

        assert_eq!(config.get_uint("SimpleOutput", "VBitrate"), 2500);
        let id = factory.video_streaming().handle().unwrap().id();
        assert_eq!(fake.encoder(id).unwrap().update_count, 0);
        assert!(factory.video_streaming().profile().is_none());
    }

    #[test]
    fn test_existing_config_applies_settings() {
        let (fake, mut factory, mut config) = setup();
        config.set_string("SimpleOutput", "StreamEncoder", "nvenc");
        config.set_uint("SimpleOutput", "VBitrate", 6000);
        factory.create_video_streaming_encoder(&mut config, None).unwrap();

        let handle = factory.video_streaming().handle().unwrap();
        assert_eq!(handle.type_id(), "ffmpeg_nvenc");
        let encoder = fake.encoder(handle.id()).unwrap();
        assert_eq!(encoder.settings.get_int("bitrate"), Some(6000));
        assert_eq!(encoder.settings.get_string("rate_control"), Some("CBR"));
    }

    #[test]
    fn test_zero_bitrate_is_defaulted_and_persisted() {
        let (fake, mut factory, mut config) = setup();
        config.set_string("SimpleOutput", "StreamEncoder", "x264");
        factory.update_video_streaming_encoder(&mut config, None).unwrap();

        assert_eq!(config.get_uint("SimpleOutput", "VBitrate"), 2500);
        let id = factory.video_streaming().handle().unwrap().id();
        assert_eq!(fake.encoder(id).unwrap().settings.get_int("bitrate"), Some(2500));
    }

    #[test]
    fn test_update_reuses_same_family_and_replaces_other() {
        let (fake, mut factory, mut config) = setup();
        config.set_uint("SimpleOutput", "VBitrate", 3000);
        factory.update_video_streaming_encoder(&mut config, None).unwrap();
        let first = factory.video_streaming().handle().unwrap().id();

        factory.update_video_streaming_encoder(&mut config, None).unwrap();
        assert_eq!(factory.video_streaming().handle().unwrap().id(), first);

        config.set_string("SimpleOutput", "StreamEncoder", "qsv");
        factory.update_video_streaming_encoder(&mut config, None).unwrap();
        assert_ne!(factory.video_streaming().handle().unwrap().id(), first);
        assert_eq!(fake.released_encoders(), vec![first]);
    }

    #[test]
    fn test_service_constraints_and_enforce_bitrate() {
        let fake = Arc::new(FakeEngine::new().with_service_max_video_bitrate(4000));
        let mut factory = EncoderFactory::new(fake.clone());
        let mut config = ConfigStore::in_memory();
        let service = fake.create_service("rtmp_common", "default_service", None, None).unwrap();

        config.set_uint("SimpleOutput", "VBitrate", 8000);
        config.set_bool("SimpleOutput", "EnforceBitrate", true);
        factory.update_video_streaming_encoder(&mut config, Some(service)).unwrap();
        let id = factory.video_streaming().handle().unwrap().id();
        assert_eq!(fake.encoder(id).unwrap().settings.get_int("bitrate"), Some(4000));

        config.set_bool("SimpleOutput", "UseAdvanced", true);
        config.set_bool("SimpleOutput", "EnforceBitrate", false);
        factory.update_video_streaming_encoder(&mut config, Some(service)).unwrap();
        assert_eq!(fake.encoder(id).unwrap().settings.get_int("bitrate"), Some(8000));
    }

    #[test]
    fn test_non_preferred_format_forces_nv12() {
        let (fake, mut factory, mut config) = setup();
        config.set_uint("SimpleOutput", "VBitrate", 2500);
        factory.update_video_streaming_encoder(&mut config, None).unwrap();

        let id = factory.video_streaming().handle().unwrap().id();
        assert_eq!(fake.encoder(id).unwrap().preferred_format, Some(VideoFormat::Nv12));
    }

    #[test]
    fn test_audio_encoder_absent_without_aac() {
        let fake = Arc::new(FakeEngine::new().without_codec("aac"));
        let mut factory = EncoderFactory::new(fake);
        let mut config = ConfigStore::in_memory();
        config.set_uint("SimpleOutput", "ABitrate", 160);

        assert!(!factory.create_audio_encoder(&config, OutputType::Streaming).unwrap());
        assert!(factory.audio(OutputType::Streaming).is_none());
    }

    #[test]
    fn test_audio_encoder_uses_closest_bitrate() {
        let (_fake, mut factory, mut config) = setup();
        config.set_uint("SimpleOutput", "ABitrate", 150);

        assert_eq!(factory.audio_bitrate(&config), 160);
        assert!(factory.create_audio_encoder(&config, OutputType::Recording).unwrap());
        assert_eq!(
            factory.audio(OutputType::Recording).unwrap().type_id(),
            "ffmpeg_aac"
        );
    }

    #[test]
    fn test_codec_audio_encoder() {
        let (fake, mut factory, mut config) = setup();
        config.set_uint("SimpleOutput", "ABitrate", 128);

        factory.create_codec_audio_encoder(&config, "opus", 1).unwrap();
        let id = factory.audio(OutputType::Streaming).unwrap().id();
        let encoder = fake.encoder(id).unwrap();
        assert_eq!(encoder.type_id, "ffmpeg_opus");
        assert_eq!(encoder.mixer_idx, 1);
        assert!(encoder.audio_bound);
        assert_eq!(encoder.settings.get_int("bitrate"), Some(128));

        assert!(matches!(
            factory.create_codec_audio_encoder(&config, "mp3", 0),
            Err(EncoderError::NoEncoderForCodec(_))
        ));
    }

    #[test]
    fn test_stream_quality_shares_updated_streaming_encoder() {
        let (_fake, mut factory, mut config) = setup();
        config.set_uint("SimpleOutput", "VBitrate", 3500);

        let plan = factory
            .update_video_recording_encoder(&mut config, None, false)
            .unwrap();

        assert_eq!(plan, RecordingPlan::SharedStream);
        assert!(factory.recording_shares_stream());
        assert!(!factory.using_recording_preset());
        assert_eq!(
            factory.video_recording().profile().and_then(EncoderProfile::bitrate),
            Some(3500)
        );
    }

    #[test]
    fn test_dedicated_recording_encoder() {
        let (fake, mut factory, mut config) = setup();
        config.set_string("SimpleOutput", "RecQuality", "HQ");
        config.set_string("SimpleOutput", "RecEncoder", "x264_lowcpu");
        config.set_uint("Video", "OutputCX", 1920);
        config.set_uint("Video", "OutputCY", 1080);

        let plan = factory
            .update_video_recording_encoder(&mut config, None, false)
            .unwrap();
        assert_eq!(plan, RecordingPlan::Dedicated { family: EncoderFamily::X264LowCpu });
        assert!(factory.using_recording_preset());
        assert!(factory.low_cpu_x264());

        let id = factory.video_recording().handle().unwrap().id();
        let settings = fake.encoder(id).unwrap().settings;
        // 1920x1080: diagonal ~2203 is past the cutoff.
        assert_eq!(settings.get_int("crf"), Some(14));
        assert_eq!(settings.get_string("preset"), Some("ultrafast"));
    }

    #[test]
    fn test_x264_recording_encoder_settings() {
        let (fake, mut factory, mut config) = setup();
        config.set_string("SimpleOutput", "RecQuality", "Small");
        config.set_string("SimpleOutput", "RecEncoder", "x264");
        config.set_uint("Video", "OutputCX", 1920);
        config.set_uint("Video", "OutputCY", 1080);

        let plan = factory
            .update_video_recording_encoder(&mut config, None, false)
            .unwrap();
        assert_eq!(plan, RecordingPlan::Dedicated { family: EncoderFamily::X264 });
        assert!(!factory.low_cpu_x264());

        let id = factory.video_recording().handle().unwrap().id();
        let encoder = fake.encoder(id).unwrap();
        assert_eq!(encoder.type_id, "obs_x264");
        let settings = encoder.settings;
        assert_eq!(settings.get_string("rate_control"), Some("CRF"));
        assert_eq!(settings.get_int("crf"), Some(23));
        assert_eq!(settings.get_string("preset"), Some("veryfast"));
        assert_eq!(settings.get_string("profile"), Some("high"));
        assert_eq!(settings.get_bool("use_bufsize"), Some(true));
    }

    #[test]
    fn test_amd_recording_encoder_uses_cqp() {
        let (fake, mut factory, mut config) = setup();
        config.set_string("SimpleOutput", "RecQuality", "HQ");
        config.set_string("SimpleOutput", "RecEncoder", "amd");
        config.set_uint("Video", "OutputCX", 1920);
        config.set_uint("Video", "OutputCY", 1080);

        let plan = factory
            .update_video_recording_encoder(&mut config, None, false)
            .unwrap();
        assert_eq!(plan, RecordingPlan::Dedicated { family: EncoderFamily::Amd });

        let id = factory.video_recording().handle().unwrap().id();
        let encoder = fake.encoder(id).unwrap();
        assert_eq!(encoder.type_id, "amd_amf_h264");
        let settings = encoder.settings;
        assert_eq!(settings.get_int("RateControlMethod"), Some(0));
        assert_eq!(settings.get_int("QP.IFrame"), Some(16));
        assert_eq!(settings.get_int("QP.BFrame"), Some(16));
        assert_eq!(settings.get_int("VBVBuffer.Size"), Some(100_000));
    }

    #[test]
    fn test_qsv_recording_uses_offered_icq() {
        let fake = Arc::new(
            FakeEngine::new().with_rate_control_options("obs_qsv11", &["CBR", "ICQ", "CQP"]),
        );
        let mut factory = EncoderFactory::new(fake.clone());
        let mut config = ConfigStore::in_memory();
        config.set_string("SimpleOutput", "RecQuality", "Small");
        config.set_string("SimpleOutput", "RecEncoder", "qsv");
        config.set_uint("Video", "OutputCX", 2560);
        config.set_uint("Video", "OutputCY", 1440);

        factory
            .update_video_recording_encoder(&mut config, None, false)
            .unwrap();
        let id = factory.video_recording().handle().unwrap().id();
        let settings = fake.encoder(id).unwrap().settings;
        assert_eq!(settings.get_string("rate_control"), Some("ICQ"));
        assert_eq!(settings.get_int("icq_quality"), Some(23));
    }

    #[test]
    fn test_lossless_plan() {
        let (_fake, mut factory, mut config) = setup();
        config.set_string("SimpleOutput", "RecQuality", "Lossless");

        let plan = factory
            .update_video_recording_encoder(&mut config, None, false)
            .unwrap();
        let RecordingPlan::Lossless { output_settings } = plan else {
            panic!("expected lossless plan");
        };
        assert_eq!(output_settings.get_string("format_name"), Some("avi"));
        assert!(factory.using_recording_preset());
    }

    #[test]
    fn test_create_failure_is_reported() {
        let (fake, mut factory, mut config) = setup();
        fake.fail_creating("obs_x264");

        assert!(matches!(
            factory.create_video_streaming_encoder(&mut config, None),
            Err(EncoderError::CreateFailed { .. })
        ));
        assert!(!factory.video_streaming().is_bound());
    }
}
