//! The output session.
//!
//! A [`Session`] owns the config store, the encoder factory, the outputs
//! and the service, and sequences the engine calls behind every operation
//! callers can issue. Operations run on the caller's thread; only signal
//! delivery crosses threads.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use broadcaster_config::{register_basic_defaults, ConfigStore};
use broadcaster_encoder::{EncoderError, EncoderFactory, RecordingPlan, RecordingQuality};
use broadcaster_ipc::{output_code, OutputType, SessionStatus, SignalEvent};
use broadcaster_media::{DelayFlags, EncoderHandle, MediaEngine, Settings};

use crate::context::ContextManager;
use crate::error::{SessionError, SessionResult};
use crate::output::{OutputBinder, FILE_OUTPUT_TYPE};
use crate::recording::{
    advanced_recording_settings, ffmpeg_output_settings, migrate_ffmpeg_url, rescale_target,
    simple_recording_settings, FFMPEG_RECORDING_TYPE,
};
use crate::signals::{RelayedSignal, SignalRelay};
use crate::state::OutputLifecycle;

const RECORDING_START_FAILED: &str = "Recording output failed to start";

/// Configuration schema selected by `Output.Mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Simple,
    Advanced,
}

impl OutputMode {
    fn from_config(config: &ConfigStore) -> Self {
        match config.get_string("Output", "Mode") {
            Some("Advanced") => Self::Advanced,
            _ => Self::Simple,
        }
    }
}

/// Session state for one engine.
pub struct Session {
    engine: Arc<dyn MediaEngine>,
    config: ConfigStore,
    context: ContextManager,
    encoders: EncoderFactory,
    outputs: OutputBinder,
    streaming: OutputLifecycle,
    recording: OutputLifecycle,
    lossless_recording: bool,
}

impl Session {
    /// Build a session over `engine`. Defaults are registered on `config`;
    /// the service document is kept at `service_path` when given.
    pub fn new(
        engine: Arc<dyn MediaEngine>,
        mut config: ConfigStore,
        service_path: Option<PathBuf>,
    ) -> Self {
        register_basic_defaults(&mut config);
        let relay = SignalRelay::new(engine.clone());

        Self {
            context: ContextManager::new(engine.clone()),
            encoders: EncoderFactory::new(engine.clone()),
            outputs: OutputBinder::new(engine.clone(), relay, service_path),
            engine,
            config,
            streaming: OutputLifecycle::new(),
            recording: OutputLifecycle::new(),
            lossless_recording: false,
        }
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ConfigStore {
        &mut self.config
    }

    pub fn encoders(&self) -> &EncoderFactory {
        &self.encoders
    }

    pub fn outputs(&self) -> &OutputBinder {
        &self.outputs
    }

    fn lifecycle_mut(&mut self, output_type: OutputType) -> &mut OutputLifecycle {
        match output_type {
            OutputType::Streaming => &mut self.streaming,
            OutputType::Recording => &mut self.recording,
        }
    }

    // Context

    pub fn reset_audio_context(&self) -> bool {
        self.context.reset_audio(&self.config)
    }

    pub fn reset_video_context(&mut self, purpose: &str) -> bool {
        self.context.reset_video(&mut self.config, purpose)
    }

    // Encoders

    /// Create the streaming AAC encoder. `false` when no AAC encoder
    /// supports the configured bitrate.
    pub fn create_audio_encoder(&mut self) -> SessionResult<bool> {
        Ok(self
            .encoders
            .create_audio_encoder(&self.config, OutputType::Streaming)?)
    }

    pub fn create_video_streaming_encoder(&mut self) -> SessionResult<()> {
        let service = self.outputs.service_id();
        self.encoders
            .create_video_streaming_encoder(&mut self.config, service)?;
        Ok(())
    }

    pub fn create_video_recording_encoder(&mut self) -> SessionResult<()> {
        self.encoders.create_video_recording_encoder()?;
        Ok(())
    }

    // Service

    pub fn create_service(&mut self) -> SessionResult<()> {
        self.outputs.create_service()?;
        Ok(())
    }

    pub fn save_service(&self) -> SessionResult<()> {
        self.outputs.save_service()
    }

    /// Re-bind the live service to the streaming output.
    pub fn update_service(&self) -> SessionResult<()> {
        self.outputs.set_service_to_streaming_output()
    }

    pub fn set_service_to_streaming_output(&self) -> SessionResult<()> {
        self.outputs.set_service_to_streaming_output()
    }

    // Outputs

    pub fn create_streaming_output(&mut self) -> SessionResult<()> {
        let type_id = self.outputs.preferred_streaming_output();
        self.outputs.create_streaming_output(&type_id)?;
        self.streaming.on_created();
        Ok(())
    }

    pub fn create_recording_output(&mut self) -> SessionResult<()> {
        self.outputs.create_recording_output()?;
        self.lossless_recording = false;
        self.recording.on_created();
        Ok(())
    }

    /// Settings the recording output would get in the current mode.
    pub fn create_recording_settings(&self) -> Settings {
        match OutputMode::from_config(&self.config) {
            OutputMode::Simple => simple_recording_settings(
                &self.config,
                self.encoders.using_recording_preset(),
                self.lossless_recording,
            ),
            OutputMode::Advanced
                if self.config.get_string("AdvOut", "RecType") == Some(FFMPEG_RECORDING_TYPE) =>
            {
                ffmpeg_output_settings(&self.config)
            }
            OutputMode::Advanced => advanced_recording_settings(&self.config),
        }
    }

    /// Build the recording settings and apply them to the recording output.
    pub fn set_recording_settings(&self) -> SessionResult<()> {
        let output = self.outputs.output_id(OutputType::Recording)?;
        self.engine
            .update_output(output, &self.create_recording_settings());
        Ok(())
    }

    pub fn connect_output_signals(&self) {
        self.outputs.connect_signals();
    }

    // Associations

    fn encoder_pair(
        &self,
        output_type: OutputType,
    ) -> SessionResult<(Arc<EncoderHandle>, Arc<EncoderHandle>)> {
        let video = self
            .encoders
            .video(output_type)
            .cloned()
            .ok_or(SessionError::MissingEncoder {
                output: output_type,
                kind: "video",
            })?;
        let audio = self
            .encoders
            .audio(output_type)
            .cloned()
            .ok_or(SessionError::MissingEncoder {
                output: output_type,
                kind: "audio",
            })?;
        Ok((video, audio))
    }

    /// Feed encoders of `output_type` from the global pipelines, applying
    /// the advanced-mode rescale first.
    fn associate_context(
        &self,
        output_type: OutputType,
        rescale_flag: &str,
        rescale_key: &str,
    ) -> SessionResult<()> {
        let (video, audio) = self.encoder_pair(output_type)?;

        if OutputMode::from_config(&self.config) == OutputMode::Advanced
            && self.config.get_bool("AdvOut", rescale_flag)
            && self
                .config
                .get_string("AdvOut", rescale_key)
                .is_some_and(|s| !s.is_empty())
        {
            let (cx, cy) = rescale_target(&self.config, "AdvOut", rescale_flag, rescale_key)
                .map_or((0, 0), |r| (r.width, r.height));
            self.engine.set_scaled_size(video.id(), cx, cy);
        }

        self.engine.bind_encoder_video(video.id());
        self.engine.bind_encoder_audio(audio.id());
        debug!(output_type = %output_type, "Encoders bound to pipelines");
        Ok(())
    }

    pub fn associate_audio_and_video_to_streaming_context(&self) -> SessionResult<()> {
        self.associate_context(OutputType::Streaming, "Rescale", "RescaleRes")
    }

    pub fn associate_audio_and_video_to_recording_context(&self) -> SessionResult<()> {
        self.associate_context(OutputType::Recording, "RecRescale", "RecRescaleRes")
    }

    pub fn associate_encoders_to_streaming_output(&mut self) -> SessionResult<()> {
        self.outputs.associate_encoders(
            OutputType::Streaming,
            self.encoders.video(OutputType::Streaming),
            self.encoders.audio(OutputType::Streaming),
        )?;
        if self.outputs.service().is_some() {
            self.streaming.on_bound();
        }
        Ok(())
    }

    pub fn associate_encoders_to_recording_output(&mut self) -> SessionResult<()> {
        self.outputs.associate_encoders(
            OutputType::Recording,
            self.encoders.video(OutputType::Recording),
            self.encoders.audio(OutputType::Recording),
        )?;
        self.recording.on_bound();
        Ok(())
    }

    // Start / stop

    fn check_startable(&self, output_type: OutputType) -> SessionResult<()> {
        let lifecycle = match output_type {
            OutputType::Streaming => &self.streaming,
            OutputType::Recording => &self.recording,
        };
        if lifecycle.is_active_requested() {
            return Err(SessionError::AlreadyActive(output_type));
        }
        if !self.context.is_video_ready() {
            return Err(SessionError::VideoContextNotReady);
        }
        Ok(())
    }

    /// Create the streaming output for the service, resolve its audio
    /// encoder, apply stream settings and start it.
    ///
    /// Returns the engine's start result. Nothing created along the way is
    /// rolled back on failure.
    #[instrument(name = "start_streaming", skip(self))]
    pub fn start_streaming(&mut self) -> SessionResult<bool> {
        self.check_startable(OutputType::Streaming)?;
        if self.outputs.service().is_none() {
            return Err(SessionError::NoService);
        }

        self.create_streaming_output()?;
        let output = self.outputs.output_id(OutputType::Streaming)?;

        let codecs = self.engine.output_supported_audio_codecs(output);
        let codec = codecs
            .as_deref()
            .and_then(|list| list.split(';').next())
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| SessionError::UnsupportedCodec(codecs.clone().unwrap_or_default()))?
            .to_string();

        if codec == "aac" {
            if !self.create_audio_encoder()? {
                return Err(SessionError::UnsupportedCodec(codec));
            }
        } else {
            let track = self.config.get_uint("AdvOut", "TrackIndex").saturating_sub(1);
            let mixer = usize::try_from(track).unwrap_or(0);
            self.encoders
                .create_codec_audio_encoder(&self.config, &codec, mixer)
                .map_err(|e| match e {
                    EncoderError::NoEncoderForCodec(codec) => SessionError::UnsupportedCodec(codec),
                    other => other.into(),
                })?;
        }

        self.update_service()?;
        self.update_stream_settings()?;

        let started = self.engine.start_output(output);
        if started {
            self.streaming.on_started();
            info!(codec, "Streaming started");
        } else {
            self.streaming.on_start_failed();
            warn!("Streaming output refused to start");
        }
        Ok(started)
    }

    fn update_stream_settings(&mut self) -> SessionResult<()> {
        match OutputMode::from_config(&self.config) {
            OutputMode::Simple => {
                let quality = RecordingQuality::from_config(
                    self.config.get_string("SimpleOutput", "RecQuality"),
                );
                // A running recording may share this encoder.
                if quality != RecordingQuality::Stream || !self.recording.is_active_requested() {
                    let service = self.outputs.service_id();
                    self.encoders
                        .update_video_streaming_encoder(&mut self.config, service)?;
                }
            }
            OutputMode::Advanced => {
                if self.config.get_bool("AdvOut", "ApplyServiceSettings") {
                    let service = self.outputs.service_id().ok_or(SessionError::NoService)?;
                    let video = self
                        .encoders
                        .video(OutputType::Streaming)
                        .ok_or(SessionError::MissingEncoder {
                            output: OutputType::Streaming,
                            kind: "video",
                        })?;
                    let mut settings = self.engine.encoder_settings(video.id());
                    self.engine
                        .apply_service_encoder_settings(service, &mut settings, None);
                    self.engine.update_encoder(video.id(), &settings);
                }
            }
        }

        let output = self.outputs.output_id(OutputType::Streaming)?;
        let delay = if self.config.get_bool("Output", "DelayEnable") {
            u32::try_from(self.config.get_uint("Output", "DelaySec")).unwrap_or(u32::MAX)
        } else {
            0
        };
        let flags = DelayFlags {
            preserve: self.config.get_bool("Output", "DelayPreserve"),
        };
        self.engine.set_output_delay(output, delay, flags);

        self.associate_audio_and_video_to_streaming_context()?;
        self.associate_encoders_to_streaming_output()
    }

    /// Create the recording audio encoder, apply recording settings and
    /// start the recording output.
    ///
    /// When the engine refuses to start, a `stop` event carrying an error
    /// code is queued so pollers see the recording end.
    #[instrument(name = "start_recording", skip(self))]
    pub fn start_recording(&mut self) -> SessionResult<bool> {
        self.check_startable(OutputType::Recording)?;

        self.encoders
            .create_audio_encoder(&self.config, OutputType::Recording)?;
        self.update_record_settings()?;

        let output = self.outputs.output_id(OutputType::Recording)?;
        if self.engine.start_output(output) {
            self.recording.on_started();
            info!(lossless = self.lossless_recording, "Recording started");
            return Ok(true);
        }

        let message = self
            .engine
            .output_last_error(output)
            .unwrap_or_else(|| RECORDING_START_FAILED.to_string());
        error!(%message, "Recording output refused to start");
        self.outputs.relay().enqueue(
            output,
            SignalEvent::with_code(
                OutputType::Recording,
                "stop",
                output_code::ERROR,
                Some(message),
            ),
        );
        self.recording.on_start_failed();
        Ok(false)
    }

    fn ensure_file_recording_output(&mut self) -> SessionResult<()> {
        let is_file_output = self
            .outputs
            .output(OutputType::Recording)
            .is_some_and(|o| o.type_id() == FILE_OUTPUT_TYPE);
        if !is_file_output {
            self.create_recording_output()?;
        }
        Ok(())
    }

    fn update_record_settings(&mut self) -> SessionResult<()> {
        match OutputMode::from_config(&self.config) {
            OutputMode::Simple => self.update_simple_recording(),
            OutputMode::Advanced
                if self.config.get_string("AdvOut", "RecType") == Some(FFMPEG_RECORDING_TYPE) =>
            {
                self.update_ffmpeg_recording()
            }
            OutputMode::Advanced => self.update_advanced_recording(),
        }
    }

    fn update_simple_recording(&mut self) -> SessionResult<()> {
        let service = self.outputs.service_id();
        let is_streaming = self.streaming.is_active_requested();
        let plan = self
            .encoders
            .update_video_recording_encoder(&mut self.config, service, is_streaming)?;

        if let RecordingPlan::Lossless { output_settings } = plan {
            self.lossless_recording = true;
            let output = self.outputs.create_raw_recording_output(&output_settings)?;
            self.recording.on_created();
            self.engine.update_output(output, &self.create_recording_settings());
            self.engine.bind_output_media(output);
            self.recording.on_bound();
            return Ok(());
        }

        self.ensure_file_recording_output()?;
        self.set_recording_settings()?;
        self.associate_audio_and_video_to_recording_context()?;
        self.associate_encoders_to_recording_output()
    }

    fn update_ffmpeg_recording(&mut self) -> SessionResult<()> {
        if !self.reset_video_context("Record") {
            warn!("Video reset for FFmpeg recording failed");
        }
        migrate_ffmpeg_url(&mut self.config);

        let settings = ffmpeg_output_settings(&self.config);
        let output = self.outputs.create_raw_recording_output(&settings)?;
        self.lossless_recording = false;
        self.recording.on_created();

        let track = self.config.get_uint("AdvOut", "FFAudioTrack").saturating_sub(1);
        self.engine
            .set_output_mixer(output, usize::try_from(track).unwrap_or(0));
        self.engine.bind_output_media(output);
        self.recording.on_bound();
        Ok(())
    }

    fn update_advanced_recording(&mut self) -> SessionResult<()> {
        let use_stream_encoder = self
            .config
            .get_string("AdvOut", "RecEncoder")
            .map_or(true, |e| e.is_empty() || e.eq_ignore_ascii_case("none"));

        if use_stream_encoder {
            if self.encoders.video(OutputType::Streaming).is_none() {
                self.create_video_streaming_encoder()?;
            }
            self.encoders.share_streaming_with_recording();
        } else {
            if self.encoders.recording_shares_stream()
                || self.encoders.video(OutputType::Recording).is_none()
            {
                self.encoders.create_video_recording_encoder()?;
            }
            if let Some(video) = self.encoders.video(OutputType::Recording) {
                let (cx, cy) = rescale_target(&self.config, "AdvOut", "RecRescale", "RecRescaleRes")
                    .map_or((0, 0), |r| (r.width, r.height));
                self.engine.set_scaled_size(video.id(), cx, cy);
                self.engine.bind_encoder_video(video.id());
            }
        }

        self.lossless_recording = false;
        self.ensure_file_recording_output()?;
        self.set_recording_settings()?;
        self.associate_audio_and_video_to_recording_context()?;
        self.associate_encoders_to_recording_output()
    }

    #[instrument(name = "stop_streaming", skip(self))]
    pub fn stop_streaming(&mut self, force: bool) -> SessionResult<()> {
        let output = self.outputs.output_id(OutputType::Streaming)?;
        if force {
            self.engine.force_stop_output(output);
        } else {
            self.engine.stop_output(output);
        }
        self.streaming.on_stop_requested(force);
        info!(force, "Streaming stop requested");
        Ok(())
    }

    #[instrument(name = "stop_recording", skip(self))]
    pub fn stop_recording(&mut self) -> SessionResult<()> {
        let output = self.outputs.output_id(OutputType::Recording)?;
        self.engine.stop_output(output);
        self.recording.on_stop_requested(false);
        info!("Recording stop requested");
        Ok(())
    }

    // Signals and status

    /// Pop the oldest relayed signal and apply it to the output's lifecycle.
    ///
    /// Events from an output that has since been replaced are still
    /// returned but leave the lifecycle alone.
    pub fn poll_signal(&mut self) -> Option<SignalEvent> {
        let RelayedSignal { source, event } = self.outputs.relay().poll()?;
        let output_type = event.output_type();

        if self.outputs.output_id(output_type).ok() == Some(source) {
            self.lifecycle_mut(output_type).on_signal(&event);
        } else {
            debug!(output_type = %output_type, signal = event.signal(), ?source, "Signal from a replaced output");
        }
        Some(event)
    }

    /// Engine's view of whether the streaming output is running.
    pub fn is_streaming_output_active(&self) -> bool {
        self.outputs
            .output(OutputType::Streaming)
            .is_some_and(|o| self.engine.output_active(o.id()))
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            video_context_ready: self.context.is_video_ready(),
            streaming: self.streaming.status(OutputType::Streaming),
            recording: self.recording.status(OutputType::Recording),
        }
    }
}
