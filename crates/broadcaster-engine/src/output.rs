//! Output and service ownership.
//!
//! The binder creates outputs and the streaming service, keeps the signal
//! relay subscribed to whatever outputs are live, and wires encoders and
//! services into outputs.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use broadcaster_config::ServiceDocument;
use broadcaster_ipc::OutputType;
use broadcaster_media::{
    EncoderHandle, HandleSlot, MediaEngine, OutputHandle, OutputId, ServiceHandle, ServiceId,
    Settings,
};

use crate::error::{SessionError, SessionResult};
use crate::signals::SignalRelay;

/// Engine output type used when the service does not name one.
pub const DEFAULT_STREAMING_OUTPUT: &str = "rtmp_output";
pub const STREAMING_OUTPUT_NAME: &str = "simple_stream";

pub const FILE_OUTPUT_TYPE: &str = "ffmpeg_muxer";
const FILE_OUTPUT_NAME: &str = "simple_file_output";
const RAW_OUTPUT_TYPE: &str = "ffmpeg_output";
const RAW_OUTPUT_NAME: &str = "simple_ffmpeg_output";

const DEFAULT_SERVICE_TYPE: &str = "rtmp_common";
const SERVICE_NAME: &str = "default_service";

/// Settings of the service created when none was saved.
fn default_service_settings() -> Settings {
    let mut settings = Settings::new();
    settings
        .set_string("streamType", DEFAULT_SERVICE_TYPE)
        .set_string("service", "Twitch")
        .set_bool("show_all", false)
        .set_string("server", "auto")
        .set_string("key", "");
    settings
}

/// Owns the session's outputs and service.
pub struct OutputBinder {
    engine: Arc<dyn MediaEngine>,
    relay: SignalRelay,
    streaming: HandleSlot<OutputHandle>,
    recording: HandleSlot<OutputHandle>,
    service: HandleSlot<ServiceHandle>,
    service_path: Option<PathBuf>,
}

impl OutputBinder {
    /// `service_path` is where the service document lives; `None` keeps
    /// the service in memory only.
    pub fn new(engine: Arc<dyn MediaEngine>, relay: SignalRelay, service_path: Option<PathBuf>) -> Self {
        Self {
            engine,
            relay,
            streaming: HandleSlot::new(),
            recording: HandleSlot::new(),
            service: HandleSlot::new(),
            service_path,
        }
    }

    pub fn relay(&self) -> &SignalRelay {
        &self.relay
    }

    pub fn output(&self, output_type: OutputType) -> Option<&Arc<OutputHandle>> {
        match output_type {
            OutputType::Streaming => self.streaming.get(),
            OutputType::Recording => self.recording.get(),
        }
    }

    /// Engine id of an existing output.
    pub fn output_id(&self, output_type: OutputType) -> SessionResult<OutputId> {
        self.output(output_type)
            .map(|h| h.id())
            .ok_or(SessionError::NoOutput(output_type))
    }

    pub fn service(&self) -> Option<&Arc<ServiceHandle>> {
        self.service.get()
    }

    pub fn service_id(&self) -> Option<ServiceId> {
        self.service.get().map(|s| s.id())
    }

    fn slot_mut(&mut self, output_type: OutputType) -> &mut HandleSlot<OutputHandle> {
        match output_type {
            OutputType::Streaming => &mut self.streaming,
            OutputType::Recording => &mut self.recording,
        }
    }

    /// Create an output, replace the slot's previous one and move the
    /// relay subscriptions over to it.
    fn create_output(
        &mut self,
        output_type: OutputType,
        type_id: &str,
        name: &str,
    ) -> SessionResult<OutputId> {
        let id = self
            .engine
            .create_output(type_id, name)
            .map_err(|source| SessionError::CreateFailed {
                kind: "output",
                source,
            })?;

        let handle = Arc::new(OutputHandle::new(self.engine.clone(), id, type_id, name));
        // Subscriptions on the old output must go before it is released.
        self.relay.connect(output_type, Some(id));
        self.slot_mut(output_type).replace(handle);

        info!(output_type = %output_type, type_id, name, output_id = ?id, "Created output");
        Ok(id)
    }

    #[instrument(name = "create_streaming_output", skip(self))]
    pub fn create_streaming_output(&mut self, type_id: &str) -> SessionResult<OutputId> {
        self.create_output(OutputType::Streaming, type_id, STREAMING_OUTPUT_NAME)
    }

    /// Output type the live service prefers, or RTMP.
    pub fn preferred_streaming_output(&self) -> String {
        self.service_id()
            .and_then(|id| self.engine.service_output_type(id))
            .unwrap_or_else(|| DEFAULT_STREAMING_OUTPUT.to_string())
    }

    #[instrument(name = "create_recording_output", skip(self))]
    pub fn create_recording_output(&mut self) -> SessionResult<OutputId> {
        self.create_output(OutputType::Recording, FILE_OUTPUT_TYPE, FILE_OUTPUT_NAME)
    }

    /// Create a raw FFmpeg recording output. It takes video and audio from
    /// the engine directly instead of from encoders.
    #[instrument(name = "create_raw_recording_output", skip_all)]
    pub fn create_raw_recording_output(&mut self, settings: &Settings) -> SessionResult<OutputId> {
        let id = self.create_output(OutputType::Recording, RAW_OUTPUT_TYPE, RAW_OUTPUT_NAME)?;
        self.engine.update_output(id, settings);
        Ok(id)
    }

    /// Re-subscribe the relay to both current outputs.
    pub fn connect_signals(&self) {
        self.relay
            .connect(OutputType::Streaming, self.streaming.get().map(|h| h.id()));
        self.relay
            .connect(OutputType::Recording, self.recording.get().map(|h| h.id()));
    }

    /// Create the service from the saved document, or a default
    /// `rtmp_common` service if there is none. The document is saved back.
    #[instrument(name = "create_service", skip(self))]
    pub fn create_service(&mut self) -> SessionResult<ServiceId> {
        let saved = self
            .service_path
            .as_deref()
            .and_then(|path| ServiceDocument::load_json_safe(path, "bak"));

        let (document, id) = match saved {
            Some(document) => {
                debug!(service_type = %document.service_type, "Loaded service document");
                let id = self
                    .engine
                    .create_service(
                        &document.service_type,
                        SERVICE_NAME,
                        Some(&document.settings),
                        document.hotkeys.as_ref(),
                    )
                    .map_err(|source| SessionError::CreateFailed {
                        kind: "service",
                        source,
                    })?;
                (document, id)
            }
            None => {
                let settings = default_service_settings();
                let id = self
                    .engine
                    .create_service(DEFAULT_SERVICE_TYPE, SERVICE_NAME, Some(&settings), None)
                    .map_err(|source| SessionError::CreateFailed {
                        kind: "service",
                        source,
                    })?;
                (ServiceDocument::new(DEFAULT_SERVICE_TYPE, settings), id)
            }
        };

        self.service.replace(Arc::new(ServiceHandle::new(
            self.engine.clone(),
            id,
            document.service_type.as_str(),
            SERVICE_NAME,
        )));
        self.write_document(&document);

        info!(service_type = %document.service_type, service_id = ?id, "Created service");
        Ok(id)
    }

    /// Persist the live service's type and settings, then re-apply the
    /// settings to it.
    #[instrument(name = "save_service", skip(self))]
    pub fn save_service(&self) -> SessionResult<()> {
        let service = self.service.get().ok_or(SessionError::NoService)?;
        let settings = self.engine.service_settings(service.id());
        let service_type = self
            .engine
            .service_type(service.id())
            .unwrap_or_else(|| service.type_id().to_string());

        let document = ServiceDocument::new(service_type, settings);
        self.write_document(&document);
        self.engine.update_service(service.id(), &document.settings);
        Ok(())
    }

    fn write_document(&self, document: &ServiceDocument) {
        let Some(path) = self.service_path.as_deref() else {
            return;
        };
        if let Err(e) = document.save_json_safe(path, "tmp", "bak") {
            warn!(error = %e, path = %path.display(), "Failed to save service");
        }
    }

    pub fn set_service_to_streaming_output(&self) -> SessionResult<()> {
        let output = self.output_id(OutputType::Streaming)?;
        let service = self.service_id().ok_or(SessionError::NoService)?;
        self.engine.set_output_service(output, service);
        debug!(?output, ?service, "Service bound to streaming output");
        Ok(())
    }

    /// Attach encoders to an output. Nothing is attached unless the output
    /// and both encoders exist.
    pub fn associate_encoders(
        &self,
        output_type: OutputType,
        video: Option<&Arc<EncoderHandle>>,
        audio: Option<&Arc<EncoderHandle>>,
    ) -> SessionResult<()> {
        let output = self.output_id(output_type)?;
        let video = video.ok_or(SessionError::MissingEncoder {
            output: output_type,
            kind: "video",
        })?;
        let audio = audio.ok_or(SessionError::MissingEncoder {
            output: output_type,
            kind: "audio",
        })?;

        self.engine.set_output_video_encoder(output, video.id());
        self.engine.set_output_audio_encoder(output, audio.id(), 0);
        debug!(output_type = %output_type, video = ?video.id(), audio = ?audio.id(), "Encoders bound to output");
        Ok(())
    }
}
