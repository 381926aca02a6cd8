//! In-memory media engine.
//!
//! Records every call so headless runs and tests can inspect what the
//! session core did, and lets callers fire output signals the way the real
//! engine does from its own threads.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::engine::{MediaEngine, SignalHandler};
use crate::error::MediaError;
use crate::settings::Settings;
use crate::types::{
    AudioInfo, DelayFlags, EncoderId, OutputId, Resolution, ServiceId, SignalParams,
    SubscriptionId, VideoFormat, VideoInfo,
};
use crate::MediaResult;

/// Recorded state of an encoder.
#[derive(Debug, Clone)]
pub struct FakeEncoder {
    pub type_id: String,
    pub name: String,
    pub audio: bool,
    pub mixer_idx: usize,
    pub settings: Settings,
    pub update_count: usize,
    pub preferred_format: Option<VideoFormat>,
    pub scaled_size: Option<(u32, u32)>,
    pub video_bound: bool,
    pub audio_bound: bool,
}

/// Recorded state of an output.
#[derive(Debug, Clone)]
pub struct FakeOutput {
    pub output_type: String,
    pub name: String,
    pub settings: Settings,
    pub video_encoder: Option<EncoderId>,
    pub audio_encoder: Option<EncoderId>,
    pub service: Option<ServiceId>,
    pub delay: Option<(u32, DelayFlags)>,
    pub mixer_idx: Option<usize>,
    pub media_bound: bool,
    pub active: bool,
    pub start_count: usize,
    /// One entry per stop call; `true` for forced stops.
    pub stops: Vec<bool>,
    pub last_error: Option<String>,
}

/// Recorded state of a service.
#[derive(Debug, Clone)]
pub struct FakeService {
    pub service_type: String,
    pub name: String,
    pub settings: Settings,
    pub hotkeys: Option<Settings>,
}

struct Subscription {
    id: SubscriptionId,
    output: OutputId,
    signal: String,
    handler: SignalHandler,
}

struct FakeState {
    next_id: u64,
    initialized: bool,
    audio: Option<AudioInfo>,
    video: Option<VideoInfo>,
    resolutions: Vec<Resolution>,
    encoder_types: Vec<(String, String)>,
    aac_bitrates: Vec<u32>,
    output_codecs: HashMap<String, Option<String>>,
    rate_control_options: HashMap<String, Vec<String>>,
    service_output_type: Option<String>,
    service_max_video_bitrate: Option<i64>,
    reject_audio: bool,
    reject_video: bool,
    failing_types: HashSet<String>,
    start_result: bool,
    encoders: HashMap<EncoderId, FakeEncoder>,
    outputs: HashMap<OutputId, FakeOutput>,
    services: HashMap<ServiceId, FakeService>,
    subscriptions: Vec<Subscription>,
    released_encoders: Vec<EncoderId>,
    released_outputs: Vec<OutputId>,
    released_services: Vec<ServiceId>,
}

impl FakeState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Media engine that keeps everything in memory.
pub struct FakeEngine {
    state: Mutex<FakeState>,
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeEngine {
    /// Engine with two displays, the usual H.264 families, AAC and Opus
    /// encoders, and AAC-only RTMP/file outputs.
    pub fn new() -> Self {
        let encoder_types = [
            ("obs_x264", "h264"),
            ("obs_qsv11", "h264"),
            ("amd_amf_h264", "h264"),
            ("ffmpeg_nvenc", "h264"),
            ("ffmpeg_aac", "aac"),
            ("ffmpeg_opus", "opus"),
        ]
        .into_iter()
        .map(|(id, codec)| (id.to_string(), codec.to_string()))
        .collect();

        let output_codecs = [
            ("rtmp_output", Some("aac")),
            ("ffmpeg_muxer", Some("aac")),
            ("ffmpeg_output", None),
        ]
        .into_iter()
        .map(|(ty, codec)| (ty.to_string(), codec.map(str::to_string)))
        .collect();

        let rate_control_options = [(
            "obs_qsv11".to_string(),
            vec!["CBR".to_string(), "VBR".to_string(), "CQP".to_string()],
        )]
        .into_iter()
        .collect();

        Self {
            state: Mutex::new(FakeState {
                next_id: 0,
                initialized: true,
                audio: None,
                video: None,
                resolutions: vec![Resolution::new(1920, 1080), Resolution::new(2560, 1440)],
                encoder_types,
                aac_bitrates: vec![64, 96, 128, 160, 192, 256, 320],
                output_codecs,
                rate_control_options,
                service_output_type: None,
                service_max_video_bitrate: None,
                reject_audio: false,
                reject_video: false,
                failing_types: HashSet::new(),
                start_result: true,
                encoders: HashMap::new(),
                outputs: HashMap::new(),
                services: HashMap::new(),
                subscriptions: Vec::new(),
                released_encoders: Vec::new(),
                released_outputs: Vec::new(),
                released_services: Vec::new(),
            }),
        }
    }

    /// Replace the attached display list.
    pub fn with_resolutions(self, resolutions: Vec<Resolution>) -> Self {
        self.state.lock().resolutions = resolutions;
        self
    }

    /// Set the audio codecs accepted by an output type (`None` = unknown).
    pub fn with_output_codecs(self, output_type: &str, codecs: Option<&str>) -> Self {
        self.state
            .lock()
            .output_codecs
            .insert(output_type.to_string(), codecs.map(str::to_string));
        self
    }

    /// Set the list options offered by an encoder type's `rate_control` property.
    pub fn with_rate_control_options(self, encoder_type: &str, options: &[&str]) -> Self {
        self.state.lock().rate_control_options.insert(
            encoder_type.to_string(),
            options.iter().map(|o| o.to_string()).collect(),
        );
        self
    }

    /// Remove every encoder type producing `codec`.
    pub fn without_codec(self, codec: &str) -> Self {
        self.state
            .lock()
            .encoder_types
            .retain(|(_, c)| !c.eq_ignore_ascii_case(codec));
        self
    }

    /// Output type services report as preferred.
    pub fn with_service_output_type(self, output_type: &str) -> Self {
        self.state.lock().service_output_type = Some(output_type.to_string());
        self
    }

    /// Make services clamp the video bitrate.
    pub fn with_service_max_video_bitrate(self, max: i64) -> Self {
        self.state.lock().service_max_video_bitrate = Some(max);
        self
    }

    /// Make creation of `type_id` fail.
    pub fn fail_creating(&self, type_id: &str) {
        self.state.lock().failing_types.insert(type_id.to_string());
    }

    pub fn set_initialized(&self, initialized: bool) {
        self.state.lock().initialized = initialized;
    }

    pub fn set_start_result(&self, started: bool) {
        self.state.lock().start_result = started;
    }

    pub fn set_reject_audio(&self, reject: bool) {
        self.state.lock().reject_audio = reject;
    }

    pub fn set_reject_video(&self, reject: bool) {
        self.state.lock().reject_video = reject;
    }

    pub fn set_last_error(&self, output: OutputId, error: Option<&str>) {
        if let Some(out) = self.state.lock().outputs.get_mut(&output) {
            out.last_error = error.map(str::to_string);
        }
    }

    /// Invoke every handler subscribed to `signal` on `output`.
    ///
    /// Handlers run on the calling thread without the engine lock held, so
    /// they may call back into the engine.
    pub fn emit_signal(&self, output: OutputId, signal: &str, code: i64) {
        let handlers: Vec<SignalHandler> = {
            let state = self.state.lock();
            state
                .subscriptions
                .iter()
                .filter(|s| s.output == output && s.signal == signal)
                .map(|s| s.handler.clone())
                .collect()
        };

        trace!(?output, signal, code, handlers = handlers.len(), "Emitting signal");
        let params = SignalParams { code };
        for handler in handlers {
            handler(output, &params);
        }
    }

    pub fn audio_info(&self) -> Option<AudioInfo> {
        self.state.lock().audio.clone()
    }

    pub fn video_info(&self) -> Option<VideoInfo> {
        self.state.lock().video.clone()
    }

    pub fn encoder(&self, id: EncoderId) -> Option<FakeEncoder> {
        self.state.lock().encoders.get(&id).cloned()
    }

    pub fn output(&self, id: OutputId) -> Option<FakeOutput> {
        self.state.lock().outputs.get(&id).cloned()
    }

    pub fn service(&self, id: ServiceId) -> Option<FakeService> {
        self.state.lock().services.get(&id).cloned()
    }

    /// Live (unreleased) encoders, in creation order.
    pub fn live_encoders(&self) -> Vec<(EncoderId, FakeEncoder)> {
        let state = self.state.lock();
        let mut encoders: Vec<_> = state
            .encoders
            .iter()
            .map(|(id, enc)| (*id, enc.clone()))
            .collect();
        encoders.sort_by_key(|(id, _)| id.0);
        encoders
    }

    /// Live outputs, in creation order.
    pub fn live_outputs(&self) -> Vec<(OutputId, FakeOutput)> {
        let state = self.state.lock();
        let mut outputs: Vec<_> = state
            .outputs
            .iter()
            .map(|(id, out)| (*id, out.clone()))
            .collect();
        outputs.sort_by_key(|(id, _)| id.0);
        outputs
    }

    pub fn subscription_count(&self, output: OutputId) -> usize {
        self.state
            .lock()
            .subscriptions
            .iter()
            .filter(|s| s.output == output)
            .count()
    }

    pub fn released_encoders(&self) -> Vec<EncoderId> {
        self.state.lock().released_encoders.clone()
    }

    pub fn released_outputs(&self) -> Vec<OutputId> {
        self.state.lock().released_outputs.clone()
    }

    pub fn released_services(&self) -> Vec<ServiceId> {
        self.state.lock().released_services.clone()
    }

    fn with_encoder(&self, id: EncoderId, f: impl FnOnce(&mut FakeEncoder)) {
        if let Some(enc) = self.state.lock().encoders.get_mut(&id) {
            f(enc);
        }
    }

    fn with_output(&self, id: OutputId, f: impl FnOnce(&mut FakeOutput)) {
        if let Some(out) = self.state.lock().outputs.get_mut(&id) {
            f(out);
        }
    }

    fn create_encoder(
        &self,
        type_id: &str,
        name: &str,
        settings: Option<&Settings>,
        audio: bool,
        mixer_idx: usize,
    ) -> MediaResult<EncoderId> {
        let mut state = self.state.lock();
        let known = state.encoder_types.iter().any(|(id, _)| id == type_id);
        if !known || state.failing_types.contains(type_id) {
            return Err(MediaError::CreateFailed {
                kind: "encoder",
                type_id: type_id.to_string(),
            });
        }

        let id = EncoderId(state.next_id());
        state.encoders.insert(
            id,
            FakeEncoder {
                type_id: type_id.to_string(),
                name: name.to_string(),
                audio,
                mixer_idx,
                settings: settings.cloned().unwrap_or_default(),
                update_count: 0,
                preferred_format: None,
                scaled_size: None,
                video_bound: false,
                audio_bound: false,
            },
        );
        debug!(?id, type_id, name, "Created encoder");
        Ok(id)
    }
}

impl MediaEngine for FakeEngine {
    fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    fn reset_audio(&self, info: &AudioInfo) -> MediaResult<()> {
        let mut state = self.state.lock();
        if state.reject_audio || info.samples_per_sec == 0 {
            return Err(MediaError::ResetRejected {
                pipeline: "audio",
                reason: format!("unsupported sample rate {}", info.samples_per_sec),
            });
        }
        state.audio = Some(info.clone());
        Ok(())
    }

    fn reset_video(&self, info: &VideoInfo) -> MediaResult<()> {
        let mut state = self.state.lock();
        if state.reject_video || info.fps_den == 0 || info.base_width == 0 {
            return Err(MediaError::ResetRejected {
                pipeline: "video",
                reason: format!(
                    "{}x{} @ {}/{}",
                    info.base_width, info.base_height, info.fps_num, info.fps_den
                ),
            });
        }
        state.video = Some(info.clone());
        Ok(())
    }

    fn video_format(&self) -> Option<VideoFormat> {
        self.state.lock().video.as_ref().map(|v| v.output_format)
    }

    fn available_resolutions(&self) -> Vec<Resolution> {
        self.state.lock().resolutions.clone()
    }

    fn encoder_types(&self) -> Vec<String> {
        self.state
            .lock()
            .encoder_types
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn encoder_codec(&self, encoder_type: &str) -> Option<String> {
        self.state
            .lock()
            .encoder_types
            .iter()
            .find(|(id, _)| id == encoder_type)
            .map(|(_, codec)| codec.clone())
    }

    fn aac_bitrates(&self) -> Vec<u32> {
        self.state.lock().aac_bitrates.clone()
    }

    fn aac_encoder_for_bitrate(&self, bitrate: u32) -> Option<String> {
        let state = self.state.lock();
        if !state.aac_bitrates.contains(&bitrate) {
            return None;
        }
        state
            .encoder_types
            .iter()
            .find(|(_, codec)| codec.eq_ignore_ascii_case("aac"))
            .map(|(id, _)| id.clone())
    }

    fn create_video_encoder(
        &self,
        encoder_type: &str,
        name: &str,
        settings: Option<&Settings>,
    ) -> MediaResult<EncoderId> {
        self.create_encoder(encoder_type, name, settings, false, 0)
    }

    fn create_audio_encoder(
        &self,
        encoder_type: &str,
        name: &str,
        settings: Option<&Settings>,
        mixer_idx: usize,
    ) -> MediaResult<EncoderId> {
        self.create_encoder(encoder_type, name, settings, true, mixer_idx)
    }

    fn release_encoder(&self, encoder: EncoderId) {
        let mut state = self.state.lock();
        if state.encoders.remove(&encoder).is_some() {
            state.released_encoders.push(encoder);
        }
    }

    fn update_encoder(&self, encoder: EncoderId, settings: &Settings) {
        self.with_encoder(encoder, |enc| {
            enc.settings.merge(settings);
            enc.update_count += 1;
        });
    }

    fn encoder_settings(&self, encoder: EncoderId) -> Settings {
        self.encoder(encoder).map(|e| e.settings).unwrap_or_default()
    }

    fn encoder_property_options(&self, encoder: EncoderId, property: &str) -> Vec<String> {
        if property != "rate_control" {
            return Vec::new();
        }
        let state = self.state.lock();
        state
            .encoders
            .get(&encoder)
            .and_then(|enc| state.rate_control_options.get(&enc.type_id))
            .cloned()
            .unwrap_or_default()
    }

    fn set_preferred_video_format(&self, encoder: EncoderId, format: VideoFormat) {
        self.with_encoder(encoder, |enc| enc.preferred_format = Some(format));
    }

    fn set_scaled_size(&self, encoder: EncoderId, width: u32, height: u32) {
        self.with_encoder(encoder, |enc| enc.scaled_size = Some((width, height)));
    }

    fn bind_encoder_video(&self, encoder: EncoderId) {
        self.with_encoder(encoder, |enc| enc.video_bound = true);
    }

    fn bind_encoder_audio(&self, encoder: EncoderId) {
        self.with_encoder(encoder, |enc| enc.audio_bound = true);
    }

    fn create_output(&self, output_type: &str, name: &str) -> MediaResult<OutputId> {
        let mut state = self.state.lock();
        if state.failing_types.contains(output_type) {
            return Err(MediaError::CreateFailed {
                kind: "output",
                type_id: output_type.to_string(),
            });
        }

        let id = OutputId(state.next_id());
        state.outputs.insert(
            id,
            FakeOutput {
                output_type: output_type.to_string(),
                name: name.to_string(),
                settings: Settings::new(),
                video_encoder: None,
                audio_encoder: None,
                service: None,
                delay: None,
                mixer_idx: None,
                media_bound: false,
                active: false,
                start_count: 0,
                stops: Vec::new(),
                last_error: None,
            },
        );
        debug!(?id, output_type, name, "Created output");
        Ok(id)
    }

    fn release_output(&self, output: OutputId) {
        let mut state = self.state.lock();
        if state.outputs.remove(&output).is_some() {
            state.subscriptions.retain(|s| s.output != output);
            state.released_outputs.push(output);
        }
    }

    fn output_supported_audio_codecs(&self, output: OutputId) -> Option<String> {
        let state = self.state.lock();
        state
            .outputs
            .get(&output)
            .and_then(|out| state.output_codecs.get(&out.output_type))
            .cloned()
            .flatten()
    }

    fn set_output_video_encoder(&self, output: OutputId, encoder: EncoderId) {
        self.with_output(output, |out| out.video_encoder = Some(encoder));
    }

    fn set_output_audio_encoder(&self, output: OutputId, encoder: EncoderId, _idx: usize) {
        self.with_output(output, |out| out.audio_encoder = Some(encoder));
    }

    fn set_output_service(&self, output: OutputId, service: ServiceId) {
        self.with_output(output, |out| out.service = Some(service));
    }

    fn set_output_delay(&self, output: OutputId, delay_sec: u32, flags: DelayFlags) {
        self.with_output(output, |out| out.delay = Some((delay_sec, flags)));
    }

    fn update_output(&self, output: OutputId, settings: &Settings) {
        self.with_output(output, |out| out.settings.merge(settings));
    }

    fn set_output_mixer(&self, output: OutputId, mixer_idx: usize) {
        self.with_output(output, |out| out.mixer_idx = Some(mixer_idx));
    }

    fn bind_output_media(&self, output: OutputId) {
        self.with_output(output, |out| out.media_bound = true);
    }

    fn start_output(&self, output: OutputId) -> bool {
        let mut state = self.state.lock();
        let started = state.start_result;
        match state.outputs.get_mut(&output) {
            Some(out) => {
                out.start_count += 1;
                out.active = started;
                started
            }
            None => false,
        }
    }

    fn stop_output(&self, output: OutputId) {
        self.with_output(output, |out| {
            out.active = false;
            out.stops.push(false);
        });
    }

    fn force_stop_output(&self, output: OutputId) {
        self.with_output(output, |out| {
            out.active = false;
            out.stops.push(true);
        });
    }

    fn output_active(&self, output: OutputId) -> bool {
        self.output(output).is_some_and(|out| out.active)
    }

    fn output_last_error(&self, output: OutputId) -> Option<String> {
        self.output(output).and_then(|out| out.last_error)
    }

    fn create_service(
        &self,
        service_type: &str,
        name: &str,
        settings: Option<&Settings>,
        hotkeys: Option<&Settings>,
    ) -> MediaResult<ServiceId> {
        let mut state = self.state.lock();
        if state.failing_types.contains(service_type) {
            return Err(MediaError::CreateFailed {
                kind: "service",
                type_id: service_type.to_string(),
            });
        }

        let id = ServiceId(state.next_id());
        state.services.insert(
            id,
            FakeService {
                service_type: service_type.to_string(),
                name: name.to_string(),
                settings: settings.cloned().unwrap_or_default(),
                hotkeys: hotkeys.cloned(),
            },
        );
        Ok(id)
    }

    fn release_service(&self, service: ServiceId) {
        let mut state = self.state.lock();
        if state.services.remove(&service).is_some() {
            state.released_services.push(service);
        }
    }

    fn service_type(&self, service: ServiceId) -> Option<String> {
        self.service(service).map(|s| s.service_type)
    }

    fn service_settings(&self, service: ServiceId) -> Settings {
        self.service(service).map(|s| s.settings).unwrap_or_default()
    }

    fn update_service(&self, service: ServiceId, settings: &Settings) {
        if let Some(svc) = self.state.lock().services.get_mut(&service) {
            svc.settings.merge(settings);
        }
    }

    fn service_output_type(&self, service: ServiceId) -> Option<String> {
        let state = self.state.lock();
        if state.services.contains_key(&service) {
            state.service_output_type.clone()
        } else {
            None
        }
    }

    fn apply_service_encoder_settings(
        &self,
        service: ServiceId,
        video: &mut Settings,
        _audio: Option<&mut Settings>,
    ) {
        let state = self.state.lock();
        if !state.services.contains_key(&service) {
            return;
        }
        if let (Some(max), Some(bitrate)) = (state.service_max_video_bitrate, video.get_int("bitrate"))
        {
            if bitrate > max {
                video.set_int("bitrate", max);
            }
        }
    }

    fn connect_signal(
        &self,
        output: OutputId,
        signal: &str,
        handler: SignalHandler,
    ) -> SubscriptionId {
        let mut state = self.state.lock();
        let id = SubscriptionId(state.next_id());
        state.subscriptions.push(Subscription {
            id,
            output,
            signal: signal.to_string(),
            handler,
        });
        id
    }

    fn disconnect_signal(&self, output: OutputId, subscription: SubscriptionId) {
        self.state
            .lock()
            .subscriptions
            .retain(|s| !(s.output == output && s.id == subscription));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_unknown_encoder_type_fails() {
        let engine = FakeEngine::new();
        assert!(engine.create_video_encoder("nope", "x", None).is_err());
    }

    #[test]
    fn test_emit_reaches_only_matching_subscriptions() {
        let engine = FakeEngine::new();
        let output = engine.create_output("rtmp_output", "simple_stream").unwrap();
        let seen = Arc::new(AtomicI64::new(0));

        let counter = seen.clone();
        let sub = engine.connect_signal(
            output,
            "stop",
            Arc::new(move |_, params| {
                counter.fetch_add(params.code.abs() + 1, Ordering::SeqCst);
            }),
        );

        engine.emit_signal(output, "start", 0);
        engine.emit_signal(output, "stop", -2);
        assert_eq!(seen.load(Ordering::SeqCst), 3);

        engine.disconnect_signal(output, sub);
        engine.emit_signal(output, "stop", 0);
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_aac_encoder_requires_supported_bitrate() {
        let engine = FakeEngine::new();
        assert_eq!(engine.aac_encoder_for_bitrate(160).as_deref(), Some("ffmpeg_aac"));
        assert_eq!(engine.aac_encoder_for_bitrate(150), None);
    }
}
