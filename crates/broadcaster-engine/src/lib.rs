//! Output session core for the broadcaster.
//!
//! Resets the engine's audio and video pipelines from configuration,
//! creates encoders, outputs and the streaming service, binds them
//! together, starts and stops streaming and recording, and relays output
//! signals to a pollable queue.

mod context;
mod error;
mod orchestrator;
mod output;
mod recording;
mod session;
mod signals;
mod state;

pub use context::ContextManager;
pub use error::{SessionError, SessionResult};
pub use orchestrator::Engine;
pub use output::{OutputBinder, DEFAULT_STREAMING_OUTPUT, FILE_OUTPUT_TYPE};
pub use recording::{
    advanced_recording_settings, ffmpeg_output_settings, migrate_ffmpeg_url, parse_resolution,
    simple_recording_settings, FFMPEG_RECORDING_TYPE,
};
pub use session::{OutputMode, Session};
pub use signals::{RelayedSignal, SignalRelay, RECORDING_SIGNALS, STREAMING_SIGNALS};
pub use state::OutputLifecycle;

use std::path::PathBuf;
use std::sync::Arc;

use broadcaster_config::ConfigStore;
use broadcaster_ipc::{ServiceCommand, ServiceResponse};
use broadcaster_media::MediaEngine;
use crossbeam_channel::{Receiver, Sender};

/// Create an engine instance with IPC channels.
pub fn create_engine(
    media: Arc<dyn MediaEngine>,
    config: ConfigStore,
    service_path: Option<PathBuf>,
    command_rx: Receiver<ServiceCommand>,
    response_tx: Sender<ServiceResponse>,
) -> Engine {
    Engine::new(Session::new(media, config, service_path), command_rx, response_tx)
}
