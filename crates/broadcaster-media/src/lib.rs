//! Media engine seam for the broadcaster session core.
//!
//! This crate defines the engine trait the session core drives, the
//! parameter and settings types it exchanges with the engine, and owned
//! handle wrappers that release engine objects on drop.

mod engine;
mod error;
pub mod fake;
mod handle;
mod settings;
mod types;

pub use engine::{MediaEngine, SignalHandler};
pub use error::MediaError;
pub use handle::{
    EncoderHandle, EncoderKind, EngineHandle, HandleKind, HandleSlot, OutputHandle, OutputKind,
    ServiceHandle, ServiceKind,
};
pub use settings::Settings;
pub use types::{
    AudioInfo, ColorRange, ColorSpace, DelayFlags, EncoderId, OutputId, Resolution, ScaleType,
    ServiceId, SignalParams, SpeakerLayout, SubscriptionId, VideoFormat, VideoInfo,
};

/// Result type for engine operations.
pub type MediaResult<T> = Result<T, MediaError>;
