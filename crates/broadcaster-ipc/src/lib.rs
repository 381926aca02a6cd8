//! Typed operation set and signals for the broadcaster session core.
//!
//! This crate defines the commands callers issue, the responses they get
//! back, and the output lifecycle signals relayed from the media engine.

mod commands;
mod events;
mod state;
mod types;

pub use commands::ServiceCommand;
pub use events::{ResponsePayload, ServiceResponse, SignalEvent};
pub use state::OutputState;
pub use types::{output_code, ErrorCode, OutputStatus, OutputType, SessionStatus};

use crossbeam_channel::{Receiver, Sender};

/// Channel capacity for commands (caller → session).
pub const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Channel capacity for responses (session → caller).
pub const RESPONSE_CHANNEL_CAPACITY: usize = 64;

/// Creates a bounded command channel.
pub fn command_channel() -> (Sender<ServiceCommand>, Receiver<ServiceCommand>) {
    crossbeam_channel::bounded(COMMAND_CHANNEL_CAPACITY)
}

/// Creates a bounded response channel.
pub fn response_channel() -> (Sender<ServiceResponse>, Receiver<ServiceResponse>) {
    crossbeam_channel::bounded(RESPONSE_CHANNEL_CAPACITY)
}

