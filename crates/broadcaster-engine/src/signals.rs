//! Output signal relay.
//!
//! Subscribes to engine output signals and turns each one into a
//! [`SignalEvent`] on an unbounded FIFO queue, tagged with the output that
//! emitted it. The engine fires handlers from its own threads; the session
//! drains the queue by polling.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use broadcaster_ipc::{output_code, OutputType, SignalEvent};
use broadcaster_media::{MediaEngine, OutputId, SignalHandler, SignalParams, SubscriptionId};

/// Signals relayed from the streaming output.
pub const STREAMING_SIGNALS: [&str; 8] = [
    "start",
    "stop",
    "starting",
    "stopping",
    "activate",
    "deactivate",
    "reconnect",
    "reconnect_success",
];

/// Signals relayed from the recording output.
pub const RECORDING_SIGNALS: [&str; 3] = ["start", "stop", "stopping"];

fn signals_for(output_type: OutputType) -> &'static [&'static str] {
    match output_type {
        OutputType::Streaming => &STREAMING_SIGNALS,
        OutputType::Recording => &RECORDING_SIGNALS,
    }
}

/// A queued event and the engine output it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayedSignal {
    pub source: OutputId,
    pub event: SignalEvent,
}

struct Connection {
    output: OutputId,
    subscriptions: Vec<SubscriptionId>,
}

/// Owner of the signal queue and of the engine subscriptions feeding it.
pub struct SignalRelay {
    engine: Arc<dyn MediaEngine>,
    sender: Sender<RelayedSignal>,
    receiver: Receiver<RelayedSignal>,
    connections: Mutex<HashMap<OutputType, Connection>>,
}

impl SignalRelay {
    pub fn new(engine: Arc<dyn MediaEngine>) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            engine,
            sender,
            receiver,
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribe to every relayed signal of `output`, dropping whatever
    /// subscriptions `output_type` had before. `None` only disconnects.
    pub fn connect(&self, output_type: OutputType, output: Option<OutputId>) {
        let mut connections = self.connections.lock();

        if let Some(old) = connections.remove(&output_type) {
            for subscription in old.subscriptions {
                self.engine.disconnect_signal(old.output, subscription);
            }
        }

        let Some(output) = output else {
            return;
        };

        let subscriptions = signals_for(output_type)
            .iter()
            .map(|&signal| {
                let handler = self.handler(output_type, signal);
                self.engine.connect_signal(output, signal, handler)
            })
            .collect::<Vec<_>>();

        debug!(
            output_type = %output_type,
            ?output,
            count = subscriptions.len(),
            "Connected output signals"
        );
        connections.insert(
            output_type,
            Connection {
                output,
                subscriptions,
            },
        );
    }

    /// Whether `output_type` currently has live subscriptions.
    pub fn is_connected(&self, output_type: OutputType) -> bool {
        self.connections.lock().contains_key(&output_type)
    }

    fn handler(&self, output_type: OutputType, signal: &'static str) -> SignalHandler {
        let engine: Weak<dyn MediaEngine> = Arc::downgrade(&self.engine);
        let sender = self.sender.clone();

        Arc::new(move |output: OutputId, params: &SignalParams| {
            let event = if signal == "stop" {
                let last_error = engine
                    .upgrade()
                    .and_then(|engine| engine.output_last_error(output));
                stop_event(output_type, params.code, last_error)
            } else {
                SignalEvent::new(output_type, signal)
            };

            trace!(output_type = %output_type, signal, code = event.code(), "Output signal");
            if sender.send(RelayedSignal { source: output, event }).is_err() {
                warn!(signal, "Signal queue closed, dropping event");
            }
        })
    }

    /// Queue an event produced by the session itself on behalf of `source`.
    pub fn enqueue(&self, source: OutputId, event: SignalEvent) {
        if self.sender.send(RelayedSignal { source, event }).is_err() {
            warn!("Signal queue closed, dropping event");
        }
    }

    /// Oldest queued event, without blocking.
    pub fn poll(&self) -> Option<RelayedSignal> {
        self.receiver.try_recv().ok()
    }

    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

/// A recording that stops with an error text but a success code is
/// reported as a generic error.
fn stop_event(output_type: OutputType, code: i64, last_error: Option<String>) -> SignalEvent {
    match last_error {
        Some(message) => {
            let code = if output_type == OutputType::Recording && code == output_code::SUCCESS {
                output_code::ERROR
            } else {
                code
            };
            SignalEvent::with_code(output_type, "stop", code, Some(message))
        }
        None => SignalEvent::with_code(output_type, "stop", code, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use broadcaster_media::fake::FakeEngine;
    use std::thread;

    fn relay_with_outputs() -> (Arc<FakeEngine>, SignalRelay, OutputId, OutputId) {
        let fake = Arc::new(FakeEngine::new());
        let relay = SignalRelay::new(fake.clone());
        let stream = fake.create_output("rtmp_output", "simple_stream").unwrap();
        let record = fake.create_output("ffmpeg_muxer", "simple_file_output").unwrap();
        relay.connect(OutputType::Streaming, Some(stream));
        relay.connect(OutputType::Recording, Some(record));
        (fake, relay, stream, record)
    }

    #[test]
    fn test_empty_poll() {
        let fake = Arc::new(FakeEngine::new());
        let relay = SignalRelay::new(fake);
        assert!(relay.poll().is_none());
    }

    #[test]
    fn test_fifo_order() {
        let (fake, relay, stream, record) = relay_with_outputs();
        fake.emit_signal(stream, "starting", 0);
        fake.emit_signal(record, "start", 0);
        fake.emit_signal(stream, "reconnect", 0);

        let a = relay.poll().unwrap().event;
        let b = relay.poll().unwrap().event;
        let c = relay.poll().unwrap().event;
        assert_eq!((a.output_type(), a.signal()), (OutputType::Streaming, "starting"));
        assert_eq!((b.output_type(), b.signal()), (OutputType::Recording, "start"));
        assert_eq!((c.output_type(), c.signal()), (OutputType::Streaming, "reconnect"));
        assert!(relay.poll().is_none());
    }

    #[test]
    fn test_recording_ignores_streaming_only_signals() {
        let (fake, relay, _, record) = relay_with_outputs();
        fake.emit_signal(record, "reconnect", 0);
        assert!(relay.poll().is_none());
        assert_eq!(fake.subscription_count(record), RECORDING_SIGNALS.len());
    }

    #[test]
    fn test_reconnect_replaces_subscriptions() {
        let (fake, relay, stream, _) = relay_with_outputs();
        relay.connect(OutputType::Streaming, Some(stream));
        relay.connect(OutputType::Streaming, Some(stream));
        assert_eq!(fake.subscription_count(stream), STREAMING_SIGNALS.len());

        fake.emit_signal(stream, "start", 0);
        assert_eq!(relay.poll().unwrap().source, stream);
        assert!(relay.poll().is_none());
    }

    #[test]
    fn test_stop_with_error_on_recording() {
        let (fake, relay, _, record) = relay_with_outputs();
        fake.set_last_error(record, Some("disk full"));
        fake.emit_signal(record, "stop", 0);

        let event = relay.poll().unwrap().event;
        assert!(event.is_stop());
        assert_eq!(event.code(), output_code::ERROR);
        assert_eq!(event.message(), Some("disk full"));
    }

    #[test]
    fn test_stop_with_error_on_streaming_keeps_code() {
        let (fake, relay, stream, _) = relay_with_outputs();
        fake.set_last_error(stream, Some("connection reset"));
        fake.emit_signal(stream, "stop", output_code::DISCONNECTED);

        let event = relay.poll().unwrap().event;
        assert_eq!(event.code(), output_code::DISCONNECTED);
        assert_eq!(event.message(), Some("connection reset"));

        fake.set_last_error(stream, Some("late error"));
        fake.emit_signal(stream, "stop", 0);
        assert_eq!(relay.poll().unwrap().event.code(), 0);
    }

    #[test]
    fn test_clean_stop_has_no_message() {
        let (fake, relay, _, record) = relay_with_outputs();
        fake.emit_signal(record, "stop", 0);
        let event = relay.poll().unwrap().event;
        assert!(!event.is_error());
        assert_eq!(event.message(), None);
    }

    #[test]
    fn test_signals_from_engine_thread() {
        let (fake, relay, stream, _) = relay_with_outputs();
        let emitter = fake.clone();
        thread::spawn(move || {
            for _ in 0..10 {
                emitter.emit_signal(stream, "activate", 0);
            }
        })
        .join()
        .unwrap();

        assert_eq!(relay.pending(), 10);
    }

    #[test]
    fn test_enqueued_events_keep_their_source() {
        let (fake, relay, _, record) = relay_with_outputs();
        relay.enqueue(record, SignalEvent::new(OutputType::Recording, "stop"));
        fake.emit_signal(record, "stopping", 0);

        let first = relay.poll().unwrap();
        assert_eq!(first.source, record);
        assert!(first.event.is_stop());
        assert_eq!(relay.poll().unwrap().event.signal(), "stopping");
    }

    #[test]
    fn test_disconnect() {
        let (fake, relay, stream, _) = relay_with_outputs();
        relay.connect(OutputType::Streaming, None);
        assert!(!relay.is_connected(OutputType::Streaming));
        assert_eq!(fake.subscription_count(stream), 0);
    }
}
