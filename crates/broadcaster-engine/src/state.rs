//! Per-output lifecycle tracking.

use tracing::debug;

use broadcaster_ipc::{OutputState, OutputStatus, OutputType, SignalEvent};

/// Lifecycle of one output.
///
/// `active_requested` is the optimistic flag callers used to see: it is
/// set when the engine accepts a start and cleared the moment a stop is
/// requested. `state` only reaches `Idle` again once the engine's `stop`
/// signal has been polled.
#[derive(Debug, Default)]
pub struct OutputLifecycle {
    state: OutputState,
    active_requested: bool,
}

impl OutputLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &OutputState {
        &self.state
    }

    pub fn is_active_requested(&self) -> bool {
        self.active_requested
    }

    fn transition(&mut self, next: OutputState) {
        if self.state != next {
            debug!(from = self.state.name(), to = next.name(), "Output state changed");
        }
        self.state = next;
    }

    /// An output object exists but nothing is bound yet.
    pub fn on_created(&mut self) {
        if !self.state.is_active() && !self.state.is_stopping() {
            self.transition(OutputState::Configuring);
        }
    }

    /// Encoders (and service) are bound; the output may start.
    pub fn on_bound(&mut self) {
        if !self.state.is_active() && !self.state.is_stopping() {
            self.transition(OutputState::Bound);
        }
    }

    /// The engine accepted the start request.
    pub fn on_started(&mut self) {
        self.active_requested = true;
        self.transition(OutputState::Active { confirmed: false });
    }

    /// The start request was refused.
    pub fn on_start_failed(&mut self) {
        self.active_requested = false;
        self.transition(OutputState::Bound);
    }

    pub fn on_stop_requested(&mut self, forced: bool) {
        self.active_requested = false;
        if !self.state.is_idle() {
            self.transition(OutputState::Stopping { forced });
        }
    }

    /// Apply a relayed engine signal.
    pub fn on_signal(&mut self, event: &SignalEvent) {
        if event.is_start() {
            if let OutputState::Active { confirmed: false } = self.state {
                self.transition(OutputState::Active { confirmed: true });
            }
        } else if event.is_stop() {
            self.active_requested = false;
            self.transition(OutputState::Idle);
        }
    }

    pub fn status(&self, output_type: OutputType) -> OutputStatus {
        OutputStatus {
            output_type,
            state: self.state.clone(),
            active_requested: self.active_requested,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_phase_start_and_stop() {
        let mut lifecycle = OutputLifecycle::new();
        lifecycle.on_created();
        assert!(lifecycle.state().is_configuring());
        lifecycle.on_bound();
        lifecycle.on_started();
        assert_eq!(lifecycle.state(), &OutputState::Active { confirmed: false });
        assert!(lifecycle.is_active_requested());

        lifecycle.on_signal(&SignalEvent::new(OutputType::Streaming, "start"));
        assert_eq!(lifecycle.state(), &OutputState::Active { confirmed: true });

        lifecycle.on_stop_requested(true);
        assert!(!lifecycle.is_active_requested());
        assert_eq!(lifecycle.state(), &OutputState::Stopping { forced: true });

        lifecycle.on_signal(&SignalEvent::new(OutputType::Streaming, "stop"));
        assert!(lifecycle.state().is_idle());
    }

    #[test]
    fn test_other_signals_do_not_move_state() {
        let mut lifecycle = OutputLifecycle::new();
        lifecycle.on_started();
        lifecycle.on_signal(&SignalEvent::new(OutputType::Streaming, "reconnect"));
        assert_eq!(lifecycle.state(), &OutputState::Active { confirmed: false });
    }

    #[test]
    fn test_recreating_output_while_active_keeps_state() {
        let mut lifecycle = OutputLifecycle::new();
        lifecycle.on_started();
        lifecycle.on_created();
        assert!(lifecycle.state().is_active());
    }

    #[test]
    fn test_start_failure() {
        let mut lifecycle = OutputLifecycle::new();
        lifecycle.on_bound();
        lifecycle.on_start_failed();
        assert!(lifecycle.state().is_bound());
        assert!(!lifecycle.is_active_requested());

        let status = lifecycle.status(OutputType::Recording);
        assert_eq!(status.output_type, OutputType::Recording);
        assert!(!status.active_requested);
    }

    #[test]
    fn test_stop_when_idle_stays_idle() {
        let mut lifecycle = OutputLifecycle::new();
        lifecycle.on_stop_requested(false);
        assert!(lifecycle.state().is_idle());
    }
}
