//! Output lifecycle state machine types.

use serde::{Deserialize, Serialize};

/// Lifecycle of a single output (streaming or recording).
///
/// `Idle → Configuring → Bound → Active → Stopping → Idle`. Starting and
/// stopping are two-phase: the engine confirms both asynchronously through
/// `start` and `stop` signals, so `Active` and `Stopping` carry whether the
/// engine has confirmed the transition yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputState {
    /// No output exists, or the last run has fully stopped.
    #[default]
    Idle,

    /// Output created; encoders or service not yet bound.
    Configuring,

    /// All handles the output needs are bound; ready to start.
    Bound,

    /// Start issued and accepted by the engine.
    Active {
        /// Whether the engine's `start` signal has been observed.
        confirmed: bool,
    },

    /// Stop requested; waiting for the engine's `stop` signal.
    Stopping {
        /// Whether the stop bypassed graceful shutdown.
        forced: bool,
    },
}

impl OutputState {
    /// Returns true if the output is idle.
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Returns true if the output is being configured.
    pub fn is_configuring(&self) -> bool {
        matches!(self, Self::Configuring)
    }

    /// Returns true if the output is ready to start.
    pub fn is_bound(&self) -> bool {
        matches!(self, Self::Bound)
    }

    /// Returns true if a start was issued and not yet stopped.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }

    /// Returns true if a stop was requested but not yet confirmed.
    pub fn is_stopping(&self) -> bool {
        matches!(self, Self::Stopping { .. })
    }

    /// Returns a simple string representation of the state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Configuring => "Configuring",
            Self::Bound => "Bound",
            Self::Active { .. } => "Active",
            Self::Stopping { .. } => "Stopping",
        }
    }
}
