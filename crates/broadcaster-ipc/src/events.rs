//! Signals and responses sent from the session core to callers.

use serde::{Deserialize, Serialize};

use crate::types::{ErrorCode, OutputType, SessionStatus};

/// Output lifecycle event relayed from the engine.
///
/// Immutable once constructed; delivered to callers only by polling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalEvent {
    output_type: OutputType,
    signal: String,
    code: i64,
    message: Option<String>,
}

impl SignalEvent {
    /// Create an event with a zero code and no message.
    pub fn new(output_type: OutputType, signal: impl Into<String>) -> Self {
        Self {
            output_type,
            signal: signal.into(),
            code: 0,
            message: None,
        }
    }

    /// Create an event carrying an output completion code and optional error text.
    pub fn with_code(
        output_type: OutputType,
        signal: impl Into<String>,
        code: i64,
        message: Option<String>,
    ) -> Self {
        Self {
            output_type,
            signal: signal.into(),
            code,
            message,
        }
    }

    pub fn output_type(&self) -> OutputType {
        self.output_type
    }

    pub fn signal(&self) -> &str {
        &self.signal
    }

    pub fn code(&self) -> i64 {
        self.code
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns true for a `stop` signal.
    pub fn is_stop(&self) -> bool {
        self.signal == "stop"
    }

    /// Returns true for a `start` signal.
    pub fn is_start(&self) -> bool {
        self.signal == "start"
    }

    /// Returns true if the engine reported a failure with this event.
    pub fn is_error(&self) -> bool {
        self.code != 0
    }
}

/// Operation-specific payload of a response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum ResponsePayload {
    /// Nothing beyond the status code.
    #[default]
    None,

    /// Boolean operation result (start operations).
    Started(bool),

    /// Whether the streaming output is active according to the engine.
    Active(bool),

    /// Recording output settings blob, serialized as JSON text.
    Settings(String),

    /// Oldest queued signal, if any.
    Signal(Option<SignalEvent>),

    /// Lifecycle snapshot.
    Status(SessionStatus),
}

/// Response to a [`crate::ServiceCommand`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceResponse {
    /// Explicit status code.
    pub code: ErrorCode,

    /// Operation-specific values.
    pub payload: ResponsePayload,

    /// Failure description when `code` is not `Ok`.
    pub message: Option<String>,
}

impl ServiceResponse {
    /// Successful response without payload.
    pub fn ok() -> Self {
        Self::with_payload(ResponsePayload::None)
    }

    /// Successful response with payload.
    pub fn with_payload(payload: ResponsePayload) -> Self {
        Self {
            code: ErrorCode::Ok,
            payload,
            message: None,
        }
    }

    /// Failed response.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            payload: ResponsePayload::None,
            message: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output_code;

    #[test]
    fn test_signal_event_classification() {
        let stop = SignalEvent::with_code(
            OutputType::Recording,
            "stop",
            output_code::ERROR,
            Some("disk full".into()),
        );
        assert!(stop.is_stop());
        assert!(stop.is_error());
        assert_eq!(stop.message(), Some("disk full"));

        let start = SignalEvent::new(OutputType::Streaming, "start");
        assert!(start.is_start());
        assert!(!start.is_error());
        assert_eq!(start.message(), None);
    }

    #[test]
    fn test_response_serializes_signal() {
        let response = ServiceResponse::with_payload(ResponsePayload::Signal(Some(
            SignalEvent::new(OutputType::Streaming, "reconnect"),
        )));
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"streaming\""));
        assert!(json.contains("reconnect"));
    }
}
