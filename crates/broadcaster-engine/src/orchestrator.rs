//! Command loop over a [`Session`].

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, error, info, instrument, warn};

use broadcaster_ipc::{ErrorCode, ResponsePayload, ServiceCommand, ServiceResponse};

use crate::error::SessionResult;
use crate::session::Session;

/// Serves [`ServiceCommand`]s against one session, one at a time.
pub struct Engine {
    session: Session,
    command_rx: Receiver<ServiceCommand>,
    response_tx: Sender<ServiceResponse>,
}

fn unit(result: SessionResult<()>) -> ServiceResponse {
    respond(result, |()| ResponsePayload::None)
}

fn respond<T>(result: SessionResult<T>, payload: impl FnOnce(T) -> ResponsePayload) -> ServiceResponse {
    match result {
        Ok(value) => ServiceResponse::with_payload(payload(value)),
        Err(e) => {
            warn!(error = %e, code = ?e.code(), "Command failed");
            ServiceResponse::error(e.code(), e.to_string())
        }
    }
}

fn reset_response(ok: bool, what: &str) -> ServiceResponse {
    if ok {
        ServiceResponse::ok()
    } else {
        ServiceResponse::error(ErrorCode::Error, format!("Failed to reset {what} context"))
    }
}

impl Engine {
    pub fn new(
        session: Session,
        command_rx: Receiver<ServiceCommand>,
        response_tx: Sender<ServiceResponse>,
    ) -> Self {
        Self {
            session,
            command_rx,
            response_tx,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Run the engine (blocking) until the command channel closes.
    #[instrument(name = "engine_run", skip(self))]
    pub fn run(&mut self) {
        info!("Engine starting");

        while let Ok(command) = self.command_rx.recv() {
            let response = self.handle(command);
            if self.response_tx.send(response).is_err() {
                info!("Response channel disconnected, shutting down");
                break;
            }
        }

        info!("Engine stopped");
    }

    /// Execute one command and build its response.
    pub fn handle(&mut self, command: ServiceCommand) -> ServiceResponse {
        debug!(?command, "Handling command");
        let session = &mut self.session;

        match command {
            ServiceCommand::ResetAudioContext => reset_response(session.reset_audio_context(), "audio"),
            ServiceCommand::ResetVideoContext { purpose } => {
                reset_response(session.reset_video_context(&purpose), "video")
            }
            ServiceCommand::CreateAudioEncoder => match session.create_audio_encoder() {
                Ok(true) => ServiceResponse::ok(),
                Ok(false) => ServiceResponse::error(
                    ErrorCode::EncoderCreateFailure,
                    "No AAC encoder supports the configured bitrate",
                ),
                Err(e) => unit(Err(e)),
            },
            ServiceCommand::CreateVideoStreamingEncoder => {
                unit(session.create_video_streaming_encoder())
            }
            ServiceCommand::CreateVideoRecordingEncoder => {
                unit(session.create_video_recording_encoder())
            }
            ServiceCommand::CreateService => unit(session.create_service()),
            ServiceCommand::CreateRecordingSettings => {
                match serde_json::to_string(&session.create_recording_settings()) {
                    Ok(json) => ServiceResponse::with_payload(ResponsePayload::Settings(json)),
                    Err(e) => {
                        error!(error = %e, "Failed to serialize recording settings");
                        ServiceResponse::error(ErrorCode::Error, e.to_string())
                    }
                }
            }
            ServiceCommand::CreateStreamingOutput => unit(session.create_streaming_output()),
            ServiceCommand::CreateRecordingOutput => unit(session.create_recording_output()),
            ServiceCommand::StartStreaming => respond(session.start_streaming(), ResponsePayload::Started),
            ServiceCommand::StartRecording => respond(session.start_recording(), ResponsePayload::Started),
            ServiceCommand::StopStreaming { force_stop } => unit(session.stop_streaming(force_stop)),
            ServiceCommand::StopRecording => unit(session.stop_recording()),
            ServiceCommand::AssociateAudioAndVideoToStreamingContext => {
                unit(session.associate_audio_and_video_to_streaming_context())
            }
            ServiceCommand::AssociateAudioAndVideoToRecordingContext => {
                unit(session.associate_audio_and_video_to_recording_context())
            }
            ServiceCommand::AssociateEncodersToStreamingOutput => {
                unit(session.associate_encoders_to_streaming_output())
            }
            ServiceCommand::AssociateEncodersToRecordingOutput => {
                unit(session.associate_encoders_to_recording_output())
            }
            ServiceCommand::SetServiceToStreamingOutput => {
                unit(session.set_service_to_streaming_output())
            }
            ServiceCommand::SetRecordingSettings => unit(session.set_recording_settings()),
            ServiceCommand::ConnectOutputSignals => {
                session.connect_output_signals();
                ServiceResponse::ok()
            }
            ServiceCommand::PollSignal => {
                ServiceResponse::with_payload(ResponsePayload::Signal(session.poll_signal()))
            }
            ServiceCommand::SaveService => unit(session.save_service()),
            ServiceCommand::UpdateService => unit(session.update_service()),
            ServiceCommand::IsStreamingOutputActive => ServiceResponse::with_payload(
                ResponsePayload::Active(session.is_streaming_output_active()),
            ),
            ServiceCommand::QueryState => {
                ServiceResponse::with_payload(ResponsePayload::Status(session.status()))
            }
        }
    }
}
