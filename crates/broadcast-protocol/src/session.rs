//! Client session: handshake lifecycle and the send/receive contract offered
//! to a transport.
//!
//! The session performs no I/O. Outbound operations return the exact
//! datagram to send; [`ClientSession::handle_inbound`] takes the bytes of one
//! received datagram. Datagrams must be handed in one at a time, in arrival
//! order.

use tracing::{debug, error, info, warn};

use crate::dispatch::{Dispatch, DispatchOptions, dispatch_with};
use crate::error::{ErrorSeverity, ProtocolError, Result};
use crate::outbound::{self, FocusRequest, InstantReplayRequest, RegistrationParams};
use crate::state::{ConnectionIdentity, EntryListSnapshot, HandshakeState, SessionState};

/// One client's view of the broadcasting connection.
#[derive(Debug, Clone)]
pub struct ClientSession {
    params: RegistrationParams,
    options: DispatchOptions,
    state: SessionState,
}

impl ClientSession {
    /// Creates a disconnected session with no connection identity.
    pub fn new(params: RegistrationParams) -> Self {
        Self {
            params,
            options: DispatchOptions::default(),
            state: SessionState::new(),
        }
    }

    /// Also request track data when registration succeeds.
    pub fn with_track_data_request(mut self, enabled: bool) -> Self {
        self.options.request_track_data = enabled;
        self
    }

    pub fn params(&self) -> &RegistrationParams {
        &self.params
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn handshake(&self) -> HandshakeState {
        self.state.handshake()
    }

    pub fn connection_id(&self) -> Option<ConnectionIdentity> {
        self.state.connection_id()
    }

    pub fn entry_list(&self) -> &EntryListSnapshot {
        self.state.entry_list()
    }

    /// Builds REGISTER_COMMAND_APPLICATION and moves to `AwaitingRegistration`.
    ///
    /// May be repeated while awaiting registration to re-send the request.
    pub fn connect(&mut self) -> Result<Vec<u8>> {
        match self.state.handshake {
            HandshakeState::Disconnected | HandshakeState::AwaitingRegistration => {}
            _ => {
                return Err(ProtocolError::PreconditionViolation(
                    "session is already registered",
                ));
            }
        }

        let frame = outbound::register_command_application(&self.params)?;
        if self.state.handshake == HandshakeState::AwaitingRegistration {
            debug!("Re-sending broadcasting registration");
        } else {
            info!(
                display_name = %self.params.display_name,
                protocol_version = self.params.protocol_version,
                "Registering with broadcasting server"
            );
        }
        self.state.handshake = HandshakeState::AwaitingRegistration;
        Ok(frame)
    }

    /// Handles one received datagram.
    ///
    /// Errors only concern the given frame; the session remains usable.
    pub fn handle_inbound(&mut self, datagram: &[u8]) -> Result<Dispatch> {
        let result = dispatch_with(&mut self.state, datagram, self.options);
        if let Err(e) = &result {
            match e.severity() {
                ErrorSeverity::Warning => {
                    warn!(error = %e, len = datagram.len(), "Dropped broadcasting frame");
                }
                ErrorSeverity::Error => {
                    error!(error = %e, len = datagram.len(), "Broadcasting frame handling failed");
                }
            }
        }
        result
    }

    fn require_identity(&self) -> Result<ConnectionIdentity> {
        self.state.connection_id.ok_or(ProtocolError::PreconditionViolation(
            "connection identity is unset; registration has not completed",
        ))
    }

    /// Builds REQUEST_ENTRY_LIST for the registered connection.
    pub fn request_entry_list(&mut self) -> Result<Vec<u8>> {
        let frame = outbound::request_entry_list(self.require_identity()?)?;
        if self.state.handshake == HandshakeState::Registered {
            self.state.handshake = HandshakeState::EntryListRequested;
        }
        Ok(frame)
    }

    pub fn request_track_data(&self) -> Result<Vec<u8>> {
        outbound::request_track_data(self.require_identity()?)
    }

    pub fn change_hud_page(&self, hud_page: &str) -> Result<Vec<u8>> {
        outbound::change_hud_page(self.require_identity()?, hud_page)
    }

    pub fn change_focus(&self, request: &FocusRequest) -> Result<Vec<u8>> {
        outbound::change_focus(self.require_identity()?, request)
    }

    pub fn instant_replay(&self, request: &InstantReplayRequest) -> Result<Vec<u8>> {
        outbound::instant_replay_request(self.require_identity()?, request)
    }

    /// Builds UNREGISTER_COMMAND_APPLICATION and resets the session.
    pub fn disconnect(&mut self) -> Result<Vec<u8>> {
        let frame = outbound::unregister_command_application(self.require_identity()?)?;
        info!(
            connection_id = self.state.connection_id.map(ConnectionIdentity::get),
            "Unregistering from broadcasting server"
        );
        self.state.reset();
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Notification;

    type TestResult = core::result::Result<(), Box<dyn std::error::Error>>;

    fn session() -> ClientSession {
        ClientSession::new(RegistrationParams::default())
    }

    #[test]
    fn new_session_is_disconnected() {
        let session = session();
        assert_eq!(session.handshake(), HandshakeState::Disconnected);
        assert_eq!(session.connection_id(), None);
        assert!(session.entry_list().is_empty());
    }

    #[test]
    fn connect_moves_to_awaiting_registration() -> TestResult {
        let mut session = session();
        let frame = session.connect()?;
        assert_eq!(frame.first(), Some(&1));
        assert_eq!(session.handshake(), HandshakeState::AwaitingRegistration);

        let again = session.connect()?;
        assert_eq!(frame, again);
        Ok(())
    }

    #[test]
    fn connect_after_registration_is_rejected() -> TestResult {
        let mut session = session();
        session.connect()?;
        session.handle_inbound(&[0x01, 42, 0, 0, 0])?;
        assert!(matches!(
            session.connect(),
            Err(ProtocolError::PreconditionViolation(_))
        ));
        Ok(())
    }

    #[test]
    fn requests_before_registration_are_precondition_violations() {
        let mut session = session();
        assert!(matches!(
            session.request_entry_list(),
            Err(ProtocolError::PreconditionViolation(_))
        ));
        assert!(matches!(
            session.request_track_data(),
            Err(ProtocolError::PreconditionViolation(_))
        ));
        assert!(matches!(
            session.change_hud_page("Blank"),
            Err(ProtocolError::PreconditionViolation(_))
        ));
        assert!(matches!(
            session.disconnect(),
            Err(ProtocolError::PreconditionViolation(_))
        ));
    }

    #[test]
    fn registration_result_chains_request() -> TestResult {
        let mut session = session();
        session.connect()?;
        let result = session.handle_inbound(&[0x01, 42, 0, 0, 0])?;

        assert_eq!(result.outbound, vec![vec![0x0A, 42, 0, 0, 0]]);
        assert_eq!(
            result.notifications,
            vec![Notification::Registered {
                connection_id: ConnectionIdentity::new(42),
                readonly: false
            }]
        );
        assert_eq!(session.handshake(), HandshakeState::EntryListRequested);
        assert_eq!(session.request_entry_list()?, vec![0x0A, 42, 0, 0, 0]);
        Ok(())
    }

    #[test]
    fn track_data_option_adds_second_request() -> TestResult {
        let mut session = session().with_track_data_request(true);
        session.connect()?;
        let result = session.handle_inbound(&[0x01, 1, 0, 0, 0])?;
        assert_eq!(result.outbound.len(), 2);
        assert_eq!(result.outbound.get(1), Some(&vec![0x0B, 1, 0, 0, 0]));
        Ok(())
    }

    #[test]
    fn disconnect_resets_state() -> TestResult {
        let mut session = session();
        session.connect()?;
        session.handle_inbound(&[0x01, 42, 0, 0, 0])?;
        session.handle_inbound(&[0x04, 42, 0, 0, 0, 1, 0, 7, 0])?;
        assert_eq!(session.entry_list().len(), 1);

        let frame = session.disconnect()?;
        assert_eq!(frame, vec![0x09, 42, 0, 0, 0]);
        assert_eq!(session.handshake(), HandshakeState::Disconnected);
        assert_eq!(session.connection_id(), None);
        assert!(session.entry_list().is_empty());
        Ok(())
    }

    #[test]
    fn malformed_inbound_frames_are_warnings() -> TestResult {
        let mut session = session();
        session.connect()?;
        for frame in [&[0x01, 42][..], &[0x63][..], &[0x06, 1, 0][..]] {
            let err = match session.handle_inbound(frame) {
                Ok(_) => return Err(format!("{frame:?} should fail").into()),
                Err(e) => e,
            };
            assert_eq!(err.severity(), ErrorSeverity::Warning);
        }
        assert_eq!(session.handshake(), HandshakeState::AwaitingRegistration);
        Ok(())
    }

    #[test]
    fn bad_frame_leaves_session_usable() -> TestResult {
        let mut session = session();
        session.connect()?;
        assert!(session.handle_inbound(&[0x01, 42]).is_err());
        assert_eq!(session.handshake(), HandshakeState::AwaitingRegistration);

        session.handle_inbound(&[0x01, 42, 0, 0, 0])?;
        assert_eq!(session.connection_id(), Some(ConnectionIdentity::new(42)));
        Ok(())
    }
}
