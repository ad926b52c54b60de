//! Assetto Corsa Competizione broadcasting protocol (v4): codec, message
//! catalog, entry-list session model and handshake state machine.
//!
//! This crate is I/O-free. A transport hands each received UDP datagram to
//! [`ClientSession::handle_inbound`] and sends whatever frames the session
//! returns. Nothing here opens sockets, sleeps or retries.
//!
//! # Handshake
//!
//! ```text
//! Disconnected --connect()--> AwaitingRegistration
//!     --REGISTRATION_RESULT--> Registered --REQUEST_ENTRY_LIST--> EntryListRequested
//!     --ENTRY_LIST--> EntryListPopulated
//! ```
//!
//! # Example
//!
//! ```
//! use acc_broadcast_protocol::{ClientSession, HandshakeState, RegistrationParams};
//!
//! # fn main() -> Result<(), acc_broadcast_protocol::ProtocolError> {
//! let mut session = ClientSession::new(RegistrationParams::default());
//! let _register = session.connect()?;
//!
//! // REGISTRATION_RESULT carrying connection id 42.
//! let dispatch = session.handle_inbound(&[0x01, 42, 0, 0, 0])?;
//! assert_eq!(dispatch.outbound, vec![vec![0x0A, 42, 0, 0, 0]]);
//! assert_eq!(session.handshake(), HandshakeState::EntryListRequested);
//! # Ok(())
//! # }
//! ```

#![deny(static_mut_refs)]
#![warn(rust_2018_idioms)]

pub mod catalog;
pub mod codec;
pub mod dispatch;
pub mod error;
pub mod outbound;
pub mod session;
pub mod state;

pub use catalog::{BROADCASTING_PROTOCOL_VERSION, InboundMessageType, OutboundMessageType};
pub use codec::{FRAME_CAPACITY, FrameReader, FrameWriter};
pub use dispatch::{Dispatch, DispatchOptions, Notification, dispatch, dispatch_with};
pub use error::{ErrorSeverity, ProtocolError, Result};
pub use outbound::{CameraSelection, FocusRequest, InstantReplayRequest, RegistrationParams};
pub use session::ClientSession;
pub use state::{
    CarEntry, ConnectionIdentity, DriverEntry, EntryListSnapshot, HandshakeState, SessionState,
};
