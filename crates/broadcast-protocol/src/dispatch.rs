//! Inbound frame dispatcher.
//!
//! [`dispatch`] decodes one datagram against the current [`SessionState`] and
//! returns the frames to send in response plus notifications for the caller.
//! Every frame is decoded completely before any state is committed, so a
//! malformed datagram never disturbs state built from earlier ones.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catalog::InboundMessageType;
use crate::codec::FrameReader;
use crate::error::{ProtocolError, Result};
use crate::outbound;
use crate::state::{CarEntry, ConnectionIdentity, DriverEntry, HandshakeState, SessionState};

/// Something the caller may want to react to after a frame was handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// The simulation accepted the registration.
    Registered {
        connection_id: ConnectionIdentity,
        readonly: bool,
    },
    /// The simulation refused the registration.
    RegistrationRejected { message: String },
    /// A new entry-list generation replaced the previous one.
    EntryListReplaced { generation: u64, car_count: usize },
    /// A car of the current entry list was filled in.
    CarUpdated { car_index: u16 },
    /// A recognised frame whose body is not decoded.
    Unhandled {
        message_type: InboundMessageType,
        payload: Vec<u8>,
    },
}

/// Result of handling one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub message_type: InboundMessageType,
    /// Datagrams to send to the simulation, in order.
    pub outbound: Vec<Vec<u8>>,
    pub notifications: Vec<Notification>,
}

impl Dispatch {
    fn new(message_type: InboundMessageType) -> Self {
        Self {
            message_type,
            outbound: Vec::new(),
            notifications: Vec::new(),
        }
    }
}

/// Tunables for the automatic requests issued while dispatching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchOptions {
    /// Also request track data right after registering.
    pub request_track_data: bool,
}

/// Handles one inbound frame with default options.
pub fn dispatch(state: &mut SessionState, frame: &[u8]) -> Result<Dispatch> {
    dispatch_with(state, frame, DispatchOptions::default())
}

/// Handles one inbound frame.
pub fn dispatch_with(
    state: &mut SessionState,
    frame: &[u8],
    options: DispatchOptions,
) -> Result<Dispatch> {
    let mut reader = FrameReader::new(frame);
    let code = reader.read_u8()?;
    let message_type =
        InboundMessageType::from_code(code).ok_or(ProtocolError::UnknownMessageType(code))?;

    debug!(
        message_type = %message_type,
        decoded = message_type.is_decoded(),
        len = frame.len(),
        "Dispatching broadcasting frame"
    );

    match message_type {
        InboundMessageType::RegistrationResult => {
            handle_registration_result(state, &mut reader, options)
        }
        InboundMessageType::EntryList => handle_entry_list(state, &mut reader),
        InboundMessageType::EntryListCar => handle_entry_list_car(state, &mut reader),
        InboundMessageType::RealtimeUpdate
        | InboundMessageType::RealtimeCarUpdate
        | InboundMessageType::TrackData
        | InboundMessageType::BroadcastingEvent => {
            let mut dispatch = Dispatch::new(message_type);
            dispatch.notifications.push(Notification::Unhandled {
                message_type,
                payload: reader.rest().to_vec(),
            });
            Ok(dispatch)
        }
    }
}

struct RegistrationOutcome {
    connection_id: ConnectionIdentity,
    success: bool,
    readonly: bool,
    message: String,
}

/// Body length of the bare REGISTRATION_RESULT: the connection id alone.
const BARE_REGISTRATION_BODY_LEN: usize = 4;

/// Decodes REGISTRATION_RESULT.
///
/// Two encodings exist. The bare form is exactly the connection id and counts
/// as a writable success. The full form appends success, readonly and the
/// message, and once any tail byte is present the whole tail is required, so
/// a frame cut inside the tail fails with `Truncated`. A full frame cut back
/// to exactly the bare length is indistinguishable from the bare form and is
/// decoded as one.
fn decode_registration_result(reader: &mut FrameReader<'_>) -> Result<RegistrationOutcome> {
    let body_len = reader.remaining();
    let connection_id = ConnectionIdentity::new(reader.read_i32_le()?);

    if body_len == BARE_REGISTRATION_BODY_LEN {
        return Ok(RegistrationOutcome {
            connection_id,
            success: true,
            readonly: false,
            message: String::new(),
        });
    }

    let success = reader.read_u8()? != 0;
    // The simulation sends 0 for a read-only connection.
    let readonly = reader.read_u8()? == 0;
    let message = reader.read_string()?;

    Ok(RegistrationOutcome {
        connection_id,
        success,
        readonly,
        message,
    })
}

fn handle_registration_result(
    state: &mut SessionState,
    reader: &mut FrameReader<'_>,
    options: DispatchOptions,
) -> Result<Dispatch> {
    let outcome = decode_registration_result(reader)?;
    let mut dispatch = Dispatch::new(InboundMessageType::RegistrationResult);

    if !outcome.success {
        warn!(error = %outcome.message, "Broadcasting registration rejected");
        dispatch
            .notifications
            .push(Notification::RegistrationRejected {
                message: outcome.message,
            });
        return Ok(dispatch);
    }

    let mut requests = vec![outbound::request_entry_list(outcome.connection_id)?];
    if options.request_track_data {
        requests.push(outbound::request_track_data(outcome.connection_id)?);
    }

    state.connection_id = Some(outcome.connection_id);
    state.readonly = outcome.readonly;
    state.handshake = HandshakeState::Registered;
    info!(
        connection_id = outcome.connection_id.get(),
        readonly = outcome.readonly,
        "Broadcasting registration successful"
    );

    state.handshake = HandshakeState::EntryListRequested;
    debug!(connection_id = outcome.connection_id.get(), "Requesting entry list");

    dispatch.outbound = requests;
    dispatch.notifications.push(Notification::Registered {
        connection_id: outcome.connection_id,
        readonly: outcome.readonly,
    });
    Ok(dispatch)
}

fn handle_entry_list(state: &mut SessionState, reader: &mut FrameReader<'_>) -> Result<Dispatch> {
    let connection_id = ConnectionIdentity::new(reader.read_i32_le()?);
    let car_count = usize::from(reader.read_u16_le()?);

    let mut car_indices = Vec::with_capacity(car_count.min(reader.remaining() / 2));
    for _ in 0..car_count {
        car_indices.push(reader.read_u16_le()?);
    }

    if let Some(expected) = state.connection_id
        && expected != connection_id
    {
        warn!(
            expected = expected.get(),
            received = connection_id.get(),
            "Entry list carries a different connection id"
        );
    }

    let distinct = state.entry_list.replace(&car_indices);
    if state.handshake.is_registered() {
        state.handshake = HandshakeState::EntryListPopulated;
    }

    let generation = state.entry_list.generation();
    info!(car_count = distinct, generation, "Entry list replaced");

    let mut dispatch = Dispatch::new(InboundMessageType::EntryList);
    dispatch.notifications.push(Notification::EntryListReplaced {
        generation,
        car_count: distinct,
    });
    Ok(dispatch)
}

fn decode_driver(reader: &mut FrameReader<'_>) -> Result<DriverEntry> {
    Ok(DriverEntry {
        first_name: reader.read_string()?,
        last_name: reader.read_string()?,
        short_name: reader.read_string()?,
        category: reader.read_u8()?,
        nationality: reader.read_u16_le()?,
    })
}

fn decode_car_body(car_index: u16, reader: &mut FrameReader<'_>) -> Result<CarEntry> {
    let mut car = CarEntry::seeded(car_index);
    car.car_model_type = reader.read_u8()?;
    car.team_name = reader.read_string()?;
    car.race_number = reader.read_i32_le()?;
    car.cup_category = reader.read_u8()?;
    car.current_driver_index = reader.read_u8()?;
    car.nationality = reader.read_u16_le()?;

    let driver_count = usize::from(reader.read_u8()?);
    car.drivers = Vec::with_capacity(driver_count);
    for _ in 0..driver_count {
        car.drivers.push(decode_driver(reader)?);
    }

    Ok(car)
}

fn handle_entry_list_car(
    state: &mut SessionState,
    reader: &mut FrameReader<'_>,
) -> Result<Dispatch> {
    let car_index = reader.read_u16_le()?;
    if !state.entry_list.contains(car_index) {
        warn!(car_index, "Entry list car for unknown car index; frame discarded");
        return Err(ProtocolError::UnknownCarIndex(car_index));
    }

    let decoded = decode_car_body(car_index, reader)?;
    if !reader.is_empty() {
        debug!(
            car_index,
            trailing = reader.remaining(),
            "Ignoring trailing bytes after entry list car"
        );
    }

    let slot = state
        .entry_list
        .get_mut(car_index)
        .ok_or(ProtocolError::UnknownCarIndex(car_index))?;
    slot.apply_update(decoded);

    debug!(
        car_index,
        race_number = slot.race_number,
        drivers = slot.drivers.len(),
        "Entry list car updated"
    );

    let mut dispatch = Dispatch::new(InboundMessageType::EntryListCar);
    dispatch
        .notifications
        .push(Notification::CarUpdated { car_index });
    Ok(dispatch)
}
