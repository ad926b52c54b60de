//! Builders for client-to-simulation frames.
//!
//! Each builder returns the exact datagram to send. Builders that need a
//! connection identity take it as an argument; the session decides whether
//! one is available.

use serde::{Deserialize, Serialize};

use crate::catalog::{BROADCASTING_PROTOCOL_VERSION, OutboundMessageType};
use crate::codec::FrameWriter;
use crate::error::{ProtocolError, Result};
use crate::state::ConnectionIdentity;

/// Startup parameters sent in REGISTER_COMMAND_APPLICATION.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationParams {
    pub protocol_version: u8,
    pub display_name: String,
    pub connection_password: String,
    /// Interval at which the simulation sends realtime updates.
    pub update_interval_ms: i32,
    pub command_password: String,
}

impl Default for RegistrationParams {
    fn default() -> Self {
        Self {
            protocol_version: BROADCASTING_PROTOCOL_VERSION,
            display_name: "AC Remote Telemetry Client".to_string(),
            connection_password: String::new(),
            update_interval_ms: 1000,
            command_password: String::new(),
        }
    }
}

/// Camera to switch to, by camera set and camera name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraSelection {
    pub camera_set: String,
    pub camera: String,
}

/// Body of CHANGE_FOCUS. At least one of the two targets must be set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FocusRequest {
    pub car_index: Option<u16>,
    pub camera: Option<CameraSelection>,
}

/// Body of INSTANT_REPLAY_REQUEST.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstantReplayRequest {
    pub start_session_time_ms: f32,
    pub duration_ms: f32,
    /// Car to focus when the replay starts; `-1` keeps the current focus.
    pub initial_focused_car_index: i32,
    pub initial_camera_set: String,
    pub initial_camera: String,
}

fn start(kind: OutboundMessageType) -> Result<FrameWriter> {
    let mut writer = FrameWriter::new();
    writer.write_u8(kind.code())?;
    Ok(writer)
}

pub fn register_command_application(params: &RegistrationParams) -> Result<Vec<u8>> {
    if params.update_interval_ms <= 0 {
        return Err(ProtocolError::PreconditionViolation(
            "realtime update interval must be positive",
        ));
    }

    let mut writer = start(OutboundMessageType::RegisterCommandApplication)?;
    writer.write_u8(params.protocol_version)?;
    writer.write_string(&params.display_name)?;
    writer.write_string(&params.connection_password)?;
    writer.write_i32_le(params.update_interval_ms)?;
    writer.write_string(&params.command_password)?;
    Ok(writer.into_frame())
}

fn connection_only(kind: OutboundMessageType, connection_id: ConnectionIdentity) -> Result<Vec<u8>> {
    let mut writer = start(kind)?;
    writer.write_i32_le(connection_id.get())?;
    Ok(writer.into_frame())
}

pub fn unregister_command_application(connection_id: ConnectionIdentity) -> Result<Vec<u8>> {
    connection_only(OutboundMessageType::UnregisterCommandApplication, connection_id)
}

pub fn request_entry_list(connection_id: ConnectionIdentity) -> Result<Vec<u8>> {
    connection_only(OutboundMessageType::RequestEntryList, connection_id)
}

pub fn request_track_data(connection_id: ConnectionIdentity) -> Result<Vec<u8>> {
    connection_only(OutboundMessageType::RequestTrackData, connection_id)
}

pub fn change_hud_page(connection_id: ConnectionIdentity, hud_page: &str) -> Result<Vec<u8>> {
    let mut writer = start(OutboundMessageType::ChangeHudPage)?;
    writer.write_i32_le(connection_id.get())?;
    writer.write_string(hud_page)?;
    Ok(writer.into_frame())
}

pub fn change_focus(connection_id: ConnectionIdentity, request: &FocusRequest) -> Result<Vec<u8>> {
    if request.car_index.is_none() && request.camera.is_none() {
        return Err(ProtocolError::PreconditionViolation(
            "focus change needs a car, a camera, or both",
        ));
    }

    let mut writer = start(OutboundMessageType::ChangeFocus)?;
    writer.write_i32_le(connection_id.get())?;

    match request.car_index {
        Some(car_index) => {
            writer.write_u8(1)?;
            writer.write_u16_le(car_index)?;
        }
        None => writer.write_u8(0)?,
    }

    match &request.camera {
        Some(camera) => {
            writer.write_u8(1)?;
            writer.write_string(&camera.camera_set)?;
            writer.write_string(&camera.camera)?;
        }
        None => writer.write_u8(0)?,
    }

    Ok(writer.into_frame())
}

pub fn instant_replay_request(
    connection_id: ConnectionIdentity,
    request: &InstantReplayRequest,
) -> Result<Vec<u8>> {
    let mut writer = start(OutboundMessageType::InstantReplayRequest)?;
    writer.write_i32_le(connection_id.get())?;
    writer.write_f32_le(request.start_session_time_ms)?;
    writer.write_f32_le(request.duration_ms)?;
    writer.write_i32_le(request.initial_focused_car_index)?;
    writer.write_string(&request.initial_camera_set)?;
    writer.write_string(&request.initial_camera)?;
    Ok(writer.into_frame())
}
