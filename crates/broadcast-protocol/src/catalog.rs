//! Message type codes for the broadcasting protocol.
//!
//! Every frame, in either direction, starts with one of these codes and is
//! followed by a type-specific body with no length prefix.

use core::fmt;

use serde::Serialize;

/// Broadcasting protocol version sent in the registration frame.
pub const BROADCASTING_PROTOCOL_VERSION: u8 = 4;

/// Commands sent from the client to the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum OutboundMessageType {
    RegisterCommandApplication = 1,
    UnregisterCommandApplication = 9,
    RequestEntryList = 10,
    RequestTrackData = 11,
    ChangeHudPage = 49,
    ChangeFocus = 50,
    InstantReplayRequest = 51,
    PlayManualReplayHighlight = 52,
    SaveManualReplayHighlight = 60,
}

impl OutboundMessageType {
    pub const ALL: [OutboundMessageType; 9] = [
        OutboundMessageType::RegisterCommandApplication,
        OutboundMessageType::UnregisterCommandApplication,
        OutboundMessageType::RequestEntryList,
        OutboundMessageType::RequestTrackData,
        OutboundMessageType::ChangeHudPage,
        OutboundMessageType::ChangeFocus,
        OutboundMessageType::InstantReplayRequest,
        OutboundMessageType::PlayManualReplayHighlight,
        OutboundMessageType::SaveManualReplayHighlight,
    ];

    pub const fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }

    pub const fn name(self) -> &'static str {
        match self {
            OutboundMessageType::RegisterCommandApplication => "REGISTER_COMMAND_APPLICATION",
            OutboundMessageType::UnregisterCommandApplication => "UNREGISTER_COMMAND_APPLICATION",
            OutboundMessageType::RequestEntryList => "REQUEST_ENTRY_LIST",
            OutboundMessageType::RequestTrackData => "REQUEST_TRACK_DATA",
            OutboundMessageType::ChangeHudPage => "CHANGE_HUD_PAGE",
            OutboundMessageType::ChangeFocus => "CHANGE_FOCUS",
            OutboundMessageType::InstantReplayRequest => "INSTANT_REPLAY_REQUEST",
            OutboundMessageType::PlayManualReplayHighlight => "PLAY_MANUAL_REPLAY_HIGHLIGHT",
            OutboundMessageType::SaveManualReplayHighlight => "SAVE_MANUAL_REPLAY_HIGHLIGHT",
        }
    }
}

impl TryFrom<u8> for OutboundMessageType {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or(code)
    }
}

impl fmt::Display for OutboundMessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Frames sent from the simulation to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum InboundMessageType {
    RegistrationResult = 1,
    RealtimeUpdate = 2,
    RealtimeCarUpdate = 3,
    EntryList = 4,
    TrackData = 5,
    EntryListCar = 6,
    BroadcastingEvent = 7,
}

impl InboundMessageType {
    pub const ALL: [InboundMessageType; 7] = [
        InboundMessageType::RegistrationResult,
        InboundMessageType::RealtimeUpdate,
        InboundMessageType::RealtimeCarUpdate,
        InboundMessageType::EntryList,
        InboundMessageType::TrackData,
        InboundMessageType::EntryListCar,
        InboundMessageType::BroadcastingEvent,
    ];

    pub const fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }

    pub const fn name(self) -> &'static str {
        match self {
            InboundMessageType::RegistrationResult => "REGISTRATION_RESULT",
            InboundMessageType::RealtimeUpdate => "REALTIME_UPDATE",
            InboundMessageType::RealtimeCarUpdate => "REALTIME_CAR_UPDATE",
            InboundMessageType::EntryList => "ENTRY_LIST",
            InboundMessageType::TrackData => "TRACK_DATA",
            InboundMessageType::EntryListCar => "ENTRY_LIST_CAR",
            InboundMessageType::BroadcastingEvent => "BROADCASTING_EVENT",
        }
    }

    /// Whether the dispatcher decodes this frame's body.
    ///
    /// Other frames are surfaced to the caller as opaque payloads.
    pub const fn is_decoded(self) -> bool {
        matches!(
            self,
            InboundMessageType::RegistrationResult
                | InboundMessageType::EntryList
                | InboundMessageType::EntryListCar
        )
    }
}

impl TryFrom<u8> for InboundMessageType {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or(code)
    }
}

impl fmt::Display for InboundMessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
