//! Session state: connection identity, handshake progress and the entry list.

use core::fmt;
use std::collections::HashMap;

use serde::Serialize;

/// Session token assigned by the simulation when registration succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ConnectionIdentity(i32);

impl ConnectionIdentity {
    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> i32 {
        self.0
    }
}

impl From<i32> for ConnectionIdentity {
    fn from(raw: i32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ConnectionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Progress of the registration and entry-list handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HandshakeState {
    /// Nothing sent yet.
    #[default]
    Disconnected,
    /// Registration sent; waiting for REGISTRATION_RESULT.
    AwaitingRegistration,
    /// Identity assigned; the entry list has not been requested yet.
    Registered,
    /// REQUEST_ENTRY_LIST sent; waiting for ENTRY_LIST.
    EntryListRequested,
    /// An entry list has been received. Steady state.
    EntryListPopulated,
}

impl HandshakeState {
    /// True once the simulation has assigned a connection identity.
    pub const fn is_registered(self) -> bool {
        matches!(
            self,
            HandshakeState::Registered
                | HandshakeState::EntryListRequested
                | HandshakeState::EntryListPopulated
        )
    }
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HandshakeState::Disconnected => "disconnected",
            HandshakeState::AwaitingRegistration => "awaiting_registration",
            HandshakeState::Registered => "registered",
            HandshakeState::EntryListRequested => "entry_list_requested",
            HandshakeState::EntryListPopulated => "entry_list_populated",
        };
        f.write_str(name)
    }
}

/// One driver of a car, in the order the simulation listed them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DriverEntry {
    pub first_name: String,
    pub last_name: String,
    pub short_name: String,
    /// Opaque driver category code.
    pub category: u8,
    /// Opaque nationality code.
    pub nationality: u16,
}

/// One car of the entry list.
///
/// Seeded with its index by ENTRY_LIST; the remaining fields are filled in
/// by a later ENTRY_LIST_CAR frame for the same index.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CarEntry {
    pub car_index: u16,
    /// Opaque car model code.
    pub car_model_type: u8,
    pub team_name: String,
    pub race_number: i32,
    /// Opaque cup category code.
    pub cup_category: u8,
    /// Index into `drivers` of the driver currently in the car.
    pub current_driver_index: u8,
    pub nationality: u16,
    pub drivers: Vec<DriverEntry>,
    populated: bool,
}

impl CarEntry {
    /// An entry known only by its index.
    pub fn seeded(car_index: u16) -> Self {
        Self {
            car_index,
            ..Self::default()
        }
    }

    /// Whether an ENTRY_LIST_CAR frame has filled in this entry.
    pub fn is_populated(&self) -> bool {
        self.populated
    }

    /// Applies a decoded ENTRY_LIST_CAR body.
    ///
    /// Scalar fields take the new values; drivers are appended after the
    /// ones already known, in arrival order.
    pub(crate) fn apply_update(&mut self, update: CarEntry) {
        self.car_model_type = update.car_model_type;
        self.team_name = update.team_name;
        self.race_number = update.race_number;
        self.cup_category = update.cup_category;
        self.current_driver_index = update.current_driver_index;
        self.nationality = update.nationality;
        self.drivers.extend(update.drivers);
        self.populated = true;
    }

    /// The driver currently in the car, if the index points at a known driver.
    pub fn current_driver(&self) -> Option<&DriverEntry> {
        self.drivers.get(usize::from(self.current_driver_index))
    }
}

/// Cars of the current entry-list generation, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct EntryListSnapshot {
    generation: u64,
    cars: Vec<CarEntry>,
    /// Car index to position in `cars`.
    #[serde(skip)]
    positions: HashMap<u16, usize>,
}

impl EntryListSnapshot {
    /// Number of ENTRY_LIST frames applied so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.cars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cars.is_empty()
    }

    pub fn cars(&self) -> &[CarEntry] {
        &self.cars
    }

    pub fn get(&self, car_index: u16) -> Option<&CarEntry> {
        let position = *self.positions.get(&car_index)?;
        self.cars.get(position)
    }

    pub fn contains(&self, car_index: u16) -> bool {
        self.positions.contains_key(&car_index)
    }

    pub(crate) fn get_mut(&mut self, car_index: u16) -> Option<&mut CarEntry> {
        let position = *self.positions.get(&car_index)?;
        self.cars.get_mut(position)
    }

    /// Discards every car and seeds a new generation from `car_indices`.
    ///
    /// Repeated indices keep their first position. Returns the number of
    /// distinct cars in the new generation.
    pub(crate) fn replace(&mut self, car_indices: &[u16]) -> usize {
        let mut cars: Vec<CarEntry> = Vec::with_capacity(car_indices.len());
        let mut positions = HashMap::with_capacity(car_indices.len());
        for &car_index in car_indices {
            if positions.contains_key(&car_index) {
                tracing::warn!(car_index, "Duplicate car index in entry list");
                continue;
            }
            positions.insert(car_index, cars.len());
            cars.push(CarEntry::seeded(car_index));
        }

        self.cars = cars;
        self.positions = positions;
        self.generation = self.generation.saturating_add(1);
        self.cars.len()
    }

    pub(crate) fn clear(&mut self) {
        self.cars.clear();
        self.positions.clear();
    }
}

/// Mutable model owned by one client session.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SessionState {
    pub(crate) handshake: HandshakeState,
    pub(crate) connection_id: Option<ConnectionIdentity>,
    pub(crate) readonly: bool,
    pub(crate) entry_list: EntryListSnapshot,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handshake(&self) -> HandshakeState {
        self.handshake
    }

    /// Identity assigned at registration; `None` until then.
    pub fn connection_id(&self) -> Option<ConnectionIdentity> {
        self.connection_id
    }

    /// Whether the simulation registered this client as read-only.
    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    pub fn entry_list(&self) -> &EntryListSnapshot {
        &self.entry_list
    }

    pub(crate) fn reset(&mut self) {
        self.handshake = HandshakeState::Disconnected;
        self.connection_id = None;
        self.readonly = false;
        self.entry_list.clear();
    }
}
