use crate::utils::error::{ParkingError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VehicleClass {
    Car,
    Bike,
}

impl VehicleClass {
    pub const ALL: [VehicleClass; 2] = [VehicleClass::Car, VehicleClass::Bike];

    /// Maps the operator menu code (1 = car, 2 = bike). Any other code is an
    /// invalid selection.
    pub fn from_selection(code: u32) -> Option<Self> {
        match code {
            1 => Some(Self::Car),
            2 => Some(Self::Bike),
            _ => None,
        }
    }

    /// Decodes a stored class code, rejecting a missing one.
    pub fn from_code(code: Option<&str>) -> Result<Self> {
        match code {
            Some(code) => code.parse(),
            None => Err(ParkingError::UnknownVehicleClass { value: None }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Car => "CAR",
            Self::Bike => "BIKE",
        }
    }
}

impl FromStr for VehicleClass {
    type Err = ParkingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CAR" => Ok(Self::Car),
            "BIKE" => Ok(Self::Bike),
            _ => Err(ParkingError::UnknownVehicleClass {
                value: Some(s.to_string()),
            }),
        }
    }
}

impl fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpotId(u32);

impl SpotId {
    /// Stores report "nothing found" as 0 or a negative id.
    pub fn from_raw(raw: i64) -> Option<Self> {
        u32::try_from(raw).ok().filter(|id| *id > 0).map(Self)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SpotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParkingSpot {
    pub id: SpotId,
    pub vehicle_class: VehicleClass,
    pub occupied: bool,
}

impl ParkingSpot {
    pub fn new(id: SpotId, vehicle_class: VehicleClass, occupied: bool) -> Self {
        Self {
            id,
            vehicle_class,
            occupied,
        }
    }
}

/// One vehicle's stay. Exit time and price are written together by
/// [`Ticket::close`] and never change afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ticket {
    registration: String,
    spot: SpotId,
    vehicle_class: VehicleClass,
    entry_time: DateTime<Utc>,
    exit_time: Option<DateTime<Utc>>,
    price: Option<Decimal>,
    discount: bool,
}

impl Ticket {
    pub fn open(
        registration: impl Into<String>,
        spot: &ParkingSpot,
        entry_time: DateTime<Utc>,
        discount: bool,
    ) -> Self {
        Self {
            registration: registration.into(),
            spot: spot.id,
            vehicle_class: spot.vehicle_class,
            entry_time,
            exit_time: None,
            price: None,
            discount,
        }
    }

    /// Records the exit. The price must be a non-negative amount in whole cents.
    pub fn close(&mut self, exit_time: DateTime<Utc>, price: Decimal) -> Result<()> {
        if !self.is_open() {
            return Err(ParkingError::TicketAlreadyClosed {
                registration: self.registration.clone(),
            });
        }
        if exit_time < self.entry_time {
            return Err(ParkingError::InvalidInterval {
                entry: self.entry_time,
                exit: Some(exit_time),
            });
        }
        if price < Decimal::ZERO || price != price.round_dp(2) {
            return Err(ParkingError::InvalidPrice { price });
        }
        self.exit_time = Some(exit_time);
        self.price = Some(price);
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.exit_time.is_none()
    }

    pub fn registration(&self) -> &str {
        &self.registration
    }

    pub fn spot(&self) -> SpotId {
        self.spot
    }

    pub fn vehicle_class(&self) -> VehicleClass {
        self.vehicle_class
    }

    pub fn entry_time(&self) -> DateTime<Utc> {
        self.entry_time
    }

    pub fn exit_time(&self) -> Option<DateTime<Utc>> {
        self.exit_time
    }

    pub fn price(&self) -> Option<Decimal> {
        self.price
    }

    pub fn discount(&self) -> bool {
        self.discount
    }
}
