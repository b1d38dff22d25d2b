pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{
    ConsoleInput, InMemorySpotRepository, InMemoryTicketRepository, ManualClock, SystemClock,
};
pub use config::TomlConfig;
pub use core::{
    fare::{FareCalculator, FareSchedule},
    parking::{EntryOutcome, ExitOutcome, ParkingService},
};
pub use domain::model::{ParkingSpot, SpotId, Ticket, VehicleClass};
pub use utils::error::{ParkingError, Result};
