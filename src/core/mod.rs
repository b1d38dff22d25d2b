pub mod allocator;
pub mod fare;
pub mod parking;

pub use crate::domain::model::{ParkingSpot, SpotId, Ticket, VehicleClass};
pub use crate::domain::ports::{Clock, InputSource, SpotRepository, TicketRepository};
pub use crate::utils::error::Result;
