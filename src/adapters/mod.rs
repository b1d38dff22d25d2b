// Adapters layer: concrete implementations of the domain ports (clock,
// in-memory stores, console input).

pub mod clock;
pub mod console;
pub mod memory;

pub use clock::{ManualClock, SystemClock};
pub use console::ConsoleInput;
pub use memory::{InMemorySpotRepository, InMemoryTicketRepository};
