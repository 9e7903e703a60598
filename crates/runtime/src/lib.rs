pub mod epoch;
pub mod event_bus;

pub use epoch::*;
pub use event_bus::*;
