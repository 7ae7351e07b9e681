#![forbid(unsafe_code)]

pub mod gate;
pub mod model;
pub mod time;

pub use gate::AvailabilityStatus;
pub use time::Clock;
