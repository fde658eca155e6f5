//! Device sessions
//!
//! A [`Device`] owns the transport, negotiates the API mode on open and runs
//! the receive thread that feeds the exchange coordinator and listeners.

mod config;
mod device;
mod events;
mod exchange;
mod stats;

pub use config::DeviceConfig;
pub use device::{Device, DeviceState, Reply};
pub use events::{Event, LogLevel, Subscription};
pub use stats::StatsSnapshot;
