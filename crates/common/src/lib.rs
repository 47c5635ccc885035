//! Shared types, config, and error definitions for the AQI monitor.

pub mod clock;
pub mod config;
pub mod error;
pub mod types;

pub use clock::{Clock, FixedClock, SharedClock, SystemClock};
pub use config::MonitorConfig;
pub use error::{Error, ErrorPayload};
pub use types::*;

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;
