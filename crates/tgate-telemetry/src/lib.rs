//! Telemetry: structured logging setup and log throttling.

pub mod error;
pub mod logging;
pub mod throttle;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use throttle::LogThrottle;
