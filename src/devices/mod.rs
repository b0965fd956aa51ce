//! Device drivers for the supported sensors and actuators.
//!
//! Every driver owns the bus or pin it was bound to and performs blocking
//! transfers through the `embedded-hal` traits. Drivers are independent of
//! each other; use [`crate::platform::Board`] to obtain the channels they need.

pub mod htu21d;
pub mod max31865;
pub mod mcp342x;
pub mod output;
pub mod pca9685;

// Re-export commonly used items
pub use htu21d::Htu21d;
pub use max31865::{FaultStatus, Max31865, Wiring};
pub use mcp342x::{Gain, Mcp342x, Resolution};
pub use output::{DigitalOutput, Level, PwmOutput};
pub use pca9685::Pca9685;
