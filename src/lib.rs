//! # Component Library
//!
//! Drivers and bench tooling for the sensors and actuators wired to a
//! Raspberry Pi: an HTU21D humidity sensor, a MAX31865 RTD converter, an
//! MCP342x ADC, a PCA9685 PWM controller and a MOSFET-switched load on a GPIO.
//!
//! ## Features
//!
//! - **Blocking drivers** over the `embedded-hal` 1.0 traits
//! - **Raspberry Pi backend** via rppal (feature `gpio`)
//! - **Simulated backend** modelling each chip at register level
//! - **Library + Binary**: use as a crate or run the bench commands directly
//!
//! Every interaction follows the same pattern: acquire a bus or pin from a
//! [`Board`], bind a driver to it, then perform a single read or write.
//!
//! ## Quick Start
//!
//! Without the `gpio` feature [`default_board`] is a simulated board with the
//! bench chips attached, so this runs anywhere.
//!
//! ```rust,no_run
//! use component_library::{default_board, Htu21dConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut board = default_board()?;
//!     let mut sensor = Htu21dConfig::default().open(&mut board)?;
//!     println!("{}", sensor.read()?);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod devices;
pub mod error;
pub mod platform;
pub mod readings;

// Re-export public API
pub use config::{Htu21dConfig, Max31865Config, Mcp342xConfig, OutputConfig, Pca9685Config};
pub use devices::{
    DigitalOutput, FaultStatus, Gain, Htu21d, Level, Max31865, Mcp342x, Pca9685, PwmOutput,
    Resolution, Wiring,
};
pub use error::{DeviceError, Result};
pub use platform::{default_board, Board, DefaultBoard, PinNumbering, SpiConfig};
pub use readings::{AdcReading, ClimateReading, OutputSetting, PwmSetting, RtdReading};

/// I2C bus exposed on header pins 3 and 5
pub const DEFAULT_I2C_BUS: u8 = 1;

/// SPI controller exposed on header pins 19, 21 and 23
pub const DEFAULT_SPI_BUS: u8 = 0;
