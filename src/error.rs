//! Error handling for the component library.

use crate::devices::max31865::FaultStatus;
use embedded_hal::{digital, i2c, pwm, spi};

/// A specialized `Result` type for device operations.
pub type Result<T> = std::result::Result<T, DeviceError>;

/// The main error type for sensor and actuator operations.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// I2C transfer failed
    #[error("I2C bus error: {0:?}")]
    I2c(i2c::ErrorKind),

    /// SPI transfer failed
    #[error("SPI bus error: {0:?}")]
    Spi(spi::ErrorKind),

    /// Digital output pin could not be driven
    #[error("Pin error: {0:?}")]
    Pin(digital::ErrorKind),

    /// PWM output rejected the duty cycle
    #[error("PWM error: {0:?}")]
    Pwm(pwm::ErrorKind),

    /// Received data failed its checksum
    #[error("CRC mismatch: expected {expected:#04x}, got {actual:#04x}")]
    Crc { expected: u8, actual: u8 },

    /// Measurement status bits did not match the requested measurement
    #[error("Unexpected measurement status bits: {0:#04b}")]
    Status(u8),

    /// The RTD converter flagged a fault during conversion
    #[error("RTD fault: {0}")]
    RtdFault(FaultStatus),

    /// A conversion did not complete within the poll limit
    #[error("Conversion not ready after {0} polls")]
    NotReady(u32),

    /// A value is outside the range the device accepts
    #[error("Value out of range: {0}")]
    OutOfRange(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// GPIO peripheral access failed (only available with gpio feature)
    #[cfg(feature = "gpio")]
    #[error("GPIO error: {0}")]
    Gpio(String),
}

impl DeviceError {
    /// Wrap an I2C bus error
    pub fn i2c<E: i2c::Error>(error: E) -> Self {
        Self::I2c(error.kind())
    }

    /// Wrap an SPI bus error
    pub fn spi<E: spi::Error>(error: E) -> Self {
        Self::Spi(error.kind())
    }

    /// Wrap a digital pin error
    pub fn pin<E: digital::Error>(error: E) -> Self {
        Self::Pin(error.kind())
    }

    /// Wrap a PWM error
    pub fn pwm<E: pwm::Error>(error: E) -> Self {
        Self::Pwm(error.kind())
    }

    /// Create a new out-of-range error
    pub fn out_of_range(msg: impl Into<String>) -> Self {
        Self::OutOfRange(msg.into())
    }

    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new GPIO error
    #[cfg(feature = "gpio")]
    pub fn gpio_error(msg: impl Into<String>) -> Self {
        Self::Gpio(msg.into())
    }
}

impl pwm::Error for DeviceError {
    fn kind(&self) -> pwm::ErrorKind {
        match self {
            Self::Pwm(kind) => *kind,
            _ => pwm::ErrorKind::Other,
        }
    }
}
