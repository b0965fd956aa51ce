//! Bus and pin acquisition.
//!
//! A [`Board`] hands out the I2C buses, SPI devices, output pins and PWM
//! outputs that device drivers are bound to. The Raspberry Pi backend is
//! feature-gated to allow compilation on machines without the peripherals;
//! the simulated backend models the supported chips at register level.

use crate::error::{DeviceError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

pub mod sim;

/// BCM GPIO numbers exposed on the 40-pin header.
pub const GPIO_PINS: RangeInclusive<u8> = 0..=27;

/// Physical header pin to BCM GPIO number.
const HEADER_PINS: [(u8, u8); 28] = [
    (3, 2),
    (5, 3),
    (7, 4),
    (8, 14),
    (10, 15),
    (11, 17),
    (12, 18),
    (13, 27),
    (15, 22),
    (16, 23),
    (18, 24),
    (19, 10),
    (21, 9),
    (22, 25),
    (23, 11),
    (24, 8),
    (26, 7),
    (27, 0),
    (28, 1),
    (29, 5),
    (31, 6),
    (32, 12),
    (33, 13),
    (35, 19),
    (36, 16),
    (37, 26),
    (38, 20),
    (40, 21),
];

/// BCM GPIO number for a physical header pin, if that pin is a GPIO.
pub fn board_to_bcm(physical: u8) -> Option<u8> {
    HEADER_PINS
        .iter()
        .find(|(board, _)| *board == physical)
        .map(|(_, bcm)| *bcm)
}

/// Physical header pin for a BCM GPIO number.
pub fn bcm_to_board(bcm: u8) -> Option<u8> {
    HEADER_PINS
        .iter()
        .find(|(_, gpio)| *gpio == bcm)
        .map(|(board, _)| *board)
}

/// Pin numbering scheme used on the command line and in configs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinNumbering {
    /// Physical header position (RPi.GPIO `BOARD` mode)
    #[default]
    Board,
    /// Broadcom GPIO number
    Bcm,
}

impl PinNumbering {
    /// Resolve a pin number in this scheme to a BCM GPIO number.
    pub fn to_bcm(self, pin: u8) -> Result<u8> {
        match self {
            Self::Board => board_to_bcm(pin).ok_or_else(|| {
                DeviceError::config_error(format!("header pin {} is not a GPIO", pin))
            }),
            Self::Bcm if GPIO_PINS.contains(&pin) => Ok(pin),
            Self::Bcm => Err(DeviceError::config_error(format!(
                "GPIO{} is not available on the header",
                pin
            ))),
        }
    }
}

impl fmt::Display for PinNumbering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Board => f.write_str("board"),
            Self::Bcm => f.write_str("bcm"),
        }
    }
}

impl FromStr for PinNumbering {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "board" => Ok(Self::Board),
            "bcm" => Ok(Self::Bcm),
            other => Err(format!("invalid numbering '{}', expected board or bcm", other)),
        }
    }
}

/// SPI device parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpiConfig {
    /// SPI controller (0 is /dev/spidev0.*)
    pub bus: u8,
    /// BCM GPIO driven as chip select
    pub chip_select_pin: u8,
    /// Clock frequency in Hz
    pub clock_hz: u32,
    /// SPI mode (0 to 3)
    pub mode: u8,
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            bus: crate::DEFAULT_SPI_BUS,
            chip_select_pin: 5,
            clock_hz: 500_000,
            mode: 1,
        }
    }
}

/// Source of buses and pins.
pub trait Board {
    type I2c: embedded_hal::i2c::I2c;
    type Spi: embedded_hal::spi::SpiDevice;
    type Output: embedded_hal::digital::OutputPin;
    type Pwm: embedded_hal::pwm::SetDutyCycle;
    type Delay: embedded_hal::delay::DelayNs;

    /// Human-readable backend name.
    fn name(&self) -> &'static str;

    /// Open I2C bus `bus` (`/dev/i2c-<bus>`).
    fn i2c(&mut self, bus: u8) -> Result<Self::I2c>;

    /// Open an SPI device with a GPIO chip select.
    fn spi(&mut self, config: &SpiConfig) -> Result<Self::Spi>;

    /// Claim a BCM pin as a digital output, initially low.
    fn output_pin(&mut self, pin: u8) -> Result<Self::Output>;

    /// Claim a BCM pin as a PWM output at `frequency_hz`, initially 0% duty.
    fn pwm_pin(&mut self, pin: u8, frequency_hz: f64) -> Result<Self::Pwm>;

    /// Blocking delay provider for drivers.
    fn delay(&mut self) -> Self::Delay;
}

fn check_pin(pin: u8) -> Result<()> {
    if GPIO_PINS.contains(&pin) {
        Ok(())
    } else {
        Err(DeviceError::config_error(format!(
            "GPIO{} is not available on the header",
            pin
        )))
    }
}

fn check_spi_mode(mode: u8) -> Result<()> {
    if mode <= 3 {
        Ok(())
    } else {
        Err(DeviceError::config_error(format!(
            "SPI mode {} outside 0..=3",
            mode
        )))
    }
}

#[cfg(feature = "gpio")]
mod raspberry_pi {
    use super::*;
    use embedded_hal::pwm::{self, ErrorType, SetDutyCycle};
    use embedded_hal_bus::spi::ExclusiveDevice;
    use rppal::gpio::{Gpio, OutputPin as PiOutputPin};
    use rppal::hal::Delay as PiDelay;
    use rppal::i2c::I2c as PiI2c;
    use rppal::pwm::{Channel, Polarity, Pwm};
    use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
    use tracing::{info, warn};

    /// Raspberry Pi board using rppal.
    pub struct RaspberryPi {
        gpio: Gpio,
    }

    impl RaspberryPi {
        /// Open the GPIO peripheral.
        pub fn new() -> Result<Self> {
            let gpio = Gpio::new().map_err(|e| {
                DeviceError::gpio_error(format!("Failed to initialize GPIO: {}", e))
            })?;
            info!("Raspberry Pi GPIO initialized");
            Ok(Self { gpio })
        }

        fn claim_output(&self, bcm: u8) -> Result<PiOutputPin> {
            check_pin(bcm)?;
            let pin = self.gpio.get(bcm).map_err(|e| {
                DeviceError::gpio_error(format!("Failed to access pin {}: {}", bcm, e))
            })?;
            Ok(pin.into_output_low())
        }
    }

    fn spi_bus(bus: u8) -> Result<Bus> {
        match bus {
            0 => Ok(Bus::Spi0),
            1 => Ok(Bus::Spi1),
            2 => Ok(Bus::Spi2),
            3 => Ok(Bus::Spi3),
            4 => Ok(Bus::Spi4),
            5 => Ok(Bus::Spi5),
            6 => Ok(Bus::Spi6),
            _ => Err(DeviceError::config_error(format!(
                "SPI bus {} outside 0..=6",
                bus
            ))),
        }
    }

    fn spi_mode(mode: u8) -> Result<Mode> {
        check_spi_mode(mode)?;
        Ok(match mode {
            0 => Mode::Mode0,
            1 => Mode::Mode1,
            2 => Mode::Mode2,
            _ => Mode::Mode3,
        })
    }

    fn hardware_pwm_channel(bcm: u8) -> Option<Channel> {
        match bcm {
            12 | 18 => Some(Channel::Pwm0),
            13 | 19 => Some(Channel::Pwm1),
            _ => None,
        }
    }

    /// PWM output backed by the PWM peripheral or by software timing.
    pub enum PiPwm {
        Hardware(Pwm),
        Software {
            pin: PiOutputPin,
            frequency_hz: f64,
        },
    }

    /// Error reported by [`PiPwm`].
    #[derive(Debug)]
    pub struct PiPwmError(String);

    impl pwm::Error for PiPwmError {
        fn kind(&self) -> pwm::ErrorKind {
            pwm::ErrorKind::Other
        }
    }

    impl ErrorType for PiPwm {
        type Error = PiPwmError;
    }

    impl SetDutyCycle for PiPwm {
        fn max_duty_cycle(&self) -> u16 {
            u16::MAX
        }

        fn set_duty_cycle(&mut self, duty: u16) -> std::result::Result<(), PiPwmError> {
            let fraction = f64::from(duty) / f64::from(u16::MAX);
            match self {
                Self::Hardware(pwm) => pwm
                    .set_duty_cycle(fraction)
                    .map_err(|e| PiPwmError(e.to_string())),
                Self::Software { pin, frequency_hz } => pin
                    .set_pwm_frequency(*frequency_hz, fraction)
                    .map_err(|e| PiPwmError(e.to_string())),
            }
        }
    }

    impl Board for RaspberryPi {
        type I2c = PiI2c;
        type Spi = ExclusiveDevice<Spi, PiOutputPin, PiDelay>;
        type Output = PiOutputPin;
        type Pwm = PiPwm;
        type Delay = PiDelay;

        fn name(&self) -> &'static str {
            "Raspberry Pi"
        }

        fn i2c(&mut self, bus: u8) -> Result<PiI2c> {
            PiI2c::with_bus(bus).map_err(|e| {
                DeviceError::gpio_error(format!("Failed to open /dev/i2c-{}: {}", bus, e))
            })
        }

        fn spi(&mut self, config: &SpiConfig) -> Result<Self::Spi> {
            let spi = Spi::new(
                spi_bus(config.bus)?,
                SlaveSelect::Ss0,
                config.clock_hz,
                spi_mode(config.mode)?,
            )
            .map_err(|e| {
                DeviceError::gpio_error(format!("Failed to open SPI bus {}: {}", config.bus, e))
            })?;
            let chip_select = self.claim_output(config.chip_select_pin)?;
            ExclusiveDevice::new(spi, chip_select, PiDelay::new()).map_err(|_| {
                DeviceError::gpio_error(format!(
                    "Failed to drive chip select GPIO{}",
                    config.chip_select_pin
                ))
            })
        }

        fn output_pin(&mut self, pin: u8) -> Result<PiOutputPin> {
            self.claim_output(pin)
        }

        fn pwm_pin(&mut self, pin: u8, frequency_hz: f64) -> Result<PiPwm> {
            if let Some(channel) = hardware_pwm_channel(pin) {
                match Pwm::with_frequency(channel, frequency_hz, 0.0, Polarity::Normal, true) {
                    Ok(pwm) => return Ok(PiPwm::Hardware(pwm)),
                    Err(e) => warn!(
                        "Hardware PWM unavailable on GPIO{} ({}), using software PWM",
                        pin, e
                    ),
                }
            }

            let mut output = self.claim_output(pin)?;
            output
                .set_pwm_frequency(frequency_hz, 0.0)
                .map_err(|e| {
                    DeviceError::gpio_error(format!("Failed to start PWM on GPIO{}: {}", pin, e))
                })?;
            Ok(PiPwm::Software {
                pin: output,
                frequency_hz,
            })
        }

        fn delay(&mut self) -> PiDelay {
            PiDelay::new()
        }
    }
}

// Re-export the appropriate board
#[cfg(feature = "gpio")]
pub use raspberry_pi::{PiPwm, PiPwmError, RaspberryPi, RaspberryPi as DefaultBoard};

#[cfg(not(feature = "gpio"))]
pub use sim::SimulatedBoard as DefaultBoard;

/// Open the board selected at compile time.
#[cfg(feature = "gpio")]
pub fn default_board() -> Result<DefaultBoard> {
    RaspberryPi::new()
}

/// Open the board selected at compile time.
///
/// Without `gpio` this is [`sim::SimulatedBoard::bench`].
#[cfg(not(feature = "gpio"))]
pub fn default_board() -> Result<DefaultBoard> {
    tracing::warn!("GPIO support not compiled, using simulated devices");
    Ok(sim::SimulatedBoard::bench())
}
