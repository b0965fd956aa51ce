//! HTU21D digital relative humidity and temperature sensor (I2C).
//!
//! Measurements use the "no hold master" commands: the command is written,
//! the driver waits for the datasheet's maximum conversion time at the
//! configured resolution, and then reads the two data bytes plus checksum.

use crate::error::{DeviceError, Result};
use crate::readings::ClimateReading;
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Fixed I2C address of the HTU21D.
pub const DEFAULT_ADDRESS: u8 = 0x40;

/// Command bytes
pub mod cmd {
    pub const MEASURE_TEMPERATURE_HOLD: u8 = 0xE3;
    pub const MEASURE_HUMIDITY_HOLD: u8 = 0xE5;
    pub const MEASURE_TEMPERATURE: u8 = 0xF3;
    pub const MEASURE_HUMIDITY: u8 = 0xF5;
    pub const WRITE_USER_REGISTER: u8 = 0xE6;
    pub const READ_USER_REGISTER: u8 = 0xE7;
    pub const SOFT_RESET: u8 = 0xFE;
}

const STATUS_MASK: u16 = 0b11;
const STATUS_HUMIDITY: u8 = 0b10;

const USER_RESOLUTION_MASK: u8 = 0b1000_0001;
const USER_HEATER: u8 = 0b0000_0100;
const USER_END_OF_BATTERY: u8 = 0b0100_0000;

const RESET_TIME_MS: u32 = 15;

/// Measurement resolution pair, selected by user register bits 7 and 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Htu21dResolution {
    /// 12-bit humidity, 14-bit temperature (power-on default)
    #[default]
    Rh12Temp14,
    /// 8-bit humidity, 12-bit temperature
    Rh8Temp12,
    /// 10-bit humidity, 13-bit temperature
    Rh10Temp13,
    /// 11-bit humidity, 11-bit temperature
    Rh11Temp11,
}

impl Htu21dResolution {
    fn register_bits(self) -> u8 {
        match self {
            Self::Rh12Temp14 => 0b0000_0000,
            Self::Rh8Temp12 => 0b0000_0001,
            Self::Rh10Temp13 => 0b1000_0000,
            Self::Rh11Temp11 => 0b1000_0001,
        }
    }

    fn from_register(value: u8) -> Self {
        match value & USER_RESOLUTION_MASK {
            0b0000_0000 => Self::Rh12Temp14,
            0b0000_0001 => Self::Rh8Temp12,
            0b1000_0000 => Self::Rh10Temp13,
            _ => Self::Rh11Temp11,
        }
    }

    /// Maximum temperature conversion time in milliseconds.
    pub fn temperature_time_ms(self) -> u32 {
        match self {
            Self::Rh12Temp14 => 50,
            Self::Rh10Temp13 => 25,
            Self::Rh8Temp12 => 13,
            Self::Rh11Temp11 => 7,
        }
    }

    /// Maximum humidity conversion time in milliseconds.
    pub fn humidity_time_ms(self) -> u32 {
        match self {
            Self::Rh12Temp14 => 16,
            Self::Rh11Temp11 => 8,
            Self::Rh10Temp13 => 5,
            Self::Rh8Temp12 => 3,
        }
    }
}

impl fmt::Display for Htu21dResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Rh12Temp14 => "rh12-t14",
            Self::Rh8Temp12 => "rh8-t12",
            Self::Rh10Temp13 => "rh10-t13",
            Self::Rh11Temp11 => "rh11-t11",
        };
        f.write_str(name)
    }
}

impl FromStr for Htu21dResolution {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rh12-t14" => Ok(Self::Rh12Temp14),
            "rh8-t12" => Ok(Self::Rh8Temp12),
            "rh10-t13" => Ok(Self::Rh10Temp13),
            "rh11-t11" => Ok(Self::Rh11Temp11),
            other => Err(format!(
                "unknown resolution '{}', expected rh12-t14, rh8-t12, rh10-t13 or rh11-t11",
                other
            )),
        }
    }
}

/// CRC-8 used by the HTU21D: polynomial x^8 + x^5 + x^4 + 1, initial value 0.
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            if crc & 0x80 != 0 {
                crc = (crc << 1) ^ 0x31;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// Convert a raw temperature word (status bits cleared) to degrees Celsius.
pub fn raw_to_celsius(raw: u16) -> f32 {
    -46.85 + 175.72 * f32::from(raw) / 65536.0
}

/// Convert a raw humidity word (status bits cleared) to percent relative humidity.
///
/// The linear transfer function can leave the physical range near saturation,
/// so the result is clamped to 0..=100.
pub fn raw_to_relative_humidity(raw: u16) -> f32 {
    (-6.0 + 125.0 * f32::from(raw) / 65536.0).clamp(0.0, 100.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Measurement {
    Temperature,
    Humidity,
}

/// HTU21D driver bound to an I2C bus.
pub struct Htu21d<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
    resolution: Htu21dResolution,
}

impl<I2C, D> Htu21d<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    /// Bind a driver at the default address. No bus traffic is generated.
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self::with_address(i2c, delay, DEFAULT_ADDRESS)
    }

    /// Bind a driver at a custom address (for address translators or muxes).
    pub fn with_address(i2c: I2C, delay: D, address: u8) -> Self {
        Self {
            i2c,
            delay,
            address,
            resolution: Htu21dResolution::default(),
        }
    }

    /// Issue a soft reset and wait for the sensor to come back.
    pub fn reset(&mut self) -> Result<()> {
        self.i2c
            .write(self.address, &[cmd::SOFT_RESET])
            .map_err(DeviceError::i2c)?;
        self.delay.delay_ms(RESET_TIME_MS);
        self.resolution = Htu21dResolution::default();
        debug!(address = self.address, "HTU21D reset");
        Ok(())
    }

    /// Read temperature in degrees Celsius.
    pub fn temperature(&mut self) -> Result<f32> {
        let raw = self.measure(Measurement::Temperature)?;
        Ok(raw_to_celsius(raw))
    }

    /// Read relative humidity in percent.
    pub fn relative_humidity(&mut self) -> Result<f32> {
        let raw = self.measure(Measurement::Humidity)?;
        Ok(raw_to_relative_humidity(raw))
    }

    /// Read temperature, then humidity.
    pub fn read(&mut self) -> Result<ClimateReading> {
        let temperature_celsius = self.temperature()?;
        let relative_humidity = self.relative_humidity()?;
        Ok(ClimateReading::new(temperature_celsius, relative_humidity))
    }

    /// Current resolution as reported by the user register.
    pub fn resolution(&mut self) -> Result<Htu21dResolution> {
        let register = self.read_user_register()?;
        self.resolution = Htu21dResolution::from_register(register);
        Ok(self.resolution)
    }

    /// Change the measurement resolution.
    pub fn set_resolution(&mut self, resolution: Htu21dResolution) -> Result<()> {
        let register = self.read_user_register()?;
        let updated = (register & !USER_RESOLUTION_MASK) | resolution.register_bits();
        self.write_user_register(updated)?;
        self.resolution = resolution;
        Ok(())
    }

    /// Switch the on-chip heater on or off.
    pub fn set_heater(&mut self, enabled: bool) -> Result<()> {
        let register = self.read_user_register()?;
        let updated = if enabled {
            register | USER_HEATER
        } else {
            register & !USER_HEATER
        };
        self.write_user_register(updated)
    }

    /// True when the supply voltage has dropped below 2.25 V.
    pub fn battery_low(&mut self) -> Result<bool> {
        Ok(self.read_user_register()? & USER_END_OF_BATTERY != 0)
    }

    /// Give back the bus and delay provider.
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    fn read_user_register(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(self.address, &[cmd::READ_USER_REGISTER], &mut buf)
            .map_err(DeviceError::i2c)?;
        Ok(buf[0])
    }

    fn write_user_register(&mut self, value: u8) -> Result<()> {
        self.i2c
            .write(self.address, &[cmd::WRITE_USER_REGISTER, value])
            .map_err(DeviceError::i2c)
    }

    fn measure(&mut self, kind: Measurement) -> Result<u16> {
        let (command, wait_ms) = match kind {
            Measurement::Temperature => (
                cmd::MEASURE_TEMPERATURE,
                self.resolution.temperature_time_ms(),
            ),
            Measurement::Humidity => (cmd::MEASURE_HUMIDITY, self.resolution.humidity_time_ms()),
        };

        self.i2c
            .write(self.address, &[command])
            .map_err(DeviceError::i2c)?;
        self.delay.delay_ms(wait_ms);

        let mut data = [0u8; 3];
        self.i2c
            .read(self.address, &mut data)
            .map_err(DeviceError::i2c)?;

        let expected = crc8(&data[..2]);
        if expected != data[2] {
            return Err(DeviceError::Crc {
                expected,
                actual: data[2],
            });
        }

        let status = data[1] & STATUS_MASK as u8;
        let is_humidity = status & STATUS_HUMIDITY != 0;
        if is_humidity != (kind == Measurement::Humidity) {
            return Err(DeviceError::Status(status));
        }

        let raw = u16::from_be_bytes([data[0], data[1]]) & !STATUS_MASK;
        debug!(?kind, raw, "HTU21D measurement");
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::sim::{I2cEvent, SimDelay, SimHtu21d, SimI2c};

    fn sensor(device: SimHtu21d) -> Htu21d<SimI2c, SimDelay> {
        let bus = SimI2c::new().with_device(DEFAULT_ADDRESS, device);
        Htu21d::new(bus, SimDelay::default())
    }

    #[test]
    fn test_crc8_datasheet_vector() {
        // Datasheet example: 0x683A -> CRC 0x7C
        assert_eq!(crc8(&[0x68, 0x3A]), 0x7C);
        assert_eq!(crc8(&[0x4E, 0x85]), 0x6B);
    }

    #[test]
    fn test_conversions() {
        assert!((raw_to_celsius(0x683A & 0xFFFC) - 24.68).abs() < 0.01);
        assert!((raw_to_relative_humidity(0x4E84) - 32.33).abs() < 0.01);
        assert_eq!(raw_to_relative_humidity(0xFFFC), 100.0);
        assert_eq!(raw_to_relative_humidity(0x0000), 0.0);
    }

    #[test]
    fn test_temperature_waits_for_conversion() {
        let mut htu = sensor(SimHtu21d::new(0x683A, 0x4E84));
        let celsius = htu.temperature().unwrap();
        assert_eq!(celsius, raw_to_celsius(0x6838));

        let (bus, delay) = htu.release();
        assert!(delay.elapsed_ms() >= 50);
        assert_eq!(
            bus.events()[0],
            I2cEvent::Write {
                address: DEFAULT_ADDRESS,
                bytes: vec![cmd::MEASURE_TEMPERATURE],
            }
        );
    }

    #[test]
    fn test_read_returns_both_values() {
        let mut htu = sensor(SimHtu21d::new(0x683A, 0x4E84));
        let reading = htu.read().unwrap();
        assert_eq!(reading.temperature_celsius, raw_to_celsius(0x6838));
        assert_eq!(reading.relative_humidity, raw_to_relative_humidity(0x4E84));
    }

    #[test]
    fn test_crc_mismatch_is_reported() {
        let mut htu = sensor(SimHtu21d::new(0x683A, 0x4E84).with_corrupt_crc());
        assert!(matches!(htu.temperature(), Err(DeviceError::Crc { .. })));
    }

    #[test]
    fn test_resolution_round_trip_shortens_wait() {
        let mut htu = sensor(SimHtu21d::default());
        htu.set_resolution(Htu21dResolution::Rh11Temp11).unwrap();
        assert_eq!(htu.resolution().unwrap(), Htu21dResolution::Rh11Temp11);

        htu.temperature().unwrap();
        let (_, delay) = htu.release();
        assert_eq!(delay.elapsed_ms(), 7);
    }

    #[test]
    fn test_heater_bit() {
        let mut htu = sensor(SimHtu21d::default());
        htu.set_heater(true).unwrap();
        let (bus, _) = htu.release();
        let writes = bus.writes_to(DEFAULT_ADDRESS);
        let last = writes.last().unwrap();
        assert_eq!(last[0], cmd::WRITE_USER_REGISTER);
        assert_ne!(last[1] & USER_HEATER, 0);
    }

    #[test]
    fn test_status_mismatch_is_reported() {
        let mut htu = sensor(SimHtu21d::default().with_wrong_status());
        assert!(matches!(htu.temperature(), Err(DeviceError::Status(0b10))));
        assert!(matches!(
            htu.relative_humidity(),
            Err(DeviceError::Status(0b00))
        ));
    }

    #[test]
    fn test_reset_restores_default_resolution() {
        let mut htu = sensor(SimHtu21d::default());
        htu.set_resolution(Htu21dResolution::Rh11Temp11).unwrap();
        htu.reset().unwrap();
        assert_eq!(htu.resolution().unwrap(), Htu21dResolution::Rh12Temp14);

        // Reset settle time plus a full 14-bit conversion
        htu.temperature().unwrap();
        let (bus, delay) = htu.release();
        assert_eq!(delay.elapsed_ms(), u64::from(RESET_TIME_MS + 50));
        assert!(bus
            .writes_to(DEFAULT_ADDRESS)
            .contains(&vec![cmd::SOFT_RESET]));
    }

    #[test]
    fn test_battery_low_flag() {
        let mut htu = sensor(SimHtu21d::default());
        assert!(!htu.battery_low().unwrap());

        let mut htu = sensor(SimHtu21d::default().with_battery_low());
        assert!(htu.battery_low().unwrap());
        // Read-only bit, unaffected by heater writes
        htu.set_heater(true).unwrap();
        assert!(htu.battery_low().unwrap());
    }

    #[test]
    fn test_heater_can_be_switched_off() {
        let mut htu = sensor(SimHtu21d::default());
        htu.set_heater(true).unwrap();
        htu.set_heater(false).unwrap();
        let (bus, _) = htu.release();
        let writes = bus.writes_to(DEFAULT_ADDRESS);
        assert_eq!(writes.last().unwrap()[1] & USER_HEATER, 0);
    }

    #[test]
    fn test_resolution_parsing() {
        assert_eq!(
            "RH8-T12".parse::<Htu21dResolution>().unwrap(),
            Htu21dResolution::Rh8Temp12
        );
        assert!("14bit".parse::<Htu21dResolution>().is_err());
        assert_eq!(Htu21dResolution::Rh10Temp13.to_string(), "rh10-t13");
    }
}
