//! MCP3422/3/4 delta-sigma ADC (I2C).
//!
//! The converter is driven in one-shot mode: writing the configuration byte
//! with the RDY bit set starts a conversion, and the RDY bit in the returned
//! configuration byte reads 0 once the output register holds the new result.

use crate::error::{DeviceError, Result};
use crate::readings::{timestamp_ms, AdcReading};
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, trace};

/// Lowest address selectable with the Adr0/Adr1 pins.
pub const MIN_ADDRESS: u8 = 0x68;
/// Highest address selectable with the Adr0/Adr1 pins.
pub const MAX_ADDRESS: u8 = 0x6F;
/// Number of differential inputs on the MCP3424.
pub const CHANNELS: u8 = 4;

const READY: u8 = 0x80;
const CONTINUOUS: u8 = 0x10;
const REFERENCE_VOLTS: f64 = 2.048;

/// Maximum number of output register polls after the expected conversion time.
pub const MAX_POLLS: u32 = 50;

/// Sample rate / resolution selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    /// 12 bits at 240 samples per second
    #[default]
    Bits12,
    /// 14 bits at 60 samples per second
    Bits14,
    /// 16 bits at 15 samples per second
    Bits16,
    /// 18 bits at 3.75 samples per second
    Bits18,
}

impl Resolution {
    pub fn bits(self) -> u8 {
        match self {
            Self::Bits12 => 12,
            Self::Bits14 => 14,
            Self::Bits16 => 16,
            Self::Bits18 => 18,
        }
    }

    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            12 => Some(Self::Bits12),
            14 => Some(Self::Bits14),
            16 => Some(Self::Bits16),
            18 => Some(Self::Bits18),
            _ => None,
        }
    }

    /// Decode bits 3..2 of a configuration byte.
    pub fn from_config(config: u8) -> Self {
        match (config >> 2) & 0b11 {
            0b00 => Self::Bits12,
            0b01 => Self::Bits14,
            0b10 => Self::Bits16,
            _ => Self::Bits18,
        }
    }

    fn config_bits(self) -> u8 {
        let field = match self {
            Self::Bits12 => 0b00,
            Self::Bits14 => 0b01,
            Self::Bits16 => 0b10,
            Self::Bits18 => 0b11,
        };
        field << 2
    }

    pub fn samples_per_second(self) -> f64 {
        match self {
            Self::Bits12 => 240.0,
            Self::Bits14 => 60.0,
            Self::Bits16 => 15.0,
            Self::Bits18 => 3.75,
        }
    }

    /// Nominal conversion time in microseconds.
    pub fn conversion_time_us(self) -> u32 {
        (1_000_000.0 / self.samples_per_second()).ceil() as u32
    }

    /// Weight of one output code in volts at unity gain.
    pub fn lsb_volts(self) -> f64 {
        2.0 * REFERENCE_VOLTS / f64::from(1u32 << self.bits())
    }

    /// Bytes returned by a read: data bytes followed by the configuration byte.
    fn read_len(self) -> usize {
        match self {
            Self::Bits18 => 4,
            _ => 3,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.parse::<u8>()
            .ok()
            .and_then(Self::from_bits)
            .ok_or_else(|| format!("invalid resolution '{}', expected 12, 14, 16 or 18", s))
    }
}

/// Programmable gain amplifier setting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gain {
    #[default]
    X1,
    X2,
    X4,
    X8,
}

impl Gain {
    pub fn factor(self) -> u8 {
        match self {
            Self::X1 => 1,
            Self::X2 => 2,
            Self::X4 => 4,
            Self::X8 => 8,
        }
    }

    pub fn from_factor(factor: u8) -> Option<Self> {
        match factor {
            1 => Some(Self::X1),
            2 => Some(Self::X2),
            4 => Some(Self::X4),
            8 => Some(Self::X8),
            _ => None,
        }
    }

    /// Decode bits 1..0 of a configuration byte.
    pub fn from_config(config: u8) -> Self {
        match config & 0b11 {
            0b00 => Self::X1,
            0b01 => Self::X2,
            0b10 => Self::X4,
            _ => Self::X8,
        }
    }

    fn config_bits(self) -> u8 {
        match self {
            Self::X1 => 0b00,
            Self::X2 => 0b01,
            Self::X4 => 0b10,
            Self::X8 => 0b11,
        }
    }
}

impl fmt::Display for Gain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.factor())
    }
}

impl FromStr for Gain {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim_start_matches(['x', 'X'])
            .parse::<u8>()
            .ok()
            .and_then(Self::from_factor)
            .ok_or_else(|| format!("invalid gain '{}', expected 1, 2, 4 or 8", s))
    }
}

/// Sign-extend the data bytes of a read into an output code.
pub fn decode_count(resolution: Resolution, data: &[u8]) -> i32 {
    let (raw, sign_bit) = match resolution {
        Resolution::Bits18 => (
            (i32::from(data[0] & 0x03) << 16) | (i32::from(data[1]) << 8) | i32::from(data[2]),
            1 << 17,
        ),
        Resolution::Bits16 => (
            (i32::from(data[0]) << 8) | i32::from(data[1]),
            1 << 15,
        ),
        Resolution::Bits14 => (
            (i32::from(data[0] & 0x3F) << 8) | i32::from(data[1]),
            1 << 13,
        ),
        Resolution::Bits12 => (
            (i32::from(data[0] & 0x0F) << 8) | i32::from(data[1]),
            1 << 11,
        ),
    };
    if raw & sign_bit != 0 {
        raw - (sign_bit << 1)
    } else {
        raw
    }
}

/// MCP342x driver bound to one input channel.
pub struct Mcp342x<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
    channel: u8,
    resolution: Resolution,
    gain: Gain,
    scale_factor: f64,
    offset: f64,
}

impl<I2C, D> Mcp342x<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    /// Bind a converter channel. No bus traffic is generated.
    pub fn new(
        i2c: I2C,
        delay: D,
        address: u8,
        channel: u8,
        resolution: Resolution,
    ) -> Result<Self> {
        if !(MIN_ADDRESS..=MAX_ADDRESS).contains(&address) {
            return Err(DeviceError::config_error(format!(
                "MCP342x address {:#04x} outside {:#04x}..={:#04x}",
                address, MIN_ADDRESS, MAX_ADDRESS
            )));
        }
        if channel >= CHANNELS {
            return Err(DeviceError::config_error(format!(
                "MCP342x channel {} outside 0..{}",
                channel, CHANNELS
            )));
        }

        Ok(Self {
            i2c,
            delay,
            address,
            channel,
            resolution,
            gain: Gain::default(),
            scale_factor: 1.0,
            offset: 0.0,
        })
    }

    /// Select the PGA gain.
    pub fn with_gain(mut self, gain: Gain) -> Self {
        self.gain = gain;
        self
    }

    /// Apply `voltage * scale_factor + offset` to every reading.
    pub fn with_scaling(mut self, scale_factor: f64, offset: f64) -> Self {
        self.scale_factor = scale_factor;
        self.offset = offset;
        self
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn gain(&self) -> Gain {
        self.gain
    }

    /// Configuration byte for a one-shot conversion on this channel.
    pub fn config_byte(&self) -> u8 {
        (self.channel << 5) | self.resolution.config_bits() | self.gain.config_bits()
    }

    /// Start a one-shot conversion.
    pub fn convert(&mut self) -> Result<()> {
        let config = (self.config_byte() & !CONTINUOUS) | READY;
        trace!(address = self.address, config, "MCP342x start conversion");
        self.i2c
            .write(self.address, &[config])
            .map_err(DeviceError::i2c)
    }

    /// Read the output register once.
    ///
    /// Returns `None` while the conversion is still in progress.
    pub fn raw_read(&mut self) -> Result<Option<i32>> {
        let mut buf = [0u8; 4];
        let len = self.resolution.read_len();
        self.i2c
            .read(self.address, &mut buf[..len])
            .map_err(DeviceError::i2c)?;

        let config = buf[len - 1];
        if config & READY != 0 {
            return Ok(None);
        }
        Ok(Some(decode_count(self.resolution, &buf[..len - 1])))
    }

    /// Scaled voltage for an output code.
    pub fn count_to_voltage(&self, count: i32) -> f64 {
        let volts = f64::from(count) * self.resolution.lsb_volts() / f64::from(self.gain.factor());
        volts * self.scale_factor + self.offset
    }

    /// Start a conversion, wait for it, and read the result.
    pub fn convert_and_read(&mut self) -> Result<AdcReading> {
        self.convert()?;

        let conversion_us = self.resolution.conversion_time_us();
        self.delay.delay_us(conversion_us / 100 * 95);

        let poll_us = (conversion_us / 20).max(100);
        for attempt in 1..=MAX_POLLS {
            if let Some(count) = self.raw_read()? {
                let voltage = self.count_to_voltage(count);
                debug!(
                    address = self.address,
                    channel = self.channel,
                    count,
                    voltage,
                    attempt,
                    "MCP342x conversion"
                );
                return Ok(AdcReading {
                    timestamp: timestamp_ms(),
                    address: self.address,
                    channel: self.channel,
                    resolution_bits: self.resolution.bits(),
                    gain: self.gain.factor(),
                    count,
                    voltage,
                });
            }
            self.delay.delay_us(poll_us);
        }

        Err(DeviceError::NotReady(MAX_POLLS))
    }

    /// Give back the bus and delay provider.
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::sim::{SimDelay, SimI2c, SimMcp342x};

    const ADDRESS: u8 = 0x68;

    fn adc(sim: SimMcp342x, channel: u8, resolution: Resolution) -> Mcp342x<SimI2c, SimDelay> {
        let bus = SimI2c::new().with_device(ADDRESS, sim);
        Mcp342x::new(bus, SimDelay::default(), ADDRESS, channel, resolution).unwrap()
    }

    #[test]
    fn test_config_byte_layout() {
        let adc = adc(SimMcp342x::default(), 2, Resolution::Bits16);
        let adc = adc.with_gain(Gain::X4);
        assert_eq!(adc.config_byte(), 0b0100_1010);
    }

    #[test]
    fn test_decode_count_sign_extension() {
        assert_eq!(decode_count(Resolution::Bits12, &[0x07, 0xFF]), 2047);
        assert_eq!(decode_count(Resolution::Bits12, &[0xF8, 0x00]), -2048);
        assert_eq!(decode_count(Resolution::Bits14, &[0xFF, 0xFF]), -1);
        assert_eq!(decode_count(Resolution::Bits16, &[0x80, 0x00]), -32768);
        assert_eq!(decode_count(Resolution::Bits18, &[0x01, 0xFF, 0xFF]), 131071);
        assert_eq!(decode_count(Resolution::Bits18, &[0xFE, 0x00, 0x00]), -131072);
    }

    #[test]
    fn test_lsb_weights() {
        assert!((Resolution::Bits12.lsb_volts() - 1e-3).abs() < 1e-12);
        assert!((Resolution::Bits18.lsb_volts() - 15.625e-6).abs() < 1e-12);
    }

    #[test]
    fn test_convert_and_read_18_bit() {
        let sim = SimMcp342x::default().with_voltage(0, 1.0);
        let mut adc = adc(sim, 0, Resolution::Bits18);
        let reading = adc.convert_and_read().unwrap();
        assert_eq!(reading.resolution_bits, 18);
        assert_eq!(reading.count, 64000);
        assert!((reading.voltage - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_polls_until_ready() {
        let sim = SimMcp342x::default()
            .with_voltage(1, -0.5)
            .with_not_ready_reads(3);
        let mut adc = adc(sim, 1, Resolution::Bits12);
        let reading = adc.convert_and_read().unwrap();
        assert_eq!(reading.count, -500);
    }

    #[test]
    fn test_not_ready_gives_up() {
        let sim = SimMcp342x::default().with_not_ready_reads(MAX_POLLS + 1);
        let mut adc = adc(sim, 0, Resolution::Bits14);
        assert!(matches!(
            adc.convert_and_read(),
            Err(DeviceError::NotReady(MAX_POLLS))
        ));
    }

    #[test]
    fn test_gain_and_scaling() {
        let sim = SimMcp342x::default().with_voltage(3, 0.25);
        let mut adc = adc(sim, 3, Resolution::Bits16)
            .with_gain(Gain::X2)
            .with_scaling(2.0, 0.1);
        let reading = adc.convert_and_read().unwrap();
        assert_eq!(reading.gain, 2);
        assert!((reading.voltage - 0.6).abs() < 1e-3);
    }

    #[test]
    fn test_rejects_bad_binding() {
        let bus = SimI2c::new();
        assert!(Mcp342x::new(bus, SimDelay::default(), 0x40, 0, Resolution::Bits12).is_err());
        let bus = SimI2c::new();
        assert!(Mcp342x::new(bus, SimDelay::default(), ADDRESS, 4, Resolution::Bits12).is_err());
    }

    #[test]
    fn test_parsing() {
        assert_eq!("18".parse::<Resolution>().unwrap(), Resolution::Bits18);
        assert!("10".parse::<Resolution>().is_err());
        assert_eq!("x8".parse::<Gain>().unwrap(), Gain::X8);
    }
}
