//! MAX31865 RTD-to-digital converter (SPI mode 1).
//!
//! Reads a platinum RTD (PT100 by default) against a reference resistor and
//! converts the ratio to degrees Celsius with the Callendar–Van Dusen equation.

use crate::error::{DeviceError, Result};
use crate::readings::RtdReading;
use embedded_hal::delay::DelayNs;
use embedded_hal::spi::{Operation, SpiDevice};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Register addresses
pub mod reg {
    pub const CONFIG: u8 = 0x00;
    pub const RTD_MSB: u8 = 0x01;
    pub const HIGH_FAULT_MSB: u8 = 0x03;
    pub const LOW_FAULT_MSB: u8 = 0x05;
    pub const FAULT_STATUS: u8 = 0x07;

    /// Set on the address byte for register writes.
    pub const WRITE: u8 = 0x80;
}

/// Configuration register bits
pub mod config {
    pub const BIAS: u8 = 0x80;
    pub const AUTO_CONVERT: u8 = 0x40;
    pub const ONE_SHOT: u8 = 0x20;
    pub const THREE_WIRE: u8 = 0x10;
    pub const FAULT_DETECT: u8 = 0x0C;
    pub const FAULT_CLEAR: u8 = 0x02;
    pub const FILTER_50HZ: u8 = 0x01;
}

const BIAS_SETTLE_MS: u32 = 10;
const ONE_SHOT_MS: u32 = 65;

const RTD_A: f64 = 3.9083e-3;
const RTD_B: f64 = -5.775e-7;

/// Nominal resistance of a PT100 element.
pub const PT100_NOMINAL_OHMS: f64 = 100.0;
/// Reference resistor fitted to PT100 breakout boards.
pub const PT100_REFERENCE_OHMS: f64 = 430.0;

/// RTD connection scheme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Wiring {
    #[default]
    TwoWire,
    ThreeWire,
    FourWire,
}

impl Wiring {
    /// Number of wires between the converter and the element.
    pub fn wires(self) -> u8 {
        match self {
            Self::TwoWire => 2,
            Self::ThreeWire => 3,
            Self::FourWire => 4,
        }
    }

    pub fn from_wires(wires: u8) -> Option<Self> {
        match wires {
            2 => Some(Self::TwoWire),
            3 => Some(Self::ThreeWire),
            4 => Some(Self::FourWire),
            _ => None,
        }
    }
}

impl fmt::Display for Wiring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.wires())
    }
}

impl FromStr for Wiring {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.parse::<u8>()
            .ok()
            .and_then(Self::from_wires)
            .ok_or_else(|| format!("invalid wire count '{}', expected 2, 3 or 4", s))
    }
}

/// Mains rejection filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterFrequency {
    Hz50,
    #[default]
    Hz60,
}

impl fmt::Display for FilterFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hz50 => f.write_str("50"),
            Self::Hz60 => f.write_str("60"),
        }
    }
}

impl FromStr for FilterFrequency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim_end_matches("Hz").trim_end_matches("hz") {
            "50" => Ok(Self::Hz50),
            "60" => Ok(Self::Hz60),
            other => Err(format!("invalid filter '{}', expected 50 or 60", other)),
        }
    }
}

/// Decoded fault status register.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultStatus {
    /// RTD code above the high fault threshold
    pub high_threshold: bool,
    /// RTD code below the low fault threshold
    pub low_threshold: bool,
    /// REFIN- > 0.85 x VBIAS
    pub refin_high: bool,
    /// REFIN- < 0.85 x VBIAS (FORCE- open)
    pub refin_low: bool,
    /// RTDIN- < 0.85 x VBIAS (FORCE- open)
    pub rtdin_low: bool,
    /// Over- or under-voltage on an input
    pub over_under_voltage: bool,
}

impl FaultStatus {
    pub fn from_register(value: u8) -> Self {
        Self {
            high_threshold: value & 0x80 != 0,
            low_threshold: value & 0x40 != 0,
            refin_high: value & 0x20 != 0,
            refin_low: value & 0x10 != 0,
            rtdin_low: value & 0x08 != 0,
            over_under_voltage: value & 0x04 != 0,
        }
    }

    pub fn to_register(self) -> u8 {
        let mut value = 0;
        for (set, bit) in [
            (self.high_threshold, 0x80),
            (self.low_threshold, 0x40),
            (self.refin_high, 0x20),
            (self.refin_low, 0x10),
            (self.rtdin_low, 0x08),
            (self.over_under_voltage, 0x04),
        ] {
            if set {
                value |= bit;
            }
        }
        value
    }

    /// True when no fault bit is set.
    pub fn is_clear(&self) -> bool {
        self.to_register() == 0
    }
}

impl fmt::Display for FaultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (self.high_threshold, "RTD high threshold"),
            (self.low_threshold, "RTD low threshold"),
            (self.refin_high, "REFIN- > 0.85 x VBIAS"),
            (self.refin_low, "REFIN- < 0.85 x VBIAS (FORCE- open)"),
            (self.rtdin_low, "RTDIN- < 0.85 x VBIAS (FORCE- open)"),
            (self.over_under_voltage, "over/under voltage"),
        ];
        let active: Vec<&str> = names
            .iter()
            .filter(|(set, _)| *set)
            .map(|(_, name)| *name)
            .collect();
        if active.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&active.join(", "))
        }
    }
}

/// Resistance for a 15-bit conversion code.
pub fn code_to_resistance(code: u16, reference_ohms: f64) -> f64 {
    f64::from(code) * reference_ohms / 32768.0
}

/// Temperature for an RTD resistance.
///
/// Uses the quadratic Callendar–Van Dusen solution above 0 °C and a
/// fifth-order polynomial fit below it.
pub fn resistance_to_celsius(resistance: f64, nominal_ohms: f64) -> f64 {
    let z1 = -RTD_A;
    let z2 = RTD_A * RTD_A - 4.0 * RTD_B;
    let z3 = 4.0 * RTD_B / nominal_ohms;
    let z4 = 2.0 * RTD_B;

    let temperature = ((z2 + z3 * resistance).sqrt() + z1) / z4;
    if temperature >= 0.0 {
        return temperature;
    }

    let normalized = resistance / nominal_ohms * 100.0;
    let mut rpoly = normalized;
    let mut temperature = -242.02;
    temperature += 2.2228 * rpoly;
    rpoly *= normalized;
    temperature += 2.5859e-3 * rpoly;
    rpoly *= normalized;
    temperature -= 4.8260e-6 * rpoly;
    rpoly *= normalized;
    temperature -= 2.8183e-8 * rpoly;
    rpoly *= normalized;
    temperature += 1.5243e-10 * rpoly;
    temperature
}

/// MAX31865 driver bound to an SPI device.
pub struct Max31865<SPI, D> {
    spi: SPI,
    delay: D,
    nominal_ohms: f64,
    reference_ohms: f64,
}

impl<SPI, D> Max31865<SPI, D>
where
    SPI: SpiDevice,
    D: DelayNs,
{
    /// Bind a PT100 converter and configure wiring and filter.
    pub fn new(spi: SPI, delay: D, wiring: Wiring, filter: FilterFrequency) -> Result<Self> {
        Self::with_element(
            spi,
            delay,
            wiring,
            filter,
            PT100_NOMINAL_OHMS,
            PT100_REFERENCE_OHMS,
        )
    }

    /// Bind a converter with a custom RTD element and reference resistor.
    pub fn with_element(
        spi: SPI,
        delay: D,
        wiring: Wiring,
        filter: FilterFrequency,
        nominal_ohms: f64,
        reference_ohms: f64,
    ) -> Result<Self> {
        if nominal_ohms <= 0.0 || reference_ohms <= 0.0 {
            return Err(DeviceError::config_error(format!(
                "RTD nominal ({}) and reference ({}) resistance must be positive",
                nominal_ohms, reference_ohms
            )));
        }

        let mut device = Self {
            spi,
            delay,
            nominal_ohms,
            reference_ohms,
        };

        let mut value = device.read_register(reg::CONFIG)?;
        if wiring == Wiring::ThreeWire {
            value |= config::THREE_WIRE;
        } else {
            value &= !config::THREE_WIRE;
        }
        if filter == FilterFrequency::Hz50 {
            value |= config::FILTER_50HZ;
        } else {
            value &= !config::FILTER_50HZ;
        }
        device.write_register(reg::CONFIG, value)?;
        device.clear_faults()?;

        debug!(wires = wiring.wires(), %filter, "MAX31865 configured");
        Ok(device)
    }

    /// Read the decoded fault status register.
    pub fn fault(&mut self) -> Result<FaultStatus> {
        Ok(FaultStatus::from_register(
            self.read_register(reg::FAULT_STATUS)?,
        ))
    }

    /// Clear latched faults.
    pub fn clear_faults(&mut self) -> Result<()> {
        let value = self.read_register(reg::CONFIG)?;
        let value = (value & !(config::FAULT_DETECT | config::ONE_SHOT)) | config::FAULT_CLEAR;
        self.write_register(reg::CONFIG, value)
    }

    /// Enable or disable continuous conversions.
    pub fn set_auto_convert(&mut self, enabled: bool) -> Result<()> {
        let value = self.read_register(reg::CONFIG)?;
        let value = if enabled {
            value | config::AUTO_CONVERT | config::BIAS
        } else {
            value & !(config::AUTO_CONVERT | config::BIAS)
        };
        self.write_register(reg::CONFIG, value)
    }

    /// Set the low and high fault thresholds as 15-bit codes.
    pub fn set_thresholds(&mut self, low: u16, high: u16) -> Result<()> {
        if low > 0x7FFF || high > 0x7FFF || low > high {
            return Err(DeviceError::out_of_range(format!(
                "fault thresholds must satisfy low <= high <= 0x7FFF (got {:#06x}, {:#06x})",
                low, high
            )));
        }
        let [high_msb, high_lsb] = (high << 1).to_be_bytes();
        let [low_msb, low_lsb] = (low << 1).to_be_bytes();
        self.spi
            .write(&[reg::HIGH_FAULT_MSB | reg::WRITE, high_msb, high_lsb, low_msb, low_lsb])
            .map_err(DeviceError::spi)
    }

    /// Current (low, high) fault thresholds as 15-bit codes.
    pub fn thresholds(&mut self) -> Result<(u16, u16)> {
        let mut buf = [0u8; 4];
        self.read_registers(reg::HIGH_FAULT_MSB, &mut buf)?;
        let high = u16::from_be_bytes([buf[0], buf[1]]) >> 1;
        let low = u16::from_be_bytes([buf[2], buf[3]]) >> 1;
        Ok((low, high))
    }

    /// Run a one-shot conversion and return the raw register word.
    ///
    /// Bit 0 of the returned word is the fault flag.
    pub fn read_rtd_register(&mut self) -> Result<u16> {
        self.clear_faults()?;
        self.set_bias(true)?;
        self.delay.delay_ms(BIAS_SETTLE_MS);

        let value = self.read_register(reg::CONFIG)?;
        self.write_register(reg::CONFIG, value | config::ONE_SHOT)?;
        self.delay.delay_ms(ONE_SHOT_MS);

        let mut buf = [0u8; 2];
        self.read_registers(reg::RTD_MSB, &mut buf)?;
        self.set_bias(false)?;
        Ok(u16::from_be_bytes(buf))
    }

    /// Run a conversion and return the 15-bit code, ignoring the fault flag.
    pub fn read_rtd(&mut self) -> Result<u16> {
        Ok(self.read_rtd_register()? >> 1)
    }

    /// RTD resistance in ohms.
    pub fn resistance(&mut self) -> Result<f64> {
        let code = self.read_rtd()?;
        Ok(code_to_resistance(code, self.reference_ohms))
    }

    /// RTD temperature in degrees Celsius.
    pub fn temperature(&mut self) -> Result<f64> {
        let resistance = self.resistance()?;
        Ok(resistance_to_celsius(resistance, self.nominal_ohms))
    }

    /// Run one conversion, failing if the converter flags a fault.
    pub fn read(&mut self) -> Result<RtdReading> {
        let word = self.read_rtd_register()?;
        if word & 0x0001 != 0 {
            let status = self.fault()?;
            warn!(%status, "MAX31865 reported a fault");
            self.clear_faults()?;
            return Err(DeviceError::RtdFault(status));
        }

        let code = word >> 1;
        let resistance = code_to_resistance(code, self.reference_ohms);
        let celsius = resistance_to_celsius(resistance, self.nominal_ohms);
        debug!(code, resistance, celsius, "MAX31865 conversion");
        Ok(RtdReading::new(code, resistance, celsius))
    }

    /// Give back the SPI device and delay provider.
    pub fn release(self) -> (SPI, D) {
        (self.spi, self.delay)
    }

    fn set_bias(&mut self, enabled: bool) -> Result<()> {
        let value = self.read_register(reg::CONFIG)?;
        let value = if enabled {
            value | config::BIAS
        } else {
            value & !config::BIAS
        };
        self.write_register(reg::CONFIG, value)
    }

    fn read_register(&mut self, address: u8) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_registers(address, &mut buf)?;
        Ok(buf[0])
    }

    fn read_registers(&mut self, address: u8, buf: &mut [u8]) -> Result<()> {
        self.spi
            .transaction(&mut [
                Operation::Write(&[address & !reg::WRITE]),
                Operation::Read(buf),
            ])
            .map_err(DeviceError::spi)
    }

    fn write_register(&mut self, address: u8, value: u8) -> Result<()> {
        self.spi
            .write(&[address | reg::WRITE, value])
            .map_err(DeviceError::spi)
    }
}
