//! Data structures for measurement results and applied outputs.
//!
//! `Display` renders the same lines the bench scripts print; `serde` renders
//! JSON for the `--format json` output of the binary.

use crate::devices::output::Level;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Current Unix timestamp in milliseconds.
pub fn timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Temperature and humidity from an HTU21D.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClimateReading {
    /// Timestamp when this reading was taken (Unix timestamp in milliseconds)
    pub timestamp: u64,
    /// Temperature in Celsius
    pub temperature_celsius: f32,
    /// Relative humidity in percent (0.0 to 100.0)
    pub relative_humidity: f32,
}

impl ClimateReading {
    pub fn new(temperature_celsius: f32, relative_humidity: f32) -> Self {
        Self {
            timestamp: timestamp_ms(),
            temperature_celsius,
            relative_humidity,
        }
    }
}

impl fmt::Display for ClimateReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Temperature: {:.1} °C", self.temperature_celsius)?;
        write!(f, "Humidity: {:.1} %", self.relative_humidity)
    }
}

/// Temperature and resistance from a MAX31865 RTD converter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RtdReading {
    /// Timestamp when this reading was taken (Unix timestamp in milliseconds)
    pub timestamp: u64,
    /// Temperature in Celsius
    pub temperature_celsius: f64,
    /// RTD resistance in ohms
    pub resistance_ohms: f64,
    /// 15-bit conversion code with the fault flag removed
    pub code: u16,
}

impl RtdReading {
    pub fn new(code: u16, resistance_ohms: f64, temperature_celsius: f64) -> Self {
        Self {
            timestamp: timestamp_ms(),
            temperature_celsius,
            resistance_ohms,
            code,
        }
    }
}

impl fmt::Display for RtdReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Temperature: {:.3}C", self.temperature_celsius)?;
        write!(f, "Resistance: {:.3} Ohms", self.resistance_ohms)
    }
}

/// Single conversion result from an MCP342x ADC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdcReading {
    /// Timestamp when this reading was taken (Unix timestamp in milliseconds)
    pub timestamp: u64,
    /// I2C address of the converter
    pub address: u8,
    /// Input channel (0-3)
    pub channel: u8,
    /// Conversion resolution in bits
    pub resolution_bits: u8,
    /// Programmable gain
    pub gain: u8,
    /// Signed output code
    pub count: i32,
    /// Scaled input voltage
    pub voltage: f64,
}

impl fmt::Display for AdcReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Channel {} @ {:#04x} ({}-bit, x{})",
            self.channel, self.address, self.resolution_bits, self.gain
        )?;
        writeln!(f, "Count: {}", self.count)?;
        write!(f, "Voltage: {:.6} V", self.voltage)
    }
}

/// Duty cycle applied to a PCA9685 channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PwmSetting {
    /// Timestamp when the setting was applied (Unix timestamp in milliseconds)
    pub timestamp: u64,
    /// Output channel (0-15)
    pub channel: u8,
    /// PWM frequency read back from the prescaler
    pub frequency_hz: f64,
    /// Duty cycle (0 to 0xFFFF)
    pub duty_cycle: u16,
}

impl PwmSetting {
    pub fn new(channel: u8, frequency_hz: f64, duty_cycle: u16) -> Self {
        Self {
            timestamp: timestamp_ms(),
            channel,
            frequency_hz,
            duty_cycle,
        }
    }
}

impl fmt::Display for PwmSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Channel: {}", self.channel)?;
        writeln!(f, "Frequency: {:.1} Hz", self.frequency_hz)?;
        write!(
            f,
            "Duty cycle: {:#06x} ({:.1}%)",
            self.duty_cycle,
            f64::from(self.duty_cycle) * 100.0 / f64::from(u16::MAX)
        )
    }
}

/// State applied to a GPIO output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSetting {
    /// Timestamp when the setting was applied (Unix timestamp in milliseconds)
    pub timestamp: u64,
    /// BCM pin number
    pub pin: u8,
    /// Digital level, if driven as a plain output
    pub level: Option<Level>,
    /// PWM frequency, if driven as a PWM output
    pub frequency_hz: Option<f64>,
    /// PWM duty cycle in percent, if driven as a PWM output
    pub duty_percent: Option<f32>,
}

impl OutputSetting {
    pub fn digital(pin: u8, level: Level) -> Self {
        Self {
            timestamp: timestamp_ms(),
            pin,
            level: Some(level),
            frequency_hz: None,
            duty_percent: None,
        }
    }

    pub fn pwm(pin: u8, frequency_hz: f64, duty_percent: f32) -> Self {
        Self {
            timestamp: timestamp_ms(),
            pin,
            level: None,
            frequency_hz: Some(frequency_hz),
            duty_percent: Some(duty_percent),
        }
    }
}

impl fmt::Display for OutputSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GPIO{}:", self.pin)?;
        if let Some(level) = self.level {
            write!(f, " {}", level)?;
        }
        if let (Some(frequency), Some(duty)) = (self.frequency_hz, self.duty_percent) {
            write!(f, " PWM {:.0} Hz, {:.1}% duty", frequency, duty)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_climate_display_precision() {
        let reading = ClimateReading::new(24.6864, 32.3377);
        assert_eq!(reading.to_string(), "Temperature: 24.7 °C\nHumidity: 32.3 %");
    }

    #[test]
    fn test_rtd_display_precision() {
        let reading = RtdReading::new(8263, 108.4411, 21.6789);
        assert_eq!(
            reading.to_string(),
            "Temperature: 21.679C\nResistance: 108.441 Ohms"
        );
    }

    #[test]
    fn test_output_display() {
        let setting = OutputSetting::digital(18, Level::High);
        assert_eq!(setting.to_string(), "GPIO18: high");

        let setting = OutputSetting::pwm(18, 1000.0, 25.0);
        assert_eq!(setting.to_string(), "GPIO18: PWM 1000 Hz, 25.0% duty");
    }

    #[test]
    fn test_timestamp_is_set() {
        assert!(timestamp_ms() > 0);
        assert!(ClimateReading::new(0.0, 0.0).timestamp > 0);
    }
}
