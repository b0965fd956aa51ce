//! GPIO outputs: a switched load (digital level) and a dimmed load (PWM).
//!
//! The bench setup drives an IRF520 MOSFET module from a single pin, first as
//! a plain on/off output and then as a PWM output.

use crate::error::{DeviceError, Result};
use embedded_hal::digital::OutputPin;
use embedded_hal::pwm::SetDutyCycle;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Logic level of a digital output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Low,
    High,
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Self::High
        } else {
            Self::Low
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => f.write_str("low"),
            Self::High => f.write_str("high"),
        }
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "high" | "on" | "1" => Ok(Self::High),
            "low" | "off" | "0" => Ok(Self::Low),
            other => Err(format!("invalid level '{}', expected high or low", other)),
        }
    }
}

/// A pin driven high or low.
pub struct DigitalOutput<P> {
    pin: P,
    level: Option<Level>,
}

impl<P: OutputPin> DigitalOutput<P> {
    /// Bind an output. The pin is not written until the first `set`.
    pub fn new(pin: P) -> Self {
        Self { pin, level: None }
    }

    /// Drive the pin to `level` with a single write.
    pub fn set(&mut self, level: Level) -> Result<()> {
        let written = match level {
            Level::High => self.pin.set_high(),
            Level::Low => self.pin.set_low(),
        };
        written.map_err(DeviceError::pin)?;
        self.level = Some(level);
        debug!(%level, "digital output set");
        Ok(())
    }

    pub fn set_high(&mut self) -> Result<()> {
        self.set(Level::High)
    }

    pub fn set_low(&mut self) -> Result<()> {
        self.set(Level::Low)
    }

    /// Last level written, or `None` before the first write.
    pub fn level(&self) -> Option<Level> {
        self.level
    }

    pub fn release(self) -> P {
        self.pin
    }
}

/// A PWM output with a duty cycle setting.
pub struct PwmOutput<P> {
    pwm: P,
    duty_cycle: u16,
}

impl<P: SetDutyCycle> PwmOutput<P> {
    /// Bind a PWM output. The duty cycle is assumed to start at zero.
    pub fn new(pwm: P) -> Self {
        Self { pwm, duty_cycle: 0 }
    }

    /// Largest accepted raw duty cycle.
    pub fn max_duty_cycle(&self) -> u16 {
        self.pwm.max_duty_cycle()
    }

    /// Apply a raw duty cycle unchanged.
    pub fn set_duty_cycle(&mut self, duty_cycle: u16) -> Result<()> {
        let max = self.pwm.max_duty_cycle();
        if duty_cycle > max {
            return Err(DeviceError::out_of_range(format!(
                "duty cycle {} exceeds maximum {}",
                duty_cycle, max
            )));
        }
        self.pwm
            .set_duty_cycle(duty_cycle)
            .map_err(DeviceError::pwm)?;
        self.duty_cycle = duty_cycle;
        debug!(duty_cycle, max, "PWM duty cycle set");
        Ok(())
    }

    /// Apply a duty cycle given in percent (0 to 100).
    pub fn set_duty_percent(&mut self, percent: f32) -> Result<()> {
        if !(0.0..=100.0).contains(&percent) {
            return Err(DeviceError::out_of_range(format!(
                "duty cycle {}% outside 0..=100",
                percent
            )));
        }
        let max = f32::from(self.pwm.max_duty_cycle());
        self.set_duty_cycle((max * percent / 100.0).round() as u16)
    }

    /// Last duty cycle written.
    pub fn duty_cycle(&self) -> u16 {
        self.duty_cycle
    }

    /// Last duty cycle written, in percent.
    pub fn duty_percent(&self) -> f32 {
        let max = self.pwm.max_duty_cycle();
        if max == 0 {
            0.0
        } else {
            f32::from(self.duty_cycle) * 100.0 / f32::from(max)
        }
    }

    pub fn release(self) -> P {
        self.pwm
    }
}
