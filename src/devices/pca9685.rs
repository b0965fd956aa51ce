//! PCA9685 16-channel, 12-bit PWM controller (I2C).

use crate::error::{DeviceError, Result};
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use embedded_hal::pwm::{ErrorType, SetDutyCycle};
use tracing::debug;

/// Power-on address with all address pins low.
pub const DEFAULT_ADDRESS: u8 = 0x40;
/// Internal oscillator frequency.
pub const REFERENCE_CLOCK_HZ: u32 = 25_000_000;
/// Number of PWM outputs.
pub const CHANNELS: u8 = 16;

/// Register addresses
pub mod reg {
    pub const MODE1: u8 = 0x00;
    pub const MODE2: u8 = 0x01;
    pub const LED0_ON_L: u8 = 0x06;
    pub const PRESCALE: u8 = 0xFE;
}

/// MODE1 bits
pub mod mode1 {
    pub const RESTART: u8 = 0x80;
    pub const AUTO_INCREMENT: u8 = 0x20;
    pub const SLEEP: u8 = 0x10;
}

/// Full-on / full-off flag in the ON_H / OFF_H registers.
const FULL: u16 = 0x1000;
const MIN_PRESCALE: u32 = 3;
const MAX_PRESCALE: u32 = 0xFF;
const OSCILLATOR_WAKE_MS: u32 = 5;

/// Compute the prescaler for a PWM frequency.
pub fn prescale_for(reference_clock_hz: u32, frequency_hz: f64) -> Result<u8> {
    if !frequency_hz.is_finite() || frequency_hz <= 0.0 {
        return Err(DeviceError::out_of_range(format!(
            "PWM frequency must be positive, got {}",
            frequency_hz
        )));
    }
    let prescale = (f64::from(reference_clock_hz) / 4096.0 / frequency_hz + 0.5) as u32;
    if !(MIN_PRESCALE..=MAX_PRESCALE).contains(&prescale) {
        return Err(DeviceError::out_of_range(format!(
            "PCA9685 cannot output at {} Hz (prescale {} outside {}..={})",
            frequency_hz, prescale, MIN_PRESCALE, MAX_PRESCALE
        )));
    }
    Ok(prescale as u8)
}

/// ON/OFF counts for a 16-bit duty cycle.
pub fn duty_to_counts(duty_cycle: u16) -> (u16, u16) {
    match duty_cycle {
        0xFFFF => (FULL, 0),
        value if value < 0x0010 => (0, FULL),
        value => (0, value >> 4),
    }
}

/// 16-bit duty cycle for ON/OFF counts.
pub fn counts_to_duty(on: u16, off: u16) -> u16 {
    if on & FULL != 0 {
        0xFFFF
    } else if off & FULL != 0 {
        0x0000
    } else {
        (off & 0x0FFF) << 4
    }
}

/// PCA9685 driver.
pub struct Pca9685<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
    reference_clock_hz: u32,
}

impl<I2C, D> Pca9685<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    /// Bind a controller at the default address. No bus traffic is generated.
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self::with_address(i2c, delay, DEFAULT_ADDRESS)
    }

    pub fn with_address(i2c: I2C, delay: D, address: u8) -> Self {
        Self {
            i2c,
            delay,
            address,
            reference_clock_hz: REFERENCE_CLOCK_HZ,
        }
    }

    /// Use an external clock on EXTCLK instead of the internal oscillator.
    pub fn with_reference_clock(mut self, reference_clock_hz: u32) -> Self {
        self.reference_clock_hz = reference_clock_hz;
        self
    }

    /// Wake the oscillator and enable register auto-increment.
    pub fn init(&mut self) -> Result<()> {
        self.write_register(reg::MODE1, mode1::AUTO_INCREMENT)?;
        self.delay.delay_ms(OSCILLATOR_WAKE_MS);
        debug!(address = self.address, "PCA9685 initialized");
        Ok(())
    }

    /// Set the PWM frequency shared by all channels.
    pub fn set_frequency(&mut self, frequency_hz: f64) -> Result<()> {
        let prescale = prescale_for(self.reference_clock_hz, frequency_hz)?;
        let old_mode = self.read_register(reg::MODE1)?;

        // PRESCALE is only writable while the oscillator is asleep
        self.write_register(reg::MODE1, (old_mode & !mode1::RESTART) | mode1::SLEEP)?;
        self.write_register(reg::PRESCALE, prescale)?;
        self.write_register(reg::MODE1, old_mode & !mode1::SLEEP)?;
        self.delay.delay_ms(OSCILLATOR_WAKE_MS);
        self.write_register(
            reg::MODE1,
            (old_mode & !mode1::SLEEP) | mode1::RESTART | mode1::AUTO_INCREMENT,
        )?;

        debug!(frequency_hz, prescale, "PCA9685 frequency set");
        Ok(())
    }

    /// PWM frequency derived from the prescaler.
    pub fn frequency(&mut self) -> Result<f64> {
        let prescale = self.read_register(reg::PRESCALE)?;
        Ok(f64::from(self.reference_clock_hz) / 4096.0 / f64::from(prescale))
    }

    /// Set a channel's duty cycle (0 to 0xFFFF).
    pub fn set_duty_cycle(&mut self, channel: u8, duty_cycle: u16) -> Result<()> {
        let register = Self::channel_register(channel)?;
        let (on, off) = duty_to_counts(duty_cycle);
        let [on_l, on_h] = on.to_le_bytes();
        let [off_l, off_h] = off.to_le_bytes();
        self.i2c
            .write(self.address, &[register, on_l, on_h, off_l, off_h])
            .map_err(DeviceError::i2c)?;
        debug!(channel, duty_cycle, on, off, "PCA9685 duty cycle set");
        Ok(())
    }

    /// Read back a channel's duty cycle.
    pub fn duty_cycle(&mut self, channel: u8) -> Result<u16> {
        let register = Self::channel_register(channel)?;
        let mut buf = [0u8; 4];
        self.i2c
            .write_read(self.address, &[register], &mut buf)
            .map_err(DeviceError::i2c)?;
        let on = u16::from_le_bytes([buf[0], buf[1]]);
        let off = u16::from_le_bytes([buf[2], buf[3]]);
        Ok(counts_to_duty(on, off))
    }

    /// Borrow a single output as a `SetDutyCycle` implementation.
    pub fn channel(&mut self, channel: u8) -> Result<PwmChannel<'_, I2C, D>> {
        Self::channel_register(channel)?;
        Ok(PwmChannel {
            controller: self,
            channel,
        })
    }

    /// Give back the bus and delay provider.
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    fn channel_register(channel: u8) -> Result<u8> {
        if channel >= CHANNELS {
            return Err(DeviceError::out_of_range(format!(
                "PCA9685 channel {} outside 0..{}",
                channel, CHANNELS
            )));
        }
        Ok(reg::LED0_ON_L + 4 * channel)
    }

    fn read_register(&mut self, register: u8) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(self.address, &[register], &mut buf)
            .map_err(DeviceError::i2c)?;
        Ok(buf[0])
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<()> {
        self.i2c
            .write(self.address, &[register, value])
            .map_err(DeviceError::i2c)
    }
}

/// One PCA9685 output.
pub struct PwmChannel<'a, I2C, D> {
    controller: &'a mut Pca9685<I2C, D>,
    channel: u8,
}

impl<I2C, D> PwmChannel<'_, I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    pub fn index(&self) -> u8 {
        self.channel
    }

    /// Read back the applied duty cycle.
    pub fn duty_cycle(&mut self) -> Result<u16> {
        self.controller.duty_cycle(self.channel)
    }
}

impl<I2C, D> ErrorType for PwmChannel<'_, I2C, D> {
    type Error = DeviceError;
}

impl<I2C, D> SetDutyCycle for PwmChannel<'_, I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    fn max_duty_cycle(&self) -> u16 {
        u16::MAX
    }

    fn set_duty_cycle(&mut self, duty: u16) -> std::result::Result<(), Self::Error> {
        self.controller.set_duty_cycle(self.channel, duty)
    }
}
