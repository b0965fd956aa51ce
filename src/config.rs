//! Device configuration.
//!
//! Each config describes one bench setup: which bus or pin the part hangs off
//! and how the driver is bound to it. `open` performs acquisition and binding
//! against any [`Board`].

use crate::devices::htu21d::{self, Htu21dResolution};
use crate::devices::max31865::{FilterFrequency, PT100_NOMINAL_OHMS, PT100_REFERENCE_OHMS};
use crate::devices::mcp342x::{self, Gain, Resolution};
use crate::devices::pca9685::{self, prescale_for};
use crate::devices::{DigitalOutput, Htu21d, Max31865, Mcp342x, Pca9685, PwmOutput, Wiring};
use crate::error::{DeviceError, Result};
use crate::platform::{Board, PinNumbering, SpiConfig};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// HTU21D on an I2C bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Htu21dConfig {
    /// I2C bus number
    pub bus: u8,
    /// Device address
    pub address: u8,
    /// Measurement resolution
    pub resolution: Htu21dResolution,
    /// Whether to switch the on-chip heater on
    pub heater: bool,
}

impl Default for Htu21dConfig {
    fn default() -> Self {
        Self {
            bus: crate::DEFAULT_I2C_BUS,
            address: htu21d::DEFAULT_ADDRESS,
            resolution: Htu21dResolution::default(),
            heater: false,
        }
    }
}

impl Htu21dConfig {
    pub fn with_bus(mut self, bus: u8) -> Self {
        self.bus = bus;
        self
    }

    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    pub fn with_resolution(mut self, resolution: Htu21dResolution) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_heater(mut self, heater: bool) -> Self {
        self.heater = heater;
        self
    }

    pub fn validate(&self) -> Result<()> {
        check_i2c_address(self.address)
    }

    /// Acquire the bus and bind the sensor.
    ///
    /// The heater bit survives soft resets, so its configured state is always
    /// written. The resolution is only written when it differs from the default.
    pub fn open<B: Board>(&self, board: &mut B) -> Result<Htu21d<B::I2c, B::Delay>> {
        self.validate()?;
        let i2c = board.i2c(self.bus)?;
        let mut sensor = Htu21d::with_address(i2c, board.delay(), self.address);
        if self.resolution != Htu21dResolution::default() {
            sensor.set_resolution(self.resolution)?;
        }
        sensor.set_heater(self.heater)?;
        debug!(bus = self.bus, address = self.address, "HTU21D bound");
        Ok(sensor)
    }
}

/// MAX31865 with a PT100 (or other platinum) element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Max31865Config {
    /// SPI bus and chip select
    pub spi: SpiConfig,
    /// RTD wiring
    pub wiring: Wiring,
    /// Mains filter
    pub filter: FilterFrequency,
    /// RTD resistance at 0 °C
    pub nominal_ohms: f64,
    /// Reference resistor on the breakout
    pub reference_ohms: f64,
}

impl Default for Max31865Config {
    fn default() -> Self {
        Self {
            spi: SpiConfig::default(),
            wiring: Wiring::TwoWire,
            filter: FilterFrequency::default(),
            nominal_ohms: PT100_NOMINAL_OHMS,
            reference_ohms: PT100_REFERENCE_OHMS,
        }
    }
}

impl Max31865Config {
    pub fn with_spi(mut self, spi: SpiConfig) -> Self {
        self.spi = spi;
        self
    }

    /// Use a different BCM GPIO as chip select.
    pub fn with_chip_select(mut self, pin: u8) -> Self {
        self.spi.chip_select_pin = pin;
        self
    }

    pub fn with_wiring(mut self, wiring: Wiring) -> Self {
        self.wiring = wiring;
        self
    }

    pub fn with_filter(mut self, filter: FilterFrequency) -> Self {
        self.filter = filter;
        self
    }

    /// Set the element and reference resistances, e.g. 1000/4300 for a PT1000.
    pub fn with_element(mut self, nominal_ohms: f64, reference_ohms: f64) -> Self {
        self.nominal_ohms = nominal_ohms;
        self.reference_ohms = reference_ohms;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.spi.mode != 1 && self.spi.mode != 3 {
            return Err(DeviceError::config_error(format!(
                "MAX31865 requires SPI mode 1 or 3, got {}",
                self.spi.mode
            )));
        }
        if !(self.nominal_ohms > 0.0 && self.reference_ohms > 0.0) {
            return Err(DeviceError::config_error(
                "RTD nominal and reference resistance must be positive",
            ));
        }
        Ok(())
    }

    /// Acquire the SPI device and configure the converter.
    pub fn open<B: Board>(&self, board: &mut B) -> Result<Max31865<B::Spi, B::Delay>> {
        self.validate()?;
        let spi = board.spi(&self.spi)?;
        let delay = board.delay();
        Max31865::with_element(
            spi,
            delay,
            self.wiring,
            self.filter,
            self.nominal_ohms,
            self.reference_ohms,
        )
    }
}

/// One MCP342x input channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mcp342xConfig {
    pub bus: u8,
    pub address: u8,
    pub channel: u8,
    pub resolution: Resolution,
    pub gain: Gain,
    /// Multiplier applied to the measured voltage
    pub scale_factor: f64,
    /// Offset added after scaling
    pub offset: f64,
}

impl Default for Mcp342xConfig {
    fn default() -> Self {
        Self {
            bus: crate::DEFAULT_I2C_BUS,
            address: mcp342x::MIN_ADDRESS,
            channel: 0,
            resolution: Resolution::Bits18,
            gain: Gain::X1,
            scale_factor: 1.0,
            offset: 0.0,
        }
    }
}

impl Mcp342xConfig {
    pub fn with_bus(mut self, bus: u8) -> Self {
        self.bus = bus;
        self
    }

    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    pub fn with_channel(mut self, channel: u8) -> Self {
        self.channel = channel;
        self
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_gain(mut self, gain: Gain) -> Self {
        self.gain = gain;
        self
    }

    pub fn with_scaling(mut self, scale_factor: f64, offset: f64) -> Self {
        self.scale_factor = scale_factor;
        self.offset = offset;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(mcp342x::MIN_ADDRESS..=mcp342x::MAX_ADDRESS).contains(&self.address) {
            return Err(DeviceError::config_error(format!(
                "MCP342x address {:#04x} outside {:#04x}..={:#04x}",
                self.address,
                mcp342x::MIN_ADDRESS,
                mcp342x::MAX_ADDRESS
            )));
        }
        if self.channel >= mcp342x::CHANNELS {
            return Err(DeviceError::config_error(format!(
                "MCP342x channel {} outside 0..{}",
                self.channel,
                mcp342x::CHANNELS
            )));
        }
        Ok(())
    }

    pub fn open<B: Board>(&self, board: &mut B) -> Result<Mcp342x<B::I2c, B::Delay>> {
        self.validate()?;
        let i2c = board.i2c(self.bus)?;
        let adc = Mcp342x::new(
            i2c,
            board.delay(),
            self.address,
            self.channel,
            self.resolution,
        )?;
        Ok(adc
            .with_gain(self.gain)
            .with_scaling(self.scale_factor, self.offset))
    }
}

/// PCA9685 output setting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pca9685Config {
    pub bus: u8,
    pub address: u8,
    /// PWM frequency shared by all channels
    pub frequency_hz: f64,
    /// Output channel to drive
    pub channel: u8,
    /// Duty cycle (0 to 0xFFFF)
    pub duty_cycle: u16,
}

impl Default for Pca9685Config {
    fn default() -> Self {
        Self {
            bus: crate::DEFAULT_I2C_BUS,
            address: pca9685::DEFAULT_ADDRESS,
            frequency_hz: 60.0,
            channel: 0,
            duty_cycle: 0xFFFF,
        }
    }
}

impl Pca9685Config {
    pub fn with_bus(mut self, bus: u8) -> Self {
        self.bus = bus;
        self
    }

    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    pub fn with_frequency(mut self, frequency_hz: f64) -> Self {
        self.frequency_hz = frequency_hz;
        self
    }

    pub fn with_channel(mut self, channel: u8) -> Self {
        self.channel = channel;
        self
    }

    pub fn with_duty_cycle(mut self, duty_cycle: u16) -> Self {
        self.duty_cycle = duty_cycle;
        self
    }

    pub fn validate(&self) -> Result<()> {
        check_i2c_address(self.address)?;
        if self.channel >= pca9685::CHANNELS {
            return Err(DeviceError::config_error(format!(
                "PCA9685 channel {} outside 0..{}",
                self.channel,
                pca9685::CHANNELS
            )));
        }
        prescale_for(pca9685::REFERENCE_CLOCK_HZ, self.frequency_hz)?;
        Ok(())
    }

    /// Acquire the bus, wake the controller and set the frequency.
    pub fn open<B: Board>(&self, board: &mut B) -> Result<Pca9685<B::I2c, B::Delay>> {
        self.validate()?;
        let i2c = board.i2c(self.bus)?;
        let mut pca = Pca9685::with_address(i2c, board.delay(), self.address);
        pca.init()?;
        pca.set_frequency(self.frequency_hz)?;
        Ok(pca)
    }
}

/// GPIO output driving a switched load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Pin number in `numbering`
    pub pin: u8,
    pub numbering: PinNumbering,
    /// PWM frequency when driven as a PWM output
    pub frequency_hz: f64,
    /// PWM duty cycle in percent
    pub duty_percent: f32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        // Physical header pin 12 (GPIO18, hardware PWM0)
        Self {
            pin: 12,
            numbering: PinNumbering::Board,
            frequency_hz: 1000.0,
            duty_percent: 50.0,
        }
    }
}

impl OutputConfig {
    pub fn with_pin(mut self, pin: u8, numbering: PinNumbering) -> Self {
        self.pin = pin;
        self.numbering = numbering;
        self
    }

    pub fn with_frequency(mut self, frequency_hz: f64) -> Self {
        self.frequency_hz = frequency_hz;
        self
    }

    pub fn with_duty_percent(mut self, duty_percent: f32) -> Self {
        self.duty_percent = duty_percent;
        self
    }

    /// BCM GPIO number of the configured pin.
    pub fn bcm_pin(&self) -> Result<u8> {
        self.numbering.to_bcm(self.pin)
    }

    pub fn validate(&self) -> Result<()> {
        self.bcm_pin()?;
        if !self.frequency_hz.is_finite() || self.frequency_hz <= 0.0 {
            return Err(DeviceError::config_error(format!(
                "PWM frequency must be positive, got {}",
                self.frequency_hz
            )));
        }
        if !(0.0..=100.0).contains(&self.duty_percent) {
            return Err(DeviceError::config_error(format!(
                "duty cycle {}% outside 0..=100",
                self.duty_percent
            )));
        }
        Ok(())
    }

    /// Claim the pin as a plain digital output.
    pub fn open_digital<B: Board>(&self, board: &mut B) -> Result<DigitalOutput<B::Output>> {
        let bcm = self.bcm_pin()?;
        let pin = board.output_pin(bcm)?;
        debug!(pin = self.pin, bcm, numbering = %self.numbering, "digital output claimed");
        Ok(DigitalOutput::new(pin))
    }

    /// Claim the pin as a PWM output at the configured frequency, 0% duty.
    pub fn open_pwm<B: Board>(&self, board: &mut B) -> Result<PwmOutput<B::Pwm>> {
        self.validate()?;
        let bcm = self.bcm_pin()?;
        let pwm = board.pwm_pin(bcm, self.frequency_hz)?;
        debug!(pin = self.pin, bcm, frequency_hz = self.frequency_hz, "PWM output claimed");
        Ok(PwmOutput::new(pwm))
    }
}

fn check_i2c_address(address: u8) -> Result<()> {
    // 7-bit addresses, excluding the reserved blocks at both ends
    if (0x08..=0x77).contains(&address) {
        Ok(())
    } else {
        Err(DeviceError::config_error(format!(
            "I2C address {:#04x} outside 0x08..=0x77",
            address
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::sim::{SimHtu21d, SimMcp342x, SimPca9685, SimulatedBoard};

    #[test]
    fn test_default_values() {
        let htu = Htu21dConfig::default();
        assert_eq!(htu.bus, 1);
        assert_eq!(htu.address, 0x40);

        let rtd = Max31865Config::default();
        assert_eq!(rtd.wiring, Wiring::TwoWire);
        assert_eq!(rtd.spi.chip_select_pin, 5);
        assert_eq!(rtd.reference_ohms, 430.0);

        let adc = Mcp342xConfig::default();
        assert_eq!(adc.address, 0x68);
        assert_eq!(adc.resolution, Resolution::Bits18);

        let pca = Pca9685Config::default();
        assert_eq!(pca.frequency_hz, 60.0);
        assert_eq!(pca.duty_cycle, 0xFFFF);

        let output = OutputConfig::default();
        assert_eq!(output.bcm_pin().unwrap(), 18);
        assert_eq!(output.frequency_hz, 1000.0);
    }

    #[test]
    fn test_validation() {
        assert!(Htu21dConfig::default().with_address(0x7F).validate().is_err());
        assert!(Mcp342xConfig::default().with_channel(4).validate().is_err());
        assert!(Mcp342xConfig::default().with_address(0x40).validate().is_err());
        assert!(Pca9685Config::default().with_frequency(5000.0).validate().is_err());
        assert!(Pca9685Config::default().with_channel(16).validate().is_err());
        assert!(OutputConfig::default().with_duty_percent(120.0).validate().is_err());
        assert!(OutputConfig::default()
            .with_pin(1, PinNumbering::Board)
            .validate()
            .is_err());
        let mut rtd = Max31865Config::default();
        rtd.spi.mode = 0;
        assert!(rtd.validate().is_err());
    }

    #[test]
    fn test_open_binds_against_simulated_board() {
        let mut board = SimulatedBoard::new().with_i2c_device(1, 0x40, SimHtu21d::default());
        let mut htu = Htu21dConfig::default().open(&mut board).unwrap();
        let reading = htu.read().unwrap();
        assert!((reading.temperature_celsius - 22.5).abs() < 0.01);
    }

    #[test]
    fn test_htu21d_open_switches_stale_heater_off() {
        let mut board =
            SimulatedBoard::new().with_i2c_device(1, 0x40, SimHtu21d::default().with_heater_on());
        let htu = Htu21dConfig::default().open(&mut board).unwrap();
        let (bus, _) = htu.release();
        let writes = bus.writes_to(0x40);
        let last = writes.last().expect("heater state should be written");
        assert_eq!(last[0], 0xE6);
        assert_eq!(last[1] & 0b0000_0100, 0);

        let mut board = SimulatedBoard::new().with_i2c_device(1, 0x40, SimHtu21d::default());
        let htu = Htu21dConfig::default()
            .with_heater(true)
            .open(&mut board)
            .unwrap();
        let (bus, _) = htu.release();
        assert_ne!(bus.writes_to(0x40).last().unwrap()[1] & 0b0000_0100, 0);
    }

    #[test]
    fn test_mcp342x_open_applies_gain() {
        let mut board =
            SimulatedBoard::new().with_i2c_device(1, 0x68, SimMcp342x::default().with_voltage(0, 0.5));
        let mut adc = Mcp342xConfig::default()
            .with_gain(Gain::X2)
            .open(&mut board)
            .unwrap();
        assert_eq!(adc.config_byte(), 0b0000_1101);
        let reading = adc.convert_and_read().unwrap();
        assert!((reading.voltage - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_pca9685_open_sets_frequency() {
        let mut board = SimulatedBoard::new().with_i2c_device(1, 0x40, SimPca9685::default());
        let mut pca = Pca9685Config::default()
            .with_frequency(1000.0)
            .open(&mut board)
            .unwrap();
        assert!((pca.frequency().unwrap() - 1017.25).abs() < 0.01);
    }

    #[test]
    fn test_output_open_resolves_board_numbering() {
        let mut board = SimulatedBoard::new();
        let output = OutputConfig::default().open_digital(&mut board).unwrap();
        assert_eq!(output.release().pin(), 18);
    }

    #[test]
    fn test_config_serialization() {
        let config = Mcp342xConfig::default().with_gain(Gain::X8);
        let json = serde_json::to_string(&config).unwrap();
        let back: Mcp342xConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.gain, Gain::X8);
        assert_eq!(back.resolution, Resolution::Bits18);
    }
}
