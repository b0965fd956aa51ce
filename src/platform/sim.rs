//! Simulated board and chip models.
//!
//! Each model answers bus traffic the way the real part does at register
//! level, so drivers can be exercised without hardware. Buses and pins keep a
//! log of what was written for inspection after a driver is released.

use super::{check_pin, check_spi_mode, Board, SpiConfig};
use crate::devices::htu21d::{self, crc8};
use crate::devices::max31865::{config as rtd_config, reg as rtd_reg};
use crate::devices::mcp342x::{Gain, Resolution};
use crate::devices::output::Level;
use crate::devices::pca9685::{mode1, reg as pca_reg};
use crate::error::Result;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, OutputPin};
use embedded_hal::i2c::{self, I2c, NoAcknowledgeSource};
use embedded_hal::pwm::{self, SetDutyCycle};
use embedded_hal::spi::{self, SpiDevice};
use std::collections::BTreeMap;
use tracing::debug;

/// A chip attached to a simulated I2C bus.
pub trait SimI2cDevice {
    /// Handle a write transfer addressed to this device.
    fn write(&mut self, bytes: &[u8]) -> std::result::Result<(), i2c::ErrorKind>;

    /// Handle a read transfer addressed to this device.
    fn read(&mut self, buffer: &mut [u8]) -> std::result::Result<(), i2c::ErrorKind>;
}

/// One transfer on a simulated I2C bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum I2cEvent {
    Write { address: u8, bytes: Vec<u8> },
    Read { address: u8, bytes: Vec<u8> },
}

/// Simulated I2C bus with attached devices.
#[derive(Default)]
pub struct SimI2c {
    devices: BTreeMap<u8, Box<dyn SimI2cDevice>>,
    events: Vec<I2cEvent>,
}

impl SimI2c {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a device, builder style.
    pub fn with_device(mut self, address: u8, device: impl SimI2cDevice + 'static) -> Self {
        self.attach(address, device);
        self
    }

    /// Attach a device, replacing any device already at `address`.
    pub fn attach(&mut self, address: u8, device: impl SimI2cDevice + 'static) {
        self.devices.insert(address, Box::new(device));
    }

    /// Addresses that acknowledge.
    pub fn addresses(&self) -> Vec<u8> {
        self.devices.keys().copied().collect()
    }

    /// Every transfer in order.
    pub fn events(&self) -> &[I2cEvent] {
        &self.events
    }

    /// Payloads of every write to `address`, in order.
    pub fn writes_to(&self, address: u8) -> Vec<Vec<u8>> {
        self.events
            .iter()
            .filter_map(|event| match event {
                I2cEvent::Write { address: a, bytes } if *a == address => Some(bytes.clone()),
                _ => None,
            })
            .collect()
    }
}

impl i2c::ErrorType for SimI2c {
    type Error = i2c::ErrorKind;
}

impl I2c for SimI2c {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [i2c::Operation<'_>],
    ) -> std::result::Result<(), Self::Error> {
        let device = self
            .devices
            .get_mut(&address)
            .ok_or(i2c::ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address))?;

        for operation in operations.iter_mut() {
            match operation {
                i2c::Operation::Write(bytes) => {
                    self.events.push(I2cEvent::Write {
                        address,
                        bytes: bytes.to_vec(),
                    });
                    device.write(bytes)?;
                }
                i2c::Operation::Read(buffer) => {
                    device.read(buffer)?;
                    self.events.push(I2cEvent::Read {
                        address,
                        bytes: buffer.to_vec(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// HTU21D model with fixed raw readings.
#[derive(Debug, Clone)]
pub struct SimHtu21d {
    raw_temperature: u16,
    raw_humidity: u16,
    user_register: u8,
    pending: Vec<u8>,
    corrupt_crc: bool,
    wrong_status: bool,
}

const HTU21D_USER_END_OF_BATTERY: u8 = 0x40;
const HTU21D_USER_DEFAULT: u8 = 0x02;
const HTU21D_USER_WRITABLE: u8 = 0b1000_0111;

impl SimHtu21d {
    /// Model returning the given raw words (status bits are replaced).
    pub fn new(raw_temperature: u16, raw_humidity: u16) -> Self {
        Self {
            raw_temperature: raw_temperature & 0xFFFC,
            raw_humidity: raw_humidity & 0xFFFC,
            user_register: HTU21D_USER_DEFAULT,
            pending: Vec::new(),
            corrupt_crc: false,
            wrong_status: false,
        }
    }

    /// Model returning raw words closest to the given conditions.
    pub fn from_conditions(celsius: f32, relative_humidity: f32) -> Self {
        let raw_temperature = ((celsius + 46.85) * 65536.0 / 175.72)
            .round()
            .clamp(0.0, 65535.0) as u16;
        let raw_humidity = ((relative_humidity + 6.0) * 65536.0 / 125.0)
            .round()
            .clamp(0.0, 65535.0) as u16;
        Self::new(raw_temperature, raw_humidity)
    }

    /// Send checksums that do not match the data.
    pub fn with_corrupt_crc(mut self) -> Self {
        self.corrupt_crc = true;
        self
    }

    /// Tag every measurement with the status bits of the other measurement.
    pub fn with_wrong_status(mut self) -> Self {
        self.wrong_status = true;
        self
    }

    /// Report the end-of-battery flag. It survives a soft reset.
    pub fn with_battery_low(mut self) -> Self {
        self.user_register |= HTU21D_USER_END_OF_BATTERY;
        self
    }

    /// Start with the heater left on by an earlier session.
    pub fn with_heater_on(mut self) -> Self {
        self.user_register |= 0b0000_0100;
        self
    }

    fn frame(&self, raw: u16, status: u8) -> Vec<u8> {
        let status = if self.wrong_status { status ^ 0b10 } else { status };
        let [msb, lsb] = (raw | u16::from(status)).to_be_bytes();
        let mut crc = crc8(&[msb, lsb]);
        if self.corrupt_crc {
            crc ^= 0xFF;
        }
        vec![msb, lsb, crc]
    }
}

impl Default for SimHtu21d {
    fn default() -> Self {
        Self::from_conditions(22.5, 45.0)
    }
}

impl SimI2cDevice for SimHtu21d {
    fn write(&mut self, bytes: &[u8]) -> std::result::Result<(), i2c::ErrorKind> {
        match bytes {
            [htu21d::cmd::SOFT_RESET] => {
                self.user_register =
                    HTU21D_USER_DEFAULT | (self.user_register & HTU21D_USER_END_OF_BATTERY);
                self.pending.clear();
            }
            [htu21d::cmd::MEASURE_TEMPERATURE | htu21d::cmd::MEASURE_TEMPERATURE_HOLD] => {
                self.pending = self.frame(self.raw_temperature, 0b00);
            }
            [htu21d::cmd::MEASURE_HUMIDITY | htu21d::cmd::MEASURE_HUMIDITY_HOLD] => {
                self.pending = self.frame(self.raw_humidity, 0b10);
            }
            [htu21d::cmd::READ_USER_REGISTER] => {
                self.pending = vec![self.user_register];
            }
            [htu21d::cmd::WRITE_USER_REGISTER, value] => {
                self.user_register = (value & HTU21D_USER_WRITABLE)
                    | (self.user_register & !HTU21D_USER_WRITABLE);
            }
            _ => return Err(i2c::ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data)),
        }
        Ok(())
    }

    fn read(&mut self, buffer: &mut [u8]) -> std::result::Result<(), i2c::ErrorKind> {
        if self.pending.is_empty() {
            return Err(i2c::ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }
        for (slot, value) in buffer
            .iter_mut()
            .zip(self.pending.iter().copied().chain(std::iter::repeat(0)))
        {
            *slot = value;
        }
        self.pending.clear();
        Ok(())
    }
}

/// MCP342x model returning fixed input voltages.
#[derive(Debug, Clone)]
pub struct SimMcp342x {
    voltages: [f64; 4],
    config: u8,
    not_ready_reads: u32,
    busy_reads_left: u32,
    config_writes: Vec<u8>,
}

impl Default for SimMcp342x {
    fn default() -> Self {
        Self {
            voltages: [0.0; 4],
            // Power-on default: channel 1, continuous, 12-bit, gain 1
            config: 0x90,
            not_ready_reads: 0,
            busy_reads_left: 0,
            config_writes: Vec::new(),
        }
    }
}

impl SimMcp342x {
    /// Set the differential input voltage on a channel.
    pub fn with_voltage(mut self, channel: usize, volts: f64) -> Self {
        self.voltages[channel] = volts;
        self
    }

    /// Report the conversion as still running for `reads` reads after each start.
    pub fn with_not_ready_reads(mut self, reads: u32) -> Self {
        self.not_ready_reads = reads;
        self
    }

    /// Every configuration byte written, in order.
    pub fn config_writes(&self) -> &[u8] {
        &self.config_writes
    }

    fn count(&self) -> i32 {
        let channel = usize::from((self.config >> 5) & 0b11);
        let resolution = Resolution::from_config(self.config);
        let gain = Gain::from_config(self.config);
        let full_scale = 1i64 << (resolution.bits() - 1);
        let count = (self.voltages[channel] * f64::from(gain.factor()) / resolution.lsb_volts())
            .round() as i64;
        count.clamp(-full_scale, full_scale - 1) as i32
    }
}

impl SimI2cDevice for SimMcp342x {
    fn write(&mut self, bytes: &[u8]) -> std::result::Result<(), i2c::ErrorKind> {
        if let Some(&config) = bytes.first() {
            self.config = config & 0x7F;
            self.config_writes.push(config);
            if config & 0x80 != 0 {
                self.busy_reads_left = self.not_ready_reads;
            }
        }
        Ok(())
    }

    fn read(&mut self, buffer: &mut [u8]) -> std::result::Result<(), i2c::ErrorKind> {
        let count = self.count();
        let mut frame = match Resolution::from_config(self.config) {
            Resolution::Bits18 => vec![(count >> 16) as u8, (count >> 8) as u8, count as u8],
            _ => vec![(count >> 8) as u8, count as u8],
        };

        let mut status = self.config;
        if self.busy_reads_left > 0 {
            self.busy_reads_left -= 1;
            status |= 0x80;
        }
        frame.push(status);

        // The configuration byte repeats for as long as the master keeps reading
        for (slot, value) in buffer
            .iter_mut()
            .zip(frame.iter().copied().chain(std::iter::repeat(status)))
        {
            *slot = value;
        }
        Ok(())
    }
}

/// PCA9685 register file model.
#[derive(Debug, Clone)]
pub struct SimPca9685 {
    registers: [u8; 256],
    pointer: u8,
}

impl Default for SimPca9685 {
    fn default() -> Self {
        let mut registers = [0u8; 256];
        registers[usize::from(pca_reg::MODE1)] = 0x11;
        registers[usize::from(pca_reg::MODE2)] = 0x04;
        registers[usize::from(pca_reg::PRESCALE)] = 0x1E;
        Self {
            registers,
            pointer: 0,
        }
    }
}

impl SimPca9685 {
    pub fn register(&self, address: u8) -> u8 {
        self.registers[usize::from(address)]
    }

    fn store(&mut self, value: u8) {
        match self.pointer {
            pca_reg::MODE1 => self.registers[0] = value & !mode1::RESTART,
            pca_reg::PRESCALE => {
                if self.registers[0] & mode1::SLEEP != 0 {
                    self.registers[usize::from(pca_reg::PRESCALE)] = value;
                }
            }
            register => self.registers[usize::from(register)] = value,
        }
    }

    fn advance(&mut self) {
        if self.registers[0] & mode1::AUTO_INCREMENT != 0 {
            self.pointer = self.pointer.wrapping_add(1);
        }
    }
}

impl SimI2cDevice for SimPca9685 {
    fn write(&mut self, bytes: &[u8]) -> std::result::Result<(), i2c::ErrorKind> {
        let Some((&register, data)) = bytes.split_first() else {
            return Ok(());
        };
        self.pointer = register;
        for &value in data {
            self.store(value);
            self.advance();
        }
        Ok(())
    }

    fn read(&mut self, buffer: &mut [u8]) -> std::result::Result<(), i2c::ErrorKind> {
        for slot in buffer.iter_mut() {
            *slot = self.registers[usize::from(self.pointer)];
            self.advance();
        }
        Ok(())
    }
}

/// MAX31865 model measuring a fixed RTD resistance.
#[derive(Debug, Clone)]
pub struct SimMax31865 {
    registers: [u8; 8],
    resistance_ohms: f64,
    reference_ohms: f64,
    injected_fault: u8,
    pointer: Option<(u8, bool)>,
    transactions: usize,
}

impl SimMax31865 {
    pub fn new(resistance_ohms: f64) -> Self {
        let mut registers = [0u8; 8];
        // Power-on thresholds: high 0xFFFF, low 0x0000
        registers[3] = 0xFF;
        registers[4] = 0xFF;
        Self {
            registers,
            resistance_ohms,
            reference_ohms: crate::devices::max31865::PT100_REFERENCE_OHMS,
            injected_fault: 0,
            pointer: None,
            transactions: 0,
        }
    }

    /// Use a different reference resistor.
    pub fn with_reference(mut self, reference_ohms: f64) -> Self {
        self.reference_ohms = reference_ohms;
        self
    }

    /// Latch `status` into the fault register on every conversion.
    pub fn with_fault(mut self, status: u8) -> Self {
        self.injected_fault = status & 0xFC;
        self
    }

    pub fn register(&self, address: u8) -> u8 {
        self.registers[usize::from(address & 0x07)]
    }

    /// Number of completed SPI transactions.
    pub fn transactions(&self) -> usize {
        self.transactions
    }

    fn convert(&mut self) {
        let code = (self.resistance_ohms / self.reference_ohms * 32768.0)
            .round()
            .clamp(0.0, 32767.0) as u16;
        let mut word = code << 1;
        if self.injected_fault != 0 {
            word |= 1;
            self.registers[usize::from(rtd_reg::FAULT_STATUS)] = self.injected_fault;
        }
        let [msb, lsb] = word.to_be_bytes();
        self.registers[1] = msb;
        self.registers[2] = lsb;
    }

    fn write_register(&mut self, address: u8, value: u8) {
        match address {
            rtd_reg::CONFIG => {
                let mut value = value;
                if value & rtd_config::FAULT_CLEAR != 0 {
                    self.registers[usize::from(rtd_reg::FAULT_STATUS)] = 0;
                    value &= !rtd_config::FAULT_CLEAR;
                }
                let converting = value & (rtd_config::ONE_SHOT | rtd_config::AUTO_CONVERT) != 0;
                if value & rtd_config::BIAS != 0 && converting {
                    self.convert();
                }
                self.registers[0] = value & !rtd_config::ONE_SHOT;
            }
            3..=6 => self.registers[usize::from(address)] = value,
            _ => {}
        }
    }

    /// Shift one byte in and one byte out.
    fn clock(&mut self, mosi: u8) -> u8 {
        match self.pointer {
            None => {
                self.pointer = Some((mosi & 0x07, mosi & rtd_reg::WRITE != 0));
                0
            }
            Some((address, write)) => {
                let miso = if write {
                    self.write_register(address, mosi);
                    0
                } else {
                    self.registers[usize::from(address)]
                };
                self.pointer = Some(((address + 1) & 0x07, write));
                miso
            }
        }
    }
}

impl Default for SimMax31865 {
    fn default() -> Self {
        Self::new(108.0)
    }
}

impl spi::ErrorType for SimMax31865 {
    type Error = spi::ErrorKind;
}

impl SpiDevice for SimMax31865 {
    fn transaction(
        &mut self,
        operations: &mut [spi::Operation<'_, u8>],
    ) -> std::result::Result<(), Self::Error> {
        // Chip select asserted: the first byte is an address
        self.pointer = None;
        for operation in operations.iter_mut() {
            match operation {
                spi::Operation::Read(buffer) => {
                    for slot in buffer.iter_mut() {
                        *slot = self.clock(0);
                    }
                }
                spi::Operation::Write(bytes) => {
                    for &byte in bytes.iter() {
                        self.clock(byte);
                    }
                }
                spi::Operation::Transfer(read, write) => {
                    for index in 0..read.len().max(write.len()) {
                        let miso = self.clock(write.get(index).copied().unwrap_or(0));
                        if let Some(slot) = read.get_mut(index) {
                            *slot = miso;
                        }
                    }
                }
                spi::Operation::TransferInPlace(buffer) => {
                    for slot in buffer.iter_mut() {
                        *slot = self.clock(*slot);
                    }
                }
                spi::Operation::DelayNs(_) => {}
            }
        }
        self.pointer = None;
        self.transactions += 1;
        Ok(())
    }
}

/// Output pin that records every write.
#[derive(Debug, Clone)]
pub struct SimPin {
    pin: u8,
    writes: Vec<Level>,
}

impl SimPin {
    pub fn new(pin: u8) -> Self {
        Self {
            pin,
            writes: Vec::new(),
        }
    }

    pub fn pin(&self) -> u8 {
        self.pin
    }

    /// Every level written, in order.
    pub fn writes(&self) -> &[Level] {
        &self.writes
    }
}

impl digital::ErrorType for SimPin {
    type Error = digital::ErrorKind;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> std::result::Result<(), Self::Error> {
        self.writes.push(Level::Low);
        Ok(())
    }

    fn set_high(&mut self) -> std::result::Result<(), Self::Error> {
        self.writes.push(Level::High);
        Ok(())
    }
}

/// PWM output that records every duty cycle.
#[derive(Debug, Clone)]
pub struct SimPwm {
    frequency_hz: f64,
    max_duty_cycle: u16,
    writes: Vec<u16>,
}

impl SimPwm {
    pub fn new(frequency_hz: f64) -> Self {
        Self {
            frequency_hz,
            max_duty_cycle: u16::MAX,
            writes: Vec::new(),
        }
    }

    pub fn with_max_duty_cycle(mut self, max_duty_cycle: u16) -> Self {
        self.max_duty_cycle = max_duty_cycle;
        self
    }

    pub fn frequency_hz(&self) -> f64 {
        self.frequency_hz
    }

    /// Every duty cycle written, in order.
    pub fn writes(&self) -> &[u16] {
        &self.writes
    }
}

impl pwm::ErrorType for SimPwm {
    type Error = pwm::ErrorKind;
}

impl SetDutyCycle for SimPwm {
    fn max_duty_cycle(&self) -> u16 {
        self.max_duty_cycle
    }

    fn set_duty_cycle(&mut self, duty: u16) -> std::result::Result<(), Self::Error> {
        if duty > self.max_duty_cycle {
            return Err(pwm::ErrorKind::Other);
        }
        self.writes.push(duty);
        Ok(())
    }
}

/// Delay that returns immediately and accumulates the requested time.
#[derive(Debug, Clone, Default)]
pub struct SimDelay {
    elapsed_ns: u64,
}

impl SimDelay {
    pub fn elapsed_ns(&self) -> u64 {
        self.elapsed_ns
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ns / 1_000_000
    }
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns += u64::from(ns);
    }
}

/// Board whose buses carry simulated chips.
#[derive(Default)]
pub struct SimulatedBoard {
    buses: BTreeMap<u8, SimI2c>,
    rtd: Option<SimMax31865>,
}

/// Bus the bench board puts the PCA9685 on, since it shares 0x40 with the HTU21D.
pub const BENCH_PCA9685_BUS: u8 = 0;

impl SimulatedBoard {
    /// Board with no chips attached.
    pub fn new() -> Self {
        Self::default()
    }

    /// Board with every bench chip at its default location: HTU21D at 0x40
    /// and MCP342x at 0x68 on bus 1, the PCA9685 at 0x40 on
    /// [`BENCH_PCA9685_BUS`] and a MAX31865 on any SPI chip select.
    ///
    /// Each bus is still handed out once, so only one of the bus 1 chips can
    /// be bound per board.
    pub fn bench() -> Self {
        Self::new()
            .with_i2c_device(1, 0x40, SimHtu21d::default())
            .with_i2c_device(1, 0x68, SimMcp342x::default().with_voltage(0, 1.5))
            .with_i2c_device(BENCH_PCA9685_BUS, 0x40, SimPca9685::default())
            .with_max31865(SimMax31865::default())
    }

    /// Attach a chip to I2C bus `bus` at `address`.
    pub fn with_i2c_device(
        mut self,
        bus: u8,
        address: u8,
        device: impl SimI2cDevice + 'static,
    ) -> Self {
        self.buses.entry(bus).or_default().attach(address, device);
        self
    }

    /// Attach the RTD converter returned by the next `spi` call.
    pub fn with_max31865(mut self, device: SimMax31865) -> Self {
        self.rtd = Some(device);
        self
    }
}

impl Board for SimulatedBoard {
    type I2c = SimI2c;
    type Spi = SimMax31865;
    type Output = SimPin;
    type Pwm = SimPwm;
    type Delay = SimDelay;

    fn name(&self) -> &'static str {
        "simulated"
    }

    fn i2c(&mut self, bus: u8) -> Result<SimI2c> {
        let i2c = self.buses.remove(&bus).unwrap_or_default();
        debug!(bus, addresses = ?i2c.addresses(), "simulated I2C bus opened");
        Ok(i2c)
    }

    fn spi(&mut self, config: &SpiConfig) -> Result<SimMax31865> {
        check_spi_mode(config.mode)?;
        check_pin(config.chip_select_pin)?;
        Ok(self.rtd.take().unwrap_or_default())
    }

    fn output_pin(&mut self, pin: u8) -> Result<SimPin> {
        check_pin(pin)?;
        Ok(SimPin::new(pin))
    }

    fn pwm_pin(&mut self, pin: u8, frequency_hz: f64) -> Result<SimPwm> {
        check_pin(pin)?;
        Ok(SimPwm::new(frequency_hz))
    }

    fn delay(&mut self) -> SimDelay {
        SimDelay::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bench_board_has_default_chips() {
        let mut board = SimulatedBoard::bench();
        assert_eq!(board.i2c(1).unwrap().addresses(), vec![0x40, 0x68]);
        assert_eq!(board.i2c(BENCH_PCA9685_BUS).unwrap().addresses(), vec![0x40]);
        assert!(board.i2c(1).unwrap().addresses().is_empty());
    }

    #[test]
    fn test_unknown_address_is_not_acknowledged() {
        let mut bus = SimI2c::new();
        assert_eq!(
            bus.write(0x40, &[0x00]),
            Err(i2c::ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address))
        );
    }

    #[test]
    fn test_htu21d_model_frames_measurements() {
        let mut bus = SimI2c::new().with_device(0x40, SimHtu21d::new(0x683A, 0x4E85));
        let mut frame = [0u8; 3];
        bus.write(0x40, &[htu21d::cmd::MEASURE_HUMIDITY]).unwrap();
        bus.read(0x40, &mut frame).unwrap();
        assert_eq!(frame, [0x4E, 0x86, crc8(&[0x4E, 0x86])]);

        // Nothing pending: the sensor does not acknowledge a read
        assert!(bus.read(0x40, &mut frame).is_err());
    }

    #[test]
    fn test_pca9685_model_ignores_prescale_while_awake() {
        let mut model = SimPca9685::default();
        model.write(&[pca_reg::MODE1, 0x00]).unwrap();
        model.write(&[pca_reg::PRESCALE, 0x05]).unwrap();
        assert_eq!(model.register(pca_reg::PRESCALE), 0x1E);
    }

    #[test]
    fn test_max31865_model_auto_increments() {
        let mut model = SimMax31865::new(100.0);
        let mut buf = [0u8; 2];
        model
            .transaction(&mut [
                spi::Operation::Write(&[rtd_reg::HIGH_FAULT_MSB]),
                spi::Operation::Read(&mut buf),
            ])
            .unwrap();
        assert_eq!(buf, [0xFF, 0xFF]);
        assert_eq!(model.transactions(), 1);
    }

    #[test]
    fn test_simulated_board_hands_out_buses_once() {
        let mut board = SimulatedBoard::new().with_i2c_device(1, 0x40, SimHtu21d::default());
        assert_eq!(board.i2c(1).unwrap().addresses(), vec![0x40]);
        assert!(board.i2c(1).unwrap().addresses().is_empty());
        assert!(board.output_pin(28).is_err());
    }

    #[test]
    fn test_delay_accumulates() {
        let mut delay = SimDelay::default();
        delay.delay_ms(65);
        delay.delay_us(500);
        assert_eq!(delay.elapsed_ns(), 65_500_000);
        assert_eq!(delay.elapsed_ms(), 65);
    }
}
