use component_library::{
    devices::{htu21d, mcp342x, pca9685},
    platform::sim::{
        I2cEvent, SimDelay, SimHtu21d, SimI2c, SimMax31865, SimMcp342x, SimPca9685, SimPin,
        SimPwm, SimulatedBoard,
    },
    AdcReading, ClimateReading, DeviceError, DigitalOutput, Gain, Htu21d, Htu21dConfig, Level,
    Max31865Config, Mcp342x, Mcp342xConfig, OutputConfig, Pca9685, Pca9685Config, PinNumbering,
    PwmOutput, Resolution, RtdReading, Wiring,
};

/// A fixed raw HTU21D word converts with the documented transfer functions
#[test]
fn test_htu21d_fixed_raw_conversion() {
    let bus = SimI2c::new().with_device(htu21d::DEFAULT_ADDRESS, SimHtu21d::new(0x6838, 0x7C80));
    let mut sensor = Htu21d::new(bus, SimDelay::default());

    let reading = sensor.read().expect("Should read simulated sensor");
    let expected_t = -46.85 + 175.72 * 0x6838 as f32 / 65536.0;
    let expected_rh = -6.0 + 125.0 * 0x7C80 as f32 / 65536.0;
    assert_eq!(reading.temperature_celsius, expected_t);
    assert_eq!(reading.relative_humidity, expected_rh);
}

#[test]
fn test_htu21d_corrupt_checksum_is_error() {
    let bus = SimI2c::new().with_device(
        htu21d::DEFAULT_ADDRESS,
        SimHtu21d::default().with_corrupt_crc(),
    );
    let mut sensor = Htu21d::new(bus, SimDelay::default());
    assert!(matches!(
        sensor.relative_humidity(),
        Err(DeviceError::Crc { .. })
    ));
}

#[test]
fn test_htu21d_missing_sensor_is_i2c_error() {
    let mut sensor = Htu21d::new(SimI2c::new(), SimDelay::default());
    assert!(matches!(sensor.temperature(), Err(DeviceError::I2c(_))));
}

/// High then low is exactly two pin writes, in order
#[test]
fn test_digital_output_high_then_low() {
    let mut output = DigitalOutput::new(SimPin::new(18));
    output.set(Level::High).expect("Should drive high");
    output.set(Level::Low).expect("Should drive low");

    let pin = output.release();
    assert_eq!(pin.writes(), &[Level::High, Level::Low]);
}

/// Boundary duty cycles reach the PWM device unmodified
#[test]
fn test_pwm_boundaries_unmodified() {
    let mut output = PwmOutput::new(SimPwm::new(1000.0));
    output.set_duty_cycle(0).expect("Should accept 0");
    output.set_duty_cycle(65535).expect("Should accept 65535");
    assert_eq!(output.release().writes(), &[0, 65535]);
}

#[test]
fn test_pca9685_boundaries_round_trip() {
    let bus = SimI2c::new().with_device(pca9685::DEFAULT_ADDRESS, SimPca9685::default());
    let mut pca = Pca9685::new(bus, SimDelay::default());
    pca.init().expect("Should wake controller");
    pca.set_frequency(60.0).expect("Should set frequency");

    for duty in [0u16, 0xFFFF] {
        pca.set_duty_cycle(7, duty).expect("Should set duty cycle");
        assert_eq!(pca.duty_cycle(7).expect("Should read back"), duty);
    }
}

#[test]
fn test_pca9685_rejects_bad_channel_and_frequency() {
    let bus = SimI2c::new().with_device(pca9685::DEFAULT_ADDRESS, SimPca9685::default());
    let mut pca = Pca9685::new(bus, SimDelay::default());
    pca.init().expect("Should wake controller");
    assert!(matches!(
        pca.set_duty_cycle(16, 0x8000),
        Err(DeviceError::OutOfRange(_))
    ));
    assert!(matches!(
        pca.set_frequency(5000.0),
        Err(DeviceError::OutOfRange(_))
    ));
}

/// The requested resolution is written unchanged into the configuration byte
#[test]
fn test_mcp342x_resolution_in_config_byte() {
    for (resolution, field) in [
        (Resolution::Bits12, 0b00),
        (Resolution::Bits14, 0b01),
        (Resolution::Bits16, 0b10),
        (Resolution::Bits18, 0b11),
    ] {
        let bus = SimI2c::new().with_device(0x68, SimMcp342x::default().with_voltage(0, 0.1));
        let mut adc = Mcp342x::new(bus, SimDelay::default(), 0x68, 0, resolution)
            .expect("Should bind converter");
        let reading = adc.convert_and_read().expect("Should convert");
        assert_eq!(reading.resolution_bits, resolution.bits());

        let (bus, _) = adc.release();
        let writes = bus.writes_to(0x68);
        assert_eq!(writes.len(), 1);
        assert_eq!((writes[0][0] >> 2) & 0b11, field);
        // One-shot conversion start
        assert_ne!(writes[0][0] & 0x80, 0);
        assert_eq!(writes[0][0] & 0x10, 0);
    }
}

#[test]
fn test_mcp342x_timeout_is_not_ready() {
    let sim = SimMcp342x::default().with_not_ready_reads(mcp342x::MAX_POLLS);
    let bus = SimI2c::new().with_device(0x6A, sim);
    let mut adc = Mcp342x::new(bus, SimDelay::default(), 0x6A, 2, Resolution::Bits12)
        .expect("Should bind converter");
    assert!(matches!(
        adc.convert_and_read(),
        Err(DeviceError::NotReady(_))
    ));

    let (bus, _) = adc.release();
    let reads = bus
        .events()
        .iter()
        .filter(|event| matches!(event, I2cEvent::Read { .. }))
        .count();
    assert_eq!(reads, mcp342x::MAX_POLLS as usize);
}

#[test]
fn test_max31865_through_board() {
    let mut board = SimulatedBoard::new().with_max31865(SimMax31865::new(100.0));
    let mut rtd = Max31865Config::default()
        .with_wiring(Wiring::ThreeWire)
        .open(&mut board)
        .expect("Should bind converter");
    let reading = rtd.read().expect("Should convert");
    assert!(reading.temperature_celsius.abs() < 0.05);
}

#[test]
fn test_max31865_fault_is_error() {
    let mut board = SimulatedBoard::new().with_max31865(SimMax31865::new(100.0).with_fault(0x40));
    let mut rtd = Max31865Config::default()
        .open(&mut board)
        .expect("Should bind converter");
    match rtd.read() {
        Err(DeviceError::RtdFault(status)) => assert!(status.low_threshold),
        other => panic!("expected RTD fault, got {:?}", other.map(|r| r.code)),
    }
    // The fault was cleared after being reported
    assert!(rtd.fault().expect("Should read status").is_clear());
}

#[test]
fn test_configs_open_on_simulated_board() {
    let mut board = SimulatedBoard::new()
        .with_i2c_device(1, 0x40, SimPca9685::default())
        .with_i2c_device(3, 0x40, SimHtu21d::default())
        .with_i2c_device(1, 0x69, SimMcp342x::default().with_voltage(1, -0.25));

    let mut pca = Pca9685Config::default()
        .open(&mut board)
        .expect("Should bind PCA9685");
    pca.set_duty_cycle(0, 0xFFFF).expect("Should set duty");

    let mut htu = Htu21dConfig::default()
        .with_bus(3)
        .open(&mut board)
        .expect("Should bind HTU21D");
    htu.read().expect("Should read HTU21D");

    // Bus 1 was handed to the PCA9685 driver
    let mut adc = Mcp342xConfig::default()
        .with_address(0x69)
        .with_channel(1)
        .with_gain(Gain::X2)
        .open(&mut board)
        .expect("Should bind MCP342x");
    assert!(adc.convert_and_read().is_err());
}

#[test]
fn test_output_config_numbering() {
    let mut board = SimulatedBoard::new();
    let output = OutputConfig::default()
        .with_pin(23, PinNumbering::Bcm)
        .open_digital(&mut board)
        .expect("Should claim pin");
    assert_eq!(output.release().pin(), 23);

    let pwm = OutputConfig::default()
        .with_frequency(500.0)
        .open_pwm(&mut board)
        .expect("Should claim PWM pin");
    assert_eq!(pwm.release().frequency_hz(), 500.0);
}

/// Without GPIO support the default board answers for the bench chips
#[cfg(not(feature = "gpio"))]
#[test]
fn test_default_board_quick_start() {
    let mut board = component_library::default_board().expect("Should open board");
    let mut sensor = Htu21dConfig::default()
        .open(&mut board)
        .expect("Should bind HTU21D");
    let reading = sensor.read().expect("Should read simulated sensor");
    assert!((reading.relative_humidity - 45.0).abs() < 0.01);

    let mut board = component_library::default_board().expect("Should open board");
    let mut pca = Pca9685Config::default()
        .with_bus(component_library::platform::sim::BENCH_PCA9685_BUS)
        .open(&mut board)
        .expect("Should bind PCA9685");
    pca.set_duty_cycle(0, 0xFFFF).expect("Should set duty");
    assert_eq!(pca.duty_cycle(0).expect("Should read back"), 0xFFFF);
}

/// Test reading serialization
#[test]
fn test_reading_serialization() {
    let reading = ClimateReading::new(22.5, 45.0);
    let json = serde_json::to_string(&reading).expect("Should serialize");
    let back: ClimateReading = serde_json::from_str(&json).expect("Should deserialize");
    assert_eq!(back.temperature_celsius, 22.5);
    assert_eq!(back.timestamp, reading.timestamp);

    let reading = RtdReading::new(7621, 100.007, 0.018);
    let value: serde_json::Value = serde_json::to_value(&reading).expect("Should serialize");
    assert_eq!(value["code"], 7621);

    let reading = AdcReading {
        timestamp: 1234567890,
        address: 0x68,
        channel: 0,
        resolution_bits: 18,
        gain: 1,
        count: -64000,
        voltage: -1.0,
    };
    let json = serde_json::to_string(&reading).expect("Should serialize");
    assert!(json.contains("\"count\":-64000"));
}
