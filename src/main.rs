//! Component Library - bench commands for Raspberry Pi sensors and actuators
//!
//! Each subcommand acquires a bus or pin, binds one device and performs the
//! read or write the component's example does.

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use component_library::devices::htu21d::Htu21dResolution;
use component_library::devices::max31865::FilterFrequency;
use component_library::platform::sim::{
    SimHtu21d, SimMax31865, SimMcp342x, SimPca9685, SimulatedBoard,
};
use component_library::platform::{bcm_to_board, GPIO_PINS};
use component_library::{
    default_board, Board, Gain, Htu21dConfig, Level, Max31865Config, Mcp342xConfig,
    OutputConfig, OutputSetting, Pca9685Config, PinNumbering, PwmSetting, Resolution, SpiConfig,
    Wiring, DEFAULT_I2C_BUS, DEFAULT_SPI_BUS,
};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn, Level as LogLevel};
use tracing_subscriber::{filter::LevelFilter, EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "component_library")]
#[command(about = "Raspberry Pi sensor and actuator bench commands")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    long_about = "Reads the HTU21D, MAX31865 and MCP342x sensors and drives the PCA9685 and GPIO outputs of the component library bench"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Use simulated devices instead of the Raspberry Pi peripherals
    #[arg(long, global = true)]
    simulate: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Pretty)]
    format: OutputFormat,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Pretty,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Read temperature and humidity from an HTU21D
    Htu21d(Htu21dArgs),

    /// Read an RTD through a MAX31865
    Max31865(Max31865Args),

    /// Read one MCP342x ADC channel
    Mcp342x(Mcp342xArgs),

    /// Set a PCA9685 channel's duty cycle
    Pca9685(Pca9685Args),

    /// Drive a GPIO high or low
    Digital(DigitalArgs),

    /// Drive a GPIO with PWM
    Pwm(PwmArgs),

    /// Show build features and pin information
    Info,
}

#[derive(Args, Debug, Clone)]
struct SamplingArgs {
    /// Number of readings to take (0 runs until interrupted)
    #[arg(short = 'n', long, default_value_t = 1)]
    samples: u32,

    /// Time between readings in milliseconds
    #[arg(short, long, default_value_t = 1000)]
    interval_ms: u64,
}

#[derive(Args, Debug)]
struct Htu21dArgs {
    /// I2C bus number
    #[arg(long, default_value_t = DEFAULT_I2C_BUS)]
    bus: u8,

    /// Device address
    #[arg(long, default_value = "0x40", value_parser = parse_address)]
    address: u8,

    /// Resolution: rh12-t14, rh8-t12, rh10-t13 or rh11-t11
    #[arg(long, default_value_t = Htu21dResolution::Rh12Temp14)]
    resolution: Htu21dResolution,

    /// Switch the on-chip heater on
    #[arg(long)]
    heater: bool,

    #[command(flatten)]
    sampling: SamplingArgs,
}

impl Htu21dArgs {
    fn config(&self) -> Htu21dConfig {
        Htu21dConfig::default()
            .with_bus(self.bus)
            .with_address(self.address)
            .with_resolution(self.resolution)
            .with_heater(self.heater)
    }
}

#[derive(Args, Debug)]
struct Max31865Args {
    /// SPI controller
    #[arg(long, default_value_t = DEFAULT_SPI_BUS)]
    spi_bus: u8,

    /// Chip select GPIO (BCM numbering)
    #[arg(long, default_value_t = 5)]
    cs: u8,

    /// RTD wires: 2, 3 or 4
    #[arg(short, long, default_value_t = Wiring::TwoWire)]
    wires: Wiring,

    /// Mains filter frequency: 50 or 60
    #[arg(long, default_value_t = FilterFrequency::Hz60)]
    filter: FilterFrequency,

    /// RTD resistance at 0 °C
    #[arg(long, default_value_t = 100.0)]
    nominal_ohms: f64,

    /// Reference resistor value
    #[arg(long, default_value_t = 430.0)]
    reference_ohms: f64,

    #[command(flatten)]
    sampling: SamplingArgs,
}

impl Max31865Args {
    fn config(&self) -> Max31865Config {
        let spi = SpiConfig {
            bus: self.spi_bus,
            chip_select_pin: self.cs,
            ..Default::default()
        };
        Max31865Config::default()
            .with_spi(spi)
            .with_wiring(self.wires)
            .with_filter(self.filter)
            .with_element(self.nominal_ohms, self.reference_ohms)
    }
}

#[derive(Args, Debug)]
struct Mcp342xArgs {
    /// I2C bus number
    #[arg(long, default_value_t = DEFAULT_I2C_BUS)]
    bus: u8,

    /// Device address (0x68 to 0x6f)
    #[arg(long, default_value = "0x68", value_parser = parse_address)]
    address: u8,

    /// Input channel (0 to 3)
    #[arg(short, long, default_value_t = 0)]
    channel: u8,

    /// Resolution in bits: 12, 14, 16 or 18
    #[arg(short, long, default_value_t = Resolution::Bits18)]
    resolution: Resolution,

    /// PGA gain: 1, 2, 4 or 8
    #[arg(short, long, default_value_t = Gain::X1)]
    gain: Gain,

    /// Multiplier applied to the measured voltage
    #[arg(long, default_value_t = 1.0)]
    scale: f64,

    /// Offset added after scaling
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    offset: f64,

    #[command(flatten)]
    sampling: SamplingArgs,
}

impl Mcp342xArgs {
    fn config(&self) -> Mcp342xConfig {
        Mcp342xConfig::default()
            .with_bus(self.bus)
            .with_address(self.address)
            .with_channel(self.channel)
            .with_resolution(self.resolution)
            .with_gain(self.gain)
            .with_scaling(self.scale, self.offset)
    }
}

#[derive(Args, Debug)]
struct Pca9685Args {
    /// I2C bus number
    #[arg(long, default_value_t = DEFAULT_I2C_BUS)]
    bus: u8,

    /// Device address
    #[arg(long, default_value = "0x40", value_parser = parse_address)]
    address: u8,

    /// PWM frequency in Hz (24 to 1526 with the internal oscillator)
    #[arg(long, default_value_t = 60.0)]
    frequency: f64,

    /// Output channel (0 to 15)
    #[arg(short, long, default_value_t = 0)]
    channel: u8,

    /// Duty cycle, 0 to 0xffff
    #[arg(long, default_value = "0xffff", value_parser = parse_duty_cycle)]
    duty: u16,

    /// How long to keep running after applying the setting, in milliseconds
    #[arg(long, default_value_t = 5000)]
    hold_ms: u64,
}

impl Pca9685Args {
    fn config(&self) -> Pca9685Config {
        Pca9685Config::default()
            .with_bus(self.bus)
            .with_address(self.address)
            .with_frequency(self.frequency)
            .with_channel(self.channel)
            .with_duty_cycle(self.duty)
    }
}

#[derive(Args, Debug, Clone)]
struct PinArgs {
    /// Pin number
    #[arg(short, long, default_value_t = 12)]
    pin: u8,

    /// Pin numbering: board (header position) or bcm
    #[arg(long, default_value_t = PinNumbering::Board)]
    numbering: PinNumbering,
}

#[derive(Args, Debug)]
struct DigitalArgs {
    #[command(flatten)]
    pin: PinArgs,

    /// Level to drive: high or low
    #[arg(short, long, default_value_t = Level::High)]
    level: Level,

    /// Drive high, wait this many milliseconds, then drive low
    #[arg(long, conflicts_with = "level")]
    pulse_ms: Option<u64>,

    /// How long to keep running after setting the level, in milliseconds
    #[arg(long, default_value_t = 5000)]
    hold_ms: u64,
}

#[derive(Args, Debug)]
struct PwmArgs {
    #[command(flatten)]
    pin: PinArgs,

    /// PWM frequency in Hz
    #[arg(long, default_value_t = 1000.0)]
    frequency: f64,

    /// Duty cycle in percent (0 to 100)
    #[arg(long, default_value_t = 50.0)]
    duty: f32,

    /// How long to keep the output running, in milliseconds
    #[arg(long, default_value_t = 5000)]
    hold_ms: u64,
}

impl PwmArgs {
    fn config(&self) -> OutputConfig {
        OutputConfig::default()
            .with_pin(self.pin.pin, self.pin.numbering)
            .with_frequency(self.frequency)
            .with_duty_percent(self.duty)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing/logging
    init_logging(&cli)?;

    if cli.format == OutputFormat::Pretty {
        print_banner();
    }

    match &cli.command {
        Commands::Htu21d(args) => htu21d_command(&cli, args).await,
        Commands::Max31865(args) => max31865_command(&cli, args).await,
        Commands::Mcp342x(args) => mcp342x_command(&cli, args).await,
        Commands::Pca9685(args) => pca9685_command(&cli, args).await,
        Commands::Digital(args) => digital_command(&cli, args).await,
        Commands::Pwm(args) => pwm_command(&cli, args).await,
        Commands::Info => {
            info_command(&cli);
            Ok(())
        }
    }
}

fn log_level(cli: &Cli) -> LogLevel {
    if cli.debug {
        LogLevel::DEBUG
    } else if cli.verbose {
        LogLevel::INFO
    } else {
        LogLevel::WARN
    }
}

/// `RUST_LOG` directives are applied on top of the level chosen by the flags.
fn log_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy()
}

fn log_subscriber(level: LogLevel) -> impl tracing::Subscriber + Send + Sync {
    FmtSubscriber::builder()
        .with_env_filter(log_filter(level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish()
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    tracing::subscriber::set_global_default(log_subscriber(log_level(cli)))?;

    Ok(())
}

fn print_banner() {
    println!("Component Library - Raspberry Pi bench");
    println!("   Version: {}", env!("CARGO_PKG_VERSION"));
    println!();
}

fn parse_address(s: &str) -> Result<u8, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse::<u8>(),
    };
    match parsed {
        Ok(address) if address <= 0x7F => Ok(address),
        Ok(address) => Err(format!("{:#04x} is not a 7-bit I2C address", address)),
        Err(e) => Err(format!("invalid address '{}': {}", s, e)),
    }
}

fn parse_duty_cycle(s: &str) -> Result<u16, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse::<u16>(),
    };
    parsed.map_err(|e| format!("invalid duty cycle '{}': {}", s, e))
}

/// Simulated devices are used when asked for or when GPIO support is not compiled.
fn use_simulation(cli: &Cli) -> bool {
    if cli.simulate {
        return true;
    }
    if cfg!(not(feature = "gpio")) {
        warn!("GPIO support not compiled, using simulated devices");
        return true;
    }
    false
}

fn emit<T: Serialize + fmt::Display>(
    value: &T,
    timestamp: u64,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(value)?),
        OutputFormat::Pretty => {
            println!(
                "[{}]",
                chrono::DateTime::from_timestamp_millis(timestamp as i64)
                    .unwrap_or_default()
                    .format("%Y-%m-%d %H:%M:%S%.3f UTC")
            );
            println!("{}", value);
        }
    }
    Ok(())
}

/// Call `read` on every tick and print the result, stopping early on Ctrl-C.
async fn sample<T, F>(sampling: &SamplingArgs, format: OutputFormat, mut read: F) -> anyhow::Result<()>
where
    T: Serialize + fmt::Display,
    F: FnMut() -> anyhow::Result<(T, u64)>,
{
    let mut ticker = tokio::time::interval(Duration::from_millis(sampling.interval_ms.max(1)));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut taken = 0u32;
    while sampling.samples == 0 || taken < sampling.samples {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Interrupted after {} samples", taken);
                break;
            }
            _ = ticker.tick() => {}
        }
        let (reading, timestamp) =
            read().with_context(|| format!("Failed to take sample {}", taken + 1))?;
        emit(&reading, timestamp, format)?;
        taken += 1;
    }

    debug!(taken, "sampling finished");
    Ok(())
}

/// Keep the process (and the claimed outputs) alive for `ms` milliseconds.
async fn hold(ms: u64) {
    if ms == 0 {
        return;
    }
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_millis(ms)) => {}
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    }
}

async fn htu21d_command(cli: &Cli, args: &Htu21dArgs) -> anyhow::Result<()> {
    let config = args.config();
    if use_simulation(cli) {
        let mut board = SimulatedBoard::new().with_i2c_device(
            config.bus,
            config.address,
            SimHtu21d::default(),
        );
        read_htu21d(&mut board, &config, &args.sampling, cli.format).await
    } else {
        let mut board = default_board().context("Failed to open the board")?;
        read_htu21d(&mut board, &config, &args.sampling, cli.format).await
    }
}

async fn read_htu21d<B: Board>(
    board: &mut B,
    config: &Htu21dConfig,
    sampling: &SamplingArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let mut sensor = config.open(board).context("Failed to bind HTU21D")?;
    info!(
        "HTU21D on /dev/i2c-{} at {:#04x} ({})",
        config.bus,
        config.address,
        board.name()
    );
    sample(sampling, format, || {
        let reading = sensor.read()?;
        let timestamp = reading.timestamp;
        Ok((reading, timestamp))
    })
    .await
}

async fn max31865_command(cli: &Cli, args: &Max31865Args) -> anyhow::Result<()> {
    let config = args.config();
    if use_simulation(cli) {
        let mut board = SimulatedBoard::new().with_max31865(
            SimMax31865::default().with_reference(config.reference_ohms),
        );
        read_max31865(&mut board, &config, &args.sampling, cli.format).await
    } else {
        let mut board = default_board().context("Failed to open the board")?;
        read_max31865(&mut board, &config, &args.sampling, cli.format).await
    }
}

async fn read_max31865<B: Board>(
    board: &mut B,
    config: &Max31865Config,
    sampling: &SamplingArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let mut rtd = config.open(board).context("Failed to bind MAX31865")?;
    info!(
        "MAX31865 on SPI{} CS GPIO{}, {}-wire ({})",
        config.spi.bus,
        config.spi.chip_select_pin,
        config.wiring.wires(),
        board.name()
    );
    sample(sampling, format, || {
        let reading = rtd.read()?;
        let timestamp = reading.timestamp;
        Ok((reading, timestamp))
    })
    .await
}

async fn mcp342x_command(cli: &Cli, args: &Mcp342xArgs) -> anyhow::Result<()> {
    let config = args.config();
    if use_simulation(cli) {
        let device = SimMcp342x::default().with_voltage(usize::from(config.channel % 4), 1.5);
        let mut board = SimulatedBoard::new().with_i2c_device(config.bus, config.address, device);
        read_mcp342x(&mut board, &config, &args.sampling, cli.format).await
    } else {
        let mut board = default_board().context("Failed to open the board")?;
        read_mcp342x(&mut board, &config, &args.sampling, cli.format).await
    }
}

async fn read_mcp342x<B: Board>(
    board: &mut B,
    config: &Mcp342xConfig,
    sampling: &SamplingArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let mut adc = config.open(board).context("Failed to bind MCP342x")?;
    info!(
        "MCP342x on /dev/i2c-{} at {:#04x}, channel {} ({})",
        config.bus,
        config.address,
        config.channel,
        board.name()
    );
    sample(sampling, format, || {
        let reading = adc.convert_and_read()?;
        let timestamp = reading.timestamp;
        Ok((reading, timestamp))
    })
    .await
}

async fn pca9685_command(cli: &Cli, args: &Pca9685Args) -> anyhow::Result<()> {
    let config = args.config();
    if use_simulation(cli) {
        let mut board = SimulatedBoard::new().with_i2c_device(
            config.bus,
            config.address,
            SimPca9685::default(),
        );
        drive_pca9685(&mut board, &config, args.hold_ms, cli.format).await?;
    } else {
        let mut board = default_board().context("Failed to open the board")?;
        drive_pca9685(&mut board, &config, args.hold_ms, cli.format).await?;
    }
    Ok(())
}

async fn drive_pca9685<B: Board>(
    board: &mut B,
    config: &Pca9685Config,
    hold_ms: u64,
    format: OutputFormat,
) -> anyhow::Result<PwmSetting> {
    let mut pca = config.open(board).context("Failed to bind PCA9685")?;
    pca.set_duty_cycle(config.channel, config.duty_cycle)?;

    let setting = PwmSetting::new(
        config.channel,
        pca.frequency()?,
        pca.duty_cycle(config.channel)?,
    );
    emit(&setting, setting.timestamp, format)?;

    hold(hold_ms).await;
    Ok(setting)
}

async fn digital_command(cli: &Cli, args: &DigitalArgs) -> anyhow::Result<()> {
    let config = OutputConfig::default().with_pin(args.pin.pin, args.pin.numbering);
    if use_simulation(cli) {
        let mut board = SimulatedBoard::new();
        drive_digital(&mut board, &config, args, cli.format).await
    } else {
        let mut board = default_board().context("Failed to open the board")?;
        drive_digital(&mut board, &config, args, cli.format).await
    }
}

async fn drive_digital<B: Board>(
    board: &mut B,
    config: &OutputConfig,
    args: &DigitalArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let bcm = config.bcm_pin()?;
    let mut output = config
        .open_digital(board)
        .with_context(|| format!("Failed to claim GPIO{}", bcm))?;

    match args.pulse_ms {
        Some(pulse_ms) => {
            output.set_high()?;
            let setting = OutputSetting::digital(bcm, Level::High);
            emit(&setting, setting.timestamp, format)?;

            hold(pulse_ms).await;

            output.set_low()?;
            let setting = OutputSetting::digital(bcm, Level::Low);
            emit(&setting, setting.timestamp, format)?;
        }
        None => {
            output.set(args.level)?;
            let setting = OutputSetting::digital(bcm, args.level);
            emit(&setting, setting.timestamp, format)?;
            hold(args.hold_ms).await;
        }
    }
    Ok(())
}

async fn pwm_command(cli: &Cli, args: &PwmArgs) -> anyhow::Result<()> {
    let config = args.config();
    if use_simulation(cli) {
        let mut board = SimulatedBoard::new();
        drive_pwm(&mut board, &config, args.hold_ms, cli.format).await
    } else {
        let mut board = default_board().context("Failed to open the board")?;
        drive_pwm(&mut board, &config, args.hold_ms, cli.format).await
    }
}

async fn drive_pwm<B: Board>(
    board: &mut B,
    config: &OutputConfig,
    hold_ms: u64,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let bcm = config.bcm_pin()?;
    let mut output = config
        .open_pwm(board)
        .with_context(|| format!("Failed to start PWM on GPIO{}", bcm))?;
    output.set_duty_percent(config.duty_percent)?;

    let setting = OutputSetting::pwm(bcm, config.frequency_hz, output.duty_percent());
    emit(&setting, setting.timestamp, format)?;

    hold(hold_ms).await;
    Ok(())
}

fn info_command(cli: &Cli) {
    println!("Component Library Information");
    println!("=============================");
    println!();

    println!("Devices:");
    println!("  HTU21D    I2C {:#04x}", component_library::devices::htu21d::DEFAULT_ADDRESS);
    println!("  MAX31865  SPI{} CS GPIO5, mode 1", DEFAULT_SPI_BUS);
    println!(
        "  MCP342x   I2C {:#04x}..={:#04x}",
        component_library::devices::mcp342x::MIN_ADDRESS,
        component_library::devices::mcp342x::MAX_ADDRESS
    );
    println!("  PCA9685   I2C {:#04x}", component_library::devices::pca9685::DEFAULT_ADDRESS);
    println!();

    println!("Header GPIOs (BCM -> board pin):");
    for bcm in GPIO_PINS {
        if let Some(board) = bcm_to_board(bcm) {
            println!("  GPIO{:<2} -> pin {}", bcm, board);
        }
    }
    println!();

    println!("Features compiled:");
    #[cfg(feature = "gpio")]
    println!("  - GPIO support: ✓");
    #[cfg(not(feature = "gpio"))]
    println!("  - GPIO support: ✗");

    if cli.simulate {
        println!("  - Simulation requested");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from([
            "component_library",
            "mcp342x",
            "--address",
            "0x6a",
            "--resolution",
            "16",
            "--gain",
            "x4",
        ])
        .unwrap();
        match cli.command {
            Commands::Mcp342x(args) => {
                assert_eq!(args.address, 0x6A);
                assert_eq!(args.resolution, Resolution::Bits16);
                assert_eq!(args.gain, Gain::X4);
            }
            _ => panic!("expected mcp342x command"),
        }
    }

    #[test]
    fn test_default_values() {
        let cli = Cli::try_parse_from(["component_library", "pca9685"]).unwrap();
        assert!(!cli.simulate);
        assert_eq!(cli.format, OutputFormat::Pretty);
        match cli.command {
            Commands::Pca9685(args) => {
                assert_eq!(args.address, 0x40);
                assert_eq!(args.frequency, 60.0);
                assert_eq!(args.duty, 0xFFFF);
                assert_eq!(args.hold_ms, 5000);
            }
            _ => panic!("expected pca9685 command"),
        }
    }

    #[test]
    fn test_logging_flags_select_level() {
        let cli = Cli::try_parse_from(["component_library", "-d", "info"]).unwrap();
        assert_eq!(log_level(&cli), LogLevel::DEBUG);
        let cli = Cli::try_parse_from(["component_library", "-v", "info"]).unwrap();
        assert_eq!(log_level(&cli), LogLevel::INFO);
        let cli = Cli::try_parse_from(["component_library", "info"]).unwrap();
        assert_eq!(log_level(&cli), LogLevel::WARN);

        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        tracing::subscriber::with_default(log_subscriber(LogLevel::DEBUG), || {
            assert!(tracing::enabled!(LogLevel::DEBUG));
            assert!(!tracing::enabled!(LogLevel::TRACE));
        });
        tracing::subscriber::with_default(log_subscriber(LogLevel::WARN), || {
            assert!(tracing::enabled!(LogLevel::WARN));
            assert!(!tracing::enabled!(LogLevel::INFO));
        });
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["component_library", "digital", "--simulate", "-f", "json"])
                .unwrap();
        assert!(cli.simulate);
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Commands::Digital(args) => {
                assert_eq!(args.pin.pin, 12);
                assert_eq!(args.pin.numbering, PinNumbering::Board);
                assert_eq!(args.level, Level::High);
            }
            _ => panic!("expected digital command"),
        }
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("0x40"), Ok(0x40));
        assert_eq!(parse_address("104"), Ok(0x68));
        assert!(parse_address("0x80").is_err());
        assert!(parse_address("zz").is_err());
        assert_eq!(parse_duty_cycle("0xffff"), Ok(0xFFFF));
        assert_eq!(parse_duty_cycle("32768"), Ok(0x8000));
    }

    #[tokio::test]
    async fn test_simulated_htu21d_sampling() {
        let config = Htu21dConfig::default();
        let mut board =
            SimulatedBoard::new().with_i2c_device(config.bus, config.address, SimHtu21d::default());
        let sampling = SamplingArgs {
            samples: 3,
            interval_ms: 1,
        };
        read_htu21d(&mut board, &config, &sampling, OutputFormat::Json)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_simulated_pca9685_full_on() {
        let config = Pca9685Config::default();
        let mut board =
            SimulatedBoard::new().with_i2c_device(config.bus, config.address, SimPca9685::default());
        let setting = drive_pca9685(&mut board, &config, 0, OutputFormat::Json)
            .await
            .unwrap();
        assert_eq!(setting.duty_cycle, 0xFFFF);
        assert!((setting.frequency_hz - 59.84).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_missing_device_reports_error() {
        let mut board = SimulatedBoard::new();
        let sampling = SamplingArgs {
            samples: 1,
            interval_ms: 1,
        };
        let result =
            read_mcp342x(&mut board, &Mcp342xConfig::default(), &sampling, OutputFormat::Json)
                .await;
        assert!(result.is_err());
    }
}
