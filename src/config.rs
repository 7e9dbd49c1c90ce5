//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::capabilities::{is_type_allowed, ModuleDescriptor, ModuleSlot, ModuleType};
use crate::error::{FlySkyLinkError, Result};
use crate::flysky::engine::{LinkTiming, ModuleLinkEngine};
use crate::flysky::protocol::{DEFAULT_PERIOD_MS, DEFAULT_SERVO_FREQUENCY_HZ, DEFAULT_TX_POWER_DBM, MAX_CHANNELS, MODULE_TIMEOUT_MS};
use crate::flysky::state::{BindPower, ChannelDataMode, RfProtocol, RxBusType, RxPulseMode};

/// Baud rates the module UART can be driven at
const ALLOWED_BAUD_RATES: [u32; 6] = [57_600, 115_200, 230_400, 460_800, 921_600, 1_500_000];

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub module: ModuleConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    /// Tried in order when `port` cannot be opened
    #[serde(default)]
    pub fallback_ports: Vec<String>,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
}

/// Link timing configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    /// Output period, one frame per period
    #[serde(default = "default_period_ms")]
    pub period_ms: u32,

    /// How long the module gets to answer a configuration step
    #[serde(default = "default_module_timeout_ms")]
    pub module_timeout_ms: u32,

    /// Interval between link status log lines
    #[serde(default = "default_status_interval_ms")]
    pub status_interval_ms: u64,
}

/// Module and receiver settings pushed into the engine at startup
#[derive(Debug, Deserialize, Clone)]
pub struct ModuleConfig {
    #[serde(default = "default_slot")]
    pub slot: ModuleSlot,

    #[serde(default = "default_module_type")]
    pub module_type: ModuleType,

    #[serde(default = "default_transmitter_id")]
    pub transmitter_id: u32,

    /// Receiver id from a previous bind
    #[serde(default)]
    pub receiver_id: Option<u32>,

    #[serde(default)]
    pub rf_protocol: RfProtocol,

    #[serde(default)]
    pub bind_power: BindPower,

    #[serde(default = "default_channel_count")]
    pub channel_count: u8,

    #[serde(default)]
    pub channel_data_mode: ChannelDataMode,

    #[serde(default = "default_tx_power_dbm")]
    pub tx_power_dbm: u8,

    #[serde(default)]
    pub pulse_mode: RxPulseMode,

    #[serde(default)]
    pub bus_type: RxBusType,

    #[serde(default = "default_servo_frequency_hz")]
    pub servo_frequency_hz: u16,

    /// Start in bind mode instead of the normal configuration sequence
    #[serde(default)]
    pub bind_on_start: bool,
}

/// Telemetry configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,

    #[serde(default = "default_log_interval_ms")]
    pub log_interval_ms: u64,

    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Diagnostic logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Also write a daily rolling log file here
    #[serde(default)]
    pub directory: Option<String>,

    #[serde(default = "default_log_file_prefix")]
    pub file_prefix: String,
}

// Default value functions
fn default_serial_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_baud_rate() -> u32 { 115_200 }
fn default_reconnect_interval_ms() -> u64 { 1000 }

fn default_period_ms() -> u32 { DEFAULT_PERIOD_MS }
fn default_module_timeout_ms() -> u32 { MODULE_TIMEOUT_MS }
fn default_status_interval_ms() -> u64 { 5000 }

fn default_slot() -> ModuleSlot { ModuleSlot::Internal }
fn default_module_type() -> ModuleType { ModuleType::Flysky }
fn default_transmitter_id() -> u32 { 0x0808_0808 }
fn default_channel_count() -> u8 { 14 }
fn default_tx_power_dbm() -> u8 { DEFAULT_TX_POWER_DBM }
fn default_servo_frequency_hz() -> u16 { DEFAULT_SERVO_FREQUENCY_HZ }

fn default_telemetry_enabled() -> bool { true }
fn default_log_dir() -> String { "./logs".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }
fn default_log_interval_ms() -> u64 { 100 }
fn default_log_format() -> String { "jsonl".to_string() }

fn default_log_level() -> String { "info".to_string() }
fn default_log_file_prefix() -> String { "flysky-link.log".to_string() }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            fallback_ports: Vec::new(),
            baud_rate: default_baud_rate(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            period_ms: default_period_ms(),
            module_timeout_ms: default_module_timeout_ms(),
            status_interval_ms: default_status_interval_ms(),
        }
    }
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            slot: default_slot(),
            module_type: default_module_type(),
            transmitter_id: default_transmitter_id(),
            receiver_id: None,
            rf_protocol: RfProtocol::default(),
            bind_power: BindPower::default(),
            channel_count: default_channel_count(),
            channel_data_mode: ChannelDataMode::default(),
            tx_power_dbm: default_tx_power_dbm(),
            pulse_mode: RxPulseMode::default(),
            bus_type: RxBusType::default(),
            servo_frequency_hz: default_servo_frequency_hz(),
            bind_on_start: false,
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_telemetry_enabled(),
            log_dir: default_log_dir(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
            log_interval_ms: default_log_interval_ms(),
            format: default_log_format(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
            file_prefix: default_log_file_prefix(),
        }
    }
}

impl SerialConfig {
    /// `port` followed by the fallbacks
    pub fn candidate_paths(&self) -> Vec<String> {
        std::iter::once(self.port.clone())
            .chain(self.fallback_ports.iter().cloned())
            .collect()
    }
}

impl LinkConfig {
    pub fn timing(&self) -> LinkTiming {
        LinkTiming {
            period_ms: self.period_ms,
            module_timeout_ms: self.module_timeout_ms,
        }
    }
}

impl ModuleConfig {
    /// Capability descriptor of the configured slot
    pub fn descriptor(&self) -> ModuleDescriptor {
        let mut descriptor = ModuleDescriptor::new(self.slot, self.module_type);
        descriptor.channels_count = self.channel_count as i8 - 8;
        descriptor
    }

    /// Push the module and receiver settings into `engine`
    pub fn apply(&self, engine: &mut ModuleLinkEngine) {
        engine.set_transmitter_id(self.transmitter_id);
        if let Some(receiver_id) = self.receiver_id {
            engine.set_receiver_id(receiver_id);
        }
        engine.set_rf_protocol(self.rf_protocol);
        engine.set_bind_power(self.bind_power);
        engine.set_channel_count(self.channel_count);
        engine.set_channel_data_mode(self.channel_data_mode);
        engine.set_receiver_output(self.pulse_mode, self.bus_type, self.servo_frequency_hz);
        engine.set_transmitter_power(self.tx_power_dbm);

        if self.bind_on_start {
            engine.bind_receiver();
        }
    }
}

fn invalid(message: impl std::fmt::Display) -> FlySkyLinkError {
    FlySkyLinkError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use flysky_link::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every value against its valid range
    pub fn validate(&self) -> Result<()> {
        if self.serial.port.is_empty() || self.serial.fallback_ports.iter().any(|port| port.is_empty()) {
            return Err(invalid("serial port cannot be empty"));
        }

        if !ALLOWED_BAUD_RATES.contains(&self.serial.baud_rate) {
            return Err(invalid(format!("baud_rate must be one of: {:?}", ALLOWED_BAUD_RATES)));
        }

        if self.serial.reconnect_interval_ms == 0 || self.serial.reconnect_interval_ms > 60000 {
            return Err(invalid("reconnect_interval_ms must be between 1 and 60000"));
        }

        if self.link.period_ms == 0 || self.link.period_ms > 100 {
            return Err(invalid("period_ms must be between 1 and 100"));
        }

        if self.link.module_timeout_ms < self.link.period_ms {
            return Err(invalid("module_timeout_ms must not be shorter than period_ms"));
        }

        if self.link.status_interval_ms == 0 {
            return Err(invalid("status_interval_ms must be greater than 0"));
        }

        if !is_type_allowed(self.module.slot, self.module.module_type) {
            return Err(invalid(format!(
                "module type {:?} is not allowed in the {:?} slot",
                self.module.module_type, self.module.slot
            )));
        }

        if self.module.channel_count == 0 || self.module.channel_count as usize > MAX_CHANNELS {
            return Err(invalid(format!("channel_count must be between 1 and {}", MAX_CHANNELS)));
        }

        if self.module.servo_frequency_hz < 50 || self.module.servo_frequency_hz > 400 {
            return Err(invalid("servo_frequency_hz must be between 50 and 400"));
        }

        if self.telemetry.enabled && self.telemetry.log_dir.is_empty() {
            return Err(invalid("telemetry log_dir cannot be empty when enabled"));
        }

        if self.telemetry.max_records_per_file == 0 {
            return Err(invalid("max_records_per_file must be greater than 0"));
        }

        if self.telemetry.max_files_to_keep == 0 {
            return Err(invalid("max_files_to_keep must be greater than 0"));
        }

        if self.telemetry.log_interval_ms == 0 || self.telemetry.log_interval_ms > 60000 {
            return Err(invalid("log_interval_ms must be between 1 and 60000"));
        }

        if self.telemetry.format != "jsonl" {
            return Err(invalid("log format must be 'jsonl' (only supported format)"));
        }

        if self.logging.level.is_empty() {
            return Err(invalid("logging level cannot be empty"));
        }

        if self.logging.directory.as_deref() == Some("") || self.logging.file_prefix.is_empty() {
            return Err(invalid("logging directory and file_prefix cannot be empty"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flysky::session::SessionState;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn load_str(toml_content: &str) -> Result<Config> {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();
        Config::load(temp_file.path())
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.link.timing().timeout_ticks(), 17);
        assert_eq!(config.module.slot, ModuleSlot::Internal);
        assert_eq!(config.module.module_type, ModuleType::Flysky);
    }

    #[test]
    fn test_load_config_from_file() {
        let config = load_str(
            r#"
[serial]
port = "/dev/ttyS3"
fallback_ports = ["/dev/ttyUSB1"]
baud_rate = 921600

[link]
period_ms = 5

[module]
transmitter_id = 0x01020304
receiver_id = 0x0A0B0C0D
rf_protocol = "afhds2a"
bind_power = "low"
channel_count = 8
pulse_mode = "ppm"
bus_type = "sbus"
servo_frequency_hz = 333

[telemetry]
enabled = false

[logging]
level = "debug"
directory = "/tmp/flysky"
"#,
        )
        .unwrap();

        assert_eq!(config.serial.candidate_paths(), vec!["/dev/ttyS3", "/dev/ttyUSB1"]);
        assert_eq!(config.serial.baud_rate, 921_600);
        assert_eq!(config.link.period_ms, 5);
        assert_eq!(config.link.module_timeout_ms, 155);
        assert_eq!(config.module.rf_protocol, RfProtocol::Afhds2a);
        assert_eq!(config.module.bind_power, BindPower::Low);
        assert_eq!(config.module.pulse_mode, RxPulseMode::Ppm);
        assert_eq!(config.module.bus_type, RxBusType::Sbus);
        assert_eq!(config.module.receiver_id, Some(0x0A0B_0C0D));
        assert!(!config.telemetry.enabled);
        assert_eq!(config.logging.directory.as_deref(), Some("/tmp/flysky"));
    }

    #[test]
    fn test_load_empty_file_uses_defaults() {
        let config = load_str("").unwrap();
        assert_eq!(config.serial.port, "/dev/ttyUSB0");
        assert_eq!(config.module.channel_count, 14);
    }

    #[test]
    fn test_load_invalid_toml() {
        let result = load_str("[serial\nport = 1");
        assert!(matches!(result, Err(FlySkyLinkError::Config(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/flysky-link.toml");
        assert!(matches!(result, Err(FlySkyLinkError::Io(_))));
    }

    #[test]
    fn test_unknown_enum_value_rejected() {
        let result = load_str("[module]\nbus_type = \"uart\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_serial_port() {
        let mut config = Config::default();
        config.serial.port = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_baud_rate() {
        let mut config = Config::default();
        config.serial.baud_rate = 420_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_period_bounds() {
        let mut config = Config::default();
        config.link.period_ms = 0;
        assert!(config.validate().is_err());

        config.link.period_ms = 101;
        assert!(config.validate().is_err());

        config.link.period_ms = 100;
        config.link.module_timeout_ms = 99;
        assert!(config.validate().is_err(), "timeout shorter than one period");
    }

    #[test]
    fn test_channel_count_bounds() {
        let mut config = Config::default();
        config.module.channel_count = 0;
        assert!(config.validate().is_err());
        config.module.channel_count = 17;
        assert!(config.validate().is_err());
        config.module.channel_count = 16;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_servo_frequency_bounds() {
        let mut config = Config::default();
        config.module.servo_frequency_hz = 49;
        assert!(config.validate().is_err());
        config.module.servo_frequency_hz = 401;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_module_type_must_fit_slot() {
        let mut config = Config::default();
        config.module.module_type = ModuleType::Ppm;
        assert!(config.validate().is_err());

        config.module.slot = ModuleSlot::External;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_telemetry_limits() {
        let mut config = Config::default();
        config.telemetry.max_records_per_file = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.telemetry.max_files_to_keep = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.telemetry.format = "csv".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_dir_when_disabled() {
        let mut config = Config::default();
        config.telemetry.enabled = false;
        config.telemetry.log_dir = String::new();
        assert!(config.validate().is_ok());

        config.telemetry.enabled = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_logging_directory() {
        let mut config = Config::default();
        config.logging.directory = Some(String::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_descriptor() {
        let config = Config::default();
        let descriptor = config.module.descriptor();
        assert!(descriptor.is_flysky());
        assert_eq!(descriptor.sent_channels(), 14);
    }

    #[test]
    fn test_apply_to_engine() {
        let mut module = ModuleConfig::default();
        module.transmitter_id = 0x1122_3344;
        module.receiver_id = Some(0x5566_7788);
        module.channel_count = 6;
        module.tx_power_dbm = 30;
        module.servo_frequency_hz = 200;

        let mut engine = ModuleLinkEngine::new();
        module.apply(&mut engine);

        assert_eq!(engine.transmitter_id(), 0x1122_3344);
        assert_eq!(engine.receiver_id(), 0x5566_7788);
        assert_eq!(engine.module().rf.channel_count, 6);
        assert_eq!(engine.module().tx_power_dbm, 30);
        assert_eq!(engine.module().rx.servo_frequency, 200);
        assert_eq!(engine.state(), SessionState::SetTxPower);
        assert!(!engine.is_binding());
    }

    #[test]
    fn test_apply_bind_on_start() {
        let mut module = ModuleConfig::default();
        module.bind_on_start = true;

        let mut engine = ModuleLinkEngine::new();
        module.apply(&mut engine);

        assert!(engine.is_binding());
        assert_eq!(engine.state(), SessionState::Init);
    }
}
