//! # FlySky Link
//!
//! Drives a FlySky RF module attached to a serial port: runs the link engine
//! once per output period, logs link status and writes receiver telemetry to
//! JSONL files.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tokio::time::{interval, sleep, Duration};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use flysky_link::config::{Config, LoggingConfig, SerialConfig};
use flysky_link::flysky::ModuleRegistry;
use flysky_link::link::LinkDriver;
use flysky_link::serial::{FlySkySerial, TokioSerialPort};
use flysky_link::telemetry::{TelemetryLogger, TelemetryRecord};

/// Configuration file used when none is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Main entry point for FlySky Link
///
/// # Control Flow
///
/// 1. Load configuration (first argument, or `config/default.toml` if it
///    exists, or built-in defaults)
/// 2. Set up logging, optionally with a daily rolling file
/// 3. Create the engine for the configured slot and apply module settings
/// 4. Open the serial port, retrying until it appears or Ctrl+C
/// 5. Tick the engine every output period until Ctrl+C
///
/// # Examples
///
/// ```bash
/// RUST_LOG=flysky_link=debug cargo run --release -- config/default.toml
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    let (config, config_source) = load_config(std::env::args().nth(1))?;
    let _log_guard = init_logging(&config.logging)?;

    info!("FlySky Link v{} starting...", env!("CARGO_PKG_VERSION"));
    match &config_source {
        Some(path) => info!("Configuration loaded from {}", path.display()),
        None => info!("No configuration file, using defaults"),
    }

    let slot = config.module.slot;
    let mut registry = ModuleRegistry::new(config.link.timing());
    match registry.configure(&config.module.descriptor()) {
        Some(engine) => config.module.apply(engine),
        None => bail!(
            "{:?} slot is configured for {:?}, which has no FlySky link",
            slot,
            config.module.module_type
        ),
    }

    let Some(port) = open_serial(&config.serial).await else {
        info!("Shutting down before the module was found");
        return Ok(());
    };
    let mut driver = LinkDriver::new(port);

    let mut telemetry = if config.telemetry.enabled {
        Some(TelemetryLogger::from_config(&config.telemetry).context("Failed to set up telemetry log")?)
    } else {
        None
    };

    let mut link_interval = interval(Duration::from_millis(u64::from(config.link.period_ms)));
    let mut status_interval = interval(Duration::from_millis(config.link.status_interval_ms));
    let mut telemetry_interval = interval(Duration::from_millis(config.telemetry.log_interval_ms));

    info!(
        "Starting link loop on {:?} slot ({} ms period, {} ticks per retry)",
        slot,
        config.link.period_ms,
        config.link.timing().timeout_ticks()
    );
    info!("Press Ctrl+C to exit");

    loop {
        tokio::select! {
            _ = link_interval.tick() => {
                if let Some(engine) = registry.get_mut(slot) {
                    driver.run_tick(engine).await;
                }
            }

            _ = status_interval.tick() => {
                if let Some(engine) = registry.get(slot) {
                    let stats = engine.stats();
                    let transport = driver.stats();
                    info!(
                        "Link {:?}: frame {}, sent {}, replies {} ok / {} rejected, overflows {}, write errors {}",
                        engine.state(),
                        engine.frame_index(),
                        stats.frames_sent,
                        stats.replies_accepted,
                        stats.replies_rejected,
                        engine.overflow_count(),
                        transport.write_errors
                    );
                }
            }

            _ = telemetry_interval.tick(), if telemetry.is_some() => {
                if let (Some(logger), Some(engine)) = (telemetry.as_mut(), registry.get(slot)) {
                    if let Err(e) = logger.log(&TelemetryRecord::from_engine(slot, engine)) {
                        warn!("Failed to write telemetry: {}", e);
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    if let Some(logger) = telemetry.as_mut() {
        logger.flush()?;
    }
    info!("Frames written: {}", driver.stats().frames_written);

    Ok(())
}

/// Resolve and load the configuration
///
/// An explicit path must exist; the default path is optional.
fn load_config(arg: Option<String>) -> Result<(Config, Option<PathBuf>)> {
    let path = match arg {
        Some(path) => PathBuf::from(path),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => PathBuf::from(DEFAULT_CONFIG_PATH),
        None => return Ok((Config::default(), None)),
    };

    let config = Config::load(&path).with_context(|| format!("Failed to load {}", path.display()))?;
    Ok((config, Some(path)))
}

/// Console logging plus an optional daily rolling file
///
/// `RUST_LOG` overrides the configured level. The returned guard must live
/// until exit so buffered file output is flushed.
fn init_logging(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .context("Invalid logging level")?;

    let registry = tracing_subscriber::registry().with(filter).with(fmt::layer());

    match &logging.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, &logging.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .init();
            Ok(Some(guard))
        }
        None => {
            registry.init();
            Ok(None)
        }
    }
}

/// Open the module port, retrying until it opens or Ctrl+C
async fn open_serial(serial: &SerialConfig) -> Option<TokioSerialPort> {
    let paths = serial.candidate_paths();
    let retry = Duration::from_millis(serial.reconnect_interval_ms);

    loop {
        match FlySkySerial::open_with_paths(paths.as_slice(), serial.baud_rate) {
            Ok(port) => {
                info!("FlySky module connected at {}", port.device_path());
                return Some(port.into_port_io());
            }
            Err(e) => warn!("{}; retrying in {} ms", e, serial.reconnect_interval_ms),
        }

        tokio::select! {
            _ = sleep(retry) => {}
            _ = tokio::signal::ctrl_c() => return None,
        }
    }
}
