//! # Serial Communication Module
//!
//! Host-side transport to a FlySky RF module behind a UART or USB adapter.
//!
//! This module handles:
//! - Opening the serial port (8N1, no flow control)
//! - Trying several candidate device paths in order
//! - Handing the port to the link driver as a [`SerialPortIO`]

pub mod port_trait;

pub use port_trait::{SerialPortIO, TokioSerialPort};

use crate::error::{FlySkyLinkError, Result};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

/// Default module UART baud rate
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default device paths to try (in order of preference)
pub const DEFAULT_DEVICE_PATHS: &[&str] = &[
    "/dev/ttyUSB0", // USB-to-serial adapters
    "/dev/ttyACM0", // USB CDC devices
];

/// FlySky module serial port handle
pub struct FlySkySerial {
    port: tokio_serial::SerialStream,
    device_path: String,
}

impl std::fmt::Debug for FlySkySerial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlySkySerial")
            .field("device_path", &self.device_path)
            .finish_non_exhaustive()
    }
}

impl FlySkySerial {
    /// Open the module on the first default path that works
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use flysky_link::serial::FlySkySerial;
    ///
    /// fn main() -> anyhow::Result<()> {
    ///     let serial = FlySkySerial::open()?;
    ///     println!("Connected to: {}", serial.device_path());
    ///     Ok(())
    /// }
    /// ```
    pub fn open() -> Result<Self> {
        Self::open_with_paths(DEFAULT_DEVICE_PATHS, DEFAULT_BAUD_RATE)
    }

    /// Open the module trying `paths` in order
    ///
    /// # Arguments
    ///
    /// * `paths` - Device paths to try (e.g., &["/dev/ttyUSB0"])
    /// * `baud_rate` - UART speed
    ///
    /// # Errors
    ///
    /// Returns `SerialPortNotFound` listing every path when none opens
    pub fn open_with_paths<S: AsRef<str>>(paths: &[S], baud_rate: u32) -> Result<Self> {
        for path in paths {
            let path = path.as_ref();
            debug!("Trying to open serial port: {}", path);

            match Self::open_port(path, baud_rate) {
                Ok(port) => {
                    info!("Opened FlySky module at {} ({} baud)", path, baud_rate);
                    return Ok(Self {
                        port,
                        device_path: path.to_string(),
                    });
                }
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                }
            }
        }

        let tried: Vec<&str> = paths.iter().map(|path| path.as_ref()).collect();
        Err(FlySkyLinkError::SerialPortNotFound(tried.join(", ")))
    }

    fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| FlySkyLinkError::Serial(format!("Failed to open {}: {}", path, e)))?;

        Ok(port)
    }

    /// Path of the opened device
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Convert into the I/O handle used by the link driver
    pub fn into_port_io(self) -> TokioSerialPort {
        TokioSerialPort::new(self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(DEFAULT_BAUD_RATE, 115_200);
        assert_eq!(DEFAULT_DEVICE_PATHS, &["/dev/ttyUSB0", "/dev/ttyACM0"]);
    }

    #[test]
    fn test_open_with_invalid_paths_returns_error() {
        let invalid_paths: &[&str] = &["/dev/nonexistent0", "/dev/nonexistent1"];
        let result = FlySkySerial::open_with_paths(invalid_paths, DEFAULT_BAUD_RATE);

        match result {
            Err(FlySkyLinkError::SerialPortNotFound(msg)) => {
                assert!(msg.contains("/dev/nonexistent0"));
                assert!(msg.contains("/dev/nonexistent1"));
            }
            other => panic!("Expected SerialPortNotFound error, got: {:?}", other),
        }
    }

    #[test]
    fn test_open_with_owned_paths() {
        let paths = vec!["/dev/nonexistent_flysky".to_string()];
        let result = FlySkySerial::open_with_paths(paths.as_slice(), 921_600);
        assert!(matches!(result, Err(FlySkyLinkError::SerialPortNotFound(_))));
    }

    #[test]
    fn test_open_with_empty_paths_returns_error() {
        let empty_paths: &[&str] = &[];
        match FlySkySerial::open_with_paths(empty_paths, DEFAULT_BAUD_RATE) {
            Err(FlySkyLinkError::SerialPortNotFound(_)) => {}
            other => panic!("Expected SerialPortNotFound, got: {:?}", other),
        }
    }

    #[test]
    fn test_open_port_with_invalid_path_returns_error() {
        let result = FlySkySerial::open_port("/dev/nonexistent_serial_device_12345", DEFAULT_BAUD_RATE);

        match result {
            Err(FlySkyLinkError::Serial(msg)) => {
                assert!(msg.contains("/dev/nonexistent_serial_device_12345"));
                assert!(msg.contains("Failed to open"));
            }
            Err(other) => panic!("Expected Serial error, got: {:?}", other),
            Ok(_) => panic!("Expected Serial error, port opened"),
        }
    }

    // Only meaningful with a module attached
    #[test]
    #[ignore] // Run with: cargo test -- --ignored
    fn test_open_with_real_hardware() {
        match FlySkySerial::open() {
            Ok(serial) => println!("Opened FlySky module at: {}", serial.device_path()),
            Err(e) => println!("No FlySky hardware detected ({})", e),
        }
    }
}
