//! # Telemetry Module
//!
//! Handles telemetry logging to JSONL files with rotation.
//!
//! This module handles:
//! - Snapshotting the sensor telemetry and link state of each engine
//! - Formatting as JSONL (JSON Lines)
//! - Rotating files after a fixed number of records
//! - Retaining only the newest files

pub mod logger;

pub use logger::{TelemetryLogger, TelemetryRecord};
