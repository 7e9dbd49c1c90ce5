//! # FlySky Link Module
//!
//! Link-layer driver for FlySky RF modules.
//!
//! This module handles:
//! - Frame escaping and the additive checksum
//! - Building configuration, firmware and channel-data commands
//! - Sequencing the per-port session (init, bind, configuration, streaming)
//! - Validating module replies and storing receiver telemetry
//! - One engine per port, owned by a registry

pub mod protocol;
pub mod checksum;
pub mod encoder;
pub mod decoder;
pub mod state;
pub mod session;
pub mod commands;
pub mod parser;
pub mod engine;
pub mod registry;

pub use engine::{ByteSource, LinkStats, LinkTiming, ModuleLinkEngine};
pub use registry::ModuleRegistry;
pub use session::{LinkMode, SessionState};
