//! # FlySky Link Library
//!
//! Drive a FlySky RF module over a serial link: configure it, bind receivers,
//! stream channel data and collect receiver telemetry.
//!
//! The [`flysky`] module holds the link engine itself; everything else is the
//! host side around it (serial transport, configuration, telemetry logging).

pub mod capabilities;
pub mod config;
pub mod error;
pub mod flysky;
pub mod link;
pub mod serial;
pub mod telemetry;
