//! # Link Driver
//!
//! Glue between a serial port and a [`ModuleLinkEngine`]: every output period
//! it collects the bytes the module sent, runs one engine tick and writes the
//! resulting frame. Transport failures are logged and counted; they never
//! stop the tick loop, since channel data has to keep flowing once the port
//! recovers.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::flysky::engine::ModuleLinkEngine;
use crate::flysky::protocol::INBOUND_BUFFER_SIZE;
use crate::serial::SerialPortIO;

/// Transport counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverStats {
    pub bytes_received: u64,
    pub frames_written: u64,
    pub read_errors: u64,
    pub write_errors: u64,
}

/// Drives one engine over one serial port
pub struct LinkDriver<P: SerialPortIO> {
    port: P,
    inbound: VecDeque<u8>,
    stats: DriverStats,
}

impl<P: SerialPortIO> LinkDriver<P> {
    pub fn new(port: P) -> Self {
        Self {
            port,
            inbound: VecDeque::with_capacity(INBOUND_BUFFER_SIZE * 4),
            stats: DriverStats::default(),
        }
    }

    /// Run one output period against `engine`
    ///
    /// Returns the number of bytes written (0 when the engine had nothing
    /// to send or the write failed).
    pub async fn run_tick(&mut self, engine: &mut ModuleLinkEngine) -> usize {
        self.fill_inbound().await;

        let frame = engine.tick(&mut self.inbound);
        if frame.is_empty() {
            return 0;
        }

        let result = match self.port.write_all(frame).await {
            Ok(()) => self.port.flush().await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                self.stats.frames_written += 1;
                frame.len()
            }
            Err(e) => {
                self.stats.write_errors += 1;
                warn!("Failed to write frame ({} bytes): {}", frame.len(), e);
                0
            }
        }
    }

    async fn fill_inbound(&mut self) {
        let mut buf = [0u8; INBOUND_BUFFER_SIZE];
        loop {
            match self.port.read_available(&mut buf).await {
                Ok(0) => break,
                Ok(count) => {
                    self.stats.bytes_received += count as u64;
                    self.inbound.extend(&buf[..count]);
                }
                Err(e) => {
                    self.stats.read_errors += 1;
                    debug!("Serial read failed: {}", e);
                    break;
                }
            }
        }
    }

    pub fn stats(&self) -> DriverStats {
        self.stats
    }

    pub fn port(&self) -> &P {
        &self.port
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flysky::encoder::encode_frame;
    use crate::flysky::engine::LinkTiming;
    use crate::flysky::protocol::*;
    use crate::flysky::session::SessionState;
    use crate::serial::port_trait::mocks::MockSerialPort;
    use crate::serial::port_trait::MockSerialPortIO;
    use std::io;

    fn fast_engine() -> ModuleLinkEngine {
        ModuleLinkEngine::with_timing(LinkTiming { period_ms: 155, module_timeout_ms: 155 })
    }

    #[tokio::test]
    async fn test_configuration_frame_is_written() {
        let port = MockSerialPort::new();
        let mut driver = LinkDriver::new(port.clone());
        let mut engine = fast_engine();

        let written = driver.run_tick(&mut engine).await;
        assert!(written > 0);

        let frames = port.get_written_data();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0], encode_frame(&[1, FRAME_TYPE_REQUEST_ACK, 0x0D, DEFAULT_TX_POWER_DBM]));
    }

    #[tokio::test]
    async fn test_reply_is_consumed_before_sending() {
        let port = MockSerialPort::new();
        let mut driver = LinkDriver::new(port.clone());
        let mut engine = fast_engine();

        port.queue_inbound(&encode_frame(&[1, FRAME_TYPE_ANSWER, 0x0D, 0x00]));
        driver.run_tick(&mut engine).await;

        assert_eq!(engine.state(), SessionState::Init);
        let frames = port.get_written_data();
        assert_eq!(frames[0], encode_frame(&[1, FRAME_TYPE_REQUEST_ACK, 0x01]));
        assert!(driver.stats().bytes_received > 0);
    }

    #[tokio::test]
    async fn test_split_reply_across_reads() {
        let port = MockSerialPort::new();
        let mut driver = LinkDriver::new(port.clone());
        let mut engine = fast_engine();
        engine.restore_state(SessionState::Init.as_u8());

        let reply = encode_frame(&[1, FRAME_TYPE_ANSWER, 0x01, RF_READY_STATUS]);
        let (head, tail) = reply.split_at(3);
        port.queue_inbound(head);
        driver.run_tick(&mut engine).await;
        assert_eq!(engine.state(), SessionState::Init);

        port.queue_inbound(tail);
        driver.run_tick(&mut engine).await;
        assert_eq!(engine.state(), SessionState::SetReceiverId);
    }

    #[tokio::test]
    async fn test_write_errors_do_not_stop_streaming() {
        let port = MockSerialPort::new();
        let mut driver = LinkDriver::new(port.clone());
        let mut engine = fast_engine();
        engine.restore_state(SessionState::Default.as_u8());

        port.set_write_error(io::ErrorKind::BrokenPipe);
        assert_eq!(driver.run_tick(&mut engine).await, 0);
        assert_eq!(driver.run_tick(&mut engine).await, 0);
        assert_eq!(driver.stats().write_errors, 2);

        port.clear_write_error();
        assert!(driver.run_tick(&mut engine).await > 0);

        // Frame index kept advancing while the port was down
        let frames = port.get_written_data();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0][1], 3);
    }

    #[tokio::test]
    async fn test_nothing_written_while_throttled() {
        let mut port = MockSerialPortIO::new();
        port.expect_read_available().returning(|_| Ok(0));
        port.expect_write_all().never();
        port.expect_flush().never();

        let mut driver = LinkDriver::new(port);
        let mut engine = ModuleLinkEngine::new();
        for _ in 0..10 {
            assert_eq!(driver.run_tick(&mut engine).await, 0);
        }
    }

    #[tokio::test]
    async fn test_read_error_is_counted() {
        let mut port = MockSerialPortIO::new();
        port.expect_read_available()
            .times(1)
            .returning(|_| Err(io::Error::new(io::ErrorKind::Other, "device gone")));
        port.expect_write_all().times(1).returning(|_| Ok(()));
        port.expect_flush().times(1).returning(|| Ok(()));

        let mut driver = LinkDriver::new(port);
        let mut engine = fast_engine();
        assert!(driver.run_tick(&mut engine).await > 0);
        assert_eq!(driver.stats().read_errors, 1);
        assert_eq!(driver.stats().frames_written, 1);
    }

    #[tokio::test]
    async fn test_flush_error_counts_as_write_error() {
        let mut port = MockSerialPortIO::new();
        port.expect_read_available().returning(|_| Ok(0));
        port.expect_write_all().returning(|_| Ok(()));
        port.expect_flush()
            .returning(|| Err(io::Error::new(io::ErrorKind::TimedOut, "flush timeout")));

        let mut driver = LinkDriver::new(port);
        let mut engine = fast_engine();
        assert_eq!(driver.run_tick(&mut engine).await, 0);
        assert_eq!(driver.stats().write_errors, 1);
    }
}
