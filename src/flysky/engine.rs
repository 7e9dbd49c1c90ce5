//! # Module Link Engine
//!
//! One engine per transmission port. Every output period the host calls
//! [`ModuleLinkEngine::tick`] with whatever bytes the transport received; the
//! engine parses the replies, advances the session and returns the single
//! frame to send (possibly empty).

use std::collections::VecDeque;

use bytes::Bytes;
use tracing::{info, trace, warn};

use super::commands::{build_command, Command};
use super::decoder::FrameDecoder;
use super::encoder::FrameEncoder;
use super::parser::{parse_reply, ReplyOutcome};
use super::protocol::*;
use super::session::{LinkMode, Session, SessionState};
use super::state::*;

/// Source of inbound bytes drained at the start of every tick
pub trait ByteSource {
    fn pop_byte(&mut self) -> Option<u8>;
}

impl ByteSource for VecDeque<u8> {
    fn pop_byte(&mut self) -> Option<u8> {
        self.pop_front()
    }
}

impl ByteSource for &[u8] {
    fn pop_byte(&mut self) -> Option<u8> {
        let bytes = *self;
        let (&byte, rest) = bytes.split_first()?;
        *self = rest;
        Some(byte)
    }
}

/// Output period and module reply timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkTiming {
    pub period_ms: u32,
    pub module_timeout_ms: u32,
}

impl Default for LinkTiming {
    fn default() -> Self {
        Self {
            period_ms: DEFAULT_PERIOD_MS,
            module_timeout_ms: MODULE_TIMEOUT_MS,
        }
    }
}

impl LinkTiming {
    /// Ticks between two sends of the same configuration step
    pub fn timeout_ticks(&self) -> u16 {
        let ticks = self.module_timeout_ms / self.period_ms.max(1);
        ticks.clamp(1, u32::from(u16::MAX)) as u16
    }
}

/// Diagnostic counters, never consulted by the state machine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub frames_sent: u64,
    pub replies_accepted: u64,
    pub replies_rejected: u64,
}

/// Link-layer driver for one FlySky module
#[derive(Debug)]
pub struct ModuleLinkEngine {
    session: Session,
    decoder: FrameDecoder,
    encoder: FrameEncoder,
    module: ModuleState,
    timing: LinkTiming,
    stats: LinkStats,
}

impl Default for ModuleLinkEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleLinkEngine {
    pub fn new() -> Self {
        Self::with_timing(LinkTiming::default())
    }

    pub fn with_timing(timing: LinkTiming) -> Self {
        Self {
            session: Session::new(),
            decoder: FrameDecoder::new(),
            encoder: FrameEncoder::new(),
            module: ModuleState::default(),
            timing,
            stats: LinkStats::default(),
        }
    }

    /// Run one output period
    ///
    /// Drains `inbound`, applies every complete reply, then builds the frame
    /// for this period. An empty slice means nothing is sent this period.
    pub fn tick<S: ByteSource + ?Sized>(&mut self, inbound: &mut S) -> &[u8] {
        self.drain_inbound(inbound);

        self.encoder.begin(self.session.frame_index());

        let state = self.session.state();
        if state.is_configuring() {
            if !self.session.advance_tick(self.timing.timeout_ticks()) || !self.send_step(state) {
                self.encoder.clear();
                return self.encoder.as_bytes();
            }
        } else {
            build_command(&mut self.encoder, Command::ChannelData, &self.module);
            self.session.advance_frame_index();
        }

        self.encoder.finish();
        self.stats.frames_sent += 1;
        self.encoder.as_bytes()
    }

    fn drain_inbound<S: ByteSource + ?Sized>(&mut self, inbound: &mut S) {
        while let Some(byte) = inbound.pop_byte() {
            let Some(frame) = self.decoder.push(byte) else {
                continue;
            };
            match parse_reply(frame, &mut self.session, &mut self.module) {
                ReplyOutcome::Accepted { .. } => self.stats.replies_accepted += 1,
                ReplyOutcome::Rejected(reason) => {
                    trace!("Dropped reply: {:?}", reason);
                    self.stats.replies_rejected += 1;
                }
            }
        }
    }

    /// Build the command of a configuration step; false when nothing goes out
    fn send_step(&mut self, state: SessionState) -> bool {
        let command = match state {
            SessionState::SetTxPower => Command::SetTxPower,
            SessionState::Init => Command::RfInit,
            SessionState::Bind => Command::BindReceiver,
            SessionState::SetReceiverId => Command::SetReceiverId,
            SessionState::GetReceiverConfig => {
                self.session.set_state(SessionState::Init);
                Command::GetReceiverConfig
            }
            SessionState::GetRxFirmwareInfo => Command::GetFirmwareInfo(FirmwareTarget::Rx),
            SessionState::GetRxFwVersion => Command::GetFirmwareVersion(FirmwareTarget::Rx),
            SessionState::GetRfFirmwareInfo => Command::GetFirmwareInfo(FirmwareTarget::Rf),
            SessionState::GetRfFwVersion => Command::GetFirmwareVersion(FirmwareTarget::Rf),
            SessionState::UpdateRfFirmware => Command::UpdateFirmwareStart(FirmwareTarget::Rf),
            SessionState::UpdateRxFirmware => Command::UpdateFirmwareStart(FirmwareTarget::Rx),
            SessionState::GetRxFirmwarePackage => Command::FirmwarePackage(FirmwareTarget::Rx),
            SessionState::GetRfFirmwarePackage => Command::FirmwarePackage(FirmwareTarget::Rf),
            SessionState::SetRxPwmPpm => Command::SetReceiverPulseMode,
            SessionState::SetRxIbusSbus => Command::SetReceiverBusPort,
            SessionState::SetRxServoFreq => Command::SetReceiverServoFreq,
            SessionState::UpdateRfProtocol => Command::UpdateRfProtocol,
            SessionState::Idle | SessionState::Default => return false,
        };
        build_command(&mut self.encoder, command, &self.module)
    }

    // ---- Operator actions ----

    /// Return to the start of the configuration sequence in normal mode
    pub fn reset(&mut self) {
        self.session.reset();
        self.decoder.reset();
        self.encoder.clear();
    }

    /// Restart the session in bind mode
    pub fn bind_receiver(&mut self) {
        self.reset();
        self.session.set_mode(LinkMode::Bind);
        self.session.set_state(SessionState::Init);
        info!("Binding receiver");
    }

    pub fn set_receiver_pulse_mode(&mut self, mode: RxPulseMode) {
        self.module.rx.pulse_mode = mode;
        self.session.set_state(SessionState::SetRxPwmPpm);
        info!("Receiver pulse mode -> {:?}", mode);
    }

    pub fn set_receiver_bus_port(&mut self, bus: RxBusType) {
        self.module.rx.bus_type = bus;
        self.session.set_state(SessionState::SetRxIbusSbus);
        info!("Receiver bus port -> {:?}", bus);
    }

    /// Set pulse mode and bus port from a combined code
    ///
    /// High nibble selects PWM (0) or PPM (1), low nibble I-BUS (0) or S-BUS
    /// (1). Any other code is ignored and returns false.
    pub fn set_receiver_pulse(&mut self, mode_and_port: u8) -> bool {
        let (pulse_mode, bus_type) = match mode_and_port {
            0x00 => (RxPulseMode::Pwm, RxBusType::Ibus),
            0x01 => (RxPulseMode::Pwm, RxBusType::Sbus),
            0x10 => (RxPulseMode::Ppm, RxBusType::Ibus),
            0x11 => (RxPulseMode::Ppm, RxBusType::Sbus),
            _ => return false,
        };
        self.module.rx.pulse_mode = pulse_mode;
        self.module.rx.bus_type = bus_type;
        self.session.set_state(SessionState::SetTxPower);
        info!("Receiver pulse {:?} / {:?}", pulse_mode, bus_type);
        true
    }

    pub fn set_receiver_servo_frequency(&mut self, frequency_hz: u16) {
        self.module.rx.servo_frequency = frequency_hz;
        self.session.set_state(SessionState::SetRxServoFreq);
        info!("Receiver servo frequency -> {} Hz", frequency_hz);
    }

    pub fn set_transmitter_power(&mut self, dbm: u8) {
        self.module.tx_power_dbm = dbm;
        self.session.set_state(SessionState::SetTxPower);
        info!("Transmitter power -> {}", dbm);
    }

    pub fn start_firmware_update(&mut self, target: FirmwareTarget) {
        self.module.rf.firmware_state = FirmwareUpdateState::Started;
        self.session.set_state(match target {
            FirmwareTarget::Rx => SessionState::UpdateRxFirmware,
            FirmwareTarget::Rf => SessionState::UpdateRfFirmware,
        });
        info!("Starting {:?} firmware update", target);
    }

    pub fn update_rf_protocol(&mut self) {
        self.session.set_state(SessionState::UpdateRfProtocol);
        info!("Updating RF protocol to {:?}", self.module.rf.protocol);
    }

    pub fn request_firmware_info(&mut self, target: FirmwareTarget) {
        self.session.set_state(match target {
            FirmwareTarget::Rx => SessionState::GetRxFirmwareInfo,
            FirmwareTarget::Rf => SessionState::GetRfFirmwareInfo,
        });
    }

    pub fn request_firmware_version(&mut self, target: FirmwareTarget) {
        self.session.set_state(match target {
            FirmwareTarget::Rx => SessionState::GetRxFwVersion,
            FirmwareTarget::Rf => SessionState::GetRfFwVersion,
        });
    }

    pub fn request_firmware_package(&mut self, target: FirmwareTarget) {
        self.session.set_state(match target {
            FirmwareTarget::Rx => SessionState::GetRxFirmwarePackage,
            FirmwareTarget::Rf => SessionState::GetRfFirmwarePackage,
        });
    }

    /// Restore a state saved with [`SessionState::as_u8`]
    ///
    /// An unknown value resets the session and restarts at `Init`.
    pub fn restore_state(&mut self, raw: u8) {
        match SessionState::from_u8(raw) {
            Some(state) => self.session.set_state(state),
            None => {
                warn!("Unknown session state {}, resetting link", raw);
                self.reset();
                self.session.set_state(SessionState::Init);
            }
        }
    }

    // ---- Setters ----

    pub fn set_transmitter_id(&mut self, id: u32) {
        self.module.rf.id = id.to_le_bytes();
    }

    pub fn set_rf_protocol(&mut self, protocol: RfProtocol) {
        self.module.rf.protocol = protocol;
    }

    pub fn set_receiver_id(&mut self, id: u32) {
        self.module.rx.id = id.to_le_bytes();
    }

    pub fn set_bind_power(&mut self, power: BindPower) {
        self.module.rf.bind_power = power;
    }

    pub fn set_channel_count(&mut self, count: u8) {
        self.module.rf.channel_count = count;
    }

    pub fn set_channel_data_mode(&mut self, mode: ChannelDataMode) {
        self.module.rf.channel_data_mode = mode;
    }

    /// Store receiver output settings without scheduling a command
    ///
    /// They reach the receiver with the next receiver-config answer.
    pub fn set_receiver_output(&mut self, pulse_mode: RxPulseMode, bus_type: RxBusType, servo_frequency_hz: u16) {
        self.module.rx.pulse_mode = pulse_mode;
        self.module.rx.bus_type = bus_type;
        self.module.rx.servo_frequency = servo_frequency_hz;
    }

    /// Store one channel output; out-of-range values are ignored
    pub fn set_channel_output(&mut self, channel: usize, value: u16) -> bool {
        self.module.rx.set_channel(channel, value)
    }

    /// Attach the firmware image packages are sliced from
    pub fn set_firmware_package_buffer(&mut self, target: FirmwareTarget, image: Bytes) {
        self.module.firmware_mut(target).package_data = Some(image);
    }

    // ---- Queries ----

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn frame_index(&self) -> u8 {
        self.session.frame_index()
    }

    pub fn link_mode(&self) -> LinkMode {
        self.session.mode()
    }

    pub fn tick_count(&self) -> u16 {
        self.session.tick_count()
    }

    pub fn is_binding(&self) -> bool {
        self.session.mode() == LinkMode::Bind
    }

    pub fn is_firmware_update_in_progress(&self) -> bool {
        matches!(
            self.module.rf.firmware_state,
            FirmwareUpdateState::Started | FirmwareUpdateState::Transferring
        )
    }

    pub fn module(&self) -> &ModuleState {
        &self.module
    }

    pub fn sensor(&self) -> &SensorTelemetry {
        &self.module.sensor
    }

    pub fn transmitter_id(&self) -> u32 {
        u32::from_le_bytes(self.module.rf.id)
    }

    pub fn receiver_id(&self) -> u32 {
        u32::from_le_bytes(self.module.rx.id)
    }

    pub fn firmware_revision(&self, target: FirmwareTarget) -> u32 {
        self.module.firmware(target).firmware_revision
    }

    pub fn timing(&self) -> LinkTiming {
        self.timing
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    /// Partial frames discarded because the inbound buffer filled up
    pub fn overflow_count(&self) -> u32 {
        self.decoder.overflow_count()
    }
}
