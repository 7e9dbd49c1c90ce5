//! # Reply Parser
//!
//! Validates decoded module replies and applies them to the session and
//! module state. Every command id is handled independently with its own
//! checksum span. A reply that fails validation changes nothing: recovery is
//! the next reply or the next timeout-driven resend.

use tracing::{debug, info};

use super::checksum::verify_checksum;
use super::protocol::*;
use super::session::{LinkMode, Session, SessionState};
use super::state::{read_u16_le, read_u32_le, FirmwareTarget, FirmwareUpdateState, ModuleState};

/// Body bytes every reply carries: index, type, command and one more byte
/// (first parameter, or the checksum of an empty reply)
const MIN_BODY_LEN: usize = 4;

/// RF init replies are checksummed over index, type, command and status
const RF_INIT_CHECKSUM_SPAN: usize = 4;

/// Get-config replies are checksummed over index, type and command
const RF_GET_CONFIG_CHECKSUM_SPAN: usize = 3;

/// Size of a full firmware information block in a revision reply
const FIRMWARE_INFO_BLOCK_LEN: usize = 16;

/// Why a reply was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Missing opening delimiter or header
    Malformed,
    /// Checksum mismatch
    Checksum,
    /// Valid checksum but the payload is shorter than the command requires
    Truncated,
}

/// Result of handling one reply, used for diagnostics only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    Accepted { command: u8 },
    Rejected(RejectReason),
}

/// A structurally valid reply body
struct Reply<'a> {
    /// Index through checksum
    body: &'a [u8],
}

impl<'a> Reply<'a> {
    fn frame_type(&self) -> u8 {
        self.body[1]
    }

    fn command(&self) -> u8 {
        self.body[2]
    }

    fn first_param(&self) -> u8 {
        self.body[3]
    }

    /// Bytes after the command id, checksum excluded
    fn payload(&self) -> &'a [u8] {
        &self.body[3..self.body.len() - 1]
    }

    /// Payload after its first (sub-type or target) byte
    fn payload_data(&self) -> &'a [u8] {
        self.payload().get(1..).unwrap_or(&[])
    }

    fn full_span(&self) -> usize {
        self.body.len() - 1
    }

    fn check(&self, span: usize) -> Result<(), RejectReason> {
        if verify_checksum(self.body, span) {
            Ok(())
        } else {
            Err(RejectReason::Checksum)
        }
    }

    fn check_full(&self) -> Result<(), RejectReason> {
        self.check(self.full_span())
    }
}

/// Handle one decoded frame (opening delimiter included)
pub fn parse_reply(frame: &[u8], session: &mut Session, module: &mut ModuleState) -> ReplyOutcome {
    let body = match frame.split_first() {
        Some((&FRAME_DELIMITER, body)) if body.len() >= MIN_BODY_LEN => body,
        _ => return ReplyOutcome::Rejected(RejectReason::Malformed),
    };
    let reply = Reply { body };

    let result = match CommandId::from_u8(reply.command()) {
        Some(CommandId::RfInit) => on_rf_init(&reply, session),
        Some(CommandId::Bind) => on_bind(&reply, session, module),
        Some(CommandId::RfGetConfig) => on_rf_get_config(&reply, session),
        Some(CommandId::RxSensorData) => on_sensor_data(&reply, session, module),
        Some(CommandId::SetReceiverId) => on_set_receiver_id(&reply, session),
        Some(CommandId::SetTxPower) => on_set_tx_power(&reply, session),
        Some(CommandId::GetFirmwareRevision) => on_firmware_revision(&reply, session, module),
        Some(CommandId::UpdateRfFirmware) => {
            on_firmware_update(&reply, FirmwareTarget::Rf, session, module)
        }
        Some(CommandId::UpdateRxFirmware) => {
            on_firmware_update(&reply, FirmwareTarget::Rx, session, module)
        }
        _ => on_generic_ack(&reply, session),
    };

    match result {
        Ok(()) => ReplyOutcome::Accepted { command: reply.command() },
        Err(reason) => ReplyOutcome::Rejected(reason),
    }
}

/// Any other reply acknowledges the last request
fn on_generic_ack(reply: &Reply<'_>, session: &mut Session) -> Result<(), RejectReason> {
    reply.check_full()?;
    if session.mode() == LinkMode::Normal {
        session.set_state(SessionState::Default);
    }
    Ok(())
}

fn on_rf_init(reply: &Reply<'_>, session: &mut Session) -> Result<(), RejectReason> {
    reply.check(RF_INIT_CHECKSUM_SPAN)?;

    if reply.first_param() != RF_READY_STATUS {
        debug!("RF init refused with status 0x{:02X}", reply.first_param());
        session.set_state(SessionState::Idle);
        return Ok(());
    }

    if session.mode() == LinkMode::Bind {
        session.set_state(SessionState::Bind);
        session.advance_frame_index();
    }
    if session.state() == SessionState::Init {
        session.set_state(SessionState::SetReceiverId);
        session.advance_frame_index();
    }
    Ok(())
}

fn on_bind(reply: &Reply<'_>, session: &mut Session, module: &mut ModuleState) -> Result<(), RejectReason> {
    reply.check_full()?;

    if reply.frame_type() != FRAME_TYPE_ANSWER {
        debug!("Bind rejected with frame type 0x{:02X}", reply.frame_type());
        session.set_state(SessionState::Idle);
        return Ok(());
    }

    let id: [u8; 4] = reply
        .payload()
        .get(..4)
        .and_then(|id| id.try_into().ok())
        .ok_or(RejectReason::Truncated)?;

    module.rx.id = id;
    module.model_id = id[3];
    info!("Receiver bound: id {:02X?}, model {}", id, module.model_id);

    // The new receiver has to go through the whole configuration sequence
    session.reset();
    session.set_state(SessionState::Init);
    Ok(())
}

fn on_rf_get_config(reply: &Reply<'_>, session: &mut Session) -> Result<(), RejectReason> {
    reply.check(RF_GET_CONFIG_CHECKSUM_SPAN)?;
    session.set_state(SessionState::GetReceiverConfig);
    session.advance_frame_index();
    Ok(())
}

fn on_sensor_data(
    reply: &Reply<'_>,
    session: &mut Session,
    module: &mut ModuleState,
) -> Result<(), RejectReason> {
    reply.check_full()?;
    if reply.payload().is_empty() {
        return Err(RejectReason::Truncated);
    }

    let data = reply.payload_data();
    let sensor = &mut module.sensor;

    match SensorType::from_u8(reply.first_param()) {
        Some(SensorType::RxVoltage) => {
            let value = read_u16_le(data, 0).ok_or(RejectReason::Truncated)?;
            sensor.set_voltage(value);
        }
        Some(SensorType::RxSignal) => {
            let value = *data.first().ok_or(RejectReason::Truncated)?;
            sensor.set_signal(value);
        }
        Some(SensorType::Gps) => {
            let block: &[u8; GPS_REPLY_SIZE] = data
                .get(..GPS_REPLY_SIZE)
                .and_then(|block| block.try_into().ok())
                .ok_or(RejectReason::Truncated)?;
            sensor.gps_mut().store_reply(block);
        }
        Some(level) => {
            if let Some(slot) = level.level_slot() {
                let value = read_u16_le(data, 0).ok_or(RejectReason::Truncated)?;
                sensor.set_level(slot, value);
            }
        }
        None => {}
    }

    if session.mode() == LinkMode::Normal && session.state() != SessionState::Default {
        session.set_state(SessionState::Default);
    }
    Ok(())
}

fn on_set_receiver_id(reply: &Reply<'_>, session: &mut Session) -> Result<(), RejectReason> {
    reply.check_full()?;
    session.set_state(SessionState::Default);
    Ok(())
}

fn on_set_tx_power(reply: &Reply<'_>, session: &mut Session) -> Result<(), RejectReason> {
    reply.check_full()?;
    session.set_state(SessionState::Init);
    Ok(())
}

/// `[target, rev(4)]` or `[target, id(4), len(4), hw_rev(4), fw_rev(4)]`
fn on_firmware_revision(
    reply: &Reply<'_>,
    session: &mut Session,
    module: &mut ModuleState,
) -> Result<(), RejectReason> {
    reply.check_full()?;

    if let Some(target) = FirmwareTarget::from_u8(reply.first_param()) {
        let data = reply.payload_data();
        let firmware = module.firmware_mut(target);

        if data.len() >= FIRMWARE_INFO_BLOCK_LEN {
            firmware.firmware_id = read_u32_le(data, 0).unwrap_or_default();
            firmware.firmware_len = read_u32_le(data, 4).unwrap_or_default();
            firmware.hardware_revision = read_u32_le(data, 8).unwrap_or_default();
            firmware.firmware_revision = read_u32_le(data, 12).unwrap_or_default();
        } else if let Some(revision) = read_u32_le(data, 0) {
            firmware.firmware_revision = revision;
        }
    }

    if session.mode() == LinkMode::Normal {
        session.set_state(SessionState::Default);
    }
    Ok(())
}

/// `[package address(4), package length(2)]`; a zero length ends the update
fn on_firmware_update(
    reply: &Reply<'_>,
    target: FirmwareTarget,
    session: &mut Session,
    module: &mut ModuleState,
) -> Result<(), RejectReason> {
    reply.check_full()?;

    if reply.frame_type() != FRAME_TYPE_ANSWER {
        debug!("Firmware update refused for {:?}", target);
        session.set_state(SessionState::Idle);
        return Ok(());
    }

    let payload = reply.payload();
    let address = read_u32_le(payload, 0).ok_or(RejectReason::Truncated)?;
    let len = read_u16_le(payload, 4).ok_or(RejectReason::Truncated)?;

    if len == 0 {
        info!("Firmware update of {:?} complete", target);
        module.rf.firmware_state = FirmwareUpdateState::Complete;
        session.set_state(SessionState::Init);
        return Ok(());
    }

    let firmware = module.firmware_mut(target);
    firmware.package_address = address;
    firmware.package_len = u32::from(len);
    module.rf.firmware_state = FirmwareUpdateState::Transferring;

    session.set_state(match target {
        FirmwareTarget::Rx => SessionState::GetRxFirmwarePackage,
        FirmwareTarget::Rf => SessionState::GetRfFirmwarePackage,
    });
    session.advance_frame_index();
    Ok(())
}
