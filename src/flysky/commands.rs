//! # Command Builder
//!
//! Translates a requested action into the frame type, command id and payload
//! of an outbound frame, reading the current [`ModuleState`]. The builder only
//! writes body bytes; the frame index, checksum and delimiters are the
//! engine's job, and so is advancing the frame counter.

use super::encoder::FrameEncoder;
use super::protocol::*;
use super::state::{FirmwareTarget, ModuleState};

/// Outbound actions the module understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    RfInit,
    BindReceiver,
    SetReceiverId,
    /// Sent as an answer carrying the receiver configuration
    GetReceiverConfig,
    SetReceiverPulseMode,
    SetReceiverBusPort,
    SetReceiverServoFreq,
    SetTxPower,
    GetFirmwareInfo(FirmwareTarget),
    GetFirmwareVersion(FirmwareTarget),
    UpdateFirmwareStart(FirmwareTarget),
    FirmwarePackage(FirmwareTarget),
    UpdateRfProtocol,
    ChannelData,
}

/// Write the body of `command` into `encoder`
///
/// # Returns
///
/// * `true` - Body written
/// * `false` - Nothing to send; only a firmware package without an attached
///   image (or with an out-of-range request) ends up here, and the encoder is
///   left untouched
pub fn build_command(encoder: &mut FrameEncoder, command: Command, module: &ModuleState) -> bool {
    match command {
        Command::RfInit => {
            put_header(encoder, FRAME_TYPE_REQUEST_ACK, CommandId::RfInit);
        }
        Command::BindReceiver => {
            put_header(encoder, FRAME_TYPE_REQUEST_ACK, CommandId::Bind);
            encoder.put_byte(module.rf.bind_power as u8);
            encoder.put_slice(&module.rf.id);
        }
        Command::SetReceiverId => {
            put_header(encoder, FRAME_TYPE_REQUEST_ACK, CommandId::SetReceiverId);
            encoder.put_slice(&module.rx.id);
        }
        Command::GetReceiverConfig => {
            put_header(encoder, FRAME_TYPE_ANSWER, CommandId::RfGetConfig);
            encoder.put_byte(module.rx.pulse_mode as u8);
            encoder.put_byte(module.rx.bus_type as u8);
            encoder.put_u16_le(module.rx.servo_frequency);
        }
        Command::SetReceiverPulseMode => {
            put_header(encoder, FRAME_TYPE_REQUEST_ACK, CommandId::SetRxPwmPpm);
            encoder.put_byte(module.rx.pulse_mode as u8);
        }
        Command::SetReceiverBusPort => {
            put_header(encoder, FRAME_TYPE_REQUEST_ACK, CommandId::SetRxIbusSbus);
            encoder.put_byte(module.rx.bus_type as u8);
        }
        Command::SetReceiverServoFreq => {
            put_header(encoder, FRAME_TYPE_REQUEST_ACK, CommandId::SetRxServoFreq);
            encoder.put_u16_le(module.rx.servo_frequency);
        }
        Command::SetTxPower => {
            put_header(encoder, FRAME_TYPE_REQUEST_ACK, CommandId::SetTxPower);
            encoder.put_byte(module.tx_power_dbm);
        }
        // This protocol revision has a single revision query; the reply length
        // tells how much of the firmware block the module filled in.
        Command::GetFirmwareInfo(target) | Command::GetFirmwareVersion(target) => {
            put_header(encoder, FRAME_TYPE_REQUEST_ACK, CommandId::GetFirmwareRevision);
            encoder.put_byte(target as u8);
        }
        Command::UpdateFirmwareStart(target) => {
            put_header(encoder, FRAME_TYPE_REQUEST_ACK, target.update_command());
        }
        Command::FirmwarePackage(target) => {
            let firmware = module.firmware(target);
            let Some(chunk) = firmware.package_chunk() else {
                return false;
            };
            put_header(encoder, FRAME_TYPE_REQUEST_ACK, target.update_command());
            encoder.put_u32_le(firmware.package_address);
            encoder.put_u16_le(chunk.len() as u16);
            encoder.put_slice(chunk);
        }
        Command::UpdateRfProtocol => {
            put_header(encoder, FRAME_TYPE_REQUEST_ACK, CommandId::SetRfProtocol);
            encoder.put_byte(module.rf.protocol as u8);
        }
        Command::ChannelData => put_channel_data(encoder, module),
    }
    true
}

fn put_header(encoder: &mut FrameEncoder, frame_type: u8, command: CommandId) {
    encoder.put_byte(frame_type);
    encoder.put_byte(command.as_u8());
}

/// Channel-data body: mode, count, then each value as u16 little-endian
fn put_channel_data(encoder: &mut FrameEncoder, module: &ModuleState) {
    put_header(encoder, FRAME_TYPE_REQUEST_NO_ACK, CommandId::SendChannelData);
    encoder.put_byte(module.rf.channel_data_mode as u8);

    let count = (module.rf.channel_count as usize).min(MAX_CHANNELS);
    encoder.put_byte(count as u8);
    for &value in &module.rx.channels()[..count] {
        encoder.put_u16_le(value);
    }
}
