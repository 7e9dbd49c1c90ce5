//! # FlySky Protocol Constants and Types
//!
//! Wire-level definitions shared by the encoder, decoder, command builder and
//! reply parser.

/// Frame delimiter, sent before and after every frame
pub const FRAME_DELIMITER: u8 = 0xC0;

/// Escape byte introducing a two-byte substitution
pub const FRAME_ESCAPE: u8 = 0xDB;

/// Second byte of an escaped delimiter (`DB DC` -> `C0`)
pub const ESCAPED_DELIMITER: u8 = 0xDC;

/// Second byte of an escaped escape (`DB DD` -> `DB`)
pub const ESCAPED_ESCAPE: u8 = 0xDD;

/// Request that expects an acknowledgement from the module
pub const FRAME_TYPE_REQUEST_ACK: u8 = 0x01;

/// Request that does not expect an acknowledgement
pub const FRAME_TYPE_REQUEST_NO_ACK: u8 = 0x02;

/// Answer frame
pub const FRAME_TYPE_ANSWER: u8 = 0x10;

/// Status byte of an RF init reply meaning "RF ready"
pub const RF_READY_STATUS: u8 = 0x01;

/// Module reply timeout in milliseconds
pub const MODULE_TIMEOUT_MS: u32 = 155;

/// Default output period in milliseconds
pub const DEFAULT_PERIOD_MS: u32 = 9;

/// Inbound accumulation buffer capacity (opening delimiter included)
pub const INBOUND_BUFFER_SIZE: usize = 64;

/// Outbound frame buffer capacity
///
/// Worst case is a firmware package frame: 9 header bytes, a full chunk and the
/// checksum, every byte escaped, plus both delimiters.
pub const OUTBOUND_BUFFER_SIZE: usize = 2 * (9 + FIRMWARE_CHUNK_MAX + 1) + 2;

/// Largest firmware chunk carried by a single package frame
pub const FIRMWARE_CHUNK_MAX: usize = 64;

/// Maximum number of channels carried by a channel-data frame
pub const MAX_CHANNELS: usize = 16;

/// Channel count used until configured otherwise (NV14 gimbal channels)
pub const DEFAULT_CHANNEL_COUNT: u8 = 4;

/// Channel values must be strictly above this pulse width (µs)
pub const CHANNEL_VALUE_MIN: u16 = 900;

/// Channel values must be strictly below this pulse width (µs)
pub const CHANNEL_VALUE_MAX: u16 = 2100;

/// Neutral pulse width (µs)
pub const CHANNEL_VALUE_CENTER: u16 = 1500;

/// Default transmit power in dBm
pub const DEFAULT_TX_POWER_DBM: u8 = 90;

/// Default receiver servo frequency in Hz
pub const DEFAULT_SERVO_FREQUENCY_HZ: u16 = 50;

/// Size of the stored GPS block
pub const GPS_BLOCK_SIZE: usize = 18;

/// Number of GPS bytes a sensor reply carries
pub const GPS_REPLY_SIZE: usize = 17;

/// Per-channel output values in µs
pub type ChannelValues = [u16; MAX_CHANNELS];

/// Returns true if `value` is a physically meaningful pulse width
pub fn is_valid_channel_value(value: u16) -> bool {
    value > CHANNEL_VALUE_MIN && value < CHANNEL_VALUE_MAX
}

/// Command identifiers understood by the module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandId {
    RfInit = 0x01,
    Bind = 0x02,
    SetReceiverId = 0x03,
    RfGetConfig = 0x04,
    SendChannelData = 0x05,
    RxSensorData = 0x06,
    SetRxPwmPpm = 0x07,
    SetRxServoFreq = 0x08,
    GetFirmwareRevision = 0x09,
    SetRxIbusSbus = 0x0A,
    SetRxIbusServoExt = 0x0B,
    UpdateRfFirmware = 0x0C,
    SetTxPower = 0x0D,
    SetRfProtocol = 0x0E,
    TestRange = 0x0F,
    TestRfReserved = 0x10,
    UpdateRxFirmware = 0x20,
}

impl CommandId {
    /// Map a wire byte to a known command id
    pub fn from_u8(value: u8) -> Option<Self> {
        let id = match value {
            0x01 => Self::RfInit,
            0x02 => Self::Bind,
            0x03 => Self::SetReceiverId,
            0x04 => Self::RfGetConfig,
            0x05 => Self::SendChannelData,
            0x06 => Self::RxSensorData,
            0x07 => Self::SetRxPwmPpm,
            0x08 => Self::SetRxServoFreq,
            0x09 => Self::GetFirmwareRevision,
            0x0A => Self::SetRxIbusSbus,
            0x0B => Self::SetRxIbusServoExt,
            0x0C => Self::UpdateRfFirmware,
            0x0D => Self::SetTxPower,
            0x0E => Self::SetRfProtocol,
            0x0F => Self::TestRange,
            0x10 => Self::TestRfReserved,
            0x20 => Self::UpdateRxFirmware,
            _ => return None,
        };
        Some(id)
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Sensor sub-types carried in the first payload byte of a sensor reply
///
/// `RxRssi..=Pressure` address consecutive 16-bit slots of the sensor record
/// by `(type - RxRssi)`; the numbering must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SensorType {
    RxVoltage = 0,
    RxSignal = 1,
    RxRssi = 2,
    RxNoise = 3,
    RxSnr = 4,
    Temperature = 5,
    ExtVoltage = 6,
    MotorRpm = 7,
    Pressure = 8,
    Gps = 9,
}

impl SensorType {
    pub fn from_u8(value: u8) -> Option<Self> {
        let sensor = match value {
            0 => Self::RxVoltage,
            1 => Self::RxSignal,
            2 => Self::RxRssi,
            3 => Self::RxNoise,
            4 => Self::RxSnr,
            5 => Self::Temperature,
            6 => Self::ExtVoltage,
            7 => Self::MotorRpm,
            8 => Self::Pressure,
            9 => Self::Gps,
            _ => return None,
        };
        Some(sensor)
    }

    /// Slot index into the 16-bit level block, for the level sensors
    pub fn level_slot(self) -> Option<usize> {
        let raw = self as u8;
        if raw >= Self::RxRssi as u8 && raw <= Self::Pressure as u8 {
            Some((raw - Self::RxRssi as u8) as usize)
        } else {
            None
        }
    }
}
