//! # Module State
//!
//! Per-port record of transmitter (RF) and receiver (RX) identity,
//! configuration, firmware metadata and the latest sensor telemetry. Written by
//! operator actions and by decoded replies, read by the command builder.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::protocol::*;

/// Power used while binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindPower {
    Low = 0,
    #[default]
    Normal = 1,
}

/// Receiver servo output pulse type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RxPulseMode {
    #[default]
    Pwm = 0,
    Ppm = 1,
}

/// Receiver serial bus type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RxBusType {
    #[default]
    Ibus = 0,
    Sbus = 1,
}

/// Meaning of the values in a channel-data frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelDataMode {
    #[default]
    Normal = 0,
    Failsafe = 1,
}

/// RF protocol selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RfProtocol {
    #[default]
    Afhds = 0,
    Afhds2 = 1,
    Afhds2a = 2,
}

/// Which side of the link a firmware request is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FirmwareTarget {
    Rx = 0,
    Rf = 1,
}

impl FirmwareTarget {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Rx),
            1 => Some(Self::Rf),
            _ => None,
        }
    }

    /// Command id that starts (and carries packages of) an update
    pub fn update_command(self) -> CommandId {
        match self {
            Self::Rx => CommandId::UpdateRxFirmware,
            Self::Rf => CommandId::UpdateRfFirmware,
        }
    }
}

/// Firmware transfer progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FirmwareUpdateState {
    #[default]
    Idle,
    Started,
    Transferring,
    Complete,
}

/// Firmware metadata block, identical for RF and RX
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FirmwareInfo {
    pub firmware_id: u32,
    pub firmware_len: u32,
    pub hardware_revision: u32,
    pub firmware_revision: u32,
    pub package_address: u32,
    pub package_len: u32,
    /// Firmware image owned by the caller; the engine only slices it
    pub package_data: Option<Bytes>,
}

impl FirmwareInfo {
    /// The bytes of the currently requested package
    ///
    /// The length is capped to [`FIRMWARE_CHUNK_MAX`]. Returns `None` when no
    /// image is attached or the requested range falls outside it.
    pub fn package_chunk(&self) -> Option<&[u8]> {
        let data = self.package_data.as_ref()?;
        let start = self.package_address as usize;
        let len = (self.package_len as usize).min(FIRMWARE_CHUNK_MAX);
        let end = start.checked_add(len)?;
        data.get(start..end)
    }
}

/// Transmitter-side (RF module) information
#[derive(Debug, Clone, PartialEq)]
pub struct RfInfo {
    pub id: [u8; 4],
    pub bind_power: BindPower,
    pub channel_count: u8,
    pub channel_data_mode: ChannelDataMode,
    pub protocol: RfProtocol,
    pub firmware_state: FirmwareUpdateState,
    pub firmware: FirmwareInfo,
}

impl Default for RfInfo {
    fn default() -> Self {
        Self {
            id: [8, 8, 8, 8],
            bind_power: BindPower::Normal,
            channel_count: DEFAULT_CHANNEL_COUNT,
            channel_data_mode: ChannelDataMode::Normal,
            protocol: RfProtocol::Afhds,
            firmware_state: FirmwareUpdateState::Idle,
            firmware: FirmwareInfo::default(),
        }
    }
}

/// Receiver information
#[derive(Debug, Clone, PartialEq)]
pub struct RxInfo {
    pub id: [u8; 4],
    pub pulse_mode: RxPulseMode,
    pub bus_type: RxBusType,
    pub servo_frequency: u16,
    /// Output pulse widths in µs; only valid values are ever stored
    channels: ChannelValues,
    pub firmware: FirmwareInfo,
}

impl Default for RxInfo {
    fn default() -> Self {
        Self {
            id: [0, 0, 1, 0],
            pulse_mode: RxPulseMode::Pwm,
            bus_type: RxBusType::Ibus,
            servo_frequency: DEFAULT_SERVO_FREQUENCY_HZ,
            channels: [CHANNEL_VALUE_CENTER; MAX_CHANNELS],
            firmware: FirmwareInfo::default(),
        }
    }
}

impl RxInfo {
    /// Store a channel output value
    ///
    /// Returns false, leaving the stored value untouched, when the index is out
    /// of range or the value is not a valid pulse width.
    pub fn set_channel(&mut self, channel: usize, value: u16) -> bool {
        if !is_valid_channel_value(value) {
            return false;
        }
        match self.channels.get_mut(channel) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn channel(&self, channel: usize) -> Option<u16> {
        self.channels.get(channel).copied()
    }

    pub fn channels(&self) -> &ChannelValues {
        &self.channels
    }
}

/// Raw GPS block as reported by the receiver
///
/// Layout (little-endian): position fix (1), satellites (1), latitude (4),
/// longitude (4), altitude (4), ground speed (2), heading (2). Sensor replies
/// carry only the first 17 bytes, so the heading high byte is never updated
/// by the receiver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GpsInfo {
    raw: [u8; GPS_BLOCK_SIZE],
}

impl GpsInfo {
    /// Overwrite the block with the bytes of a GPS sensor reply
    pub fn store_reply(&mut self, bytes: &[u8; GPS_REPLY_SIZE]) {
        self.raw[..GPS_REPLY_SIZE].copy_from_slice(bytes);
    }

    pub fn position_fix(&self) -> u8 {
        self.raw[0]
    }

    pub fn satellites(&self) -> u8 {
        self.raw[1]
    }

    pub fn latitude(&self) -> i32 {
        i32::from_le_bytes([self.raw[2], self.raw[3], self.raw[4], self.raw[5]])
    }

    pub fn longitude(&self) -> i32 {
        i32::from_le_bytes([self.raw[6], self.raw[7], self.raw[8], self.raw[9]])
    }

    pub fn altitude(&self) -> i32 {
        i32::from_le_bytes([self.raw[10], self.raw[11], self.raw[12], self.raw[13]])
    }

    pub fn ground_speed(&self) -> u16 {
        u16::from_le_bytes([self.raw[14], self.raw[15]])
    }

    pub fn heading(&self) -> u16 {
        u16::from_le_bytes([self.raw[16], self.raw[17]])
    }

    pub fn as_bytes(&self) -> &[u8; GPS_BLOCK_SIZE] {
        &self.raw
    }
}

/// Number of 16-bit level sensors (RSSI through pressure)
pub const LEVEL_SENSOR_COUNT: usize = 7;

/// Last received sensor values; no history is kept
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SensorTelemetry {
    voltage: u16,
    signal: u8,
    /// RSSI, noise, SNR, temperature, external voltage, motor RPM, pressure
    levels: [u16; LEVEL_SENSOR_COUNT],
    gps: GpsInfo,
}

impl SensorTelemetry {
    pub fn voltage(&self) -> u16 {
        self.voltage
    }

    pub fn signal(&self) -> u8 {
        self.signal
    }

    pub fn rssi(&self) -> u16 {
        self.levels[0]
    }

    pub fn noise(&self) -> u16 {
        self.levels[1]
    }

    pub fn snr(&self) -> u16 {
        self.levels[2]
    }

    pub fn temperature(&self) -> u16 {
        self.levels[3]
    }

    pub fn ext_voltage(&self) -> u16 {
        self.levels[4]
    }

    pub fn motor_rpm(&self) -> u16 {
        self.levels[5]
    }

    pub fn pressure(&self) -> u16 {
        self.levels[6]
    }

    pub fn gps(&self) -> &GpsInfo {
        &self.gps
    }

    pub(crate) fn set_voltage(&mut self, value: u16) {
        self.voltage = value;
    }

    pub(crate) fn set_signal(&mut self, value: u8) {
        self.signal = value;
    }

    pub(crate) fn set_level(&mut self, slot: usize, value: u16) {
        if let Some(level) = self.levels.get_mut(slot) {
            *level = value;
        }
    }

    pub(crate) fn gps_mut(&mut self) -> &mut GpsInfo {
        &mut self.gps
    }

    /// Named copy of every value, for logging
    pub fn snapshot(&self) -> SensorSnapshot {
        SensorSnapshot {
            voltage: self.voltage(),
            signal: self.signal(),
            rssi: self.rssi(),
            noise: self.noise(),
            snr: self.snr(),
            temperature: self.temperature(),
            ext_voltage: self.ext_voltage(),
            motor_rpm: self.motor_rpm(),
            pressure: self.pressure(),
            gps_fix: self.gps.position_fix(),
            gps_satellites: self.gps.satellites(),
            gps_latitude: self.gps.latitude(),
            gps_longitude: self.gps.longitude(),
            gps_altitude: self.gps.altitude(),
            gps_ground_speed: self.gps.ground_speed(),
            gps_heading: self.gps.heading(),
        }
    }
}

/// Serializable view of [`SensorTelemetry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SensorSnapshot {
    pub voltage: u16,
    pub signal: u8,
    pub rssi: u16,
    pub noise: u16,
    pub snr: u16,
    pub temperature: u16,
    pub ext_voltage: u16,
    pub motor_rpm: u16,
    pub pressure: u16,
    pub gps_fix: u8,
    pub gps_satellites: u8,
    pub gps_latitude: i32,
    pub gps_longitude: i32,
    pub gps_altitude: i32,
    pub gps_ground_speed: u16,
    pub gps_heading: u16,
}

/// Everything the engine knows about one module and its receiver
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleState {
    pub rf: RfInfo,
    pub rx: RxInfo,
    pub sensor: SensorTelemetry,
    pub tx_power_dbm: u8,
    /// Model identifier recorded by the last successful bind
    pub model_id: u8,
}

impl Default for ModuleState {
    fn default() -> Self {
        Self {
            rf: RfInfo::default(),
            rx: RxInfo::default(),
            sensor: SensorTelemetry::default(),
            tx_power_dbm: DEFAULT_TX_POWER_DBM,
            model_id: 0,
        }
    }
}

impl ModuleState {
    /// Firmware block of the given side
    pub fn firmware(&self, target: FirmwareTarget) -> &FirmwareInfo {
        match target {
            FirmwareTarget::Rx => &self.rx.firmware,
            FirmwareTarget::Rf => &self.rf.firmware,
        }
    }

    pub fn firmware_mut(&mut self, target: FirmwareTarget) -> &mut FirmwareInfo {
        match target {
            FirmwareTarget::Rx => &mut self.rx.firmware,
            FirmwareTarget::Rf => &mut self.rf.firmware,
        }
    }
}

/// Read a little-endian u16 at `offset`
pub fn read_u16_le(bytes: &[u8], offset: usize) -> Option<u16> {
    let field = bytes.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_le_bytes([field[0], field[1]]))
}

/// Read a little-endian u32 at `offset`
pub fn read_u32_le(bytes: &[u8], offset: usize) -> Option<u32> {
    let field = bytes.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes([field[0], field[1], field[2], field[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let state = ModuleState::default();
        assert_eq!(state.rf.id, [8, 8, 8, 8]);
        assert_eq!(state.rf.bind_power, BindPower::Normal);
        assert_eq!(state.rf.channel_count, DEFAULT_CHANNEL_COUNT);
        assert_eq!(state.rx.id, [0, 0, 1, 0]);
        assert_eq!(state.rx.servo_frequency, 50);
        assert_eq!(state.tx_power_dbm, 90);
        assert!(state.rx.channels().iter().all(|&v| v == CHANNEL_VALUE_CENTER));
    }

    #[test]
    fn test_set_channel_rejects_invalid_values() {
        let mut rx = RxInfo::default();
        assert!(rx.set_channel(0, 1000));
        assert_eq!(rx.channel(0), Some(1000));

        assert!(!rx.set_channel(0, 900));
        assert!(!rx.set_channel(0, 2100));
        assert!(!rx.set_channel(0, 0));
        assert_eq!(rx.channel(0), Some(1000), "Rejected value must not overwrite");

        assert!(!rx.set_channel(MAX_CHANNELS, 1500));
    }

    #[test]
    fn test_gps_reply_leaves_heading_high_byte() {
        let mut gps = GpsInfo::default();
        let mut reply = [0u8; GPS_REPLY_SIZE];
        reply[0] = 1;
        reply[1] = 9;
        reply[2..6].copy_from_slice(&377_749_000i32.to_le_bytes());
        reply[6..10].copy_from_slice(&(-1_224_194_000i32).to_le_bytes());
        reply[10..14].copy_from_slice(&120i32.to_le_bytes());
        reply[14..16].copy_from_slice(&255u16.to_le_bytes());
        reply[16] = 0x28;
        gps.store_reply(&reply);

        assert_eq!(gps.position_fix(), 1);
        assert_eq!(gps.satellites(), 9);
        assert_eq!(gps.latitude(), 377_749_000);
        assert_eq!(gps.longitude(), -1_224_194_000);
        assert_eq!(gps.altitude(), 120);
        assert_eq!(gps.ground_speed(), 255);
        assert_eq!(gps.heading(), 0x0028);
    }

    #[test]
    fn test_sensor_levels_by_slot() {
        let mut sensor = SensorTelemetry::default();
        for slot in 0..LEVEL_SENSOR_COUNT {
            sensor.set_level(slot, 100 + slot as u16);
        }
        assert_eq!(sensor.rssi(), 100);
        assert_eq!(sensor.noise(), 101);
        assert_eq!(sensor.snr(), 102);
        assert_eq!(sensor.temperature(), 103);
        assert_eq!(sensor.ext_voltage(), 104);
        assert_eq!(sensor.motor_rpm(), 105);
        assert_eq!(sensor.pressure(), 106);

        sensor.set_level(LEVEL_SENSOR_COUNT, 999);
        assert_eq!(sensor.pressure(), 106);
    }

    #[test]
    fn test_package_chunk() {
        let mut info = FirmwareInfo::default();
        assert_eq!(info.package_chunk(), None);

        info.package_data = Some(Bytes::from((0u8..200).collect::<Vec<u8>>()));
        info.package_address = 10;
        info.package_len = 4;
        assert_eq!(info.package_chunk(), Some(&[10u8, 11, 12, 13][..]));

        info.package_len = 500;
        assert_eq!(info.package_chunk().map(|c| c.len()), Some(FIRMWARE_CHUNK_MAX));

        info.package_address = 190;
        assert_eq!(info.package_chunk(), None);
    }

    #[test]
    fn test_le_readers() {
        let bytes = [0x01, 0x02, 0x03, 0x04, 0x05];
        assert_eq!(read_u16_le(&bytes, 0), Some(0x0201));
        assert_eq!(read_u32_le(&bytes, 1), Some(0x0504_0302));
        assert_eq!(read_u16_le(&bytes, 4), None);
        assert_eq!(read_u32_le(&bytes, usize::MAX), None);
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut sensor = SensorTelemetry::default();
        sensor.set_voltage(512);
        let json = serde_json::to_string(&sensor.snapshot()).unwrap();
        assert!(json.contains("\"voltage\":512"));
    }
}
