//! # Session State
//!
//! Per-port sequencing state: which configuration step is pending, the frame
//! sequence counter and the resend throttle.

use serde::Serialize;

/// Configuration step (or streaming) of a module session
///
/// Every state except [`SessionState::Default`] is a configuration step;
/// `Default` means configuration is complete and channel data is streamed.
/// `Idle` is reached on an explicit rejection and sends nothing until an
/// operator action moves the session elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum SessionState {
    SetTxPower = 0,
    Init,
    Bind,
    SetReceiverId,
    GetReceiverConfig,
    GetRxFirmwareInfo,
    GetRxFwVersion,
    GetRfFirmwareInfo,
    GetRfFwVersion,
    UpdateRfFirmware,
    UpdateRxFirmware,
    GetRxFirmwarePackage,
    GetRfFirmwarePackage,
    SetRxPwmPpm,
    SetRxIbusSbus,
    SetRxServoFreq,
    UpdateRfProtocol,
    Idle,
    Default,
}

impl SessionState {
    const ALL: [SessionState; 19] = [
        Self::SetTxPower,
        Self::Init,
        Self::Bind,
        Self::SetReceiverId,
        Self::GetReceiverConfig,
        Self::GetRxFirmwareInfo,
        Self::GetRxFwVersion,
        Self::GetRfFirmwareInfo,
        Self::GetRfFwVersion,
        Self::UpdateRfFirmware,
        Self::UpdateRxFirmware,
        Self::GetRxFirmwarePackage,
        Self::GetRfFirmwarePackage,
        Self::SetRxPwmPpm,
        Self::SetRxIbusSbus,
        Self::SetRxServoFreq,
        Self::UpdateRfProtocol,
        Self::Idle,
        Self::Default,
    ];

    /// True while the session still has configuration steps to run
    pub fn is_configuring(self) -> bool {
        !matches!(self, Self::Default)
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Map a raw state number; `None` for out-of-range values
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }
}

/// Whether the module is being bound to a receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkMode {
    #[default]
    Normal,
    Bind,
}

/// Sequencing state of one port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    frame_index: u8,
    state: SessionState,
    tick_count: u16,
    mode: LinkMode,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            frame_index: 1,
            state: SessionState::SetTxPower,
            tick_count: 0,
            mode: LinkMode::Normal,
        }
    }

    /// Back to the first configuration step in normal mode
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn frame_index(&self) -> u8 {
        self.frame_index
    }

    /// Next frame sequence number; wraps to 1, never 0
    pub fn advance_frame_index(&mut self) {
        self.frame_index = self.frame_index.wrapping_add(1);
        if self.frame_index == 0 {
            self.frame_index = 1;
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn set_state(&mut self, state: SessionState) {
        self.state = state;
    }

    pub fn mode(&self) -> LinkMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: LinkMode) {
        self.mode = mode;
    }

    pub fn tick_count(&self) -> u16 {
        self.tick_count
    }

    /// Count one configuration tick
    ///
    /// Returns true, and restarts the count, once `threshold` ticks have
    /// elapsed; the caller then (re)sends the current step.
    pub fn advance_tick(&mut self, threshold: u16) -> bool {
        self.tick_count = self.tick_count.saturating_add(1);
        if self.tick_count >= threshold {
            self.tick_count = 0;
            true
        } else {
            false
        }
    }
}
