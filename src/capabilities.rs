//! # Module Capabilities
//!
//! Capability queries over a slot's configured module, used by higher-level
//! code to choose channel ranges and which operator controls to offer. The
//! answers assume a FlySky-family radio with every module family compiled in.

use serde::{Deserialize, Serialize};

/// Physical module slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleSlot {
    Internal,
    External,
    Extra,
    Trainer,
}

/// Module family; the order matches the per-type channel table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleType {
    #[default]
    None = 0,
    Ppm = 1,
    Xjt = 2,
    Flysky = 3,
    Dsm2 = 4,
    Crossfire = 5,
    Multimodule = 6,
    R9m = 7,
    Sbus = 8,
}

/// Channel count of a Crossfire link
pub const CROSSFIRE_CHANNELS: u8 = 16;

/// Maximum channels per module type, relative to 8
const MAX_CHANNELS_BY_TYPE_M8: [i8; 9] = [0, 8, 8, 6, -2, 8, 4, 8, 8];

/// Maximum XJT channels indexed by `1 + rf_protocol`, relative to 8
const MAX_CHANNELS_XJT_M8: [i8; 4] = [0, 8, 0, 4];

const MAX_TRAINER_CHANNELS_M8: i8 = 8;

/// The extra slot only carries 16 channel PPM
const MAX_EXTRA_CHANNELS_M8: i8 = 8;

/// What a slot is configured to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub slot: ModuleSlot,
    pub module_type: ModuleType,
    pub subtype: u8,
    /// XJT sub-protocol, -1 when off
    pub rf_protocol: i8,
    /// Channel count relative to 8
    pub channels_count: i8,
    /// Multimodule running its DSM2 protocol
    pub multi_protocol_dsm2: bool,
}

impl ModuleDescriptor {
    pub fn new(slot: ModuleSlot, module_type: ModuleType) -> Self {
        Self {
            slot,
            module_type,
            subtype: 0,
            rf_protocol: 0,
            channels_count: 0,
            multi_protocol_dsm2: false,
        }
    }

    fn is_external(&self, module_type: ModuleType) -> bool {
        self.slot == ModuleSlot::External && self.module_type == module_type
    }

    pub fn is_flysky(&self) -> bool {
        self.module_type == ModuleType::Flysky
    }

    pub fn is_xjt(&self) -> bool {
        self.is_external(ModuleType::Xjt)
    }

    pub fn is_r9m(&self) -> bool {
        self.module_type == ModuleType::R9m
    }

    pub fn is_crossfire(&self) -> bool {
        self.is_external(ModuleType::Crossfire)
    }

    pub fn is_dsm2(&self) -> bool {
        self.is_external(ModuleType::Dsm2)
    }

    pub fn is_sbus(&self) -> bool {
        self.is_external(ModuleType::Sbus)
    }

    pub fn is_multimodule(&self) -> bool {
        self.is_external(ModuleType::Multimodule)
    }

    pub fn is_multimodule_dsm2(&self) -> bool {
        self.is_multimodule() && self.multi_protocol_dsm2
    }

    pub fn is_extra(&self) -> bool {
        self.slot == ModuleSlot::Extra
    }

    pub fn is_pxx(&self) -> bool {
        self.is_xjt() || self.is_r9m()
    }

    pub fn is_ppm(&self) -> bool {
        self.slot == ModuleSlot::Trainer || self.is_extra() || self.is_external(ModuleType::Ppm)
    }

    fn max_channels_m8(&self) -> i8 {
        if self.is_extra() {
            MAX_EXTRA_CHANNELS_M8
        } else if self.slot == ModuleSlot::Trainer {
            MAX_TRAINER_CHANNELS_M8
        } else if self.is_xjt() {
            let index = 1 + i16::from(self.rf_protocol);
            usize::try_from(index)
                .ok()
                .and_then(|index| MAX_CHANNELS_XJT_M8.get(index).copied())
                .unwrap_or(0)
        } else {
            MAX_CHANNELS_BY_TYPE_M8[self.module_type as usize]
        }
    }

    pub fn max_channels(&self) -> u8 {
        (8 + self.max_channels_m8()) as u8
    }

    pub fn min_channels(&self) -> u8 {
        if self.is_crossfire() {
            CROSSFIRE_CHANNELS
        } else {
            1
        }
    }

    /// Channel count a freshly configured module starts with
    pub fn default_channels(&self) -> u8 {
        if self.is_ppm() || self.is_dsm2() {
            8
        } else if self.is_multimodule_dsm2() {
            7
        } else if self.is_flysky() {
            14
        } else {
            16
        }
    }

    /// Channels actually put on the wire
    pub fn sent_channels(&self) -> u8 {
        if self.is_crossfire() {
            CROSSFIRE_CHANNELS
        } else if self.is_multimodule() && !self.is_multimodule_dsm2() {
            16
        } else {
            (8 + i16::from(self.channels_count)).clamp(0, i16::from(u8::MAX)) as u8
        }
    }

    pub fn needs_receiver_number(&self) -> bool {
        self.is_pxx() || self.is_dsm2() || self.is_multimodule()
    }

    pub fn needs_bind_range_buttons(&self) -> bool {
        self.needs_receiver_number() || self.is_flysky()
    }

    pub fn needs_failsafe_button(&self) -> bool {
        self.is_pxx() || self.is_r9m() || self.is_flysky()
    }
}

/// Whether `module_type` may be configured in `slot`
pub fn is_type_allowed(slot: ModuleSlot, module_type: ModuleType) -> bool {
    match slot {
        ModuleSlot::Internal => matches!(module_type, ModuleType::None | ModuleType::Flysky),
        ModuleSlot::External => matches!(
            module_type,
            ModuleType::None | ModuleType::Ppm | ModuleType::Xjt | ModuleType::Crossfire | ModuleType::R9m
        ),
        ModuleSlot::Extra | ModuleSlot::Trainer => true,
    }
}
