// gba-cart-rs/src/core/cartridge/config.rs

//! Cartridge configuration, as resolved by the loader.
//!
//! The core never parses a manifest. It receives already-resolved fields and
//! normalizes anything out of range instead of rejecting it.

use crate::core::cartridge::flash::{FlashChip, BANK_SIZE};
use crate::core::memory::{MAX_EEPROM_SIZE, MAX_FLASH_SIZE, MAX_SRAM_SIZE};
use log::warn;

/// Storage chip kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StorageKind {
    #[default]
    None,
    BatteryRam,
    Eeprom,
    FlashRom,
}

impl StorageKind {
    pub(crate) fn tag(self) -> u8 {
        match self {
            StorageKind::None => 0,
            StorageKind::BatteryRam => 1,
            StorageKind::Eeprom => 2,
            StorageKind::FlashRom => 3,
        }
    }
}

impl std::fmt::Display for StorageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageKind::None => write!(f, "None"),
            StorageKind::BatteryRam => write!(f, "Battery RAM"),
            StorageKind::Eeprom => write!(f, "EEPROM"),
            StorageKind::FlashRom => write!(f, "FlashROM"),
        }
    }
}

/// Storage chip selection. `name` is the save file the frontend persists it to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StorageConfig {
    #[default]
    None,
    BatteryRam { size: usize, name: String },
    /// `size == 0` means auto-detect
    Eeprom { size: usize, name: String },
    /// `chip_id == 0` picks the usual part for the size
    FlashRom { size: usize, chip_id: u16, name: String },
}

impl StorageConfig {
    pub fn kind(&self) -> StorageKind {
        match self {
            StorageConfig::None => StorageKind::None,
            StorageConfig::BatteryRam { .. } => StorageKind::BatteryRam,
            StorageConfig::Eeprom { .. } => StorageKind::Eeprom,
            StorageConfig::FlashRom { .. } => StorageKind::FlashRom,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            StorageConfig::None => "",
            StorageConfig::BatteryRam { name, .. }
            | StorageConfig::Eeprom { name, .. }
            | StorageConfig::FlashRom { name, .. } => name,
        }
    }

    /// Bring sizes and ids into the ranges the hardware supports
    pub fn normalize(self) -> Self {
        match self {
            StorageConfig::None => StorageConfig::None,

            StorageConfig::BatteryRam { size, name } => {
                let fixed = match size {
                    0 => MAX_SRAM_SIZE,
                    s => s.min(MAX_SRAM_SIZE).next_power_of_two().max(4),
                };
                if fixed != size {
                    warn!("Battery RAM size {} normalized to {}", size, fixed);
                }
                StorageConfig::BatteryRam { size: fixed, name }
            }

            StorageConfig::Eeprom { size, name } => {
                let fixed = size.min(MAX_EEPROM_SIZE);
                if fixed != size {
                    warn!("EEPROM size {} normalized to {}", size, fixed);
                }
                StorageConfig::Eeprom { size: fixed, name }
            }

            StorageConfig::FlashRom { size, chip_id, name } => {
                let fixed = if size > BANK_SIZE { MAX_FLASH_SIZE } else { BANK_SIZE };
                if fixed != size {
                    warn!("FlashROM size {} normalized to {}", size, fixed);
                }
                let chip_id = if chip_id == 0 {
                    let chip = FlashChip::default_for_size(fixed);
                    warn!("FlashROM without id, assuming {}", chip);
                    chip.id()
                } else {
                    chip_id
                };
                StorageConfig::FlashRom { size: fixed, chip_id, name }
            }
        }
    }
}

/// Everything the loader hands to the core
#[derive(Debug, Clone, Default)]
pub struct CartridgeConfig {
    pub title: String,
    /// Physical program image
    pub image: Vec<u8>,
    pub storage: StorageConfig,
    /// Identity hash of the image, computed by the loader
    pub content_hash: [u8; 32],
}

impl CartridgeConfig {
    pub fn new(image: Vec<u8>) -> Self {
        Self {
            image,
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_content_hash(mut self, hash: [u8; 32]) -> Self {
        self.content_hash = hash;
        self
    }
}
