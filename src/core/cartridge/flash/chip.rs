// gba-cart-rs/src/core/cartridge/flash/chip.rs

/// Known FlashROM parts, identified by the id they report in identification mode.
/// The id is stored with the manufacturer in the low byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlashChip {
    Panasonic,   // MN63F805MNP, 64 KiB
    Sst,         // SST39VF512, 64 KiB
    Macronix64,  // MX29L512, 64 KiB
    Atmel,       // AT29LV512, 64 KiB, 128-byte pages
    Sanyo,       // LE26FV10N1TS, 128 KiB
    Macronix128, // MX29L010, 128 KiB
    Unknown(u16),
}

impl FlashChip {
    pub fn from_id(id: u16) -> Self {
        match id {
            0x1B32 => FlashChip::Panasonic,
            0xD4BF => FlashChip::Sst,
            0x1CC2 => FlashChip::Macronix64,
            0x3D1F => FlashChip::Atmel,
            0x1362 => FlashChip::Sanyo,
            0x09C2 => FlashChip::Macronix128,
            other => FlashChip::Unknown(other),
        }
    }

    pub fn id(self) -> u16 {
        match self {
            FlashChip::Panasonic => 0x1B32,
            FlashChip::Sst => 0xD4BF,
            FlashChip::Macronix64 => 0x1CC2,
            FlashChip::Atmel => 0x3D1F,
            FlashChip::Sanyo => 0x1362,
            FlashChip::Macronix128 => 0x09C2,
            FlashChip::Unknown(id) => id,
        }
    }

    /// Default part for a chip size, used when no id was configured
    pub fn default_for_size(size: usize) -> Self {
        if size > 64 * 1024 {
            FlashChip::Sanyo
        } else {
            FlashChip::Panasonic
        }
    }

    /// Atmel parts write whole 128-byte pages and have no 4 KiB sector erase
    pub fn uses_page_writes(self) -> bool {
        self == FlashChip::Atmel
    }
}

impl std::fmt::Display for FlashChip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlashChip::Panasonic => write!(f, "Panasonic"),
            FlashChip::Sst => write!(f, "SST"),
            FlashChip::Macronix64 => write!(f, "Macronix (64K)"),
            FlashChip::Atmel => write!(f, "Atmel"),
            FlashChip::Sanyo => write!(f, "Sanyo"),
            FlashChip::Macronix128 => write!(f, "Macronix (128K)"),
            FlashChip::Unknown(id) => write!(f, "Unknown({:04X})", id),
        }
    }
}
