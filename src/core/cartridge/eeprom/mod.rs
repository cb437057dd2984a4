// gba-cart-rs/src/core/cartridge/eeprom/mod.rs

//! EEPROM support module
//!
//! GBA cartridges use a serial EEPROM (4 Kbit or 64 Kbit) that is clocked one
//! bit per bus access. The chip is only reachable through a narrow window inside
//! the ROM region, and the window moves for images larger than 16 MiB.

pub mod eeprom_serial;

pub use eeprom_serial::{EepromState, SerialEeprom};

use crate::core::memory::map::EepromWindow;
use crate::core::memory::{EEPROM_LARGE_ROM_THRESHOLD, MAX_EEPROM_SIZE};

/// Size of one EEPROM record (64 bits)
pub const RECORD_SIZE: usize = 8;

/// 4 Kbit chip (64 records)
pub const SMALL_EEPROM_SIZE: usize = 512;

/// 64 Kbit chip (1024 records)
pub const LARGE_EEPROM_SIZE: usize = MAX_EEPROM_SIZE;

/// Latency bits sent before the record during a read
pub const DUMMY_BITS: u32 = 4;

/// Address bits carried by the serial protocol for a chip of `size` bytes.
/// `0` means the width is not known yet.
pub fn address_bits_for_size(size: usize) -> u32 {
    match size {
        0 => 0,
        s if s <= SMALL_EEPROM_SIZE => 6,
        _ => 14,
    }
}

/// Chip size implied by a protocol address width
pub fn size_for_address_bits(bits: u32) -> usize {
    if bits >= 14 {
        LARGE_EEPROM_SIZE
    } else {
        SMALL_EEPROM_SIZE
    }
}

/// Bus window that reaches the EEPROM for an image of `rom_size` bytes
pub fn recognition_window(rom_size: usize) -> EepromWindow {
    if rom_size > EEPROM_LARGE_ROM_THRESHOLD {
        EepromWindow {
            mask: 0x0FFF_FF00,
            pattern: 0x0DFF_FF00,
        }
    } else {
        EepromWindow {
            mask: 0x0F00_0000,
            pattern: 0x0D00_0000,
        }
    }
}
