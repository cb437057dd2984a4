// gba-cart-rs/src/core/cartridge/flash/mod.rs

//! FlashROM save chip
//!
//! Commands are byte writes to the unlock addresses `0x5555`/`0x2AAA` followed
//! by a command byte. Anything that does not follow a known sequence is dropped
//! and the sequencer goes back to `Ready`, like the real parts do.

pub mod chip;

pub use chip::FlashChip;

use crate::core::memory::{CartridgeError, CartridgeResult, ERASED, MAX_FLASH_SIZE};
use bytemuck::{Pod, Zeroable};
use log::{debug, info};

pub const UNLOCK_ADDR_1: u16 = 0x5555;
pub const UNLOCK_ADDR_2: u16 = 0x2AAA;

/// Erase granularity of the sector erase command
pub const SECTOR_SIZE: usize = 4 * 1024;

/// Size of one bank; chips above this size switch between two banks
pub const BANK_SIZE: usize = 64 * 1024;

/// Atmel page size minus one
const PAGE_MASK: u16 = 0x7F;

/// Command bytes
pub mod cmd {
    pub const UNLOCK_1: u8 = 0xAA;
    pub const UNLOCK_2: u8 = 0x55;
    pub const CHIP_ERASE: u8 = 0x10;
    pub const SECTOR_ERASE: u8 = 0x30;
    pub const ERASE: u8 = 0x80;
    pub const ENTER_ID: u8 = 0x90;
    pub const PROGRAM: u8 = 0xA0;
    pub const BANK_SELECT: u8 = 0xB0;
    pub const EXIT_ID: u8 = 0xF0;
}

/// Command sequencer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashState {
    Ready,
    /// `AA` seen at `5555`. `erase` is set when this unlock follows an erase setup.
    CommandByte1 { erase: bool },
    /// `55` seen at `2AAA`, next byte is the command
    CommandByte2 { erase: bool },
    /// Erase setup (`80`) received, waiting for the second unlock
    Erasing,
    /// Next write is programmed
    ProgrammingByte,
    /// Next write to offset 0 selects the bank
    BankSelect,
}

impl FlashState {
    fn tag(self) -> (u8, u8) {
        match self {
            FlashState::Ready => (0, 0),
            FlashState::CommandByte1 { erase } => (1, erase as u8),
            FlashState::CommandByte2 { erase } => (2, erase as u8),
            FlashState::Erasing => (3, 0),
            FlashState::ProgrammingByte => (4, 0),
            FlashState::BankSelect => (5, 0),
        }
    }

    fn from_tag(tag: u8, erase: u8) -> Option<Self> {
        let erase = erase != 0;
        Some(match tag {
            0 => FlashState::Ready,
            1 => FlashState::CommandByte1 { erase },
            2 => FlashState::CommandByte2 { erase },
            3 => FlashState::Erasing,
            4 => FlashState::ProgrammingByte,
            5 => FlashState::BankSelect,
            _ => return None,
        })
    }
}

/// What reads return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Raw array contents
    Array,
    /// Offsets 0/1 return the chip id
    Identification,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct FlashRegs {
    chip_id: u16,
    state: u8,
    erase: u8,
    read_mode: u8,
    bank: u8,
    _pad: [u8; 2],
}

const REGS_SIZE: usize = std::mem::size_of::<FlashRegs>();

/// FlashROM structure
#[derive(Debug, Clone)]
pub struct FlashRom {
    data: Vec<u8>,
    chip: FlashChip,
    state: FlashState,
    read_mode: ReadMode,
    bank: u8,
    modified: bool, // Contents changed since the last take_modified()
}

impl FlashRom {
    /// Create an erased chip. Sizes above 64 KiB become a two-bank 128 KiB part;
    /// a zero id picks the usual part for the size.
    pub fn new(size: usize, chip_id: u16) -> Self {
        let size = if size > BANK_SIZE { MAX_FLASH_SIZE } else { BANK_SIZE };
        let chip = if chip_id == 0 {
            FlashChip::default_for_size(size)
        } else {
            FlashChip::from_id(chip_id)
        };
        info!("Creating FlashROM: {} ({:04X}), {} bytes", chip, chip.id(), size);

        Self {
            data: vec![ERASED; size],
            chip,
            state: FlashState::Ready,
            read_mode: ReadMode::Array,
            bank: 0,
            modified: false,
        }
    }

    /// Reset the command sequencer, read mode and bank. Contents are kept.
    pub fn power(&mut self) {
        self.state = FlashState::Ready;
        self.read_mode = ReadMode::Array;
        self.bank = 0;
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn chip(&self) -> FlashChip {
        self.chip
    }

    pub fn chip_id(&self) -> u16 {
        self.chip.id()
    }

    pub fn bank(&self) -> u8 {
        self.bank
    }

    pub fn state(&self) -> FlashState {
        self.state
    }

    pub fn read_mode(&self) -> ReadMode {
        self.read_mode
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Did a program or erase touch the contents since the last call?
    pub fn take_modified(&mut self) -> bool {
        std::mem::take(&mut self.modified)
    }

    fn offset(&self, addr: u16) -> usize {
        ((self.bank as usize) << 16 | addr as usize) % self.data.len()
    }

    /// Read a byte at a bank-relative address
    pub fn read(&self, addr: u16) -> u8 {
        match self.read_mode {
            ReadMode::Identification => match addr {
                0x0000 => self.chip.id() as u8,
                0x0001 => (self.chip.id() >> 8) as u8,
                _ => 0x00,
            },
            ReadMode::Array => self.data[self.offset(addr)],
        }
    }

    /// Write a byte at a bank-relative address
    pub fn write(&mut self, addr: u16, byte: u8) {
        let state = self.state;

        self.state = match state {
            FlashState::ProgrammingByte => {
                self.program(addr, byte);
                if self.chip.uses_page_writes() && addr & PAGE_MASK != PAGE_MASK {
                    FlashState::ProgrammingByte
                } else {
                    FlashState::Ready
                }
            }

            FlashState::BankSelect => {
                if addr == 0x0000 {
                    self.select_bank(byte);
                }
                FlashState::Ready
            }

            FlashState::Ready => Self::unlock(addr, byte, false),

            FlashState::Erasing => Self::unlock(addr, byte, true),

            FlashState::CommandByte1 { erase } => {
                if addr == UNLOCK_ADDR_2 && byte == cmd::UNLOCK_2 {
                    FlashState::CommandByte2 { erase }
                } else {
                    Self::unlock(addr, byte, false)
                }
            }

            FlashState::CommandByte2 { erase } => self.command(addr, byte, erase),
        };
    }

    fn unlock(addr: u16, byte: u8, erase: bool) -> FlashState {
        if addr == UNLOCK_ADDR_1 && byte == cmd::UNLOCK_1 {
            FlashState::CommandByte1 { erase }
        } else {
            FlashState::Ready
        }
    }

    fn command(&mut self, addr: u16, byte: u8, erase: bool) -> FlashState {
        // After the 80 prefix only the two erase commands exist
        if erase {
            match byte {
                cmd::CHIP_ERASE if addr == UNLOCK_ADDR_1 => self.erase_chip(),
                cmd::SECTOR_ERASE if !self.chip.uses_page_writes() => self.erase_sector(addr),
                _ => {}
            }
            return FlashState::Ready;
        }

        match byte {
            _ if addr != UNLOCK_ADDR_1 => FlashState::Ready,
            cmd::ERASE => FlashState::Erasing,
            cmd::ENTER_ID => {
                debug!("FlashROM: identification mode");
                self.read_mode = ReadMode::Identification;
                FlashState::Ready
            }
            cmd::EXIT_ID => {
                self.read_mode = ReadMode::Array;
                FlashState::Ready
            }
            cmd::PROGRAM => FlashState::ProgrammingByte,
            cmd::BANK_SELECT => FlashState::BankSelect,
            _ => FlashState::Ready,
        }
    }

    /// Programming can only clear bits. Atmel page writes erase internally
    /// and store the byte as-is.
    fn program(&mut self, addr: u16, byte: u8) {
        let offset = self.offset(addr);
        self.modified = true;
        if self.chip.uses_page_writes() {
            self.data[offset] = byte;
        } else {
            self.data[offset] &= byte;
        }
    }

    fn erase_chip(&mut self) {
        debug!("FlashROM: chip erase");
        self.data.fill(ERASED);
        self.modified = true;
    }

    fn erase_sector(&mut self, addr: u16) {
        let start = self.offset(addr) & !(SECTOR_SIZE - 1);
        debug!("FlashROM: sector erase at {:05X}", start);
        self.data[start..start + SECTOR_SIZE].fill(ERASED);
        self.modified = true;
    }

    fn select_bank(&mut self, byte: u8) {
        if self.data.len() > BANK_SIZE {
            self.bank = byte & 1;
            debug!("FlashROM: bank {}", self.bank);
        }
    }

    /// Save state: registers followed by the chip contents
    pub fn save_state(&self) -> Vec<u8> {
        let (state, erase) = self.state.tag();
        let regs = FlashRegs {
            chip_id: self.chip.id(),
            state,
            erase,
            read_mode: (self.read_mode == ReadMode::Identification) as u8,
            bank: self.bank,
            _pad: [0; 2],
        };

        let mut out = Vec::with_capacity(REGS_SIZE + self.data.len());
        out.extend_from_slice(bytemuck::bytes_of(&regs));
        out.extend_from_slice(&self.data);
        out
    }

    /// Load state
    pub fn load_state(&mut self, data: &[u8]) -> CartridgeResult<()> {
        if data.len() < REGS_SIZE + self.data.len() {
            return Err(CartridgeError::StateTooShort);
        }

        let regs: FlashRegs = bytemuck::pod_read_unaligned(&data[..REGS_SIZE]);
        let state = FlashState::from_tag(regs.state, regs.erase)
            .ok_or(CartridgeError::InvalidStateTag(regs.state))?;
        let read_mode = match regs.read_mode {
            0 => ReadMode::Array,
            1 => ReadMode::Identification,
            other => return Err(CartridgeError::InvalidStateTag(other)),
        };

        let size = self.data.len();
        self.data.copy_from_slice(&data[REGS_SIZE..REGS_SIZE + size]);
        self.chip = FlashChip::from_id(regs.chip_id);
        self.state = state;
        self.read_mode = read_mode;
        self.bank = if size > BANK_SIZE { regs.bank & 1 } else { 0 };

        Ok(())
    }
}
