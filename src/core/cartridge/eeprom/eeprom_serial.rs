// gba-cart-rs/src/core/cartridge/eeprom/eeprom_serial.rs

use super::{address_bits_for_size, size_for_address_bits, DUMMY_BITS, RECORD_SIZE};
use crate::core::memory::{CartridgeError, CartridgeResult, ERASED, MAX_EEPROM_SIZE};
use bytemuck::{Pod, Zeroable};
use log::{debug, info};

/// Serial EEPROM protocol state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EepromState {
    /// Waiting for a start bit
    Idle,
    /// Collecting the 2-bit opcode (start bit included)
    ReceivingCommand,
    ReceivingAddress,
    /// Read request complete, waiting for its stop bit
    AwaitingReadStop,
    ReceivingWriteData,
    /// 64 data bits stored, waiting for the stop bit
    AwaitingWriteStop,
    SendingDummyBits,
    SendingReadData,
}

impl EepromState {
    fn tag(self) -> u8 {
        match self {
            EepromState::Idle => 0,
            EepromState::ReceivingCommand => 1,
            EepromState::ReceivingAddress => 2,
            EepromState::AwaitingReadStop => 3,
            EepromState::ReceivingWriteData => 4,
            EepromState::AwaitingWriteStop => 5,
            EepromState::SendingDummyBits => 6,
            EepromState::SendingReadData => 7,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => EepromState::Idle,
            1 => EepromState::ReceivingCommand,
            2 => EepromState::ReceivingAddress,
            3 => EepromState::AwaitingReadStop,
            4 => EepromState::ReceivingWriteData,
            5 => EepromState::AwaitingWriteStop,
            6 => EepromState::SendingDummyBits,
            7 => EepromState::SendingReadData,
            _ => return None,
        })
    }
}

/// Protocol registers as stored in a state snapshot
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct EepromRegs {
    buffer: u64,
    pending_hi: u64,
    pending_lo: u64,
    address: u32,
    cycles: u32,
    address_bits: u32,
    size: u32,
    pending_len: u32,
    state: u8,
    read_request: u8,
    _pad: [u8; 2],
}

const REGS_SIZE: usize = std::mem::size_of::<EepromRegs>();

/// Longest transaction buffered while the address width is unknown
const PENDING_CAPACITY: u32 = 128;

/// Shortest complete transaction (6-bit read request)
const MIN_TRANSACTION: u32 = 2 + 6 + 1;

/// Serial EEPROM structure
#[derive(Debug, Clone)]
pub struct SerialEeprom {
    data: Vec<u8>,          // Backing store, always MAX_EEPROM_SIZE bytes
    size: usize,            // Visible chip size
    address_bits: u32,      // 6, 14, or 0 while undetected
    state: EepromState,     // Current operation state
    buffer: u64,            // Shift accumulator
    cycles: u32,            // Bits handled in the current phase
    read_request: bool,     // Opcode of the current transaction
    address: u32,           // Latched record index

    // Bits of the first transaction while the width is still unknown
    pending: u128,
    pending_len: u32,

    modified: bool,         // A record was committed since the last take_modified()
}

impl SerialEeprom {
    /// Create an erased EEPROM. `size == 0` selects auto-detection.
    pub fn new(size: usize) -> Self {
        let address_bits = address_bits_for_size(size);
        let size = if size == 0 {
            MAX_EEPROM_SIZE
        } else {
            size.min(MAX_EEPROM_SIZE)
        };

        if address_bits == 0 {
            info!("Creating serial EEPROM (size auto-detect)");
        } else {
            info!("Creating serial EEPROM: {} bytes, {} address bits", size, address_bits);
        }

        Self {
            data: vec![ERASED; MAX_EEPROM_SIZE],
            size,
            address_bits,
            state: EepromState::Idle,
            buffer: 0,
            cycles: 0,
            read_request: false,
            address: 0,
            pending: 0,
            pending_len: 0,
            modified: false,
        }
    }

    /// Reset the protocol. Contents and the detected width are kept.
    pub fn power(&mut self) {
        self.state = EepromState::Idle;
        self.buffer = 0;
        self.cycles = 0;
        self.read_request = false;
        self.address = 0;
        self.pending = 0;
        self.pending_len = 0;
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn address_bits(&self) -> u32 {
        self.address_bits
    }

    pub fn state(&self) -> EepromState {
        self.state
    }

    pub fn data(&self) -> &[u8] {
        &self.data[..self.size]
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data[..self.size]
    }

    fn record_count(&self) -> u32 {
        (self.size / RECORD_SIZE).max(1) as u32
    }

    /// Raw 64-bit record, first bit on the wire in bit 63
    pub fn record(&self, index: u32) -> u64 {
        let start = (index % self.record_count()) as usize * RECORD_SIZE;
        self.data[start..start + RECORD_SIZE]
            .iter()
            .fold(0u64, |acc, &byte| acc << 8 | byte as u64)
    }

    fn store_record(&mut self, index: u32, value: u64) {
        let start = (index % self.record_count()) as usize * RECORD_SIZE;
        self.data[start..start + RECORD_SIZE].copy_from_slice(&value.to_be_bytes());
        self.modified = true;
    }

    /// Was a record committed since the last call?
    pub fn take_modified(&mut self) -> bool {
        std::mem::take(&mut self.modified)
    }

    /// Clock one bit into the chip
    pub fn write(&mut self, bit: bool) {
        if self.address_bits == 0 {
            self.buffer_pending(bit);
        } else {
            self.clock(bit);
        }
    }

    /// Clock one bit out of the chip
    pub fn read(&mut self) -> bool {
        if self.address_bits == 0 {
            self.detect_width();
            if self.address_bits == 0 {
                return true;
            }
        }

        match self.state {
            EepromState::SendingDummyBits => {
                self.cycles += 1;
                if self.cycles == DUMMY_BITS {
                    self.cycles = 0;
                    self.state = EepromState::SendingReadData;
                }
                true
            }

            EepromState::SendingReadData => {
                let bit = (self.buffer >> (63 - self.cycles)) & 1 != 0;
                self.cycles += 1;
                if self.cycles == 64 {
                    self.cycles = 0;
                    self.state = EepromState::Idle;
                }
                bit
            }

            // Idle, or still receiving: the line floats high
            _ => true,
        }
    }

    fn clock(&mut self, bit: bool) {
        let bit = bit as u64;

        match self.state {
            EepromState::Idle => {
                // Wait for START bit
                if bit == 1 {
                    self.buffer = 1;
                    self.cycles = 1;
                    self.state = EepromState::ReceivingCommand;
                }
            }

            EepromState::ReceivingCommand => {
                self.buffer = (self.buffer << 1) | bit;
                self.cycles += 1;

                if self.cycles == 2 {
                    // 11 = READ, 10 = WRITE
                    self.read_request = self.buffer & 0b11 == 0b11;
                    self.address = 0;
                    self.cycles = 0;
                    self.state = EepromState::ReceivingAddress;
                }
            }

            EepromState::ReceivingAddress => {
                self.address = (self.address << 1) | bit as u32;
                self.cycles += 1;

                if self.cycles == self.address_bits {
                    self.address %= self.record_count();
                    self.cycles = 0;
                    self.buffer = 0;
                    self.state = if self.read_request {
                        EepromState::AwaitingReadStop
                    } else {
                        EepromState::ReceivingWriteData
                    };
                }
            }

            EepromState::AwaitingReadStop => {
                self.buffer = self.record(self.address);
                self.cycles = 0;
                self.state = EepromState::SendingDummyBits;
            }

            EepromState::ReceivingWriteData => {
                self.buffer = (self.buffer << 1) | bit;
                self.cycles += 1;

                if self.cycles == 64 {
                    self.store_record(self.address, self.buffer);
                    debug!("EEPROM record {} written", self.address);
                    self.cycles = 0;
                    self.state = EepromState::AwaitingWriteStop;
                }
            }

            EepromState::AwaitingWriteStop => {
                self.state = EepromState::Idle;
            }

            // The chip is driving the line
            EepromState::SendingDummyBits | EepromState::SendingReadData => {}
        }
    }

    fn buffer_pending(&mut self, bit: bool) {
        if self.pending_len == 0 && !bit {
            return;
        }
        if self.pending_len < PENDING_CAPACITY {
            self.pending = (self.pending << 1) | bit as u128;
            self.pending_len += 1;
        }
    }

    /// Resolve the address width from the length of the first transaction,
    /// then replay it through the protocol.
    fn detect_width(&mut self) {
        if self.pending_len < MIN_TRANSACTION {
            return;
        }

        let opcode = (self.pending >> (self.pending_len - 2)) & 0b11;
        let overhead = if opcode == 0b11 { 2 + 1 } else { 2 + 64 + 1 };
        let bits = if self.pending_len.saturating_sub(overhead) >= 14 { 14 } else { 6 };

        self.address_bits = bits;
        self.size = size_for_address_bits(bits);
        info!("EEPROM size detected: {} bytes ({} address bits)", self.size, bits);

        let (pending, len) = (self.pending, self.pending_len);
        self.pending = 0;
        self.pending_len = 0;
        for i in (0..len).rev() {
            self.clock((pending >> i) & 1 != 0);
        }
    }

    /// Fix the width from outside (e.g. the length of an imported save file).
    /// Only takes effect while the width is still undetected; any buffered
    /// bits are replayed at the new width.
    pub fn resolve_size(&mut self, size: usize) -> bool {
        if self.address_bits != 0 || size == 0 {
            return false;
        }

        self.address_bits = address_bits_for_size(size);
        self.size = size_for_address_bits(self.address_bits);
        info!("EEPROM size set: {} bytes", self.size);

        let (pending, len) = (self.pending, self.pending_len);
        self.pending = 0;
        self.pending_len = 0;
        for i in (0..len).rev() {
            self.clock((pending >> i) & 1 != 0);
        }
        true
    }

    /// Save state: protocol registers followed by the chip contents
    pub fn save_state(&self) -> Vec<u8> {
        let regs = EepromRegs {
            buffer: self.buffer,
            pending_hi: (self.pending >> 64) as u64,
            pending_lo: self.pending as u64,
            address: self.address,
            cycles: self.cycles,
            address_bits: self.address_bits,
            size: self.size as u32,
            pending_len: self.pending_len,
            state: self.state.tag(),
            read_request: self.read_request as u8,
            _pad: [0; 2],
        };

        let mut state = Vec::with_capacity(REGS_SIZE + self.size);
        state.extend_from_slice(bytemuck::bytes_of(&regs));
        state.extend_from_slice(self.data());
        state
    }

    /// Width, size and bit counter must describe a state the protocol can reach
    fn regs_consistent(regs: &EepromRegs, state: EepromState) -> bool {
        let size_ok = match regs.address_bits {
            0 => regs.size as usize == MAX_EEPROM_SIZE && state == EepromState::Idle,
            6 | 14 => regs.size as usize == size_for_address_bits(regs.address_bits),
            _ => false,
        };
        let pending_ok = regs.pending_len <= PENDING_CAPACITY
            && (regs.address_bits == 0 || regs.pending_len == 0);

        let cycles_ok = match state {
            EepromState::ReceivingCommand => regs.cycles < 2,
            EepromState::ReceivingAddress => regs.cycles < regs.address_bits,
            EepromState::ReceivingWriteData | EepromState::SendingReadData => regs.cycles < 64,
            EepromState::SendingDummyBits => regs.cycles < DUMMY_BITS,
            EepromState::Idle | EepromState::AwaitingReadStop | EepromState::AwaitingWriteStop => {
                true
            }
        };

        size_ok && pending_ok && cycles_ok
    }

    /// Load state
    pub fn load_state(&mut self, data: &[u8]) -> CartridgeResult<()> {
        if data.len() < REGS_SIZE {
            return Err(CartridgeError::StateTooShort);
        }

        let regs: EepromRegs = bytemuck::pod_read_unaligned(&data[..REGS_SIZE]);
        let state = EepromState::from_tag(regs.state)
            .ok_or(CartridgeError::InvalidStateTag(regs.state))?;
        if !Self::regs_consistent(&regs, state) {
            return Err(CartridgeError::InvalidStateTag(regs.state));
        }
        let size = regs.size as usize;
        let contents = data
            .get(REGS_SIZE..REGS_SIZE + size)
            .ok_or(CartridgeError::StateTooShort)?;

        self.data[..size].copy_from_slice(contents);
        self.size = size;
        self.buffer = regs.buffer;
        self.pending = (regs.pending_hi as u128) << 64 | regs.pending_lo as u128;
        self.pending_len = regs.pending_len;
        self.address = regs.address;
        self.cycles = regs.cycles;
        self.address_bits = regs.address_bits;
        self.read_request = regs.read_request != 0;
        self.state = state;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn send(eeprom: &mut SerialEeprom, bits: &[bool]) {
        for &bit in bits {
            eeprom.write(bit);
        }
    }

    fn address_bits(addr: u32, width: u32) -> Vec<bool> {
        (0..width).rev().map(|i| (addr >> i) & 1 != 0).collect()
    }

    fn write_request(eeprom: &mut SerialEeprom, width: u32, addr: u32, value: u64) {
        let mut bits = vec![true, false];
        bits.extend(address_bits(addr, width));
        bits.extend((0..64).rev().map(|i| (value >> i) & 1 != 0));
        bits.push(false);
        send(eeprom, &bits);
    }

    fn read_request(eeprom: &mut SerialEeprom, width: u32, addr: u32) -> u64 {
        let mut bits = vec![true, true];
        bits.extend(address_bits(addr, width));
        bits.push(false);
        send(eeprom, &bits);

        for _ in 0..DUMMY_BITS {
            assert!(eeprom.read());
        }
        (0..64).fold(0u64, |acc, _| acc << 1 | eeprom.read() as u64)
    }

    #[test]
    fn test_starts_erased_and_idle() {
        let eeprom = SerialEeprom::new(512);
        assert_eq!(eeprom.size(), 512);
        assert_eq!(eeprom.address_bits(), 6);
        assert_eq!(eeprom.state(), EepromState::Idle);
        assert!(eeprom.data().iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_idle_reads_high() {
        let mut eeprom = SerialEeprom::new(512);
        for _ in 0..10 {
            assert!(eeprom.read());
        }
        assert_eq!(eeprom.state(), EepromState::Idle);
    }

    #[test]
    fn test_zero_bits_while_idle_are_ignored() {
        let mut eeprom = SerialEeprom::new(512);
        send(&mut eeprom, &[false, false, false]);
        assert_eq!(eeprom.state(), EepromState::Idle);
    }

    #[test]
    fn test_round_trip_small() {
        let mut eeprom = SerialEeprom::new(512);
        write_request(&mut eeprom, 6, 5, 0x0123_4567_89AB_CDEF);
        assert_eq!(eeprom.state(), EepromState::Idle);
        assert_eq!(read_request(&mut eeprom, 6, 5), 0x0123_4567_89AB_CDEF);
        assert_eq!(eeprom.state(), EepromState::Idle);

        // MSB first: the first data bit lands in bit 7 of the record's first byte
        assert_eq!(&eeprom.data()[40..48], &[0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF]);
    }

    #[test]
    fn test_round_trip_large() {
        let mut eeprom = SerialEeprom::new(8192);
        assert_eq!(eeprom.address_bits(), 14);
        write_request(&mut eeprom, 14, 1023, 0xDEAD_BEEF_0000_FFFF);
        assert_eq!(read_request(&mut eeprom, 14, 1023), 0xDEAD_BEEF_0000_FFFF);
        assert_eq!(read_request(&mut eeprom, 14, 1022), u64::MAX);
    }

    #[test]
    fn test_all_ones_scenario() {
        let mut eeprom = SerialEeprom::new(512);
        // Clear record 0 first so the ones really come from the write
        write_request(&mut eeprom, 6, 0, 0);
        assert_eq!(read_request(&mut eeprom, 6, 0), 0);
        write_request(&mut eeprom, 6, 0, u64::MAX);
        assert_eq!(read_request(&mut eeprom, 6, 0), u64::MAX);
    }

    #[test]
    fn test_address_wraps_to_record_count() {
        let mut eeprom = SerialEeprom::new(64); // 8 records, 6-bit addresses
        write_request(&mut eeprom, 6, 9, 0x1111_2222_3333_4444);
        assert_eq!(eeprom.record(1), 0x1111_2222_3333_4444);
        assert_eq!(read_request(&mut eeprom, 6, 1), 0x1111_2222_3333_4444);
    }

    #[test]
    fn test_write_is_committed_after_64_bits() {
        let mut eeprom = SerialEeprom::new(512);
        let mut bits = vec![true, false];
        bits.extend(address_bits(3, 6));
        bits.extend(std::iter::repeat(false).take(63));
        send(&mut eeprom, &bits);
        assert_eq!(eeprom.record(3), u64::MAX);

        eeprom.write(false);
        assert_eq!(eeprom.record(3), 0);
        assert_eq!(eeprom.state(), EepromState::AwaitingWriteStop);
        eeprom.write(false);
        assert_eq!(eeprom.state(), EepromState::Idle);
    }

    #[test]
    fn test_power_resets_protocol_only() {
        let mut eeprom = SerialEeprom::new(512);
        write_request(&mut eeprom, 6, 2, 0x55);
        send(&mut eeprom, &[true, true, false]);
        assert_eq!(eeprom.state(), EepromState::ReceivingAddress);

        eeprom.power();
        let once = eeprom.clone();
        eeprom.power();
        assert_eq!(eeprom.state(), EepromState::Idle);
        assert_eq!(eeprom.state(), once.state());
        assert_eq!(eeprom.data(), once.data());
        assert_eq!(eeprom.record(2), 0x55);
    }

    #[test]
    fn test_auto_detect_from_read_request() {
        let mut eeprom = SerialEeprom::new(0);
        assert_eq!(eeprom.address_bits(), 0);
        assert_eq!(eeprom.size(), 8192);

        let mut bits = vec![true, true];
        bits.extend(address_bits(0, 14));
        bits.push(false);
        send(&mut eeprom, &bits);

        assert!(eeprom.read()); // first dummy bit
        assert_eq!(eeprom.address_bits(), 14);
        assert_eq!(eeprom.size(), 8192);
        assert_eq!(eeprom.state(), EepromState::SendingDummyBits);
    }

    #[test]
    fn test_auto_detect_from_write_request() {
        let mut eeprom = SerialEeprom::new(0);
        write_request(&mut eeprom, 6, 7, 0xA5A5_A5A5_A5A5_A5A5);
        assert!(eeprom.read()); // ready poll
        assert_eq!(eeprom.address_bits(), 6);
        assert_eq!(eeprom.size(), 512);
        assert_eq!(eeprom.record(7), 0xA5A5_A5A5_A5A5_A5A5);
        assert_eq!(read_request(&mut eeprom, 6, 7), 0xA5A5_A5A5_A5A5_A5A5);
    }

    #[test]
    fn test_incomplete_transaction_does_not_detect() {
        let mut eeprom = SerialEeprom::new(0);
        send(&mut eeprom, &[true, true, false]);
        assert!(eeprom.read());
        assert_eq!(eeprom.address_bits(), 0);
    }

    #[test]
    fn test_state_round_trip() {
        let mut eeprom = SerialEeprom::new(512);
        write_request(&mut eeprom, 6, 1, 0xFEED_FACE_CAFE_BEEF);
        send(&mut eeprom, &[true, true]);
        let saved = eeprom.save_state();

        let mut restored = SerialEeprom::new(512);
        restored.load_state(&saved).unwrap();
        assert_eq!(restored.state(), EepromState::ReceivingAddress);
        send(&mut restored, &address_bits(1, 6));
        restored.write(false);
        for _ in 0..DUMMY_BITS {
            restored.read();
        }
        let value = (0..64).fold(0u64, |acc, _| acc << 1 | restored.read() as u64);
        assert_eq!(value, 0xFEED_FACE_CAFE_BEEF);
    }

    #[test]
    fn test_resolve_size_only_while_undetected() {
        let mut eeprom = SerialEeprom::new(0);
        assert!(eeprom.resolve_size(512));
        assert_eq!(eeprom.address_bits(), 6);
        assert_eq!(eeprom.size(), 512);
        assert!(!eeprom.resolve_size(8192));
        assert_eq!(eeprom.size(), 512);
    }

    fn tampered(eeprom: &SerialEeprom, edit: impl FnOnce(&mut EepromRegs)) -> Vec<u8> {
        let mut saved = eeprom.save_state();
        let mut regs: EepromRegs = bytemuck::pod_read_unaligned(&saved[..REGS_SIZE]);
        edit(&mut regs);
        saved[..REGS_SIZE].copy_from_slice(bytemuck::bytes_of(&regs));
        saved
    }

    #[test]
    fn test_load_state_rejects_impossible_registers() {
        let mut eeprom = SerialEeprom::new(512);
        let read_tag = EepromState::SendingReadData.tag();
        let invalid = Err(CartridgeError::InvalidStateTag(read_tag));

        let saved = tampered(&eeprom, |regs| {
            regs.state = read_tag;
            regs.cycles = 200;
        });
        assert_eq!(eeprom.load_state(&saved), invalid);

        let saved = tampered(&eeprom, |regs| {
            regs.state = read_tag;
            regs.address_bits = 9;
        });
        assert_eq!(eeprom.load_state(&saved), invalid);

        // Width and size disagree
        let saved = tampered(&eeprom, |regs| {
            regs.state = read_tag;
            regs.address_bits = 14;
        });
        assert_eq!(eeprom.load_state(&saved), invalid);

        let dummy_tag = EepromState::SendingDummyBits.tag();
        let saved = tampered(&eeprom, |regs| {
            regs.state = dummy_tag;
            regs.cycles = DUMMY_BITS;
        });
        assert_eq!(eeprom.load_state(&saved), Err(CartridgeError::InvalidStateTag(dummy_tag)));

        // Rejected snapshots leave the chip usable
        assert_eq!(eeprom.state(), EepromState::Idle);
        write_request(&mut eeprom, 6, 2, 0x0123_4567_89AB_CDEF);
        assert_eq!(read_request(&mut eeprom, 6, 2), 0x0123_4567_89AB_CDEF);
    }

    #[test]
    fn test_modified_only_on_commit() {
        let mut eeprom = SerialEeprom::new(512);
        read_request(&mut eeprom, 6, 0);
        assert!(!eeprom.take_modified());

        write_request(&mut eeprom, 6, 0, 1);
        assert!(eeprom.take_modified());
        assert!(!eeprom.take_modified());
    }

    #[test]
    fn test_load_state_rejects_bad_data() {
        let mut eeprom = SerialEeprom::new(512);
        assert_eq!(eeprom.load_state(&[0; 4]), Err(CartridgeError::StateTooShort));

        let mut saved = eeprom.save_state();
        saved.truncate(REGS_SIZE + 10);
        assert_eq!(eeprom.load_state(&saved), Err(CartridgeError::StateTooShort));

        let mut saved = eeprom.save_state();
        saved[44] = 0x77; // state tag
        assert_eq!(eeprom.load_state(&saved), Err(CartridgeError::InvalidStateTag(0x77)));
    }
}
