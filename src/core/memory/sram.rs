//! Save RAM mantida por bateria (SRAM/FRAM).
//! Buffer plano sem protocolo; todo endereço é mascarado pelo tamanho.

use crate::core::memory::bus::{read_le, write_le, AccessWidth};
use crate::core::memory::ERASED;
use log::info;

/// Save RAM
#[derive(Debug, Clone)]
pub struct SaveRam {
    data: Vec<u8>,
    mask: u32,
}

impl SaveRam {
    /// Cria uma nova Save RAM apagada. `size` precisa ser potência de dois.
    pub fn new(size: usize) -> Self {
        debug_assert!(size.is_power_of_two());
        info!("Save RAM criada: {} bytes", size);
        Self {
            data: vec![ERASED; size],
            mask: size as u32 - 1,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn mask(&self) -> u32 {
        self.mask
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Lê da Save RAM
    pub fn read(&self, addr: u32, width: AccessWidth) -> u32 {
        read_le(&self.data, addr & self.mask, width)
    }

    /// Escreve na Save RAM
    pub fn write(&mut self, addr: u32, width: AccessWidth, value: u32) {
        write_le(&mut self.data, addr & self.mask, width, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_erased() {
        let ram = SaveRam::new(32 * 1024);
        assert_eq!(ram.size(), 32 * 1024);
        assert_eq!(ram.mask(), 0x7FFF);
        assert!(ram.data().iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_addresses_are_masked() {
        let mut ram = SaveRam::new(32 * 1024);
        ram.write(0x0E00_1000, AccessWidth::Byte, 0x42);
        assert_eq!(ram.read(0x1000, AccessWidth::Byte), 0x42);
        assert_eq!(ram.read(0x0E00_9000, AccessWidth::Byte), 0x42);
    }

    #[test]
    fn test_half_and_word() {
        let mut ram = SaveRam::new(64);
        ram.write(0x0E00_0011, AccessWidth::Word, 0xCAFE_BABE);
        assert_eq!(ram.read(0x10, AccessWidth::Word), 0xCAFE_BABE);
        assert_eq!(ram.read(0x12, AccessWidth::Half), 0xCAFE);
        assert_eq!(&ram.data()[0x10..0x14], &[0xBE, 0xBA, 0xFE, 0xCA]);
    }
}
