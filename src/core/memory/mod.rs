//! Sistema de memória do cartucho do GBA.
//! Gerencia a decodificação de endereços do espaço do cartucho, a imagem da ROM
//! (com espelhamento) e a Save RAM mantida por bateria.

pub mod bus;
pub mod map;
pub mod rom;
pub mod sram;

// Re-exportações para facilitar o uso
pub use bus::{mirror, AccessWidth};
pub use map::{MemRegion, MemoryMap};
pub use rom::ImageStore;
pub use sram::SaveRam;

/// Janela da ROM no barramento (25 bits = 32 MB, espelhada)
pub const ROM_WINDOW_MASK: u32 = 0x01FF_FFFF;

/// Capacidade máxima da imagem da ROM
pub const MAX_ROM_SIZE: usize = 32 * 1024 * 1024;

/// Bits que selecionam a área de save (SRAM/FlashROM) em 0x0E000000
pub const SAVE_AREA_MASK: u32 = 0x0E00_0000;

/// Primeiro endereço que não pertence à ROM
pub const SAVE_AREA_START: u32 = 0x0E00_0000;

/// Capacidade máxima da Save RAM
pub const MAX_SRAM_SIZE: usize = 32 * 1024;

/// Capacidade máxima da EEPROM (1024 registros de 8 bytes)
pub const MAX_EEPROM_SIZE: usize = 8 * 1024;

/// Capacidade máxima da FlashROM (dois bancos de 64 KB)
pub const MAX_FLASH_SIZE: usize = 128 * 1024;

/// Imagens maiores que isso empurram a janela da EEPROM para 0x0DFFFF00
pub const EEPROM_LARGE_ROM_THRESHOLD: usize = 16 * 1024 * 1024;

/// Valor de um byte apagado (todos os bits em 1)
pub const ERASED: u8 = 0xFF;

/// Erros do sistema de memória do cartucho.
///
/// Acessos ao barramento nunca falham; estes erros só aparecem ao restaurar
/// um snapshot de estado vindo de fora.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartridgeError {
    /// O snapshot é menor que o estado que ele deveria conter
    StateTooShort,
    /// Um campo de estado tem um valor que nenhum modo conhece
    InvalidStateTag(u8),
    /// O snapshot pertence a outro tipo de chip de save
    StorageMismatch,
}

impl std::fmt::Display for CartridgeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CartridgeError::StateTooShort => write!(f, "state snapshot is truncated"),
            CartridgeError::InvalidStateTag(tag) => {
                write!(f, "state snapshot has invalid tag {:#04X}", tag)
            }
            CartridgeError::StorageMismatch => {
                write!(f, "state snapshot belongs to a different storage chip")
            }
        }
    }
}

impl std::error::Error for CartridgeError {}

/// Tipo de resultado para operações de memória
pub type CartridgeResult<T> = Result<T, CartridgeError>;
