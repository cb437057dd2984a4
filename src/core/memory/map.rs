//! Decodificação de endereços do espaço do cartucho.
//!
//! As faixas de endereço se sobrepõem (a janela da EEPROM fica dentro da ROM,
//! SRAM e FlashROM dividem 0x0E000000), então a ordem das verificações é a
//! regra: a primeira que casar vence.

use crate::core::memory::{ROM_WINDOW_MASK, SAVE_AREA_MASK, SAVE_AREA_START};

/// Destino de um acesso ao barramento
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemRegion {
    Rom(u32),   // Offset dentro da imagem (janela de 25 bits)
    Sram(u32),  // Offset já mascarado pela Save RAM
    Eeprom,     // EEPROM serial (um bit por acesso)
    Flash(u32), // Endereço completo, o chip usa os 16 bits baixos
    OpenBus,    // Nada responde
}

/// Janela de reconhecimento da EEPROM: `addr & mask == pattern`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EepromWindow {
    pub mask: u32,
    pub pattern: u32,
}

impl EepromWindow {
    pub const fn matches(&self, addr: u32) -> bool {
        addr & self.mask == self.pattern
    }
}

/// Configuração estática do decodificador, fixada quando o cartucho é carregado
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryMap {
    pub sram_mask: Option<u32>,
    pub eeprom: Option<EepromWindow>,
    pub flash: bool,
    pub rom_mapped: bool,
}

impl MemoryMap {
    /// Mapa vazio: tudo é open bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifica um endereço. Função total e pura: depende só de `addr` e do mapa.
    pub fn classify(&self, addr: u32) -> MemRegion {
        let save_area = addr & SAVE_AREA_MASK == SAVE_AREA_MASK;

        match (self.sram_mask, self.eeprom, self.flash) {
            (Some(mask), _, _) if save_area => MemRegion::Sram(addr & mask),
            (_, Some(window), _) if window.matches(addr) => MemRegion::Eeprom,
            (_, _, true) if save_area => MemRegion::Flash(addr),
            _ if addr < SAVE_AREA_START && self.rom_mapped => {
                MemRegion::Rom(addr & ROM_WINDOW_MASK)
            }
            _ => MemRegion::OpenBus,
        }
    }
}
