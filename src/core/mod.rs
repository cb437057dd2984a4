//! Núcleo do cartucho: barramento/memória e chips de save.

pub mod cartridge;
pub mod memory;
