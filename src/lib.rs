// Este é o ponto de entrada principal da biblioteca.
// O core é compilado como cdylib para o frontend e como rlib para uso direto.

// Trace por acesso ao barramento: só existe com a feature `trace-bus`.
cfg_if::cfg_if! {
    if #[cfg(feature = "trace-bus")] {
        macro_rules! bus_trace {
            ($($arg:tt)*) => { log::trace!($($arg)*) };
        }
    } else {
        macro_rules! bus_trace {
            ($($arg:tt)*) => {};
        }
    }
}

// Módulos principais do projeto.
pub mod core;

// Interface C para o frontend.
pub mod libretro;

// Re-exportações para facilitar o uso.
pub use crate::core::cartridge::{
    Cartridge, CartridgeConfig, Detection, DetectionSink, ExposedStorage, StorageConfig,
    StorageKind,
};
pub use crate::core::memory::{AccessWidth, CartridgeError, CartridgeResult, MemRegion};

/// Versão do emulador.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Função conveniente para criar um cartucho vazio (sem imagem carregada).
pub fn create_cartridge() -> Cartridge {
    Cartridge::new()
}
