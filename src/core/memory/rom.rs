//! Imagem da ROM do cartucho.
//! Uma imagem menor que a janela de 32 MB é espelhada uma única vez no load.

use crate::core::memory::bus::{mirror, read_le, AccessWidth};
use crate::core::memory::{MAX_ROM_SIZE, ROM_WINDOW_MASK};
use log::{info, warn};

/// Buffer da imagem do programa
pub struct ImageStore {
    data: Vec<u8>,
    size: usize, // Tamanho físico fornecido (antes do espelhamento)
}

impl ImageStore {
    /// Cria uma imagem vazia (nada mapeado)
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            size: 0,
        }
    }

    /// Carrega a imagem e preenche o resto da janela com cópias espelhadas
    pub fn load(&mut self, image: &[u8]) {
        let image = if image.len() > MAX_ROM_SIZE {
            warn!(
                "ROM de {} bytes excede a janela de {} bytes, truncando",
                image.len(),
                MAX_ROM_SIZE
            );
            &image[..MAX_ROM_SIZE]
        } else {
            image
        };

        self.size = image.len();
        if self.size == 0 {
            self.data = Vec::new();
            return;
        }

        let mut data = vec![0u8; MAX_ROM_SIZE];
        data[..self.size].copy_from_slice(image);

        if self.size.is_power_of_two() {
            // Repetição simples em blocos
            let mut offset = self.size;
            while offset < MAX_ROM_SIZE {
                data.copy_within(0..self.size, offset);
                offset += self.size;
            }
        } else {
            for addr in self.size..MAX_ROM_SIZE {
                data[addr] = data[mirror(addr, self.size)];
            }
        }

        self.data = data;
        info!("ROM carregada: {} bytes", self.size);
    }

    /// Libera o buffer
    pub fn clear(&mut self) {
        self.data = Vec::new();
        self.size = 0;
    }

    /// Tamanho físico da imagem
    pub fn size(&self) -> usize {
        self.size
    }

    /// Há alguma coisa mapeada?
    pub fn is_mapped(&self) -> bool {
        self.size != 0
    }

    /// A imagem como foi fornecida (sem as cópias espelhadas)
    pub fn image(&self) -> &[u8] {
        &self.data[..self.size]
    }

    /// Lê da ROM. `offset` é mascarado à janela, não ao tamanho físico.
    pub fn read(&self, offset: u32, width: AccessWidth) -> u32 {
        read_le(&self.data, offset & ROM_WINDOW_MASK, width)
    }
}

impl Default for ImageStore {
    fn default() -> Self {
        Self::new()
    }
}
