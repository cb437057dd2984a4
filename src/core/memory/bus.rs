//! Funções de acesso ao barramento - larguras, alinhamento e composição
//! little-endian sobre buffers de bytes.

use num_traits::{PrimInt, Unsigned};

/// Largura de um acesso do processador
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessWidth {
    Byte, // 8-bit
    Half, // 16-bit
    Word, // 32-bit
}

impl AccessWidth {
    /// Número de bytes transferidos
    pub const fn bytes(self) -> usize {
        match self {
            AccessWidth::Byte => 1,
            AccessWidth::Half => 2,
            AccessWidth::Word => 4,
        }
    }

    /// Realinha o endereço como o barramento faz (acessos desalinhados não são erro)
    pub const fn align(self, addr: u32) -> u32 {
        match self {
            AccessWidth::Byte => addr,
            AccessWidth::Half => addr & !1,
            AccessWidth::Word => addr & !3,
        }
    }

    /// Máscara dos bits de dados válidos para esta largura
    pub const fn value_mask(self) -> u32 {
        match self {
            AccessWidth::Byte => 0xFF,
            AccessWidth::Half => 0xFFFF,
            AccessWidth::Word => 0xFFFF_FFFF,
        }
    }
}

/// Lê um valor little-endian (byte 0 no menor endereço).
/// Bytes fora do buffer leem como 0xFF.
pub fn read_le(data: &[u8], addr: u32, width: AccessWidth) -> u32 {
    let base = width.align(addr) as usize;
    (0..width.bytes()).fold(0u32, |value, i| {
        let byte = data.get(base + i).copied().unwrap_or(0xFF);
        value | (byte as u32) << (8 * i)
    })
}

/// Escreve um valor little-endian. Bytes fora do buffer são descartados.
pub fn write_le(data: &mut [u8], addr: u32, width: AccessWidth, value: u32) {
    let base = width.align(addr) as usize;
    for i in 0..width.bytes() {
        if let Some(byte) = data.get_mut(base + i) {
            *byte = (value >> (8 * i)) as u8;
        }
    }
}

/// Espelha `addr` para dentro de uma região de `size` bytes, como o barramento
/// real: subtrai o bit mais alto do endereço até ele cair dentro da região.
/// Para tamanhos potência de dois isso é `addr % size`.
pub fn mirror<T: PrimInt + Unsigned>(addr: T, size: T) -> T {
    if size.is_zero() {
        return T::zero();
    }

    let bits = T::zero().count_zeros() as usize;
    let mut addr = addr;
    let mut size = size;
    let mut base = T::zero();
    let mut mask = T::one() << (bits - 1);

    while addr >= size {
        while (addr & mask).is_zero() {
            mask = mask >> 1;
        }
        addr = addr - mask;
        if size > mask {
            size = size - mask;
            base = base + mask;
        }
        mask = mask >> 1;
    }

    base + addr
}
