// gba-cart-rs/src/libretro.rs

//! C interface for the frontend.
//!
//! The frontend owns an opaque `Cartridge` handle and drives it through these
//! entry points. Null handles are ignored (reads return 0).

use crate::core::cartridge::{Cartridge, CartridgeConfig, StorageConfig};
use crate::core::memory::AccessWidth;
use libc::{c_int, c_uint, size_t};

// Storage kinds accepted by `gba_cart_load`
pub const GBA_CART_STORAGE_NONE: c_uint = 0;
pub const GBA_CART_STORAGE_BATTERY_RAM: c_uint = 1;
pub const GBA_CART_STORAGE_EEPROM: c_uint = 2;
pub const GBA_CART_STORAGE_FLASH: c_uint = 3;

// Access widths, in bytes
pub const GBA_CART_BYTE: c_uint = 1;
pub const GBA_CART_HALF: c_uint = 2;
pub const GBA_CART_WORD: c_uint = 4;

fn width_from_raw(width: c_uint) -> AccessWidth {
    match width {
        GBA_CART_BYTE => AccessWidth::Byte,
        GBA_CART_HALF => AccessWidth::Half,
        _ => AccessWidth::Word,
    }
}

fn storage_from_raw(kind: c_uint, size: size_t, chip_id: u16) -> StorageConfig {
    match kind {
        GBA_CART_STORAGE_BATTERY_RAM => StorageConfig::BatteryRam { size, name: "save.ram".into() },
        GBA_CART_STORAGE_EEPROM => StorageConfig::Eeprom { size, name: "save.eeprom".into() },
        GBA_CART_STORAGE_FLASH => StorageConfig::FlashRom {
            size,
            chip_id,
            name: "save.flash".into(),
        },
        _ => StorageConfig::None,
    }
}

#[no_mangle]
pub extern "C" fn gba_cart_create() -> *mut Cartridge {
    Box::into_raw(Box::new(Cartridge::new()))
}

/// # Safety
/// `cart` must be null or a handle from `gba_cart_create` not yet destroyed.
#[no_mangle]
pub unsafe extern "C" fn gba_cart_destroy(cart: *mut Cartridge) {
    if !cart.is_null() {
        drop(Box::from_raw(cart));
    }
}

/// Load an image and a save chip. Returns 0 on success, -1 on a null handle.
///
/// # Safety
/// `cart` must be a live handle. `image` must point to `image_len` readable
/// bytes, or be null with `image_len == 0`.
#[no_mangle]
pub unsafe extern "C" fn gba_cart_load(
    cart: *mut Cartridge,
    image: *const u8,
    image_len: size_t,
    storage_kind: c_uint,
    storage_size: size_t,
    flash_id: u16,
) -> c_int {
    let Some(cart) = cart.as_mut() else {
        return -1;
    };

    let image = if image.is_null() || image_len == 0 {
        Vec::new()
    } else {
        std::slice::from_raw_parts(image, image_len).to_vec()
    };

    cart.load(
        CartridgeConfig::new(image).with_storage(storage_from_raw(
            storage_kind,
            storage_size,
            flash_id,
        )),
    );
    0
}

/// # Safety
/// `cart` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn gba_cart_unload(cart: *mut Cartridge) {
    if let Some(cart) = cart.as_mut() {
        cart.unload();
    }
}

/// # Safety
/// `cart` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn gba_cart_power(cart: *mut Cartridge) {
    if let Some(cart) = cart.as_mut() {
        cart.power();
    }
}

/// # Safety
/// `cart` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn gba_cart_read(cart: *mut Cartridge, address: u32, width: c_uint) -> u32 {
    match cart.as_mut() {
        Some(cart) => cart.read(address, width_from_raw(width)),
        None => 0,
    }
}

/// # Safety
/// `cart` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn gba_cart_write(
    cart: *mut Cartridge,
    address: u32,
    width: c_uint,
    value: u32,
) {
    if let Some(cart) = cart.as_mut() {
        cart.write(address, width_from_raw(width), value);
    }
}

/// # Safety
/// `cart` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn gba_cart_latch_open_bus(cart: *mut Cartridge, value: u32) {
    if let Some(cart) = cart.as_mut() {
        cart.latch_open_bus(value);
    }
}

/// Save buffer for the frontend to persist, or null without a save chip.
/// Valid until the next load/unload.
///
/// # Safety
/// `cart` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn gba_cart_ram_data(cart: *mut Cartridge) -> *mut u8 {
    cart.as_mut()
        .and_then(|cart| cart.ram_data_mut())
        .map_or(std::ptr::null_mut(), |data| data.as_mut_ptr())
}

/// # Safety
/// `cart` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn gba_cart_ram_size(cart: *const Cartridge) -> size_t {
    cart.as_ref().map_or(0, |cart| cart.ram_size())
}
