// gba-cart-rs/src/core/cartridge/mod.rs

//! Cartridge module
//!
//! The `Cartridge` owns the program image and at most one save chip, decodes
//! every bus access into exactly one destination and dispatches it.

pub mod config;
pub mod detect;
pub mod eeprom;
pub mod flash;

pub use config::{CartridgeConfig, StorageConfig, StorageKind};
pub use detect::{Detection, DetectionLatch, DetectionSink, LogSink};
pub use eeprom::SerialEeprom;
pub use flash::FlashRom;

use crate::core::memory::bus::AccessWidth;
use crate::core::memory::map::{MemRegion, MemoryMap};
use crate::core::memory::{
    CartridgeError, CartridgeResult, ImageStore, SaveRam, ERASED, SAVE_AREA_MASK,
};
use log::{info, warn};

/// The save chip on the cartridge
#[derive(Debug)]
pub enum Storage {
    None,
    BatteryRam(SaveRam),
    Eeprom(SerialEeprom),
    FlashRom(FlashRom),
}

impl Storage {
    fn create(config: &StorageConfig) -> Self {
        match *config {
            StorageConfig::None => Storage::None,
            StorageConfig::BatteryRam { size, .. } => Storage::BatteryRam(SaveRam::new(size)),
            StorageConfig::Eeprom { size, .. } => Storage::Eeprom(SerialEeprom::new(size)),
            StorageConfig::FlashRom { size, chip_id, .. } => {
                Storage::FlashRom(FlashRom::new(size, chip_id))
            }
        }
    }

    pub fn kind(&self) -> StorageKind {
        match self {
            Storage::None => StorageKind::None,
            Storage::BatteryRam(_) => StorageKind::BatteryRam,
            Storage::Eeprom(_) => StorageKind::Eeprom,
            Storage::FlashRom(_) => StorageKind::FlashRom,
        }
    }

    pub fn data(&self) -> Option<&[u8]> {
        match self {
            Storage::None => None,
            Storage::BatteryRam(ram) => Some(ram.data()),
            Storage::Eeprom(eeprom) => Some(eeprom.data()),
            Storage::FlashRom(flash) => Some(flash.data()),
        }
    }

    pub fn data_mut(&mut self) -> Option<&mut [u8]> {
        match self {
            Storage::None => None,
            Storage::BatteryRam(ram) => Some(ram.data_mut()),
            Storage::Eeprom(eeprom) => Some(eeprom.data_mut()),
            Storage::FlashRom(flash) => Some(flash.data_mut()),
        }
    }

    fn power(&mut self) {
        match self {
            Storage::Eeprom(eeprom) => eeprom.power(),
            Storage::FlashRom(flash) => flash.power(),
            Storage::None | Storage::BatteryRam(_) => {}
        }
    }

    fn save_state(&self) -> Vec<u8> {
        match self {
            Storage::None => Vec::new(),
            Storage::BatteryRam(ram) => ram.data().to_vec(),
            Storage::Eeprom(eeprom) => eeprom.save_state(),
            Storage::FlashRom(flash) => flash.save_state(),
        }
    }

    fn load_state(&mut self, data: &[u8]) -> CartridgeResult<()> {
        match self {
            Storage::None => Ok(()),
            Storage::BatteryRam(ram) => {
                let size = ram.size();
                let contents = data.get(..size).ok_or(CartridgeError::StateTooShort)?;
                ram.data_mut().copy_from_slice(contents);
                Ok(())
            }
            Storage::Eeprom(eeprom) => eeprom.load_state(data),
            Storage::FlashRom(flash) => flash.load_state(data),
        }
    }
}

/// The save buffer handed to the persistence layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExposedStorage<'a> {
    pub kind: StorageKind,
    /// Save file name from the configuration
    pub name: &'a str,
    pub data: &'a [u8],
}

/// GBA cartridge: program image plus at most one save chip
pub struct Cartridge {
    loaded: bool,
    title: String,
    content_hash: [u8; 32],

    rom: ImageStore,
    storage: Storage,
    storage_name: String,
    storage_dirty: bool,

    map: MemoryMap,
    open_bus: u32, // Last instruction fetched by the CPU pipeline
    analysis: DetectionLatch,
}

impl Cartridge {
    /// Empty cartridge; analysis events go to the log
    pub fn new() -> Self {
        Self::with_sink(Some(Box::new(LogSink)))
    }

    /// Empty cartridge with a custom analysis sink (or none)
    pub fn with_sink(sink: Option<Box<dyn DetectionSink>>) -> Self {
        Self {
            loaded: false,
            title: String::new(),
            content_hash: [0; 32],
            rom: ImageStore::new(),
            storage: Storage::None,
            storage_name: String::new(),
            storage_dirty: false,
            map: MemoryMap::new(),
            open_bus: 0,
            analysis: DetectionLatch::new(sink),
        }
    }

    /// Load a resolved configuration, replacing whatever was loaded
    pub fn load(&mut self, config: CartridgeConfig) {
        self.unload();

        let storage = config.storage.normalize();
        self.rom.load(&config.image);
        self.storage = Storage::create(&storage);
        self.storage_name = storage.name().to_string();
        self.storage_dirty = false;

        self.map = MemoryMap {
            sram_mask: match &self.storage {
                Storage::BatteryRam(ram) => Some(ram.mask()),
                _ => None,
            },
            eeprom: match &self.storage {
                Storage::Eeprom(_) => Some(eeprom::recognition_window(self.rom.size())),
                _ => None,
            },
            flash: matches!(self.storage, Storage::FlashRom(_)),
            rom_mapped: self.rom.is_mapped(),
        };

        self.title = config.title;
        self.content_hash = config.content_hash;
        self.analysis.rearm();
        self.loaded = true;

        info!(
            "Cartridge loaded: '{}', ROM {} bytes, storage: {}",
            self.title,
            self.rom.size(),
            self.storage.kind()
        );
    }

    /// Release the image, the save chip and the configuration. Idempotent.
    pub fn unload(&mut self) {
        if !self.loaded {
            return;
        }
        self.loaded = false;

        self.rom.clear();
        self.storage = Storage::None;
        self.storage_name.clear();
        self.storage_dirty = false;
        self.map = MemoryMap::new();
        self.title.clear();
        self.content_hash = [0; 32];

        info!("Cartridge unloaded");
    }

    /// Cold/warm reset: protocol state only, save contents are kept
    pub fn power(&mut self) {
        self.storage.power();
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn content_hash(&self) -> &[u8; 32] {
        &self.content_hash
    }

    pub fn rom_size(&self) -> usize {
        self.rom.size()
    }

    pub fn storage_kind(&self) -> StorageKind {
        self.storage.kind()
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn memory_map(&self) -> &MemoryMap {
        &self.map
    }

    /// Analysis conditions seen since load
    pub fn detections(&self) -> Detection {
        self.analysis.fired()
    }

    /// Destination of an access to `address`
    pub fn classify(&self, address: u32) -> MemRegion {
        self.map.classify(address)
    }

    /// Value returned where nothing answers; supplied by the CPU pipeline
    pub fn latch_open_bus(&mut self, value: u32) {
        self.open_bus = value;
    }

    /// Bus read
    pub fn read(&mut self, address: u32, width: AccessWidth) -> u32 {
        if !self.loaded {
            return self.open_bus;
        }

        let addr = width.align(address);
        if addr & SAVE_AREA_MASK == SAVE_AREA_MASK {
            self.analysis.fire(Detection::SAVE_AREA_READ);
        }

        let region = self.map.classify(addr);
        bus_trace!("cart read  {:08X} {:?} -> {:?}", addr, width, region);

        match (region, &mut self.storage) {
            (MemRegion::Sram(offset), Storage::BatteryRam(ram)) => ram.read(offset, width),
            (MemRegion::Eeprom, Storage::Eeprom(eeprom)) => {
                let undetected = eeprom.address_bits() == 0;
                let bit = eeprom.read();
                if undetected && eeprom.address_bits() != 0 {
                    self.analysis.fire(Detection::EEPROM_SIZE);
                }
                // Replaying a buffered write request commits it here
                self.storage_dirty |= eeprom.take_modified();
                bit as u32
            }
            // 8-bit bus: one byte whatever the width
            (MemRegion::Flash(addr), Storage::FlashRom(flash)) => flash.read(addr as u16) as u32,
            (MemRegion::Rom(offset), _) => self.rom.read(offset, width),
            _ => self.open_bus,
        }
    }

    /// Bus write
    pub fn write(&mut self, address: u32, width: AccessWidth, value: u32) {
        if !self.loaded {
            return;
        }

        let addr = width.align(address);
        self.analyze_write(addr, value);

        let region = self.map.classify(addr);
        bus_trace!("cart write {:08X} {:?} <- {:08X} ({:?})", addr, width, value, region);

        match (region, &mut self.storage) {
            (MemRegion::Sram(offset), Storage::BatteryRam(ram)) => {
                ram.write(offset, width, value);
                self.storage_dirty = true;
            }
            (MemRegion::Eeprom, Storage::Eeprom(eeprom)) => {
                eeprom.write(value & 1 != 0);
                self.storage_dirty |= eeprom.take_modified();
            }
            (MemRegion::Flash(addr), Storage::FlashRom(flash)) => {
                flash.write(addr as u16, value as u8);
                self.storage_dirty |= flash.take_modified();
            }
            // ROM and open bus ignore writes
            _ => {}
        }
    }

    fn analyze_write(&mut self, addr: u32, value: u32) {
        if addr & SAVE_AREA_MASK == SAVE_AREA_MASK {
            self.analysis.fire(Detection::SAVE_AREA_WRITE);
        }
        if addr & 0x0F00_0000 == 0x0D00_0000 {
            self.analysis.fire(Detection::EEPROM_WRITE);
        }
        if addr & 0x0E00_FFFF == 0x0E00_5555 && value & 0xFF == 0xAA {
            self.analysis.fire(Detection::FLASH_UNLOCK);
        }
    }

    /// Active save buffer, if any
    pub fn ram_data(&self) -> Option<&[u8]> {
        self.storage.data()
    }

    pub fn ram_data_mut(&mut self) -> Option<&mut [u8]> {
        self.storage.data_mut()
    }

    /// Size of the active save buffer, 0 without a save chip
    pub fn ram_size(&self) -> usize {
        self.ram_data().map_or(0, |data| data.len())
    }

    /// What the persistence layer should save, and under which name
    pub fn exposed_storage(&self) -> Option<ExposedStorage<'_>> {
        let data = self.storage.data()?;
        Some(ExposedStorage {
            kind: self.storage.kind(),
            name: &self.storage_name,
            data,
        })
    }

    /// Has the save chip been written since the last `clear_storage_dirty`?
    pub fn storage_dirty(&self) -> bool {
        self.storage_dirty
    }

    pub fn clear_storage_dirty(&mut self) {
        self.storage_dirty = false;
    }

    /// Copy a save file into the active chip. A short file leaves the tail
    /// erased, a long one is truncated. Returns the number of bytes copied.
    pub fn import_storage(&mut self, bytes: &[u8]) -> usize {
        // The file length settles an undetected EEPROM size
        if let Storage::Eeprom(eeprom) = &mut self.storage {
            if eeprom.address_bits() == 0
                && (bytes.len() == eeprom::SMALL_EEPROM_SIZE
                    || bytes.len() == eeprom::LARGE_EEPROM_SIZE)
                && eeprom.resolve_size(bytes.len())
            {
                self.analysis.fire(Detection::EEPROM_SIZE);
            }
        }

        let Some(data) = self.storage.data_mut() else {
            return 0;
        };

        let len = bytes.len().min(data.len());
        data[..len].copy_from_slice(&bytes[..len]);
        data[len..].fill(ERASED);

        if bytes.len() != data.len() {
            warn!(
                "Save file is {} bytes, chip is {} bytes",
                bytes.len(),
                data.len()
            );
        }
        len
    }

    /// Snapshot of the save chip (protocol registers and contents)
    pub fn save_state(&self) -> Vec<u8> {
        let mut state = vec![self.storage.kind().tag()];
        state.extend_from_slice(&self.storage.save_state());
        state
    }

    /// Restore a snapshot taken with `save_state` on the same configuration
    pub fn load_state(&mut self, data: &[u8]) -> CartridgeResult<()> {
        let (&tag, rest) = data.split_first().ok_or(CartridgeError::StateTooShort)?;
        if tag != self.storage.kind().tag() {
            return Err(CartridgeError::StorageMismatch);
        }
        self.storage.load_state(rest)
    }
}

impl Default for Cartridge {
    fn default() -> Self {
        Self::new()
    }
}
