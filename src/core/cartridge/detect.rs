// gba-cart-rs/src/core/cartridge/detect.rs

//! One-shot save-type analysis.
//!
//! While a game runs, the cartridge watches for accesses that reveal which
//! save chip it expects. Each condition is reported at most once per loaded
//! cartridge to an optional sink.

use bitflags::bitflags;
use log::info;

bitflags! {
    /// Conditions reported by the analysis
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Detection: u8 {
        /// Read from the SRAM/FlashROM area
        const SAVE_AREA_READ = 1 << 0;
        /// Write to the SRAM/FlashROM area
        const SAVE_AREA_WRITE = 1 << 1;
        /// Write to the EEPROM window (0x0D000000)
        const EEPROM_WRITE = 1 << 2;
        /// `AA` written to 0x0E005555, the first FlashROM unlock
        const FLASH_UNLOCK = 1 << 3;
        /// The EEPROM address width was resolved from the first transaction
        const EEPROM_SIZE = 1 << 4;
    }
}

const DESCRIPTIONS: [(Detection, &str); 5] = [
    (Detection::SAVE_AREA_READ, "SRAM/FlashROM read detected"),
    (Detection::SAVE_AREA_WRITE, "SRAM/FlashROM write detected"),
    (Detection::EEPROM_WRITE, "EEPROM write detected"),
    (Detection::FLASH_UNLOCK, "FlashROM write detected"),
    (Detection::EEPROM_SIZE, "EEPROM size detected"),
];

impl Detection {
    pub fn describe(self) -> &'static str {
        DESCRIPTIONS
            .iter()
            .find(|(flag, _)| *flag == self)
            .map(|(_, text)| *text)
            .unwrap_or("multiple conditions")
    }
}

/// Receiver for analysis events
pub trait DetectionSink {
    fn detected(&mut self, event: Detection);
}

/// Default sink: one `info!` line per event
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DetectionSink for LogSink {
    fn detected(&mut self, event: Detection) {
        info!("* {}", event.describe());
    }
}

/// Tracks which conditions already fired
pub struct DetectionLatch {
    fired: Detection,
    sink: Option<Box<dyn DetectionSink>>,
}

impl DetectionLatch {
    pub fn new(sink: Option<Box<dyn DetectionSink>>) -> Self {
        Self {
            fired: Detection::empty(),
            sink,
        }
    }

    /// Report `event` unless it already fired
    pub fn fire(&mut self, event: Detection) {
        if self.fired.contains(event) {
            return;
        }
        self.fired.insert(event);
        if let Some(sink) = self.sink.as_mut() {
            sink.detected(event);
        }
    }

    pub fn fired(&self) -> Detection {
        self.fired
    }

    /// Forget fired conditions (new cartridge)
    pub fn rearm(&mut self) {
        self.fired = Detection::empty();
    }
}

impl std::fmt::Debug for DetectionLatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectionLatch")
            .field("fired", &self.fired)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}
