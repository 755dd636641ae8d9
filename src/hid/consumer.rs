//! Consumer Control HID report - the media keys the pads drive.
//!
//! One byte, one bit per key (see `REPORT_MAP`, report ID 2):
//! ```text
//! Bit 0: Mute        (usage 0xE2)
//! Bit 1: Play/Pause  (usage 0xCD)
//! Bit 2: Volume Up   (usage 0xE9)
//! Bit 3: Volume Down (usage 0xEA)
//! Bit 4-7: padding
//! ```
//! Unlike a single-usage report, several keys may be held at once.

use super::{KeyMask, MediaKey};

/// Consumer control report size in bytes.
pub const CONSUMER_REPORT_SIZE: usize = 1;

/// Consumer Control HID report.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConsumerReport {
    /// Pressed media keys.
    pub keys: KeyMask,
}

impl ConsumerReport {
    /// Create an empty (no keys pressed) report.
    pub const fn empty() -> Self {
        Self {
            keys: KeyMask::EMPTY,
        }
    }

    pub const fn new(keys: KeyMask) -> Self {
        Self { keys }
    }

    /// Serialize to HID report bytes.
    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        if buf.len() < CONSUMER_REPORT_SIZE {
            return 0;
        }
        buf[0] = self.keys.bits();
        CONSUMER_REPORT_SIZE
    }

    /// Check if any key is pressed.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn is_pressed(&self, key: MediaKey) -> bool {
        self.keys.contains(key)
    }
}
