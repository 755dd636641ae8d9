//! HID report types and the report map advertised to hosts.
//!
//! The pads only ever produce Consumer Control (media) reports; the
//! keyboard collection exists so hosts that insist on a keyboard in boot
//! mode still bind the device.

pub mod consumer;
pub mod keyboard;

#[cfg(test)]
mod tests;

pub use consumer::ConsumerReport;
pub use keyboard::KeyboardReport;

/// Report ID of the keyboard input report.
pub const KEYBOARD_REPORT_ID: u8 = 1;
/// Report ID of the consumer-control (media) input report.
pub const CONSUMER_REPORT_ID: u8 = 2;

/// Media keys, in the bit order of the consumer report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum MediaKey {
    Mute = 0,
    PlayPause = 1,
    VolumeUp = 2,
    VolumeDown = 3,
}

impl MediaKey {
    pub const ALL: [MediaKey; 4] = [
        MediaKey::Mute,
        MediaKey::PlayPause,
        MediaKey::VolumeUp,
        MediaKey::VolumeDown,
    ];

    /// Single-bit mask of this key inside the consumer report byte.
    pub const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// Set of currently pressed media keys.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyMask(u8);

impl KeyMask {
    pub const EMPTY: KeyMask = KeyMask(0);

    /// Volume up + volume down held together: the pairing confirmation
    /// gesture.
    pub const PAIRING_CHORD: KeyMask =
        KeyMask(MediaKey::VolumeUp.bit() | MediaKey::VolumeDown.bit());

    /// Build a mask from raw bits. Bits above the four media keys are
    /// dropped.
    pub const fn from_bits(bits: u8) -> Self {
        KeyMask(bits & 0x0F)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Copy of this mask with `key` set or cleared.
    #[must_use]
    pub const fn with(self, key: MediaKey, pressed: bool) -> Self {
        if pressed {
            KeyMask(self.0 | key.bit())
        } else {
            KeyMask(self.0 & !key.bit())
        }
    }

    pub const fn contains(self, key: MediaKey) -> bool {
        self.0 & key.bit() != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = MediaKey> {
        MediaKey::ALL.into_iter().filter(move |k| self.contains(*k))
    }
}

impl FromIterator<MediaKey> for KeyMask {
    fn from_iter<I: IntoIterator<Item = MediaKey>>(iter: I) -> Self {
        iter.into_iter()
            .fold(KeyMask::EMPTY, |mask, key| mask.with(key, true))
    }
}

/// Input report handed to the wireless transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HidReport {
    Keyboard(KeyboardReport),
    Consumer(ConsumerReport),
}

impl HidReport {
    pub fn report_id(&self) -> u8 {
        match self {
            HidReport::Keyboard(_) => KEYBOARD_REPORT_ID,
            HidReport::Consumer(_) => CONSUMER_REPORT_ID,
        }
    }

    /// Serialise into `buf`. Returns the number of bytes written, 0 if
    /// `buf` is too small.
    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        match self {
            HidReport::Keyboard(k) => k.serialize(buf),
            HidReport::Consumer(c) => c.serialize(buf),
        }
    }

    /// Whether a client in boot protocol mode understands this report.
    /// Boot mode only carries the legacy 8-byte keyboard report.
    pub fn is_boot_compatible(&self) -> bool {
        matches!(self, HidReport::Keyboard(_))
    }
}

/// HID Report Map for the combined keyboard + consumer-control device.
///
/// - Report ID 1: boot-compatible keyboard (8 modifier bits, reserved
///   byte, 6 key codes; 5 LED output bits)
/// - Report ID 2: consumer control, one bit each for Mute, Play/Pause,
///   Volume Increment, Volume Decrement, padded to a byte
pub const REPORT_MAP: &[u8] = &[
    0x05, 0x01, // Usage Page (Generic Desktop)
    0x09, 0x06, // Usage (Keyboard)
    0xA1, 0x01, // Collection (Application)
    0x85, KEYBOARD_REPORT_ID, //   Report ID (1)
    //
    //   - Modifier keys (8 bits) -
    0x05, 0x07, //   Usage Page (Keyboard/Keypad)
    0x19, 0xE0, //   Usage Minimum (Left Control)
    0x29, 0xE7, //   Usage Maximum (Right GUI)
    0x15, 0x00, //   Logical Minimum (0)
    0x25, 0x01, //   Logical Maximum (1)
    0x75, 0x01, //   Report Size (1)
    0x95, 0x08, //   Report Count (8)
    0x81, 0x02, //   Input (Data, Variable, Absolute)
    //
    //   - Reserved byte -
    0x95, 0x01, //   Report Count (1)
    0x75, 0x08, //   Report Size (8)
    0x81, 0x01, //   Input (Constant)
    //
    //   - Key codes (6 bytes) -
    0x95, 0x06, //   Report Count (6)
    0x75, 0x08, //   Report Size (8)
    0x15, 0x00, //   Logical Minimum (0)
    0x25, 0x65, //   Logical Maximum (101)
    0x05, 0x07, //   Usage Page (Keyboard/Keypad)
    0x19, 0x00, //   Usage Minimum (0)
    0x29, 0x65, //   Usage Maximum (101)
    0x81, 0x00, //   Input (Data, Array)
    //
    //   - LED output (5 bits + 3 padding) -
    0x95, 0x05, //   Report Count (5)
    0x75, 0x01, //   Report Size (1)
    0x05, 0x08, //   Usage Page (LEDs)
    0x19, 0x01, //   Usage Minimum (Num Lock)
    0x29, 0x05, //   Usage Maximum (Kana)
    0x91, 0x02, //   Output (Data, Variable, Absolute)
    0x95, 0x01, //   Report Count (1)
    0x75, 0x03, //   Report Size (3)
    0x91, 0x01, //   Output (Constant)
    0xC0, // End Collection
    //
    0x05, 0x0C, // Usage Page (Consumer)
    0x09, 0x01, // Usage (Consumer Control)
    0xA1, 0x01, // Collection (Application)
    0x85, CONSUMER_REPORT_ID, //   Report ID (2)
    0x15, 0x00, //   Logical Minimum (0)
    0x25, 0x01, //   Logical Maximum (1)
    0x09, 0xE2, //   Usage (Mute)
    0x09, 0xCD, //   Usage (Play/Pause)
    0x09, 0xE9, //   Usage (Volume Increment)
    0x09, 0xEA, //   Usage (Volume Decrement)
    0x75, 0x01, //   Report Size (1)
    0x95, 0x04, //   Report Count (4)
    0x81, 0x02, //   Input (Data, Variable, Absolute)
    0x75, 0x01, //   Report Size (1)
    0x95, 0x04, //   Report Count (4)
    0x81, 0x01, //   Input (Constant) - padding
    0xC0, // End Collection
];
