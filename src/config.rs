//! Application-wide constants and compile-time configuration.
//!
//! All pad assignments, timing parameters, and protocol constants live
//! here so they can be tuned in one place.

use crate::hid::MediaKey;
use crate::sense::AnalogInput;

// Sensing

/// Scans averaged into each pad's untouched baseline at boot.
pub const SENSE_CALIBRATION_ROUNDS: u8 = 8;

/// Touch threshold as a percentage of the baseline. Must be above 100.
pub const SENSE_SCALE_PERCENT: u16 = 130;

/// A classification must disagree with the committed state for more than
/// this many consecutive scans before an edge is emitted.
pub const SENSE_DEBOUNCE_BOUND: u8 = 3;

/// Period of the pad scan loop (ms).
pub const SENSE_SCAN_PERIOD_MS: u64 = 5;

/// Measurement attempts per pad per scan (one try plus retries).
pub const SENSE_MAX_ATTEMPTS: u8 = 3;

/// Bounded wait for each comparator crossing (ms).
pub const SENSE_EDGE_TIMEOUT_MS: u64 = 2;

/// Timer overrun guard: 1 ms at 16 MHz.
pub const SENSE_OVERRUN_TICKS: u32 = 16_000;

/// Comparator hysteresis thresholds in 1/64 VDD steps.
pub const COMP_THRESHOLD_DOWN: u8 = 5;
pub const COMP_THRESHOLD_UP: u8 = 60;

// Pads
//
//   Pad 0  → AIN0 (P0.02)  Mute
//   Pad 1  → AIN1 (P0.03)  Play/Pause
//   Pad 2  → AIN2 (P0.04)  Volume Up
//   Pad 3  → AIN3 (P0.05)  Volume Down

pub const PAD_COUNT: usize = 4;

pub const PADS: [(AnalogInput, MediaKey); PAD_COUNT] = [
    (AnalogInput::AIN0, MediaKey::Mute),
    (AnalogInput::AIN1, MediaKey::PlayPause),
    (AnalogInput::AIN2, MediaKey::VolumeUp),
    (AnalogInput::AIN3, MediaKey::VolumeDown),
];

// Routing

/// How long the volume up + down chord must be held to confirm a pairing (ms).
pub const PAIRING_CHORD_HOLD_MS: u64 = 3000;

/// Depth of the sampling → event-consumer queue.
pub const KEY_EVENT_QUEUE_DEPTH: usize = 10;

// BLE

/// Simultaneously connected hosts. Also bounds the pairing queue.
pub const MAX_CLIENTS: usize = 2;

/// Bonds kept in RAM; the oldest is evicted when full.
pub const MAX_BONDS: usize = 4;

pub const BLE_DEVICE_NAME: &str = "capkeys";

/// GAP appearance: HID keyboard.
pub const BLE_APPEARANCE: u16 = 0x03C1;

/// Fast advertising interval (in 0.625 ms units). 48 = 30 ms.
pub const BLE_ADV_INTERVAL: u32 = 48;

/// Preferred connection interval range (in 1.25 ms units).
/// 6 = 7.5 ms (lowest latency for HID).
pub const BLE_CONN_INTERVAL_MIN: u16 = 6;
pub const BLE_CONN_INTERVAL_MAX: u16 = 12;

/// Peripheral latency (connection events the device may skip).
pub const BLE_SLAVE_LATENCY: u16 = 0;

/// Supervision timeout (in 10 ms units). 400 = 4 s.
pub const BLE_SUP_TIMEOUT: u16 = 400;

/// HID Information characteristic: bcdHID 1.01, country 0,
/// flags RemoteWake | NormallyConnectable.
pub const HID_INFO: [u8; 4] = [0x01, 0x01, 0x00, 0x03];

// LEDs (active low)
//
//   Red   → P0.13
//   Green → P0.14
//   Blue  → P0.15

/// Short pulse, also the on/off period of continuous blinking (ms).
pub const LED_SHORT_BLINK_MS: u32 = 100;

/// Long pulse used for pairing outcomes (ms).
pub const LED_LONG_BLINK_MS: u32 = 2000;

/// Commands buffered per LED task.
pub const LED_QUEUE_DEPTH: usize = 10;
