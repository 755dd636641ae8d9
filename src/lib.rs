//! Host-testable library for capkeys.
//!
//! Everything between the comparator and the radio that does not touch a
//! register lives here: pad calibration and debounce, key routing and the
//! pairing chord, HID reports, the connection slot table, the pairing
//! queue and the LED feedback policy.
//!
//! Usage: `cargo test --lib` or `cargo test`
//!
//! The embedded binary (`main.rs`, `--features embedded`) links this
//! library and adds the nRF52840 drivers and the SoftDevice glue.

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod config;
pub mod error;
pub mod feedback;
pub mod hid;
pub mod pairing;
pub mod router;
pub mod sense;
pub mod shared;
pub mod transport;

// Advertising payload builder. The rest of the BLE glue needs the
// SoftDevice and lives with the binary.
#[path = "ble/adv_data.rs"]
mod ble_adv_data_impl;

pub mod ble {
    pub mod adv_data {
        pub use crate::ble_adv_data_impl::*;
    }
}

pub use error::Error;

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════
