//! Bluetooth Low Energy subsystem.
//!
//! This module drives the Nordic SoftDevice S140 in **Peripheral** role:
//!
//! 1. **HID service** - the HID-over-GATT server every host talks to.
//! 2. **Peripheral** - advertising and one task per connected host.
//! 3. **Security** - bonding and passkey confirmation.
//!
//! The connection slot table and the pairing queue are shared with the
//! event consumer task through the statics below.

pub mod hids;
pub mod peripheral;
pub mod security;

use capkeys::config::MAX_CLIENTS;
use capkeys::shared::{SharedPairing, SharedSlots};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use nrf_softdevice::ble::Connection;

/// A connected host as stored in the slot table and the pairing queue.
#[derive(Clone)]
pub struct Client {
    pub handle: u16,
    pub conn: Connection,
}

impl Client {
    /// `None` once the link is already gone.
    pub fn new(conn: &Connection) -> Option<Self> {
        Some(Self {
            handle: conn.handle()?,
            conn: conn.clone(),
        })
    }
}

impl PartialEq for Client {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

/// Connected hosts.
pub static SLOTS: SharedSlots<CriticalSectionRawMutex, Client, MAX_CLIENTS> = SharedSlots::new();

/// Passkey confirmations waiting for the pairing chord.
pub static PAIRING: SharedPairing<CriticalSectionRawMutex, Client, MAX_CLIENTS> =
    SharedPairing::new();

/// Raised when a slot frees up while advertising is paused.
pub static ADV_RESUME: Signal<CriticalSectionRawMutex, ()> = Signal::new();
