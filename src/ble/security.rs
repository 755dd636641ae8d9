//! Bonding and passkey confirmation.
//!
//! The device advertises DisplayYesNo, so every new host goes through
//! numeric comparison. The six-digit passkey is queued and shown on the
//! blue LED; the user confirms by holding the pairing chord, which answers
//! the SoftDevice through [`SoftdeviceResponder`].

use core::cell::RefCell;

use capkeys::config::MAX_BONDS;
use capkeys::feedback::FeedbackEvent;
use capkeys::pairing::{Passkey, PasskeyOwner, PasskeyResponder};
use defmt::{info, warn};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use heapless::Vec;
use nrf_softdevice::ble::security::{IoCapabilities, SecurityHandler};
use nrf_softdevice::ble::{Connection, EncryptionInfo, IdentityKey, MasterId, SecurityMode};
use nrf_softdevice::raw;

use super::{Client, PAIRING};
use crate::nrf::led;

struct PeerBond {
    master_id: MasterId,
    key: EncryptionInfo,
    peer_id: IdentityKey,
}

struct BonderState {
    peers: Vec<PeerBond, MAX_BONDS>,
    /// The passkey display callback carries no connection; it goes to the
    /// one procedure allowed to be waiting for it.
    passkey_owner: PasskeyOwner<Client>,
}

pub struct Bonder {
    state: Mutex<CriticalSectionRawMutex, RefCell<BonderState>>,
}

impl Bonder {
    const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(BonderState {
                peers: Vec::new(),
                passkey_owner: PasskeyOwner::new(),
            })),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut BonderState) -> R) -> R {
        self.state.lock(|cell| f(&mut cell.borrow_mut()))
    }

    /// The link is gone; a procedure it left waiting no longer blocks others.
    pub fn forget(&self, client: &Client) {
        self.with(|s| s.passkey_owner.end(client));
    }
}

pub static BONDER: Bonder = Bonder::new();

impl SecurityHandler for Bonder {
    fn io_capabilities(&self) -> IoCapabilities {
        IoCapabilities::DisplayYesNo
    }

    fn can_bond(&self, conn: &Connection) -> bool {
        let Some(client) = Client::new(conn) else {
            return false;
        };
        let handle = client.handle;
        if self.with(|s| s.passkey_owner.begin(client)) {
            return true;
        }
        warn!("conn {} pairing while another passkey is pending, dropping it", handle);
        let _ = conn.disconnect();
        false
    }

    fn display_passkey(&self, passkey: &[u8; 6]) {
        let Some(client) = self.with(|s| s.passkey_owner.take()) else {
            warn!("passkey without a pairing connection");
            return;
        };
        if client.conn.handle().is_none() {
            return;
        }
        let Some(passkey) = Passkey::from_ascii(passkey) else {
            warn!("malformed passkey from conn {}", client.handle);
            SoftdeviceResponder.reject(&client);
            return;
        };
        info!("conn {} passkey {}", client.handle, passkey);

        match PAIRING.request(client.clone(), passkey) {
            Ok(Some(surfaced)) => prompt(surfaced.handle.handle, surfaced.passkey),
            Ok(None) => {}
            Err(e) => {
                warn!("pairing request from conn {} refused: {}", client.handle, e);
                SoftdeviceResponder.reject(&client);
            }
        }
    }

    fn on_bonded(
        &self,
        conn: &Connection,
        master_id: MasterId,
        key: EncryptionInfo,
        peer_id: IdentityKey,
    ) {
        self.with(|s| {
            if let Some(existing) = s.peers.iter_mut().find(|p| p.master_id == master_id) {
                existing.key = key;
                existing.peer_id = peer_id;
                return;
            }
            if s.peers.is_full() {
                s.peers.remove(0);
            }
            let _ = s.peers.push(PeerBond {
                master_id,
                key,
                peer_id,
            });
        });

        if let Some(client) = Client::new(conn) {
            self.forget(&client);
            PAIRING.on_pairing_complete(&client, true);
        }
    }

    fn get_key(&self, _conn: &Connection, master_id: MasterId) -> Option<EncryptionInfo> {
        self.with(|s| {
            s.peers
                .iter()
                .find_map(|p| (p.master_id == master_id).then_some(p.key))
        })
    }

    fn on_security_update(&self, conn: &Connection, mode: SecurityMode) {
        info!("conn {:?} security mode -> {}", conn.handle(), mode);
        // Just Works never displays a passkey.
        if let Some(client) = Client::new(conn) {
            self.forget(&client);
        }
    }
}

/// Surface a pairing request to the user.
pub fn prompt(handle: u16, passkey: Passkey) {
    info!("confirm pairing with conn {}: passkey {}", handle, passkey);
    led::emit(FeedbackEvent::PairingPrompt);
}

/// Answers numeric comparison on the SoftDevice.
pub struct SoftdeviceResponder;

impl SoftdeviceResponder {
    fn reply(client: &Client, key_type: u32) {
        // SAFETY: a null key is valid for PASSKEY (confirm) and NONE (reject).
        let ret =
            unsafe { raw::sd_ble_gap_auth_key_reply(client.handle, key_type as u8, core::ptr::null()) };
        if ret != raw::NRF_SUCCESS {
            warn!("auth key reply on conn {} failed: {}", client.handle, ret);
        }
    }
}

impl PasskeyResponder<Client> for SoftdeviceResponder {
    fn accept(&mut self, client: &Client) {
        Self::reply(client, raw::BLE_GAP_AUTH_KEY_TYPE_PASSKEY);
    }

    fn reject(&mut self, client: &Client) {
        Self::reply(client, raw::BLE_GAP_AUTH_KEY_TYPE_NONE);
    }
}
