//! Advertising and per-connection lifecycle.
//!
//! One advertiser loop accepts hosts until every slot is taken, then parks
//! until a disconnect frees one. Each accepted connection gets its own task
//! running the GATT server; when the link drops, the task releases the
//! slot, withdraws any pending pairing confirmation, and wakes the
//! advertiser.

use capkeys::ble::adv_data::AdvPayload;
use capkeys::config::BLE_ADV_INTERVAL;
use capkeys::feedback::FeedbackEvent;
use capkeys::shared;
use capkeys::transport::Advertising;
use defmt::{error, info, warn};
use embassy_time::{Duration, Timer};
use nrf_softdevice::ble::peripheral::{self, AdvertiseError, ConnectableAdvertisement};
use nrf_softdevice::ble::gatt_server;
use nrf_softdevice::{RawError, Softdevice};

use super::hids::HidServer;
use super::security::{self, BONDER};
use super::{Client, ADV_RESUME, PAIRING, SLOTS};
use crate::nrf::led;

/// Back-off after advertising fails to start.
const ADV_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Accept connections forever.
///
/// `spawn` hands a new client to its own task. If it fails the link is
/// dropped again.
pub async fn advertise_loop<E>(
    sd: &'static Softdevice,
    adv_data: AdvPayload,
    scan_data: AdvPayload,
    mut spawn: impl FnMut(Client) -> Result<(), E>,
) -> ! {
    let config = peripheral::Config {
        interval: BLE_ADV_INTERVAL,
        ..Default::default()
    };

    loop {
        if !SLOTS.has_free_slot() {
            info!("advertising paused: {} clients connected", SLOTS.active_count());
            ADV_RESUME.wait().await;
            continue;
        }

        let adv = ConnectableAdvertisement::ScannableUndirected {
            adv_data: adv_data.as_bytes(),
            scan_data: scan_data.as_bytes(),
        };
        info!("advertising");
        let conn = match peripheral::advertise_pairable(sd, adv, &config, &BONDER).await {
            Ok(conn) => conn,
            Err(AdvertiseError::Raw(RawError::InvalidState)) => {
                info!("already advertising, continuing");
                Timer::after(ADV_RETRY_DELAY).await;
                continue;
            }
            Err(e) => {
                error!("advertising failed: {}", e);
                Timer::after(ADV_RETRY_DELAY).await;
                continue;
            }
        };

        let Some(client) = Client::new(&conn) else {
            continue;
        };
        match SLOTS.connected(client.clone()) {
            Ok(next) => {
                info!("conn {} connected ({} active)", client.handle, SLOTS.active_count());
                led::emit(FeedbackEvent::Connected);
                if next == Advertising::Pause {
                    info!("all connection slots taken");
                }
            }
            Err(e) => {
                warn!("rejecting conn {}: {}", client.handle, e);
                let _ = conn.disconnect();
                continue;
            }
        }

        if spawn(client.clone()).is_err() {
            error!("no task left for conn {}", client.handle);
            SLOTS.disconnected(&client);
            let _ = conn.disconnect();
        }
    }
}

/// Serve one host until it disconnects, then release everything it held.
///
/// `client` was registered by [`advertise_loop`]; the link may already be
/// gone by the time this runs, and the cleanup still happens.
pub async fn serve(server: &'static HidServer, client: Client) {
    let _reason = gatt_server::run(&client.conn, server, |_| {}).await;
    info!("conn {} disconnected", client.handle);

    BONDER.forget(&client);
    let withdrawn = shared::release(&SLOTS, &PAIRING, &client);
    if withdrawn.head_dropped {
        led::emit(FeedbackEvent::PairingWithdrawn);
        if let Some(next) = withdrawn.next {
            security::prompt(next.handle.handle, next.passkey);
        }
    }

    led::emit(FeedbackEvent::Disconnected);
    ADV_RESUME.signal(());
}
