//! capkeys - capacitive-touch BLE media keyboard firmware.
//!
//! Four sensed pads become Mute, Play/Pause, Volume Up and Volume Down on
//! up to two BLE hosts at once. Holding Volume Up + Volume Down confirms a
//! pending pairing.
//!
//! # Architecture
//!
//! ```text
//!  COMP/TIMER1 ──► sense_task ──► KEY_EVENTS ──► key_event_task ──► HID notify (all hosts)
//!                                                    │
//!  SoftDevice ──► advertiser / connection tasks      ├──► pairing confirmation
//!              └─► security handler ──► PAIRING ─────┘
//!                                                    └──► LED tasks (red, green, blue)
//! ```

#![no_std]
#![no_main]

mod ble;
mod nrf;
mod tasks;

use capkeys::ble::adv_data::{advertising_data, scan_response, AdvPayload};
use capkeys::config::{
    BLE_APPEARANCE, BLE_CONN_INTERVAL_MAX, BLE_CONN_INTERVAL_MIN, BLE_DEVICE_NAME,
    BLE_SLAVE_LATENCY, BLE_SUP_TIMEOUT, MAX_CLIENTS,
};
use capkeys::feedback::{Led, LED_COUNT};
use defmt::{info, unwrap, warn};
use embassy_executor::Spawner;
use embassy_nrf::gpio::{AnyPin, Pin};
use embassy_nrf::interrupt::Priority;
use embassy_nrf::bind_interrupts;
use nrf_softdevice::{raw, Softdevice};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use crate::ble::hids::HidServer;
use crate::ble::Client;
use crate::nrf::comparator::{CompInterruptHandler, CompSampler, TimerInterruptHandler};

bind_interrupts!(struct Irqs {
    COMP_LPCOMP => CompInterruptHandler;
    TIMER1 => TimerInterruptHandler;
});

// ═══════════════════════════════════════════════════════════════════════════
// Task wrappers
// ═══════════════════════════════════════════════════════════════════════════

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

#[embassy_executor::task]
async fn sense_task(sampler: CompSampler) -> ! {
    tasks::sense_task(sampler).await
}

#[embassy_executor::task]
async fn key_event_task(server: &'static HidServer) -> ! {
    tasks::key_event_task(server).await
}

#[embassy_executor::task(pool_size = LED_COUNT)]
async fn led_task(pin: AnyPin, led: Led) -> ! {
    nrf::led::led_task(pin, led).await
}

#[embassy_executor::task]
async fn advertiser_task(
    spawner: Spawner,
    sd: &'static Softdevice,
    server: &'static HidServer,
    adv_data: AdvPayload,
    scan_data: AdvPayload,
) -> ! {
    ble::peripheral::advertise_loop(sd, adv_data, scan_data, |client| {
        spawner.spawn(connection_task(server, client))
    })
    .await
}

#[embassy_executor::task(pool_size = MAX_CLIENTS)]
async fn connection_task(server: &'static HidServer, client: Client) {
    ble::peripheral::serve(server, client).await
}

// ═══════════════════════════════════════════════════════════════════════════
// Boot
// ═══════════════════════════════════════════════════════════════════════════

fn softdevice_config() -> nrf_softdevice::Config {
    nrf_softdevice::Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: MAX_CLIENTS as u8,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t { att_mtu: 64 }),
        gatts_attr_tab_size: Some(raw::ble_gatts_cfg_attr_tab_size_t {
            attr_tab_size: raw::BLE_GATTS_ATTR_TAB_SIZE_DEFAULT,
        }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: MAX_CLIENTS as u8,
            central_role_count: 0,
            central_sec_count: 0,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        gap_device_name: Some(raw::ble_gap_cfg_device_name_t {
            p_value: BLE_DEVICE_NAME.as_ptr() as _,
            current_len: BLE_DEVICE_NAME.len() as u16,
            max_len: BLE_DEVICE_NAME.len() as u16,
            write_perm: unsafe { core::mem::zeroed() },
            _bitfield_1: raw::ble_gap_cfg_device_name_t::new_bitfield_1(
                raw::BLE_GATTS_VLOC_STACK as u8,
            ),
        }),
        ..Default::default()
    }
}

/// GAP appearance and preferred connection parameters.
fn configure_gap() {
    let params = raw::ble_gap_conn_params_t {
        min_conn_interval: BLE_CONN_INTERVAL_MIN,
        max_conn_interval: BLE_CONN_INTERVAL_MAX,
        slave_latency: BLE_SLAVE_LATENCY,
        conn_sup_timeout: BLE_SUP_TIMEOUT,
    };
    // SAFETY: plain value arguments, called after the SoftDevice is enabled.
    unsafe {
        if raw::sd_ble_gap_appearance_set(BLE_APPEARANCE) != raw::NRF_SUCCESS {
            warn!("failed to set GAP appearance");
        }
        if raw::sd_ble_gap_ppcp_set(&params) != raw::NRF_SUCCESS {
            warn!("failed to set preferred connection parameters");
        }
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("capkeys starting");

    // Interrupt priorities 0, 1 and 4 belong to the SoftDevice.
    let mut config = embassy_nrf::config::Config::default();
    config.gpiote_interrupt_priority = Priority::P2;
    config.time_interrupt_priority = Priority::P2;
    let p = embassy_nrf::init(config);

    let sd = Softdevice::enable(&softdevice_config());
    configure_gap();

    static SERVER: StaticCell<HidServer> = StaticCell::new();
    let server: &'static HidServer = SERVER.init(unwrap!(HidServer::new(sd)));
    let sd: &'static Softdevice = sd;
    unwrap!(spawner.spawn(softdevice_task(sd)));

    for (pin, led) in [
        (p.P0_13.degrade(), Led::Red),
        (p.P0_14.degrade(), Led::Green),
        (p.P0_15.degrade(), Led::Blue),
    ] {
        unwrap!(spawner.spawn(led_task(pin, led)));
    }

    let sampler = unwrap!(CompSampler::new(sd, p.COMP, p.TIMER1, Irqs));
    unwrap!(spawner.spawn(sense_task(sampler)));
    unwrap!(spawner.spawn(key_event_task(server)));

    let adv_data = unwrap!(advertising_data(BLE_APPEARANCE));
    let scan_data = unwrap!(scan_response(BLE_DEVICE_NAME));
    unwrap!(spawner.spawn(advertiser_task(spawner, sd, server, adv_data, scan_data)));

    info!("all tasks spawned");
}
