//! Sampling task and event consumer task.
//!
//! The sampling task owns the sampler and every pad's state; it publishes
//! key events into a bounded queue. The consumer drains that queue through
//! the library's chord [`Consumer`] and fans reports out to every host.

use capkeys::config::{KEY_EVENT_QUEUE_DEPTH, PADS, PAD_COUNT, SENSE_SCAN_PERIOD_MS};
use capkeys::feedback::FeedbackEvent;
use capkeys::hid::{ConsumerReport, HidReport};
use capkeys::router::{ChordGate, Consumer, Dispatch, EventSource, KeyInputEvent};
use capkeys::sense::{HardwareSampler, Scanner, SenseParams};
use capkeys::shared::publish_latest;
use defmt::{debug, info, warn};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{with_deadline, Duration, Instant, Ticker};

use crate::ble::hids::HidServer;
use crate::ble::security::{self, SoftdeviceResponder};
use crate::ble::{PAIRING, SLOTS};
use crate::nrf::led;

/// Sampling task → event consumer.
static KEY_EVENTS: Channel<CriticalSectionRawMutex, KeyInputEvent, KEY_EVENT_QUEUE_DEPTH> =
    Channel::new();

/// Scan every pad once per period, forever.
pub async fn sense_task(sampler: impl HardwareSampler) -> ! {
    let mut scanner: Scanner<_, PAD_COUNT> = Scanner::new(sampler, &PADS, SenseParams::DEFAULT);
    let mut ticker = Ticker::every(Duration::from_millis(SENSE_SCAN_PERIOD_MS));
    let mut calibrated = false;

    info!("sensing {} pads every {} ms", PAD_COUNT, SENSE_SCAN_PERIOD_MS);
    loop {
        let report = scanner
            .scan(|event| {
                if publish_latest(&KEY_EVENTS, event) {
                    warn!("key event queue full, dropped oldest");
                }
            })
            .await;
        if report.skipped > 0 {
            debug!("scan: {}", report);
        }
        if !calibrated && scanner.is_calibrated() {
            calibrated = true;
            info!("all pads calibrated");
        }
        ticker.next().await;
    }
}

/// The key event queue on the embassy clock. Every press flashes blue as
/// it is taken off the queue.
struct KeyEvents;

impl EventSource for KeyEvents {
    fn now_ms(&self) -> u64 {
        Instant::now().as_millis()
    }

    async fn recv_until(&mut self, deadline_ms: Option<u64>) -> Option<KeyInputEvent> {
        let event = match deadline_ms {
            Some(ms) => with_deadline(Instant::from_millis(ms), KEY_EVENTS.receive())
                .await
                .ok()?,
            None => KEY_EVENTS.receive().await,
        };
        if event.changed_key_pressed {
            led::emit(FeedbackEvent::Key { pressed: true });
        }
        Some(event)
    }
}

/// Turn key events into reports and pairing confirmations.
pub async fn key_event_task(server: &'static HidServer) -> ! {
    let mut consumer = Consumer::new(KeyEvents, ChordGate::default());

    loop {
        match consumer.next(|| PAIRING.is_pending()).await {
            Dispatch::Send(report) | Dispatch::HoldChord { release: report } => {
                fan_out(server, report)
            }
            Dispatch::ConfirmPairing => confirm_pairing(),
            Dispatch::Idle => {}
        }
    }
}

fn fan_out(server: &HidServer, report: ConsumerReport) {
    let report = HidReport::Consumer(report);
    match SLOTS.send(&report, |client, mode, report| {
        server.hid.notify(client, mode, report)
    }) {
        Ok(delivery) => debug!("report {} -> {}", report, delivery),
        Err(e) => {
            warn!("media report not delivered everywhere: {}", e);
            led::emit(FeedbackEvent::SendFailed);
        }
    }
}

fn confirm_pairing() {
    let Some(resolution) = PAIRING.resolve(true, &mut SoftdeviceResponder) else {
        return;
    };
    led::emit(FeedbackEvent::PairingResolved {
        accepted: resolution.accepted,
    });
    if let Some(next) = resolution.next {
        security::prompt(next.handle.handle, next.passkey);
    }
}
