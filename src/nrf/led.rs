//! Indicator LEDs (active low).
//!
//! Each LED has its own task and command queue. Producers never wait: a
//! command that does not fit is dropped with a warning.

use capkeys::config::LED_QUEUE_DEPTH;
use capkeys::feedback::{blinks_for, BlinkCommand, Blinker, FeedbackEvent, Led, LedStep, LED_COUNT};
use defmt::{debug, warn};
use embassy_nrf::gpio::{AnyPin, Level, Output, OutputDrive};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{with_timeout, Duration, Timer};

static LED_QUEUES: [Channel<CriticalSectionRawMutex, BlinkCommand, LED_QUEUE_DEPTH>; LED_COUNT] =
    [const { Channel::new() }; LED_COUNT];

/// Queue a command for one LED.
pub fn blink(led: Led, cmd: BlinkCommand) {
    if LED_QUEUES[led.index()].try_send(cmd).is_err() {
        warn!("{} LED queue full, dropping {}", led, cmd);
    }
}

/// Show a pipeline event.
pub fn emit(event: FeedbackEvent) {
    debug!("feedback: {}", event);
    for (led, cmd) in blinks_for(event) {
        blink(led, cmd);
    }
}

fn set(out: &mut Output<'static>, lit: bool) {
    if lit {
        out.set_low();
    } else {
        out.set_high();
    }
}

/// Drive one LED from its command queue.
pub async fn led_task(pin: AnyPin, led: Led) -> ! {
    let mut out = Output::new(pin, Level::High, OutputDrive::Standard);
    let rx = LED_QUEUES[led.index()].receiver();
    let mut blinker = Blinker::default();

    loop {
        let cmd = match blinker.idle_timeout_ms() {
            Some(ms) => match with_timeout(Duration::from_millis(ms as u64), rx.receive()).await {
                Ok(cmd) => cmd,
                Err(_) => {
                    set(&mut out, blinker.on_idle());
                    continue;
                }
            },
            None => rx.receive().await,
        };

        match blinker.command(cmd) {
            LedStep::Set(lit) => set(&mut out, lit),
            LedStep::Pulse(ms) => {
                set(&mut out, true);
                Timer::after(Duration::from_millis(ms as u64)).await;
                set(&mut out, false);
            }
        }
    }
}
