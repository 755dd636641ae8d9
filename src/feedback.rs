//! LED feedback.
//!
//! Three indicators, each driven by its own task through a small command
//! queue. This module holds the pieces that do not touch GPIO: the command
//! encoding, the per-LED blink state machine, and the policy that maps
//! pipeline events to blinks.

use heapless::Vec;

use crate::config::{LED_LONG_BLINK_MS, LED_SHORT_BLINK_MS};

pub const LED_COUNT: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Led {
    Red,
    Green,
    Blue,
}

impl Led {
    pub const ALL: [Led; LED_COUNT] = [Led::Red, Led::Green, Led::Blue];

    pub const fn index(self) -> usize {
        self as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BlinkCommand {
    /// Stop repeat blinking and switch off.
    Off,
    /// Blink until stopped, at the short interval.
    Continuous,
    /// Light once for this many milliseconds.
    Once(u32),
}

impl BlinkCommand {
    /// Raw duration meaning "until stopped".
    pub const FOREVER: u32 = u32::MAX;

    /// Decode a raw duration: 0 stops, [`FOREVER`](Self::FOREVER) repeats,
    /// anything else is a single pulse.
    pub const fn from_duration_ms(ms: u32) -> Self {
        match ms {
            0 => BlinkCommand::Off,
            Self::FOREVER => BlinkCommand::Continuous,
            ms => BlinkCommand::Once(ms),
        }
    }
}

/// What the LED task must do with its pin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LedStep {
    Set(bool),
    /// Light, wait this long, switch off.
    Pulse(u32),
}

/// Blink state of one indicator.
#[derive(Clone, Copy, Debug)]
pub struct Blinker {
    repeating: bool,
    lit: bool,
    period_ms: u32,
}

impl Blinker {
    pub const fn new(period_ms: u32) -> Self {
        Self {
            repeating: false,
            lit: false,
            period_ms,
        }
    }

    pub fn command(&mut self, cmd: BlinkCommand) -> LedStep {
        match cmd {
            BlinkCommand::Off => {
                self.repeating = false;
                self.lit = false;
                LedStep::Set(false)
            }
            BlinkCommand::Continuous => {
                self.repeating = true;
                self.lit = true;
                LedStep::Set(true)
            }
            BlinkCommand::Once(ms) => {
                self.repeating = false;
                self.lit = false;
                LedStep::Pulse(ms)
            }
        }
    }

    /// How long the task may wait for a command before calling
    /// [`on_idle`](Self::on_idle). `None` means wait indefinitely.
    pub fn idle_timeout_ms(&self) -> Option<u32> {
        self.repeating.then_some(self.period_ms)
    }

    /// No command arrived within the idle timeout. Returns the new pin level.
    pub fn on_idle(&mut self) -> bool {
        if self.repeating {
            self.lit = !self.lit;
        }
        self.lit
    }

    pub fn is_repeating(&self) -> bool {
        self.repeating
    }
}

impl Default for Blinker {
    fn default() -> Self {
        Self::new(LED_SHORT_BLINK_MS)
    }
}

/// Pipeline events worth showing to the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FeedbackEvent {
    Key { pressed: bool },
    PairingPrompt,
    PairingResolved { accepted: bool },
    /// The surfaced request went away without an answer.
    PairingWithdrawn,
    Connected,
    Disconnected,
    SendFailed,
}

/// Blinks for an event, in the order they must be issued.
pub fn blinks_for(event: FeedbackEvent) -> Vec<(Led, BlinkCommand), 2> {
    use BlinkCommand::{Continuous, Off, Once};

    let steps: &[(Led, BlinkCommand)] = match event {
        FeedbackEvent::Key { pressed: true } => &[(Led::Blue, Once(LED_SHORT_BLINK_MS))],
        FeedbackEvent::Key { pressed: false } => &[],
        FeedbackEvent::PairingPrompt => &[(Led::Blue, Continuous)],
        FeedbackEvent::PairingResolved { accepted: true } => {
            &[(Led::Blue, Off), (Led::Green, Once(LED_LONG_BLINK_MS))]
        }
        FeedbackEvent::PairingResolved { accepted: false } | FeedbackEvent::PairingWithdrawn => {
            &[(Led::Blue, Off), (Led::Red, Once(LED_LONG_BLINK_MS))]
        }
        FeedbackEvent::Connected => &[(Led::Green, Once(LED_SHORT_BLINK_MS))],
        FeedbackEvent::Disconnected | FeedbackEvent::SendFailed => {
            &[(Led::Red, Once(LED_SHORT_BLINK_MS))]
        }
    };
    steps.iter().copied().collect()
}
