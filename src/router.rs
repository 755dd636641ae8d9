//! Input event routing.
//!
//! [`KeyRouter`] lives on the sampling task and folds per-pad edges into
//! the authoritative pressed mask. [`ChordGate`] lives on the event
//! consumer task and decides what each event turns into: an ordinary media
//! report, or the start of a pairing-confirmation hold when the composed
//! mask is exactly the pairing chord. [`Consumer`] wraps the gate with the
//! hold deadline, reading events from any [`EventSource`].

use crate::config;
use crate::hid::{ConsumerReport, KeyMask, MediaKey};
use crate::sense::Edge;

/// One key transition plus the full key state it produced.
///
/// Consumers must apply these in production order; `pressed` is a
/// snapshot, never recomputed downstream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyInputEvent {
    pub changed_key: MediaKey,
    pub changed_key_pressed: bool,
    pub pressed: KeyMask,
}

impl KeyInputEvent {
    pub fn report(&self) -> ConsumerReport {
        ConsumerReport::new(self.pressed)
    }
}

/// Owner of the pressed mask.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeyRouter {
    pressed: KeyMask,
}

impl KeyRouter {
    pub const fn new() -> Self {
        Self {
            pressed: KeyMask::EMPTY,
        }
    }

    /// Apply a committed edge and compose the resulting event.
    pub fn apply(&mut self, key: MediaKey, edge: Edge) -> KeyInputEvent {
        self.pressed = self.pressed.with(key, edge.is_press());
        KeyInputEvent {
            changed_key: key,
            changed_key_pressed: edge.is_press(),
            pressed: self.pressed,
        }
    }

    pub fn pressed(&self) -> KeyMask {
        self.pressed
    }
}

/// What the event consumer should do next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Dispatch {
    /// Forward this media report to every client.
    Send(ConsumerReport),
    /// The chord just engaged. Send `release` so no key appears stuck on
    /// the hosts, then wait at most the hold window for the next event.
    HoldChord { release: ConsumerReport },
    /// The hold window elapsed with a pairing request queued: accept it.
    ConfirmPairing,
    /// Nothing to send.
    Idle,
}

/// Intercepts the pairing chord and times its hold window.
///
/// The gate itself has no clock. The consumer waits for the next event
/// with a deadline of [`hold_ms`](Self::hold_ms) while
/// [`is_holding`](Self::is_holding) is true and calls
/// [`on_timeout`](Self::on_timeout) if nothing arrives.
#[derive(Clone, Copy, Debug)]
pub struct ChordGate {
    chord: KeyMask,
    hold_ms: u64,
    holding: bool,
}

impl ChordGate {
    pub const fn new(chord: KeyMask, hold_ms: u64) -> Self {
        Self {
            chord,
            hold_ms,
            holding: false,
        }
    }

    pub fn on_event(&mut self, event: &KeyInputEvent) -> Dispatch {
        if event.pressed == self.chord {
            if self.holding {
                // Deadline unchanged.
                return Dispatch::Idle;
            }
            self.holding = true;
            debug!("pairing chord engaged");
            return Dispatch::HoldChord {
                release: ConsumerReport::empty(),
            };
        }
        if self.holding {
            // Released early: any surfaced pairing request stays queued.
            self.holding = false;
            debug!("pairing chord released");
        }
        Dispatch::Send(event.report())
    }

    /// The hold window elapsed without a superseding event.
    pub fn on_timeout(&mut self, pairing_pending: bool) -> Dispatch {
        if !core::mem::replace(&mut self.holding, false) {
            return Dispatch::Idle;
        }
        if pairing_pending {
            Dispatch::ConfirmPairing
        } else {
            info!("pairing chord held with no request pending");
            Dispatch::Idle
        }
    }

    pub fn is_holding(&self) -> bool {
        self.holding
    }

    pub fn hold_ms(&self) -> u64 {
        self.hold_ms
    }
}

impl Default for ChordGate {
    fn default() -> Self {
        Self::new(KeyMask::PAIRING_CHORD, config::PAIRING_CHORD_HOLD_MS)
    }
}

/// Key events as the consumer task receives them.
#[allow(async_fn_in_trait)]
pub trait EventSource {
    /// Milliseconds on the same clock as the deadlines below.
    fn now_ms(&self) -> u64;

    /// Wait for the next event. With a deadline, `None` means it passed
    /// first; without one, wait as long as it takes.
    async fn recv_until(&mut self, deadline_ms: Option<u64>) -> Option<KeyInputEvent>;
}

/// A [`ChordGate`] plus its hold deadline.
///
/// The deadline is fixed when the chord engages; events that leave the
/// hold untouched do not push it back.
pub struct Consumer<S> {
    source: S,
    gate: ChordGate,
    deadline_ms: Option<u64>,
}

impl<S: EventSource> Consumer<S> {
    pub fn new(source: S, gate: ChordGate) -> Self {
        Self {
            source,
            gate,
            deadline_ms: None,
        }
    }

    /// Wait for the next event or the end of the hold window, whichever
    /// comes first. `pairing_pending` is asked only when the window ends.
    pub async fn next(&mut self, pairing_pending: impl FnOnce() -> bool) -> Dispatch {
        let deadline = self.deadline_ms.filter(|_| self.gate.is_holding());
        let dispatch = match self.source.recv_until(deadline).await {
            Some(event) => self.gate.on_event(&event),
            None => self.gate.on_timeout(pairing_pending()),
        };

        if let Dispatch::HoldChord { .. } = dispatch {
            self.deadline_ms = Some(self.source.now_ms().saturating_add(self.gate.hold_ms()));
        } else if !self.gate.is_holding() {
            self.deadline_ms = None;
        }
        dispatch
    }

    pub fn gate(&self) -> &ChordGate {
        &self.gate
    }

    pub fn deadline_ms(&self) -> Option<u64> {
        self.deadline_ms
    }
}
