//! Cross-task wrappers around the slot table and the pairing queue.
//!
//! Both structures are touched from synchronous SoftDevice callbacks
//! (GATT writes, security handler) as well as from async tasks, so they
//! sit behind a blocking mutex instead of an async one. Every lock is held
//! for one short, non-awaiting operation.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::{Channel, TrySendError};

use crate::error::{PairingError, TransportError};
use crate::hid::HidReport;
use crate::pairing::{
    PairingQueue, PairingRequest, Passkey, PasskeyResponder, Resolution, Withdrawn,
};
use crate::transport::{Advertising, Delivery, ProtocolMode, SlotTable};

/// Connection slot table shared between BLE callbacks and the event consumer.
pub struct SharedSlots<M: RawMutex, H, const N: usize> {
    inner: Mutex<M, RefCell<SlotTable<H, N>>>,
}

impl<M: RawMutex, H: PartialEq, const N: usize> SharedSlots<M, H, N> {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(SlotTable::new())),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut SlotTable<H, N>) -> R) -> R {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }

    pub fn connected(&self, handle: H) -> Result<Advertising, TransportError> {
        self.with(|t| t.on_connected(handle))
    }

    pub fn disconnected(&self, handle: &H) -> Advertising {
        self.with(|t| t.on_disconnected(handle))
    }

    pub fn mode_changed(&self, handle: &H, mode: ProtocolMode) -> Result<(), TransportError> {
        self.with(|t| t.on_mode_changed(handle, mode))
    }

    /// Fan a report out under the lock so connects and disconnects cannot
    /// interleave with the iteration. `notify` must not block.
    pub fn send<E>(
        &self,
        report: &HidReport,
        notify: impl FnMut(&H, ProtocolMode, &HidReport) -> Result<(), E>,
    ) -> Result<Delivery, TransportError> {
        self.with(|t| t.send(report, notify))
    }

    pub fn has_free_slot(&self) -> bool {
        self.with(|t| t.has_free_slot())
    }

    pub fn active_count(&self) -> usize {
        self.with(|t| t.active_count())
    }
}

impl<M: RawMutex, H: PartialEq, const N: usize> Default for SharedSlots<M, H, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Pairing queue shared between the security handler and the event consumer.
pub struct SharedPairing<M: RawMutex, H, const N: usize> {
    inner: Mutex<M, RefCell<PairingQueue<H, N>>>,
}

impl<M: RawMutex, H: Clone + PartialEq, const N: usize> SharedPairing<M, H, N> {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(PairingQueue::new())),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut PairingQueue<H, N>) -> R) -> R {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }

    pub fn request(
        &self,
        handle: H,
        passkey: Passkey,
    ) -> Result<Option<PairingRequest<H>>, PairingError> {
        self.with(|q| q.request(handle, passkey))
    }

    pub fn resolve(
        &self,
        accept: bool,
        responder: &mut impl PasskeyResponder<H>,
    ) -> Option<Resolution<H>> {
        self.with(|q| q.resolve(accept, responder))
    }

    pub fn on_disconnected(&self, handle: &H) -> Withdrawn<H> {
        self.with(|q| q.on_disconnected(handle))
    }

    pub fn on_pairing_failed(&self, handle: &H) -> Option<PairingRequest<H>> {
        self.with(|q| q.on_pairing_failed(handle))
    }

    pub fn on_pairing_complete(&self, handle: &H, bonded: bool) {
        self.with(|q| q.on_pairing_complete(handle, bonded))
    }

    pub fn is_pending(&self) -> bool {
        self.with(|q| q.is_pending())
    }

    pub fn head(&self) -> Option<PairingRequest<H>> {
        self.with(|q| q.head().cloned())
    }
}

impl<M: RawMutex, H: Clone + PartialEq, const N: usize> Default for SharedPairing<M, H, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Drop everything a disconnected host held: its slot and any queued
/// confirmation. Safe to call for a host that was never served.
pub fn release<M: RawMutex, H: Clone + PartialEq, const N: usize>(
    slots: &SharedSlots<M, H, N>,
    pairing: &SharedPairing<M, H, N>,
    handle: &H,
) -> Withdrawn<H> {
    slots.disconnected(handle);
    pairing.on_disconnected(handle)
}

/// Enqueue without ever blocking the producer. When the channel is full the
/// oldest queued item is discarded to make room.
///
/// Returns `true` if an item was discarded.
pub fn publish_latest<M: RawMutex, T, const N: usize>(channel: &Channel<M, T, N>, item: T) -> bool {
    match channel.try_send(item) {
        Ok(()) => false,
        Err(TrySendError::Full(item)) => {
            let _ = channel.try_receive();
            // Only a concurrent producer could refill the slot just freed.
            let _ = channel.try_send(item);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

    use crate::hid::ConsumerReport;

    struct Accepts(u8);

    impl PasskeyResponder<u16> for Accepts {
        fn accept(&mut self, _: &u16) {
            self.0 += 1;
        }

        fn reject(&mut self, _: &u16) {}
    }

    static SLOTS: SharedSlots<CriticalSectionRawMutex, u16, 2> = SharedSlots::new();
    static PAIRING: SharedPairing<CriticalSectionRawMutex, u16, 2> = SharedPairing::new();

    #[test]
    fn statics_serve_callbacks_and_consumer() {
        assert_eq!(SLOTS.connected(4), Ok(Advertising::Continue));
        assert_eq!(SLOTS.active_count(), 1);
        SLOTS.mode_changed(&4, ProtocolMode::Report).unwrap();

        let report = HidReport::Consumer(ConsumerReport::empty());
        let delivered = SLOTS.send(&report, |_, _, _| Ok::<(), ()>(())).unwrap();
        assert_eq!(delivered.delivered, 1);

        assert_eq!(SLOTS.disconnected(&4), Advertising::Continue);
        assert!(SLOTS.has_free_slot());
        assert_eq!(SLOTS.active_count(), 0);
    }

    #[test]
    fn shared_pairing_resolves_through_the_lock() {
        let surfaced = PAIRING.request(1, Passkey::new(123456)).unwrap();
        assert!(surfaced.is_some());
        assert!(PAIRING.is_pending());

        let mut stack = Accepts(0);
        let res = PAIRING.resolve(true, &mut stack).unwrap();
        assert_eq!(res.request.handle, 1);
        assert_eq!(stack.0, 1);
        assert!(!PAIRING.is_pending());
        assert_eq!(PAIRING.head(), None);
    }

    #[test]
    fn release_frees_slot_and_withdraws_pairing() {
        let slots: SharedSlots<CriticalSectionRawMutex, u16, 2> = SharedSlots::new();
        let pairing: SharedPairing<CriticalSectionRawMutex, u16, 2> = SharedPairing::new();
        slots.connected(1).unwrap();
        assert_eq!(slots.connected(2), Ok(Advertising::Pause));
        pairing.request(1, Passkey::new(111_111)).unwrap();
        pairing.request(2, Passkey::new(222_222)).unwrap();

        // Link 1 drops before its connection task ever ran.
        let withdrawn = release(&slots, &pairing, &1);
        assert!(slots.has_free_slot());
        assert_eq!(slots.active_count(), 1);
        assert!(withdrawn.head_dropped);
        assert_eq!(withdrawn.next.map(|r| r.handle), Some(2));

        // A later link that reuses handle 1 gets a clean slot.
        assert_eq!(slots.connected(1), Ok(Advertising::Pause));
        assert_eq!(pairing.head().map(|r| r.handle), Some(2));
    }

    #[test]
    fn publish_latest_drops_oldest_when_full() {
        let channel: Channel<CriticalSectionRawMutex, u8, 2> = Channel::new();
        assert!(!publish_latest(&channel, 1));
        assert!(!publish_latest(&channel, 2));
        assert!(publish_latest(&channel, 3));

        assert_eq!(channel.try_receive(), Ok(2));
        assert_eq!(channel.try_receive(), Ok(3));
        assert!(channel.try_receive().is_err());
    }
}
