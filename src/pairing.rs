//! Passkey confirmation queue.
//!
//! Several hosts may start pairing at once, but the user only has one
//! gesture to confirm with. Requests are queued FIFO and only the head is
//! ever surfaced; resolving or withdrawing the head surfaces the next one.
//!
//! The queue never talks to the BLE stack on its own. Accept/reject go
//! through a [`PasskeyResponder`] handed in by the caller, and withdrawal
//! on disconnect never calls the responder at all.
//!
//! [`PasskeyOwner`] ties each displayed passkey to the connection whose
//! security procedure produced it.

use core::fmt;

use heapless::Deque;

use crate::error::PairingError;

/// Six-digit numeric comparison / display passkey.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Passkey(u32);

impl Passkey {
    pub const fn new(value: u32) -> Self {
        Self(value % 1_000_000)
    }

    /// Parse the six ASCII digits the SoftDevice hands out. Returns `None`
    /// on any non-digit.
    pub fn from_ascii(digits: &[u8; 6]) -> Option<Self> {
        digits.iter().try_fold(0u32, |acc, &d| {
            d.is_ascii_digit().then(|| acc * 10 + u32::from(d - b'0'))
        })
        .map(Self)
    }

    pub const fn value(self) -> u32 {
        self.0
    }

    pub fn digits(self) -> [u8; 6] {
        let mut out = [b'0'; 6];
        let mut v = self.0;
        for d in out.iter_mut().rev() {
            *d = b'0' + (v % 10) as u8;
            v /= 10;
        }
        out
    }
}

impl fmt::Display for Passkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06}", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Passkey {
    fn format(&self, f: defmt::Formatter) {
        let d = self.digits();
        defmt::write!(
            f,
            "{=char}{=char}{=char}{=char}{=char}{=char}",
            d[0] as char,
            d[1] as char,
            d[2] as char,
            d[3] as char,
            d[4] as char,
            d[5] as char
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PairingRequest<H> {
    pub handle: H,
    pub passkey: Passkey,
}

/// Stack-level answer to a passkey confirmation.
pub trait PasskeyResponder<H> {
    fn accept(&mut self, handle: &H);
    fn reject(&mut self, handle: &H);
}

/// Result of [`PairingQueue::resolve`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolution<H> {
    pub request: PairingRequest<H>,
    pub accepted: bool,
    /// The request surfaced in its place, if any.
    pub next: Option<PairingRequest<H>>,
}

/// Result of withdrawing a connection's requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Withdrawn<H> {
    pub removed: usize,
    pub head_dropped: bool,
    /// Newly surfaced request, only when the head was dropped.
    pub next: Option<PairingRequest<H>>,
}

pub struct PairingQueue<H, const N: usize> {
    queue: Deque<PairingRequest<H>, N>,
}

impl<H: Clone + PartialEq, const N: usize> PairingQueue<H, N> {
    pub const fn new() -> Self {
        Self {
            queue: Deque::new(),
        }
    }

    /// Queue a confirmation request.
    ///
    /// Returns the request when it is now the only one queued, meaning the
    /// caller must surface it. A full queue rejects the newcomer and leaves
    /// existing entries untouched.
    pub fn request(
        &mut self,
        handle: H,
        passkey: Passkey,
    ) -> Result<Option<PairingRequest<H>>, PairingError> {
        let request = PairingRequest { handle, passkey };
        self.queue
            .push_back(request.clone())
            .map_err(|_| PairingError::QueueOverflow)?;
        if self.queue.len() == 1 {
            Ok(Some(request))
        } else {
            info!("pairing request queued behind {} other(s)", self.queue.len() - 1);
            Ok(None)
        }
    }

    /// Answer the surfaced request and surface the next one.
    pub fn resolve(
        &mut self,
        accept: bool,
        responder: &mut impl PasskeyResponder<H>,
    ) -> Option<Resolution<H>> {
        let request = self.queue.pop_front()?;
        if accept {
            responder.accept(&request.handle);
        } else {
            responder.reject(&request.handle);
        }
        info!("passkey {} {}", request.passkey, if accept { "accepted" } else { "rejected" });
        Some(Resolution {
            request,
            accepted: accept,
            next: self.head().cloned(),
        })
    }

    /// Drop every request owned by a connection that went away. The
    /// responder is not involved: the handle is no longer valid.
    pub fn on_disconnected(&mut self, handle: &H) -> Withdrawn<H> {
        let head_dropped = self.head().is_some_and(|r| r.handle == *handle);
        let before = self.queue.len();
        for _ in 0..before {
            if let Some(request) = self.queue.pop_front() {
                if request.handle != *handle {
                    // Cannot fail: at most `before` entries are pushed back.
                    let _ = self.queue.push_back(request);
                }
            }
        }
        let removed = before - self.queue.len();
        if removed > 0 {
            info!("withdrew {} pairing request(s) on disconnect", removed);
        }
        Withdrawn {
            removed,
            head_dropped,
            next: if head_dropped { self.head().cloned() } else { None },
        }
    }

    /// The stack gave up on pairing. Only the surfaced request is dropped;
    /// returns the next request to surface.
    pub fn on_pairing_failed(&mut self, handle: &H) -> Option<PairingRequest<H>> {
        if self.head().is_some_and(|r| r.handle == *handle) {
            self.queue.pop_front();
            warn!("pairing failed, request dropped");
            self.head().cloned()
        } else {
            None
        }
    }

    pub fn on_pairing_complete(&self, handle: &H, bonded: bool) {
        info!("pairing complete (bonded: {})", bonded);
        if self.queue.iter().any(|r| r.handle == *handle) {
            warn!("pairing completed with a confirmation still queued");
        }
    }

    /// Currently surfaced request.
    pub fn head(&self) -> Option<&PairingRequest<H>> {
        self.queue.front()
    }

    pub fn is_pending(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl<H: Clone + PartialEq, const N: usize> Default for PairingQueue<H, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// The one security procedure allowed to wait for its passkey display.
///
/// A passkey display names no connection, so while one procedure is
/// between its start and its display, a procedure on any other connection
/// is refused.
#[derive(Debug)]
pub struct PasskeyOwner<H> {
    current: Option<H>,
}

impl<H: PartialEq> PasskeyOwner<H> {
    pub const fn new() -> Self {
        Self { current: None }
    }

    /// A procedure started on `handle`. Returns `false` while another
    /// connection still owns the display. A restart on the owner is fine.
    pub fn begin(&mut self, handle: H) -> bool {
        if self.current.as_ref().is_some_and(|owner| *owner != handle) {
            return false;
        }
        self.current = Some(handle);
        true
    }

    /// A passkey is being displayed: it belongs to the owner.
    pub fn take(&mut self) -> Option<H> {
        self.current.take()
    }

    /// The procedure on `handle` ended without a display, or its link
    /// dropped.
    pub fn end(&mut self, handle: &H) {
        if self.current.as_ref() == Some(handle) {
            self.current = None;
        }
    }

    pub fn owner(&self) -> Option<&H> {
        self.current.as_ref()
    }
}

impl<H: PartialEq> Default for PasskeyOwner<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        accepted: heapless::Vec<u16, 4>,
        rejected: heapless::Vec<u16, 4>,
    }

    impl PasskeyResponder<u16> for Recorder {
        fn accept(&mut self, handle: &u16) {
            self.accepted.push(*handle).unwrap();
        }

        fn reject(&mut self, handle: &u16) {
            self.rejected.push(*handle).unwrap();
        }
    }

    fn pk(v: u32) -> Passkey {
        Passkey::new(v)
    }

    #[test]
    fn passkey_parses_and_formats_six_digits() {
        let key = Passkey::from_ascii(b"012345").unwrap();
        assert_eq!(key.value(), 12345);
        assert_eq!(&key.digits(), b"012345");
        assert_eq!(std::format!("{key}"), "012345");
        assert_eq!(Passkey::from_ascii(b"12a456"), None);
    }

    #[test]
    fn only_first_of_concurrent_requests_is_surfaced() {
        let mut queue: PairingQueue<u16, 2> = PairingQueue::new();
        let first = queue.request(1, pk(111111)).unwrap();
        let second = queue.request(2, pk(222222)).unwrap();

        assert_eq!(first.map(|r| r.handle), Some(1));
        assert_eq!(second, None);
        assert_eq!(queue.head().map(|r| r.handle), Some(1));
    }

    #[test]
    fn resolve_answers_head_and_surfaces_next() {
        let mut queue: PairingQueue<u16, 2> = PairingQueue::new();
        let mut stack = Recorder::default();
        queue.request(1, pk(111111)).unwrap();
        queue.request(2, pk(222222)).unwrap();

        let res = queue.resolve(true, &mut stack).unwrap();
        assert_eq!(res.request.handle, 1);
        assert!(res.accepted);
        assert_eq!(res.next.map(|r| r.passkey), Some(pk(222222)));
        assert_eq!(stack.accepted.as_slice(), &[1]);

        let res = queue.resolve(false, &mut stack).unwrap();
        assert_eq!(res.next, None);
        assert_eq!(stack.rejected.as_slice(), &[2]);
        assert!(queue.resolve(true, &mut stack).is_none());
    }

    #[test]
    fn overflow_rejects_newest_and_keeps_existing() {
        let mut queue: PairingQueue<u16, 2> = PairingQueue::new();
        queue.request(1, pk(1)).unwrap();
        queue.request(2, pk(2)).unwrap();
        assert_eq!(queue.request(3, pk(3)), Err(PairingError::QueueOverflow));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.head().map(|r| r.handle), Some(1));
    }

    #[test]
    fn head_disconnect_drops_silently_and_surfaces_next() {
        let mut queue: PairingQueue<u16, 2> = PairingQueue::new();
        let mut stack = Recorder::default();
        queue.request(1, pk(1)).unwrap();
        queue.request(2, pk(2)).unwrap();

        let w = queue.on_disconnected(&1);
        assert_eq!(w.removed, 1);
        assert!(w.head_dropped);
        assert_eq!(w.next.map(|r| r.handle), Some(2));

        // Stale handle never reaches the stack.
        let res = queue.resolve(true, &mut stack).unwrap();
        assert_eq!(res.request.handle, 2);
        assert_eq!(stack.accepted.as_slice(), &[2]);
        assert!(stack.rejected.is_empty());
    }

    #[test]
    fn non_head_disconnect_keeps_head_surfaced() {
        let mut queue: PairingQueue<u16, 3> = PairingQueue::new();
        queue.request(1, pk(1)).unwrap();
        queue.request(2, pk(2)).unwrap();
        queue.request(3, pk(3)).unwrap();

        let w = queue.on_disconnected(&2);
        assert_eq!(w.removed, 1);
        assert!(!w.head_dropped);
        assert_eq!(w.next, None);

        let res = queue.resolve(true, &mut Recorder::default()).unwrap();
        assert_eq!(res.request.handle, 1);
        assert_eq!(res.next.map(|r| r.handle), Some(3));
    }

    #[test]
    fn disconnect_without_requests_is_a_no_op() {
        let mut queue: PairingQueue<u16, 2> = PairingQueue::new();
        queue.request(1, pk(1)).unwrap();
        let w = queue.on_disconnected(&9);
        assert_eq!(w.removed, 0);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn pairing_failure_only_drops_matching_head() {
        let mut queue: PairingQueue<u16, 2> = PairingQueue::new();
        queue.request(1, pk(1)).unwrap();
        queue.request(2, pk(2)).unwrap();

        assert_eq!(queue.on_pairing_failed(&2), None);
        assert_eq!(queue.len(), 2);

        let next = queue.on_pairing_failed(&1);
        assert_eq!(next.map(|r| r.handle), Some(2));
        assert_eq!(queue.len(), 1);
    }

    // ════════════════════════════════════════════════════════════════════════
    // PasskeyOwner
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn concurrent_procedure_is_refused_until_display() {
        let mut owner = PasskeyOwner::new();
        assert!(owner.begin(1u16));
        assert!(!owner.begin(2));
        assert_eq!(owner.owner(), Some(&1));

        // The passkey goes to the connection that started first.
        assert_eq!(owner.take(), Some(1));
        assert!(owner.begin(2));
        assert_eq!(owner.take(), Some(2));
        assert_eq!(owner.take(), None);
    }

    #[test]
    fn owner_may_restart_its_procedure() {
        let mut owner = PasskeyOwner::new();
        assert!(owner.begin(3u16));
        assert!(owner.begin(3));
        assert_eq!(owner.owner(), Some(&3));
    }

    #[test]
    fn ended_procedure_frees_the_display() {
        let mut owner = PasskeyOwner::new();
        owner.begin(1u16);
        owner.end(&2);
        assert_eq!(owner.owner(), Some(&1));

        owner.end(&1);
        assert!(owner.begin(2));
        assert_eq!(owner.take(), Some(2));
    }
}
