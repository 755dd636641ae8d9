//! Connection slots and report fan-out.
//!
//! A fixed table of `N` slots, one per simultaneously connected host. The
//! BLE callbacks mutate it (connect, disconnect, protocol-mode change) and
//! the event consumer iterates it to fan every report out. The table is
//! generic over the connection handle so the same logic runs against
//! SoftDevice connections on target and plain integers in tests.

use crate::error::TransportError;
use crate::hid::HidReport;

/// HID Protocol Mode characteristic value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolMode {
    Boot,
    Report,
}

impl ProtocolMode {
    /// Decode a Protocol Mode write: 0 = boot, anything else = report.
    pub const fn from_u8(value: u8) -> Self {
        if value == 0 {
            ProtocolMode::Boot
        } else {
            ProtocolMode::Report
        }
    }

    pub const fn to_u8(self) -> u8 {
        match self {
            ProtocolMode::Boot => 0,
            ProtocolMode::Report => 1,
        }
    }
}

/// Whether the BLE layer should keep advertising after a lifecycle event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Advertising {
    Continue,
    Pause,
}

#[derive(Clone, Debug)]
pub struct ConnectionSlot<H> {
    handle: Option<H>,
    in_boot_mode: bool,
}

impl<H> ConnectionSlot<H> {
    pub const fn empty() -> Self {
        Self {
            handle: None,
            in_boot_mode: false,
        }
    }

    pub fn handle(&self) -> Option<&H> {
        self.handle.as_ref()
    }

    pub fn in_boot_mode(&self) -> bool {
        self.in_boot_mode
    }

    pub fn mode(&self) -> ProtocolMode {
        if self.in_boot_mode {
            ProtocolMode::Boot
        } else {
            ProtocolMode::Report
        }
    }
}

/// Per-send outcome when every attempted client accepted the report.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Delivery {
    pub delivered: u8,
    pub skipped_boot: u8,
}

pub struct SlotTable<H, const N: usize> {
    slots: [ConnectionSlot<H>; N],
}

impl<H: PartialEq, const N: usize> SlotTable<H, N> {
    pub const fn new() -> Self {
        Self {
            slots: [const { ConnectionSlot::empty() }; N],
        }
    }

    /// Register a new connection in the first free slot. New connections
    /// start in report mode.
    ///
    /// Returns whether advertising should continue for further clients.
    pub fn on_connected(&mut self, handle: H) -> Result<Advertising, TransportError> {
        let Some(slot) = self.slots.iter_mut().find(|s| s.handle.is_none()) else {
            warn!("no free connection slot");
            return Err(TransportError::SlotsExhausted);
        };
        slot.handle = Some(handle);
        slot.in_boot_mode = false;

        if self.has_free_slot() {
            Ok(Advertising::Continue)
        } else {
            info!("all {} connection slots in use", N);
            Ok(Advertising::Pause)
        }
    }

    /// Clear the slot held by `handle`, if any. Advertising always resumes.
    pub fn on_disconnected(&mut self, handle: &H) -> Advertising {
        match self.slot_mut(handle) {
            Some(slot) => *slot = ConnectionSlot::empty(),
            None => debug!("disconnect for a connection without a slot"),
        }
        Advertising::Continue
    }

    pub fn on_mode_changed(&mut self, handle: &H, mode: ProtocolMode) -> Result<(), TransportError> {
        let slot = self
            .slot_mut(handle)
            .ok_or(TransportError::UnknownConnection)?;
        slot.in_boot_mode = mode == ProtocolMode::Boot;
        info!("protocol mode -> {}", mode);
        Ok(())
    }

    /// Fan `report` out to every connected client through `notify`, which
    /// also gets the client's protocol mode to pick the right
    /// characteristic.
    ///
    /// Clients in boot mode are skipped for reports they cannot parse. A
    /// client that fails does not stop delivery to the others; any failure
    /// is reported once all clients were attempted.
    pub fn send<E>(
        &self,
        report: &HidReport,
        mut notify: impl FnMut(&H, ProtocolMode, &HidReport) -> Result<(), E>,
    ) -> Result<Delivery, TransportError> {
        let mut delivery = Delivery::default();
        let mut failed = 0u8;

        for slot in &self.slots {
            let Some(handle) = slot.handle.as_ref() else {
                continue;
            };
            if slot.in_boot_mode && !report.is_boot_compatible() {
                warn!("skipping boot-mode client for report {}", report.report_id());
                delivery.skipped_boot += 1;
                continue;
            }
            match notify(handle, slot.mode(), report) {
                Ok(()) => delivery.delivered += 1,
                Err(_) => failed += 1,
            }
        }

        if failed > 0 {
            error!("report {} failed on {} client(s)", report.report_id(), failed);
            return Err(TransportError::SendFailed {
                delivered: delivery.delivered,
                failed,
            });
        }
        Ok(delivery)
    }

    pub fn has_free_slot(&self) -> bool {
        self.slots.iter().any(|s| s.handle.is_none())
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.handle.is_some()).count()
    }

    pub fn contains(&self, handle: &H) -> bool {
        self.slots.iter().any(|s| s.handle.as_ref() == Some(handle))
    }

    pub fn slots(&self) -> &[ConnectionSlot<H>; N] {
        &self.slots
    }

    fn slot_mut(&mut self, handle: &H) -> Option<&mut ConnectionSlot<H>> {
        self.slots
            .iter_mut()
            .find(|s| s.handle.as_ref() == Some(handle))
    }
}

impl<H: PartialEq, const N: usize> Default for SlotTable<H, N> {
    fn default() -> Self {
        Self::new()
    }
}
