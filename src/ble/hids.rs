//! HID-over-GATT service (0x1812).
//!
//! Registered once at boot with the SoftDevice service builder. Report
//! characteristics require an authenticated link, so a host has to go
//! through the passkey confirmation before it can subscribe.

use capkeys::config::HID_INFO;
use capkeys::error::BleError;
use capkeys::hid::consumer::CONSUMER_REPORT_SIZE;
use capkeys::hid::keyboard::KEYBOARD_REPORT_SIZE;
use capkeys::hid::{
    HidReport, KeyboardReport, CONSUMER_REPORT_ID, KEYBOARD_REPORT_ID, REPORT_MAP,
};
use capkeys::transport::ProtocolMode;
use defmt::{debug, info, warn};
use nrf_softdevice::ble::gatt_server::builder::ServiceBuilder;
use nrf_softdevice::ble::gatt_server::characteristic::{Attribute, Metadata, Properties};
use nrf_softdevice::ble::gatt_server::{self, RegisterError, WriteOp};
use nrf_softdevice::ble::{Connection, SecurityMode, Uuid};
use nrf_softdevice::Softdevice;

use super::{Client, SLOTS};

const HID_SERVICE: Uuid = Uuid::new_16(0x1812);
const BOOT_KEYBOARD_INPUT: Uuid = Uuid::new_16(0x2a22);
const BOOT_KEYBOARD_OUTPUT: Uuid = Uuid::new_16(0x2a32);
const HID_INFORMATION: Uuid = Uuid::new_16(0x2a4a);
const REPORT_MAP_CHAR: Uuid = Uuid::new_16(0x2a4b);
const HID_CONTROL_POINT: Uuid = Uuid::new_16(0x2a4c);
const HID_REPORT: Uuid = Uuid::new_16(0x2a4d);
const PROTOCOL_MODE: Uuid = Uuid::new_16(0x2a4e);
const REPORT_REFERENCE: Uuid = Uuid::new_16(0x2908);

// Report Reference descriptor: [report id, report type].
const REPORT_TYPE_INPUT: u8 = 0x01;
const REPORT_TYPE_OUTPUT: u8 = 0x02;

// HID Control Point values.
const CONTROL_SUSPEND: u8 = 0x00;
const CONTROL_EXIT_SUSPEND: u8 = 0x01;

/// Attribute handles of the registered HID service.
pub struct HidService {
    protocol_mode: u16,
    control_point: u16,
    keyboard_input: u16,
    consumer_input: u16,
    keyboard_output: u16,
    boot_input: u16,
    boot_output: u16,
}

impl HidService {
    pub fn new(sd: &mut Softdevice) -> Result<Self, RegisterError> {
        let mut service = ServiceBuilder::new(sd, HID_SERVICE)?;

        service
            .add_characteristic(
                HID_INFORMATION,
                Attribute::new(HID_INFO).security(SecurityMode::JustWorks),
                Metadata::new(Properties::new().read()),
            )?
            .build();

        service
            .add_characteristic(
                REPORT_MAP_CHAR,
                Attribute::new(REPORT_MAP).security(SecurityMode::JustWorks),
                Metadata::new(Properties::new().read()),
            )?
            .build();

        let control_point = service
            .add_characteristic(
                HID_CONTROL_POINT,
                Attribute::new([0u8]).security(SecurityMode::JustWorks),
                Metadata::new(Properties::new().write_without_response()),
            )?
            .build();

        let protocol_mode = service
            .add_characteristic(
                PROTOCOL_MODE,
                Attribute::new([ProtocolMode::Report.to_u8()]).security(SecurityMode::JustWorks),
                Metadata::new(Properties::new().read().write_without_response()),
            )?
            .build();

        let mut keyboard_input = service.add_characteristic(
            HID_REPORT,
            Attribute::new(KeyboardReport::empty().to_bytes()).security(SecurityMode::Mitm),
            Metadata::new(Properties::new().read().notify()),
        )?;
        keyboard_input.add_descriptor(
            REPORT_REFERENCE,
            Attribute::new([KEYBOARD_REPORT_ID, REPORT_TYPE_INPUT]).security(SecurityMode::Mitm),
        )?;
        let keyboard_input = keyboard_input.build();

        let mut consumer_input = service.add_characteristic(
            HID_REPORT,
            Attribute::new([0u8; CONSUMER_REPORT_SIZE]).security(SecurityMode::Mitm),
            Metadata::new(Properties::new().read().notify()),
        )?;
        consumer_input.add_descriptor(
            REPORT_REFERENCE,
            Attribute::new([CONSUMER_REPORT_ID, REPORT_TYPE_INPUT]).security(SecurityMode::Mitm),
        )?;
        let consumer_input = consumer_input.build();

        let mut keyboard_output = service.add_characteristic(
            HID_REPORT,
            Attribute::new([0u8]).security(SecurityMode::Mitm),
            Metadata::new(Properties::new().read().write().write_without_response()),
        )?;
        keyboard_output.add_descriptor(
            REPORT_REFERENCE,
            Attribute::new([KEYBOARD_REPORT_ID, REPORT_TYPE_OUTPUT]).security(SecurityMode::Mitm),
        )?;
        let keyboard_output = keyboard_output.build();

        let boot_input = service
            .add_characteristic(
                BOOT_KEYBOARD_INPUT,
                Attribute::new(KeyboardReport::empty().to_bytes()).security(SecurityMode::Mitm),
                Metadata::new(Properties::new().read().notify()),
            )?
            .build();

        let boot_output = service
            .add_characteristic(
                BOOT_KEYBOARD_OUTPUT,
                Attribute::new([0u8]).security(SecurityMode::Mitm),
                Metadata::new(Properties::new().read().write().write_without_response()),
            )?
            .build();

        let _service_handle = service.build();

        info!("HID service registered");

        Ok(Self {
            protocol_mode: protocol_mode.value_handle,
            control_point: control_point.value_handle,
            keyboard_input: keyboard_input.value_handle,
            consumer_input: consumer_input.value_handle,
            keyboard_output: keyboard_output.value_handle,
            boot_input: boot_input.value_handle,
            boot_output: boot_output.value_handle,
        })
    }

    /// Notify one client. The characteristic follows the report kind and
    /// the client's protocol mode.
    pub fn notify(&self, client: &Client, mode: ProtocolMode, report: &HidReport) -> Result<(), BleError> {
        let mut buf = [0u8; KEYBOARD_REPORT_SIZE];
        let len = report.serialize(&mut buf);
        let handle = match (report, mode) {
            (HidReport::Keyboard(_), ProtocolMode::Boot) => self.boot_input,
            (HidReport::Keyboard(_), ProtocolMode::Report) => self.keyboard_input,
            (HidReport::Consumer(_), _) => self.consumer_input,
        };
        gatt_server::notify_value(&client.conn, handle, &buf[..len]).map_err(|e| {
            warn!("notify to conn {} failed: {}", client.handle, e);
            BleError::NotifyFailed
        })
    }

    fn on_write(&self, conn: &Connection, handle: u16, data: &[u8]) {
        let Some(&value) = data.first() else {
            return;
        };

        if handle == self.protocol_mode {
            let Some(client) = Client::new(conn) else {
                return;
            };
            let mode = ProtocolMode::from_u8(value);
            if let Err(e) = SLOTS.mode_changed(&client, mode) {
                warn!("protocol mode write from conn {}: {}", client.handle, e);
            }
        } else if handle == self.control_point {
            match value {
                CONTROL_SUSPEND => debug!("host suspended"),
                CONTROL_EXIT_SUSPEND => debug!("host resumed"),
                other => debug!("unknown control point value {}", other),
            }
        } else if handle == self.keyboard_output || handle == self.boot_output {
            // Keyboard LED state; nothing on the board mirrors it.
            debug!("host LED state {=u8:#x}", value);
        }
    }
}

/// GATT server: just the HID service.
pub struct HidServer {
    pub hid: HidService,
}

impl HidServer {
    pub fn new(sd: &mut Softdevice) -> Result<Self, RegisterError> {
        Ok(Self {
            hid: HidService::new(sd)?,
        })
    }
}

impl gatt_server::Server for HidServer {
    type Event = ();

    fn on_write(
        &self,
        conn: &Connection,
        handle: u16,
        _op: WriteOp,
        _offset: usize,
        data: &[u8],
    ) -> Option<Self::Event> {
        self.hid.on_write(conn, handle, data);
        None
    }
}
