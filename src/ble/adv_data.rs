use heapless::Vec;

use crate::error::BleError;

/// Legacy advertising / scan response payload limit.
pub const MAX_ADV_LEN: usize = 31;

pub const AD_FLAGS: u8 = 0x01;
pub const AD_UUID16_COMPLETE: u8 = 0x03;
pub const AD_SHORT_NAME: u8 = 0x08;
pub const AD_COMPLETE_NAME: u8 = 0x09;
pub const AD_APPEARANCE: u8 = 0x19;

/// LE General Discoverable, BR/EDR not supported.
pub const FLAGS_GENERAL_DISC_NO_BREDR: u8 = 0x06;

/// HID service UUID (0x1812).
pub const HID_SERVICE_UUID: u16 = 0x1812;

/// Length-type-value encoded advertising payload.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AdvPayload(Vec<u8, MAX_ADV_LEN>);

impl AdvPayload {
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    pub fn field(mut self, ad_type: u8, value: &[u8]) -> Result<Self, BleError> {
        if self.0.len() + 2 + value.len() > MAX_ADV_LEN {
            return Err(BleError::AdvDataTooLong);
        }
        // Length byte covers the type byte plus the value.
        let _ = self.0.push(value.len() as u8 + 1);
        let _ = self.0.push(ad_type);
        let _ = self.0.extend_from_slice(value);
        Ok(self)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    fn remaining(&self) -> usize {
        MAX_ADV_LEN - self.0.len()
    }
}

/// Main advertising packet: flags, appearance, HID service UUID.
pub fn advertising_data(appearance: u16) -> Result<AdvPayload, BleError> {
    AdvPayload::new()
        .field(AD_FLAGS, &[FLAGS_GENERAL_DISC_NO_BREDR])?
        .field(AD_APPEARANCE, &appearance.to_le_bytes())?
        .field(AD_UUID16_COMPLETE, &HID_SERVICE_UUID.to_le_bytes())
}

/// Scan response: the complete local name, or a shortened one when it
/// does not fit.
pub fn scan_response(name: &str) -> Result<AdvPayload, BleError> {
    let payload = AdvPayload::new();
    let room = payload.remaining() - 2;
    let bytes = name.as_bytes();
    if bytes.len() <= room {
        payload.field(AD_COMPLETE_NAME, bytes)
    } else {
        payload.field(AD_SHORT_NAME, &bytes[..room])
    }
}

/// Value of the first field of `ad_type` in raw advertising data.
pub fn find_field(data: &[u8], ad_type: u8) -> Option<&[u8]> {
    let mut i = 0;
    while i < data.len() {
        let len = data[i] as usize;
        if len == 0 || i + len >= data.len() {
            break;
        }
        if data[i + 1] == ad_type {
            return Some(&data[i + 2..i + 1 + len]);
        }
        i += len + 1;
    }
    None
}
