//! Unit tests for HID report layout and key masks.
//!
//! These tests run on the host (not embedded) and verify the fixed
//! payload shapes the hosts expect.

use super::consumer::{ConsumerReport, CONSUMER_REPORT_SIZE};
use super::keyboard::{KeyboardReport, KEYBOARD_REPORT_SIZE};
use super::{HidReport, KeyMask, MediaKey, REPORT_MAP};

// ═══════════════════════════════════════════════════════════════════════════
// Key Mask Tests
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn media_key_bits_follow_report_order() {
    assert_eq!(MediaKey::Mute.bit(), 0b0001);
    assert_eq!(MediaKey::PlayPause.bit(), 0b0010);
    assert_eq!(MediaKey::VolumeUp.bit(), 0b0100);
    assert_eq!(MediaKey::VolumeDown.bit(), 0b1000);
}

#[test]
fn key_mask_set_and_clear() {
    let mask = KeyMask::EMPTY
        .with(MediaKey::VolumeUp, true)
        .with(MediaKey::Mute, true);
    assert!(mask.contains(MediaKey::VolumeUp));
    assert!(mask.contains(MediaKey::Mute));
    assert!(!mask.contains(MediaKey::PlayPause));

    let mask = mask.with(MediaKey::VolumeUp, false);
    assert_eq!(mask.bits(), MediaKey::Mute.bit());

    // Clearing an unset key is a no-op.
    assert_eq!(mask.with(MediaKey::VolumeDown, false), mask);
}

#[test]
fn pairing_chord_is_volume_up_and_down() {
    let chord: KeyMask = [MediaKey::VolumeDown, MediaKey::VolumeUp]
        .into_iter()
        .collect();
    assert_eq!(chord, KeyMask::PAIRING_CHORD);
    assert_eq!(chord.iter().count(), 2);
}

#[test]
fn key_mask_from_bits_drops_padding() {
    assert_eq!(KeyMask::from_bits(0xFF).bits(), 0x0F);
}

// ═══════════════════════════════════════════════════════════════════════════
// Report Tests
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn consumer_report_is_one_bitmask_byte() {
    let report = ConsumerReport::new(KeyMask::EMPTY.with(MediaKey::PlayPause, true));
    let mut buf = [0xAAu8; 2];
    assert_eq!(report.serialize(&mut buf), CONSUMER_REPORT_SIZE);
    assert_eq!(buf[0], 0b0010);
    assert!(report.is_pressed(MediaKey::PlayPause));
    assert!(!ConsumerReport::empty().is_pressed(MediaKey::PlayPause));
}

#[test]
fn consumer_report_serialize_buffer_too_small() {
    let report = ConsumerReport::empty();
    assert_eq!(report.serialize(&mut []), 0);
}

#[test]
fn keyboard_report_layout() {
    let report = KeyboardReport {
        modifier: 0x02,
        reserved: 0,
        keycodes: [0x04, 0x05, 0, 0, 0, 0],
    };
    let mut buf = [0u8; KEYBOARD_REPORT_SIZE];
    assert_eq!(report.serialize(&mut buf), KEYBOARD_REPORT_SIZE);
    assert_eq!(buf, [0x02, 0x00, 0x04, 0x05, 0, 0, 0, 0]);
    assert_eq!(report.to_bytes(), buf);
    assert!(!report.is_empty());
    assert!(KeyboardReport::empty().is_empty());
}

#[test]
fn keyboard_report_serialize_buffer_too_small() {
    let mut small_buf = [0u8; 4];
    assert_eq!(KeyboardReport::empty().serialize(&mut small_buf), 0);
}

#[test]
fn only_keyboard_reports_reach_boot_mode_clients() {
    assert!(HidReport::Keyboard(KeyboardReport::empty()).is_boot_compatible());
    assert!(!HidReport::Consumer(ConsumerReport::empty()).is_boot_compatible());
}

#[test]
fn hid_report_ids_match_report_map() {
    let kb = HidReport::Keyboard(KeyboardReport::empty());
    let media = HidReport::Consumer(ConsumerReport::empty());
    assert_eq!(kb.report_id(), 1);
    assert_eq!(media.report_id(), 2);

    // Every Report ID item in the map is one of ours, in order.
    let ids: heapless::Vec<u8, 4> = REPORT_MAP
        .windows(2)
        .filter(|w| w[0] == 0x85)
        .map(|w| w[1])
        .collect();
    assert_eq!(ids.as_slice(), &[1, 2]);
}

#[test]
fn report_map_collections_are_balanced() {
    let opens = REPORT_MAP
        .windows(2)
        .filter(|w| w[0] == 0xA1 && w[1] == 0x01)
        .count();
    let closes = REPORT_MAP.iter().filter(|&&b| b == 0xC0).count();
    assert_eq!(opens, 2);
    assert_eq!(closes, 2);
}
