//! Per-pad calibration and debounce state machine.
//!
//! ```text
//! Calibrating(n) ──(n samples summed)──▶ Active
//! ```
//!
//! While calibrating, raw tick counts are summed into a baseline. Once
//! `calibration_rounds` samples are in, the threshold is fixed at
//! `(sum / rounds) * scale_percent / 100` and the channel goes active for
//! the rest of the boot. Active channels compare every sample against that
//! threshold and only commit a new pressed state once the classification
//! has disagreed with it for more than `debounce_bound` consecutive scans.

use super::{AnalogInput, ChannelId};
use crate::config;
use crate::error::ConfigError;
use crate::hid::MediaKey;

/// Sensing tunables, validated once at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SenseParams {
    calibration_rounds: u8,
    scale_percent: u16,
    debounce_bound: u8,
    max_attempts: u8,
}

impl SenseParams {
    /// Values from [`crate::config`].
    pub const DEFAULT: SenseParams = SenseParams {
        calibration_rounds: config::SENSE_CALIBRATION_ROUNDS,
        scale_percent: config::SENSE_SCALE_PERCENT,
        debounce_bound: config::SENSE_DEBOUNCE_BOUND,
        max_attempts: config::SENSE_MAX_ATTEMPTS,
    };

    /// `max_attempts` of 0 is treated as 1: every pad is measured at least
    /// once per scan.
    pub const fn new(
        calibration_rounds: u8,
        scale_percent: u16,
        debounce_bound: u8,
        max_attempts: u8,
    ) -> Result<Self, ConfigError> {
        if calibration_rounds == 0 {
            return Err(ConfigError::NoCalibrationRounds);
        }
        if scale_percent <= 100 {
            return Err(ConfigError::ScaleNotAboveUnity);
        }
        Ok(Self {
            calibration_rounds,
            scale_percent,
            debounce_bound,
            max_attempts: if max_attempts == 0 { 1 } else { max_attempts },
        })
    }

    pub const fn calibration_rounds(&self) -> u8 {
        self.calibration_rounds
    }

    pub const fn scale_percent(&self) -> u16 {
        self.scale_percent
    }

    pub const fn debounce_bound(&self) -> u8 {
        self.debounce_bound
    }

    pub const fn max_attempts(&self) -> u8 {
        self.max_attempts
    }

    /// Threshold for a calibration sum, saturating at `u32::MAX`.
    pub const fn threshold_for(&self, sum: u64) -> u32 {
        let mean = sum / self.calibration_rounds as u64;
        let scaled = mean * self.scale_percent as u64 / 100;
        if scaled > u32::MAX as u64 {
            u32::MAX
        } else {
            scaled as u32
        }
    }
}

impl Default for SenseParams {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    Calibrating { rounds_remaining: u8 },
    Active,
}

/// Committed state change of a pad.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Edge {
    Pressed,
    Released,
}

impl Edge {
    pub const fn is_press(self) -> bool {
        matches!(self, Edge::Pressed)
    }
}

/// State of one physical pad. Owned by the sampling task, never shared.
#[derive(Clone, Debug)]
pub struct Channel {
    id: ChannelId,
    input: AnalogInput,
    key: MediaKey,
    phase: Phase,
    sum: u64,
    threshold: u32,
    streak: u16,
    pressed: bool,
}

impl Channel {
    pub const fn new(id: ChannelId, input: AnalogInput, key: MediaKey, params: &SenseParams) -> Self {
        Self {
            id,
            input,
            key,
            phase: Phase::Calibrating {
                rounds_remaining: params.calibration_rounds,
            },
            sum: 0,
            threshold: 0,
            streak: 0,
            pressed: false,
        }
    }

    /// Feed one raw measurement. Returns the committed edge, if any.
    pub fn update(&mut self, raw: u32, params: &SenseParams) -> Option<Edge> {
        match self.phase {
            Phase::Calibrating { rounds_remaining } => {
                self.sum = self.sum.saturating_add(raw as u64);
                let remaining = rounds_remaining.saturating_sub(1);
                if remaining == 0 {
                    self.threshold = params.threshold_for(self.sum);
                    self.phase = Phase::Active;
                } else {
                    self.phase = Phase::Calibrating {
                        rounds_remaining: remaining,
                    };
                }
                None
            }
            Phase::Active => self.debounce(raw > self.threshold, params.debounce_bound),
        }
    }

    fn debounce(&mut self, touched: bool, bound: u8) -> Option<Edge> {
        if touched == self.pressed {
            self.streak = 0;
            return None;
        }
        self.streak = self.streak.saturating_add(1);
        if self.streak <= bound as u16 {
            return None;
        }
        self.streak = 0;
        self.pressed = touched;
        Some(if touched { Edge::Pressed } else { Edge::Released })
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn input(&self) -> AnalogInput {
        self.input
    }

    pub fn key(&self) -> MediaKey {
        self.key
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_calibrated(&self) -> bool {
        self.phase == Phase::Active
    }

    /// Touch threshold in ticks, once calibration is done.
    pub fn threshold(&self) -> Option<u32> {
        self.is_calibrated().then_some(self.threshold)
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    pub fn streak(&self) -> u16 {
        self.streak
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(rounds: u8, scale: u16, bound: u8) -> SenseParams {
        SenseParams::new(rounds, scale, bound, 1).unwrap()
    }

    fn channel(p: &SenseParams) -> Channel {
        Channel::new(ChannelId(0), AnalogInput::AIN0, MediaKey::VolumeUp, p)
    }

    fn calibrated(p: &SenseParams, baseline: u32) -> Channel {
        let mut ch = channel(p);
        for _ in 0..p.calibration_rounds() {
            assert_eq!(ch.update(baseline, p), None);
        }
        assert!(ch.is_calibrated());
        ch
    }

    #[test]
    fn params_reject_unusable_values() {
        assert_eq!(
            SenseParams::new(0, 130, 3, 3),
            Err(ConfigError::NoCalibrationRounds)
        );
        assert_eq!(
            SenseParams::new(8, 100, 3, 3),
            Err(ConfigError::ScaleNotAboveUnity)
        );
        assert_eq!(SenseParams::new(8, 130, 3, 0).unwrap().max_attempts(), 1);
    }

    #[test]
    fn default_params_are_valid() {
        let d = SenseParams::DEFAULT;
        assert_eq!(
            SenseParams::new(
                d.calibration_rounds(),
                d.scale_percent(),
                d.debounce_bound(),
                d.max_attempts()
            ),
            Ok(d)
        );
    }

    #[test]
    fn threshold_is_scaled_mean_of_calibration() {
        let p = params(10, 120, 5);
        let ch = calibrated(&p, 40);
        assert_eq!(ch.threshold(), Some(48));
    }

    #[test]
    fn threshold_uses_integer_mean() {
        let p = params(3, 150, 0);
        let mut ch = channel(&p);
        ch.update(10, &p);
        ch.update(11, &p);
        assert_eq!(ch.threshold(), None);
        ch.update(12, &p);
        // 33 / 3 = 11, then 11 * 150 / 100 = 16
        assert_eq!(ch.threshold(), Some(16));
    }

    #[test]
    fn zero_baseline_gives_zero_threshold() {
        let p = params(4, 130, 0);
        let mut ch = calibrated(&p, 0);
        assert_eq!(ch.threshold(), Some(0));

        // Any nonzero reading counts as touched.
        assert_eq!(ch.update(1, &p), Some(Edge::Pressed));
        assert_eq!(ch.update(0, &p), Some(Edge::Released));
    }

    #[test]
    fn huge_baseline_saturates_threshold() {
        let p = params(1, 200, 0);
        let ch = calibrated(&p, u32::MAX);
        assert_eq!(ch.threshold(), Some(u32::MAX));
    }

    #[test]
    fn calibration_samples_never_emit_edges() {
        let p = params(5, 120, 0);
        let mut ch = channel(&p);
        for raw in [1, 1000, 1, 1000] {
            assert_eq!(ch.update(raw, &p), None);
            assert!(!ch.is_pressed());
        }
        assert_eq!(ch.phase(), Phase::Calibrating { rounds_remaining: 1 });
    }

    #[test]
    fn press_commits_after_more_than_bound_scans() {
        let p = params(10, 120, 5);
        let mut ch = calibrated(&p, 40);

        for scan in 1..=5 {
            assert_eq!(ch.update(50, &p), None, "scan {scan}");
            assert_eq!(ch.streak(), scan);
        }
        assert_eq!(ch.update(50, &p), Some(Edge::Pressed));
        assert!(ch.is_pressed());
        assert_eq!(ch.streak(), 0);

        // Staying touched emits nothing.
        assert_eq!(ch.update(50, &p), None);
    }

    #[test]
    fn reverting_scan_resets_streak() {
        let p = params(10, 120, 5);
        let mut ch = calibrated(&p, 40);

        for _ in 0..5 {
            assert_eq!(ch.update(50, &p), None);
        }
        assert_eq!(ch.update(40, &p), None);
        assert_eq!(ch.streak(), 0);
        assert!(!ch.is_pressed());

        // The count starts over.
        for _ in 0..5 {
            assert_eq!(ch.update(50, &p), None);
        }
        assert_eq!(ch.update(50, &p), Some(Edge::Pressed));
    }

    #[test]
    fn sample_equal_to_threshold_is_untouched() {
        let p = params(1, 120, 0);
        let mut ch = calibrated(&p, 40);
        assert_eq!(ch.update(48, &p), None);
        assert_eq!(ch.update(49, &p), Some(Edge::Pressed));
    }

    #[test]
    fn release_is_debounced_like_press() {
        let p = params(1, 120, 2);
        let mut ch = calibrated(&p, 40);
        for _ in 0..3 {
            ch.update(60, &p);
        }
        assert!(ch.is_pressed());

        assert_eq!(ch.update(10, &p), None);
        assert_eq!(ch.update(10, &p), None);
        assert_eq!(ch.update(10, &p), Some(Edge::Released));
        assert!(!ch.is_pressed());
    }
}
