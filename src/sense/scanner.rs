//! One pass over every pad.
//!
//! The scanner owns the sampler, every [`Channel`] and the [`KeyRouter`],
//! so all per-pad state has exactly one writer: the sampling task that
//! calls [`Scanner::scan`] on a fixed period.

use super::{AnalogInput, Channel, ChannelId, HardwareSampler, RawSample, SenseParams};
use crate::error::SamplerError;
use crate::hid::{KeyMask, MediaKey};
use crate::router::{KeyInputEvent, KeyRouter};

/// Outcome counters for one scan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScanReport {
    /// Pads that produced a sample.
    pub sampled: u8,
    /// Pads that failed every attempt and were left untouched this scan.
    pub skipped: u8,
    /// Failed attempts that were retried. Saturates at `u8::MAX`.
    pub retries: u8,
    /// Key events emitted.
    pub events: u8,
}

pub struct Scanner<S, const N: usize> {
    sampler: S,
    channels: [Channel; N],
    router: KeyRouter,
    params: SenseParams,
}

impl<S: HardwareSampler, const N: usize> Scanner<S, N> {
    pub fn new(sampler: S, pads: &[(AnalogInput, MediaKey); N], params: SenseParams) -> Self {
        let channels = core::array::from_fn(|i| {
            let (input, key) = pads[i];
            Channel::new(ChannelId(i as u8), input, key, &params)
        });
        Self {
            sampler,
            channels,
            router: KeyRouter::new(),
            params,
        }
    }

    /// Measure every pad once, in order, and hand each resulting key event
    /// to `emit`.
    ///
    /// A pad that keeps failing is skipped for this scan only; its
    /// calibration and debounce state are left exactly as they were.
    pub async fn scan(&mut self, mut emit: impl FnMut(KeyInputEvent)) -> ScanReport {
        let mut report = ScanReport::default();
        let attempts = self.params.max_attempts();

        for channel in self.channels.iter_mut() {
            let sample = match measure(&mut self.sampler, channel, attempts).await {
                Ok((sample, retries)) => {
                    report.retries = report.retries.saturating_add(retries);
                    sample
                }
                Err(e) => {
                    report.retries = report.retries.saturating_add(attempts - 1);
                    report.skipped = report.skipped.saturating_add(1);
                    warn!("pad {} skipped this scan: {}", channel.id().0, e);
                    continue;
                }
            };
            report.sampled = report.sampled.saturating_add(1);

            let was_calibrated = channel.is_calibrated();
            let edge = channel.update(sample.elapsed_ticks, &self.params);
            if !was_calibrated && channel.is_calibrated() {
                info!(
                    "pad {} calibrated, threshold {} ticks",
                    channel.id().0,
                    channel.threshold().unwrap_or(0)
                );
            }

            if let Some(edge) = edge {
                let event = self.router.apply(channel.key(), edge);
                debug!("pad {} {}: mask {}", channel.id().0, edge, event.pressed);
                report.events = report.events.saturating_add(1);
                emit(event);
            }
        }
        report
    }

    pub fn is_calibrated(&self) -> bool {
        self.channels.iter().all(Channel::is_calibrated)
    }

    pub fn channels(&self) -> &[Channel; N] {
        &self.channels
    }

    pub fn pressed(&self) -> KeyMask {
        self.router.pressed()
    }
}

/// Measure one pad, retrying up to `attempts` times in total. Returns the
/// sample and how many failed attempts preceded it.
async fn measure<S: HardwareSampler>(
    sampler: &mut S,
    channel: &Channel,
    attempts: u8,
) -> Result<(RawSample, u8), SamplerError> {
    let mut failed = 0u8;
    loop {
        match sampler.measure(channel.input()).await {
            Ok(elapsed_ticks) => {
                let sample = RawSample {
                    channel: channel.id(),
                    elapsed_ticks,
                };
                return Ok((sample, failed));
            }
            Err(e) => {
                failed += 1;
                if failed >= attempts {
                    return Err(e);
                }
                debug!("pad {} retry {}: {}", channel.id().0, failed, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;
    use heapless::Deque;

    /// Replays a fixed script of results, one per `measure` call, and
    /// records which inputs were asked for.
    struct ScriptedSampler {
        script: Deque<Result<u32, SamplerError>, 64>,
        asked: heapless::Vec<AnalogInput, 64>,
        fallback: u32,
    }

    impl ScriptedSampler {
        fn new(fallback: u32) -> Self {
            Self {
                script: Deque::new(),
                asked: heapless::Vec::new(),
                fallback,
            }
        }

        fn then(mut self, result: Result<u32, SamplerError>) -> Self {
            self.script.push_back(result).unwrap();
            self
        }
    }

    impl HardwareSampler for ScriptedSampler {
        async fn measure(&mut self, input: AnalogInput) -> Result<u32, SamplerError> {
            self.asked.push(input).unwrap();
            self.script.pop_front().unwrap_or(Ok(self.fallback))
        }
    }

    const PADS: [(AnalogInput, MediaKey); 2] = [
        (AnalogInput::AIN0, MediaKey::Mute),
        (AnalogInput::AIN1, MediaKey::VolumeUp),
    ];

    fn params(bound: u8, attempts: u8) -> SenseParams {
        SenseParams::new(1, 150, bound, attempts).unwrap()
    }

    fn timeout(input: AnalogInput) -> Result<u32, SamplerError> {
        Err(SamplerError::FirstEdgeTimeout { input })
    }

    #[test]
    fn first_scan_calibrates_every_pad() {
        let mut scanner = Scanner::new(ScriptedSampler::new(100), &PADS, params(0, 1));
        assert!(!scanner.is_calibrated());

        let report = block_on(scanner.scan(|_| panic!("no events during calibration")));
        assert_eq!(report.sampled, 2);
        assert!(scanner.is_calibrated());
        assert_eq!(scanner.channels()[0].threshold(), Some(150));
    }

    #[test]
    fn touch_emits_event_with_full_mask() {
        let sampler = ScriptedSampler::new(100)
            .then(Ok(100))
            .then(Ok(100))
            .then(Ok(400))
            .then(Ok(400));
        let mut scanner = Scanner::new(sampler, &PADS, params(0, 1));
        block_on(scanner.scan(|_| {}));

        let mut events: heapless::Vec<KeyInputEvent, 4> = heapless::Vec::new();
        let report = block_on(scanner.scan(|ev| events.push(ev).unwrap()));
        assert_eq!(report.events, 2);
        assert_eq!(events[0].changed_key, MediaKey::Mute);
        assert_eq!(events[0].pressed, KeyMask::EMPTY.with(MediaKey::Mute, true));
        assert_eq!(events[1].changed_key, MediaKey::VolumeUp);
        assert!(events[1].pressed.contains(MediaKey::Mute));
        assert!(events[1].pressed.contains(MediaKey::VolumeUp));
        assert_eq!(scanner.pressed(), events[1].pressed);
    }

    #[test]
    fn failed_attempt_is_retried_within_the_scan() {
        let sampler = ScriptedSampler::new(100)
            .then(timeout(AnalogInput::AIN0))
            .then(Ok(100));
        let mut scanner = Scanner::new(sampler, &PADS, params(0, 3));

        let report = block_on(scanner.scan(|_| {}));
        assert_eq!(report.retries, 1);
        assert_eq!(report.sampled, 2);
        assert_eq!(report.skipped, 0);
        assert_eq!(
            scanner.sampler.asked.as_slice(),
            &[AnalogInput::AIN0, AnalogInput::AIN0, AnalogInput::AIN1]
        );
    }

    #[test]
    fn exhausted_pad_is_skipped_without_blocking_others() {
        let ain0 = AnalogInput::AIN0;
        let sampler = ScriptedSampler::new(100)
            .then(timeout(ain0))
            .then(Err(SamplerError::SecondEdgeTimeout { input: ain0 }));
        let mut scanner = Scanner::new(sampler, &PADS, params(0, 2));

        let report = block_on(scanner.scan(|_| {}));
        assert_eq!(report.skipped, 1);
        assert_eq!(report.sampled, 1);
        assert!(!scanner.channels()[0].is_calibrated());
        assert!(scanner.channels()[1].is_calibrated());

        // The skipped pad calibrates on the next scan.
        block_on(scanner.scan(|_| {}));
        assert!(scanner.is_calibrated());
    }

    #[test]
    fn skipped_scan_does_not_touch_debounce_streak() {
        let ain0 = AnalogInput::AIN0;
        let sampler = ScriptedSampler::new(100)
            // calibrate
            .then(Ok(100))
            .then(Ok(100))
            // pad 0 touched once
            .then(Ok(400))
            .then(Ok(100))
            // pad 0 fails the whole scan
            .then(timeout(ain0))
            .then(Ok(100))
            // pad 0 touched again: second consecutive differing sample
            .then(Ok(400))
            .then(Ok(100));
        let mut scanner = Scanner::new(sampler, &PADS, params(1, 1));

        let mut edges: heapless::Vec<(MediaKey, bool), 4> = heapless::Vec::new();
        for _ in 0..4 {
            block_on(scanner.scan(|ev| {
                edges.push((ev.changed_key, ev.changed_key_pressed)).unwrap()
            }));
        }
        assert_eq!(edges.as_slice(), &[(MediaKey::Mute, true)]);
        assert!(scanner.channels()[0].is_pressed());
        assert_eq!(scanner.channels()[0].streak(), 0);
    }

    /// Never sees an edge.
    struct DeadSampler {
        calls: u32,
    }

    impl HardwareSampler for DeadSampler {
        async fn measure(&mut self, input: AnalogInput) -> Result<u32, SamplerError> {
            self.calls += 1;
            Err(SamplerError::FirstEdgeTimeout { input })
        }
    }

    #[test]
    fn retry_counter_saturates_when_every_pad_fails() {
        let params = SenseParams::new(8, 130, 3, 100).unwrap();
        let mut scanner = Scanner::new(DeadSampler { calls: 0 }, &crate::config::PADS, params);

        let report = block_on(scanner.scan(|_| panic!("dead pads emit nothing")));
        assert_eq!(report.skipped, 4);
        assert_eq!(report.sampled, 0);
        assert_eq!(report.retries, u8::MAX);
        assert_eq!(scanner.sampler.calls, 400);
        assert!(scanner.channels().iter().all(|c| !c.is_calibrated()));
    }
}
