//! Capacitive pad sensing.
//!
//! A pad is an RC node: the comparator sees its voltage cross a threshold
//! twice per charge cycle and the timer ticks in between grow with finger
//! contact. The sampler produces those raw tick counts; [`channel`] turns
//! them into calibrated, debounced press/release edges and [`scanner`]
//! drives every pad once per scan period.

pub mod channel;
pub mod scanner;

pub use channel::{Channel, Edge, Phase, SenseParams};
pub use scanner::{ScanReport, Scanner};

use crate::error::SamplerError;

/// Comparator analog input selector (AIN0..AIN7).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AnalogInput(u8);

impl AnalogInput {
    pub const AIN0: AnalogInput = AnalogInput(0);
    pub const AIN1: AnalogInput = AnalogInput(1);
    pub const AIN2: AnalogInput = AnalogInput(2);
    pub const AIN3: AnalogInput = AnalogInput(3);
    pub const AIN4: AnalogInput = AnalogInput(4);
    pub const AIN5: AnalogInput = AnalogInput(5);
    pub const AIN6: AnalogInput = AnalogInput(6);
    pub const AIN7: AnalogInput = AnalogInput(7);

    /// Value written to the comparator's PSEL register.
    pub const fn index(self) -> u8 {
        self.0
    }
}

/// Position of a pad in the scan order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelId(pub u8);

/// One hardware measurement, consumed as soon as it is produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawSample {
    pub channel: ChannelId,
    pub elapsed_ticks: u32,
}

/// Hardware that times one pad charge cycle.
///
/// Calls must be serialized: a single sampling task owns the sampler.
/// On error the implementation has already released its hardware, so the
/// caller may retry straight away.
#[allow(async_fn_in_trait)]
pub trait HardwareSampler {
    /// Timer ticks between the two comparator crossings on `input`.
    async fn measure(&mut self, input: AnalogInput) -> Result<u32, SamplerError>;
}
