//! Unified error types for capkeys.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! With the `defmt` feature every type implements `defmt::Format` for
//! efficient on-target logging.

use crate::sense::AnalogInput;

/// Top-level error type used across the firmware.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    // Sensing
    /// A pad measurement did not complete.
    Sampler(SamplerError),

    // BLE
    /// Report fan-out or connection bookkeeping failed.
    Transport(TransportError),

    /// Passkey confirmation bookkeeping failed.
    Pairing(PairingError),

    /// The SoftDevice returned a BLE-level error.
    Ble(BleError),

    // Boot
    /// Tunables rejected at start-up.
    Config(ConfigError),

    /// A hardware peripheral could not be brought up (boot-time only).
    PeripheralNotReady,
}

/// Capacitance measurement failures.
///
/// Both variants carry the analog input so the caller can decide to retry
/// the same pad within the current scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SamplerError {
    /// The comparator never reported the first crossing.
    FirstEdgeTimeout { input: AnalogInput },
    /// The first crossing arrived but the second did not, or the timer
    /// overran its safety window.
    SecondEdgeTimeout { input: AnalogInput },
}

impl SamplerError {
    pub fn input(&self) -> AnalogInput {
        match *self {
            SamplerError::FirstEdgeTimeout { input } | SamplerError::SecondEdgeTimeout { input } => {
                input
            }
        }
    }
}

/// Wireless report transport failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// At least one connected client rejected the report. The remaining
    /// clients were still attempted.
    SendFailed { delivered: u8, failed: u8 },
    /// Every connection slot is taken; advertising pauses until one frees.
    SlotsExhausted,
    /// A callback referenced a connection that holds no slot.
    UnknownConnection,
}

/// Pairing-confirmation queue failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PairingError {
    /// More simultaneous requests than client slots. The newest request
    /// is refused and the queued ones are untouched.
    QueueOverflow,
}

/// Sensing tunables that cannot produce a usable threshold.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// The threshold margin must be strictly above 100 %.
    ScaleNotAboveUnity,
    /// Calibration needs at least one round.
    NoCalibrationRounds,
}

/// Subset of BLE errors we propagate (keeps the enum `Copy`-friendly).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BleError {
    /// GAP / GATT raw error code from the SoftDevice.
    Raw(u32),
    /// GATT service registration failed.
    RegisterFailed,
    /// Advertising could not start.
    AdvertiseFailed,
    /// Advertising payload exceeds the 31-byte legacy limit.
    AdvDataTooLong,
    /// Characteristic notification failed.
    NotifyFailed,
}

// Convenience conversions

impl From<SamplerError> for Error {
    fn from(e: SamplerError) -> Self {
        Error::Sampler(e)
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Error::Transport(e)
    }
}

impl From<PairingError> for Error {
    fn from(e: PairingError) -> Self {
        Error::Pairing(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<BleError> for Error {
    fn from(e: BleError) -> Self {
        Error::Ble(e)
    }
}
