//! nRF52840 peripheral drivers.
//!
//! - **comparator** - COMP + TIMER1 + PPI pad sampler
//! - **led** - red/green/blue indicator tasks

pub mod comparator;
pub mod led;
