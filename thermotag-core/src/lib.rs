//! Board-agnostic core logic for the thermotag sensor node
//!
//! This crate contains the parts of the bus stack that do not depend on a
//! specific chip:
//!
//! - Two-wire transaction descriptor and its phase state machine
//! - Interrupt-driven transaction engine and its shared wrapper
//! - Bus stall supervision
//! - Inter-frame timing
//! - Result slots shared between interrupt and foreground context

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
#[macro_use]
extern crate std;

// Must come first so the logging macros are visible to the other modules
mod fmt;

pub mod slot;
pub mod timing;
pub mod twi;

pub use slot::ValueSlot;
pub use timing::{HalDelay, InterFrameDelay, SpinWait};
