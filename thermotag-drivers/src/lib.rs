//! Device drivers for the thermotag sensor node
//!
//! - NCT375 digital temperature sensor (two-wire register protocol)
//! - Sensor supply switching over GPIO

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
#[macro_use]
extern crate std;

mod fmt;

pub mod sensor;
pub mod supply;

pub use sensor::nct375::{Limit, LimitRegister, Nct375, SensorCompletion, SensorError, Temperature};
pub use supply::SensorSupply;
