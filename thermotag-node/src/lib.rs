//! Sensor node application layer
//!
//! Ties the bus engine, the NCT375 driver and the sensor supply into the
//! node's wake cycle. Board bring-up (clocks, the bus interrupt vector,
//! sleep timer) lives in the board crate, which calls [`Node::boot`] once
//! and [`Node::on_wake`] on every timer wake-up.

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

mod fmt;

pub mod config;
pub mod node;

pub use config::{NodeConfig, SampleMode};
pub use node::{Node, NodeError, WakeAction};
