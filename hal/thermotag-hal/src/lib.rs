//! thermotag Hardware Abstraction Layer
//!
//! This crate defines the hardware capabilities the sensor node logic is
//! written against. A chip-specific crate implements them with register
//! pokes; the core crates only ever see these traits.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  thermotag-node (wake cycle)            │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  thermotag-drivers (NCT375 protocol)    │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  thermotag-core (transaction engine)    │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  thermotag-hal (this crate - traits)    │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Traits
//!
//! - [`twi::BusController`] - Byte-level two-wire master peripheral
//! - [`gpio::OutputPin`] - Digital output (sensor supply, debug probe)

#![no_std]
#![deny(unsafe_code)]

pub mod gpio;
pub mod twi;

// Re-export key traits at crate root for convenience
pub use gpio::OutputPin;
pub use twi::{Address, BusConfig, BusController, BusStatus, TransferDirection};
