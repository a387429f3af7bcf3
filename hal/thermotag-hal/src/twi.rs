//! Two-wire (I2C-style) bus controller abstraction
//!
//! Unlike a blocking `write`/`read` bus trait, this is the byte-level view
//! of a master peripheral that raises one interrupt per transferred byte.
//! The transaction engine in `thermotag-core` drives it from that
//! interrupt, so every method here must be cheap and non-blocking.
//!
//! Only master mode with manual acknowledge is modelled. Bus errors are not
//! reported by the trait; a peripheral that stops raising events simply
//! leaves the transaction stalled.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 7-bit target address on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Address(u8);

impl Address {
    /// Highest valid 7-bit address
    pub const MAX: u8 = 0x7F;

    /// Create an address, rejecting anything wider than 7 bits
    pub const fn new(raw: u8) -> Option<Self> {
        if raw > Self::MAX {
            None
        } else {
            Some(Self(raw))
        }
    }

    /// The raw 7-bit value (without the R/W bit)
    pub const fn get(self) -> u8 {
        self.0
    }
}

/// Direction of the sequence currently on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferDirection {
    /// Master is transmitting
    Write,
    /// Master is receiving
    Read,
}

/// Snapshot of the controller status register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusStatus {
    /// Direction bit of the current sequence
    pub direction: TransferDirection,
    /// The receive shift register holds a completed byte
    pub buffer_full: bool,
}

impl BusStatus {
    /// Status of a transmitting sequence
    pub const fn writing() -> Self {
        Self {
            direction: TransferDirection::Write,
            buffer_full: false,
        }
    }

    /// Status of a receiving sequence
    pub const fn reading(buffer_full: bool) -> Self {
        Self {
            direction: TransferDirection::Read,
            buffer_full,
        }
    }
}

/// Bus configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BusConfig {
    /// SCL frequency in Hz
    pub frequency: u32,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self::STANDARD
    }
}

impl BusConfig {
    /// Standard mode (100 kHz)
    pub const STANDARD: Self = Self { frequency: 100_000 };

    /// Fast mode (400 kHz)
    pub const FAST: Self = Self { frequency: 400_000 };

    /// Fast mode plus (1 MHz)
    pub const FAST_PLUS: Self = Self {
        frequency: 1_000_000,
    };
}

/// Byte-level two-wire master
///
/// A call to [`start_write`](Self::start_write) or
/// [`start_read`](Self::start_read) sends the address byte; every byte
/// moved afterwards (and the address byte itself) produces one bus event,
/// which the implementation forwards to the transaction engine.
pub trait BusController {
    /// Apply speed/mode settings and enable the event interrupt
    fn configure(&mut self, config: BusConfig);

    /// Return the peripheral to its idle state, dropping any sequence
    fn reset(&mut self);

    /// Generate a (repeated) start and address the target for writing
    fn start_write(&mut self, address: Address);

    /// Generate a (repeated) start and address the target for reading
    fn start_read(&mut self, address: Address);

    /// Acknowledge the current byte and clock in the next one
    fn ack(&mut self);

    /// Flag the next byte as the final one of the sequence
    ///
    /// On a read this makes the controller NACK it; on either direction
    /// the controller issues a stop afterwards.
    fn mark_last_byte(&mut self);

    /// Current status register
    fn status(&self) -> BusStatus;

    /// Byte held in the receive data register
    fn read_data_byte(&mut self) -> u8;

    /// Load the next byte to transmit
    fn write_data_byte(&mut self, byte: u8);
}
