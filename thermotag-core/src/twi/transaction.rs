//! Transaction descriptor
//!
//! A descriptor owns its outbound payload and its inbound buffer, so two
//! unrelated operations can never alias each other's bytes. It moves into
//! the engine on start and moves out again when it completes.

use heapless::Vec;
use thermotag_hal::twi::Address;

use super::error::TwiError;

/// Largest write payload or read length of a single transaction
pub const MAX_TRANSFER_LEN: usize = 8;

/// Transaction lifecycle
///
/// ```text
/// Idle ──start──► Writing ──write drained──► Reading ──last byte──► Complete ──► Idle
///          │                    │                                     ▲
///          └──(read only)───────┼──────────► Reading                  │
///                               └──(no read)──────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// No transaction in flight
    #[default]
    Idle,
    /// Sending the write payload
    Writing,
    /// Receiving the read payload
    Reading,
    /// Last byte handled, completion running
    Complete,
}

impl Phase {
    /// Check if a transaction occupies the engine in this phase
    pub fn is_active(&self) -> bool {
        matches!(self, Phase::Writing | Phase::Reading)
    }
}

/// Work to run once a transaction has moved its last byte
///
/// Runs in bus interrupt context, exactly once per successful transaction
/// and never for one that stalls. Consuming `self` makes a second
/// invocation impossible. Returning a transaction chains it: the engine
/// starts it right after this one is retired.
pub trait Completion: Sized {
    /// Handle the received bytes (empty for write-only transactions)
    fn complete(self, received: &[u8]) -> Option<Transaction<Self>>;
}

impl Completion for fn(&[u8]) {
    fn complete(self, received: &[u8]) -> Option<Transaction<Self>> {
        self(received);
        None
    }
}

/// A single write, read, or write-then-read exchange with one target
#[derive(Debug)]
pub struct Transaction<C> {
    address: Address,
    outbound: Vec<u8, MAX_TRANSFER_LEN>,
    sent: usize,
    inbound: Vec<u8, MAX_TRANSFER_LEN>,
    read_len: usize,
    write_drained: bool,
    completion: Option<C>,
    phase: Phase,
}

impl<C> Transaction<C> {
    /// Write-only transaction
    pub fn write(address: Address, bytes: &[u8]) -> Result<Self, TwiError> {
        Self::write_read(address, bytes, 0)
    }

    /// Read-only transaction of `len` bytes
    pub fn read(address: Address, len: usize) -> Result<Self, TwiError> {
        Self::write_read(address, &[], len)
    }

    /// Write `bytes`, then issue a repeated start and read `read_len` bytes
    pub fn write_read(address: Address, bytes: &[u8], read_len: usize) -> Result<Self, TwiError> {
        if bytes.is_empty() && read_len == 0 {
            return Err(TwiError::EmptyTransaction);
        }
        if read_len > MAX_TRANSFER_LEN {
            return Err(TwiError::TransferTooLong);
        }
        let outbound = Vec::from_slice(bytes).map_err(|_| TwiError::TransferTooLong)?;

        Ok(Self {
            address,
            outbound,
            sent: 0,
            inbound: Vec::new(),
            read_len,
            write_drained: false,
            completion: None,
            phase: Phase::Idle,
        })
    }

    /// Attach the work to run when the transaction completes
    pub fn with_completion(mut self, completion: C) -> Self {
        self.completion = Some(completion);
        self
    }

    /// Target address
    pub fn address(&self) -> Address {
        self.address
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Full outbound payload
    pub fn payload(&self) -> &[u8] {
        &self.outbound
    }

    /// Bytes received so far
    pub fn received(&self) -> &[u8] {
        &self.inbound
    }

    /// Requested read length
    pub fn read_len(&self) -> usize {
        self.read_len
    }

    /// Bytes still to be sent
    pub fn write_remaining(&self) -> usize {
        self.outbound.len() - self.sent
    }

    /// Bytes still to be received
    pub fn read_remaining(&self) -> usize {
        self.read_len - self.inbound.len()
    }

    /// Check if a completion is attached
    pub fn has_completion(&self) -> bool {
        self.completion.is_some()
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub(crate) fn is_write_drained(&self) -> bool {
        self.write_drained
    }

    /// Latch the end of the write phase; true only the first time
    pub(crate) fn drain_write(&mut self) -> bool {
        !core::mem::replace(&mut self.write_drained, true)
    }

    pub(crate) fn next_outbound(&mut self) -> Option<u8> {
        let byte = self.outbound.get(self.sent).copied()?;
        self.sent += 1;
        Some(byte)
    }

    pub(crate) fn store_inbound(&mut self, byte: u8) {
        if self.inbound.len() < self.read_len {
            // Capacity is checked at construction
            let _ = self.inbound.push(byte);
        }
    }

    pub(crate) fn take_completion(&mut self) -> Option<C> {
        self.completion.take()
    }
}
