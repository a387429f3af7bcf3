//! Transaction request errors
//!
//! These are raised only at the request boundary. The byte-event handler
//! itself never fails; a misbehaving bus shows up as a stall instead.

/// Errors returned when building or starting a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TwiError {
    /// A transaction is already in flight
    Busy,
    /// Neither bytes to write nor bytes to read were requested
    EmptyTransaction,
    /// Write payload or read length exceeds the transfer buffer
    TransferTooLong,
    /// Target address does not fit in 7 bits
    InvalidAddress,
    /// No engine has been installed in the shared slot
    Uninitialized,
}
