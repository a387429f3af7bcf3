//! NCT375 digital temperature sensor
//!
//! The NCT375 is a two-wire temperature sensor with a 12-bit signed
//! conversion result and programmable alarm limits.
//!
//! # Register Protocol
//!
//! Every access starts by writing the pointer register:
//! - Write: pointer byte followed by the data bytes
//! - Read: pointer byte alone, then a separate read of the register
//!
//! Temperature and limit registers are 16 bits wide, MSB first, holding a
//! 12-bit two's-complement value left-justified (low nibble unused).
//! One count is 0.0625 °C.
//!
//! A split read waits for the pointer write to leave the bus, then for an
//! inter-frame gap, before it starts the read. Both waits run on the
//! caller's [`InterFrameDelay`]; the first is bounded by [`SETTLE_POLLS`].
//!
//! # Results
//!
//! Reads complete in bus interrupt context. The decoded value is published
//! into a caller-owned [`ValueSlot`] captured by the [`SensorCompletion`].

use thermotag_core::twi::{Completion, StartTransaction, Transaction, TwiError};
use thermotag_core::{InterFrameDelay, ValueSlot};
use thermotag_hal::twi::Address;

/// NCT375 register pointers
pub mod reg {
    /// Conversion result (read-only, 2 bytes)
    pub const TEMPERATURE: u8 = 0x00;
    /// Configuration (1 byte)
    pub const CONFIG: u8 = 0x01;
    /// Hysteresis limit (2 bytes)
    pub const THYST: u8 = 0x02;
    /// Overtemperature limit (2 bytes)
    pub const TOS: u8 = 0x03;
    /// One-shot trigger (write any value)
    pub const ONE_SHOT: u8 = 0x04;
}

/// Configuration register bits
pub mod config {
    /// D0: shutdown
    pub const SHUTDOWN: u8 = 0x01;
    /// D5: one-shot mode
    pub const ONE_SHOT: u8 = 0x20;
}

/// Factory address with all address pins low
pub const DEFAULT_ADDRESS: Address = match Address::new(0x48) {
    Some(address) => address,
    None => panic!("invalid default address"),
};

/// Value written to the one-shot register; the device ignores it
const ONE_SHOT_TRIGGER: u8 = 0x01;

/// Gaps to wait for a pointer write to finish before giving up
pub const SETTLE_POLLS: u32 = 256;

/// Smallest 12-bit value (-128 °C)
pub const LIMIT_MIN: i16 = -2048;
/// Largest 12-bit value (127.9375 °C)
pub const LIMIT_MAX: i16 = 2047;

/// Sign-extend a left-justified 12-bit register value
///
/// `{0x7F, 0xF0}` is 2047 counts, `{0xFF, 0xF0}` is -1.
pub fn decode_counts(raw: [u8; 2]) -> i16 {
    let negative = raw[0] & 0x80 != 0;
    let mut value = ((raw[0] as i16) << 4) + ((raw[1] as i16) >> 4);
    if negative {
        value -= 4096;
    }
    value
}

/// Left-justify a 12-bit value into register bytes (MSB first)
pub fn encode_counts(counts: i16) -> Result<[u8; 2], SensorError> {
    if !(LIMIT_MIN..=LIMIT_MAX).contains(&counts) {
        return Err(SensorError::LimitOutOfRange);
    }
    Ok((counts << 4).to_be_bytes())
}

/// Temperature reading in 1/10000 °C
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Temperature {
    ten_thousandths: i32,
}

impl Temperature {
    /// Scale 12-bit counts (truncating)
    pub fn from_counts(counts: i16) -> Self {
        Self {
            ten_thousandths: counts as i32 * 10_000 / 16,
        }
    }

    /// Decode the two temperature register bytes
    pub fn from_register(raw: [u8; 2]) -> Self {
        Self::from_counts(decode_counts(raw))
    }

    /// Temperature in 1/10000 °C
    pub fn ten_thousandths(&self) -> i32 {
        self.ten_thousandths
    }

    /// Temperature in 1/100 °C (truncating)
    pub fn centi_celsius(&self) -> i32 {
        self.ten_thousandths / 100
    }

    /// Temperature in whole °C (truncating)
    pub fn celsius(&self) -> i32 {
        self.ten_thousandths / 10_000
    }
}

/// Alarm limit in 12-bit counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Limit {
    counts: i16,
}

impl Limit {
    /// Limit from raw counts
    pub fn new(counts: i16) -> Result<Self, SensorError> {
        encode_counts(counts).map(|_| Self { counts })
    }

    /// Limit at a whole-degree temperature
    pub fn from_celsius(celsius: i8) -> Self {
        Self {
            counts: celsius as i16 * 16,
        }
    }

    /// Decode the two limit register bytes
    pub fn from_register(raw: [u8; 2]) -> Self {
        Self {
            counts: decode_counts(raw),
        }
    }

    /// 12-bit counts
    pub fn counts(&self) -> i16 {
        self.counts
    }

    /// Left-justified 16-bit register value
    pub fn register_value(&self) -> i16 {
        self.counts * 16
    }
}

/// Which alarm limit register to access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LimitRegister {
    /// THYST
    Hysteresis,
    /// TOS
    Overset,
}

impl LimitRegister {
    /// Register pointer
    pub fn pointer(self) -> u8 {
        match self {
            LimitRegister::Hysteresis => reg::THYST,
            LimitRegister::Overset => reg::TOS,
        }
    }
}

/// NCT375 driver errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorError {
    /// Transaction could not be started
    Bus(TwiError),
    /// Limit does not fit in 12 bits
    LimitOutOfRange,
    /// Previous transaction did not finish within [`SETTLE_POLLS`] gaps
    Timeout,
}

impl From<TwiError> for SensorError {
    fn from(e: TwiError) -> Self {
        SensorError::Bus(e)
    }
}

/// Where a completed read publishes its result
#[derive(Clone, Copy)]
pub enum SensorCompletion {
    Temperature(&'static ValueSlot<Temperature>),
    Limit(&'static ValueSlot<Limit>),
    Register(&'static ValueSlot<u8>),
}

impl Completion for SensorCompletion {
    fn complete(self, received: &[u8]) -> Option<Transaction<Self>> {
        match (self, received) {
            (SensorCompletion::Temperature(slot), &[b0, b1, ..]) => {
                slot.put(Temperature::from_register([b0, b1]));
            }
            (SensorCompletion::Limit(slot), &[b0, b1, ..]) => {
                slot.put(Limit::from_register([b0, b1]));
            }
            (SensorCompletion::Register(slot), &[value, ..]) => {
                slot.put(value);
            }
            _ => warn!("nct375: short read ({=usize} bytes)", received.len()),
        }
        None
    }
}

/// NCT375 driver
///
/// Holds only the device address; every operation borrows the bus engine
/// for the duration of the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Nct375 {
    address: Address,
}

impl Default for Nct375 {
    fn default() -> Self {
        Self::new()
    }
}

impl Nct375 {
    /// Driver for a sensor at the factory address
    pub fn new() -> Self {
        Self {
            address: DEFAULT_ADDRESS,
        }
    }

    /// Driver for a sensor with strapped address pins
    pub fn with_address(raw: u8) -> Result<Self, SensorError> {
        let address = Address::new(raw).ok_or(TwiError::InvalidAddress)?;
        Ok(Self { address })
    }

    /// Device address
    pub fn address(&self) -> Address {
        self.address
    }

    fn write<T>(&self, twi: &mut T, bytes: &[u8]) -> Result<(), SensorError>
    where
        T: StartTransaction<SensorCompletion>,
    {
        twi.start(Transaction::write(self.address, bytes)?)?;
        Ok(())
    }

    /// Wait for the transaction in flight to finish, then one inter-frame gap
    ///
    /// Returns [`SensorError::Timeout`] if the bus is still busy after
    /// [`SETTLE_POLLS`] gaps. The stuck transaction is left in place for the
    /// caller to recover.
    pub fn settle<T, D>(&self, twi: &mut T, delay: &mut D) -> Result<(), SensorError>
    where
        T: StartTransaction<SensorCompletion>,
        D: InterFrameDelay,
    {
        let mut polls = 0;
        while !twi.is_idle() {
            if polls == SETTLE_POLLS {
                warn!("nct375: bus still busy after {=u32} gaps", polls);
                return Err(SensorError::Timeout);
            }
            delay.wait();
            polls += 1;
        }
        delay.wait();
        Ok(())
    }

    /// Point at `pointer`, settle, then read `len` bytes
    fn read_register<T, D>(
        &self,
        twi: &mut T,
        delay: &mut D,
        pointer: u8,
        len: usize,
        completion: SensorCompletion,
    ) -> Result<(), SensorError>
    where
        T: StartTransaction<SensorCompletion>,
        D: InterFrameDelay,
    {
        self.write(twi, &[pointer])?;
        self.settle(twi, delay)?;
        twi.start(Transaction::read(self.address, len)?.with_completion(completion))?;
        Ok(())
    }

    /// Set the shutdown bit
    pub fn power_down<T>(&self, twi: &mut T) -> Result<(), SensorError>
    where
        T: StartTransaction<SensorCompletion>,
    {
        debug!("nct375: power down");
        self.write(twi, &[reg::CONFIG, config::SHUTDOWN])
    }

    /// Clear the configuration register (continuous conversion)
    pub fn power_up<T>(&self, twi: &mut T) -> Result<(), SensorError>
    where
        T: StartTransaction<SensorCompletion>,
    {
        debug!("nct375: power up");
        self.write(twi, &[reg::CONFIG, 0x00])
    }

    /// Enter one-shot mode; conversions then run only on request
    pub fn one_shot_mode_on<T>(&self, twi: &mut T) -> Result<(), SensorError>
    where
        T: StartTransaction<SensorCompletion>,
    {
        debug!("nct375: one-shot mode on");
        self.write(twi, &[reg::CONFIG, config::ONE_SHOT])
    }

    /// Leave one-shot mode
    pub fn one_shot_mode_off<T>(&self, twi: &mut T) -> Result<(), SensorError>
    where
        T: StartTransaction<SensorCompletion>,
    {
        debug!("nct375: one-shot mode off");
        self.write(twi, &[reg::CONFIG, 0x00])
    }

    /// Trigger a single conversion (one-shot mode)
    pub fn start_conversion<T>(&self, twi: &mut T) -> Result<(), SensorError>
    where
        T: StartTransaction<SensorCompletion>,
    {
        self.write(twi, &[reg::ONE_SHOT, ONE_SHOT_TRIGGER])
    }

    /// Read the conversion result into `slot`
    ///
    /// Pointer write, wait for it to finish plus the inter-frame gap, then a
    /// 2-byte read.
    pub fn read_temperature<T, D>(
        &self,
        twi: &mut T,
        delay: &mut D,
        slot: &'static ValueSlot<Temperature>,
    ) -> Result<(), SensorError>
    where
        T: StartTransaction<SensorCompletion>,
        D: InterFrameDelay,
    {
        self.read_register(
            twi,
            delay,
            reg::TEMPERATURE,
            2,
            SensorCompletion::Temperature(slot),
        )
    }

    /// Read the conversion result in a single write-read transaction
    pub fn read_temperature_combined<T>(
        &self,
        twi: &mut T,
        slot: &'static ValueSlot<Temperature>,
    ) -> Result<(), SensorError>
    where
        T: StartTransaction<SensorCompletion>,
    {
        let txn = Transaction::write_read(self.address, &[reg::TEMPERATURE], 2)?
            .with_completion(SensorCompletion::Temperature(slot));
        twi.start(txn)?;
        Ok(())
    }

    /// Read an alarm limit into `slot`
    pub fn read_limit<T, D>(
        &self,
        twi: &mut T,
        which: LimitRegister,
        delay: &mut D,
        slot: &'static ValueSlot<Limit>,
    ) -> Result<(), SensorError>
    where
        T: StartTransaction<SensorCompletion>,
        D: InterFrameDelay,
    {
        self.read_register(twi, delay, which.pointer(), 2, SensorCompletion::Limit(slot))
    }

    /// Program an alarm limit in 12-bit counts
    pub fn write_limit<T>(&self, twi: &mut T, which: LimitRegister, counts: i16) -> Result<(), SensorError>
    where
        T: StartTransaction<SensorCompletion>,
    {
        let [msb, lsb] = encode_counts(counts)?;
        debug!("nct375: write limit {} = {=i16}", which, counts);
        self.write(twi, &[which.pointer(), msb, lsb])
    }

    /// Read the configuration register into `slot`
    pub fn read_config<T, D>(
        &self,
        twi: &mut T,
        delay: &mut D,
        slot: &'static ValueSlot<u8>,
    ) -> Result<(), SensorError>
    where
        T: StartTransaction<SensorCompletion>,
        D: InterFrameDelay,
    {
        self.read_register(twi, delay, reg::CONFIG, 1, SensorCompletion::Register(slot))
    }

    /// Read the one-shot register into `slot`
    pub fn read_one_shot_register<T, D>(
        &self,
        twi: &mut T,
        delay: &mut D,
        slot: &'static ValueSlot<u8>,
    ) -> Result<(), SensorError>
    where
        T: StartTransaction<SensorCompletion>,
        D: InterFrameDelay,
    {
        self.read_register(twi, delay, reg::ONE_SHOT, 1, SensorCompletion::Register(slot))
    }
}
