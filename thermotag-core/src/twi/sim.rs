//! Simulated bus controller for host-side tests
//!
//! [`SimBus`] records every register-level operation the engine performs
//! and models just enough of a controller to drive it: each address or
//! data byte on the wire raises one pending event, which a test delivers
//! with [`SimBus::deliver`] before calling the engine's event handler.
//! [`pump`] and [`pump_shared`] do that in a loop until the engine goes
//! idle or the bus has nothing left to report. [`PumpingDelay`] and
//! [`SteppingDelay`] stand in for the inter-frame gap on a fast and a slow
//! bus respectively.

use heapless::{Deque, Vec};
use thermotag_hal::gpio::OutputPin;
use thermotag_hal::twi::{Address, BusConfig, BusController, BusStatus, TransferDirection};

use crate::timing::InterFrameDelay;

use super::engine::TransactionEngine;
use super::shared::SharedEngine;
use super::transaction::Completion;

const OP_LOG_LEN: usize = 256;
const RESPONSE_LEN: usize = 32;

/// Operation recorded by [`SimBus`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusOp {
    Configure(BusConfig),
    Reset,
    StartWrite(u8),
    StartRead(u8),
    Ack,
    MarkLast,
    Write(u8),
    Read(u8),
    /// Inserted by [`PumpingDelay`] when a caller waits between frames
    InterFrameDelay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    AddressSent,
    ByteSent,
    ByteReceived,
}

/// Recording bus controller
#[derive(Debug)]
pub struct SimBus {
    direction: TransferDirection,
    buffer_full: bool,
    data: u8,
    pending: Option<Pending>,
    responses: Deque<u8, RESPONSE_LEN>,
    ops: Vec<BusOp, OP_LOG_LEN>,
    stalled: bool,
    data_bytes: usize,
    status_override: Option<BusStatus>,
}

impl Default for SimBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SimBus {
    pub fn new() -> Self {
        Self {
            direction: TransferDirection::Write,
            buffer_full: false,
            data: 0,
            pending: None,
            responses: Deque::new(),
            ops: Vec::new(),
            stalled: false,
            data_bytes: 0,
            status_override: None,
        }
    }

    /// Queue bytes the target will return on reads; 0xFF once exhausted
    pub fn respond_with(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            let _ = self.responses.push_back(byte);
        }
    }

    /// Stop (or resume) raising bus events
    pub fn set_stalled(&mut self, stalled: bool) {
        self.stalled = stalled;
    }

    /// Report a fixed status regardless of bus state
    pub fn force_status(&mut self, status: Option<BusStatus>) {
        self.status_override = status;
    }

    /// Operations recorded so far (oldest first)
    pub fn ops(&self) -> &[BusOp] {
        &self.ops
    }

    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    /// Data bytes that completed on the wire, address bytes excluded
    pub fn data_bytes_moved(&self) -> usize {
        self.data_bytes
    }

    /// Record an operation that did not come from the engine
    pub fn note(&mut self, op: BusOp) {
        // Log is best effort once full
        let _ = self.ops.push(op);
    }

    /// Check if a byte is waiting to be reported
    pub fn has_pending(&self) -> bool {
        self.pending.is_some() && !self.stalled
    }

    /// Finish the byte in flight; false if there is none (or the bus is stalled)
    pub fn deliver(&mut self) -> bool {
        if self.stalled {
            return false;
        }
        match self.pending.take() {
            None => false,
            Some(Pending::AddressSent) => true,
            Some(Pending::ByteSent) => {
                self.data_bytes += 1;
                true
            }
            Some(Pending::ByteReceived) => {
                self.data = self.responses.pop_front().unwrap_or(0xFF);
                self.buffer_full = true;
                self.data_bytes += 1;
                true
            }
        }
    }
}

impl BusController for SimBus {
    fn configure(&mut self, config: BusConfig) {
        self.note(BusOp::Configure(config));
    }

    fn reset(&mut self) {
        self.note(BusOp::Reset);
        self.direction = TransferDirection::Write;
        self.buffer_full = false;
        self.pending = None;
    }

    fn start_write(&mut self, address: Address) {
        self.note(BusOp::StartWrite(address.get()));
        self.direction = TransferDirection::Write;
        self.buffer_full = false;
        self.pending = Some(Pending::AddressSent);
    }

    fn start_read(&mut self, address: Address) {
        self.note(BusOp::StartRead(address.get()));
        self.direction = TransferDirection::Read;
        self.buffer_full = false;
        self.pending = Some(Pending::AddressSent);
    }

    fn ack(&mut self) {
        self.note(BusOp::Ack);
        if self.direction == TransferDirection::Read {
            self.pending = Some(Pending::ByteReceived);
        }
    }

    fn mark_last_byte(&mut self) {
        self.note(BusOp::MarkLast);
    }

    fn status(&self) -> BusStatus {
        self.status_override.unwrap_or(match self.direction {
            TransferDirection::Write => BusStatus::writing(),
            TransferDirection::Read => BusStatus::reading(self.buffer_full),
        })
    }

    fn read_data_byte(&mut self) -> u8 {
        self.note(BusOp::Read(self.data));
        self.buffer_full = false;
        self.data
    }

    fn write_data_byte(&mut self, byte: u8) {
        self.note(BusOp::Write(byte));
        self.pending = Some(Pending::ByteSent);
    }
}

/// Deliver bus events to a bare engine until it idles or the bus goes quiet
///
/// Returns the number of events delivered.
pub fn pump<C: Completion, P: OutputPin>(engine: &mut TransactionEngine<SimBus, C, P>) -> usize {
    let mut events = 0;
    while !engine.is_idle() && engine.bus_mut().deliver() {
        engine.on_bus_event();
        events += 1;
    }
    events
}

/// Like [`pump`], for an engine in a [`SharedEngine`]
///
/// Each event is handled in its own critical section, the way a real
/// interrupt would be.
pub fn pump_shared<C: Completion, P: OutputPin>(shared: &SharedEngine<SimBus, C, P>) -> usize {
    let mut events = 0;
    while shared
        .with(|engine| !engine.is_idle() && engine.bus_mut().deliver())
        .unwrap_or(false)
    {
        shared.on_bus_event();
        events += 1;
    }
    events
}

/// Inter-frame delay that lets the simulated bus make progress
///
/// Drains pending bus events (as the interrupt would during a real wait),
/// then records [`BusOp::InterFrameDelay`].
pub struct PumpingDelay<'a, C, P = thermotag_hal::gpio::NoPin> {
    engine: &'a SharedEngine<SimBus, C, P>,
    waits: u32,
}

impl<'a, C: Completion, P: OutputPin> PumpingDelay<'a, C, P> {
    pub fn new(engine: &'a SharedEngine<SimBus, C, P>) -> Self {
        Self { engine, waits: 0 }
    }

    /// Number of completed waits
    pub fn waits(&self) -> u32 {
        self.waits
    }
}

impl<C: Completion, P: OutputPin> InterFrameDelay for PumpingDelay<'_, C, P> {
    fn wait(&mut self) {
        pump_shared(self.engine);
        let _ = self
            .engine
            .with(|engine| engine.bus_mut().note(BusOp::InterFrameDelay));
        self.waits += 1;
    }
}

/// Inter-frame delay on a bus slower than the gap
///
/// Each wait lets exactly one pending bus event through, so a multi-byte
/// transaction spans several gaps.
pub struct SteppingDelay<'a, C, P = thermotag_hal::gpio::NoPin> {
    engine: &'a SharedEngine<SimBus, C, P>,
    waits: u32,
}

impl<'a, C: Completion, P: OutputPin> SteppingDelay<'a, C, P> {
    pub fn new(engine: &'a SharedEngine<SimBus, C, P>) -> Self {
        Self { engine, waits: 0 }
    }

    /// Number of completed waits
    pub fn waits(&self) -> u32 {
        self.waits
    }
}

impl<C: Completion, P: OutputPin> InterFrameDelay for SteppingDelay<'_, C, P> {
    fn wait(&mut self) {
        let delivered = self
            .engine
            .with(|engine| !engine.is_idle() && engine.bus_mut().deliver())
            .unwrap_or(false);
        if delivered {
            self.engine.on_bus_event();
        }
        self.waits += 1;
    }
}
