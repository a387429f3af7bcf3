//! Interrupt-driven transaction engine
//!
//! The engine never blocks. [`TransactionEngine::start`] addresses the
//! target and returns; every later step happens in
//! [`TransactionEngine::on_bus_event`], which the bus interrupt calls once
//! per byte moved on the wire (the address byte included).
//!
//! # Event handling
//!
//! | Phase   | Condition                | Action                                         |
//! |---------|--------------------------|------------------------------------------------|
//! | Writing | bytes left               | send next byte, mark last if it was the last   |
//! | Writing | just drained (once)      | start read if requested, else complete         |
//! | Reading | buffer not yet primed    | ack, mark last if one byte is expected         |
//! | Reading | more than one byte left  | ack, store byte, mark last if one is left      |
//! | Reading | one byte left            | store byte, complete                           |
//!
//! Write handling wins whenever the controller reports the write direction
//! or the write phase has not drained yet, so a write-then-read never
//! touches the read buffer early.
//!
//! # Limitations
//!
//! There is no bus-error detection, timeout or retry in here. A target that
//! stops acknowledging leaves the transaction stalled; see
//! [`StallMonitor`](super::watchdog::StallMonitor) for foreground
//! supervision and [`TransactionEngine::recover`] for the way out.

use thermotag_hal::gpio::{NoPin, OutputPin};
use thermotag_hal::twi::{BusConfig, BusController, TransferDirection};

use super::error::TwiError;
use super::transaction::{Completion, Phase, Transaction};

/// Anything that can accept a transaction request
///
/// Implemented by the bare engine and by a reference to the
/// [`SharedEngine`](super::shared::SharedEngine), so protocol code does not
/// care which one it is handed.
pub trait StartTransaction<C: Completion> {
    /// Begin a transaction; fails with [`TwiError::Busy`] if one is in flight
    fn start(&mut self, txn: Transaction<C>) -> Result<(), TwiError>;

    /// Check if no transaction is in flight
    fn is_idle(&self) -> bool;
}

/// Progress counters sampled by the foreground
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EngineSnapshot {
    /// A transaction is in flight
    pub busy: bool,
    /// Bus events handled since the engine was created (wrapping)
    pub events: u32,
}

/// Outcome of one event for the active transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Continue,
    Finished,
}

/// Single-slot two-wire transaction engine
///
/// `P` is an optional probe pin toggled on every bus event, handy for
/// lining up interrupt activity with a logic analyzer trace.
pub struct TransactionEngine<B, C, P = NoPin> {
    bus: B,
    probe: P,
    config: BusConfig,
    active: Option<Transaction<C>>,
    events: u32,
}

impl<B: BusController, C: Completion> TransactionEngine<B, C, NoPin> {
    /// Take ownership of the controller and configure it
    pub fn new(bus: B, config: BusConfig) -> Self {
        Self::with_probe(bus, config, NoPin)
    }
}

impl<B: BusController, C: Completion, P: OutputPin> TransactionEngine<B, C, P> {
    /// Like [`new`](TransactionEngine::new), with a debug probe pin
    pub fn with_probe(mut bus: B, config: BusConfig, mut probe: P) -> Self {
        bus.configure(config);
        probe.set_low();
        Self {
            bus,
            probe,
            config,
            active: None,
            events: 0,
        }
    }

    /// Re-apply bus settings between transactions
    pub fn reconfigure(&mut self, config: BusConfig) -> Result<(), TwiError> {
        if self.active.is_some() {
            return Err(TwiError::Busy);
        }
        self.config = config;
        self.bus.configure(config);
        Ok(())
    }

    /// Begin a transaction
    ///
    /// Resets the controller and addresses the target for writing, or for
    /// reading when there is nothing to write. Returns immediately.
    pub fn start(&mut self, txn: Transaction<C>) -> Result<(), TwiError> {
        if self.active.is_some() {
            return Err(TwiError::Busy);
        }
        self.launch(txn);
        Ok(())
    }

    fn launch(&mut self, mut txn: Transaction<C>) {
        let address = txn.address();
        trace!(
            "twi: start addr={=u8:#x} write={=usize} read={=usize}",
            address.get(),
            txn.write_remaining(),
            txn.read_remaining()
        );

        self.bus.reset();
        if txn.write_remaining() > 0 {
            txn.set_phase(Phase::Writing);
            self.active = Some(txn);
            self.bus.start_write(address);
        } else {
            txn.drain_write();
            txn.set_phase(Phase::Reading);
            self.active = Some(txn);
            self.bus.start_read(address);
        }
    }

    /// Advance the active transaction by one byte
    ///
    /// Call from the bus interrupt, once per event. Events with no
    /// transaction in flight are counted and otherwise ignored.
    pub fn on_bus_event(&mut self) {
        self.probe.toggle();
        self.events = self.events.wrapping_add(1);

        let status = self.bus.status();
        let Some(txn) = self.active.as_mut() else {
            return;
        };

        let step = if status.direction == TransferDirection::Write || !txn.is_write_drained() {
            Self::write_step(&mut self.bus, txn)
        } else {
            Self::read_step(&mut self.bus, txn, status.buffer_full)
        };

        if step == Step::Finished {
            self.finish();
        }
    }

    fn write_step(bus: &mut B, txn: &mut Transaction<C>) -> Step {
        if let Some(byte) = txn.next_outbound() {
            bus.write_data_byte(byte);
            if txn.write_remaining() == 0 {
                bus.mark_last_byte();
            }
            return Step::Continue;
        }

        if !txn.drain_write() {
            // Stray write-direction event after the write phase ended
            return Step::Continue;
        }

        if txn.read_remaining() > 0 {
            txn.set_phase(Phase::Reading);
            bus.start_read(txn.address());
            Step::Continue
        } else {
            Step::Finished
        }
    }

    fn read_step(bus: &mut B, txn: &mut Transaction<C>, buffer_full: bool) -> Step {
        let remaining = txn.read_remaining();

        if !buffer_full {
            // Address accepted; clock in the first byte
            bus.ack();
            if remaining == 1 {
                bus.mark_last_byte();
            }
            Step::Continue
        } else if remaining > 1 {
            bus.ack();
            txn.store_inbound(bus.read_data_byte());
            if txn.read_remaining() == 1 {
                bus.mark_last_byte();
            }
            Step::Continue
        } else if remaining == 1 {
            txn.store_inbound(bus.read_data_byte());
            Step::Finished
        } else {
            Step::Continue
        }
    }

    /// Retire the active transaction and run its completion
    ///
    /// The slot is emptied before the completion runs, so the completion
    /// can never observe or re-enter its own transaction, and a chained
    /// follow-up starts on an idle engine.
    fn finish(&mut self) {
        let Some(mut txn) = self.active.take() else {
            return;
        };
        txn.set_phase(Phase::Complete);

        if let Some(completion) = txn.take_completion() {
            if let Some(next) = completion.complete(txn.received()) {
                self.launch(next);
            }
        }
    }

    /// Abandon a stalled transaction
    ///
    /// Resets and reconfigures the controller. The dropped transaction's
    /// completion is not run. Returns whether anything was dropped.
    pub fn recover(&mut self) -> bool {
        let dropped = self.active.take();
        self.bus.reset();
        self.bus.configure(self.config);

        if let Some(txn) = &dropped {
            warn!(
                "twi: dropped stalled transaction addr={=u8:#x} phase={}",
                txn.address().get(),
                txn.phase()
            );
        }
        dropped.is_some()
    }

    /// Current phase of the engine
    pub fn phase(&self) -> Phase {
        self.active.as_ref().map_or(Phase::Idle, Transaction::phase)
    }

    /// Check if no transaction is in flight
    pub fn is_idle(&self) -> bool {
        self.active.is_none()
    }

    /// The in-flight transaction, if any
    pub fn active(&self) -> Option<&Transaction<C>> {
        self.active.as_ref()
    }

    /// Bus events handled so far (wrapping)
    pub fn event_count(&self) -> u32 {
        self.events
    }

    /// Busy flag and event counter in one read
    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            busy: self.active.is_some(),
            events: self.events,
        }
    }

    /// Active bus settings
    pub fn config(&self) -> BusConfig {
        self.config
    }

    /// Shared access to the controller
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Exclusive access to the controller
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// The debug probe pin
    pub fn probe(&self) -> &P {
        &self.probe
    }

    /// Release the controller and probe pin
    pub fn release(self) -> (B, P) {
        (self.bus, self.probe)
    }
}

impl<B: BusController, C: Completion, P: OutputPin> StartTransaction<C>
    for TransactionEngine<B, C, P>
{
    fn start(&mut self, txn: Transaction<C>) -> Result<(), TwiError> {
        TransactionEngine::start(self, txn)
    }

    fn is_idle(&self) -> bool {
        TransactionEngine::is_idle(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::twi::sim::{pump, BusOp, SimBus};
    use crate::twi::transaction::MAX_TRANSFER_LEN;
    use core::cell::Cell;
    use proptest::prelude::*;
    use thermotag_hal::twi::{Address, BusStatus};

    std::thread_local! {
        static LAST_RECEIVED: Cell<Option<[u8; 4]>> = const { Cell::new(None) };
        static CALLS: Cell<u32> = const { Cell::new(0) };
    }

    /// Test completion: records what it saw, optionally chains a read
    #[derive(Debug)]
    enum Probe {
        Record,
        ChainRead(u8, usize),
    }

    impl Completion for Probe {
        fn complete(self, received: &[u8]) -> Option<Transaction<Self>> {
            CALLS.with(|c| c.set(c.get() + 1));
            let mut copy = [0u8; 4];
            let n = received.len().min(4);
            copy[..n].copy_from_slice(&received[..n]);
            LAST_RECEIVED.with(|r| r.set(Some(copy)));

            match self {
                Probe::Record => None,
                Probe::ChainRead(addr, len) => Some(
                    Transaction::read(Address::new(addr).unwrap(), len)
                        .unwrap()
                        .with_completion(Probe::Record),
                ),
            }
        }
    }

    fn reset_probe() {
        CALLS.with(|c| c.set(0));
        LAST_RECEIVED.with(|r| r.set(None));
    }

    fn calls() -> u32 {
        CALLS.with(Cell::get)
    }

    fn last_received() -> Option<[u8; 4]> {
        LAST_RECEIVED.with(Cell::get)
    }

    fn engine() -> TransactionEngine<SimBus, Probe> {
        TransactionEngine::new(SimBus::new(), BusConfig::STANDARD)
    }

    fn addr() -> Address {
        Address::new(0x48).unwrap()
    }

    #[test]
    fn test_new_configures_bus() {
        let eng = engine();
        assert_eq!(eng.bus().ops(), &[BusOp::Configure(BusConfig::STANDARD)]);
        assert!(eng.is_idle());
        assert_eq!(eng.phase(), Phase::Idle);
    }

    #[test]
    fn test_write_only_sequence() {
        reset_probe();
        let mut eng = engine();
        eng.bus_mut().clear_ops();

        let txn = Transaction::write(addr(), &[0x01, 0x20])
            .unwrap()
            .with_completion(Probe::Record);
        eng.start(txn).unwrap();
        assert_eq!(eng.phase(), Phase::Writing);

        pump(&mut eng);

        assert!(eng.is_idle());
        assert_eq!(calls(), 1);
        assert_eq!(
            eng.bus().ops(),
            &[
                BusOp::Reset,
                BusOp::StartWrite(0x48),
                BusOp::Write(0x01),
                BusOp::Write(0x20),
                BusOp::MarkLast,
            ]
        );
    }

    #[test]
    fn test_read_only_sequence() {
        reset_probe();
        let mut eng = engine();
        eng.bus_mut().clear_ops();
        eng.bus_mut().respond_with(&[0x19, 0x00]);

        let txn = Transaction::read(addr(), 2)
            .unwrap()
            .with_completion(Probe::Record);
        eng.start(txn).unwrap();
        assert_eq!(eng.phase(), Phase::Reading);

        pump(&mut eng);

        assert!(eng.is_idle());
        assert_eq!(calls(), 1);
        assert_eq!(last_received(), Some([0x19, 0x00, 0, 0]));
        assert_eq!(
            eng.bus().ops(),
            &[
                BusOp::Reset,
                BusOp::StartRead(0x48),
                BusOp::Ack,
                BusOp::Ack,
                BusOp::Read(0x19),
                BusOp::MarkLast,
                BusOp::Read(0x00),
            ]
        );
    }

    #[test]
    fn test_single_byte_read_marks_last_on_prime() {
        reset_probe();
        let mut eng = engine();
        eng.bus_mut().clear_ops();
        eng.bus_mut().respond_with(&[0x20]);

        eng.start(
            Transaction::read(addr(), 1)
                .unwrap()
                .with_completion(Probe::Record),
        )
        .unwrap();
        pump(&mut eng);

        assert_eq!(last_received(), Some([0x20, 0, 0, 0]));
        assert_eq!(
            eng.bus().ops(),
            &[
                BusOp::Reset,
                BusOp::StartRead(0x48),
                BusOp::Ack,
                BusOp::MarkLast,
                BusOp::Read(0x20),
            ]
        );
    }

    #[test]
    fn test_write_then_read_uses_repeated_start() {
        reset_probe();
        let mut eng = engine();
        eng.bus_mut().clear_ops();
        eng.bus_mut().respond_with(&[0xE7, 0x00]);

        eng.start(
            Transaction::write_read(addr(), &[0x00], 2)
                .unwrap()
                .with_completion(Probe::Record),
        )
        .unwrap();
        pump(&mut eng);

        assert_eq!(calls(), 1);
        assert_eq!(last_received(), Some([0xE7, 0x00, 0, 0]));

        let ops = eng.bus().ops();
        let start_read = ops.iter().position(|op| *op == BusOp::StartRead(0x48));
        let last_write = ops.iter().rposition(|op| matches!(op, BusOp::Write(_)));
        assert!(last_write.unwrap() < start_read.unwrap());
    }

    #[test]
    fn test_start_while_busy_is_rejected() {
        reset_probe();
        let mut eng = engine();
        eng.start(Transaction::write(addr(), &[0x00]).unwrap()).unwrap();

        let second = Transaction::read(addr(), 2).unwrap();
        assert_eq!(eng.start(second), Err(TwiError::Busy));
        assert_eq!(eng.phase(), Phase::Writing);

        pump(&mut eng);
        assert!(eng.is_idle());
        assert!(eng.start(Transaction::read(addr(), 2).unwrap()).is_ok());
    }

    #[test]
    fn test_no_completion_still_returns_to_idle() {
        reset_probe();
        let mut eng = engine();
        eng.start(Transaction::write(addr(), &[0x04, 0x01]).unwrap())
            .unwrap();
        pump(&mut eng);
        assert!(eng.is_idle());
        assert_eq!(calls(), 0);
    }

    #[test]
    fn test_completion_chains_next_transaction() {
        reset_probe();
        let mut eng = engine();
        eng.bus_mut().respond_with(&[0x7F, 0xF0]);

        eng.start(
            Transaction::write(addr(), &[0x02])
                .unwrap()
                .with_completion(Probe::ChainRead(0x48, 2)),
        )
        .unwrap();
        pump(&mut eng);

        // Pointer write completion, then the chained read's completion
        assert_eq!(calls(), 2);
        assert_eq!(last_received(), Some([0x7F, 0xF0, 0, 0]));
        assert!(eng.is_idle());
        let resets = eng
            .bus()
            .ops()
            .iter()
            .filter(|op| **op == BusOp::Reset)
            .count();
        assert_eq!(resets, 2);
    }

    #[test]
    fn test_write_priority_over_read_status() {
        reset_probe();
        let mut eng = engine();
        eng.bus_mut().clear_ops();
        // Controller misreports the direction during the write phase
        eng.bus_mut().force_status(Some(BusStatus::reading(true)));

        eng.start(Transaction::write_read(addr(), &[0x03, 0x00], 2).unwrap())
            .unwrap();
        assert!(eng.bus_mut().deliver());
        eng.on_bus_event();
        assert!(eng.bus_mut().deliver());
        eng.on_bus_event();

        assert_eq!(eng.active().unwrap().write_remaining(), 0);
        assert!(eng.active().unwrap().received().is_empty());
        assert!(!eng.bus().ops().contains(&BusOp::Ack));
    }

    #[test]
    fn test_stray_event_when_idle_is_ignored() {
        let mut eng = engine();
        eng.on_bus_event();
        assert!(eng.is_idle());
        assert_eq!(eng.event_count(), 1);
    }

    #[test]
    fn test_recover_drops_without_completion() {
        reset_probe();
        let mut eng = engine();
        eng.bus_mut().set_stalled(true);
        eng.start(
            Transaction::write(addr(), &[0x00])
                .unwrap()
                .with_completion(Probe::Record),
        )
        .unwrap();
        pump(&mut eng);
        assert!(!eng.is_idle());

        assert!(eng.recover());
        assert!(eng.is_idle());
        assert_eq!(calls(), 0);
        assert!(!eng.recover());
    }

    #[test]
    fn test_reconfigure_requires_idle() {
        let mut eng = engine();
        eng.start(Transaction::write(addr(), &[0x00]).unwrap()).unwrap();
        assert_eq!(eng.reconfigure(BusConfig::FAST), Err(TwiError::Busy));
        pump(&mut eng);
        assert_eq!(eng.reconfigure(BusConfig::FAST), Ok(()));
        assert_eq!(eng.config(), BusConfig::FAST);
        assert_eq!(eng.bus().ops().last(), Some(&BusOp::Configure(BusConfig::FAST)));
    }

    #[test]
    fn test_probe_toggles_per_event() {
        struct Counter(bool, u32);
        impl OutputPin for Counter {
            fn set_high(&mut self) {
                self.0 = true;
                self.1 += 1;
            }
            fn set_low(&mut self) {
                self.0 = false;
                self.1 += 1;
            }
            fn is_set_high(&self) -> bool {
                self.0
            }
        }

        let mut eng: TransactionEngine<SimBus, Probe, Counter> =
            TransactionEngine::with_probe(SimBus::new(), BusConfig::STANDARD, Counter(true, 0));
        assert!(!eng.probe().is_set_high());

        eng.start(Transaction::write(addr(), &[0x01, 0x00]).unwrap())
            .unwrap();
        let events = pump(&mut eng);

        // One edge for the initial set_low, then one per event
        assert_eq!(eng.probe().1, 1 + events as u32);
    }

    proptest! {
        #[test]
        fn prop_data_bytes_match_request(
            write in proptest::collection::vec(any::<u8>(), 0..=MAX_TRANSFER_LEN),
            read_len in 0..=MAX_TRANSFER_LEN,
            response in proptest::collection::vec(any::<u8>(), MAX_TRANSFER_LEN),
        ) {
            prop_assume!(!write.is_empty() || read_len > 0);
            reset_probe();

            let mut eng = engine();
            eng.bus_mut().respond_with(&response);
            eng.start(
                Transaction::write_read(addr(), &write, read_len)
                    .unwrap()
                    .with_completion(Probe::Record),
            )
            .unwrap();

            let events = pump(&mut eng);
            let sequences = usize::from(!write.is_empty()) + usize::from(read_len > 0);

            prop_assert!(eng.is_idle());
            prop_assert_eq!(calls(), 1);
            prop_assert_eq!(eng.bus().data_bytes_moved(), write.len() + read_len);
            prop_assert_eq!(events, write.len() + read_len + sequences);

            // Every write precedes every read
            let ops = eng.bus().ops();
            let last_write = ops.iter().rposition(|op| matches!(op, BusOp::Write(_)));
            let first_read = ops.iter().position(|op| matches!(op, BusOp::Read(_)));
            if let (Some(w), Some(r)) = (last_write, first_read) {
                prop_assert!(w < r);
            }

            let written: std::vec::Vec<u8> = ops
                .iter()
                .filter_map(|op| match op {
                    BusOp::Write(b) => Some(*b),
                    _ => None,
                })
                .collect();
            prop_assert_eq!(written, write);
        }
    }
}
