//! Engine shared between foreground and interrupt context
//!
//! The engine lives in a `static` so the bus interrupt handler can reach
//! it. Every access goes through a critical section, which makes starting a
//! transaction and handling a byte event mutually exclusive.
//!
//! ```ignore
//! static TWI: SharedEngine<Rsl10Twi, SensorCompletion> = SharedEngine::new();
//!
//! // boot
//! TWI.install(TransactionEngine::new(bus, BusConfig::STANDARD));
//!
//! // bus interrupt
//! TWI.on_bus_event();
//! ```

use core::cell::RefCell;

use critical_section::Mutex;
use thermotag_hal::gpio::{NoPin, OutputPin};
use thermotag_hal::twi::{BusConfig, BusController};

use super::engine::{EngineSnapshot, StartTransaction, TransactionEngine};
use super::error::TwiError;
use super::transaction::{Completion, Phase, Transaction};

/// Critical-section guarded home for a [`TransactionEngine`]
pub struct SharedEngine<B, C, P = NoPin> {
    inner: Mutex<RefCell<Option<TransactionEngine<B, C, P>>>>,
}

impl<B, C, P> SharedEngine<B, C, P> {
    /// Empty slot, suitable for a `static`
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(None)),
        }
    }
}

impl<B, C, P> Default for SharedEngine<B, C, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: BusController, C: Completion, P: OutputPin> SharedEngine<B, C, P> {
    /// Put an engine in the slot, returning the previous one
    pub fn install(&self, engine: TransactionEngine<B, C, P>) -> Option<TransactionEngine<B, C, P>> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).replace(engine))
    }

    /// Take the engine back out of the slot
    pub fn uninstall(&self) -> Option<TransactionEngine<B, C, P>> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).take())
    }

    /// Run `f` on the engine inside a critical section
    pub fn with<R>(&self, f: impl FnOnce(&mut TransactionEngine<B, C, P>) -> R) -> Result<R, TwiError> {
        critical_section::with(|cs| {
            let mut slot = self.inner.borrow_ref_mut(cs);
            let engine = slot.as_mut().ok_or(TwiError::Uninitialized)?;
            Ok(f(engine))
        })
    }

    /// Begin a transaction
    pub fn start(&self, txn: Transaction<C>) -> Result<(), TwiError> {
        self.with(|engine| engine.start(txn))?
    }

    /// Interrupt entry point; a no-op before an engine is installed
    pub fn on_bus_event(&self) {
        let _ = self.with(TransactionEngine::on_bus_event);
    }

    /// Check if no transaction is in flight (true when uninstalled)
    pub fn is_idle(&self) -> bool {
        self.with(|engine| engine.is_idle()).unwrap_or(true)
    }

    /// Current engine phase
    pub fn phase(&self) -> Phase {
        self.with(|engine| engine.phase()).unwrap_or_default()
    }

    /// Busy flag and event counter
    pub fn snapshot(&self) -> Result<EngineSnapshot, TwiError> {
        self.with(|engine| engine.snapshot())
    }

    /// Abandon a stalled transaction
    pub fn recover(&self) -> Result<bool, TwiError> {
        self.with(TransactionEngine::recover)
    }

    /// Re-apply bus settings between transactions
    pub fn reconfigure(&self, config: BusConfig) -> Result<(), TwiError> {
        self.with(|engine| engine.reconfigure(config))?
    }
}

impl<B: BusController, C: Completion, P: OutputPin> StartTransaction<C> for &SharedEngine<B, C, P> {
    fn start(&mut self, txn: Transaction<C>) -> Result<(), TwiError> {
        SharedEngine::start(*self, txn)
    }

    fn is_idle(&self) -> bool {
        SharedEngine::is_idle(*self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::twi::sim::{pump_shared, SimBus};
    use thermotag_hal::twi::Address;

    type Shared = SharedEngine<SimBus, fn(&[u8])>;

    fn addr() -> Address {
        Address::new(0x48).unwrap()
    }

    fn installed() -> Shared {
        let shared = Shared::new();
        assert!(shared
            .install(TransactionEngine::new(SimBus::new(), BusConfig::STANDARD))
            .is_none());
        shared
    }

    #[test]
    fn test_uninstalled_slot() {
        let shared = Shared::new();
        assert_eq!(
            shared.start(Transaction::read(addr(), 2).unwrap()),
            Err(TwiError::Uninitialized)
        );
        assert!(shared.is_idle());
        assert_eq!(shared.phase(), Phase::Idle);
        assert_eq!(shared.recover(), Err(TwiError::Uninitialized));
        shared.on_bus_event();
    }

    #[test]
    fn test_start_and_pump() {
        let shared = installed();
        shared
            .start(Transaction::write(addr(), &[0x01, 0x00]).unwrap())
            .unwrap();
        assert!(!shared.is_idle());
        assert_eq!(shared.phase(), Phase::Writing);
        assert_eq!(
            shared.start(Transaction::read(addr(), 1).unwrap()),
            Err(TwiError::Busy)
        );

        assert_eq!(pump_shared(&shared), 3);
        assert!(shared.is_idle());
        assert_eq!(
            shared.snapshot(),
            Ok(EngineSnapshot {
                busy: false,
                events: 3
            })
        );
    }

    #[test]
    fn test_start_through_trait_object_ref() {
        fn kick<T: StartTransaction<fn(&[u8])>>(mut twi: T) -> Result<(), TwiError> {
            twi.start(Transaction::read(Address::new(0x48).unwrap(), 2).unwrap())
        }

        let shared = installed();
        assert_eq!(kick(&shared), Ok(()));
        assert!(!StartTransaction::is_idle(&&shared));
        assert_eq!(kick(&shared), Err(TwiError::Busy));
    }

    #[test]
    fn test_reconfigure_and_uninstall() {
        let shared = installed();
        assert_eq!(shared.reconfigure(BusConfig::FAST), Ok(()));
        let engine = shared.uninstall().unwrap();
        assert_eq!(engine.config(), BusConfig::FAST);
        assert_eq!(shared.reconfigure(BusConfig::FAST), Err(TwiError::Uninitialized));
    }
}
