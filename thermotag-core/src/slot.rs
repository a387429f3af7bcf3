//! Single-value mailbox between interrupt and foreground context
//!
//! A completion running in the bus interrupt writes the decoded value; the
//! foreground reads it whenever it next runs. The slot is owned by whoever
//! declares it (usually a `static`) and lent to the completion as a
//! `&'static` reference.

use core::cell::Cell;

use critical_section::Mutex;

/// Latest-value cell guarded by a critical section
pub struct ValueSlot<T> {
    value: Mutex<Cell<Option<T>>>,
}

impl<T> ValueSlot<T> {
    /// Create an empty slot
    pub const fn new() -> Self {
        Self {
            value: Mutex::new(Cell::new(None)),
        }
    }
}

impl<T> Default for ValueSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy> ValueSlot<T> {
    /// Publish a value, replacing any unread one
    pub fn put(&self, value: T) {
        critical_section::with(|cs| self.value.borrow(cs).set(Some(value)));
    }

    /// Take the value, leaving the slot empty
    pub fn take(&self) -> Option<T> {
        critical_section::with(|cs| self.value.borrow(cs).take())
    }

    /// Read the value without consuming it
    pub fn peek(&self) -> Option<T> {
        critical_section::with(|cs| self.value.borrow(cs).get())
    }

    /// Check whether a value is waiting
    pub fn is_filled(&self) -> bool {
        self.peek().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_slot() {
        let slot: ValueSlot<i32> = ValueSlot::new();
        assert!(!slot.is_filled());
        assert_eq!(slot.take(), None);
    }

    #[test]
    fn test_put_take() {
        let slot = ValueSlot::new();
        slot.put(2500_i32);
        assert_eq!(slot.peek(), Some(2500));
        assert_eq!(slot.take(), Some(2500));
        assert_eq!(slot.take(), None);
    }

    #[test]
    fn test_put_overwrites() {
        static SLOT: ValueSlot<u8> = ValueSlot::new();
        SLOT.put(1);
        SLOT.put(2);
        assert_eq!(SLOT.take(), Some(2));
    }
}
