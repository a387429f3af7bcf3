//! Inter-frame timing
//!
//! The temperature sensor needs a minimum gap between a pointer-register
//! write and the read that follows it. This is a device requirement, not a
//! bus one, so it is the caller's job to honour it between two
//! transactions. The gap is a foreground busy-wait: it blocks the caller
//! but lets the bus interrupt run.

use embedded_hal::delay::DelayNs;

/// Spin iterations of the reference inter-frame gap
pub const INTER_FRAME_SPINS: u32 = 1000;

/// The same gap expressed in time, for boards with a calibrated delay
pub const INTER_FRAME_DELAY_US: u32 = 500;

/// Blocking wait between two frames addressed to the same device
pub trait InterFrameDelay {
    /// Block until the gap has elapsed
    fn wait(&mut self);
}

impl<T: InterFrameDelay + ?Sized> InterFrameDelay for &mut T {
    fn wait(&mut self) {
        (**self).wait();
    }
}

/// Fixed-count spin loop
///
/// Its duration scales with the core clock; the default count matches the
/// gap the node was characterised with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpinWait {
    iterations: u32,
}

impl SpinWait {
    /// Spin for a fixed number of iterations
    pub const fn new(iterations: u32) -> Self {
        Self { iterations }
    }

    /// Configured iteration count
    pub const fn iterations(&self) -> u32 {
        self.iterations
    }
}

impl Default for SpinWait {
    fn default() -> Self {
        Self::new(INTER_FRAME_SPINS)
    }
}

impl InterFrameDelay for SpinWait {
    fn wait(&mut self) {
        for _ in 0..self.iterations {
            core::hint::spin_loop();
        }
    }
}

/// Gap backed by an `embedded-hal` delay provider
pub struct HalDelay<D> {
    delay: D,
    micros: u32,
}

impl<D: DelayNs> HalDelay<D> {
    /// Use the reference gap length
    pub fn new(delay: D) -> Self {
        Self::with_micros(delay, INTER_FRAME_DELAY_US)
    }

    /// Use a custom gap length
    pub fn with_micros(delay: D, micros: u32) -> Self {
        Self { delay, micros }
    }

    /// Release the underlying delay provider
    pub fn into_inner(self) -> D {
        self.delay
    }
}

impl<D: DelayNs> InterFrameDelay for HalDelay<D> {
    fn wait(&mut self) {
        self.delay.delay_us(self.micros);
    }
}
