//! Node configuration
//!
//! Compiled-in defaults match the reference board: sensor at its factory
//! address on a 100 kHz bus, sampled in one-shot mode.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use thermotag_core::timing::INTER_FRAME_SPINS;
use thermotag_core::twi::DEFAULT_STALL_TIMEOUT_MS;
use thermotag_core::SpinWait;
use thermotag_drivers::sensor::nct375::DEFAULT_ADDRESS;
use thermotag_drivers::{Nct375, SensorError};
use thermotag_hal::twi::BusConfig;

/// How the sensor is sampled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SampleMode {
    /// Trigger a conversion on one wake, read it on the next
    #[default]
    OneShot,
    /// Sensor converts continuously; read every wake
    Continuous,
}

/// Node configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NodeConfig {
    /// Sampling strategy
    pub sample_mode: SampleMode,
    /// Bus settings re-applied on every wake
    pub bus: BusConfig,
    /// Sensor 7-bit address
    pub sensor_address: u8,
    /// Spin count of the inter-frame gap
    pub inter_frame_spins: u32,
    /// Time a busy bus may go without progress (ms)
    pub stall_timeout_ms: u32,
    /// Drop a stalled transaction instead of waiting on it forever
    pub recover_stalled: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            sample_mode: SampleMode::OneShot,
            bus: BusConfig::STANDARD,
            sensor_address: DEFAULT_ADDRESS.get(),
            inter_frame_spins: INTER_FRAME_SPINS,
            stall_timeout_ms: DEFAULT_STALL_TIMEOUT_MS,
            recover_stalled: true,
        }
    }
}

impl NodeConfig {
    /// Sensor driver at the configured address
    pub fn sensor(&self) -> Result<Nct375, SensorError> {
        Nct375::with_address(self.sensor_address)
    }

    /// Spin-loop inter-frame gap of the configured length
    pub fn spin_wait(&self) -> SpinWait {
        SpinWait::new(self.inter_frame_spins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thermotag_core::twi::TwiError;

    #[test]
    fn test_defaults() {
        let config = NodeConfig::default();
        assert_eq!(config.sample_mode, SampleMode::OneShot);
        assert_eq!(config.bus, BusConfig::STANDARD);
        assert_eq!(config.sensor_address, 0x48);
        assert_eq!(config.inter_frame_spins, 1000);
        assert_eq!(config.stall_timeout_ms, 2000);
        assert!(config.recover_stalled);
    }

    #[test]
    fn test_sensor_address_validation() {
        let config = NodeConfig {
            sensor_address: 0x90,
            ..Default::default()
        };
        assert_eq!(
            config.sensor(),
            Err(SensorError::Bus(TwiError::InvalidAddress))
        );
        assert_eq!(NodeConfig::default().sensor(), Ok(Nct375::new()));
    }

    #[test]
    fn test_spin_wait_length() {
        let config = NodeConfig {
            inter_frame_spins: 42,
            ..Default::default()
        };
        assert_eq!(config.spin_wait().iterations(), 42);
    }
}
