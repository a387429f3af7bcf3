//! Wake cycle
//!
//! The node sleeps between timer wake-ups. Each wake:
//!
//! 1. Supervises the bus: a transaction that made no progress for the stall
//!    timeout is dropped (when recovery is enabled)
//! 2. Re-applies the bus settings, which the controller loses in sleep
//! 3. Issues the next sensor request
//!
//! In one-shot mode the requests alternate: one wake triggers a conversion,
//! the next reads it back. Each request is waited out before the wake ends,
//! so the next wake finds the bus idle. A failed read restarts from the
//! trigger. In continuous mode every wake reads the latest conversion with a
//! single combined transaction.
//!
//! Results arrive asynchronously in the bus interrupt and are picked up
//! with [`Node::latest_temperature`].

use thermotag_core::twi::{BusHealth, SharedEngine, StallMonitor, TwiError};
use thermotag_core::{InterFrameDelay, ValueSlot};
use thermotag_drivers::{Nct375, SensorCompletion, SensorError, SensorSupply, Temperature};
use thermotag_hal::gpio::OutputPin;
use thermotag_hal::twi::BusController;

use crate::config::{NodeConfig, SampleMode};

/// Node errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NodeError {
    /// Sensor request failed
    Sensor(SensorError),
}

impl From<SensorError> for NodeError {
    fn from(e: SensorError) -> Self {
        NodeError::Sensor(e)
    }
}

impl From<TwiError> for NodeError {
    fn from(e: TwiError) -> Self {
        NodeError::Sensor(SensorError::Bus(e))
    }
}

/// What a wake-up did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WakeAction {
    /// One-shot conversion triggered
    ConversionStarted,
    /// Temperature read issued
    ReadRequested,
    /// Previous transaction still in flight; nothing issued
    BusBusy,
    /// Stalled transaction dropped; nothing issued
    Recovered,
    /// Transaction stalled and recovery is disabled
    Stalled,
}

/// Next one-shot request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    StartSample,
    ReadSample,
}

/// Sensor node
pub struct Node<PWR, GND, D> {
    config: NodeConfig,
    sensor: Nct375,
    supply: SensorSupply<PWR, GND>,
    delay: D,
    monitor: StallMonitor,
    step: Step,
    temperature: &'static ValueSlot<Temperature>,
}

impl<PWR, GND, D> Node<PWR, GND, D>
where
    PWR: OutputPin,
    GND: OutputPin,
    D: InterFrameDelay,
{
    /// Create a node
    ///
    /// # Arguments
    /// - `supply`: Sensor supply pins
    /// - `delay`: Inter-frame gap, usually [`NodeConfig::spin_wait`]
    /// - `temperature`: Slot the bus interrupt publishes readings into
    pub fn new(
        config: NodeConfig,
        supply: SensorSupply<PWR, GND>,
        delay: D,
        temperature: &'static ValueSlot<Temperature>,
    ) -> Result<Self, NodeError> {
        Ok(Self {
            sensor: config.sensor()?,
            monitor: StallMonitor::new(config.stall_timeout_ms),
            config,
            supply,
            delay,
            step: Step::StartSample,
            temperature,
        })
    }

    /// Power the sensor and put it in the configured mode
    pub fn boot<B, P>(&mut self, engine: &SharedEngine<B, SensorCompletion, P>) -> Result<(), NodeError>
    where
        B: BusController,
        P: OutputPin,
    {
        self.supply.power_on();

        let mut twi = engine;
        match self.config.sample_mode {
            SampleMode::OneShot => self.sensor.one_shot_mode_on(&mut twi)?,
            SampleMode::Continuous => self.sensor.power_up(&mut twi)?,
        }

        info!(
            "node: boot mode={} sensor={=u8:#x}",
            self.config.sample_mode,
            self.sensor.address().get()
        );
        Ok(())
    }

    /// Run one wake cycle
    ///
    /// # Arguments
    /// - `engine`: Shared bus engine
    /// - `elapsed_ms`: Time since the previous wake
    pub fn on_wake<B, P>(
        &mut self,
        engine: &SharedEngine<B, SensorCompletion, P>,
        elapsed_ms: u32,
    ) -> Result<WakeAction, NodeError>
    where
        B: BusController,
        P: OutputPin,
    {
        match self.monitor.update(engine.snapshot()?, elapsed_ms) {
            BusHealth::Idle => {}
            BusHealth::Progressing => return Ok(WakeAction::BusBusy),
            BusHealth::Stalled if self.config.recover_stalled => {
                warn!("node: bus stalled for {=u32} ms, recovering", self.monitor.stalled_for_ms());
                engine.recover()?;
                self.monitor.reset();
                self.step = Step::StartSample;
                return Ok(WakeAction::Recovered);
            }
            BusHealth::Stalled => return Ok(WakeAction::Stalled),
        }

        engine.reconfigure(self.config.bus)?;

        let mut twi = engine;
        let action = match (self.config.sample_mode, self.step) {
            (SampleMode::OneShot, Step::StartSample) => {
                self.sensor.start_conversion(&mut twi)?;
                self.step = Step::ReadSample;
                self.sensor.settle(&mut twi, &mut self.delay)?;
                WakeAction::ConversionStarted
            }
            (SampleMode::OneShot, Step::ReadSample) => {
                self.step = Step::StartSample;
                self.sensor
                    .read_temperature(&mut twi, &mut self.delay, self.temperature)?;
                self.sensor.settle(&mut twi, &mut self.delay)?;
                WakeAction::ReadRequested
            }
            (SampleMode::Continuous, _) => {
                self.sensor
                    .read_temperature_combined(&mut twi, self.temperature)?;
                WakeAction::ReadRequested
            }
        };

        debug!("node: wake {}", action);
        Ok(action)
    }

    /// Shut the sensor down and cut its supply
    ///
    /// The power-down write must finish before the supply is cut, so call
    /// [`Node::power_off`] once the engine is idle.
    pub fn shutdown<B, P>(&mut self, engine: &SharedEngine<B, SensorCompletion, P>) -> Result<(), NodeError>
    where
        B: BusController,
        P: OutputPin,
    {
        let mut twi = engine;
        self.sensor.power_down(&mut twi)?;
        Ok(())
    }

    /// Cut the sensor supply
    pub fn power_off(&mut self) {
        self.supply.power_off();
    }

    /// Most recent reading published by the bus interrupt
    pub fn latest_temperature(&self) -> Option<Temperature> {
        self.temperature.peek()
    }

    /// Active configuration
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Check if the sensor is powered
    pub fn is_powered(&self) -> bool {
        self.supply.is_powered()
    }
}
