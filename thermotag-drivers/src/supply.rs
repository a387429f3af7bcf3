//! Sensor supply switching
//!
//! The sensor is powered straight from two GPIOs: one driven high as
//! supply, one driven low as ground. Switching both lets the node cut the
//! sensor off completely between measurements.

use thermotag_hal::gpio::OutputPin;

/// GPIO-powered sensor supply
pub struct SensorSupply<PWR, GND> {
    power: PWR,
    ground: GND,
}

impl<PWR: OutputPin, GND: OutputPin> SensorSupply<PWR, GND> {
    /// Take both pins; the sensor starts unpowered
    pub fn new(mut power: PWR, mut ground: GND) -> Self {
        power.set_low();
        ground.set_low();
        Self { power, ground }
    }

    /// Ground low, then supply high
    pub fn power_on(&mut self) {
        self.ground.set_low();
        self.power.set_high();
        debug!("supply: on");
    }

    /// Drop the supply pin
    pub fn power_off(&mut self) {
        self.power.set_low();
        debug!("supply: off");
    }

    /// Check if the sensor is powered
    pub fn is_powered(&self) -> bool {
        self.power.is_set_high() && !self.ground.is_set_high()
    }

    /// Release both pins
    pub fn release(self) -> (PWR, GND) {
        (self.power, self.ground)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Pin {
        high: bool,
    }

    impl OutputPin for Pin {
        fn set_high(&mut self) {
            self.high = true;
        }

        fn set_low(&mut self) {
            self.high = false;
        }

        fn is_set_high(&self) -> bool {
            self.high
        }
    }

    #[test]
    fn test_starts_unpowered() {
        let supply = SensorSupply::new(Pin { high: true }, Pin { high: true });
        assert!(!supply.is_powered());
        let (power, ground) = supply.release();
        assert!(!power.high);
        assert!(!ground.high);
    }

    #[test]
    fn test_power_cycle() {
        let mut supply = SensorSupply::new(Pin::default(), Pin::default());
        supply.power_on();
        assert!(supply.is_powered());
        supply.power_off();
        assert!(!supply.is_powered());
    }
}
