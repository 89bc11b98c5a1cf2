//! Haptic actuator driver.

use embedded_hal::i2c::I2c;

use crate::error::NodeError;

/// Default bus address of the DRV2605 haptic driver.
pub const DRV2605_ADDR: u8 = 0x5A;

/// Mode register; 0x00 selects internal trigger.
const REG_MODE: u8 = 0x01;
/// Go register; writing 0x01 fires the configured waveform.
const REG_GO: u8 = 0x0C;

const MODE_INTERNAL_TRIGGER: u8 = 0x00;
const GO_FIRE: u8 = 0x01;

/// Anything that can deliver a short haptic pulse.
pub trait Haptic {
    /// Fires one pulse. An error means the actuator did not acknowledge
    /// and the alert degrades to log-only.
    fn pulse(&mut self) -> Result<(), NodeError>;
}

/// DRV2605 haptic driver on an I2C bus.
pub struct Drv2605<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> Drv2605<I2C> {
    /// Driver at the chip's default address.
    pub fn new(i2c: I2C) -> Self {
        Self::with_address(i2c, DRV2605_ADDR)
    }

    /// Driver at a non-default address, for address-translated buses.
    pub fn with_address(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), NodeError> {
        self.i2c
            .write(self.address, &[register, value])
            .map_err(|_| NodeError::ActuatorUnavailable)
    }
}

impl<I2C: I2c> Haptic for Drv2605<I2C> {
    fn pulse(&mut self) -> Result<(), NodeError> {
        // Mode first, then trigger. A failed mode write leaves the trigger
        // unfired.
        self.write_register(REG_MODE, MODE_INTERNAL_TRIGGER)?;
        self.write_register(REG_GO, GO_FIRE)
    }
}
