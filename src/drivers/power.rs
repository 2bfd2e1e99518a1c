//! Switched peripheral power rail.
//!
//! Generic over any `embedded_hal::digital::OutputPin`: on target an
//! `esp_idf_hal::gpio::PinDriver`, on host [`SimPin`].  The rail is
//! active HIGH.

use embedded_hal::digital::OutputPin;
use log::info;

use crate::error::{DriverError, Error, Result};

pub struct PowerRail<P: OutputPin> {
    pin: P,
    on: bool,
}

impl<P: OutputPin> PowerRail<P> {
    /// Wrap `pin`.  The rail is assumed off until switched.
    pub fn new(pin: P) -> Self {
        Self { pin, on: false }
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    pub fn set(&mut self, on: bool) -> Result<()> {
        let res = if on {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        res.map_err(|e| {
            let kind = embedded_hal::digital::Error::kind(&e);
            log::error!("power: rail switch failed: {:?}", kind);
            Error::Driver(DriverError::new("gpio_set_level", -1))
        })?;
        if self.on != on {
            info!("power: peripherals {}", if on { "on" } else { "off" });
        }
        self.on = on;
        Ok(())
    }
}

// ── Simulation pin ────────────────────────────────────────────

/// Host output pin.  Clones share the level so tests can observe a pin
/// after moving it into a rail.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone, Default)]
pub struct SimPin {
    level: std::sync::Arc<core::sync::atomic::AtomicBool>,
    broken: bool,
}

#[cfg(not(target_os = "espidf"))]
impl SimPin {
    pub fn new() -> Self {
        Self::default()
    }

    /// A pin whose writes always fail.
    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::default()
        }
    }

    pub fn is_high(&self) -> bool {
        self.level.load(core::sync::atomic::Ordering::Relaxed)
    }

    fn write(&mut self, high: bool) -> core::result::Result<(), SimPinError> {
        if self.broken {
            return Err(SimPinError);
        }
        self.level
            .store(high, core::sync::atomic::Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimPinError;

#[cfg(not(target_os = "espidf"))]
impl embedded_hal::digital::Error for SimPinError {
    fn kind(&self) -> embedded_hal::digital::ErrorKind {
        embedded_hal::digital::ErrorKind::Other
    }
}

#[cfg(not(target_os = "espidf"))]
impl embedded_hal::digital::ErrorType for SimPin {
    type Error = SimPinError;
}

#[cfg(not(target_os = "espidf"))]
impl OutputPin for SimPin {
    fn set_low(&mut self) -> core::result::Result<(), Self::Error> {
        self.write(false)
    }

    fn set_high(&mut self) -> core::result::Result<(), Self::Error> {
        self.write(true)
    }
}
