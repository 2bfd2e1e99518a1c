//! Development board: BOOT button on GPIO0, switched peripheral rail, WiFi.
//!
//! Boot behaviour:
//! - BOOT held during post-init → configuration AP (scan + AP+STA).
//! - Otherwise join a configured network; on failure fall back to an access
//!   point named after the board so it stays reachable.
//! - Either way the board is advertised over mDNS.

use core::marker::PhantomData;

use embedded_hal::digital::OutputPin;
use log::{info, warn};

use crate::app::controller::{BoardHooks, HookCore};
use crate::app::ports::{ConfigStore, Platform, RadioDriver};
use crate::drivers::hw_init;
use crate::drivers::power::PowerRail;
use crate::error::Result;

/// Connect cycles per credential slot at boot and on link recovery.
pub const STATION_RETRIES: u8 = 3;

pub struct DevBoard<R, S, P, Pin: OutputPin> {
    rail: PowerRail<Pin>,
    station_retries: u8,
    _ports: PhantomData<fn() -> (R, S, P)>,
}

impl<R, S, P, Pin: OutputPin> DevBoard<R, S, P, Pin> {
    pub fn new(power_pin: Pin) -> Self {
        Self {
            rail: PowerRail::new(power_pin),
            station_retries: STATION_RETRIES,
            _ports: PhantomData,
        }
    }

    pub fn with_station_retries(mut self, retries: u8) -> Self {
        self.station_retries = retries;
        self
    }

    pub fn station_retries(&self) -> u8 {
        self.station_retries
    }

    pub fn peripherals_powered(&self) -> bool {
        self.rail.is_on()
    }
}

impl<R, S, P, Pin> BoardHooks for DevBoard<R, S, P, Pin>
where
    R: RadioDriver + 'static,
    S: ConfigStore,
    P: Platform,
    Pin: OutputPin,
{
    type Radio = R;
    type Store = S;
    type Platform = P;

    fn early_init(&mut self, _core: &mut HookCore<Self>) -> Result<()> {
        hw_init::init_pins()?;
        Ok(())
    }

    fn power_peripherals(&mut self, on: bool) -> Result<()> {
        self.rail.set(on)
    }

    fn critical_init(&mut self, core: &mut HookCore<Self>) -> Result<()> {
        info!(
            "DevBoard: {} ({} slot(s) configured)",
            core.default_name(),
            core.config.valid_endpoints().count()
        );
        Ok(())
    }

    fn board_init(&mut self, core: &mut HookCore<Self>) -> Result<()> {
        core.initialize_wifi()
    }

    fn post_init(&mut self, core: &mut HookCore<Self>) -> Result<()> {
        if hw_init::boot_button_pressed() {
            info!("DevBoard: BOOT held, starting configuration AP");
            core.start_configuration_ap()?;
        } else if let Err(e) = core.start_station(self.station_retries) {
            warn!("DevBoard: station failed ({}), falling back to AP", e);
            core.start_ap()?;
        }

        if let Err(e) = core.advertise() {
            warn!("DevBoard: mDNS: {}", e);
        }
        Ok(())
    }
}
