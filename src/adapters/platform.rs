//! SoC services adapter.
//!
//! Implements [`Platform`]: default event loop, TCP/IP stack, factory MAC,
//! hardware RNG, task delay and mDNS advertisement.
//!
//! - **`target_os = "espidf"`**: [`EspPlatform`] calls ESP-IDF directly.
//! - **otherwise**: [`SimPlatform`] records what the boot sequence asked for
//!   and can be told to fail individual steps.

use log::info;

use crate::app::ports::Platform;
use crate::error::DriverError;

use super::device_id::{self, MacAddress};
use super::mdns::MdnsAdapter;

// ───────────────────────────────────────────────────────────────
// ESP-IDF
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub use esp::{EspPlatform, enter_deep_sleep, restart_after};

#[cfg(target_os = "espidf")]
mod esp {
    use super::*;
    use crate::adapters::utils::esp_check;
    use esp_idf_hal::delay::FreeRtos;
    use esp_idf_svc::sys::*;

    pub struct EspPlatform {
        mac: MacAddress,
        mdns: MdnsAdapter,
    }

    impl Default for EspPlatform {
        fn default() -> Self {
            Self::new()
        }
    }

    impl EspPlatform {
        pub fn new() -> Self {
            Self {
                mac: device_id::read_mac(),
                mdns: MdnsAdapter::new(),
            }
        }
    }

    impl Platform for EspPlatform {
        fn create_event_loop(&mut self) -> Result<(), DriverError> {
            // SAFETY: called once from the boot task before any subscriber.
            let ret = unsafe { esp_event_loop_create_default() };
            if ret == ESP_ERR_INVALID_STATE as i32 {
                // Already created by another component.
                return Ok(());
            }
            esp_check("esp_event_loop_create_default", ret)
        }

        fn init_network_stack(&mut self) -> Result<(), DriverError> {
            // SAFETY: idempotent inside ESP-IDF; boot task only.
            esp_check("esp_netif_init", unsafe { esp_netif_init() })
        }

        fn mac_address(&self) -> MacAddress {
            self.mac
        }

        fn random_u32(&mut self) -> u32 {
            // SAFETY: reads the hardware RNG register.
            unsafe { esp_random() }
        }

        fn delay_ms(&mut self, ms: u32) {
            FreeRtos::delay_ms(ms);
        }

        fn advertise(&mut self, hostname: &str, instance: &str) -> Result<(), DriverError> {
            self.mdns.start(hostname, instance)
        }

        fn withdraw_advertisement(&mut self) {
            self.mdns.stop();
        }
    }

    /// Restart the SoC after `seconds`.
    pub fn restart_after(seconds: u32) -> ! {
        info!("Platform: restarting in {} s", seconds);
        FreeRtos::delay_ms(seconds.saturating_mul(1000));
        // SAFETY: does not return.
        unsafe { esp_restart() };
        #[allow(clippy::empty_loop)]
        loop {}
    }

    /// Enter deep sleep with a timer wake-up after `seconds`.
    pub fn enter_deep_sleep(seconds: u32) -> ! {
        info!("Platform: deep sleep for {} s", seconds);
        // SAFETY: wake source configured before entering sleep; does not return.
        unsafe {
            esp_sleep_enable_timer_wakeup(u64::from(seconds) * 1_000_000);
            esp_deep_sleep_start();
        }
        #[allow(clippy::empty_loop)]
        loop {}
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation
// ───────────────────────────────────────────────────────────────

/// Host platform.  Delays are recorded, not slept.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
pub struct SimPlatform {
    mdns: MdnsAdapter,
    fail_event_loop: bool,
    fail_network_stack: bool,
    fail_advertise: bool,
    event_loop_created: bool,
    network_stack_ready: bool,
    delays: Vec<u32>,
    advertise_count: u32,
}

#[cfg(not(target_os = "espidf"))]
impl SimPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_event_loop(&mut self) {
        self.fail_event_loop = true;
    }

    pub fn fail_network_stack(&mut self) {
        self.fail_network_stack = true;
    }

    pub fn fail_advertise(&mut self) {
        self.fail_advertise = true;
    }

    pub fn event_loop_created(&self) -> bool {
        self.event_loop_created
    }

    pub fn network_stack_ready(&self) -> bool {
        self.network_stack_ready
    }

    pub fn delays(&self) -> &[u32] {
        &self.delays
    }

    pub fn is_advertising(&self) -> bool {
        self.mdns.is_active()
    }

    pub fn advertised_hostname(&self) -> Option<&str> {
        self.mdns.is_active().then(|| self.mdns.hostname())
    }

    pub fn advertise_count(&self) -> u32 {
        self.advertise_count
    }
}

#[cfg(not(target_os = "espidf"))]
impl Platform for SimPlatform {
    fn create_event_loop(&mut self) -> Result<(), DriverError> {
        if self.fail_event_loop {
            return Err(DriverError::new("esp_event_loop_create_default", 0x101));
        }
        self.event_loop_created = true;
        info!("Platform(sim): default event loop created");
        Ok(())
    }

    fn init_network_stack(&mut self) -> Result<(), DriverError> {
        if self.fail_network_stack {
            return Err(DriverError::new("esp_netif_init", -1));
        }
        self.network_stack_ready = true;
        info!("Platform(sim): network stack ready");
        Ok(())
    }

    fn mac_address(&self) -> MacAddress {
        device_id::read_mac()
    }

    fn random_u32(&mut self) -> u32 {
        use rand_core::{OsRng, RngCore};
        OsRng.next_u32()
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delays.push(ms);
    }

    fn advertise(&mut self, hostname: &str, instance: &str) -> Result<(), DriverError> {
        if self.fail_advertise {
            return Err(DriverError::new("mdns_init", 0x103));
        }
        self.mdns.start(hostname, instance)?;
        self.advertise_count += 1;
        Ok(())
    }

    fn withdraw_advertisement(&mut self) {
        self.mdns.stop();
    }
}
