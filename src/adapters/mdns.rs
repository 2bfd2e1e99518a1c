//! mDNS advertisement of the board's HTTP service.
//!
//! Registers `<hostname>.local` and one `_http._tcp` service on port 80
//! with the given instance name.  Uses the ESP-IDF mDNS component on target
//! and only logs on simulation targets.
//!
//! Lifecycle follows station connectivity: start after the link is up,
//! stop before the radio is torn down.

use log::info;

use crate::error::DriverError;

#[cfg(target_os = "espidf")]
use super::utils::{copy_nul_terminated, esp_check};

pub const SERVICE_TYPE: &str = "_http";
pub const SERVICE_PROTO: &str = "_tcp";
pub const SERVICE_PORT: u16 = 80;

/// Default instance name when the board has no configured one.
pub const DEFAULT_INSTANCE: &str = "Board web server";

#[derive(Debug, Default)]
pub struct MdnsAdapter {
    hostname: heapless::String<32>,
    instance: heapless::String<64>,
    active: bool,
}

impl MdnsAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Register hostname, instance name and the HTTP service.  Restarts the
    /// responder when it is already running so a new name takes effect.
    pub fn start(&mut self, hostname: &str, instance: &str) -> Result<(), DriverError> {
        if self.active {
            self.stop();
        }
        self.hostname = bounded(hostname);
        self.instance = bounded(if instance.is_empty() {
            DEFAULT_INSTANCE
        } else {
            instance
        });
        self.platform_start()?;
        self.active = true;
        info!(
            "mDNS: advertising {}.local {}.{}:{} ({})",
            self.hostname, SERVICE_TYPE, SERVICE_PROTO, SERVICE_PORT, self.instance
        );
        Ok(())
    }

    pub fn stop(&mut self) {
        if !self.active {
            return;
        }
        self.platform_stop();
        self.active = false;
        info!("mDNS: stopped");
    }

    #[cfg(target_os = "espidf")]
    fn platform_start(&self) -> Result<(), DriverError> {
        use esp_idf_svc::sys::*;

        let mut host = [0u8; 33];
        copy_nul_terminated(&self.hostname, &mut host);
        let mut inst = [0u8; 65];
        copy_nul_terminated(&self.instance, &mut inst);

        // SAFETY: every pointer refers to a NUL-terminated buffer that
        // outlives the call; the mDNS component copies what it keeps.
        unsafe {
            esp_check("mdns_init", mdns_init())?;
            let registered = esp_check("mdns_hostname_set", mdns_hostname_set(host.as_ptr() as *const _))
                .and_then(|()| {
                    esp_check(
                        "mdns_instance_name_set",
                        mdns_instance_name_set(inst.as_ptr() as *const _),
                    )
                })
                .and_then(|()| {
                    esp_check(
                        "mdns_service_add",
                        mdns_service_add(
                            inst.as_ptr() as *const _,
                            b"_http\0".as_ptr() as *const _,
                            b"_tcp\0".as_ptr() as *const _,
                            SERVICE_PORT,
                            core::ptr::null_mut(),
                            0,
                        ),
                    )
                });
            if registered.is_err() {
                mdns_free();
            }
            registered
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_start(&self) -> Result<(), DriverError> {
        info!(
            "mDNS(sim): registered {}.local {}.{}:{}",
            self.hostname, SERVICE_TYPE, SERVICE_PROTO, SERVICE_PORT
        );
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_stop(&self) {
        // SAFETY: only reached after a successful mdns_init.
        unsafe {
            esp_idf_svc::sys::mdns_free();
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_stop(&self) {
        info!("mDNS(sim): unregistered");
    }
}

fn bounded<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}
