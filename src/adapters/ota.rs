//! Application image validation.
//!
//! With rollback enabled in the bootloader, a freshly flashed image runs in
//! "pending verify" state and is reverted on the next reset unless it is
//! marked valid.  The binary calls [`check_application_image`] first thing
//! in `main`, before the boot sequence can reset the SoC.

use log::info;

#[cfg(target_os = "espidf")]
pub fn check_application_image() {
    match esp_ota::mark_app_valid() {
        Ok(()) => info!("OTA: running image marked valid"),
        Err(e) => log::warn!("OTA: mark_app_valid failed: {:?}", e),
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn check_application_image() {
    info!("OTA(sim): image check skipped");
}
