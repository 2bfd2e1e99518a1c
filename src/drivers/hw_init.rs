//! One-shot GPIO initialisation.
//!
//! Configures the BOOT button as an input with pull-up and the peripheral
//! power enable as an output driven LOW, using raw ESP-IDF sys calls.
//! Called from the board's early-init hook before anything else touches
//! the pins.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicBool, Ordering};

use log::info;

use crate::pins;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot pin initialisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed { pin: i32, code: i32 },
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed { pin, code } => {
                write!(f, "GPIO{} config failed (rc={})", pin, code)
            }
        }
    }
}

impl From<HwInitError> for crate::error::Error {
    fn from(e: HwInitError) -> Self {
        match e {
            HwInitError::GpioConfigFailed { code, .. } => {
                Self::Driver(crate::error::DriverError::new("gpio_config", code))
            }
        }
    }
}

// ── Pin setup ─────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub fn init_pins() -> Result<(), HwInitError> {
    let button = gpio_config_t {
        pin_bit_mask: 1u64 << pins::BOOT_BUTTON_GPIO,
        mode: gpio_mode_t_GPIO_MODE_INPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
    };
    // SAFETY: boot task only, before any other user of these pins.
    let ret = unsafe { gpio_config(&button) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::GpioConfigFailed {
            pin: pins::BOOT_BUTTON_GPIO,
            code: ret,
        });
    }

    let power = gpio_config_t {
        pin_bit_mask: 1u64 << pins::PERIPHERAL_POWER_GPIO,
        mode: gpio_mode_t_GPIO_MODE_OUTPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
    };
    // SAFETY: as above.
    let ret = unsafe { gpio_config(&power) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::GpioConfigFailed {
            pin: pins::PERIPHERAL_POWER_GPIO,
            code: ret,
        });
    }
    // SAFETY: pin configured as output above.
    unsafe { gpio_set_level(pins::PERIPHERAL_POWER_GPIO, 0) };

    info!("hw_init: BOOT button and peripheral power pins configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_pins() -> Result<(), HwInitError> {
    info!(
        "hw_init(sim): GPIO{} input, GPIO{} output",
        pins::BOOT_BUTTON_GPIO,
        pins::PERIPHERAL_POWER_GPIO
    );
    Ok(())
}

// ── BOOT button ───────────────────────────────────────────────

/// `true` while the BOOT button is held (pin reads LOW).
#[cfg(target_os = "espidf")]
pub fn boot_button_pressed() -> bool {
    // SAFETY: register read of a configured input.
    (unsafe { gpio_get_level(pins::BOOT_BUTTON_GPIO) }) == 0
}

#[cfg(not(target_os = "espidf"))]
static SIM_BOOT_BUTTON: AtomicBool = AtomicBool::new(false);

#[cfg(not(target_os = "espidf"))]
pub fn boot_button_pressed() -> bool {
    SIM_BOOT_BUTTON.load(Ordering::Relaxed)
}

/// Simulation: hold or release the BOOT button.
#[cfg(not(target_os = "espidf"))]
pub fn simulate_boot_button(pressed: bool) {
    SIM_BOOT_BUTTON.store(pressed, Ordering::Relaxed);
}
