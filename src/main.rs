//! Board manager firmware: main entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Adapters (outer ring)                     │
//! │                                                              │
//! │   EspRadio        NvsStore        EspPlatform (mDNS, RNG)    │
//! │   (RadioDriver)   (ConfigStore)   (Platform)                 │
//! │                                                              │
//! │   ─────────────── Port Trait Boundary ───────────────        │
//! │                                                              │
//! │   ┌──────────────────────────────────────────────────────┐   │
//! │   │  DeviceController<DevBoard>                          │   │
//! │   │  boot stages · ConnectivityManager · retry policy    │   │
//! │   └──────────────────────────────────────────────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use log::{error, info, warn};

use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::PinDriver;
use esp_idf_hal::peripherals::Peripherals;

use boardmanager::adapters::nvs::NvsStore;
use boardmanager::adapters::ota;
use boardmanager::adapters::platform::{self, EspPlatform};
use boardmanager::adapters::radio::EspRadio;
use boardmanager::app::controller::{BoardCore, DeviceController, SEVERITY_CRITICAL};
use boardmanager::app::ports::Platform;
use boardmanager::boards::DevBoard;
use boardmanager::config::Timings;

/// Pause after a failed link recovery before trying again.
const RECOVERY_PAUSE_MS: u32 = 120_000;
const LOOP_PERIOD_MS: u32 = 10;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;
    info!("Board manager v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Cancel rollback of a freshly flashed image ─────────
    ota::check_application_image();

    // ── 3. Assemble the board ─────────────────────────────────
    let peripherals = Peripherals::take()?;
    // GPIO4 is pins::PERIPHERAL_POWER_GPIO.
    let power_pin = PinDriver::output(peripherals.pins.gpio4)?;
    let core = BoardCore::new(
        EspRadio::new(),
        NvsStore::new(),
        EspPlatform::new(),
        Timings::default(),
    );
    let mut controller = DeviceController::new(DevBoard::new(power_pin), core);

    // ── 4. Boot sequence ──────────────────────────────────────
    if let Err(e) = controller.initialize() {
        let severity = controller.init_fail_severity();
        if let Err(off) = controller.power_peripherals(false) {
            warn!("power down: {}", off);
        }
        error!("Initialization failed with severity {}: {}", severity, e);
        if severity == SEVERITY_CRITICAL {
            platform::enter_deep_sleep(60);
        }
        // Maybe it recovers after a restart.
        let jitter = controller.core_mut().platform.random_u32() & 0x3F;
        platform::restart_after(120 + jitter);
    }
    info!("Board initialized");

    // ── 5. Link supervision ───────────────────────────────────
    let station_mode = controller.core().is_connected_to_ap();
    let retries = controller.hooks().station_retries();
    loop {
        if station_mode {
            if let Err(e) = controller.core_mut().ensure_station_link(retries) {
                warn!("Link recovery failed: {}", e);
                FreeRtos::delay_ms(RECOVERY_PAUSE_MS);
            }
        }
        FreeRtos::delay_ms(LOOP_PERIOD_MS);
    }
}
