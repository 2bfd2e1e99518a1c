//! Port traits: the hexagonal boundary between the boot/connectivity core
//! and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ConnectivityManager / DeviceController
//! ```
//!
//! Driven adapters (radio, configuration store, platform services) implement
//! these traits.  The core consumes them via generics, so it never touches
//! ESP-IDF directly and runs unchanged against the simulation adapters.

use crate::adapters::device_id::MacAddress;
use crate::config::Configuration;
use crate::connectivity::endpoint::{
    AccessPointDescriptor, ApRecord, ScanRequest, StationDescriptor,
};
use crate::error::DriverError;

use super::events::{EventCallback, EventNamespace};

// ───────────────────────────────────────────────────────────────
// Radio driver port (driven adapter: core ↔ vendor WiFi driver)
// ───────────────────────────────────────────────────────────────

/// Radio operating mode as the driver understands it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RadioMode {
    #[default]
    Off,
    Station,
    AccessPoint,
    AccessPointStation,
}

impl RadioMode {
    pub const fn has_station(self) -> bool {
        matches!(self, Self::Station | Self::AccessPointStation)
    }

    pub const fn has_access_point(self) -> bool {
        matches!(self, Self::AccessPoint | Self::AccessPointStation)
    }
}

/// Command surface of the vendor WiFi driver.
///
/// Every command is synchronous and returns once the driver has accepted it;
/// outcomes arrive later as events on the driver task through the callback
/// registered with [`subscribe`](Self::subscribe).
///
/// Implementations must never invoke a subscribed callback while the caller
/// is still inside one of these methods on the same thread.
pub trait RadioDriver: Send {
    /// Create the default station and AP network interfaces.  Must precede
    /// [`init`](Self::init).
    fn create_interfaces(&mut self) -> Result<(), DriverError>;

    fn destroy_interfaces(&mut self) -> Result<(), DriverError>;

    /// Initialise the driver with credential storage kept in RAM only.
    fn init(&mut self) -> Result<(), DriverError>;

    fn deinit(&mut self) -> Result<(), DriverError>;

    /// Register `callback` for every event id in `namespace`.
    fn subscribe(
        &mut self,
        namespace: EventNamespace,
        callback: EventCallback,
    ) -> Result<(), DriverError>;

    fn unsubscribe(&mut self, namespace: EventNamespace) -> Result<(), DriverError>;

    fn set_mode(&mut self, mode: RadioMode) -> Result<(), DriverError>;

    fn set_station_config(&mut self, sta: &StationDescriptor) -> Result<(), DriverError>;

    fn set_access_point_config(&mut self, ap: &AccessPointDescriptor)
    -> Result<(), DriverError>;

    fn start(&mut self) -> Result<(), DriverError>;

    fn stop(&mut self) -> Result<(), DriverError>;

    /// Issue a join with the configured station descriptor.
    fn connect(&mut self) -> Result<(), DriverError>;

    /// Start a non-blocking scan; completion is signalled by a scan-done event.
    fn start_scan(&mut self, request: &ScanRequest) -> Result<(), DriverError>;

    /// Harvest the results of the last completed scan.
    fn scan_records(&mut self) -> Result<Vec<ApRecord>, DriverError>;

    /// The access point the station is associated with, if any.
    fn associated_ap(&mut self) -> Option<ApRecord>;

    /// `true` enables modem sleep; `false` disables power saving.
    fn set_power_save(&mut self, enabled: bool) -> Result<(), DriverError>;
}

// ───────────────────────────────────────────────────────────────
// Configuration store port (driven adapter: core ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists the board [`Configuration`].
pub trait ConfigStore {
    /// Bring up the underlying storage.  A failure here is fatal at boot.
    fn initialize_store(&mut self) -> Result<(), StoreError>;

    fn read_from_store(&mut self) -> Result<Configuration, StoreError>;

    /// Persist `config`.  With `erase_all` the namespace is wiped first.
    fn write_to_store(&mut self, config: &Configuration, erase_all: bool)
    -> Result<(), StoreError>;
}

// ───────────────────────────────────────────────────────────────
// Platform port (driven adapter: core ↔ SoC services)
// ───────────────────────────────────────────────────────────────

/// SoC services the boot sequence needs besides the radio and the store.
pub trait Platform {
    /// Create the default system event loop the radio posts to.
    fn create_event_loop(&mut self) -> Result<(), DriverError>;

    /// Initialise the TCP/IP stack.
    fn init_network_stack(&mut self) -> Result<(), DriverError>;

    /// Factory station MAC.
    fn mac_address(&self) -> MacAddress;

    /// Hardware random number.
    fn random_u32(&mut self) -> u32;

    /// Block the calling task.
    fn delay_ms(&mut self, ms: u32);

    /// Start name advertisement (mDNS) as `hostname`.
    fn advertise(&mut self, hostname: &str, instance: &str) -> Result<(), DriverError>;

    fn withdraw_advertisement(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigStore`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// Nothing stored yet (first boot).
    NotFound,
    /// Stored blob failed to decode.
    Corrupted,
    /// Stored blob carries a different schema version.
    SchemaMismatch { found: u32, expected: u32 },
    /// Backend error code.
    Io(i32),
}

impl core::fmt::Display for StoreError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "configuration not found"),
            Self::Corrupted => write!(f, "configuration corrupted"),
            Self::SchemaMismatch { found, expected } => {
                write!(f, "schema version {} (expected {})", found, expected)
            }
            Self::Io(code) => write!(f, "I/O error ({})", code),
        }
    }
}
