//! Device controller: the boot sequence and the connectivity policies built
//! on top of [`ConnectivityManager`].
//!
//! [`DeviceController`] runs the nine boot stages in order, calling the
//! board's [`BoardHooks`] at the extension points.  Before each stage it
//! records the stage's severity marker, so after a failure
//! [`init_fail_severity`](DeviceController::init_fail_severity) tells the
//! entry point how bad things are (5 = critical system error, 2 = board
//! init, 1 = post init, 0 = success).
//!
//! ```text
//!  EarlyInit → PeripheralPower → ConfigStore → EventLoop → NetworkStack
//!      → CriticalInit → BoardInit → PowerSave → PostInit
//! ```
//!
//! [`BoardCore`] is what the hooks receive: configuration, store, platform,
//! signal and connectivity manager, plus the station retry policy, AP
//! fallback, scan and link supervision helpers.

use log::{debug, error, info, warn};

use crate::adapters::device_id::{self, DeviceName, MacAddress};
use crate::app::ports::{ConfigStore, Platform, RadioDriver, StoreError};
use crate::config::{Configuration, Timings};
use crate::connectivity::endpoint::EndpointConfig;
use crate::connectivity::{ConnectivityManager, ConnectivityMode, ConnectivityStatus};
use crate::error::{ConfigError, Error, Result};
use crate::events::{EventSignal, SignalBits};

// ───────────────────────────────────────────────────────────────
// Boot stages
// ───────────────────────────────────────────────────────────────

/// Boot stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootStage {
    EarlyInit,
    PeripheralPower,
    ConfigStore,
    EventLoop,
    NetworkStack,
    CriticalInit,
    BoardInit,
    PowerSave,
    PostInit,
}

impl BootStage {
    pub const ALL: [Self; 9] = [
        Self::EarlyInit,
        Self::PeripheralPower,
        Self::ConfigStore,
        Self::EventLoop,
        Self::NetworkStack,
        Self::CriticalInit,
        Self::BoardInit,
        Self::PowerSave,
        Self::PostInit,
    ];

    /// 1-based position in the sequence.
    pub const fn number(self) -> u8 {
        self as u8 + 1
    }

    /// Severity recorded while this stage runs.  `None` for best-effort
    /// stages that never fail the boot.
    pub const fn severity(self) -> Option<u8> {
        match self {
            Self::EarlyInit
            | Self::PeripheralPower
            | Self::ConfigStore
            | Self::EventLoop
            | Self::NetworkStack
            | Self::CriticalInit => Some(SEVERITY_CRITICAL),
            Self::BoardInit => Some(2),
            Self::PowerSave => None,
            Self::PostInit => Some(1),
        }
    }
}

/// Severity of a failure the board cannot recover from by restarting.
pub const SEVERITY_CRITICAL: u8 = 5;

// ───────────────────────────────────────────────────────────────
// Board hooks
// ───────────────────────────────────────────────────────────────

/// [`BoardCore`] specialised for a hook implementation.
pub type HookCore<H> = BoardCore<
    <H as BoardHooks>::Radio,
    <H as BoardHooks>::Store,
    <H as BoardHooks>::Platform,
>;

/// Board-specific steps of the boot sequence.
///
/// The controller owns the sequencing and the severity bookkeeping; a board
/// only supplies what happens at each extension point.
pub trait BoardHooks: Sized {
    type Radio: RadioDriver + 'static;
    type Store: ConfigStore;
    type Platform: Platform;

    /// Pin setup that must happen before anything else.
    fn early_init(&mut self, core: &mut HookCore<Self>) -> Result<()>;

    /// Switch external peripherals on or off.  Boards without a power rail
    /// keep the default.
    fn power_peripherals(&mut self, on: bool) -> Result<()> {
        let _ = on;
        Ok(())
    }

    /// Board services that must be up before connectivity.
    fn critical_init(&mut self, core: &mut HookCore<Self>) -> Result<()>;

    /// Usually brings the radio up.
    fn board_init(&mut self, core: &mut HookCore<Self>) -> Result<()>;

    /// Usually acquires connectivity and starts advertisement.
    fn post_init(&mut self, core: &mut HookCore<Self>) -> Result<()>;
}

// ───────────────────────────────────────────────────────────────
// BoardCore
// ───────────────────────────────────────────────────────────────

/// Everything the hooks and the application task operate on.
pub struct BoardCore<R: RadioDriver + 'static, S: ConfigStore, P: Platform> {
    pub config: Configuration,
    pub store: S,
    pub platform: P,
    pub signal: EventSignal,
    pub wifi: ConnectivityManager<R>,
    pub timings: Timings,
    mac: MacAddress,
}

impl<R: RadioDriver + 'static, S: ConfigStore, P: Platform> BoardCore<R, S, P> {
    /// Assemble the core.  Nothing is brought up until the boot sequence
    /// runs; the signal stays uncreated until the event loop stage.
    pub fn new(radio: R, store: S, platform: P, timings: Timings) -> Self {
        let signal = EventSignal::new();
        let wifi = ConnectivityManager::new(radio, signal.clone(), timings.stop_timeout_ms);
        let mac = platform.mac_address();
        Self {
            config: Configuration::default(),
            store,
            platform,
            signal,
            wifi,
            timings,
            mac,
        }
    }

    pub fn mac(&self) -> &MacAddress {
        &self.mac
    }

    /// `<name>-XXYYZZ`, the default AP identifier and secret.
    pub fn default_name(&self) -> DeviceName {
        device_id::default_name(&self.config.name, &self.mac)
    }

    /// Lower-case default name, used as the mDNS hostname.
    pub fn hostname(&self) -> DeviceName {
        device_id::hostname(&self.config.name, &self.mac)
    }

    /// Credential of the fallback and configuration access points.
    pub fn default_credential(&self) -> EndpointConfig {
        EndpointConfig::from_name_and_mac(&self.config.name, &self.mac)
    }

    // ── Configuration ─────────────────────────────────────────

    /// Boot stage 3.  Store init failure is fatal; an unreadable or stale
    /// configuration falls back to the compiled-in defaults.
    pub fn load_configuration(&mut self) -> Result<()> {
        self.store.initialize_store()?;

        match self.store.read_from_store() {
            Ok(cfg) => {
                info!("Board: configuration loaded ({})", cfg.name);
                self.config = cfg;
            }
            Err(StoreError::NotFound) => {
                info!("Board: no stored configuration, writing defaults");
                self.config.init_data();
                if let Err(e) = self.store.write_to_store(&self.config, false) {
                    warn!("Board: saving defaults failed: {}", e);
                }
            }
            Err(e @ StoreError::SchemaMismatch { .. }) => {
                warn!("Board: stored configuration has {}, resetting", e);
                self.config.init_data();
                if let Err(e) = self.store.write_to_store(&self.config, true) {
                    warn!("Board: rewriting configuration failed: {}", e);
                }
            }
            Err(e) => {
                warn!("Board: reading configuration failed ({}), using defaults", e);
                self.config.init_data();
            }
        }
        Ok(())
    }

    /// Persist the current configuration.
    pub fn write_configuration(&mut self, erase_all: bool) -> Result<()> {
        self.store.write_to_store(&self.config, erase_all)?;
        Ok(())
    }

    // ── Radio lifecycle ───────────────────────────────────────

    pub fn initialize_wifi(&mut self) -> Result<()> {
        self.wifi.initialize()
    }

    pub fn clean_wifi(&mut self) -> Result<()> {
        self.wifi.clean()
    }

    // ── Station policy ────────────────────────────────────────

    /// Join the first configured network that accepts us.
    ///
    /// Slots are tried in order; invalid slots are skipped without an
    /// attempt.  Each valid slot gets up to `max(max_retries, 1)` connect
    /// cycles.  A refused join is followed by a randomised pause when another
    /// cycle follows.  Driver and state errors abort immediately; otherwise the
    /// last observed error is returned once every slot is exhausted.
    pub fn start_station(&mut self, max_retries: u8) -> Result<()> {
        let attempts = max_retries.max(1);
        let last_valid = self.config.endpoints.iter().rposition(EndpointConfig::is_valid);
        let mut last: Option<Error> = None;

        for (slot, endpoint) in self.config.endpoints.iter().enumerate() {
            if let Err(e) = endpoint.validate() {
                warn!("Board: slot {} skipped: {}", slot, e);
                continue;
            }

            for attempt in 1..=attempts {
                info!(
                    "Board: joining {} (slot {}, attempt {}/{})",
                    endpoint.identifier, slot, attempt, attempts
                );
                match station_cycle(&self.wifi, &self.signal, &self.timings, endpoint) {
                    Ok(()) => {
                        info!("Board: connected to {}", endpoint.identifier);
                        return Ok(());
                    }
                    Err(e @ Error::Disconnected { .. }) => {
                        warn!("Board: {}", e);
                        last = Some(e);
                        if attempt == attempts && last_valid == Some(slot) {
                            break;
                        }
                        let pause = self.timings.backoff_ms(self.platform.random_u32());
                        debug!("Board: retry in {} ms", pause);
                        self.platform.delay_ms(pause);
                    }
                    Err(e) if e.is_transient() => {
                        warn!("Board: {}", e);
                        last = Some(e);
                    }
                    Err(e) => {
                        error!("Board: station start: {}", e);
                        return Err(e);
                    }
                }
            }
        }

        Err(last.unwrap_or(Error::Config(ConfigError::NoValidEndpoint)))
    }

    /// Drop the current link state and rejoin.  Name advertisement is
    /// withdrawn first and restored after a successful join.
    pub fn restart_station_mode(&mut self, max_retries: u8) -> Result<()> {
        self.platform.withdraw_advertisement();
        if let Err(e) = self.wifi.stop(true) {
            warn!("Board: stop before rejoin: {}", e);
        }
        self.signal.clear_bits(SignalBits::ALL);

        self.start_station(max_retries)?;
        if let Err(e) = self.advertise() {
            warn!("Board: advertisement: {}", e);
        }
        Ok(())
    }

    pub fn is_connected_to_ap(&self) -> bool {
        self.wifi.mode() == ConnectivityMode::Station
            && self.wifi.status() == ConnectivityStatus::Connected
    }

    /// Link supervision step for the application loop.
    pub fn ensure_station_link(&mut self, max_retries: u8) -> Result<()> {
        if self.is_connected_to_ap() {
            return Ok(());
        }
        warn!("Board: station link lost (reason {})", self.wifi.disconnect_reason());
        self.restart_station_mode(max_retries)
    }

    /// Start mDNS as `<hostname>.local` with the board name as instance.
    pub fn advertise(&mut self) -> Result<()> {
        let hostname = self.hostname();
        self.platform.advertise(&hostname, &self.config.name)?;
        Ok(())
    }

    // ── Access point ──────────────────────────────────────────

    /// Bring up the fallback access point with the MAC-derived credential.
    pub fn start_ap(&mut self) -> Result<()> {
        self.wifi.initialize()?;
        self.settle_radio();
        let ap = self.default_credential();
        self.wifi.start(ConnectivityMode::AccessPoint, None, Some(&ap))?;
        info!("Board: access point {} up", ap.identifier);
        Ok(())
    }

    pub fn stop_ap(&mut self) -> Result<()> {
        if let Err(e) = self.wifi.stop(true) {
            warn!("Board: stop access point: {}", e);
        }
        self.wifi.clean()
    }

    /// Run one scan cycle and return the number of networks found.
    pub fn scan(&mut self) -> Result<usize> {
        self.wifi.initialize()?;
        self.settle_radio();
        self.signal.clear_bits(SignalBits::SCAN_DONE);
        self.wifi.start(ConnectivityMode::Scan, None, None)?;

        let bits = self
            .signal
            .wait_for_all_bits(SignalBits::SCAN_DONE, self.timings.scan_timeout_ms);
        if let Err(e) = self.wifi.stop(true) {
            warn!("Board: stop after scan: {}", e);
        }
        if !bits.contains(SignalBits::SCAN_DONE) {
            error!("Board: scan timeout");
            return Err(Error::Timeout("scan"));
        }
        let found = self.wifi.scan_record_count();
        info!("Board: scan found {} networks", found);
        Ok(found)
    }

    /// Scan, then offer AP+STA with the default credential on both sides so
    /// an external configuration server can be reached.
    pub fn start_configuration_ap(&mut self) -> Result<()> {
        match self.scan() {
            Ok(_) => {}
            Err(e @ Error::Timeout(_)) => return Err(e),
            Err(e) => warn!("Board: scan before configuration AP: {}", e),
        }
        let cred = self.default_credential();
        self.wifi
            .start(ConnectivityMode::AccessPointStation, Some(&cred), Some(&cred))?;
        info!("Board: configuration AP {} up", cred.identifier);
        Ok(())
    }

    /// Stop whatever mode is active so a new one can start.
    fn settle_radio(&mut self) {
        if self.wifi.mode() == ConnectivityMode::None {
            return;
        }
        if let Err(e) = self.wifi.stop(true) {
            warn!("Board: stop {:?}: {}", self.wifi.mode(), e);
        }
    }
}

/// One connect cycle: stop, start the station, wait for the outcome.
fn station_cycle<R: RadioDriver + 'static>(
    wifi: &ConnectivityManager<R>,
    signal: &EventSignal,
    timings: &Timings,
    endpoint: &EndpointConfig,
) -> Result<()> {
    wifi.stop(true)?;
    let outcome = SignalBits::STA_CONNECTED | SignalBits::STA_DISCONNECTED;
    signal.clear_bits(outcome);
    wifi.start(ConnectivityMode::Station, Some(endpoint), None)?;

    let bits = signal.wait_for_any_bit(outcome, timings.connect_timeout_ms);
    if bits.contains(SignalBits::STA_CONNECTED) {
        Ok(())
    } else if bits.contains(SignalBits::STA_DISCONNECTED) {
        Err(Error::Disconnected {
            reason: wifi.disconnect_reason(),
        })
    } else {
        Err(Error::Timeout("station connect"))
    }
}

// ───────────────────────────────────────────────────────────────
// DeviceController
// ───────────────────────────────────────────────────────────────

/// Runs the boot sequence once and remembers how it ended.
pub struct DeviceController<H: BoardHooks> {
    hooks: H,
    core: HookCore<H>,
    init_fail_severity: u8,
    boot_attempted: bool,
    initialized: bool,
}

impl<H: BoardHooks> DeviceController<H> {
    pub fn new(hooks: H, core: HookCore<H>) -> Self {
        Self {
            hooks,
            core,
            init_fail_severity: 0,
            boot_attempted: false,
            initialized: false,
        }
    }

    /// Run every boot stage.  Only the first call does anything; later
    /// calls are a [`Error::State`] whether or not the first succeeded.
    pub fn initialize(&mut self) -> Result<()> {
        if self.boot_attempted {
            return Err(Error::State("boot sequence already ran"));
        }
        self.boot_attempted = true;

        for stage in BootStage::ALL {
            if let Some(severity) = stage.severity() {
                self.init_fail_severity = severity;
            }
            debug!("Boot: stage {} {:?}", stage.number(), stage);
            if let Err(e) = self.run_stage(stage) {
                error!(
                    "Boot: stage {} {:?} failed: {} (severity {})",
                    stage.number(),
                    stage,
                    e,
                    self.init_fail_severity
                );
                return Err(e);
            }
        }

        self.init_fail_severity = 0;
        self.initialized = true;
        info!("Boot: complete");
        Ok(())
    }

    fn run_stage(&mut self, stage: BootStage) -> Result<()> {
        let core = &mut self.core;
        match stage {
            BootStage::EarlyInit => self.hooks.early_init(core),
            BootStage::PeripheralPower => self.hooks.power_peripherals(true),
            BootStage::ConfigStore => core.load_configuration(),
            BootStage::EventLoop => {
                if !core.signal.create() {
                    return Err(Error::State("event signal allocation failed"));
                }
                core.platform.create_event_loop()?;
                Ok(())
            }
            BootStage::NetworkStack => {
                core.platform.init_network_stack()?;
                Ok(())
            }
            BootStage::CriticalInit => self.hooks.critical_init(core),
            BootStage::BoardInit => self.hooks.board_init(core),
            BootStage::PowerSave => {
                if let Err(e) = core.wifi.set_power_save(false) {
                    warn!("Boot: disabling power save: {}", e);
                }
                Ok(())
            }
            BootStage::PostInit => self.hooks.post_init(core),
        }
    }

    /// 0 after a successful boot; otherwise the marker of the failed stage.
    pub fn init_fail_severity(&self) -> u8 {
        self.init_fail_severity
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Forwarded to the board hook; the entry point powers peripherals down
    /// before sleeping or restarting.
    pub fn power_peripherals(&mut self, on: bool) -> Result<()> {
        self.hooks.power_peripherals(on)
    }

    pub fn core(&self) -> &HookCore<H> {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut HookCore<H> {
        &mut self.core
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }
}

#[cfg(all(test, not(target_os = "espidf")))]
mod tests {
    use super::*;
    use crate::adapters::nvs::NvsStore;
    use crate::adapters::platform::SimPlatform;
    use crate::adapters::radio::{ConnectOutcome, SimRadio};

    fn fast() -> Timings {
        Timings {
            connect_timeout_ms: 500,
            scan_timeout_ms: 500,
            stop_timeout_ms: 500,
            ..Timings::default()
        }
    }

    fn core() -> BoardCore<SimRadio, NvsStore, SimPlatform> {
        let mut core = BoardCore::new(SimRadio::new(), NvsStore::new(), SimPlatform::new(), fast());
        core.signal.create();
        core.initialize_wifi().unwrap();
        core
    }

    #[test]
    fn stage_severity_markers() {
        assert_eq!(BootStage::EarlyInit.severity(), Some(5));
        assert_eq!(BootStage::CriticalInit.severity(), Some(5));
        assert_eq!(BootStage::BoardInit.severity(), Some(2));
        assert_eq!(BootStage::PowerSave.severity(), None);
        assert_eq!(BootStage::PostInit.severity(), Some(1));
        assert_eq!(BootStage::PostInit.number(), 9);
    }

    #[test]
    fn no_valid_slot_is_configuration_error() {
        let mut core = core();
        assert_eq!(
            core.start_station(3),
            Err(Error::Config(ConfigError::NoValidEndpoint))
        );
        assert!(core.platform.delays().is_empty());
    }

    #[test]
    fn unscripted_join_connects_first_slot() {
        let mut core = core();
        core.config.endpoints[0] = EndpointConfig::new("Home", "password");
        core.start_station(1).unwrap();
        assert!(core.is_connected_to_ap());
        assert!(core.ensure_station_link(1).is_ok());
    }

    #[test]
    fn default_names_follow_config_name() {
        let mut core = core();
        core.config.name = "Shed".into();
        assert_eq!(core.default_name().as_str(), "Shed-EFCAFE");
        assert_eq!(core.hostname().as_str(), "shed-efcafe");
        let cred = core.default_credential();
        assert_eq!(cred.identifier, cred.secret);
    }

    #[test]
    fn retry_outcomes_follow_script() {
        let radio = SimRadio::new();
        let handle = radio.handle();
        let mut core = BoardCore::new(radio, NvsStore::new(), SimPlatform::new(), fast());
        core.signal.create();
        core.initialize_wifi().unwrap();
        core.config.endpoints[0] = EndpointConfig::new("Home", "password");
        handle.push_outcome(ConnectOutcome::Disconnected(crate::app::events::reason::AUTH_FAIL));
        handle.push_outcome(ConnectOutcome::Disconnected(crate::app::events::reason::AUTH_FAIL));

        assert_eq!(
            core.start_station(2),
            Err(Error::Disconnected {
                reason: crate::app::events::reason::AUTH_FAIL
            })
        );
        assert_eq!(handle.connect_attempts(), 2);
        // No pause after the final refusal.
        assert_eq!(core.platform.delays().len(), 1);
        assert!((100..=611).contains(&core.platform.delays()[0]));
    }

    #[test]
    fn silent_join_times_out_without_backoff() {
        let radio = SimRadio::new();
        let handle = radio.handle();
        let mut core = BoardCore::new(radio, NvsStore::new(), SimPlatform::new(), fast());
        core.signal.create();
        core.initialize_wifi().unwrap();
        core.config.endpoints[1] = EndpointConfig::new("Backup", "password");
        handle.push_outcome(ConnectOutcome::Silent);

        assert_eq!(core.start_station(1), Err(Error::Timeout("station connect")));
        assert!(core.platform.delays().is_empty());
    }

    #[test]
    fn ap_uses_mac_derived_credential() {
        let radio = SimRadio::new();
        let handle = radio.handle();
        let mut core = BoardCore::new(radio, NvsStore::new(), SimPlatform::new(), fast());
        core.signal.create();
        core.start_ap().unwrap();
        assert_eq!(core.wifi.mode(), ConnectivityMode::AccessPoint);
        let ap = handle.access_point_config().unwrap();
        assert_eq!(ap.ssid.as_str(), "board-EFCAFE");
        core.stop_ap().unwrap();
        assert!(!core.wifi.is_initialized());
    }
}
