//! WiFi connectivity manager.
//!
//! Wraps a [`RadioDriver`] in an explicit mode/status state machine.  The
//! driver answers commands asynchronously: outcomes arrive as
//! [`DriverEvent`]s on the driver's own task, are translated by
//! [`ConnectivityManager::handle_event`], and are published to waiters via
//! the shared [`EventSignal`].
//!
//! ```text
//!   start(Station, slot) ──▶ set_mode / set_config / start
//!                                     │
//!   driver task: StaStart ──▶ connect │
//!                StaGotIp ──▶ status Connected, STA_CONNECTED ──▶ waiter
//! ```
//!
//! Locking: the state lock is only held for field updates, never across a
//! driver call or a wait.  The driver lock is never held across a wait.
//! When both are needed the driver lock is taken and released first.

pub mod endpoint;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, error, info, warn};

use crate::app::events::{DriverEvent, EventCallback, EventNamespace, IpEvent, WifiEvent};
use crate::app::ports::{RadioDriver, RadioMode};
use crate::error::{ConfigError, DriverError, Error, Result};
use crate::events::{EventSignal, SignalBits};

use endpoint::{ApRecord, EndpointConfig, ScanRequest, StationDescriptor};

// ---------------------------------------------------------------------------
// Mode and status
// ---------------------------------------------------------------------------

/// Requested operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectivityMode {
    #[default]
    None,
    Station,
    AccessPoint,
    AccessPointStation,
    /// Station interface up, unassociated, running an active scan.
    Scan,
}

impl ConnectivityMode {
    pub const fn has_station(self) -> bool {
        matches!(self, Self::Station | Self::AccessPointStation | Self::Scan)
    }

    pub const fn has_access_point(self) -> bool {
        matches!(self, Self::AccessPoint | Self::AccessPointStation)
    }

    const fn radio_mode(self) -> RadioMode {
        match self {
            Self::None => RadioMode::Off,
            Self::Station | Self::Scan => RadioMode::Station,
            Self::AccessPoint => RadioMode::AccessPoint,
            Self::AccessPointStation => RadioMode::AccessPointStation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectivityStatus {
    #[default]
    Idle,
    Connecting,
    Connected,
    Disconnected,
    ApCreated,
    ScanInitiated,
    ScanDone,
    Error,
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ManagerState {
    status: ConnectivityStatus,
    mode: ConnectivityMode,
    disconnect_reason: u8,
    scan_records: Vec<ApRecord>,
    initialized: bool,
}

struct Shared<D: RadioDriver + 'static> {
    driver: Mutex<D>,
    state: Mutex<ManagerState>,
    signal: EventSignal,
    stop_timeout_ms: u32,
}

impl<D: RadioDriver + 'static> Shared<D> {
    fn driver(&self) -> MutexGuard<'_, D> {
        self.driver.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_status(&self, status: ConnectivityStatus) {
        self.state().status = status;
    }

    /// The single translation point from driver events to state changes and
    /// signal bits.  Runs on the driver task.
    ///
    /// "Station started" issues the join in every station-bearing mode
    /// except [`ConnectivityMode::Scan`], where the station interface only
    /// runs the scan and stays unassociated.
    fn handle_event(&self, event: DriverEvent) {
        match event {
            DriverEvent::Wifi(WifiEvent::StaStart) => {
                // A scan runs unassociated.
                if self.state().mode == ConnectivityMode::Scan {
                    debug!("wifi: station started for scan");
                    return;
                }
                if let Err(e) = self.driver().connect() {
                    error!("wifi: {}", e);
                }
            }
            DriverEvent::Wifi(WifiEvent::StaDisconnected { ssid, reason }) => {
                {
                    let mut st = self.state();
                    st.disconnect_reason = reason;
                    st.status = ConnectivityStatus::Disconnected;
                }
                // No automatic reconnect; the owner rejoins.
                warn!("wifi: disconnected from {}, reason {}", ssid, reason);
                self.signal.set_bits(SignalBits::STA_DISCONNECTED);
            }
            DriverEvent::Wifi(WifiEvent::ApStart) => {
                self.signal.set_bits(SignalBits::AP_STARTED);
            }
            DriverEvent::Wifi(WifiEvent::ApStop) => {
                self.signal.set_bits(SignalBits::AP_STOPPED);
            }
            DriverEvent::Wifi(WifiEvent::ApStaConnected { mac, aid }) => {
                info!("wifi: station {} joined, AID={}", fmt_mac(&mac), aid);
            }
            DriverEvent::Wifi(WifiEvent::ApStaDisconnected { mac, aid }) => {
                info!("wifi: station {} left, AID={}", fmt_mac(&mac), aid);
            }
            DriverEvent::Wifi(WifiEvent::ScanDone { count }) => {
                let records = match self.driver().scan_records() {
                    Ok(records) => records,
                    Err(e) => {
                        error!("wifi: scan harvest: {}", e);
                        Vec::new()
                    }
                };
                debug!("wifi: scan done ({} reported, {} harvested)", count, records.len());
                {
                    let mut st = self.state();
                    st.scan_records = records;
                    st.status = ConnectivityStatus::ScanDone;
                }
                self.signal.set_bits(SignalBits::SCAN_DONE);
            }
            DriverEvent::Ip(IpEvent::StaGotIp { ip }) => {
                self.set_status(ConnectivityStatus::Connected);
                info!("wifi: got IP {}", ip);
                self.signal.set_bits(SignalBits::STA_CONNECTED);
            }
            DriverEvent::Ip(IpEvent::StaLostIp) => debug!("wifi: lost IP"),
            other => debug!("wifi: unhandled event {:?}", other),
        }
    }
}

fn fmt_mac(mac: &[u8; 6]) -> heapless::String<18> {
    use core::fmt::Write;
    let mut s = heapless::String::new();
    let _ = write!(
        s,
        "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    );
    s
}

// ---------------------------------------------------------------------------
// ConnectivityManager
// ---------------------------------------------------------------------------

/// Mode/status state machine over an asynchronous radio driver.
pub struct ConnectivityManager<D: RadioDriver + 'static> {
    shared: Arc<Shared<D>>,
}

impl<D: RadioDriver + 'static> ConnectivityManager<D> {
    /// Wrap `driver`.  Completion bits are published on `signal`;
    /// `stop(true)` waits up to `stop_timeout_ms` for them.
    pub fn new(driver: D, signal: EventSignal, stop_timeout_ms: u32) -> Self {
        Self {
            shared: Arc::new(Shared {
                driver: Mutex::new(driver),
                state: Mutex::new(ManagerState::default()),
                signal,
                stop_timeout_ms,
            }),
        }
    }

    /// The callback handed to the driver.  Holds only a weak reference so
    /// the driver → callback → manager chain does not keep itself alive.
    fn event_callback(&self) -> EventCallback {
        let weak = Arc::downgrade(&self.shared);
        Arc::new(move |event| {
            if let Some(shared) = weak.upgrade() {
                shared.handle_event(event);
            }
        })
    }

    /// Bring the driver up: interfaces, driver init, event subscription,
    /// mode Off.  Any failure leaves the status at `Error`.
    pub fn initialize(&self) -> Result<()> {
        if self.shared.state().initialized {
            debug!("wifi: already initialized");
            return Ok(());
        }
        self.shared.set_status(ConnectivityStatus::Idle);

        match self.bring_up(self.event_callback()) {
            Ok(()) => {
                self.shared.state().initialized = true;
                info!("wifi: initialized");
                Ok(())
            }
            Err(e) => {
                self.shared.set_status(ConnectivityStatus::Error);
                error!("wifi: initialize: {}", e);
                Err(e.into())
            }
        }
    }

    fn bring_up(&self, callback: EventCallback) -> core::result::Result<(), DriverError> {
        let mut drv = self.shared.driver();
        // Interfaces must exist before the driver is initialised.
        drv.create_interfaces()?;
        drv.init()?;
        drv.subscribe(EventNamespace::Wifi, callback.clone())?;
        drv.subscribe(EventNamespace::Ip, callback)?;
        drv.set_mode(RadioMode::Off)
    }

    /// Tear the driver down again.  Unsubscribe failures are recorded but do
    /// not stop the teardown.
    pub fn clean(&self) -> Result<()> {
        let mut status = ConnectivityStatus::Idle;
        let result = {
            let mut drv = self.shared.driver();
            if let Err(e) = drv.set_mode(RadioMode::Off) {
                debug!("wifi: clean: {}", e);
            }
            for ns in [EventNamespace::Ip, EventNamespace::Wifi] {
                if let Err(e) = drv.unsubscribe(ns) {
                    warn!("wifi: clean: {}", e);
                    status = ConnectivityStatus::Error;
                }
            }
            drv.deinit().and_then(|()| drv.destroy_interfaces())
        };

        let mut st = self.shared.state();
        st.initialized = false;
        st.mode = ConnectivityMode::None;
        match result {
            Ok(()) => {
                st.status = status;
                info!("wifi: cleaned");
                Ok(())
            }
            Err(e) => {
                st.status = ConnectivityStatus::Error;
                Err(e.into())
            }
        }
    }

    /// Configure and start `mode`.
    ///
    /// Station-containing modes need `sta`, AP-containing modes need `ap`.
    /// The status is updated before the first driver command.  Any failure
    /// puts the radio back to Off, the status to `Error` and the mode to
    /// `None`.
    pub fn start(
        &self,
        mode: ConnectivityMode,
        sta: Option<&EndpointConfig>,
        ap: Option<&EndpointConfig>,
    ) -> Result<()> {
        {
            let mut st = self.shared.state();
            if !st.initialized {
                return Err(Error::State("connectivity not initialized"));
            }
            if st.mode != ConnectivityMode::None {
                return Err(Error::State("a connectivity mode is already active"));
            }
            st.status = match mode {
                ConnectivityMode::None => {
                    return Err(Error::State("cannot start mode None"));
                }
                ConnectivityMode::Station => ConnectivityStatus::Connecting,
                ConnectivityMode::AccessPoint | ConnectivityMode::AccessPointStation => {
                    ConnectivityStatus::ApCreated
                }
                ConnectivityMode::Scan => ConnectivityStatus::ScanInitiated,
            };
            st.mode = mode;
        }

        let result = self.configure_and_start(mode, sta, ap);
        if let Err(e) = result {
            if let Err(off) = self.shared.driver().set_mode(RadioMode::Off) {
                debug!("wifi: reset mode: {}", off);
            }
            let mut st = self.shared.state();
            st.status = ConnectivityStatus::Error;
            st.mode = ConnectivityMode::None;
            warn!("wifi: start {:?} failed: {}", mode, e);
            return Err(e);
        }
        info!("wifi: started {:?}", mode);
        Ok(())
    }

    fn configure_and_start(
        &self,
        mode: ConnectivityMode,
        sta: Option<&EndpointConfig>,
        ap: Option<&EndpointConfig>,
    ) -> Result<()> {
        let sta_desc = if mode == ConnectivityMode::Scan {
            Some(StationDescriptor::default())
        } else if mode.has_station() {
            let ep = sta.ok_or(ConfigError::MissingEndpoint("station"))?;
            Some(ep.station_descriptor()?)
        } else {
            None
        };
        let ap_desc = if mode.has_access_point() {
            let ep = ap.ok_or(ConfigError::MissingEndpoint("access point"))?;
            Some(ep.access_point_descriptor()?)
        } else {
            None
        };

        let mut drv = self.shared.driver();
        drv.set_mode(mode.radio_mode())?;
        if let Some(desc) = &sta_desc {
            drv.set_station_config(desc)?;
        }
        if let Some(desc) = &ap_desc {
            drv.set_access_point_config(desc)?;
        }
        drv.start()?;
        if mode == ConnectivityMode::Scan {
            drv.start_scan(&ScanRequest::default())?;
        }
        Ok(())
    }

    /// Stop the radio.
    ///
    /// With `wait`, blocks until the completion bits for the mode in effect
    /// are all seen (AP stopped for AP modes, station disconnected when
    /// associated) or the stop timeout expires.  Mode returns to `None` and
    /// the radio to Off in every case.
    pub fn stop(&self, wait: bool) -> Result<()> {
        let mode = {
            let st = self.shared.state();
            if !st.initialized {
                return Err(Error::State("connectivity not initialized"));
            }
            st.mode
        };

        let (stopped, wait_bits) = {
            let mut drv = self.shared.driver();
            let mut bits = SignalBits::NONE;
            if wait {
                if mode.has_access_point() {
                    bits |= SignalBits::AP_STOPPED;
                }
                if mode.has_station() && drv.associated_ap().is_some() {
                    bits |= SignalBits::STA_DISCONNECTED;
                }
            }
            (drv.stop(), bits)
        };

        let result = match stopped {
            Err(e) => Err(Error::from(e)),
            Ok(()) if wait_bits.is_empty() => Ok(()),
            Ok(()) => {
                let got = self
                    .shared
                    .signal
                    .wait_for_all_bits(wait_bits, self.shared.stop_timeout_ms);
                if got.contains(wait_bits) {
                    Ok(())
                } else {
                    Err(Error::Timeout("radio stop"))
                }
            }
        };

        {
            let mut st = self.shared.state();
            st.status = if result.is_ok() {
                ConnectivityStatus::Idle
            } else {
                ConnectivityStatus::Error
            };
            st.mode = ConnectivityMode::None;
        }
        if let Err(e) = self.shared.driver().set_mode(RadioMode::Off) {
            debug!("wifi: reset mode: {}", e);
        }
        match &result {
            Ok(()) => debug!("wifi: stopped {:?}", mode),
            Err(e) => warn!("wifi: stop {:?}: {}", mode, e),
        }
        result
    }

    /// Feed one driver event through the translation function.  The
    /// subscribed callback does the same thing from the driver task.
    ///
    /// Station start joins the configured network unless the mode is
    /// [`ConnectivityMode::Scan`]; a scan never joins.
    pub fn handle_event(&self, event: DriverEvent) {
        self.shared.handle_event(event);
    }

    pub fn signal(&self) -> &EventSignal {
        &self.shared.signal
    }

    pub fn is_initialized(&self) -> bool {
        self.shared.state().initialized
    }

    pub fn status(&self) -> ConnectivityStatus {
        self.shared.state().status
    }

    pub fn mode(&self) -> ConnectivityMode {
        self.shared.state().mode
    }

    /// Reason code of the last station disconnect.
    pub fn disconnect_reason(&self) -> u8 {
        self.shared.state().disconnect_reason
    }

    /// The access point the station is associated with.
    pub fn ap_info(&self) -> Option<ApRecord> {
        self.shared.driver().associated_ap()
    }

    pub fn scan_record_count(&self) -> usize {
        self.shared.state().scan_records.len()
    }

    /// Copy of the `index`-th record of the last scan.
    pub fn scan_record(&self, index: usize) -> Option<ApRecord> {
        self.shared.state().scan_records.get(index).cloned()
    }

    /// Copy of every record of the last scan.
    pub fn scan_records(&self) -> Vec<ApRecord> {
        self.shared.state().scan_records.clone()
    }

    pub fn free_scan_records(&self) {
        let mut st = self.shared.state();
        st.scan_records = Vec::new();
    }

    /// Enable (modem sleep) or disable radio power saving.
    pub fn set_power_save(&self, enabled: bool) -> Result<()> {
        self.shared
            .driver()
            .set_power_save(enabled)
            .map_err(Error::from)
    }
}

impl<D: RadioDriver + 'static> Drop for ConnectivityManager<D> {
    fn drop(&mut self) {
        if self.is_initialized() {
            let _ = self.stop(false);
            let _ = self.clean();
        }
    }
}
