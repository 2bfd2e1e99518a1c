//! WiFi radio adapter.
//!
//! Implements [`RadioDriver`](crate::app::ports::RadioDriver) for the
//! ESP-IDF WiFi driver and for a host simulation.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: [`EspRadio`] issues raw `esp_wifi_*` calls
//!   and converts `WIFI_EVENT` / `IP_EVENT` callbacks into
//!   [`DriverEvent`](crate::app::events::DriverEvent)s.
//! - **all other targets**: [`SimRadio`] models the driver's behaviour,
//!   delivering events on its own thread exactly like the ESP-IDF default
//!   event loop task would.  A [`SimRadioHandle`] scripts join outcomes,
//!   injects failures and records every command for assertions.

#[cfg(not(target_os = "espidf"))]
pub use sim::{ConnectOutcome, SimOp, SimRadio, SimRadioHandle};

#[cfg(target_os = "espidf")]
pub use esp::EspRadio;

// ── Simulation ────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
mod sim {
    use std::collections::VecDeque;
    use std::net::Ipv4Addr;
    use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError};
    use std::thread;

    use log::{debug, info};

    use crate::app::events::{
        reason, DriverEvent, EventCallback, EventNamespace, IpEvent, WifiEvent,
    };
    use crate::app::ports::{RadioDriver, RadioMode};
    use crate::connectivity::endpoint::{
        AccessPointDescriptor, ApRecord, AuthMode, ScanRequest, StationDescriptor,
    };
    use crate::error::DriverError;

    // Vendor error codes reproduced so host failures look like target ones.
    const ESP_FAIL: i32 = -1;
    const ESP_ERR_INVALID_STATE: i32 = 0x103;
    const ESP_ERR_WIFI_NOT_INIT: i32 = 0x3001;
    const ESP_ERR_WIFI_NOT_STARTED: i32 = 0x3002;
    const ESP_ERR_WIFI_MODE: i32 = 0x3005;

    /// Every command the simulated driver accepted (or rejected).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum SimOp {
        CreateInterfaces,
        DestroyInterfaces,
        Init,
        Deinit,
        Subscribe(EventNamespace),
        Unsubscribe(EventNamespace),
        SetMode(RadioMode),
        SetStationConfig,
        SetAccessPointConfig,
        Start,
        Stop,
        Connect,
        StartScan,
        SetPowerSave(bool),
    }

    impl SimOp {
        fn name(self) -> &'static str {
            match self {
                Self::CreateInterfaces => "esp_netif_create_default_wifi",
                Self::DestroyInterfaces => "esp_netif_destroy",
                Self::Init => "esp_wifi_init",
                Self::Deinit => "esp_wifi_deinit",
                Self::Subscribe(_) => "esp_event_handler_register",
                Self::Unsubscribe(_) => "esp_event_handler_unregister",
                Self::SetMode(_) => "esp_wifi_set_mode",
                Self::SetStationConfig | Self::SetAccessPointConfig => "esp_wifi_set_config",
                Self::Start => "esp_wifi_start",
                Self::Stop => "esp_wifi_stop",
                Self::Connect => "esp_wifi_connect",
                Self::StartScan => "esp_wifi_scan_start",
                Self::SetPowerSave(_) => "esp_wifi_set_ps",
            }
        }
    }

    /// What the simulated access point does with the next join.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum ConnectOutcome {
        /// Associate and hand out an address.
        Connected,
        /// Refuse the join with the given reason code.
        Disconnected(u8),
        /// Never answer.
        Silent,
    }

    #[derive(Default)]
    struct SimState {
        calls: Vec<SimOp>,
        outcomes: VecDeque<ConnectOutcome>,
        neighbours: Vec<ApRecord>,
        fail_next: Vec<SimOp>,
        interfaces: bool,
        initialized: bool,
        started: bool,
        mode: RadioMode,
        station: Option<StationDescriptor>,
        access_point: Option<AccessPointDescriptor>,
        associated: Option<ApRecord>,
        connect_attempts: usize,
        suppress_stop_events: bool,
        power_save: bool,
    }

    struct Inner {
        state: Mutex<SimState>,
        handlers: Mutex<Vec<(EventNamespace, EventCallback)>>,
    }

    impl Inner {
        fn state(&self) -> MutexGuard<'_, SimState> {
            self.state.lock().unwrap_or_else(PoisonError::into_inner)
        }

        fn handlers(&self) -> MutexGuard<'_, Vec<(EventNamespace, EventCallback)>> {
            self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
        }

        /// Runs on the event thread.  Handlers are cloned out so a callback
        /// may (un)subscribe without deadlocking.
        fn deliver(&self, event: DriverEvent) {
            let ns = event.namespace();
            let targets: Vec<EventCallback> = self
                .handlers()
                .iter()
                .filter(|(n, _)| *n == ns)
                .map(|(_, cb)| cb.clone())
                .collect();
            for cb in targets {
                cb(event.clone());
            }
        }
    }

    /// Simulated WiFi driver.
    pub struct SimRadio {
        inner: Arc<Inner>,
        tx: mpsc::Sender<DriverEvent>,
    }

    /// Test-side control of a [`SimRadio`].  Cheap to clone.
    #[derive(Clone)]
    pub struct SimRadioHandle {
        inner: Arc<Inner>,
        tx: mpsc::Sender<DriverEvent>,
    }

    impl Default for SimRadio {
        fn default() -> Self {
            Self::new()
        }
    }

    impl SimRadio {
        pub fn new() -> Self {
            let inner = Arc::new(Inner {
                state: Mutex::new(SimState::default()),
                handlers: Mutex::new(Vec::new()),
            });
            let (tx, rx) = mpsc::channel::<DriverEvent>();
            let worker = inner.clone();
            // Exits once every sender is gone.  Never joined: the radio may be
            // dropped from inside one of its own callbacks.
            thread::spawn(move || {
                for event in rx {
                    worker.deliver(event);
                }
            });
            info!("wifi(sim): radio created");
            Self { inner, tx }
        }

        pub fn handle(&self) -> SimRadioHandle {
            SimRadioHandle {
                inner: self.inner.clone(),
                tx: self.tx.clone(),
            }
        }

        fn emit(&self, event: DriverEvent) {
            let _ = self.tx.send(event);
        }

        /// Record `op` and fail it if a failure was scripted.
        fn record(&self, op: SimOp) -> Result<MutexGuard<'_, SimState>, DriverError> {
            let mut st = self.inner.state();
            st.calls.push(op);
            if let Some(pos) = st.fail_next.iter().position(|f| *f == op) {
                st.fail_next.remove(pos);
                debug!("wifi(sim): injected failure for {:?}", op);
                return Err(DriverError::new(op.name(), ESP_FAIL));
            }
            Ok(st)
        }
    }

    impl RadioDriver for SimRadio {
        fn create_interfaces(&mut self) -> Result<(), DriverError> {
            self.record(SimOp::CreateInterfaces)?.interfaces = true;
            Ok(())
        }

        fn destroy_interfaces(&mut self) -> Result<(), DriverError> {
            self.record(SimOp::DestroyInterfaces)?.interfaces = false;
            Ok(())
        }

        fn init(&mut self) -> Result<(), DriverError> {
            let mut st = self.record(SimOp::Init)?;
            if !st.interfaces {
                return Err(DriverError::new("esp_wifi_init", ESP_ERR_INVALID_STATE));
            }
            st.initialized = true;
            info!("wifi(sim): driver initialised (RAM storage)");
            Ok(())
        }

        fn deinit(&mut self) -> Result<(), DriverError> {
            let mut st = self.record(SimOp::Deinit)?;
            if !st.initialized {
                return Err(DriverError::new("esp_wifi_deinit", ESP_ERR_WIFI_NOT_INIT));
            }
            st.initialized = false;
            st.started = false;
            st.associated = None;
            Ok(())
        }

        fn subscribe(
            &mut self,
            namespace: EventNamespace,
            callback: EventCallback,
        ) -> Result<(), DriverError> {
            drop(self.record(SimOp::Subscribe(namespace))?);
            self.inner.handlers().push((namespace, callback));
            Ok(())
        }

        fn unsubscribe(&mut self, namespace: EventNamespace) -> Result<(), DriverError> {
            drop(self.record(SimOp::Unsubscribe(namespace))?);
            self.inner.handlers().retain(|(n, _)| *n != namespace);
            Ok(())
        }

        fn set_mode(&mut self, mode: RadioMode) -> Result<(), DriverError> {
            let mut st = self.record(SimOp::SetMode(mode))?;
            if !st.initialized {
                return Err(DriverError::new("esp_wifi_set_mode", ESP_ERR_WIFI_NOT_INIT));
            }
            st.mode = mode;
            Ok(())
        }

        fn set_station_config(&mut self, sta: &StationDescriptor) -> Result<(), DriverError> {
            let mut st = self.record(SimOp::SetStationConfig)?;
            if !st.mode.has_station() {
                return Err(DriverError::new("esp_wifi_set_config", ESP_ERR_WIFI_MODE));
            }
            st.station = Some(sta.clone());
            Ok(())
        }

        fn set_access_point_config(
            &mut self,
            ap: &AccessPointDescriptor,
        ) -> Result<(), DriverError> {
            let mut st = self.record(SimOp::SetAccessPointConfig)?;
            if !st.mode.has_access_point() {
                return Err(DriverError::new("esp_wifi_set_config", ESP_ERR_WIFI_MODE));
            }
            st.access_point = Some(ap.clone());
            Ok(())
        }

        fn start(&mut self) -> Result<(), DriverError> {
            let mode = {
                let mut st = self.record(SimOp::Start)?;
                if !st.initialized {
                    return Err(DriverError::new("esp_wifi_start", ESP_ERR_WIFI_NOT_INIT));
                }
                st.started = true;
                st.mode
            };
            info!("wifi(sim): started in {:?}", mode);
            if mode.has_station() {
                self.emit(DriverEvent::Wifi(WifiEvent::StaStart));
            }
            if mode.has_access_point() {
                self.emit(DriverEvent::Wifi(WifiEvent::ApStart));
            }
            Ok(())
        }

        fn stop(&mut self) -> Result<(), DriverError> {
            let (mode, dropped, quiet) = {
                let mut st = self.record(SimOp::Stop)?;
                if !st.started {
                    return Ok(());
                }
                st.started = false;
                (st.mode, st.associated.take(), st.suppress_stop_events)
            };
            info!("wifi(sim): stopped");
            if quiet {
                return Ok(());
            }
            if let Some(ap) = dropped {
                self.emit(DriverEvent::Wifi(WifiEvent::StaDisconnected {
                    ssid: ap.ssid,
                    reason: reason::ASSOC_LEAVE,
                }));
            }
            if mode.has_station() {
                self.emit(DriverEvent::Wifi(WifiEvent::StaStop));
            }
            if mode.has_access_point() {
                self.emit(DriverEvent::Wifi(WifiEvent::ApStop));
            }
            Ok(())
        }

        fn connect(&mut self) -> Result<(), DriverError> {
            let (outcome, ssid) = {
                let mut st = self.record(SimOp::Connect)?;
                if !st.started || !st.mode.has_station() {
                    return Err(DriverError::new("esp_wifi_connect", ESP_ERR_WIFI_NOT_STARTED));
                }
                st.connect_attempts += 1;
                let ssid = st.station.clone().unwrap_or_default().ssid;
                let outcome = st.outcomes.pop_front().unwrap_or(ConnectOutcome::Connected);
                if outcome == ConnectOutcome::Connected {
                    st.associated = Some(ApRecord {
                        ssid: ssid.clone(),
                        bssid: [0x02, 0x00, 0x00, 0x00, 0x00, 0x01],
                        channel: 6,
                        rssi: -55,
                        auth: AuthMode::Wpa2Psk,
                    });
                }
                (outcome, ssid)
            };
            debug!("wifi(sim): join {} -> {:?}", ssid, outcome);
            match outcome {
                ConnectOutcome::Connected => {
                    self.emit(DriverEvent::Wifi(WifiEvent::StaConnected));
                    self.emit(DriverEvent::Ip(IpEvent::StaGotIp {
                        ip: Ipv4Addr::new(192, 168, 4, 2),
                    }));
                }
                ConnectOutcome::Disconnected(code) => {
                    self.emit(DriverEvent::Wifi(WifiEvent::StaDisconnected {
                        ssid,
                        reason: code,
                    }));
                }
                ConnectOutcome::Silent => {}
            }
            Ok(())
        }

        fn start_scan(&mut self, request: &ScanRequest) -> Result<(), DriverError> {
            let count = {
                let st = self.record(SimOp::StartScan)?;
                if !st.started || !st.mode.has_station() {
                    return Err(DriverError::new(
                        "esp_wifi_scan_start",
                        ESP_ERR_WIFI_NOT_STARTED,
                    ));
                }
                st.neighbours.len().min(usize::from(u8::MAX)) as u8
            };
            debug!("wifi(sim): scan {:?}", request);
            self.emit(DriverEvent::Wifi(WifiEvent::ScanDone { count }));
            Ok(())
        }

        fn scan_records(&mut self) -> Result<Vec<ApRecord>, DriverError> {
            Ok(self.inner.state().neighbours.clone())
        }

        fn associated_ap(&mut self) -> Option<ApRecord> {
            self.inner.state().associated.clone()
        }

        fn set_power_save(&mut self, enabled: bool) -> Result<(), DriverError> {
            self.record(SimOp::SetPowerSave(enabled))?.power_save = enabled;
            Ok(())
        }
    }

    impl SimRadioHandle {
        /// Queue the outcome of a future join.  Unscripted joins succeed.
        pub fn push_outcome(&self, outcome: ConnectOutcome) {
            self.inner.state().outcomes.push_back(outcome);
        }

        pub fn set_neighbours(&self, records: Vec<ApRecord>) {
            self.inner.state().neighbours = records;
        }

        /// Fail the next occurrence of `op` with `ESP_FAIL`.
        pub fn fail_next(&self, op: SimOp) {
            self.inner.state().fail_next.push(op);
        }

        /// Stop emitting completion events on `stop`.
        pub fn suppress_stop_events(&self, quiet: bool) {
            self.inner.state().suppress_stop_events = quiet;
        }

        /// Deliver an arbitrary event through the event thread.
        pub fn inject(&self, event: DriverEvent) {
            let _ = self.tx.send(event);
        }

        /// Drop the current association as if the AP went away.
        pub fn drop_link(&self, code: u8) {
            let lost = self.inner.state().associated.take();
            if let Some(ap) = lost {
                self.inject(DriverEvent::Wifi(WifiEvent::StaDisconnected {
                    ssid: ap.ssid,
                    reason: code,
                }));
            }
        }

        pub fn calls(&self) -> Vec<SimOp> {
            self.inner.state().calls.clone()
        }

        pub fn connect_attempts(&self) -> usize {
            self.inner.state().connect_attempts
        }

        pub fn radio_mode(&self) -> RadioMode {
            self.inner.state().mode
        }

        pub fn is_started(&self) -> bool {
            self.inner.state().started
        }

        pub fn is_associated(&self) -> bool {
            self.inner.state().associated.is_some()
        }

        pub fn power_save(&self) -> bool {
            self.inner.state().power_save
        }

        pub fn station_config(&self) -> Option<StationDescriptor> {
            self.inner.state().station.clone()
        }

        pub fn access_point_config(&self) -> Option<AccessPointDescriptor> {
            self.inner.state().access_point.clone()
        }

        pub fn subscriber_count(&self) -> usize {
            self.inner.handlers().len()
        }
    }

}

// ── ESP-IDF ───────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod esp {
    use core::ffi::c_void;
    use std::net::Ipv4Addr;

    use esp_idf_svc::sys::*;
    use log::{debug, info};

    use super::super::utils::{copy_nul_terminated, esp_check, str_from_nul};
    use crate::app::events::{DriverEvent, EventCallback, EventNamespace, IpEvent, WifiEvent};
    use crate::app::ports::{RadioDriver, RadioMode};
    use crate::connectivity::endpoint::{
        AccessPointDescriptor, ApRecord, AuthMode, ScanRequest, StationDescriptor,
    };
    use crate::error::DriverError;

    /// Heap-pinned registration; its address is the handler argument.
    struct Subscription {
        namespace: EventNamespace,
        callback: EventCallback,
    }

    /// ESP-IDF WiFi driver.
    pub struct EspRadio {
        sta_netif: *mut esp_netif_t,
        ap_netif: *mut esp_netif_t,
        wifi_sub: Option<Box<Subscription>>,
        ip_sub: Option<Box<Subscription>>,
    }

    // SAFETY: the netif handles are only touched through `&mut self`, and the
    // owning manager serialises all access behind a mutex.
    unsafe impl Send for EspRadio {}

    impl Default for EspRadio {
        fn default() -> Self {
            Self::new()
        }
    }

    impl EspRadio {
        pub fn new() -> Self {
            Self {
                sta_netif: core::ptr::null_mut(),
                ap_netif: core::ptr::null_mut(),
                wifi_sub: None,
                ip_sub: None,
            }
        }

        fn slot(&mut self, namespace: EventNamespace) -> &mut Option<Box<Subscription>> {
            match namespace {
                EventNamespace::Wifi => &mut self.wifi_sub,
                EventNamespace::Ip => &mut self.ip_sub,
            }
        }
    }

    fn event_base(namespace: EventNamespace) -> esp_event_base_t {
        // SAFETY: the event bases are immutable statics defined by ESP-IDF.
        unsafe {
            match namespace {
                EventNamespace::Wifi => WIFI_EVENT,
                EventNamespace::Ip => IP_EVENT,
            }
        }
    }

    /// `WIFI_INIT_CONFIG_DEFAULT()` is a C macro; rebuild it from the
    /// Kconfig constants.
    fn default_init_config() -> wifi_init_config_t {
        // SAFETY: only the addresses / values of driver-provided globals are read.
        unsafe {
            wifi_init_config_t {
                osi_funcs: &raw mut g_wifi_osi_funcs,
                wpa_crypto_funcs: g_wifi_default_wpa_crypto_funcs,
                static_rx_buf_num: CONFIG_ESP_WIFI_STATIC_RX_BUFFER_NUM as _,
                dynamic_rx_buf_num: CONFIG_ESP_WIFI_DYNAMIC_RX_BUFFER_NUM as _,
                tx_buf_type: CONFIG_ESP_WIFI_TX_BUFFER_TYPE as _,
                static_tx_buf_num: WIFI_STATIC_TX_BUFFER_NUM as _,
                dynamic_tx_buf_num: WIFI_DYNAMIC_TX_BUFFER_NUM as _,
                cache_tx_buf_num: WIFI_CACHE_TX_BUFFER_NUM as _,
                csi_enable: WIFI_CSI_ENABLED as _,
                ampdu_rx_enable: WIFI_AMPDU_RX_ENABLED as _,
                ampdu_tx_enable: WIFI_AMPDU_TX_ENABLED as _,
                amsdu_tx_enable: WIFI_AMSDU_TX_ENABLED as _,
                nvs_enable: WIFI_NVS_ENABLED as _,
                nano_enable: WIFI_NANO_FORMAT_ENABLED as _,
                rx_ba_win: WIFI_DEFAULT_RX_BA_WIN as _,
                wifi_task_core_id: WIFI_TASK_CORE_ID as _,
                beacon_max_len: WIFI_SOFTAP_BEACON_MAX_LEN as _,
                mgmt_sbuf_num: WIFI_MGMT_SBUF_NUM as _,
                feature_caps: g_wifi_feature_caps,
                sta_disconnected_pm: WIFI_STA_DISCONNECTED_PM_ENABLED != 0,
                magic: WIFI_INIT_CONFIG_MAGIC as _,
                ..Default::default()
            }
        }
    }

    fn auth_from_raw(raw: wifi_auth_mode_t) -> AuthMode {
        #[allow(non_upper_case_globals)]
        match raw {
            wifi_auth_mode_t_WIFI_AUTH_OPEN => AuthMode::Open,
            wifi_auth_mode_t_WIFI_AUTH_WEP => AuthMode::Wep,
            wifi_auth_mode_t_WIFI_AUTH_WPA_PSK => AuthMode::WpaPsk,
            wifi_auth_mode_t_WIFI_AUTH_WPA2_PSK => AuthMode::Wpa2Psk,
            wifi_auth_mode_t_WIFI_AUTH_WPA_WPA2_PSK => AuthMode::WpaWpa2Psk,
            wifi_auth_mode_t_WIFI_AUTH_WPA2_ENTERPRISE => AuthMode::Wpa2Enterprise,
            wifi_auth_mode_t_WIFI_AUTH_WPA3_PSK => AuthMode::Wpa3Psk,
            wifi_auth_mode_t_WIFI_AUTH_WPA2_WPA3_PSK => AuthMode::Wpa2Wpa3Psk,
            _ => AuthMode::Unknown,
        }
    }

    fn auth_to_raw(auth: AuthMode) -> wifi_auth_mode_t {
        match auth {
            AuthMode::Open => wifi_auth_mode_t_WIFI_AUTH_OPEN,
            AuthMode::Wep => wifi_auth_mode_t_WIFI_AUTH_WEP,
            AuthMode::WpaPsk => wifi_auth_mode_t_WIFI_AUTH_WPA_PSK,
            AuthMode::Wpa2Psk | AuthMode::Unknown => wifi_auth_mode_t_WIFI_AUTH_WPA2_PSK,
            AuthMode::WpaWpa2Psk => wifi_auth_mode_t_WIFI_AUTH_WPA_WPA2_PSK,
            AuthMode::Wpa2Enterprise => wifi_auth_mode_t_WIFI_AUTH_WPA2_ENTERPRISE,
            AuthMode::Wpa3Psk => wifi_auth_mode_t_WIFI_AUTH_WPA3_PSK,
            AuthMode::Wpa2Wpa3Psk => wifi_auth_mode_t_WIFI_AUTH_WPA2_WPA3_PSK,
        }
    }

    fn record_from_raw(rec: &wifi_ap_record_t) -> ApRecord {
        ApRecord::new(
            str_from_nul(&rec.ssid),
            rec.bssid,
            rec.primary,
            rec.rssi,
            auth_from_raw(rec.authmode),
        )
    }

    /// Convert a raw `(base, id, data)` triple.
    ///
    /// # Safety
    ///
    /// `data` must point to the payload type ESP-IDF documents for `id`.
    #[allow(non_upper_case_globals)]
    unsafe fn convert(namespace: EventNamespace, id: i32, data: *mut c_void) -> DriverEvent {
        match namespace {
            EventNamespace::Wifi => DriverEvent::Wifi(match id as u32 {
                wifi_event_t_WIFI_EVENT_STA_START => WifiEvent::StaStart,
                wifi_event_t_WIFI_EVENT_STA_STOP => WifiEvent::StaStop,
                wifi_event_t_WIFI_EVENT_STA_CONNECTED => WifiEvent::StaConnected,
                wifi_event_t_WIFI_EVENT_STA_DISCONNECTED => {
                    // SAFETY: caller guarantees the payload type for this id.
                    let d = unsafe { &*(data as *const wifi_event_sta_disconnected_t) };
                    let len = usize::from(d.ssid_len).min(d.ssid.len());
                    let mut ssid = heapless::String::new();
                    let _ = ssid.push_str(str_from_nul(&d.ssid[..len]));
                    WifiEvent::StaDisconnected {
                        ssid,
                        reason: d.reason as u8,
                    }
                }
                wifi_event_t_WIFI_EVENT_AP_START => WifiEvent::ApStart,
                wifi_event_t_WIFI_EVENT_AP_STOP => WifiEvent::ApStop,
                wifi_event_t_WIFI_EVENT_AP_STACONNECTED => {
                    // SAFETY: as above.
                    let d = unsafe { &*(data as *const wifi_event_ap_staconnected_t) };
                    WifiEvent::ApStaConnected { mac: d.mac, aid: d.aid }
                }
                wifi_event_t_WIFI_EVENT_AP_STADISCONNECTED => {
                    // SAFETY: as above.
                    let d = unsafe { &*(data as *const wifi_event_ap_stadisconnected_t) };
                    WifiEvent::ApStaDisconnected { mac: d.mac, aid: d.aid }
                }
                wifi_event_t_WIFI_EVENT_SCAN_DONE => {
                    // SAFETY: as above.
                    let d = unsafe { &*(data as *const wifi_event_sta_scan_done_t) };
                    WifiEvent::ScanDone { count: d.number }
                }
                other => WifiEvent::Other(other as i32),
            }),
            EventNamespace::Ip => DriverEvent::Ip(match id as u32 {
                ip_event_t_IP_EVENT_STA_GOT_IP => {
                    // SAFETY: as above.
                    let d = unsafe { &*(data as *const ip_event_got_ip_t) };
                    IpEvent::StaGotIp {
                        ip: Ipv4Addr::from(d.ip_info.ip.addr.to_le_bytes()),
                    }
                }
                ip_event_t_IP_EVENT_STA_LOST_IP => IpEvent::StaLostIp,
                other => IpEvent::Other(other as i32),
            }),
        }
    }

    unsafe extern "C" fn trampoline(
        arg: *mut c_void,
        _base: esp_event_base_t,
        id: i32,
        data: *mut c_void,
    ) {
        if arg.is_null() {
            return;
        }
        // SAFETY: `arg` is the address of a boxed Subscription that stays
        // alive until its handler is unregistered.
        let sub = unsafe { &*(arg as *const Subscription) };
        // SAFETY: ESP-IDF passes the payload matching `id`.
        let event = unsafe { convert(sub.namespace, id, data) };
        (sub.callback)(event);
    }

    impl RadioDriver for EspRadio {
        fn create_interfaces(&mut self) -> Result<(), DriverError> {
            self.destroy_interfaces()?;
            // SAFETY: called from the boot task after esp_netif_init and
            // before esp_wifi_init, as ESP-IDF requires.
            unsafe {
                self.ap_netif = esp_netif_create_default_wifi_ap();
                self.sta_netif = esp_netif_create_default_wifi_sta();
            }
            if self.ap_netif.is_null() || self.sta_netif.is_null() {
                return Err(DriverError::new("esp_netif_create_default_wifi", ESP_FAIL));
            }
            Ok(())
        }

        fn destroy_interfaces(&mut self) -> Result<(), DriverError> {
            // SAFETY: the handles were created by esp_netif_create_default_*
            // and are nulled after destruction.
            unsafe {
                if !self.sta_netif.is_null() {
                    esp_netif_destroy(self.sta_netif);
                    self.sta_netif = core::ptr::null_mut();
                }
                if !self.ap_netif.is_null() {
                    esp_netif_destroy(self.ap_netif);
                    self.ap_netif = core::ptr::null_mut();
                }
            }
            Ok(())
        }

        fn init(&mut self) -> Result<(), DriverError> {
            let cfg = default_init_config();
            // SAFETY: cfg is a fully initialised config living for the call.
            esp_check("esp_wifi_init", unsafe { esp_wifi_init(&cfg) })?;
            // SAFETY: driver initialised above.
            esp_check("esp_wifi_set_storage", unsafe {
                esp_wifi_set_storage(wifi_storage_t_WIFI_STORAGE_RAM)
            })?;
            info!("wifi: driver initialised (RAM storage)");
            Ok(())
        }

        fn deinit(&mut self) -> Result<(), DriverError> {
            // SAFETY: plain driver call.
            esp_check("esp_wifi_deinit", unsafe { esp_wifi_deinit() })
        }

        fn subscribe(
            &mut self,
            namespace: EventNamespace,
            callback: EventCallback,
        ) -> Result<(), DriverError> {
            self.unsubscribe(namespace)?;
            let sub = Box::new(Subscription { namespace, callback });
            let arg = &*sub as *const Subscription as *mut c_void;
            // SAFETY: the box is stored in `self` below and outlives the
            // registration; unsubscribe unregisters before dropping it.
            esp_check("esp_event_handler_register", unsafe {
                esp_event_handler_register(
                    event_base(namespace),
                    ESP_EVENT_ANY_ID,
                    Some(trampoline),
                    arg,
                )
            })?;
            *self.slot(namespace) = Some(sub);
            Ok(())
        }

        fn unsubscribe(&mut self, namespace: EventNamespace) -> Result<(), DriverError> {
            if self.slot(namespace).is_none() {
                return Ok(());
            }
            // SAFETY: unregisters the handler registered in `subscribe`.
            let ret = unsafe {
                esp_event_handler_unregister(
                    event_base(namespace),
                    ESP_EVENT_ANY_ID,
                    Some(trampoline),
                )
            };
            esp_check("esp_event_handler_unregister", ret)?;
            *self.slot(namespace) = None;
            Ok(())
        }

        fn set_mode(&mut self, mode: RadioMode) -> Result<(), DriverError> {
            let raw = match mode {
                RadioMode::Off => wifi_mode_t_WIFI_MODE_NULL,
                RadioMode::Station => wifi_mode_t_WIFI_MODE_STA,
                RadioMode::AccessPoint => wifi_mode_t_WIFI_MODE_AP,
                RadioMode::AccessPointStation => wifi_mode_t_WIFI_MODE_APSTA,
            };
            // SAFETY: plain driver call.
            esp_check("esp_wifi_set_mode", unsafe { esp_wifi_set_mode(raw) })
        }

        fn set_station_config(&mut self, sta: &StationDescriptor) -> Result<(), DriverError> {
            let mut sta_cfg = wifi_sta_config_t::default();
            copy_nul_terminated(&sta.ssid, &mut sta_cfg.ssid);
            copy_nul_terminated(&sta.password, &mut sta_cfg.password);
            let mut cfg = wifi_config_t { sta: sta_cfg };
            // SAFETY: cfg lives for the duration of the call.
            esp_check("esp_wifi_set_config", unsafe {
                esp_wifi_set_config(wifi_interface_t_WIFI_IF_STA, &mut cfg)
            })
        }

        fn set_access_point_config(
            &mut self,
            ap: &AccessPointDescriptor,
        ) -> Result<(), DriverError> {
            let mut ap_cfg = wifi_ap_config_t::default();
            copy_nul_terminated(&ap.ssid, &mut ap_cfg.ssid);
            copy_nul_terminated(&ap.password, &mut ap_cfg.password);
            ap_cfg.ssid_len = 0;
            ap_cfg.channel = ap.channel;
            ap_cfg.authmode = auth_to_raw(ap.auth);
            ap_cfg.ssid_hidden = u8::from(ap.hidden);
            ap_cfg.max_connection = ap.max_connections;
            ap_cfg.beacon_interval = ap.beacon_interval;
            let mut cfg = wifi_config_t { ap: ap_cfg };
            // SAFETY: cfg lives for the duration of the call.
            esp_check("esp_wifi_set_config", unsafe {
                esp_wifi_set_config(wifi_interface_t_WIFI_IF_AP, &mut cfg)
            })
        }

        fn start(&mut self) -> Result<(), DriverError> {
            // SAFETY: plain driver call.
            esp_check("esp_wifi_start", unsafe { esp_wifi_start() })
        }

        fn stop(&mut self) -> Result<(), DriverError> {
            // SAFETY: plain driver call.
            let ret = unsafe { esp_wifi_stop() };
            if ret == ESP_ERR_WIFI_NOT_STARTED as esp_err_t {
                return Ok(());
            }
            esp_check("esp_wifi_stop", ret)
        }

        fn connect(&mut self) -> Result<(), DriverError> {
            // SAFETY: plain driver call.
            esp_check("esp_wifi_connect", unsafe { esp_wifi_connect() })
        }

        fn start_scan(&mut self, request: &ScanRequest) -> Result<(), DriverError> {
            let cfg = wifi_scan_config_t {
                ssid: core::ptr::null_mut(),
                bssid: core::ptr::null_mut(),
                channel: request.channel,
                show_hidden: request.show_hidden,
                scan_type: if request.active {
                    wifi_scan_type_t_WIFI_SCAN_TYPE_ACTIVE
                } else {
                    wifi_scan_type_t_WIFI_SCAN_TYPE_PASSIVE
                },
                scan_time: wifi_scan_time_t {
                    active: wifi_active_scan_time_t {
                        min: request.dwell_min_ms,
                        max: request.dwell_max_ms,
                    },
                    passive: request.dwell_max_ms,
                },
                ..Default::default()
            };
            // SAFETY: non-blocking scan; cfg is copied by the driver.
            esp_check("esp_wifi_scan_start", unsafe { esp_wifi_scan_start(&cfg, false) })
        }

        fn scan_records(&mut self) -> Result<Vec<ApRecord>, DriverError> {
            let mut count: u16 = 0;
            // SAFETY: out-pointer to a local.
            esp_check("esp_wifi_scan_get_ap_num", unsafe {
                esp_wifi_scan_get_ap_num(&mut count)
            })?;
            if count == 0 {
                return Ok(Vec::new());
            }
            let mut raw = vec![wifi_ap_record_t::default(); usize::from(count)];
            // SAFETY: `raw` holds `count` records; the driver writes at most
            // that many and updates `count`.
            esp_check("esp_wifi_scan_get_ap_records", unsafe {
                esp_wifi_scan_get_ap_records(&mut count, raw.as_mut_ptr())
            })?;
            raw.truncate(usize::from(count));
            debug!("wifi: harvested {} scan records", raw.len());
            Ok(raw.iter().map(record_from_raw).collect())
        }

        fn associated_ap(&mut self) -> Option<ApRecord> {
            let mut rec = wifi_ap_record_t::default();
            // SAFETY: out-pointer to a local.
            let ret = unsafe { esp_wifi_sta_get_ap_info(&mut rec) };
            (ret == ESP_OK as esp_err_t).then(|| record_from_raw(&rec))
        }

        fn set_power_save(&mut self, enabled: bool) -> Result<(), DriverError> {
            let ps = if enabled {
                wifi_ps_type_t_WIFI_PS_MIN_MODEM
            } else {
                wifi_ps_type_t_WIFI_PS_NONE
            };
            // SAFETY: plain driver call.
            esp_check("esp_wifi_set_ps", unsafe { esp_wifi_set_ps(ps) })
        }
    }
}
