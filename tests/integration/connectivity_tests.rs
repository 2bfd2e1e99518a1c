//! Integration tests for station retry policy, AP fallback, scanning and
//! link supervision, driven through the development board against the
//! simulated radio.

use std::time::{Duration, Instant};

use crate::mock_board::fast_timings;

use boardmanager::adapters::nvs::NvsStore;
use boardmanager::adapters::platform::SimPlatform;
use boardmanager::adapters::radio::{ConnectOutcome, SimOp, SimRadio, SimRadioHandle};
use boardmanager::app::controller::{BoardCore, DeviceController};
use boardmanager::app::events::reason;
use boardmanager::app::ports::{ConfigStore, RadioMode};
use boardmanager::boards::DevBoard;
use boardmanager::config::Configuration;
use boardmanager::connectivity::endpoint::{ApRecord, AuthMode, EndpointConfig};
use boardmanager::connectivity::{ConnectivityMode, ConnectivityStatus};
use boardmanager::drivers::power::SimPin;
use boardmanager::error::{ConfigError, Error};
use boardmanager::events::{EventSignal, SignalBits};

type SimBoard = DevBoard<SimRadio, NvsStore, SimPlatform, SimPin>;
type SimCore = BoardCore<SimRadio, NvsStore, SimPlatform>;

fn home() -> EndpointConfig {
    EndpointConfig::new("Home", "password")
}

fn store_with(cfg: &Configuration) -> NvsStore {
    let mut store = NvsStore::new();
    store.initialize_store().unwrap();
    store.write_to_store(cfg, false).unwrap();
    store
}

fn dev_controller(store: NvsStore) -> (DeviceController<SimBoard>, SimRadioHandle, SimPin) {
    let radio = SimRadio::new();
    let handle = radio.handle();
    let pin = SimPin::new();
    let core = BoardCore::new(radio, store, SimPlatform::new(), fast_timings());
    (DeviceController::new(DevBoard::new(pin.clone()), core), handle, pin)
}

/// A core with the radio up, outside the boot sequence.
fn ready_core() -> (SimCore, SimRadioHandle) {
    let radio = SimRadio::new();
    let handle = radio.handle();
    let mut core = BoardCore::new(radio, NvsStore::new(), SimPlatform::new(), fast_timings());
    assert!(core.signal.create());
    core.initialize_wifi().unwrap();
    (core, handle)
}

fn wait_for_status(core: &SimCore, want: ConnectivityStatus) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while core.wifi.status() != want {
        assert!(Instant::now() < deadline, "status stuck at {:?}", core.wifi.status());
        std::thread::sleep(Duration::from_millis(5));
    }
}

// ── Station retry policy ──────────────────────────────────────

#[test]
fn invalid_first_slot_then_refused_then_connected() {
    let (mut core, radio) = ready_core();
    core.config.endpoints[0] = EndpointConfig::new("Home", "short1");
    core.config.endpoints[1] = EndpointConfig::new("Backup", "password");
    radio.push_outcome(ConnectOutcome::Disconnected(reason::AUTH_FAIL));
    radio.push_outcome(ConnectOutcome::Connected);

    core.start_station(3).unwrap();

    assert_eq!(radio.connect_attempts(), 2);
    assert_eq!(radio.station_config().unwrap().ssid.as_str(), "Backup");
    assert_eq!(core.platform.delays().len(), 1);
    assert!(core.is_connected_to_ap());
    assert_eq!(core.wifi.ap_info().unwrap().ssid.as_str(), "Backup");
}

#[test]
fn exhausted_slots_report_last_disconnect_reason() {
    let (mut core, radio) = ready_core();
    core.config.endpoints[0] = home();
    core.config.endpoints[1] = EndpointConfig::new("Backup", "password");
    radio.push_outcome(ConnectOutcome::Disconnected(reason::AUTH_FAIL));
    radio.push_outcome(ConnectOutcome::Disconnected(reason::NO_AP_FOUND));

    assert_eq!(
        core.start_station(1),
        Err(Error::Disconnected {
            reason: reason::NO_AP_FOUND
        })
    );
    assert_eq!(radio.connect_attempts(), 2);
    assert_eq!(core.wifi.disconnect_reason(), reason::NO_AP_FOUND);
    // Pause between the slots, none after the last refusal.
    assert_eq!(core.platform.delays().len(), 1);
}

#[test]
fn zero_retries_still_makes_one_attempt() {
    let (mut core, radio) = ready_core();
    core.config.endpoints[0] = home();
    core.start_station(0).unwrap();
    assert_eq!(radio.connect_attempts(), 1);
}

#[test]
fn driver_failure_aborts_without_retry() {
    let (mut core, radio) = ready_core();
    core.config.endpoints[0] = home();
    core.config.endpoints[1] = EndpointConfig::new("Backup", "password");
    radio.fail_next(SimOp::Start);

    assert!(matches!(core.start_station(3), Err(Error::Driver(_))));
    assert_eq!(radio.connect_attempts(), 0);
    assert_eq!(core.wifi.status(), ConnectivityStatus::Error);
}

#[test]
fn invalid_station_credential_never_starts_driver() {
    let (core, radio) = ready_core();
    let bad = EndpointConfig::new("Home", "short1");

    assert_eq!(
        core.wifi.start(ConnectivityMode::Station, Some(&bad), None),
        Err(Error::Config(ConfigError::InvalidSecret { len: 6 }))
    );
    assert!(!radio.calls().contains(&SimOp::Start));
    assert_eq!(core.wifi.status(), ConnectivityStatus::Error);
}

// ── Link supervision ──────────────────────────────────────────

#[test]
fn lost_link_is_rejoined_and_readvertised() {
    let (mut core, radio) = ready_core();
    core.config.endpoints[0] = home();
    core.start_station(3).unwrap();
    core.advertise().unwrap();
    assert!(core.ensure_station_link(3).is_ok());
    assert_eq!(radio.connect_attempts(), 1);
    assert!(radio.is_associated());

    radio.drop_link(reason::BEACON_TIMEOUT);
    wait_for_status(&core, ConnectivityStatus::Disconnected);
    assert!(!radio.is_associated());
    assert!(!core.is_connected_to_ap());
    assert_eq!(core.wifi.disconnect_reason(), reason::BEACON_TIMEOUT);

    core.ensure_station_link(3).unwrap();
    assert!(core.is_connected_to_ap());
    assert!(radio.is_associated());
    assert_eq!(radio.connect_attempts(), 2);
    assert_eq!(core.platform.advertise_count(), 2);
    assert!(core.platform.is_advertising());
}

#[test]
fn failed_rejoin_leaves_advertisement_withdrawn() {
    let (mut core, radio) = ready_core();
    core.config.endpoints[0] = home();
    core.start_station(1).unwrap();
    core.advertise().unwrap();

    radio.drop_link(reason::BEACON_TIMEOUT);
    wait_for_status(&core, ConnectivityStatus::Disconnected);
    radio.push_outcome(ConnectOutcome::Silent);

    assert_eq!(
        core.ensure_station_link(1),
        Err(Error::Timeout("station connect"))
    );
    assert!(!core.platform.is_advertising());
}

// ── Access point, scan ────────────────────────────────────────

#[test]
fn scan_returns_record_count() {
    let (mut core, radio) = ready_core();
    radio.set_neighbours(vec![
        ApRecord::new("Alpha", [1; 6], 1, -40, AuthMode::Wpa2Psk),
        ApRecord::new("Beta", [2; 6], 6, -62, AuthMode::WpaWpa2Psk),
        ApRecord::new("Gamma", [3; 6], 11, -80, AuthMode::Open),
    ]);

    assert_eq!(core.scan().unwrap(), 3);
    assert_eq!(core.wifi.scan_record(2).unwrap().ssid.as_str(), "Gamma");
    assert_eq!(core.wifi.mode(), ConnectivityMode::None);
    assert_eq!(radio.connect_attempts(), 0);
}

#[test]
fn configuration_ap_runs_both_interfaces_with_default_credential() {
    let (mut core, radio) = ready_core();
    core.config.name = "shed".into();
    core.start_configuration_ap().unwrap();

    assert_eq!(core.wifi.mode(), ConnectivityMode::AccessPointStation);
    assert_eq!(radio.radio_mode(), RadioMode::AccessPointStation);
    let ap = radio.access_point_config().unwrap();
    assert_eq!(ap.ssid.as_str(), "shed-EFCAFE");
    assert_eq!(ap.password.as_str(), "shed-EFCAFE");
    assert_eq!(radio.station_config().unwrap().ssid, ap.ssid);
}

#[test]
fn access_point_stop_waits_for_completion() {
    let (mut core, radio) = ready_core();
    core.start_ap().unwrap();
    let bits = core.signal.wait_for_any_bit(SignalBits::AP_STARTED, 1_000);
    assert!(bits.contains(SignalBits::AP_STARTED));

    core.stop_ap().unwrap();
    assert!(!radio.is_started());
    assert_eq!(radio.subscriber_count(), 0);
}

// ── Development board boot ────────────────────────────────────

#[test]
fn dev_board_boots_into_station_mode() {
    let mut cfg = Configuration::default();
    cfg.name = "kitchen".into();
    cfg.endpoints[0] = home();
    let (mut ctl, radio, pin) = dev_controller(store_with(&cfg));

    ctl.initialize().unwrap();

    assert_eq!(ctl.init_fail_severity(), 0);
    assert!(pin.is_high());
    assert!(ctl.hooks().peripherals_powered());
    let core = ctl.core();
    assert!(core.is_connected_to_ap());
    assert_eq!(core.platform.advertised_hostname(), Some("kitchen-efcafe"));
    assert_eq!(radio.connect_attempts(), 1);
}

#[test]
fn dev_board_without_credentials_falls_back_to_access_point() {
    let (mut ctl, radio, _pin) = dev_controller(NvsStore::new());

    ctl.initialize().unwrap();

    assert_eq!(ctl.init_fail_severity(), 0);
    let core = ctl.core();
    assert_eq!(core.wifi.mode(), ConnectivityMode::AccessPoint);
    assert_eq!(core.wifi.status(), ConnectivityStatus::ApCreated);
    assert_eq!(
        radio.access_point_config().unwrap().ssid.as_str(),
        "board-EFCAFE"
    );
    assert!(core.platform.is_advertising());
    assert_eq!(radio.connect_attempts(), 0);
}

#[test]
fn dev_board_falls_back_when_every_join_is_refused() {
    let mut cfg = Configuration::default();
    cfg.endpoints[0] = home();
    let radio = SimRadio::new();
    let handle = radio.handle();
    let core = BoardCore::new(radio, store_with(&cfg), SimPlatform::new(), fast_timings());
    let board = DevBoard::new(SimPin::new()).with_station_retries(2);
    let mut ctl = DeviceController::new(board, core);
    for _ in 0..2 {
        handle.push_outcome(ConnectOutcome::Disconnected(reason::AUTH_FAIL));
    }

    ctl.initialize().unwrap();

    assert_eq!(handle.connect_attempts(), 2);
    assert_eq!(ctl.core().wifi.mode(), ConnectivityMode::AccessPoint);
}

#[test]
fn dev_board_power_down_drops_the_rail() {
    let (mut ctl, _radio, pin) = dev_controller(NvsStore::new());
    ctl.initialize().unwrap();
    ctl.power_peripherals(false).unwrap();
    assert!(!pin.is_high());
}

// ── EventSignal ───────────────────────────────────────────────

#[test]
fn signal_set_then_wait_observes_and_clears() {
    let signal = EventSignal::new();
    signal.create();
    signal.set_bits(SignalBits::STA_CONNECTED);

    let got = signal.wait_for_any_bit(SignalBits::STA_CONNECTED, 0);
    assert!(got.contains(SignalBits::STA_CONNECTED));
    assert!(signal.get_bits().is_empty());
}

#[test]
fn signal_immediate_wait_times_out_empty() {
    let signal = EventSignal::new();
    signal.create();
    assert!(signal.wait_for_any_bit(SignalBits::ALL, 0).is_empty());
}

#[test]
fn signal_wakes_waiter_from_other_thread() {
    let signal = EventSignal::new();
    signal.create();
    let setter = signal.clone();
    let t = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        setter.set_bits(SignalBits::SCAN_DONE);
    });
    let got = signal.wait_for_all_bits(SignalBits::SCAN_DONE, 2_000);
    t.join().unwrap();
    assert!(got.contains(SignalBits::SCAN_DONE));
}
