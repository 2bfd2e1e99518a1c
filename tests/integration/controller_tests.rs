//! Integration tests for the boot sequence: stage order, severity markers,
//! configuration fallback and the one-shot guarantee.

use crate::mock_board::{Hook, MockStore, RecordingBoard, fast_timings, recording_controller};

use boardmanager::adapters::nvs::NvsStore;
use boardmanager::adapters::platform::SimPlatform;
use boardmanager::adapters::radio::SimRadio;
use boardmanager::app::controller::{BoardCore, DeviceController, SEVERITY_CRITICAL};
use boardmanager::app::ports::{ConfigStore, StoreError};
use boardmanager::boards::DevBoard;
use boardmanager::drivers::power::SimPin;
use boardmanager::config::Configuration;
use boardmanager::connectivity::endpoint::EndpointConfig;
use boardmanager::error::Error;

fn stored_config() -> Configuration {
    let mut cfg = Configuration::default();
    cfg.name = "greenhouse".into();
    cfg.endpoints[0] = EndpointConfig::new("Home", "password");
    cfg
}

#[test]
fn full_boot_runs_every_hook_in_order() {
    let (mut ctl, radio) = recording_controller(
        RecordingBoard::new(),
        MockStore::holding(stored_config()),
        SimPlatform::new(),
    );

    ctl.initialize().unwrap();

    assert_eq!(
        ctl.hooks().calls,
        vec![
            Hook::EarlyInit,
            Hook::PowerOn,
            Hook::CriticalInit,
            Hook::BoardInit,
            Hook::PostInit
        ]
    );
    assert_eq!(ctl.init_fail_severity(), 0);
    assert!(ctl.is_initialized());

    let core = ctl.core();
    assert_eq!(core.config, stored_config());
    assert!(core.signal.is_created());
    assert!(core.platform.event_loop_created());
    assert!(core.platform.network_stack_ready());
    assert!(core.wifi.is_initialized());
    // Power-save negotiation ran after board init.
    assert!(!radio.power_save());
}

#[test]
fn unreadable_store_still_reaches_board_init_with_defaults() {
    let (mut ctl, _radio) = recording_controller(
        RecordingBoard::new(),
        MockStore::unreadable(),
        SimPlatform::new(),
    );

    ctl.initialize().unwrap();

    assert_eq!(ctl.init_fail_severity(), 0);
    assert_eq!(
        ctl.hooks().config_at_board_init,
        Some(Configuration::default())
    );
    assert!(ctl.hooks().calls.contains(&Hook::BoardInit));
    // Unreadable data is not overwritten.
    assert!(ctl.core().store.writes.is_empty());
}

#[test]
fn second_initialize_is_state_error_and_runs_nothing() {
    let (mut ctl, radio) = recording_controller(
        RecordingBoard::new(),
        MockStore::empty(),
        SimPlatform::new(),
    );
    ctl.initialize().unwrap();
    let hooks_before = ctl.hooks().calls.len();
    let radio_calls_before = radio.calls().len();

    assert!(matches!(ctl.initialize(), Err(Error::State(_))));
    assert_eq!(ctl.hooks().calls.len(), hooks_before);
    assert_eq!(radio.calls().len(), radio_calls_before);
    assert_eq!(ctl.init_fail_severity(), 0);
}

#[test]
fn retry_after_failed_boot_is_also_refused() {
    let (mut ctl, _radio) = recording_controller(
        RecordingBoard::failing_at(Hook::PostInit),
        MockStore::empty(),
        SimPlatform::new(),
    );
    assert!(ctl.initialize().is_err());
    assert!(matches!(ctl.initialize(), Err(Error::State(_))));
    assert!(!ctl.is_initialized());
}

#[test]
fn first_boot_writes_defaults() {
    let (mut ctl, _radio) = recording_controller(
        RecordingBoard::new(),
        MockStore::empty(),
        SimPlatform::new(),
    );
    ctl.initialize().unwrap();

    let writes = &ctl.core().store.writes;
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].config, Configuration::default());
    assert!(!writes[0].erase_all);
}

#[test]
fn stale_schema_is_erased_and_rewritten() {
    let (mut ctl, _radio) = recording_controller(
        RecordingBoard::new(),
        MockStore::failing_read(StoreError::SchemaMismatch {
            found: 1,
            expected: 2,
        }),
        SimPlatform::new(),
    );
    ctl.initialize().unwrap();

    let writes = &ctl.core().store.writes;
    assert_eq!(writes.len(), 1);
    assert!(writes[0].erase_all);
    assert_eq!(ctl.core().config, Configuration::default());
}

#[test]
fn store_init_failure_is_critical() {
    let (mut ctl, _radio) = recording_controller(
        RecordingBoard::new(),
        MockStore::broken(),
        SimPlatform::new(),
    );

    assert_eq!(ctl.initialize(), Err(Error::Store(StoreError::Io(-1))));
    assert_eq!(ctl.init_fail_severity(), SEVERITY_CRITICAL);
    assert_eq!(ctl.hooks().calls, vec![Hook::EarlyInit, Hook::PowerOn]);
}

#[test]
fn early_init_failure_is_critical_and_stops_the_sequence() {
    let (mut ctl, _radio) = recording_controller(
        RecordingBoard::failing_at(Hook::EarlyInit),
        MockStore::empty(),
        SimPlatform::new(),
    );
    assert!(ctl.initialize().is_err());
    assert_eq!(ctl.init_fail_severity(), SEVERITY_CRITICAL);
    assert_eq!(ctl.hooks().calls, vec![Hook::EarlyInit]);
    assert!(!ctl.core().store.initialized);
}

#[test]
fn event_loop_failure_is_critical() {
    let mut platform = SimPlatform::new();
    platform.fail_event_loop();
    let (mut ctl, _radio) =
        recording_controller(RecordingBoard::new(), MockStore::empty(), platform);

    assert!(matches!(ctl.initialize(), Err(Error::Driver(_))));
    assert_eq!(ctl.init_fail_severity(), SEVERITY_CRITICAL);
    assert!(!ctl.hooks().calls.contains(&Hook::CriticalInit));
}

#[test]
fn network_stack_failure_is_critical() {
    let mut platform = SimPlatform::new();
    platform.fail_network_stack();
    let (mut ctl, _radio) =
        recording_controller(RecordingBoard::new(), MockStore::empty(), platform);

    assert!(ctl.initialize().is_err());
    assert_eq!(ctl.init_fail_severity(), SEVERITY_CRITICAL);
    assert!(ctl.core().platform.event_loop_created());
}

#[test]
fn critical_init_failure_is_critical() {
    let (mut ctl, _radio) = recording_controller(
        RecordingBoard::failing_at(Hook::CriticalInit),
        MockStore::empty(),
        SimPlatform::new(),
    );
    assert!(ctl.initialize().is_err());
    assert_eq!(ctl.init_fail_severity(), SEVERITY_CRITICAL);
}

#[test]
fn board_init_failure_has_severity_two() {
    let (mut ctl, _radio) = recording_controller(
        RecordingBoard::failing_at(Hook::BoardInit),
        MockStore::empty(),
        SimPlatform::new(),
    );
    assert!(ctl.initialize().is_err());
    assert_eq!(ctl.init_fail_severity(), 2);
    assert!(!ctl.hooks().calls.contains(&Hook::PostInit));
}

#[test]
fn post_init_failure_has_severity_one() {
    let (mut ctl, _radio) = recording_controller(
        RecordingBoard::failing_at(Hook::PostInit),
        MockStore::empty(),
        SimPlatform::new(),
    );
    assert!(ctl.initialize().is_err());
    assert_eq!(ctl.init_fail_severity(), 1);
    assert!(!ctl.is_initialized());
}

#[test]
fn power_save_failure_does_not_fail_boot() {
    let (mut ctl, radio) = recording_controller(
        RecordingBoard::new(),
        MockStore::empty(),
        SimPlatform::new(),
    );
    radio.fail_next(boardmanager::adapters::radio::SimOp::SetPowerSave(false));

    ctl.initialize().unwrap();
    assert_eq!(ctl.init_fail_severity(), 0);
}

#[test]
fn power_down_is_forwarded_to_board() {
    let (mut ctl, _radio) = recording_controller(
        RecordingBoard::failing_at(Hook::BoardInit),
        MockStore::empty(),
        SimPlatform::new(),
    );
    assert!(ctl.initialize().is_err());
    ctl.power_peripherals(false).unwrap();
    assert_eq!(ctl.hooks().calls.last(), Some(&Hook::PowerOff));
}

// ── Name advertisement ────────────────────────────────────────

fn silent_platform() -> SimPlatform {
    let mut platform = SimPlatform::new();
    platform.fail_advertise();
    platform
}

#[test]
fn advertisement_failure_does_not_fail_boot() {
    let mut store = NvsStore::new();
    store.initialize_store().unwrap();
    store.write_to_store(&stored_config(), false).unwrap();
    let radio = SimRadio::new();
    let handle = radio.handle();
    let core = BoardCore::new(radio, store, silent_platform(), fast_timings());
    let mut ctl = DeviceController::new(DevBoard::new(SimPin::new()), core);

    assert_eq!(ctl.initialize(), Ok(()));
    assert_eq!(ctl.init_fail_severity(), 0);
    assert!(ctl.is_initialized());
    assert!(ctl.core().is_connected_to_ap());
    assert!(!ctl.core().platform.is_advertising());
    assert_eq!(handle.connect_attempts(), 1);
}

#[test]
fn advertisement_failure_does_not_fail_rejoin() {
    let radio = SimRadio::new();
    let handle = radio.handle();
    let mut core = BoardCore::new(radio, NvsStore::new(), silent_platform(), fast_timings());
    assert!(core.signal.create());
    core.initialize_wifi().unwrap();
    core.config = stored_config();
    core.start_station(1).unwrap();

    assert_eq!(core.restart_station_mode(1), Ok(()));
    assert!(core.is_connected_to_ap());
    assert_eq!(handle.connect_attempts(), 2);
    assert_eq!(core.platform.advertise_count(), 0);
}
