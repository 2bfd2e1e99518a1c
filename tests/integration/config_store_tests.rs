//! Integration tests for configuration persistence through the NVS adapter
//! and the boot-time load policy.

use crate::mock_board::fast_timings;

use boardmanager::adapters::nvs::NvsStore;
use boardmanager::adapters::platform::SimPlatform;
use boardmanager::adapters::radio::SimRadio;
use boardmanager::app::controller::BoardCore;
use boardmanager::app::ports::{ConfigStore, StoreError};
use boardmanager::config::{CONFIGURATION_VERSION, Configuration};
use boardmanager::connectivity::endpoint::EndpointConfig;
use boardmanager::error::{ConfigError, Error};

fn populated() -> Configuration {
    let mut cfg = Configuration::default();
    cfg.name = "greenhouse".into();
    cfg.endpoints[0] = EndpointConfig::new("Home", "password");
    cfg.endpoints[1] = EndpointConfig::new("Backup", "12345678");
    cfg.ip_addr = "192.168.1.50".into();
    cfg.ip_mask = "255.255.255.0".into();
    cfg.ip_gateway = "192.168.1.1".into();
    cfg.ip_dns = "192.168.1.1".into();
    cfg
}

fn core_over(store: NvsStore) -> BoardCore<SimRadio, NvsStore, SimPlatform> {
    BoardCore::new(SimRadio::new(), store, SimPlatform::new(), fast_timings())
}

#[test]
fn write_then_read_reproduces_credentials_and_addresses() {
    let mut store = NvsStore::new();
    store.initialize_store().unwrap();
    let cfg = populated();
    store.write_to_store(&cfg, false).unwrap();

    let back = store.read_from_store().unwrap();
    assert_eq!(back.endpoints[0].identifier, "Home");
    assert_eq!(back.endpoints[0].secret, "password");
    assert_eq!(back.endpoints[1].identifier, "Backup");
    assert_eq!(back.endpoints[1].secret, "12345678");
    assert_eq!(back.ip_addr, "192.168.1.50");
    assert_eq!(back.ip_mask, "255.255.255.0");
    assert_eq!(back.ip_gateway, "192.168.1.1");
    assert_eq!(back.ip_dns, "192.168.1.1");
    assert_eq!(back, cfg);
}

#[test]
fn boot_load_uses_stored_configuration() {
    let mut store = NvsStore::new();
    store.initialize_store().unwrap();
    store.write_to_store(&populated(), false).unwrap();

    let mut core = core_over(store);
    core.load_configuration().unwrap();
    assert_eq!(core.config, populated());
    assert!(core.config.has_static_ip());
}

#[test]
fn boot_load_of_empty_store_persists_defaults() {
    let mut core = core_over(NvsStore::new());
    core.load_configuration().unwrap();

    assert_eq!(core.config, Configuration::default());
    assert_eq!(core.store.read_from_store().unwrap(), Configuration::default());
}

#[test]
fn boot_load_replaces_older_schema() {
    let mut store = NvsStore::new();
    store.initialize_store().unwrap();
    store.insert_raw(r#"{"version":1,"name":"legacy","APs":[]}"#);

    let mut core = core_over(store);
    core.load_configuration().unwrap();

    assert_eq!(core.config.version, CONFIGURATION_VERSION);
    assert!(core.config.name.is_empty());
    assert_eq!(core.store.read_from_store().unwrap(), Configuration::default());
}

#[test]
fn boot_load_keeps_corrupted_blob_but_uses_defaults() {
    let mut store = NvsStore::new();
    store.initialize_store().unwrap();
    store.insert_raw("{\"version\":2,\"name\":");

    let mut core = core_over(store);
    core.load_configuration().unwrap();

    assert_eq!(core.config, Configuration::default());
    assert_eq!(core.store.read_from_store(), Err(StoreError::Corrupted));
}

#[test]
fn broken_flash_fails_the_load() {
    let mut core = core_over(NvsStore::failing());
    assert_eq!(
        core.load_configuration(),
        Err(Error::Store(StoreError::Io(-1)))
    );
}

#[test]
fn edited_configuration_survives_write_configuration() {
    let mut core = core_over(NvsStore::new());
    core.load_configuration().unwrap();
    core.config.endpoints[1] = EndpointConfig::new("Attic", "correct horse");
    core.write_configuration(false).unwrap();

    let stored = core.store.read_from_store().unwrap();
    assert_eq!(stored.endpoints[1].identifier, "Attic");
    assert_eq!(stored.valid_endpoints().count(), 1);
}

#[test]
fn persisted_json_uses_documented_field_names() {
    let json = populated().to_json().unwrap();
    for key in ["\"version\":2", "\"APs\"", "\"SSID\"", "\"Pass\"", "\"ipAddr\"", "\"ipMask\"", "\"ipGateway\"", "\"ipDNS\""] {
        assert!(json.contains(key), "{key} missing from {json}");
    }
}

#[test]
fn schema_mismatch_surfaces_as_configuration_error() {
    let err: Error = StoreError::SchemaMismatch {
        found: 7,
        expected: CONFIGURATION_VERSION,
    }
    .into();
    assert_eq!(
        err,
        Error::Config(ConfigError::SchemaMismatch {
            found: 7,
            expected: CONFIGURATION_VERSION
        })
    );
}
