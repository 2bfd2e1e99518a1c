//! Mock board and configuration store for integration tests.
//!
//! `RecordingBoard` records every hook the controller calls and can be told
//! to fail at any of them.  `MockStore` scripts the outcome of each store
//! operation and keeps every write for assertions.

use boardmanager::adapters::platform::SimPlatform;
use boardmanager::adapters::radio::{SimRadio, SimRadioHandle};
use boardmanager::app::controller::{BoardCore, BoardHooks, DeviceController, HookCore};
use boardmanager::app::ports::{ConfigStore, StoreError};
use boardmanager::config::{Configuration, Timings};
use boardmanager::error::{DriverError, Error, Result};

// ── Timings ───────────────────────────────────────────────────

/// Short waits so timeout paths finish quickly on the host.
pub fn fast_timings() -> Timings {
    Timings {
        connect_timeout_ms: 1_000,
        scan_timeout_ms: 1_000,
        stop_timeout_ms: 1_000,
        ..Timings::default()
    }
}

// ── MockStore ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct StoreWrite {
    pub config: Configuration,
    pub erase_all: bool,
}

pub struct MockStore {
    pub init_result: core::result::Result<(), StoreError>,
    pub read_result: core::result::Result<Configuration, StoreError>,
    pub writes: Vec<StoreWrite>,
    pub initialized: bool,
}

#[allow(dead_code)]
impl MockStore {
    /// A store holding `config`.
    pub fn holding(config: Configuration) -> Self {
        Self {
            init_result: Ok(()),
            read_result: Ok(config),
            writes: Vec::new(),
            initialized: false,
        }
    }

    /// First boot: nothing stored.
    pub fn empty() -> Self {
        Self::failing_read(StoreError::NotFound)
    }

    /// Store comes up but the stored blob cannot be decoded.
    pub fn unreadable() -> Self {
        Self::failing_read(StoreError::Corrupted)
    }

    pub fn failing_read(err: StoreError) -> Self {
        Self {
            read_result: Err(err),
            ..Self::holding(Configuration::default())
        }
    }

    /// Flash partition cannot be brought up.
    pub fn broken() -> Self {
        Self {
            init_result: Err(StoreError::Io(-1)),
            ..Self::empty()
        }
    }
}

impl ConfigStore for MockStore {
    fn initialize_store(&mut self) -> core::result::Result<(), StoreError> {
        self.init_result?;
        self.initialized = true;
        Ok(())
    }

    fn read_from_store(&mut self) -> core::result::Result<Configuration, StoreError> {
        self.read_result.clone()
    }

    fn write_to_store(
        &mut self,
        config: &Configuration,
        erase_all: bool,
    ) -> core::result::Result<(), StoreError> {
        self.writes.push(StoreWrite {
            config: config.clone(),
            erase_all,
        });
        Ok(())
    }
}

// ── RecordingBoard ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    EarlyInit,
    PowerOn,
    PowerOff,
    CriticalInit,
    BoardInit,
    PostInit,
}

pub struct RecordingBoard {
    pub calls: Vec<Hook>,
    pub fail_at: Option<Hook>,
    /// Configuration the board saw at board init.
    pub config_at_board_init: Option<Configuration>,
}

#[allow(dead_code)]
impl RecordingBoard {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            fail_at: None,
            config_at_board_init: None,
        }
    }

    pub fn failing_at(hook: Hook) -> Self {
        Self {
            fail_at: Some(hook),
            ..Self::new()
        }
    }

    fn enter(&mut self, hook: Hook) -> Result<()> {
        self.calls.push(hook);
        if self.fail_at == Some(hook) {
            return Err(Error::Driver(DriverError::new("mock hook", -1)));
        }
        Ok(())
    }
}

impl BoardHooks for RecordingBoard {
    type Radio = SimRadio;
    type Store = MockStore;
    type Platform = SimPlatform;

    fn early_init(&mut self, _core: &mut HookCore<Self>) -> Result<()> {
        self.enter(Hook::EarlyInit)
    }

    fn power_peripherals(&mut self, on: bool) -> Result<()> {
        self.enter(if on { Hook::PowerOn } else { Hook::PowerOff })
    }

    fn critical_init(&mut self, _core: &mut HookCore<Self>) -> Result<()> {
        self.enter(Hook::CriticalInit)
    }

    fn board_init(&mut self, core: &mut HookCore<Self>) -> Result<()> {
        self.config_at_board_init = Some(core.config.clone());
        self.enter(Hook::BoardInit)?;
        core.initialize_wifi()
    }

    fn post_init(&mut self, _core: &mut HookCore<Self>) -> Result<()> {
        self.enter(Hook::PostInit)
    }
}

// ── Builders ──────────────────────────────────────────────────

pub type RecordingController = DeviceController<RecordingBoard>;

/// Controller over a recording board, plus the handle of its simulated radio.
pub fn recording_controller(
    board: RecordingBoard,
    store: MockStore,
    platform: SimPlatform,
) -> (RecordingController, SimRadioHandle) {
    let radio = SimRadio::new();
    let handle = radio.handle();
    let core = BoardCore::new(radio, store, platform, fast_timings());
    (DeviceController::new(board, core), handle)
}
