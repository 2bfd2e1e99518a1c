//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigStore`] for the board configuration.  The
//! configuration is kept as one compact JSON string under namespace
//! `board-cfg`, key `json`.
//!
//! - Flash init: on "no free pages" or "new version found" the partition is
//!   erased and initialised again.
//! - Atomic writes: ESP-IDF NVS commits are atomic per `nvs_commit()`.
//! - The simulation backend keeps the strings in a `HashMap`.

use crate::app::ports::{ConfigStore, StoreError};
use crate::config::Configuration;
use crate::error::ConfigError;
use log::{info, warn};

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use super::utils::copy_nul_terminated;

pub const CONFIG_NAMESPACE: &str = "board-cfg";
pub const CONFIG_KEY: &str = "json";

#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
const MAX_JSON_SIZE: usize = 4000;

/// Returned by every operation before [`ConfigStore::initialize_store`].
const ESP_ERR_NVS_NOT_INITIALIZED_CODE: i32 = 0x1101;

pub struct NvsStore {
    initialized: bool,
    #[cfg(not(target_os = "espidf"))]
    store: HashMap<String, String>,
    #[cfg(not(target_os = "espidf"))]
    fail_init: bool,
}

impl Default for NvsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NvsStore {
    /// Create the adapter.  Flash is brought up by
    /// [`ConfigStore::initialize_store`].
    pub fn new() -> Self {
        Self {
            initialized: false,
            #[cfg(not(target_os = "espidf"))]
            store: HashMap::new(),
            #[cfg(not(target_os = "espidf"))]
            fail_init: false,
        }
    }

    /// Simulation: make `initialize_store` fail like a broken partition.
    #[cfg(not(target_os = "espidf"))]
    pub fn failing() -> Self {
        Self {
            fail_init: true,
            ..Self::new()
        }
    }

    /// Simulation: place a raw string in the store, bypassing encoding.
    #[cfg(not(target_os = "espidf"))]
    pub fn insert_raw(&mut self, json: &str) {
        self.store
            .insert(Self::composite_key(CONFIG_NAMESPACE, CONFIG_KEY), json.to_owned());
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    fn ensure_initialized(&self) -> Result<(), StoreError> {
        if self.initialized {
            Ok(())
        } else {
            Err(StoreError::Io(ESP_ERR_NVS_NOT_INITIALIZED_CODE))
        }
    }

    /// Open an NVS namespace, execute a closure with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let mut ns_buf = [0u8; 16];
        copy_nul_terminated(namespace, &mut ns_buf);

        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        // SAFETY: ns_buf is NUL-terminated; handle is a local out-pointer.
        let ret = unsafe { nvs_open(ns_buf.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK as i32 {
            return Err(ret);
        }

        let result = f(handle);
        // SAFETY: handle was opened above and is not used afterwards.
        unsafe {
            nvs_close(handle);
        }
        result
    }

    #[cfg(target_os = "espidf")]
    fn read_json(&self) -> Result<String, StoreError> {
        let result = Self::with_nvs_handle(CONFIG_NAMESPACE, false, |handle| {
            let mut key_buf = [0u8; 16];
            copy_nul_terminated(CONFIG_KEY, &mut key_buf);

            // First call: get size (including the terminator).
            let mut size: usize = 0;
            // SAFETY: null output buffer asks only for the length.
            let ret = unsafe {
                nvs_get_str(
                    handle,
                    key_buf.as_ptr() as *const _,
                    core::ptr::null_mut(),
                    &mut size,
                )
            };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            if size == 0 || size > MAX_JSON_SIZE {
                return Err(ESP_ERR_NVS_INVALID_LENGTH as i32);
            }

            let mut buf = vec![0u8; size];
            // SAFETY: buf holds `size` bytes as reported above.
            let ret = unsafe {
                nvs_get_str(
                    handle,
                    key_buf.as_ptr() as *const _,
                    buf.as_mut_ptr() as *mut _,
                    &mut size,
                )
            };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            buf.truncate(size.saturating_sub(1));
            Ok(buf)
        });

        match result {
            Ok(bytes) => String::from_utf8(bytes).map_err(|_| StoreError::Corrupted),
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND as i32 => Err(StoreError::NotFound),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_json(&self) -> Result<String, StoreError> {
        self.store
            .get(&Self::composite_key(CONFIG_NAMESPACE, CONFIG_KEY))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    #[cfg(target_os = "espidf")]
    fn write_json(&mut self, json: &str, erase_all: bool) -> Result<(), StoreError> {
        let mut value = Vec::with_capacity(json.len() + 1);
        value.extend_from_slice(json.as_bytes());
        value.push(0);

        let result = Self::with_nvs_handle(CONFIG_NAMESPACE, true, |handle| {
            if erase_all {
                // SAFETY: handle is open read-write.
                let ret = unsafe { nvs_erase_all(handle) };
                if ret != ESP_OK as i32 {
                    return Err(ret);
                }
                // SAFETY: as above.
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK as i32 {
                    return Err(ret);
                }
            }

            let mut key_buf = [0u8; 16];
            copy_nul_terminated(CONFIG_KEY, &mut key_buf);
            // SAFETY: key and value are NUL-terminated and outlive the call.
            let ret = unsafe {
                nvs_set_str(
                    handle,
                    key_buf.as_ptr() as *const _,
                    value.as_ptr() as *const _,
                )
            };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            // SAFETY: as above.
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            Ok(())
        });
        result.map_err(StoreError::Io)
    }

    #[cfg(not(target_os = "espidf"))]
    fn write_json(&mut self, json: &str, erase_all: bool) -> Result<(), StoreError> {
        if erase_all {
            let prefix = Self::composite_key(CONFIG_NAMESPACE, "");
            self.store.retain(|k, _| !k.starts_with(&prefix));
        }
        self.store.insert(
            Self::composite_key(CONFIG_NAMESPACE, CONFIG_KEY),
            json.to_owned(),
        );
        Ok(())
    }
}

impl ConfigStore for NvsStore {
    #[cfg(target_os = "espidf")]
    fn initialize_store(&mut self) -> Result<(), StoreError> {
        // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
        // single boot-task context before any concurrent NVS access.
        let mut ret = unsafe { nvs_flash_init() };
        if ret == ESP_ERR_NVS_NO_FREE_PAGES as i32 || ret == ESP_ERR_NVS_NEW_VERSION_FOUND as i32 {
            warn!("NvsStore: erasing and re-initialising flash partition");
            // SAFETY: as above.
            ret = unsafe { nvs_flash_erase() };
            if ret == ESP_OK as i32 {
                // SAFETY: as above.
                ret = unsafe { nvs_flash_init() };
            }
        }
        if ret != ESP_OK as i32 {
            return Err(StoreError::Io(ret));
        }
        self.initialized = true;
        info!("NvsStore: ESP-IDF NVS initialised");
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn initialize_store(&mut self) -> Result<(), StoreError> {
        if self.fail_init {
            warn!("NvsStore(sim): flash init failed");
            return Err(StoreError::Io(-1));
        }
        self.initialized = true;
        info!("NvsStore(sim): simulation backend");
        Ok(())
    }

    fn read_from_store(&mut self) -> Result<Configuration, StoreError> {
        self.ensure_initialized()?;
        let json = self.read_json()?;
        let cfg = Configuration::from_json(&json).map_err(|e| match e {
            ConfigError::SchemaMismatch { found, expected } => {
                StoreError::SchemaMismatch { found, expected }
            }
            _ => StoreError::Corrupted,
        })?;
        info!("NvsStore: loaded configuration ({} bytes)", json.len());
        Ok(cfg)
    }

    fn write_to_store(&mut self, config: &Configuration, erase_all: bool) -> Result<(), StoreError> {
        self.ensure_initialized()?;
        let json = config.to_json().map_err(|_| StoreError::Corrupted)?;
        self.write_json(&json, erase_all)?;
        info!(
            "NvsStore: configuration saved ({} bytes{})",
            json.len(),
            if erase_all { ", namespace erased" } else { "" }
        );
        Ok(())
    }
}
