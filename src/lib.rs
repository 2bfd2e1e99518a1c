//! Boot-and-connectivity controller library.
//!
//! Exposes the boot sequence, the WiFi connectivity manager and their port
//! traits for integration testing.  All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module; other targets build
//! the simulation adapters.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod boards;
pub mod config;
pub mod connectivity;
pub mod drivers;
pub mod error;
pub mod events;
pub mod pins;
