//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements    | Connects to                         |
//! |-------------|---------------|-------------------------------------|
//! | `radio`     | RadioDriver   | ESP-IDF WiFi driver / `SimRadio`    |
//! | `nvs`       | ConfigStore   | NVS / in-memory store               |
//! | `platform`  | Platform      | event loop, netif, RNG, mDNS        |
//! | `mdns`      | (helper)      | ESP-IDF mDNS responder              |
//! | `device_id` | (helper)      | eFuse MAC, default names            |
//! | `ota`       | (helper)      | bootloader rollback state           |

pub mod device_id;
pub mod mdns;
pub mod nvs;
pub mod ota;
pub mod platform;
pub mod radio;
pub(super) mod utils;
