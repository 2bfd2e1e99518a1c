//! Device identity derived from the ESP32 factory MAC address.
//!
//! Produces stable names in the form `<prefix>-XXYYZZ` (last 3 bytes of the
//! 6-byte MAC in uppercase hex).  The name is:
//! - Deterministic across reboots (factory-burned eFuse MAC)
//! - Used as SSID and passphrase of the fallback / configuration AP
//! - Used, lower-cased, as the mDNS hostname (`<prefix>-xxyyzz.local`)

use core::fmt::Write;

/// Fixed-size name string; always fits a WiFi identifier (31 bytes).
pub type DeviceName = heapless::String<32>;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Prefix used when the board has no configured name.
pub const DEFAULT_PREFIX: &str = "board";

/// `"-XXYYZZ"`.
const SUFFIX_LEN: usize = 7;

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    // SAFETY: the buffer is exactly the 6 bytes the call writes.
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

/// Longest char-aligned prefix that leaves room for the MAC suffix.
fn bounded_prefix(prefix: &str) -> &str {
    let prefix = if prefix.is_empty() { DEFAULT_PREFIX } else { prefix };
    let mut cut = prefix.len().min(31 - SUFFIX_LEN);
    while !prefix.is_char_boundary(cut) {
        cut -= 1;
    }
    &prefix[..cut]
}

/// `<prefix>-XXYYZZ` (e.g. `greenhouse-EFCAFE`).
pub fn default_name(prefix: &str, mac: &MacAddress) -> DeviceName {
    let mut name = DeviceName::new();
    let _ = write!(
        name,
        "{}-{:02X}{:02X}{:02X}",
        bounded_prefix(prefix),
        mac[3],
        mac[4],
        mac[5]
    );
    name
}

/// mDNS hostname: `<prefix>-xxyyzz`, lower-case.
pub fn hostname(prefix: &str, mac: &MacAddress) -> DeviceName {
    let mut name = DeviceName::new();
    for c in default_name(prefix, mac).chars() {
        let _ = name.push(c.to_ascii_lowercase());
    }
    name
}
