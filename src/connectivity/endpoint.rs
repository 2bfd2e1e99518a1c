//! Validated WiFi credentials and the descriptors handed to the radio.
//!
//! [`EndpointConfig`] is the boundary type: it is what the configuration
//! store persists and what callers pass to
//! [`ConnectivityManager::start`](super::ConnectivityManager::start).  It is
//! validated once, then converted into fixed-capacity descriptors that map
//! one-to-one onto the vendor join/AP configuration.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::adapters::device_id::{self, MacAddress};
use crate::error::ConfigError;

/// Longest identifier the radio accepts (the vendor buffer is 32 bytes with
/// a terminator).
pub const IDENTIFIER_MAX: usize = 31;
/// WPA2 passphrase bounds.
pub const SECRET_MIN: usize = 8;
pub const SECRET_MAX: usize = 63;

pub type Identifier = heapless::String<32>;
pub type Secret = heapless::String<64>;

// ---------------------------------------------------------------------------
// EndpointConfig
// ---------------------------------------------------------------------------

/// One credential slot: network identifier plus passphrase.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(rename = "SSID")]
    pub identifier: String,
    #[serde(rename = "Pass")]
    pub secret: String,
}

impl fmt::Debug for EndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointConfig")
            .field("identifier", &self.identifier)
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl EndpointConfig {
    pub fn new(identifier: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            secret: secret.into(),
        }
    }

    /// Default credential derived from the board name and MAC:
    /// `"<prefix>-XXYYZZ"` for both identifier and secret.
    pub fn from_name_and_mac(prefix: &str, mac: &MacAddress) -> Self {
        let name = device_id::default_name(prefix, mac);
        Self::new(name.as_str(), name.as_str())
    }

    /// Identifier 1..=31 bytes, secret 8..=63 bytes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let id = self.identifier.len();
        if id == 0 || id > IDENTIFIER_MAX {
            return Err(ConfigError::InvalidIdentifier { len: id });
        }
        let secret = self.secret.len();
        if !(SECRET_MIN..=SECRET_MAX).contains(&secret) {
            return Err(ConfigError::InvalidSecret { len: secret });
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Station join descriptor.  Validates first.
    pub fn station_descriptor(&self) -> Result<StationDescriptor, ConfigError> {
        self.validate()?;
        Ok(StationDescriptor {
            ssid: self.bounded_identifier()?,
            password: self.bounded_secret()?,
        })
    }

    /// Access point descriptor with the fixed AP profile.  Validates first.
    pub fn access_point_descriptor(&self) -> Result<AccessPointDescriptor, ConfigError> {
        self.validate()?;
        Ok(AccessPointDescriptor {
            ssid: self.bounded_identifier()?,
            password: self.bounded_secret()?,
            ..AccessPointDescriptor::default()
        })
    }

    fn bounded_identifier(&self) -> Result<Identifier, ConfigError> {
        Identifier::try_from(self.identifier.as_str()).map_err(|()| {
            ConfigError::InvalidIdentifier {
                len: self.identifier.len(),
            }
        })
    }

    fn bounded_secret(&self) -> Result<Secret, ConfigError> {
        Secret::try_from(self.secret.as_str()).map_err(|()| ConfigError::InvalidSecret {
            len: self.secret.len(),
        })
    }
}

// ---------------------------------------------------------------------------
// Radio descriptors
// ---------------------------------------------------------------------------

/// Authentication mode of an access point (ours or a scanned one).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    Open,
    Wep,
    WpaPsk,
    #[default]
    Wpa2Psk,
    WpaWpa2Psk,
    Wpa2Enterprise,
    Wpa3Psk,
    Wpa2Wpa3Psk,
    Unknown,
}

/// Station join parameters.  An empty descriptor is used for scan mode.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct StationDescriptor {
    pub ssid: Identifier,
    pub password: Secret,
}

impl fmt::Debug for StationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StationDescriptor")
            .field("ssid", &self.ssid)
            .finish_non_exhaustive()
    }
}

/// Soft-AP parameters.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessPointDescriptor {
    pub ssid: Identifier,
    pub password: Secret,
    /// 0 lets the driver pick.
    pub channel: u8,
    pub auth: AuthMode,
    pub max_connections: u8,
    /// Time units (1 TU = 1024 µs).
    pub beacon_interval: u16,
    pub hidden: bool,
}

impl Default for AccessPointDescriptor {
    fn default() -> Self {
        Self {
            ssid: Identifier::new(),
            password: Secret::new(),
            channel: 0,
            auth: AuthMode::Wpa2Psk,
            max_connections: 4,
            beacon_interval: 100,
            hidden: false,
        }
    }
}

impl fmt::Debug for AccessPointDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessPointDescriptor")
            .field("ssid", &self.ssid)
            .field("channel", &self.channel)
            .field("auth", &self.auth)
            .field("max_connections", &self.max_connections)
            .field("beacon_interval", &self.beacon_interval)
            .field("hidden", &self.hidden)
            .finish_non_exhaustive()
    }
}

/// Active scan parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRequest {
    /// 0 scans every channel.
    pub channel: u8,
    pub show_hidden: bool,
    pub active: bool,
    pub dwell_min_ms: u32,
    pub dwell_max_ms: u32,
}

impl Default for ScanRequest {
    fn default() -> Self {
        Self {
            channel: 0,
            show_hidden: true,
            active: true,
            dwell_min_ms: 0,
            dwell_max_ms: 500,
        }
    }
}

/// One discovered (or currently associated) access point.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApRecord {
    pub ssid: Identifier,
    pub bssid: [u8; 6],
    pub channel: u8,
    pub rssi: i8,
    pub auth: AuthMode,
}

impl ApRecord {
    pub fn new(ssid: &str, bssid: [u8; 6], channel: u8, rssi: i8, auth: AuthMode) -> Self {
        let mut name = Identifier::new();
        for c in ssid.chars() {
            if name.push(c).is_err() {
                break;
            }
        }
        Self {
            ssid: name,
            bssid,
            channel,
            rssi,
            auth,
        }
    }
}
