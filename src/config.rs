//! Board configuration.
//!
//! [`Configuration`] is the persisted part: board name, two credential
//! slots in priority order, and the static IPv4 settings.  It is stored as a
//! compact JSON string; the schema version is checked before anything else
//! is decoded so a stale layout is reported as such rather than as garbage.
//!
//! [`Timings`] holds the compiled-in wait bounds and backoff parameters.
//! They are not persisted.

use serde::{Deserialize, Deserializer, Serialize};

use crate::connectivity::endpoint::EndpointConfig;
use crate::error::ConfigError;

/// Current schema version of the persisted JSON.
pub const CONFIGURATION_VERSION: u32 = 2;
/// Number of station credential slots.
pub const ENDPOINT_SLOTS: usize = 2;

/// Persisted board configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    pub version: u32,
    /// Board name; also the prefix of the default AP credential.
    pub name: String,
    /// Station credentials in priority order.
    #[serde(rename = "APs", deserialize_with = "endpoint_slots")]
    pub endpoints: [EndpointConfig; ENDPOINT_SLOTS],
    /// Static IPv4 settings.  Empty means DHCP.
    #[serde(rename = "ipAddr")]
    pub ip_addr: String,
    #[serde(rename = "ipMask")]
    pub ip_mask: String,
    #[serde(rename = "ipGateway")]
    pub ip_gateway: String,
    #[serde(rename = "ipDNS")]
    pub ip_dns: String,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            version: CONFIGURATION_VERSION,
            name: String::new(),
            endpoints: Default::default(),
            ip_addr: String::new(),
            ip_mask: String::new(),
            ip_gateway: String::new(),
            ip_dns: String::new(),
        }
    }
}

#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

/// Accept any number of slots; extra entries are ignored, missing ones stay
/// empty.
fn endpoint_slots<'de, D>(de: D) -> Result<[EndpointConfig; ENDPOINT_SLOTS], D::Error>
where
    D: Deserializer<'de>,
{
    let list = Vec::<EndpointConfig>::deserialize(de)?;
    let mut slots: [EndpointConfig; ENDPOINT_SLOTS] = Default::default();
    for (slot, ep) in slots.iter_mut().zip(list) {
        *slot = ep;
    }
    Ok(slots)
}

impl Configuration {
    /// Reset every field to the compiled-in defaults.
    pub fn init_data(&mut self) {
        *self = Self::default();
    }

    /// Compact JSON, as persisted.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string(self).map_err(|_| ConfigError::Encoding)
    }

    /// Decode a persisted configuration.
    ///
    /// The version is probed first; a mismatch is reported as
    /// [`ConfigError::SchemaMismatch`] without decoding the remainder.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let probe: VersionProbe = serde_json::from_str(json).map_err(|_| ConfigError::Encoding)?;
        if probe.version != CONFIGURATION_VERSION {
            return Err(ConfigError::SchemaMismatch {
                found: probe.version,
                expected: CONFIGURATION_VERSION,
            });
        }
        serde_json::from_str(json).map_err(|_| ConfigError::Encoding)
    }

    /// Slots that pass credential validation, with their index.
    pub fn valid_endpoints(&self) -> impl Iterator<Item = (usize, &EndpointConfig)> {
        self.endpoints.iter().enumerate().filter(|(_, ep)| ep.is_valid())
    }

    /// `true` when static addressing is configured.
    pub fn has_static_ip(&self) -> bool {
        !self.ip_addr.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Timings
// ---------------------------------------------------------------------------

/// Wait bounds and retry backoff for the connectivity layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Wait for connected/disconnected after a station start.
    pub connect_timeout_ms: u32,
    /// Wait for scan completion.
    pub scan_timeout_ms: u32,
    /// Wait for stop completion bits.
    pub stop_timeout_ms: u32,
    /// Minimum pause between connect attempts.
    pub backoff_base_ms: u32,
    /// Random jitter mask added on top of the base.
    pub backoff_jitter_mask: u32,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 60_000,
            scan_timeout_ms: 120_000,
            stop_timeout_ms: 30_000,
            backoff_base_ms: 100,
            backoff_jitter_mask: 0x1FF,
        }
    }
}

impl Timings {
    /// Backoff for a given random draw: `base + (random & mask)`.
    pub fn backoff_ms(&self, random: u32) -> u32 {
        self.backoff_base_ms
            .saturating_add(random & self.backoff_jitter_mask)
    }
}
