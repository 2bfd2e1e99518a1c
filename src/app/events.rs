//! Inbound driver events.
//!
//! The radio driver raises events on its own task.  Adapters convert the
//! vendor's `(base, id, data)` triple into a [`DriverEvent`] and hand it to
//! the subscribed [`EventCallback`]; the connectivity manager's translation
//! function is the only consumer.

use std::net::Ipv4Addr;
use std::sync::Arc;

use crate::adapters::device_id::MacAddress;

/// Event namespaces a callback can be subscribed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventNamespace {
    /// Radio link layer (`WIFI_EVENT`).
    Wifi,
    /// IP layer (`IP_EVENT`).
    Ip,
}

/// Radio link-layer events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WifiEvent {
    StaStart,
    StaStop,
    StaConnected,
    StaDisconnected { ssid: heapless::String<32>, reason: u8 },
    ApStart,
    ApStop,
    ApStaConnected { mac: MacAddress, aid: u8 },
    ApStaDisconnected { mac: MacAddress, aid: u8 },
    ScanDone { count: u8 },
    /// Any id this crate does not act on.
    Other(i32),
}

/// IP-layer events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IpEvent {
    StaGotIp { ip: Ipv4Addr },
    StaLostIp,
    Other(i32),
}

/// One event from the driver task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    Wifi(WifiEvent),
    Ip(IpEvent),
}

impl DriverEvent {
    pub fn namespace(&self) -> EventNamespace {
        match self {
            Self::Wifi(_) => EventNamespace::Wifi,
            Self::Ip(_) => EventNamespace::Ip,
        }
    }
}

/// Subscriber invoked on the driver's event task.  Must not block.
pub type EventCallback = Arc<dyn Fn(DriverEvent) + Send + Sync>;

/// Disconnect reason codes reported by the radio (IEEE 802.11 plus vendor
/// extensions above 200).
pub mod reason {
    pub const UNSPECIFIED: u8 = 1;
    pub const AUTH_EXPIRE: u8 = 2;
    pub const ASSOC_LEAVE: u8 = 8;
    pub const FOURWAY_HANDSHAKE_TIMEOUT: u8 = 15;
    pub const BEACON_TIMEOUT: u8 = 200;
    pub const NO_AP_FOUND: u8 = 201;
    pub const AUTH_FAIL: u8 = 202;
    pub const ASSOC_FAIL: u8 = 203;
    pub const HANDSHAKE_TIMEOUT: u8 = 204;
}
