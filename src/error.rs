//! Unified error types for the board manager.
//!
//! A single `Error` enum that every layer converts into, keeping the boot
//! sequence and the connect/retry loop's error handling uniform.  All
//! variants are `Copy` so they can be recorded as "last observed error" by
//! the retry policy without allocation.

use core::fmt;

use crate::app::ports::StoreError;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the crate funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A credential slot or the persisted configuration is invalid.
    Config(ConfigError),
    /// The radio driver (or another platform service) rejected a command.
    Driver(DriverError),
    /// The station was refused or dropped by the access point.
    Disconnected { reason: u8 },
    /// A bounded wait expired.  The payload names what was being waited for.
    Timeout(&'static str),
    /// API misuse: call out of order, re-entrant init, start while active.
    State(&'static str),
    /// The configuration store collaborator failed.
    Store(StoreError),
}

impl Error {
    /// Errors worth another connect cycle: the radio answered, just not
    /// with an association.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Disconnected { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "configuration: {e}"),
            Self::Driver(e) => write!(f, "driver: {e}"),
            Self::Disconnected { reason } => write!(f, "disconnected (reason {reason})"),
            Self::Timeout(what) => write!(f, "timeout waiting for {what}"),
            Self::State(msg) => write!(f, "invalid state: {msg}"),
            Self::Store(e) => write!(f, "store: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Identifier length outside 1..=31 bytes.
    InvalidIdentifier { len: usize },
    /// Secret length outside 8..=63 bytes.
    InvalidSecret { len: usize },
    /// A mode needs a credential that was not supplied.
    MissingEndpoint(&'static str),
    /// Every configured slot failed validation.
    NoValidEndpoint,
    /// Persisted schema version differs from the compiled-in one.
    SchemaMismatch { found: u32, expected: u32 },
    /// JSON encode/decode failure.
    Encoding,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidIdentifier { len } => {
                write!(f, "identifier length {len} outside 1..=31")
            }
            Self::InvalidSecret { len } => write!(f, "secret length {len} outside 8..=63"),
            Self::MissingEndpoint(which) => write!(f, "missing {which} endpoint"),
            Self::NoValidEndpoint => write!(f, "no valid endpoint slot configured"),
            Self::SchemaMismatch { found, expected } => {
                write!(f, "schema version {found}, expected {expected}")
            }
            Self::Encoding => write!(f, "JSON encoding failed"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Driver errors
// ---------------------------------------------------------------------------

/// A vendor call returned a non-OK code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverError {
    /// Name of the rejected operation, e.g. `"esp_wifi_start"`.
    pub op: &'static str,
    /// Raw vendor error code (`esp_err_t` on target).
    pub code: i32,
}

impl DriverError {
    pub const fn new(op: &'static str, code: i32) -> Self {
        Self { op, code }
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed (0x{:04x})", self.op, self.code)
    }
}

impl From<DriverError> for Error {
    fn from(e: DriverError) -> Self {
        Self::Driver(e)
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::SchemaMismatch { found, expected } => {
                Self::Config(ConfigError::SchemaMismatch { found, expected })
            }
            other => Self::Store(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
