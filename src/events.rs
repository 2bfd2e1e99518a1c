//! Cross-task signal bits.
//!
//! The radio driver delivers its callbacks on a foreign task; the boot task
//! blocks on [`EventSignal`] until the translation callback publishes the
//! outcome it is waiting for.
//!
//! ```text
//!   Driver task                     Boot task
//!   ───────────                     ─────────
//!   handle_event()                  wait_for_any_bit(mask, timeout)
//!     └─ set_bits(STA_CONNECTED) ──▶   └─ returns snapshot, clears matched
//! ```
//!
//! Bits are edge-triggered: a waiter that observes them clears them before
//! it resumes, so the next wait only sees fresh edges.  State and condition
//! variable share one lock, so a `set_bits` between the check and the sleep
//! cannot be missed.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Signal bit assignments
// ---------------------------------------------------------------------------

/// A set of signal bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SignalBits(u32);

impl SignalBits {
    pub const NONE: Self = Self(0);
    /// Station obtained an IP address.
    pub const STA_CONNECTED: Self = Self(1 << 0);
    /// Station association refused or dropped.
    pub const STA_DISCONNECTED: Self = Self(1 << 1);
    pub const SCAN_DONE: Self = Self(1 << 2);
    /// AP interface is up (link layer, not IP).
    pub const AP_STARTED: Self = Self(1 << 3);
    pub const AP_STOPPED: Self = Self(1 << 4);
    /// Every bit the primitive is allowed to carry.
    pub const ALL: Self = Self(0xFFFF);

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw & Self::ALL.0)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }
}

impl core::ops::BitOr for SignalBits {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl core::ops::BitOrAssign for SignalBits {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl core::ops::BitAnd for SignalBits {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        self.intersection(rhs)
    }
}

// ---------------------------------------------------------------------------
// EventSignal
// ---------------------------------------------------------------------------

struct Shared {
    /// `None` until [`EventSignal::create`] and after [`EventSignal::destroy`].
    bits: Mutex<Option<u32>>,
    cond: Condvar,
}

/// Multi-bit signalling primitive shared between the driver event task and
/// the boot task.  Clones are handles to the same primitive.
#[derive(Clone)]
pub struct EventSignal {
    shared: Arc<Shared>,
}

impl Default for EventSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for EventSignal {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventSignal")
            .field("bits", &*self.lock())
            .finish()
    }
}

enum WaitMode {
    Any,
    All,
}

impl WaitMode {
    fn satisfied(&self, bits: u32, mask: u32) -> bool {
        match self {
            Self::Any => bits & mask != 0,
            Self::All => bits & mask == mask,
        }
    }
}

impl EventSignal {
    /// A handle to a not-yet-created primitive.  Waits return 0 and sets are
    /// dropped until [`create`](Self::create) runs.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                bits: Mutex::new(None),
                cond: Condvar::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<u32>> {
        self.shared
            .bits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate the primitive.  Idempotent; existing bits are kept.
    pub fn create(&self) -> bool {
        let mut bits = self.lock();
        if bits.is_none() {
            *bits = Some(0);
            log::debug!("signal: created");
        }
        true
    }

    /// Release the primitive and wake every waiter with 0.
    pub fn destroy(&self) {
        let mut bits = self.lock();
        *bits = None;
        self.shared.cond.notify_all();
        log::debug!("signal: destroyed");
    }

    pub fn is_created(&self) -> bool {
        self.lock().is_some()
    }

    /// OR `mask` into the current bits.  Safe from any task.
    pub fn set_bits(&self, mask: SignalBits) {
        let mut bits = self.lock();
        if let Some(current) = bits.as_mut() {
            *current |= mask.raw();
            self.shared.cond.notify_all();
        }
    }

    pub fn clear_bits(&self, mask: SignalBits) {
        if let Some(current) = self.lock().as_mut() {
            *current &= !mask.raw();
        }
    }

    /// Snapshot of the current bits (0 if not created).
    pub fn get_bits(&self) -> SignalBits {
        SignalBits::from_raw(self.lock().unwrap_or(0))
    }

    /// Block until any bit of `mask` is set or `timeout_ms` expires.
    ///
    /// Returns the bit snapshot taken at wake-up.  On success the matched
    /// bits are cleared before returning; on timeout nothing is cleared.
    pub fn wait_for_any_bit(&self, mask: SignalBits, timeout_ms: u32) -> SignalBits {
        self.wait(mask, timeout_ms, WaitMode::Any)
    }

    /// Block until every bit of `mask` is set or `timeout_ms` expires.
    pub fn wait_for_all_bits(&self, mask: SignalBits, timeout_ms: u32) -> SignalBits {
        self.wait(mask, timeout_ms, WaitMode::All)
    }

    fn wait(&self, mask: SignalBits, timeout_ms: u32, mode: WaitMode) -> SignalBits {
        let mask = mask.raw();
        let mut guard = self.lock();
        if guard.is_none() {
            return SignalBits::NONE;
        }

        let deadline = Instant::now() + Duration::from_millis(u64::from(timeout_ms));
        loop {
            let Some(current) = *guard else {
                // Destroyed while we slept.
                return SignalBits::NONE;
            };
            if mode.satisfied(current, mask) {
                *guard = Some(current & !mask);
                return SignalBits::from_raw(current);
            }
            let now = Instant::now();
            if now >= deadline {
                return SignalBits::from_raw(current);
            }
            guard = self
                .shared
                .cond
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}
