//! Application core: boot sequencing and port definitions.
//!
//! [`controller`] owns the boot stages and the connectivity policies.  All
//! interaction with the SoC goes through the **port traits** in [`ports`],
//! so this layer runs unchanged against the simulation adapters.

pub mod controller;
pub mod events;
pub mod ports;
