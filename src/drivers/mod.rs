//! Board peripherals: one-shot pin setup and the peripheral power rail.

pub mod hw_init;
pub mod power;
