//! GPIO assignments for the development board.
//!
//! Single source of truth: drivers and board hooks reference this module
//! rather than hard-coding pin numbers.

/// Strapping pin wired to the on-board BOOT button.  Active LOW, needs the
/// internal pull-up.
pub const BOOT_BUTTON_GPIO: i32 = 0;

/// Digital output: enables the switched 3V3 rail feeding external
/// peripherals (active HIGH).
pub const PERIPHERAL_POWER_GPIO: i32 = 4;
