//! Board definitions: [`BoardHooks`](crate::app::controller::BoardHooks)
//! implementations for concrete hardware.

pub mod dev;

pub use dev::DevBoard;
