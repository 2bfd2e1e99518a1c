//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a subsystem against the
//! simulation adapters and the mocks in `mock_board`.  All tests run on the
//! host with no real hardware required.

#![cfg(not(target_os = "espidf"))]

mod config_store_tests;
mod connectivity_tests;
mod controller_tests;
mod mock_board;
