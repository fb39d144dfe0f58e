//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! through the public service API with in-memory adapters.

mod auth_tests;
mod mock_sink;
mod queue_tests;
mod service_tests;
