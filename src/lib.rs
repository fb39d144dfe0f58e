//! EcoWatt cloud control plane.
//!
//! Devices poll one authenticated check-in endpoint; every response may
//! carry a configuration update, a remote command and the next step of a
//! chunked firmware delivery. The library exposes the core for the binary
//! and for integration testing.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod error;
pub mod firmware;
pub mod queue;
pub mod registry;
pub mod rpc;
pub mod telemetry;

pub use app::service::CloudService;
pub use error::{Error, Result};
