//! Application core — domain logic behind port traits.
//!
//! This module contains the operator-facing service, the structured events
//! the core emits, and the ports through which it reaches storage and
//! logging. Device-facing protocol handling lives in [`crate::rpc`].

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
