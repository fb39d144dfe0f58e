//! Inbound operator commands.
//!
//! These represent actions requested from the operator surface (HTTP today)
//! that the [`CloudService`](super::service::CloudService) interprets and
//! applies to device state.

use serde_json::Value;

/// Commands that operator-facing adapters send into the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum OperatorCommand {
    /// Overwrite the device's pending configuration update.
    QueueConfig { device_id: String, config: Value },

    /// Overwrite the device's pending remote command.
    QueueCommand { device_id: String, command: Value },

    /// Start a firmware delivery of `version` to the device.
    QueueUpdate { device_id: String, version: String },

    /// Remove the device's FOTA session, whatever its state.
    AbortUpdate { device_id: String },
}

impl OperatorCommand {
    pub fn device_id(&self) -> &str {
        match self {
            Self::QueueConfig { device_id, .. }
            | Self::QueueCommand { device_id, .. }
            | Self::QueueUpdate { device_id, .. }
            | Self::AbortUpdate { device_id } => device_id,
        }
    }
}
