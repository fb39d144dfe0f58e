//! Single-slot mailboxes for work waiting on a device's next check-in.
//!
//! Each device has one slot per kind (configuration, command). A new value
//! overwrites an undelivered one; `take` hands the value out exactly once.
//! There is no acknowledgment loop: if the response carrying the value is
//! lost, so is the value.

use serde_json::Value;

/// At most one outstanding value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingSlot<T> {
    item: Option<T>,
}

impl<T> PendingSlot<T> {
    pub const fn new() -> Self {
        Self { item: None }
    }

    /// Store `item`, returning the undelivered value it replaced.
    pub fn set(&mut self, item: T) -> Option<T> {
        self.item.replace(item)
    }

    /// Return and clear the pending value.
    pub fn take(&mut self) -> Option<T> {
        self.item.take()
    }

    pub fn is_pending(&self) -> bool {
        self.item.is_some()
    }
}

/// Both mailboxes for one device.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingWork {
    pub config: PendingSlot<Value>,
    pub command: PendingSlot<Value>,
}
