//! Runtime state of the managed instance.

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{DiskId, ServerId};

/// Lifecycle state reported to the host runtime.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum InstanceState {
    /// Status string not recognised.
    Unknown,
    /// Powered on.
    Running,
    /// Shutting down.
    Stopping,
    /// Powered off.
    Stopped,
}

impl InstanceState {
    /// Maps a provider instance status onto a lifecycle state.
    #[must_use]
    pub fn from_status(status: &str) -> Self {
        match status {
            "up" => Self::Running,
            "cleaning" => Self::Stopping,
            "down" => Self::Stopped,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unknown => "Unknown",
            Self::Running => "Running",
            Self::Stopping => "Stopping",
            Self::Stopped => "Stopped",
        };
        formatter.write_str(label)
    }
}

/// Raised when a set-once identifier would be overwritten.
#[derive(Debug, Error, Eq, PartialEq)]
#[error("{kind} identifier is already set to {existing}")]
pub struct AlreadyAssigned {
    /// Resource kind (`server` or `disk`).
    pub kind: &'static str,
    /// Identifier already recorded.
    pub existing: String,
}

/// Provider identifiers and address of one managed instance.
///
/// The server and disk identifiers can each be assigned once until the
/// instance is cleared.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    server_id: Option<ServerId>,
    disk_id: Option<DiskId>,
    ip: Option<IpAddr>,
}

impl Instance {
    /// Creates an instance with no provider resources.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Server identifier, once the server exists.
    #[must_use]
    pub const fn server_id(&self) -> Option<&ServerId> {
        self.server_id.as_ref()
    }

    /// Disk identifier, once the disk exists.
    #[must_use]
    pub const fn disk_id(&self) -> Option<&DiskId> {
        self.disk_id.as_ref()
    }

    /// Last known address.
    #[must_use]
    pub const fn ip(&self) -> Option<IpAddr> {
        self.ip
    }

    /// Records the server identifier.
    ///
    /// # Errors
    ///
    /// Returns [`AlreadyAssigned`] when an identifier is already recorded.
    pub fn assign_server(&mut self, id: ServerId) -> Result<(), AlreadyAssigned> {
        match &self.server_id {
            Some(existing) => Err(AlreadyAssigned {
                kind: "server",
                existing: existing.to_string(),
            }),
            None => {
                self.server_id = Some(id);
                Ok(())
            }
        }
    }

    /// Records the disk identifier.
    ///
    /// # Errors
    ///
    /// Returns [`AlreadyAssigned`] when an identifier is already recorded.
    pub fn assign_disk(&mut self, id: DiskId) -> Result<(), AlreadyAssigned> {
        match &self.disk_id {
            Some(existing) => Err(AlreadyAssigned {
                kind: "disk",
                existing: existing.to_string(),
            }),
            None => {
                self.disk_id = Some(id);
                Ok(())
            }
        }
    }

    /// Forgets every provider resource after the server has been removed.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Updates the last known address.
    pub const fn set_ip(&mut self, ip: IpAddr) {
        self.ip = Some(ip);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("up", InstanceState::Running)]
    #[case("cleaning", InstanceState::Stopping)]
    #[case("down", InstanceState::Stopped)]
    #[case("migrating", InstanceState::Unknown)]
    #[case("", InstanceState::Unknown)]
    fn maps_provider_status(#[case] status: &str, #[case] expected: InstanceState) {
        assert_eq!(InstanceState::from_status(status), expected);
    }

    #[test]
    fn server_id_is_set_once() {
        let mut instance = Instance::new();
        instance
            .assign_server(ServerId::from("111"))
            .expect("first assignment succeeds");
        let err = instance
            .assign_server(ServerId::from("222"))
            .expect_err("second assignment must fail");
        assert_eq!(err.kind, "server");
        assert_eq!(instance.server_id().map(ServerId::as_str), Some("111"));
    }

    #[test]
    fn disk_id_is_set_once() {
        let mut instance = Instance::new();
        instance
            .assign_disk(DiskId::from("9"))
            .expect("first assignment succeeds");
        assert!(instance.assign_disk(DiskId::from("10")).is_err());
        assert_eq!(instance.disk_id().map(DiskId::as_str), Some("9"));
    }

    #[test]
    fn cleared_instance_accepts_new_ids() {
        let mut instance = Instance::new();
        instance
            .assign_server(ServerId::from("111"))
            .expect("first assignment succeeds");
        instance.set_ip(IpAddr::from([203, 0, 113, 1]));
        instance.clear();
        assert_eq!(instance, Instance::new());
        instance
            .assign_server(ServerId::from("222"))
            .expect("cleared instance takes a new server");
    }
}
