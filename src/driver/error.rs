//! Errors surfaced to the host runtime.

use thiserror::Error;

use crate::machine_store::MachineStoreError;
use crate::provision::{ProvisionError, SshKeyError};
use crate::server_config::ValidationError;
use crate::teardown::TeardownError;
use crate::types::ServerId;
use crate::wait::WaitError;

use super::flags::FlagError;

/// Errors raised by driver operations.
#[derive(Debug, Error)]
pub enum DriverError<ApiError>
where
    ApiError: std::error::Error + 'static,
{
    /// The machine record could not be read or written.
    #[error(transparent)]
    Store(#[from] MachineStoreError),
    /// A flag carried an unusable value.
    #[error(transparent)]
    Flag(#[from] FlagError),
    /// The options do not describe a valid server.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// No validated configuration is stored for the machine.
    #[error("machine {machine} has no configuration; run create with its flags first")]
    NotConfigured {
        /// Machine name.
        machine: String,
    },
    /// No server has been created for the machine.
    #[error("machine {machine} has no server")]
    NotCreated {
        /// Machine name.
        machine: String,
    },
    /// A server already exists for the machine.
    #[error("machine {machine} already has server {server_id}")]
    AlreadyCreated {
        /// Machine name.
        machine: String,
        /// Recorded server.
        server_id: ServerId,
    },
    /// Key material for import is missing or unreadable.
    #[error(transparent)]
    SshKey(#[from] SshKeyError),
    /// Provisioning failed.
    #[error(transparent)]
    Provision(#[from] ProvisionError<ApiError>),
    /// Removal failed.
    #[error(transparent)]
    Teardown(#[from] TeardownError<ApiError>),
    /// A provider call made directly by the driver failed.
    #[error("{action}: {source}")]
    Api {
        /// Driver operation that issued the call.
        action: &'static str,
        /// Provider-specific error.
        #[source]
        source: ApiError,
    },
    /// Waiting for a power state failed.
    #[error(transparent)]
    Wait(#[from] WaitError),
    /// No address is known for the machine.
    #[error("machine {machine} has no ip address")]
    NoAddress {
        /// Machine name.
        machine: String,
    },
}

impl<ApiError> DriverError<ApiError>
where
    ApiError: std::error::Error + 'static,
{
    pub(super) fn api(action: &'static str) -> impl FnOnce(ApiError) -> Self {
        move |source| Self::Api { action, source }
    }
}
