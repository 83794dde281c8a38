//! Error types for the provisioning workflow.

use std::fmt;

use thiserror::Error;

use crate::instance::AlreadyAssigned;
use crate::wait::WaitError;

use super::ssh::SshKeyError;

/// Step of the provisioning workflow, used to label failures.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProvisionStep {
    /// Preparing SSH key material.
    SshKey,
    /// Creating the server.
    CreateServer,
    /// Assigning the private address to the secondary interface.
    AssignPrivateIp,
    /// Creating customisation notes.
    CreateNotes,
    /// Resolving the base image.
    ResolveImage,
    /// Creating the boot disk and waiting for it.
    CreateDisk,
    /// Attaching the boot disk.
    AttachDisk,
    /// Pushing the disk edit payload.
    ConfigureDisk,
    /// Connecting packet filters.
    PacketFilters,
    /// Powering the server on.
    PowerOn,
    /// Waiting through the customisation reboot.
    Reboot,
    /// Registering DNS and GSLB records.
    AuxRecords,
}

impl ProvisionStep {
    /// Short label used in logs and error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SshKey => "prepare ssh key",
            Self::CreateServer => "create server",
            Self::AssignPrivateIp => "assign private ip",
            Self::CreateNotes => "create notes",
            Self::ResolveImage => "resolve base image",
            Self::CreateDisk => "create disk",
            Self::AttachDisk => "attach disk",
            Self::ConfigureDisk => "configure disk",
            Self::PacketFilters => "connect packet filters",
            Self::PowerOn => "power on",
            Self::Reboot => "customisation reboot",
            Self::AuxRecords => "register dns/gslb records",
        }
    }
}

impl fmt::Display for ProvisionStep {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Errors raised while provisioning an instance.
#[derive(Debug, Error)]
pub enum ProvisionError<ApiError>
where
    ApiError: std::error::Error + 'static,
{
    /// Key material could not be prepared; nothing billable exists yet.
    #[error("prepare ssh key: {source}")]
    SshKey {
        /// Underlying key error.
        #[from]
        source: SshKeyError,
    },
    /// A provider call failed.
    #[error("{step}: {source}")]
    Api {
        /// Failing step.
        step: ProvisionStep,
        /// Provider-specific error.
        #[source]
        source: ApiError,
    },
    /// A wait between steps failed.
    #[error("{step}: {source}")]
    Wait {
        /// Failing step.
        step: ProvisionStep,
        /// Wait failure.
        #[source]
        source: WaitError,
    },
    /// The instance already tracks a resource of this kind.
    #[error("{step}: {source}")]
    Instance {
        /// Failing step.
        step: ProvisionStep,
        /// Conflicting identifier.
        #[source]
        source: AlreadyAssigned,
    },
    /// The provider did not return the secondary interface.
    #[error("{step}: server has no secondary interface")]
    MissingInterface {
        /// Failing step.
        step: ProvisionStep,
    },
    /// A requested packet filter could not be resolved.
    #[error("{step}: packet filter {reference} not found")]
    PacketFilterNotFound {
        /// Failing step.
        step: ProvisionStep,
        /// Reference as supplied (ID or name).
        reference: String,
    },
    /// No address is known to register.
    #[error("{step}: server reported no address")]
    MissingAddress {
        /// Failing step.
        step: ProvisionStep,
    },
    /// The failure was followed by a compensating teardown.
    #[error("{source} ({cleanup})")]
    CleanedUp {
        /// Original failure.
        #[source]
        source: Box<Self>,
        /// Outcome of the compensating teardown.
        cleanup: String,
    },
}

impl<ApiError> ProvisionError<ApiError>
where
    ApiError: std::error::Error + 'static,
{
    /// Step at which provisioning stopped.
    #[must_use]
    pub fn step(&self) -> ProvisionStep {
        match self {
            Self::SshKey { .. } => ProvisionStep::SshKey,
            Self::Api { step, .. }
            | Self::Wait { step, .. }
            | Self::Instance { step, .. }
            | Self::MissingInterface { step }
            | Self::PacketFilterNotFound { step, .. }
            | Self::MissingAddress { step } => *step,
            Self::CleanedUp { source, .. } => source.step(),
        }
    }

    pub(crate) fn api(step: ProvisionStep) -> impl FnOnce(ApiError) -> Self {
        move |source| Self::Api { step, source }
    }

    pub(crate) fn wait(step: ProvisionStep) -> impl FnOnce(WaitError) -> Self {
        move |source| Self::Wait { step, source }
    }
}
