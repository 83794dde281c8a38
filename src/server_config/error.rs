//! Validation errors raised while building a [`super::ServerConfig`].

use thiserror::Error;

/// Describes exactly which server option failed validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ValidationError {
    /// The host name resolved to an empty string.
    #[error("host name must not be empty (set --sakuracloud-host-name)")]
    EmptyHostName,
    /// The OS type is not one of the supported families.
    #[error("unsupported --sakuracloud-os-type {value:?}: expected one of {allowed}")]
    UnknownOsType {
        /// Rejected value.
        value: String,
        /// Comma separated list of accepted values.
        allowed: &'static str,
    },
    /// Core count or memory size is zero.
    #[error("--sakuracloud-{flag} must be greater than zero")]
    ZeroCompute {
        /// Offending flag suffix (`core` or `memory`).
        flag: &'static str,
    },
    /// The core/memory pair does not match a provider plan.
    #[error(
        "no server plan matches --sakuracloud-core {core} and --sakuracloud-memory {memory_gb}"
    )]
    UnsupportedPlan {
        /// Requested core count.
        core: u32,
        /// Requested memory in GB.
        memory_gb: u32,
    },
    /// The plan catalogue could not be queried.
    #[error("failed to look up server plan {plan_id}: {message}")]
    PlanLookup {
        /// Composite plan identifier.
        plan_id: String,
        /// Provider error text.
        message: String,
    },
    /// The disk plan is not `ssd` or `hdd`.
    #[error("unsupported --sakuracloud-disk-plan {0:?}: expected ssd or hdd")]
    UnknownDiskPlan(String),
    /// The disk size is not legal for the selected tier.
    #[error("unsupported --sakuracloud-disk-size {size_gb} for {plan} disks: expected one of {allowed}")]
    UnsupportedDiskSize {
        /// Selected disk tier.
        plan: &'static str,
        /// Requested size in GB.
        size_gb: u32,
        /// Comma separated list of legal sizes.
        allowed: String,
    },
    /// The disk connection is not `virtio` or `ide`.
    #[error("unsupported --sakuracloud-disk-connection {0:?}: expected virtio or ide")]
    UnknownDiskConnection(String),
    /// The interface driver is not `virtio` or `e1000`.
    #[error("unsupported --sakuracloud-interface-driver {0:?}: expected virtio or e1000")]
    UnknownInterfaceDriver(String),
    /// A private network feature was requested without a private IP.
    #[error("--sakuracloud-private-ip is required when {requested_by} is set")]
    MissingPrivateIp {
        /// Flag that requires the private address.
        requested_by: &'static str,
    },
    /// A private network feature was requested without a subnet mask.
    #[error("--sakuracloud-private-ip-subnet-mask is required when {requested_by} is set")]
    MissingSubnetMask {
        /// Flag that requires the subnet mask.
        requested_by: &'static str,
    },
    /// An address flag could not be parsed as IPv4.
    #[error("--sakuracloud-{flag} {value:?} is not a valid IPv4 address")]
    InvalidAddress {
        /// Offending flag suffix.
        flag: &'static str,
        /// Rejected value.
        value: String,
    },
}
