//! Create flags and their mapping onto [`ServerOptions`].

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::server_config::ServerOptions;

/// Value type of a flag.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FlagKind {
    /// Free-form text.
    String,
    /// Non-negative integer.
    Int,
    /// Switch.
    Bool,
}

/// Default value advertised for a flag.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FlagDefault {
    /// No default; empty means "unset".
    None,
    /// Text default.
    Text(&'static str),
    /// Integer default.
    Int(u32),
    /// Switch default.
    Bool(bool),
}

impl fmt::Display for FlagDefault {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => Ok(()),
            Self::Text(text) => formatter.write_str(text),
            Self::Int(value) => write!(formatter, "{value}"),
            Self::Bool(value) => write!(formatter, "{value}"),
        }
    }
}

/// One create flag offered to the host runtime.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FlagSpec {
    /// Flag name without leading dashes.
    pub name: &'static str,
    /// Environment variable supplying the value.
    pub env_var: &'static str,
    /// Help text.
    pub usage: &'static str,
    /// Value type.
    pub kind: FlagKind,
    /// Default value.
    pub default: FlagDefault,
}

const fn flag(
    name: &'static str,
    env_var: &'static str,
    usage: &'static str,
    kind: FlagKind,
    default: FlagDefault,
) -> FlagSpec {
    FlagSpec {
        name,
        env_var,
        usage,
        kind,
        default,
    }
}

/// Flag names, shared by the table, the mapping and the CLI.
pub mod names {
    /// `--sakuracloud-host-name`.
    pub const HOST_NAME: &str = "sakuracloud-host-name";
    /// `--sakuracloud-os-type`.
    pub const OS_TYPE: &str = "sakuracloud-os-type";
    /// `--sakuracloud-core`.
    pub const CORE: &str = "sakuracloud-core";
    /// `--sakuracloud-memory`.
    pub const MEMORY: &str = "sakuracloud-memory";
    /// `--sakuracloud-disk-plan`.
    pub const DISK_PLAN: &str = "sakuracloud-disk-plan";
    /// `--sakuracloud-disk-size`.
    pub const DISK_SIZE: &str = "sakuracloud-disk-size";
    /// `--sakuracloud-disk-connection`.
    pub const DISK_CONNECTION: &str = "sakuracloud-disk-connection";
    /// `--sakuracloud-disk-source-archive-id`.
    pub const DISK_SOURCE_ARCHIVE_ID: &str = "sakuracloud-disk-source-archive-id";
    /// `--sakuracloud-interface-driver`.
    pub const INTERFACE_DRIVER: &str = "sakuracloud-interface-driver";
    /// `--sakuracloud-password`.
    pub const PASSWORD: &str = "sakuracloud-password";
    /// `--sakuracloud-enable-password-auth`.
    pub const ENABLE_PASSWORD_AUTH: &str = "sakuracloud-enable-password-auth";
    /// `--sakuracloud-packet-filter`.
    pub const PACKET_FILTER: &str = "sakuracloud-packet-filter";
    /// `--sakuracloud-private-packet-filter`.
    pub const PRIVATE_PACKET_FILTER: &str = "sakuracloud-private-packet-filter";
    /// `--sakuracloud-engine-port`.
    pub const ENGINE_PORT: &str = "sakuracloud-engine-port";
    /// `--sakuracloud-ssh-key`.
    pub const SSH_KEY: &str = "sakuracloud-ssh-key";
    /// `--sakuracloud-connected-switch`.
    pub const CONNECTED_SWITCH: &str = "sakuracloud-connected-switch";
    /// `--sakuracloud-private-ip`.
    pub const PRIVATE_IP: &str = "sakuracloud-private-ip";
    /// `--sakuracloud-private-ip-subnet-mask`.
    pub const PRIVATE_IP_SUBNET_MASK: &str = "sakuracloud-private-ip-subnet-mask";
    /// `--sakuracloud-private-ip-only`.
    pub const PRIVATE_IP_ONLY: &str = "sakuracloud-private-ip-only";
    /// `--sakuracloud-gateway`.
    pub const GATEWAY: &str = "sakuracloud-gateway";
    /// `--sakuracloud-group`.
    pub const GROUP: &str = "sakuracloud-group";
    /// `--sakuracloud-auto-reboot`.
    pub const AUTO_REBOOT: &str = "sakuracloud-auto-reboot";
    /// `--sakuracloud-ignore-virtio-net`.
    pub const IGNORE_VIRTIO_NET: &str = "sakuracloud-ignore-virtio-net";
    /// `--sakuracloud-dns-zone`.
    pub const DNS_ZONE: &str = "sakuracloud-dns-zone";
    /// `--sakuracloud-gslb`.
    pub const GSLB: &str = "sakuracloud-gslb";
    /// `--sakuracloud-cleanup-on-failure`.
    pub const CLEANUP_ON_FAILURE: &str = "sakuracloud-cleanup-on-failure";
}

use names::*;

const CREATE_FLAGS: &[FlagSpec] = &[
    flag(
        HOST_NAME,
        "SAKURACLOUD_HOST_NAME",
        "Host name (defaults to the machine name)",
        FlagKind::String,
        FlagDefault::None,
    ),
    flag(
        OS_TYPE,
        "SAKURACLOUD_OS_TYPE",
        "OS type: ubuntu, centos, coreos or rancheros",
        FlagKind::String,
        FlagDefault::Text("ubuntu"),
    ),
    flag(
        CORE,
        "SAKURACLOUD_CORE",
        "Number of CPU cores",
        FlagKind::Int,
        FlagDefault::Int(1),
    ),
    flag(
        MEMORY,
        "SAKURACLOUD_MEMORY",
        "Memory size in GB",
        FlagKind::Int,
        FlagDefault::Int(1),
    ),
    flag(
        DISK_PLAN,
        "SAKURACLOUD_DISK_PLAN",
        "Disk plan: ssd or hdd",
        FlagKind::String,
        FlagDefault::Text("ssd"),
    ),
    flag(
        DISK_SIZE,
        "SAKURACLOUD_DISK_SIZE",
        "Disk size in GB",
        FlagKind::Int,
        FlagDefault::Int(20),
    ),
    flag(
        DISK_CONNECTION,
        "SAKURACLOUD_DISK_CONNECTION",
        "Disk connection: virtio or ide",
        FlagKind::String,
        FlagDefault::Text("virtio"),
    ),
    flag(
        DISK_SOURCE_ARCHIVE_ID,
        "SAKURACLOUD_DISK_SOURCE_ARCHIVE_ID",
        "Source archive ID (defaults to the OS base image)",
        FlagKind::String,
        FlagDefault::None,
    ),
    flag(
        INTERFACE_DRIVER,
        "SAKURACLOUD_INTERFACE_DRIVER",
        "Interface driver: virtio or e1000",
        FlagKind::String,
        FlagDefault::Text("virtio"),
    ),
    flag(
        PASSWORD,
        "SAKURACLOUD_PASSWORD",
        "Login password (generated when empty)",
        FlagKind::String,
        FlagDefault::None,
    ),
    flag(
        ENABLE_PASSWORD_AUTH,
        "SAKURACLOUD_ENABLE_PASSWORD_AUTH",
        "Keep SSH password authentication enabled",
        FlagKind::Bool,
        FlagDefault::Bool(false),
    ),
    flag(
        PACKET_FILTER,
        "SAKURACLOUD_PACKET_FILTER",
        "Packet filter ID or name for the shared interface",
        FlagKind::String,
        FlagDefault::None,
    ),
    flag(
        PRIVATE_PACKET_FILTER,
        "SAKURACLOUD_PRIVATE_PACKET_FILTER",
        "Packet filter ID or name for the private interface",
        FlagKind::String,
        FlagDefault::None,
    ),
    flag(
        ENGINE_PORT,
        "SAKURACLOUD_ENGINE_PORT",
        "Docker engine port",
        FlagKind::Int,
        FlagDefault::Int(2376),
    ),
    flag(
        SSH_KEY,
        "SAKURACLOUD_SSH_KEY",
        "Private key to import instead of generating one",
        FlagKind::String,
        FlagDefault::None,
    ),
    flag(
        CONNECTED_SWITCH,
        "SAKURACLOUD_CONNECTED_SWITCH",
        "Switch ID for the secondary interface",
        FlagKind::String,
        FlagDefault::None,
    ),
    flag(
        PRIVATE_IP,
        "SAKURACLOUD_PRIVATE_IP",
        "Static address of the secondary interface",
        FlagKind::String,
        FlagDefault::None,
    ),
    flag(
        PRIVATE_IP_SUBNET_MASK,
        "SAKURACLOUD_PRIVATE_IP_SUBNET_MASK",
        "Subnet mask of the secondary interface",
        FlagKind::String,
        FlagDefault::Text("255.255.255.0"),
    ),
    flag(
        PRIVATE_IP_ONLY,
        "SAKURACLOUD_PRIVATE_IP_ONLY",
        "Use only the private address and disable the shared interface",
        FlagKind::Bool,
        FlagDefault::Bool(false),
    ),
    flag(
        GATEWAY,
        "SAKURACLOUD_GATEWAY",
        "Default gateway override",
        FlagKind::String,
        FlagDefault::None,
    ),
    flag(
        GROUP,
        "SAKURACLOUD_GROUP",
        "Group tag for the server",
        FlagKind::String,
        FlagDefault::None,
    ),
    flag(
        AUTO_REBOOT,
        "SAKURACLOUD_AUTO_REBOOT",
        "Restart the server automatically on host failure",
        FlagKind::Bool,
        FlagDefault::Bool(false),
    ),
    flag(
        IGNORE_VIRTIO_NET,
        "SAKURACLOUD_IGNORE_VIRTIO_NET",
        "Do not tag the server with @virtio-net-pci",
        FlagKind::Bool,
        FlagDefault::Bool(false),
    ),
    flag(
        DNS_ZONE,
        "SAKURACLOUD_DNS_ZONE",
        "DNS zone to register the machine in",
        FlagKind::String,
        FlagDefault::None,
    ),
    flag(
        GSLB,
        "SAKURACLOUD_GSLB",
        "GSLB group to register the machine in",
        FlagKind::String,
        FlagDefault::None,
    ),
    flag(
        CLEANUP_ON_FAILURE,
        "SAKURACLOUD_CLEANUP_ON_FAILURE",
        "Remove partially created resources when provisioning fails",
        FlagKind::Bool,
        FlagDefault::Bool(false),
    ),
];

/// Flags accepted by `create`.
#[must_use]
pub fn create_flags() -> &'static [FlagSpec] {
    CREATE_FLAGS
}

/// Raised when a flag carries an unusable value.
#[derive(Debug, Error, Eq, PartialEq)]
#[error("--{name}: {message}")]
pub struct FlagError {
    /// Offending flag.
    pub name: &'static str,
    /// What was wrong.
    pub message: String,
}

/// Read access to the option values supplied by the host runtime.
///
/// `None` means the host did not supply the flag; the documented default
/// applies.
pub trait DriverOptions {
    /// Text value of a flag.
    fn string(&self, name: &str) -> Option<String>;
    /// Integer value of a flag.
    fn int(&self, name: &str) -> Option<i64>;
    /// Switch value of a flag.
    fn bool(&self, name: &str) -> Option<bool>;
}

/// Value stored in a [`FlagMap`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FlagValue {
    /// Text.
    Text(String),
    /// Integer.
    Int(i64),
    /// Switch.
    Bool(bool),
}

/// In-memory [`DriverOptions`] keyed by flag name.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FlagMap {
    values: BTreeMap<String, FlagValue>,
}

impl FlagMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a flag value, returning the map for chaining.
    #[must_use]
    pub fn with(mut self, name: &str, value: FlagValue) -> Self {
        self.insert(name, value);
        self
    }

    /// Sets a flag value.
    pub fn insert(&mut self, name: &str, value: FlagValue) {
        self.values.insert(name.to_owned(), value);
    }
}

impl DriverOptions for FlagMap {
    fn string(&self, name: &str) -> Option<String> {
        match self.values.get(name)? {
            FlagValue::Text(text) => Some(text.clone()),
            FlagValue::Int(value) => Some(value.to_string()),
            FlagValue::Bool(value) => Some(value.to_string()),
        }
    }

    fn int(&self, name: &str) -> Option<i64> {
        match self.values.get(name)? {
            FlagValue::Int(value) => Some(*value),
            FlagValue::Text(text) => text.trim().parse().ok(),
            FlagValue::Bool(_) => None,
        }
    }

    fn bool(&self, name: &str) -> Option<bool> {
        match self.values.get(name)? {
            FlagValue::Bool(value) => Some(*value),
            FlagValue::Text(text) => text.trim().parse().ok(),
            FlagValue::Int(value) => Some(*value != 0),
        }
    }
}

fn set_text(opts: &impl DriverOptions, name: &'static str, target: &mut String) {
    if let Some(value) = opts.string(name) {
        *target = value;
    }
}

fn set_bool(opts: &impl DriverOptions, name: &'static str, target: &mut bool) {
    if let Some(value) = opts.bool(name) {
        *target = value;
    }
}

fn set_int<T: TryFrom<i64>>(
    opts: &impl DriverOptions,
    name: &'static str,
    target: &mut T,
) -> Result<(), FlagError> {
    if let Some(value) = opts.int(name) {
        *target = T::try_from(value).map_err(|_| FlagError {
            name,
            message: format!("{value} is out of range"),
        })?;
    }
    Ok(())
}

/// Builds [`ServerOptions`] from host-supplied values, keeping defaults for
/// absent flags.
///
/// # Errors
///
/// Returns [`FlagError`] when an integer flag is negative or too large.
pub fn options_from_flags(opts: &impl DriverOptions) -> Result<ServerOptions, FlagError> {
    let mut options = ServerOptions::default();
    set_text(opts, HOST_NAME, &mut options.host_name);
    set_text(opts, OS_TYPE, &mut options.os_type);
    set_int(opts, CORE, &mut options.core)?;
    set_int(opts, MEMORY, &mut options.memory_gb)?;
    set_text(opts, DISK_PLAN, &mut options.disk_plan);
    set_int(opts, DISK_SIZE, &mut options.disk_size_gb)?;
    set_text(opts, DISK_CONNECTION, &mut options.disk_connection);
    set_text(
        opts,
        DISK_SOURCE_ARCHIVE_ID,
        &mut options.disk_source_archive_id,
    );
    set_text(opts, INTERFACE_DRIVER, &mut options.interface_driver);
    set_text(opts, PASSWORD, &mut options.password);
    set_bool(opts, ENABLE_PASSWORD_AUTH, &mut options.enable_password_auth);
    set_text(opts, PACKET_FILTER, &mut options.packet_filter);
    set_text(opts, PRIVATE_PACKET_FILTER, &mut options.private_packet_filter);
    set_int(opts, ENGINE_PORT, &mut options.engine_port)?;
    set_text(opts, SSH_KEY, &mut options.ssh_key);
    set_text(opts, CONNECTED_SWITCH, &mut options.connected_switch);
    set_text(opts, PRIVATE_IP, &mut options.private_ip);
    set_text(
        opts,
        PRIVATE_IP_SUBNET_MASK,
        &mut options.private_ip_subnet_mask,
    );
    set_bool(opts, PRIVATE_IP_ONLY, &mut options.private_ip_only);
    set_text(opts, GATEWAY, &mut options.gateway);
    set_text(opts, GROUP, &mut options.group);
    set_bool(opts, AUTO_REBOOT, &mut options.auto_reboot);
    set_bool(opts, IGNORE_VIRTIO_NET, &mut options.ignore_virtio_net);
    set_text(opts, DNS_ZONE, &mut options.dns_zone);
    set_text(opts, GSLB, &mut options.gslb);
    set_bool(opts, CLEANUP_ON_FAILURE, &mut options.cleanup_on_failure);
    Ok(options)
}
