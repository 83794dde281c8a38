//! Command-line interface definitions for the `sacloud-machine` binary.
//!
//! The parser lives in its own module so the build script can include it
//! when rendering the manual page.

use clap::{Args, Parser, Subcommand};

/// Top-level CLI for the `sacloud-machine` binary.
#[derive(Debug, Parser)]
#[command(
    name = "sacloud-machine",
    about = "Provision and manage Docker hosts on Sakura Cloud",
    arg_required_else_help = true
)]
pub(crate) struct Cli {
    /// Name of the machine to act on.
    #[arg(
        long,
        global = true,
        env = "MACHINE_NAME",
        default_value = "default",
        value_name = "NAME"
    )]
    pub(crate) machine_name: String,
    /// Directory holding machine records and keys.
    #[arg(
        long,
        global = true,
        env = "MACHINE_STORAGE_PATH",
        default_value = ".sacloud-machine",
        value_name = "PATH"
    )]
    pub(crate) store_path: String,
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// Driver operations.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Validate the flags and provision a new server.
    Create(Box<CreateArgs>),
    /// Power the server on and wait until it runs.
    Start,
    /// Shut the server down gracefully and wait until it stops.
    Stop,
    /// Force the server off.
    Kill,
    /// Stop and start the server.
    Restart,
    /// Delete the server, its disk and the machine record.
    Remove,
    /// Print the server's lifecycle state.
    State,
    /// Print the machine's IP address.
    Ip,
    /// Print the Docker engine URL.
    Url,
    /// List the flags accepted by `create`.
    Flags,
}

/// Flags accepted by `sacloud-machine create`.
#[derive(Debug, Default, Args)]
pub(crate) struct CreateArgs {
    /// Host name (defaults to the machine name).
    #[arg(long = "sakuracloud-host-name", env = "SAKURACLOUD_HOST_NAME")]
    pub(crate) host_name: Option<String>,
    /// OS type: ubuntu, centos, coreos or rancheros.
    #[arg(long = "sakuracloud-os-type", env = "SAKURACLOUD_OS_TYPE")]
    pub(crate) os_type: Option<String>,
    /// Number of CPU cores.
    #[arg(long = "sakuracloud-core", env = "SAKURACLOUD_CORE")]
    pub(crate) core: Option<u32>,
    /// Memory size in GB.
    #[arg(long = "sakuracloud-memory", env = "SAKURACLOUD_MEMORY")]
    pub(crate) memory: Option<u32>,
    /// Disk plan: ssd or hdd.
    #[arg(long = "sakuracloud-disk-plan", env = "SAKURACLOUD_DISK_PLAN")]
    pub(crate) disk_plan: Option<String>,
    /// Disk size in GB.
    #[arg(long = "sakuracloud-disk-size", env = "SAKURACLOUD_DISK_SIZE")]
    pub(crate) disk_size: Option<u32>,
    /// Disk connection: virtio or ide.
    #[arg(
        long = "sakuracloud-disk-connection",
        env = "SAKURACLOUD_DISK_CONNECTION"
    )]
    pub(crate) disk_connection: Option<String>,
    /// Source archive ID (defaults to the OS base image).
    #[arg(
        long = "sakuracloud-disk-source-archive-id",
        env = "SAKURACLOUD_DISK_SOURCE_ARCHIVE_ID"
    )]
    pub(crate) disk_source_archive_id: Option<String>,
    /// Interface driver: virtio or e1000.
    #[arg(
        long = "sakuracloud-interface-driver",
        env = "SAKURACLOUD_INTERFACE_DRIVER"
    )]
    pub(crate) interface_driver: Option<String>,
    /// Login password (generated when empty).
    #[arg(
        long = "sakuracloud-password",
        env = "SAKURACLOUD_PASSWORD",
        hide_env_values = true
    )]
    pub(crate) password: Option<String>,
    /// Keep SSH password authentication enabled.
    #[arg(
        long = "sakuracloud-enable-password-auth",
        env = "SAKURACLOUD_ENABLE_PASSWORD_AUTH"
    )]
    pub(crate) enable_password_auth: bool,
    /// Packet filter ID or name for the shared interface.
    #[arg(long = "sakuracloud-packet-filter", env = "SAKURACLOUD_PACKET_FILTER")]
    pub(crate) packet_filter: Option<String>,
    /// Packet filter ID or name for the private interface.
    #[arg(
        long = "sakuracloud-private-packet-filter",
        env = "SAKURACLOUD_PRIVATE_PACKET_FILTER"
    )]
    pub(crate) private_packet_filter: Option<String>,
    /// Docker engine port.
    #[arg(long = "sakuracloud-engine-port", env = "SAKURACLOUD_ENGINE_PORT")]
    pub(crate) engine_port: Option<u16>,
    /// Private key to import instead of generating one.
    #[arg(long = "sakuracloud-ssh-key", env = "SAKURACLOUD_SSH_KEY")]
    pub(crate) ssh_key: Option<String>,
    /// Switch ID for the secondary interface.
    #[arg(
        long = "sakuracloud-connected-switch",
        env = "SAKURACLOUD_CONNECTED_SWITCH"
    )]
    pub(crate) connected_switch: Option<String>,
    /// Static address of the secondary interface.
    #[arg(long = "sakuracloud-private-ip", env = "SAKURACLOUD_PRIVATE_IP")]
    pub(crate) private_ip: Option<String>,
    /// Subnet mask of the secondary interface.
    #[arg(
        long = "sakuracloud-private-ip-subnet-mask",
        env = "SAKURACLOUD_PRIVATE_IP_SUBNET_MASK"
    )]
    pub(crate) private_ip_subnet_mask: Option<String>,
    /// Use only the private address and disable the shared interface.
    #[arg(
        long = "sakuracloud-private-ip-only",
        env = "SAKURACLOUD_PRIVATE_IP_ONLY"
    )]
    pub(crate) private_ip_only: bool,
    /// Default gateway override.
    #[arg(long = "sakuracloud-gateway", env = "SAKURACLOUD_GATEWAY")]
    pub(crate) gateway: Option<String>,
    /// Group tag for the server.
    #[arg(long = "sakuracloud-group", env = "SAKURACLOUD_GROUP")]
    pub(crate) group: Option<String>,
    /// Restart the server automatically on host failure.
    #[arg(long = "sakuracloud-auto-reboot", env = "SAKURACLOUD_AUTO_REBOOT")]
    pub(crate) auto_reboot: bool,
    /// Do not tag the server with @virtio-net-pci.
    #[arg(
        long = "sakuracloud-ignore-virtio-net",
        env = "SAKURACLOUD_IGNORE_VIRTIO_NET"
    )]
    pub(crate) ignore_virtio_net: bool,
    /// DNS zone to register the machine in.
    #[arg(long = "sakuracloud-dns-zone", env = "SAKURACLOUD_DNS_ZONE")]
    pub(crate) dns_zone: Option<String>,
    /// GSLB group to register the machine in.
    #[arg(long = "sakuracloud-gslb", env = "SAKURACLOUD_GSLB")]
    pub(crate) gslb: Option<String>,
    /// Remove partially created resources when provisioning fails.
    #[arg(
        long = "sakuracloud-cleanup-on-failure",
        env = "SAKURACLOUD_CLEANUP_ON_FAILURE"
    )]
    pub(crate) cleanup_on_failure: bool,
}
