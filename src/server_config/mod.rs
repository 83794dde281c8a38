//! Desired server state.
//!
//! [`ServerOptions`] carries raw, user supplied values with the driver's
//! defaults. [`ServerConfig::validate`] turns them into an immutable, checked
//! description of the instance, consulting the provider's plan catalogue only
//! after every local rule has passed.

mod disk;
mod error;
mod os;

use std::net::Ipv4Addr;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::api::{CloudApi, NicSpec};
use crate::types::{ArchiveId, PacketFilterId};

pub use disk::{DiskConnection, DiskPlan, InterfaceDriver};
pub use error::ValidationError;
pub use os::{OsFamily, OsPolicy, ScriptFamily};

/// Default Docker engine port exposed by provisioned machines.
pub const DEFAULT_ENGINE_PORT: u16 = 2376;

/// Raw server options before validation.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ServerOptions {
    /// Host name; empty means "use the machine name".
    pub host_name: String,
    /// OS family flag value.
    pub os_type: String,
    /// Number of virtual cores.
    pub core: u32,
    /// Memory size in GB.
    pub memory_gb: u32,
    /// Disk tier flag value.
    pub disk_plan: String,
    /// Disk size in GB.
    pub disk_size_gb: u32,
    /// Disk bus flag value.
    pub disk_connection: String,
    /// Explicit source archive; empty resolves the OS base image lazily.
    pub disk_source_archive_id: String,
    /// NIC model flag value.
    pub interface_driver: String,
    /// Login password; empty means "generate one".
    pub password: String,
    /// Keeps SSH password authentication enabled.
    pub enable_password_auth: bool,
    /// Packet filter (ID or name) for the shared interface.
    pub packet_filter: String,
    /// Packet filter (ID or name) for the private interface.
    pub private_packet_filter: String,
    /// Docker engine port.
    pub engine_port: u16,
    /// Private key path to import instead of generating a keypair.
    pub ssh_key: String,
    /// Switch ID for the secondary interface.
    pub connected_switch: String,
    /// Static address of the secondary interface.
    pub private_ip: String,
    /// Subnet mask of the secondary interface.
    pub private_ip_subnet_mask: String,
    /// Reports and uses only the private address.
    pub private_ip_only: bool,
    /// Default gateway override.
    pub gateway: String,
    /// Group tag value.
    pub group: String,
    /// Requests the provider's automatic restart on host failure.
    pub auto_reboot: bool,
    /// Omits the virtio NIC tag.
    pub ignore_virtio_net: bool,
    /// DNS zone to register the instance in.
    pub dns_zone: String,
    /// GSLB group to register the instance in.
    pub gslb: String,
    /// Tears partially created resources down when provisioning fails.
    pub cleanup_on_failure: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host_name: String::new(),
            os_type: OsFamily::Ubuntu.as_str().to_owned(),
            core: 1,
            memory_gb: 1,
            disk_plan: DiskPlan::Ssd.as_str().to_owned(),
            disk_size_gb: 20,
            disk_connection: DiskConnection::Virtio.as_str().to_owned(),
            disk_source_archive_id: String::new(),
            interface_driver: InterfaceDriver::Virtio.as_str().to_owned(),
            password: String::new(),
            enable_password_auth: false,
            packet_filter: String::new(),
            private_packet_filter: String::new(),
            engine_port: DEFAULT_ENGINE_PORT,
            ssh_key: String::new(),
            connected_switch: String::new(),
            private_ip: String::new(),
            private_ip_subnet_mask: "255.255.255.0".to_owned(),
            private_ip_only: false,
            gateway: String::new(),
            group: String::new(),
            auto_reboot: false,
            ignore_virtio_net: false,
            dns_zone: String::new(),
            gslb: String::new(),
            cleanup_on_failure: false,
        }
    }
}

/// Boot disk description.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DiskConfig {
    /// Storage tier.
    pub plan: DiskPlan,
    /// Size in GB, legal for the tier.
    pub size_gb: u32,
    /// Connection bus.
    pub connection: DiskConnection,
    /// Source archive, filled in lazily from the OS base image.
    pub source_archive: Option<ArchiveId>,
}

/// Secondary (private) interface addressing.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PrivateAddress {
    /// Static address.
    pub ip: Ipv4Addr,
    /// Subnet mask.
    pub subnet_mask: Ipv4Addr,
}

/// Network attachment description.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Switch for the secondary interface.
    pub connected_switch: Option<String>,
    /// Addressing of the secondary interface.
    pub private: Option<PrivateAddress>,
    /// Disables the shared interface inside the guest.
    pub private_ip_only: bool,
    /// Default gateway override.
    pub gateway: Option<Ipv4Addr>,
    /// Packet filter for the shared interface.
    pub packet_filter: Option<PacketFilterId>,
    /// Packet filter for the private interface.
    pub private_packet_filter: Option<PacketFilterId>,
}

impl NetworkConfig {
    /// Interfaces to create, primary first.
    #[must_use]
    pub fn nic_specs(&self) -> Vec<NicSpec> {
        let mut nics = vec![NicSpec::Shared];
        if let Some(switch) = &self.connected_switch {
            nics.push(NicSpec::Switch(switch.clone()));
        } else if self.private.is_some() {
            nics.push(NicSpec::Disconnected);
        }
        nics
    }
}

/// Authentication material for the default login user.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Password; resolved before the disk is configured.
    pub password: Option<String>,
    /// Keeps SSH password authentication enabled.
    pub enable_password_auth: bool,
    /// Private key to import instead of generating one.
    pub ssh_key_path: Option<Utf8PathBuf>,
}

/// Validated, immutable description of the desired instance.
///
/// Only the password and the source archive are filled in after
/// construction, each at most once.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    host_name: String,
    os: OsFamily,
    core: u32,
    memory_gb: u32,
    disk: DiskConfig,
    interface_driver: InterfaceDriver,
    network: NetworkConfig,
    auth: AuthConfig,
    engine_port: u16,
    group: Option<String>,
    auto_reboot: bool,
    ignore_virtio_net: bool,
    dns_zone: Option<String>,
    gslb_group: Option<String>,
    cleanup_on_failure: bool,
}

/// Composes the provider plan identifier: memory in GB followed by the core
/// count padded to three digits.
#[must_use]
pub fn plan_id(core: u32, memory_gb: u32) -> String {
    format!("{memory_gb}{core:03}")
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

fn parse_ipv4(flag: &'static str, value: &str) -> Result<Option<Ipv4Addr>, ValidationError> {
    non_empty(value)
        .map(|raw| {
            raw.parse::<Ipv4Addr>()
                .map_err(|_| ValidationError::InvalidAddress {
                    flag,
                    value: raw.clone(),
                })
        })
        .transpose()
}

impl ServerConfig {
    /// Validates options and checks the compute plan against the provider.
    ///
    /// Local rules run first; the plan catalogue is only consulted once they
    /// pass, so an invalid configuration never reaches the provider.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] encountered.
    pub async fn validate<A: CloudApi>(
        options: &ServerOptions,
        machine_name: &str,
        api: &A,
    ) -> Result<Self, ValidationError> {
        let config = Self::check_local(options, machine_name)?;
        let plan_id = config.plan_id();
        let exists = api
            .validate_plan(config.core, config.memory_gb)
            .await
            .map_err(|err| ValidationError::PlanLookup {
                plan_id: plan_id.clone(),
                message: err.to_string(),
            })?;
        if !exists {
            return Err(ValidationError::UnsupportedPlan {
                core: config.core,
                memory_gb: config.memory_gb,
            });
        }
        Ok(config)
    }

    fn check_local(options: &ServerOptions, machine_name: &str) -> Result<Self, ValidationError> {
        let host_name = non_empty(&options.host_name)
            .or_else(|| non_empty(machine_name))
            .ok_or(ValidationError::EmptyHostName)?;
        let os = options.os_type.parse::<OsFamily>()?;
        if options.core == 0 {
            return Err(ValidationError::ZeroCompute { flag: "core" });
        }
        if options.memory_gb == 0 {
            return Err(ValidationError::ZeroCompute { flag: "memory" });
        }

        let plan = options.disk_plan.parse::<DiskPlan>()?;
        plan.check_size(options.disk_size_gb)?;
        let disk = DiskConfig {
            plan,
            size_gb: options.disk_size_gb,
            connection: options.disk_connection.parse()?,
            source_archive: non_empty(&options.disk_source_archive_id).map(ArchiveId::from),
        };
        let interface_driver = options.interface_driver.parse()?;
        let network = Self::check_network(options)?;

        Ok(Self {
            host_name,
            os,
            core: options.core,
            memory_gb: options.memory_gb,
            disk,
            interface_driver,
            network,
            auth: AuthConfig {
                password: non_empty(&options.password),
                enable_password_auth: options.enable_password_auth,
                ssh_key_path: non_empty(&options.ssh_key).map(Utf8PathBuf::from),
            },
            engine_port: options.engine_port,
            group: non_empty(&options.group),
            auto_reboot: options.auto_reboot,
            ignore_virtio_net: options.ignore_virtio_net,
            dns_zone: non_empty(&options.dns_zone),
            gslb_group: non_empty(&options.gslb),
            cleanup_on_failure: options.cleanup_on_failure,
        })
    }

    fn check_network(options: &ServerOptions) -> Result<NetworkConfig, ValidationError> {
        let connected_switch = non_empty(&options.connected_switch);
        let private_packet_filter = non_empty(&options.private_packet_filter);
        let ip = parse_ipv4("private-ip", &options.private_ip)?;
        let mask = parse_ipv4("private-ip-subnet-mask", &options.private_ip_subnet_mask)?;

        let requested_by = if connected_switch.is_some() {
            Some("--sakuracloud-connected-switch")
        } else if options.private_ip_only {
            Some("--sakuracloud-private-ip-only")
        } else if private_packet_filter.is_some() {
            Some("--sakuracloud-private-packet-filter")
        } else {
            None
        };

        let private = match (requested_by, ip, mask) {
            (_, Some(ip_addr), Some(subnet_mask)) => Some(PrivateAddress {
                ip: ip_addr,
                subnet_mask,
            }),
            (Some(flag), None, _) => {
                return Err(ValidationError::MissingPrivateIp { requested_by: flag });
            }
            (Some(flag), Some(_), None) => {
                return Err(ValidationError::MissingSubnetMask { requested_by: flag });
            }
            (None, Some(_), None) => {
                return Err(ValidationError::MissingSubnetMask {
                    requested_by: "--sakuracloud-private-ip",
                });
            }
            (None, None, _) => None,
        };

        Ok(NetworkConfig {
            connected_switch,
            private,
            private_ip_only: options.private_ip_only,
            gateway: parse_ipv4("gateway", &options.gateway)?,
            packet_filter: non_empty(&options.packet_filter).map(PacketFilterId::from),
            private_packet_filter: private_packet_filter.map(PacketFilterId::from),
        })
    }

    /// Host name written into the guest and used as the server name.
    #[must_use]
    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    /// Selected OS family.
    #[must_use]
    pub const fn os(&self) -> OsFamily {
        self.os
    }

    /// Provisioning policy of the selected OS family.
    #[must_use]
    pub fn policy(&self) -> OsPolicy {
        self.os.policy()
    }

    /// Virtual core count.
    #[must_use]
    pub const fn core(&self) -> u32 {
        self.core
    }

    /// Memory size in GB.
    #[must_use]
    pub const fn memory_gb(&self) -> u32 {
        self.memory_gb
    }

    /// Provider plan identifier composed from memory and core count.
    #[must_use]
    pub fn plan_id(&self) -> String {
        plan_id(self.core, self.memory_gb)
    }

    /// Boot disk description.
    #[must_use]
    pub const fn disk(&self) -> &DiskConfig {
        &self.disk
    }

    /// NIC model.
    #[must_use]
    pub const fn interface_driver(&self) -> InterfaceDriver {
        self.interface_driver
    }

    /// Network attachment description.
    #[must_use]
    pub const fn network(&self) -> &NetworkConfig {
        &self.network
    }

    /// Authentication material.
    #[must_use]
    pub const fn auth(&self) -> &AuthConfig {
        &self.auth
    }

    /// Docker engine port.
    #[must_use]
    pub const fn engine_port(&self) -> u16 {
        self.engine_port
    }

    /// DNS zone to register in, if any.
    #[must_use]
    pub fn dns_zone(&self) -> Option<&str> {
        self.dns_zone.as_deref()
    }

    /// GSLB group to register in, if any.
    #[must_use]
    pub fn gslb_group(&self) -> Option<&str> {
        self.gslb_group.as_deref()
    }

    /// Whether a failed create tears its own resources down.
    #[must_use]
    pub const fn cleanup_on_failure(&self) -> bool {
        self.cleanup_on_failure
    }

    /// Provider tags applied to the server.
    #[must_use]
    pub fn tags(&self) -> Vec<String> {
        let mut tags = Vec::new();
        if !self.ignore_virtio_net {
            tags.push("@virtio-net-pci".to_owned());
        }
        if let Some(group) = &self.group {
            tags.push(format!("@group={group}"));
        }
        if self.auto_reboot {
            tags.push("@auto-reboot".to_owned());
        }
        tags
    }

    /// Stores the source archive unless one is already set. Returns the
    /// archive in effect.
    pub fn cache_source_image(&mut self, archive: ArchiveId) -> &ArchiveId {
        self.disk.source_archive.get_or_insert(archive)
    }

    /// Stores the password unless one is already set. Returns the password in
    /// effect.
    pub fn resolve_password(&mut self, generate: impl FnOnce() -> String) -> &str {
        self.auth.password.get_or_insert_with(generate)
    }
}
