//! Provider API abstraction consumed by the provisioning and teardown
//! workflows.
//!
//! The trait mirrors the primitive resource operations of the Sakura Cloud
//! API. Each call is a single provider round trip; retries and polling live in
//! the callers.

use std::future::Future;
use std::net::IpAddr;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::server_config::{DiskConnection, DiskPlan, InterfaceDriver, OsFamily};
use crate::types::{ArchiveId, DiskId, InterfaceId, NoteId, PacketFilterId, ServerId};

/// Future returned by provider operations.
pub type ApiFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Network attachment for one interface of a new server.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum NicSpec {
    /// Shared segment with a provider-assigned public address.
    Shared,
    /// Interface connected to a customer switch.
    Switch(String),
    /// Interface created without a connection.
    Disconnected,
}

/// Fully resolved request for a new server.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServerSpec {
    /// Server (and host) name.
    pub name: String,
    /// Provider plan identifier derived from the core/memory pair.
    pub plan_id: String,
    /// Interface driver emulated for every NIC.
    pub interface_driver: InterfaceDriver,
    /// Interfaces in attachment order; index 0 is the primary NIC.
    pub interfaces: Vec<NicSpec>,
    /// Provider tags (for example `@virtio-net-pci`).
    pub tags: Vec<String>,
}

/// Interface details reported by the provider.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InterfaceInfo {
    /// Interface identifier.
    pub id: InterfaceId,
    /// Address assigned by the provider on shared segments.
    pub ip_address: Option<IpAddr>,
    /// Address assigned by the user on switch-connected interfaces.
    pub user_ip_address: Option<IpAddr>,
}

/// Result of a successful server creation call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CreatedServer {
    /// Identifier assigned to the server.
    pub id: ServerId,
    /// Interfaces in attachment order.
    pub interfaces: Vec<InterfaceInfo>,
}

/// Point-in-time view of a server.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServerSnapshot {
    /// Server identifier.
    pub id: ServerId,
    /// Raw instance status string (`up`, `cleaning`, `down`, ...).
    pub status: String,
    /// Disks connected to the server.
    pub disks: Vec<DiskId>,
    /// Interfaces in attachment order.
    pub interfaces: Vec<InterfaceInfo>,
}

impl ServerSnapshot {
    /// Address of the primary (shared) interface, if any.
    #[must_use]
    pub fn primary_ip(&self) -> Option<IpAddr> {
        self.interfaces.first().and_then(|nic| nic.ip_address)
    }
}

/// Request for a new boot disk.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DiskSpec {
    /// Disk name.
    pub name: String,
    /// Storage tier.
    pub plan: DiskPlan,
    /// Size in megabytes.
    pub size_mb: u32,
    /// Connection bus.
    pub connection: DiskConnection,
    /// Source archive copied onto the disk.
    pub source_archive: ArchiveId,
}

/// Payload pushed onto a disk to materialise first-boot configuration.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DiskEditSpec {
    /// Host name written into the guest.
    pub host_name: String,
    /// Password for the default login user.
    pub password: String,
    /// Public key installed for the default login user.
    pub ssh_public_key: String,
    /// Whether SSH password authentication is disabled.
    pub disable_password_auth: bool,
    /// Notes executed once on first boot.
    pub notes: Vec<NoteId>,
}

/// Power-off semantics.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PowerOffMode {
    /// ACPI shutdown request.
    Graceful,
    /// Immediate forced power-off.
    Forced,
}

/// DNS A record pointing at an instance.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DnsRecord {
    /// DNS zone name (for example `example.com`).
    pub zone: String,
    /// Record name inside the zone.
    pub host_name: String,
    /// Address the record resolves to.
    pub ip: IpAddr,
}

/// GSLB member entry pointing at an instance.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct GslbRecord {
    /// GSLB group name.
    pub group: String,
    /// Address registered as a member.
    pub ip: IpAddr,
}

/// Error raised by a provider call.
pub trait ProviderError: std::error::Error + Send + Sync + 'static {
    /// Whether the provider reported the target resource as absent.
    fn is_not_found(&self) -> bool;
}

/// Primitive resource operations offered by the cloud provider.
pub trait CloudApi: Send + Sync {
    /// Provider specific error type.
    type Error: ProviderError;

    /// Returns whether a plan with the given core count and memory exists.
    fn validate_plan(&self, core: u32, memory_gb: u32) -> ApiFuture<'_, bool, Self::Error>;

    /// Finds the public archive used as base image for an OS family.
    fn resolve_base_image(&self, os: OsFamily) -> ApiFuture<'_, ArchiveId, Self::Error>;

    /// Creates a server without disks.
    fn create_server<'a>(
        &'a self,
        spec: &'a ServerSpec,
    ) -> ApiFuture<'a, CreatedServer, Self::Error>;

    /// Assigns a user IP address to an interface.
    fn assign_interface_ip<'a>(
        &'a self,
        interface: &'a InterfaceId,
        ip: IpAddr,
    ) -> ApiFuture<'a, (), Self::Error>;

    /// Reads the current server state.
    fn read_server<'a>(&'a self, id: &'a ServerId) -> ApiFuture<'a, ServerSnapshot, Self::Error>;

    /// Boots a server.
    fn power_on<'a>(&'a self, id: &'a ServerId) -> ApiFuture<'a, (), Self::Error>;

    /// Shuts a server down.
    fn power_off<'a>(
        &'a self,
        id: &'a ServerId,
        mode: PowerOffMode,
    ) -> ApiFuture<'a, (), Self::Error>;

    /// Deletes a server together with the listed disks.
    fn delete_server<'a>(
        &'a self,
        id: &'a ServerId,
        disks: &'a [DiskId],
    ) -> ApiFuture<'a, (), Self::Error>;

    /// Creates a disk from a source archive.
    fn create_disk<'a>(&'a self, spec: &'a DiskSpec) -> ApiFuture<'a, DiskId, Self::Error>;

    /// Reads the availability string of a disk (`available`, `migrating`, ...).
    fn read_disk<'a>(&'a self, id: &'a DiskId) -> ApiFuture<'a, String, Self::Error>;

    /// Connects a disk to a server.
    fn attach_disk<'a>(
        &'a self,
        disk: &'a DiskId,
        server: &'a ServerId,
    ) -> ApiFuture<'a, (), Self::Error>;

    /// Pushes the edit payload onto a disk.
    fn configure_disk<'a>(
        &'a self,
        disk: &'a DiskId,
        edit: &'a DiskEditSpec,
    ) -> ApiFuture<'a, (), Self::Error>;

    /// Creates a startup-script note.
    fn create_note<'a>(
        &'a self,
        name: &'a str,
        content: &'a str,
    ) -> ApiFuture<'a, NoteId, Self::Error>;

    /// Deletes a note.
    fn delete_note<'a>(&'a self, id: &'a NoteId) -> ApiFuture<'a, (), Self::Error>;

    /// Looks a packet filter up by identifier.
    fn packet_filter_by_id<'a>(
        &'a self,
        id: &'a PacketFilterId,
    ) -> ApiFuture<'a, Option<PacketFilterId>, Self::Error>;

    /// Looks a packet filter up by exact name.
    fn packet_filter_by_name<'a>(
        &'a self,
        name: &'a str,
    ) -> ApiFuture<'a, Option<PacketFilterId>, Self::Error>;

    /// Connects a packet filter to an interface.
    fn connect_packet_filter<'a>(
        &'a self,
        interface: &'a InterfaceId,
        filter: &'a PacketFilterId,
    ) -> ApiFuture<'a, (), Self::Error>;

    /// Creates or updates an A record; returns the zone's name servers.
    fn upsert_dns_record<'a>(
        &'a self,
        record: &'a DnsRecord,
    ) -> ApiFuture<'a, Vec<String>, Self::Error>;

    /// Removes an A record.
    fn delete_dns_record<'a>(&'a self, record: &'a DnsRecord) -> ApiFuture<'a, (), Self::Error>;

    /// Adds a member to a GSLB group, creating the group if needed; returns
    /// the group's FQDN.
    fn upsert_gslb_record<'a>(
        &'a self,
        record: &'a GslbRecord,
    ) -> ApiFuture<'a, String, Self::Error>;

    /// Removes a member from a GSLB group.
    fn delete_gslb_record<'a>(&'a self, record: &'a GslbRecord)
    -> ApiFuture<'a, (), Self::Error>;
}
