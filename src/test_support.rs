//! Test support utilities shared across unit and integration tests.
//!
//! [`FakeCloud`] is an in-memory provider that records every call, simulates
//! server power states (including the self-initiated shutdown scheduled by
//! customisation notes) and can be told to fail specific operations.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::ffi::OsString;
use std::future::ready;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use camino::Utf8Path;
use thiserror::Error;

use crate::api::{
    ApiFuture, CloudApi, CreatedServer, DiskEditSpec, DiskSpec, DnsRecord, GslbRecord,
    InterfaceInfo, NicSpec, PowerOffMode, ProviderError, ServerSnapshot, ServerSpec,
};
use crate::command::{CommandOutput, CommandRunner, SpawnError};
use crate::provision::{SshKeyError, SshKeyProvider};
use crate::server_config::OsFamily;
use crate::types::{ArchiveId, DiskId, InterfaceId, NoteId, PacketFilterId, ServerId};

/// Error returned by [`FakeCloud`] for injected failures and unknown ids.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("fake cloud: {message}")]
pub struct FakeCloudError {
    /// Failure text.
    pub message: String,
    /// Whether the failure reports a resource the fake does not hold.
    pub not_found: bool,
}

impl FakeCloudError {
    const fn injected(message: String) -> Self {
        Self {
            message,
            not_found: false,
        }
    }

    fn missing(what: String) -> Self {
        Self {
            message: format!("{what} not found"),
            not_found: true,
        }
    }
}

impl ProviderError for FakeCloudError {
    fn is_not_found(&self) -> bool {
        self.not_found
    }
}

/// Operation kinds of the provider API, used for failure injection and call
/// counting.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Op {
    /// `validate_plan`.
    ValidatePlan,
    /// `resolve_base_image`.
    ResolveBaseImage,
    /// `create_server`.
    CreateServer,
    /// `assign_interface_ip`.
    AssignInterfaceIp,
    /// `read_server`.
    ReadServer,
    /// `power_on`.
    PowerOn,
    /// `power_off`.
    PowerOff,
    /// `delete_server`.
    DeleteServer,
    /// `create_disk`.
    CreateDisk,
    /// `read_disk`.
    ReadDisk,
    /// `attach_disk`.
    AttachDisk,
    /// `configure_disk`.
    ConfigureDisk,
    /// `create_note`.
    CreateNote,
    /// `delete_note`.
    DeleteNote,
    /// `packet_filter_by_id`.
    PacketFilterById,
    /// `packet_filter_by_name`.
    PacketFilterByName,
    /// `connect_packet_filter`.
    ConnectPacketFilter,
    /// `upsert_dns_record`.
    UpsertDns,
    /// `delete_dns_record`.
    DeleteDns,
    /// `upsert_gslb_record`.
    UpsertGslb,
    /// `delete_gslb_record`.
    DeleteGslb,
}

/// A recorded provider call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Call {
    /// Plan lookup.
    ValidatePlan {
        /// Core count.
        core: u32,
        /// Memory in GB.
        memory_gb: u32,
    },
    /// Base image lookup.
    ResolveBaseImage(OsFamily),
    /// Server creation.
    CreateServer(ServerSpec),
    /// Interface address assignment.
    AssignInterfaceIp(InterfaceId, IpAddr),
    /// Server read.
    ReadServer(ServerId),
    /// Power on.
    PowerOn(ServerId),
    /// Power off.
    PowerOff(ServerId, PowerOffMode),
    /// Server deletion.
    DeleteServer(ServerId, Vec<DiskId>),
    /// Disk creation.
    CreateDisk(DiskSpec),
    /// Disk read.
    ReadDisk(DiskId),
    /// Disk attachment.
    AttachDisk(DiskId, ServerId),
    /// Disk edit.
    ConfigureDisk(DiskId, DiskEditSpec),
    /// Note creation.
    CreateNote {
        /// Note name.
        name: String,
        /// Script body.
        content: String,
    },
    /// Note deletion.
    DeleteNote(NoteId),
    /// Packet filter lookup by ID.
    PacketFilterById(PacketFilterId),
    /// Packet filter lookup by name.
    PacketFilterByName(String),
    /// Packet filter connection.
    ConnectPacketFilter(InterfaceId, PacketFilterId),
    /// DNS upsert.
    UpsertDns(DnsRecord),
    /// DNS deletion.
    DeleteDns(DnsRecord),
    /// GSLB upsert.
    UpsertGslb(GslbRecord),
    /// GSLB deletion.
    DeleteGslb(GslbRecord),
}

impl Call {
    /// Operation kind of the call.
    #[must_use]
    pub const fn op(&self) -> Op {
        match self {
            Self::ValidatePlan { .. } => Op::ValidatePlan,
            Self::ResolveBaseImage(_) => Op::ResolveBaseImage,
            Self::CreateServer(_) => Op::CreateServer,
            Self::AssignInterfaceIp(..) => Op::AssignInterfaceIp,
            Self::ReadServer(_) => Op::ReadServer,
            Self::PowerOn(_) => Op::PowerOn,
            Self::PowerOff(..) => Op::PowerOff,
            Self::DeleteServer(..) => Op::DeleteServer,
            Self::CreateDisk(_) => Op::CreateDisk,
            Self::ReadDisk(_) => Op::ReadDisk,
            Self::AttachDisk(..) => Op::AttachDisk,
            Self::ConfigureDisk(..) => Op::ConfigureDisk,
            Self::CreateNote { .. } => Op::CreateNote,
            Self::DeleteNote(_) => Op::DeleteNote,
            Self::PacketFilterById(_) => Op::PacketFilterById,
            Self::PacketFilterByName(_) => Op::PacketFilterByName,
            Self::ConnectPacketFilter(..) => Op::ConnectPacketFilter,
            Self::UpsertDns(_) => Op::UpsertDns,
            Self::DeleteDns(_) => Op::DeleteDns,
            Self::UpsertGslb(_) => Op::UpsertGslb,
            Self::DeleteGslb(_) => Op::DeleteGslb,
        }
    }
}

#[derive(Debug)]
struct FakeServer {
    status: String,
    interfaces: Vec<InterfaceInfo>,
    disks: Vec<DiskId>,
    shutdown_scheduled: bool,
    shutdown_after_reads: Option<u32>,
}

#[derive(Debug, Default)]
struct FakeState {
    next_id: u64,
    calls: Vec<Call>,
    plans: Option<BTreeSet<(u32, u32)>>,
    packet_filters: Vec<(PacketFilterId, String)>,
    servers: BTreeMap<ServerId, FakeServer>,
    disks: BTreeMap<DiskId, VecDeque<String>>,
    disk_script: VecDeque<String>,
    server_status_script: VecDeque<String>,
    notes: BTreeMap<NoteId, (String, String)>,
    dns_records: BTreeSet<(String, String, IpAddr)>,
    gslb_members: BTreeSet<(String, IpAddr)>,
    fail_once: HashMap<Op, String>,
    fail_always: HashMap<Op, String>,
}

impl FakeState {
    fn next_id(&mut self, prefix: u64) -> String {
        self.next_id += 1;
        format!("{}", prefix + self.next_id)
    }

    fn enter(&mut self, call: Call) -> Result<(), FakeCloudError> {
        let op = call.op();
        self.calls.push(call);
        if let Some(message) = self.fail_once.remove(&op) {
            return Err(FakeCloudError::injected(message));
        }
        if let Some(message) = self.fail_always.get(&op) {
            return Err(FakeCloudError::injected(message.clone()));
        }
        Ok(())
    }

    fn server_mut(&mut self, id: &ServerId) -> Result<&mut FakeServer, FakeCloudError> {
        self.servers
            .get_mut(id)
            .ok_or_else(|| FakeCloudError::missing(format!("server {id}")))
    }
}

/// Scripted in-memory provider.
#[derive(Clone, Debug, Default)]
pub struct FakeCloud {
    state: Arc<Mutex<FakeState>>,
}

const SERVER_ID_BASE: u64 = 113_000_000_000;
const DISK_ID_BASE: u64 = 112_000_000_000;
const NOTE_ID_BASE: u64 = 110_000_000_000;
const INTERFACE_ID_BASE: u64 = 111_000_000_000;

fn respond<T: Send + 'static>(
    result: Result<T, FakeCloudError>,
) -> ApiFuture<'static, T, FakeCloudError> {
    Box::pin(ready(result))
}

impl FakeCloud {
    /// Creates an empty fake that accepts every plan.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Restricts the plan catalogue to the given `(core, memory_gb)` pairs.
    #[must_use]
    pub fn with_plans(self, plans: &[(u32, u32)]) -> Self {
        self.lock().plans = Some(plans.iter().copied().collect());
        self
    }

    /// Registers a packet filter.
    #[must_use]
    pub fn with_packet_filter(self, id: &str, name: &str) -> Self {
        self.lock()
            .packet_filters
            .push((PacketFilterId::from(id), name.to_owned()));
        self
    }

    /// Queues availability strings returned for the next created disk before
    /// it settles on `available`.
    pub fn script_disk_availability(&self, states: &[&str]) {
        self.lock()
            .disk_script
            .extend(states.iter().map(|state| (*state).to_owned()));
    }

    /// Queues raw statuses returned by the next server reads, overriding the
    /// simulated power state.
    pub fn script_server_statuses(&self, statuses: &[&str]) {
        self.lock()
            .server_status_script
            .extend(statuses.iter().map(|status| (*status).to_owned()));
    }

    /// Fails the next call of `op` with `message`.
    pub fn fail_once(&self, op: Op, message: &str) {
        self.lock().fail_once.insert(op, message.to_owned());
    }

    /// Fails every call of `op` with `message`.
    pub fn fail_always(&self, op: Op, message: &str) {
        self.lock().fail_always.insert(op, message.to_owned());
    }

    /// Seeds a server as if created earlier.
    pub fn seed_server(&self, id: &str, status: &str, ip: Option<IpAddr>) {
        self.lock().servers.insert(
            ServerId::from(id),
            FakeServer {
                status: status.to_owned(),
                interfaces: vec![InterfaceInfo {
                    id: InterfaceId::from(format!("{}", INTERFACE_ID_BASE + 1)),
                    ip_address: ip,
                    user_ip_address: None,
                }],
                disks: Vec::new(),
                shutdown_scheduled: false,
                shutdown_after_reads: None,
            },
        );
    }

    /// Every call recorded so far.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Operation kinds of every call, in order.
    #[must_use]
    pub fn ops(&self) -> Vec<Op> {
        self.lock().calls.iter().map(Call::op).collect()
    }

    /// Number of calls of one kind.
    #[must_use]
    pub fn count(&self, op: Op) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.op() == op)
            .count()
    }

    /// Notes that currently exist.
    #[must_use]
    pub fn live_notes(&self) -> Vec<NoteId> {
        self.lock().notes.keys().cloned().collect()
    }

    /// Servers that currently exist.
    #[must_use]
    pub fn live_servers(&self) -> Vec<ServerId> {
        self.lock().servers.keys().cloned().collect()
    }

    /// Current raw status of a server.
    #[must_use]
    pub fn server_status(&self, id: &ServerId) -> Option<String> {
        self.lock()
            .servers
            .get(id)
            .map(|server| server.status.clone())
    }

    /// Registered DNS records as `(zone, host, ip)`.
    #[must_use]
    pub fn dns_records(&self) -> Vec<(String, String, IpAddr)> {
        self.lock().dns_records.iter().cloned().collect()
    }

    /// Registered GSLB members as `(group, ip)`.
    #[must_use]
    pub fn gslb_members(&self) -> Vec<(String, IpAddr)> {
        self.lock().gslb_members.iter().cloned().collect()
    }
}

impl CloudApi for FakeCloud {
    type Error = FakeCloudError;

    fn validate_plan(&self, core: u32, memory_gb: u32) -> ApiFuture<'_, bool, Self::Error> {
        let mut state = self.lock();
        let result = state
            .enter(Call::ValidatePlan { core, memory_gb })
            .map(|()| {
                state
                    .plans
                    .as_ref()
                    .is_none_or(|plans| plans.contains(&(core, memory_gb)))
            });
        respond(result)
    }

    fn resolve_base_image(&self, os: OsFamily) -> ApiFuture<'_, ArchiveId, Self::Error> {
        let mut state = self.lock();
        let result = state
            .enter(Call::ResolveBaseImage(os))
            .map(|()| ArchiveId::from(format!("archive-{os}")));
        respond(result)
    }

    fn create_server<'a>(
        &'a self,
        spec: &'a ServerSpec,
    ) -> ApiFuture<'a, CreatedServer, Self::Error> {
        let mut state = self.lock();
        let result = state.enter(Call::CreateServer(spec.clone())).map(|()| {
            let id = ServerId::from(state.next_id(SERVER_ID_BASE));
            let mut interfaces = Vec::new();
            for (index, nic) in spec.interfaces.iter().enumerate() {
                let nic_id = InterfaceId::from(state.next_id(INTERFACE_ID_BASE));
                let ip_address = match nic {
                    NicSpec::Shared => {
                        let host = u8::try_from(index + 10).unwrap_or(u8::MAX);
                        Some(IpAddr::V4(Ipv4Addr::new(203, 0, 113, host)))
                    }
                    NicSpec::Switch(_) | NicSpec::Disconnected => None,
                };
                interfaces.push(InterfaceInfo {
                    id: nic_id,
                    ip_address,
                    user_ip_address: None,
                });
            }
            state.servers.insert(
                id.clone(),
                FakeServer {
                    status: "down".to_owned(),
                    interfaces: interfaces.clone(),
                    disks: Vec::new(),
                    shutdown_scheduled: false,
                    shutdown_after_reads: None,
                },
            );
            CreatedServer { id, interfaces }
        });
        respond(result)
    }

    fn assign_interface_ip<'a>(
        &'a self,
        interface: &'a InterfaceId,
        ip: IpAddr,
    ) -> ApiFuture<'a, (), Self::Error> {
        let mut state = self.lock();
        let result = state
            .enter(Call::AssignInterfaceIp(interface.clone(), ip))
            .and_then(|()| {
                state
                    .servers
                    .values_mut()
                    .flat_map(|server| server.interfaces.iter_mut())
                    .find(|nic| &nic.id == interface)
                    .map(|nic| nic.user_ip_address = Some(ip))
                    .ok_or_else(|| FakeCloudError::missing(format!("interface {interface}")))
            });
        respond(result)
    }

    fn read_server<'a>(&'a self, id: &'a ServerId) -> ApiFuture<'a, ServerSnapshot, Self::Error> {
        let mut state = self.lock();
        let result = state.enter(Call::ReadServer(id.clone())).and_then(|()| {
            let scripted = state.server_status_script.pop_front();
            let server = state.server_mut(id)?;
            let status = scripted.unwrap_or_else(|| server.status.clone());
            match server.shutdown_after_reads {
                Some(remaining) if remaining <= 1 => {
                    server.status = "down".to_owned();
                    server.shutdown_after_reads = None;
                }
                Some(remaining) => server.shutdown_after_reads = Some(remaining - 1),
                None => {}
            }
            Ok(ServerSnapshot {
                id: id.clone(),
                status,
                disks: server.disks.clone(),
                interfaces: server.interfaces.clone(),
            })
        });
        respond(result)
    }

    fn power_on<'a>(&'a self, id: &'a ServerId) -> ApiFuture<'a, (), Self::Error> {
        let mut state = self.lock();
        let result = state.enter(Call::PowerOn(id.clone())).and_then(|()| {
            let server = state.server_mut(id)?;
            server.status = "up".to_owned();
            if server.shutdown_scheduled {
                server.shutdown_scheduled = false;
                server.shutdown_after_reads = Some(1);
            }
            Ok(())
        });
        respond(result)
    }

    fn power_off<'a>(
        &'a self,
        id: &'a ServerId,
        mode: PowerOffMode,
    ) -> ApiFuture<'a, (), Self::Error> {
        let mut state = self.lock();
        let result = state.enter(Call::PowerOff(id.clone(), mode)).and_then(|()| {
            let server = state.server_mut(id)?;
            server.status = "down".to_owned();
            server.shutdown_after_reads = None;
            Ok(())
        });
        respond(result)
    }

    fn delete_server<'a>(
        &'a self,
        id: &'a ServerId,
        disks: &'a [DiskId],
    ) -> ApiFuture<'a, (), Self::Error> {
        let mut state = self.lock();
        let result = state
            .enter(Call::DeleteServer(id.clone(), disks.to_vec()))
            .and_then(|()| {
                state
                    .servers
                    .remove(id)
                    .ok_or_else(|| FakeCloudError::missing(format!("server {id}")))?;
                for disk in disks {
                    state.disks.remove(disk);
                }
                Ok(())
            });
        respond(result)
    }

    fn create_disk<'a>(&'a self, spec: &'a DiskSpec) -> ApiFuture<'a, DiskId, Self::Error> {
        let mut state = self.lock();
        let result = state.enter(Call::CreateDisk(spec.clone())).map(|()| {
            let id = DiskId::from(state.next_id(DISK_ID_BASE));
            let script = std::mem::take(&mut state.disk_script);
            state.disks.insert(id.clone(), script);
            id
        });
        respond(result)
    }

    fn read_disk<'a>(&'a self, id: &'a DiskId) -> ApiFuture<'a, String, Self::Error> {
        let mut state = self.lock();
        let result = state.enter(Call::ReadDisk(id.clone())).and_then(|()| {
            let script = state
                .disks
                .get_mut(id)
                .ok_or_else(|| FakeCloudError::missing(format!("disk {id}")))?;
            Ok(script
                .pop_front()
                .unwrap_or_else(|| "available".to_owned()))
        });
        respond(result)
    }

    fn attach_disk<'a>(
        &'a self,
        disk: &'a DiskId,
        server: &'a ServerId,
    ) -> ApiFuture<'a, (), Self::Error> {
        let mut state = self.lock();
        let result = state
            .enter(Call::AttachDisk(disk.clone(), server.clone()))
            .and_then(|()| {
                state.server_mut(server)?.disks.push(disk.clone());
                Ok(())
            });
        respond(result)
    }

    fn configure_disk<'a>(
        &'a self,
        disk: &'a DiskId,
        edit: &'a DiskEditSpec,
    ) -> ApiFuture<'a, (), Self::Error> {
        let mut state = self.lock();
        let result = state
            .enter(Call::ConfigureDisk(disk.clone(), edit.clone()))
            .map(|()| {
                let schedules_shutdown = edit.notes.iter().any(|note| {
                    state
                        .notes
                        .get(note)
                        .is_some_and(|(_, content)| content.contains("shutdown -h now"))
                });
                if schedules_shutdown
                    && let Some(server) = state
                        .servers
                        .values_mut()
                        .find(|server| server.disks.contains(disk))
                {
                    server.shutdown_scheduled = true;
                }
            });
        respond(result)
    }

    fn create_note<'a>(
        &'a self,
        name: &'a str,
        content: &'a str,
    ) -> ApiFuture<'a, NoteId, Self::Error> {
        let mut state = self.lock();
        let result = state
            .enter(Call::CreateNote {
                name: name.to_owned(),
                content: content.to_owned(),
            })
            .map(|()| {
                let id = NoteId::from(state.next_id(NOTE_ID_BASE));
                state
                    .notes
                    .insert(id.clone(), (name.to_owned(), content.to_owned()));
                id
            });
        respond(result)
    }

    fn delete_note<'a>(&'a self, id: &'a NoteId) -> ApiFuture<'a, (), Self::Error> {
        let mut state = self.lock();
        let result = state.enter(Call::DeleteNote(id.clone())).and_then(|()| {
            state
                .notes
                .remove(id)
                .map(|_| ())
                .ok_or_else(|| FakeCloudError::missing(format!("note {id}")))
        });
        respond(result)
    }

    fn packet_filter_by_id<'a>(
        &'a self,
        id: &'a PacketFilterId,
    ) -> ApiFuture<'a, Option<PacketFilterId>, Self::Error> {
        let mut state = self.lock();
        let result = state.enter(Call::PacketFilterById(id.clone())).map(|()| {
            state
                .packet_filters
                .iter()
                .find(|(known, _)| known == id)
                .map(|(known, _)| known.clone())
        });
        respond(result)
    }

    fn packet_filter_by_name<'a>(
        &'a self,
        name: &'a str,
    ) -> ApiFuture<'a, Option<PacketFilterId>, Self::Error> {
        let mut state = self.lock();
        let result = state
            .enter(Call::PacketFilterByName(name.to_owned()))
            .map(|()| {
                state
                    .packet_filters
                    .iter()
                    .find(|(_, known)| known == name)
                    .map(|(id, _)| id.clone())
            });
        respond(result)
    }

    fn connect_packet_filter<'a>(
        &'a self,
        interface: &'a InterfaceId,
        filter: &'a PacketFilterId,
    ) -> ApiFuture<'a, (), Self::Error> {
        let mut state = self.lock();
        let result = state.enter(Call::ConnectPacketFilter(interface.clone(), filter.clone()));
        respond(result)
    }

    fn upsert_dns_record<'a>(
        &'a self,
        record: &'a DnsRecord,
    ) -> ApiFuture<'a, Vec<String>, Self::Error> {
        let mut state = self.lock();
        let result = state.enter(Call::UpsertDns(record.clone())).map(|()| {
            state
                .dns_records
                .insert((record.zone.clone(), record.host_name.clone(), record.ip));
            vec![
                "ns1.gslb1.sakura.ne.jp".to_owned(),
                "ns2.gslb1.sakura.ne.jp".to_owned(),
            ]
        });
        respond(result)
    }

    fn delete_dns_record<'a>(&'a self, record: &'a DnsRecord) -> ApiFuture<'a, (), Self::Error> {
        let mut state = self.lock();
        let result = state.enter(Call::DeleteDns(record.clone())).map(|()| {
            state
                .dns_records
                .remove(&(record.zone.clone(), record.host_name.clone(), record.ip));
        });
        respond(result)
    }

    fn upsert_gslb_record<'a>(
        &'a self,
        record: &'a GslbRecord,
    ) -> ApiFuture<'a, String, Self::Error> {
        let mut state = self.lock();
        let result = state.enter(Call::UpsertGslb(record.clone())).map(|()| {
            state
                .gslb_members
                .insert((record.group.clone(), record.ip));
            format!("{}.gslb.sakura.ne.jp", record.group)
        });
        respond(result)
    }

    fn delete_gslb_record<'a>(
        &'a self,
        record: &'a GslbRecord,
    ) -> ApiFuture<'a, (), Self::Error> {
        let mut state = self.lock();
        let result = state.enter(Call::DeleteGslb(record.clone())).map(|()| {
            state.gslb_members.remove(&(record.group.clone(), record.ip));
        });
        respond(result)
    }
}

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// When the queue is empty every command succeeds with no output.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Arc<Mutex<VecDeque<CommandOutput>>>,
    invocations: Arc<Mutex<Vec<CommandInvocation>>>,
}

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        self.invocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Pushes a successful exit status.
    pub fn push_success(&self) {
        self.push(CommandOutput {
            code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
        });
    }

    /// Pushes a failing exit status with the given stderr.
    pub fn push_failure(&self, code: i32, stderr: &str) {
        self.push(CommandOutput {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.to_owned(),
        });
    }

    fn push(&self, output: CommandOutput) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(output);
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, SpawnError> {
        self.invocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(CommandInvocation {
                program: program.to_owned(),
                args: args.to_vec(),
            });
        Ok(self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(CommandOutput {
                code: Some(0),
                stdout: String::new(),
                stderr: String::new(),
            }))
    }
}

/// Key provider that returns a fixed public key without touching the
/// filesystem.
#[derive(Clone, Debug)]
pub struct StaticKey(pub String);

impl StaticKey {
    /// Provider returning a recognisable dummy key.
    #[must_use]
    pub fn dummy() -> Self {
        Self("ssh-rsa AAAAB3NzaC1yc2E test@sacloud-machine".to_owned())
    }
}

impl SshKeyProvider for StaticKey {
    fn prepare(&self, _private_key: &Utf8Path) -> Result<String, SshKeyError> {
        Ok(self.0.clone())
    }
}
