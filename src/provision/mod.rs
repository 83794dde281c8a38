//! Provisioning workflow.
//!
//! [`Provisioner::create`] walks a validated [`ServerConfig`] through the
//! ordered resource steps: key material, password, server, customisation
//! notes, boot disk, packet filters, power-on, the optional customisation
//! reboot, DNS/GSLB registration and finally note cleanup.
//!
//! A failing step aborts the workflow and is reported with its
//! [`ProvisionStep`]. Partially created resources stay in place so the host
//! can inspect or remove them, unless the configuration opts into
//! cleanup-on-failure.

mod error;
mod notes;
mod password;
mod ssh;

use std::net::IpAddr;
use std::time::Duration;

use camino::Utf8PathBuf;
use tracing::{info, warn};

use crate::api::{
    CloudApi, DiskEditSpec, DiskSpec, DnsRecord, GslbRecord, InterfaceInfo, ServerSnapshot,
    ServerSpec,
};
use crate::customization::{CustomizationRequest, select_scripts};
use crate::instance::{Instance, InstanceState};
use crate::server_config::ServerConfig;
use crate::teardown::Teardown;
use crate::types::{DiskId, InterfaceId, NoteId, PacketFilterId, ServerId};
use crate::wait::StateWaiter;

pub use error::{ProvisionError, ProvisionStep};
pub use notes::note_name;
pub use password::generate_password;
pub use ssh::{SshKeyError, SshKeyProvider, SshKeys, check_importable, public_key_path};

const DISK_AVAILABLE: &str = "available";
const MB_PER_GB: u32 = 1024;

/// Summary of a successful provisioning run.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ProvisionReport {
    /// Address reported to the host runtime.
    pub ip: Option<IpAddr>,
    /// Whether the password was generated during this run.
    pub generated_password: bool,
    /// Notes created for first-boot customisation.
    pub notes_created: Vec<NoteId>,
    /// Notes deleted after the instance consumed them.
    pub notes_deleted: Vec<NoteId>,
    /// Notes whose deletion failed.
    pub notes_leaked: Vec<NoteId>,
    /// Name servers of the DNS zone, when a record was registered.
    pub dns_name_servers: Vec<String>,
    /// FQDN of the GSLB group, when a member was registered.
    pub gslb_fqdn: Option<String>,
}

type StepResult<T, E> = Result<T, ProvisionError<E>>;

/// Drives a single instance from configuration to a running machine.
#[derive(Debug)]
pub struct Provisioner<'a, A, K> {
    api: &'a A,
    keys: &'a K,
    waiter: StateWaiter,
    private_key: Utf8PathBuf,
    gslb_settle_delay: Duration,
}

impl<'a, A, K> Provisioner<'a, A, K>
where
    A: CloudApi,
    K: SshKeyProvider,
{
    /// Creates a provisioner that writes the machine's private key to
    /// `private_key`.
    #[must_use]
    pub const fn new(
        api: &'a A,
        keys: &'a K,
        waiter: StateWaiter,
        private_key: Utf8PathBuf,
        gslb_settle_delay: Duration,
    ) -> Self {
        Self {
            api,
            keys,
            waiter,
            private_key,
            gslb_settle_delay,
        }
    }

    /// Provisions the instance described by `config`.
    ///
    /// Identifiers are recorded on `instance` as soon as the provider returns
    /// them, so the caller can persist and later remove a partial instance.
    /// On success every note created during the run has been deleted or is
    /// listed in [`ProvisionReport::notes_leaked`].
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] labelled with the failing step.
    pub async fn create(
        &self,
        config: &mut ServerConfig,
        instance: &mut Instance,
    ) -> Result<ProvisionReport, ProvisionError<A::Error>> {
        let mut report = ProvisionReport::default();
        match self.run(config, instance, &mut report).await {
            Ok(()) => {
                self.delete_notes(&mut report).await;
                info!(
                    server_id = ?instance.server_id().map(ServerId::as_str),
                    ip = ?instance.ip(),
                    "provisioning complete"
                );
                Ok(report)
            }
            Err(err) => {
                warn!(step = %err.step(), error = %err, "provisioning failed");
                if config.cleanup_on_failure() {
                    return Err(self.compensate(config, instance, &mut report, err).await);
                }
                if !report.notes_created.is_empty() {
                    info!(
                        notes = ?report.notes_created,
                        "leaving customisation notes in place for inspection"
                    );
                }
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        config: &mut ServerConfig,
        instance: &mut Instance,
        report: &mut ProvisionReport,
    ) -> StepResult<(), A::Error> {
        let public_key = self.keys.prepare(&self.private_key)?;

        report.generated_password = config.auth().password.is_none();
        let password = config.resolve_password(generate_password).to_owned();
        if report.generated_password {
            info!(
                user = config.policy().login_user,
                password = %password,
                "generated login password"
            );
        }

        let (server_id, interfaces) = self.create_server(config, instance).await?;
        let note_ids = self.create_notes(config, &server_id, report).await?;
        let disk_id = self
            .prepare_disk(config, instance, &server_id, &password, &public_key, note_ids)
            .await?;
        info!(server_id = %server_id, disk_id = %disk_id, "boot disk configured");

        self.connect_packet_filters(config, &interfaces).await?;

        let mut snapshot = self.power_on(&server_id, ProvisionStep::PowerOn).await?;
        if config.policy().needs_reboot && !report.notes_created.is_empty() {
            info!(server_id = %server_id, "waiting for customisation shutdown");
            self.wait_for_state(&server_id, InstanceState::Stopped, ProvisionStep::Reboot)
                .await?;
            snapshot = self.power_on(&server_id, ProvisionStep::Reboot).await?;
        }

        let ip = config
            .network()
            .private
            .filter(|_| config.network().private_ip_only)
            .map(|private| IpAddr::V4(private.ip))
            .or_else(|| snapshot.primary_ip());
        if let Some(address) = ip {
            instance.set_ip(address);
        }
        report.ip = ip;

        self.register_records(config, ip, report).await
    }

    async fn create_server(
        &self,
        config: &ServerConfig,
        instance: &mut Instance,
    ) -> StepResult<(ServerId, Vec<InterfaceInfo>), A::Error> {
        let spec = ServerSpec {
            name: config.host_name().to_owned(),
            plan_id: config.plan_id(),
            interface_driver: config.interface_driver(),
            interfaces: config.network().nic_specs(),
            tags: config.tags(),
        };
        let created = self
            .api
            .create_server(&spec)
            .await
            .map_err(ProvisionError::api(ProvisionStep::CreateServer))?;
        instance
            .assign_server(created.id.clone())
            .map_err(|source| ProvisionError::Instance {
                step: ProvisionStep::CreateServer,
                source,
            })?;
        info!(server_id = %created.id, plan = %spec.plan_id, "created server");

        if let Some(private) = config.network().private {
            let step = ProvisionStep::AssignPrivateIp;
            let nic = created
                .interfaces
                .get(1)
                .ok_or(ProvisionError::MissingInterface { step })?;
            self.api
                .assign_interface_ip(&nic.id, IpAddr::V4(private.ip))
                .await
                .map_err(ProvisionError::api(step))?;
            info!(interface_id = %nic.id, ip = %private.ip, "assigned private address");
        }

        Ok((created.id, created.interfaces))
    }

    async fn create_notes(
        &self,
        config: &ServerConfig,
        server_id: &ServerId,
        report: &mut ProvisionReport,
    ) -> StepResult<Vec<NoteId>, A::Error> {
        let request = CustomizationRequest::from_config(config);
        let scripts = select_scripts(config.policy().scripts, &request);
        if scripts.is_empty() {
            if request.private.is_some() || request.gateway.is_some() || request.disable_primary {
                warn!(
                    os = %config.os(),
                    "no customisation scripts for this os family; network settings are not applied in the guest"
                );
            }
            return Ok(Vec::new());
        }

        for script in &scripts {
            let name = note_name(script.priority, server_id);
            let note_id = self
                .api
                .create_note(&name, &script.body)
                .await
                .map_err(ProvisionError::api(ProvisionStep::CreateNotes))?;
            info!(note_id = %note_id, purpose = %script.purpose, "created customisation note");
            report.notes_created.push(note_id);
        }
        Ok(report.notes_created.clone())
    }

    async fn prepare_disk(
        &self,
        config: &mut ServerConfig,
        instance: &mut Instance,
        server_id: &ServerId,
        password: &str,
        public_key: &str,
        notes: Vec<NoteId>,
    ) -> StepResult<DiskId, A::Error> {
        let source_archive = match config.disk().source_archive.clone() {
            Some(archive) => archive,
            None => {
                let archive = self
                    .api
                    .resolve_base_image(config.os())
                    .await
                    .map_err(ProvisionError::api(ProvisionStep::ResolveImage))?;
                info!(os = %config.os(), archive_id = %archive, "resolved base image");
                config.cache_source_image(archive).clone()
            }
        };

        let disk = config.disk();
        let spec = DiskSpec {
            name: config.host_name().to_owned(),
            plan: disk.plan,
            size_mb: disk.size_gb.saturating_mul(MB_PER_GB),
            connection: disk.connection,
            source_archive,
        };
        let disk_id = self
            .api
            .create_disk(&spec)
            .await
            .map_err(ProvisionError::api(ProvisionStep::CreateDisk))?;
        instance
            .assign_disk(disk_id.clone())
            .map_err(|source| ProvisionError::Instance {
                step: ProvisionStep::CreateDisk,
                source,
            })?;
        info!(disk_id = %disk_id, "created disk");
        self.wait_for_disk(&disk_id, ProvisionStep::CreateDisk)
            .await?;

        self.api
            .attach_disk(&disk_id, server_id)
            .await
            .map_err(ProvisionError::api(ProvisionStep::AttachDisk))?;
        self.wait_for_disk(&disk_id, ProvisionStep::AttachDisk)
            .await?;

        let edit = DiskEditSpec {
            host_name: config.host_name().to_owned(),
            password: password.to_owned(),
            ssh_public_key: public_key.to_owned(),
            disable_password_auth: !config.auth().enable_password_auth,
            notes,
        };
        self.api
            .configure_disk(&disk_id, &edit)
            .await
            .map_err(ProvisionError::api(ProvisionStep::ConfigureDisk))?;
        self.wait_for_disk(&disk_id, ProvisionStep::ConfigureDisk)
            .await?;
        Ok(disk_id)
    }

    async fn connect_packet_filters(
        &self,
        config: &ServerConfig,
        interfaces: &[InterfaceInfo],
    ) -> StepResult<(), A::Error> {
        let network = config.network();
        let requests = [
            (network.packet_filter.as_ref(), interfaces.first()),
            (network.private_packet_filter.as_ref(), interfaces.get(1)),
        ];
        for (reference, nic) in requests {
            let Some(filter_ref) = reference else {
                continue;
            };
            let nic = nic.ok_or(ProvisionError::MissingInterface {
                step: ProvisionStep::PacketFilters,
            })?;
            let filter = self.resolve_packet_filter(filter_ref).await?;
            self.connect_filter(&nic.id, &filter).await?;
        }
        Ok(())
    }

    async fn resolve_packet_filter(
        &self,
        reference: &PacketFilterId,
    ) -> StepResult<PacketFilterId, A::Error> {
        let step = ProvisionStep::PacketFilters;
        if reference.is_numeric()
            && let Some(found) = self
                .api
                .packet_filter_by_id(reference)
                .await
                .map_err(ProvisionError::api(step))?
        {
            return Ok(found);
        }
        self.api
            .packet_filter_by_name(reference.as_str())
            .await
            .map_err(ProvisionError::api(step))?
            .ok_or_else(|| ProvisionError::PacketFilterNotFound {
                step,
                reference: reference.to_string(),
            })
    }

    async fn connect_filter(
        &self,
        interface: &InterfaceId,
        filter: &PacketFilterId,
    ) -> StepResult<(), A::Error> {
        self.api
            .connect_packet_filter(interface, filter)
            .await
            .map_err(ProvisionError::api(ProvisionStep::PacketFilters))?;
        info!(interface_id = %interface, packet_filter_id = %filter, "connected packet filter");
        Ok(())
    }

    async fn power_on(
        &self,
        server_id: &ServerId,
        step: ProvisionStep,
    ) -> StepResult<ServerSnapshot, A::Error> {
        self.api
            .power_on(server_id)
            .await
            .map_err(ProvisionError::api(step))?;
        info!(server_id = %server_id, "powered on; waiting for running state");
        self.wait_for_state(server_id, InstanceState::Running, step)
            .await
    }

    async fn register_records(
        &self,
        config: &ServerConfig,
        ip: Option<IpAddr>,
        report: &mut ProvisionReport,
    ) -> StepResult<(), A::Error> {
        if config.dns_zone().is_none() && config.gslb_group().is_none() {
            return Ok(());
        }
        let step = ProvisionStep::AuxRecords;
        let address = ip.ok_or(ProvisionError::MissingAddress { step })?;

        if let Some(zone) = config.dns_zone() {
            let record = DnsRecord {
                zone: zone.to_owned(),
                host_name: config.host_name().to_owned(),
                ip: address,
            };
            report.dns_name_servers = self
                .api
                .upsert_dns_record(&record)
                .await
                .map_err(ProvisionError::api(step))?;
            info!(
                zone,
                name_servers = ?report.dns_name_servers,
                "registered dns record"
            );
        }
        if let Some(group) = config.gslb_group() {
            let record = GslbRecord {
                group: group.to_owned(),
                ip: address,
            };
            let fqdn = self
                .api
                .upsert_gslb_record(&record)
                .await
                .map_err(ProvisionError::api(step))?;
            info!(group, fqdn = %fqdn, "registered gslb member");
            report.gslb_fqdn = Some(fqdn);
        }
        Ok(())
    }

    async fn delete_notes(&self, report: &mut ProvisionReport) {
        for note_id in report.notes_created.clone() {
            match self.api.delete_note(&note_id).await {
                Ok(()) => report.notes_deleted.push(note_id),
                Err(err) => {
                    warn!(note_id = %note_id, error = %err, "failed to delete customisation note");
                    report.notes_leaked.push(note_id);
                }
            }
        }
    }

    async fn compensate(
        &self,
        config: &ServerConfig,
        instance: &mut Instance,
        report: &mut ProvisionReport,
        err: ProvisionError<A::Error>,
    ) -> ProvisionError<A::Error> {
        info!("cleanup-on-failure is enabled; removing partial resources");
        self.delete_notes(report).await;
        let teardown = Teardown::new(self.api, self.waiter.clone(), self.gslb_settle_delay);
        let cleanup = match teardown.remove(Some(config), instance).await {
            Ok(outcome) => {
                let removed = instance.server_id().is_some();
                instance.clear();
                if outcome.deleted {
                    String::from("partial resources removed")
                } else if removed {
                    String::from("server was already gone")
                } else {
                    String::from("no server to remove")
                }
            }
            Err(teardown_err) => format!("cleanup also failed: {teardown_err}"),
        };
        ProvisionError::CleanedUp {
            source: Box::new(err),
            cleanup,
        }
    }

    async fn wait_for_disk(
        &self,
        disk_id: &DiskId,
        step: ProvisionStep,
    ) -> StepResult<(), A::Error> {
        self.waiter
            .wait_until(
                &format!("disk {disk_id} available"),
                || self.api.read_disk(disk_id),
                |availability| availability == DISK_AVAILABLE,
            )
            .await
            .map(|_| ())
            .map_err(ProvisionError::wait(step))
    }

    async fn wait_for_state(
        &self,
        server_id: &ServerId,
        target: InstanceState,
        step: ProvisionStep,
    ) -> StepResult<ServerSnapshot, A::Error> {
        self.waiter
            .wait_until(
                &format!("server {server_id} {target}"),
                || self.api.read_server(server_id),
                |snapshot| InstanceState::from_status(&snapshot.status) == target,
            )
            .await
            .map_err(ProvisionError::wait(step))
    }
}
