//! Removal and forced termination of a provisioned instance.

use std::net::IpAddr;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::api::{CloudApi, DnsRecord, GslbRecord, PowerOffMode, ProviderError};
use crate::instance::{Instance, InstanceState};
use crate::server_config::ServerConfig;
use crate::types::{DiskId, ServerId};
use crate::wait::{StateWaiter, WaitError};

/// Default delay after removing a GSLB member before the entry is gone.
pub const DEFAULT_GSLB_SETTLE_DELAY: Duration = Duration::from_secs(10);

/// Errors raised while tearing an instance down.
#[derive(Debug, Error)]
pub enum TeardownError<ApiError>
where
    ApiError: std::error::Error + 'static,
{
    /// Deleting the server and its disks failed.
    #[error("failed to delete server {server_id}: {source}")]
    Delete {
        /// Server that could not be deleted.
        server_id: ServerId,
        /// Provider-specific error.
        #[source]
        source: ApiError,
    },
    /// Powering the server off failed.
    #[error("failed to power off server {server_id}: {source}")]
    PowerOff {
        /// Server that could not be stopped.
        server_id: ServerId,
        /// Provider-specific error.
        #[source]
        source: ApiError,
    },
    /// Teardown was cancelled.
    #[error(transparent)]
    Wait(#[from] WaitError),
}

/// Best-effort failures observed during a successful removal.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TeardownReport {
    /// Whether a server was deleted.
    pub deleted: bool,
    /// Human-readable descriptions of skipped or failed cleanup actions.
    pub warnings: Vec<String>,
}

/// Removes instances and their auxiliary records.
#[derive(Debug)]
pub struct Teardown<'a, A> {
    api: &'a A,
    waiter: StateWaiter,
    gslb_settle_delay: Duration,
}

impl<'a, A: CloudApi> Teardown<'a, A> {
    /// Creates a teardown workflow.
    #[must_use]
    pub const fn new(api: &'a A, waiter: StateWaiter, gslb_settle_delay: Duration) -> Self {
        Self {
            api,
            waiter,
            gslb_settle_delay,
        }
    }

    /// Deregisters auxiliary records, stops the server gracefully and deletes
    /// it together with its disk.
    ///
    /// Only the final deletion is fatal; everything before it is logged and
    /// reported. A server the provider no longer knows counts as removed.
    ///
    /// # Errors
    ///
    /// Returns [`TeardownError::Delete`] when the server cannot be deleted and
    /// [`TeardownError::Wait`] when the teardown is cancelled.
    pub async fn remove(
        &self,
        config: Option<&ServerConfig>,
        instance: &Instance,
    ) -> Result<TeardownReport, TeardownError<A::Error>> {
        let mut report = TeardownReport::default();
        let Some(server_id) = instance.server_id() else {
            info!("no server recorded; nothing to remove");
            return Ok(report);
        };

        if let Some(cfg) = config
            && (cfg.dns_zone().is_some() || cfg.gslb_group().is_some())
        {
            match self.registered_address(cfg, instance, server_id).await {
                Ok(ip) => self.deregister(cfg, ip, &mut report).await?,
                Err(warning) => {
                    warn!(server_id = %server_id, warning = %warning, "skipping record removal");
                    report.warnings.push(warning);
                }
            }
        }

        info!(server_id = %server_id, "stopping server before deletion");
        match self.api.power_off(server_id, PowerOffMode::Graceful).await {
            Ok(()) => {
                if let Err(err) = self.wait_for_state(server_id, InstanceState::Stopped).await {
                    if matches!(err, WaitError::Cancelled { .. }) {
                        return Err(err.into());
                    }
                    warn!(server_id = %server_id, error = %err, "server did not stop cleanly");
                    report.warnings.push(err.to_string());
                }
            }
            Err(err) => {
                warn!(server_id = %server_id, error = %err, "graceful power-off failed");
                report.warnings.push(format!("power off: {err}"));
            }
        }

        let disks: Vec<DiskId> = instance.disk_id().cloned().into_iter().collect();
        match self.api.delete_server(server_id, &disks).await {
            Ok(()) => {
                info!(server_id = %server_id, "removed server");
                report.deleted = true;
            }
            Err(err) if err.is_not_found() => {
                warn!(server_id = %server_id, "server was already gone");
                report
                    .warnings
                    .push(format!("server {server_id} was already gone"));
            }
            Err(source) => {
                return Err(TeardownError::Delete {
                    server_id: server_id.clone(),
                    source,
                });
            }
        }
        Ok(report)
    }

    /// Forces the server off without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`TeardownError::PowerOff`] when the provider rejects the call.
    pub async fn kill(&self, server_id: &ServerId) -> Result<(), TeardownError<A::Error>> {
        self.api
            .power_off(server_id, PowerOffMode::Forced)
            .await
            .map_err(|source| TeardownError::PowerOff {
                server_id: server_id.clone(),
                source,
            })
    }

    /// Address the records point at: the recorded one, the private address
    /// in private-only mode, or the server's current primary address.
    async fn registered_address(
        &self,
        config: &ServerConfig,
        instance: &Instance,
        server_id: &ServerId,
    ) -> Result<IpAddr, String> {
        if let Some(ip) = instance.ip() {
            return Ok(ip);
        }
        if config.network().private_ip_only
            && let Some(private) = config.network().private
        {
            return Ok(IpAddr::V4(private.ip));
        }
        self.api
            .read_server(server_id)
            .await
            .map_err(|err| format!("dns/gslb records: address lookup failed: {err}"))?
            .primary_ip()
            .ok_or_else(|| String::from("dns/gslb records: server reports no address"))
    }

    async fn deregister(
        &self,
        config: &ServerConfig,
        ip: IpAddr,
        report: &mut TeardownReport,
    ) -> Result<(), TeardownError<A::Error>> {
        if let Some(zone) = config.dns_zone() {
            let record = DnsRecord {
                zone: zone.to_owned(),
                host_name: config.host_name().to_owned(),
                ip,
            };
            if let Err(err) = self.api.delete_dns_record(&record).await {
                warn!(zone, error = %err, "failed to delete dns record");
                report.warnings.push(format!("dns record: {err}"));
            }
        }

        if let Some(group) = config.gslb_group() {
            let record = GslbRecord {
                group: group.to_owned(),
                ip,
            };
            match self.api.delete_gslb_record(&record).await {
                Ok(()) => {
                    self.waiter
                        .pause("gslb member removal", self.gslb_settle_delay)
                        .await?;
                }
                Err(err) => {
                    warn!(group, error = %err, "failed to delete gslb member");
                    report.warnings.push(format!("gslb member: {err}"));
                }
            }
        }
        Ok(())
    }

    async fn wait_for_state(
        &self,
        server_id: &ServerId,
        target: InstanceState,
    ) -> Result<(), WaitError> {
        self.waiter
            .wait_until(
                &format!("server {server_id} {target}"),
                || self.api.read_server(server_id),
                |snapshot| InstanceState::from_status(&snapshot.status) == target,
            )
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests;
