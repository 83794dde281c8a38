//! Machine driver facade consumed by the host runtime.
//!
//! A [`Driver`] binds one named machine record to a provider client. Flags
//! are validated into a [`ServerConfig`] by [`Driver::set_config_from_flags`],
//! [`Driver::create`] runs the provisioning workflow and persists whatever
//! identifiers it recorded, and the remaining operations act on the stored
//! server.

mod error;
pub mod flags;

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tracing::{info, warn};

use crate::api::{CloudApi, PowerOffMode};
use crate::command::CommandRunner;
use crate::instance::InstanceState;
use crate::machine_store::{MachineRecord, MachineStore};
use crate::provision::{ProvisionReport, Provisioner, SshKeys, check_importable};
use crate::server_config::{ServerConfig, ServerOptions};
use crate::teardown::{Teardown, TeardownReport};
use crate::types::ServerId;
use crate::wait::StateWaiter;

pub use error::DriverError;
pub use flags::{
    DriverOptions, FlagDefault, FlagError, FlagKind, FlagMap, FlagSpec, FlagValue, create_flags,
    options_from_flags,
};

type DriverResult<T, E> = Result<T, DriverError<E>>;

/// Driver for a single machine.
#[derive(Debug)]
pub struct Driver<A, R> {
    api: A,
    runner: R,
    store: MachineStore,
    record: MachineRecord,
    waiter: StateWaiter,
    gslb_settle_delay: Duration,
}

impl<A, R> Driver<A, R>
where
    A: CloudApi,
    R: CommandRunner + Clone,
{
    /// Opens the named machine, loading its record when one exists.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Store`] when the name is invalid or the record
    /// cannot be read.
    pub fn open(
        api: A,
        runner: R,
        store: MachineStore,
        machine_name: &str,
        waiter: StateWaiter,
        gslb_settle_delay: Duration,
    ) -> DriverResult<Self, A::Error> {
        store.machine_dir(machine_name)?;
        let record = store.load(machine_name)?.unwrap_or_else(|| {
            MachineRecord::new(machine_name, ServerOptions::default())
        });
        Ok(Self {
            api,
            runner,
            store,
            record,
            waiter,
            gslb_settle_delay,
        })
    }

    /// Provider client.
    #[must_use]
    pub const fn api(&self) -> &A {
        &self.api
    }

    /// Machine record as currently held in memory.
    #[must_use]
    pub const fn record(&self) -> &MachineRecord {
        &self.record
    }

    /// Machine name.
    #[must_use]
    pub fn machine_name(&self) -> &str {
        &self.record.machine_name
    }

    /// Validates host-supplied options and stores the resulting
    /// configuration. Nothing is written to disk.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Flag`] or [`DriverError::Validation`]. The
    /// provider is only consulted once every local rule has passed.
    pub async fn set_config_from_flags(
        &mut self,
        opts: &impl DriverOptions,
    ) -> DriverResult<(), A::Error> {
        let options = options_from_flags(opts)?;
        let config = ServerConfig::validate(&options, &self.record.machine_name, &self.api).await?;
        self.record.options = options;
        self.record.config = Some(config);
        Ok(())
    }

    /// Checks that everything `create` needs is in place.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::NotConfigured`], [`DriverError::AlreadyCreated`]
    /// or [`DriverError::SshKey`] when a key to import is missing.
    pub fn pre_create_check(&self) -> DriverResult<(), A::Error> {
        let config = self.config()?;
        if let Some(server_id) = self.record.instance.server_id() {
            return Err(DriverError::AlreadyCreated {
                machine: self.record.machine_name.clone(),
                server_id: server_id.clone(),
            });
        }
        if let Some(source) = &config.auth().ssh_key_path {
            check_importable(source)?;
        }
        Ok(())
    }

    /// Provisions the machine and saves its record.
    ///
    /// The record is written even when provisioning fails, so a later
    /// [`Self::remove`] can delete whatever was created.
    ///
    /// # Errors
    ///
    /// Returns the provisioning failure, or [`DriverError::Store`] when the
    /// record cannot be saved after a successful run.
    pub async fn create(&mut self) -> DriverResult<ProvisionReport, A::Error> {
        self.pre_create_check()?;
        let machine = self.record.machine_name.clone();
        self.store.ensure_machine_dir(&machine)?;
        let private_key = self.store.private_key_path(&machine)?;

        let Some(config) = self.record.config.as_mut() else {
            return Err(DriverError::NotConfigured { machine });
        };
        let keys = match config.auth().ssh_key_path.clone() {
            Some(source) => SshKeys::import(self.runner.clone(), source),
            None => SshKeys::generate(self.runner.clone()),
        };
        let provisioner = Provisioner::new(
            &self.api,
            &keys,
            self.waiter.clone(),
            private_key,
            self.gslb_settle_delay,
        );
        let outcome = provisioner.create(config, &mut self.record.instance).await;

        let saved = self.store.save(&self.record);
        if let Err(err) = &saved {
            warn!(machine = %machine, error = %err, "failed to save machine record");
        }
        let report = outcome?;
        saved?;
        info!(machine = %machine, "machine record saved");
        Ok(report)
    }

    /// Powers the server on and waits until it runs.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] when the call or the wait fails.
    pub async fn start(&self) -> DriverResult<(), A::Error> {
        let server_id = self.server_id()?;
        self.api
            .power_on(server_id)
            .await
            .map_err(DriverError::api("start"))?;
        self.wait_for_state(server_id, InstanceState::Running).await
    }

    /// Shuts the server down gracefully and waits until it stops.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] when the call or the wait fails.
    pub async fn stop(&self) -> DriverResult<(), A::Error> {
        let server_id = self.server_id()?;
        self.api
            .power_off(server_id, PowerOffMode::Graceful)
            .await
            .map_err(DriverError::api("stop"))?;
        self.wait_for_state(server_id, InstanceState::Stopped).await
    }

    /// Forces the server off without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Teardown`] when the provider rejects the call.
    pub async fn kill(&self) -> DriverResult<(), A::Error> {
        let server_id = self.server_id()?;
        self.teardown().kill(server_id).await?;
        Ok(())
    }

    /// Stops the server, waits, and starts it again.
    ///
    /// # Errors
    ///
    /// Returns the first failing power call or wait.
    pub async fn restart(&self) -> DriverResult<(), A::Error> {
        self.stop().await?;
        self.start().await
    }

    /// Current lifecycle state.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] when no server exists or the read fails.
    pub async fn get_state(&self) -> DriverResult<InstanceState, A::Error> {
        let server_id = self.server_id()?;
        let snapshot = self
            .api
            .read_server(server_id)
            .await
            .map_err(DriverError::api("get state"))?;
        Ok(InstanceState::from_status(&snapshot.status))
    }

    /// Address the host runtime should use to reach the machine.
    ///
    /// In private-only mode this is the configured private address.
    /// Otherwise the address recorded at create time is preferred and the
    /// server is read as a fallback.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::NoAddress`] when no address is known.
    pub async fn get_ip(&self) -> DriverResult<IpAddr, A::Error> {
        if let Some(config) = &self.record.config
            && config.network().private_ip_only
            && let Some(private) = config.network().private
        {
            return Ok(IpAddr::V4(private.ip));
        }
        if let Some(ip) = self.record.instance.ip() {
            return Ok(ip);
        }
        let server_id = self.server_id()?;
        self.api
            .read_server(server_id)
            .await
            .map_err(DriverError::api("get ip"))?
            .primary_ip()
            .ok_or_else(|| DriverError::NoAddress {
                machine: self.record.machine_name.clone(),
            })
    }

    /// Docker engine URL, or an empty string when no address is known yet.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] when the address lookup fails for another
    /// reason.
    pub async fn get_url(&self) -> DriverResult<String, A::Error> {
        let port = self
            .record
            .config
            .as_ref()
            .map_or(self.record.options.engine_port, ServerConfig::engine_port);
        match self.get_ip().await {
            Ok(ip) => Ok(format!("tcp://{}", SocketAddr::new(ip, port))),
            Err(DriverError::NoAddress { .. } | DriverError::NotCreated { .. }) => {
                Ok(String::new())
            }
            Err(err) => Err(err),
        }
    }

    /// Removes the server, its disk and auxiliary records, then deletes the
    /// machine record.
    ///
    /// A machine without a server only loses its record.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Teardown`] when the server cannot be deleted;
    /// the record is kept in that case.
    pub async fn remove(&self) -> DriverResult<TeardownReport, A::Error> {
        let report = self
            .teardown()
            .remove(self.record.config.as_ref(), &self.record.instance)
            .await?;
        for warning in &report.warnings {
            warn!(machine = %self.record.machine_name, warning, "removal warning");
        }
        self.store.delete(&self.record.machine_name)?;
        Ok(report)
    }

    /// Writes the in-memory record to the store.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Store`] when the record cannot be written.
    pub fn save(&self) -> DriverResult<(), A::Error> {
        self.store.save(&self.record)?;
        Ok(())
    }

    fn config(&self) -> DriverResult<&ServerConfig, A::Error> {
        self.record
            .config
            .as_ref()
            .ok_or_else(|| DriverError::NotConfigured {
                machine: self.record.machine_name.clone(),
            })
    }

    fn server_id(&self) -> DriverResult<&ServerId, A::Error> {
        self.record
            .instance
            .server_id()
            .ok_or_else(|| DriverError::NotCreated {
                machine: self.record.machine_name.clone(),
            })
    }

    fn teardown(&self) -> Teardown<'_, A> {
        Teardown::new(&self.api, self.waiter.clone(), self.gslb_settle_delay)
    }

    async fn wait_for_state(
        &self,
        server_id: &ServerId,
        target: InstanceState,
    ) -> DriverResult<(), A::Error> {
        self.waiter
            .wait_until(
                &format!("server {server_id} {target}"),
                || self.api.read_server(server_id),
                |snapshot| InstanceState::from_status(&snapshot.status) == target,
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests;
