//! Binary entry point for the `sacloud-machine` CLI.

mod cli;

use std::io::{self, Write};
use std::process;

use camino::Utf8PathBuf;
use clap::Parser;
use thiserror::Error;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use sacloud_machine::driver::flags::names;
use sacloud_machine::{
    ConfigError, Driver, DriverError, DriverOptions, FlagSpec, MachineStore,
    ProcessCommandRunner, ProviderConfig, SakuraCloudClient, SakuraCloudError, cancel_pair,
    create_flags,
};

use cli::{Cli, Command, CreateArgs};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("provider client error: {0}")]
    Client(#[from] SakuraCloudError),
    #[error(transparent)]
    Driver(#[from] DriverError<SakuraCloudError>),
}

impl DriverOptions for CreateArgs {
    fn string(&self, name: &str) -> Option<String> {
        let value = match name {
            names::HOST_NAME => &self.host_name,
            names::OS_TYPE => &self.os_type,
            names::DISK_PLAN => &self.disk_plan,
            names::DISK_CONNECTION => &self.disk_connection,
            names::DISK_SOURCE_ARCHIVE_ID => &self.disk_source_archive_id,
            names::INTERFACE_DRIVER => &self.interface_driver,
            names::PASSWORD => &self.password,
            names::PACKET_FILTER => &self.packet_filter,
            names::PRIVATE_PACKET_FILTER => &self.private_packet_filter,
            names::SSH_KEY => &self.ssh_key,
            names::CONNECTED_SWITCH => &self.connected_switch,
            names::PRIVATE_IP => &self.private_ip,
            names::PRIVATE_IP_SUBNET_MASK => &self.private_ip_subnet_mask,
            names::GATEWAY => &self.gateway,
            names::GROUP => &self.group,
            names::DNS_ZONE => &self.dns_zone,
            names::GSLB => &self.gslb,
            _ => return None,
        };
        value.clone()
    }

    fn int(&self, name: &str) -> Option<i64> {
        match name {
            names::CORE => self.core.map(i64::from),
            names::MEMORY => self.memory.map(i64::from),
            names::DISK_SIZE => self.disk_size.map(i64::from),
            names::ENGINE_PORT => self.engine_port.map(i64::from),
            _ => None,
        }
    }

    fn bool(&self, name: &str) -> Option<bool> {
        match name {
            names::ENABLE_PASSWORD_AUTH => Some(self.enable_password_auth),
            names::PRIVATE_IP_ONLY => Some(self.private_ip_only),
            names::AUTO_REBOOT => Some(self.auto_reboot),
            names::IGNORE_VIRTIO_NET => Some(self.ignore_virtio_net),
            names::CLEANUP_ON_FAILURE => Some(self.cleanup_on_failure),
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    if matches!(cli.command, Command::Flags) {
        write_flags(io::stdout(), create_flags());
        return Ok(());
    }

    let provider = ProviderConfig::load_without_cli_args()?;
    let client = SakuraCloudClient::new(&provider)?;
    let (canceller, cancel) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; cancelling");
            canceller.cancel();
        }
    });

    let mut driver = Driver::open(
        client,
        ProcessCommandRunner,
        MachineStore::new(Utf8PathBuf::from(cli.store_path)),
        &cli.machine_name,
        provider.waiter(cancel),
        provider.gslb_settle_delay(),
    )?;

    let mut stdout = io::stdout();
    match cli.command {
        Command::Create(args) => {
            driver.set_config_from_flags(args.as_ref()).await?;
            let report = driver.create().await?;
            if let Some(ip) = report.ip {
                writeln!(stdout, "{} created at {ip}", driver.machine_name()).ok();
            }
            if !report.notes_leaked.is_empty() {
                warn!(notes = ?report.notes_leaked, "some customisation notes were not deleted");
            }
        }
        Command::Start => driver.start().await?,
        Command::Stop => driver.stop().await?,
        Command::Kill => driver.kill().await?,
        Command::Restart => driver.restart().await?,
        Command::Remove => {
            driver.remove().await?;
        }
        Command::State => {
            writeln!(stdout, "{}", driver.get_state().await?).ok();
        }
        Command::Ip => {
            writeln!(stdout, "{}", driver.get_ip().await?).ok();
        }
        Command::Url => {
            writeln!(stdout, "{}", driver.get_url().await?).ok();
        }
        Command::Flags => write_flags(stdout, create_flags()),
    }
    Ok(())
}

fn write_flags(mut target: impl Write, flags: &[FlagSpec]) {
    for spec in flags {
        let default = spec.default.to_string();
        writeln!(
            target,
            "--{:<36} {:<38} {default:<16} {}",
            spec.name, spec.env_var, spec.usage
        )
        .ok();
    }
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
