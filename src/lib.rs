//! Core library for the `sacloud-machine` provisioning driver.
//!
//! The crate turns a set of machine flags into a running Sakura Cloud server
//! (server, boot disk, first-boot customisation notes, packet filters and
//! optional DNS/GSLB registration) and tears it down again. Provider access
//! goes through the [`api::CloudApi`] trait; [`sakuracloud`] implements it
//! over HTTP and [`test_support`] offers an in-memory fake.

pub mod api;
pub mod command;
pub mod config;
pub mod customization;
pub mod driver;
pub mod instance;
pub mod machine_store;
pub mod provision;
pub mod sakuracloud;
pub mod server_config;
pub mod teardown;
pub mod test_support;
pub mod types;
pub mod wait;

pub use api::{CloudApi, PowerOffMode};
pub use command::{CommandOutput, CommandRunner, ProcessCommandRunner};
pub use config::{ConfigError, ProviderConfig};
pub use driver::{
    Driver, DriverError, DriverOptions, FlagMap, FlagSpec, FlagValue, create_flags,
    options_from_flags,
};
pub use instance::{Instance, InstanceState};
pub use machine_store::{MachineRecord, MachineStore, MachineStoreError};
pub use provision::{ProvisionError, ProvisionReport, ProvisionStep, Provisioner};
pub use sakuracloud::{SakuraCloudClient, SakuraCloudError};
pub use server_config::{ServerConfig, ServerOptions, ValidationError};
pub use teardown::{Teardown, TeardownError, TeardownReport};
pub use wait::{CancelToken, Canceller, StateWaiter, WaitError, cancel_pair};
