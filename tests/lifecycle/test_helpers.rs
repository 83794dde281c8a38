//! Shared fixtures for lifecycle scenarios.

use std::time::Duration;

use camino::Utf8PathBuf;
use rstest::fixture;
use sacloud_machine::test_support::{FakeCloud, ScriptedRunner};
use sacloud_machine::{
    CancelToken, Driver, DriverError, FlagMap, MachineStore, ProvisionReport, StateWaiter,
};
use tempfile::TempDir;

pub const MACHINE: &str = "docker-1";
pub const PUBLIC_KEY: &str = "ssh-rsa AAAAB3NzaC1yc2EAAAADAQABAAABAQ lifecycle@test";

pub type TestDriver = Driver<FakeCloud, ScriptedRunner>;
pub type TestError = DriverError<sacloud_machine::test_support::FakeCloudError>;

pub struct World {
    _tmp: TempDir,
    pub root: Utf8PathBuf,
    pub cloud: FakeCloud,
    pub runner: ScriptedRunner,
}

impl World {
    pub fn store(&self) -> MachineStore {
        MachineStore::new(self.root.clone())
    }

    pub fn driver_with(&self, cancel: CancelToken) -> TestDriver {
        Driver::open(
            self.cloud.clone(),
            self.runner.clone(),
            self.store(),
            MACHINE,
            StateWaiter::new(Duration::from_secs(5), Duration::from_secs(600), cancel),
            Duration::from_secs(10),
        )
        .unwrap_or_else(|err| panic!("open driver: {err}"))
    }

    pub fn driver(&self) -> TestDriver {
        self.driver_with(CancelToken::never())
    }

    /// Stands in for `ssh-keygen`, which the scripted runner never executes.
    pub fn pregenerate_key(&self) {
        let dir = self
            .store()
            .ensure_machine_dir(MACHINE)
            .unwrap_or_else(|err| panic!("mkdir: {err}"));
        std::fs::write(dir.join("id_rsa.pub"), PUBLIC_KEY)
            .unwrap_or_else(|err| panic!("write public key: {err}"));
    }

    /// Configures and creates the machine in one go.
    pub async fn create(&self, flags: &FlagMap) -> Result<ProvisionReport, TestError> {
        self.pregenerate_key();
        let mut driver = self.driver();
        driver.set_config_from_flags(flags).await?;
        driver.create().await
    }
}

#[fixture]
pub fn world() -> World {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf())
        .unwrap_or_else(|path| panic!("temp dir should be utf8: {}", path.display()));
    World {
        _tmp: tmp,
        root,
        cloud: FakeCloud::new(),
        runner: ScriptedRunner::new(),
    }
}
