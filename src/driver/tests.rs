//! Tests for the driver facade.

use std::net::{IpAddr, Ipv4Addr};

use camino::Utf8PathBuf;
use rstest::{fixture, rstest};
use tempfile::TempDir;

use super::flags::names;
use super::*;
use crate::api::PowerOffMode;
use crate::provision::{ProvisionError, SshKeyError};
use crate::server_config::ValidationError;
use crate::test_support::{Call, FakeCloud, Op, ScriptedRunner};
use crate::types::{DiskId, ServerId};
use crate::wait::CancelToken;

const MACHINE: &str = "web-1";
const PUBLIC_KEY: &str = "ssh-rsa AAAAB3NzaC1yc2EAAAADAQABAAABAQ test@example";

struct Harness {
    _tmp: TempDir,
    root: Utf8PathBuf,
    cloud: FakeCloud,
    runner: ScriptedRunner,
}

impl Harness {
    fn store(&self) -> MachineStore {
        MachineStore::new(self.root.clone())
    }

    fn driver(&self) -> Driver<FakeCloud, ScriptedRunner> {
        Driver::open(
            self.cloud.clone(),
            self.runner.clone(),
            self.store(),
            MACHINE,
            StateWaiter::new(
                Duration::from_secs(5),
                Duration::from_secs(120),
                CancelToken::never(),
            ),
            Duration::from_secs(10),
        )
        .unwrap_or_else(|err| panic!("open driver: {err}"))
    }

    /// Places the public half where `ssh-keygen` would have written it.
    fn pregenerate_key(&self) {
        let dir = self
            .store()
            .ensure_machine_dir(MACHINE)
            .unwrap_or_else(|err| panic!("mkdir: {err}"));
        std::fs::write(dir.join("id_rsa.pub"), PUBLIC_KEY)
            .unwrap_or_else(|err| panic!("write public key: {err}"));
    }

    /// Saves a record for a server that already exists in the fake cloud.
    fn seed_running_machine(&self, options: ServerOptions) {
        self.cloud.seed_server(
            "113000000042",
            "up",
            Some(IpAddr::V4(Ipv4Addr::new(203, 0, 113, 42))),
        );
        let mut record = MachineRecord::new(MACHINE, options);
        record
            .instance
            .assign_server(ServerId::from("113000000042"))
            .unwrap_or_else(|err| panic!("assign server: {err}"));
        record
            .instance
            .assign_disk(DiskId::from("112000000042"))
            .unwrap_or_else(|err| panic!("assign disk: {err}"));
        self.store()
            .save(&record)
            .unwrap_or_else(|err| panic!("save: {err}"));
    }
}

#[fixture]
fn harness() -> Harness {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf())
        .unwrap_or_else(|err| panic!("temp path should be utf8: {}", err.display()));
    Harness {
        _tmp: tmp,
        root,
        cloud: FakeCloud::new(),
        runner: ScriptedRunner::new(),
    }
}

#[rstest]
#[tokio::test]
async fn invalid_flags_are_rejected_without_provider_calls(harness: Harness) {
    let mut driver = harness.driver();
    let flags = FlagMap::new().with(names::DISK_SIZE, FlagValue::Int(30));

    let err = driver
        .set_config_from_flags(&flags)
        .await
        .expect_err("30 GB is not an ssd size");

    assert!(matches!(
        err,
        DriverError::Validation(ValidationError::UnsupportedDiskSize { .. })
    ));
    assert!(harness.cloud.calls().is_empty());
    assert!(driver.record().config.is_none());
}

#[rstest]
#[tokio::test]
async fn create_requires_configuration(harness: Harness) {
    let mut driver = harness.driver();
    let err = driver.create().await.expect_err("no configuration");
    assert!(matches!(err, DriverError::NotConfigured { .. }));
    assert!(harness.cloud.calls().is_empty());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn create_generates_key_and_persists_instance(harness: Harness) {
    harness.pregenerate_key();
    let mut driver = harness.driver();
    driver
        .set_config_from_flags(&FlagMap::new())
        .await
        .unwrap_or_else(|err| panic!("flags: {err}"));

    let report = driver
        .create()
        .await
        .unwrap_or_else(|err| panic!("create: {err}"));
    assert!(report.generated_password);

    let keygen = harness.runner.invocations();
    assert_eq!(keygen.len(), 1);
    assert!(
        keygen
            .first()
            .is_some_and(|call| call.command_string().starts_with("ssh-keygen -t rsa"))
    );
    let edit_key = harness.cloud.calls().into_iter().find_map(|call| match call {
        Call::ConfigureDisk(_, edit) => Some(edit.ssh_public_key),
        _ => None,
    });
    assert_eq!(edit_key.as_deref(), Some(PUBLIC_KEY));

    let reopened = harness.driver();
    let instance = &reopened.record().instance;
    assert!(instance.server_id().is_some());
    assert!(instance.disk_id().is_some());
    assert!(
        reopened
            .record()
            .config
            .as_ref()
            .is_some_and(|config| config.auth().password.is_some())
    );
    assert_eq!(
        reopened
            .get_url()
            .await
            .unwrap_or_else(|err| panic!("url: {err}")),
        "tcp://203.0.113.10:2376"
    );
    assert_eq!(
        reopened
            .get_state()
            .await
            .unwrap_or_else(|err| panic!("state: {err}")),
        InstanceState::Running
    );
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn second_create_is_refused(harness: Harness) {
    harness.pregenerate_key();
    let mut driver = harness.driver();
    driver
        .set_config_from_flags(&FlagMap::new())
        .await
        .unwrap_or_else(|err| panic!("flags: {err}"));
    driver
        .create()
        .await
        .unwrap_or_else(|err| panic!("create: {err}"));

    let err = driver.create().await.expect_err("server already exists");
    assert!(matches!(err, DriverError::AlreadyCreated { .. }));
    assert_eq!(harness.cloud.count(Op::CreateServer), 1);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn failed_create_still_saves_record_for_removal(harness: Harness) {
    harness.pregenerate_key();
    harness.cloud.fail_always(Op::AttachDisk, "disk busy");
    let mut driver = harness.driver();
    driver
        .set_config_from_flags(&FlagMap::new())
        .await
        .unwrap_or_else(|err| panic!("flags: {err}"));

    let err = driver.create().await.expect_err("attach fails");
    assert!(matches!(
        err,
        DriverError::Provision(ProvisionError::Api { .. })
    ));
    assert_eq!(harness.cloud.live_servers().len(), 1);

    let reopened = harness.driver();
    assert!(reopened.record().instance.server_id().is_some());
    let report = reopened
        .remove()
        .await
        .unwrap_or_else(|err| panic!("remove: {err}"));
    assert!(report.deleted);
    assert!(harness.cloud.live_servers().is_empty());
    assert!(
        harness
            .store()
            .load(MACHINE)
            .unwrap_or_else(|err| panic!("load: {err}"))
            .is_none()
    );
}

#[rstest]
#[tokio::test]
async fn missing_import_key_fails_pre_create_check(harness: Harness) {
    let mut driver = harness.driver();
    let missing = harness.root.join("nope/id_rsa");
    let flags = FlagMap::new().with(names::SSH_KEY, FlagValue::Text(missing.to_string()));
    driver
        .set_config_from_flags(&flags)
        .await
        .unwrap_or_else(|err| panic!("flags: {err}"));

    let err = driver.pre_create_check().expect_err("key is missing");
    assert!(matches!(
        err,
        DriverError::SshKey(SshKeyError::Missing { .. })
    ));
    let create_err = driver.create().await.expect_err("create checks first");
    assert!(matches!(create_err, DriverError::SshKey(_)));
    assert_eq!(harness.cloud.count(Op::CreateServer), 0);
}

#[rstest]
#[tokio::test]
async fn imported_key_path_survives_save_and_reopen(harness: Harness) {
    let mut driver = harness.driver();
    let key = harness.root.join("keys/id_rsa");
    let flags = FlagMap::new().with(names::SSH_KEY, FlagValue::Text(key.to_string()));
    driver
        .set_config_from_flags(&flags)
        .await
        .unwrap_or_else(|err| panic!("flags: {err}"));
    driver.save().unwrap_or_else(|err| panic!("save: {err}"));

    let reopened = harness.driver();
    let config = reopened
        .record()
        .config
        .as_ref()
        .unwrap_or_else(|| panic!("config should be persisted"));
    assert_eq!(config.auth().ssh_key_path.as_ref(), Some(&key));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn restart_stops_then_starts(harness: Harness) {
    harness.seed_running_machine(ServerOptions::default());
    let driver = harness.driver();

    driver
        .restart()
        .await
        .unwrap_or_else(|err| panic!("restart: {err}"));

    let power: Vec<Op> = harness
        .cloud
        .ops()
        .into_iter()
        .filter(|op| matches!(op, Op::PowerOn | Op::PowerOff))
        .collect();
    assert_eq!(power, vec![Op::PowerOff, Op::PowerOn]);
    assert!(harness.cloud.calls().contains(&Call::PowerOff(
        ServerId::from("113000000042"),
        PowerOffMode::Graceful
    )));
    assert_eq!(
        harness
            .cloud
            .server_status(&ServerId::from("113000000042"))
            .as_deref(),
        Some("up")
    );
}

#[rstest]
#[tokio::test]
async fn kill_forces_power_off_without_polling(harness: Harness) {
    harness.seed_running_machine(ServerOptions::default());
    let driver = harness.driver();

    driver
        .kill()
        .await
        .unwrap_or_else(|err| panic!("kill: {err}"));

    assert_eq!(
        harness.cloud.calls(),
        vec![Call::PowerOff(
            ServerId::from("113000000042"),
            PowerOffMode::Forced
        )]
    );
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn stop_waits_for_stopped_state(harness: Harness) {
    harness.seed_running_machine(ServerOptions::default());
    harness.cloud.script_server_statuses(&["cleaning", "cleaning"]);
    let driver = harness.driver();

    driver
        .stop()
        .await
        .unwrap_or_else(|err| panic!("stop: {err}"));

    assert_eq!(harness.cloud.count(Op::ReadServer), 3);
    assert_eq!(
        driver
            .get_state()
            .await
            .unwrap_or_else(|err| panic!("state: {err}")),
        InstanceState::Stopped
    );
}

#[rstest]
#[tokio::test]
async fn ip_falls_back_to_reading_the_server(harness: Harness) {
    harness.seed_running_machine(ServerOptions::default());
    let driver = harness.driver();

    let ip = driver
        .get_ip()
        .await
        .unwrap_or_else(|err| panic!("ip: {err}"));

    assert_eq!(ip, IpAddr::V4(Ipv4Addr::new(203, 0, 113, 42)));
    assert_eq!(harness.cloud.count(Op::ReadServer), 1);
}

#[rstest]
#[tokio::test]
async fn private_only_machines_report_the_private_address(harness: Harness) {
    let mut driver = harness.driver();
    let flags = FlagMap::new()
        .with(names::PRIVATE_IP_ONLY, FlagValue::Bool(true))
        .with(names::PRIVATE_IP, FlagValue::Text("192.168.0.11".to_owned()))
        .with(names::ENGINE_PORT, FlagValue::Int(2377));
    driver
        .set_config_from_flags(&flags)
        .await
        .unwrap_or_else(|err| panic!("flags: {err}"));
    let calls_before = harness.cloud.calls().len();

    assert_eq!(
        driver
            .get_url()
            .await
            .unwrap_or_else(|err| panic!("url: {err}")),
        "tcp://192.168.0.11:2377"
    );
    assert_eq!(harness.cloud.calls().len(), calls_before);
}

#[rstest]
#[tokio::test]
async fn url_is_empty_before_create(harness: Harness) {
    let driver = harness.driver();
    assert_eq!(
        driver
            .get_url()
            .await
            .unwrap_or_else(|err| panic!("url: {err}")),
        ""
    );
    let err = driver.get_state().await.expect_err("nothing created");
    assert!(matches!(err, DriverError::NotCreated { .. }));
}

#[rstest]
#[tokio::test]
async fn remove_without_server_only_drops_record(harness: Harness) {
    harness
        .store()
        .save(&MachineRecord::new(MACHINE, ServerOptions::default()))
        .unwrap_or_else(|err| panic!("save: {err}"));
    let driver = harness.driver();

    let report = driver
        .remove()
        .await
        .unwrap_or_else(|err| panic!("remove: {err}"));

    assert!(!report.deleted);
    assert!(harness.cloud.calls().is_empty());
    assert!(
        harness
            .store()
            .load(MACHINE)
            .unwrap_or_else(|err| panic!("load: {err}"))
            .is_none()
    );
}
