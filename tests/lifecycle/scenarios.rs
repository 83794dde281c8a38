//! End-to-end lifecycle scenarios.

use std::net::{IpAddr, Ipv4Addr};

use rstest::rstest;
use sacloud_machine::driver::flags::names;
use sacloud_machine::test_support::{Call, Op};
use sacloud_machine::{
    DriverError, FlagMap, FlagValue, InstanceState, ProvisionError, ProvisionStep,
    ValidationError, WaitError, cancel_pair,
};

use super::test_helpers::{MACHINE, World, world};

fn text(value: &str) -> FlagValue {
    FlagValue::Text(value.to_owned())
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn default_machine_boots_reboots_and_cleans_its_note(world: World) {
    let report = world
        .create(&FlagMap::new())
        .await
        .unwrap_or_else(|err| panic!("create: {err}"));

    assert_eq!(world.cloud.count(Op::CreateServer), 1);
    assert_eq!(world.cloud.count(Op::CreateDisk), 1);
    let disk = world.cloud.calls().into_iter().find_map(|call| match call {
        Call::CreateDisk(spec) => Some(spec),
        _ => None,
    });
    assert_eq!(disk.map(|spec| spec.size_mb), Some(20 * 1024));

    let notes: Vec<String> = world
        .cloud
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            Call::CreateNote { content, .. } => Some(content),
            _ => None,
        })
        .collect();
    assert_eq!(notes.len(), 1);
    assert!(notes.iter().all(|note| note.contains("NOPASSWD")));

    assert_eq!(world.cloud.count(Op::PowerOn), 2, "boot plus reboot");
    assert_eq!(report.notes_created, report.notes_deleted);
    assert!(world.cloud.live_notes().is_empty());
    assert_eq!(
        report.ip,
        Some(IpAddr::V4(Ipv4Addr::new(203, 0, 113, 10)))
    );
}

#[rstest]
#[tokio::test]
async fn switch_without_private_ip_fails_before_any_provider_call(world: World) {
    let flags = FlagMap::new().with(names::CONNECTED_SWITCH, text("112900000001"));

    let err = world.create(&flags).await.expect_err("validation fails");

    assert!(matches!(
        err,
        DriverError::Validation(ValidationError::MissingPrivateIp { .. })
    ));
    assert!(world.cloud.calls().is_empty());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn unknown_packet_filter_leaves_resources_behind(world: World) {
    let flags = FlagMap::new().with(names::PACKET_FILTER, text("web-only"));

    let err = world.create(&flags).await.expect_err("filter is missing");

    let DriverError::Provision(ref failure) = err else {
        panic!("expected provisioning failure, got {err}");
    };
    assert_eq!(failure.step(), ProvisionStep::PacketFilters);
    assert!(matches!(
        failure,
        ProvisionError::PacketFilterNotFound { reference, .. } if reference == "web-only"
    ));
    assert_eq!(world.cloud.count(Op::ConfigureDisk), 1);
    assert_eq!(world.cloud.live_servers().len(), 1);

    let record = world
        .store()
        .load(MACHINE)
        .unwrap_or_else(|err| panic!("load: {err}"))
        .unwrap_or_else(|| panic!("record should be saved after a failed create"));
    assert!(record.instance.server_id().is_some());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn state_queries_are_stable(world: World) {
    world
        .create(&FlagMap::new())
        .await
        .unwrap_or_else(|err| panic!("create: {err}"));
    let driver = world.driver();

    let first = driver
        .get_state()
        .await
        .unwrap_or_else(|err| panic!("state: {err}"));
    let second = driver
        .get_state()
        .await
        .unwrap_or_else(|err| panic!("state: {err}"));

    assert_eq!(first, InstanceState::Running);
    assert_eq!(first, second);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn records_are_registered_and_removed_with_the_machine(world: World) {
    let flags = FlagMap::new()
        .with(names::DNS_ZONE, text("example.com"))
        .with(names::GSLB, text("web"));
    let report = world
        .create(&flags)
        .await
        .unwrap_or_else(|err| panic!("create: {err}"));
    assert!(report.gslb_fqdn.is_some());
    assert_eq!(world.cloud.dns_records().len(), 1);
    assert_eq!(world.cloud.gslb_members().len(), 1);

    let ops = world.cloud.ops();
    let registered = ops
        .iter()
        .position(|op| *op == Op::UpsertDns)
        .unwrap_or_else(|| panic!("dns record was never registered"));
    let last_power_on = ops
        .iter()
        .rposition(|op| *op == Op::PowerOn)
        .unwrap_or_else(|| panic!("server was never started"));
    assert!(registered > last_power_on, "records follow the final boot");

    let removal = world
        .driver()
        .remove()
        .await
        .unwrap_or_else(|err| panic!("remove: {err}"));

    assert!(removal.deleted);
    assert!(removal.warnings.is_empty());
    assert!(world.cloud.dns_records().is_empty());
    assert!(world.cloud.gslb_members().is_empty());
    assert!(world.cloud.live_servers().is_empty());
    assert!(
        world
            .store()
            .load(MACHINE)
            .unwrap_or_else(|err| panic!("load: {err}"))
            .is_none()
    );
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn cleanup_on_failure_removes_partial_resources(world: World) {
    world.cloud.fail_always(Op::PowerOn, "host maintenance");
    let flags = FlagMap::new().with(names::CLEANUP_ON_FAILURE, FlagValue::Bool(true));

    let err = world.create(&flags).await.expect_err("power on fails");

    assert!(matches!(
        err,
        DriverError::Provision(ProvisionError::CleanedUp { .. })
    ));
    assert!(err.to_string().contains("host maintenance"));
    assert!(world.cloud.live_servers().is_empty());
    assert!(world.cloud.live_notes().is_empty());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn machine_can_be_removed_and_recreated_after_cleanup(world: World) {
    world.cloud.fail_once(Op::PowerOn, "host maintenance");
    let flags = FlagMap::new().with(names::CLEANUP_ON_FAILURE, FlagValue::Bool(true));

    let err = world.create(&flags).await.expect_err("power on fails");
    assert!(matches!(
        err,
        DriverError::Provision(ProvisionError::CleanedUp { .. })
    ));
    let record = world
        .store()
        .load(MACHINE)
        .unwrap_or_else(|err| panic!("load: {err}"))
        .unwrap_or_else(|| panic!("record should be saved after a failed create"));
    assert!(record.instance.server_id().is_none());
    assert!(record.instance.disk_id().is_none());

    world
        .create(&flags)
        .await
        .unwrap_or_else(|err| panic!("second create: {err}"));
    assert_eq!(world.cloud.live_servers().len(), 1);

    world
        .driver()
        .remove()
        .await
        .unwrap_or_else(|err| panic!("remove: {err}"));
    assert!(world.cloud.live_servers().is_empty());
    assert!(
        world
            .store()
            .load(MACHINE)
            .unwrap_or_else(|err| panic!("load: {err}"))
            .is_none()
    );
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn remove_after_cleanup_only_drops_the_record(world: World) {
    world.cloud.fail_always(Op::PowerOn, "host maintenance");
    let flags = FlagMap::new().with(names::CLEANUP_ON_FAILURE, FlagValue::Bool(true));
    world.create(&flags).await.expect_err("power on fails");
    let deletes = world.cloud.count(Op::DeleteServer);

    let removal = world
        .driver()
        .remove()
        .await
        .unwrap_or_else(|err| panic!("remove: {err}"));

    assert!(!removal.deleted);
    assert_eq!(world.cloud.count(Op::DeleteServer), deletes);
    assert!(
        world
            .store()
            .load(MACHINE)
            .unwrap_or_else(|err| panic!("load: {err}"))
            .is_none()
    );
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn cancellation_stops_the_first_wait(world: World) {
    world.pregenerate_key();
    let (canceller, cancel) = cancel_pair();
    let mut driver = world.driver_with(cancel);
    driver
        .set_config_from_flags(&FlagMap::new())
        .await
        .unwrap_or_else(|err| panic!("flags: {err}"));
    canceller.cancel();

    let err = driver.create().await.expect_err("cancelled");

    let DriverError::Provision(ProvisionError::Wait { step, source }) = err else {
        panic!("expected a cancelled wait");
    };
    assert_eq!(step, ProvisionStep::CreateDisk);
    assert!(matches!(source, WaitError::Cancelled { .. }));
    assert_eq!(world.cloud.count(Op::AttachDisk), 0);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn stop_start_and_kill_follow_power_state(world: World) {
    world
        .create(&FlagMap::new())
        .await
        .unwrap_or_else(|err| panic!("create: {err}"));
    let driver = world.driver();

    driver
        .stop()
        .await
        .unwrap_or_else(|err| panic!("stop: {err}"));
    assert_eq!(
        driver
            .get_state()
            .await
            .unwrap_or_else(|err| panic!("state: {err}")),
        InstanceState::Stopped
    );

    driver
        .start()
        .await
        .unwrap_or_else(|err| panic!("start: {err}"));
    driver
        .kill()
        .await
        .unwrap_or_else(|err| panic!("kill: {err}"));
    assert_eq!(
        driver
            .get_state()
            .await
            .unwrap_or_else(|err| panic!("state: {err}")),
        InstanceState::Stopped
    );
}
