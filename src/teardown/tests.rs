//! Tests for removal and forced termination.

use std::net::Ipv4Addr;

use rstest::{fixture, rstest};
use tokio::time::Instant;

use super::*;
use crate::server_config::ServerOptions;
use crate::test_support::{Call, FakeCloud, Op};
use crate::wait::{CancelToken, cancel_pair};

const SERVER: &str = "113000000007";
const ADDRESS: IpAddr = IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7));

#[fixture]
fn waiter() -> StateWaiter {
    StateWaiter::new(
        Duration::from_secs(5),
        Duration::from_secs(120),
        CancelToken::never(),
    )
}

fn seeded_cloud() -> FakeCloud {
    let cloud = FakeCloud::new();
    cloud.seed_server(SERVER, "up", Some(ADDRESS));
    cloud
}

fn created_instance() -> Instance {
    let mut instance = Instance::new();
    instance
        .assign_server(ServerId::from(SERVER))
        .expect("server id is unset");
    instance
        .assign_disk(DiskId::from("112000000007"))
        .expect("disk id is unset");
    instance.set_ip(ADDRESS);
    instance
}

async fn config_with_records(cloud: &FakeCloud) -> ServerConfig {
    let options = ServerOptions {
        dns_zone: "example.com".to_owned(),
        gslb: "web".to_owned(),
        ..ServerOptions::default()
    };
    ServerConfig::validate(&options, "web-7", cloud)
        .await
        .expect("options should validate")
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn remove_deregisters_then_stops_then_deletes(waiter: StateWaiter) {
    let cloud = seeded_cloud();
    let config = config_with_records(&cloud).await;
    let instance = created_instance();
    let started = Instant::now();

    let report = Teardown::new(&cloud, waiter, DEFAULT_GSLB_SETTLE_DELAY)
        .remove(Some(&config), &instance)
        .await
        .expect("removal succeeds");

    assert!(report.deleted);
    assert!(report.warnings.is_empty());
    assert!(started.elapsed() >= DEFAULT_GSLB_SETTLE_DELAY);
    let ops: Vec<Op> = cloud
        .ops()
        .into_iter()
        .filter(|op| *op != Op::ReadServer && *op != Op::ValidatePlan)
        .collect();
    assert_eq!(
        ops,
        vec![Op::DeleteDns, Op::DeleteGslb, Op::PowerOff, Op::DeleteServer]
    );
    assert!(cloud.calls().contains(&Call::DeleteServer(
        ServerId::from(SERVER),
        vec![DiskId::from("112000000007")],
    )));
    assert!(cloud.live_servers().is_empty());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn record_and_power_failures_are_warnings(waiter: StateWaiter) {
    let cloud = seeded_cloud();
    let config = config_with_records(&cloud).await;
    cloud.fail_always(Op::DeleteDns, "zone locked");
    cloud.fail_always(Op::PowerOff, "busy");

    let report = Teardown::new(&cloud, waiter, DEFAULT_GSLB_SETTLE_DELAY)
        .remove(Some(&config), &created_instance())
        .await
        .expect("deletion still happens");

    assert!(report.deleted);
    assert_eq!(report.warnings.len(), 2);
    assert!(report.warnings.iter().any(|w| w.contains("zone locked")));
    assert!(report.warnings.iter().any(|w| w.contains("busy")));
    assert!(cloud.live_servers().is_empty());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn failed_delete_is_fatal(waiter: StateWaiter) {
    let cloud = seeded_cloud();
    cloud.fail_always(Op::DeleteServer, "locked");

    let err = Teardown::new(&cloud, waiter, DEFAULT_GSLB_SETTLE_DELAY)
        .remove(None, &created_instance())
        .await
        .expect_err("delete fails");

    assert!(matches!(err, TeardownError::Delete { .. }));
    assert_eq!(cloud.live_servers().len(), 1);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn server_already_deleted_upstream_is_not_an_error(waiter: StateWaiter) {
    let cloud = FakeCloud::new();

    let report = Teardown::new(&cloud, waiter, DEFAULT_GSLB_SETTLE_DELAY)
        .remove(None, &created_instance())
        .await
        .expect("a missing server is already removed");

    assert!(!report.deleted);
    assert!(report.warnings.iter().any(|w| w.contains("already gone")));
    assert_eq!(cloud.count(Op::DeleteServer), 1);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn records_are_removed_when_the_address_was_never_recorded(waiter: StateWaiter) {
    let cloud = seeded_cloud();
    let config = config_with_records(&cloud).await;
    cloud
        .upsert_dns_record(&DnsRecord {
            zone: "example.com".to_owned(),
            host_name: config.host_name().to_owned(),
            ip: ADDRESS,
        })
        .await
        .expect("dns record registered");
    cloud
        .upsert_gslb_record(&GslbRecord {
            group: "web".to_owned(),
            ip: ADDRESS,
        })
        .await
        .expect("gslb member registered");
    let mut instance = Instance::new();
    instance
        .assign_server(ServerId::from(SERVER))
        .expect("server id is unset");

    let report = Teardown::new(&cloud, waiter, DEFAULT_GSLB_SETTLE_DELAY)
        .remove(Some(&config), &instance)
        .await
        .expect("removal succeeds");

    assert!(report.deleted);
    assert!(report.warnings.is_empty());
    assert!(cloud.dns_records().is_empty());
    assert!(cloud.gslb_members().is_empty());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn unresolvable_address_skips_records_but_still_deletes(waiter: StateWaiter) {
    let cloud = FakeCloud::new();
    cloud.seed_server(SERVER, "up", None);
    let config = config_with_records(&cloud).await;
    let mut instance = Instance::new();
    instance
        .assign_server(ServerId::from(SERVER))
        .expect("server id is unset");

    let report = Teardown::new(&cloud, waiter, DEFAULT_GSLB_SETTLE_DELAY)
        .remove(Some(&config), &instance)
        .await
        .expect("removal succeeds");

    assert!(report.deleted);
    assert!(report.warnings.iter().any(|w| w.contains("no address")));
    assert_eq!(cloud.count(Op::DeleteDns), 0);
}

#[rstest]
#[tokio::test]
async fn remove_without_server_makes_no_calls(waiter: StateWaiter) {
    let cloud = FakeCloud::new();

    let report = Teardown::new(&cloud, waiter, DEFAULT_GSLB_SETTLE_DELAY)
        .remove(None, &Instance::new())
        .await
        .expect("nothing to do");

    assert!(!report.deleted);
    assert!(cloud.calls().is_empty());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn cancellation_during_settle_delay_aborts_removal() {
    let cloud = seeded_cloud();
    let config = config_with_records(&cloud).await;
    let (canceller, cancel) = cancel_pair();
    canceller.cancel();
    let waiter = StateWaiter::new(Duration::from_secs(5), Duration::from_secs(120), cancel);

    let err = Teardown::new(&cloud, waiter, DEFAULT_GSLB_SETTLE_DELAY)
        .remove(Some(&config), &created_instance())
        .await
        .expect_err("cancelled");

    assert!(matches!(err, TeardownError::Wait(WaitError::Cancelled { .. })));
    assert_eq!(cloud.count(Op::DeleteServer), 0);
}

#[rstest]
#[tokio::test]
async fn kill_forces_power_off_without_waiting(waiter: StateWaiter) {
    let cloud = seeded_cloud();

    Teardown::new(&cloud, waiter, DEFAULT_GSLB_SETTLE_DELAY)
        .kill(&ServerId::from(SERVER))
        .await
        .expect("kill succeeds");

    assert_eq!(
        cloud.calls(),
        vec![Call::PowerOff(ServerId::from(SERVER), PowerOffMode::Forced)]
    );
    assert_eq!(
        cloud.server_status(&ServerId::from(SERVER)).as_deref(),
        Some("down")
    );
}
