//! Tests for machine record persistence.

use std::net::{IpAddr, Ipv4Addr};

use rstest::{fixture, rstest};
use tempfile::TempDir;

use super::*;
use crate::types::{DiskId, ServerId};

struct StoreFixture {
    _tmp: TempDir,
    store: MachineStore,
}

#[fixture]
fn store_fixture() -> StoreFixture {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf())
        .unwrap_or_else(|err| panic!("temp path should be utf8: {}", err.display()));
    StoreFixture {
        _tmp: tmp,
        store: MachineStore::new(root),
    }
}

#[rstest]
fn unknown_machine_loads_as_none(store_fixture: StoreFixture) {
    let loaded = store_fixture
        .store
        .load("ghost")
        .unwrap_or_else(|err| panic!("load: {err}"));
    assert!(loaded.is_none());
}

#[rstest]
fn saved_record_round_trips_with_instance_ids(store_fixture: StoreFixture) {
    let StoreFixture { store, .. } = store_fixture;
    let mut record = MachineRecord::new("web-1", ServerOptions::default());
    record
        .instance
        .assign_server(ServerId::from("113000000001"))
        .unwrap_or_else(|err| panic!("assign server: {err}"));
    record
        .instance
        .assign_disk(DiskId::from("112000000001"))
        .unwrap_or_else(|err| panic!("assign disk: {err}"));
    record
        .instance
        .set_ip(IpAddr::V4(Ipv4Addr::new(203, 0, 113, 10)));

    let path = store
        .save(&record)
        .unwrap_or_else(|err| panic!("save: {err}"));
    assert!(path.ends_with("machines/web-1/machine.json"));

    let loaded = store
        .load("web-1")
        .unwrap_or_else(|err| panic!("load: {err}"))
        .unwrap_or_else(|| panic!("record should exist"));
    assert_eq!(loaded, record);
}

#[rstest]
fn delete_removes_directory_and_tolerates_missing(store_fixture: StoreFixture) {
    let StoreFixture { store, .. } = store_fixture;
    store
        .save(&MachineRecord::new("web-1", ServerOptions::default()))
        .unwrap_or_else(|err| panic!("save: {err}"));

    store
        .delete("web-1")
        .unwrap_or_else(|err| panic!("delete: {err}"));
    assert!(
        store
            .load("web-1")
            .unwrap_or_else(|err| panic!("load: {err}"))
            .is_none()
    );
    store
        .delete("web-1")
        .unwrap_or_else(|err| panic!("second delete: {err}"));
}

#[rstest]
#[case("")]
#[case("..")]
#[case("a/b")]
#[case("web 1")]
fn names_must_be_single_path_components(store_fixture: StoreFixture, #[case] name: &str) {
    let err = store_fixture
        .store
        .machine_dir(name)
        .expect_err("name should be rejected");
    assert!(matches!(err, MachineStoreError::InvalidName { .. }));
}

#[rstest]
fn corrupt_record_is_a_parse_error(store_fixture: StoreFixture) {
    let StoreFixture { store, .. } = store_fixture;
    let dir = store
        .ensure_machine_dir("web-1")
        .unwrap_or_else(|err| panic!("mkdir: {err}"));
    std::fs::write(dir.join("machine.json"), "{not json")
        .unwrap_or_else(|err| panic!("write: {err}"));

    let err = store.load("web-1").expect_err("corrupt record should fail");
    assert!(matches!(err, MachineStoreError::Parse { .. }));
}

#[rstest]
fn private_key_lives_in_machine_dir(store_fixture: StoreFixture) {
    let key = store_fixture
        .store
        .private_key_path("web-1")
        .unwrap_or_else(|err| panic!("key path: {err}"));
    assert!(key.ends_with("machines/web-1/id_rsa"));
}
