// tests/daemon_beats.rs

use std::time::Duration;

use daqctl::config::Schedule;
use daqctl::daemon::run_daemon;
use daqctl::errors::DaqError;
use daqctl::registry::{NodeRecord, NodeRegistry};
use daqctl::types::Liveness;
use daqctl_test_utils::builders::{ConfigFileBuilder, EccNodeBuilder, Harness};
use daqctl_test_utils::fake_remote::HostScript;
use daqctl_test_utils::{init_tracing, with_timeout};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn beat_polls_until_cancelled() {
    init_tracing();
    let h = Harness::new(
        ConfigFileBuilder::new().build(),
        [EccNodeBuilder::new("ecc1").build()],
    );
    h.connector.script("ecc1", HostScript::ecc());

    let schedule = Schedule {
        check_ecc_every: Some(Duration::from_millis(50)),
        ..Schedule::default()
    };
    let cancel = CancellationToken::new();
    let daemon = tokio::spawn(run_daemon(h.controller.clone(), schedule, cancel.clone()));

    tokio::time::sleep(Duration::from_millis(180)).await;
    cancel.cancel();
    with_timeout(daemon).await.unwrap().unwrap();

    // Give the last detached batch a moment to finish its unit.
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(h.connector.connect_attempts("ecc1") >= 2);
    assert_eq!(h.registry.get("ecc1").unwrap().online(), Liveness::Online);
    // Only the enabled beat ran.
    assert!(h.connector.commands("ecc1").iter().all(|c| c == "ps -e"));

    let after_stop = h.connector.connect_attempts("ecc1");
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(h.connector.connect_attempts("ecc1"), after_stop);
}

#[tokio::test]
async fn empty_schedule_is_rejected() {
    init_tracing();
    let h = Harness::new(ConfigFileBuilder::new().build(), Vec::<NodeRecord>::new());
    let err = run_daemon(h.controller.clone(), Schedule::default(), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DaqError::ConfigError(_)));
}
