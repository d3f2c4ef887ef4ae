// tests/status_poller.rs

use daqctl::engine::UnitOutcome;
use daqctl::errors::DaqError;
use daqctl::registry::NodeRegistry;
use daqctl::remote::CommandOutput;
use daqctl::types::Liveness;
use daqctl_test_utils::builders::{ConfigFileBuilder, EccNodeBuilder, Harness, RouterNodeBuilder};
use daqctl_test_utils::fake_remote::{HostScript, lsof_output, ps_output};
use daqctl_test_utils::{init_tracing, with_timeout};

#[tokio::test]
async fn offline_router_skips_cleanliness_check() {
    init_tracing();
    let h = Harness::new(
        ConfigFileBuilder::new().build(),
        [RouterNodeBuilder::new("dr1")
            .online(Liveness::Online)
            .staging_clean(true)
            .build()],
    );
    h.connector
        .script("dr1", HostScript::new().on("ps -e", ps_output(&["sshd"])));

    let report = with_timeout(h.controller.check_data_router_status("dr1".into()).join()).await;
    assert!(report.outcome.is_success(), "{:?}", report.outcome);

    assert_eq!(h.connector.commands("dr1"), vec!["ps -e"]);
    let dr1 = h.registry.get("dr1").unwrap().into_data_router().unwrap();
    assert_eq!(dr1.online, Liveness::Offline);
    // Not re-checked, so the earlier result stands.
    assert_eq!(dr1.staging_clean, Some(true));
    assert_eq!(h.connector.closed("dr1"), 1);
}

#[tokio::test]
async fn online_router_reports_both_flags() {
    init_tracing();
    let h = Harness::new(
        ConfigFileBuilder::new().build(),
        [RouterNodeBuilder::new("dr1").build()],
    );
    h.connector
        .script("dr1", HostScript::data_router("/data/stage", &["a.graw"]));

    let report = with_timeout(h.controller.check_data_router_status("dr1".into()).join()).await;
    assert!(report.outcome.is_success());

    let dr1 = h.registry.get("dr1").unwrap().into_data_router().unwrap();
    assert_eq!(dr1.online, Liveness::Online);
    assert_eq!(dr1.staging_clean, Some(false));
}

#[tokio::test]
async fn connection_failure_leaves_online_untouched() {
    init_tracing();
    let h = Harness::new(
        ConfigFileBuilder::new().build(),
        [
            EccNodeBuilder::new("ecc1").online(Liveness::Online).build(),
            RouterNodeBuilder::new("dr1").online(Liveness::Offline).build(),
        ],
    );
    h.connector.refuse("ecc1").refuse("dr1");

    let ecc = with_timeout(h.controller.check_ecc_online("ecc1".into()).join()).await;
    let dr = with_timeout(h.controller.check_data_router_status("dr1".into()).join()).await;
    assert!(matches!(ecc.outcome, UnitOutcome::Failed(DaqError::Connection(_))));
    assert!(matches!(dr.outcome, UnitOutcome::Failed(DaqError::Connection(_))));

    let ecc1 = h.registry.get("ecc1").unwrap();
    assert_eq!(ecc1.online(), Liveness::Online);
    assert!(ecc1.last_error().unwrap().contains("Connection"));

    let dr1 = h.registry.get("dr1").unwrap();
    assert_eq!(dr1.online(), Liveness::Offline);
    assert!(dr1.last_error().is_some());
}

#[tokio::test]
async fn ecc_without_server_process_is_marked_offline() {
    init_tracing();
    let h = Harness::new(
        ConfigFileBuilder::new().build(),
        [EccNodeBuilder::new("ecc1").online(Liveness::Online).build()],
    );
    h.connector
        .script("ecc1", HostScript::new().on("ps -e", ps_output(&["dataRouter"])));

    let report = with_timeout(h.controller.check_ecc_online("ecc1".into()).join()).await;
    assert!(report.outcome.is_success());
    assert_eq!(h.registry.get("ecc1").unwrap().online(), Liveness::Offline);
}

#[tokio::test]
async fn successful_poll_clears_previous_diagnostic() {
    init_tracing();
    let h = Harness::new(
        ConfigFileBuilder::new().build(),
        [EccNodeBuilder::new("ecc1").build()],
    );
    h.connector.refuse("ecc1");
    with_timeout(h.controller.check_ecc_online("ecc1".into()).join()).await;
    assert!(h.registry.get("ecc1").unwrap().last_error().is_some());

    h.connector.script("ecc1", HostScript::ecc());
    let report = with_timeout(h.controller.check_ecc_online("ecc1".into()).join()).await;
    assert!(report.outcome.is_success());

    let ecc1 = h.registry.get("ecc1").unwrap();
    assert_eq!(ecc1.online(), Liveness::Online);
    assert_eq!(ecc1.last_error(), None);
}

#[tokio::test]
async fn garbled_inspection_output_is_protocol_error() {
    init_tracing();
    let h = Harness::new(
        ConfigFileBuilder::new().build(),
        [RouterNodeBuilder::new("dr1").build()],
    );
    h.connector.script(
        "dr1",
        HostScript::new()
            .on("ps -e", ps_output(&["dataRouter"]))
            .on("lsof ", CommandOutput::ok("p1\ncbash\nn/home/daq\n")),
    );

    let report = with_timeout(h.controller.check_data_router_status("dr1".into()).join()).await;
    assert!(matches!(report.outcome, UnitOutcome::Failed(DaqError::Protocol(_))));

    let dr1 = h.registry.get("dr1").unwrap().into_data_router().unwrap();
    // The liveness half of the poll completed.
    assert_eq!(dr1.online, Liveness::Online);
    assert_eq!(dr1.staging_clean, None);
    assert!(dr1.last_error.unwrap().contains("bash"));
    assert_eq!(h.connector.closed("dr1"), 1);
}

#[tokio::test]
async fn unreadable_staging_is_not_reported_clean() {
    init_tracing();
    let h = Harness::new(
        ConfigFileBuilder::new().build(),
        [RouterNodeBuilder::new("dr1").staging_clean(false).build()],
    );
    h.connector.script(
        "dr1",
        HostScript::new()
            .on("ps -e", ps_output(&["dataRouter"]))
            .on("lsof ", lsof_output("dataRouter", "/data/stage"))
            .on(
                "ls -1 ",
                CommandOutput::failed(2, "ls: cannot open directory '/data/stage': Permission denied"),
            ),
    );

    let report = with_timeout(h.controller.check_data_router_status("dr1".into()).join()).await;
    assert!(
        matches!(report.outcome, UnitOutcome::Failed(DaqError::RemoteCommand(_))),
        "{:?}",
        report.outcome
    );

    let dr1 = h.registry.get("dr1").unwrap().into_data_router().unwrap();
    assert_eq!(dr1.online, Liveness::Online);
    assert_eq!(dr1.staging_clean, Some(false));
    assert!(dr1.last_error.unwrap().contains("Permission denied"));
}
