// tests/session_protocol.rs

use std::sync::Arc;
use std::time::Duration;

use daqctl::budget::SoftDeadline;
use daqctl::errors::DaqError;
use daqctl::remote::inspect::{DEFAULT_DATA_ROUTER_SIGNATURE, DEFAULT_ECC_SIGNATURE};
use daqctl::remote::{CommandOutput, ConnectTarget, ProcessSignatures, WorkerSession, WorkerSettings};
use daqctl::types::RunContext;
use daqctl_test_utils::fake_remote::{FakeConnector, HostScript, lsof_output};
use daqctl_test_utils::{init_tracing, with_timeout};

fn settings() -> Arc<WorkerSettings> {
    Arc::new(WorkerSettings {
        data_router_process: "dataRouter".into(),
        signatures: ProcessSignatures::new(DEFAULT_ECC_SIGNATURE, DEFAULT_DATA_ROUTER_SIGNATURE)
            .unwrap(),
        collected_extension: "graw".into(),
    })
}

async fn open(connector: &FakeConnector, host: &str) -> WorkerSession {
    WorkerSession::connect(
        connector,
        host,
        &ConnectTarget::new(host),
        settings(),
        SoftDeadline::starting_now(Duration::from_secs(30)),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn listing_keeps_remote_order_and_filters_extension() {
    init_tracing();
    let connector = FakeConnector::new();
    connector.script(
        "dr1",
        HostScript::new()
            .on("lsof ", lsof_output("dataRouter", "/data/stage"))
            .on(
                "ls -1 ",
                CommandOutput::ok("b.graw\nnotes.txt\na.graw\n"),
            ),
    );

    let files = with_timeout(async {
        let mut session = open(&connector, "dr1").await;
        let files = session.list_collected_files().await;
        session.finish(files).await
    })
    .await
    .unwrap();

    assert_eq!(files, vec!["/data/stage/b.graw", "/data/stage/a.graw"]);
    assert_eq!(
        connector.commands("dr1"),
        vec!["lsof -a -d cwd -c dataRouter -Fcn", "ls -1 /data/stage"]
    );
    assert_eq!(connector.closed("dr1"), 1);
}

#[tokio::test]
async fn empty_listing_means_clean_staging() {
    init_tracing();
    let connector = FakeConnector::new();
    connector.script("dr1", HostScript::data_router("/data/stage", &[]));

    let clean = with_timeout(async {
        let mut session = open(&connector, "dr1").await;
        let clean = session.is_staging_clean().await;
        session.finish(clean).await
    })
    .await
    .unwrap();
    assert!(clean);
}

#[tokio::test]
async fn unreadable_staging_is_an_error_not_a_clean_directory() {
    init_tracing();
    let connector = FakeConnector::new();
    connector.script(
        "dr1",
        HostScript::new()
            .on("lsof ", lsof_output("dataRouter", "/data/stage"))
            .on(
                "ls -1 ",
                CommandOutput::failed(2, "ls: cannot open directory '/data/stage': Permission denied"),
            ),
    );

    let err = with_timeout(async {
        let mut session = open(&connector, "dr1").await;
        let clean = session.is_staging_clean().await;
        session.finish(clean).await
    })
    .await
    .unwrap_err();

    match err {
        DaqError::RemoteCommand(msg) => assert!(msg.contains("Permission denied"), "{msg}"),
        other => panic!("expected remote command error, got {other:?}"),
    }
    assert_eq!(connector.closed("dr1"), 1);
}

#[tokio::test]
async fn unexpected_process_in_inspection_is_protocol_error() {
    init_tracing();
    let connector = FakeConnector::new();
    connector.script(
        "dr1",
        HostScript::new().on("lsof ", lsof_output("postgres", "/var/lib/pg")),
    );

    let err = with_timeout(async {
        let mut session = open(&connector, "dr1").await;
        let dir = session.locate_data_router_directory().await;
        session.finish(dir).await
    })
    .await
    .unwrap_err();

    match err {
        DaqError::Protocol(msg) => assert!(msg.contains("postgres"), "{msg}"),
        other => panic!("expected protocol error, got {other:?}"),
    }
}

#[tokio::test]
async fn no_inspection_output_is_protocol_error() {
    init_tracing();
    let connector = FakeConnector::new();
    connector.script("dr1", HostScript::new().on("lsof ", CommandOutput::failed(1, "")));

    let err = with_timeout(async {
        let mut session = open(&connector, "dr1").await;
        let run = RunContext::new("exp", 1);
        let organized = session.organize_files(&run).await;
        session.finish(organized).await
    })
    .await
    .unwrap_err();

    assert!(matches!(err, DaqError::Protocol(_)));
    // Nothing was created or moved.
    assert_eq!(connector.commands("dr1").len(), 1);
}

#[tokio::test]
async fn tail_returns_stdout_and_reports_failures() {
    init_tracing();
    let connector = FakeConnector::new();
    connector.script(
        "ecc1",
        HostScript::new()
            .on("tail -n 3 '/var/log/ecc server.log'", CommandOutput::ok("a\nb\nc\n"))
            .on(
                "tail -n 3 /missing",
                CommandOutput::failed(1, "tail: cannot open '/missing'"),
            ),
    );

    let (found, missing) = with_timeout(async {
        let mut session = open(&connector, "ecc1").await;
        let found = session.tail_file("/var/log/ecc server.log", 3).await;
        let missing = session.tail_file("/missing", 3).await;
        session.close().await;
        (found, missing)
    })
    .await;

    assert_eq!(found.unwrap(), "a\nb\nc\n");
    match missing.unwrap_err() {
        DaqError::RemoteCommand(msg) => {
            assert!(msg.contains("exit 1"), "{msg}");
            assert!(msg.contains("cannot open"), "{msg}");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn dropping_an_open_session_aborts_the_connection() {
    init_tracing();
    let connector = FakeConnector::new();
    connector.script("ecc1", HostScript::ecc());

    {
        let _session = with_timeout(open(&connector, "ecc1")).await;
    }

    assert_eq!(connector.aborted("ecc1"), 1);
    assert_eq!(connector.closed("ecc1"), 0);
    assert_eq!(connector.leaked("ecc1"), 0);
}
