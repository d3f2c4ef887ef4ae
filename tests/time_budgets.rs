// tests/time_budgets.rs

use std::sync::Arc;
use std::time::Duration;

use daqctl::budget::Budget;
use daqctl::engine::{FanoutScheduler, Operation, OperationTable, UnitOutcome};
use daqctl::errors::Result;
use daqctl::registry::{MemoryRegistry, NodeRecord, NodeRegistry, NodeUpdate};
use daqctl::remote::{ConnectTarget, WorkerSession, WorkerSettings};
use daqctl::remote::inspect::{DEFAULT_DATA_ROUTER_SIGNATURE, DEFAULT_ECC_SIGNATURE, ProcessSignatures};
use daqctl::types::{Liveness, NodeId, NodeKind};
use daqctl_test_utils::builders::{ConfigFileBuilder, EccNodeBuilder, Harness};
use daqctl_test_utils::fake_remote::{FakeConnector, HostScript};
use daqctl_test_utils::init_tracing;

fn worker_settings() -> Arc<WorkerSettings> {
    Arc::new(WorkerSettings {
        data_router_process: "dataRouter".into(),
        signatures: ProcessSignatures::new(DEFAULT_ECC_SIGNATURE, DEFAULT_DATA_ROUTER_SIGNATURE)
            .unwrap(),
        collected_extension: "graw".into(),
    })
}

#[tokio::test(start_paused = true)]
async fn soft_timeout_closes_the_session() {
    init_tracing();
    let h = Harness::new(
        ConfigFileBuilder::new().build(),
        [EccNodeBuilder::new("ecc1").online(Liveness::Online).build()],
    );
    h.connector.script("ecc1", HostScript::new().hang_on("ps -e"));

    let report = h.controller.check_ecc_online("ecc1".into()).join().await;

    assert!(matches!(report.outcome, UnitOutcome::TimedOut { hard: false }));
    assert!(report.elapsed >= Duration::from_secs(10));
    assert!(report.elapsed < Duration::from_secs(40));
    assert_eq!(h.connector.closed("ecc1"), 1);
    assert_eq!(h.connector.leaked("ecc1"), 0);
    assert_eq!(h.registry.get("ecc1").unwrap().online(), Liveness::Online);
}

#[tokio::test(start_paused = true)]
async fn connect_that_never_completes_is_bounded() {
    init_tracing();
    let h = Harness::new(
        ConfigFileBuilder::new().build(),
        [EccNodeBuilder::new("ecc1").build()],
    );
    h.connector.hang_on_connect("ecc1");

    let report = h.controller.refresh_ecc_state("ecc1".into()).join().await;
    assert!(matches!(report.outcome, UnitOutcome::TimedOut { hard: false }));
}

#[tokio::test(start_paused = true)]
async fn hard_timeout_drops_unit_and_aborts_its_connection() {
    init_tracing();
    let h = Harness::new(
        ConfigFileBuilder::new().build(),
        [
            EccNodeBuilder::new("ecc1").build(),
            EccNodeBuilder::new("ecc2").build(),
            EccNodeBuilder::new("ecc3").build(),
        ],
    );
    for host in ["ecc1", "ecc2", "ecc3"] {
        h.connector.script(host, HostScript::ecc());
    }

    let operations = OperationTable::with_overrides([("check_ecc_online", Budget::secs(1, 3))])
        .unwrap();
    let scheduler = FanoutScheduler::new(Arc::new(h.registry.clone()), Arc::new(operations));
    let connector = h.connector.clone();
    let registry = h.registry.clone();

    // A unit that ignores its soft deadline: ecc2 holds its session forever.
    let batch = scheduler
        .dispatch(Operation::CheckAllEccOnline, move |id, deadline| {
            let connector = connector.clone();
            let registry = registry.clone();
            async move {
                let session = WorkerSession::connect(
                    &connector,
                    &id,
                    &ConnectTarget::new(id.clone()),
                    worker_settings(),
                    deadline,
                )
                .await?;
                if id == "ecc2" {
                    std::future::pending::<()>().await;
                }
                registry.update(&id, &NodeUpdate::new().online(Liveness::Online))?;
                session.close().await;
                Ok(())
            }
        })
        .await
        .unwrap();

    let report = batch.join().await;

    assert!(matches!(
        report.unit("ecc2").unwrap().outcome,
        UnitOutcome::TimedOut { hard: true }
    ));
    assert!(report.unit("ecc1").unwrap().outcome.is_success());
    assert!(report.unit("ecc3").unwrap().outcome.is_success());

    // Dropping the unit dropped its session, which aborted the connection.
    assert_eq!(h.connector.aborted("ecc2"), 1);
    assert_eq!(h.connector.leaked("ecc2"), 0);

    assert_eq!(h.registry.get("ecc1").unwrap().online(), Liveness::Online);
    assert_eq!(h.registry.get("ecc2").unwrap().online(), Liveness::Unknown);
    assert_eq!(h.registry.get("ecc3").unwrap().online(), Liveness::Online);
}

/// A registry whose reads stall, like a store on a hung network mount.
#[derive(Debug)]
struct StalledRegistry {
    inner: MemoryRegistry,
    stall: Duration,
}

impl NodeRegistry for StalledRegistry {
    fn get(&self, id: &str) -> Result<NodeRecord> {
        std::thread::sleep(self.stall);
        self.inner.get(id)
    }

    fn list(&self, kind: NodeKind) -> Result<Vec<NodeRecord>> {
        self.inner.list(kind)
    }

    fn update(&self, id: &str, update: &NodeUpdate) -> Result<()> {
        self.inner.update(id, update)
    }

    fn list_ids(&self, kind: NodeKind) -> Result<Vec<NodeId>> {
        self.inner.list_ids(kind)
    }
}

#[tokio::test]
async fn stalled_registry_read_is_cut_off_by_hard_budget() {
    init_tracing();
    let cfg = ConfigFileBuilder::new()
        .with_budget("check_ecc_online", "50ms", "100ms")
        .build();
    let registry = StalledRegistry {
        inner: MemoryRegistry::with_nodes([EccNodeBuilder::new("ecc1").build()]),
        stall: Duration::from_secs(1),
    };
    let connector = FakeConnector::new();
    connector.script("ecc1", HostScript::ecc());
    let controller =
        daqctl::build_controller(&cfg, Arc::new(registry), Arc::new(connector.clone()));

    let started = std::time::Instant::now();
    let report = controller.check_ecc_online("ecc1".into()).join().await;

    assert!(
        matches!(report.outcome, UnitOutcome::TimedOut { hard: true }),
        "{:?}",
        report.outcome
    );
    assert!(started.elapsed() < Duration::from_millis(900));
    assert_eq!(connector.total_connect_attempts(), 0);
}
