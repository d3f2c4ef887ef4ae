// tests/config_loading.rs

use std::fs;
use std::time::Duration;

use daqctl::config::load_and_validate;
use daqctl::engine::Operation;
use daqctl::errors::DaqError;
use daqctl::registry::{FileRegistry, NodeRegistry};
use daqctl::types::NodeKind;
use tempfile::TempDir;

const FULL_CONFIG: &str = r#"
[registry]
path = "state/nodes.toml"

[ssh]
use_config = false

[ecc]
state_command = "eccctl state"
transition_command = "eccctl goto {target}"
ack_poll_interval = "250ms"

[finalize]
default_backup_root = "/data/config-backups"

[budgets.change_ecc_state]
soft = "90s"
hard = "2m"

[schedule]
check_routers_every = "30s"
"#;

const NODES: &str = r#"
[[ecc]]
id = "ecc1"
host = "ecc1.daq.lan"
config_paths = ["/opt/ecc/config.xml"]

[[data_router]]
id = "dr1"
host = "dr1.daq.lan"
username = "daq"
"#;

#[test]
fn relative_registry_path_is_resolved_against_config_dir() {
    let dir = TempDir::new().unwrap();
    let cfg_path = dir.path().join("Daqctl.toml");
    fs::write(&cfg_path, FULL_CONFIG).unwrap();

    let cfg = load_and_validate(&cfg_path).unwrap();

    assert_eq!(cfg.registry_path, dir.path().join("state/nodes.toml"));
    assert!(cfg.ssh.config_path.is_none());
    assert_eq!(cfg.ack_poll_interval, Duration::from_millis(250));
    assert_eq!(cfg.finalize.default_backup_root, "/data/config-backups");
    assert_eq!(
        cfg.operations.budget(Operation::ChangeEccState).hard,
        Duration::from_secs(120)
    );
    assert_eq!(
        cfg.operations.budget(Operation::TailFile),
        Operation::TailFile.default_budget()
    );
    assert_eq!(cfg.schedule.check_routers_every, Some(Duration::from_secs(30)));
    assert_eq!(cfg.schedule.check_ecc_every, None);
}

#[test]
fn absolute_registry_path_is_kept() {
    let dir = TempDir::new().unwrap();
    let registry = dir.path().join("elsewhere.toml");
    let cfg_path = dir.path().join("Daqctl.toml");
    fs::write(
        &cfg_path,
        format!("[registry]\npath = {:?}\n", registry.to_string_lossy()),
    )
    .unwrap();

    let cfg = load_and_validate(&cfg_path).unwrap();
    assert_eq!(cfg.registry_path, registry);
}

#[test]
fn loaded_registry_path_opens() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("state")).unwrap();
    fs::write(dir.path().join("state/nodes.toml"), NODES).unwrap();
    let cfg_path = dir.path().join("Daqctl.toml");
    fs::write(&cfg_path, FULL_CONFIG).unwrap();

    let cfg = load_and_validate(&cfg_path).unwrap();
    let registry = FileRegistry::open(&cfg.registry_path).unwrap();

    assert_eq!(registry.list_ids(NodeKind::Ecc).unwrap(), vec!["ecc1"]);
    let dr1 = registry.get("dr1").unwrap().into_data_router().unwrap();
    assert_eq!(dr1.endpoint.username.as_deref(), Some("daq"));
}

#[test]
fn missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let err = load_and_validate(dir.path().join("nope.toml")).unwrap_err();
    assert!(matches!(err, DaqError::IoError(_)), "{err:?}");
}

#[test]
fn malformed_toml_is_toml_error() {
    let dir = TempDir::new().unwrap();
    let cfg_path = dir.path().join("Daqctl.toml");
    fs::write(&cfg_path, "[ecc\nstate_command = 1").unwrap();
    let err = load_and_validate(&cfg_path).unwrap_err();
    assert!(matches!(err, DaqError::TomlError(_)), "{err:?}");
}

#[test]
fn semantic_errors_are_config_errors() {
    let dir = TempDir::new().unwrap();
    let cfg_path = dir.path().join("Daqctl.toml");
    fs::write(&cfg_path, "[states]\norder = [\"idle\", \"idle\"]\n").unwrap();
    let err = load_and_validate(&cfg_path).unwrap_err();
    assert!(matches!(err, DaqError::ConfigError(_)), "{err:?}");
}

#[test]
fn oversized_budgets_are_config_errors() {
    let dir = TempDir::new().unwrap();
    let cfg_path = dir.path().join("Daqctl.toml");
    for hard in ["18446744073709551615h", "48h"] {
        fs::write(
            &cfg_path,
            format!("[budgets.tail_file]\nsoft = \"1s\"\nhard = \"{hard}\"\n"),
        )
        .unwrap();
        let err = load_and_validate(&cfg_path).unwrap_err();
        match err {
            DaqError::ConfigError(msg) => assert!(msg.contains("budgets.tail_file"), "{msg}"),
            other => panic!("expected config error for {hard}, got {other:?}"),
        }
    }
}

#[test]
fn shipped_demo_config_and_registry_load() {
    let demo = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/Daqctl.toml");
    let cfg = load_and_validate(&demo).unwrap();
    assert_eq!(cfg.states.legal_targets("idle"), vec!["described", "error"]);

    let registry = FileRegistry::open(&cfg.registry_path).unwrap();
    assert_eq!(registry.list_ids(NodeKind::Ecc).unwrap(), vec!["ecc1", "ecc2"]);
    let dr2 = registry.get("dr2").unwrap().into_data_router().unwrap();
    assert_eq!(dr2.endpoint.port, Some(2222));
}
