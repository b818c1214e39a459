use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::write;
use tempfile::NamedTempFile;

#[test]
fn help_lists_import_subcommand() {
    let mut cmd = Command::cargo_bin("nuxeo-importer").expect("Binary exists");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("import").and(predicate::str::contains("--verbose")));
}

#[test]
fn import_fails_on_missing_config_file() {
    let mut cmd = Command::cargo_bin("nuxeo-importer").expect("Binary exists");
    cmd.arg("import")
        .arg("--config")
        .arg("/definitely/not/here.yaml")
        .env("NUXEO_PASSWORD", "unused");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config file"));
}

#[test]
fn import_fails_when_repository_is_unreachable() {
    let local = tempfile::tempdir().expect("temp dir");
    let config = NamedTempFile::new().expect("Creating temp config file failed");
    write(
        config.path(),
        format!(
            "connection:\n  base_url: \"http://127.0.0.1:9/nuxeo\"\n  username: Administrator\n  timeout_ms: 2000\nimport:\n  local_path: {}\n  remote_path: /default-domain/workspaces\n  max_concurrent_requests: 2\n",
            local.path().display()
        ),
    )
    .expect("Writing temp config failed");

    let mut cmd = Command::cargo_bin("nuxeo-importer").expect("Binary exists");
    cmd.arg("import")
        .arg("--config")
        .arg(config.path())
        .env("NUXEO_PASSWORD", "secret");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Cannot log in"));
}

use std::sync::{Arc, Mutex};
use tracing_subscriber::prelude::*; // needed for .with()
use tracing_subscriber::{layer::Context, Layer, Registry};

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        self.events.lock().unwrap().push(format!("{event:?}"));
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use nuxeo_importer::cli::{run, Cli, Commands};

    let cli = Cli {
        verbose: false,
        command: Commands::Import {
            config: std::path::PathBuf::from("dummy.yaml"),
        },
    };

    let result = run(cli).await;
    assert!(result.is_err(), "dummy.yaml does not exist");

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
