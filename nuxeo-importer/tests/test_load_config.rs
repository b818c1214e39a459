use nuxeo_importer::load_config::{load_config, PASSWORD_ENV};
use nuxeo_importer_core::config::{FolderFailurePolicy, DEFAULT_ACE_PRINCIPAL};
use serial_test::serial;
use std::env;
use std::fs::write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

fn config_file(yaml: &str) -> NamedTempFile {
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), yaml).unwrap();
    config_file
}

/// A static config without secrets loads both sections and picks the password from the env.
#[test]
#[serial]
fn test_load_config_success() {
    let config_file = config_file(
        r#"
connection:
  base_url: "http://localhost:8080/nuxeo"
  username: Administrator
  timeout_ms: 30000
import:
  local_path: /srv/share/documents
  remote_path: /default-domain/workspaces/archive
  max_concurrent_requests: 8
  on_folder_failure: abort-run
  ace_principal: auditors
"#,
    );
    env::set_var(PASSWORD_ENV, "s3cret");

    let config = load_config(config_file.path()).expect("Config should load");

    assert_eq!(config.connection.base_url, "http://localhost:8080/nuxeo");
    assert_eq!(config.connection.username, "Administrator");
    assert_eq!(config.connection.password, "s3cret");
    assert_eq!(config.connection.timeout_ms, Some(30000));
    assert_eq!(config.import.local_path, PathBuf::from("/srv/share/documents"));
    assert_eq!(config.import.remote_path, "/default-domain/workspaces/archive");
    assert_eq!(config.import.max_concurrent_requests, 8);
    assert_eq!(config.import.on_folder_failure, FolderFailurePolicy::AbortRun);
    assert_eq!(config.import.ace_principal, "auditors");
    assert!(!format!("{:?}", config.connection).contains("s3cret"));
}

#[test]
#[serial]
fn test_load_config_defaults_and_relative_path() {
    let config_file = config_file(
        r#"
connection:
  base_url: "http://localhost:8080/nuxeo"
  username: Administrator
import:
  local_path: data/incoming
  remote_path: /default-domain/workspaces
  max_concurrent_requests: 1
"#,
    );
    env::set_var(PASSWORD_ENV, "s3cret");

    let config = load_config(config_file.path()).expect("Config should load");

    let cwd = env::current_dir().unwrap();
    assert_eq!(config.import.local_path, cwd.join("data/incoming"));
    assert_eq!(config.import.on_folder_failure, FolderFailurePolicy::SkipSubtree);
    assert_eq!(config.import.ace_principal, DEFAULT_ACE_PRINCIPAL);
    assert_eq!(config.connection.timeout_ms, None);
    assert!(!config.import.verbose);
}

#[test]
#[serial]
fn test_load_config_fails_without_password() {
    let config_file = config_file(
        r#"
connection:
  base_url: "http://localhost:8080/nuxeo"
  username: Administrator
import:
  local_path: /tmp
  remote_path: /default-domain
  max_concurrent_requests: 2
"#,
    );
    env::remove_var(PASSWORD_ENV);

    let err = load_config(config_file.path()).expect_err("Missing password must fail");
    assert!(err.to_string().contains(PASSWORD_ENV));
}

#[test]
#[serial]
fn test_load_config_rejects_zero_concurrency() {
    let config_file = config_file(
        r#"
connection:
  base_url: "http://localhost:8080/nuxeo"
  username: Administrator
import:
  local_path: /tmp
  remote_path: /default-domain
  max_concurrent_requests: 0
"#,
    );
    env::set_var(PASSWORD_ENV, "s3cret");

    let err = load_config(config_file.path()).expect_err("Zero concurrency must fail");
    assert!(err.to_string().contains("max_concurrent_requests"));
}

#[test]
#[serial]
fn test_load_config_rejects_relative_remote_path() {
    let config_file = config_file(
        r#"
connection:
  base_url: "http://localhost:8080/nuxeo"
  username: Administrator
import:
  local_path: /tmp
  remote_path: default-domain
  max_concurrent_requests: 2
"#,
    );
    env::set_var(PASSWORD_ENV, "s3cret");

    let err = load_config(config_file.path()).expect_err("Relative remote path must fail");
    assert!(err.to_string().contains("remote_path"));
}

#[test]
#[serial]
fn test_load_config_invalid_yaml() {
    let config_file = config_file("connection: [unterminated");
    env::set_var(PASSWORD_ENV, "s3cret");

    let err = load_config(config_file.path()).expect_err("Broken YAML must fail");
    assert!(err.to_string().contains("Failed to parse config YAML"));
}

#[test]
#[serial]
fn test_load_config_missing_file() {
    let err = load_config("/definitely/not/here.yaml").expect_err("Missing file must fail");
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
#[serial]
fn test_load_config_reads_verbose_flag() {
    let config_file = config_file(
        r#"
connection:
  base_url: "http://localhost:8080/nuxeo"
  username: Administrator
import:
  local_path: /tmp
  remote_path: /default-domain
  max_concurrent_requests: 2
  verbose: true
"#,
    );
    env::set_var(PASSWORD_ENV, "s3cret");

    let config = load_config(config_file.path()).expect("Config should load");
    assert!(config.import.verbose);
}
