#![allow(missing_docs)]

use std::fs;
use std::path::Path;
use std::time::Duration;

use scribe_client::{
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SERVER_URL, SERVER_URL_ENV, STORE_PATH_ENV,
    load_settings_from_paths,
};
use scribe_jobs::{DEFAULT_HISTORY_LIMIT, DEFAULT_SLOT, EarlyCompletion};
use tempfile::TempDir;

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

#[test]
fn user_settings_override_system_settings() {
    let tmp = TempDir::new().unwrap();
    let system = tmp.path().join("packages/conf/settings.yaml");
    let user = tmp.path().join(".config/scribe/settings.yaml");
    write_file(
        &system,
        r"
server:
  base_url: http://transcriber.internal:8000
  request_timeout_secs: 120
storage:
  slot: jobs
live:
  early_completion: adopt
  history_limit: 20
",
    );
    write_file(
        &user,
        r"
server:
  base_url: https://scribe.example.com
live:
  early_completion: await_completion
",
    );

    let settings = load_settings_from_paths(&system, &user);
    assert_eq!(settings.base_url(), "https://scribe.example.com");
    assert_eq!(settings.request_timeout(), Duration::from_secs(120));
    assert_eq!(settings.slot(), "jobs");
    assert_eq!(settings.history_limit(), 20);
    assert_eq!(
        settings.dispatch_policy().early_completion,
        EarlyCompletion::AwaitCompletion
    );
}

#[test]
fn missing_files_fall_back_to_defaults() {
    let tmp = TempDir::new().unwrap();
    let settings = load_settings_from_paths(
        &tmp.path().join("missing-system.yaml"),
        &tmp.path().join("missing-user.yaml"),
    );
    assert_eq!(settings.base_url(), DEFAULT_SERVER_URL);
    assert_eq!(
        settings.request_timeout(),
        Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
    );
    assert_eq!(settings.slot(), DEFAULT_SLOT);
    assert_eq!(settings.history_limit(), DEFAULT_HISTORY_LIMIT);
    assert_eq!(
        settings.dispatch_policy().early_completion,
        EarlyCompletion::Adopt
    );
}

#[test]
fn invalid_user_yaml_is_ignored() {
    let tmp = TempDir::new().unwrap();
    let system = tmp.path().join("system.yaml");
    let user = tmp.path().join("user.yaml");
    write_file(&system, "server:\n  base_url: http://system:9000\n");
    write_file(&user, "server: [unclosed\n");

    let settings = load_settings_from_paths(&system, &user);
    assert_eq!(settings.base_url(), "http://system:9000");
}

#[test]
fn env_overrides_win_and_blank_values_are_ignored() {
    let tmp = TempDir::new().unwrap();
    let system = tmp.path().join("system.yaml");
    write_file(
        &system,
        "server:\n  base_url: http://system:9000\nstorage:\n  path: /var/lib/scribe\n",
    );

    let settings = load_settings_from_paths(&system, &tmp.path().join("none.yaml")).with_env(
        |key| match key {
            SERVER_URL_ENV => Some(" http://env:7000 ".to_string()),
            STORE_PATH_ENV => Some("   ".to_string()),
            _ => None,
        },
    );
    assert_eq!(settings.base_url(), "http://env:7000");
    assert_eq!(settings.store_dir(), Path::new("/var/lib/scribe"));
}

#[test]
fn zero_limits_use_defaults() {
    let tmp = TempDir::new().unwrap();
    let system = tmp.path().join("system.yaml");
    write_file(
        &system,
        "server:\n  request_timeout_secs: 0\nlive:\n  history_limit: 0\n  event_capacity: 0\n",
    );

    let settings = load_settings_from_paths(&system, &tmp.path().join("none.yaml"));
    assert_eq!(
        settings.request_timeout(),
        Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
    );
    assert_eq!(settings.history_limit(), DEFAULT_HISTORY_LIMIT);
    assert_eq!(
        settings.event_capacity(),
        scribe_jobs::DEFAULT_EVENT_CAPACITY
    );
}
