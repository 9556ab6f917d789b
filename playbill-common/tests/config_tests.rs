//! Configuration loading and root folder resolution tests
//!
//! Tests that manipulate `PLAYBILL_ROOT_FOLDER` or `PLAYBILL_CONFIG` are marked
//! with #[serial] so they never race on the process environment.

use playbill_common::config::{
    default_root_folder, resolve_root_folder, TomlConfig, CONFIG_FILE_ENV, ROOT_FOLDER_ENV,
};
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[test]
#[serial]
fn test_cli_argument_wins_over_everything() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/playbill-from-env");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/playbill-from-toml")),
        ..Default::default()
    };

    let root = resolve_root_folder(Some(Path::new("/tmp/playbill-from-cli")), ROOT_FOLDER_ENV, &config);
    assert_eq!(root, PathBuf::from("/tmp/playbill-from-cli"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_env_var_wins_over_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/playbill-from-env");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/playbill-from-toml")),
        ..Default::default()
    };

    let root = resolve_root_folder(None, ROOT_FOLDER_ENV, &config);
    assert_eq!(root, PathBuf::from("/tmp/playbill-from-env"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_toml_root_folder_used_without_env() {
    env::remove_var(ROOT_FOLDER_ENV);
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/playbill-from-toml")),
        ..Default::default()
    };

    let root = resolve_root_folder(None, ROOT_FOLDER_ENV, &config);
    assert_eq!(root, PathBuf::from("/tmp/playbill-from-toml"));
}

#[test]
#[serial]
fn test_compiled_default_when_nothing_set() {
    env::remove_var(ROOT_FOLDER_ENV);
    let root = resolve_root_folder(None, ROOT_FOLDER_ENV, &TomlConfig::default());
    assert_eq!(root, default_root_folder());
    assert!(!root.as_os_str().is_empty());
}

#[test]
#[serial]
fn test_load_from_env_named_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("playbill.toml");
    std::fs::write(
        &path,
        r#"
root_folder = "/srv/playbill"

[logging]
level = "debug"

[scraper]
user_agent = "TestBot/1.0"
stale_days = 7
"#,
    )
    .unwrap();

    env::set_var(CONFIG_FILE_ENV, &path);
    let config = TomlConfig::load_or_default(None).unwrap();
    env::remove_var(CONFIG_FILE_ENV);

    assert_eq!(config.root_folder, Some(PathBuf::from("/srv/playbill")));
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.scraper.user_agent, "TestBot/1.0");
    assert_eq!(config.scraper.stale_days, 7);
    assert_eq!(config.scraper.min_interval_ms, 1000);
}

#[test]
#[serial]
fn test_missing_explicit_file_is_error() {
    env::remove_var(CONFIG_FILE_ENV);
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("nope.toml");

    assert!(TomlConfig::load_or_default(Some(&missing)).is_err());
}
