//! Configuration loading and precedence tests

use pledge_config::{ConfigError, ConfigLoader, RejectionLog, RuntimeConfig};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serial_test::serial;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn create_config_file(dir: &Path, content: &str) -> PathBuf {
    let config_path = dir.join("pledge.toml");
    fs::write(&config_path, content).unwrap();
    config_path
}

fn loader_with_global(dir: &Path, content: Option<&str>) -> ConfigLoader {
    let global_path = dir.join("global.toml");
    if let Some(content) = content {
        fs::write(&global_path, content).unwrap();
    }
    ConfigLoader::with_global_path(global_path)
}

// ============================================================================
// Config Loading Tests
// ============================================================================

#[test]
#[serial]
fn test_load_project_config_basic() {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(
        temp_dir.path(),
        r#"
[rejections]
log = "off"
"#,
    );

    let mut loader = loader_with_global(temp_dir.path(), None);
    let config = loader.load_from_directory(temp_dir.path()).unwrap();

    assert!(config.is_project());
    assert_eq!(config.runtime.rejection_log(), RejectionLog::Off);
}

#[test]
#[serial]
fn test_load_from_explicit_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = create_config_file(
        temp_dir.path(),
        r#"
[scheduler]
max_tasks_per_flush = 64
"#,
    );

    let mut loader = loader_with_global(temp_dir.path(), None);
    let config = loader.load_from_file(&path).unwrap();

    assert_eq!(config.runtime.max_tasks_per_flush(), 64);
    assert_eq!(config.project_root(), Some(temp_dir.path()));
}

#[test]
fn test_load_missing_file_is_not_found() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("pledge.toml");

    let err = RuntimeConfig::load_from_file(&missing).unwrap_err();
    assert!(matches!(err, ConfigError::NotFound(p) if p == missing));
}

#[test]
fn test_invalid_toml_reports_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = create_config_file(temp_dir.path(), "[scheduler\nmax = 1");

    let err = RuntimeConfig::load_from_file(&path).unwrap_err();
    match err {
        ConfigError::TomlParseError { file, .. } => assert_eq!(file, path),
        other => panic!("Expected parse error, got {:?}", other),
    }
}

// ============================================================================
// Precedence Tests
// ============================================================================

#[test]
#[serial]
fn test_project_overrides_global() {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(
        temp_dir.path(),
        r#"
[scheduler]
max_tasks_per_flush = 7
"#,
    );

    let mut loader = loader_with_global(
        temp_dir.path(),
        Some(
            r#"
[scheduler]
max_tasks_per_flush = 1000

[rejections]
record_limit = 5
"#,
        ),
    );
    let config = loader.load_from_directory(temp_dir.path()).unwrap();

    assert_eq!(config.runtime.max_tasks_per_flush(), 7);
    assert_eq!(config.runtime.record_limit(), 5);
}

#[test]
#[serial]
fn test_malformed_global_config_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(temp_dir.path(), "");

    let mut loader = loader_with_global(temp_dir.path(), Some("[scheduler\nbroken"));
    let result = loader.load_from_directory(temp_dir.path());

    assert!(matches!(result, Err(ConfigError::TomlParseError { .. })));
}

#[test]
#[serial]
fn test_invalid_global_value_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = create_config_file(temp_dir.path(), "");

    let mut loader = loader_with_global(
        temp_dir.path(),
        Some(
            r#"
[scheduler]
max_tasks_per_flush = 0
"#,
        ),
    );

    assert!(matches!(
        loader.load_from_directory(temp_dir.path()),
        Err(ConfigError::InvalidValue { .. })
    ));
    assert!(matches!(
        loader.load_from_file(&config_path),
        Err(ConfigError::InvalidValue { .. })
    ));
}

#[test]
#[serial]
fn test_env_overrides_project() {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(
        temp_dir.path(),
        r#"
[rejections]
log = "warn"
record_limit = 10
"#,
    );

    env::set_var("PLEDGE_UNHANDLED_LOG", "error");
    env::set_var("PLEDGE_RECORD_LIMIT", "2");

    let mut loader = loader_with_global(temp_dir.path(), None);
    let config = loader.load_from_directory(temp_dir.path()).unwrap();

    env::remove_var("PLEDGE_UNHANDLED_LOG");
    env::remove_var("PLEDGE_RECORD_LIMIT");

    assert_eq!(config.runtime.rejection_log(), RejectionLog::Error);
    assert_eq!(config.runtime.record_limit(), 2);
}

#[rstest]
#[case("0")]
#[case("-3")]
#[case("many")]
#[serial]
fn test_env_budget_must_be_positive_integer(#[case] raw: &str) {
    let temp_dir = TempDir::new().unwrap();
    env::set_var("PLEDGE_MAX_TASKS", raw);

    let mut loader = loader_with_global(temp_dir.path(), None);
    let result = loader.load_from_directory(temp_dir.path());

    env::remove_var("PLEDGE_MAX_TASKS");

    assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
}

#[rstest]
#[case("warn", RejectionLog::Warn)]
#[case("Error", RejectionLog::Error)]
#[case("off", RejectionLog::Off)]
fn test_rejection_log_levels_parse(#[case] raw: &str, #[case] expected: RejectionLog) {
    let toml = format!("[rejections]\nlog = \"{}\"\n", raw.to_lowercase());
    let config = RuntimeConfig::from_toml_str(&toml).unwrap();
    assert_eq!(config.rejection_log(), expected);
}

#[test]
fn test_roundtrip_serialization() {
    let config = RuntimeConfig::from_toml_str(
        r#"
[scheduler]
max_tasks_per_flush = 9

[rejections]
log = "error"
"#,
    )
    .unwrap();

    let text = toml::to_string(&config).unwrap();
    let reparsed = RuntimeConfig::from_toml_str(&text).unwrap();
    assert_eq!(reparsed, config);
}
