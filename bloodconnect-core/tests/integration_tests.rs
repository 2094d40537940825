//! Integration tests for bloodconnect-core infrastructure

use bloodconnect_core::{
    init_logging, BloodConnectConfig, BloodConnectError, LogFormat, LoggingConfig,
};

#[test]
fn test_config_file_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut config = BloodConnectConfig::default();
    config.session.login_path = "/signin".to_string();
    config.storage.data_dir = dir.path().to_string_lossy().to_string();
    config.logging.format = LogFormat::Json;

    config.save_to_file(&path).unwrap();
    let loaded = BloodConnectConfig::from_file(&path).unwrap();

    assert_eq!(loaded, config);
    assert_eq!(loaded.users_path(), dir.path().join("users.json"));
    assert_eq!(loaded.persistent_path(), dir.path().join("session.json"));
}

#[test]
fn test_partial_config_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[session]
login_path = "/auth/login"

[session.bootstrap_admin]
enabled = false
"#,
    )
    .unwrap();

    let config = BloodConnectConfig::from_file(&path).unwrap();
    assert_eq!(config.session.login_path, "/auth/login");
    assert_eq!(config.session.storage_key, "bloodconnect_user");
    assert!(!config.session.bootstrap_admin.enabled);
    assert_eq!(config.session.bootstrap_admin.email, "admin@roktobondhu.com");
    assert_eq!(config.storage.users_file, "users.json");
}

#[test]
fn test_malformed_config_reports_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[session\nstorage_key = ").unwrap();

    match BloodConnectConfig::from_file(&path) {
        Err(BloodConnectError::Config { context, .. }) => {
            assert_eq!(context.operation.as_deref(), Some("parse_toml"));
        }
        other => panic!("Expected Config error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_missing_config_file() {
    let result = BloodConnectConfig::from_file("/definitely/not/here/config.toml");
    assert!(matches!(result, Err(BloodConnectError::Config { .. })));
}

#[test]
fn test_logging_initialization() {
    let config = LoggingConfig {
        level: "debug".to_string(),
        format: LogFormat::Compact,
        include_location: false,
        include_thread: false,
        filter_directives: vec!["bloodconnect_core=debug".to_string()],
    };

    // A second init in the same process fails, but must not panic
    let _ = init_logging(&config);
    assert!(init_logging(&config).is_err());
}

#[test]
fn test_validation_failure_carries_suggestion() {
    let mut config = BloodConnectConfig::default();
    config.session.storage_key = "  ".to_string();

    let error = config.validate().unwrap_err();
    assert!(!error.is_recoverable());
    assert!(!error.suggestions().is_empty());
    assert_eq!(
        error.context().map(|c| c.operation.as_deref()),
        Some(Some("validate"))
    );
}
