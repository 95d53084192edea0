use ts_core::config::{Config, ConfigError};
use ts_core::credentials::{resolve, CredentialSources};

#[test]
fn explicit_file_supplies_settings_and_token() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("theme.toml");
    std::fs::write(
        &path,
        r#"
authorization = "from-file"

[remote]
base_url = "https://themes.example.test/api"
max_file_bytes = 1024

[sync]
workers = 2
ignore_patterns = ["*.bak"]
"#,
    )
    .unwrap();

    let cfg = Config::load_from(&path).expect("load explicit config");
    assert_eq!(cfg.remote.base_url, "https://themes.example.test/api");
    assert_eq!(cfg.remote.max_file_bytes, 1024);
    assert_eq!(cfg.sync.workers, 2);
    assert_eq!(cfg.sync.ignore_patterns, vec!["*.bak".to_string()]);
    // untouched sections keep their defaults
    assert_eq!(cfg.download.workers, 8);

    let cred = resolve(CredentialSources {
        explicit: Some(&cfg),
        env: Some("from-env"),
        ..Default::default()
    })
    .expect("token resolved");
    assert_eq!(cred.expose(), "from-file");
}

#[test]
fn explicit_file_with_bad_values_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[sync]\nworkers = 0\n").unwrap();

    let err = Config::load_from(&path).expect_err("validation should fail");
    assert!(matches!(err, ConfigError::Validation(_)));
    assert!(err.to_string().contains("sync.workers"));
}

#[test]
fn default_path_lives_under_dot_config() {
    let path = Config::default_path();
    assert!(path.ends_with(".config/theme-sync/config.toml"));
}
