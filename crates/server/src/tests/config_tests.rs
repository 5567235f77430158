use super::*;

use std::collections::HashMap;

fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn normalizes_plain_file_path_to_sqlite_url() {
    assert_eq!(
        normalize_database_url("./data/test.db"),
        "sqlite://./data/test.db"
    );
    assert_eq!(
        normalize_database_url("sqlite:data\\forms.db"),
        "sqlite://data/forms.db"
    );
    assert_eq!(normalize_database_url("  "), Settings::default().database_url);
    assert_eq!(normalize_database_url("sqlite::memory:"), "sqlite::memory:");
}

#[test]
fn creates_parent_dir_for_sqlite_file_url() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("data").join("test.db");

    prepare_database_url(db_path.to_string_lossy().as_ref()).expect("prepare db url");
    assert!(temp_root.path().join("data").exists());
}

#[test]
fn app_prefixed_env_wins_over_short_names() {
    let mut settings = Settings::default();
    apply_env_overrides(
        &mut settings,
        env_of(&[
            ("SERVER_BIND", "0.0.0.0:1"),
            ("APP__BIND_ADDR", "0.0.0.0:2"),
            ("DATABASE_URL", "sqlite://short.db"),
        ]),
    );
    assert_eq!(settings.server_bind, "0.0.0.0:2");
    assert_eq!(settings.database_url, "sqlite://short.db");
}

#[test]
fn provisioning_settings_build_retry_policy() {
    let mut settings = Settings::default();
    apply_env_overrides(
        &mut settings,
        env_of(&[
            ("APP__PROVISION_MAX_ATTEMPTS", "5"),
            ("APP__PROVISION_INITIAL_BACKOFF_MS", "250"),
            ("APP__PROVISION_MAX_BACKOFF_MS", "nope"),
        ]),
    );
    let policy = settings.retry_policy();
    assert_eq!(policy.max_attempts, 5);
    assert_eq!(policy.initial_backoff, Duration::from_millis(250));
    assert_eq!(policy.max_backoff, Duration::from_millis(2_000));
}

#[test]
fn zero_attempts_still_tries_once() {
    let settings = Settings {
        provision_max_attempts: 0,
        ..Settings::default()
    };
    assert_eq!(settings.retry_policy().max_attempts, 1);
}

#[test]
fn reads_server_toml_keys() {
    let file_cfg: FileConfig = toml::from_str(
        r#"
bind_addr = "127.0.0.1:9000"
database_url = "sqlite://./forms.db"
provision_max_attempts = 4
"#,
    )
    .expect("toml");
    let mut settings = Settings::default();
    apply_file_config(&mut settings, file_cfg);

    assert_eq!(settings.server_bind, "127.0.0.1:9000");
    assert_eq!(settings.database_url, "sqlite://./forms.db");
    assert_eq!(settings.provision_max_attempts, 4);
    assert_eq!(settings.provision_max_backoff_ms, 2_000);
}

#[tokio::test]
async fn prepared_database_url_creates_openable_sqlite_file() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("server.db");

    let prepared = prepare_database_url(db_path.to_string_lossy().as_ref()).expect("prepare");
    let storage = storage::Storage::new(&prepared).await.expect("open sqlite");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should be created: {}",
        db_path.display()
    );
}
