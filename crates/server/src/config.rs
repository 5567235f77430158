use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use provisioning::RetryPolicy;
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_bind: String,
    pub database_url: String,
    pub provision_max_attempts: u32,
    pub provision_initial_backoff_ms: u64,
    pub provision_max_backoff_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8080".into(),
            database_url: "sqlite://./data/forms.db".into(),
            provision_max_attempts: 3,
            provision_initial_backoff_ms: 100,
            provision_max_backoff_ms: 2_000,
        }
    }
}

impl Settings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.provision_max_attempts.max(1),
            initial_backoff: Duration::from_millis(self.provision_initial_backoff_ms),
            max_backoff: Duration::from_millis(
                self.provision_max_backoff_ms
                    .max(self.provision_initial_backoff_ms),
            ),
        }
    }
}

/// Keys accepted in `server.toml`.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    bind_addr: Option<String>,
    database_url: Option<String>,
    provision_max_attempts: Option<u32>,
    provision_initial_backoff_ms: Option<u64>,
    provision_max_backoff_ms: Option<u64>,
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("server.toml") {
        match toml::from_str::<FileConfig>(&raw) {
            Ok(file_cfg) => apply_file_config(&mut settings, file_cfg),
            Err(error) => warn!(%error, "ignoring unreadable server.toml"),
        }
    }

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    settings
}

fn apply_file_config(settings: &mut Settings, file_cfg: FileConfig) {
    if let Some(v) = file_cfg.bind_addr {
        settings.server_bind = v;
    }
    if let Some(v) = file_cfg.database_url {
        settings.database_url = v;
    }
    if let Some(v) = file_cfg.provision_max_attempts {
        settings.provision_max_attempts = v;
    }
    if let Some(v) = file_cfg.provision_initial_backoff_ms {
        settings.provision_initial_backoff_ms = v;
    }
    if let Some(v) = file_cfg.provision_max_backoff_ms {
        settings.provision_max_backoff_ms = v;
    }
}

/// Later keys win, so the `APP__` spelling overrides the short one.
fn apply_env_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    for key in ["SERVER_BIND", "APP__BIND_ADDR"] {
        if let Some(v) = lookup(key) {
            settings.server_bind = v;
        }
    }
    for key in ["DATABASE_URL", "APP__DATABASE_URL"] {
        if let Some(v) = lookup(key) {
            settings.database_url = v;
        }
    }

    if let Some(v) = parsed(&lookup, "APP__PROVISION_MAX_ATTEMPTS") {
        settings.provision_max_attempts = v;
    }
    if let Some(v) = parsed(&lookup, "APP__PROVISION_INITIAL_BACKOFF_MS") {
        settings.provision_initial_backoff_ms = v;
    }
    if let Some(v) = parsed(&lookup, "APP__PROVISION_MAX_BACKOFF_MS") {
        settings.provision_max_backoff_ms = v;
    }
}

fn parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring non-numeric setting");
            None
        }
    }
}

pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    ensure_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:") || raw_database_url.contains("://") {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

fn ensure_parent_dir_exists(database_url: &str) -> anyhow::Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
