use std::{collections::HashMap, fs, path::PathBuf, str::FromStr};

use anyhow::{bail, Context};
use storage::DEFAULT_FEED_CAPACITY;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> anyhow::Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            other => bail!("unknown store backend '{other}', expected 'sqlite' or 'memory'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub server_bind: String,
    pub database_url: String,
    pub store_backend: StoreBackend,
    /// Snapshots buffered per live document before slow listeners skip ahead.
    pub feed_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8443".into(),
            database_url: "sqlite://./data/sessions.db".into(),
            store_backend: StoreBackend::Sqlite,
            feed_capacity: DEFAULT_FEED_CAPACITY,
        }
    }
}

pub fn load_settings() -> Settings {
    let file = fs::read_to_string("server.toml").ok();
    settings_from(file.as_deref(), |name| std::env::var(name).ok())
}

/// `server.toml` first, then environment variables. Later sources win.
pub fn settings_from(file: Option<&str>, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Some(raw) = file {
        match toml::from_str::<toml::Table>(raw) {
            Ok(table) => {
                let file_cfg: HashMap<String, String> = table
                    .into_iter()
                    .map(|(key, value)| match value {
                        toml::Value::String(s) => (key, s),
                        other => (key, other.to_string()),
                    })
                    .collect();
                if let Some(v) = file_cfg.get("bind_addr") {
                    settings.server_bind = v.clone();
                }
                if let Some(v) = file_cfg.get("database_url") {
                    settings.database_url = v.clone();
                }
                if let Some(v) = file_cfg.get("store_backend") {
                    apply_backend(&mut settings, v);
                }
                if let Some(v) = file_cfg.get("feed_capacity") {
                    apply_feed_capacity(&mut settings, v);
                }
            }
            Err(error) => warn!(%error, "ignoring unreadable server.toml"),
        }
    }

    if let Some(v) = env("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Some(v) = env("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    if let Some(v) = env("DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = env("APP__DATABASE_URL") {
        settings.database_url = v;
    }

    if let Some(v) = env("APP__STORE_BACKEND") {
        apply_backend(&mut settings, &v);
    }
    if let Some(v) = env("APP__FEED_CAPACITY") {
        apply_feed_capacity(&mut settings, &v);
    }

    settings
}

fn apply_backend(settings: &mut Settings, raw: &str) {
    match raw.parse() {
        Ok(backend) => settings.store_backend = backend,
        Err(error) => warn!(%error, "keeping store backend {:?}", settings.store_backend),
    }
}

fn apply_feed_capacity(settings: &mut Settings, raw: &str) {
    match raw.trim().parse::<usize>() {
        Ok(capacity) if capacity > 0 => settings.feed_capacity = capacity,
        _ => warn!(value = raw, "feed capacity must be a positive integer; ignoring"),
    }
}

/// Normalizes the url and creates the database file's parent directory if needed.
pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    if let Some(parent) = sqlite_file(&database_url).and_then(|p| p.parent().map(PathBuf::from)) {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(&parent).with_context(|| {
                format!("failed to create '{}' for {database_url}", parent.display())
            })?;
        }
    }
    Ok(database_url)
}

fn sqlite_file(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") {
        return None;
    }
    let rest = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or_default();
    (!path.is_empty()).then(|| PathBuf::from(path))
}

pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
