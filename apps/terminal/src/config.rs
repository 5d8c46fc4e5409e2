use std::{collections::HashMap, fs, path::Path, time::Duration};

pub const CONFIG_FILE: &str = "terminal.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
    pub database_url: String,
    pub debounce_ms: u64,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:3000/api".into(),
            database_url: "sqlite://./data/session.db".into(),
            debounce_ms: 300,
            log_filter: "warn".into(),
        }
    }
}

impl Settings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new(CONFIG_FILE), |key| std::env::var(key).ok())
}

/// Defaults, then `config_path` if it parses, then the environment as seen
/// through `env`. Later layers win.
pub fn load_settings_from(config_path: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(config_path) {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, toml::Value>>(&raw) {
            if let Some(v) = file_cfg.get("server_url").and_then(scalar_text) {
                settings.server_url = v;
            }
            if let Some(v) = file_cfg.get("database_url").and_then(scalar_text) {
                settings.database_url = v;
            }
            if let Some(v) = file_cfg
                .get("debounce_ms")
                .and_then(scalar_text)
                .and_then(|v| v.parse::<u64>().ok())
            {
                settings.debounce_ms = v;
            }
            if let Some(v) = file_cfg.get("log_filter").and_then(scalar_text) {
                settings.log_filter = v;
            }
        }
    }

    if let Some(v) = env("CATALOG_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = env("APP__SERVER_URL") {
        settings.server_url = v;
    }

    if let Some(v) = env("SESSION_DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = env("APP__DATABASE_URL") {
        settings.database_url = v;
    }

    if let Some(v) = env("APP__DEBOUNCE_MS") {
        if let Ok(parsed) = v.trim().parse::<u64>() {
            settings.debounce_ms = parsed;
        }
    }

    if let Some(v) = env("APP__LOG_FILTER") {
        settings.log_filter = v;
    }

    settings
}

fn scalar_text(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(i) => Some(i.to_string()),
        _ => None,
    }
}

/// Turns whatever the operator typed into a URL sqlx accepts. Plain paths
/// become `sqlite://` URLs and blank input falls back to the default.
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
