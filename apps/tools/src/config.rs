use std::{collections::HashMap, fs};

use shared::domain::Viewport;
use tracing::warn;

pub const CONFIG_FILE: &str = "orbitmarks.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub database_url: String,
    pub viewport_width: f64,
    pub viewport_height: f64,
    pub frame_rate: f64,
}

impl Default for Settings {
    fn default() -> Self {
        let viewport = Viewport::default();
        Self {
            database_url: "sqlite://./data/orbitmarks.db".into(),
            viewport_width: viewport.width,
            viewport_height: viewport.height,
            frame_rate: 60.0,
        }
    }
}

impl Settings {
    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.viewport_width, self.viewport_height)
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();
    if let Ok(raw) = fs::read_to_string(CONFIG_FILE) {
        apply_file(&mut settings, &raw);
    }
    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings.database_url = normalize_database_url(&settings.database_url);
    settings
}

fn apply_file(settings: &mut Settings, raw: &str) {
    let file_cfg = match toml::from_str::<HashMap<String, toml::Value>>(raw) {
        Ok(file_cfg) => file_cfg,
        Err(err) => {
            warn!("config: ignoring unreadable {CONFIG_FILE}: {err}");
            return;
        }
    };
    if let Some(v) = file_cfg.get("database_url").and_then(toml::Value::as_str) {
        settings.database_url = v.to_string();
    }
    if let Some(v) = file_cfg.get("viewport_width").and_then(number) {
        settings.viewport_width = v;
    }
    if let Some(v) = file_cfg.get("viewport_height").and_then(number) {
        settings.viewport_height = v;
    }
    if let Some(v) = file_cfg
        .get("frame_rate")
        .and_then(number)
        .filter(|v| *v > 0.0)
    {
        settings.frame_rate = v;
    }
}

fn number(value: &toml::Value) -> Option<f64> {
    value
        .as_float()
        .or_else(|| value.as_integer().map(|v| v as f64))
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("ORBITMARKS_DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = var("APP__DATABASE_URL") {
        settings.database_url = v;
    }

    let parsed = |key: &str| var(key).and_then(|v| v.trim().parse::<f64>().ok());
    if let Some(v) = parsed("APP__VIEWPORT_WIDTH") {
        settings.viewport_width = v;
    }
    if let Some(v) = parsed("APP__VIEWPORT_HEIGHT") {
        settings.viewport_height = v;
    }
    if let Some(v) = parsed("APP__FRAME_RATE").filter(|v| *v > 0.0) {
        settings.frame_rate = v;
    }
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
