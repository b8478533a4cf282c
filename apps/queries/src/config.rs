use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use items_list::{state::parse_order, ControllerOptions, StateDefaults};
use serde::Deserialize;
use tracing::warn;
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "queries.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
    pub api_key: Option<String>,
    pub page_size: u32,
    pub search_debounce_ms: u64,
    pub default_order: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:5000/".into(),
            api_key: None,
            page_size: items_list::state::DEFAULT_PAGE_SIZE,
            search_debounce_ms: 300,
            default_order: "-created_at".into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    server_url: Option<String>,
    api_key: Option<String>,
    page_size: Option<u32>,
    search_debounce_ms: Option<u64>,
    default_order: Option<String>,
}

impl Settings {
    pub fn server_base(&self) -> anyhow::Result<Url> {
        Url::parse(&self.server_url)
            .with_context(|| format!("invalid server url '{}'", self.server_url))
    }

    pub fn state_defaults(&self) -> StateDefaults {
        let defaults = StateDefaults::default().with_page_size(self.page_size);
        match parse_order(&self.default_order) {
            (Some(field), reverse) => defaults.with_order(field, reverse),
            (None, _) => defaults,
        }
    }

    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            search_debounce: Duration::from_millis(self.search_debounce_ms),
        }
    }
}

/// Defaults, then the TOML file, then environment overrides.
pub fn load_settings(config_path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    match fs::read_to_string(&path) {
        Ok(raw) => {
            apply_file(&mut settings, &raw)
                .with_context(|| format!("failed to parse '{}'", path.display()))?;
        }
        Err(err) if config_path.is_some() => {
            return Err(err).with_context(|| format!("failed to read '{}'", path.display()));
        }
        Err(_) => {}
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

pub(crate) fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw)?;
    if let Some(v) = file_cfg.server_url {
        settings.server_url = v;
    }
    if let Some(v) = file_cfg.api_key {
        settings.api_key = Some(v);
    }
    if let Some(v) = file_cfg.page_size {
        settings.page_size = v;
    }
    if let Some(v) = file_cfg.search_debounce_ms {
        settings.search_debounce_ms = v;
    }
    if let Some(v) = file_cfg.default_order {
        settings.default_order = v;
    }
    Ok(())
}

pub(crate) fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("QUERIES_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = var("APP__SERVER_URL") {
        settings.server_url = v;
    }

    if let Some(v) = var("APP__API_KEY") {
        settings.api_key = Some(v);
    }

    if let Some(v) = var("APP__PAGE_SIZE") {
        match v.parse::<u32>() {
            Ok(parsed) if parsed > 0 => settings.page_size = parsed,
            _ => warn!(value = %v, "ignoring invalid APP__PAGE_SIZE"),
        }
    }

    if let Some(v) = var("APP__SEARCH_DEBOUNCE_MS") {
        match v.parse::<u64>() {
            Ok(parsed) => settings.search_debounce_ms = parsed,
            Err(_) => warn!(value = %v, "ignoring invalid APP__SEARCH_DEBOUNCE_MS"),
        }
    }

    if let Some(v) = var("APP__DEFAULT_ORDER") {
        settings.default_order = v;
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
