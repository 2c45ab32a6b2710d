use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_API_BASE_URL: &str = "https://api-ai.desa-maileppet.com";
pub const DEFAULT_CLOSE_DELAY_MS: u64 = 1500;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ClientSettings {
    pub api_base_url: Option<String>,
    pub database_url: Option<String>,
    pub assume_yes: Option<bool>,
    pub close_delay_ms: Option<u64>,
}

impl ClientSettings {
    /// Built-in defaults. The database location depends on the environment.
    pub fn defaults() -> Self {
        Self {
            api_base_url: Some(DEFAULT_API_BASE_URL.into()),
            database_url: default_database_url(),
            assume_yes: Some(false),
            close_delay_ms: Some(DEFAULT_CLOSE_DELAY_MS),
        }
    }

    pub fn from_env() -> Self {
        let api_base_url = std::env::var("CLOUDDOCS_API_URL")
            .or_else(|_| std::env::var("NEXT_PUBLIC_API_URL"))
            .ok()
            .filter(|v| !v.trim().is_empty());
        let database_url = std::env::var("CLOUDDOCS_STATE_DB").ok().filter(|v| !v.trim().is_empty());
        let assume_yes = std::env::var("CLOUDDOCS_ASSUME_YES").ok().map(|v| parse_flag(&v));
        Self { api_base_url, database_url, assume_yes, close_delay_ms: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EffectiveSettings {
    pub api_base_url: String,
    pub database_url: Option<String>,
    pub assume_yes: bool,
    pub close_delay_ms: u64,
}

fn parse_flag(v: &str) -> bool {
    matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "y" | "on")
}

fn default_database_url() -> Option<String> {
    let base = std::env::var("XDG_DATA_HOME").ok().map(PathBuf::from).or_else(|| {
        std::env::var("HOME").ok().map(|home| PathBuf::from(home).join(".local").join("share"))
    })?;
    let path = base.join("clouddocs").join("state.db");
    Some(format!("sqlite://{}", path.to_string_lossy()))
}

pub fn resolve_effective_settings(
    defaults: &ClientSettings,
    env: &ClientSettings,
    overrides: &ClientSettings,
) -> EffectiveSettings {
    let api_base_url = overrides
        .api_base_url
        .clone()
        .or_else(|| env.api_base_url.clone())
        .or_else(|| defaults.api_base_url.clone())
        .unwrap_or_else(|| DEFAULT_API_BASE_URL.into());

    let database_url = overrides
        .database_url
        .clone()
        .or_else(|| env.database_url.clone())
        .or_else(|| defaults.database_url.clone());

    let assume_yes = overrides
        .assume_yes
        .or(env.assume_yes)
        .or(defaults.assume_yes)
        .unwrap_or(false);

    let close_delay_ms = overrides
        .close_delay_ms
        .or(env.close_delay_ms)
        .or(defaults.close_delay_ms)
        .unwrap_or(DEFAULT_CLOSE_DELAY_MS);

    EffectiveSettings {
        api_base_url: api_base_url.trim_end_matches('/').to_string(),
        database_url,
        assume_yes,
        close_delay_ms,
    }
}
