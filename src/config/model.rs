use reqwest::Url;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: Url,
    pub category: String,
    pub fetch_max_retries: u32,
    pub debug_config: DebugConfig,
}

#[derive(Debug, Clone, Default)]
pub struct DebugConfig {
    pub event_limit: Option<u32>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("Invalid config '{name}'. {reason}")]
    Invalid { name: &'static str, reason: String },
}
