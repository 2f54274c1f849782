use crate::config::model::{Config, ConfigError, DebugConfig};
use crate::events::model::ALL_CATEGORIES;
use reqwest::Url;
use std::env;

const API_URL_VAR: &str = "EVENTS_API_URL";
const CATEGORY_VAR: &str = "EVENT_CATEGORY";
const MAX_RETRIES_VAR: &str = "FETCH_MAX_RETRIES";
const EVENT_LIMIT_VAR: &str = "DEBUG_EVENT_LIMIT";

pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(|name| env::var(name).ok())
}

/// Reads config through `lookup`, so tests don't have to touch the process env
pub fn load_config_from<F>(lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let api_base_url = load_url_config(&lookup, API_URL_VAR)?;
    let category = lookup(CATEGORY_VAR)
        .filter(|category| !category.is_empty())
        .unwrap_or_else(|| ALL_CATEGORIES.to_string());
    let fetch_max_retries = load_u32_config(&lookup, MAX_RETRIES_VAR)?.unwrap_or(0);
    let event_limit = load_u32_config(&lookup, EVENT_LIMIT_VAR)?;

    Ok(Config {
        api_base_url,
        category,
        fetch_max_retries,
        debug_config: DebugConfig { event_limit },
    })
}

fn load_url_config<F>(lookup: &F, name: &'static str) -> Result<Url, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .ok_or(ConfigError::Missing(name))?
        .parse()
        .map_err(|err| ConfigError::Invalid {
            name,
            reason: format!("Expected a URL ({err})."),
        })
}

fn load_u32_config<F>(lookup: &F, name: &'static str) -> Result<Option<u32>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid {
                name,
                reason: "Expected a non-negative integer number.".to_string(),
            }),
        None => Ok(None),
    }
}
