//! Environment-driven configuration.
//!
//! Values come from `COURSEBOOK_*` environment variables layered over built-in
//! defaults. `__` separates nested sections, so `COURSEBOOK_AI__API_KEY` maps
//! to `ai.api_key`.

use figment::{
    providers::{Env, Serialized},
    Figment,
};
use serde::{Deserialize, Serialize};

fn default_bind_addr() -> String {
    "127.0.0.1:8775".to_string()
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

const fn default_simulate_delay_ms() -> u64 {
    1200
}

const fn default_request_timeout_secs() -> u64 {
    30
}

/// Settings for the content-generation upstream. With no `api_key` the
/// endpoint serves the simulated payload instead of calling out.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AiConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_simulate_delay_ms")]
    pub simulate_delay_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            model: default_model(),
            simulate_delay_ms: default_simulate_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default)]
    pub ai: AiConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            data_dir: default_data_dir(),
            ai: AiConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Env::prefixed("COURSEBOOK_").split("__"))
            .extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let config = Config::default();
        assert_eq!(config.bind_addr, "127.0.0.1:8775");
        assert_eq!(config.data_dir, "data");
        assert!(config.ai.api_key.is_none());
        assert_eq!(config.ai.model, "gpt-4o-mini");
        assert_eq!(config.ai.simulate_delay_ms, 1200);
    }
}
