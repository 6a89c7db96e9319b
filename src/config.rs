use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_API_BASE_URL: &str = "https://scarperapi-8lk0.onrender.com";
pub const DEFAULT_STREAMING_HUB_URL: &str = "https://streaminghub.42web.io";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} environment variable is required but not set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub api_key: String,
    pub api_base_url: String,
    pub streaming_hub_url: String,
    pub http_timeout: Duration,
    pub result_limit: usize,
    pub session_idle: Duration,
    /// Port of the health endpoint, `None` when disabled.
    pub health_port: Option<u16>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |name: &'static str, placeholder: &str| {
            get(name)
                .filter(|v| v != placeholder)
                .ok_or(ConfigError::Missing(name))
        };

        let bot_token = required("BOT_TOKEN", "YOUR_BOT_TOKEN_HERE")?;
        let api_key = required("API_KEY", "YOUR_API_KEY_HERE")?;

        let timeout_secs: u64 = parse_or(get("HTTP_TIMEOUT_SECS"), "HTTP_TIMEOUT_SECS", 30)?;
        if !(1..=300).contains(&timeout_secs) {
            return Err(invalid("HTTP_TIMEOUT_SECS", timeout_secs));
        }
        let result_limit: usize = parse_or(get("RESULT_LIMIT"), "RESULT_LIMIT", 15)?;
        if !(1..=50).contains(&result_limit) {
            return Err(invalid("RESULT_LIMIT", result_limit));
        }
        let idle_secs: u64 = parse_or(get("SESSION_IDLE_SECS"), "SESSION_IDLE_SECS", 3600)?;
        if idle_secs == 0 {
            return Err(invalid("SESSION_IDLE_SECS", idle_secs));
        }

        let http_enabled = match get("ENABLE_HTTP_SERVER") {
            None => true,
            Some(v) => match v.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => return Err(invalid("ENABLE_HTTP_SERVER", v)),
            },
        };
        let port: u16 = parse_or(get("PORT"), "PORT", 10000)?;

        Ok(Self {
            bot_token,
            api_key,
            api_base_url: get("API_BASE_URL").unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            streaming_hub_url: get("STREAMING_HUB_URL")
                .unwrap_or_else(|| DEFAULT_STREAMING_HUB_URL.to_string()),
            http_timeout: Duration::from_secs(timeout_secs),
            result_limit,
            session_idle: Duration::from_secs(idle_secs),
            health_port: http_enabled.then_some(port),
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    raw: Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(v) => v.parse().map_err(|_| ConfigError::Invalid { name, value: v }),
    }
}

fn invalid(name: &'static str, value: impl ToString) -> ConfigError {
    ConfigError::Invalid { name, value: value.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let env: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_only_secrets_are_set() {
        let cfg = load(&[("BOT_TOKEN", "123:abc"), ("API_KEY", "key")]).unwrap();
        assert_eq!(cfg.bot_token, "123:abc");
        assert_eq!(cfg.api_key, "key");
        assert_eq!(cfg.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(cfg.streaming_hub_url, DEFAULT_STREAMING_HUB_URL);
        assert_eq!(cfg.http_timeout, Duration::from_secs(30));
        assert_eq!(cfg.result_limit, 15);
        assert_eq!(cfg.health_port, Some(10000));
    }

    #[test]
    fn missing_bot_token_is_fatal() {
        let err = load(&[("API_KEY", "key")]).unwrap_err();
        assert_eq!(err, ConfigError::Missing("BOT_TOKEN"));
    }

    #[test]
    fn missing_api_key_is_fatal() {
        let err = load(&[("BOT_TOKEN", "123:abc"), ("API_KEY", "  ")]).unwrap_err();
        assert_eq!(err, ConfigError::Missing("API_KEY"));
    }

    #[test]
    fn placeholder_counts_as_missing() {
        let err = load(&[("BOT_TOKEN", "YOUR_BOT_TOKEN_HERE"), ("API_KEY", "key")]).unwrap_err();
        assert_eq!(err, ConfigError::Missing("BOT_TOKEN"));
    }

    #[test]
    fn http_server_can_be_disabled() {
        let cfg = load(&[
            ("BOT_TOKEN", "123:abc"),
            ("API_KEY", "key"),
            ("ENABLE_HTTP_SERVER", "False"),
            ("PORT", "8080"),
        ])
        .unwrap();
        assert_eq!(cfg.health_port, None);
    }

    #[test]
    fn bad_numbers_are_rejected() {
        let base = [("BOT_TOKEN", "123:abc"), ("API_KEY", "key")];
        let mut env = base.to_vec();
        env.push(("PORT", "http"));
        assert!(matches!(load(&env), Err(ConfigError::Invalid { name: "PORT", .. })));

        let mut env = base.to_vec();
        env.push(("HTTP_TIMEOUT_SECS", "0"));
        assert!(matches!(
            load(&env),
            Err(ConfigError::Invalid { name: "HTTP_TIMEOUT_SECS", .. })
        ));
    }
}
