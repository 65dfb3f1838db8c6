use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use balagh_conversation::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL};

/// Server configuration, read from the environment (after `.env`).
///
/// No `Debug`: it carries the private key and the provider API key.
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub server_public: Option<String>,
    pub server_secret: Option<String>,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub assistant_timeout: Duration,
    /// `None` disables idle eviction.
    pub session_idle: Option<Duration>,
    pub replay_window_secs: i64,
    pub body_limit_bytes: usize,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let Some(gemini_api_key) = var("GEMINI_API_KEY") else {
            bail!("GEMINI_API_KEY is not set");
        };

        let idle_secs: u64 = parsed(&var, "BALAGH_SESSION_IDLE_SECS", 7200)?;
        let body_limit_mb: usize = parsed(&var, "BALAGH_BODY_LIMIT_MB", 50)?;
        let body_limit_bytes = body_limit_mb
            .checked_mul(1024 * 1024)
            .with_context(|| format!("BALAGH_BODY_LIMIT_MB is too large, got {body_limit_mb}"))?;

        Ok(Self {
            host: var("BALAGH_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parsed(&var, "BALAGH_PORT", 3000)?,
            db_path: var("BALAGH_DB_PATH").unwrap_or_else(|| "balagh.db".into()).into(),
            server_public: var("SERVER_X25519_PUB"),
            server_secret: var("SERVER_X25519_PRIV"),
            gemini_api_key,
            gemini_model: var("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into()),
            gemini_base_url: var("GEMINI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into()),
            assistant_timeout: Duration::from_secs(parsed(&var, "BALAGH_ASSISTANT_TIMEOUT_SECS", 30)?),
            session_idle: (idle_secs > 0).then(|| Duration::from_secs(idle_secs)),
            replay_window_secs: parsed(&var, "BALAGH_REPLAY_WINDOW_SECS", 300)?,
            body_limit_bytes,
        })
    }
}

fn parsed<T>(var: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} must be a number, got {raw:?}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<ServerConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = config(&[("GEMINI_API_KEY", "k")]).unwrap();
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.db_path, PathBuf::from("balagh.db"));
        assert_eq!(cfg.gemini_model, DEFAULT_MODEL);
        assert_eq!(cfg.assistant_timeout, Duration::from_secs(30));
        assert_eq!(cfg.session_idle, Some(Duration::from_secs(7200)));
        assert_eq!(cfg.replay_window_secs, 300);
        assert_eq!(cfg.body_limit_bytes, 50 * 1024 * 1024);
        assert!(cfg.server_secret.is_none());
    }

    #[test]
    fn zero_idle_disables_eviction() {
        let cfg = config(&[("GEMINI_API_KEY", "k"), ("BALAGH_SESSION_IDLE_SECS", "0")]).unwrap();
        assert!(cfg.session_idle.is_none());
    }

    #[test]
    fn invalid_numbers_fail() {
        assert!(config(&[("GEMINI_API_KEY", "k"), ("BALAGH_PORT", "http")]).is_err());
        assert!(config(&[("GEMINI_API_KEY", "k"), ("BALAGH_ASSISTANT_TIMEOUT_SECS", "-1")]).is_err());
    }

    #[test]
    fn oversized_body_limit_fails() {
        let huge = usize::MAX.to_string();
        let err = config(&[("GEMINI_API_KEY", "k"), ("BALAGH_BODY_LIMIT_MB", huge.as_str())])
            .err()
            .unwrap();
        assert!(err.to_string().contains("BALAGH_BODY_LIMIT_MB"));

        let cfg = config(&[("GEMINI_API_KEY", "k"), ("BALAGH_BODY_LIMIT_MB", "1")]).unwrap();
        assert_eq!(cfg.body_limit_bytes, 1024 * 1024);
    }

    #[test]
    fn api_key_is_required() {
        assert!(config(&[]).is_err());
        assert!(config(&[("GEMINI_API_KEY", "  ")]).is_err());
    }
}
