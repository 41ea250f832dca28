use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Infrastructure settings read from the environment.
///
/// Business tunables (timeouts, templates, prompt strings) live in the store's
/// settings; see [`crate::core::settings`].
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub analysis_server_url: String,
    pub analysis_username: String,
    pub analysis_password: String,
    pub worker_count: usize,
    pub queue_capacity: usize,
    pub shutdown_timeout: Duration,
    pub seed_file: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            host: env_or("HOOKDOG_HOST", "0.0.0.0"),
            port: parse_env("HOOKDOG_PORT", 8080)?,
            analysis_server_url: env::var("ANALYSIS_SERVER_URL")
                .map_err(|e| format!("ANALYSIS_SERVER_URL: {}", e))?
                .trim_end_matches('/')
                .to_string(),
            analysis_username: env_or("ANALYSIS_SERVER_USERNAME", "opencode"),
            analysis_password: env::var("ANALYSIS_SERVER_PASSWORD").unwrap_or_default(),
            worker_count: parse_env("HOOKDOG_WORKERS", 8)?.max(1),
            queue_capacity: parse_env("HOOKDOG_QUEUE_CAPACITY", 256)?.max(1),
            shutdown_timeout: Duration::from_secs(parse_env("HOOKDOG_SHUTDOWN_TIMEOUT_SECS", 30)?),
            seed_file: env::var("HOOKDOG_SEED_FILE").ok().map(PathBuf::from),
        })
    }

    #[must_use]
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_or(key: &str, fallback: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

fn parse_env<T>(key: &str, fallback: T) -> Result<T, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.is_empty() => raw.parse().map_err(|e| format!("{}: {}", key, e)),
        _ => Ok(fallback),
    }
}
