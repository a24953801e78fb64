pub mod api;
pub mod chart;
pub mod chat;
pub mod shell;

pub mod config {
    use anyhow::Context;
    use std::time::Duration;

    const DEFAULT_TIMEOUT_SECS: u64 = 30;
    const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub api_base_url: Option<String>,
        pub api_key: Option<String>,
        pub request_timeout: Duration,
        pub connect_timeout: Duration,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                api_base_url: std::env::var("BRAIN_BASE_URL")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
                api_key: std::env::var("BRAIN_API_KEY")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
                request_timeout: secs_from_env("BRAIN_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?,
                connect_timeout: secs_from_env(
                    "BRAIN_CONNECT_TIMEOUT_SECS",
                    DEFAULT_CONNECT_TIMEOUT_SECS,
                )?,
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
            })
        }

        /// Settings pointing at `base_url` with default timeouts and no key.
        pub fn for_base_url(base_url: impl Into<String>) -> Self {
            Self {
                api_base_url: Some(base_url.into()),
                api_key: None,
                request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
                connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
                sentry_dsn: None,
            }
        }

        pub fn require_api_base_url(&self) -> anyhow::Result<&str> {
            self.api_base_url
                .as_deref()
                .context("BRAIN_BASE_URL is required")
        }
    }

    fn secs_from_env(key: &str, default: u64) -> anyhow::Result<Duration> {
        match std::env::var(key) {
            Ok(raw) => {
                let secs = raw
                    .trim()
                    .parse::<u64>()
                    .with_context(|| format!("{key} must be a whole number of seconds (got {raw:?})"))?;
                Ok(Duration::from_secs(secs))
            }
            Err(_) => Ok(Duration::from_secs(default)),
        }
    }
}
