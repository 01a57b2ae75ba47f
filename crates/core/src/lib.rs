pub mod domain;
pub mod notify;
pub mod projection;
pub mod session;

pub mod config {
    use anyhow::Context;
    use std::time::Duration;

    const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

    #[derive(Debug, Clone, Default)]
    pub struct Settings {
        pub api_base_url: Option<String>,
        pub token: Option<String>,
        /// Raw `FINSIGHT_HTTP_TIMEOUT_SECS`; parsed by [`Settings::http_timeout`].
        pub http_timeout_secs: Option<String>,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                api_base_url: std::env::var("FINSIGHT_API_BASE_URL").ok(),
                token: std::env::var("FINSIGHT_TOKEN")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
                http_timeout_secs: std::env::var("FINSIGHT_HTTP_TIMEOUT_SECS")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
            })
        }

        /// Request timeout for the notification API, 30s when unset.
        pub fn http_timeout(&self) -> anyhow::Result<Duration> {
            let Some(raw) = self.http_timeout_secs.as_deref() else {
                return Ok(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS));
            };
            let secs = raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("FINSIGHT_HTTP_TIMEOUT_SECS is not a number: {raw}"))?;
            Ok(Duration::from_secs(secs))
        }

        pub fn require_api_base_url(&self) -> anyhow::Result<&str> {
            self.api_base_url
                .as_deref()
                .context("FINSIGHT_API_BASE_URL is required")
        }

        pub fn require_token(&self) -> anyhow::Result<&str> {
            self.token
                .as_deref()
                .context("FINSIGHT_TOKEN (or --token) is required")
        }
    }

}
