pub mod advisor;
pub mod domain;
pub mod feed;
pub mod fixtures;
pub mod llm;
pub mod reconcile;
pub mod report;
pub mod settings;
pub mod storage;

pub mod config {
    use anyhow::Context;
    use std::fmt;
    use std::path::PathBuf;

    const DEFAULT_SETTINGS_PATH: &str = "folioai-settings.json";
    const DEFAULT_PORT: u16 = 3000;

    #[derive(Clone, Default)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub sentry_dsn: Option<String>,
        pub ai_provider: Option<String>,
        pub ai_model: Option<String>,
        pub ai_api_key: Option<String>,
        pub ai_base_url: Option<String>,
        pub ai_timeout_secs: Option<u64>,
        pub ai_max_tokens: Option<u32>,
        pub risk_feed_url: Option<String>,
        pub risk_feed_timeout_secs: Option<u64>,
        pub settings_path: Option<String>,
        pub port: Option<u16>,
    }

    fn var(name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.trim().is_empty())
    }

    fn parsed<T: std::str::FromStr>(name: &str) -> anyhow::Result<Option<T>>
    where
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        var(name)
            .map(|v| v.trim().parse::<T>())
            .transpose()
            .with_context(|| format!("{name} is not a valid value"))
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                database_url: var("DATABASE_URL"),
                sentry_dsn: var("SENTRY_DSN"),
                ai_provider: var("AI_PROVIDER"),
                ai_model: var("AI_MODEL"),
                ai_api_key: var("AI_API_KEY").or_else(|| var("OPENROUTER_API_KEY")),
                ai_base_url: var("AI_BASE_URL"),
                ai_timeout_secs: parsed("AI_TIMEOUT_SECS")?,
                ai_max_tokens: parsed("AI_MAX_TOKENS")?,
                risk_feed_url: var("RISK_FEED_URL"),
                risk_feed_timeout_secs: parsed("RISK_FEED_TIMEOUT_SECS")?,
                settings_path: var("FOLIOAI_SETTINGS_PATH"),
                port: parsed("PORT")?,
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_risk_feed_url(&self) -> anyhow::Result<&str> {
            self.risk_feed_url
                .as_deref()
                .context("RISK_FEED_URL is required")
        }

        pub fn settings_path(&self) -> PathBuf {
            PathBuf::from(
                self.settings_path
                    .as_deref()
                    .unwrap_or(DEFAULT_SETTINGS_PATH),
            )
        }

        pub fn port(&self) -> u16 {
            self.port.unwrap_or(DEFAULT_PORT)
        }
    }

    impl fmt::Debug for Settings {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let set = |v: &Option<String>| if v.is_some() { "<set>" } else { "<unset>" };
            f.debug_struct("Settings")
                .field("database_url", &set(&self.database_url))
                .field("sentry_dsn", &set(&self.sentry_dsn))
                .field("ai_provider", &self.ai_provider)
                .field("ai_model", &self.ai_model)
                .field("ai_api_key", &set(&self.ai_api_key))
                .field("ai_base_url", &self.ai_base_url)
                .field("ai_timeout_secs", &self.ai_timeout_secs)
                .field("ai_max_tokens", &self.ai_max_tokens)
                .field("risk_feed_url", &self.risk_feed_url)
                .field("risk_feed_timeout_secs", &self.risk_feed_timeout_secs)
                .field("settings_path", &self.settings_path)
                .field("port", &self.port)
                .finish()
        }
    }
}
