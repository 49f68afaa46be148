use crate::config::Settings;
use crate::feed::parse::{parse_risk_profile, RiskProfile};
use anyhow::{Context, Result};
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Per-tier reference allocations from an external service.
#[async_trait::async_trait]
pub trait RiskProfileFeed: Send + Sync {
    fn feed_name(&self) -> &'static str;

    async fn fetch_profile(&self, risk_tier: u8) -> Result<RiskProfile>;
}

#[derive(Debug, Clone)]
pub struct HttpRiskProfileFeed {
    http: reqwest::Client,
    url: String,
}

impl HttpRiskProfileFeed {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let url = settings.require_risk_feed_url()?.to_string();
        let timeout_secs = settings
            .risk_feed_timeout_secs
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build risk feed http client")?;

        Ok(Self { http, url })
    }
}

#[async_trait::async_trait]
impl RiskProfileFeed for HttpRiskProfileFeed {
    fn feed_name(&self) -> &'static str {
        "http_text"
    }

    async fn fetch_profile(&self, risk_tier: u8) -> Result<RiskProfile> {
        anyhow::ensure!(
            (1..=5).contains(&risk_tier),
            "risk tier must be within 1..=5, got {risk_tier}"
        );

        let res = self
            .http
            .get(&self.url)
            .query(&[("risk_level", risk_tier.to_string())])
            .send()
            .await
            .context("risk feed request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read risk feed response")?;
        if !status.is_success() {
            anyhow::bail!("risk feed HTTP {status}: {text}");
        }

        let profile = parse_risk_profile(risk_tier, &text)?;
        tracing::debug!(
            risk_tier,
            assets = profile.suggestions.len(),
            "fetched risk profile"
        );
        Ok(profile)
    }
}
