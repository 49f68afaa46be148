//! Portfolio advisor. Provider, feed and parse failures are logged and replaced with
//! placeholder data tagged [`Source::Fallback`]; store failures are returned as errors.

use crate::config::Settings;
use crate::domain::allocation::{validate_strategy, AllocationRequest, OptimizationStrategy};
use crate::domain::asset::{CatalogAsset, CombinedAsset, SuggestedAsset};
use crate::domain::contract::describe_action;
use crate::domain::portfolio::{
    MetricOverrides, NewPortfolio, Portfolio, PortfolioDraft, PortfolioMetrics,
};
use crate::domain::report::{
    overlay_day_score, AnalysisKind, AnalysisReport, RebalanceProposal, RebalanceRow,
    SentimentEntry, SentimentReport, SentimentTrend, SuggestionDraft,
};
use crate::feed::{HttpRiskProfileFeed, RiskProfileFeed};
use crate::fixtures;
use crate::llm::chat::ChatCompletionClient;
use crate::llm::error::{LlmDiagnosticsError, NormalizeError};
use crate::llm::{normalize, prompts, CompletionInput, LlmClient};
use crate::reconcile::{recompute_metrics, reconcile};
use crate::report;
use crate::settings::{AiSettings, AiSettingsView, SettingsStore};
use crate::storage::PortfolioStore;
use anyhow::Context;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Provider,
    RiskFeed,
    Fallback,
}

/// A result together with where it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sourced<T> {
    pub source: Source,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(flatten)]
    pub body: T,
}

impl<T> Sourced<T> {
    fn new(source: Source, body: T) -> Self {
        Self {
            source,
            reason: None,
            body,
        }
    }

    fn fallback(reason: &anyhow::Error, body: T) -> Self {
        Self {
            source: Source::Fallback,
            reason: Some(failure_reason(reason)),
            body,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.source == Source::Fallback
    }
}

/// Response body the completion endpoint sent with a failure, if any.
fn endpoint_body(e: &anyhow::Error) -> Option<&str> {
    e.downcast_ref::<LlmDiagnosticsError>()
        .and_then(|diag| diag.raw_output.as_deref())
        .map(str::trim)
        .filter(|body| !body.is_empty())
}

pub const DEFAULT_SENTIMENT_DAYS: usize = 7;
pub const MAX_SENTIMENT_DAYS: usize = 365;

const MAX_REASON_BODY_CHARS: usize = 1_000;

fn failure_reason(e: &anyhow::Error) -> String {
    match endpoint_body(e) {
        Some(body) => {
            let body: String = body.chars().take(MAX_REASON_BODY_CHARS).collect();
            format!("{e:#}; response: {body}")
        }
        None => format!("{e:#}"),
    }
}

/// Suggested allocation, reconciled against the catalog, with the metrics the
/// portfolio would have.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationSuggestion {
    pub request: AllocationRequest,
    #[serde(flatten)]
    pub draft: SuggestionDraft,
    pub holdings: Vec<CombinedAsset>,
    pub overrides: MetricOverrides,
    pub metrics: PortfolioMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiPortfolioInput {
    pub request: AllocationRequest,
    pub suggestions: Vec<SuggestedAsset>,
    #[serde(default)]
    pub name: Option<String>,
    /// Sharpe ratio supplied by the risk-profile feed, if any.
    #[serde(default)]
    pub sharpe_3y: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedReport {
    pub report: String,
}

struct AiState {
    settings: AiSettings,
    client: Arc<dyn LlmClient>,
}

pub struct Advisor {
    env: Settings,
    store: Arc<dyn PortfolioStore>,
    feed: Option<Arc<dyn RiskProfileFeed>>,
    settings_store: Option<SettingsStore>,
    ai: RwLock<AiState>,
}

impl Advisor {
    pub fn new(
        store: Arc<dyn PortfolioStore>,
        client: Arc<dyn LlmClient>,
        feed: Option<Arc<dyn RiskProfileFeed>>,
    ) -> Self {
        let settings = AiSettings {
            provider: client.provider(),
            model: client.model().to_string(),
            api_key: String::new(),
        };
        Self {
            env: Settings::default(),
            store,
            feed,
            settings_store: None,
            ai: RwLock::new(AiState { settings, client }),
        }
    }

    /// Wires the HTTP clients from environment and saved settings.
    pub async fn from_settings(
        env: Settings,
        store: Arc<dyn PortfolioStore>,
    ) -> anyhow::Result<Self> {
        let settings_store = SettingsStore::new(env.settings_path());
        let ai = settings_store.load_or_default(&env).await?;
        let client: Arc<dyn LlmClient> = Arc::new(ChatCompletionClient::from_settings(&env, &ai)?);

        let feed: Option<Arc<dyn RiskProfileFeed>> =
            match HttpRiskProfileFeed::from_settings(&env) {
                Ok(feed) => Some(Arc::new(feed)),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "risk feed disabled; risk-tier requests use the AI provider"
                    );
                    None
                }
            };

        tracing::info!(
            provider = %ai.provider,
            model = %ai.model,
            api_key_set = ai.has_api_key(),
            store = store.store_name(),
            "advisor configured"
        );

        Ok(Self {
            env,
            store,
            feed,
            settings_store: Some(settings_store),
            ai: RwLock::new(AiState { settings: ai, client }),
        })
    }

    async fn client(&self) -> Arc<dyn LlmClient> {
        self.ai.read().await.client.clone()
    }

    async fn ask<T>(
        &self,
        input: CompletionInput,
        parse: impl FnOnce(&str) -> Result<T, NormalizeError>,
    ) -> anyhow::Result<T> {
        let client = self.client().await;
        let text = client.complete(input).await?;
        parse(&text).map_err(|e| {
            tracing::debug!(model = %client.model(), raw = %text, "unusable completion");
            anyhow::Error::new(e)
        })
    }

    pub async fn suggest_allocation(
        &self,
        req: AllocationRequest,
    ) -> anyhow::Result<Sourced<AllocationSuggestion>> {
        req.validate()?;

        let mut overrides = MetricOverrides {
            risk_score: req.risk_tier.map(f64::from),
            sharpe_3y: None,
        };

        let attempt = match (req.strategy, req.risk_tier, &self.feed) {
            (OptimizationStrategy::RiskLevel, Some(tier), Some(feed)) => feed
                .fetch_profile(tier)
                .await
                .map(|profile| {
                    overrides.sharpe_3y = profile.sharpe_ratio;
                    let draft = SuggestionDraft {
                        suggestions: profile.suggestions,
                        analysis: format!(
                            "Reference allocation for risk tier {tier} of 5 from the risk-profile service."
                        ),
                        expected_return: profile.expected_return,
                        risk_assessment: Some(fixtures::rebalance_label(
                            req.strategy,
                            req.risk_tier,
                        )),
                    };
                    (Source::RiskFeed, draft)
                })
                .with_context(|| format!("risk feed ({}) failed", feed.feed_name())),
            _ => self
                .ask(
                    CompletionInput::json(prompts::allocation_prompt(&req)),
                    normalize::parse_suggestion,
                )
                .await
                .map(|draft| (Source::Provider, draft)),
        };

        let (source, reason, draft) = match attempt {
            Ok((source, draft)) => (source, None, draft),
            Err(e) => {
                tracing::error!(
                    strategy = %req.strategy,
                    risk_tier = ?req.risk_tier,
                    error = %e,
                    endpoint_body = ?endpoint_body(&e),
                    "allocation suggestion failed; serving placeholder allocation"
                );
                (Source::Fallback, Some(e), fixtures::fallback_suggestion(&req))
            }
        };

        let catalog = self.store.catalog().await?;
        let holdings = reconcile(&draft.suggestions, &catalog);
        let metrics = recompute_metrics(&holdings, &overrides);
        let body = AllocationSuggestion {
            request: req,
            draft,
            holdings,
            overrides,
            metrics,
        };

        Ok(match reason {
            None => Sourced::new(source, body),
            Some(e) => Sourced::fallback(&e, body),
        })
    }

    pub async fn create_portfolio(&self, input: NewPortfolio) -> anyhow::Result<Portfolio> {
        let name = input.name.trim();
        anyhow::ensure!(!name.is_empty(), "portfolio name must be non-empty");

        let overrides = MetricOverrides::default();
        let portfolio = self
            .store
            .insert_portfolio(PortfolioDraft {
                name: name.to_string(),
                description: input.description,
                created_at: Utc::now(),
                is_ai_generated: false,
                holdings: Vec::new(),
                overrides,
                metrics: recompute_metrics(&[], &overrides),
            })
            .await?;
        tracing::info!(portfolio_id = portfolio.id, "portfolio created");
        Ok(portfolio)
    }

    pub async fn create_ai_portfolio(&self, input: AiPortfolioInput) -> anyhow::Result<Portfolio> {
        let req = input.request;
        req.validate()?;
        anyhow::ensure!(
            !input.suggestions.is_empty(),
            "an AI portfolio needs at least one suggested asset"
        );

        let catalog = self.store.catalog().await?;
        let holdings = reconcile(&input.suggestions, &catalog);
        let overrides = MetricOverrides {
            risk_score: req.risk_tier.map(f64::from),
            sharpe_3y: input.sharpe_3y,
        };
        let metrics = recompute_metrics(&holdings, &overrides);

        let now = Utc::now();
        let name = input
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("AI Portfolio {}", now.format("%Y-%m-%d")));
        let description = format!(
            "AI-generated portfolio based on {}% equities, {}% fixed income, {}% alternatives with {}",
            req.buckets.equities,
            req.buckets.fixed_income,
            req.buckets.alternatives,
            req.strategy_label()
        );

        let portfolio = self
            .store
            .insert_portfolio(PortfolioDraft {
                name,
                description: Some(description),
                created_at: now,
                is_ai_generated: true,
                holdings,
                overrides,
                metrics,
            })
            .await?;
        tracing::info!(
            portfolio_id = portfolio.id,
            assets = portfolio.holdings.len(),
            "AI portfolio created"
        );
        Ok(portfolio)
    }

    pub async fn propose_rebalance(
        &self,
        portfolio_id: i64,
        strategy: OptimizationStrategy,
        risk_tier: Option<u8>,
    ) -> anyhow::Result<Option<Sourced<RebalanceProposal>>> {
        validate_strategy(strategy, risk_tier)?;
        let Some(portfolio) = self.store.get_portfolio(portfolio_id).await? else {
            return Ok(None);
        };

        let attempt = self
            .ask(
                CompletionInput::json(prompts::rebalance_prompt(&portfolio, strategy, risk_tier)),
                normalize::parse_rebalance,
            )
            .await;

        Ok(Some(match attempt {
            Ok(proposal) => {
                Sourced::new(Source::Provider, align_with_holdings(proposal, &portfolio))
            }
            Err(e) => {
                tracing::error!(
                    portfolio_id,
                    strategy = %strategy,
                    error = %e,
                    endpoint_body = ?endpoint_body(&e),
                    "rebalance proposal failed; keeping current weights"
                );
                Sourced::fallback(&e, fixtures::fallback_rebalance(&portfolio, strategy, risk_tier))
            }
        }))
    }

    /// Replaces the holdings with the targets in `rows`. Rows targeting 0% are sold.
    pub async fn apply_rebalance(
        &self,
        portfolio_id: i64,
        rows: Vec<RebalanceRow>,
    ) -> anyhow::Result<Option<Portfolio>> {
        anyhow::ensure!(!rows.is_empty(), "rebalance needs at least one target row");
        let Some(mut portfolio) = self.store.get_portfolio(portfolio_id).await? else {
            return Ok(None);
        };

        let suggestions: Vec<SuggestedAsset> = rows
            .into_iter()
            .filter(|r| r.target > 0.0)
            .map(|r| SuggestedAsset {
                ticker: r.ticker,
                name: r.name,
                asset_type: None,
                allocation: r.target,
            })
            .collect();

        let catalog = self.store.catalog().await?;
        portfolio.holdings = reconcile(&suggestions, &catalog);
        portfolio.metrics = recompute_metrics(&portfolio.holdings, &portfolio.overrides);
        self.store.upsert_portfolio(&portfolio).await?;

        tracing::info!(
            portfolio_id,
            assets = portfolio.holdings.len(),
            total = portfolio.total_allocation(),
            "rebalance applied"
        );
        Ok(Some(portfolio))
    }

    pub async fn analyze_portfolio(
        &self,
        portfolio_id: i64,
        kind: AnalysisKind,
    ) -> anyhow::Result<Option<Sourced<AnalysisReport>>> {
        let Some(portfolio) = self.store.get_portfolio(portfolio_id).await? else {
            return Ok(None);
        };

        let attempt = self
            .ask(
                CompletionInput::json(prompts::analysis_prompt(&portfolio, kind)),
                |text| normalize::parse_analysis(text, kind),
            )
            .await;

        Ok(Some(match attempt {
            Ok(report) => Sourced::new(Source::Provider, report),
            Err(e) => {
                tracing::error!(
                    portfolio_id,
                    kind = kind.as_str(),
                    error = %e,
                    endpoint_body = ?endpoint_body(&e),
                    "portfolio analysis failed; serving placeholder analysis"
                );
                Sourced::fallback(&e, fixtures::fallback_analysis(kind))
            }
        }))
    }

    pub async fn market_sentiment(&self) -> Sourced<SentimentReport> {
        let attempt = self
            .ask(
                CompletionInput::json(prompts::sentiment_prompt(Utc::now().date_naive())),
                normalize::parse_sentiment,
            )
            .await;

        match attempt {
            Ok(report) => Sourced::new(Source::Provider, report),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    endpoint_body = ?endpoint_body(&e),
                    "market sentiment failed; serving placeholder sentiment"
                );
                Sourced::fallback(&e, fixtures::fallback_sentiment())
            }
        }
    }

    pub async fn latest_sentiment(&self) -> anyhow::Result<Option<SentimentEntry>> {
        self.store.latest_sentiment().await
    }

    /// Stored readings for the last `days` days with today's reading replaced by the
    /// current analysis score. The source is that of the analysis.
    pub async fn sentiment_trend(&self, days: usize) -> anyhow::Result<Sourced<SentimentTrend>> {
        anyhow::ensure!(
            (1..=MAX_SENTIMENT_DAYS).contains(&days),
            "days must be 1..={MAX_SENTIMENT_DAYS} (got {days})"
        );
        let mut history = self.store.sentiment_history(days).await?;
        let analysis = self.market_sentiment().await;

        let today = Utc::now().date_naive();
        let replaced = overlay_day_score(&mut history, today, analysis.body.sentiment_score);
        tracing::debug!(%today, replaced, "overlaid current sentiment on history");

        Ok(Sourced {
            source: analysis.source,
            reason: analysis.reason,
            body: SentimentTrend {
                history,
                analysis: analysis.body,
            },
        })
    }

    /// Extracts the PDF text locally and returns the provider's answer verbatim.
    pub async fn generate_report(
        &self,
        pdf: Vec<u8>,
        prompt: Option<String>,
    ) -> Sourced<GeneratedReport> {
        let instructions = prompt
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| prompts::DEFAULT_REPORT_PROMPT.to_string());

        match self.report_text(pdf, &instructions).await {
            Ok(report) => Sourced::new(Source::Provider, GeneratedReport { report }),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    endpoint_body = ?endpoint_body(&e),
                    "report generation failed"
                );
                Sourced::fallback(
                    &e,
                    GeneratedReport {
                        report: fixtures::REPORT_FAILURE_PLACEHOLDER.to_string(),
                    },
                )
            }
        }
    }

    async fn report_text(&self, pdf: Vec<u8>, instructions: &str) -> anyhow::Result<String> {
        let pages = tokio::task::spawn_blocking(move || report::extract_pdf_pages(&pdf))
            .await
            .context("PDF extraction task failed")??;
        tracing::debug!(pages = pages.len(), "extracted PDF text");

        let input = CompletionInput {
            system: prompts::system_prompt_report(),
            user: prompts::report_prompt(instructions, &report::document_text(&pages)),
        };
        self.client().await.complete(input).await
    }

    pub async fn list_portfolios(&self) -> anyhow::Result<Vec<Portfolio>> {
        self.store.list_portfolios().await
    }

    pub async fn get_portfolio(&self, id: i64) -> anyhow::Result<Option<Portfolio>> {
        self.store.get_portfolio(id).await
    }

    pub async fn list_assets(&self) -> anyhow::Result<Vec<CatalogAsset>> {
        self.store.list_assets().await
    }

    pub async fn get_asset(&self, id: i64) -> anyhow::Result<Option<CatalogAsset>> {
        self.store.get_asset(id).await
    }

    pub async fn ai_settings(&self) -> AiSettingsView {
        self.ai.read().await.settings.public_view()
    }

    /// Saves the settings and swaps the completion client. An empty API key keeps
    /// the current one.
    pub async fn update_ai_settings(&self, mut next: AiSettings) -> anyhow::Result<AiSettingsView> {
        anyhow::ensure!(!next.model.trim().is_empty(), "model must be non-empty");
        next.model = next.model.trim().to_string();

        let mut ai = self.ai.write().await;
        if !next.has_api_key() {
            next.api_key = ai.settings.api_key.clone();
        }
        let client = ChatCompletionClient::from_settings(&self.env, &next)?;
        if let Some(store) = &self.settings_store {
            store.save(&next).await?;
        }

        ai.client = Arc::new(client);
        ai.settings = next;
        Ok(ai.settings.public_view())
    }
}

/// Takes `current` from the stored holdings and keeps only tickers the portfolio holds.
fn align_with_holdings(proposal: RebalanceProposal, portfolio: &Portfolio) -> RebalanceProposal {
    let rows = portfolio
        .holdings
        .iter()
        .map(|h| {
            let target = proposal
                .current_vs_target
                .iter()
                .find(|r| r.ticker == h.ticker)
                .map(|r| r.target)
                .unwrap_or(h.allocation);
            RebalanceRow {
                ticker: h.ticker.clone(),
                name: Some(h.name.clone()),
                current: h.allocation,
                target,
                action: describe_action(h.allocation, target),
            }
        })
        .collect();

    let dropped = proposal
        .current_vs_target
        .iter()
        .filter(|r| !portfolio.holdings.iter().any(|h| h.ticker == r.ticker))
        .count();
    if dropped > 0 {
        tracing::debug!(
            portfolio_id = portfolio.id,
            dropped,
            "ignored rebalance rows for tickers not held"
        );
    }

    RebalanceProposal {
        summary: proposal.summary,
        current_vs_target: rows,
        recommendations: proposal.recommendations,
    }
}
