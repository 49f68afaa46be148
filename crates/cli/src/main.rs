use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use folioai_core::advisor::{Advisor, DEFAULT_SENTIMENT_DAYS};
use folioai_core::domain::allocation::{
    AllocationRequest, Bucket, BucketAllocation, OptimizationStrategy,
};
use folioai_core::domain::report::AnalysisKind;
use folioai_core::llm::Provider;
use folioai_core::settings::AiSettings;
use folioai_core::storage::{MemoryStore, PgStore, PortfolioStore};

#[derive(Debug, Parser)]
#[command(name = "folioai_cli")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Ask for a target allocation for the given bucket split.
    Suggest {
        #[command(flatten)]
        buckets: BucketArgs,

        /// ai_recommended | sharpe_ratio | risk_level
        #[arg(long)]
        strategy: String,

        /// 1..=5, only with --strategy risk_level.
        #[arg(long)]
        risk_tier: Option<u8>,
    },

    /// Propose (and optionally apply) a rebalance for a stored portfolio.
    Rebalance {
        #[arg(long)]
        portfolio_id: i64,

        #[arg(long)]
        strategy: String,

        #[arg(long)]
        risk_tier: Option<u8>,

        /// Write the proposed targets back to the portfolio.
        #[arg(long)]
        apply: bool,
    },

    /// performance | risk | allocation | rebalance
    Analyze {
        #[arg(long)]
        portfolio_id: i64,

        #[arg(long)]
        kind: String,
    },

    /// Current market sentiment analysis.
    Sentiment {
        /// Print the stored trend with today's score taken from the analysis.
        #[arg(long, conflicts_with = "latest")]
        history: bool,

        #[arg(long, default_value_t = DEFAULT_SENTIMENT_DAYS)]
        days: usize,

        /// Print only the most recent stored reading.
        #[arg(long)]
        latest: bool,
    },

    /// Generate a report from a local PDF.
    Report {
        #[arg(long)]
        pdf: PathBuf,

        #[arg(long)]
        prompt: Option<String>,
    },

    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Move one bucket and rebalance the other two to keep the total at 100.
    Adjust {
        #[command(flatten)]
        buckets: BucketArgs,

        #[arg(long)]
        bucket: String,

        #[arg(long)]
        value: u8,
    },

    /// List stored portfolios.
    Portfolios,
}

#[derive(Debug, clap::Args)]
struct BucketArgs {
    #[arg(long)]
    equities: u8,

    #[arg(long)]
    fixed_income: u8,

    #[arg(long)]
    alternatives: u8,
}

impl BucketArgs {
    fn allocation(&self) -> BucketAllocation {
        BucketAllocation::new(self.equities, self.fixed_income, self.alternatives)
    }
}

#[derive(Debug, Subcommand)]
enum SettingsAction {
    Show,
    Set {
        /// openrouter | openai
        #[arg(long)]
        provider: String,

        #[arg(long)]
        model: String,

        /// Leave unset to keep the saved key.
        #[arg(long)]
        api_key: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = folioai_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let command = match args.command {
        Command::Adjust {
            buckets,
            bucket,
            value,
        } => return adjust(&buckets, &bucket, value),
        command => command,
    };

    let store = open_store(&settings).await;
    let advisor = Advisor::from_settings(settings, store).await?;

    let result = run(&advisor, command).await;
    if let Err(err) = &result {
        sentry_anyhow::capture_anyhow(err);
        tracing::error!(error = %err, "command failed");
    }
    result
}

fn adjust(buckets: &BucketArgs, bucket: &str, value: u8) -> anyhow::Result<()> {
    let current = buckets.allocation();
    anyhow::ensure!(
        current.total() == 100,
        "bucket percentages must sum to 100 (got {})",
        current.total()
    );
    let bucket: Bucket = bucket.parse()?;
    print_json(&current.adjust(bucket, value))
}

async fn run(advisor: &Advisor, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Suggest {
            buckets,
            strategy,
            risk_tier,
        } => {
            let req = AllocationRequest {
                buckets: buckets.allocation(),
                strategy: strategy.parse()?,
                risk_tier,
            };
            req.validate()?;
            let suggestion = advisor.suggest_allocation(req).await?;
            if suggestion.is_fallback() {
                tracing::warn!(reason = ?suggestion.reason, "serving placeholder suggestion");
            }
            print_json(&suggestion)
        }
        Command::Rebalance {
            portfolio_id,
            strategy,
            risk_tier,
            apply,
        } => {
            let strategy: OptimizationStrategy = strategy.parse()?;
            let proposal = advisor
                .propose_rebalance(portfolio_id, strategy, risk_tier)
                .await?
                .with_context(|| format!("portfolio {portfolio_id} not found"))?;

            if !apply {
                return print_json(&proposal);
            }
            if proposal.is_fallback() {
                anyhow::bail!(
                    "rebalance proposal fell back to placeholder data; not applying ({})",
                    proposal.reason.as_deref().unwrap_or("unknown reason")
                );
            }
            let portfolio = advisor
                .apply_rebalance(portfolio_id, proposal.body.current_vs_target)
                .await?
                .with_context(|| format!("portfolio {portfolio_id} not found"))?;
            print_json(&portfolio)
        }
        Command::Analyze { portfolio_id, kind } => {
            let kind: AnalysisKind = kind.parse()?;
            let report = advisor
                .analyze_portfolio(portfolio_id, kind)
                .await?
                .with_context(|| format!("portfolio {portfolio_id} not found"))?;
            print_json(&report)
        }
        Command::Sentiment {
            history: true,
            days,
            ..
        } => print_json(&advisor.sentiment_trend(days).await?),
        Command::Sentiment { latest: true, .. } => {
            let entry = advisor
                .latest_sentiment()
                .await?
                .context("no market sentiment recorded")?;
            print_json(&entry)
        }
        Command::Sentiment { .. } => print_json(&advisor.market_sentiment().await),
        Command::Report { pdf, prompt } => {
            let bytes = tokio::fs::read(&pdf)
                .await
                .with_context(|| format!("read {} failed", pdf.display()))?;
            print_json(&advisor.generate_report(bytes, prompt).await)
        }
        Command::Settings { action } => match action {
            SettingsAction::Show => print_json(&advisor.ai_settings().await),
            SettingsAction::Set {
                provider,
                model,
                api_key,
            } => {
                let provider: Provider = provider.parse()?;
                let view = advisor
                    .update_ai_settings(AiSettings {
                        provider,
                        model,
                        api_key: api_key.unwrap_or_default(),
                    })
                    .await?;
                print_json(&view)
            }
        },
        Command::Portfolios => print_json(&advisor.list_portfolios().await?),
        Command::Adjust {
            buckets,
            bucket,
            value,
        } => adjust(&buckets, &bucket, value),
    }
}

async fn open_store(settings: &folioai_core::config::Settings) -> Arc<dyn PortfolioStore> {
    if settings.database_url.is_none() {
        tracing::warn!(
            "DATABASE_URL missing; using the in-memory demo store (changes are not persisted)"
        );
        return Arc::new(MemoryStore::seeded());
    }
    match PgStore::connect(settings).await {
        Ok(store) => Arc::new(store),
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(error = %err, "db setup failed; using the in-memory demo store");
            Arc::new(MemoryStore::seeded())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_sentry(settings: &folioai_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
