use crate::config::Settings;
use crate::domain::asset::{AssetMetrics, CatalogAsset, CombinedAsset};
use crate::domain::portfolio::{MetricOverrides, Portfolio, PortfolioDraft, PortfolioMetrics};
use crate::domain::report::SentimentEntry;
use crate::fixtures;
use crate::storage::PortfolioStore;
use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;

type PortfolioRow = (
    i64,
    String,
    Option<String>,
    DateTime<Utc>,
    bool,
    Json<Vec<CombinedAsset>>,
    Json<MetricOverrides>,
    Json<PortfolioMetrics>,
);

type AssetRow = (
    i64,
    String,
    Option<String>,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Json<AssetMetrics>,
);

type SentimentRow = (i64, DateTime<Utc>, f64, String, DateTime<Utc>);

const PORTFOLIO_COLUMNS: &str =
    "id, name, description, created_at, is_ai_generated, holdings, overrides, metrics";
const ASSET_COLUMNS: &str =
    "id, ticker, isin, name, asset_type, sector, region, description, metrics";
const SENTIMENT_COLUMNS: &str = "id, date, sentiment_score, summary, created_at";

fn portfolio_from_row(row: PortfolioRow) -> Portfolio {
    let (id, name, description, created_at, is_ai_generated, holdings, overrides, metrics) = row;
    Portfolio {
        id,
        name,
        description,
        created_at,
        is_ai_generated,
        holdings: holdings.0,
        overrides: overrides.0,
        metrics: metrics.0,
    }
}

fn asset_from_row(row: AssetRow) -> CatalogAsset {
    let (id, ticker, isin, name, asset_type, sector, region, description, metrics) = row;
    CatalogAsset {
        id,
        ticker,
        isin,
        name,
        asset_type,
        sector,
        region,
        description,
        metrics: metrics.0,
    }
}

fn sentiment_from_row(row: SentimentRow) -> SentimentEntry {
    let (id, date, sentiment_score, summary, created_at) = row;
    SentimentEntry {
        id,
        date,
        sentiment_score,
        summary,
        created_at,
    }
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects, runs migrations, and seeds the catalog on first start.
    pub async fn connect(settings: &Settings) -> anyhow::Result<Self> {
        let db_url = settings.require_database_url()?;
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
            .context("connect DATABASE_URL failed")?;
        crate::storage::migrate(&pool).await?;

        let store = Self::new(pool);
        store.seed_catalog_if_empty().await?;
        store.seed_sentiment_if_empty().await?;
        Ok(store)
    }

    /// Loads the reference catalog into an empty `assets` table.
    pub async fn seed_catalog_if_empty(&self) -> anyhow::Result<usize> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM assets")
            .fetch_one(&self.pool)
            .await
            .context("count assets failed")?;
        if count > 0 {
            return Ok(0);
        }

        let assets = fixtures::seed_catalog();
        let mut tx = self.pool.begin().await.context("begin transaction failed")?;
        for a in &assets {
            sqlx::query(
                "INSERT INTO assets (id, ticker, isin, name, asset_type, sector, region, description, metrics) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
                 ON CONFLICT (id) DO NOTHING",
            )
            .bind(a.id)
            .bind(&a.ticker)
            .bind(&a.isin)
            .bind(&a.name)
            .bind(&a.asset_type)
            .bind(&a.sector)
            .bind(&a.region)
            .bind(&a.description)
            .bind(Json(&a.metrics))
            .execute(&mut *tx)
            .await
            .with_context(|| format!("insert asset {} failed", a.ticker))?;
        }
        tx.commit().await.context("commit transaction failed")?;

        tracing::info!(assets = assets.len(), "seeded asset catalog");
        Ok(assets.len())
    }

    pub async fn seed_sentiment_if_empty(&self) -> anyhow::Result<usize> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM market_sentiment")
            .fetch_one(&self.pool)
            .await
            .context("count market_sentiment failed")?;
        if count > 0 {
            return Ok(0);
        }

        let entries = fixtures::seed_sentiment(Utc::now());
        let mut tx = self.pool.begin().await.context("begin transaction failed")?;
        for e in &entries {
            sqlx::query(
                "INSERT INTO market_sentiment (date, sentiment_score, summary, created_at) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(e.date)
            .bind(e.sentiment_score)
            .bind(&e.summary)
            .bind(e.created_at)
            .execute(&mut *tx)
            .await
            .context("insert market_sentiment failed")?;
        }
        tx.commit().await.context("commit transaction failed")?;

        tracing::info!(entries = entries.len(), "seeded market sentiment");
        Ok(entries.len())
    }
}

#[async_trait::async_trait]
impl PortfolioStore for PgStore {
    fn store_name(&self) -> &'static str {
        "postgres"
    }

    async fn list_portfolios(&self) -> anyhow::Result<Vec<Portfolio>> {
        let rows = sqlx::query_as::<_, PortfolioRow>(&format!(
            "SELECT {PORTFOLIO_COLUMNS} FROM portfolios ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .context("select portfolios failed")?;
        Ok(rows.into_iter().map(portfolio_from_row).collect())
    }

    async fn get_portfolio(&self, id: i64) -> anyhow::Result<Option<Portfolio>> {
        let row = sqlx::query_as::<_, PortfolioRow>(&format!(
            "SELECT {PORTFOLIO_COLUMNS} FROM portfolios WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("select portfolio {id} failed"))?;
        Ok(row.map(portfolio_from_row))
    }

    async fn insert_portfolio(&self, draft: PortfolioDraft) -> anyhow::Result<Portfolio> {
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO portfolios (name, description, created_at, is_ai_generated, holdings, overrides, metrics) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING id",
        )
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(draft.created_at)
        .bind(draft.is_ai_generated)
        .bind(Json(&draft.holdings))
        .bind(Json(&draft.overrides))
        .bind(Json(&draft.metrics))
        .fetch_one(&self.pool)
        .await
        .context("insert portfolio failed")?;
        Ok(draft.into_portfolio(id))
    }

    async fn upsert_portfolio(&self, p: &Portfolio) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO portfolios (id, name, description, created_at, is_ai_generated, holdings, overrides, metrics) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (id) DO UPDATE SET \
               name = EXCLUDED.name, \
               description = EXCLUDED.description, \
               is_ai_generated = EXCLUDED.is_ai_generated, \
               holdings = EXCLUDED.holdings, \
               overrides = EXCLUDED.overrides, \
               metrics = EXCLUDED.metrics, \
               updated_at = now()",
        )
        .bind(p.id)
        .bind(&p.name)
        .bind(&p.description)
        .bind(p.created_at)
        .bind(p.is_ai_generated)
        .bind(Json(&p.holdings))
        .bind(Json(&p.overrides))
        .bind(Json(&p.metrics))
        .execute(&self.pool)
        .await
        .with_context(|| format!("upsert portfolio {} failed", p.id))?;
        Ok(())
    }

    async fn list_assets(&self) -> anyhow::Result<Vec<CatalogAsset>> {
        let rows = sqlx::query_as::<_, AssetRow>(&format!(
            "SELECT {ASSET_COLUMNS} FROM assets ORDER BY name ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .context("select assets failed")?;
        Ok(rows.into_iter().map(asset_from_row).collect())
    }

    async fn get_asset(&self, id: i64) -> anyhow::Result<Option<CatalogAsset>> {
        let row = sqlx::query_as::<_, AssetRow>(&format!(
            "SELECT {ASSET_COLUMNS} FROM assets WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("select asset {id} failed"))?;
        Ok(row.map(asset_from_row))
    }

    async fn latest_sentiment(&self) -> anyhow::Result<Option<SentimentEntry>> {
        let row = sqlx::query_as::<_, SentimentRow>(&format!(
            "SELECT {SENTIMENT_COLUMNS} FROM market_sentiment ORDER BY date DESC, id DESC LIMIT 1"
        ))
        .fetch_optional(&self.pool)
        .await
        .context("select latest market_sentiment failed")?;
        Ok(row.map(sentiment_from_row))
    }

    async fn sentiment_history(&self, limit: usize) -> anyhow::Result<Vec<SentimentEntry>> {
        let limit = i64::try_from(limit).context("sentiment history limit out of range")?;
        let mut rows = sqlx::query_as::<_, SentimentRow>(&format!(
            "SELECT {SENTIMENT_COLUMNS} FROM market_sentiment ORDER BY date DESC, id DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("select market_sentiment history failed")?;
        rows.reverse();
        Ok(rows.into_iter().map(sentiment_from_row).collect())
    }
}
