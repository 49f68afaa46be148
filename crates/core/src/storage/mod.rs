pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::domain::asset::{AssetCatalog, CatalogAsset};
use crate::domain::portfolio::{Portfolio, PortfolioDraft};
use crate::domain::report::SentimentEntry;
use anyhow::Context;

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}

/// Writes are last-write-wins: two overlapping updates of the same portfolio both
/// succeed and the later one is what remains.
#[async_trait::async_trait]
pub trait PortfolioStore: Send + Sync {
    fn store_name(&self) -> &'static str;

    async fn list_portfolios(&self) -> anyhow::Result<Vec<Portfolio>>;

    async fn get_portfolio(&self, id: i64) -> anyhow::Result<Option<Portfolio>>;

    async fn insert_portfolio(&self, draft: PortfolioDraft) -> anyhow::Result<Portfolio>;

    /// Replaces the stored portfolio with the same id, or inserts it.
    async fn upsert_portfolio(&self, portfolio: &Portfolio) -> anyhow::Result<()>;

    async fn list_assets(&self) -> anyhow::Result<Vec<CatalogAsset>>;

    async fn get_asset(&self, id: i64) -> anyhow::Result<Option<CatalogAsset>>;

    async fn latest_sentiment(&self) -> anyhow::Result<Option<SentimentEntry>>;

    /// The most recent `limit` readings, oldest first.
    async fn sentiment_history(&self, limit: usize) -> anyhow::Result<Vec<SentimentEntry>>;

    async fn catalog(&self) -> anyhow::Result<AssetCatalog> {
        Ok(AssetCatalog::new(self.list_assets().await?))
    }
}
