use crate::domain::asset::{AssetCatalog, CatalogAsset};
use crate::domain::portfolio::{Portfolio, PortfolioDraft};
use crate::domain::report::SentimentEntry;
use crate::fixtures;
use crate::storage::PortfolioStore;
use chrono::Utc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct State {
    portfolios: Vec<Portfolio>,
    assets: Vec<CatalogAsset>,
    sentiment: Vec<SentimentEntry>,
    next_id: i64,
}

/// Process-local store, used when no database is configured.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new(
        assets: Vec<CatalogAsset>,
        portfolios: Vec<Portfolio>,
        sentiment: Vec<SentimentEntry>,
    ) -> Self {
        let next_id = portfolios.iter().map(|p| p.id).max().unwrap_or(0) + 1;
        Self {
            state: RwLock::new(State {
                portfolios,
                assets,
                sentiment,
                next_id,
            }),
        }
    }

    /// Reference catalog, demo portfolios, and sentiment readings ending today.
    pub fn seeded() -> Self {
        let assets = fixtures::seed_catalog();
        let portfolios = fixtures::demo_portfolios(&AssetCatalog::new(assets.clone()));
        Self::new(assets, portfolios, fixtures::seed_sentiment(Utc::now()))
    }
}

#[async_trait::async_trait]
impl PortfolioStore for MemoryStore {
    fn store_name(&self) -> &'static str {
        "memory"
    }

    async fn list_portfolios(&self) -> anyhow::Result<Vec<Portfolio>> {
        let state = self.state.read().await;
        let mut out = state.portfolios.clone();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(out)
    }

    async fn get_portfolio(&self, id: i64) -> anyhow::Result<Option<Portfolio>> {
        let state = self.state.read().await;
        Ok(state.portfolios.iter().find(|p| p.id == id).cloned())
    }

    async fn insert_portfolio(&self, draft: PortfolioDraft) -> anyhow::Result<Portfolio> {
        let mut state = self.state.write().await;
        let id = state.next_id;
        state.next_id += 1;
        let portfolio = draft.into_portfolio(id);
        state.portfolios.push(portfolio.clone());
        Ok(portfolio)
    }

    async fn upsert_portfolio(&self, portfolio: &Portfolio) -> anyhow::Result<()> {
        let mut state = self.state.write().await;
        match state.portfolios.iter_mut().find(|p| p.id == portfolio.id) {
            Some(existing) => *existing = portfolio.clone(),
            None => {
                state.next_id = state.next_id.max(portfolio.id + 1);
                state.portfolios.push(portfolio.clone());
            }
        }
        Ok(())
    }

    async fn list_assets(&self) -> anyhow::Result<Vec<CatalogAsset>> {
        let state = self.state.read().await;
        let mut out = state.assets.clone();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn get_asset(&self, id: i64) -> anyhow::Result<Option<CatalogAsset>> {
        let state = self.state.read().await;
        Ok(state.assets.iter().find(|a| a.id == id).cloned())
    }

    async fn latest_sentiment(&self) -> anyhow::Result<Option<SentimentEntry>> {
        let state = self.state.read().await;
        Ok(state.sentiment.iter().max_by_key(|e| (e.date, e.id)).cloned())
    }

    async fn sentiment_history(&self, limit: usize) -> anyhow::Result<Vec<SentimentEntry>> {
        let state = self.state.read().await;
        let mut out = state.sentiment.clone();
        out.sort_by_key(|e| (e.date, e.id));
        let skip = out.len().saturating_sub(limit);
        Ok(out.split_off(skip))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::portfolio::{MetricOverrides, PortfolioMetrics};

    fn draft(name: &str) -> PortfolioDraft {
        PortfolioDraft {
            name: name.to_string(),
            description: None,
            created_at: Utc::now(),
            is_ai_generated: false,
            holdings: Vec::new(),
            overrides: MetricOverrides::default(),
            metrics: PortfolioMetrics::default(),
        }
    }

    #[tokio::test]
    async fn seeded_store_lists_catalog_and_demos() {
        let store = MemoryStore::seeded();
        assert_eq!(store.list_assets().await.unwrap().len(), 15);
        assert_eq!(store.list_portfolios().await.unwrap().len(), 6);
        assert_eq!(store.get_asset(1).await.unwrap().unwrap().ticker, "VTI");
        assert!(store.get_asset(999).await.unwrap().is_none());
        assert!(store.get_portfolio(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sentiment_latest_and_history() {
        let store = MemoryStore::seeded();
        let latest = store.latest_sentiment().await.unwrap().unwrap();
        assert_eq!(latest.sentiment_score, 0.7);

        let history = store.sentiment_history(7).await.unwrap();
        let scores: Vec<f64> = history.iter().map(|e| e.sentiment_score).collect();
        assert_eq!(scores, vec![0.5, 0.3, 0.7]);
        assert!(history.windows(2).all(|w| w[0].date < w[1].date));

        let last_two = store.sentiment_history(2).await.unwrap();
        assert_eq!(last_two.len(), 2);
        assert_eq!(last_two[1].id, latest.id);
        assert!(store.sentiment_history(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_store_has_no_sentiment() {
        let store = MemoryStore::default();
        assert!(store.latest_sentiment().await.unwrap().is_none());
        assert!(store.sentiment_history(7).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn insert_assigns_fresh_ids() {
        let store = MemoryStore::seeded();
        let a = store.insert_portfolio(draft("a")).await.unwrap();
        let b = store.insert_portfolio(draft("b")).await.unwrap();
        assert_eq!(a.id, 7);
        assert_eq!(b.id, 8);
        assert_eq!(store.get_portfolio(8).await.unwrap().unwrap().name, "b");
    }

    #[tokio::test]
    async fn upsert_is_last_write_wins() {
        let store = MemoryStore::default();
        let mut p = store.insert_portfolio(draft("first")).await.unwrap();

        let mut stale = p.clone();
        p.name = "newer".to_string();
        store.upsert_portfolio(&p).await.unwrap();
        stale.name = "older".to_string();
        store.upsert_portfolio(&stale).await.unwrap();

        assert_eq!(store.get_portfolio(p.id).await.unwrap().unwrap().name, "older");
        assert_eq!(store.list_portfolios().await.unwrap().len(), 1);
    }
}
