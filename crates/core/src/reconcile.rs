use crate::domain::asset::{AssetCatalog, CombinedAsset, SuggestedAsset, UNKNOWN_ASSET_TYPE};
use crate::domain::portfolio::{Metric, MetricOverrides, PortfolioMetrics};

/// One output row per input row, in input order. Duplicates are kept.
pub fn reconcile(suggestions: &[SuggestedAsset], catalog: &AssetCatalog) -> Vec<CombinedAsset> {
    suggestions
        .iter()
        .map(|s| match catalog.lookup(&s.ticker) {
            Some(asset) => CombinedAsset {
                ticker: asset.ticker.clone(),
                name: asset.name.clone(),
                asset_type: asset.asset_type.clone(),
                allocation: s.allocation,
                asset_id: Some(asset.id),
                sector: asset.sector.clone(),
                region: asset.region.clone(),
                metrics: Some(asset.metrics.clone()),
            },
            None => {
                tracing::debug!(ticker = %s.ticker, "suggested asset not in catalog");
                CombinedAsset {
                    ticker: s.ticker.clone(),
                    name: s.ticker.clone(),
                    asset_type: UNKNOWN_ASSET_TYPE.to_string(),
                    allocation: s.allocation,
                    asset_id: None,
                    sector: None,
                    region: None,
                    metrics: None,
                }
            }
        })
        .collect()
}

/// Σ(allocation × value) / 100; holdings without a value contribute nothing.
fn weighted(holdings: &[CombinedAsset], value: impl Fn(&CombinedAsset) -> Option<f64>) -> f64 {
    let sum = holdings
        .iter()
        .fold(0.0, |acc, h| acc + h.allocation * value(h).unwrap_or(0.0));
    sum / 100.0
}

pub fn recompute_metrics(
    holdings: &[CombinedAsset],
    overrides: &MetricOverrides,
) -> PortfolioMetrics {
    let supplied = |v: Option<f64>| v.map(Metric::Supplied).unwrap_or(Metric::NotComputed);

    PortfolioMetrics {
        return_1y: Metric::Computed(weighted(holdings, |h| {
            h.metrics.as_ref().and_then(|m| m.return_1y)
        })),
        return_3y: Metric::Computed(weighted(holdings, |h| {
            h.metrics.as_ref().and_then(|m| m.return_3y)
        })),
        volatility_3y: Metric::NotComputed,
        sharpe_3y: supplied(overrides.sharpe_3y),
        dividend_yield: Metric::NotComputed,
        expense_ratio: Metric::NotComputed,
        risk_score: supplied(overrides.risk_score),
        asset_count: holdings.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::asset::{AssetMetrics, CatalogAsset};

    fn catalog_asset(
        id: i64,
        ticker: &str,
        return_1y: Option<f64>,
        return_3y: Option<f64>,
    ) -> CatalogAsset {
        CatalogAsset {
            id,
            ticker: ticker.to_string(),
            isin: None,
            name: format!("{ticker} fund"),
            asset_type: "ETF".to_string(),
            sector: Some("Broad Market".to_string()),
            region: Some("US".to_string()),
            description: None,
            metrics: AssetMetrics {
                price: 100.0,
                return_1y,
                return_3y,
                volatility_3y: Some(15.0),
                sharpe_3y: Some(1.1),
                dividend_yield: Some(1.5),
                expense_ratio: Some(0.03),
                risk_score: Some(5.0),
            },
        }
    }

    fn catalog() -> AssetCatalog {
        AssetCatalog::new(vec![
            catalog_asset(1, "id1", Some(10.0), Some(30.0)),
            catalog_asset(2, "id2", Some(-5.0), None),
        ])
    }

    #[test]
    fn weighted_one_year_return_is_exact() {
        let holdings = reconcile(
            &[SuggestedAsset::new("id1", 60.0), SuggestedAsset::new("id2", 40.0)],
            &catalog(),
        );
        let m = recompute_metrics(&holdings, &MetricOverrides::default());
        assert_eq!(m.return_1y, Metric::Computed(4.0));
        assert_eq!(m.return_3y, Metric::Computed(18.0));
        assert_eq!(m.asset_count, 2);
    }

    #[test]
    fn placeholder_fields_are_marked_not_computed() {
        let holdings = reconcile(&[SuggestedAsset::new("id1", 100.0)], &catalog());
        let m = recompute_metrics(&holdings, &MetricOverrides::default());
        assert_eq!(m.volatility_3y, Metric::NotComputed);
        assert_eq!(m.sharpe_3y, Metric::NotComputed);
        assert_eq!(m.dividend_yield, Metric::NotComputed);
        assert_eq!(m.expense_ratio, Metric::NotComputed);
        assert_eq!(m.risk_score, Metric::NotComputed);
    }

    #[test]
    fn overrides_replace_fields() {
        let holdings = reconcile(&[SuggestedAsset::new("id1", 100.0)], &catalog());
        let overrides = MetricOverrides {
            risk_score: Some(4.0),
            sharpe_3y: Some(0.85),
        };
        let m = recompute_metrics(&holdings, &overrides);
        assert_eq!(m.risk_score, Metric::Supplied(4.0));
        assert_eq!(m.sharpe_3y, Metric::Supplied(0.85));
    }

    #[test]
    fn unknown_identifier_degrades_without_inventing_numbers() {
        let rows = reconcile(&[SuggestedAsset::new("ZZZ", 25.0)], &catalog());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "ZZZ");
        assert_eq!(rows[0].asset_type, "unknown");
        assert_eq!(rows[0].allocation, 25.0);
        assert!(rows[0].metrics.is_none());
        assert!(!rows[0].in_catalog());

        let m = recompute_metrics(&rows, &MetricOverrides::default());
        assert_eq!(m.return_1y, Metric::Computed(0.0));
    }

    #[test]
    fn reconcile_is_idempotent_and_order_preserving() {
        let input = vec![
            SuggestedAsset::new("id2", 10.0),
            SuggestedAsset::new("ZZZ", 30.0),
            SuggestedAsset::new("id1", 20.0),
            SuggestedAsset::new("id2", 40.0),
        ];
        let first = reconcile(&input, &catalog());
        let second = reconcile(&input, &catalog());
        assert_eq!(first, second);

        let tickers: Vec<_> = first.iter().map(|r| r.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["id2", "ZZZ", "id1", "id2"]);
    }

    #[test]
    fn empty_holdings_yield_zero_metrics() {
        let m = recompute_metrics(&[], &MetricOverrides::default());
        assert_eq!(m.return_1y, Metric::Computed(0.0));
        assert_eq!(m.return_3y, Metric::Computed(0.0));
        assert_eq!(m.asset_count, 0);
    }

    #[test]
    fn catalog_fields_overlay_suggested_allocation() {
        let mut s = SuggestedAsset::new("id1", 55.0);
        s.name = Some("model-provided name".to_string());
        let rows = reconcile(&[s], &catalog());
        assert_eq!(rows[0].name, "id1 fund");
        assert_eq!(rows[0].allocation, 55.0);
        assert_eq!(rows[0].asset_id, Some(1));
    }
}
