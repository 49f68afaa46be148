use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Point-in-time figures for a catalog asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetMetrics {
    pub price: f64,
    pub return_1y: Option<f64>,
    pub return_3y: Option<f64>,
    pub volatility_3y: Option<f64>,
    pub sharpe_3y: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub expense_ratio: Option<f64>,
    pub risk_score: Option<f64>,
}

/// Reference record owned by the store. The reconciler only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogAsset {
    pub id: i64,
    pub ticker: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isin: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub asset_type: String,
    pub sector: Option<String>,
    pub region: Option<String>,
    pub description: Option<String>,
    pub metrics: AssetMetrics,
}

/// One row of an externally produced allocation list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedAsset {
    pub ticker: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub asset_type: Option<String>,
    pub allocation: f64,
}

impl SuggestedAsset {
    pub fn new(ticker: impl Into<String>, allocation: f64) -> Self {
        Self {
            ticker: ticker.into(),
            name: None,
            asset_type: None,
            allocation,
        }
    }
}

pub const UNKNOWN_ASSET_TYPE: &str = "unknown";

/// A suggestion joined with the catalog. `metrics` is `None` when the identifier is
/// not in the catalog; numeric figures are never invented for unknown assets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedAsset {
    pub ticker: String,
    pub name: String,
    #[serde(rename = "type")]
    pub asset_type: String,
    pub allocation: f64,
    pub asset_id: Option<i64>,
    pub sector: Option<String>,
    pub region: Option<String>,
    pub metrics: Option<AssetMetrics>,
}

impl CombinedAsset {
    pub fn in_catalog(&self) -> bool {
        self.asset_id.is_some()
    }
}

/// Read-only lookup over catalog assets by ticker or ISIN (exact, case-sensitive).
#[derive(Debug, Clone, Default)]
pub struct AssetCatalog {
    assets: Vec<CatalogAsset>,
    by_identifier: HashMap<String, usize>,
}

impl AssetCatalog {
    pub fn new(assets: Vec<CatalogAsset>) -> Self {
        let mut by_identifier = HashMap::with_capacity(assets.len() * 2);
        for (idx, asset) in assets.iter().enumerate() {
            // First entry wins on duplicate identifiers.
            by_identifier.entry(asset.ticker.clone()).or_insert(idx);
            if let Some(isin) = &asset.isin {
                by_identifier.entry(isin.clone()).or_insert(idx);
            }
        }
        Self {
            assets,
            by_identifier,
        }
    }

    pub fn lookup(&self, identifier: &str) -> Option<&CatalogAsset> {
        self.by_identifier
            .get(identifier)
            .and_then(|idx| self.assets.get(*idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(id: i64, ticker: &str, isin: Option<&str>) -> CatalogAsset {
        CatalogAsset {
            id,
            ticker: ticker.to_string(),
            isin: isin.map(str::to_string),
            name: format!("Name {ticker}"),
            asset_type: "ETF".to_string(),
            sector: None,
            region: None,
            description: None,
            metrics: AssetMetrics {
                price: 100.0,
                return_1y: Some(1.0),
                return_3y: None,
                volatility_3y: None,
                sharpe_3y: None,
                dividend_yield: None,
                expense_ratio: None,
                risk_score: None,
            },
        }
    }

    #[test]
    fn lookup_by_ticker_and_isin() {
        let catalog = AssetCatalog::new(vec![
            asset(1, "VTI", Some("US9229087690")),
            asset(2, "BND", None),
        ]);
        assert_eq!(catalog.lookup("VTI").map(|a| a.id), Some(1));
        assert_eq!(catalog.lookup("US9229087690").map(|a| a.id), Some(1));
        assert_eq!(catalog.lookup("BND").map(|a| a.id), Some(2));
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let catalog = AssetCatalog::new(vec![asset(1, "VTI", None)]);
        assert!(catalog.lookup("vti").is_none());
        assert!(catalog.lookup(" VTI").is_none());
    }

    #[test]
    fn suggested_asset_accepts_type_key() {
        let s: SuggestedAsset = serde_json::from_value(serde_json::json!({
            "ticker": "GLD",
            "name": "SPDR Gold Shares",
            "type": "ETF",
            "allocation": 5.0,
        }))
        .unwrap();
        assert_eq!(s.asset_type.as_deref(), Some("ETF"));
    }
}
