use crate::domain::asset::CombinedAsset;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A portfolio-level figure together with where it came from.
///
/// `NotComputed` marks placeholder fields that have no formula or data source behind
/// them. Callers must not present those as real numbers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", content = "value", rename_all = "snake_case")]
pub enum Metric {
    Computed(f64),
    Supplied(f64),
    NotComputed,
}

impl Metric {
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Computed(v) | Self::Supplied(v) => Some(*v),
            Self::NotComputed => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioMetrics {
    pub return_1y: Metric,
    pub return_3y: Metric,
    pub volatility_3y: Metric,
    pub sharpe_3y: Metric,
    pub dividend_yield: Metric,
    pub expense_ratio: Metric,
    pub risk_score: Metric,
    pub asset_count: usize,
}

impl Default for PortfolioMetrics {
    fn default() -> Self {
        Self {
            return_1y: Metric::Computed(0.0),
            return_3y: Metric::Computed(0.0),
            volatility_3y: Metric::NotComputed,
            sharpe_3y: Metric::NotComputed,
            dividend_yield: Metric::NotComputed,
            expense_ratio: Metric::NotComputed,
            risk_score: Metric::NotComputed,
            asset_count: 0,
        }
    }
}

/// Values arriving from an upstream computation. Each one replaces the
/// corresponding recomputed field instead of being blended with it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricOverrides {
    pub risk_score: Option<f64>,
    pub sharpe_3y: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub is_ai_generated: bool,
    pub holdings: Vec<CombinedAsset>,
    pub overrides: MetricOverrides,
    pub metrics: PortfolioMetrics,
}

impl Portfolio {
    pub fn total_allocation(&self) -> f64 {
        self.holdings.iter().map(|h| h.allocation).sum()
    }
}

/// A portfolio before the store assigns its id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioDraft {
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub is_ai_generated: bool,
    pub holdings: Vec<CombinedAsset>,
    pub overrides: MetricOverrides,
    pub metrics: PortfolioMetrics,
}

impl PortfolioDraft {
    pub fn into_portfolio(self, id: i64) -> Portfolio {
        Portfolio {
            id,
            name: self.name,
            description: self.description,
            created_at: self.created_at,
            is_ai_generated: self.is_ai_generated,
            holdings: self.holdings,
            overrides: self.overrides,
            metrics: self.metrics,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPortfolio {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}
