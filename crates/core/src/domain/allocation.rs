use anyhow::{bail, ensure};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the target portfolio should be optimized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationStrategy {
    /// Fixed risk tier (1..=5) chosen by the user.
    RiskLevel,
    /// Maximize risk-adjusted return.
    SharpeRatio,
    /// Let the provider choose.
    AiRecommended,
}

impl OptimizationStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RiskLevel => "risk_level",
            Self::SharpeRatio => "sharpe_ratio",
            Self::AiRecommended => "ai_recommended",
        }
    }
}

impl fmt::Display for OptimizationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OptimizationStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "risk_level" | "risk-level" => Ok(Self::RiskLevel),
            "sharpe_ratio" | "sharpe-ratio" => Ok(Self::SharpeRatio),
            "ai_recommended" | "ai-recommended" => Ok(Self::AiRecommended),
            other => bail!("unknown optimization strategy: {other}"),
        }
    }
}

/// Coarse conservative-to-aggressive bucket used to pick placeholder data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBand {
    Low,
    Medium,
    High,
}

impl RiskBand {
    pub fn from_tier(tier: u8) -> Self {
        match tier {
            0..=2 => Self::Low,
            3 => Self::Medium,
            _ => Self::High,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Target split across the three coarse buckets, in whole percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketAllocation {
    pub equities: u8,
    pub fixed_income: u8,
    pub alternatives: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Equities,
    FixedIncome,
    Alternatives,
}

impl std::str::FromStr for Bucket {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "equities" | "stocks" => Ok(Self::Equities),
            "fixed_income" | "fixed-income" | "bonds" => Ok(Self::FixedIncome),
            "alternatives" | "alt" => Ok(Self::Alternatives),
            other => bail!("unknown bucket: {other}"),
        }
    }
}

impl Default for BucketAllocation {
    fn default() -> Self {
        Self {
            equities: 60,
            fixed_income: 30,
            alternatives: 10,
        }
    }
}

impl BucketAllocation {
    pub fn new(equities: u8, fixed_income: u8, alternatives: u8) -> Self {
        Self {
            equities,
            fixed_income,
            alternatives,
        }
    }

    pub fn total(&self) -> u32 {
        self.equities as u32 + self.fixed_income as u32 + self.alternatives as u32
    }

    pub fn get(&self, bucket: Bucket) -> u8 {
        match bucket {
            Bucket::Equities => self.equities,
            Bucket::FixedIncome => self.fixed_income,
            Bucket::Alternatives => self.alternatives,
        }
    }

    fn slot(&mut self, bucket: Bucket) -> &mut u8 {
        match bucket {
            Bucket::Equities => &mut self.equities,
            Bucket::FixedIncome => &mut self.fixed_income,
            Bucket::Alternatives => &mut self.alternatives,
        }
    }

    /// The two buckets that were not touched, in declaration order.
    fn others(bucket: Bucket) -> [Bucket; 2] {
        match bucket {
            Bucket::Equities => [Bucket::FixedIncome, Bucket::Alternatives],
            Bucket::FixedIncome => [Bucket::Equities, Bucket::Alternatives],
            Bucket::Alternatives => [Bucket::Equities, Bucket::FixedIncome],
        }
    }

    /// Set one bucket and rescale the other two so the three still sum to 100.
    ///
    /// The untouched buckets keep their ratio (within integer rounding). Any rounding
    /// error lands on the first untouched bucket. When both untouched buckets are zero
    /// the remainder is split evenly, with the odd point going to the first.
    pub fn adjust(&self, bucket: Bucket, value: u8) -> Self {
        let value = value.min(100);
        let mut next = *self;
        *next.slot(bucket) = value;

        if next.total() == 100 {
            return next;
        }

        let [first, second] = Self::others(bucket);
        let remaining = 100 - value as i32;
        let other_total = next.get(first) as i32 + next.get(second) as i32;

        if other_total > 0 {
            let factor = remaining as f64 / other_total as f64;
            let a = (next.get(first) as f64 * factor).round() as i32;
            let b = (next.get(second) as f64 * factor).round() as i32;
            // Rounding can only overshoot by one point, never below zero on `first`.
            let a = (a + (remaining - a - b)).clamp(0, 100);
            *next.slot(first) = a as u8;
            *next.slot(second) = b.clamp(0, 100) as u8;
        } else {
            let per = remaining / 2;
            *next.slot(first) = (per + remaining % 2) as u8;
            *next.slot(second) = per as u8;
        }

        next
    }
}

/// A risk tier is required for, and only allowed with, [`OptimizationStrategy::RiskLevel`].
pub fn validate_strategy(
    strategy: OptimizationStrategy,
    risk_tier: Option<u8>,
) -> anyhow::Result<()> {
    match (strategy, risk_tier) {
        (OptimizationStrategy::RiskLevel, Some(tier)) => {
            ensure!((1..=5).contains(&tier), "risk tier must be 1..=5 (got {tier})");
        }
        (OptimizationStrategy::RiskLevel, None) => {
            bail!("risk tier is required for the risk_level strategy")
        }
        (other, Some(_)) => bail!("risk tier is only valid for risk_level (got {other})"),
        (_, None) => {}
    }
    Ok(())
}

/// A transient request for a target allocation, built per user action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationRequest {
    #[serde(flatten)]
    pub buckets: BucketAllocation,
    pub strategy: OptimizationStrategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_tier: Option<u8>,
}

impl AllocationRequest {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.buckets.total() == 100,
            "bucket percentages must sum to 100 (got {})",
            self.buckets.total()
        );

        validate_strategy(self.strategy, self.risk_tier)
    }

    /// Band used to pick placeholder data when the provider is unavailable.
    pub fn risk_band(&self) -> RiskBand {
        self.risk_tier.map(RiskBand::from_tier).unwrap_or(RiskBand::Medium)
    }

    pub fn strategy_label(&self) -> String {
        match (self.strategy, self.risk_tier) {
            (OptimizationStrategy::RiskLevel, Some(tier)) => format!("risk tier {tier} of 5"),
            (OptimizationStrategy::SharpeRatio, _) => "maximize risk-adjusted return".to_string(),
            _ => "provider-chosen".to_string(),
        }
    }
}
