use crate::domain::asset::SuggestedAsset;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Allocation list produced by the provider or the risk-profile feed, before it is
/// reconciled against the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionDraft {
    pub suggestions: Vec<SuggestedAsset>,
    pub analysis: String,
    pub expected_return: Option<String>,
    pub risk_assessment: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    Performance,
    Risk,
    Allocation,
    Rebalance,
}

impl AnalysisKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Performance => "performance",
            Self::Risk => "risk",
            Self::Allocation => "allocation",
            Self::Rebalance => "rebalance",
        }
    }
}

impl std::str::FromStr for AnalysisKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "performance" => Ok(Self::Performance),
            "risk" => Ok(Self::Risk),
            "allocation" => Ok(Self::Allocation),
            "rebalance" => Ok(Self::Rebalance),
            other => anyhow::bail!("unknown analysis kind: {other}"),
        }
    }
}

/// Free-form analysis: a summary, a list of recommendations, and whatever extra
/// sections the provider returned (kept as JSON for display).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub kind: AnalysisKind,
    pub summary: String,
    pub recommendations: Vec<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebalanceRow {
    pub ticker: String,
    pub name: Option<String>,
    pub current: f64,
    pub target: f64,
    #[serde(default)]
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebalanceProposal {
    pub summary: String,
    pub current_vs_target: Vec<RebalanceRow>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentFactor {
    pub factor: String,
    pub sentiment: String,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorOutlook {
    pub sector: String,
    pub outlook: String,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentReport {
    pub overall_sentiment: String,
    /// -1.0 (bearish) to 1.0 (bullish).
    pub sentiment_score: f64,
    pub key_factors: Vec<SentimentFactor>,
    pub sector_outlook: Vec<SectorOutlook>,
    pub investment_implications: Vec<String>,
}

/// One stored reading of market sentiment, on the same -1..1 scale as
/// [`SentimentReport::sentiment_score`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentEntry {
    pub id: i64,
    pub date: DateTime<Utc>,
    pub sentiment_score: f64,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentTrend {
    /// Oldest first.
    pub history: Vec<SentimentEntry>,
    pub analysis: SentimentReport,
}

/// Replaces the score of every entry dated `day` with `score`, so the trend agrees
/// with the current analysis. Returns how many entries changed.
pub fn overlay_day_score(history: &mut [SentimentEntry], day: NaiveDate, score: f64) -> usize {
    let mut changed = 0;
    for entry in history.iter_mut().filter(|e| e.date.date_naive() == day) {
        entry.sentiment_score = score;
        changed += 1;
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn entry(id: i64, date: DateTime<Utc>, score: f64) -> SentimentEntry {
        SentimentEntry {
            id,
            date,
            sentiment_score: score,
            summary: format!("day {id}"),
            created_at: date,
        }
    }

    #[test]
    fn overlay_replaces_only_the_matching_day() {
        let today = Utc.with_ymd_and_hms(2024, 3, 15, 14, 30, 0).unwrap();
        let mut history = vec![
            entry(3, today - Duration::days(2), 0.5),
            entry(2, today - Duration::days(1), 0.3),
            entry(1, today, 0.7),
        ];

        let changed = overlay_day_score(&mut history, today.date_naive(), -0.2);

        assert_eq!(changed, 1);
        assert_eq!(history[2].sentiment_score, -0.2);
        assert_eq!(history[0].sentiment_score, 0.5);
        assert_eq!(history[1].sentiment_score, 0.3);
    }

    #[test]
    fn overlay_without_an_entry_for_the_day_changes_nothing() {
        let day = Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap();
        let mut history = vec![entry(1, day - Duration::days(1), 0.3)];
        assert_eq!(overlay_day_score(&mut history, day.date_naive(), 0.9), 0);
        assert_eq!(history[0].sentiment_score, 0.3);
    }
}
