use crate::domain::asset::SuggestedAsset;
use crate::domain::report::{
    AnalysisKind, AnalysisReport, RebalanceProposal, RebalanceRow, SectorOutlook,
    SentimentFactor, SentimentReport, SuggestionDraft,
};
use anyhow::{bail, ensure};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmAllocationSuggestion {
    pub suggestions: Vec<LlmSuggestedAsset>,
    #[serde(default)]
    pub analysis: Option<String>,
    #[serde(default)]
    pub expected_return: Option<Value>,
    #[serde(default)]
    pub risk_assessment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSuggestedAsset {
    pub ticker: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub asset_type: Option<String>,
    pub allocation: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmAnalysis {
    pub summary: String,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRebalance {
    #[serde(default)]
    pub summary: Option<String>,
    pub current_vs_target: Vec<LlmRebalanceRow>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRebalanceRow {
    pub ticker: String,
    #[serde(default)]
    pub name: Option<String>,
    pub current: Value,
    pub target: Value,
    #[serde(default)]
    pub action: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSentiment {
    pub overall_sentiment: String,
    pub sentiment_score: f64,
    #[serde(default)]
    pub key_factors: Vec<SentimentFactor>,
    #[serde(default)]
    pub sector_outlook: Vec<SectorOutlook>,
    #[serde(default)]
    pub investment_implications: Vec<String>,
}

/// Accepts `12.5`, `"12.5"`, or `"12.5%"`. Anything else is `None`.
pub fn lenient_percent(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn percent_in_range(v: &Value, field: &str, ticker: &str) -> anyhow::Result<f64> {
    let Some(pct) = lenient_percent(v) else {
        bail!("{field} for {ticker} is not numeric: {v}");
    };
    ensure!(
        pct.is_finite() && (0.0..=100.0).contains(&pct),
        "{field} for {ticker} must be within 0..=100 (got {pct})"
    );
    Ok(pct)
}

fn trimmed(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl LlmAllocationSuggestion {
    pub fn validate_and_into_draft(self) -> anyhow::Result<SuggestionDraft> {
        ensure!(
            !self.suggestions.is_empty(),
            "suggestion list must be non-empty"
        );

        let mut suggestions = Vec::with_capacity(self.suggestions.len());
        for item in self.suggestions {
            let ticker = item.ticker.trim().to_string();
            ensure!(!ticker.is_empty(), "ticker must be non-empty");
            let allocation = percent_in_range(&item.allocation, "allocation", &ticker)?;
            suggestions.push(SuggestedAsset {
                ticker,
                name: trimmed(item.name),
                asset_type: trimmed(item.asset_type),
                allocation,
            });
        }

        let expected_return = match self.expected_return {
            Some(Value::String(s)) => trimmed(Some(s)),
            Some(Value::Number(n)) => Some(format!("{n}%")),
            _ => None,
        };

        Ok(SuggestionDraft {
            suggestions,
            analysis: trimmed(self.analysis).unwrap_or_default(),
            expected_return,
            risk_assessment: trimmed(self.risk_assessment),
        })
    }
}

impl LlmAnalysis {
    pub fn validate_and_into_report(self, kind: AnalysisKind) -> anyhow::Result<AnalysisReport> {
        let summary = self.summary.trim().to_string();
        ensure!(!summary.is_empty(), "analysis summary must be non-empty");

        let recommendations = self
            .recommendations
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(AnalysisReport {
            kind,
            summary,
            recommendations,
            details: self.details,
        })
    }
}

impl LlmRebalance {
    pub fn validate_and_into_proposal(self) -> anyhow::Result<RebalanceProposal> {
        ensure!(
            !self.current_vs_target.is_empty(),
            "current_vs_target must be non-empty"
        );

        let mut rows = Vec::with_capacity(self.current_vs_target.len());
        for row in self.current_vs_target {
            let ticker = row.ticker.trim().to_string();
            ensure!(!ticker.is_empty(), "ticker must be non-empty");
            let current = percent_in_range(&row.current, "current", &ticker)?;
            let target = percent_in_range(&row.target, "target", &ticker)?;
            let action = trimmed(row.action).unwrap_or_else(|| describe_action(current, target));
            rows.push(RebalanceRow {
                ticker,
                name: trimmed(row.name),
                current,
                target,
                action,
            });
        }

        Ok(RebalanceProposal {
            summary: trimmed(self.summary).unwrap_or_default(),
            current_vs_target: rows,
            recommendations: self.recommendations,
        })
    }
}

impl LlmSentiment {
    pub fn validate_and_into_report(self) -> anyhow::Result<SentimentReport> {
        let overall_sentiment = self.overall_sentiment.trim().to_string();
        ensure!(
            !overall_sentiment.is_empty(),
            "overall_sentiment must be non-empty"
        );
        ensure!(
            (-1.0..=1.0).contains(&self.sentiment_score),
            "sentiment_score must be between -1 and 1 (got {})",
            self.sentiment_score
        );

        Ok(SentimentReport {
            overall_sentiment,
            sentiment_score: self.sentiment_score,
            key_factors: self.key_factors,
            sector_outlook: self.sector_outlook,
            investment_implications: self.investment_implications,
        })
    }
}

/// Human-readable action for a current -> target move.
pub fn describe_action(current: f64, target: f64) -> String {
    let delta = target - current;
    if delta.abs() < 0.005 {
        "No change".to_string()
    } else if delta > 0.0 {
        format!("Increase by {}%", format_pct(delta))
    } else {
        format!("Reduce by {}%", format_pct(-delta))
    }
}

fn format_pct(v: f64) -> String {
    if (v - v.round()).abs() < 1e-9 {
        format!("{}", v.round() as i64)
    } else {
        format!("{v:.1}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn suggestion_accepts_string_percentages() {
        let parsed: LlmAllocationSuggestion = serde_json::from_value(json!({
            "suggestions": [
                {"ticker": " VTI ", "name": "Vanguard Total Stock Market ETF", "type": "ETF", "allocation": "35%"},
                {"ticker": "BND", "allocation": 65},
            ],
            "analysis": "Balanced.",
            "expected_return": 6.5,
        }))
        .unwrap();

        let draft = parsed.validate_and_into_draft().unwrap();
        assert_eq!(draft.suggestions[0].ticker, "VTI");
        assert_eq!(draft.suggestions[0].allocation, 35.0);
        assert_eq!(draft.suggestions[1].name, None);
        assert_eq!(draft.expected_return.as_deref(), Some("6.5%"));
    }

    #[test]
    fn suggestion_rejects_out_of_range_allocation() {
        let parsed: LlmAllocationSuggestion = serde_json::from_value(json!({
            "suggestions": [{"ticker": "VTI", "allocation": 140}],
        }))
        .unwrap();
        assert!(parsed.validate_and_into_draft().is_err());
    }

    #[test]
    fn suggestion_rejects_empty_list() {
        let parsed: LlmAllocationSuggestion =
            serde_json::from_value(json!({"suggestions": []})).unwrap();
        assert!(parsed.validate_and_into_draft().is_err());
    }

    #[test]
    fn analysis_keeps_extra_sections_as_details() {
        let parsed: LlmAnalysis = serde_json::from_value(json!({
            "summary": "Moderate risk.",
            "recommendations": ["Diversify", "  "],
            "risk_factors": [{"factor": "Market Risk"}],
        }))
        .unwrap();
        let report = parsed.validate_and_into_report(AnalysisKind::Risk).unwrap();
        assert_eq!(report.recommendations, vec!["Diversify".to_string()]);
        assert!(report.details.contains_key("risk_factors"));
    }

    #[test]
    fn rebalance_fills_missing_action() {
        let parsed: LlmRebalance = serde_json::from_value(json!({
            "summary": "Drifted.",
            "current_vs_target": [
                {"ticker": "VTI", "current": 35, "target": 30},
                {"ticker": "GLD", "current": 10, "target": 10, "action": "Hold"},
            ],
        }))
        .unwrap();
        let proposal = parsed.validate_and_into_proposal().unwrap();
        assert_eq!(proposal.current_vs_target[0].action, "Reduce by 5%");
        assert_eq!(proposal.current_vs_target[1].action, "Hold");
    }

    #[test]
    fn sentiment_rejects_score_out_of_range() {
        let parsed: LlmSentiment = serde_json::from_value(json!({
            "overall_sentiment": "Euphoric",
            "sentiment_score": 3.0,
        }))
        .unwrap();
        assert!(parsed.validate_and_into_report().is_err());
    }

    #[test]
    fn describe_action_formats_deltas() {
        assert_eq!(describe_action(20.0, 25.0), "Increase by 5%");
        assert_eq!(describe_action(20.0, 17.5), "Reduce by 2.5%");
        assert_eq!(describe_action(10.0, 10.0), "No change");
    }
}
