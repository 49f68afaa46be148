//! Turns free-text completion output into structured results.

use crate::domain::asset::SuggestedAsset;
use crate::domain::contract::{
    describe_action, LlmAllocationSuggestion, LlmAnalysis, LlmRebalance, LlmSentiment,
};
use crate::domain::report::{
    AnalysisKind, AnalysisReport, RebalanceProposal, RebalanceRow, SentimentReport,
    SuggestionDraft,
};
use crate::llm::error::NormalizeError;
use crate::llm::json;
use crate::llm::markdown::{self, ScrapedResponse};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Structured(Value),
    Scraped(ScrapedResponse),
}

fn is_non_empty(v: &Value) -> bool {
    match v {
        Value::Object(m) => !m.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Null => false,
        _ => true,
    }
}

pub fn normalize(text: &str) -> Result<Normalized, NormalizeError> {
    if let Some(candidate) = json::extract_json(text) {
        if let Some(v) = json::parse_with_repairs(&candidate).filter(is_non_empty) {
            return Ok(Normalized::Structured(v));
        }
    }

    match markdown::scrape(text) {
        Some(scraped) if !scraped.is_empty() => {
            tracing::debug!(
                rows = scraped.rows.len(),
                recommendations = scraped.recommendations.len(),
                "completion recovered via markdown scrape"
            );
            Ok(Normalized::Scraped(scraped))
        }
        _ => Err(NormalizeError::UnparsableAiResponse),
    }
}

fn decode<T: DeserializeOwned>(value: Value, shape: &'static str) -> Result<T, NormalizeError> {
    serde_json::from_value::<T>(value).map_err(|e| NormalizeError::Schema {
        shape,
        reason: e.to_string(),
    })
}

fn schema(shape: &'static str) -> impl FnOnce(anyhow::Error) -> NormalizeError {
    move |e| NormalizeError::Schema {
        shape,
        reason: format!("{e:#}"),
    }
}

pub fn parse_suggestion(text: &str) -> Result<SuggestionDraft, NormalizeError> {
    const SHAPE: &str = "allocation suggestion";
    match normalize(text)? {
        Normalized::Structured(v) => decode::<LlmAllocationSuggestion>(v, SHAPE)?
            .validate_and_into_draft()
            .map_err(schema(SHAPE)),
        Normalized::Scraped(s) => {
            if s.rows.is_empty() {
                return Err(NormalizeError::Schema {
                    shape: SHAPE,
                    reason: "markdown answer has no allocation table".to_string(),
                });
            }
            Ok(SuggestionDraft {
                suggestions: s
                    .rows
                    .iter()
                    .map(|r| SuggestedAsset::new(r.identifier.clone(), r.target_pct))
                    .collect(),
                analysis: s.summary.unwrap_or_default(),
                expected_return: None,
                risk_assessment: None,
            })
        }
    }
}

pub fn parse_analysis(text: &str, kind: AnalysisKind) -> Result<AnalysisReport, NormalizeError> {
    const SHAPE: &str = "portfolio analysis";
    match normalize(text)? {
        Normalized::Structured(v) => decode::<LlmAnalysis>(v, SHAPE)?
            .validate_and_into_report(kind)
            .map_err(schema(SHAPE)),
        Normalized::Scraped(s) => {
            let summary = s
                .summary
                .clone()
                .or_else(|| s.recommendations.first().cloned())
                .unwrap_or_default();
            let mut details = Map::new();
            if !s.rows.is_empty() {
                details.insert(
                    "current_vs_target".to_string(),
                    serde_json::to_value(scraped_rows(&s)).unwrap_or(Value::Null),
                );
            }
            Ok(AnalysisReport {
                kind,
                summary,
                recommendations: s.recommendations,
                details,
            })
        }
    }
}

pub fn parse_rebalance(text: &str) -> Result<RebalanceProposal, NormalizeError> {
    const SHAPE: &str = "rebalance proposal";
    match normalize(text)? {
        Normalized::Structured(v) => decode::<LlmRebalance>(v, SHAPE)?
            .validate_and_into_proposal()
            .map_err(schema(SHAPE)),
        Normalized::Scraped(s) => {
            if s.rows.is_empty() {
                return Err(NormalizeError::Schema {
                    shape: SHAPE,
                    reason: "markdown answer has no Asset/Current/Target/Action table".to_string(),
                });
            }
            let current_vs_target = scraped_rows(&s);
            Ok(RebalanceProposal {
                summary: s.summary.unwrap_or_default(),
                current_vs_target,
                recommendations: s.recommendations,
            })
        }
    }
}

pub fn parse_sentiment(text: &str) -> Result<SentimentReport, NormalizeError> {
    const SHAPE: &str = "market sentiment";
    match normalize(text)? {
        Normalized::Structured(v) => decode::<LlmSentiment>(v, SHAPE)?
            .validate_and_into_report()
            .map_err(schema(SHAPE)),
        Normalized::Scraped(_) => Err(NormalizeError::Schema {
            shape: SHAPE,
            reason: "markdown answer carries no sentiment score".to_string(),
        }),
    }
}

fn scraped_rows(s: &ScrapedResponse) -> Vec<RebalanceRow> {
    s.rows
        .iter()
        .map(|r| RebalanceRow {
            ticker: r.identifier.clone(),
            name: None,
            current: r.current_pct,
            target: r.target_pct,
            action: if r.action.is_empty() {
                describe_action(r.current_pct, r.target_pct)
            } else {
                r.action.clone()
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn well_formed_fenced_json_matches_strict_parse() {
        let docs = [
            json!({"a": 1, "b": [2, 3]}),
            json!({"suggestions": [{"ticker": "VTI", "allocation": 60.0}], "analysis": "ok"}),
            json!({"nested": {"x": null, "y": "{[\"quoted\"]}"}, "z": -0.5}),
        ];
        for doc in docs {
            let body = serde_json::to_string_pretty(&doc).unwrap();
            let text = format!("Sure!\n```json\n{body}\n```\nAnything else?");
            assert_eq!(normalize(&text).unwrap(), Normalized::Structured(doc));
        }
    }

    #[test]
    fn plain_fenced_json_is_returned_verbatim() {
        let doc = json!({"a": 1, "b": [2, 3], "c": {"d": "e"}});
        let text = format!("```json\n{doc}\n```");
        assert_eq!(normalize(&text).unwrap(), Normalized::Structured(doc));
    }

    #[test]
    fn recovers_missing_bracket_in_fenced_block() {
        let text = "```json\n{\"a\":1,\"b\":[2,3}\n```";
        assert_eq!(
            normalize(text).unwrap(),
            Normalized::Structured(json!({"a": 1, "b": [2, 3]}))
        );
    }

    #[test]
    fn unparsable_text_is_reported() {
        assert_eq!(
            normalize("Sorry, the service is busy."),
            Err(NormalizeError::UnparsableAiResponse)
        );
        assert_eq!(normalize("```json\n{}\n```"), Err(NormalizeError::UnparsableAiResponse));
    }

    #[test]
    fn normalize_is_deterministic() {
        let text = "```json\n{\"suggestions\":[{\"ticker\":\"VTI\",\"allocation\":50} {\"ticker\":\"BND\",\"allocation\":50}],";
        assert_eq!(normalize(text), normalize(text));
        assert!(normalize(text).is_ok());
    }

    #[test]
    fn parse_suggestion_from_truncated_json() {
        let text = "```json\n{\"suggestions\":[{\"ticker\":\"VTI\",\"name\":\"Total\",\"allocation\":60},{\"ticker\":\"BND\",\"allocation\":40}],\"analysis\":\"Bal";
        let draft = parse_suggestion(text).unwrap();
        assert_eq!(draft.suggestions.len(), 2);
        assert_eq!(draft.suggestions[1].ticker, "BND");
        assert_eq!(draft.analysis, "Bal");
    }

    #[test]
    fn parse_suggestion_rejects_wrong_shape() {
        let err = parse_suggestion("```json\n{\"portfolio\": []}\n```").unwrap_err();
        assert!(matches!(err, NormalizeError::Schema { .. }));
    }

    #[test]
    fn parse_rebalance_from_markdown_table() {
        let text = "# Rebalance\n\nDrift detected.\n\n| Asset | Current | Target | Action |\n|---|---|---|---|\n| VTI | 35 | 30 | |\n\n## Recommendations\n- Sell VTI\n";
        let proposal = parse_rebalance(text).unwrap();
        assert_eq!(proposal.summary, "Drift detected.");
        assert_eq!(proposal.current_vs_target[0].action, "Reduce by 5%");
        assert_eq!(proposal.recommendations, vec!["Sell VTI".to_string()]);
    }

    #[test]
    fn parse_analysis_from_markdown_without_table() {
        let text = "## Performance\nStrong year.\n\n## Recommendations\n- Hold\n";
        let report = parse_analysis(text, AnalysisKind::Performance).unwrap();
        assert_eq!(report.summary, "Strong year.");
        assert_eq!(report.recommendations, vec!["Hold".to_string()]);
        assert!(report.details.is_empty());
    }

    #[test]
    fn parse_sentiment_requires_structured_answer() {
        let err = parse_sentiment("# Mood\nCautious.\n").unwrap_err();
        assert!(matches!(err, NormalizeError::Schema { .. }));

        let ok = parse_sentiment(
            "```json\n{\"overall_sentiment\":\"Neutral\",\"sentiment_score\":0.1}\n```",
        )
        .unwrap();
        assert_eq!(ok.overall_sentiment, "Neutral");
    }
}
