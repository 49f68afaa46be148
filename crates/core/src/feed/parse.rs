use crate::domain::asset::SuggestedAsset;
use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static TICKER_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:[-*•]\s*)?([A-Z][A-Z0-9.]{0,11})\s*:\s*(\d+(?:\.\d+)?)\s*%")
        .expect("valid ticker line regex")
});

static EXPECTED_RETURN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*(?:[-*•]\s*)?expected\s+return\s*:\s*(\S[^\r\n]*?)\s*$")
        .expect("valid expected return regex")
});

static SHARPE_RATIO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*(?:[-*•]\s*)?sharpe\s+ratio\s*:\s*(-?\d+(?:\.\d+)?)")
        .expect("valid sharpe ratio regex")
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskProfile {
    pub risk_tier: u8,
    pub suggestions: Vec<SuggestedAsset>,
    pub expected_return: Option<String>,
    pub sharpe_ratio: Option<f64>,
}

pub fn parse_risk_profile(risk_tier: u8, body: &str) -> Result<RiskProfile> {
    let suggestions: Vec<SuggestedAsset> = TICKER_LINE
        .captures_iter(body)
        .filter_map(|c| {
            let pct = c[2].parse::<f64>().ok()?;
            Some(SuggestedAsset::new(c[1].to_string(), pct))
        })
        .collect();
    anyhow::ensure!(
        !suggestions.is_empty(),
        "risk profile for tier {risk_tier} has no TICKER: N% lines"
    );

    let expected_return = EXPECTED_RETURN
        .captures(body)
        .map(|c| c[1].to_string());
    let sharpe_ratio = SHARPE_RATIO
        .captures(body)
        .and_then(|c| c[1].parse::<f64>().ok());

    Ok(RiskProfile {
        risk_tier,
        suggestions,
        expected_return,
        sharpe_ratio,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tickers_and_labeled_scalars() {
        let body = "Risk profile 3\n\nVTI: 40.0%\n- BND: 35.5%\nGLD: 24.5 %\n\nExpected Return: 6-8%\nSharpe Ratio: 0.85\n";
        let p = parse_risk_profile(3, body).unwrap();
        let tickers: Vec<_> = p.suggestions.iter().map(|s| s.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["VTI", "BND", "GLD"]);
        assert_eq!(p.suggestions[1].allocation, 35.5);
        assert_eq!(p.expected_return.as_deref(), Some("6-8%"));
        assert_eq!(p.sharpe_ratio, Some(0.85));
    }

    #[test]
    fn scalars_are_optional() {
        let p = parse_risk_profile(1, "BND: 100%").unwrap();
        assert_eq!(p.suggestions.len(), 1);
        assert!(p.expected_return.is_none());
        assert!(p.sharpe_ratio.is_none());
    }

    #[test]
    fn body_without_tickers_is_an_error() {
        assert!(parse_risk_profile(2, "Expected Return: 5%\nService unavailable").is_err());
    }
}
