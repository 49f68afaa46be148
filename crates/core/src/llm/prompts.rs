use crate::domain::allocation::{AllocationRequest, OptimizationStrategy};
use crate::domain::portfolio::Portfolio;
use crate::domain::report::AnalysisKind;

pub fn system_prompt_json() -> String {
    [
        "You are a portfolio allocation assistant.",
        "Respond ONLY with a single fenced ```json code block containing one JSON object.",
        "No prose before or after the block. No comments. No trailing commas.",
        "Use double quotes for all JSON strings. Percentages are plain numbers from 0 to 100.",
    ]
    .join("\n")
}

pub fn system_prompt_report() -> String {
    [
        "You are a financial analyst writing for advisors who present portfolios to clients.",
        "Answer in markdown with sections and tables.",
        "Base the analysis only on the document text provided.",
    ]
    .join("\n")
}

pub const DEFAULT_REPORT_PROMPT: &str = "Comment on the portfolio composition and asset allocation \
in light of the current macroeconomic context. Include remarks on drawdown against a benchmark, \
diversification, and risk/return indicators.";

fn strategy_instruction(strategy: OptimizationStrategy, risk_tier: Option<u8>) -> String {
    match (strategy, risk_tier) {
        (OptimizationStrategy::RiskLevel, Some(tier)) => format!(
            "Target risk tier {tier} on a 1 (most conservative) to 5 (most aggressive) scale."
        ),
        (OptimizationStrategy::RiskLevel, None) => "Target a moderate risk tier.".to_string(),
        (OptimizationStrategy::SharpeRatio, _) => {
            "Maximize the risk-adjusted return (Sharpe ratio).".to_string()
        }
        (OptimizationStrategy::AiRecommended, _) => {
            "Choose the risk profile you consider most appropriate and explain why.".to_string()
        }
    }
}

pub fn allocation_prompt(req: &AllocationRequest) -> String {
    format!(
        "Build an investment portfolio of ETFs with {}% equities, {}% fixed income and {}% alternatives.\n\
{}\n\
Allocations across all suggestions must sum to 100.\n\n\
Return this JSON shape:\n\
{{\n\
  \"suggestions\": [{{\"ticker\": \"VTI\", \"name\": \"Vanguard Total Stock Market ETF\", \"type\": \"ETF\", \"allocation\": 30}}],\n\
  \"analysis\": \"short rationale\",\n\
  \"expected_return\": \"7-9%\",\n\
  \"risk_assessment\": \"one sentence\"\n\
}}",
        req.buckets.equities,
        req.buckets.fixed_income,
        req.buckets.alternatives,
        strategy_instruction(req.strategy, req.risk_tier),
    )
}

fn holdings_table(portfolio: &Portfolio) -> String {
    let mut out = String::new();
    for h in &portfolio.holdings {
        let r1 = h
            .metrics
            .as_ref()
            .and_then(|m| m.return_1y)
            .map(|v| format!("{v:.2}%"))
            .unwrap_or_else(|| "n/a".to_string());
        out.push_str(&format!(
            "- {} ({}, {}): {:.2}% allocation, 1y return {}\n",
            h.ticker, h.name, h.asset_type, h.allocation, r1
        ));
    }
    if out.is_empty() {
        out.push_str("- (no holdings)\n");
    }
    out
}

pub fn analysis_prompt(portfolio: &Portfolio, kind: AnalysisKind) -> String {
    let focus = match kind {
        AnalysisKind::Performance => {
            "Analyze performance: best and worst performers and their contribution."
        }
        AnalysisKind::Risk => "Analyze risk: key risk factors, exposure level and impact.",
        AnalysisKind::Allocation => {
            "Analyze the asset allocation against a suitable benchmark by category."
        }
        AnalysisKind::Rebalance => {
            "Analyze drift from a sensible target allocation and the trades needed."
        }
    };

    format!(
        "Portfolio \"{}\" holds:\n{}\n{focus}\n\n\
Return this JSON shape (add extra keys for supporting tables if useful):\n\
{{\"summary\": \"...\", \"recommendations\": [\"...\"]}}",
        portfolio.name,
        holdings_table(portfolio),
    )
}

pub fn rebalance_prompt(
    portfolio: &Portfolio,
    strategy: OptimizationStrategy,
    risk_tier: Option<u8>,
) -> String {
    format!(
        "Rebalance portfolio \"{}\" using ONLY its current holdings:\n{}\n{}\n\
Targets must sum to 100. Do not add new tickers.\n\n\
Return this JSON shape:\n\
{{\n\
  \"summary\": \"...\",\n\
  \"current_vs_target\": [{{\"ticker\": \"VTI\", \"name\": \"...\", \"current\": 35, \"target\": 30, \"action\": \"Reduce by 5%\"}}],\n\
  \"recommendations\": [\"...\"]\n\
}}",
        portfolio.name,
        holdings_table(portfolio),
        strategy_instruction(strategy, risk_tier),
    )
}

pub fn sentiment_prompt(as_of: chrono::NaiveDate) -> String {
    format!(
        "Summarize overall market sentiment as of {as_of}.\n\n\
Return this JSON shape:\n\
{{\n\
  \"overall_sentiment\": \"Moderately Positive\",\n\
  \"sentiment_score\": 0.5,\n\
  \"key_factors\": [{{\"factor\": \"...\", \"sentiment\": \"Positive\", \"details\": \"...\"}}],\n\
  \"sector_outlook\": [{{\"sector\": \"...\", \"outlook\": \"Neutral\", \"details\": \"...\"}}],\n\
  \"investment_implications\": [\"...\"]\n\
}}\n\
sentiment_score ranges from -1 (very negative) to 1 (very positive)."
    )
}

pub fn report_prompt(instructions: &str, document_text: &str) -> String {
    format!("{instructions}\n\n--- DOCUMENT TEXT ---\n{document_text}\n--- END DOCUMENT ---")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::allocation::BucketAllocation;

    #[test]
    fn allocation_prompt_mentions_buckets_and_tier() {
        let req = AllocationRequest {
            buckets: BucketAllocation::new(70, 20, 10),
            strategy: OptimizationStrategy::RiskLevel,
            risk_tier: Some(4),
        };
        let p = allocation_prompt(&req);
        assert!(p.contains("70% equities"));
        assert!(p.contains("risk tier 4"));
        assert!(p.contains("\"suggestions\""));
    }
}
