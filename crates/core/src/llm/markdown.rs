use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static FIRST_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+(?:[.,]\d+)?").expect("valid number regex"));

static NUMBERED_BULLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+[.)]\s+").expect("valid numbered bullet regex"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedRow {
    pub identifier: String,
    pub current_pct: f64,
    pub target_pct: f64,
    pub action: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrapedResponse {
    pub summary: Option<String>,
    pub recommendations: Vec<String>,
    pub rows: Vec<ScrapedRow>,
}

impl ScrapedResponse {
    pub fn is_empty(&self) -> bool {
        self.summary.is_none() && self.recommendations.is_empty() && self.rows.is_empty()
    }
}

fn is_heading(line: &str) -> bool {
    line.trim_start().starts_with('#')
}

fn heading_text(line: &str) -> &str {
    line.trim_start().trim_start_matches('#').trim()
}

fn bullet_text(line: &str) -> Option<&str> {
    let t = line.trim_start();
    for marker in ["- ", "* ", "+ ", "• "] {
        if let Some(rest) = t.strip_prefix(marker) {
            return Some(rest.trim());
        }
    }
    NUMBERED_BULLET.find(t).map(|m| t[m.end()..].trim())
}

fn is_table_line(line: &str) -> bool {
    line.trim_start().starts_with('|')
}

fn strip_emphasis(s: &str) -> String {
    s.replace("**", "").replace('`', "").trim().to_string()
}

pub fn has_markdown_markers(text: &str) -> bool {
    text.lines()
        .any(|l| is_heading(l) || bullet_text(l).is_some())
}

/// Scrape `text`. Returns `None` when the text has no heading or bullet markers.
pub fn scrape(text: &str) -> Option<ScrapedResponse> {
    if !has_markdown_markers(text) {
        return None;
    }

    let lines: Vec<&str> = text.lines().collect();
    Some(ScrapedResponse {
        summary: first_paragraph_after_heading(&lines),
        recommendations: recommendation_bullets(&lines),
        rows: allocation_table(&lines),
    })
}

fn first_paragraph_after_heading(lines: &[&str]) -> Option<String> {
    let mut idx = 0;
    while idx < lines.len() {
        if !is_heading(lines[idx]) {
            idx += 1;
            continue;
        }
        idx += 1;
        while idx < lines.len() && lines[idx].trim().is_empty() {
            idx += 1;
        }

        let mut paragraph = Vec::new();
        while idx < lines.len() {
            let line = lines[idx];
            if line.trim().is_empty()
                || is_heading(line)
                || is_table_line(line)
                || bullet_text(line).is_some()
            {
                break;
            }
            paragraph.push(strip_emphasis(line));
            idx += 1;
        }
        if !paragraph.is_empty() {
            return Some(paragraph.join(" "));
        }
    }
    None
}

fn recommendation_bullets(lines: &[&str]) -> Vec<String> {
    let mut out = Vec::new();
    let mut in_section = false;
    for line in lines {
        if is_heading(line) {
            in_section = heading_text(line)
                .to_ascii_lowercase()
                .contains("recommendation");
            continue;
        }
        if !in_section {
            continue;
        }
        if let Some(text) = bullet_text(line) {
            let text = strip_emphasis(text);
            if !text.is_empty() {
                out.push(text);
            }
        }
    }
    out
}

fn split_cells(line: &str) -> Vec<String> {
    let t = line.trim();
    let t = t.strip_prefix('|').unwrap_or(t);
    let t = t.strip_suffix('|').unwrap_or(t);
    t.split('|').map(strip_emphasis).collect()
}

fn is_separator_row(cells: &[String]) -> bool {
    cells
        .iter()
        .all(|c| !c.is_empty() && c.chars().all(|ch| matches!(ch, '-' | ':' | ' ')))
}

/// First embedded digit sequence in a cell; 0 when there is none.
fn cell_number(cell: &str) -> f64 {
    FIRST_NUMBER
        .find(cell)
        .and_then(|m| m.as_str().replace(',', ".").parse::<f64>().ok())
        .unwrap_or(0.0)
}

struct TableColumns {
    asset: usize,
    current: usize,
    target: usize,
    action: usize,
}

fn header_columns(cells: &[String]) -> Option<TableColumns> {
    let find = |name: &str| {
        cells
            .iter()
            .position(|c| c.to_ascii_lowercase().contains(name))
    };
    Some(TableColumns {
        asset: find("asset")?,
        current: find("current")?,
        target: find("target")?,
        action: find("action")?,
    })
}

fn allocation_table(lines: &[&str]) -> Vec<ScrapedRow> {
    let mut out = Vec::new();
    let mut idx = 0;
    while idx < lines.len() {
        let line = lines[idx];
        idx += 1;
        if !is_table_line(line) {
            continue;
        }
        let Some(cols) = header_columns(&split_cells(line)) else {
            continue;
        };

        while idx < lines.len() && is_table_line(lines[idx]) {
            let cells = split_cells(lines[idx]);
            idx += 1;
            if is_separator_row(&cells) {
                continue;
            }
            let cell = |i: usize| cells.get(i).map(String::as_str).unwrap_or("");
            let identifier = cell(cols.asset).to_string();
            if identifier.is_empty() {
                continue;
            }
            out.push(ScrapedRow {
                identifier,
                current_pct: cell_number(cell(cols.current)),
                target_pct: cell_number(cell(cols.target)),
                action: cell(cols.action).to_string(),
            });
        }
        break;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const REBALANCE_MD: &str = "\
## Summary

Your portfolio has drifted from its **target** allocation.
A rebalance is recommended.

| Asset | Current % | Target % | Action |
|-------|:---------:|---------:|--------|
| **VTI** | 35% | 30% | Reduce by 5% |
| VEA | 15.5 | 20 | Increase |
| GLD | n/a | ten | No change |

### Recommendations
- Rebalance to target allocation
* Consider tax implications
1. Use new contributions first

## Notes
- not a recommendation
";

    #[test]
    fn scrapes_summary_recommendations_and_table() {
        let scraped = scrape(REBALANCE_MD).unwrap();
        assert_eq!(
            scraped.summary.as_deref(),
            Some("Your portfolio has drifted from its target allocation. A rebalance is recommended.")
        );
        assert_eq!(
            scraped.recommendations,
            vec![
                "Rebalance to target allocation".to_string(),
                "Consider tax implications".to_string(),
                "Use new contributions first".to_string(),
            ]
        );
        assert_eq!(scraped.rows.len(), 3);
        assert_eq!(
            scraped.rows[0],
            ScrapedRow {
                identifier: "VTI".to_string(),
                current_pct: 35.0,
                target_pct: 30.0,
                action: "Reduce by 5%".to_string(),
            }
        );
        assert_eq!(scraped.rows[1].current_pct, 15.5);
        assert_eq!(scraped.rows[2].current_pct, 0.0);
        assert_eq!(scraped.rows[2].target_pct, 0.0);
    }

    #[test]
    fn plain_text_is_not_scraped() {
        assert!(scrape("I cannot help with that.").is_none());
    }

    #[test]
    fn table_without_required_columns_is_ignored() {
        let md = "# Report\n\n| Ticker | Weight |\n|---|---|\n| VTI | 40 |\n";
        let scraped = scrape(md).unwrap();
        assert!(scraped.rows.is_empty());
        assert!(scraped.summary.is_none());
        assert!(scraped.is_empty());
    }
}
