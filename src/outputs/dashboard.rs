//! Markdown trend dashboard.
//!
//! Renders every trend view over a date range into a single Markdown file:
//! daily mention tables for keywords, organisations and listed stocks,
//! growth-ranked trending keywords, per-stock sentiment, the overall
//! sentiment mix, themes, policy and risk news, the latest AI summaries,
//! and optionally the news related to one keyword.

use crate::config::PipelineConfig;
use crate::models::ArticleRecord;
use crate::trends::{
    self, DailySeries, Field, TrendOrder, Windows, daily_series, latest, policy_news, related_news,
    sentiment_distribution, stock_mentions, stock_sentiment, tally_field, themes, trending,
};
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashSet};
use std::error::Error;
use std::fmt::Write;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument, warn};

const TRENDING_TOP_N: usize = 10;
const THEMES_TOP_N: usize = 20;
const POLICY_TOP_N: usize = 50;
const SUMMARIES_TOP_N: usize = 20;
const RELATED_TOP_N: usize = 10;

/// What the dashboard covers and how much of each view it shows.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardOptions {
    /// First date included; defaults to the oldest article.
    pub from: Option<NaiveDate>,
    /// Last date included; defaults to the newest article.
    pub to: Option<NaiveDate>,
    /// Reference date for the trending windows.
    pub today: NaiveDate,
    /// Rows in the keyword and organisation tables.
    pub top_n_terms: usize,
    pub top_n_stocks: usize,
    pub recent_days: i64,
    pub prev_days: i64,
    /// Keyword to list related news for.
    pub related: Option<String>,
}

impl DashboardOptions {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            from: None,
            to: None,
            today,
            top_n_terms: 15,
            top_n_stocks: 15,
            recent_days: 7,
            prev_days: 7,
            related: None,
        }
    }
}

/// Markdown table cell: pipes escaped, line breaks flattened.
fn cell(s: &str) -> String {
    s.replace('|', "\\|").replace(['\r', '\n'], " ")
}

fn write_series(md: &mut String, series: &[DailySeries], label: &str) -> std::fmt::Result {
    if series.is_empty() {
        writeln!(md, "_No {label} mentions in range._\n")?;
        return Ok(());
    }
    writeln!(md, "| {label} | total | by day |")?;
    writeln!(md, "|---|---:|---|")?;
    for s in series {
        let days = s
            .points
            .iter()
            .map(|(d, c)| format!("{} ({c})", d.format("%m-%d")))
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(md, "| {} | {} | {} |", cell(&s.term), s.total, days)?;
    }
    writeln!(md)
}

/// Render the dashboard. `stocks` is the listed-company universe used to
/// tell stock mentions from other organisations.
pub fn render_dashboard(
    records: &[ArticleRecord],
    stocks: &BTreeSet<String>,
    config: &PipelineConfig,
    options: &DashboardOptions,
) -> Result<String, Box<dyn Error>> {
    let all = trends::dated(records);
    let mut md = String::new();
    writeln!(md, "# News trend dashboard\n")?;

    let from = options.from.or_else(|| all.iter().map(|(d, _)| *d).min());
    let to = options.to.or_else(|| all.iter().map(|(d, _)| *d).max());
    let rows = trends::in_range(&all, from, to);

    let (Some(from), Some(to)) = (from, to) else {
        writeln!(md, "_No analyzed articles._")?;
        return Ok(md);
    };
    writeln!(md, "**{}** articles analyzed, {from} ~ {to}.\n", rows.len())?;
    if rows.is_empty() {
        return Ok(md);
    }
    if stocks.is_empty() {
        writeln!(md, "> Stock list is empty; stock views are skipped.\n")?;
    }

    let stock_names: HashSet<&str> = stocks.iter().map(String::as_str).collect();
    let hidden: HashSet<&str> = config
        .stop_keywords
        .iter()
        .map(String::as_str)
        .chain(stock_names.iter().copied())
        .collect();

    writeln!(md, "## Mention trends\n")?;
    writeln!(md, "### Keywords\n")?;
    let keywords = daily_series(&rows, |r| r.analysis_keywords.clone(), &hidden, options.top_n_terms);
    write_series(&mut md, &keywords, "keyword")?;

    writeln!(md, "### Organisations (non-stock)\n")?;
    let orgs = daily_series(&rows, |r| r.analysis_orgs.clone(), &stock_names, options.top_n_terms);
    write_series(&mut md, &orgs, "organisation")?;

    if !stocks.is_empty() {
        writeln!(md, "### Stocks\n")?;
        let mentions = daily_series(
            &rows,
            |r| stock_mentions(&r.analysis_orgs, stocks),
            &HashSet::new(),
            options.top_n_stocks,
        );
        write_series(&mut md, &mentions, "stock")?;
    }

    let windows = Windows::new(options.today, options.recent_days, options.prev_days);
    let (recent, previous) = windows.split(&rows);
    let rising = trending(
        &tally_field(&recent, Field::Keywords),
        &tally_field(&previous, Field::Keywords),
        TrendOrder::GrowthRate,
        TRENDING_TOP_N,
    );
    writeln!(md, "## Trending keywords (last {} days)\n", options.recent_days)?;
    if rising.is_empty() {
        writeln!(md, "_Nothing trending._\n")?;
    } else {
        writeln!(
            md,
            "| keyword | last {} days | previous {} days | growth % |",
            options.recent_days, options.prev_days
        )?;
        writeln!(md, "|---|---:|---:|---:|")?;
        for t in &rising {
            writeln!(md, "| {} | {} | {} | {:.1} |", cell(&t.term), t.recent, t.previous, t.growth)?;
        }
        writeln!(md)?;
    }

    if !stocks.is_empty() {
        writeln!(md, "## Sentiment by stock\n")?;
        let by_stock = stock_sentiment(&rows, stocks, options.top_n_stocks);
        if by_stock.is_empty() {
            writeln!(md, "_No labeled stock mentions._\n")?;
        }
        for s in &by_stock {
            writeln!(md, "### {} ({})\n", s.stock, s.total)?;
            writeln!(md, "| date | sentiment | count |")?;
            writeln!(md, "|---|---|---:|")?;
            for ((date, label), count) in &s.points {
                writeln!(md, "| {date} | {} | {count} |", cell(label))?;
            }
            writeln!(md)?;
        }
    }

    writeln!(md, "## Sentiment distribution\n")?;
    writeln!(md, "| sentiment | articles |")?;
    writeln!(md, "|---|---:|")?;
    for (label, count) in sentiment_distribution(&rows) {
        writeln!(md, "| {} | {count} |", cell(&label))?;
    }
    writeln!(md)?;

    writeln!(md, "## Themes\n")?;
    writeln!(md, "| theme | articles |")?;
    writeln!(md, "|---|---:|")?;
    for (theme, count) in themes(&rows, &hidden, THEMES_TOP_N) {
        writeln!(md, "| {} | {count} |", cell(&theme))?;
    }
    writeln!(md)?;

    writeln!(md, "## Policy and risk news\n")?;
    let hits = policy_news(&rows, &config.policy_words, &hidden, POLICY_TOP_N);
    if hits.is_empty() {
        writeln!(md, "_None._\n")?;
    } else {
        writeln!(md, "| date | keyword | url |")?;
        writeln!(md, "|---|---|---|")?;
        for hit in &hits {
            writeln!(md, "| {} | {} | <{}> |", hit.date, cell(&hit.keyword), hit.url)?;
        }
        writeln!(md)?;
    }

    writeln!(md, "## Latest AI summaries\n")?;
    write_articles(&mut md, &latest(&rows, SUMMARIES_TOP_N))?;

    if let Some(keyword) = options.related.as_deref() {
        writeln!(md, "## Related news: {keyword}\n")?;
        let related = related_news(&rows, keyword, RELATED_TOP_N);
        if related.is_empty() {
            writeln!(md, "_No articles mention {keyword}._\n")?;
        } else {
            write_articles(&mut md, &related)?;
        }
    }

    Ok(md)
}

fn write_articles(md: &mut String, rows: &[(NaiveDate, &ArticleRecord)]) -> std::fmt::Result {
    writeln!(md, "| date | summary | sentiment | url |")?;
    writeln!(md, "|---|---|---|---|")?;
    for (date, r) in rows {
        writeln!(
            md,
            "| {date} | {} | {} | <{}> |",
            cell(&r.summary_ai),
            cell(&r.sentiment_label),
            r.url
        )?;
    }
    writeln!(md)
}

#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_dashboard(markdown: &str, path: &Path) -> Result<(), Box<dyn Error>> {
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(dir).await?;
    }
    fs::write(path, markdown).await?;
    if markdown.lines().count() < 5 {
        warn!("Dashboard is nearly empty; is the aggregated CSV populated?");
    }
    info!(bytes = markdown.len(), "Wrote dashboard");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(url: &str, date: &str, keywords: &[&str], orgs: &[&str], label: &str) -> ArticleRecord {
        ArticleRecord {
            url: format!("https://news.example/{url}"),
            published_at: date.to_string(),
            analysis_keywords: keywords.iter().map(|s| s.to_string()).collect(),
            analysis_orgs: orgs.iter().map(|s| s.to_string()).collect(),
            summary_ai: format!("요약 {url} | 파이프"),
            sentiment_label: label.to_string(),
            ..Default::default()
        }
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn stocks() -> BTreeSet<String> {
        ["삼성전자".to_string()].into_iter().collect()
    }

    fn sample() -> Vec<ArticleRecord> {
        vec![
            rec("1", "2025-07-29", &["금리인상", "HBM", "시장"], &["삼성전자", "한국은행"], "Negative"),
            rec("2", "2025-07-30", &["HBM", "삼성전자"], &["삼성전자"], "Positive"),
            rec("3", "2025-07-31", &["HBM", "2차전지"], &["에코프로"], "Neutral"),
            rec("4", "2025-07-01", &["2차전지"], &[], "Neutral"),
        ]
    }

    #[test]
    fn test_render_sections() {
        let records = sample();
        let mut options = DashboardOptions::new(d("2025-07-31"));
        options.related = Some("2차전지".to_string());
        let md = render_dashboard(&records, &stocks(), &PipelineConfig::default(), &options).unwrap();

        assert!(md.contains("**4** articles analyzed, 2025-07-01 ~ 2025-07-31."));
        assert!(md.contains("| HBM | 3 | 07-29 (1), 07-30 (1), 07-31 (1) |"));
        // Stop words and stock names are hidden from keyword views.
        assert!(!md.contains("| 시장 |"));
        assert!(!md.contains("| 삼성전자 | 1 |"));
        assert!(md.contains("| 한국은행 | 1 |"));
        assert!(md.contains("| stock | total | by day |"));
        assert!(md.contains("| HBM | 3 | 0 | 1000.0 |"));
        assert!(md.contains("### 삼성전자 (2)"));
        assert!(md.contains("| 2025-07-29 | 금리인상 | <https://news.example/1> |"));
        assert!(md.contains("요약 1 \\| 파이프"));
        assert!(md.contains("## Related news: 2차전지"));
    }

    #[test]
    fn test_range_filter_and_empty_input() {
        let records = sample();
        let mut options = DashboardOptions::new(d("2025-07-31"));
        options.from = Some(d("2025-07-30"));
        let md = render_dashboard(&records, &BTreeSet::new(), &PipelineConfig::default(), &options).unwrap();
        assert!(md.contains("**2** articles analyzed, 2025-07-30 ~ 2025-07-31."));
        assert!(md.contains("Stock list is empty"));
        assert!(!md.contains("## Sentiment by stock"));

        let empty = render_dashboard(&[], &stocks(), &PipelineConfig::default(), &options).unwrap();
        assert!(empty.contains("_No analyzed articles._"));
    }

    #[tokio::test]
    async fn test_write_dashboard() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("dashboard.md");
        write_dashboard("# News trend dashboard\n", &path).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# News trend dashboard\n");
    }
}
