//! Daily JSON package.
//!
//! A compact snapshot of the last week of news, compared with the week
//! before it:
//!
//! ```json
//! {
//!   "date": "2025-07-31",
//!   "trending_keywords": ["관세", "HBM"],
//!   "trending_stocks": ["SK하이닉스"],
//!   "sentiment_ratio": {"Negative": 0.31, "Neutral": 0.44, "Positive": 0.25},
//!   "top_articles": [{"title": "...", "summary_ai": "...", "url": "...", "sentiment_label": "Negative"}],
//!   "sector_briefs": [{"keyword": "반도체", "mentions": 42}]
//! }
//! ```

use crate::models::ArticleRecord;
use crate::trends::{
    self, Field, SectorBrief, TopArticle, TrendOrder, Windows, sector_briefs, sentiment_ratio, tally_field,
    top_articles, trending,
};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{error, info, instrument};

pub const WINDOW_DAYS: i64 = 7;
const TOP_N: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyPackage {
    pub date: String,
    pub trending_keywords: Vec<String>,
    /// Organisations trending in analysis results.
    pub trending_stocks: Vec<String>,
    pub sentiment_ratio: BTreeMap<String, f64>,
    pub top_articles: Vec<TopArticle>,
    pub sector_briefs: Vec<SectorBrief>,
}

/// Build the package for `today` from every stored record.
pub fn build_package(records: &[ArticleRecord], today: NaiveDate) -> DailyPackage {
    let rows = trends::dated(records);
    let windows = Windows::new(today, WINDOW_DAYS, WINDOW_DAYS);
    let (recent, previous) = windows.split(&rows);

    let terms = |field: Field| -> Vec<String> {
        trending(&tally_field(&recent, field), &tally_field(&previous, field), TrendOrder::Delta, TOP_N)
            .into_iter()
            .map(|t| t.term)
            .collect()
    };

    DailyPackage {
        date: today.format("%Y-%m-%d").to_string(),
        trending_keywords: terms(Field::Keywords),
        trending_stocks: terms(Field::Orgs),
        sentiment_ratio: sentiment_ratio(&recent),
        top_articles: top_articles(&recent, TOP_N),
        sector_briefs: sector_briefs(&tally_field(&recent, Field::Keywords), TOP_N),
    }
}

/// Write the package as pretty-printed JSON, creating parent directories.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_package(package: &DailyPackage, path: &Path) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(package)?;

    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = fs::create_dir_all(dir).await {
            error!(dir = %dir.display(), error = %e, "Failed to create package dir");
            return Err(e.into());
        }
    }

    fs::write(path, json).await?;
    info!(
        trending_keywords = package.trending_keywords.len(),
        top_articles = package.top_articles.len(),
        "Wrote daily package"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(url: &str, date: &str, keywords: &[&str], orgs: &[&str], label: &str) -> ArticleRecord {
        ArticleRecord {
            url: url.to_string(),
            title: format!("title {url}"),
            published_at: date.to_string(),
            analysis_keywords: keywords.iter().map(|s| s.to_string()).collect(),
            analysis_orgs: orgs.iter().map(|s| s.to_string()).collect(),
            summary_ai: format!("summary {url}"),
            sentiment_label: label.to_string(),
            ..Default::default()
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 31).unwrap()
    }

    fn sample() -> Vec<ArticleRecord> {
        vec![
            rec("r1", "2025-07-30", &["관세", "반도체"], &["삼성전자"], "Negative"),
            rec("r2", "2025-07-29", &["관세", "반도체"], &["삼성전자"], "Positive"),
            rec("r3", "2025-07-28", &["관세", "반도체"], &["삼성전자"], "Positive"),
            rec("r4", "2025-07-25", &["반도체"], &[], "Neutral"),
            rec("p1", "2025-07-20", &["반도체"], &["삼성전자"], "Neutral"),
            rec("p2", "2025-07-19", &["반도체"], &["삼성전자"], "Neutral"),
            rec("p3", "2025-07-18", &["반도체"], &["삼성전자"], "Neutral"),
            rec("old", "2025-06-01", &["관세"], &[], "Negative"),
        ]
    }

    #[test]
    fn test_build_package() {
        let records = sample();
        let package = build_package(&records, today());

        assert_eq!(package.date, "2025-07-31");
        // 반도체: 4 recent vs 3 previous; 관세: 3 vs 0.
        assert_eq!(package.trending_keywords, vec!["관세", "반도체"]);
        // 삼성전자 is flat (3 vs 3).
        assert!(package.trending_stocks.is_empty());
        assert_eq!(package.sentiment_ratio.get("Positive"), Some(&0.5));
        assert_eq!(package.sentiment_ratio.get("Neutral"), Some(&0.25));

        let urls: Vec<&str> = package.top_articles.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(urls, vec!["r1", "r4", "r2", "r3"]);
        assert_eq!(package.sector_briefs[0].keyword, "반도체");
        assert_eq!(package.sector_briefs[0].mentions, 4);
        assert_eq!(package.sector_briefs[1].keyword, "관세");
    }

    #[tokio::test]
    async fn test_write_package_json_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("ai_daily_package.json");
        let records = sample();
        write_package(&build_package(&records, today()), &path).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"trending_keywords\""));
        assert!(raw.contains("반도체"));
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["sector_briefs"][0]["keyword"], "반도체");
        assert_eq!(value["top_articles"].as_array().unwrap().len(), 4);
    }
}
