//! Counting and trend detection over analyzed articles.
//!
//! Everything here is pure: functions take records (or tallies built from
//! them) plus a reference date and return plain data. Rendering happens in
//! [`crate::outputs`].

use crate::models::ArticleRecord;
use crate::utils::parse_date_lenient;
use chrono::{Duration, NaiveDate};
use itertools::Itertools;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;
use tracing::{debug, warn};

/// Minimum recent mentions before a term can count as trending.
pub const TRENDING_MIN_MENTIONS: usize = 3;
/// Growth rate reported for terms with no mentions in the previous window.
pub const NEW_TERM_GROWTH: f64 = 1000.0;
/// Search keywords mentioned this often or less are pruning candidates.
pub const LOW_IMPORTANCE_MAX: usize = 3;

/// Counter that remembers first-seen order, so ties in
/// [`Tally::most_common`] come out in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tally {
    counts: Vec<(String, usize)>,
    index: HashMap<String, usize>,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, term: &str) {
        match self.index.get(term) {
            Some(&i) => self.counts[i].1 += 1,
            None => {
                self.index.insert(term.to_string(), self.counts.len());
                self.counts.push((term.to_string(), 1));
            }
        }
    }

    /// Tally every term in every list.
    pub fn from_lists<'a, I>(lists: I) -> Self
    where
        I: IntoIterator<Item = &'a [String]>,
    {
        let mut tally = Self::new();
        for term in lists.into_iter().flatten() {
            tally.add(term);
        }
        tally
    }

    pub fn get(&self, term: &str) -> usize {
        self.index.get(term).map(|&i| self.counts[i].1).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Terms in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.counts.iter().map(|(t, c)| (t.as_str(), *c))
    }

    /// The `n` most frequent terms, highest count first.
    pub fn most_common(&self, n: usize) -> Vec<(String, usize)> {
        self.counts
            .iter()
            .sorted_by(|a, b| b.1.cmp(&a.1))
            .take(n)
            .cloned()
            .collect()
    }
}

/// Date an article is counted under: publication date, else crawl date.
pub fn analysis_date(record: &ArticleRecord) -> Option<NaiveDate> {
    parse_date_lenient(&record.published_at).or_else(|| parse_date_lenient(&record.crawled_at))
}

/// Records paired with their analysis date. Undatable records are dropped.
pub fn dated(records: &[ArticleRecord]) -> Vec<(NaiveDate, &ArticleRecord)> {
    records
        .iter()
        .filter_map(|r| analysis_date(r).map(|d| (d, r)))
        .collect()
}

/// Keep rows dated within `[from, to]`; open ends are unbounded.
pub fn in_range<'a>(
    rows: &[(NaiveDate, &'a ArticleRecord)],
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Vec<(NaiveDate, &'a ArticleRecord)> {
    rows.iter()
        .filter(|(d, _)| from.is_none_or(|f| *d >= f) && to.is_none_or(|t| *d <= t))
        .copied()
        .collect()
}

/// Recent window `[today - recent_days, ..]` and the window of
/// `prev_days` immediately before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Windows {
    pub recent_from: NaiveDate,
    pub previous_from: NaiveDate,
}

impl Windows {
    pub fn new(today: NaiveDate, recent_days: i64, prev_days: i64) -> Self {
        let recent_from = today - Duration::days(recent_days);
        Self {
            recent_from,
            previous_from: recent_from - Duration::days(prev_days),
        }
    }

    pub fn is_recent(&self, date: NaiveDate) -> bool {
        date >= self.recent_from
    }

    pub fn is_previous(&self, date: NaiveDate) -> bool {
        date >= self.previous_from && date < self.recent_from
    }

    /// Split rows into (recent, previous); rows older than both are dropped.
    pub fn split<'a>(
        &self,
        rows: &[(NaiveDate, &'a ArticleRecord)],
    ) -> (Vec<(NaiveDate, &'a ArticleRecord)>, Vec<(NaiveDate, &'a ArticleRecord)>) {
        let recent = rows.iter().filter(|(d, _)| self.is_recent(*d)).copied().collect();
        let previous = rows.iter().filter(|(d, _)| self.is_previous(*d)).copied().collect();
        (recent, previous)
    }
}

/// Which list column a trend is computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Keywords,
    Orgs,
}

impl Field {
    pub fn of<'a>(&self, record: &'a ArticleRecord) -> &'a [String] {
        match self {
            Field::Keywords => &record.analysis_keywords,
            Field::Orgs => &record.analysis_orgs,
        }
    }
}

pub fn tally_field(rows: &[(NaiveDate, &ArticleRecord)], field: Field) -> Tally {
    Tally::from_lists(rows.iter().map(|(_, r)| field.of(r)))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendingTerm {
    pub term: String,
    pub recent: usize,
    pub previous: usize,
    pub delta: usize,
    /// Percent change, or [`NEW_TERM_GROWTH`] for terms new this window.
    pub growth: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendOrder {
    /// Absolute increase, as in the daily package.
    Delta,
    /// Percent increase, as on the dashboard.
    GrowthRate,
}

/// Terms with at least [`TRENDING_MIN_MENTIONS`] recent mentions that grew
/// against the previous window, best first.
///
/// # Arguments
///
/// * `recent` - Counts from the recent window.
/// * `previous` - Counts from the window before it.
/// * `order` - Rank by absolute increase or by percent growth.
/// * `top_n` - Maximum number of terms returned.
///
/// # Returns
///
/// Up to `top_n` terms. Ties keep the order in which terms were first
/// counted in the recent window.
///
/// # Examples
///
/// ```ignore
/// let up = trending(&recent, &previous, TrendOrder::Delta, 5);
/// for t in &up {
///     println!("{} +{} ({:.1}%)", t.term, t.delta, t.growth);
/// }
/// ```
pub fn trending(recent: &Tally, previous: &Tally, order: TrendOrder, top_n: usize) -> Vec<TrendingTerm> {
    if recent.is_empty() {
        return Vec::new();
    }
    let candidates = recent.iter().filter_map(|(term, count)| {
        let prev = previous.get(term);
        if count < TRENDING_MIN_MENTIONS || count <= prev {
            return None;
        }
        let delta = count - prev;
        let growth = if prev == 0 {
            NEW_TERM_GROWTH
        } else {
            delta as f64 / prev as f64 * 100.0
        };
        Some(TrendingTerm {
            term: term.to_string(),
            recent: count,
            previous: prev,
            delta,
            growth,
        })
    });

    match order {
        TrendOrder::Delta => candidates.sorted_by(|a, b| b.delta.cmp(&a.delta)).take(top_n).collect(),
        TrendOrder::GrowthRate => candidates
            .sorted_by(|a, b| b.growth.total_cmp(&a.growth))
            .take(top_n)
            .collect(),
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Label counts over labeled rows, highest first.
pub fn sentiment_distribution(rows: &[(NaiveDate, &ArticleRecord)]) -> Vec<(String, usize)> {
    let mut tally = Tally::new();
    for (_, r) in rows {
        if !r.sentiment_label.is_empty() {
            tally.add(&r.sentiment_label);
        }
    }
    tally.most_common(tally.len())
}

/// Share of each label among labeled rows, rounded to two decimals.
pub fn sentiment_ratio(rows: &[(NaiveDate, &ArticleRecord)]) -> BTreeMap<String, f64> {
    let distribution = sentiment_distribution(rows);
    let total: usize = distribution.iter().map(|(_, c)| c).sum();
    distribution
        .into_iter()
        .map(|(label, count)| (label, round2(count as f64 / total as f64)))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopArticle {
    pub title: String,
    pub summary_ai: String,
    pub url: String,
    pub sentiment_label: String,
}

/// Rows ordered by label (unlabeled last), then newest first.
pub fn top_articles(rows: &[(NaiveDate, &ArticleRecord)], n: usize) -> Vec<TopArticle> {
    rows.iter()
        .sorted_by(|(da, a), (db, b)| {
            (a.sentiment_label.is_empty(), &a.sentiment_label)
                .cmp(&(b.sentiment_label.is_empty(), &b.sentiment_label))
                .then(db.cmp(da))
        })
        .take(n)
        .map(|(_, r)| TopArticle {
            title: r.title.clone(),
            summary_ai: r.summary_ai.clone(),
            url: r.url.clone(),
            sentiment_label: r.sentiment_label.clone(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorBrief {
    pub keyword: String,
    pub mentions: usize,
}

pub fn sector_briefs(recent: &Tally, n: usize) -> Vec<SectorBrief> {
    recent
        .most_common(n)
        .into_iter()
        .map(|(keyword, mentions)| SectorBrief { keyword, mentions })
        .collect()
}

/// Frequent analysis keywords not already searched for, with counts.
/// Looks at the 50 most common terms, skips one-character ones, keeps 20.
pub fn recommend_keywords(rows: &[(NaiveDate, &ArticleRecord)], search_keywords: &[String]) -> Vec<(String, usize)> {
    let current: HashSet<&str> = search_keywords.iter().map(String::as_str).collect();
    tally_field(rows, Field::Keywords)
        .most_common(50)
        .into_iter()
        .filter(|(kw, _)| !current.contains(kw.as_str()) && kw.chars().count() > 1)
        .take(20)
        .collect()
}

/// How often each search keyword shows up in analysis results.
#[derive(Debug, Clone, PartialEq)]
pub struct PruneReport {
    /// Every search keyword with its mention count, in config order.
    pub counts: Vec<(String, usize)>,
    /// Search keywords mentioned at most [`LOW_IMPORTANCE_MAX`] times.
    pub low_importance: Vec<String>,
    /// The most mentioned analysis keywords overall.
    pub top_keywords: Vec<String>,
}

pub fn prune_report(rows: &[(NaiveDate, &ArticleRecord)], search_keywords: &[String], top_n: usize) -> PruneReport {
    let tally = tally_field(rows, Field::Keywords);
    let counts: Vec<(String, usize)> = search_keywords
        .iter()
        .map(|kw| (kw.clone(), tally.get(kw)))
        .collect();
    let low_importance = counts
        .iter()
        .filter(|(_, c)| *c <= LOW_IMPORTANCE_MAX)
        .map(|(kw, _)| kw.clone())
        .collect();
    let top_keywords = tally.most_common(top_n).into_iter().map(|(kw, _)| kw).collect();
    PruneReport {
        counts,
        low_importance,
        top_keywords,
    }
}

/// Union of stock names listed one per line in each file. Missing or
/// unreadable files are logged and skipped.
pub fn load_stock_names(paths: &[impl AsRef<Path>]) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for path in paths {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let text = text.trim_start_matches('\u{feff}');
                names.extend(text.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string));
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Could not read stock list"),
        }
    }
    debug!(count = names.len(), "Loaded stock names");
    names
}

/// Orgs that are listed stocks, in article order.
pub fn stock_mentions(orgs: &[String], stocks: &BTreeSet<String>) -> Vec<String> {
    orgs.iter().filter(|o| stocks.contains(*o)).cloned().collect()
}

/// Per-day mention counts of one term.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySeries {
    pub term: String,
    pub total: usize,
    pub points: BTreeMap<NaiveDate, usize>,
}

/// Daily series for the `top_n` most mentioned terms. `terms_of` yields the
/// terms of a row; terms in `exclude` are ignored.
pub fn daily_series<F>(
    rows: &[(NaiveDate, &ArticleRecord)],
    terms_of: F,
    exclude: &HashSet<&str>,
    top_n: usize,
) -> Vec<DailySeries>
where
    F: Fn(&ArticleRecord) -> Vec<String>,
{
    let mut totals = Tally::new();
    let mut per_day: HashMap<String, BTreeMap<NaiveDate, usize>> = HashMap::new();
    for (date, record) in rows {
        for term in terms_of(*record) {
            if exclude.contains(term.as_str()) {
                continue;
            }
            totals.add(&term);
            *per_day.entry(term).or_default().entry(*date).or_default() += 1;
        }
    }
    totals
        .most_common(top_n)
        .into_iter()
        .map(|(term, total)| DailySeries {
            points: per_day.remove(&term).unwrap_or_default(),
            term,
            total,
        })
        .collect()
}

/// Per-day label counts for one stock.
#[derive(Debug, Clone, PartialEq)]
pub struct StockSentiment {
    pub stock: String,
    pub total: usize,
    pub points: BTreeMap<(NaiveDate, String), usize>,
}

/// Sentiment series for the `top_n` most mentioned stocks among labeled rows.
pub fn stock_sentiment(
    rows: &[(NaiveDate, &ArticleRecord)],
    stocks: &BTreeSet<String>,
    top_n: usize,
) -> Vec<StockSentiment> {
    let mut totals = Tally::new();
    let mut points: HashMap<String, BTreeMap<(NaiveDate, String), usize>> = HashMap::new();
    for (date, record) in rows.iter().filter(|(_, r)| !r.sentiment_label.is_empty()) {
        for stock in stock_mentions(&record.analysis_orgs, stocks) {
            totals.add(&stock);
            *points
                .entry(stock)
                .or_default()
                .entry((*date, record.sentiment_label.clone()))
                .or_default() += 1;
        }
    }
    totals
        .most_common(top_n)
        .into_iter()
        .map(|(stock, total)| StockSentiment {
            points: points.remove(&stock).unwrap_or_default(),
            stock,
            total,
        })
        .collect()
}

/// Most common keywords outside `exclude`.
pub fn themes(rows: &[(NaiveDate, &ArticleRecord)], exclude: &HashSet<&str>, n: usize) -> Vec<(String, usize)> {
    let mut tally = Tally::new();
    for term in rows.iter().flat_map(|(_, r)| &r.analysis_keywords) {
        if !exclude.contains(term.as_str()) {
            tally.add(term);
        }
    }
    tally.most_common(n)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PolicyHit {
    pub date: NaiveDate,
    pub url: String,
    pub keyword: String,
}

/// (date, url, keyword) triples whose keyword contains a policy word, in
/// row order, de-duplicated.
pub fn policy_news(
    rows: &[(NaiveDate, &ArticleRecord)],
    policy_words: &[String],
    exclude: &HashSet<&str>,
    n: usize,
) -> Vec<PolicyHit> {
    rows.iter()
        .flat_map(|(date, r)| r.analysis_keywords.iter().map(move |kw| (*date, *r, kw)))
        .filter(|(_, _, kw)| !exclude.contains(kw.as_str()))
        .filter(|(_, _, kw)| policy_words.iter().any(|pw| kw.contains(pw.as_str())))
        .map(|(date, r, kw)| PolicyHit {
            date,
            url: r.url.clone(),
            keyword: kw.clone(),
        })
        .unique()
        .take(n)
        .collect()
}

/// Newest rows first.
pub fn latest<'a>(rows: &[(NaiveDate, &'a ArticleRecord)], n: usize) -> Vec<(NaiveDate, &'a ArticleRecord)> {
    rows.iter().sorted_by(|a, b| b.0.cmp(&a.0)).take(n).copied().collect()
}

/// Newest rows whose keywords include `keyword` exactly.
pub fn related_news<'a>(
    rows: &[(NaiveDate, &'a ArticleRecord)],
    keyword: &str,
    n: usize,
) -> Vec<(NaiveDate, &'a ArticleRecord)> {
    let matching: Vec<_> = rows
        .iter()
        .filter(|(_, r)| r.analysis_keywords.iter().any(|k| k == keyword))
        .copied()
        .collect();
    latest(&matching, n)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn rec(url: &str, date: &str, keywords: &[&str], orgs: &[&str], label: &str) -> ArticleRecord {
        ArticleRecord {
            url: url.to_string(),
            title: format!("t-{url}"),
            published_at: date.to_string(),
            analysis_keywords: keywords.iter().map(|s| s.to_string()).collect(),
            analysis_orgs: orgs.iter().map(|s| s.to_string()).collect(),
            summary_ai: format!("s-{url}"),
            sentiment_label: label.to_string(),
            ..Default::default()
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_tally_ties_keep_first_seen_order() {
        let lists = [strings(&["b", "a"]), strings(&["a", "c", "b"])];
        let tally = Tally::from_lists(lists.iter().map(Vec::as_slice));
        assert_eq!(
            tally.most_common(3),
            vec![("b".to_string(), 2), ("a".to_string(), 2), ("c".to_string(), 1)]
        );
        assert_eq!(tally.get("missing"), 0);
    }

    #[test]
    fn test_analysis_date_falls_back_to_crawl_time() {
        let mut r = rec("u", "", &[], &[], "");
        r.crawled_at = "2025-07-30T09:12:00".to_string();
        assert_eq!(analysis_date(&r), Some(d("2025-07-30")));
        r.crawled_at.clear();
        assert_eq!(analysis_date(&r), None);
    }

    #[test]
    fn test_windows_boundaries() {
        let w = Windows::new(d("2025-07-31"), 7, 7);
        assert!(w.is_recent(d("2025-07-24")));
        assert!(!w.is_recent(d("2025-07-23")));
        assert!(w.is_previous(d("2025-07-23")));
        assert!(w.is_previous(d("2025-07-17")));
        assert!(!w.is_previous(d("2025-07-16")));
    }

    #[test]
    fn test_trending_threshold_and_orders() {
        let mut recent = Tally::new();
        let mut previous = Tally::new();
        for _ in 0..3 {
            recent.add("new");
        }
        for _ in 0..10 {
            recent.add("big");
        }
        for _ in 0..5 {
            previous.add("big");
        }
        for _ in 0..2 {
            recent.add("rare");
        }
        for _ in 0..4 {
            recent.add("flat");
            previous.add("flat");
        }

        let by_delta = trending(&recent, &previous, TrendOrder::Delta, 10);
        let terms: Vec<&str> = by_delta.iter().map(|t| t.term.as_str()).collect();
        assert_eq!(terms, vec!["big", "new"]);
        assert_eq!(by_delta[0].delta, 5);
        assert_eq!(by_delta[0].growth, 100.0);

        let by_growth = trending(&recent, &previous, TrendOrder::GrowthRate, 1);
        assert_eq!(by_growth.len(), 1);
        assert_eq!(by_growth[0].term, "new");
        assert_eq!(by_growth[0].growth, NEW_TERM_GROWTH);

        assert!(trending(&Tally::new(), &previous, TrendOrder::Delta, 10).is_empty());
    }

    #[test]
    fn test_sentiment_ratio_skips_unlabeled() {
        let records = vec![
            rec("1", "2025-07-30", &[], &[], "Positive"),
            rec("2", "2025-07-30", &[], &[], "Positive"),
            rec("3", "2025-07-30", &[], &[], "Negative"),
            rec("4", "2025-07-30", &[], &[], ""),
        ];
        let ratio = sentiment_ratio(&dated(&records));
        assert_eq!(ratio.get("Positive"), Some(&0.67));
        assert_eq!(ratio.get("Negative"), Some(&0.33));
        assert_eq!(ratio.len(), 2);
    }

    #[test]
    fn test_top_articles_order() {
        let records = vec![
            rec("p-old", "2025-07-28", &[], &[], "Positive"),
            rec("none", "2025-07-31", &[], &[], ""),
            rec("n", "2025-07-29", &[], &[], "Negative"),
            rec("p-new", "2025-07-30", &[], &[], "Positive"),
        ];
        let top = top_articles(&dated(&records), 10);
        let urls: Vec<&str> = top.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(urls, vec!["n", "p-new", "p-old", "none"]);
    }

    #[test]
    fn test_recommend_and_prune() {
        let records = vec![
            rec("1", "2025-07-30", &["반도체", "HBM", "엔비디아", "삼"], &[], ""),
            rec("2", "2025-07-30", &["엔비디아", "HBM", "관세"], &[], ""),
        ];
        let rows = dated(&records);
        let search = strings(&["반도체", "HBM", "바이오"]);

        let recs = recommend_keywords(&rows, &search);
        assert_eq!(recs, vec![("엔비디아".to_string(), 2), ("관세".to_string(), 1)]);

        let report = prune_report(&rows, &search, 2);
        assert_eq!(report.counts[1], ("HBM".to_string(), 2));
        assert_eq!(report.low_importance, search);
        assert_eq!(report.top_keywords, vec!["HBM", "엔비디아"]);
    }

    #[test]
    fn test_stock_views() {
        let stocks: BTreeSet<String> = strings(&["삼성전자", "SK하이닉스"]).into_iter().collect();
        let records = vec![
            rec("1", "2025-07-29", &["HBM"], &["삼성전자", "금융위원회"], "Positive"),
            rec("2", "2025-07-30", &["HBM"], &["삼성전자", "SK하이닉스"], "Negative"),
            rec("3", "2025-07-30", &["HBM"], &["삼성전자"], ""),
        ];
        let rows = dated(&records);

        let none = HashSet::new();
        let series = daily_series(&rows, |r| stock_mentions(&r.analysis_orgs, &stocks), &none, 1);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].term, "삼성전자");
        assert_eq!(series[0].points.get(&d("2025-07-30")), Some(&2));

        let stock_names: HashSet<&str> = stocks.iter().map(String::as_str).collect();
        let orgs = daily_series(&rows, |r| r.analysis_orgs.clone(), &stock_names, 5);
        assert_eq!(orgs.len(), 1);
        assert_eq!(orgs[0].term, "금융위원회");

        let sentiment = stock_sentiment(&rows, &stocks, 5);
        assert_eq!(sentiment[0].stock, "삼성전자");
        assert_eq!(sentiment[0].total, 2);
        assert_eq!(sentiment[0].points.get(&(d("2025-07-30"), "Negative".to_string())), Some(&1));
    }

    #[test]
    fn test_policy_news_and_related() {
        let records = vec![
            rec("1", "2025-07-29", &["금리인상", "정책", "금리인상"], &[], "Neutral"),
            rec("2", "2025-07-30", &["반도체 규제"], &[], "Negative"),
            rec("3", "2025-07-31", &["반도체"], &[], "Positive"),
        ];
        let rows = dated(&records);
        let exclude: HashSet<&str> = ["정책"].into_iter().collect();
        let hits = policy_news(&rows, &strings(&["금리", "규제", "정책"]), &exclude, 50);
        let urls: Vec<(&str, &str)> = hits.iter().map(|h| (h.url.as_str(), h.keyword.as_str())).collect();
        assert_eq!(urls, vec![("1", "금리인상"), ("2", "반도체 규제")]);

        let related = related_news(&rows, "반도체", 10);
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].1.url, "3");

        let newest = latest(&rows, 2);
        assert_eq!(newest[0].1.url, "3");
        assert_eq!(newest[1].1.url, "2");
    }

    #[test]
    fn test_load_stock_names_dedups_and_skips_missing() {
        let dir = tempfile::tempdir().unwrap();
        let kospi = dir.path().join("kospi.txt");
        let kosdaq = dir.path().join("kosdaq.txt");
        std::fs::write(&kospi, "\u{feff}삼성전자\n\nSK하이닉스 \n").unwrap();
        std::fs::write(&kosdaq, "에코프로\n삼성전자\n").unwrap();
        let missing = dir.path().join("missing.txt");

        let names = load_stock_names(&[kospi, kosdaq, missing.clone()]);
        assert_eq!(names.len(), 3);
        assert!(names.contains("SK하이닉스"));
        assert!(load_stock_names(&[missing]).is_empty());
    }
}
