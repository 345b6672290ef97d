//! CSV storage for the intermediate and aggregated article files.
//!
//! # Files
//!
//! - **intermediate** (`crawled_data.csv`): collected and extracted articles
//!   waiting for analysis. Its presence makes the next run resume at the
//!   analysis step.
//! - **aggregated** (`aggregated_stock_data.csv`): every analyzed article
//!   inside the retention window, one row per URL.
//! - **merged** (`merged_no_duplicate.csv`): projection of a folder of
//!   exports, de-duplicated by URL.
//!
//! List cells are written as JSON arrays. Readers also accept the older
//! `['a', 'b']` literal form. Files are UTF-8 with a BOM so spreadsheet
//! tools pick the right encoding.

use crate::models::{ArticleRecord, CollectedArticle};
use crate::utils::parse_date_lenient;
use chrono::{Duration, NaiveDate};
use csv::{QuoteStyle, ReaderBuilder, StringRecord, WriterBuilder};
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

const BOM: &str = "\u{feff}";

pub const AGGREGATED_COLUMNS: [&str; 11] = [
    "search_keyword",
    "url",
    "title",
    "summary",
    "crawled_at",
    "published_at",
    "content",
    "analysis_keywords",
    "analysis_orgs",
    "summary_ai",
    "sentiment_label",
];

pub const MERGED_COLUMNS: [&str; 7] = [
    "url",
    "title",
    "published_at",
    "analysis_keywords",
    "analysis_orgs",
    "summary_ai",
    "sentiment_label",
];

pub const MERGED_FILE_NAME: &str = "merged_no_duplicate.csv";

fn ensure_parent(path: &Path) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Sibling file a rewrite goes to before it replaces `path`.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `path` through a sibling temp file that is renamed over it only
/// after every byte is flushed. On failure the previous file is untouched.
fn replace_file<F>(path: &Path, write: F) -> Result<(), Box<dyn Error>>
where
    F: FnOnce(fs::File) -> Result<(), Box<dyn Error>>,
{
    ensure_parent(path)?;
    let tmp_path = temp_path(path);
    let written = fs::File::create(&tmp_path)
        .map_err(Box::<dyn Error>::from)
        .and_then(write);
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn read_text(path: &Path) -> Result<String, Box<dyn Error>> {
    let bytes = fs::read(path)?;
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            warn!(path = %path.display(), "File is not valid UTF-8; replacing bad sequences");
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    };
    Ok(text.strip_prefix(BOM).map(str::to_string).unwrap_or(text))
}

/// Save collected articles so a failed analysis can resume from them.
#[instrument(level = "info", skip_all, fields(path = %path.display(), count = articles.len()))]
pub fn save_intermediate(articles: &[CollectedArticle], path: &Path) -> Result<(), Box<dyn Error>> {
    replace_file(path, |mut file| {
        file.write_all(BOM.as_bytes())?;
        let mut wtr = WriterBuilder::new().from_writer(file);
        for article in articles {
            wtr.serialize(article)?;
        }
        wtr.flush()?;
        Ok(())
    })?;
    info!("Saved intermediate articles");
    Ok(())
}

/// Load the intermediate file, or `None` when there is nothing to resume.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub fn load_intermediate(path: &Path) -> Result<Option<Vec<CollectedArticle>>, Box<dyn Error>> {
    if !path.exists() {
        return Ok(None);
    }
    let text = read_text(path)?;
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(text.as_bytes());
    let mut articles = Vec::new();
    for (line, row) in rdr.deserialize::<CollectedArticle>().enumerate() {
        match row {
            Ok(article) => articles.push(article),
            Err(e) => warn!(row = line + 1, error = %e, "Skipping unreadable intermediate row"),
        }
    }
    info!(count = articles.len(), "Loaded intermediate articles");
    Ok(Some(articles))
}

/// Delete the intermediate file; true when one existed.
pub fn remove_intermediate(path: &Path) -> Result<bool, Box<dyn Error>> {
    match fs::remove_file(path) {
        Ok(()) => {
            info!(path = %path.display(), "Removed intermediate file");
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Box::new(e)),
    }
}

/// Parse a list cell: a JSON array, or a single/double-quoted literal list.
/// Anything else is an empty list.
pub fn parse_list_cell(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Vec::new();
    }
    if let Ok(values) = serde_json::from_str::<Vec<serde_json::Value>>(raw) {
        return values
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();
    }
    parse_literal_list(raw).unwrap_or_default()
}

/// `['a', "b's"]` → `["a", "b's"]`. Non-string items are dropped.
fn parse_literal_list(raw: &str) -> Option<Vec<String>> {
    let inner = raw.strip_prefix('[')?.strip_suffix(']')?;
    let mut items = Vec::new();
    let mut chars = inner.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace() || *c == ',').is_some() {}
        let Some(first) = chars.next() else { break };
        if first == '\'' || first == '"' {
            let mut item = String::new();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '\\' => item.push(chars.next()?),
                    c if c == first => {
                        closed = true;
                        break;
                    }
                    c => item.push(c),
                }
            }
            if !closed {
                return None;
            }
            items.push(item);
        } else {
            // Bare token (number, None); skip to the next separator.
            while chars.next_if(|c| *c != ',').is_some() {}
        }
    }
    Some(items)
}

fn format_list_cell(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

fn column_index(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim().to_string(), i))
        .collect()
}

fn cell(row: &StringRecord, index: &HashMap<String, usize>, name: &str) -> String {
    index
        .get(name)
        .and_then(|i| row.get(*i))
        .unwrap_or_default()
        .to_string()
}

fn record_from_row(row: &StringRecord, index: &HashMap<String, usize>) -> ArticleRecord {
    ArticleRecord {
        search_keyword: cell(row, index, "search_keyword"),
        url: cell(row, index, "url"),
        title: cell(row, index, "title"),
        summary: cell(row, index, "summary"),
        crawled_at: cell(row, index, "crawled_at"),
        published_at: cell(row, index, "published_at"),
        content: cell(row, index, "content"),
        analysis_keywords: parse_list_cell(&cell(row, index, "analysis_keywords")),
        analysis_orgs: parse_list_cell(&cell(row, index, "analysis_orgs")),
        summary_ai: cell(row, index, "summary_ai"),
        sentiment_label: cell(row, index, "sentiment_label"),
    }
}

fn record_cell(record: &ArticleRecord, name: &str) -> String {
    match name {
        "search_keyword" => record.search_keyword.clone(),
        "url" => record.url.clone(),
        "title" => record.title.clone(),
        "summary" => record.summary.clone(),
        "crawled_at" => record.crawled_at.clone(),
        "published_at" => record.published_at.clone(),
        "content" => record.content.clone(),
        "analysis_keywords" => format_list_cell(&record.analysis_keywords),
        "analysis_orgs" => format_list_cell(&record.analysis_orgs),
        "summary_ai" => record.summary_ai.clone(),
        "sentiment_label" => record.sentiment_label.clone(),
        _ => String::new(),
    }
}

/// Read article records from any CSV carrying a subset of the known columns.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub fn read_records(path: &Path) -> Result<Vec<ArticleRecord>, Box<dyn Error>> {
    let text = read_text(path)?;
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(text.as_bytes());
    let index = column_index(rdr.headers()?);
    if !index.contains_key("url") {
        warn!("CSV has no url column");
    }
    let mut records = Vec::new();
    for (line, row) in rdr.records().enumerate() {
        match row {
            Ok(row) => records.push(record_from_row(&row, &index)),
            Err(e) => warn!(row = line + 1, error = %e, "Skipping unreadable row"),
        }
    }
    debug!(count = records.len(), "Read records");
    Ok(records)
}

/// Write records with the given columns, every field quoted.
///
/// The file is replaced as a whole: a failed write leaves the previous
/// contents in place.
pub fn write_records(path: &Path, records: &[ArticleRecord], columns: &[&str]) -> Result<(), Box<dyn Error>> {
    replace_file(path, |mut file| {
        file.write_all(BOM.as_bytes())?;
        let mut wtr = WriterBuilder::new()
            .quote_style(QuoteStyle::Always)
            .from_writer(file);
        wtr.write_record(columns)?;
        for record in records {
            wtr.write_record(columns.iter().map(|c| record_cell(record, c)))?;
        }
        wtr.flush()?;
        Ok(())
    })
}

/// Merge `incoming` into `existing` by URL. The later row wins and takes
/// the earlier row's position; new URLs are appended in arrival order.
pub fn merge_by_url(existing: Vec<ArticleRecord>, incoming: Vec<ArticleRecord>) -> Vec<ArticleRecord> {
    let mut merged: Vec<ArticleRecord> = Vec::with_capacity(existing.len() + incoming.len());
    let mut position: HashMap<String, usize> = HashMap::new();
    for record in existing.into_iter().chain(incoming) {
        match position.get(&record.url) {
            Some(&i) => merged[i] = record,
            None => {
                position.insert(record.url.clone(), merged.len());
                merged.push(record);
            }
        }
    }
    merged
}

/// Keep rows published within `retention_days` of `today`, rewriting
/// `published_at` to `YYYY-MM-DD`. Rows with unparseable dates are dropped.
pub fn retain_recent(records: Vec<ArticleRecord>, today: NaiveDate, retention_days: i64) -> Vec<ArticleRecord> {
    let cutoff = today - Duration::days(retention_days);
    records
        .into_iter()
        .filter_map(|mut record| {
            let date = parse_date_lenient(&record.published_at)?;
            if date < cutoff {
                return None;
            }
            record.published_at = date.format("%Y-%m-%d").to_string();
            Some(record)
        })
        .collect()
}

/// Fold newly analyzed records into the aggregated file and apply retention.
///
/// # Arguments
///
/// * `new_records` - Rows from the latest analysis; they win over stored
///   rows with the same URL.
/// * `path` - The aggregated CSV. A missing file starts an empty store.
/// * `today` - Reference date for retention.
/// * `retention_days` - Rows published before `today - retention_days` are dropped.
///
/// # Returns
///
/// The number of rows written. On error the previous file is left as it was.
#[instrument(level = "info", skip_all, fields(path = %path.display(), new = new_records.len()))]
pub fn aggregate_and_save(
    new_records: Vec<ArticleRecord>,
    path: &Path,
    today: NaiveDate,
    retention_days: i64,
) -> Result<usize, Box<dyn Error>> {
    let existing = if path.exists() { read_records(path)? } else { Vec::new() };
    let existing_count = existing.len();
    let merged = merge_by_url(existing, new_records);
    let merged_count = merged.len();
    let kept = retain_recent(merged, today, retention_days);

    write_records(path, &kept, &AGGREGATED_COLUMNS)?;
    info!(
        existing = existing_count,
        merged = merged_count,
        written = kept.len(),
        dropped = merged_count - kept.len(),
        "Aggregated CSV saved"
    );
    Ok(kept.len())
}

/// Concatenate every `*.csv` in `folder` (in file-name order, `output`
/// excluded), project to [`MERGED_COLUMNS`] and keep the first row per URL.
#[instrument(level = "info", skip_all, fields(folder = %folder.display()))]
pub fn merge_directory(folder: &Path, output: &Path) -> Result<usize, Box<dyn Error>> {
    let output_name = output.file_name();
    let mut files: Vec<_> = fs::read_dir(folder)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")))
        .filter(|p| p.file_name() != output_name)
        .collect();
    files.sort();

    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::new();
    for file in &files {
        let records = match read_records(file) {
            Ok(records) => records,
            Err(e) => {
                warn!(path = %file.display(), error = %e, "Skipping unreadable CSV");
                continue;
            }
        };
        let before = merged.len();
        for record in records {
            if seen.insert(record.url.clone()) {
                merged.push(record);
            }
        }
        debug!(path = %file.display(), added = merged.len() - before, "Merged file");
    }

    write_records(output, &merged, &MERGED_COLUMNS)?;
    info!(files = files.len(), rows = merged.len(), output = %output.display(), "Merged CSV files without duplicates");
    Ok(merged.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(url: &str, published_at: &str, summary_ai: &str) -> ArticleRecord {
        ArticleRecord {
            url: url.to_string(),
            title: format!("title {url}"),
            published_at: published_at.to_string(),
            summary_ai: summary_ai.to_string(),
            analysis_keywords: vec!["반도체".to_string(), "HBM".to_string()],
            ..Default::default()
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 31).unwrap()
    }

    #[test]
    fn test_parse_list_cell_forms() {
        assert_eq!(parse_list_cell(r#"["코스피", "환율"]"#), vec!["코스피", "환율"]);
        assert_eq!(parse_list_cell("['코스피', '환율']"), vec!["코스피", "환율"]);
        assert_eq!(parse_list_cell(r#"['it\'s', "a, b"]"#), vec!["it's", "a, b"]);
        assert_eq!(parse_list_cell("['a', 3, None, 'b']"), vec!["a", "b"]);
        assert_eq!(parse_list_cell("[]"), Vec::<String>::new());
        assert_eq!(parse_list_cell("nan"), Vec::<String>::new());
        assert_eq!(parse_list_cell("['unterminated]"), Vec::<String>::new());
    }

    #[test]
    fn test_intermediate_round_trip_keeps_multiline_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("intermediate").join("crawled_data.csv");
        let articles = vec![
            CollectedArticle {
                search_keyword: "코스피".to_string(),
                url: "https://a.example/1".to_string(),
                title: "제목, 쉼표".to_string(),
                content: Some("첫 줄\n\"인용\" 둘째 줄".to_string()),
                ..Default::default()
            },
            CollectedArticle {
                url: "https://a.example/2".to_string(),
                extract_error: Some("body not found".to_string()),
                ..Default::default()
            },
        ];
        save_intermediate(&articles, &path).unwrap();
        let raw = fs::read(&path).unwrap();
        assert!(raw.starts_with(BOM.as_bytes()));

        let loaded = load_intermediate(&path).unwrap().unwrap();
        assert_eq!(loaded, articles);

        assert!(remove_intermediate(&path).unwrap());
        assert!(!remove_intermediate(&path).unwrap());
        assert!(load_intermediate(&path).unwrap().is_none());
    }

    #[test]
    fn test_merge_by_url_last_write_wins() {
        let existing = vec![record("u1", "2025-07-30", "old"), record("u2", "2025-07-30", "keep")];
        let incoming = vec![record("u3", "2025-07-31", "new"), record("u1", "2025-07-31", "fresh")];
        let merged = merge_by_url(existing, incoming);
        let urls: Vec<&str> = merged.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["u1", "u2", "u3"]);
        assert_eq!(merged[0].summary_ai, "fresh");
    }

    #[test]
    fn test_retain_recent_normalizes_and_drops() {
        let records = vec![
            record("recent", "2025-07-30T10:00:00", ""),
            record("edge", "2025-07-01", ""),
            record("old", "2025-06-30", ""),
            record("garbage", "yesterday", ""),
        ];
        let kept = retain_recent(records, today(), 30);
        let urls: Vec<&str> = kept.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["recent", "edge"]);
        assert_eq!(kept[0].published_at, "2025-07-30");
    }

    #[test]
    fn test_aggregate_and_save_is_incremental() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aggregated").join("aggregated_stock_data.csv");

        let first = aggregate_and_save(vec![record("u1", "2025-07-30", "v1")], &path, today(), 30).unwrap();
        assert_eq!(first, 1);
        let second = aggregate_and_save(
            vec![record("u1", "2025-07-30", "v2"), record("u2", "2025-07-31", "x")],
            &path,
            today(),
            30,
        )
        .unwrap();
        assert_eq!(second, 2);

        let stored = read_records(&path).unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].summary_ai, "v2");
        assert_eq!(stored[0].analysis_keywords, vec!["반도체", "HBM"]);

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains(r#""analysis_keywords""#));
        assert!(raw.contains(r#""[""반도체"",""HBM""]""#));
    }

    #[test]
    fn test_failed_rewrite_keeps_previous_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aggregated_stock_data.csv");
        aggregate_and_save(vec![record("u1", "2025-07-30", "v1")], &path, today(), 30).unwrap();
        let before = fs::read(&path).unwrap();

        // A directory where the temp file should go makes the rewrite fail.
        fs::create_dir(temp_path(&path)).unwrap();
        let res = aggregate_and_save(vec![record("u2", "2025-07-31", "x")], &path, today(), 30);
        assert!(res.is_err());

        assert_eq!(fs::read(&path).unwrap(), before);
        let stored = read_records(&path).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].url, "u1");
    }

    #[test]
    fn test_write_records_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        write_records(&path, &[record("u1", "2025-07-30", "v1")], &MERGED_COLUMNS).unwrap();
        assert!(path.exists());
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_read_records_tolerates_missing_columns_and_bom() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.csv");
        fs::write(
            &path,
            "\u{feff}url,title,analysis_keywords,sentiment_label\n\
             https://x/1,제목,\"['코스피', '외국인']\",Positive\n",
        )
        .unwrap();
        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].url, "https://x/1");
        assert_eq!(records[0].analysis_keywords, vec!["코스피", "외국인"]);
        assert_eq!(records[0].summary_ai, "");
        assert_eq!(records[0].sentiment_label, "Positive");
    }

    #[test]
    fn test_merge_directory_keeps_first_url() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("a.csv"),
            "url,title,published_at,summary_ai\nhttps://x/1,first,2025-07-01,A\nhttps://x/2,two,2025-07-02,B\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("b.csv"),
            "url,title,extra\nhttps://x/1,second,zzz\nhttps://x/3,three,zzz\n",
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let output = dir.path().join(MERGED_FILE_NAME);
        fs::write(&output, "url\nhttps://stale/0\n").unwrap();

        let rows = merge_directory(dir.path(), &output).unwrap();
        assert_eq!(rows, 3);

        let merged = read_records(&output).unwrap();
        let titles: Vec<&str> = merged.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["first", "two", "three"]);

        let header = fs::read_to_string(&output).unwrap();
        let first_line = header.trim_start_matches(BOM).lines().next().unwrap().to_string();
        assert_eq!(
            first_line,
            r#""url","title","published_at","analysis_keywords","analysis_orgs","summary_ai","sentiment_label""#
        );
    }
}
