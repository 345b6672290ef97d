//! Small helpers shared across stages: log truncation, JSON error
//! classification, tag stripping, lenient date parsing and output dir checks.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use html_escape::decode_html_entities;
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^<]+?>").unwrap());

/// Truncate a string for logging purposes.
///
/// Cuts on a char boundary, so Hangul text never splits mid-codepoint.
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Detect if a serde_json error indicates truncated/incomplete JSON.
///
/// When the LLM response is cut off by the token limit, parsing fails
/// with an EOF error. Those responses are worth asking for again.
pub fn looks_truncated(e: &serde_json::Error) -> bool {
    use serde_json::error::Category;
    matches!(e.classify(), Category::Eof)
}

/// Remove markup from search API snippets and decode HTML entities.
///
/// Named and numeric references (`&middot;`, `&#8220;`, `&#x27;`) are all
/// decoded; non-breaking spaces become plain spaces.
///
/// ```ignore
/// assert_eq!(strip_tags("<b>코스피</b> &hellip;"), "코스피 …");
/// ```
pub fn strip_tags(s: &str) -> String {
    let text = TAG_RE.replace_all(s, "");
    decode_html_entities(&text).replace('\u{a0}', " ").trim().to_string()
}

/// Parse the date part of the timestamp shapes found in stored rows:
/// `2025-07-01`, `2025-07-01T09:30:00`, RFC 3339 and `2025-07-01 09:30:00`.
pub fn parse_date_lenient(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.date());
        }
    }
    // Fall back to a leading YYYY-MM-DD.
    raw.get(..10)
        .and_then(|head| NaiveDate::parse_from_str(head, "%Y-%m-%d").ok())
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then writes and removes a probe file.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    let probe_path = path.join("..__probe_write__");
    stdfs::File::create(&probe_path)?;
    let _ = stdfs::remove_file(&probe_path);
    info!("Output directory is writable");
    Ok(())
}
