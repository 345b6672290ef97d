//! Article body extraction for arbitrary news pages.
//!
//! The cascade, first candidate with more than [`MIN_BODY_CHARS`] chars wins:
//!
//! 1. the publisher's [`SiteRule`], when the host is known;
//! 2. the generic container selectors in [`GENERIC_SELECTORS`] order;
//! 3. JSON-LD `articleBody`, for any host.
//!
//! Text under `script`, `style`, `header`, `footer`, `nav`, `aside`,
//! `iframe` and `figure` never counts. The winner is cut at the first line
//! carrying an end marker (bylines, copyright, share widgets).

use super::sites::{rule_for_host, SiteRule};
use crate::models::CollectedArticle;
use encoding_rs::{Encoding, UTF_8};
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, CONTENT_TYPE};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::error::Error;
use std::ops::Deref;
use std::time::Duration as StdDuration;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// Bodies this short are navigation or teaser blocks, not articles.
pub const MIN_BODY_CHARS: usize = 100;

pub const GENERIC_SELECTORS: &[&str] = &[
    "#article-view-content-div",
    "#CmAdContent",
    "#articleBody",
    "#article-body",
    "#view_content_wrap",
    "#article-content-body",
    "#news_body_area",
    "#article_content",
    "#news-contents",
    "#articleText",
    "article",
    ".article_body",
    ".news_end",
];

const SKIP_TAGS: &[&str] = &["script", "style", "header", "footer", "nav", "aside", "iframe", "figure"];

pub const BODY_NOT_FOUND: &str = "body not found";

static META_CHARSET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?\s*([a-z0-9_\-]+)"#).unwrap());
static LD_JSON: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).unwrap());

/// Fetches article pages and extracts their bodies.
#[derive(Debug, Clone)]
pub struct ArticleFetcher {
    http: Client,
    end_markers: Vec<String>,
}

impl ArticleFetcher {
    pub fn new(end_markers: Vec<String>) -> Result<Self, Box<dyn Error>> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("ko-KR,ko;q=0.9"));
        let http = Client::builder()
            .user_agent("Mozilla/5.0")
            .default_headers(headers)
            .timeout(StdDuration::from_secs(15))
            .danger_accept_invalid_certs(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self { http, end_markers })
    }

    /// Fetch one page. `Ok(None)` means the page loaded but no body was found.
    #[instrument(level = "debug", skip_all, fields(%url))]
    pub async fn fetch(&self, url: &str) -> Result<Option<String>, Box<dyn Error>> {
        let res = self.http.get(url).send().await?.error_for_status()?;
        let content_type = res
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = res.bytes().await?;
        let html = decode_body(&bytes, content_type.as_deref());
        let body = extract_from_html(&html, url, &self.end_markers);
        debug!(found = body.is_some(), bytes = bytes.len(), "Parsed article page");
        Ok(body)
    }

    /// Fill `content` (or `extract_error`) for every article that has no body yet.
    ///
    /// Failures are recorded on the article and logged; none abort the batch.
    ///
    /// # Arguments
    ///
    /// * `articles` - Collected articles, updated in place.
    /// * `concurrency` - Maximum pages in flight at once.
    /// * `delay` - Pause after each page, to stay polite to publishers.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let fetcher = ArticleFetcher::new(config.end_markers.clone())?;
    /// fetcher.fetch_contents(&mut articles, 4, Duration::from_millis(100)).await;
    /// ```
    #[instrument(level = "info", skip_all, fields(total = articles.len()))]
    pub async fn fetch_contents(
        &self,
        articles: &mut [CollectedArticle],
        concurrency: usize,
        delay: StdDuration,
    ) {
        let pending: Vec<(usize, String)> = articles
            .iter()
            .enumerate()
            .filter(|(_, a)| a.content.is_none())
            .map(|(i, a)| (i, a.url.clone()))
            .collect();
        let pending_count = pending.len();

        let results: Vec<(usize, Result<Option<String>, String>)> = stream::iter(pending)
            .map(|(i, url)| async move {
                let res = self.fetch(&url).await.map_err(|e| e.to_string());
                if !delay.is_zero() {
                    sleep(delay).await;
                }
                (i, res)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        let mut extracted = 0usize;
        for (i, res) in results {
            let article = &mut articles[i];
            match res {
                Ok(Some(body)) => {
                    article.content = Some(body);
                    article.extract_error = None;
                    extracted += 1;
                }
                Ok(None) => {
                    warn!(url = %article.url, "No article body found");
                    article.extract_error = Some(BODY_NOT_FOUND.to_string());
                }
                Err(e) => {
                    error!(url = %article.url, error = %e, "Article fetch failed");
                    article.extract_error = Some(e);
                }
            }
        }
        info!(pending = pending_count, extracted, "Article body extraction complete");
    }
}

/// Decode a page, trusting the header charset unless it is the HTTP
/// default Latin-1, then the `<meta charset>`, then UTF-8.
pub fn decode_body(bytes: &[u8], content_type: Option<&str>) -> String {
    let header_label = content_type.and_then(charset_from_content_type);
    let label = header_label
        .clone()
        .filter(|l| !matches!(l.as_str(), "iso-8859-1" | "latin1" | "us-ascii"))
        .or_else(|| sniff_meta_charset(bytes))
        .or(header_label);
    let encoding = label
        .and_then(|l| Encoding::for_label(l.as_bytes()))
        .unwrap_or(UTF_8);
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        debug!(encoding = encoding.name(), "Malformed sequences replaced while decoding");
    }
    text.into_owned()
}

fn charset_from_content_type(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .filter_map(|part| part.trim().split_once('='))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("charset"))
        .map(|(_, v)| v.trim().trim_matches('"').to_ascii_lowercase())
}

fn sniff_meta_charset(bytes: &[u8]) -> Option<String> {
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(4096)]);
    META_CHARSET_RE
        .captures(&head)
        .map(|c| c[1].to_ascii_lowercase())
}

/// Run the extraction cascade over an already-decoded page.
pub fn extract_from_html(html: &str, url: &str, end_markers: &[String]) -> Option<String> {
    let document = Html::parse_document(html);
    let host = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default();

    let site_body = match rule_for_host(&host) {
        Some(SiteRule::Selectors(selectors)) => first_selector_body(&document, selectors),
        Some(SiteRule::JsonLd) => json_ld_body(&document),
        None => None,
    };

    let body = site_body
        .or_else(|| first_selector_body(&document, GENERIC_SELECTORS))
        .or_else(|| json_ld_body(&document))?;

    let cleaned = cut_at_end_marker(&body, end_markers);
    Some(cleaned).filter(|c| !c.is_empty())
}

fn long_enough(text: &str) -> bool {
    text.chars().count() > MIN_BODY_CHARS
}

fn first_selector_body(document: &Html, selectors: &[&str]) -> Option<String> {
    for raw in selectors {
        let Ok(selector) = Selector::parse(raw) else {
            warn!(selector = raw, "Invalid selector skipped");
            continue;
        };
        let Some(element) = document.select(&selector).find(|e| !inside_skipped(e)) else {
            continue;
        };
        let text = visible_lines(element).join("\n");
        if long_enough(&text) {
            debug!(selector = raw, chars = text.chars().count(), "Body container matched");
            return Some(text);
        }
    }
    None
}

fn is_skip_node(node: &scraper::Node) -> bool {
    node.as_element()
        .is_some_and(|e| SKIP_TAGS.contains(&e.name()))
}

fn inside_skipped(element: &ElementRef<'_>) -> bool {
    element.deref().ancestors().any(|a| is_skip_node(a.value()))
}

/// Trimmed, non-empty text nodes under `root`, skipping boilerplate subtrees.
fn visible_lines(root: ElementRef<'_>) -> Vec<String> {
    let root = root.deref();
    let root_id = root.id();
    root.descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let hidden = node
                .ancestors()
                .take_while(|a| a.id() != root_id)
                .any(|a| is_skip_node(a.value()));
            let line = text.trim();
            (!hidden && !line.is_empty()).then(|| line.to_string())
        })
        .collect()
}

fn json_ld_body(document: &Html) -> Option<String> {
    document.select(&LD_JSON).find_map(|script| {
        let raw: String = script.text().collect();
        let value: serde_json::Value = serde_json::from_str(raw.trim()).ok()?;
        let body = find_article_body(&value)?;
        let text = body
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        long_enough(&text).then_some(text)
    })
}

fn find_article_body(value: &serde_json::Value) -> Option<&str> {
    use serde_json::Value::*;
    match value {
        Array(items) => items.iter().find_map(find_article_body),
        Object(map) => map
            .get("articleBody")
            .and_then(|b| b.as_str())
            .filter(|b| !b.trim().is_empty())
            .or_else(|| map.get("@graph").and_then(find_article_body)),
        _ => None,
    }
}

/// Keep lines up to (not including) the first one containing an end marker.
pub fn cut_at_end_marker(text: &str, end_markers: &[String]) -> String {
    text.lines()
        .take_while(|line| !end_markers.iter().any(|m| line.contains(m.as_str())))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
