//! Naver news search collection.
//!
//! Pages through `GET /v1/search/news.json` (newest first, 100 per page,
//! at most 1000 results per query) and keeps articles published on the
//! target dates, capped per date and de-duplicated by URL across keywords.

use crate::config::PipelineConfig;
use crate::models::CollectedArticle;
use crate::utils::strip_tags;
use chrono::{DateTime, Duration, Local, NaiveDate};
use reqwest::Client;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::error::Error;
use std::fmt;
use std::time::Duration as StdDuration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

const NAVER_BASE_URL: &str = "https://openapi.naver.com";
const PAGE_SIZE: usize = 100;
/// The API refuses `start` values beyond this.
const MAX_START: usize = 1000;

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    originallink: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    pub_date: String,
}

/// Naver Search API client.
#[derive(Clone)]
pub struct NaverSearch {
    http: Client,
    client_id: String,
    client_secret: String,
    base_url: String,
}

impl fmt::Debug for NaverSearch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NaverSearch")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl NaverSearch {
    pub fn new(client_id: &str, client_secret: &str) -> Result<Self, Box<dyn Error>> {
        if client_id.trim().is_empty() || client_secret.trim().is_empty() {
            return Err("NAVER_CLIENT_ID / NAVER_CLIENT_SECRET are not set".into());
        }
        let http = Client::builder()
            .timeout(StdDuration::from_secs(10))
            .danger_accept_invalid_certs(true)
            .build()?;
        Ok(Self {
            http,
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            base_url: NAVER_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn page_url(&self, keyword: &str, start: usize) -> String {
        format!(
            "{}/v1/search/news.json?query={}&display={}&start={}&sort=date",
            self.base_url,
            urlencoding::encode(keyword),
            PAGE_SIZE,
            start
        )
    }

    async fn fetch_page(&self, keyword: &str, start: usize) -> Result<Vec<SearchItem>, Box<dyn Error>> {
        let page: SearchPage = self
            .http
            .get(self.page_url(keyword, start))
            .header("X-Naver-Client-Id", &self.client_id)
            .header("X-Naver-Client-Secret", &self.client_secret)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(page.items)
    }

    /// Collect new articles for every keyword.
    ///
    /// `existing_urls` is both the skip list and the output dedup set; every
    /// accepted URL is added to it. A failing page ends that keyword only.
    #[instrument(level = "info", skip_all, fields(keywords = keywords.len(), %today))]
    pub async fn collect(
        &self,
        keywords: &[String],
        existing_urls: &mut HashSet<String>,
        today: NaiveDate,
        config: &PipelineConfig,
    ) -> Vec<CollectedArticle> {
        let target_dates: Vec<NaiveDate> = (0..config.collection_days.max(1))
            .map(|i| today - Duration::days(i as i64))
            .collect();
        let limit = config.articles_per_day_limit;
        let mut collected = Vec::new();

        info!(
            days = target_dates.len(),
            per_day_limit = limit,
            "Starting news search collection"
        );

        for keyword in keywords {
            let mut daily_counts: BTreeMap<NaiveDate, usize> =
                target_dates.iter().map(|d| (*d, 0)).collect();
            let mut start = 1;
            let before = collected.len();

            while start <= MAX_START {
                let items = match self.fetch_page(keyword, start).await {
                    Ok(items) => items,
                    Err(e) => {
                        warn!(%keyword, start, error = %e, "Search page failed; moving to next keyword");
                        break;
                    }
                };
                if items.is_empty() {
                    debug!(%keyword, start, "No more search results");
                    break;
                }

                for item in items {
                    let Some(published) = parse_pub_date(&item.pub_date) else {
                        continue;
                    };
                    let Some(count) = daily_counts.get_mut(&published) else {
                        continue;
                    };
                    if *count >= limit {
                        continue;
                    }
                    let url = if item.originallink.trim().is_empty() {
                        item.link.trim()
                    } else {
                        item.originallink.trim()
                    };
                    if url.is_empty() || existing_urls.contains(url) {
                        continue;
                    }

                    existing_urls.insert(url.to_string());
                    *count += 1;
                    collected.push(CollectedArticle {
                        search_keyword: keyword.clone(),
                        url: url.to_string(),
                        title: strip_tags(&item.title),
                        summary: strip_tags(&item.description),
                        crawled_at: Local::now().naive_local().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
                        published_at: published.format("%Y-%m-%d").to_string(),
                        content: None,
                        extract_error: None,
                    });
                }

                start += PAGE_SIZE;

                if daily_counts.values().all(|c| *c >= limit) {
                    debug!(%keyword, "Every target date reached its limit");
                    break;
                }
                if config.rate_limit_delay_ms > 0 {
                    sleep(StdDuration::from_millis(config.rate_limit_delay_ms)).await;
                }
            }

            info!(%keyword, found = collected.len() - before, "Keyword collected");
        }

        info!(total = collected.len(), "News search collection complete");
        collected
    }
}

/// `Mon, 07 Jul 2025 09:12:00 +0900` → date in the publisher's offset.
fn parse_pub_date(raw: &str) -> Option<NaiveDate> {
    DateTime::parse_from_rfc2822(raw.trim()).ok().map(|dt| dt.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn config(days: u32, limit: usize) -> PipelineConfig {
        PipelineConfig {
            collection_days: days,
            articles_per_day_limit: limit,
            rate_limit_delay_ms: 0,
            ..Default::default()
        }
    }

    fn item(n: usize, pub_date: &str) -> serde_json::Value {
        json!({
            "title": format!("<b>코스피</b> 기사 {n}"),
            "originallink": format!("https://news.example.com/{n}"),
            "link": format!("https://n.news.naver.com/{n}"),
            "description": "외국인 &quot;순매수&quot;",
            "pubDate": pub_date,
        })
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 8).unwrap()
    }

    #[test]
    fn test_parse_pub_date() {
        assert_eq!(parse_pub_date("Tue, 08 Jul 2025 09:12:00 +0900"), Some(today()));
        assert_eq!(parse_pub_date("yesterday"), None);
    }

    #[test]
    fn test_page_url_encodes_keyword() {
        let search = NaverSearch::new("id", "secret").unwrap().with_base_url("http://h/");
        let url = search.page_url("외국인 순매수", 101);
        assert!(url.starts_with("http://h/v1/search/news.json?query=%EC%99%B8"));
        assert!(url.contains("%20"));
        assert!(url.ends_with("&display=100&start=101&sort=date"));
    }

    #[tokio::test]
    async fn test_collect_filters_dates_and_duplicates() {
        let mut server = mockito::Server::new_async().await;
        let page = json!({"items": [
            item(1, "Tue, 08 Jul 2025 09:00:00 +0900"),
            item(2, "Mon, 07 Jul 2025 09:00:00 +0900"),
            item(3, "not a date"),
            item(4, "Tue, 08 Jul 2025 08:00:00 +0900"),
            item(1, "Tue, 08 Jul 2025 07:00:00 +0900"),
        ]});
        let first = server
            .mock("GET", "/v1/search/news.json")
            .match_query(Matcher::UrlEncoded("start".into(), "1".into()))
            .match_header("X-Naver-Client-Id", "id")
            .with_status(200)
            .with_body(page.to_string())
            .create_async()
            .await;
        let second = server
            .mock("GET", "/v1/search/news.json")
            .match_query(Matcher::UrlEncoded("start".into(), "101".into()))
            .with_status(200)
            .with_body(r#"{"items": []}"#)
            .create_async()
            .await;

        let search = NaverSearch::new("id", "secret").unwrap().with_base_url(server.url());
        let mut seen = HashSet::from(["https://news.example.com/4".to_string()]);
        let articles = search
            .collect(&["코스피".to_string()], &mut seen, today(), &config(1, 100))
            .await;

        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].url, "https://news.example.com/1");
        assert_eq!(articles[0].title, "코스피 기사 1");
        assert_eq!(articles[0].summary, "외국인 \"순매수\"");
        assert_eq!(articles[0].published_at, "2025-07-08");
        assert!(seen.contains("https://news.example.com/1"));
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn test_collect_stops_when_daily_limit_reached() {
        let mut server = mockito::Server::new_async().await;
        let page = json!({"items": [
            item(1, "Tue, 08 Jul 2025 09:00:00 +0900"),
            item(2, "Tue, 08 Jul 2025 08:00:00 +0900"),
            item(3, "Tue, 08 Jul 2025 07:00:00 +0900"),
        ]});
        let only_page = server
            .mock("GET", "/v1/search/news.json")
            .match_query(Matcher::UrlEncoded("start".into(), "1".into()))
            .with_status(200)
            .with_body(page.to_string())
            .expect(1)
            .create_async()
            .await;

        let search = NaverSearch::new("id", "secret").unwrap().with_base_url(server.url());
        let mut seen = HashSet::new();
        let articles = search
            .collect(&["반도체".to_string()], &mut seen, today(), &config(1, 2))
            .await;

        assert_eq!(articles.len(), 2);
        assert!(articles.iter().all(|a| a.search_keyword == "반도체"));
        only_page.assert_async().await;
    }

    #[tokio::test]
    async fn test_collect_uses_link_when_originallink_missing() {
        let mut server = mockito::Server::new_async().await;
        let mut hit = item(9, "Tue, 08 Jul 2025 09:00:00 +0900");
        hit["originallink"] = json!("");
        let _page = server
            .mock("GET", "/v1/search/news.json")
            .match_query(Matcher::UrlEncoded("start".into(), "1".into()))
            .with_status(200)
            .with_body(json!({"items": [hit]}).to_string())
            .create_async()
            .await;
        let _rest = server
            .mock("GET", "/v1/search/news.json")
            .match_query(Matcher::UrlEncoded("start".into(), "101".into()))
            .with_status(200)
            .with_body(r#"{"items": []}"#)
            .create_async()
            .await;

        let search = NaverSearch::new("id", "secret").unwrap().with_base_url(server.url());
        let articles = search
            .collect(&["HBM".to_string()], &mut HashSet::new(), today(), &config(1, 10))
            .await;
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].url, "https://n.news.naver.com/9");
    }

    #[tokio::test]
    async fn test_collect_error_skips_keyword_only() {
        let mut server = mockito::Server::new_async().await;
        let _fail = server
            .mock("GET", "/v1/search/news.json")
            .match_query(Matcher::UrlEncoded("query".into(), "환율".into()))
            .with_status(500)
            .create_async()
            .await;
        let _ok = server
            .mock("GET", "/v1/search/news.json")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("query".into(), "FOMC".into()),
                Matcher::UrlEncoded("start".into(), "1".into()),
            ]))
            .with_status(200)
            .with_body(json!({"items": [item(5, "Tue, 08 Jul 2025 09:00:00 +0900")]}).to_string())
            .create_async()
            .await;
        let _ok_rest = server
            .mock("GET", "/v1/search/news.json")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("query".into(), "FOMC".into()),
                Matcher::UrlEncoded("start".into(), "101".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"items": []}"#)
            .create_async()
            .await;

        let search = NaverSearch::new("id", "secret").unwrap().with_base_url(server.url());
        let keywords = vec!["환율".to_string(), "FOMC".to_string()];
        let articles = search
            .collect(&keywords, &mut HashSet::new(), today(), &config(1, 10))
            .await;
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].search_keyword, "FOMC");
    }
}
