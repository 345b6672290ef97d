//! End-to-end runs: collect, extract, analyze, store.
//!
//! A run is resumable. Collected articles are written to the intermediate
//! CSV before the LLM is called; if analysis or storage fails, that file
//! stays behind and the next run picks up from it instead of searching again.

use crate::api::{GeminiClient, RetryAsk};
use crate::analysis::analyze_articles;
use crate::config::{OutputPaths, PipelineConfig};
use crate::models::CollectedArticle;
use crate::scrapers::content::ArticleFetcher;
use crate::scrapers::naver::NaverSearch;
use crate::store;
use crate::trends::{self, recommend_keywords};
use crate::utils::ensure_writable_dir;
use chrono::{Duration, Local, NaiveDate};
use std::collections::HashSet;
use std::error::Error;
use std::time::{Duration as StdDuration, Instant};
use tracing::{error, info, instrument, warn};

/// Days of aggregated data keyword recommendations look at.
pub const RECOMMENDATION_DAYS: i64 = 30;

const LLM_MAX_RETRIES: usize = 5;
const LLM_BASE_DELAY: StdDuration = StdDuration::from_secs(1);

/// Secrets supplied on the command line or through the environment.
#[derive(Clone, Default)]
pub struct Credentials {
    pub google_api_key: Option<String>,
    pub naver_client_id: Option<String>,
    pub naver_client_secret: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("google_api_key", &self.google_api_key.as_ref().map(|_| "<redacted>"))
            .field("naver_client_id", &self.naver_client_id.as_ref().map(|_| "<redacted>"))
            .field("naver_client_secret", &self.naver_client_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn llm_client(config: &PipelineConfig, credentials: &Credentials) -> Result<RetryAsk<GeminiClient>, Box<dyn Error>> {
    let key = credentials
        .google_api_key
        .as_deref()
        .ok_or("GOOGLE_API_KEY is not set")?;
    let mut gemini = GeminiClient::new(key, &config.model)?;
    if let Some(base_url) = &config.gemini_base_url {
        gemini = gemini.with_base_url(base_url);
    }
    Ok(RetryAsk::new(gemini, LLM_MAX_RETRIES, LLM_BASE_DELAY))
}

/// Full run. Returns the number of rows in the aggregated store.
#[instrument(level = "info", skip_all, fields(root = %paths.root.display()))]
pub async fn run(config: &PipelineConfig, paths: &OutputPaths, credentials: &Credentials) -> Result<usize, Box<dyn Error>> {
    let start_time = Instant::now();
    let today = Local::now().date_naive();
    ensure_writable_dir(&paths.root).await?;

    // The key is checked before any crawling so a misconfigured run fails fast.
    let client = llm_client(config, credentials)?;

    let articles = match store::load_intermediate(&paths.intermediate)? {
        Some(articles) => {
            info!(count = articles.len(), "Resuming from intermediate file; skipping collection");
            articles
        }
        None => {
            let articles = collect_and_extract(config, paths, credentials, today).await?;
            if articles.is_empty() {
                info!("No new articles found");
                return Ok(0);
            }
            store::save_intermediate(&articles, &paths.intermediate)?;
            articles
        }
    };

    let rows = analyze_and_store(&client, config, paths, articles, today).await?;
    log_recommendations(config, paths, today);

    let elapsed = start_time.elapsed();
    info!(?elapsed, secs = elapsed.as_secs(), rows, "Pipeline complete");
    Ok(rows)
}

/// Analyze the intermediate file only.
#[instrument(level = "info", skip_all, fields(root = %paths.root.display()))]
pub async fn analyze_only(
    config: &PipelineConfig,
    paths: &OutputPaths,
    credentials: &Credentials,
) -> Result<usize, Box<dyn Error>> {
    let client = llm_client(config, credentials)?;
    let Some(articles) = store::load_intermediate(&paths.intermediate)? else {
        return Err(format!("no intermediate file at {}", paths.intermediate.display()).into());
    };
    if articles.is_empty() {
        warn!("Intermediate file is empty; removing it");
        store::remove_intermediate(&paths.intermediate)?;
        return Ok(0);
    }
    analyze_and_store(&client, config, paths, articles, Local::now().date_naive()).await
}

async fn collect_and_extract(
    config: &PipelineConfig,
    paths: &OutputPaths,
    credentials: &Credentials,
    today: NaiveDate,
) -> Result<Vec<CollectedArticle>, Box<dyn Error>> {
    let (Some(id), Some(secret)) = (
        credentials.naver_client_id.as_deref(),
        credentials.naver_client_secret.as_deref(),
    ) else {
        return Err("NAVER_CLIENT_ID and NAVER_CLIENT_SECRET must be set".into());
    };
    let mut search = NaverSearch::new(id, secret)?;
    if let Some(base_url) = &config.naver_base_url {
        search = search.with_base_url(base_url);
    }

    let mut existing_urls: HashSet<String> = if paths.aggregated.exists() {
        store::read_records(&paths.aggregated)?
            .into_iter()
            .map(|r| r.url)
            .filter(|u| !u.is_empty())
            .collect()
    } else {
        HashSet::new()
    };
    info!(known_urls = existing_urls.len(), "Loaded stored URLs");

    let mut articles = search
        .collect(&config.keywords, &mut existing_urls, today, config)
        .await;
    if articles.is_empty() {
        return Ok(articles);
    }

    let fetcher = ArticleFetcher::new(config.end_markers.clone())?;
    fetcher
        .fetch_contents(
            &mut articles,
            config.fetch_concurrency,
            StdDuration::from_millis(config.extract_delay_ms),
        )
        .await;
    Ok(articles)
}

async fn analyze_and_store<A>(
    client: &A,
    config: &PipelineConfig,
    paths: &OutputPaths,
    articles: Vec<CollectedArticle>,
    today: NaiveDate,
) -> Result<usize, Box<dyn Error>>
where
    A: crate::api::AskAsync<Response = String>,
{
    let (records, report) = analyze_articles(client, articles, config.batch_size, config.llm_concurrency).await;
    if report.all_batches_failed() {
        error!(
            batches = report.batches,
            intermediate = %paths.intermediate.display(),
            "Every analysis batch failed; keeping intermediate file for the next run"
        );
        return Err("LLM analysis failed for every batch".into());
    }

    let rows = match store::aggregate_and_save(records, &paths.aggregated, today, config.retention_days) {
        Ok(rows) => rows,
        Err(e) => {
            error!(error = %e, "Failed to save aggregated CSV; keeping intermediate file");
            return Err(e);
        }
    };
    store::remove_intermediate(&paths.intermediate)?;
    info!(
        analyzed = report.analyzed,
        eligible = report.eligible,
        failed_batches = report.failed_batches,
        rows,
        "Analysis stored"
    );
    Ok(rows)
}

/// Log search keyword suggestions from the last month of stored data.
/// Failures only warn; this never affects the run's outcome.
pub fn log_recommendations(config: &PipelineConfig, paths: &OutputPaths, today: NaiveDate) {
    let records = match store::read_records(&paths.aggregated) {
        Ok(records) => records,
        Err(e) => {
            warn!(error = %e, "Could not read aggregated CSV for keyword recommendations");
            return;
        }
    };
    let since = today - Duration::days(RECOMMENDATION_DAYS);
    let rows = trends::in_range(&trends::dated(&records), Some(since), None);
    let recommended = recommend_keywords(&rows, &config.keywords);
    if recommended.is_empty() {
        info!("No new search keywords to recommend");
        return;
    }
    for (keyword, count) in &recommended {
        info!(%keyword, count, "Recommended search keyword");
    }
}
