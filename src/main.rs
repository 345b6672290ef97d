//! # Stock News Trends
//!
//! A news collection and analysis pipeline for the Korean stock market. It
//! searches the Naver news API by keyword, scrapes article bodies from the
//! publishers, asks Gemini for keywords, organisations, a one-line summary
//! and a sentiment label, and keeps a rolling CSV of the results that the
//! trend reports are built from.
//!
//! ## Usage
//!
//! ```sh
//! stock_news_trends run
//! stock_news_trends keywords suggest --apply --config pipeline.yaml
//! stock_news_trends package
//! stock_news_trends dashboard --stock-list kospi.txt --stock-list kosdaq.txt
//! ```
//!
//! ## Architecture
//!
//! 1. **Searching**: page through the news search API per keyword
//! 2. **Fetching**: download article pages and extract their bodies
//! 3. **Analyzing**: send articles to the LLM in batches
//! 4. **Storing**: merge results into the aggregated CSV
//! 5. **Reporting**: daily JSON package and Markdown dashboard

use chrono::{Duration, Local};
use clap::Parser;
use std::error::Error;
use std::path::Path;
use tracing::{debug, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod analysis;
mod api;
mod cli;
mod config;
mod models;
mod outputs;
mod pipeline;
mod scrapers;
mod store;
mod trends;
mod utils;

use cli::{Cli, Command, DashboardArgs, KeywordAction, SourceArgs};
use config::{OutputPaths, PipelineConfig, apply_target};
use models::ArticleRecord;
use outputs::{dashboard, package};
use pipeline::{Credentials, RECOMMENDATION_DAYS};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // A missing .env is normal; variables may come from the environment.
    dotenvy::dotenv().ok();

    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("stock_news_trends starting up");

    let args = Cli::parse();
    debug!(config = ?args.config, output_dir = %args.output_dir.display(), command = ?args.command, "Parsed CLI arguments");

    let config = PipelineConfig::load(args.config.as_deref())?;
    let paths = OutputPaths::new(&args.output_dir);
    let credentials = Credentials {
        google_api_key: args.google_api_key,
        naver_client_id: args.naver_client_id,
        naver_client_secret: args.naver_client_secret,
    };

    match args.command {
        Command::Run => {
            pipeline::run(&config, &paths, &credentials).await?;
        }
        Command::Analyze => {
            pipeline::analyze_only(&config, &paths, &credentials).await?;
        }
        Command::Merge { folder, output } => {
            let (folder, output) = match folder {
                Some(folder) => {
                    let output = output.unwrap_or_else(|| folder.join(store::MERGED_FILE_NAME));
                    (folder, output)
                }
                None => (paths.root.clone(), output.unwrap_or_else(|| paths.merged.clone())),
            };
            store::merge_directory(&folder, &output)?;
        }
        Command::Keywords { action } => {
            run_keywords(action, config, args.config.as_deref(), &paths)?;
        }
        Command::Package { source, date } => {
            let records = load_source(&source, &paths)?;
            let today = date.unwrap_or_else(|| Local::now().date_naive());
            let daily = package::build_package(&records, today);
            package::write_package(&daily, &paths.package).await?;
        }
        Command::Dashboard(dashboard_args) => {
            run_dashboard(dashboard_args, &config, &paths).await?;
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

fn load_source(source: &SourceArgs, paths: &OutputPaths) -> Result<Vec<ArticleRecord>, Box<dyn Error>> {
    let path = source.input.as_ref().unwrap_or(&paths.aggregated);
    if !path.exists() {
        return Err(format!("{} does not exist; run the pipeline first", path.display()).into());
    }
    store::read_records(path)
}

#[instrument(level = "info", skip_all)]
fn run_keywords(
    action: KeywordAction,
    mut config: PipelineConfig,
    config_path: Option<&Path>,
    paths: &OutputPaths,
) -> Result<(), Box<dyn Error>> {
    let today = Local::now().date_naive();
    let since = today - Duration::days(RECOMMENDATION_DAYS);

    match action {
        KeywordAction::Suggest { source, apply } => {
            let save_to = apply_target(apply, config_path)?;
            let records = load_source(&source, paths)?;
            let rows = trends::in_range(&trends::dated(&records), Some(since), None);
            let recommended = trends::recommend_keywords(&rows, &config.keywords);

            println!("Recommended search keywords (last {RECOMMENDATION_DAYS} days, not yet searched):");
            for (keyword, count) in &recommended {
                println!("- {keyword} ({count})");
            }

            if let Some(path) = save_to {
                let added = config.add_keywords(recommended.iter().map(|(k, _)| k));
                info!(added, "Adding recommended keywords");
                config.save(path)?;
            }
        }
        KeywordAction::Prune { source, top_n, apply } => {
            let save_to = apply_target(apply, config_path)?;
            let records = load_source(&source, paths)?;
            let rows = trends::in_range(&trends::dated(&records), Some(since), None);
            let report = trends::prune_report(&rows, &config.keywords, top_n);

            println!("Search keyword mentions (last {RECOMMENDATION_DAYS} days):");
            for (keyword, count) in &report.counts {
                println!("- {keyword}: {count}");
            }
            println!("Rarely mentioned (<= {}):", trends::LOW_IMPORTANCE_MAX);
            for keyword in &report.low_importance {
                println!("- {keyword}");
            }
            println!("Top {top_n} analysis keywords: {}", report.top_keywords.join(", "));

            if let Some(path) = save_to {
                let Some(removed) = config.remove_keywords(&report.low_importance) else {
                    warn!("Every search keyword is rarely mentioned; leaving the config unchanged");
                    return Ok(());
                };
                info!(removed, "Pruning search keywords");
                config.save(path)?;
            }
        }
    }
    Ok(())
}

#[instrument(level = "info", skip_all)]
async fn run_dashboard(args: DashboardArgs, config: &PipelineConfig, paths: &OutputPaths) -> Result<(), Box<dyn Error>> {
    let records = load_source(&args.source, paths)?;
    let stocks = trends::load_stock_names(&args.stock_lists);
    if stocks.is_empty() {
        warn!("No stock names loaded; pass --stock-list to enable stock views");
    }

    let options = dashboard::DashboardOptions {
        from: args.from,
        to: args.to,
        top_n_terms: args.top_n as usize,
        top_n_stocks: args.top_n_stocks as usize,
        recent_days: args.recent_days,
        prev_days: args.prev_days,
        related: args.related,
        ..dashboard::DashboardOptions::new(Local::now().date_naive())
    };
    let markdown = dashboard::render_dashboard(&records, &stocks, config, &options)?;
    let output = args.output.unwrap_or_else(|| paths.dashboard.clone());
    dashboard::write_dashboard(&markdown, &output).await
}
