//! Command-line interface definitions for stock news trends.
//!
//! This module defines the CLI arguments and subcommands using the `clap`
//! crate. API credentials can be given as flags or environment variables
//! (a `.env` file in the working directory is loaded first).

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the stock news trends pipeline.
///
/// # Examples
///
/// ```sh
/// # Collect, extract, analyze and store today's news
/// stock_news_trends run
///
/// # Same, with a custom keyword list and output root
/// stock_news_trends --config pipeline.yaml --output-dir ./data run
///
/// # Weekly package and a dashboard for July
/// stock_news_trends package
/// stock_news_trends dashboard --from 2025-07-01 --to 2025-07-31 --stock-list kospi.txt --stock-list kosdaq.txt
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a pipeline YAML config
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Root directory for intermediate, aggregated and report files
    #[arg(short, long, global = true, default_value = "output")]
    pub output_dir: PathBuf,

    /// Google Generative Language API key
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true, global = true)]
    pub google_api_key: Option<String>,

    /// Naver search API client id
    #[arg(long, env = "NAVER_CLIENT_ID", hide_env_values = true, global = true)]
    pub naver_client_id: Option<String>,

    /// Naver search API client secret
    #[arg(long, env = "NAVER_CLIENT_SECRET", hide_env_values = true, global = true)]
    pub naver_client_secret: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Collect, extract, analyze and store (resumes from the intermediate file)
    Run,
    /// Analyze the intermediate file only
    Analyze,
    /// Merge every CSV in a folder into one file without duplicate URLs
    Merge {
        /// Folder holding the CSV files; defaults to the output directory
        #[arg(long)]
        folder: Option<PathBuf>,
        /// Merged file; defaults to merged_no_duplicate.csv in the folder
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Suggest or prune search keywords from stored analysis results
    Keywords {
        #[command(subcommand)]
        action: KeywordAction,
    },
    /// Write the daily JSON package
    Package {
        #[command(flatten)]
        source: SourceArgs,
        /// Reference date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Write the Markdown trend dashboard
    Dashboard(DashboardArgs),
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum KeywordAction {
    /// List frequent analysis keywords not yet searched for
    Suggest {
        #[command(flatten)]
        source: SourceArgs,
        /// Append the suggestions to the config file
        #[arg(long)]
        apply: bool,
    },
    /// Report rarely mentioned search keywords
    Prune {
        #[command(flatten)]
        source: SourceArgs,
        /// How many top analysis keywords to list
        #[arg(long, default_value_t = 10)]
        top_n: usize,
        /// Remove the rarely mentioned keywords from the config file
        #[arg(long)]
        apply: bool,
    },
}

/// Which stored CSV a report reads.
#[derive(Args, Debug, Clone, PartialEq, Default)]
pub struct SourceArgs {
    /// CSV to read; defaults to the aggregated store
    #[arg(long)]
    pub input: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct DashboardArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// First date shown (YYYY-MM-DD); defaults to the oldest article
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Last date shown (YYYY-MM-DD); defaults to the newest article
    #[arg(long)]
    pub to: Option<NaiveDate>,

    /// Length of the recent window for trending keywords
    #[arg(long, default_value_t = 7, value_parser = clap::value_parser!(i64).range(3..=30))]
    pub recent_days: i64,

    /// Length of the window compared against
    #[arg(long, default_value_t = 7, value_parser = clap::value_parser!(i64).range(3..=30))]
    pub prev_days: i64,

    /// Keywords and organisations per table
    #[arg(long, default_value_t = 15, value_parser = clap::value_parser!(u64).range(5..=50))]
    pub top_n: u64,

    /// Stocks per table
    #[arg(long, default_value_t = 15, value_parser = clap::value_parser!(u64).range(5..=50))]
    pub top_n_stocks: u64,

    /// List the latest news whose keywords include this one
    #[arg(long)]
    pub related: Option<String>,

    /// Text file with one listed company name per line (repeatable)
    #[arg(long = "stock-list")]
    pub stock_lists: Vec<PathBuf>,

    /// Markdown file to write; defaults to dashboard.md in the output directory
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from(["stock_news_trends", "--output-dir", "./data", "run"]);

        assert_eq!(cli.output_dir, PathBuf::from("./data"));
        assert_eq!(cli.command, Command::Run);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_cli_short_flags_after_subcommand() {
        let cli = Cli::parse_from(["stock_news_trends", "analyze", "-c", "/tmp/p.yaml", "-o", "/tmp/out"]);

        assert_eq!(cli.config, Some(PathBuf::from("/tmp/p.yaml")));
        assert_eq!(cli.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(cli.command, Command::Analyze);
    }

    #[test]
    fn test_keyword_subcommands() {
        let cli = Cli::parse_from(["stock_news_trends", "keywords", "prune", "--top-n", "5", "--apply"]);
        assert_eq!(
            cli.command,
            Command::Keywords {
                action: KeywordAction::Prune {
                    source: SourceArgs::default(),
                    top_n: 5,
                    apply: true,
                }
            }
        );
    }

    #[test]
    fn test_dashboard_args() {
        let cli = Cli::parse_from([
            "stock_news_trends",
            "dashboard",
            "--from",
            "2025-07-01",
            "--stock-list",
            "kospi.txt",
            "--stock-list",
            "kosdaq.txt",
            "--related",
            "2차전지",
        ]);
        let Command::Dashboard(args) = cli.command else {
            panic!("expected dashboard");
        };
        assert_eq!(args.from, NaiveDate::from_ymd_opt(2025, 7, 1));
        assert_eq!(args.to, None);
        assert_eq!(args.recent_days, 7);
        assert_eq!(args.top_n, 15);
        assert_eq!(args.stock_lists.len(), 2);
        assert_eq!(args.related.as_deref(), Some("2차전지"));
    }

    #[test]
    fn test_dashboard_window_is_bounded() {
        let res = Cli::try_parse_from(["stock_news_trends", "dashboard", "--recent-days", "90"]);
        assert!(res.is_err());
    }
}
