//! Pipeline configuration and output layout.
//!
//! Everything that shapes a run but is not a secret lives in an optional
//! YAML file. Secrets (API keys) come from the environment through [`crate::cli`].
//! Every field has a default so an empty or missing file is a valid config.
//!
//! ```yaml
//! keywords: ["코스피", "반도체"]
//! collection_days: 3
//! batch_size: 5
//! ```

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// Tunables for collection, extraction, analysis and reporting.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Search keywords sent to the news search API.
    pub keywords: Vec<String>,
    /// How many days back (including today) articles are collected for.
    pub collection_days: u32,
    /// Per keyword, per publication date cap.
    pub articles_per_day_limit: usize,
    /// Pause between search API pages.
    pub rate_limit_delay_ms: u64,
    /// Pause after each article page fetch.
    pub extract_delay_ms: u64,
    /// Article pages fetched at once.
    pub fetch_concurrency: usize,
    /// Articles per LLM request.
    pub batch_size: usize,
    /// LLM requests in flight at once.
    pub llm_concurrency: usize,
    /// Rows older than this many days are dropped from the aggregated CSV.
    pub retention_days: i64,
    /// Gemini model name, without the `models/` prefix.
    pub model: String,
    /// A body line containing any of these ends the article text.
    pub end_markers: Vec<String>,
    /// Generic terms hidden from dashboard keyword views.
    pub stop_keywords: Vec<String>,
    /// Substrings that flag policy, regulation or risk news.
    pub policy_words: Vec<String>,
    /// Gemini API origin override, for a gateway or a local stand-in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gemini_base_url: Option<String>,
    /// Naver open API origin override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub naver_base_url: Option<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            keywords: strings(&[
                "코스피", "코스닥", "환율", "금리인상", "FOMC", "외국인 순매수", "반도체",
                "HBM", "AI반도체", "2차전지", "바이오", "제약", "밸류업", "기업 실적",
            ]),
            collection_days: 1,
            articles_per_day_limit: 100,
            rate_limit_delay_ms: 1000,
            extract_delay_ms: 100,
            fetch_concurrency: 4,
            batch_size: 7,
            llm_concurrency: 1,
            retention_days: 30,
            model: "gemini-1.5-flash".to_string(),
            end_markers: strings(&[
                "무단전재", "무단 전재", "재배포 금지", "저작권자", "광고문의",
                "광고 문의", "AD링크", "타불라", "관련기사", "기자소개", "기자 소개",
                "기자의 다른기사", "편집패널", "본문하단", "nBYLINE", "좋아요 버튼",
                "속보는", "t.me/", "텔레그램", "영상취재", "기사제보", "보도자료",
                "팟캐스트", "많이 본 기사", "공유하기", "공유버튼", "nCopyright",
                "기사 전체보기", "입력 :", "지면 :", "AI학습 이용 금지", "기사 공유",
                "댓글", "좋아요", "광고", "관련 뉴스", "추천 뉴스", "영상편집",
                "뉴스제공", "기사제공", "기사 하단 광고", "기사 영역 하단 광고",
                "기자 정보", "전체기사 보기", "공감언론",
                "기자 (", "기자 =", "기자]", "[사진=", "자료=", "(서울=연합뉴스)",
                "[파이낸셜뉴스]", "페이스북", "트위터", "카카오톡", "제보하기",
                "독자 여러분의 소중한 제보를 기다립니다", "▶", "※", "☞", "[ⓒ", "◎",
            ]),
            stop_keywords: strings(&[
                "한국", "정부", "정책", "발표", "관련", "시장", "증시", "경제", "주식", "이날",
                "기사", "분석", "업계", "회사", "금융", "투자", "실적",
            ]),
            policy_words: strings(&[
                "정책", "규제", "법안", "세제", "금리", "정부", "당국", "공시", "발표", "리스크", "위기",
            ]),
            gemini_base_url: None,
            naver_base_url: None,
        }
    }
}

impl PipelineConfig {
    /// Load from a YAML file, or return defaults when no path is given.
    #[instrument(level = "info")]
    pub fn load(path: Option<&Path>) -> Result<Self, Box<dyn Error>> {
        let Some(path) = path else {
            info!("No config file given; using defaults");
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)?;
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(&raw)?;
        info!(path = %path.display(), keywords = config.keywords.len(), "Loaded configuration");
        Ok(config)
    }

    /// Write the config back as YAML.
    pub fn save(&self, path: &Path) -> Result<(), Box<dyn Error>> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_yaml::to_string(self)?)?;
        info!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Append search keywords that are not already configured.
    /// Returns how many were added.
    pub fn add_keywords<I, S>(&mut self, extra: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let before = self.keywords.len();
        let merged: Vec<String> = self
            .keywords
            .iter()
            .cloned()
            .chain(extra.into_iter().map(|k| k.as_ref().trim().to_string()))
            .filter(|k| !k.is_empty())
            .unique()
            .collect();
        self.keywords = merged;
        self.keywords.len().saturating_sub(before)
    }

    /// Remove the given search keywords.
    ///
    /// # Returns
    ///
    /// The number removed, or `None` when that would leave no keyword at
    /// all; the config is unchanged in that case.
    pub fn remove_keywords(&mut self, drop: &[String]) -> Option<usize> {
        let kept: Vec<String> = self
            .keywords
            .iter()
            .filter(|k| !drop.contains(k))
            .cloned()
            .collect();
        if kept.is_empty() && !self.keywords.is_empty() {
            return None;
        }
        let removed = self.keywords.len() - kept.len();
        self.keywords = kept;
        Some(removed)
    }
}

/// Config file a `--apply` run writes back to. Applying needs a file to
/// update, so `apply` without a path is an error.
pub fn apply_target(apply: bool, config_path: Option<&Path>) -> Result<Option<&Path>, Box<dyn Error>> {
    match (apply, config_path) {
        (false, _) => Ok(None),
        (true, Some(path)) => Ok(Some(path)),
        (true, None) => Err("--apply needs --config to know which file to update".into()),
    }
}

/// File layout under the output root.
#[derive(Debug, Clone)]
pub struct OutputPaths {
    pub root: PathBuf,
    /// Collected and extracted articles awaiting LLM analysis.
    pub intermediate: PathBuf,
    /// Rolling store of analyzed articles.
    pub aggregated: PathBuf,
    pub package: PathBuf,
    pub dashboard: PathBuf,
    /// Default output of the directory merge.
    pub merged: PathBuf,
}

impl OutputPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            intermediate: root.join("intermediate").join("crawled_data.csv"),
            aggregated: root.join("aggregated").join("aggregated_stock_data.csv"),
            package: root.join("ai_daily_package.json"),
            dashboard: root.join("dashboard.md"),
            merged: root.join("merged_no_duplicate.csv"),
            root,
        }
    }
}
