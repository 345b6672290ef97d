//! Data models for collected articles and their analyzed representations.
//!
//! - [`CollectedArticle`]: a search hit, optionally with its extracted body
//! - [`ArticleAnalysis`]: one element of the LLM's JSON answer
//! - [`ArticleRecord`]: a row of the aggregated store
//! - [`Sentiment`]: the normalized tone label

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A news search hit, before LLM analysis.
///
/// This is also the row type of the intermediate CSV, so the field order
/// here is the column order there.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct CollectedArticle {
    /// Search keyword that surfaced the article.
    pub search_keyword: String,
    /// Publisher URL, unique across a run.
    pub url: String,
    pub title: String,
    /// Snippet returned by the search API.
    pub summary: String,
    /// Local ISO-8601 timestamp of collection.
    pub crawled_at: String,
    /// Publication date as `YYYY-MM-DD`.
    pub published_at: String,
    /// Extracted article body.
    pub content: Option<String>,
    /// Why extraction failed, when it did.
    pub extract_error: Option<String>,
}

impl CollectedArticle {
    /// Text worth sending to the LLM: the body, else the search snippet.
    pub fn text_for_analysis(&self) -> Option<&str> {
        self.content
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .or_else(|| Some(self.summary.trim()).filter(|s| !s.is_empty()))
    }
}

/// Structured fields the LLM extracts for one article.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ArticleAnalysis {
    /// Echo of the `<id>` given in the prompt.
    pub id: String,
    pub analysis_keywords: Vec<String>,
    /// Organisations and companies named in the article.
    pub analysis_orgs: Vec<String>,
    pub summary_ai: String,
    pub sentiment_label: String,
}

/// Overall tone of an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Sentiment {
    Negative,
    Neutral,
    Positive,
}

impl Sentiment {
    /// Lenient parse of a model-produced label ("positive", " Negative ", "중립").
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "positive" | "긍정" | "긍정적" => Some(Self::Positive),
            "negative" | "부정" | "부정적" => Some(Self::Negative),
            "neutral" | "중립" | "중립적" => Some(Self::Neutral),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "Positive",
            Self::Negative => "Negative",
            Self::Neutral => "Neutral",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row of the aggregated store: the collected article plus analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ArticleRecord {
    pub search_keyword: String,
    pub url: String,
    pub title: String,
    pub summary: String,
    pub crawled_at: String,
    pub published_at: String,
    pub content: String,
    pub analysis_keywords: Vec<String>,
    pub analysis_orgs: Vec<String>,
    pub summary_ai: String,
    /// Normalized label, or empty when the article was never analyzed.
    pub sentiment_label: String,
}

impl ArticleRecord {
    /// Fold an LLM result into the record. List entries are trimmed and
    /// de-duplicated; unknown labels are kept verbatim.
    pub fn apply_analysis(&mut self, analysis: ArticleAnalysis) {
        self.analysis_keywords = clean_terms(analysis.analysis_keywords);
        self.analysis_orgs = clean_terms(analysis.analysis_orgs);
        self.summary_ai = analysis.summary_ai;
        self.sentiment_label = Sentiment::parse(&analysis.sentiment_label)
            .map(|s| s.as_str().to_string())
            .unwrap_or_else(|| analysis.sentiment_label.trim().to_string());
    }

    pub fn is_analyzed(&self) -> bool {
        !self.summary_ai.is_empty() || !self.analysis_keywords.is_empty()
    }
}

fn clean_terms(terms: Vec<String>) -> Vec<String> {
    terms
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unique()
        .collect()
}

impl From<CollectedArticle> for ArticleRecord {
    fn from(article: CollectedArticle) -> Self {
        Self {
            search_keyword: article.search_keyword,
            url: article.url,
            title: article.title,
            summary: article.summary,
            crawled_at: article.crawled_at,
            published_at: article.published_at,
            content: article.content.unwrap_or_default(),
            ..Default::default()
        }
    }
}
