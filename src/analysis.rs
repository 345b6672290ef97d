//! Batched LLM analysis of collected articles.
//!
//! Articles are tagged `art_{index}`, packed `batch_size` at a time into one
//! prompt, and the model answers with a JSON array of [`ArticleAnalysis`]
//! keyed by those ids. A failed batch only costs its own articles their
//! analysis; every article still comes out as an [`ArticleRecord`].

use crate::api::AskAsync;
use crate::models::{ArticleAnalysis, ArticleRecord, CollectedArticle};
use crate::utils::{looks_truncated, truncate_for_log};
use futures::stream::{self, StreamExt};
use std::fmt;
use tracing::{debug, error, info, instrument, warn};

const ID_PREFIX: &str = "art_";

/// Why a model answer could not be used.
#[derive(Debug)]
pub enum ResponseError {
    Json(serde_json::Error),
    /// Valid JSON, but not the array the prompt asks for.
    NotAList,
}

impl fmt::Display for ResponseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(e) => write!(f, "invalid JSON: {e}"),
            Self::NotAList => f.write_str("response is not a JSON list"),
        }
    }
}

impl std::error::Error for ResponseError {}

impl ResponseError {
    fn is_truncated(&self) -> bool {
        matches!(self, Self::Json(e) if looks_truncated(e))
    }
}

/// Counts reported after an analysis pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AnalysisReport {
    pub total: usize,
    /// Articles that had any text to send.
    pub eligible: usize,
    pub analyzed: usize,
    pub batches: usize,
    pub failed_batches: usize,
}

impl AnalysisReport {
    /// True when there was work to do and none of it came back.
    pub fn all_batches_failed(&self) -> bool {
        self.batches > 0 && self.failed_batches == self.batches
    }
}

/// Wrap a batch body in the analyst instructions.
///
/// The instructions are Korean so keywords and summaries come back in the
/// language the trend views count.
pub fn build_prompt(batch_content: &str) -> String {
    format!(
        r#"당신은 최고의 금융 뉴스 분석가입니다. 아래에 제공되는 여러 개의 뉴스 기사들을 분석하여, 각 기사별로 지정된 JSON 형식에 맞춰 주요 정보를 추출해주세요.

[분석 규칙]
- 각 기사는 `<article>` 태그로 구분되며, 각 기사의 `<id>`를 JSON 결과의 "id" 필드에 반드시 포함시켜야 합니다.
- `analysis_keywords`: 기사의 핵심 주제를 나타내는 키워드를 5개 내외로 추출합니다.
- `analysis_orgs`: 기사에 언급된 주요 '기관/기업(ORG)'을 정확히 추출합니다.
- `summary_ai`: 기사의 핵심 내용을 2~3문장으로 요약합니다.
- `sentiment_label`: 기사의 전반적인 톤이 긍정적인지(Positive), 부정적인지(Negative), 중립적인지(Neutral) 평가합니다.
- 결과는 반드시 전체를 감싸는 단일 JSON 리스트(배열) 형식이어야 하며, 다른 설명 없이 JSON 코드만 출력해야 합니다.

[분석할 기사 목록]
{batch_content}

[출력 JSON 형식]
[
  {{
    "id": "<article>의 id 값",
    "analysis_keywords": ["키워드1", "..."],
    "analysis_orgs": ["기관1", "..."],
    "summary_ai": "기사 요약",
    "sentiment_label": "Positive, Negative, 또는 Neutral"
  }}
]"#
    )
}

/// `<article><id>..</id><content>..</content></article>` blocks, blank-line separated.
pub fn render_batch(items: &[(String, String)]) -> String {
    items
        .iter()
        .map(|(id, text)| format!("<article>\n<id>{id}</id>\n<content>\n{text}\n</content>\n</article>"))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Strip the Markdown code fence models like to wrap JSON in.
pub fn clean_response(raw: &str) -> &str {
    let mut s = raw.trim();
    if let Some(rest) = s.strip_prefix("```") {
        s = rest.strip_prefix("json").or_else(|| rest.strip_prefix("JSON")).unwrap_or(rest);
    }
    if let Some(rest) = s.trim_end().strip_suffix("```") {
        s = rest;
    }
    s.trim()
}

/// Parse a model answer into per-article results.
///
/// Elements that do not look like an analysis object are skipped, so one
/// malformed entry does not discard its siblings.
pub fn parse_response(raw: &str) -> Result<Vec<ArticleAnalysis>, ResponseError> {
    let value: serde_json::Value =
        serde_json::from_str(clean_response(raw)).map_err(ResponseError::Json)?;
    let serde_json::Value::Array(items) = value else {
        return Err(ResponseError::NotAList);
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<ArticleAnalysis>(item) {
            Ok(a) => Some(a),
            Err(e) => {
                debug!(error = %e, "Skipping malformed analysis entry");
                None
            }
        })
        .collect())
}

fn index_of(id: &str) -> Option<usize> {
    id.trim().strip_prefix(ID_PREFIX)?.parse().ok()
}

async fn analyze_batch<A>(client: &A, batch_no: usize, items: &[(String, String)]) -> Option<Vec<ArticleAnalysis>>
where
    A: AskAsync<Response = String>,
{
    let prompt = build_prompt(&render_batch(items));
    let mut reasked = false;

    loop {
        let answer = match client.ask(&prompt).await {
            Ok(a) => a,
            Err(e) => {
                error!(batch = batch_no, error = %e, "LLM call failed; skipping batch");
                return None;
            }
        };
        match parse_response(&answer) {
            Ok(results) => return Some(results),
            Err(e) if e.is_truncated() && !reasked => {
                warn!(batch = batch_no, error = %e, "EOF while parsing; re-asking once");
                reasked = true;
            }
            Err(e) => {
                warn!(
                    batch = batch_no,
                    error = %e,
                    response_preview = %truncate_for_log(&answer, 300),
                    "Model returned non-conforming JSON; skipping batch"
                );
                return None;
            }
        }
    }
}

/// Analyze every article that has text and fold the results into records.
///
/// Output order matches input order; articles without text, or in failed
/// batches, come out un-analyzed.
#[instrument(level = "info", skip_all, fields(total = articles.len(), batch_size = batch_size, concurrency = concurrency))]
pub async fn analyze_articles<A>(
    client: &A,
    articles: Vec<CollectedArticle>,
    batch_size: usize,
    concurrency: usize,
) -> (Vec<ArticleRecord>, AnalysisReport)
where
    A: AskAsync<Response = String>,
{
    let targets: Vec<(String, String)> = articles
        .iter()
        .enumerate()
        .filter_map(|(i, a)| {
            a.text_for_analysis()
                .map(|text| (format!("{ID_PREFIX}{i}"), text.to_string()))
        })
        .collect();
    let mut records: Vec<ArticleRecord> = articles.into_iter().map(ArticleRecord::from).collect();

    let batches: Vec<&[(String, String)]> = targets.chunks(batch_size.max(1)).collect();
    let mut report = AnalysisReport {
        total: records.len(),
        eligible: targets.len(),
        batches: batches.len(),
        ..Default::default()
    };
    info!(eligible = report.eligible, total = report.total, batches = report.batches, "Starting LLM analysis");

    let results: Vec<(usize, Option<Vec<ArticleAnalysis>>)> = stream::iter(batches.into_iter().enumerate())
        .map(|(i, items)| async move {
            let batch_no = i + 1;
            debug!(batch = batch_no, size = items.len(), "Analyzing batch");
            (batch_no, analyze_batch(client, batch_no, items).await)
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    for (batch_no, outcome) in results {
        let Some(analyses) = outcome else {
            report.failed_batches += 1;
            continue;
        };
        for analysis in analyses {
            match index_of(&analysis.id).filter(|i| *i < records.len()) {
                Some(i) => {
                    if !records[i].is_analyzed() {
                        report.analyzed += 1;
                    }
                    records[i].apply_analysis(analysis);
                }
                None => warn!(batch = batch_no, id = %analysis.id, "Result for unknown article id ignored"),
            }
        }
    }

    info!(
        analyzed = report.analyzed,
        failed_batches = report.failed_batches,
        "LLM analysis complete"
    );
    (records, report)
}
