//! 情感分析服务 - 业务能力层
//!
//! 从 Hacker News 搜索关于仓库的社区讨论，交给 LLM 判断整体情感、代表性引用和主要批评。

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::sync::{Arc, OnceLock};
use tracing::debug;

use crate::config::Config;
use crate::error::ServiceError;
use crate::models::{Candidate, SentimentAnalysis};
use crate::services::llm_service::{extract_json_block, LlmService};
use crate::services::{fetch_failure, Metered, SentimentService};
use crate::utils::truncate_text;

/// 单次搜索取回的讨论条数
const HITS_PER_PAGE: usize = 30;
/// 送进提示词的讨论片段上限
const MAX_SNIPPETS: usize = 20;
const MAX_SNIPPET_CHARS: usize = 400;

const SYSTEM_MESSAGE: &str = "You are a venture analyst who reads developer community \
discussions and summarises sentiment about an open-source project. You answer with a \
single JSON object and nothing else.";

#[derive(Debug, Deserialize)]
struct HnSearchResponse {
    #[serde(default)]
    hits: Vec<HnHit>,
}

#[derive(Debug, Deserialize)]
struct HnHit {
    #[serde(default)]
    comment_text: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    story_text: Option<String>,
}

/// 基于 LLM 的情感分析服务
pub struct LlmSentimentService {
    http: reqwest::Client,
    llm: Arc<LlmService>,
    search_base_url: String,
}

impl LlmSentimentService {
    pub fn new(config: &Config, http: reqwest::Client, llm: Arc<LlmService>) -> Self {
        Self {
            http,
            llm,
            search_base_url: config.hn_search_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// 拉取讨论片段
    async fn fetch_discussion(&self, candidate: &Candidate) -> Result<Vec<String>, ServiceError> {
        let url = format!("{}/search", self.search_base_url);
        let hits_per_page = HITS_PER_PAGE.to_string();
        let response = self
            .http
            .get(&url)
            .query(&[
                ("query", candidate.id.as_str()),
                ("tags", "(story,comment)"),
                ("hitsPerPage", hits_per_page.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(fetch_failure(
                &response,
                format!("社区讨论搜索失败: {}", candidate.id),
            ));
        }

        let body: HnSearchResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::malformed(format!("讨论搜索响应无法解析: {}", e)))?;

        let snippets = collect_snippets(body.hits);
        debug!("[{}] 获取到 {} 条讨论片段", candidate.id, snippets.len());
        Ok(snippets)
    }
}

#[async_trait]
impl SentimentService for LlmSentimentService {
    async fn analyze_sentiment(
        &self,
        candidate: &Candidate,
    ) -> Result<Metered<SentimentAnalysis>, ServiceError> {
        let snippets = self.fetch_discussion(candidate).await?;
        if snippets.is_empty() {
            return Err(ServiceError::invalid_input(format!(
                "仓库 {} 没有社区讨论",
                candidate.id
            )));
        }

        let prompt = build_sentiment_prompt(candidate, &snippets);
        let response = self.llm.complete(SYSTEM_MESSAGE, &prompt).await?;
        let usage = response.usage;

        let json = extract_json_block(&response.value).map_err(|e| e.with_spent(usage))?;
        let analysis = SentimentAnalysis::from_llm_json(json).map_err(|e| e.with_spent(usage))?;

        Ok(Metered::new(analysis, usage))
    }
}

static HTML_TAG: OnceLock<Regex> = OnceLock::new();

fn html_tag() -> &'static Regex {
    HTML_TAG.get_or_init(|| Regex::new(r"<[^>]+>").expect("valid regex"))
}

/// 去掉 HTML 标签、空白条目，截断并限制条数
fn collect_snippets(hits: Vec<HnHit>) -> Vec<String> {
    hits.into_iter()
        .filter_map(|hit| hit.comment_text.or(hit.story_text).or(hit.title))
        .map(|text| {
            let plain = html_tag().replace_all(&text, " ");
            let plain = plain
                .replace("&#x27;", "'")
                .replace("&quot;", "\"")
                .replace("&amp;", "&")
                .replace("&gt;", ">")
                .replace("&lt;", "<");
            let collapsed = plain.split_whitespace().collect::<Vec<_>>().join(" ");
            truncate_text(&collapsed, MAX_SNIPPET_CHARS)
        })
        .filter(|text| !text.is_empty())
        .take(MAX_SNIPPETS)
        .collect()
}

/// 构建情感分析提示词
pub fn build_sentiment_prompt(candidate: &Candidate, snippets: &[String]) -> String {
    let discussion = snippets
        .iter()
        .enumerate()
        .map(|(i, s)| format!("[{}] {}", i + 1, s))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Below are developer community comments mentioning the open-source project `{id}`.

{discussion}

Return a JSON object with exactly these fields:
- "polarity": number in [-1, 1], overall sentiment toward the project
- "magnitude": number in [0, 1], how strongly opinions are expressed
- "quotes": up to 3 short representative positive quotes, copied verbatim
- "criticisms": up to 3 short main criticisms
- "excitement_score": integer 1-10, community excitement
- "problem_solution_fit_score": integer 1-10, how well users feel it solves their problem
- "credibility_score": integer 1-10, signs of real-world adoption"#,
        id = candidate.id,
        discussion = discussion,
    )
}
