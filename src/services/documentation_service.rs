//! 文档分析服务 - 业务能力层
//!
//! 拉取仓库 README，交给 LLM 判断问题清晰度、上手时间和 painkiller/vitamin 分类。

use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;
use tracing::debug;

use crate::config::Config;
use crate::error::ServiceError;
use crate::models::{Candidate, DocumentationAnalysis};
use crate::services::llm_service::{extract_json_block, LlmService};
use crate::services::{fetch_failure, DocumentationService, Metered};
use crate::utils::truncate_text;

/// 按顺序尝试的 README 文件名
const README_NAMES: [&str; 4] = ["README.md", "readme.md", "README.rst", "README"];

/// 送进提示词的 README 最大字符数
const MAX_README_CHARS: usize = 12_000;

const SYSTEM_MESSAGE: &str = "You are a venture analyst who evaluates open-source projects \
from their documentation. You answer with a single JSON object and nothing else.";

/// 基于 LLM 的文档分析服务
pub struct LlmDocumentationService {
    http: reqwest::Client,
    llm: Arc<LlmService>,
    raw_base_url: String,
}

impl LlmDocumentationService {
    pub fn new(config: &Config, http: reqwest::Client, llm: Arc<LlmService>) -> Self {
        Self {
            http,
            llm,
            raw_base_url: config.github_raw_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// 拉取 README 文本
    ///
    /// 所有候选文件名都 404 时返回非瞬时错误。
    async fn fetch_readme(&self, candidate: &Candidate) -> Result<String, ServiceError> {
        for name in README_NAMES {
            let url = format!("{}/{}/HEAD/{}", self.raw_base_url, candidate.id, name);
            let response = self.http.get(&url).send().await?;

            match response.status() {
                StatusCode::NOT_FOUND => {
                    debug!("[{}] {} 不存在", candidate.id, name);
                    continue;
                }
                status if status.is_success() => {
                    let text = response.text().await?;
                    debug!("[{}] 获取 {} 成功, {} 字符", candidate.id, name, text.len());
                    return Ok(text);
                }
                _ => return Err(fetch_failure(&response, format!("获取 README 失败: {}", url))),
            }
        }

        Err(ServiceError::invalid_input(format!(
            "仓库 {} 没有 README",
            candidate.id
        )))
    }
}

#[async_trait]
impl DocumentationService for LlmDocumentationService {
    async fn analyze_documentation(
        &self,
        candidate: &Candidate,
    ) -> Result<Metered<DocumentationAnalysis>, ServiceError> {
        let readme = self.fetch_readme(candidate).await?;
        if readme.trim().is_empty() {
            return Err(ServiceError::invalid_input(format!(
                "仓库 {} 的 README 为空",
                candidate.id
            )));
        }

        let prompt = build_documentation_prompt(candidate, &readme);
        let response = self.llm.complete(SYSTEM_MESSAGE, &prompt).await?;
        let usage = response.usage;

        let json = extract_json_block(&response.value).map_err(|e| e.with_spent(usage))?;
        let analysis =
            DocumentationAnalysis::from_llm_json(json).map_err(|e| e.with_spent(usage))?;

        Ok(Metered::new(analysis, usage))
    }
}

/// 构建文档分析提示词
pub fn build_documentation_prompt(candidate: &Candidate, readme: &str) -> String {
    let description = candidate
        .description
        .as_deref()
        .unwrap_or("(no description)");

    format!(
        r#"Evaluate the open-source project `{id}` ({stars} stars).
Description: {description}

README (possibly truncated):
-----
{readme}
-----

Return a JSON object with exactly these fields:
- "clarity_score": integer 1-10, how clearly the README states the problem it solves
- "problem_summary": one sentence describing the problem solved
- "time_to_value_minutes": integer estimate of minutes for a new user to get first value, or null if impossible to tell
- "classification": "painkiller" if it solves an urgent pain, "vitamin" if nice-to-have, otherwise "unclear"
- "adoption_ease_score": integer 1-10, how easy it is to adopt
- "maturity_health_score": integer 1-10, how mature and maintained it appears"#,
        id = candidate.id,
        stars = candidate.stars,
        description = description,
        readme = truncate_text(readme, MAX_README_CHARS),
    )
}
