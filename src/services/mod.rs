//! 业务能力层
//!
//! 描述"我能对一个候选仓库做什么"，只处理单个候选，不关心批次和流程。
//! 流程层只通过下面两个 trait 使用这些能力，具体实现可替换。

pub mod documentation_service;
pub mod llm_service;
pub mod sentiment_service;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::time::Duration;

use crate::error::ServiceError;
use crate::models::{Candidate, DocumentationAnalysis, SentimentAnalysis};

pub use crate::infrastructure::TokenUsage;
pub use documentation_service::LlmDocumentationService;
pub use llm_service::LlmService;
pub use sentiment_service::LlmSentimentService;

/// 带用量的返回值
#[derive(Debug, Clone, PartialEq)]
pub struct Metered<T> {
    pub value: T,
    pub usage: TokenUsage,
}

impl<T> Metered<T> {
    pub fn new(value: T, usage: TokenUsage) -> Self {
        Self { value, usage }
    }
}

/// 文档获取 + 分析能力
#[async_trait]
pub trait DocumentationService: Send + Sync {
    async fn analyze_documentation(
        &self,
        candidate: &Candidate,
    ) -> Result<Metered<DocumentationAnalysis>, ServiceError>;
}

/// 社区讨论获取 + 情感分析能力
#[async_trait]
pub trait SentimentService: Send + Sync {
    async fn analyze_sentiment(
        &self,
        candidate: &Candidate,
    ) -> Result<Metered<SentimentAnalysis>, ServiceError>;
}

/// 数据源请求的非成功响应分类，带上服务端的等待提示
pub(crate) fn fetch_failure(response: &reqwest::Response, context: impl Into<String>) -> ServiceError {
    ServiceError::from_fetch_status(
        response.status().as_u16(),
        retry_after(response.headers()),
        context,
    )
}

/// 读取等待提示
///
/// 先看 `Retry-After`（秒数），再看额度耗尽时的 `x-ratelimit-reset`（Unix 秒）。
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
    };

    if let Some(seconds) = header(RETRY_AFTER.as_str()).and_then(|v| v.parse::<u64>().ok()) {
        return Some(Duration::from_secs(seconds));
    }

    if header("x-ratelimit-remaining").as_deref() == Some("0") {
        let reset = header("x-ratelimit-reset")?.parse::<i64>().ok()?;
        let wait = reset - chrono::Utc::now().timestamp();
        return Some(Duration::from_secs(wait.max(1) as u64));
    }

    None
}
