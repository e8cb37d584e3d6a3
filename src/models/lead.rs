use crate::error::FailureReason;
use crate::models::analysis::{DocumentationAnalysis, SentimentAnalysis};
use crate::models::candidate::Candidate;
use serde::Serialize;

/// 单个线索的分析结果
///
/// 只在单线索分析器的一次执行中构建，之后不再修改。
/// 某项分析缺失时，对应的 `*_failure` 记录原因。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadResult {
    pub candidate: Candidate,
    pub documentation: Option<DocumentationAnalysis>,
    pub sentiment: Option<SentimentAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation_failure: Option<FailureReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment_failure: Option<FailureReason>,
}

impl LeadResult {
    /// 两项分析都成功时使用
    pub fn complete(
        candidate: Candidate,
        documentation: DocumentationAnalysis,
        sentiment: SentimentAnalysis,
    ) -> Self {
        Self {
            candidate,
            documentation: Some(documentation),
            sentiment: Some(sentiment),
            documentation_failure: None,
            sentiment_failure: None,
        }
    }

    /// 只有候选本身（两项分析均缺失且没有失败原因，例如离线打分）
    pub fn bare(candidate: Candidate) -> Self {
        Self {
            candidate,
            documentation: None,
            sentiment: None,
            documentation_failure: None,
            sentiment_failure: None,
        }
    }

    /// 线索任务意外失败：两项分析都记为缺失，附带诊断信息
    pub fn crashed(candidate: Candidate, message: impl Into<String>) -> Self {
        let reason = FailureReason::Crashed {
            message: message.into(),
        };
        Self {
            candidate,
            documentation: None,
            sentiment: None,
            documentation_failure: Some(reason.clone()),
            sentiment_failure: Some(reason),
        }
    }

    pub fn id(&self) -> &str {
        &self.candidate.id
    }

    pub fn is_complete(&self) -> bool {
        self.documentation.is_some() && self.sentiment.is_some()
    }
}
