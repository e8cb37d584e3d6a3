//! 分析结果类型
//!
//! LLM 的输出先按严格的原始结构反序列化，再做取值校验。
//! 反序列化失败记为"响应格式错误"，取值越界记为"校验失败"，两者都是非瞬时错误。

use crate::error::ServiceError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// 引用最多保留条数
pub const MAX_QUOTES: usize = 3;
/// 批评最多保留条数
pub const MAX_CRITICISMS: usize = 3;

/// 止痛药 / 维生素 分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// 解决紧迫痛点
    Painkiller,
    /// 锦上添花
    Vitamin,
    Unclear,
}

impl Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Classification::Painkiller => write!(f, "painkiller"),
            Classification::Vitamin => write!(f, "vitamin"),
            Classification::Unclear => write!(f, "unclear"),
        }
    }
}

/// 文档分析结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentationAnalysis {
    /// 问题陈述清晰度，1-10
    pub clarity_score: u8,
    pub problem_summary: String,
    /// 预计首次产生价值所需分钟数，无法估计时为空
    pub time_to_value_minutes: Option<u32>,
    pub classification: Classification,
    /// 上手难易度，1-10
    pub adoption_ease_score: Option<u8>,
    /// 成熟度，1-10
    pub maturity_health_score: Option<u8>,
}

/// 情感分析结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentAnalysis {
    /// 极性，[-1, 1]
    pub polarity: f64,
    /// 强度，[0, 1]
    pub magnitude: f64,
    pub quotes: Vec<String>,
    pub criticisms: Vec<String>,
    pub excitement_score: Option<u8>,
    pub problem_solution_fit_score: Option<u8>,
    pub credibility_score: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct RawDocumentationAnalysis {
    clarity_score: i64,
    problem_summary: String,
    time_to_value_minutes: Option<i64>,
    classification: Classification,
    #[serde(default)]
    adoption_ease_score: Option<i64>,
    #[serde(default)]
    maturity_health_score: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawSentimentAnalysis {
    polarity: f64,
    magnitude: f64,
    #[serde(default)]
    quotes: Vec<String>,
    #[serde(default)]
    criticisms: Vec<String>,
    #[serde(default)]
    excitement_score: Option<i64>,
    #[serde(default)]
    problem_solution_fit_score: Option<i64>,
    #[serde(default)]
    credibility_score: Option<i64>,
}

impl DocumentationAnalysis {
    /// 从 LLM 返回的 JSON 文本构建
    pub fn from_llm_json(json: &str) -> Result<Self, ServiceError> {
        let raw: RawDocumentationAnalysis = serde_json::from_str(json)
            .map_err(|e| ServiceError::malformed(format!("文档分析 JSON 无法解析: {}", e)))?;

        let problem_summary = raw.problem_summary.trim().to_string();
        if problem_summary.is_empty() {
            return Err(ServiceError::validation("problem_summary 为空"));
        }

        let time_to_value_minutes = match raw.time_to_value_minutes {
            None => None,
            Some(minutes) if minutes > 0 && minutes <= u32::MAX as i64 => Some(minutes as u32),
            Some(minutes) => {
                return Err(ServiceError::validation(format!(
                    "time_to_value_minutes 取值无效: {}",
                    minutes
                )))
            }
        };

        Ok(Self {
            clarity_score: score_1_to_10("clarity_score", raw.clarity_score)?,
            problem_summary,
            time_to_value_minutes,
            classification: raw.classification,
            adoption_ease_score: optional_score("adoption_ease_score", raw.adoption_ease_score)?,
            maturity_health_score: optional_score(
                "maturity_health_score",
                raw.maturity_health_score,
            )?,
        })
    }
}

impl SentimentAnalysis {
    /// 从 LLM 返回的 JSON 文本构建
    pub fn from_llm_json(json: &str) -> Result<Self, ServiceError> {
        let raw: RawSentimentAnalysis = serde_json::from_str(json)
            .map_err(|e| ServiceError::malformed(format!("情感分析 JSON 无法解析: {}", e)))?;

        if !raw.polarity.is_finite() || !(-1.0..=1.0).contains(&raw.polarity) {
            return Err(ServiceError::validation(format!(
                "polarity 超出 [-1, 1]: {}",
                raw.polarity
            )));
        }
        if !raw.magnitude.is_finite() || !(0.0..=1.0).contains(&raw.magnitude) {
            return Err(ServiceError::validation(format!(
                "magnitude 超出 [0, 1]: {}",
                raw.magnitude
            )));
        }

        Ok(Self {
            polarity: raw.polarity,
            magnitude: raw.magnitude,
            quotes: bounded(raw.quotes, MAX_QUOTES),
            criticisms: bounded(raw.criticisms, MAX_CRITICISMS),
            excitement_score: optional_score("excitement_score", raw.excitement_score)?,
            problem_solution_fit_score: optional_score(
                "problem_solution_fit_score",
                raw.problem_solution_fit_score,
            )?,
            credibility_score: optional_score("credibility_score", raw.credibility_score)?,
        })
    }
}

fn score_1_to_10(field: &str, value: i64) -> Result<u8, ServiceError> {
    if (1..=10).contains(&value) {
        Ok(value as u8)
    } else {
        Err(ServiceError::validation(format!(
            "{} 超出 1-10: {}",
            field, value
        )))
    }
}

fn optional_score(field: &str, value: Option<i64>) -> Result<Option<u8>, ServiceError> {
    value.map(|v| score_1_to_10(field, v)).transpose()
}

/// 去掉空白条目并截断到上限
fn bounded(items: Vec<String>, max: usize) -> Vec<String> {
    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .take(max)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NonTransientKind;

    fn kind_of(err: ServiceError) -> NonTransientKind {
        match err {
            ServiceError::NonTransient { kind, .. } => kind,
            other => panic!("expected non-transient, got {:?}", other),
        }
    }

    #[test]
    fn test_documentation_parses_valid_payload() {
        let json = r#"{
            "clarity_score": 8,
            "problem_summary": "Fast local vector search",
            "time_to_value_minutes": 15,
            "classification": "painkiller",
            "adoption_ease_score": 7
        }"#;
        let analysis = DocumentationAnalysis::from_llm_json(json).unwrap();
        assert_eq!(analysis.clarity_score, 8);
        assert_eq!(analysis.time_to_value_minutes, Some(15));
        assert_eq!(analysis.classification, Classification::Painkiller);
        assert_eq!(analysis.adoption_ease_score, Some(7));
        assert_eq!(analysis.maturity_health_score, None);
    }

    #[test]
    fn test_documentation_rejects_out_of_range_clarity() {
        let json = r#"{"clarity_score": 11, "problem_summary": "x",
                       "time_to_value_minutes": null, "classification": "vitamin"}"#;
        let err = DocumentationAnalysis::from_llm_json(json).unwrap_err();
        assert_eq!(kind_of(err), NonTransientKind::ValidationFailed);
    }

    #[test]
    fn test_documentation_rejects_unknown_classification() {
        let json = r#"{"clarity_score": 5, "problem_summary": "x",
                       "time_to_value_minutes": 5, "classification": "placebo"}"#;
        let err = DocumentationAnalysis::from_llm_json(json).unwrap_err();
        assert_eq!(kind_of(err), NonTransientKind::MalformedResponse);
    }

    #[test]
    fn test_sentiment_bounds_lists() {
        let json = r#"{
            "polarity": 0.4,
            "magnitude": 0.9,
            "quotes": ["a", " ", "b", "c", "d"],
            "criticisms": ["slow builds"]
        }"#;
        let analysis = SentimentAnalysis::from_llm_json(json).unwrap();
        assert_eq!(analysis.quotes, vec!["a", "b", "c"]);
        assert_eq!(analysis.criticisms.len(), 1);
    }

    #[test]
    fn test_sentiment_rejects_polarity_out_of_range() {
        let json = r#"{"polarity": 1.5, "magnitude": 0.5}"#;
        let err = SentimentAnalysis::from_llm_json(json).unwrap_err();
        assert_eq!(kind_of(err), NonTransientKind::ValidationFailed);
    }

    #[test]
    fn test_sentiment_rejects_non_json() {
        let err = SentimentAnalysis::from_llm_json("people seem to like it").unwrap_err();
        assert_eq!(kind_of(err), NonTransientKind::MalformedResponse);
    }
}
