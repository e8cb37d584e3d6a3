//! LLM 服务 - 业务能力层
//!
//! 只负责"调用 LLM 并返回文本 + 用量"，不关心提示词的业务含义。
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 兼容 OpenAI API 的服务（Azure, Gemini, Doubao 等）
//! - 所有错误都映射为 `ServiceError`，由重试包装器决定如何处理

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{FatalKind, ServiceError};
use crate::services::{Metered, TokenUsage};

static JSON_FENCE: OnceLock<Regex> = OnceLock::new();
static RETRY_HINT: OnceLock<Regex> = OnceLock::new();

fn json_fence() -> &'static Regex {
    JSON_FENCE.get_or_init(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*\})\s*```").expect("valid regex"))
}

fn retry_hint() -> &'static Regex {
    RETRY_HINT.get_or_init(|| {
        Regex::new(r"(?i)try again in (\d+(?:\.\d+)?)\s*(ms|s)\b").expect("valid regex")
    })
}

/// LLM 服务
///
/// 职责：
/// - 发送一轮 system + user 对话
/// - 返回去掉首尾空白的文本和 token 用量
/// - 把 API 错误分类为瞬时 / 非瞬时 / 致命
pub struct LlmService {
    client: Client<OpenAIConfig>,
    model_name: String,
    max_tokens: u32,
}

impl LlmService {
    /// 创建新的 LLM 服务
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: config.llm_model_name.clone(),
            max_tokens: 1024,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// 发送一轮对话
    pub async fn complete(
        &self,
        system_message: &str,
        user_message: &str,
    ) -> Result<Metered<String>, ServiceError> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("用户消息长度: {} 字符", user_message.len());

        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(system_message)
            .build()
            .map_err(classify_openai_error)?;
        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()
            .map_err(classify_openai_error)?;

        let messages = vec![
            ChatCompletionRequestMessage::System(system_msg),
            ChatCompletionRequestMessage::User(user_msg),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(0.2)
            .max_tokens(self.max_tokens)
            .build()
            .map_err(classify_openai_error)?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            classify_openai_error(e)
        })?;

        let usage = response
            .usage
            .as_ref()
            .map(|u| TokenUsage {
                input: u64::from(u.prompt_tokens),
                output: u64::from(u.completion_tokens),
            })
            .unwrap_or_default();

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| ServiceError::malformed("LLM 返回内容为空"))?;

        debug!(
            "LLM API 调用成功, tokens: {} 入 / {} 出",
            usage.input, usage.output
        );

        Ok(Metered::new(content.trim().to_string(), usage))
    }
}

/// 把 `OpenAIError` 分类为 `ServiceError`
fn classify_openai_error(err: OpenAIError) -> ServiceError {
    match err {
        OpenAIError::ApiError(api) => classify_api_error(api.r#type.as_deref(), &api.message),
        OpenAIError::Reqwest(e) => {
            if let Some(status) = e.status() {
                ServiceError::from_status(status.as_u16(), e.to_string())
            } else if e.is_timeout() {
                ServiceError::timeout(e.to_string())
            } else {
                ServiceError::network(e.to_string())
            }
        }
        OpenAIError::InvalidArgument(message) => ServiceError::invalid_input(message),
        other => ServiceError::malformed(other.to_string()),
    }
}

/// 按 API 错误类型和消息文本分类
///
/// 兼容服务的错误类型字段并不统一，所以同时看消息文本。
pub fn classify_api_error(error_type: Option<&str>, message: &str) -> ServiceError {
    let haystack = format!("{} {}", error_type.unwrap_or_default(), message).to_lowercase();
    let has = |needle: &str| haystack.contains(needle);

    if has("invalid_api_key")
        || has("incorrect api key")
        || has("authentication")
        || has("unauthorized")
        || has("permission")
    {
        ServiceError::authentication(message)
    } else if has("insufficient_quota") || has("model_not_found") || has("does not exist") {
        // 额度耗尽 / 模型不存在：后续调用同样会失败
        ServiceError::Fatal {
            kind: FatalKind::Configuration,
            message: message.to_string(),
        }
    } else if has("rate limit") || has("rate_limit") || has("too many requests") {
        ServiceError::RateLimited {
            retry_after: parse_retry_hint(message),
        }
    } else if has("timeout") || has("timed out") {
        ServiceError::timeout(message)
    } else if has("server_error") || has("overloaded") || has("unavailable") || has("bad gateway")
    {
        ServiceError::server(message)
    } else {
        ServiceError::invalid_input(message)
    }
}

/// 解析限流消息中的等待提示，例如 `Please try again in 20s` / `in 850ms`
fn parse_retry_hint(message: &str) -> Option<Duration> {
    let caps = retry_hint().captures(message)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    let millis = match caps.get(2)?.as_str().to_lowercase().as_str() {
        "ms" => value,
        _ => value * 1000.0,
    };
    Some(Duration::from_millis(millis.ceil() as u64))
}

/// 从 LLM 响应中取出 JSON 对象
///
/// 模型经常用 ```json 代码块包裹输出，或者在前后加说明文字。
pub fn extract_json_block(response: &str) -> Result<&str, ServiceError> {
    if let Some(block) = json_fence().captures(response).and_then(|caps| caps.get(1)) {
        return Ok(block.as_str());
    }

    match (response.find('{'), response.rfind('}')) {
        (Some(start), Some(end)) if start < end => Ok(&response[start..=end]),
        _ => Err(ServiceError::malformed(format!(
            "LLM 响应中没有 JSON 对象: {}",
            crate::utils::logging::truncate_text(response, 80)
        ))),
    }
}
