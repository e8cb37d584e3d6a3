//! 错误类型
//!
//! 错误分三类，对应流水线中的三种处理方式：
//!
//! - **瞬时错误**（限流、超时、网络抖动、5xx）：由重试包装器吸收
//! - **非瞬时错误**（输入无效、响应格式错误、校验失败）：在单个线索内记为"因子缺失"
//! - **致命错误**（鉴权/配置失败）：终止整批处理并立即上报

use std::time::Duration;
use thiserror::Error;

use crate::infrastructure::TokenUsage;

/// 瞬时错误的具体类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientKind {
    /// 请求超时
    Timeout,
    /// 网络连接问题
    Network,
    /// 服务端 5xx
    ServerError,
}

/// 非瞬时错误的具体类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonTransientKind {
    /// 输入无效（例如仓库不存在、请求参数错误）
    InvalidInput,
    /// 响应格式错误（不是合法 JSON、缺字段）
    MalformedResponse,
    /// 字段取值校验失败
    ValidationFailed,
}

/// 致命错误的具体类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalKind {
    /// 鉴权失败
    Authentication,
    /// 配置错误
    Configuration,
}

/// 单次外部调用的分类错误
///
/// 所有外部服务（文档分析、情感分析、LLM）都必须把自己的错误映射到这里，
/// 重试包装器只根据分类做决策。
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("瞬时错误 ({kind:?}): {message}")]
    Transient { kind: TransientKind, message: String },

    #[error("请求频率限制, 建议等待: {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("非瞬时错误 ({kind:?}): {message}")]
    NonTransient {
        kind: NonTransientKind,
        message: String,
        /// 失败前已经消耗的 token（例如 LLM 已回复但校验失败）
        spent: TokenUsage,
    },

    #[error("致命错误 ({kind:?}): {message}")]
    Fatal { kind: FatalKind, message: String },
}

impl ServiceError {
    pub fn timeout(message: impl Into<String>) -> Self {
        ServiceError::Transient {
            kind: TransientKind::Timeout,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        ServiceError::Transient {
            kind: TransientKind::Network,
            message: message.into(),
        }
    }

    pub fn server(message: impl Into<String>) -> Self {
        ServiceError::Transient {
            kind: TransientKind::ServerError,
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        ServiceError::NonTransient {
            kind: NonTransientKind::InvalidInput,
            message: message.into(),
            spent: TokenUsage::default(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        ServiceError::NonTransient {
            kind: NonTransientKind::MalformedResponse,
            message: message.into(),
            spent: TokenUsage::default(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::NonTransient {
            kind: NonTransientKind::ValidationFailed,
            message: message.into(),
            spent: TokenUsage::default(),
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        ServiceError::Fatal {
            kind: FatalKind::Authentication,
            message: message.into(),
        }
    }

    /// 是否值得重试
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ServiceError::Transient { .. } | ServiceError::RateLimited { .. }
        )
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, ServiceError::Fatal { .. })
    }

    /// 附加失败前消耗的 token，只对非瞬时错误生效
    pub fn with_spent(self, usage: TokenUsage) -> Self {
        match self {
            ServiceError::NonTransient { kind, message, .. } => ServiceError::NonTransient {
                kind,
                message,
                spent: usage,
            },
            other => other,
        }
    }

    pub fn spent(&self) -> TokenUsage {
        match self {
            ServiceError::NonTransient { spent, .. } => *spent,
            _ => TokenUsage::default(),
        }
    }

    /// 按推理端点的 HTTP 状态码分类
    ///
    /// 推理端点的 401/403 意味着凭据失效，后续所有调用都会失败，因此是致命错误。
    pub fn from_status(status: u16, context: impl Into<String>) -> Self {
        let context = context.into();
        match status {
            401 | 403 => ServiceError::authentication(format!("{} (HTTP {})", context, status)),
            _ => ServiceError::from_fetch_status(status, None, context),
        }
    }

    /// 按数据源（README、社区讨论）的 HTTP 状态码分类
    ///
    /// 数据源是匿名访问的，401/403 只说明这个仓库拿不到（被屏蔽、私有、被限流），
    /// 不会影响其他线索，所以永远不是致命错误。带等待提示的 403 按限流处理。
    pub fn from_fetch_status(
        status: u16,
        retry_after: Option<Duration>,
        context: impl Into<String>,
    ) -> Self {
        let context = context.into();
        match status {
            403 if retry_after.is_some() => ServiceError::RateLimited { retry_after },
            408 => ServiceError::timeout(format!("{} (HTTP 408)", context)),
            429 => ServiceError::RateLimited { retry_after },
            500..=599 => ServiceError::server(format!("{} (HTTP {})", context, status)),
            _ => ServiceError::invalid_input(format!("{} (HTTP {})", context, status)),
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return ServiceError::from_fetch_status(status.as_u16(), None, err.to_string());
        }
        if err.is_timeout() {
            ServiceError::timeout(err.to_string())
        } else if err.is_connect() || err.is_request() {
            ServiceError::network(err.to_string())
        } else if err.is_decode() {
            ServiceError::malformed(err.to_string())
        } else {
            ServiceError::network(err.to_string())
        }
    }
}

/// 单项分析最终失败的原因（已被包装器吸收，不再向上抛出）
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// 瞬时错误重试耗尽，按超时归类
    #[error("重试 {attempts} 次后仍超时: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    #[error("非瞬时失败: {message}")]
    NonTransient { message: String },

    /// 运行被取消
    #[error("已取消")]
    Cancelled,

    /// 线索任务意外崩溃（panic 或未分类错误）
    #[error("任务异常: {message}")]
    Crashed { message: String },
}

/// 致命错误：继续运行只会为注定失败的调用付费
#[derive(Debug, Clone, Error)]
#[error("{kind:?}: {message}")]
pub struct FatalError {
    pub kind: FatalKind,
    pub message: String,
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },

    #[error("缺少必需配置: {name}")]
    Missing { name: String },

    #[error("配置取值无效: {name} = {value}")]
    Invalid { name: String, value: String },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    #[error("文件不存在: {path}")]
    NotFound { path: String },

    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    #[error("文件错误: {0}")]
    File(#[from] FileError),

    /// 致命错误，整批终止
    #[error("致命错误, 批处理已终止: {0}")]
    Fatal(#[from] FatalError),

    #[error("JSON 序列化失败: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// 创建文件读取错误
    pub fn file_read_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source,
        })
    }

    /// 创建文件写入错误
    pub fn file_write_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source,
        })
    }
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
