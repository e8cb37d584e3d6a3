//! 重试包装器
//!
//! 包装单次外部调用，按错误分类决定重试、放弃或升级：
//!
//! ```text
//! Attempting ──成功──────────────▶ Succeeded
//!     │ 瞬时错误且未超上限
//!     ▼
//!  Backoff ──睡眠结束──▶ Attempting
//!     │ 取消
//!     ▼
//!  (Cancelled)
//!
//! Attempting ──瞬时错误且已达上限──▶ FailedTransientExhausted
//! Attempting ──非瞬时错误─────────▶ FailedNonTransient
//! Attempting ──鉴权/配置错误──────▶ Escalated
//! ```
//!
//! 除 `Escalated` 外，所有失败都以 `FailureReason` 返回，不会越过包装器向上抛出。

use crate::error::{FailureReason, FatalError, ServiceError};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// 重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 最大重试次数（不含首次尝试）
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// 是否在退避时间上加随机抖动
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }
}

/// 重试状态机的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// 正在进行第 `attempt` 次尝试（从 0 开始）
    Attempting { attempt: u32 },
    /// 第 `attempt` 次尝试瞬时失败，等待 `delay` 后重试
    Backoff { attempt: u32, delay: Duration },
    Succeeded { attempt: u32 },
    FailedTransientExhausted { attempt: u32 },
    FailedNonTransient { attempt: u32 },
    /// 致命错误，需要终止整批
    Escalated { attempt: u32 },
}

impl RetryState {
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            RetryState::Attempting { .. } | RetryState::Backoff { .. }
        )
    }
}

impl RetryPolicy {
    /// 快速策略，测试中使用
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            jitter: false,
        }
    }

    /// 第 `attempt` 次尝试失败后的退避时间：`base × 2^attempt`，不超过 `max_delay`
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        let delay = self.base_delay.saturating_mul(factor).min(self.max_delay);
        if self.jitter {
            apply_jitter(delay)
        } else {
            delay
        }
    }

    /// 根据一次尝试的结果计算下一状态
    pub fn next_state(&self, attempt: u32, result: Result<(), &ServiceError>) -> RetryState {
        match result {
            Ok(()) => RetryState::Succeeded { attempt },
            Err(e) if e.is_fatal() => RetryState::Escalated { attempt },
            Err(e) if e.is_transient() => {
                if attempt >= self.max_retries {
                    return RetryState::FailedTransientExhausted { attempt };
                }
                let delay = match e {
                    // 服务端给出的等待时间优先
                    ServiceError::RateLimited {
                        retry_after: Some(retry_after),
                    } => (*retry_after).min(self.max_delay),
                    _ => self.backoff_delay(attempt),
                };
                RetryState::Backoff { attempt, delay }
            }
            Err(_) => RetryState::FailedNonTransient { attempt },
        }
    }
}

/// 在 [delay/2, delay] 内取随机值
fn apply_jitter(delay: Duration) -> Duration {
    let max_ms = delay.as_millis() as u64;
    if max_ms < 2 {
        return delay;
    }
    let jittered = rand::thread_rng().gen_range(max_ms / 2..=max_ms);
    Duration::from_millis(jittered)
}

/// 包装调用的最终结果
#[derive(Debug)]
pub enum CallOutcome<T> {
    Succeeded { value: T, retries: u32 },
    Failed(FailureReason),
    Fatal(FatalError),
}

/// 重试包装器
#[derive(Debug, Clone)]
pub struct ResilienceWrapper {
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl ResilienceWrapper {
    pub fn new(policy: RetryPolicy, cancel: CancellationToken) -> Self {
        Self { policy, cancel }
    }

    /// 执行 `op`，按策略重试
    ///
    /// 取消在每次尝试之前和退避睡眠期间生效。
    pub async fn call<T, F, Fut>(&self, label: &str, mut op: F) -> CallOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let mut state = RetryState::Attempting { attempt: 0 };
        let mut last_error: Option<ServiceError> = None;
        let mut value: Option<T> = None;

        while !state.is_terminal() {
            state = match state {
                RetryState::Attempting { attempt } => {
                    if self.cancel.is_cancelled() {
                        debug!("{} 已取消, 不再尝试", label);
                        return CallOutcome::Failed(FailureReason::Cancelled);
                    }
                    match op().await {
                        Ok(v) => {
                            value = Some(v);
                            self.policy.next_state(attempt, Ok(()))
                        }
                        Err(e) => {
                            let next = self.policy.next_state(attempt, Err(&e));
                            last_error = Some(e);
                            next
                        }
                    }
                }
                RetryState::Backoff { attempt, delay } => {
                    warn!(
                        "{} 瞬时失败 (尝试 {}/{}): {}, 等待 {}ms 后重试...",
                        label,
                        attempt + 1,
                        self.policy.max_retries + 1,
                        last_error
                            .as_ref()
                            .map(ToString::to_string)
                            .unwrap_or_default(),
                        delay.as_millis()
                    );
                    tokio::select! {
                        _ = self.cancel.cancelled() => {
                            debug!("{} 退避期间被取消", label);
                            return CallOutcome::Failed(FailureReason::Cancelled);
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                    RetryState::Attempting {
                        attempt: attempt + 1,
                    }
                }
                terminal => terminal,
            };
        }

        let error_text = || {
            last_error
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default()
        };

        match state {
            RetryState::Succeeded { attempt } => match value {
                Some(value) => CallOutcome::Succeeded {
                    value,
                    retries: attempt,
                },
                None => CallOutcome::Failed(FailureReason::Crashed {
                    message: format!("{} 成功状态缺少返回值", label),
                }),
            },
            RetryState::FailedTransientExhausted { attempt } => {
                warn!("{} 重试已耗尽 ({} 次尝试): {}", label, attempt + 1, error_text());
                CallOutcome::Failed(FailureReason::RetriesExhausted {
                    attempts: attempt + 1,
                    last_error: error_text(),
                })
            }
            RetryState::FailedNonTransient { .. } => {
                warn!("{} 非瞬时失败, 不重试: {}", label, error_text());
                CallOutcome::Failed(FailureReason::NonTransient {
                    message: error_text(),
                })
            }
            RetryState::Escalated { .. } => match last_error.clone() {
                Some(ServiceError::Fatal { kind, message }) => {
                    CallOutcome::Fatal(FatalError { kind, message })
                }
                other => CallOutcome::Failed(FailureReason::Crashed {
                    message: format!("{} 升级状态缺少致命错误: {:?}", label, other),
                }),
            },
            RetryState::Attempting { .. } | RetryState::Backoff { .. } => {
                CallOutcome::Failed(FailureReason::Crashed {
                    message: format!("{} 状态机未终止", label),
                })
            }
        }
    }
}
