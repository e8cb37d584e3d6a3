//! 批量线索处理器 - 编排层
//!
//! ## 职责
//!
//! 1. **扇出**：每个候选一个任务，全部同时调度，真正的并发上限由共享限流器控制
//! 2. **崩溃隔离**：单个任务 panic 只影响自己，记为两项分析均缺失的线索
//! 3. **致命升级**：任一线索遇到致命错误，取消运行令牌、中止其余任务并返回该错误
//! 4. **一一对应**：正常结束时结果与输入数量相同，不丢不重
//!
//! 结果顺序与输入顺序无关。

use std::collections::HashMap;
use tokio::task::{Id, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{AppError, AppResult, FatalError};
use crate::models::{Candidate, LeadResult};
use crate::workflow::{LeadAnalyzer, LeadCtx};

/// 批量处理器
pub struct BatchProcessor {
    analyzer: LeadAnalyzer,
    cancel: CancellationToken,
}

impl BatchProcessor {
    pub fn new(analyzer: LeadAnalyzer, cancel: CancellationToken) -> Self {
        Self { analyzer, cancel }
    }

    /// 分析所有候选
    ///
    /// 返回 `Err` 只有一种情况：某个线索遇到致命错误。
    pub async fn run(&self, candidates: Vec<Candidate>) -> AppResult<Vec<LeadResult>> {
        let total = candidates.len();
        let mut join_set: JoinSet<Result<LeadResult, FatalError>> = JoinSet::new();
        // 任务 id → 候选，用于把崩溃的任务还原成线索
        let mut pending: HashMap<Id, Candidate> = HashMap::with_capacity(total);

        for (idx, candidate) in candidates.into_iter().enumerate() {
            let ctx = LeadCtx::new(&candidate.id, idx + 1, total);
            let analyzer = self.analyzer.clone();
            let task_candidate = candidate.clone();

            let handle = join_set.spawn(async move {
                analyzer.analyze(&task_candidate, &ctx).await
            });
            pending.insert(handle.id(), candidate);
        }

        info!("📦 已调度 {} 个线索任务", total);

        let mut results = Vec::with_capacity(total);
        let mut crashed = 0usize;

        while let Some(joined) = join_set.join_next_with_id().await {
            match joined {
                Ok((id, Ok(lead))) => {
                    pending.remove(&id);
                    results.push(lead);
                }
                Ok((id, Err(fatal))) => {
                    pending.remove(&id);
                    error!("❌ 遇到致命错误, 终止整批: {}", fatal);
                    self.abort(&mut join_set).await;
                    return Err(AppError::Fatal(fatal));
                }
                Err(join_error) => {
                    let id = join_error.id();
                    match pending.remove(&id) {
                        Some(candidate) => {
                            error!("[{}] 任务执行失败: {}", candidate.id, join_error);
                            results.push(LeadResult::crashed(
                                candidate,
                                join_error.to_string(),
                            ));
                            crashed += 1;
                        }
                        None => warn!("未知任务 {} 执行失败: {}", id, join_error),
                    }
                }
            }
        }

        // 不应发生：每个任务都应恰好结束一次
        for (_, candidate) in pending.drain() {
            warn!("[{}] 没有收到任务结果, 记为异常", candidate.id);
            results.push(LeadResult::crashed(candidate, "任务未返回结果"));
            crashed += 1;
        }

        if crashed > 0 {
            warn!("⚠️ {} 个线索任务异常退出", crashed);
        }

        Ok(results)
    }

    /// 取消令牌、中止剩余任务，并等待它们全部退出以归还限流名额
    async fn abort(&self, join_set: &mut JoinSet<Result<LeadResult, FatalError>>) {
        self.cancel.cancel();
        join_set.abort_all();
        while join_set.join_next().await.is_some() {}
        info!("🛑 剩余任务已全部中止");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::infrastructure::{ConcurrencyLimiter, ResilienceWrapper, RetryPolicy, UsageLedger};
    use crate::models::{DocumentationAnalysis, SentimentAnalysis};
    use crate::services::{DocumentationService, Metered, SentimentService};
    use async_trait::async_trait;
    use std::sync::Arc;

    /// 对指定仓库 panic，其余返回非瞬时错误
    struct PanickyDocs {
        panic_on: &'static str,
    }

    #[async_trait]
    impl DocumentationService for PanickyDocs {
        async fn analyze_documentation(
            &self,
            candidate: &Candidate,
        ) -> Result<Metered<DocumentationAnalysis>, ServiceError> {
            if candidate.id == self.panic_on {
                panic!("documentation parser exploded");
            }
            Err(ServiceError::invalid_input("no readme"))
        }
    }

    struct NoDiscussion;

    #[async_trait]
    impl SentimentService for NoDiscussion {
        async fn analyze_sentiment(
            &self,
            _candidate: &Candidate,
        ) -> Result<Metered<SentimentAnalysis>, ServiceError> {
            Err(ServiceError::invalid_input("no discussion"))
        }
    }

    #[tokio::test]
    async fn test_panicking_lead_is_recorded_as_crashed() {
        let limiter = ConcurrencyLimiter::new(2);
        let cancel = CancellationToken::new();
        let analyzer = LeadAnalyzer::new(
            Arc::new(PanickyDocs { panic_on: "bad/repo" }),
            Arc::new(NoDiscussion),
            limiter.clone(),
            ResilienceWrapper::new(RetryPolicy::immediate(1), cancel.clone()),
            Arc::new(UsageLedger::default()),
        );
        let processor = BatchProcessor::new(analyzer, cancel);

        let candidates = vec![
            Candidate::new("good/one", 1),
            Candidate::new("bad/repo", 2),
            Candidate::new("good/two", 3),
        ];
        let results = processor.run(candidates).await.unwrap();

        assert_eq!(results.len(), 3);
        let bad = results.iter().find(|r| r.id() == "bad/repo").unwrap();
        assert!(matches!(
            bad.documentation_failure,
            Some(crate::error::FailureReason::Crashed { .. })
        ));
        assert!(bad.sentiment.is_none());
        assert_eq!(limiter.available(), limiter.capacity());
    }

    #[tokio::test]
    async fn test_empty_batch_returns_no_results() {
        let cancel = CancellationToken::new();
        let analyzer = LeadAnalyzer::new(
            Arc::new(PanickyDocs { panic_on: "" }),
            Arc::new(NoDiscussion),
            ConcurrencyLimiter::new(1),
            ResilienceWrapper::new(RetryPolicy::immediate(0), cancel.clone()),
            Arc::new(UsageLedger::default()),
        );
        let results = BatchProcessor::new(analyzer, cancel)
            .run(Vec::new())
            .await
            .unwrap();
        assert!(results.is_empty());
    }
}
