//! 单线索分析流程 - 流程层
//!
//! 核心职责：对一个候选仓库并行执行文档分析和情感分析
//!
//! 每项分析的调用链：
//! 1. 重试包装器（按错误分类重试 / 放弃 / 升级）
//! 2. 每次尝试先在全局限流器排队，拿到名额后才调用外部服务
//! 3. 成功后写入用量账本
//!
//! 两项分析互不依赖，任何一项失败都只记为"因子缺失"，只有致命错误会向上传递。
//! 致命错误立即返回，另一项分析随之被丢弃并释放限流名额。

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::{FailureReason, FatalError, ServiceError};
use crate::infrastructure::{
    CallKind, CallOutcome, ConcurrencyLimiter, ResilienceWrapper, UsageLedger,
};
use crate::models::{Candidate, DocumentationAnalysis, LeadResult, SentimentAnalysis};
use crate::services::{DocumentationService, Metered, SentimentService};
use crate::workflow::lead_ctx::LeadCtx;

/// 单项分析的结算结果：数据或失败原因二选一
type Settled<T> = (Option<T>, Option<FailureReason>);

/// 单线索分析器
///
/// - 不持有批次信息
/// - 共享的限流器、账本由编排层注入
/// - 不关心线索之间的顺序
#[derive(Clone)]
pub struct LeadAnalyzer {
    documentation: Arc<dyn DocumentationService>,
    sentiment: Arc<dyn SentimentService>,
    limiter: ConcurrencyLimiter,
    resilience: ResilienceWrapper,
    ledger: Arc<UsageLedger>,
}

impl LeadAnalyzer {
    pub fn new(
        documentation: Arc<dyn DocumentationService>,
        sentiment: Arc<dyn SentimentService>,
        limiter: ConcurrencyLimiter,
        resilience: ResilienceWrapper,
        ledger: Arc<UsageLedger>,
    ) -> Self {
        Self {
            documentation,
            sentiment,
            limiter,
            resilience,
            ledger,
        }
    }

    /// 分析单个线索
    ///
    /// 等待两项分析都结束后返回；只有致命错误返回 `Err`，且不等待另一项。
    pub async fn analyze(
        &self,
        candidate: &Candidate,
        ctx: &LeadCtx,
    ) -> Result<LeadResult, FatalError> {
        info!("{} 🔍 开始分析 (⭐ {})", ctx, candidate.stars);

        let (documentation, sentiment) = tokio::try_join!(
            self.run_documentation(candidate, ctx),
            self.run_sentiment(candidate, ctx)
        )?;

        let (documentation, documentation_failure) = documentation;
        let (sentiment, sentiment_failure) = sentiment;

        let result = LeadResult {
            candidate: candidate.clone(),
            documentation,
            sentiment,
            documentation_failure,
            sentiment_failure,
        };

        if result.is_complete() {
            info!("{} ✓ 分析完成", ctx);
        } else {
            warn!(
                "{} ⚠️ 部分完成: 文档 {} / 情感 {}",
                ctx,
                if result.documentation.is_some() { "✓" } else { "✗" },
                if result.sentiment.is_some() { "✓" } else { "✗" }
            );
        }

        Ok(result)
    }

    async fn run_documentation(
        &self,
        candidate: &Candidate,
        ctx: &LeadCtx,
    ) -> Result<Settled<DocumentationAnalysis>, FatalError> {
        let label = format!("{} 文档分析", ctx);
        let outcome = self
            .resilience
            .call(&label, || async move {
                let _permit = self.limiter.acquire().await?;
                let result = self.documentation.analyze_documentation(candidate).await;
                self.record_spent(CallKind::Documentation, &result);
                result
            })
            .await;
        self.settle(CallKind::Documentation, ctx, outcome)
    }

    async fn run_sentiment(
        &self,
        candidate: &Candidate,
        ctx: &LeadCtx,
    ) -> Result<Settled<SentimentAnalysis>, FatalError> {
        let label = format!("{} 情感分析", ctx);
        let outcome = self
            .resilience
            .call(&label, || async move {
                let _permit = self.limiter.acquire().await?;
                let result = self.sentiment.analyze_sentiment(candidate).await;
                self.record_spent(CallKind::Sentiment, &result);
                result
            })
            .await;
        self.settle(CallKind::Sentiment, ctx, outcome)
    }

    /// 校验失败的调用同样消耗了 token
    fn record_spent<T>(&self, kind: CallKind, result: &Result<T, ServiceError>) {
        if let Err(e) = result {
            let spent = e.spent();
            if !spent.is_empty() {
                self.ledger.record_spend(kind, spent);
            }
        }
    }

    /// 把包装器结果结算为数据或失败原因，并更新账本
    fn settle<T>(
        &self,
        kind: CallKind,
        ctx: &LeadCtx,
        outcome: CallOutcome<Metered<T>>,
    ) -> Result<Settled<T>, FatalError> {
        match outcome {
            CallOutcome::Succeeded { value, retries } => {
                self.ledger
                    .record(kind, value.usage.input, value.usage.output);
                if retries > 0 {
                    info!("{} ✓ {}成功 (重试 {} 次)", ctx, kind, retries);
                } else {
                    info!("{} ✓ {}成功", ctx, kind);
                }
                Ok((Some(value.value), None))
            }
            CallOutcome::Failed(reason) => {
                self.ledger.record_failure(kind);
                warn!("{} {}缺失: {}", ctx, kind, reason);
                Ok((None, Some(reason)))
            }
            CallOutcome::Fatal(fatal) => {
                error!("{} ❌ {}遇到致命错误: {}", ctx, kind, fatal);
                Err(fatal)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::RetryPolicy;
    use crate::models::Classification;
    use crate::services::TokenUsage;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    struct StaticDocs;

    #[async_trait]
    impl DocumentationService for StaticDocs {
        async fn analyze_documentation(
            &self,
            _candidate: &Candidate,
        ) -> Result<Metered<DocumentationAnalysis>, ServiceError> {
            Ok(Metered::new(
                DocumentationAnalysis {
                    clarity_score: 9,
                    problem_summary: "Speeds up CI".to_string(),
                    time_to_value_minutes: Some(10),
                    classification: Classification::Painkiller,
                    adoption_ease_score: None,
                    maturity_health_score: None,
                },
                TokenUsage {
                    input: 100,
                    output: 20,
                },
            ))
        }
    }

    /// 总是返回同一个错误
    struct FailingSentiment(ServiceError);

    #[async_trait]
    impl SentimentService for FailingSentiment {
        async fn analyze_sentiment(
            &self,
            _candidate: &Candidate,
        ) -> Result<Metered<SentimentAnalysis>, ServiceError> {
            Err(self.0.clone())
        }
    }

    fn analyzer(sentiment_error: ServiceError) -> (LeadAnalyzer, Arc<UsageLedger>) {
        let ledger = Arc::new(UsageLedger::default());
        let analyzer = LeadAnalyzer::new(
            Arc::new(StaticDocs),
            Arc::new(FailingSentiment(sentiment_error)),
            ConcurrencyLimiter::new(2),
            ResilienceWrapper::new(RetryPolicy::immediate(3), CancellationToken::new()),
            ledger.clone(),
        );
        (analyzer, ledger)
    }

    #[tokio::test]
    async fn test_sentiment_failure_keeps_documentation() {
        let (analyzer, ledger) = analyzer(ServiceError::malformed("garbage"));
        let candidate = Candidate::new("a/b", 10);

        let result = analyzer
            .analyze(&candidate, &LeadCtx::new("a/b", 1, 1))
            .await
            .unwrap();

        assert!(result.documentation.is_some());
        assert!(result.sentiment.is_none());
        assert!(matches!(
            result.sentiment_failure,
            Some(FailureReason::NonTransient { .. })
        ));

        let usage = ledger.snapshot();
        assert_eq!(usage.kind(CallKind::Documentation).calls, 1);
        assert_eq!(usage.kind(CallKind::Documentation).tokens_in, 100);
        assert_eq!(usage.kind(CallKind::Sentiment).failures, 1);
    }

    #[tokio::test]
    async fn test_transient_sentiment_exhaustion_is_absorbed() {
        let (analyzer, _) = analyzer(ServiceError::timeout("slow"));
        let result = analyzer
            .analyze(&Candidate::new("a/b", 10), &LeadCtx::new("a/b", 1, 1))
            .await
            .unwrap();

        assert!(matches!(
            result.sentiment_failure,
            Some(FailureReason::RetriesExhausted { attempts: 4, .. })
        ));
        assert!(result.documentation.is_some());
    }

    #[tokio::test]
    async fn test_authentication_failure_is_fatal() {
        let (analyzer, _) = analyzer(ServiceError::authentication("revoked key"));
        let result = analyzer
            .analyze(&Candidate::new("a/b", 10), &LeadCtx::new("a/b", 1, 1))
            .await;

        assert!(result.is_err());
    }

    /// 先睡一段时间再失败
    struct SlowSentiment(Duration);

    #[async_trait]
    impl SentimentService for SlowSentiment {
        async fn analyze_sentiment(
            &self,
            _candidate: &Candidate,
        ) -> Result<Metered<SentimentAnalysis>, ServiceError> {
            tokio::time::sleep(self.0).await;
            Err(ServiceError::timeout("discussion source never answered"))
        }
    }

    /// 总是返回同一个错误的文档服务
    struct FailingDocs(ServiceError);

    #[async_trait]
    impl DocumentationService for FailingDocs {
        async fn analyze_documentation(
            &self,
            _candidate: &Candidate,
        ) -> Result<Metered<DocumentationAnalysis>, ServiceError> {
            Err(self.0.clone())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_does_not_wait_for_sibling() {
        let limiter = ConcurrencyLimiter::new(2);
        let analyzer = LeadAnalyzer::new(
            Arc::new(FailingDocs(ServiceError::authentication("revoked key"))),
            Arc::new(SlowSentiment(Duration::from_secs(30))),
            limiter.clone(),
            ResilienceWrapper::new(RetryPolicy::default(), CancellationToken::new()),
            Arc::new(UsageLedger::default()),
        );

        let started = tokio::time::Instant::now();
        let result = analyzer
            .analyze(&Candidate::new("a/b", 10), &LeadCtx::new("a/b", 1, 1))
            .await;

        assert!(result.is_err());
        assert!(started.elapsed() < Duration::from_secs(1));
        // 被丢弃的情感分析已归还名额
        assert_eq!(limiter.available(), 2);
    }

    #[tokio::test]
    async fn test_validation_failure_still_records_spent_tokens() {
        let ledger = Arc::new(UsageLedger::default());
        let analyzer = LeadAnalyzer::new(
            Arc::new(FailingDocs(
                ServiceError::validation("clarity_score out of range").with_spent(TokenUsage {
                    input: 300,
                    output: 40,
                }),
            )),
            Arc::new(FailingSentiment(ServiceError::malformed("garbage"))),
            ConcurrencyLimiter::new(2),
            ResilienceWrapper::new(RetryPolicy::immediate(3), CancellationToken::new()),
            ledger.clone(),
        );

        let result = analyzer
            .analyze(&Candidate::new("a/b", 10), &LeadCtx::new("a/b", 1, 1))
            .await
            .unwrap();
        assert!(result.documentation.is_none());

        let documentation = ledger.snapshot().kind(CallKind::Documentation);
        assert_eq!(documentation.calls, 0);
        assert_eq!(documentation.failures, 1);
        assert_eq!(documentation.tokens_in, 300);
        assert_eq!(documentation.tokens_out, 40);
        // 没有 token 的失败不写入
        assert_eq!(ledger.snapshot().kind(CallKind::Sentiment).tokens_in, 0);
    }
}
