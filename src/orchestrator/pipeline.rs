//! 分析流水线
//!
//! 一次 `run` 对应一次完整运行：新建账本和限流器，批量分析，逐个打分并排名，
//! 汇总成 `RunReport`。同一个 `Pipeline` 可以多次运行，每次的用量互不影响。

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::infrastructure::{
    ConcurrencyLimiter, RateTable, ResilienceWrapper, RetryPolicy, UsageLedger,
    UsageRecord,
};
use crate::models::{Candidate, LeadResult};
use crate::orchestrator::batch_processor::BatchProcessor;
use crate::scoring::{self, ScoreRecord};
use crate::services::{DocumentationService, SentimentService};
use crate::workflow::LeadAnalyzer;

/// 流水线参数
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// 全批次同时在途的外部调用上限
    pub concurrency_limit: usize,
    pub retry_policy: RetryPolicy,
    pub rates: RateTable,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            concurrency_limit: 16,
            retry_policy: RetryPolicy::default(),
            rates: RateTable::default(),
        }
    }
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            concurrency_limit: config.max_concurrent_calls,
            retry_policy: RetryPolicy {
                max_retries: config.max_retries,
                base_delay: config.retry_base_delay(),
                max_delay: config.retry_max_delay(),
                jitter: true,
            },
            rates: config.rate_table(),
        }
    }
}

/// 单类分析的成败统计（按线索计）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KindSummary {
    pub succeeded: usize,
    pub failed: usize,
}

/// 一次运行的完整报告
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub generated_at: String,
    pub total_leads: usize,
    /// 按得分降序
    pub ranked: Vec<ScoreRecord>,
    pub leads: Vec<LeadResult>,
    pub usage: UsageRecord,
    pub documentation: KindSummary,
    pub sentiment: KindSummary,
    /// 运行期间观测到的最大在途调用数
    pub peak_in_flight: usize,
}

impl RunReport {
    pub fn lead(&self, id: &str) -> Option<&LeadResult> {
        self.leads.iter().find(|lead| lead.id() == id)
    }

    /// 写出 JSON 报告
    pub async fn write_json(&self, path: &Path) -> AppResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, json)
            .await
            .map_err(|e| AppError::file_write_failed(path.display().to_string(), e))?;
        info!("📝 报告已写入 {}", path.display());
        Ok(())
    }
}

/// 分析流水线
pub struct Pipeline {
    documentation: Arc<dyn DocumentationService>,
    sentiment: Arc<dyn SentimentService>,
    options: PipelineOptions,
    cancel: CancellationToken,
}

impl Pipeline {
    pub fn new(
        documentation: Arc<dyn DocumentationService>,
        sentiment: Arc<dyn SentimentService>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            documentation,
            sentiment,
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// 父令牌，取消后所有运行中的重试在下一个检查点停止
    ///
    /// 每次 `run` 使用它的子令牌，致命错误只取消本次运行，流水线仍可再次运行。
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 分析、打分并排名
    pub async fn run(&self, candidates: Vec<Candidate>) -> AppResult<RunReport> {
        let ledger = Arc::new(UsageLedger::new(self.options.rates.clone()));
        let limiter = ConcurrencyLimiter::new(self.options.concurrency_limit);
        let run_token = self.cancel.child_token();
        let resilience = ResilienceWrapper::new(self.options.retry_policy, run_token.clone());

        let analyzer = LeadAnalyzer::new(
            self.documentation.clone(),
            self.sentiment.clone(),
            limiter.clone(),
            resilience,
            ledger.clone(),
        );

        let leads = BatchProcessor::new(analyzer, run_token)
            .run(candidates)
            .await?;

        let ranked = scoring::rank(leads.iter().map(scoring::score).collect());

        let count = |has: fn(&LeadResult) -> bool| {
            let succeeded = leads.iter().filter(|lead| has(lead)).count();
            KindSummary {
                succeeded,
                failed: leads.len() - succeeded,
            }
        };
        let documentation = count(|lead| lead.documentation.is_some());
        let sentiment = count(|lead| lead.sentiment.is_some());

        Ok(RunReport {
            generated_at: chrono::Local::now().to_rfc3339(),
            total_leads: leads.len(),
            ranked,
            leads,
            usage: ledger.snapshot(),
            documentation,
            sentiment,
            peak_in_flight: limiter.peak_in_flight(),
        })
    }
}
