//! 应用生命周期 - 编排层
//!
//! 初始化（HTTP 客户端、LLM 服务、流水线）→ 加载候选 → 运行 → 输出排名和报告。

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::models::load_candidates;
use crate::orchestrator::pipeline::{Pipeline, PipelineOptions, RunReport};
use crate::services::{LlmDocumentationService, LlmService, LlmSentimentService};
use crate::utils::logging::{
    log_candidates_loaded, log_ranked_lead, log_startup, print_final_stats,
};

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// 应用主结构
pub struct App {
    config: Config,
    pipeline: Pipeline,
}

impl App {
    /// 初始化应用
    pub fn initialize(config: Config) -> Result<Self> {
        config.validate().context("配置校验失败")?;

        log_startup(config.max_concurrent_calls, config.max_retries);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .context("创建 HTTP 客户端失败")?;

        let llm = Arc::new(LlmService::new(&config));
        info!("🤖 LLM 模型: {}", llm.model_name());

        let pipeline = Pipeline::new(
            Arc::new(LlmDocumentationService::new(&config, http.clone(), llm.clone())),
            Arc::new(LlmSentimentService::new(&config, http, llm)),
            PipelineOptions::from_config(&config),
        );

        Ok(Self { config, pipeline })
    }

    /// 运行令牌，用于外部（Ctrl-C）取消
    pub fn cancel_token(&self) -> CancellationToken {
        self.pipeline.cancel_token()
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<Option<RunReport>> {
        info!("\n📁 正在加载候选列表...");
        let candidates = load_candidates(Path::new(&self.config.candidates_file))
            .await
            .context("加载候选列表失败")?;

        if candidates.is_empty() {
            warn!("⚠️ 候选列表为空，程序结束");
            return Ok(None);
        }

        log_candidates_loaded(candidates.len());

        let report = self.pipeline.run(candidates).await?;

        info!("\n🏆 排名:");
        for (rank, record) in report.ranked.iter().enumerate() {
            log_ranked_lead(
                rank + 1,
                &record.id,
                record.score,
                &record.completeness.describe(),
            );
        }

        report
            .write_json(Path::new(&self.config.report_file))
            .await
            .context("写入报告失败")?;

        print_final_stats(report.total_leads, &report.usage, &self.config.report_file);

        Ok(Some(report))
    }
}
