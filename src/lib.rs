//! # Lead Scout
//!
//! 对开源仓库线索做并发富化和打分的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有跨任务共享的状态，只暴露能力
//! - `UsageLedger` - 按分析类型累计调用、token 和费用
//! - `ConcurrencyLimiter` - 全批次在途调用上限
//! - `ResilienceWrapper` - 按错误分类重试 / 放弃 / 升级
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能对一个仓库做什么"
//! - `LlmDocumentationService` - README 获取 + 文档分析
//! - `LlmSentimentService` - 社区讨论获取 + 情感分析
//! - `LlmService` - LLM 调用能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个线索"的完整处理流程
//! - `LeadCtx` - 上下文封装（仓库 id + 序号）
//! - `LeadAnalyzer` - 两项分析并行执行并结算
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 批量扇出、崩溃隔离、致命升级
//! - `orchestrator/pipeline` - 一次运行：分析 → 打分 → 排名 → 报告
//! - `orchestrator/app` - 应用生命周期
//!
//! 打分（`scoring/`）是纯函数，不依赖任何一层。
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod scoring;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult, FailureReason, FatalError, ServiceError};
pub use models::{Candidate, LeadResult};
pub use orchestrator::{App, Pipeline, PipelineOptions, RunReport};
pub use scoring::{rank, score, ScoreRecord};
pub use workflow::{LeadAnalyzer, LeadCtx};
