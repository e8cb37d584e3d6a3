//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量调度和运行生命周期，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量线索处理器
//! - 每个候选一个任务（JoinSet），全部同时调度
//! - 捕获单个任务的 panic，记为缺失线索
//! - 致命错误时取消运行令牌并中止其余任务
//!
//! ### `pipeline` - 分析流水线
//! - 每次运行新建账本和限流器
//! - 打分、排名，汇总 `RunReport`
//!
//! ### `app` - 应用
//! - 从配置构建具体服务
//! - 加载候选、输出排名、写出报告
//!
//! ## 层次关系
//!
//! ```text
//! app
//!     ↓
//! pipeline (Vec<Candidate> → RunReport)
//!     ↓
//! batch_processor (Vec<Candidate> → Vec<LeadResult>)
//!     ↓
//! workflow::LeadAnalyzer (单个 Candidate)
//!     ↓
//! services (能力层：documentation / sentiment / llm)
//!     ↓
//! infrastructure (基础设施：limiter / resilience / ledger)
//! ```

pub mod app;
pub mod batch_processor;
pub mod pipeline;

// 重新导出主要类型
pub use app::App;
pub use batch_processor::BatchProcessor;
pub use pipeline::{KindSummary, Pipeline, PipelineOptions, RunReport};
