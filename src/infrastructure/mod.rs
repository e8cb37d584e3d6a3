//! 基础设施层
//!
//! 持有跨任务共享的可变状态，只暴露能力：
//! - `UsageLedger` - 调用次数 / token / 费用累加
//! - `ConcurrencyLimiter` - 全批次在途调用上限
//! - `ResilienceWrapper` - 单次调用的重试与失败隔离

pub mod limiter;
pub mod resilience;
pub mod usage_ledger;

pub use limiter::{ConcurrencyLimiter, LimiterPermit};
pub use resilience::{CallOutcome, ResilienceWrapper, RetryPolicy, RetryState};
pub use usage_ledger::{
    CallKind, KindUsage, Rate, RateTable, TokenUsage, UsageLedger, UsageRecord,
};
