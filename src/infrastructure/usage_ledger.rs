//! 用量账本
//!
//! 记录一次运行中的推理调用次数、token 数和派生费用。
//! 账本由编排层创建，以 `Arc<UsageLedger>` 显式传给每个调用点，生命周期等于一次运行。

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};

/// 调用类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    Documentation,
    Sentiment,
}

impl CallKind {
    pub const ALL: [CallKind; 2] = [CallKind::Documentation, CallKind::Sentiment];

    fn slot(self) -> usize {
        match self {
            CallKind::Documentation => 0,
            CallKind::Sentiment => 1,
        }
    }
}

impl Display for CallKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallKind::Documentation => write!(f, "文档分析"),
            CallKind::Sentiment => write!(f, "情感分析"),
        }
    }
}

/// 一次调用消耗的 token
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
}

impl TokenUsage {
    pub fn is_empty(&self) -> bool {
        self.input == 0 && self.output == 0
    }
}

/// 费率（美元 / 1K tokens）
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Rate {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

impl Rate {
    fn cost(&self, tokens_in: u64, tokens_out: u64) -> f64 {
        (tokens_in as f64 / 1000.0) * self.input_per_1k
            + (tokens_out as f64 / 1000.0) * self.output_per_1k
    }
}

/// 按调用类别配置的费率表，未配置的类别按 0 计费
#[derive(Debug, Clone, Default)]
pub struct RateTable {
    rates: BTreeMap<CallKind, Rate>,
}

impl RateTable {
    pub fn with_rate(mut self, kind: CallKind, rate: Rate) -> Self {
        self.rates.insert(kind, rate);
        self
    }

    pub fn rate(&self, kind: CallKind) -> Rate {
        self.rates.get(&kind).copied().unwrap_or_default()
    }
}

#[derive(Debug, Default)]
struct Counters {
    calls: AtomicU64,
    failures: AtomicU64,
    tokens_in: AtomicU64,
    tokens_out: AtomicU64,
}

/// 单个类别的用量快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct KindUsage {
    /// 成功的分析调用次数
    pub calls: u64,
    /// 最终失败的分析次数
    pub failures: u64,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub cost_usd: f64,
}

/// 用量快照，创建后不可变
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageRecord {
    pub by_kind: BTreeMap<CallKind, KindUsage>,
    pub total_calls: u64,
    pub total_tokens: u64,
    pub total_cost_usd: f64,
}

impl UsageRecord {
    pub fn kind(&self, kind: CallKind) -> KindUsage {
        self.by_kind.get(&kind).copied().unwrap_or_default()
    }
}

/// 用量账本
///
/// 每个计数器都是独立的原子量，`record` 在任意并发下都不会丢失增量。
#[derive(Debug)]
pub struct UsageLedger {
    counters: [Counters; 2],
    rates: RateTable,
}

impl UsageLedger {
    pub fn new(rates: RateTable) -> Self {
        Self {
            counters: Default::default(),
            rates,
        }
    }

    /// 记录一次成功调用
    pub fn record(&self, kind: CallKind, tokens_in: u64, tokens_out: u64) {
        let counters = &self.counters[kind.slot()];
        counters.calls.fetch_add(1, Ordering::Relaxed);
        counters.tokens_in.fetch_add(tokens_in, Ordering::Relaxed);
        counters.tokens_out.fetch_add(tokens_out, Ordering::Relaxed);
    }

    /// 记录没有产出结果但已计费的 token，不计入调用次数
    pub fn record_spend(&self, kind: CallKind, usage: TokenUsage) {
        let counters = &self.counters[kind.slot()];
        counters.tokens_in.fetch_add(usage.input, Ordering::Relaxed);
        counters.tokens_out.fetch_add(usage.output, Ordering::Relaxed);
    }

    /// 记录一次最终失败（重试耗尽或非瞬时错误）
    pub fn record_failure(&self, kind: CallKind) {
        self.counters[kind.slot()]
            .failures
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> UsageRecord {
        let mut by_kind = BTreeMap::new();
        let mut total_calls = 0;
        let mut total_tokens = 0;
        let mut total_cost_usd = 0.0;

        for kind in CallKind::ALL {
            let counters = &self.counters[kind.slot()];
            let tokens_in = counters.tokens_in.load(Ordering::Relaxed);
            let tokens_out = counters.tokens_out.load(Ordering::Relaxed);
            let usage = KindUsage {
                calls: counters.calls.load(Ordering::Relaxed),
                failures: counters.failures.load(Ordering::Relaxed),
                tokens_in,
                tokens_out,
                cost_usd: self.rates.rate(kind).cost(tokens_in, tokens_out),
            };

            total_calls += usage.calls;
            total_tokens += tokens_in + tokens_out;
            total_cost_usd += usage.cost_usd;
            by_kind.insert(kind, usage);
        }

        UsageRecord {
            by_kind,
            total_calls,
            total_tokens,
            total_cost_usd,
        }
    }
}

impl Default for UsageLedger {
    fn default() -> Self {
        Self::new(RateTable::default())
    }
}
