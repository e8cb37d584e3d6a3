//! 日志工具模块
//!
//! 提供日志初始化、格式化和输出的辅助函数

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::infrastructure::{CallKind, UsageRecord};

/// 初始化 tracing 订阅器
///
/// 优先使用 `RUST_LOG`；未设置时 `verbose` 决定 debug 还是 info。
/// 重复调用是安全的（测试中常见）。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("lead_scout={},warn", default_level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
///
/// # 参数
/// - `max_concurrent`: 在途调用上限
/// - `max_retries`: 最大重试次数
pub fn log_startup(max_concurrent: usize, max_retries: u32) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 并发线索分析模式");
    info!("📊 在途调用上限: {}", max_concurrent);
    info!("🔁 最大重试次数: {}", max_retries);
    info!("{}", "=".repeat(60));
}

/// 记录候选加载信息
pub fn log_candidates_loaded(total: usize) {
    info!("✓ 找到 {} 个待分析的候选仓库", total);
    info!("💡 所有线索同时调度，由全局限流器控制在途调用\n");
}

/// 记录单个线索排名行
///
/// # 参数
/// - `rank`: 名次（从 1 开始）
/// - `id`: 仓库标识
/// - `score`: 最终得分
/// - `factors`: 参与评分的因子描述
pub fn log_ranked_lead(rank: usize, id: &str, score: f64, factors: &str) {
    info!("{:>3}. {:<40} {:>6.2}  [{}]", rank, truncate_text(id, 40), score, factors);
}

/// 打印最终统计信息
///
/// # 参数
/// - `total`: 线索总数
/// - `usage`: 用量快照
/// - `report_path`: 报告文件路径
pub fn print_final_stats(total: usize, usage: &UsageRecord, report_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("📦 线索总数: {}", total);
    for kind in CallKind::ALL {
        let kind_usage = usage.kind(kind);
        info!(
            "{}: ✅ 成功 {} / ❌ 失败 {} | tokens {} 入 / {} 出 | ${:.4}",
            kind,
            kind_usage.calls,
            kind_usage.failures,
            kind_usage.tokens_in,
            kind_usage.tokens_out,
            kind_usage.cost_usd
        );
    }
    info!("💰 总费用: ${:.4}", usage.total_cost_usd);
    info!("{}", "=".repeat(60));
    info!("\n报告已保存至: {}", report_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text_counts_chars() {
        assert_eq!(truncate_text("短文本", 10), "短文本");
        assert_eq!(truncate_text("一二三四五", 3), "一二三...");
    }
}
