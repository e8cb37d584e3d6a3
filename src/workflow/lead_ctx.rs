//! 线索处理上下文
//!
//! 封装"我正在处理第几个线索"这一信息，只用于日志

use std::fmt::Display;

/// 线索处理上下文
#[derive(Debug, Clone)]
pub struct LeadCtx {
    /// 仓库标识
    pub id: String,

    /// 线索序号（从 1 开始，按输入顺序）
    pub lead_index: usize,

    /// 本批线索总数
    pub total: usize,
}

impl LeadCtx {
    /// 创建新的线索上下文
    pub fn new(id: impl Into<String>, lead_index: usize, total: usize) -> Self {
        Self {
            id: id.into(),
            lead_index,
            total,
        }
    }
}

impl Display for LeadCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[线索 {}/{} {}]", self.lead_index, self.total, self.id)
    }
}
