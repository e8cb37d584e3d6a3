//! 评分层
//!
//! - `rubric` - 因子定义、基础权重和归一化常量
//! - `engine` - 纯函数打分与排序

pub mod engine;
pub mod rubric;

pub use engine::{rank, score, Completeness, FactorScore, ScoreRecord};
pub use rubric::Factor;
