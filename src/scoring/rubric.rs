//! 评分细则
//!
//! 四个因子各自映射到 [0, 1]。基础权重合计为 1；缺失因子的权重按比例分给在场因子。

use serde::Serialize;
use std::fmt::Display;

/// 星标数归一化上限，超过即视为满分
pub const STAR_CEILING: u64 = 100_000;

/// 上手时间的半衰点：等于该分钟数时得 0.5
pub const TIME_TO_VALUE_PIVOT_MINUTES: f64 = 30.0;

pub const POPULARITY_WEIGHT: f64 = 0.30;
pub const DOCUMENTATION_WEIGHT: f64 = 0.25;
pub const TIME_TO_VALUE_WEIGHT: f64 = 0.20;
pub const SENTIMENT_WEIGHT: f64 = 0.25;

/// 评分因子
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Factor {
    Popularity,
    Documentation,
    TimeToValue,
    Sentiment,
}

impl Factor {
    pub const ALL: [Factor; 4] = [
        Factor::Popularity,
        Factor::Documentation,
        Factor::TimeToValue,
        Factor::Sentiment,
    ];

    pub fn base_weight(self) -> f64 {
        match self {
            Factor::Popularity => POPULARITY_WEIGHT,
            Factor::Documentation => DOCUMENTATION_WEIGHT,
            Factor::TimeToValue => TIME_TO_VALUE_WEIGHT,
            Factor::Sentiment => SENTIMENT_WEIGHT,
        }
    }
}

impl Display for Factor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Factor::Popularity => write!(f, "热度"),
            Factor::Documentation => write!(f, "文档质量"),
            Factor::TimeToValue => write!(f, "上手时间"),
            Factor::Sentiment => write!(f, "社区情感"),
        }
    }
}

/// 星标数的对数归一化
pub fn popularity_subscore(stars: u64) -> f64 {
    let scaled = (1.0 + stars as f64).ln() / (1.0 + STAR_CEILING as f64).ln();
    scaled.clamp(0.0, 1.0)
}

/// 清晰度 1-10 线性映射到 [0, 1]
pub fn documentation_subscore(clarity_score: u8) -> f64 {
    ((f64::from(clarity_score) - 1.0) / 9.0).clamp(0.0, 1.0)
}

/// 上手时间越短越好：`1 / (1 + minutes / pivot)`
pub fn time_to_value_subscore(minutes: u32) -> f64 {
    1.0 / (1.0 + f64::from(minutes) / TIME_TO_VALUE_PIVOT_MINUTES)
}

/// 极性 [-1, 1] 映射到 [0, 1]
pub fn sentiment_subscore(polarity: f64) -> f64 {
    ((polarity + 1.0) / 2.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_weights_sum_to_one() {
        let total: f64 = Factor::ALL.iter().map(|f| f.base_weight()).sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_popularity_is_log_scaled_and_capped() {
        assert_eq!(popularity_subscore(0), 0.0);
        assert!((popularity_subscore(STAR_CEILING) - 1.0).abs() < 1e-12);
        assert_eq!(popularity_subscore(STAR_CEILING * 10), 1.0);
        // 对数尺度：1000 星大约在 0.6
        let mid = popularity_subscore(1_000);
        assert!(mid > 0.55 && mid < 0.65);
        assert!(popularity_subscore(1_001) > mid);
    }

    #[test]
    fn test_subscore_ranges() {
        assert_eq!(documentation_subscore(1), 0.0);
        assert_eq!(documentation_subscore(10), 1.0);
        assert!((time_to_value_subscore(30) - 0.5).abs() < 1e-12);
        assert!(time_to_value_subscore(5) > time_to_value_subscore(60));
        assert_eq!(sentiment_subscore(-1.0), 0.0);
        assert_eq!(sentiment_subscore(0.0), 0.5);
        assert_eq!(sentiment_subscore(1.0), 1.0);
    }
}
