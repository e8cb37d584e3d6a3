//! 评分引擎
//!
//! 纯函数：相同的 `LeadResult` 永远得到相同的 `ScoreRecord`，不做任何 I/O。

use serde::Serialize;
use std::cmp::Ordering;

use crate::models::LeadResult;
use crate::scoring::rubric::{
    documentation_subscore, popularity_subscore, sentiment_subscore, time_to_value_subscore,
    Factor,
};

/// 单个因子的贡献
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactorScore {
    pub factor: Factor,
    /// [0, 1]，缺失时为空
    pub subscore: Option<f64>,
    /// 重新分配后的实际权重，缺失时为 0
    pub weight: f64,
    /// 对最终得分（0-100）的贡献
    pub points: f64,
}

/// 哪些因子有真实数据
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Completeness {
    pub popularity: bool,
    pub documentation: bool,
    pub time_to_value: bool,
    pub sentiment: bool,
}

impl Completeness {
    pub fn contains(&self, factor: Factor) -> bool {
        match factor {
            Factor::Popularity => self.popularity,
            Factor::Documentation => self.documentation,
            Factor::TimeToValue => self.time_to_value,
            Factor::Sentiment => self.sentiment,
        }
    }

    pub fn is_full(&self) -> bool {
        Factor::ALL.iter().all(|f| self.contains(*f))
    }

    /// 例如 `热度+文档质量`
    pub fn describe(&self) -> String {
        Factor::ALL
            .iter()
            .filter(|f| self.contains(**f))
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join("+")
    }
}

/// 评分记录，创建后不可变
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreRecord {
    pub id: String,
    /// 0-100，保留两位小数
    pub score: f64,
    pub factors: Vec<FactorScore>,
    pub completeness: Completeness,
    pub rationale: Vec<String>,
}

impl ScoreRecord {
    pub fn factor(&self, factor: Factor) -> Option<&FactorScore> {
        self.factors.iter().find(|f| f.factor == factor)
    }
}

/// 为单个线索打分
pub fn score(lead: &LeadResult) -> ScoreRecord {
    let documentation = lead.documentation.as_ref();
    let sentiment = lead.sentiment.as_ref();

    let subscores: Vec<(Factor, Option<f64>)> = vec![
        (
            Factor::Popularity,
            Some(popularity_subscore(lead.candidate.stars)),
        ),
        (
            Factor::Documentation,
            documentation.map(|d| documentation_subscore(d.clarity_score)),
        ),
        (
            Factor::TimeToValue,
            documentation
                .and_then(|d| d.time_to_value_minutes)
                .map(time_to_value_subscore),
        ),
        (
            Factor::Sentiment,
            sentiment.map(|s| sentiment_subscore(s.polarity)),
        ),
    ];

    // 在场因子的基础权重之和，用于按比例重新分配
    let present_weight: f64 = subscores
        .iter()
        .filter(|(_, s)| s.is_some())
        .map(|(f, _)| f.base_weight())
        .sum();

    let factors: Vec<FactorScore> = subscores
        .into_iter()
        .map(|(factor, subscore)| {
            let weight = match subscore {
                Some(_) if present_weight > 0.0 => factor.base_weight() / present_weight,
                _ => 0.0,
            };
            FactorScore {
                factor,
                subscore,
                weight,
                points: subscore.map_or(0.0, |s| 100.0 * weight * s),
            }
        })
        .collect();

    let total: f64 = factors.iter().map(|f| f.points).sum();

    let completeness = Completeness {
        popularity: true,
        documentation: documentation.is_some(),
        time_to_value: factors
            .iter()
            .any(|f| f.factor == Factor::TimeToValue && f.subscore.is_some()),
        sentiment: sentiment.is_some(),
    };

    let rationale = build_rationale(lead, &factors);

    ScoreRecord {
        id: lead.candidate.id.clone(),
        score: round2(total.clamp(0.0, 100.0)),
        factors,
        completeness,
        rationale,
    }
}

/// 按得分降序排序，同分按 id 升序
pub fn rank(mut records: Vec<ScoreRecord>) -> Vec<ScoreRecord> {
    records.sort_by(compare_ranked);
    records
}

fn compare_ranked(a: &ScoreRecord, b: &ScoreRecord) -> Ordering {
    b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn build_rationale(lead: &LeadResult, factors: &[FactorScore]) -> Vec<String> {
    let mut lines = Vec::new();

    for factor in factors {
        let line = match factor.subscore {
            Some(subscore) => format!(
                "{}: {:.2} × 权重 {:.2} = {:.2} 分",
                factor.factor, subscore, factor.weight, factor.points
            ),
            None => format!("{}: 无数据, 权重已按比例分配给其他因子", factor.factor),
        };
        lines.push(line);
    }

    lines.push(format!("星标数: {}", lead.candidate.stars));

    if let Some(doc) = &lead.documentation {
        lines.push(format!(
            "问题: {} ({})",
            doc.problem_summary, doc.classification
        ));
        if let Some(minutes) = doc.time_to_value_minutes {
            lines.push(format!("预计 {} 分钟见效", minutes));
        }
        if let Some(ease) = doc.adoption_ease_score {
            lines.push(format!("上手难易度: {}/10", ease));
        }
        if let Some(maturity) = doc.maturity_health_score {
            lines.push(format!("成熟度: {}/10", maturity));
        }
    } else if let Some(reason) = &lead.documentation_failure {
        lines.push(format!("文档分析缺失: {}", reason));
    }

    if let Some(sentiment) = &lead.sentiment {
        if let Some(quote) = sentiment.quotes.first() {
            lines.push(format!("代表性评价: \"{}\"", quote));
        }
        if let Some(criticism) = sentiment.criticisms.first() {
            lines.push(format!("主要批评: {}", criticism));
        }
        if let Some(excitement) = sentiment.excitement_score {
            lines.push(format!("社区热情: {}/10", excitement));
        }
    } else if let Some(reason) = &lead.sentiment_failure {
        lines.push(format!("情感分析缺失: {}", reason));
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureReason;
    use crate::models::{Candidate, Classification, DocumentationAnalysis, SentimentAnalysis};
    use crate::scoring::rubric::STAR_CEILING;

    fn documentation(clarity: u8, minutes: Option<u32>) -> DocumentationAnalysis {
        DocumentationAnalysis {
            clarity_score: clarity,
            problem_summary: "Makes builds fast".to_string(),
            time_to_value_minutes: minutes,
            classification: Classification::Painkiller,
            adoption_ease_score: None,
            maturity_health_score: None,
        }
    }

    fn sentiment(polarity: f64) -> SentimentAnalysis {
        SentimentAnalysis {
            polarity,
            magnitude: 0.5,
            quotes: vec!["love it".to_string()],
            criticisms: vec![],
            excitement_score: Some(8),
            problem_solution_fit_score: None,
            credibility_score: None,
        }
    }

    #[test]
    fn test_popularity_only_scores_by_popularity_alone() {
        let lead = LeadResult::bare(Candidate::new("a/b", 1_000));
        let record = score(&lead);

        let expected = round2(100.0 * popularity_subscore(1_000));
        assert_eq!(record.score, expected);
        assert_eq!(record.factor(Factor::Popularity).unwrap().weight, 1.0);
        assert!(!record.completeness.documentation);
        assert!(!record.completeness.sentiment);
    }

    #[test]
    fn test_failed_analyses_not_penalised_below_bare_lead() {
        let bare = score(&LeadResult::bare(Candidate::new("a/bare", 5_000)));
        let failed = score(&LeadResult::crashed(Candidate::new("a/failed", 5_000), "boom"));
        assert_eq!(bare.score, failed.score);
    }

    #[test]
    fn test_full_lead_uses_base_weights() {
        let lead = LeadResult::complete(
            Candidate::new("a/b", STAR_CEILING),
            documentation(10, Some(30)),
            sentiment(1.0),
        );
        let record = score(&lead);

        // 1.0*0.30 + 1.0*0.25 + 0.5*0.20 + 1.0*0.25 = 0.90
        assert_eq!(record.score, 90.0);
        assert!(record.completeness.is_full());
        let weights: f64 = record.factors.iter().map(|f| f.weight).sum();
        assert!((weights - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_missing_time_estimate_redistributes_only_that_factor() {
        let mut lead = LeadResult::bare(Candidate::new("a/b", 10));
        lead.documentation = Some(documentation(5, None));
        let record = score(&lead);

        assert!(record.completeness.documentation);
        assert!(!record.completeness.time_to_value);
        let doc_weight = record.factor(Factor::Documentation).unwrap().weight;
        assert!((doc_weight - 0.25 / 0.55).abs() < 1e-12);
    }

    #[test]
    fn test_score_is_deterministic() {
        let lead = LeadResult::complete(
            Candidate::new("a/b", 12_345),
            documentation(7, Some(12)),
            sentiment(0.3),
        );

        let first = score(&lead);
        let second = score(&lead);
        assert_eq!(first, second);
        assert_eq!(first.score.to_bits(), second.score.to_bits());
    }

    #[test]
    fn test_rationale_mentions_missing_factor_reason() {
        let mut lead = LeadResult::bare(Candidate::new("a/b", 10));
        lead.sentiment_failure = Some(FailureReason::Cancelled);
        let record = score(&lead);
        assert!(record.rationale.iter().any(|l| l.contains("情感分析缺失")));
        assert!(record
            .rationale
            .iter()
            .any(|l| l.starts_with("社区情感: 无数据")));
    }

    #[test]
    fn test_rank_orders_by_score_then_id() {
        let records = vec![
            score(&LeadResult::bare(Candidate::new("b/tie", 100))),
            score(&LeadResult::bare(Candidate::new("z/top", 90_000))),
            score(&LeadResult::bare(Candidate::new("a/tie", 100))),
        ];
        let ranked = rank(records);
        let ids: Vec<&str> = ranked.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["z/top", "a/tie", "b/tie"]);
    }
}
