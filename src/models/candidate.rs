use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// 候选仓库（线索）
///
/// 由发现源产出后不再修改，是流水线的输入。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// `owner/name`
    pub id: String,
    #[serde(deserialize_with = "deserialize_stars")]
    pub stars: u64,
    /// 所属集合标签
    #[serde(default)]
    pub collections: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// 发现源给出的趋势分
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_score: Option<f64>,
    /// 发现源的原始元数据
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Candidate {
    pub fn new(id: impl Into<String>, stars: u64) -> Self {
        Self {
            id: id.into(),
            stars,
            collections: Vec::new(),
            description: None,
            total_score: None,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn owner(&self) -> &str {
        self.id.split_once('/').map(|(owner, _)| owner).unwrap_or("")
    }

    pub fn name(&self) -> &str {
        self.id
            .split_once('/')
            .map(|(_, name)| name)
            .unwrap_or(&self.id)
    }

    /// `owner/name` 两段都非空
    pub fn has_valid_id(&self) -> bool {
        match self.id.split_once('/') {
            Some((owner, name)) => !owner.is_empty() && !name.is_empty() && !name.contains('/'),
            None => false,
        }
    }
}

impl Display for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (⭐ {})", self.id, self.stars)
    }
}

// 发现源导出的星标数有时是带千分位的字符串
fn deserialize_stars<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Visitor;
    use std::fmt;

    struct StarsVisitor;

    impl<'de> Visitor<'de> for StarsVisitor {
        type Value = u64;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a non-negative integer or a numeric string")
        }

        fn visit_u64<E>(self, value: u64) -> Result<u64, E>
        where
            E: serde::de::Error,
        {
            Ok(value)
        }

        fn visit_i64<E>(self, value: i64) -> Result<u64, E>
        where
            E: serde::de::Error,
        {
            u64::try_from(value).map_err(|_| E::custom(format!("负数星标: {}", value)))
        }

        fn visit_str<E>(self, value: &str) -> Result<u64, E>
        where
            E: serde::de::Error,
        {
            let digits: String = value.chars().filter(|c| *c != ',' && *c != '_').collect();
            digits
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("无法解析星标数: {}", value)))
        }
    }

    deserializer.deserialize_any(StarsVisitor)
}
