use crate::error::ConfigError;
use crate::infrastructure::usage_ledger::{CallKind, Rate, RateTable};
use std::str::FromStr;
use std::time::Duration;

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 全批次同时在途的外部调用上限（文档 + 情感合计）
    pub max_concurrent_calls: usize,
    /// 瞬时错误的最大重试次数
    pub max_retries: u32,
    /// 退避基准延迟（毫秒）
    pub retry_base_delay_ms: u64,
    /// 退避延迟上限（毫秒）
    pub retry_max_delay_ms: u64,
    /// 候选仓库列表文件（TOML）
    pub candidates_file: String,
    /// 运行报告输出文件（JSON）
    pub report_file: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    // --- 数据源 ---
    pub github_raw_base_url: String,
    pub hn_search_base_url: String,
    /// 外部 HTTP 请求超时（秒）
    pub http_timeout_secs: u64,
    // --- 费率（美元 / 1K tokens）---
    pub cost_input_per_1k: f64,
    pub cost_output_per_1k: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_calls: 16,
            max_retries: 3,
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 30_000,
            candidates_file: "candidates.toml".to_string(),
            report_file: "lead_report.json".to_string(),
            verbose_logging: false,
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o-mini".to_string(),
            github_raw_base_url: "https://raw.githubusercontent.com".to_string(),
            hn_search_base_url: "https://hn.algolia.com/api/v1".to_string(),
            http_timeout_secs: 30,
            cost_input_per_1k: 0.00015,
            cost_output_per_1k: 0.0006,
        }
    }
}

impl Config {
    /// 从环境变量加载配置，未设置的项使用默认值
    ///
    /// 设置了但无法解析的值会返回 `ConfigError`，不会被静默忽略。
    pub fn from_env() -> Result<Self, ConfigError> {
        let default = Self::default();
        Ok(Self {
            max_concurrent_calls: env_parse("MAX_CONCURRENT_CALLS", default.max_concurrent_calls)?,
            max_retries: env_parse("MAX_RETRIES", default.max_retries)?,
            retry_base_delay_ms: env_parse("RETRY_BASE_DELAY_MS", default.retry_base_delay_ms)?,
            retry_max_delay_ms: env_parse("RETRY_MAX_DELAY_MS", default.retry_max_delay_ms)?,
            candidates_file: std::env::var("CANDIDATES_FILE").unwrap_or(default.candidates_file),
            report_file: std::env::var("REPORT_FILE").unwrap_or(default.report_file),
            verbose_logging: env_parse("VERBOSE_LOGGING", default.verbose_logging)?,
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
            github_raw_base_url: std::env::var("GITHUB_RAW_BASE_URL")
                .unwrap_or(default.github_raw_base_url),
            hn_search_base_url: std::env::var("HN_SEARCH_BASE_URL")
                .unwrap_or(default.hn_search_base_url),
            http_timeout_secs: env_parse("HTTP_TIMEOUT_SECS", default.http_timeout_secs)?,
            cost_input_per_1k: env_parse("COST_INPUT_PER_1K", default.cost_input_per_1k)?,
            cost_output_per_1k: env_parse("COST_OUTPUT_PER_1K", default.cost_output_per_1k)?,
        })
    }

    /// 在发起任何调用之前检查配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm_api_key.trim().is_empty() {
            return Err(ConfigError::Missing {
                name: "LLM_API_KEY".to_string(),
            });
        }
        if self.max_concurrent_calls == 0 {
            return Err(ConfigError::Invalid {
                name: "MAX_CONCURRENT_CALLS".to_string(),
                value: "0".to_string(),
            });
        }
        if self.retry_base_delay_ms > self.retry_max_delay_ms {
            return Err(ConfigError::Invalid {
                name: "RETRY_BASE_DELAY_MS".to_string(),
                value: self.retry_base_delay_ms.to_string(),
            });
        }
        Ok(())
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_max_delay_ms)
    }

    /// 两类分析都走同一个模型，所以费率相同
    pub fn rate_table(&self) -> RateTable {
        let rate = Rate {
            input_per_1k: self.cost_input_per_1k,
            output_per_1k: self.cost_output_per_1k,
        };
        RateTable::default()
            .with_rate(CallKind::Documentation, rate)
            .with_rate(CallKind::Sentiment, rate)
    }
}

fn env_parse<T: FromStr>(var_name: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var_name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: std::any::type_name::<T>().to_string(),
            }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_requires_api_key() {
        let config = Config::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Missing { .. })
        ));

        let config = Config {
            llm_api_key: "sk-test".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let config = Config {
            llm_api_key: "sk-test".to_string(),
            max_concurrent_calls: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_rate_table_covers_both_kinds() {
        let table = Config::default().rate_table();
        assert!(table.rate(CallKind::Documentation).input_per_1k > 0.0);
        assert!(table.rate(CallKind::Sentiment).output_per_1k > 0.0);
    }
}
