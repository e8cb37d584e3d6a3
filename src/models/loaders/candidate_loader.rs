use crate::error::{AppError, AppResult, FileError};
use crate::models::candidate::Candidate;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tokio::fs;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct CandidateFile {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

/// 从候选文件加载候选列表
///
/// 支持 TOML（`[[candidates]]` 数组）和 JSON（顶层数组）两种格式，按扩展名区分。
/// 结果按 id 去重，保留首次出现的记录。
pub async fn load_candidates(path: &Path) -> AppResult<Vec<Candidate>> {
    let path_text = path.display().to_string();
    if !path.exists() {
        return Err(FileError::NotFound { path: path_text }.into());
    }

    let content = fs::read_to_string(path)
        .await
        .map_err(|e| AppError::file_read_failed(&path_text, e))?;

    let is_json = path.extension().and_then(|s| s.to_str()) == Some("json");
    let candidates = parse_candidates(&content, is_json).map_err(|e| match e {
        AppError::File(FileError::TomlParseFailed { source, .. }) => {
            AppError::File(FileError::TomlParseFailed {
                path: path_text.clone(),
                source,
            })
        }
        other => other,
    })?;

    info!("✓ 从 {} 加载 {} 个候选仓库", path_text, candidates.len());
    Ok(candidates)
}

/// 解析候选文件内容
pub fn parse_candidates(content: &str, is_json: bool) -> AppResult<Vec<Candidate>> {
    let parsed: Vec<Candidate> = if is_json {
        serde_json::from_str(content)?
    } else {
        toml::from_str::<CandidateFile>(content)
            .map_err(|source| FileError::TomlParseFailed {
                path: String::new(),
                source,
            })?
            .candidates
    };

    let valid: Vec<Candidate> = parsed
        .into_iter()
        .filter(|candidate| {
            let ok = candidate.has_valid_id();
            if !ok {
                warn!("跳过无效的仓库标识: '{}'", candidate.id);
            }
            ok
        })
        .collect();

    Ok(dedup_candidates(valid))
}

/// 按 id 去重（大小写不敏感），保留首次出现的记录并保持原有顺序
pub fn dedup_candidates(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    let total = candidates.len();
    let unique: Vec<Candidate> = candidates
        .into_iter()
        .filter(|candidate| seen.insert(candidate.id.to_lowercase()))
        .collect();

    if unique.len() < total {
        warn!("去除了 {} 个重复候选", total - unique.len());
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_toml_candidates() {
        let content = r#"
[[candidates]]
id = "astral-sh/uv"
stars = 42000
collections = ["python", "devtools"]

[[candidates]]
id = "tauri-apps/tauri"
stars = "85,000"
description = "Desktop apps with web frontends"
"#;
        let candidates = parse_candidates(content, false).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].collections, vec!["python", "devtools"]);
        assert_eq!(candidates[1].stars, 85_000);
    }

    #[test]
    fn test_parse_json_candidates_skips_invalid_ids() {
        let content = r#"[
            {"id": "a/b", "stars": 1},
            {"id": "broken", "stars": 2}
        ]"#;
        let candidates = parse_candidates(content, true).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, "a/b");
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let candidates = vec![
            Candidate::new("Owner/Repo", 10),
            Candidate::new("other/repo", 5),
            Candidate::new("owner/repo", 99),
        ];
        let unique = dedup_candidates(candidates);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].stars, 10);
        assert_eq!(unique[1].id, "other/repo");
    }

    #[test]
    fn test_bad_toml_reports_parse_error() {
        let err = parse_candidates("[[candidates]\nid =", false).unwrap_err();
        assert!(matches!(
            err,
            AppError::File(FileError::TomlParseFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let err = load_candidates(Path::new("definitely/missing/candidates.toml"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::File(FileError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_bad_toml_file_reports_its_path() {
        let path = std::env::temp_dir().join(format!("lead_scout_bad_{}.toml", std::process::id()));
        tokio::fs::write(&path, "[[candidates]\nid =").await.unwrap();

        let err = load_candidates(&path).await.unwrap_err();
        let _ = tokio::fs::remove_file(&path).await;

        match err {
            AppError::File(FileError::TomlParseFailed { path: reported, .. }) => {
                assert_eq!(reported, path.display().to_string());
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
