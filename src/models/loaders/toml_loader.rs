use crate::models::job::JobId;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tokio::fs;

/// 任务清单文件
///
/// ```toml
/// jobs = ["1024", "1025", "1031"]
/// ```
#[derive(Debug, Deserialize)]
struct JobsFile {
    #[serde(default)]
    jobs: Vec<JobId>,
}

/// 从 TOML 文件加载任务ID列表（保持文件中的顺序）
pub async fn load_job_ids(toml_file_path: &Path) -> Result<Vec<JobId>> {
    if !toml_file_path.exists() {
        anyhow::bail!("任务清单不存在: {}", toml_file_path.display());
    }

    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取TOML文件: {}", toml_file_path.display()))?;

    let ids = parse_job_ids(&content)
        .with_context(|| format!("无法解析TOML文件: {}", toml_file_path.display()))?;

    tracing::info!(
        "从 {} 加载了 {} 个任务",
        toml_file_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy(),
        ids.len()
    );

    Ok(ids)
}

/// 解析任务清单内容，去掉空白ID
pub fn parse_job_ids(content: &str) -> Result<Vec<JobId>> {
    let file: JobsFile = toml::from_str(content)?;
    let ids = file
        .jobs
        .into_iter()
        .map(|id| JobId::new(id.as_str().trim()))
        .filter(|id| !id.as_str().is_empty())
        .collect();
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_job_ids_keeps_order() {
        let ids = parse_job_ids(r#"jobs = ["C", "A", " B "]"#).unwrap();
        assert_eq!(ids, vec![JobId::new("C"), JobId::new("A"), JobId::new("B")]);
    }

    #[test]
    fn test_parse_job_ids_skips_blank_entries() {
        let ids = parse_job_ids(r#"jobs = ["", "  ", "7"]"#).unwrap();
        assert_eq!(ids, vec![JobId::new("7")]);
    }

    #[test]
    fn test_parse_job_ids_empty_file() {
        assert!(parse_job_ids("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_job_ids_invalid_toml() {
        assert!(parse_job_ids("jobs = [").is_err());
    }

    #[tokio::test]
    async fn test_load_job_ids_missing_file() {
        let result = load_job_ids(Path::new("definitely/not/here/jobs.toml")).await;
        assert!(result.is_err());
    }
}
