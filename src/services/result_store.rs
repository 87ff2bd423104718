//! 结果存储服务 - 业务能力层
//!
//! 只负责"保存一个任务的结果"能力，不关心批次流程。
//! 保存是旁路操作：失败只记录日志，不影响任务结算。

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Local;
use serde::Serialize;
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;

use crate::models::{JobId, ScrapeResult};

/// 结果存储
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn persist(&self, job_id: &JobId, result: &ScrapeResult) -> Result<()>;
}

/// 写入文件的结果记录
#[derive(Debug, Serialize)]
struct StoredResult<'a> {
    job_id: &'a JobId,
    saved_at: String,
    #[serde(flatten)]
    result: &'a ScrapeResult,
}

/// JSON 文件存储
///
/// 每个任务一个文件：`<dir>/<job_id>.json`
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// 创建新的文件存储
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// 任务结果的文件路径，ID 中的非法字符替换为下划线
    pub fn path_for(&self, job_id: &JobId) -> PathBuf {
        let file_name: String = job_id
            .as_str()
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", file_name))
    }
}

#[async_trait]
impl ResultStore for JsonFileStore {
    async fn persist(&self, job_id: &JobId, result: &ScrapeResult) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("无法创建结果目录: {}", self.dir.display()))?;

        let record = StoredResult {
            job_id,
            saved_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            result,
        };
        let content = serde_json::to_string_pretty(&record)?;

        let path = self.path_for(job_id);
        fs::write(&path, content)
            .await
            .with_context(|| format!("无法写入结果文件: {}", path.display()))?;

        debug!(
            "写入结果: 任务 {} | 记录 {} 条 | 分节 {} 个",
            job_id,
            result.records.len(),
            result.sections.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value as JsonValue};

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "scrape_batch_runner_{}_{}",
            name,
            std::process::id()
        ))
    }

    #[test]
    fn test_path_for_sanitizes_id() {
        let store = JsonFileStore::new("out");
        assert_eq!(
            store.path_for(&JobId::new("a/b:c")),
            PathBuf::from("out").join("a_b_c.json")
        );
    }

    #[tokio::test]
    async fn test_persist_writes_json_file() {
        let dir = temp_dir("persist");
        let store = JsonFileStore::new(&dir);
        let result = ScrapeResult {
            records: vec![json!(["row", 1])],
            sections: vec![json!("Summary")],
        };

        store.persist(&JobId::new("42"), &result).await.unwrap();

        let content = tokio::fs::read_to_string(store.path_for(&JobId::new("42")))
            .await
            .unwrap();
        let value: JsonValue = serde_json::from_str(&content).unwrap();
        assert_eq!(value["job_id"], json!("42"));
        assert_eq!(value["records"], json!([["row", 1]]));
        assert_eq!(value["sections"], json!(["Summary"]));
        assert!(value["saved_at"].is_string());

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
