//! 任务模型
//!
//! 一个 Job 描述"要抓取哪个页面"，只在所属批次运行期间存在

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 任务标识
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// 单个抓取任务
///
/// 由批次调度器在轮到该任务时创建，批次结束后随之销毁
#[derive(Debug, Clone)]
pub struct Job {
    /// 任务ID
    pub id: JobId,
    /// 目标页面地址
    pub target_url: String,
    /// 创建时间（仅用于日志）
    pub created_at: DateTime<Local>,
}

impl Job {
    /// 创建新的任务
    pub fn new(id: JobId, target_url: impl Into<String>) -> Self {
        Self {
            id,
            target_url: target_url.into(),
            created_at: Local::now(),
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[任务 #{} {}]", self.id, self.target_url)
    }
}
