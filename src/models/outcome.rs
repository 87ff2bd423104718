//! 任务结果模型
//!
//! 页面内脚本通过绑定函数回传 JSON，宿主把它转换成 `ResultEvent`，
//! 关联表再把其中的 `JobOutcome` 交给等待中的任务。

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;

use crate::error::JobError;
use crate::models::job::JobId;

/// 提取脚本产出的页面数据
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrapeResult {
    #[serde(default)]
    pub records: Vec<JsonValue>,
    #[serde(default)]
    pub sections: Vec<JsonValue>,
}

/// 任务的终态
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// 页面回传了结果
    Success(ScrapeResult),
    /// 页面回传了错误，或任务被取消
    Failure { reason: String },
    /// 超时
    Timeout,
}

impl JobOutcome {
    pub fn failure(reason: impl Into<String>) -> Self {
        JobOutcome::Failure {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Success(_))
    }
}

/// 宿主发出的异步结果事件
#[derive(Debug, Clone, PartialEq)]
pub struct ResultEvent {
    pub job_id: JobId,
    pub outcome: JobOutcome,
}

impl ResultEvent {
    pub fn success(job_id: impl Into<JobId>, result: ScrapeResult) -> Self {
        Self {
            job_id: job_id.into(),
            outcome: JobOutcome::Success(result),
        }
    }

    pub fn failure(job_id: impl Into<JobId>, reason: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            outcome: JobOutcome::failure(reason),
        }
    }
}

/// 页面脚本回传的消息格式
///
/// ```json
/// {"type": "results", "job_id": "42", "records": [], "sections": []}
/// {"type": "error", "job_id": "42", "reason": "no table"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResultMessage {
    Results {
        job_id: JobId,
        #[serde(default)]
        records: Vec<JsonValue>,
        #[serde(default)]
        sections: Vec<JsonValue>,
    },
    Error {
        job_id: JobId,
        reason: String,
    },
}

impl From<ResultMessage> for ResultEvent {
    fn from(message: ResultMessage) -> Self {
        match message {
            ResultMessage::Results {
                job_id,
                records,
                sections,
            } => ResultEvent::success(job_id, ScrapeResult { records, sections }),
            ResultMessage::Error { job_id, reason } => ResultEvent::failure(job_id, reason),
        }
    }
}

/// 失败任务及其原因
#[derive(Debug, Clone, PartialEq)]
pub struct FailedJob {
    pub job_id: JobId,
    pub error: JobError,
}

/// 批次汇总
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    pub succeeded: Vec<JobId>,
    pub failed: Vec<FailedJob>,
    pub elapsed: Duration,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn failed_ids(&self) -> Vec<&JobId> {
        self.failed.iter().map(|f| &f.job_id).collect()
    }

    /// 查找某个任务的失败原因
    pub fn failure_of(&self, job_id: &JobId) -> Option<&JobError> {
        self.failed
            .iter()
            .find(|f| &f.job_id == job_id)
            .map(|f| &f.error)
    }
}
