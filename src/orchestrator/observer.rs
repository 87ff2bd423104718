//! 批次观察者
//!
//! 编排器在固定的时间点同步通知所有观察者：
//! 批次开始 → 每个任务结束 → 批次完成（或中止）

use crate::error::{BatchError, JobError};
use crate::models::{BatchSummary, JobId};
use crate::utils::logging;

/// 单个任务结束时的进度
#[derive(Debug, Clone)]
pub struct JobProgress<'a> {
    /// 从 1 开始
    pub index: usize,
    pub total: usize,
    pub job_id: &'a JobId,
    /// 成功时为 None
    pub error: Option<&'a JobError>,
}

/// 批次观察者，所有方法默认什么也不做
pub trait BatchObserver: Send + Sync {
    fn on_batch_start(&self, _job_ids: &[JobId]) {}

    fn on_job_settled(&self, _progress: &JobProgress<'_>) {}

    fn on_batch_complete(&self, _summary: &BatchSummary) {}

    fn on_batch_aborted(&self, _error: &BatchError) {}
}

/// 把批次事件写入日志
#[derive(Debug, Default)]
pub struct LoggingObserver;

impl BatchObserver for LoggingObserver {
    fn on_batch_start(&self, job_ids: &[JobId]) {
        logging::log_batch_start(job_ids.len());
    }

    fn on_job_settled(&self, progress: &JobProgress<'_>) {
        let reason = progress.error.map(|e| e.to_string());
        logging::log_job_settled(
            progress.index,
            progress.total,
            progress.job_id.as_str(),
            reason.as_deref(),
        );
    }

    fn on_batch_complete(&self, summary: &BatchSummary) {
        logging::log_batch_complete(summary);
    }

    fn on_batch_aborted(&self, error: &BatchError) {
        tracing::error!("🛑 批次中止: {}", error);
    }
}
