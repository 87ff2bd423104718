//! 任务关联表 - 编排层
//!
//! 任务ID → 等待中的完成通道。每个条目只会被结算一次，结算后立即删除；
//! 表的大小始终等于正在进行的任务数。

use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::JobError;
use crate::models::{JobId, JobOutcome, ResultEvent};

/// 任务关联表
#[derive(Debug, Default)]
pub struct CorrelationTable {
    pending: Mutex<HashMap<JobId, oneshot::Sender<JobOutcome>>>,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一个进行中的任务，返回等待结果的接收端
    pub fn register(&self, job_id: &JobId) -> Result<oneshot::Receiver<JobOutcome>, JobError> {
        let mut pending = self.pending.lock();
        if pending.contains_key(job_id) {
            return Err(JobError::DuplicateJob {
                job_id: job_id.clone(),
            });
        }

        let (tx, rx) = oneshot::channel();
        pending.insert(job_id.clone(), tx);
        Ok(rx)
    }

    /// 结算任务并删除条目
    ///
    /// 条目不存在时（超时后迟到的结果、重复事件）记录日志后丢弃，返回 false
    pub fn settle(&self, job_id: &JobId, outcome: JobOutcome) -> bool {
        let Some(tx) = self.pending.lock().remove(job_id) else {
            warn!("⚠️ 任务 {} 不在关联表中，丢弃结果事件", job_id);
            return false;
        };

        if tx.send(outcome).is_err() {
            debug!("任务 {} 的等待方已退出", job_id);
        }
        true
    }

    /// 静默删除条目，用于任务未经结果事件就结束的情况
    pub fn discard(&self, job_id: &JobId) -> bool {
        self.pending.lock().remove(job_id).is_some()
    }

    /// 以同一原因拒绝所有等待中的任务并清空表
    pub fn cancel_all(&self, reason: &str) -> usize {
        let drained: Vec<_> = self.pending.lock().drain().collect();
        let count = drained.len();

        for (job_id, tx) in drained {
            debug!("取消任务 {}: {}", job_id, reason);
            let _ = tx.send(JobOutcome::failure(reason));
        }
        count
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    pub fn contains(&self, job_id: &JobId) -> bool {
        self.pending.lock().contains_key(job_id)
    }

    /// 驱动 `work` 直到完成，期间把结果总线上的事件路由到 `settle`
    ///
    /// 结果总线关闭后不再路由，`work` 只能靠自身的超时结束
    pub async fn pump<F: Future>(
        &self,
        work: F,
        results: &mut broadcast::Receiver<ResultEvent>,
    ) -> F::Output {
        tokio::pin!(work);
        let mut bus_open = true;

        loop {
            tokio::select! {
                output = &mut work => return output,
                event = results.recv(), if bus_open => match event {
                    Ok(event) => {
                        self.settle(&event.job_id, event.outcome);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("⚠️ 结果总线积压，丢失 {} 个事件", skipped);
                    }
                    Err(RecvError::Closed) => {
                        warn!("⚠️ 结果总线已关闭");
                        bus_open = false;
                    }
                },
            }
        }
    }
}
