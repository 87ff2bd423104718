//! 工作上下文流程 - 流程层
//!
//! 核心职责：定义"一个任务"在工作上下文中的完整生命周期
//!
//! 流程顺序：
//! 1. 获取通道 → 在通道内打开工作上下文
//! 2. 等待就绪（内层安全超时）或提前关闭
//! 3. 移除监听 → 派发运行指令
//! 4. 等待关联表送来的结果
//! 5. 关闭工作上下文（任何出口都只关闭一次）

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::error::{JobError, TimeoutStage};
use crate::infrastructure::{ContextEvent, ContextId, RunCommand, WorkerHost, WorkerLane};
use crate::models::{Job, JobId, JobOutcome, ScrapeResult};

/// 工作上下文流程
///
/// - 维护活动上下文集合（上下文 → 任务）
/// - 不持有通道，通道由调用方传入
/// - 不关心批次，只处理单个任务
pub struct WorkerFlow {
    host: Arc<dyn WorkerHost>,
    safety_timeout: Duration,
    active: Mutex<HashMap<ContextId, JobId>>,
}

impl WorkerFlow {
    pub fn new(host: Arc<dyn WorkerHost>, safety_timeout: Duration) -> Self {
        Self {
            host,
            safety_timeout,
            active: Mutex::new(HashMap::new()),
        }
    }

    /// 执行单个任务
    ///
    /// 返回值只在关联结果到达后产生，派发成功本身不代表任务完成
    pub async fn run_job(
        &self,
        lane: &WorkerLane,
        job: &Job,
        completion: oneshot::Receiver<JobOutcome>,
    ) -> Result<ScrapeResult, JobError> {
        let lane_id = lane.acquire().await?;

        let opened = self
            .host
            .open_context(&lane_id, &job.target_url)
            .await
            .map_err(|e| JobError::context_creation_failed(&job.target_url, e))?;
        self.active.lock().insert(opened.id.clone(), job.id.clone());
        debug!("{} 工作上下文已打开: {}", job, opened.id);

        let mut lease = ContextLease {
            flow: self,
            id: opened.id,
            events: Some(opened.events),
        };

        let result = lease.drive(job, completion).await;
        lease.close().await;
        result
    }

    /// 关闭某个任务遗留的所有上下文（外层超时后调用）
    pub async fn reclaim(&self, job_id: &JobId) -> usize {
        let orphans: Vec<ContextId> = self
            .active
            .lock()
            .iter()
            .filter(|(_, owner)| *owner == job_id)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &orphans {
            warn!("⚠️ 回收任务 {} 遗留的工作上下文 {}", job_id, id);
            self.close_context(id).await;
        }
        orphans.len()
    }

    /// 关闭所有活动上下文（批次结束时调用）
    pub async fn reclaim_all(&self) -> usize {
        let orphans: Vec<ContextId> = self.active.lock().keys().cloned().collect();
        for id in &orphans {
            self.close_context(id).await;
        }
        orphans.len()
    }

    /// 当前活动的上下文数量
    pub fn active_contexts(&self) -> usize {
        self.active.lock().len()
    }

    /// 幂等关闭：只有仍在活动集合中的上下文才会真正调用宿主
    async fn close_context(&self, id: &ContextId) {
        let was_active = self.active.lock().remove(id).is_some();
        if !was_active {
            return;
        }

        if let Err(e) = self.host.close_context(id).await {
            debug!("关闭工作上下文 {} 失败（可能已被关闭）: {}", id, e);
        }
    }

    /// 上下文已被外部关闭，只需移出活动集合
    fn forget_context(&self, id: &ContextId) {
        self.active.lock().remove(id);
    }
}

/// 单个任务对工作上下文的占用
struct ContextLease<'a> {
    flow: &'a WorkerFlow,
    id: ContextId,
    events: Option<mpsc::UnboundedReceiver<ContextEvent>>,
}

impl ContextLease<'_> {
    async fn drive(
        &mut self,
        job: &Job,
        completion: oneshot::Receiver<JobOutcome>,
    ) -> Result<ScrapeResult, JobError> {
        self.await_ready().await?;
        self.detach_listeners();

        let command = RunCommand {
            job_id: job.id.clone(),
        };
        self.flow
            .host
            .dispatch(&self.id, &command)
            .await
            .map_err(JobError::dispatch_failed)?;
        info!("{} 📤 运行指令已派发，等待结果", job);

        match completion.await {
            Ok(JobOutcome::Success(result)) => Ok(result),
            Ok(JobOutcome::Failure { reason }) => Err(JobError::ExtractionFailed { reason }),
            Ok(JobOutcome::Timeout) => Err(JobError::JobTimeout {
                stage: TimeoutStage::JobResult,
                after: (chrono::Local::now() - job.created_at)
                    .to_std()
                    .unwrap_or_default(),
            }),
            Err(_) => Err(JobError::Cancelled {
                reason: "关联表已丢弃该任务".to_string(),
            }),
        }
    }

    async fn await_ready(&mut self) -> Result<(), JobError> {
        let Some(events) = self.events.as_mut() else {
            return Ok(());
        };

        let wait = async {
            match events.recv().await {
                Some(ContextEvent::Ready) => Ok(()),
                Some(ContextEvent::Removed) | None => Err(JobError::ContextClosedPrematurely),
            }
        };

        let result = match tokio::time::timeout(self.flow.safety_timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(JobError::JobTimeout {
                stage: TimeoutStage::ContextReady,
                after: self.flow.safety_timeout,
            }),
        };

        if matches!(result, Err(JobError::ContextClosedPrematurely)) {
            self.flow.forget_context(&self.id);
        }
        result
    }

    /// 移除监听；重复调用无副作用
    fn detach_listeners(&mut self) {
        self.events.take();
    }

    async fn close(&mut self) {
        self.detach_listeners();
        self.flow.close_context(&self.id).await;
    }
}
