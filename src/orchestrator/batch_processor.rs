//! 批次调度器 - 编排层
//!
//! ## 职责
//!
//! 接收有序的任务ID列表，逐个执行并汇总成功/失败结果。
//!
//! ## 核心功能
//!
//! 1. **严格顺序**：上一个任务结算且间隔时间过去后，才开始下一个任务
//! 2. **外层超时**：每个任务整体受 `job_timeout` 约束，超时后回收工作上下文
//! 3. **结果路由**：等待期间把结果总线上的事件交给关联表结算
//! 4. **错误降级**：单个任务的错误只记为 failed，不会中断批次
//! 5. **资源管理**：批次结束后回收上下文、释放通道
//! 6. **通知观察者**：批次开始 / 任务结束 / 批次完成
//!
//! ## 设计特点
//!
//! - **并发度为 1**：任务间隔是对目标站点的限流，不是性能问题
//! - **唯一致命错误**：通道无法创建时中止整个批次

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{BatchError, JobError, TimeoutStage};
use crate::infrastructure::{LaneId, WorkerHost, WorkerLane};
use crate::models::{BatchSummary, FailedJob, Job, JobId, ResultEvent, ScrapeResult};
use crate::orchestrator::correlation::CorrelationTable;
use crate::orchestrator::observer::{BatchObserver, JobProgress};
use crate::services::ResultStore;
use crate::utils::logging;
use crate::workflow::WorkerFlow;

/// 批次编排器
///
/// 通道、关联表与运行标志都是它的字段，生命周期与一次批次运行绑定
pub struct Orchestrator {
    config: Config,
    host: Arc<dyn WorkerHost>,
    lane: WorkerLane,
    flow: WorkerFlow,
    table: CorrelationTable,
    observers: RwLock<Vec<Arc<dyn BatchObserver>>>,
    store: Option<Arc<dyn ResultStore>>,
    running: AtomicBool,
}

/// 批次运行期间持有，离开作用域时清除运行标志
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Orchestrator {
    pub fn new(host: Arc<dyn WorkerHost>, config: &Config) -> Self {
        Self {
            config: config.clone(),
            lane: WorkerLane::new(host.clone()),
            flow: WorkerFlow::new(host.clone(), config.safety_timeout),
            host,
            table: CorrelationTable::new(),
            observers: RwLock::new(Vec::new()),
            store: None,
            running: AtomicBool::new(false),
        }
    }

    /// 设置结果存储
    pub fn with_store(mut self, store: Arc<dyn ResultStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_observer(self, observer: Arc<dyn BatchObserver>) -> Self {
        self.add_observer(observer);
        self
    }

    pub fn add_observer(&self, observer: Arc<dyn BatchObserver>) {
        self.observers.write().push(observer);
    }

    /// 是否有批次正在运行
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// 关联表中等待结果的任务数
    pub fn pending_jobs(&self) -> usize {
        self.table.len()
    }

    /// 仍处于打开状态的工作上下文数
    pub fn active_contexts(&self) -> usize {
        self.flow.active_contexts()
    }

    /// 当前缓存的通道
    pub async fn current_lane(&self) -> Option<LaneId> {
        self.lane.current().await
    }

    /// 执行一个批次
    ///
    /// 所有任务结算、通道释放之后才返回；单个任务的错误体现在
    /// `BatchSummary::failed` 中，只有通道不可用会返回错误
    pub async fn run_batch(&self, job_ids: &[JobId]) -> Result<BatchSummary, BatchError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("⚠️ 已有批次正在运行，拒绝新的批次");
            return Err(BatchError::AlreadyRunning);
        }
        let guard = RunningGuard(&self.running);

        // 上一个批次的 future 可能在任务中途被丢弃，先清理它留下的条目与上下文
        let stale = self.table.cancel_all("上一个批次被中断");
        let orphans = self.flow.reclaim_all().await;
        if stale > 0 || orphans > 0 {
            warn!(
                "⚠️ 清理上一个批次的残留：{} 个未结算任务，{} 个工作上下文",
                stale, orphans
            );
        }

        let mut results = self.host.subscribe_results();
        let started = Instant::now();
        self.notify(|observer| observer.on_batch_start(job_ids));

        let outcome = self.run_jobs(job_ids, &mut results).await;

        let cancelled = self.table.cancel_all("批次结束");
        if cancelled > 0 {
            warn!("⚠️ 批次结束时仍有 {} 个任务未结算，已取消", cancelled);
        }
        let reclaimed = self.flow.reclaim_all().await;
        if reclaimed > 0 {
            warn!("⚠️ 批次结束时回收了 {} 个工作上下文", reclaimed);
        }
        self.lane.release().await;
        drop(guard);

        match outcome {
            Ok((succeeded, failed)) => {
                let summary = BatchSummary {
                    succeeded,
                    failed,
                    elapsed: started.elapsed(),
                };
                self.notify(|observer| observer.on_batch_complete(&summary));
                Ok(summary)
            }
            Err(error) => {
                self.notify(|observer| observer.on_batch_aborted(&error));
                Err(error)
            }
        }
    }

    /// 逐个执行任务
    async fn run_jobs(
        &self,
        job_ids: &[JobId],
        results: &mut broadcast::Receiver<ResultEvent>,
    ) -> Result<(Vec<JobId>, Vec<FailedJob>), BatchError> {
        let total = job_ids.len();
        let mut succeeded = Vec::new();
        let mut failed = Vec::new();

        for (index, job_id) in job_ids.iter().enumerate() {
            if index > 0 {
                // 间隔期间迟到的结果事件照常被关联表丢弃
                self.table
                    .pump(sleep(self.config.inter_job_delay), results)
                    .await;
            }

            logging::log_job_start(index + 1, total, job_id.as_str());
            let job = Job::new(job_id.clone(), self.config.target_url_for(job_id));

            match self.run_one(&job, results).await {
                Ok(result) => {
                    self.persist(&job.id, result);
                    self.notify(|observer| {
                        observer.on_job_settled(&JobProgress {
                            index: index + 1,
                            total,
                            job_id: &job.id,
                            error: None,
                        })
                    });
                    succeeded.push(job.id);
                }
                Err(JobError::LaneUnavailable { reason }) => {
                    return Err(BatchError::LaneUnavailable { reason });
                }
                Err(error) => {
                    self.notify(|observer| {
                        observer.on_job_settled(&JobProgress {
                            index: index + 1,
                            total,
                            job_id: &job.id,
                            error: Some(&error),
                        })
                    });
                    failed.push(FailedJob {
                        job_id: job.id,
                        error,
                    });
                }
            }
        }

        Ok((succeeded, failed))
    }

    /// 执行单个任务：登记 → 运行（外层超时）→ 清理关联表
    async fn run_one(
        &self,
        job: &Job,
        results: &mut broadcast::Receiver<ResultEvent>,
    ) -> Result<ScrapeResult, JobError> {
        let completion = self.table.register(&job.id)?;
        let work = self.flow.run_job(&self.lane, job, completion);

        let outcome =
            match tokio::time::timeout(self.config.job_timeout, self.table.pump(work, results))
                .await
            {
                Ok(outcome) => outcome,
                Err(_) => {
                    self.flow.reclaim(&job.id).await;
                    Err(JobError::JobTimeout {
                        stage: TimeoutStage::JobResult,
                        after: self.config.job_timeout,
                    })
                }
            };

        self.table.discard(&job.id);
        outcome
    }

    /// 旁路保存结果，不阻塞任务结算
    fn persist(&self, job_id: &JobId, result: ScrapeResult) {
        let Some(store) = self.store.clone() else {
            return;
        };

        let job_id = job_id.clone();
        tokio::spawn(async move {
            match store.persist(&job_id, &result).await {
                Ok(()) => info!("💾 任务 {} 的结果已保存", job_id),
                Err(e) => warn!("⚠️ 保存任务 {} 的结果失败: {:#}", job_id, e),
            }
        });
    }

    fn notify(&self, f: impl Fn(&dyn BatchObserver)) {
        let observers = self.observers.read().clone();
        for observer in &observers {
            f(observer.as_ref());
        }
    }
}
