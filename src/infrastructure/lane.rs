//! 工作通道 - 基础设施层
//!
//! 持有批次内唯一的通道句柄：首次使用时创建，之后复用，
//! 每次复用前探测存活，批次结束时释放。

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::JobError;
use crate::infrastructure::host::{LaneId, SurfaceId, WorkerHost};

/// 工作通道管理器
pub struct WorkerLane {
    host: Arc<dyn WorkerHost>,
    current: Arc<Mutex<Option<LaneId>>>,
}

impl WorkerLane {
    pub fn new(host: Arc<dyn WorkerHost>) -> Self {
        Self {
            host,
            current: Arc::new(Mutex::new(None)),
        }
    }

    /// 获取可用的通道，必要时创建
    ///
    /// 创建失败返回 `LaneUnavailable`，调用方应中止整个批次。
    /// 创建在独立任务中进行并持有缓存锁：即使调用方被取消，
    /// 新通道也会写入缓存，之后由 `release` 关闭
    pub async fn acquire(&self) -> Result<LaneId, JobError> {
        let mut current = self.current.clone().lock_owned().await;

        if let Some(lane) = current.as_ref() {
            if self.host.is_lane_alive(lane).await {
                return Ok(lane.clone());
            }
            warn!("⚠️ 工作通道 {} 已失效，重新创建", lane);
            *current = None;
        }

        let host = self.host.clone();
        let creation = tokio::spawn(async move {
            let foreground = host.foreground_surface().await;
            let lane = host
                .create_lane()
                .await
                .map_err(JobError::lane_unavailable)?;
            *current = Some(lane.clone());
            drop(current);
            info!("✓ 工作通道已创建: {}", lane);

            if let Some(previous) = foreground {
                restore_focus(host.as_ref(), &previous).await;
            }
            Ok::<_, JobError>(lane)
        });

        creation.await.map_err(JobError::lane_unavailable)?
    }

    /// 释放通道；没有通道时什么也不做
    pub async fn release(&self) {
        let lane = self.current.lock().await.take();
        let Some(lane) = lane else {
            debug!("没有需要释放的工作通道");
            return;
        };

        match self.host.close_lane(&lane).await {
            Ok(()) => info!("✓ 工作通道已关闭: {}", lane),
            Err(e) => warn!("⚠️ 关闭工作通道 {} 失败: {}", lane, e),
        }
    }

    /// 当前缓存的通道
    pub async fn current(&self) -> Option<LaneId> {
        self.current.lock().await.clone()
    }
}

async fn restore_focus(host: &dyn WorkerHost, previous: &SurfaceId) {
    let now = host.foreground_surface().await;
    if now.as_ref() == Some(previous) {
        return;
    }

    debug!("创建通道时焦点发生变化，恢复到 {}", previous);
    if let Err(e) = host.focus_surface(previous).await {
        warn!("⚠️ 恢复焦点失败: {}", e);
    }
}
