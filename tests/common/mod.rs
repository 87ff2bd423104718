//! 测试用的内存宿主
//!
//! 每个任务按 URL 配置一种行为，时间全部走 tokio 的虚拟时钟

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use scrape_batch_runner::error::HostError;
use scrape_batch_runner::infrastructure::{
    ContextEvent, ContextId, LaneId, OpenedContext, RunCommand, SurfaceId, WorkerHost,
};
use scrape_batch_runner::models::{JobId, ResultEvent, ScrapeResult};
use scrape_batch_runner::Config;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::sleep;

pub const READY_AFTER: Duration = Duration::from_millis(100);
pub const RESULT_AFTER: Duration = Duration::from_millis(200);

/// 单个任务在宿主中的表现
#[derive(Debug, Clone)]
pub enum Behavior {
    /// 正常加载并回传结果
    Succeed,
    /// 页面永远不就绪
    NeverReady,
    /// 就绪前被关闭
    ClosedBeforeReady,
    /// 打开上下文失败
    FailOpen,
    /// 派发失败
    FailDispatch,
    /// 页面回传提取错误
    ReportError(String),
    /// 同一结果回传两次
    DuplicateResult,
    /// 就绪后一直不回传
    Silent,
    /// 超过给定时间后才回传
    LateResult(Duration),
}

#[derive(Debug, Default)]
pub struct HostState {
    pub next_id: usize,
    pub lanes_created: usize,
    pub lanes_closed: usize,
    pub live_lane: Option<LaneId>,
    pub open_contexts: HashSet<ContextId>,
    pub context_jobs: HashMap<ContextId, JobId>,
    pub close_calls: Vec<ContextId>,
    pub dispatched: Vec<JobId>,
    pub foreground: Option<SurfaceId>,
    pub focus_calls: Vec<SurfaceId>,
}

pub struct FakeHost {
    behaviors: Mutex<HashMap<String, Behavior>>,
    results: broadcast::Sender<ResultEvent>,
    pub state: Mutex<HostState>,
    fail_lane: AtomicBool,
    steal_focus: AtomicBool,
    lane_delay: Mutex<Duration>,
}

impl FakeHost {
    pub fn new() -> Arc<Self> {
        let (results, _) = broadcast::channel(64);
        Arc::new(Self {
            behaviors: Mutex::new(HashMap::new()),
            results,
            state: Mutex::new(HostState::default()),
            fail_lane: AtomicBool::new(false),
            steal_focus: AtomicBool::new(false),
            lane_delay: Mutex::new(Duration::ZERO),
        })
    }

    pub fn behave(&self, job_id: &str, behavior: Behavior) {
        self.behaviors
            .lock()
            .insert(url_for(job_id), behavior);
    }

    pub fn fail_lane_creation(&self) {
        self.fail_lane.store(true, Ordering::SeqCst);
    }

    /// 创建通道需要一段时间
    pub fn slow_lane_creation(&self, delay: Duration) {
        *self.lane_delay.lock() = delay;
    }

    /// 模拟创建通道时抢走前台焦点
    pub fn steal_focus_on_lane_creation(&self, user_surface: &str) {
        self.state.lock().foreground = Some(SurfaceId::new(user_surface));
        self.steal_focus.store(true, Ordering::SeqCst);
    }

    /// 模拟用户手动关闭了通道窗口
    pub fn kill_lane(&self) {
        self.state.lock().live_lane = None;
    }

    pub fn emit(&self, event: ResultEvent) {
        let _ = self.results.send(event);
    }

    fn behavior_for(&self, url: &str) -> Behavior {
        self.behaviors
            .lock()
            .get(url)
            .cloned()
            .unwrap_or(Behavior::Succeed)
    }

    fn behavior_for_job(&self, job_id: &JobId) -> Behavior {
        self.behavior_for(&url_for(job_id.as_str()))
    }
}

pub fn url_for(job_id: &str) -> String {
    format!("fake://jobs/{}", job_id)
}

pub fn ids(list: &[&str]) -> Vec<JobId> {
    list.iter().map(|id| JobId::new(*id)).collect()
}

pub fn result_for(job_id: &JobId) -> ScrapeResult {
    ScrapeResult {
        records: vec![json!({ "job": job_id.as_str() })],
        sections: vec![json!("summary")],
    }
}

pub fn test_config() -> Config {
    Config {
        target_url_template: "fake://jobs/{id}".to_string(),
        safety_timeout: Duration::from_secs(30),
        job_timeout: Duration::from_secs(35),
        inter_job_delay: Duration::from_millis(500),
        ..Config::default()
    }
}

#[async_trait]
impl WorkerHost for FakeHost {
    async fn create_lane(&self) -> Result<LaneId, HostError> {
        if self.fail_lane.load(Ordering::SeqCst) {
            return Err(HostError::Unavailable("window creation refused".into()));
        }

        let delay = *self.lane_delay.lock();
        if !delay.is_zero() {
            sleep(delay).await;
        }

        let mut state = self.state.lock();
        state.lanes_created += 1;
        let lane = LaneId::new(format!("lane-{}", state.lanes_created));
        state.live_lane = Some(lane.clone());
        if self.steal_focus.load(Ordering::SeqCst) {
            state.foreground = Some(SurfaceId::new(lane.as_str()));
        }
        Ok(lane)
    }

    async fn is_lane_alive(&self, lane: &LaneId) -> bool {
        self.state.lock().live_lane.as_ref() == Some(lane)
    }

    async fn close_lane(&self, lane: &LaneId) -> Result<(), HostError> {
        let mut state = self.state.lock();
        state.lanes_closed += 1;
        if state.live_lane.as_ref() == Some(lane) {
            state.live_lane = None;
        }
        Ok(())
    }

    async fn foreground_surface(&self) -> Option<SurfaceId> {
        self.state.lock().foreground.clone()
    }

    async fn focus_surface(&self, surface: &SurfaceId) -> Result<(), HostError> {
        let mut state = self.state.lock();
        state.focus_calls.push(surface.clone());
        state.foreground = Some(surface.clone());
        Ok(())
    }

    async fn open_context(&self, _lane: &LaneId, url: &str) -> Result<OpenedContext, HostError> {
        let behavior = self.behavior_for(url);
        if matches!(behavior, Behavior::FailOpen) {
            return Err(HostError::Unavailable("tab limit reached".into()));
        }

        let id = {
            let mut state = self.state.lock();
            state.next_id += 1;
            let id = ContextId::new(format!("ctx-{}", state.next_id));
            state.open_contexts.insert(id.clone());
            let job = url.rsplit('/').next().unwrap_or_default();
            state.context_jobs.insert(id.clone(), JobId::new(job));
            id
        };

        let (tx, rx) = mpsc::unbounded_channel();
        match behavior {
            Behavior::NeverReady => {
                // 保留发送端，页面既不就绪也不关闭
                tokio::spawn(async move {
                    sleep(Duration::from_secs(3600)).await;
                    drop(tx);
                });
            }
            Behavior::ClosedBeforeReady => {
                tokio::spawn(async move {
                    sleep(READY_AFTER).await;
                    let _ = tx.send(ContextEvent::Removed);
                });
                self.state.lock().open_contexts.remove(&id);
            }
            _ => {
                tokio::spawn(async move {
                    sleep(READY_AFTER).await;
                    let _ = tx.send(ContextEvent::Ready);
                });
            }
        }

        Ok(OpenedContext { id, events: rx })
    }

    async fn dispatch(&self, context: &ContextId, command: &RunCommand) -> Result<(), HostError> {
        let behavior = self.behavior_for_job(&command.job_id);
        if matches!(behavior, Behavior::FailDispatch) {
            return Err(HostError::UnknownContext(context.to_string()));
        }
        self.state.lock().dispatched.push(command.job_id.clone());

        let results = self.results.clone();
        let job_id = command.job_id.clone();
        tokio::spawn(async move {
            match behavior {
                Behavior::Succeed => {
                    sleep(RESULT_AFTER).await;
                    let _ = results.send(ResultEvent::success(job_id.clone(), result_for(&job_id)));
                }
                Behavior::DuplicateResult => {
                    sleep(RESULT_AFTER).await;
                    let _ = results.send(ResultEvent::success(job_id.clone(), result_for(&job_id)));
                    let _ = results.send(ResultEvent::failure(job_id, "second delivery"));
                }
                Behavior::ReportError(reason) => {
                    sleep(RESULT_AFTER).await;
                    let _ = results.send(ResultEvent::failure(job_id, reason));
                }
                Behavior::LateResult(after) => {
                    sleep(after).await;
                    let _ = results.send(ResultEvent::success(job_id.clone(), result_for(&job_id)));
                }
                _ => {}
            }
        });
        Ok(())
    }

    async fn close_context(&self, context: &ContextId) -> Result<(), HostError> {
        let mut state = self.state.lock();
        state.close_calls.push(context.clone());
        if state.open_contexts.remove(context) {
            Ok(())
        } else {
            Err(HostError::UnknownContext(context.to_string()))
        }
    }

    fn subscribe_results(&self) -> broadcast::Receiver<ResultEvent> {
        self.results.subscribe()
    }
}
