//! Chrome 宿主 - 基础设施层
//!
//! 用 CDP 实现 `WorkerHost`：
//! - 通道 = 独立的 browser context（不与用户窗口共享状态）
//! - 工作上下文 = 通道内以后台方式创建的 target
//! - 结果回传 = `Runtime.addBinding` 注入的绑定函数
//! - 就绪 = 本次导航产生的文档触发 `load` 生命周期事件

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::{
    EventLifecycleEvent, NavigateParams, SetLifecycleEventsEnabledParams,
};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::target::{
    ActivateTargetParams, CreateBrowserContextParams, CreateTargetParams,
    DisposeBrowserContextParams, EventTargetDestroyed, GetBrowserContextsParams, TargetId,
};
use chromiumoxide::cdp::js_protocol::runtime::{AddBindingParams, EventBindingCalled};
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::HostError;
use crate::infrastructure::host::{
    ContextEvent, ContextId, LaneId, OpenedContext, RunCommand, SurfaceId, WorkerHost,
};
use crate::models::{ResultEvent, ResultMessage};

/// 页面脚本回传结果时调用的绑定函数名
pub const RESULT_BINDING: &str = "__scrapeJobResult";

/// 内置的提取脚本：收集表格行与标题
///
/// 真实的提取逻辑通过 `EXTRACTOR_SCRIPT` 注入，形式为
/// `async (document) => ({ records, sections })`
pub const DEFAULT_EXTRACTOR: &str = r#"async (doc) => ({
    records: Array.from(doc.querySelectorAll('table tr')).map(row =>
        Array.from(row.cells).map(cell => cell.innerText.trim())),
    sections: Array.from(doc.querySelectorAll('h1, h2, h3')).map(h => h.innerText.trim()),
})"#;

const RESULT_BUS_CAPACITY: usize = 64;

/// 基于 chromiumoxide 的宿主
pub struct ChromeHost {
    browser: Browser,
    contexts: Mutex<HashMap<ContextId, (LaneId, Page)>>,
    results: broadcast::Sender<ResultEvent>,
    extractor: String,
}

impl ChromeHost {
    pub fn new(browser: Browser, extractor: impl Into<String>) -> Self {
        let (results, _) = broadcast::channel(RESULT_BUS_CAPACITY);
        Self {
            browser,
            contexts: Mutex::new(HashMap::new()),
            results,
            extractor: extractor.into(),
        }
    }

    pub fn with_default_extractor(browser: Browser) -> Self {
        Self::new(browser, DEFAULT_EXTRACTOR)
    }

    fn page(&self, context: &ContextId) -> Result<Page, HostError> {
        self.contexts
            .lock()
            .get(context)
            .map(|(_, page)| page.clone())
            .ok_or_else(|| HostError::UnknownContext(context.to_string()))
    }

    /// 生成派发到页面内的脚本
    ///
    /// 提取放到 setTimeout 中执行，evaluate 立即返回；
    /// 结果或错误统一经绑定函数回传
    fn run_script(&self, command: &RunCommand) -> Result<String, HostError> {
        let job_id = serde_json::to_string(command.job_id.as_str())?;
        Ok(format!(
            r#"(() => {{
    const jobId = {job_id};
    const report = (message) => window.{binding}(JSON.stringify(message));
    setTimeout(async () => {{
        try {{
            const extract = {extractor};
            const result = (await extract(document)) || {{}};
            report({{
                type: 'results',
                job_id: jobId,
                records: result.records || [],
                sections: result.sections || [],
            }});
        }} catch (error) {{
            report({{ type: 'error', job_id: jobId, reason: String((error && error.message) || error) }});
        }}
    }}, 0);
    return true;
}})()"#,
            job_id = job_id,
            binding = RESULT_BINDING,
            extractor = self.extractor,
        ))
    }

    /// 注册绑定与事件转发，然后导航到目标地址
    ///
    /// 只有属于本次导航（loader_id 相同）的 load 事件才算就绪；
    /// 初始 about:blank 文档的 load 事件会被忽略
    async fn attach(
        &self,
        page: &Page,
        id: &ContextId,
        url: &str,
    ) -> Result<mpsc::UnboundedReceiver<ContextEvent>, HostError> {
        let target = page.target_id().clone();

        page.execute(AddBindingParams::new(RESULT_BINDING)).await?;
        page.execute(SetLifecycleEventsEnabledParams::new(true)).await?;
        let mut lifecycle = page.event_listener::<EventLifecycleEvent>().await?;
        let mut bindings = page.event_listener::<EventBindingCalled>().await?;
        let mut destroyed = self.browser.event_listener::<EventTargetDestroyed>().await?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (navigated_tx, mut navigated_rx) = oneshot::channel::<Option<String>>();
        let results = self.results.clone();
        tokio::spawn(async move {
            let mut gate = LoadGate::default();
            let mut awaiting_navigation = true;
            loop {
                tokio::select! {
                    navigated = &mut navigated_rx, if awaiting_navigation => {
                        awaiting_navigation = false;
                        match navigated {
                            Ok(loader) => {
                                if gate.navigated(loader) {
                                    let _ = events_tx.send(ContextEvent::Ready);
                                }
                            }
                            // 导航失败，上下文随后会被关闭
                            Err(_) => break,
                        }
                    }
                    Some(event) = lifecycle.next() => {
                        if event.name == "load" && gate.loaded(event.loader_id.inner().clone()) {
                            let _ = events_tx.send(ContextEvent::Ready);
                        }
                    }
                    Some(binding) = bindings.next() => {
                        if binding.name == RESULT_BINDING {
                            publish_result(&results, &binding.payload);
                        }
                    }
                    Some(gone) = destroyed.next() => {
                        if gone.target_id == target {
                            let _ = events_tx.send(ContextEvent::Removed);
                            break;
                        }
                    }
                    else => break,
                }
            }
        });

        let navigation = page.execute(NavigateParams::new(url)).await?;
        if let Some(reason) = navigation.result.error_text.clone() {
            return Err(HostError::Navigation {
                url: url.to_string(),
                reason,
            });
        }
        let loader = navigation
            .result
            .loader_id
            .as_ref()
            .map(|loader| loader.inner().clone());
        let _ = navigated_tx.send(loader);

        debug!("工作上下文 {} 正在加载 {}", id, url);
        Ok(events_rx)
    }
}

/// 把 load 事件与导航对应起来
///
/// 导航结果返回之前到达的 load 事件先暂存，拿到 loader_id 后再比对
#[derive(Debug, Default)]
struct LoadGate {
    expected: Option<Option<String>>,
    early: Vec<String>,
    fired: bool,
}

impl LoadGate {
    /// 导航已返回；`loader` 为 None 表示导航没有产生新文档
    fn navigated(&mut self, loader: Option<String>) -> bool {
        let ready = match &loader {
            Some(loader) => self.early.iter().any(|early| early == loader),
            None => false,
        };
        self.early.clear();
        self.expected = Some(loader);
        self.fire(ready)
    }

    fn loaded(&mut self, loader: String) -> bool {
        match &self.expected {
            None => {
                self.early.push(loader);
                false
            }
            Some(Some(expected)) => {
                let ready = *expected == loader;
                self.fire(ready)
            }
            Some(None) => self.fire(true),
        }
    }

    /// 就绪只报告一次
    fn fire(&mut self, ready: bool) -> bool {
        if ready && !self.fired {
            self.fired = true;
            return true;
        }
        false
    }
}

/// 解析页面回传的消息并发布到结果总线
fn publish_result(results: &broadcast::Sender<ResultEvent>, payload: &str) {
    match serde_json::from_str::<ResultMessage>(payload) {
        Ok(message) => {
            let event = ResultEvent::from(message);
            debug!("收到任务 {} 的结果事件", event.job_id);
            if results.send(event).is_err() {
                debug!("没有结果订阅者，事件被丢弃");
            }
        }
        Err(e) => warn!("⚠️ 无法解析页面回传的结果: {}", e),
    }
}

#[async_trait]
impl WorkerHost for ChromeHost {
    async fn create_lane(&self) -> Result<LaneId, HostError> {
        let created = self
            .browser
            .execute(CreateBrowserContextParams::default())
            .await?;
        Ok(LaneId::new(created.result.browser_context_id.inner().clone()))
    }

    async fn is_lane_alive(&self, lane: &LaneId) -> bool {
        match self.browser.execute(GetBrowserContextsParams::default()).await {
            Ok(response) => response
                .result
                .browser_context_ids
                .iter()
                .any(|id| id.inner() == lane.as_str()),
            Err(e) => {
                debug!("探测通道 {} 失败: {}", lane, e);
                false
            }
        }
    }

    async fn close_lane(&self, lane: &LaneId) -> Result<(), HostError> {
        self.contexts.lock().retain(|_, (owner, _)| owner != lane);
        self.browser
            .execute(DisposeBrowserContextParams::new(BrowserContextId::new(
                lane.as_str(),
            )))
            .await?;
        Ok(())
    }

    async fn foreground_surface(&self) -> Option<SurfaceId> {
        let pages = self.browser.pages().await.ok()?;
        for page in pages {
            let focused = match page.evaluate("document.hasFocus()").await {
                Ok(result) => result.into_value::<bool>().unwrap_or(false),
                Err(_) => false,
            };
            if focused {
                return Some(SurfaceId::new(page.target_id().inner().clone()));
            }
        }
        None
    }

    async fn focus_surface(&self, surface: &SurfaceId) -> Result<(), HostError> {
        self.browser
            .execute(ActivateTargetParams::new(TargetId::new(surface.as_str())))
            .await?;
        Ok(())
    }

    async fn open_context(&self, lane: &LaneId, url: &str) -> Result<OpenedContext, HostError> {
        let params = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(BrowserContextId::new(lane.as_str()))
            .background(true)
            .build()
            .map_err(HostError::Protocol)?;

        let page = self.browser.new_page(params).await?;
        let id = ContextId::new(page.target_id().inner().clone());
        self.contexts
            .lock()
            .insert(id.clone(), (lane.clone(), page.clone()));

        match self.attach(&page, &id, url).await {
            Ok(events) => Ok(OpenedContext { id, events }),
            Err(e) => {
                if let Err(close_err) = self.close_context(&id).await {
                    debug!("关闭未完成的工作上下文 {} 失败: {}", id, close_err);
                }
                Err(e)
            }
        }
    }

    async fn dispatch(&self, context: &ContextId, command: &RunCommand) -> Result<(), HostError> {
        let page = self.page(context)?;
        let script = self.run_script(command)?;
        page.evaluate(script).await?;
        Ok(())
    }

    async fn close_context(&self, context: &ContextId) -> Result<(), HostError> {
        let entry = self.contexts.lock().remove(context);
        match entry {
            Some((_, page)) => {
                page.close().await?;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn subscribe_results(&self) -> broadcast::Receiver<ResultEvent> {
        self.results.subscribe()
    }
}
