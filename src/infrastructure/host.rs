//! 宿主环境接口 - 基础设施层
//!
//! 编排逻辑只通过 `WorkerHost` 接触浏览器：
//! 通道（lane）的创建与销毁、工作上下文（标签页）的打开与关闭、
//! 派发运行指令、焦点恢复，以及一条广播形式的结果事件总线。

use async_trait::async_trait;
use std::fmt;
use tokio::sync::{broadcast, mpsc};

use crate::error::HostError;
use crate::models::{JobId, ResultEvent};

macro_rules! string_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_handle!(
    /// 通道句柄（隐藏的执行面，承载所有工作上下文）
    LaneId
);
string_handle!(
    /// 工作上下文句柄，由宿主在创建时分配
    ContextId
);
string_handle!(
    /// 用户当前的前台界面
    SurfaceId
);

/// 单个工作上下文的生命周期事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextEvent {
    /// 页面加载完成
    Ready,
    /// 上下文被关闭（任何原因）
    Removed,
}

/// 新打开的工作上下文
///
/// `events` 只属于这个上下文；丢弃接收端即等于移除监听
#[derive(Debug)]
pub struct OpenedContext {
    pub id: ContextId,
    pub events: mpsc::UnboundedReceiver<ContextEvent>,
}

/// 派发到工作上下文中的运行指令
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunCommand {
    pub job_id: JobId,
}

/// 宿主环境
#[async_trait]
pub trait WorkerHost: Send + Sync {
    /// 创建新的隐藏通道
    async fn create_lane(&self) -> Result<LaneId, HostError>;

    /// 通道是否仍然存活
    async fn is_lane_alive(&self, lane: &LaneId) -> bool;

    /// 关闭通道
    async fn close_lane(&self, lane: &LaneId) -> Result<(), HostError>;

    /// 用户当前的前台界面，无法判断时返回 None
    async fn foreground_surface(&self) -> Option<SurfaceId>;

    /// 把焦点还给指定界面
    async fn focus_surface(&self, surface: &SurfaceId) -> Result<(), HostError>;

    /// 在通道内以非激活状态打开工作上下文
    async fn open_context(&self, lane: &LaneId, url: &str) -> Result<OpenedContext, HostError>;

    /// 向工作上下文派发运行指令；结果通过结果总线异步返回
    async fn dispatch(&self, context: &ContextId, command: &RunCommand) -> Result<(), HostError>;

    /// 关闭工作上下文
    async fn close_context(&self, context: &ContextId) -> Result<(), HostError>;

    /// 订阅结果事件
    fn subscribe_results(&self) -> broadcast::Receiver<ResultEvent>;
}
