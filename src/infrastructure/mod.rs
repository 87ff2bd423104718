//! 基础设施层（Infrastructure Layer）
//!
//! 持有稀缺资源（浏览器、通道），只向上暴露能力：
//! - `host` - 宿主环境接口 `WorkerHost`
//! - `chrome_host` - 基于 chromiumoxide 的实现
//! - `lane` - 批次内共享的工作通道

pub mod chrome_host;
pub mod host;
pub mod lane;

pub use chrome_host::ChromeHost;
pub use host::{ContextEvent, ContextId, LaneId, OpenedContext, RunCommand, SurfaceId, WorkerHost};
pub use lane::WorkerLane;
