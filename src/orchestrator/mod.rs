//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批次调度与结果关联，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批次调度器
//! - 逐个执行任务，任务之间保持固定间隔
//! - 外层超时与上下文回收
//! - 汇总成功/失败列表，通知观察者
//!
//! ### `correlation` - 任务关联表
//! - 任务ID → 等待中的完成通道
//! - 结果事件只结算一次，迟到或重复的事件被丢弃
//!
//! ### `observer` - 批次观察者
//!
//! ### `app` - 应用入口
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<JobId>)
//!     ↓
//! workflow::WorkerFlow (处理单个 Job)
//!     ↓
//! infrastructure (WorkerLane / WorkerHost)
//! ```

pub mod app;
pub mod batch_processor;
pub mod correlation;
pub mod observer;

// 重新导出主要类型
pub use app::App;
pub use batch_processor::Orchestrator;
pub use correlation::CorrelationTable;
pub use observer::{BatchObserver, JobProgress, LoggingObserver};
