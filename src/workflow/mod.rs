//! 流程层（Workflow Layer）
//!
//! 定义"一个任务"的完整处理流程，不关心批次与调度

pub mod worker_flow;

pub use worker_flow::WorkerFlow;
