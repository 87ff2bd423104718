//! # Scrape Batch Runner
//!
//! 一个顺序驱动浏览器页面抓取任务的批次编排器
//!
//! ## 架构设计
//!
//! 本系统采用四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（浏览器、通道），只暴露能力
//! - `WorkerHost` - 宿主环境接口，`ChromeHost` 是基于 CDP 的实现
//! - `WorkerLane` - 批次内共享的隐藏通道
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `ResultStore` - 保存单个任务的结果
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个任务"的完整处理流程
//! - `WorkerFlow` - 打开上下文 → 等待就绪 → 派发 → 等待结果 → 关闭
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 批次调度器，顺序执行、超时、汇总
//! - `orchestrator/correlation` - 任务关联表，结果事件只结算一次
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult, BatchError, HostError, JobError, TimeoutStage};
pub use infrastructure::{ChromeHost, WorkerHost, WorkerLane};
pub use models::{BatchSummary, Job, JobId, JobOutcome, ResultEvent, ScrapeResult};
pub use orchestrator::{App, BatchObserver, CorrelationTable, Orchestrator};
pub use workflow::WorkerFlow;
