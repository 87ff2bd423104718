use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::models::job::JobId;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 宿主（浏览器）相关错误
    #[error("宿主错误: {0}")]
    Host(#[from] HostError),
    /// 单个任务错误
    #[error("任务错误: {0}")]
    Job(#[from] JobError),
    /// 批次错误
    #[error("批次错误: {0}")]
    Batch(#[from] BatchError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// 宿主环境错误
///
/// 由 `WorkerHost` 的实现返回，进入编排层前会被转换成 `JobError`
#[derive(Debug, Error)]
pub enum HostError {
    /// 浏览器协议调用失败
    #[error("浏览器协议错误: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),
    /// 协议参数构建失败
    #[error("协议参数错误: {0}")]
    Protocol(String),
    /// 导航失败
    #[error("导航到 {url} 失败: {reason}")]
    Navigation { url: String, reason: String },
    /// 工作上下文不存在
    #[error("未知的工作上下文: {0}")]
    UnknownContext(String),
    /// 宿主不可用
    #[error("宿主不可用: {0}")]
    Unavailable(String),
    /// JSON 序列化失败
    #[error("JSON序列化失败: {0}")]
    Json(#[from] serde_json::Error),
}

/// 超时发生的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutStage {
    /// 等待页面就绪（内层安全超时）
    ContextReady,
    /// 等待关联结果（外层任务超时）
    JobResult,
}

impl fmt::Display for TimeoutStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutStage::ContextReady => write!(f, "等待页面就绪"),
            TimeoutStage::JobResult => write!(f, "等待任务结果"),
        }
    }
}

/// 单个任务的错误
///
/// 除 `LaneUnavailable` 外，所有变体都会在批次边界被降级为 failed 记录
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JobError {
    /// 创建工作上下文失败
    #[error("创建工作上下文失败 ({url}): {reason}")]
    ContextCreationFailed { url: String, reason: String },
    /// 派发运行指令失败
    #[error("派发运行指令失败: {reason}")]
    DispatchFailed { reason: String },
    /// 工作上下文在就绪前被关闭
    #[error("工作上下文在就绪前被关闭")]
    ContextClosedPrematurely,
    /// 任务超时
    #[error("任务超时 ({stage}, {after:?})")]
    JobTimeout { stage: TimeoutStage, after: Duration },
    /// 同一任务已在进行中
    #[error("任务 {job_id} 已在进行中")]
    DuplicateJob { job_id: JobId },
    /// 工作通道不可用
    #[error("工作通道不可用: {reason}")]
    LaneUnavailable { reason: String },
    /// 页面脚本回报了提取错误
    #[error("页面提取失败: {reason}")]
    ExtractionFailed { reason: String },
    /// 等待结果时被取消
    #[error("任务被取消: {reason}")]
    Cancelled { reason: String },
}

impl JobError {
    /// 是否会中止整个批次
    pub fn is_fatal(&self) -> bool {
        matches!(self, JobError::LaneUnavailable { .. })
    }
}

/// 批次级错误
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BatchError {
    /// 工作通道无法创建，批次中止
    #[error("工作通道不可用，批次中止: {reason}")]
    LaneUnavailable { reason: String },
    /// 已有批次在运行
    #[error("已有批次正在运行")]
    AlreadyRunning,
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 超时配置不合法
    #[error("任务超时 {job_timeout:?} 必须大于页面安全超时 {safety_timeout:?}")]
    InvalidTimeouts {
        safety_timeout: Duration,
        job_timeout: Duration,
    },
}

// ========== 便捷构造函数 ==========

impl JobError {
    /// 创建工作上下文失败
    pub fn context_creation_failed(url: impl Into<String>, source: impl fmt::Display) -> Self {
        JobError::ContextCreationFailed {
            url: url.into(),
            reason: source.to_string(),
        }
    }

    /// 派发失败
    pub fn dispatch_failed(source: impl fmt::Display) -> Self {
        JobError::DispatchFailed {
            reason: source.to_string(),
        }
    }

    /// 工作通道不可用
    pub fn lane_unavailable(source: impl fmt::Display) -> Self {
        JobError::LaneUnavailable {
            reason: source.to_string(),
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
