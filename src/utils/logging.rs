use anyhow::Result;
/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use std::fs::{self, OpenOptions};
use std::io::Write;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::models::BatchSummary;

/// 初始化日志订阅者
///
/// 优先使用 `RUST_LOG`，否则按 `verbose` 选择 debug / info；
/// 重复初始化（例如测试中）会被忽略
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n抓取批次日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 顺序抓取模式");
    info!("⏱️ 页面安全超时: {:?}", config.safety_timeout);
    info!("⏱️ 任务整体超时: {:?}", config.job_timeout);
    info!("💤 任务间隔: {:?}", config.inter_job_delay);
    info!("{}", "=".repeat(60));
}

/// 记录批次开始信息
///
/// # 参数
/// - `total`: 任务总数
pub fn log_batch_start(total: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📦 批次开始，共 {} 个任务", total);
    info!("💡 任务逐个执行，每个任务结束后再开始下一个");
    info!("{}", "=".repeat(60));
}

/// 记录单个任务开始
pub fn log_job_start(index: usize, total: usize, job_id: &str) {
    info!("\n{}", "─".repeat(30));
    info!("▶️ 处理第 {}/{} 个任务: {}", index, total, job_id);
}

/// 记录单个任务结束
///
/// # 参数
/// - `failure`: 失败原因，成功时为 None
pub fn log_job_settled(index: usize, total: usize, job_id: &str, failure: Option<&str>) {
    match failure {
        None => info!("✅ [{}/{}] 任务 {} 成功", index, total, job_id),
        Some(reason) => warn!(
            "❌ [{}/{}] 任务 {} 失败: {}",
            index,
            total,
            job_id,
            truncate_text(reason, 120)
        ),
    }
}

/// 记录批次完成信息
pub fn log_batch_complete(summary: &BatchSummary) {
    info!("\n{}", "=".repeat(60));
    info!("📊 批次完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", summary.succeeded.len(), summary.total());
    info!("❌ 失败: {}", summary.failed.len());
    info!("⏱️ 耗时: {:?}", summary.elapsed);
    info!("{}", "=".repeat(60));
}

/// 把批次报告追加到日志文件
pub fn append_batch_report(log_file_path: &str, summary: &BatchSummary) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)?;

    writeln!(
        file,
        "批次完成 - {} | 成功 {} | 失败 {} | 耗时 {:?}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        summary.succeeded.len(),
        summary.failed.len(),
        summary.elapsed
    )?;
    for job_id in &summary.succeeded {
        writeln!(file, "  ✅ {}", job_id)?;
    }
    for failed in &summary.failed {
        writeln!(file, "  ❌ {} | {}", failed.job_id, failed.error)?;
    }
    Ok(())
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
