//! 应用入口 - 编排层
//!
//! 负责初始化日志文件、打开浏览器、组装编排器，然后运行一个批次

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::browser;
use crate::config::Config;
use crate::infrastructure::chrome_host::{ChromeHost, DEFAULT_EXTRACTOR};
use crate::models::{load_job_ids, BatchSummary, JobId};
use crate::orchestrator::batch_processor::Orchestrator;
use crate::orchestrator::observer::LoggingObserver;
use crate::services::JsonFileStore;
use crate::utils::logging;

/// 应用主结构
pub struct App {
    config: Config,
    orchestrator: Orchestrator,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        // 初始化日志文件
        logging::init_log_file(&config.output_log_file)?;

        logging::log_startup(&config);

        let extractor = load_extractor(config.extractor_script.as_deref()).await?;
        let browser = browser::open_browser(&config).await?;
        let host = Arc::new(ChromeHost::new(browser, extractor));

        let orchestrator = Orchestrator::new(host, &config)
            .with_store(Arc::new(JsonFileStore::new(&config.results_dir)))
            .with_observer(Arc::new(LoggingObserver));

        Ok(Self {
            config,
            orchestrator,
        })
    }

    /// 运行一个批次
    pub async fn run(&self, job_ids: Vec<JobId>) -> Result<BatchSummary> {
        if job_ids.is_empty() {
            warn!("⚠️ 没有需要处理的任务，程序结束");
            return Ok(BatchSummary::default());
        }

        let summary = self.orchestrator.run_batch(&job_ids).await?;

        logging::append_batch_report(&self.config.output_log_file, &summary)?;
        info!("\n日志已保存至: {}", self.config.output_log_file);
        info!("结果已保存至: {}", self.config.results_dir);

        Ok(summary)
    }
}

/// 确定本次要运行的任务：命令行参数优先，否则读取任务清单
pub async fn resolve_job_ids(config: &Config, args: Vec<String>) -> Result<Vec<JobId>> {
    let from_args: Vec<JobId> = args
        .into_iter()
        .map(|arg| arg.trim().to_string())
        .filter(|arg| !arg.is_empty())
        .map(JobId::from)
        .collect();

    if !from_args.is_empty() {
        info!("📋 使用命令行给出的 {} 个任务", from_args.len());
        return Ok(from_args);
    }

    info!("\n📁 正在读取任务清单: {}", config.jobs_file);
    load_job_ids(Path::new(&config.jobs_file)).await
}

/// 读取页面提取脚本，未配置时使用内置脚本
async fn load_extractor(path: Option<&str>) -> Result<String> {
    match path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("无法读取提取脚本: {}", path)),
        None => Ok(DEFAULT_EXTRACTOR.to_string()),
    }
}
