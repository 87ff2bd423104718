use anyhow::Result;
use scrape_batch_runner::orchestrator::app::resolve_job_ids;
use scrape_batch_runner::utils::logging;
use scrape_batch_runner::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::from_env()?;

    // 初始化日志
    logging::init(config.verbose_logging);

    // 确定任务列表
    let job_ids = resolve_job_ids(&config, std::env::args().skip(1).collect()).await?;

    // 初始化并运行应用
    let summary = App::initialize(config).await?.run(job_ids).await?;

    if !summary.failed.is_empty() {
        tracing::warn!("⚠️ 有 {} 个任务失败，详见日志文件", summary.failed.len());
    }

    Ok(())
}
