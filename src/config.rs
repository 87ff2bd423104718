use std::str::FromStr;
use std::time::Duration;

use crate::error::{AppResult, ConfigError};
use crate::models::job::JobId;

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 浏览器调试端口
    pub browser_debug_port: u16,
    /// 是否自行启动无头浏览器（否则连接已打开的浏览器）
    pub headless: bool,
    /// 无头模式下的浏览器可执行文件
    pub chrome_executable: Option<String>,
    /// 目标页面地址模板，`{id}` 会被替换为任务ID
    pub target_url_template: String,
    /// 任务清单文件（命令行未给出任务ID时使用）
    pub jobs_file: String,
    /// 结果输出目录
    pub results_dir: String,
    /// 页面提取脚本路径，为空时使用内置脚本
    pub extractor_script: Option<String>,
    /// 输出日志文件
    pub output_log_file: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 页面就绪的安全超时（内层）
    pub safety_timeout: Duration,
    /// 单个任务的整体超时（外层），必须大于 safety_timeout
    pub job_timeout: Duration,
    /// 两个任务之间的间隔，用于保护目标站点
    pub inter_job_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            browser_debug_port: 9222,
            headless: false,
            chrome_executable: None,
            target_url_template: "https://example.org/audits/{id}".to_string(),
            jobs_file: "jobs.toml".to_string(),
            results_dir: "output_results".to_string(),
            extractor_script: None,
            output_log_file: "output.txt".to_string(),
            verbose_logging: false,
            safety_timeout: Duration::from_secs(30),
            job_timeout: Duration::from_secs(35),
            inter_job_delay: Duration::from_millis(500),
        }
    }
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        let default = Self::default();
        let config = Self {
            browser_debug_port: env_parse("BROWSER_DEBUG_PORT", default.browser_debug_port)?,
            headless: env_parse("HEADLESS", default.headless)?,
            chrome_executable: std::env::var("CHROME_EXECUTABLE").ok().or(default.chrome_executable),
            target_url_template: std::env::var("TARGET_URL_TEMPLATE").unwrap_or(default.target_url_template),
            jobs_file: std::env::var("JOBS_FILE").unwrap_or(default.jobs_file),
            results_dir: std::env::var("RESULTS_DIR").unwrap_or(default.results_dir),
            extractor_script: std::env::var("EXTRACTOR_SCRIPT").ok().or(default.extractor_script),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            verbose_logging: env_parse("VERBOSE_LOGGING", default.verbose_logging)?,
            safety_timeout: env_millis("SAFETY_TIMEOUT_MS", default.safety_timeout)?,
            job_timeout: env_millis("JOB_TIMEOUT_MS", default.job_timeout)?,
            inter_job_delay: env_millis("INTER_JOB_DELAY_MS", default.inter_job_delay)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// 外层超时必须严格大于内层，保证常见情况下由页面安全超时先触发
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.job_timeout <= self.safety_timeout {
            return Err(ConfigError::InvalidTimeouts {
                safety_timeout: self.safety_timeout,
                job_timeout: self.job_timeout,
            });
        }
        Ok(())
    }

    /// 根据模板生成任务的目标地址
    pub fn target_url_for(&self, job_id: &JobId) -> String {
        self.target_url_template.replace("{id}", job_id.as_str())
    }
}

fn env_parse<T: FromStr>(var_name: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var_name) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError::EnvVarParseFailed {
            var_name: var_name.to_string(),
            value,
            expected_type: std::any::type_name::<T>().to_string(),
        }),
        Err(_) => Ok(default),
    }
}

fn env_millis(var_name: &str, default: Duration) -> Result<Duration, ConfigError> {
    let millis = env_parse(var_name, default.as_millis() as u64)?;
    Ok(Duration::from_millis(millis))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeouts_are_nested() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.safety_timeout, Duration::from_secs(30));
        assert_eq!(config.job_timeout, Duration::from_secs(35));
        assert_eq!(config.inter_job_delay, Duration::from_millis(500));
    }

    #[test]
    fn test_validate_rejects_outer_not_greater_than_inner() {
        let config = Config {
            job_timeout: Duration::from_secs(30),
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTimeouts { .. })
        ));
    }

    #[test]
    fn test_target_url_for() {
        let config = Config {
            target_url_template: "https://host/audit/{id}/report".to_string(),
            ..Config::default()
        };
        assert_eq!(
            config.target_url_for(&JobId::new("77")),
            "https://host/audit/77/report"
        );
    }

    #[test]
    fn test_env_parse_reports_bad_value() {
        std::env::set_var("SCRAPE_TEST_BAD_PORT", "not-a-port");
        let result = env_parse::<u16>("SCRAPE_TEST_BAD_PORT", 1);
        std::env::remove_var("SCRAPE_TEST_BAD_PORT");
        assert!(matches!(
            result,
            Err(ConfigError::EnvVarParseFailed { .. })
        ));
    }

    #[test]
    fn test_env_parse_missing_uses_default() {
        assert_eq!(env_parse("SCRAPE_TEST_UNSET_VALUE", 42u64).unwrap(), 42);
    }
}
