//! 浏览器启动与连接

pub mod connection;
pub mod headless;

use anyhow::Result;
use chromiumoxide::Browser;

use crate::config::Config;

pub use connection::connect_to_browser;
pub use headless::launch_headless_browser;

/// 按配置启动无头浏览器或连接已有浏览器
pub async fn open_browser(config: &Config) -> Result<Browser> {
    if config.headless {
        launch_headless_browser(config.chrome_executable.as_deref()).await
    } else {
        connect_to_browser(config.browser_debug_port).await
    }
}
