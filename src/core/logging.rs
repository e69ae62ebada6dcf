//! 日志初始化
//!
//! 引擎内部统一使用 `tracing`；宿主程序可以调用 [`init_logging`]
//! 安装默认的 fmt 订阅者，也可以自行安装。

use crate::config::{LogLevel, LoggingConfig};
use tracing_subscriber::EnvFilter;

impl LogLevel {
    /// 对应的 `EnvFilter` 指令
    pub fn as_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// 安装全局 tracing 订阅者
///
/// `RUST_LOG` 优先；未设置时使用配置中的级别。
/// 已有订阅者时返回 `false`，不会 panic。
pub fn init_logging(config: &LoggingConfig) -> bool {
    if !config.log_to_console {
        return false;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_filter_directive()));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.show_targets)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(target: "dpsf", "Logging initialized at level {:?}", config.level);
    }
    installed
}
