//! 日志系统模块
//!
//! 基于 `tracing` 提供结构化的日志记录功能。
//!
//! 核心代码的日志约定：
//! - `trace`：每帧循环的各个步骤（等待、清空、重置、提交）
//! - `debug`：描述符池的创建与增长、上传
//! - `warn`：描述符池耗尽后的重试
//! - `error`：致命错误（超时、二次耗尽）
//!
//! 初始化、重试和致命错误走 `engine_*!` 宏，统一使用 `gpu_lifetime::engine` target，
//! 方便用 `RUST_LOG=gpu_lifetime::engine=warn` 单独过滤。
//!
//! # 使用示例
//!
//! ```no_run
//! use gpu_lifetime::core::config::LogLevel;
//! use gpu_lifetime::core::log;
//!
//! // 仅控制台输出
//! let _guard = log::init_logger(LogLevel::Info, false, None);
//!
//! tracing::info!(frames = 8, "Demo starting");
//! ```

use std::path::Path;

use tracing::level_filters::LevelFilter;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use super::config::LogLevel;

const DEFAULT_LOG_FILE: &str = "gpu_lifetime.log";

/// 初始化日志系统
///
/// `RUST_LOG` 环境变量存在时优先于 `level`。重复调用不会替换已经安装的订阅者。
///
/// # 参数
///
/// * `level` - 日志级别
/// * `file_output` - 是否同时输出到文件（按天滚动，后台线程写入）
/// * `log_file_path` - 日志文件路径（可选，默认为 "gpu_lifetime.log"）
///
/// # 返回值
///
/// 开启文件输出时返回后台写入线程的 guard，调用者需要持有它直到程序退出，
/// 否则缓冲中的日志会丢失。
pub fn init_logger(level: LogLevel, file_output: bool, log_file_path: Option<&str>) -> Option<WorkerGuard> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level.into()).into())
        .from_env_lossy();

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_ansi(true);

    let (file_layer, guard) = if file_output {
        let (writer, guard) = tracing_appender::non_blocking(file_appender(log_file_path.unwrap_or(DEFAULT_LOG_FILE)));
        let layer = fmt::layer()
            .with_target(true)
            .with_ansi(false)
            .with_writer(writer);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    if installed.is_err() {
        tracing::warn!("Logger already initialized, keeping the existing subscriber");
    }
    guard
}

/// 每天滚动的文件输出，目录为路径的父目录
fn file_appender(log_path: &str) -> RollingFileAppender {
    let path = Path::new(log_path);
    let directory = path.parent().unwrap_or(Path::new("."));
    let filename = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(DEFAULT_LOG_FILE);

    RollingFileAppender::new(Rotation::DAILY, directory, filename)
}

/// 引擎核心日志 - Info 级别
#[macro_export]
macro_rules! engine_info {
    ($($arg:tt)*) => {
        tracing::info!(target: "gpu_lifetime::engine", $($arg)*)
    };
}

/// 引擎核心日志 - Warn 级别
#[macro_export]
macro_rules! engine_warn {
    ($($arg:tt)*) => {
        tracing::warn!(target: "gpu_lifetime::engine", $($arg)*)
    };
}

/// 引擎核心日志 - Error 级别
#[macro_export]
macro_rules! engine_error {
    ($($arg:tt)*) => {
        tracing::error!(target: "gpu_lifetime::engine", $($arg)*)
    };
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(Level::from(LogLevel::Info), Level::INFO);
        assert_eq!(Level::from(LogLevel::Error), Level::ERROR);
        assert_eq!(LevelFilter::from_level(LogLevel::Warn.into()), LevelFilter::WARN);
    }
}
