//! 核心功能模块
//!
//! 本模块提供引擎的基础功能：日志系统、配置管理和错误处理。
//! 这些模块不依赖具体的 GPU 设备实现。
//!
//! # 模块组织
//!
//! - `log`：日志系统，基于 `tracing` 的结构化日志
//! - `config`：配置管理，从 TOML 文件和命令行参数加载
//! - `error`：错误处理，定义统一的错误类型

pub mod config;
pub mod error;
pub mod log;

// 重新导出常用类型，方便使用
pub use config::{Config, LogLevel};
pub use error::{ConfigError, DescriptorError, EngineError, GraphicsError, Result};
