//! 错误处理模块
//!
//! 定义了引擎中使用的统一错误类型，使用 `thiserror` 提供友好的错误消息。
//!
//! # 错误分级
//!
//! - `ConfigError`：初始化时的配置错误，直接致命
//! - `DescriptorError`：描述符池耗尽/碎片化，可增长分配器只重试一次
//! - `GraphicsError`：资源创建失败、命令执行失败、Fence 等待超时，全部致命
//!
//! 所有致命错误都会立即向上传播，不会被静默吞掉。

use ash::vk;
use thiserror::Error;

/// 引擎统一的 Result 类型
pub type Result<T> = std::result::Result<T, EngineError>;

/// 引擎的顶层错误类型
#[derive(Debug, Error)]
pub enum EngineError {
    /// 配置错误
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// 描述符分配错误
    #[error("Descriptor error: {0}")]
    Descriptor(#[from] DescriptorError),

    /// 图形 API 错误
    #[error("Graphics error: {0}")]
    Graphics(#[from] GraphicsError),

    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// 配置相关的错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置文件未找到
    #[error("Config file not found: {0}")]
    FileNotFound(String),

    /// 配置文件解析失败
    #[error("Failed to parse config: {0}")]
    ParseError(String),

    /// 配置值无效
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// 描述符分配相关的错误
#[derive(Debug, Error)]
pub enum DescriptorError {
    /// 固定分配器的池容量不足（不重试）
    #[error("Descriptor pool exhausted (fragmented: {fragmented})")]
    PoolExhausted { fragmented: bool },

    /// 可增长分配器重试一次后仍然失败
    #[error("Descriptor allocation failed after retry: first {first}, then {second}")]
    ExhaustedAfterRetry { first: vk::Result, second: vk::Result },

    /// 描述符集所属的池已被重置或销毁
    #[error("Descriptor set was invalidated by a reset or destroy of its pool")]
    StaleDescriptorSet,

    /// 分配器尚未初始化或已销毁
    #[error("Descriptor allocator is not initialized")]
    NotInitialized,
}

/// 图形 API 相关的错误
#[derive(Debug, Error)]
pub enum GraphicsError {
    /// 资源创建失败（池、Fence、Semaphore、缓冲区等）
    #[error("Failed to create {what}: {result}")]
    ResourceCreation { what: &'static str, result: vk::Result },

    /// 命令记录、提交或重置失败
    #[error("Command execution failed during {what}: {result}")]
    CommandExecution { what: &'static str, result: vk::Result },

    /// Fence 等待超时，视为设备挂起
    #[error("Timed out after {timeout_ns} ns waiting for {what}")]
    Timeout { what: &'static str, timeout_ns: u64 },

    /// 上传的数据为空，不会创建零大小的缓冲区
    #[error("Nothing to upload for {what}")]
    EmptyUpload { what: &'static str },
}

impl GraphicsError {
    pub(crate) fn creation(what: &'static str) -> impl FnOnce(vk::Result) -> GraphicsError {
        move |result| GraphicsError::ResourceCreation { what, result }
    }

    pub(crate) fn command(what: &'static str) -> impl FnOnce(vk::Result) -> GraphicsError {
        move |result| GraphicsError::CommandExecution { what, result }
    }

    /// 将 Fence 等待结果转换为错误，`VK_TIMEOUT` 单独归类
    pub(crate) fn wait(what: &'static str, timeout_ns: u64) -> impl FnOnce(vk::Result) -> GraphicsError {
        move |result| match result {
            vk::Result::TIMEOUT => GraphicsError::Timeout { what, timeout_ns },
            result => GraphicsError::CommandExecution { what, result },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_error_mapping() {
        let err = GraphicsError::wait("render fence", 10)(vk::Result::TIMEOUT);
        assert!(matches!(err, GraphicsError::Timeout { timeout_ns: 10, .. }));

        let err = GraphicsError::wait("render fence", 10)(vk::Result::ERROR_DEVICE_LOST);
        assert!(matches!(
            err,
            GraphicsError::CommandExecution { result: vk::Result::ERROR_DEVICE_LOST, .. }
        ));
    }

    #[test]
    fn test_error_conversion() {
        let err: EngineError = ConfigError::invalid("descriptors.frame_max_sets", "must be > 0").into();
        assert!(matches!(err, EngineError::Config(ConfigError::InvalidValue { .. })));
        assert_eq!(
            err.to_string(),
            "Configuration error: Invalid value for 'descriptors.frame_max_sets': must be > 0"
        );

        let err: EngineError = GraphicsError::EmptyUpload { what: "mesh indices" }.into();
        assert_eq!(err.to_string(), "Graphics error: Nothing to upload for mesh indices");
    }
}
