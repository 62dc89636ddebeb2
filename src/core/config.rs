//! 配置管理模块
//!
//! 提供引擎配置的加载、解析和管理功能。
//! 支持从 TOML 配置文件加载，也支持命令行参数覆盖。
//!
//! # 配置文件格式 (config.toml)
//!
//! ```toml
//! [descriptors]
//! global_max_sets = 10
//! global_ratios = [{ kind = "storage_image", ratio = 1.0 }]
//! frame_max_sets = 1000
//! frame_ratios = [
//!     { kind = "storage_image", ratio = 3.0 },
//!     { kind = "combined_image_sampler", ratio = 4.0 },
//! ]
//!
//! [sync]
//! frame_timeout_ns = 1000000000
//! immediate_timeout_ns = 9999999999
//!
//! [logging]
//! level = "info"      # trace, debug, info, warn, error
//! file_output = false
//!
//! [demo]
//! frames = 8
//! ```
//!
//! 帧重叠数量 `FRAME_OVERLAP` 是编译期常量，不在配置中。

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::{ConfigError, Result};
use crate::renderer::descriptor::{DescriptorKind, PoolSizeRatio};
use crate::renderer::sync::{FRAME_FENCE_TIMEOUT_NS, IMMEDIATE_FENCE_TIMEOUT_NS};

/// 引擎配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// 描述符分配配置
    #[serde(default)]
    pub descriptors: DescriptorConfig,

    /// 同步等待配置
    #[serde(default)]
    pub sync: SyncConfig,

    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,

    /// 演示程序配置
    #[serde(default)]
    pub demo: DemoConfig,
}

/// 描述符分配配置
///
/// `global_*` 用于启动期的固定分配器，`frame_*` 用于每个帧槽位的可增长分配器。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptorConfig {
    #[serde(default = "default_global_max_sets")]
    pub global_max_sets: u32,

    #[serde(default = "default_global_ratios")]
    pub global_ratios: Vec<PoolSizeRatio>,

    #[serde(default = "default_frame_max_sets")]
    pub frame_max_sets: u32,

    #[serde(default = "default_frame_ratios")]
    pub frame_ratios: Vec<PoolSizeRatio>,
}

/// 同步等待配置（纳秒）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// 每帧等待渲染 Fence 的超时
    #[serde(default = "default_frame_timeout")]
    pub frame_timeout_ns: u64,

    /// 立即提交等待 Fence 的超时
    #[serde(default = "default_immediate_timeout")]
    pub immediate_timeout_ns: u64,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// 是否输出到文件
    #[serde(default = "default_file_output")]
    pub file_output: bool,

    /// 日志文件路径
    #[serde(default = "default_log_file")]
    pub log_file: String,
}

/// 演示程序配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoConfig {
    /// 渲染的帧数
    #[serde(default = "default_demo_frames")]
    pub frames: u32,
}

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

// 默认值函数
fn default_global_max_sets() -> u32 { 10 }
fn default_global_ratios() -> Vec<PoolSizeRatio> {
    vec![PoolSizeRatio::new(DescriptorKind::StorageImage, 1.0)]
}
fn default_frame_max_sets() -> u32 { 1000 }
fn default_frame_ratios() -> Vec<PoolSizeRatio> {
    vec![
        PoolSizeRatio::new(DescriptorKind::StorageImage, 3.0),
        PoolSizeRatio::new(DescriptorKind::StorageBuffer, 3.0),
        PoolSizeRatio::new(DescriptorKind::UniformBuffer, 3.0),
        PoolSizeRatio::new(DescriptorKind::CombinedImageSampler, 4.0),
    ]
}
fn default_frame_timeout() -> u64 { FRAME_FENCE_TIMEOUT_NS }
fn default_immediate_timeout() -> u64 { IMMEDIATE_FENCE_TIMEOUT_NS }
fn default_log_level() -> LogLevel { LogLevel::Info }
fn default_file_output() -> bool { false }
fn default_log_file() -> String { "gpu_lifetime.log".to_string() }
fn default_demo_frames() -> u32 { 8 }

impl Default for DescriptorConfig {
    fn default() -> Self {
        Self {
            global_max_sets: default_global_max_sets(),
            global_ratios: default_global_ratios(),
            frame_max_sets: default_frame_max_sets(),
            frame_ratios: default_frame_ratios(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            frame_timeout_ns: default_frame_timeout(),
            immediate_timeout_ns: default_immediate_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_output: default_file_output(),
            log_file: default_log_file(),
        }
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            frames: default_demo_frames(),
        }
    }
}

impl Config {
    /// 从配置文件加载
    ///
    /// # 参数
    ///
    /// * `path` - 配置文件路径
    ///
    /// # 返回值
    ///
    /// 成功返回 `Config` 实例，失败返回错误
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let contents = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path_str.clone()))?;

        toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()).into())
    }

    /// 从配置文件加载，如果文件不存在或无法解析则使用默认配置
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::from_file(path).unwrap_or_default()
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// 从命令行参数覆盖配置
    ///
    /// 支持的参数：
    /// - `--frames <n>`: 演示程序渲染的帧数
    /// - `--log-level <level>`: 日志级别
    /// - `--log-file <path>`: 开启文件日志并设置路径
    pub fn apply_args<I>(&mut self, args: I)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|s| s.as_ref().to_string()).collect();

        let value_of = |flag: &str| {
            args.iter()
                .position(|a| a == flag)
                .and_then(|idx| args.get(idx + 1))
        };

        if let Some(frames) = value_of("--frames").and_then(|s| s.parse().ok()) {
            self.demo.frames = frames;
        }

        if let Some(level) = value_of("--log-level").and_then(|s| LogLevel::parse(s)) {
            self.logging.level = level;
        }

        if let Some(path) = value_of("--log-file") {
            self.logging.file_output = true;
            self.logging.log_file = path.clone();
        }
    }

    /// 验证配置的有效性
    ///
    /// 描述符比例必须为正的有限值，且在对应的 `max_sets` 下至少产生一个槽位。
    pub fn validate(&self) -> Result<()> {
        validate_pool("descriptors.global", self.descriptors.global_max_sets, &self.descriptors.global_ratios)?;
        validate_pool("descriptors.frame", self.descriptors.frame_max_sets, &self.descriptors.frame_ratios)?;

        if self.sync.frame_timeout_ns == 0 || self.sync.immediate_timeout_ns == 0 {
            return Err(ConfigError::invalid("sync", "Fence wait timeouts must be greater than 0").into());
        }

        Ok(())
    }
}

/// 校验一组池参数，分配器初始化时也会调用
pub(crate) fn validate_pool(field: &str, max_sets: u32, ratios: &[PoolSizeRatio]) -> Result<()> {
    if max_sets == 0 {
        return Err(ConfigError::invalid(format!("{field}_max_sets"), "max_sets must be greater than 0").into());
    }

    if ratios.is_empty() {
        return Err(ConfigError::invalid(format!("{field}_ratios"), "at least one pool size ratio is required").into());
    }

    for ratio in ratios {
        if !ratio.ratio.is_finite() || ratio.ratio <= 0.0 {
            return Err(ConfigError::invalid(
                format!("{field}_ratios"),
                format!("ratio for {} must be a positive number, got {}", ratio.kind.name(), ratio.ratio),
            )
            .into());
        }

        if ratio.descriptor_count(max_sets) == 0 {
            return Err(ConfigError::invalid(
                format!("{field}_ratios"),
                format!(
                    "ratio {} for {} yields no descriptors at {} sets",
                    ratio.ratio,
                    ratio.kind.name(),
                    max_sets
                ),
            )
            .into());
        }
    }

    Ok(())
}
