//! gpu_lifetime - Vulkan 渲染引擎的资源生命周期核心
//!
//! 负责 GPU 与 CPU 之间的时序协调：帧资源的复用、延迟释放、
//! 描述符的分配与重置，以及同步的一次性提交。
//!
//! # 模块结构
//!
//! - `core`: 核心功能模块（日志、配置、错误处理）
//! - `gfx`: GPU 设备抽象（Vulkan 与无头实现）
//! - `renderer`: 帧循环、描述符分配和资源管理
//!
//! # 使用示例
//!
//! ```no_run
//! use std::sync::Arc;
//! use gpu_lifetime::core::Config;
//! use gpu_lifetime::gfx::HeadlessDevice;
//! use gpu_lifetime::renderer::RenderContext;
//!
//! let device = Arc::new(HeadlessDevice::new());
//! let mut ctx = RenderContext::new(device, &Config::default()).unwrap();
//!
//! ctx.draw_frame(|_ctx| Ok(())).unwrap();
//! ctx.cleanup().unwrap();
//! ```

pub mod core;
pub mod gfx;
pub mod renderer;
