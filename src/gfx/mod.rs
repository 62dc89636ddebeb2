//! 图形设备模块
//!
//! 渲染核心只通过 [`GpuDevice`] trait 访问 GPU：
//! - `vulkan`：基于 `ash` 的真实 Vulkan 设备
//! - `headless`：纯软件实现，用于测试和无显卡环境下的演示程序

pub mod device;
pub mod headless;
pub mod vulkan;

pub use device::{DescriptorWrite, GpuDevice, WriteInfo};
pub use headless::{DeviceEvent, HeadlessDevice, LayoutBindingShape};
pub use vulkan::VulkanDevice;
