//! GPU 设备抽象
//!
//! 核心层只通过 [`GpuDevice`] 与图形 API 交互。句柄类型直接使用 `ash::vk`，
//! 错误使用 `VkResult`，这样描述符池耗尽、Fence 超时等结果码可以原样传给上层判断。
//!
//! 目前有两个实现：
//! - [`VulkanDevice`](super::vulkan::VulkanDevice)：基于 `ash` 的真实设备
//! - [`HeadlessDevice`](super::headless::HeadlessDevice)：确定性的软件设备，用于测试和演示

use ash::prelude::VkResult;
use ash::vk;

use crate::renderer::resource::{AllocatedBuffer, AllocatedImage, BufferDescriptor, ImageDescriptor};
use crate::renderer::sync::SubmitInfo;

/// 单条描述符写入的数据
#[derive(Debug, Clone, Copy)]
pub enum WriteInfo {
    Buffer(vk::DescriptorBufferInfo),
    Image(vk::DescriptorImageInfo),
}

/// 一条描述符写入
///
/// 自己持有写入数据，而不是像 `vk::WriteDescriptorSet` 那样持有指针。
/// 原始结构只在 [`GpuDevice::update_descriptor_sets`] 调用期间构造。
#[derive(Debug, Clone, Copy)]
pub struct DescriptorWrite {
    pub dst_set: vk::DescriptorSet,
    pub binding: u32,
    pub descriptor_type: vk::DescriptorType,
    pub info: WriteInfo,
}

/// GPU 主机上下文
///
/// 所有方法都以 `&self` 调用，实现者负责内部同步。
pub trait GpuDevice: Send + Sync {
    // ---- 描述符 ----

    fn create_descriptor_set_layout(
        &self,
        bindings: &[vk::DescriptorSetLayoutBinding],
        flags: vk::DescriptorSetLayoutCreateFlags,
    ) -> VkResult<vk::DescriptorSetLayout>;

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout);

    fn create_descriptor_pool(
        &self,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
    ) -> VkResult<vk::DescriptorPool>;

    /// 重置描述符池，释放其分配的所有描述符集
    fn reset_descriptor_pool(&self, pool: vk::DescriptorPool) -> VkResult<()>;

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool);

    /// 从池中分配一个描述符集
    ///
    /// 容量不足时返回 `ERROR_OUT_OF_POOL_MEMORY` 或 `ERROR_FRAGMENTED_POOL`。
    fn allocate_descriptor_set(
        &self,
        pool: vk::DescriptorPool,
        layout: vk::DescriptorSetLayout,
    ) -> VkResult<vk::DescriptorSet>;

    /// 一次性批量应用所有写入
    fn update_descriptor_sets(&self, writes: &[DescriptorWrite]);

    // ---- 命令录制 ----

    fn create_command_pool(&self) -> VkResult<vk::CommandPool>;

    fn allocate_command_buffer(&self, pool: vk::CommandPool) -> VkResult<vk::CommandBuffer>;

    fn reset_command_buffer(&self, buffer: vk::CommandBuffer) -> VkResult<()>;

    /// 以一次性提交模式开始录制
    fn begin_command_buffer(&self, buffer: vk::CommandBuffer) -> VkResult<()>;

    fn end_command_buffer(&self, buffer: vk::CommandBuffer) -> VkResult<()>;

    fn destroy_command_pool(&self, pool: vk::CommandPool);

    fn cmd_copy_buffer(
        &self,
        buffer: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Buffer,
        regions: &[vk::BufferCopy],
    );

    // ---- 同步 ----

    fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence>;

    /// 等待 Fence，超时返回 `Err(vk::Result::TIMEOUT)`
    fn wait_for_fence(&self, fence: vk::Fence, timeout_ns: u64) -> VkResult<()>;

    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()>;

    fn destroy_fence(&self, fence: vk::Fence);

    fn create_semaphore(&self) -> VkResult<vk::Semaphore>;

    fn destroy_semaphore(&self, semaphore: vk::Semaphore);

    // ---- 提交 ----

    fn queue_submit(&self, submit: &SubmitInfo, fence: vk::Fence) -> VkResult<()>;

    fn device_wait_idle(&self) -> VkResult<()>;

    // ---- 内存 ----

    fn create_buffer(&self, desc: &BufferDescriptor) -> VkResult<AllocatedBuffer>;

    /// 写入 CPU 可见的缓冲区，映射内存需要独占分配
    fn write_buffer(&self, buffer: &mut AllocatedBuffer, offset: u64, data: &[u8]) -> VkResult<()>;

    /// 释放缓冲区及其分配
    fn destroy_buffer(&self, buffer: AllocatedBuffer);

    /// 创建图像、后备内存和默认视图
    fn create_image(&self, desc: &ImageDescriptor) -> VkResult<AllocatedImage>;

    fn destroy_image(&self, image: AllocatedImage);

    fn create_sampler(&self, filter: vk::Filter) -> VkResult<vk::Sampler>;

    fn destroy_sampler(&self, sampler: vk::Sampler);
}
