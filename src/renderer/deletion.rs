//! 删除队列
//!
//! 按插入顺序记录延迟释放的资源，`flush` 时逆序释放。
//! 依赖者总是在被依赖者之后插入，逆序释放保证不会先销毁仍被引用的资源。
//!
//! 引擎持有两类删除队列：
//! - 全局队列：关闭时在确认 GPU 空闲后刷新一次
//! - 每个帧槽位一个队列：每次复用该槽位时，在等待其 Fence 之后刷新

use ash::vk;
use tracing::trace;

use super::descriptor::DescriptorPool;
use super::resource::{AllocatedBuffer, AllocatedImage};
use crate::gfx::GpuDevice;

/// 一项延迟释放操作
pub enum Disposal {
    Buffer(AllocatedBuffer),
    Image(AllocatedImage),
    Sampler(vk::Sampler),
    DescriptorSetLayout(vk::DescriptorSetLayout),
    DescriptorPool(DescriptorPool),
    Fence(vk::Fence),
    Semaphore(vk::Semaphore),
    CommandPool(vk::CommandPool),
    /// 任意的释放逻辑，必须不会失败
    Custom(Box<dyn FnOnce() + Send>),
}

impl Disposal {
    fn name(&self) -> &'static str {
        match self {
            Disposal::Buffer(_) => "buffer",
            Disposal::Image(_) => "image",
            Disposal::Sampler(_) => "sampler",
            Disposal::DescriptorSetLayout(_) => "descriptor set layout",
            Disposal::DescriptorPool(_) => "descriptor pool",
            Disposal::Fence(_) => "fence",
            Disposal::Semaphore(_) => "semaphore",
            Disposal::CommandPool(_) => "command pool",
            Disposal::Custom(_) => "custom",
        }
    }

    fn dispose(self, device: &dyn GpuDevice) {
        match self {
            Disposal::Buffer(buffer) => device.destroy_buffer(buffer),
            Disposal::Image(image) => device.destroy_image(image),
            Disposal::Sampler(sampler) => device.destroy_sampler(sampler),
            Disposal::DescriptorSetLayout(layout) => device.destroy_descriptor_set_layout(layout),
            Disposal::DescriptorPool(pool) => pool.destroy(device),
            Disposal::Fence(fence) => device.destroy_fence(fence),
            Disposal::Semaphore(semaphore) => device.destroy_semaphore(semaphore),
            Disposal::CommandPool(pool) => device.destroy_command_pool(pool),
            Disposal::Custom(action) => action(),
        }
    }
}

impl std::fmt::Debug for Disposal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Disposal({})", self.name())
    }
}

/// 删除队列
#[derive(Debug, Default)]
pub struct DeletionQueue {
    entries: Vec<Disposal>,
}

impl DeletionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一项延迟释放
    pub fn push(&mut self, disposal: Disposal) {
        self.entries.push(disposal);
    }

    /// 追加一个无参数的释放闭包
    pub fn push_function<F>(&mut self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.entries.push(Disposal::Custom(Box::new(action)));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 逆序执行所有释放操作并清空队列
    pub fn flush(&mut self, device: &dyn GpuDevice) {
        if self.entries.is_empty() {
            return;
        }

        trace!(count = self.entries.len(), "Flushing deletion queue");
        while let Some(disposal) = self.entries.pop() {
            disposal.dispose(device);
        }
    }
}
