//! 描述符池与描述符集
//!
//! 描述符池是一个整体回收的 arena：重置或销毁会让它分配过的所有描述符集同时失效。
//! 每个池持有一个纪元计数器，分配出的描述符集记录分配时的纪元，
//! 池被重置或销毁时计数器加一，于是"使用已失效的描述符集"变成了可检查的不一致。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ash::prelude::VkResult;
use ash::vk;
use serde::{Deserialize, Serialize};

use crate::core::error::DescriptorError;
use crate::gfx::GpuDevice;

/// 描述符类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptorKind {
    Sampler,
    CombinedImageSampler,
    SampledImage,
    StorageImage,
    UniformBuffer,
    StorageBuffer,
    UniformBufferDynamic,
    StorageBufferDynamic,
    InputAttachment,
}

impl DescriptorKind {
    /// 对应的 Vulkan 描述符类型
    pub fn to_vk(self) -> vk::DescriptorType {
        match self {
            DescriptorKind::Sampler => vk::DescriptorType::SAMPLER,
            DescriptorKind::CombinedImageSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            DescriptorKind::SampledImage => vk::DescriptorType::SAMPLED_IMAGE,
            DescriptorKind::StorageImage => vk::DescriptorType::STORAGE_IMAGE,
            DescriptorKind::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
            DescriptorKind::StorageBuffer => vk::DescriptorType::STORAGE_BUFFER,
            DescriptorKind::UniformBufferDynamic => vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
            DescriptorKind::StorageBufferDynamic => vk::DescriptorType::STORAGE_BUFFER_DYNAMIC,
            DescriptorKind::InputAttachment => vk::DescriptorType::INPUT_ATTACHMENT,
        }
    }

    /// 获取描述符类型名称
    pub fn name(&self) -> &'static str {
        match self {
            DescriptorKind::Sampler => "sampler",
            DescriptorKind::CombinedImageSampler => "combined_image_sampler",
            DescriptorKind::SampledImage => "sampled_image",
            DescriptorKind::StorageImage => "storage_image",
            DescriptorKind::UniformBuffer => "uniform_buffer",
            DescriptorKind::StorageBuffer => "storage_buffer",
            DescriptorKind::UniformBufferDynamic => "uniform_buffer_dynamic",
            DescriptorKind::StorageBufferDynamic => "storage_buffer_dynamic",
            DescriptorKind::InputAttachment => "input_attachment",
        }
    }

    /// 是否绑定缓冲区（否则绑定图像或采样器）
    pub fn is_buffer(&self) -> bool {
        matches!(
            self,
            DescriptorKind::UniformBuffer
                | DescriptorKind::StorageBuffer
                | DescriptorKind::UniformBufferDynamic
                | DescriptorKind::StorageBufferDynamic
        )
    }
}

/// 每单位 `max_sets` 为某类描述符预留的槽位数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoolSizeRatio {
    pub kind: DescriptorKind,
    pub ratio: f32,
}

impl PoolSizeRatio {
    pub fn new(kind: DescriptorKind, ratio: f32) -> Self {
        Self { kind, ratio }
    }

    /// `floor(ratio * max_sets)`
    pub fn descriptor_count(&self, max_sets: u32) -> u32 {
        (self.ratio * max_sets as f32).floor() as u32
    }
}

/// 按比例计算池中各类描述符的数量，数量为零的类型不提交给驱动
pub fn pool_sizes(ratios: &[PoolSizeRatio], set_count: u32) -> Vec<vk::DescriptorPoolSize> {
    ratios
        .iter()
        .map(|r| vk::DescriptorPoolSize {
            ty: r.kind.to_vk(),
            descriptor_count: r.descriptor_count(set_count),
        })
        .filter(|size| size.descriptor_count > 0)
        .collect()
}

/// 描述符池
///
/// 容量创建后不可变，只能通过 [`reset`](Self::reset) 整体回收。
#[derive(Debug)]
pub struct DescriptorPool {
    raw: vk::DescriptorPool,
    max_sets: u32,
    epoch: Arc<AtomicU64>,
}

impl DescriptorPool {
    /// 创建描述符池
    ///
    /// # 参数
    ///
    /// * `device` - GPU 设备
    /// * `max_sets` - 最多可分配的描述符集数量
    /// * `ratios` - 每类描述符相对于 `max_sets` 的比例
    pub fn create(device: &dyn GpuDevice, max_sets: u32, ratios: &[PoolSizeRatio]) -> VkResult<Self> {
        let sizes = pool_sizes(ratios, max_sets);
        let raw = device.create_descriptor_pool(max_sets, &sizes)?;

        Ok(Self {
            raw,
            max_sets,
            epoch: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn raw(&self) -> vk::DescriptorPool {
        self.raw
    }

    pub fn max_sets(&self) -> u32 {
        self.max_sets
    }

    /// 当前纪元（每次重置加一）
    pub fn generation(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// 分配一个描述符集，驱动的结果码原样返回
    pub fn allocate(&self, device: &dyn GpuDevice, layout: vk::DescriptorSetLayout) -> VkResult<DescriptorSet> {
        let raw = device.allocate_descriptor_set(self.raw, layout)?;

        Ok(DescriptorSet {
            raw,
            epoch: Arc::clone(&self.epoch),
            generation: self.generation(),
        })
    }

    /// 重置池，之前分配的所有描述符集失效
    pub fn reset(&self, device: &dyn GpuDevice) -> VkResult<()> {
        device.reset_descriptor_pool(self.raw)?;
        self.epoch.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// 销毁池
    pub fn destroy(self, device: &dyn GpuDevice) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        device.destroy_descriptor_pool(self.raw);
    }
}

/// 描述符集
///
/// 记录分配时所属池的纪元。句柄本身可以自由复制，
/// 但只有 [`is_valid`](Self::is_valid) 为真时才能被写入或引用。
#[derive(Debug, Clone)]
pub struct DescriptorSet {
    raw: vk::DescriptorSet,
    epoch: Arc<AtomicU64>,
    generation: u64,
}

impl DescriptorSet {
    pub fn raw(&self) -> vk::DescriptorSet {
        self.raw
    }

    /// 所属池自分配以来没有被重置或销毁
    pub fn is_valid(&self) -> bool {
        self.epoch.load(Ordering::Acquire) == self.generation
    }

    /// 有效时返回原始句柄
    pub fn require_valid(&self) -> Result<vk::DescriptorSet, DescriptorError> {
        if self.is_valid() {
            Ok(self.raw)
        } else {
            Err(DescriptorError::StaleDescriptorSet)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::HeadlessDevice;
    use crate::renderer::descriptor::DescriptorLayoutBuilder;

    #[test]
    fn test_descriptor_kind() {
        assert_eq!(DescriptorKind::StorageImage.to_vk(), vk::DescriptorType::STORAGE_IMAGE);
        assert_eq!(DescriptorKind::CombinedImageSampler.name(), "combined_image_sampler");
        assert!(DescriptorKind::UniformBufferDynamic.is_buffer());
        assert!(!DescriptorKind::SampledImage.is_buffer());
    }

    #[test]
    fn test_pool_sizes_floor_and_filter() {
        let ratios = [
            PoolSizeRatio::new(DescriptorKind::StorageImage, 3.0),
            PoolSizeRatio::new(DescriptorKind::UniformBuffer, 1.5),
            PoolSizeRatio::new(DescriptorKind::Sampler, 0.1),
        ];
        let sizes = pool_sizes(&ratios, 5);

        // 0.1 * 5 向下取整为 0，被过滤
        assert_eq!(sizes.len(), 2);
        assert_eq!(sizes[0].descriptor_count, 15);
        assert_eq!(sizes[1].ty, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(sizes[1].descriptor_count, 7);
    }

    #[test]
    fn test_reset_invalidates_sets() {
        let device = HeadlessDevice::new();
        let mut builder = DescriptorLayoutBuilder::new();
        builder.add_binding(0, DescriptorKind::StorageImage);
        let layout = builder.build(&device, vk::ShaderStageFlags::COMPUTE).unwrap();

        let pool = DescriptorPool::create(
            &device,
            4,
            &[PoolSizeRatio::new(DescriptorKind::StorageImage, 1.0)],
        )
        .unwrap();

        let set = pool.allocate(&device, layout).unwrap();
        assert!(set.is_valid());
        assert_eq!(set.require_valid().unwrap(), set.raw());

        pool.reset(&device).unwrap();
        assert!(!set.is_valid());
        assert!(matches!(set.require_valid(), Err(DescriptorError::StaleDescriptorSet)));

        let fresh = pool.allocate(&device, layout).unwrap();
        assert!(fresh.is_valid());
        assert_eq!(pool.generation(), 1);

        pool.destroy(&device);
        assert!(!fresh.is_valid());
    }
}
