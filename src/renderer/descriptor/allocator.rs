//! 固定容量描述符分配器
//!
//! 只有一个池，容量在初始化时确定。用于启动期分配的全局描述符集，
//! 容量不足直接报错，不重试。

use ash::vk;
use tracing::{debug, warn};

use super::pool::{DescriptorPool, DescriptorSet, PoolSizeRatio};
use crate::core::config::validate_pool;
use crate::core::error::{DescriptorError, EngineError, GraphicsError, Result};
use crate::gfx::GpuDevice;

/// 单池描述符分配器
#[derive(Debug)]
pub struct DescriptorAllocator {
    pool: Option<DescriptorPool>,
}

impl DescriptorAllocator {
    /// 创建池：每类描述符 `floor(ratio * max_sets)` 个槽位
    pub fn init_pool(device: &dyn GpuDevice, max_sets: u32, ratios: &[PoolSizeRatio]) -> Result<Self> {
        validate_pool("descriptors.global", max_sets, ratios)?;

        let pool = DescriptorPool::create(device, max_sets, ratios)
            .map_err(GraphicsError::creation("descriptor pool"))?;
        debug!(max_sets, "Created fixed descriptor pool");

        Ok(Self { pool: Some(pool) })
    }

    fn pool(&self) -> Result<&DescriptorPool> {
        Ok(self.pool.as_ref().ok_or(DescriptorError::NotInitialized)?)
    }

    /// 分配一个描述符集
    ///
    /// 池耗尽或碎片化时返回 `DescriptorError::PoolExhausted`。
    pub fn allocate(&self, device: &dyn GpuDevice, layout: vk::DescriptorSetLayout) -> Result<DescriptorSet> {
        let pool = self.pool()?;
        pool.allocate(device, layout).map_err(|result| match result {
            vk::Result::ERROR_OUT_OF_POOL_MEMORY => {
                EngineError::from(DescriptorError::PoolExhausted { fragmented: false })
            }
            vk::Result::ERROR_FRAGMENTED_POOL => {
                EngineError::from(DescriptorError::PoolExhausted { fragmented: true })
            }
            other => EngineError::from(GraphicsError::creation("descriptor set")(other)),
        })
    }

    /// 重置池：所有描述符集失效，容量不变
    pub fn clear_pool(&self, device: &dyn GpuDevice) -> Result<()> {
        self.pool()?
            .reset(device)
            .map_err(GraphicsError::command("descriptor pool reset"))?;
        Ok(())
    }

    /// 销毁池，只能在没有待执行的 GPU 工作引用其描述符集时调用
    pub fn destroy_pool(&mut self, device: &dyn GpuDevice) {
        match self.pool.take() {
            Some(pool) => pool.destroy(device),
            None => warn!("Fixed descriptor pool destroyed twice"),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.pool.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ConfigError;
    use crate::gfx::HeadlessDevice;
    use crate::renderer::descriptor::{DescriptorKind, DescriptorLayoutBuilder};

    fn storage_layout(device: &HeadlessDevice) -> vk::DescriptorSetLayout {
        let mut builder = DescriptorLayoutBuilder::new();
        builder.add_binding(0, DescriptorKind::StorageImage);
        builder.build(device, vk::ShaderStageFlags::COMPUTE).unwrap()
    }

    #[test]
    fn test_fixed_pool_exhaustion_and_clear() {
        let device = HeadlessDevice::new();
        let layout = storage_layout(&device);
        let ratios = [PoolSizeRatio::new(DescriptorKind::StorageImage, 1.0)];
        let allocator = DescriptorAllocator::init_pool(&device, 2, &ratios).unwrap();

        let first = allocator.allocate(&device, layout).unwrap();
        allocator.allocate(&device, layout).unwrap();
        let err = allocator.allocate(&device, layout).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Descriptor(DescriptorError::PoolExhausted { fragmented: false })
        ));

        allocator.clear_pool(&device).unwrap();
        assert!(!first.is_valid());
        allocator.allocate(&device, layout).unwrap();
        assert_eq!(device.pools_created(), 1);
    }

    #[test]
    fn test_fixed_pool_fragmented() {
        let device = HeadlessDevice::new();
        let layout = storage_layout(&device);
        let ratios = [PoolSizeRatio::new(DescriptorKind::StorageImage, 1.0)];
        let mut allocator = DescriptorAllocator::init_pool(&device, 8, &ratios).unwrap();

        device.mark_fragmented(allocator.pool().unwrap().raw());
        let err = allocator.allocate(&device, layout).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Descriptor(DescriptorError::PoolExhausted { fragmented: true })
        ));

        allocator.destroy_pool(&device);
        assert!(!allocator.is_initialized());
        assert_eq!(device.live_pools(), 0);

        let err = allocator.allocate(&device, layout).unwrap_err();
        assert!(matches!(err, EngineError::Descriptor(DescriptorError::NotInitialized)));

        // 第二次销毁只记录警告
        allocator.destroy_pool(&device);
        assert!(device.validation_errors().is_empty());
    }

    #[test]
    fn test_invalid_configuration_rejected() {
        let device = HeadlessDevice::new();
        let err = DescriptorAllocator::init_pool(&device, 0, &[PoolSizeRatio::new(DescriptorKind::Sampler, 1.0)])
            .unwrap_err();
        assert!(matches!(err, EngineError::Config(ConfigError::InvalidValue { .. })));
        assert_eq!(device.pools_created(), 0);
    }

    #[test]
    fn test_pool_creation_failure_is_fatal() {
        let device = HeadlessDevice::new();
        device.fail_next_pool_creation();
        let err = DescriptorAllocator::init_pool(&device, 4, &[PoolSizeRatio::new(DescriptorKind::Sampler, 1.0)])
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Graphics(GraphicsError::ResourceCreation {
                result: vk::Result::ERROR_OUT_OF_DEVICE_MEMORY,
                ..
            })
        ));
    }
}
