//! 可增长描述符分配器
//!
//! 池的池：`ready_pools` 是还有余量的池（栈），`full_pools` 是已耗尽或碎片化的池。
//! 每个池任一时刻只属于其中之一。
//!
//! - 栈为空时按 `sets_per_pool` 新建池，随后 `sets_per_pool` 乘以 1.5，上限 4092
//! - 分配失败且原因是池耗尽或碎片化时，把该池移入 `full_pools` 并换一个池重试一次；
//!   第二次失败直接报错
//! - 分配成功后总是把池压回 `ready_pools`，不精确跟踪剩余容量
//! - `clear_pools` 重置所有池并全部放回 `ready_pools`，`sets_per_pool` 保持不变

use ash::vk;
use tracing::{debug, trace};

use super::pool::{DescriptorPool, DescriptorSet, PoolSizeRatio};
use crate::core::config::validate_pool;
use crate::core::error::{DescriptorError, EngineError, GraphicsError, Result};
use crate::gfx::GpuDevice;

/// 单个池的描述符集数量上限
pub const MAX_SETS_PER_POOL: u32 = 4092;

/// 下一个池的大小：乘以 1.5，不超过上限
fn grow(sets: u32) -> u32 {
    ((sets as f64 * 1.5) as u32).min(MAX_SETS_PER_POOL)
}

fn is_exhaustion(result: vk::Result) -> bool {
    matches!(
        result,
        vk::Result::ERROR_OUT_OF_POOL_MEMORY | vk::Result::ERROR_FRAGMENTED_POOL
    )
}

/// 分配器统计信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatorStats {
    /// 累计创建的池数量（包括 `init` 创建的）
    pub pools_created: usize,
    /// 有余量的池数量
    pub ready_count: usize,
    /// 已耗尽的池数量
    pub full_count: usize,
    /// 下一次新建池的大小
    pub sets_per_pool: u32,
}

/// 可增长描述符分配器
#[derive(Debug)]
pub struct GrowableDescriptorAllocator {
    ratios: Vec<PoolSizeRatio>,
    sets_per_pool: u32,
    ready_pools: Vec<DescriptorPool>,
    full_pools: Vec<DescriptorPool>,
    pools_created: usize,
}

impl GrowableDescriptorAllocator {
    /// 创建第一个大小为 `max_sets` 的池
    ///
    /// # 参数
    ///
    /// * `device` - GPU 设备
    /// * `max_sets` - 第一个池的描述符集数量
    /// * `ratios` - 每类描述符相对于描述符集数量的比例，所有池共用
    ///
    /// # 返回值
    ///
    /// 配置无效时返回 `ConfigError`，池创建失败时返回 `GraphicsError`
    pub fn init(device: &dyn GpuDevice, max_sets: u32, ratios: &[PoolSizeRatio]) -> Result<Self> {
        validate_pool("descriptors.frame", max_sets, ratios)?;

        let pool = DescriptorPool::create(device, max_sets, ratios)
            .map_err(GraphicsError::creation("descriptor pool"))?;
        debug!(max_sets, "Created initial growable descriptor pool");

        Ok(Self {
            ratios: ratios.to_vec(),
            sets_per_pool: grow(max_sets),
            ready_pools: vec![pool],
            full_pools: Vec::new(),
            pools_created: 1,
        })
    }

    /// 取一个池：优先复用栈顶，否则新建并增长 `sets_per_pool`
    pub fn get_pool(&mut self, device: &dyn GpuDevice) -> Result<DescriptorPool> {
        if let Some(pool) = self.ready_pools.pop() {
            return Ok(pool);
        }

        let pool = DescriptorPool::create(device, self.sets_per_pool, &self.ratios).map_err(|result| {
            crate::engine_error!(%result, sets = self.sets_per_pool, "Descriptor pool creation failed");
            GraphicsError::creation("descriptor pool")(result)
        })?;
        self.pools_created += 1;
        debug!(
            sets = self.sets_per_pool,
            pools = self.pools_created,
            "Created growable descriptor pool"
        );

        self.sets_per_pool = grow(self.sets_per_pool);
        Ok(pool)
    }

    /// 分配一个描述符集，池耗尽或碎片化时换池重试一次
    pub fn allocate(&mut self, device: &dyn GpuDevice, layout: vk::DescriptorSetLayout) -> Result<DescriptorSet> {
        let pool = self.get_pool(device)?;
        let first = match pool.allocate(device, layout) {
            Ok(set) => {
                self.ready_pools.push(pool);
                return Ok(set);
            }
            Err(result) if is_exhaustion(result) => result,
            Err(result) => {
                self.ready_pools.push(pool);
                return Err(GraphicsError::creation("descriptor set")(result).into());
            }
        };

        crate::engine_warn!(%first, "Descriptor pool exhausted, retrying with another pool");
        self.full_pools.push(pool);

        let pool = self.get_pool(device)?;
        match pool.allocate(device, layout) {
            Ok(set) => {
                self.ready_pools.push(pool);
                Ok(set)
            }
            Err(second) if is_exhaustion(second) => {
                crate::engine_error!(%first, %second, "Descriptor allocation failed after retry");
                self.full_pools.push(pool);
                Err(DescriptorError::ExhaustedAfterRetry { first, second }.into())
            }
            Err(second) => {
                self.ready_pools.push(pool);
                Err(EngineError::from(GraphicsError::creation("descriptor set")(second)))
            }
        }
    }

    /// 重置所有池，全部放回 `ready_pools`
    pub fn clear_pools(&mut self, device: &dyn GpuDevice) -> Result<()> {
        for pool in self.ready_pools.iter().chain(self.full_pools.iter()) {
            pool.reset(device)
                .map_err(GraphicsError::command("descriptor pool reset"))?;
        }
        self.ready_pools.append(&mut self.full_pools);
        trace!(pools = self.ready_pools.len(), "Cleared descriptor pools");
        Ok(())
    }

    /// 销毁所有池，仅在关闭时调用
    pub fn destroy_pools(&mut self, device: &dyn GpuDevice) {
        for pool in self.ready_pools.drain(..).chain(self.full_pools.drain(..)) {
            pool.destroy(device);
        }
    }

    pub fn sets_per_pool(&self) -> u32 {
        self.sets_per_pool
    }

    pub fn stats(&self) -> AllocatorStats {
        AllocatorStats {
            pools_created: self.pools_created,
            ready_count: self.ready_pools.len(),
            full_count: self.full_pools.len(),
            sets_per_pool: self.sets_per_pool,
        }
    }
}
