//! 帧资源环
//!
//! `FRAME_OVERLAP` 个帧槽位按 `frame_number % FRAME_OVERLAP` 轮流使用。
//! 每个槽位独占一套命令上下文、同步对象、删除队列和可增长描述符分配器，
//! 槽位之间不需要互相同步；槽位自身的 Fence 决定它何时可以被复用。

use tracing::debug;

use super::command::CommandContext;
use super::deletion::{DeletionQueue, Disposal};
use super::descriptor::{GrowableDescriptorAllocator, PoolSizeRatio};
use super::sync::FrameSync;
use crate::core::error::{GraphicsError, Result};
use crate::gfx::GpuDevice;

/// 同时在途的帧数量
pub const FRAME_OVERLAP: usize = 2;

/// 单个帧槽位的资源
#[derive(Debug)]
pub struct FrameData {
    pub command: CommandContext,
    pub sync: FrameSync,
    /// 该槽位下次复用时释放的资源
    pub deletion_queue: DeletionQueue,
    /// 该槽位专用的描述符分配器，每次复用时整体重置
    pub descriptors: GrowableDescriptorAllocator,
}

impl FrameData {
    /// 创建槽位资源，Fence 以 signaled 状态创建
    ///
    /// 任何一步失败时，已经创建的对象会被逆序释放。
    pub fn new(device: &dyn GpuDevice, max_sets: u32, ratios: &[PoolSizeRatio]) -> Result<Self> {
        let command = CommandContext::new(device)?;
        let mut created = DeletionQueue::new();
        created.push(Disposal::CommandPool(command.pool()));

        let built = Self::create_sync(device, &mut created).and_then(|sync| {
            let descriptors = GrowableDescriptorAllocator::init(device, max_sets, ratios)?;
            Ok((sync, descriptors))
        });

        match built {
            Ok((sync, descriptors)) => Ok(Self {
                command,
                sync,
                deletion_queue: DeletionQueue::new(),
                descriptors,
            }),
            Err(e) => {
                created.flush(device);
                Err(e)
            }
        }
    }

    fn create_sync(device: &dyn GpuDevice, created: &mut DeletionQueue) -> Result<FrameSync> {
        let render_fence = device
            .create_fence(true)
            .map_err(GraphicsError::creation("render fence"))?;
        created.push(Disposal::Fence(render_fence));

        let swapchain_semaphore = device
            .create_semaphore()
            .map_err(GraphicsError::creation("swapchain semaphore"))?;
        created.push(Disposal::Semaphore(swapchain_semaphore));

        let render_semaphore = device
            .create_semaphore()
            .map_err(GraphicsError::creation("render semaphore"))?;
        created.push(Disposal::Semaphore(render_semaphore));

        Ok(FrameSync {
            swapchain_semaphore,
            render_semaphore,
            render_fence,
        })
    }

    /// 释放槽位的全部资源，调用前 GPU 必须已经空闲
    pub fn destroy(&mut self, device: &dyn GpuDevice) {
        self.deletion_queue.flush(device);
        self.descriptors.destroy_pools(device);
        self.command.destroy(device);
        device.destroy_fence(self.sync.render_fence);
        device.destroy_semaphore(self.sync.render_semaphore);
        device.destroy_semaphore(self.sync.swapchain_semaphore);
    }
}

/// 帧资源环
#[derive(Debug)]
pub struct FrameRing {
    frames: Vec<FrameData>,
    frame_number: u64,
}

impl FrameRing {
    /// 创建 `FRAME_OVERLAP` 个槽位
    pub fn new(device: &dyn GpuDevice, max_sets: u32, ratios: &[PoolSizeRatio]) -> Result<Self> {
        let mut ring = Self {
            frames: Vec::with_capacity(FRAME_OVERLAP),
            frame_number: 0,
        };
        for _ in 0..FRAME_OVERLAP {
            match FrameData::new(device, max_sets, ratios) {
                Ok(frame) => ring.frames.push(frame),
                Err(e) => {
                    ring.destroy(device);
                    return Err(e);
                }
            }
        }
        debug!(count = FRAME_OVERLAP, max_sets, "Created frame ring");

        Ok(ring)
    }

    /// 已提交的帧数
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// 当前槽位索引
    pub fn current_index(&self) -> usize {
        (self.frame_number % FRAME_OVERLAP as u64) as usize
    }

    pub fn current(&self) -> &FrameData {
        &self.frames[self.current_index()]
    }

    pub fn current_mut(&mut self) -> &mut FrameData {
        let index = self.current_index();
        &mut self.frames[index]
    }

    pub fn get(&self, index: usize) -> Option<&FrameData> {
        self.frames.get(index)
    }

    /// 移动到下一帧
    pub fn advance(&mut self) {
        self.frame_number += 1;
    }

    /// 释放所有槽位，调用前 GPU 必须已经空闲
    pub fn destroy(&mut self, device: &dyn GpuDevice) {
        for frame in self.frames.iter_mut() {
            frame.destroy(device);
        }
        self.frames.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::EngineError;
    use crate::gfx::HeadlessDevice;
    use crate::renderer::descriptor::DescriptorKind;

    fn ratios() -> Vec<PoolSizeRatio> {
        vec![PoolSizeRatio::new(DescriptorKind::UniformBuffer, 1.0)]
    }

    #[test]
    fn test_round_robin_selection() {
        let device = HeadlessDevice::new();
        let mut ring = FrameRing::new(&device, 4, &ratios()).unwrap();

        let first = ring.current().sync.render_fence;
        assert_eq!(ring.current_index(), 0);
        ring.advance();
        assert_eq!(ring.current_index(), 1);
        assert_ne!(ring.current().sync.render_fence, first);
        ring.advance();
        assert_eq!(ring.current_index(), 0);
        assert_eq!(ring.current().sync.render_fence, first);
        assert_eq!(ring.frame_number(), 2);
        assert!(ring.get(FRAME_OVERLAP).is_none());
    }

    #[test]
    fn test_fences_start_signaled_and_destroy_releases_everything() {
        let device = HeadlessDevice::new();
        let mut ring = FrameRing::new(&device, 4, &ratios()).unwrap();

        for index in 0..FRAME_OVERLAP {
            let fence = ring.get(index).unwrap().sync.render_fence;
            assert_eq!(device.fence_signaled(fence), Some(true));
        }

        ring.destroy(&device);
        assert_eq!(device.live_objects(), 0);
        assert!(device.validation_errors().is_empty());
    }

    #[test]
    fn test_failed_slot_releases_built_slots() {
        let device = HeadlessDevice::new();

        // 第一个槽位完整创建，第二个槽位的描述符池创建失败
        device.fail_pool_creation_after(1);
        let err = FrameRing::new(&device, 4, &ratios()).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Graphics(GraphicsError::ResourceCreation { what: "descriptor pool", .. })
        ));

        assert_eq!(device.pools_created(), 1);
        assert_eq!(device.live_objects(), 0);
        assert!(device.validation_errors().is_empty());
    }
}
