//! 无窗口软件设备
//!
//! `HeadlessDevice` 在 CPU 上模拟 [`GpuDevice`] 的可观察行为：
//!
//! - 描述符池按类型记录容量，分配超出时返回 `ERROR_OUT_OF_POOL_MEMORY`；
//!   被标记为碎片化的池返回 `ERROR_FRAGMENTED_POOL`
//! - 提交的工作不会立即执行，只有在等待对应 Fence 或设备空闲时才按提交顺序完成
//! - 违反使用规则的调用（重置执行中的命令缓冲区、写入已失效的描述符集、
//!   销毁仍被引用的缓冲区等）记录为校验错误，调用本身继续执行
//! - 所有关键调用按顺序写入日志（[`DeviceEvent`]），测试可以断言调用顺序
//!
//! 所有状态放在一把 `parking_lot::Mutex` 里，因此设备可以在线程间共享。

use std::collections::{HashMap, HashSet};

use ash::prelude::VkResult;
use ash::vk::{self, Handle};
use parking_lot::Mutex;
use tracing::trace;

use super::device::{DescriptorWrite, GpuDevice};
use crate::renderer::command::CommandBufferState;
use crate::renderer::resource::{AllocatedBuffer, AllocatedImage, BufferDescriptor, DeviceAllocation, ImageDescriptor};
use crate::renderer::sync::SubmitInfo;

/// 设备调用日志条目
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    CreatePool { pool: vk::DescriptorPool, max_sets: u32 },
    ResetPool(vk::DescriptorPool),
    DestroyPool(vk::DescriptorPool),
    UpdateDescriptorSets { count: usize },
    BeginCommandBuffer(vk::CommandBuffer),
    WaitFence(vk::Fence),
    ResetFence(vk::Fence),
    Submit { command_buffer: vk::CommandBuffer, fence: vk::Fence },
    WaitIdle,
    DestroyBuffer(vk::Buffer),
    DestroyImage(vk::Image),
    DestroySampler(vk::Sampler),
    DestroyLayout(vk::DescriptorSetLayout),
    DestroyFence(vk::Fence),
    DestroySemaphore(vk::Semaphore),
    DestroyCommandPool(vk::CommandPool),
}

/// 描述符布局中单个绑定的形状
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutBindingShape {
    pub binding: u32,
    pub descriptor_type: vk::DescriptorType,
    pub count: u32,
    pub stages: vk::ShaderStageFlags,
}

#[derive(Debug, Default)]
struct PoolState {
    max_sets: u32,
    capacity: HashMap<vk::DescriptorType, u32>,
    used: HashMap<vk::DescriptorType, u32>,
    live_sets: u32,
    fragmented: bool,
}

#[derive(Debug)]
struct SetState {
    pool: vk::DescriptorPool,
    writes: Vec<DescriptorWrite>,
}

#[derive(Debug, Clone)]
struct CopyOp {
    src: vk::Buffer,
    dst: vk::Buffer,
    regions: Vec<vk::BufferCopy>,
}

#[derive(Debug)]
struct CommandBufferRecord {
    pool: vk::CommandPool,
    state: CommandBufferState,
    ops: Vec<CopyOp>,
}

#[derive(Debug)]
struct Submission {
    command_buffer: vk::CommandBuffer,
    fence: vk::Fence,
    ops: Vec<CopyOp>,
}

#[derive(Debug)]
struct BufferState {
    data: Vec<u8>,
    host_visible: bool,
}

#[derive(Debug, Default)]
struct State {
    next_handle: u64,
    layouts: HashMap<vk::DescriptorSetLayout, Vec<LayoutBindingShape>>,
    pools: HashMap<vk::DescriptorPool, PoolState>,
    sets: HashMap<vk::DescriptorSet, SetState>,
    command_pools: HashSet<vk::CommandPool>,
    command_buffers: HashMap<vk::CommandBuffer, CommandBufferRecord>,
    fences: HashMap<vk::Fence, bool>,
    semaphores: HashSet<vk::Semaphore>,
    buffers: HashMap<vk::Buffer, BufferState>,
    images: HashSet<vk::Image>,
    samplers: HashSet<vk::Sampler>,
    pending: Vec<Submission>,
    journal: Vec<DeviceEvent>,
    validation_errors: Vec<String>,
    pools_created: usize,
    hang: bool,
    fail_pool_creation_in: Option<usize>,
}

impl State {
    fn next_raw(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn invalid(&mut self, message: String) {
        trace!(%message, "Headless validation error");
        self.validation_errors.push(message);
    }

    /// 按提交顺序完成前 `count` 个提交
    fn complete(&mut self, count: usize) {
        let done: Vec<Submission> = self.pending.drain(..count).collect();
        for submission in done {
            for op in &submission.ops {
                self.execute_copy(op);
            }
            if let Some(record) = self.command_buffers.get_mut(&submission.command_buffer) {
                record.state = CommandBufferState::Invalid;
            }
            if let Some(signaled) = self.fences.get_mut(&submission.fence) {
                *signaled = true;
            }
        }
    }

    fn complete_all(&mut self) {
        let count = self.pending.len();
        self.complete(count);
    }

    fn execute_copy(&mut self, op: &CopyOp) {
        let src = match self.buffers.get(&op.src) {
            Some(src) => src.data.clone(),
            None => {
                self.invalid(format!("copy from destroyed buffer {:#x}", op.src.as_raw()));
                return;
            }
        };
        let Some(dst) = self.buffers.get_mut(&op.dst) else {
            self.invalid(format!("copy into destroyed buffer {:#x}", op.dst.as_raw()));
            return;
        };

        let mut out_of_bounds = None;
        for region in &op.regions {
            let src_range = region.src_offset as usize..(region.src_offset + region.size) as usize;
            let dst_range = region.dst_offset as usize..(region.dst_offset + region.size) as usize;
            if src_range.end > src.len() || dst_range.end > dst.data.len() {
                out_of_bounds = Some(*region);
                break;
            }
            dst.data[dst_range].copy_from_slice(&src[src_range]);
        }

        if let Some(region) = out_of_bounds {
            self.invalid(format!("copy region {:?} out of bounds", region));
        }
    }

    fn buffer_in_flight(&self, buffer: vk::Buffer) -> bool {
        self.pending
            .iter()
            .flat_map(|s| s.ops.iter())
            .any(|op| op.src == buffer || op.dst == buffer)
    }
}

/// 确定性的软件 GPU
#[derive(Debug, Default)]
pub struct HeadlessDevice {
    state: Mutex<State>,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- 测试钩子 ----

    /// 模拟设备挂起：挂起期间所有 Fence 等待都会超时
    pub fn set_hang(&self, hang: bool) {
        self.state.lock().hang = hang;
    }

    /// 下一次描述符池创建失败（`ERROR_OUT_OF_DEVICE_MEMORY`）
    pub fn fail_next_pool_creation(&self) {
        self.fail_pool_creation_after(0);
    }

    /// 再成功创建 `successes` 个描述符池之后，下一次创建失败
    pub fn fail_pool_creation_after(&self, successes: usize) {
        self.state.lock().fail_pool_creation_in = Some(successes);
    }

    /// 将池标记为碎片化，直到下一次重置
    pub fn mark_fragmented(&self, pool: vk::DescriptorPool) {
        if let Some(state) = self.state.lock().pools.get_mut(&pool) {
            state.fragmented = true;
        }
    }

    /// 完成所有已提交的工作（忽略挂起状态）
    pub fn complete_all(&self) {
        self.state.lock().complete_all();
    }

    /// 读取缓冲区内容
    pub fn read_buffer(&self, buffer: vk::Buffer) -> Option<Vec<u8>> {
        self.state.lock().buffers.get(&buffer).map(|b| b.data.clone())
    }

    /// 描述符集当前的绑定内容
    pub fn descriptor_writes(&self, set: vk::DescriptorSet) -> Vec<DescriptorWrite> {
        self.state
            .lock()
            .sets
            .get(&set)
            .map(|s| s.writes.clone())
            .unwrap_or_default()
    }

    /// 累计创建的描述符池数量
    pub fn pools_created(&self) -> usize {
        self.state.lock().pools_created
    }

    /// 当前存活的描述符池数量
    pub fn live_pools(&self) -> usize {
        self.state.lock().pools.len()
    }

    /// 池中已分配的描述符集数量
    pub fn pool_live_sets(&self, pool: vk::DescriptorPool) -> Option<u32> {
        self.state.lock().pools.get(&pool).map(|p| p.live_sets)
    }

    pub fn layout_bindings(&self, layout: vk::DescriptorSetLayout) -> Option<Vec<LayoutBindingShape>> {
        self.state.lock().layouts.get(&layout).cloned()
    }

    pub fn command_buffer_state(&self, buffer: vk::CommandBuffer) -> Option<CommandBufferState> {
        self.state.lock().command_buffers.get(&buffer).map(|r| r.state)
    }

    pub fn fence_signaled(&self, fence: vk::Fence) -> Option<bool> {
        self.state.lock().fences.get(&fence).copied()
    }

    /// 尚未完成的提交数量
    pub fn pending_submissions(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// 所有存活的设备对象数量，用于检查泄漏
    pub fn live_objects(&self) -> usize {
        let state = self.state.lock();
        state.layouts.len()
            + state.pools.len()
            + state.command_pools.len()
            + state.fences.len()
            + state.semaphores.len()
            + state.buffers.len()
            + state.images.len()
            + state.samplers.len()
    }

    pub fn journal(&self) -> Vec<DeviceEvent> {
        self.state.lock().journal.clone()
    }

    pub fn clear_journal(&self) {
        self.state.lock().journal.clear();
    }

    pub fn validation_errors(&self) -> Vec<String> {
        self.state.lock().validation_errors.clone()
    }
}

impl GpuDevice for HeadlessDevice {
    fn create_descriptor_set_layout(
        &self,
        bindings: &[vk::DescriptorSetLayoutBinding],
        _flags: vk::DescriptorSetLayoutCreateFlags,
    ) -> VkResult<vk::DescriptorSetLayout> {
        let mut state = self.state.lock();
        let layout = vk::DescriptorSetLayout::from_raw(state.next_raw());
        let shapes = bindings
            .iter()
            .map(|b| LayoutBindingShape {
                binding: b.binding,
                descriptor_type: b.descriptor_type,
                count: b.descriptor_count,
                stages: b.stage_flags,
            })
            .collect();
        state.layouts.insert(layout, shapes);
        Ok(layout)
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        let mut state = self.state.lock();
        if state.layouts.remove(&layout).is_none() {
            state.invalid(format!("destroy of unknown layout {:#x}", layout.as_raw()));
        }
        state.journal.push(DeviceEvent::DestroyLayout(layout));
    }

    fn create_descriptor_pool(
        &self,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
    ) -> VkResult<vk::DescriptorPool> {
        let mut state = self.state.lock();
        match state.fail_pool_creation_in {
            Some(0) => {
                state.fail_pool_creation_in = None;
                return Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
            }
            Some(n) => state.fail_pool_creation_in = Some(n - 1),
            None => {}
        }

        let mut capacity = HashMap::new();
        for size in pool_sizes {
            *capacity.entry(size.ty).or_insert(0) += size.descriptor_count;
        }

        let pool = vk::DescriptorPool::from_raw(state.next_raw());
        state.pools.insert(
            pool,
            PoolState {
                max_sets,
                capacity,
                ..Default::default()
            },
        );
        state.pools_created += 1;
        state.journal.push(DeviceEvent::CreatePool { pool, max_sets });
        Ok(pool)
    }

    fn reset_descriptor_pool(&self, pool: vk::DescriptorPool) -> VkResult<()> {
        let mut state = self.state.lock();
        let Some(pool_state) = state.pools.get_mut(&pool) else {
            state.invalid(format!("reset of unknown descriptor pool {:#x}", pool.as_raw()));
            return Err(vk::Result::ERROR_UNKNOWN);
        };
        pool_state.used.clear();
        pool_state.live_sets = 0;
        pool_state.fragmented = false;
        state.sets.retain(|_, set| set.pool != pool);
        state.journal.push(DeviceEvent::ResetPool(pool));
        Ok(())
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        let mut state = self.state.lock();
        if state.pools.remove(&pool).is_none() {
            state.invalid(format!("destroy of unknown descriptor pool {:#x}", pool.as_raw()));
        }
        state.sets.retain(|_, set| set.pool != pool);
        state.journal.push(DeviceEvent::DestroyPool(pool));
    }

    fn allocate_descriptor_set(
        &self,
        pool: vk::DescriptorPool,
        layout: vk::DescriptorSetLayout,
    ) -> VkResult<vk::DescriptorSet> {
        let mut state = self.state.lock();
        let Some(shapes) = state.layouts.get(&layout).cloned() else {
            state.invalid(format!("allocate with unknown layout {:#x}", layout.as_raw()));
            return Err(vk::Result::ERROR_UNKNOWN);
        };
        let Some(pool_state) = state.pools.get_mut(&pool) else {
            state.invalid(format!("allocate from unknown descriptor pool {:#x}", pool.as_raw()));
            return Err(vk::Result::ERROR_UNKNOWN);
        };

        if pool_state.fragmented {
            return Err(vk::Result::ERROR_FRAGMENTED_POOL);
        }
        if pool_state.live_sets >= pool_state.max_sets {
            return Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY);
        }

        let mut demand: HashMap<vk::DescriptorType, u32> = HashMap::new();
        for shape in &shapes {
            *demand.entry(shape.descriptor_type).or_insert(0) += shape.count;
        }
        for (ty, count) in &demand {
            let capacity = pool_state.capacity.get(ty).copied().unwrap_or(0);
            let used = pool_state.used.get(ty).copied().unwrap_or(0);
            if used + count > capacity {
                return Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY);
            }
        }
        for (ty, count) in demand {
            *pool_state.used.entry(ty).or_insert(0) += count;
        }
        pool_state.live_sets += 1;

        let set = vk::DescriptorSet::from_raw(state.next_raw());
        state.sets.insert(set, SetState { pool, writes: Vec::new() });
        Ok(set)
    }

    fn update_descriptor_sets(&self, writes: &[DescriptorWrite]) {
        let mut state = self.state.lock();
        for write in writes {
            let Some(set) = state.sets.get_mut(&write.dst_set) else {
                state.invalid(format!("write to stale descriptor set {:#x}", write.dst_set.as_raw()));
                continue;
            };
            set.writes.retain(|w| w.binding != write.binding);
            set.writes.push(*write);
        }
        state.journal.push(DeviceEvent::UpdateDescriptorSets { count: writes.len() });
    }

    fn create_command_pool(&self) -> VkResult<vk::CommandPool> {
        let mut state = self.state.lock();
        let pool = vk::CommandPool::from_raw(state.next_raw());
        state.command_pools.insert(pool);
        Ok(pool)
    }

    fn allocate_command_buffer(&self, pool: vk::CommandPool) -> VkResult<vk::CommandBuffer> {
        let mut state = self.state.lock();
        if !state.command_pools.contains(&pool) {
            state.invalid(format!("allocate from unknown command pool {:#x}", pool.as_raw()));
            return Err(vk::Result::ERROR_UNKNOWN);
        }
        let buffer = vk::CommandBuffer::from_raw(state.next_raw());
        state.command_buffers.insert(
            buffer,
            CommandBufferRecord {
                pool,
                state: CommandBufferState::Initial,
                ops: Vec::new(),
            },
        );
        Ok(buffer)
    }

    fn reset_command_buffer(&self, buffer: vk::CommandBuffer) -> VkResult<()> {
        let mut state = self.state.lock();
        let Some(record) = state.command_buffers.get_mut(&buffer) else {
            return Err(vk::Result::ERROR_UNKNOWN);
        };
        let was = record.state;
        record.state = CommandBufferState::Initial;
        record.ops.clear();
        if !was.can_reset() {
            state.invalid(format!("reset of pending command buffer {:#x}", buffer.as_raw()));
        }
        Ok(())
    }

    fn begin_command_buffer(&self, buffer: vk::CommandBuffer) -> VkResult<()> {
        let mut state = self.state.lock();
        let Some(record) = state.command_buffers.get_mut(&buffer) else {
            return Err(vk::Result::ERROR_UNKNOWN);
        };
        let was = record.state;
        record.state = CommandBufferState::Recording;
        if !was.can_begin() {
            state.invalid(format!("begin on command buffer {:#x} in state {:?}", buffer.as_raw(), was));
        }
        state.journal.push(DeviceEvent::BeginCommandBuffer(buffer));
        Ok(())
    }

    fn end_command_buffer(&self, buffer: vk::CommandBuffer) -> VkResult<()> {
        let mut state = self.state.lock();
        let Some(record) = state.command_buffers.get_mut(&buffer) else {
            return Err(vk::Result::ERROR_UNKNOWN);
        };
        let was = record.state;
        record.state = CommandBufferState::Executable;
        if was != CommandBufferState::Recording {
            state.invalid(format!("end on command buffer {:#x} in state {:?}", buffer.as_raw(), was));
        }
        Ok(())
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        let mut state = self.state.lock();
        if !state.command_pools.remove(&pool) {
            state.invalid(format!("destroy of unknown command pool {:#x}", pool.as_raw()));
        }
        let pending = state
            .command_buffers
            .values()
            .any(|r| r.pool == pool && r.state == CommandBufferState::Pending);
        if pending {
            state.invalid(format!("command pool {:#x} destroyed while in use", pool.as_raw()));
        }
        state.command_buffers.retain(|_, r| r.pool != pool);
        state.journal.push(DeviceEvent::DestroyCommandPool(pool));
    }

    fn cmd_copy_buffer(
        &self,
        buffer: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Buffer,
        regions: &[vk::BufferCopy],
    ) {
        let mut state = self.state.lock();
        let recording = match state.command_buffers.get_mut(&buffer) {
            Some(record) if record.state == CommandBufferState::Recording => {
                record.ops.push(CopyOp {
                    src,
                    dst,
                    regions: regions.to_vec(),
                });
                true
            }
            _ => false,
        };
        if !recording {
            state.invalid(format!("copy recorded outside recording state on {:#x}", buffer.as_raw()));
        }
    }

    fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence> {
        let mut state = self.state.lock();
        let fence = vk::Fence::from_raw(state.next_raw());
        state.fences.insert(fence, signaled);
        Ok(fence)
    }

    fn wait_for_fence(&self, fence: vk::Fence, _timeout_ns: u64) -> VkResult<()> {
        let mut state = self.state.lock();
        state.journal.push(DeviceEvent::WaitFence(fence));
        if !state.fences.contains_key(&fence) {
            state.invalid(format!("wait on unknown fence {:#x}", fence.as_raw()));
            return Err(vk::Result::ERROR_UNKNOWN);
        }
        if state.hang {
            return Err(vk::Result::TIMEOUT);
        }

        if let Some(last) = state.pending.iter().rposition(|s| s.fence == fence) {
            state.complete(last + 1);
        }

        match state.fences.get(&fence) {
            Some(true) => Ok(()),
            _ => Err(vk::Result::TIMEOUT),
        }
    }

    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()> {
        let mut state = self.state.lock();
        if state.pending.iter().any(|s| s.fence == fence) {
            state.invalid(format!("reset of in-flight fence {:#x}", fence.as_raw()));
        }
        match state.fences.get_mut(&fence) {
            Some(signaled) => *signaled = false,
            None => return Err(vk::Result::ERROR_UNKNOWN),
        }
        state.journal.push(DeviceEvent::ResetFence(fence));
        Ok(())
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        let mut state = self.state.lock();
        if state.pending.iter().any(|s| s.fence == fence) {
            state.invalid(format!("fence {:#x} destroyed while in use", fence.as_raw()));
        }
        if state.fences.remove(&fence).is_none() {
            state.invalid(format!("destroy of unknown fence {:#x}", fence.as_raw()));
        }
        state.journal.push(DeviceEvent::DestroyFence(fence));
    }

    fn create_semaphore(&self) -> VkResult<vk::Semaphore> {
        let mut state = self.state.lock();
        let semaphore = vk::Semaphore::from_raw(state.next_raw());
        state.semaphores.insert(semaphore);
        Ok(semaphore)
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        let mut state = self.state.lock();
        if !state.semaphores.remove(&semaphore) {
            state.invalid(format!("destroy of unknown semaphore {:#x}", semaphore.as_raw()));
        }
        state.journal.push(DeviceEvent::DestroySemaphore(semaphore));
    }

    fn queue_submit(&self, submit: &SubmitInfo, fence: vk::Fence) -> VkResult<()> {
        let mut state = self.state.lock();
        let command_buffer = submit.command_buffer;

        let Some(record) = state.command_buffers.get_mut(&command_buffer) else {
            return Err(vk::Result::ERROR_UNKNOWN);
        };
        let was = record.state;
        record.state = CommandBufferState::Pending;
        let ops = record.ops.clone();
        if !was.can_submit() {
            state.invalid(format!("submit of command buffer {:#x} in state {:?}", command_buffer.as_raw(), was));
        }

        let semaphores = submit.wait.map(|(s, _)| s).into_iter().chain(submit.signal);
        for semaphore in semaphores {
            if !state.semaphores.contains(&semaphore) {
                state.invalid(format!("submit references unknown semaphore {:#x}", semaphore.as_raw()));
            }
        }

        if fence != vk::Fence::null() {
            match state.fences.get(&fence).copied() {
                Some(true) => state.invalid(format!("submit with signaled fence {:#x}", fence.as_raw())),
                Some(false) if state.pending.iter().any(|s| s.fence == fence) => {
                    state.invalid(format!("submit with in-flight fence {:#x}", fence.as_raw()))
                }
                Some(false) => {}
                None => return Err(vk::Result::ERROR_UNKNOWN),
            }
        }

        state.pending.push(Submission { command_buffer, fence, ops });
        state.journal.push(DeviceEvent::Submit { command_buffer, fence });
        Ok(())
    }

    fn device_wait_idle(&self) -> VkResult<()> {
        let mut state = self.state.lock();
        state.journal.push(DeviceEvent::WaitIdle);
        if state.hang {
            return Err(vk::Result::ERROR_DEVICE_LOST);
        }
        state.complete_all();
        Ok(())
    }

    fn create_buffer(&self, desc: &BufferDescriptor) -> VkResult<AllocatedBuffer> {
        let mut state = self.state.lock();
        let size = desc.aligned_size();
        let buffer = vk::Buffer::from_raw(state.next_raw());
        state.buffers.insert(
            buffer,
            BufferState {
                data: vec![0; size as usize],
                host_visible: desc.memory_type.is_host_visible(),
            },
        );
        Ok(AllocatedBuffer {
            buffer,
            allocation: DeviceAllocation::Headless,
            size,
            memory_type: desc.memory_type,
        })
    }

    fn write_buffer(&self, buffer: &mut AllocatedBuffer, offset: u64, data: &[u8]) -> VkResult<()> {
        let mut state = self.state.lock();
        let Some(target) = state.buffers.get_mut(&buffer.buffer) else {
            return Err(vk::Result::ERROR_UNKNOWN);
        };
        if !target.host_visible {
            return Err(vk::Result::ERROR_MEMORY_MAP_FAILED);
        }
        let start = offset as usize;
        let end = start + data.len();
        if end > target.data.len() {
            return Err(vk::Result::ERROR_MEMORY_MAP_FAILED);
        }
        target.data[start..end].copy_from_slice(data);
        Ok(())
    }

    fn destroy_buffer(&self, buffer: AllocatedBuffer) {
        let mut state = self.state.lock();
        if state.buffer_in_flight(buffer.buffer) {
            state.invalid(format!("buffer {:#x} destroyed while in use", buffer.buffer.as_raw()));
        }
        if state.buffers.remove(&buffer.buffer).is_none() {
            state.invalid(format!("destroy of unknown buffer {:#x}", buffer.buffer.as_raw()));
        }
        state.journal.push(DeviceEvent::DestroyBuffer(buffer.buffer));
    }

    fn create_image(&self, desc: &ImageDescriptor) -> VkResult<AllocatedImage> {
        let mut state = self.state.lock();
        let image = vk::Image::from_raw(state.next_raw());
        let view = vk::ImageView::from_raw(state.next_raw());
        state.images.insert(image);
        Ok(AllocatedImage {
            image,
            view,
            allocation: DeviceAllocation::Headless,
            extent: desc.extent,
            format: desc.format,
        })
    }

    fn destroy_image(&self, image: AllocatedImage) {
        let mut state = self.state.lock();
        if !state.images.remove(&image.image) {
            state.invalid(format!("destroy of unknown image {:#x}", image.image.as_raw()));
        }
        state.journal.push(DeviceEvent::DestroyImage(image.image));
    }

    fn create_sampler(&self, _filter: vk::Filter) -> VkResult<vk::Sampler> {
        let mut state = self.state.lock();
        let sampler = vk::Sampler::from_raw(state.next_raw());
        state.samplers.insert(sampler);
        Ok(sampler)
    }

    fn destroy_sampler(&self, sampler: vk::Sampler) {
        let mut state = self.state.lock();
        if !state.samplers.remove(&sampler) {
            state.invalid(format!("destroy of unknown sampler {:#x}", sampler.as_raw()));
        }
        state.journal.push(DeviceEvent::DestroySampler(sampler));
    }
}
