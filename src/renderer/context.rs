//! 渲染上下文
//!
//! `RenderContext` 是显式传递的引擎状态：设备句柄、全局删除队列、
//! 全局固定描述符分配器、帧资源环和立即提交器都由它持有，不存在全局单例。
//!
//! # 每帧流程
//!
//! 1. 等待当前槽位的 Fence（`FRAME_OVERLAP` 帧之前的提交），这是唯一的背压手段
//! 2. 刷新该槽位的删除队列，重置它的描述符池
//! 3. 重置 Fence
//! 4. 录制命令，从该槽位的分配器分配描述符集
//! 5. 提交，触发该槽位的渲染 Semaphore 和 Fence

use std::sync::Arc;

use ash::vk;
use tracing::{debug, trace};

use super::deletion::{DeletionQueue, Disposal};
use super::descriptor::{DescriptorAllocator, DescriptorSet, DescriptorWriter};
use super::frame::{FrameData, FrameRing};
use super::immediate::ImmediateSubmitter;
use super::resource::{AllocatedBuffer, BufferDescriptor, BufferUsageType, GpuMeshBuffers, MemoryType};
use super::sync::{PipelineStage, SubmitInfo};
use super::vertex::Vertex;
use crate::core::config::{Config, SyncConfig};
use crate::core::error::{GraphicsError, Result};
use crate::gfx::GpuDevice;

/// 渲染上下文
pub struct RenderContext {
    device: Arc<dyn GpuDevice>,
    sync: SyncConfig,
    frames: FrameRing,
    immediate: ImmediateSubmitter,
    global_descriptors: DescriptorAllocator,
    main_deletion_queue: DeletionQueue,
    cleaned_up: bool,
}

impl RenderContext {
    /// 初始化命令、同步对象和描述符分配器
    ///
    /// # 参数
    ///
    /// * `device` - GPU 设备
    /// * `config` - 引擎配置，初始化前会先校验
    pub fn new(device: Arc<dyn GpuDevice>, config: &Config) -> Result<Self> {
        config.validate()?;
        let descriptors = &config.descriptors;

        let mut frames = FrameRing::new(device.as_ref(), descriptors.frame_max_sets, &descriptors.frame_ratios)?;
        let immediate = match ImmediateSubmitter::new(device.as_ref(), config.sync.immediate_timeout_ns) {
            Ok(immediate) => immediate,
            Err(e) => {
                frames.destroy(device.as_ref());
                return Err(e);
            }
        };
        let global_descriptors = match DescriptorAllocator::init_pool(
            device.as_ref(),
            descriptors.global_max_sets,
            &descriptors.global_ratios,
        ) {
            Ok(allocator) => allocator,
            Err(e) => {
                immediate.destroy(device.as_ref());
                frames.destroy(device.as_ref());
                return Err(e);
            }
        };

        crate::engine_info!(
            frame_max_sets = descriptors.frame_max_sets,
            global_max_sets = descriptors.global_max_sets,
            "Render context initialized"
        );

        Ok(Self {
            device,
            sync: config.sync.clone(),
            frames,
            immediate,
            global_descriptors,
            main_deletion_queue: DeletionQueue::new(),
            cleaned_up: false,
        })
    }

    pub fn device(&self) -> &dyn GpuDevice {
        self.device.as_ref()
    }

    /// 已提交的帧数
    pub fn frame_number(&self) -> u64 {
        self.frames.frame_number()
    }

    pub fn get_current_frame(&self) -> &FrameData {
        self.frames.current()
    }

    pub fn get_current_frame_mut(&mut self) -> &mut FrameData {
        self.frames.current_mut()
    }

    /// 当前帧的命令缓冲区
    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.frames.current().command.buffer()
    }

    /// 开始一帧：等待槽位 Fence，回收槽位资源，开始录制
    pub fn begin_frame(&mut self) -> Result<()> {
        let device = self.device.as_ref();
        let timeout_ns = self.sync.frame_timeout_ns;
        let frame_number = self.frames.frame_number();
        let frame = self.frames.current_mut();

        device
            .wait_for_fence(frame.sync.render_fence, timeout_ns)
            .map_err(|result| {
                crate::engine_error!(%result, frame_number, timeout_ns, "Render fence wait failed");
                GraphicsError::wait("render fence", timeout_ns)(result)
            })?;

        frame.deletion_queue.flush(device);
        frame.descriptors.clear_pools(device)?;

        device
            .reset_fence(frame.sync.render_fence)
            .map_err(GraphicsError::command("render fence reset"))?;
        frame.command.begin(device)?;

        trace!(frame_number, "Frame begun");
        Ok(())
    }

    /// 结束录制并提交
    ///
    /// `wait_for_acquire` 为真时提交等待交换链图像获取完成的 Semaphore。
    pub fn end_frame(&mut self, wait_for_acquire: bool) -> Result<()> {
        let device = self.device.as_ref();
        let frame = self.frames.current();

        frame.command.end(device)?;

        let mut submit = SubmitInfo::command_only(frame.command.buffer()).signal(frame.sync.render_semaphore);
        if wait_for_acquire {
            submit = submit.wait_on(frame.sync.swapchain_semaphore, PipelineStage::ColorOutput);
        }
        device
            .queue_submit(&submit, frame.sync.render_fence)
            .map_err(GraphicsError::command("frame submit"))?;

        trace!(frame_number = self.frames.frame_number(), "Frame submitted");
        self.frames.advance();
        Ok(())
    }

    /// 完整执行一帧
    ///
    /// `record` 返回错误时，已经开始的命令缓冲区会以空提交结束并触发槽位 Fence，
    /// 该帧不计数，下一次调用复用同一个槽位。
    pub fn draw_frame<F>(&mut self, record: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        self.begin_frame()?;
        if let Err(e) = record(self) {
            self.abandon_frame();
            return Err(e);
        }
        self.end_frame(false)
    }

    /// 结束录制中的命令缓冲区并提交，只为了让槽位 Fence 再次触发
    fn abandon_frame(&self) {
        let device = self.device.as_ref();
        let frame_number = self.frames.frame_number();
        let frame = self.frames.current();

        let submitted = frame.command.end(device).and_then(|()| {
            device
                .queue_submit(&SubmitInfo::command_only(frame.command.buffer()), frame.sync.render_fence)
                .map_err(|result| GraphicsError::command("abandoned frame submit")(result).into())
        });
        match submitted {
            Ok(()) => crate::engine_warn!(frame_number, "Frame recording failed, slot fence re-armed"),
            Err(e) => crate::engine_error!(frame_number, "Failed to re-arm slot fence: {}", e),
        }
    }

    /// 从当前帧槽位的分配器分配描述符集，下次复用该槽位时失效
    pub fn allocate_frame_set(&mut self, layout: vk::DescriptorSetLayout) -> Result<DescriptorSet> {
        let device = self.device.as_ref();
        self.frames.current_mut().descriptors.allocate(device, layout)
    }

    /// 从全局固定分配器分配描述符集
    pub fn allocate_global_set(&self, layout: vk::DescriptorSetLayout) -> Result<DescriptorSet> {
        self.global_descriptors.allocate(self.device.as_ref(), layout)
    }

    /// 把写入器中的绑定应用到描述符集
    pub fn update_set(&self, writer: &mut DescriptorWriter, set: &DescriptorSet) -> Result<()> {
        writer.update_set(self.device.as_ref(), set)
    }

    /// 推迟到当前帧槽位下次复用时释放
    pub fn defer_frame(&mut self, disposal: Disposal) {
        self.frames.current_mut().deletion_queue.push(disposal);
    }

    /// 推迟到关闭时释放
    pub fn defer_global(&mut self, disposal: Disposal) {
        self.main_deletion_queue.push(disposal);
    }

    /// 同步执行一批命令
    pub fn immediate_submit<F>(&self, record: F) -> Result<()>
    where
        F: FnOnce(&dyn GpuDevice, vk::CommandBuffer),
    {
        self.immediate.submit(self.device.as_ref(), record)
    }

    pub fn create_buffer(&self, desc: &BufferDescriptor) -> Result<AllocatedBuffer> {
        let buffer = self
            .device
            .create_buffer(desc)
            .map_err(GraphicsError::creation("buffer"))?;
        Ok(buffer)
    }

    /// 写入 CPU 可见的缓冲区
    pub fn write_buffer(&self, buffer: &mut AllocatedBuffer, offset: u64, data: &[u8]) -> Result<()> {
        self.device
            .write_buffer(buffer, offset, data)
            .map_err(GraphicsError::command("buffer write"))?;
        Ok(())
    }

    /// 立即销毁缓冲区，调用者保证 GPU 不再使用它
    pub fn destroy_buffer(&self, buffer: AllocatedBuffer) {
        self.device.destroy_buffer(buffer);
    }

    /// 通过暂存缓冲区把数据上传到 GPU 本地内存
    ///
    /// 空数据返回 `GraphicsError::EmptyUpload`，不创建任何对象。
    pub fn upload_buffer(&self, data: &[u8], usage: BufferUsageType) -> Result<AllocatedBuffer> {
        if data.is_empty() {
            return Err(GraphicsError::EmptyUpload { what: "buffer" }.into());
        }
        let size = data.len() as u64;
        let buffer = self.create_buffer(
            &BufferDescriptor::new(size, usage, MemoryType::DeviceLocal)
                .with_usage(vk::BufferUsageFlags::TRANSFER_DST),
        )?;

        let mut staging = self.create_buffer(&BufferDescriptor::staging(size))?;
        self.write_buffer(&mut staging, 0, data)?;

        let copied = self.immediate_submit(|device, cmd| {
            let region = vk::BufferCopy { src_offset: 0, dst_offset: 0, size };
            device.cmd_copy_buffer(cmd, staging.buffer, buffer.buffer, &[region]);
        });
        if copied.is_ok() {
            self.destroy_buffer(staging);
        }
        copied?;

        debug!(size, ?usage, "Uploaded buffer");
        Ok(buffer)
    }

    /// 上传网格：一个暂存缓冲区，两次复制
    pub fn upload_mesh(&self, vertices: &[Vertex], indices: &[u32]) -> Result<GpuMeshBuffers> {
        if vertices.is_empty() {
            return Err(GraphicsError::EmptyUpload { what: "mesh vertices" }.into());
        }
        if indices.is_empty() {
            return Err(GraphicsError::EmptyUpload { what: "mesh indices" }.into());
        }
        let vertex_bytes: &[u8] = bytemuck::cast_slice(vertices);
        let index_bytes: &[u8] = bytemuck::cast_slice(indices);
        let vertex_size = vertex_bytes.len() as u64;
        let index_size = index_bytes.len() as u64;

        let vertex_buffer = self.create_buffer(
            &BufferDescriptor::new(vertex_size, BufferUsageType::Vertex, MemoryType::DeviceLocal)
                .with_usage(vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::TRANSFER_DST)
                .with_name("mesh vertices"),
        )?;
        let index_buffer = self.create_buffer(
            &BufferDescriptor::new(index_size, BufferUsageType::Index, MemoryType::DeviceLocal)
                .with_usage(vk::BufferUsageFlags::TRANSFER_DST)
                .with_name("mesh indices"),
        )?;

        let mut staging = self.create_buffer(&BufferDescriptor::staging(vertex_size + index_size))?;
        self.write_buffer(&mut staging, 0, vertex_bytes)?;
        self.write_buffer(&mut staging, vertex_size, index_bytes)?;

        let copied = self.immediate_submit(|device, cmd| {
            let vertex_copy = vk::BufferCopy { src_offset: 0, dst_offset: 0, size: vertex_size };
            device.cmd_copy_buffer(cmd, staging.buffer, vertex_buffer.buffer, &[vertex_copy]);

            let index_copy = vk::BufferCopy { src_offset: vertex_size, dst_offset: 0, size: index_size };
            device.cmd_copy_buffer(cmd, staging.buffer, index_buffer.buffer, &[index_copy]);
        });
        if copied.is_ok() {
            self.destroy_buffer(staging);
        }
        copied?;

        debug!(vertices = vertices.len(), indices = indices.len(), "Uploaded mesh");
        Ok(GpuMeshBuffers {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
        })
    }

    /// 释放所有资源
    ///
    /// 顺序：等待设备空闲，释放各帧槽位（含其删除队列），释放立即提交器，
    /// 销毁全局描述符池，最后刷新全局删除队列。可以重复调用。
    pub fn cleanup(&mut self) -> Result<()> {
        if self.cleaned_up {
            return Ok(());
        }

        let device = self.device.as_ref();
        device
            .device_wait_idle()
            .map_err(GraphicsError::command("device wait idle"))?;

        self.frames.destroy(device);
        self.immediate.destroy(device);
        self.global_descriptors.destroy_pool(device);
        self.main_deletion_queue.flush(device);

        self.cleaned_up = true;
        crate::engine_info!(frames = self.frames.frame_number(), "Render context cleaned up");
        Ok(())
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        if let Err(e) = self.cleanup() {
            crate::engine_error!("Render context cleanup failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{DescriptorError, EngineError};
    use crate::gfx::{DeviceEvent, HeadlessDevice, WriteInfo};
    use crate::renderer::command::CommandBufferState;
    use crate::renderer::descriptor::{DescriptorKind, DescriptorLayoutBuilder};
    use crate::renderer::resource::ImageDescriptor;
    use crate::renderer::frame::FRAME_OVERLAP;
    use crate::renderer::vertex::create_default_rectangle;

    fn small_config() -> Config {
        let mut config = Config::default();
        config.descriptors.frame_max_sets = 4;
        config
    }

    fn uniform_layout(ctx: &RenderContext) -> vk::DescriptorSetLayout {
        let mut builder = DescriptorLayoutBuilder::new();
        builder.add_binding(0, DescriptorKind::UniformBuffer);
        builder.build(ctx.device(), vk::ShaderStageFlags::ALL_GRAPHICS).unwrap()
    }

    fn position(journal: &[DeviceEvent], event: DeviceEvent) -> usize {
        journal
            .iter()
            .position(|e| *e == event)
            .unwrap_or_else(|| panic!("{:?} not found in journal", event))
    }

    #[test]
    fn test_fence_wait_precedes_slot_recycling() {
        let device = Arc::new(HeadlessDevice::new());
        let mut ctx = RenderContext::new(device.clone(), &small_config()).unwrap();
        let layout = uniform_layout(&ctx);

        let mut buffers = Vec::new();
        let mut fences = Vec::new();
        let mut sets: Vec<DescriptorSet> = Vec::new();

        for _ in 0..6 {
            ctx.draw_frame(|ctx| {
                let buffer = ctx.create_buffer(&BufferDescriptor::new(
                    64,
                    BufferUsageType::Constant,
                    MemoryType::HostCoherent,
                ))?;
                let set = ctx.allocate_frame_set(layout)?;
                let mut writer = DescriptorWriter::new();
                writer.write_buffer(0, buffer.buffer, 64, 0, DescriptorKind::UniformBuffer);
                ctx.update_set(&mut writer, &set)?;

                buffers.push(buffer.buffer);
                fences.push(ctx.get_current_frame().sync.render_fence);
                sets.push(set);
                ctx.defer_frame(Disposal::Buffer(buffer));
                Ok(())
            })
            .unwrap();
        }
        assert_eq!(ctx.frame_number(), 6);

        let journal = device.journal();
        let submits: Vec<usize> = journal
            .iter()
            .enumerate()
            .filter(|(_, e)| matches!(e, DeviceEvent::Submit { .. }))
            .map(|(idx, _)| idx)
            .collect();
        assert_eq!(submits.len(), 6);

        for i in 0..(6 - FRAME_OVERLAP) {
            let fence = fences[i];
            assert_eq!(fences[i + FRAME_OVERLAP], fence);

            // 第 i + N 帧等待的是第 i 帧提交时附带的 Fence
            let wait = journal[submits[i]..]
                .iter()
                .position(|e| *e == DeviceEvent::WaitFence(fence))
                .map(|p| p + submits[i])
                .unwrap();
            let destroy = position(&journal, DeviceEvent::DestroyBuffer(buffers[i]));
            let reset_fence = journal[destroy..]
                .iter()
                .position(|e| *e == DeviceEvent::ResetFence(fence))
                .map(|p| p + destroy)
                .unwrap();

            assert!(wait < submits[i + FRAME_OVERLAP]);
            assert!(wait < destroy, "frame {i}: buffer released before fence wait");
            assert!(journal[wait..destroy].iter().all(|e| !matches!(e, DeviceEvent::Submit { .. })));
            assert!(journal[wait..reset_fence].iter().any(|e| matches!(e, DeviceEvent::ResetPool(_))));
            assert!(!sets[i].is_valid());
        }

        // 最近 N 帧的描述符集仍然有效
        for set in &sets[6 - FRAME_OVERLAP..] {
            assert!(set.is_valid());
        }
        assert!(device.validation_errors().is_empty());
    }

    #[test]
    fn test_frame_timeout_is_fatal() {
        let device = Arc::new(HeadlessDevice::new());
        let mut ctx = RenderContext::new(device.clone(), &small_config()).unwrap();

        for _ in 0..FRAME_OVERLAP {
            ctx.draw_frame(|_| Ok(())).unwrap();
        }

        device.set_hang(true);
        let err = ctx.draw_frame(|_| Ok(())).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Graphics(GraphicsError::Timeout { timeout_ns: 1_000_000_000, .. })
        ));
        assert_eq!(ctx.frame_number(), FRAME_OVERLAP as u64);

        device.set_hang(false);
        ctx.cleanup().unwrap();
        assert_eq!(device.live_objects(), 0);
    }

    #[test]
    fn test_failed_recording_keeps_slot_usable() {
        let device = Arc::new(HeadlessDevice::new());
        let mut ctx = RenderContext::new(device.clone(), &small_config()).unwrap();

        for _ in 0..2 {
            ctx.draw_frame(|_| Ok(())).unwrap();
        }

        let mut abandoned = None;
        let err = ctx
            .draw_frame(|ctx| {
                let buffer = ctx.create_buffer(&BufferDescriptor::new(
                    64,
                    BufferUsageType::Constant,
                    MemoryType::HostCoherent,
                ))?;
                abandoned = Some(buffer.buffer);
                ctx.defer_frame(Disposal::Buffer(buffer));
                Err(DescriptorError::StaleDescriptorSet.into())
            })
            .unwrap_err();
        assert!(matches!(err, EngineError::Descriptor(DescriptorError::StaleDescriptorSet)));
        assert_eq!(ctx.frame_number(), 2);

        let cmd = ctx.command_buffer();
        assert_eq!(device.command_buffer_state(cmd), Some(CommandBufferState::Pending));

        for _ in 0..3 {
            ctx.draw_frame(|_| Ok(())).unwrap();
        }
        assert_eq!(ctx.frame_number(), 5);

        // 失败帧推迟的资源在槽位下次复用时释放
        let journal = device.journal();
        assert!(journal.contains(&DeviceEvent::DestroyBuffer(abandoned.unwrap())));
        assert!(device.validation_errors().is_empty());

        ctx.cleanup().unwrap();
        assert_eq!(device.live_objects(), 0);
    }

    #[test]
    fn test_failed_init_releases_partial_state() {
        let device = Arc::new(HeadlessDevice::new());

        // 两个帧槽位创建成功，全局描述符池创建失败
        device.fail_pool_creation_after(FRAME_OVERLAP);
        let err = RenderContext::new(device.clone(), &small_config()).err().unwrap();
        assert!(matches!(
            err,
            EngineError::Graphics(GraphicsError::ResourceCreation { what: "descriptor pool", .. })
        ));
        assert_eq!(device.pools_created(), FRAME_OVERLAP);
        assert_eq!(device.live_objects(), 0);

        // 第一个帧槽位的描述符池创建失败
        device.fail_next_pool_creation();
        assert!(RenderContext::new(device.clone(), &small_config()).is_err());
        assert_eq!(device.live_objects(), 0);
        assert!(device.validation_errors().is_empty());
    }

    #[test]
    fn test_end_frame_waits_on_acquire_semaphore() {
        let device = Arc::new(HeadlessDevice::new());
        let mut ctx = RenderContext::new(device.clone(), &small_config()).unwrap();

        ctx.begin_frame().unwrap();
        let fence = ctx.get_current_frame().sync.render_fence;
        let cmd = ctx.command_buffer();
        ctx.end_frame(true).unwrap();

        assert_eq!(
            device.journal().last(),
            Some(&DeviceEvent::Submit { command_buffer: cmd, fence })
        );
        assert_eq!(device.pending_submissions(), 1);
        assert!(device.validation_errors().is_empty());
    }

    #[test]
    fn test_upload_mesh_round_trip() {
        let device = Arc::new(HeadlessDevice::new());
        let ctx = RenderContext::new(device.clone(), &small_config()).unwrap();
        let live_before = device.live_objects();

        let (vertices, indices) = create_default_rectangle();
        let mesh = ctx.upload_mesh(&vertices, &indices).unwrap();

        assert_eq!(mesh.index_count, 6);
        assert_eq!(
            device.read_buffer(mesh.vertex_buffer.buffer).unwrap(),
            bytemuck::cast_slice::<Vertex, u8>(&vertices).to_vec()
        );
        assert_eq!(
            device.read_buffer(mesh.index_buffer.buffer).unwrap(),
            bytemuck::cast_slice::<u32, u8>(&indices).to_vec()
        );
        // 暂存缓冲区已释放，只剩两个网格缓冲区
        assert_eq!(device.live_objects(), live_before + 2);
        assert!(device.validation_errors().is_empty());
    }

    #[test]
    fn test_upload_buffer() {
        let device = Arc::new(HeadlessDevice::new());
        let ctx = RenderContext::new(device.clone(), &small_config()).unwrap();

        let data: Vec<u8> = (0..32).collect();
        let mut buffer = ctx.upload_buffer(&data, BufferUsageType::Storage).unwrap();
        assert_eq!(buffer.memory_type, MemoryType::DeviceLocal);
        assert_eq!(device.read_buffer(buffer.buffer).unwrap(), data);

        // 设备本地内存不能直接写入
        assert!(ctx.write_buffer(&mut buffer, 0, &data).is_err());
    }

    #[test]
    fn test_empty_upload_rejected() {
        let device = Arc::new(HeadlessDevice::new());
        let ctx = RenderContext::new(device.clone(), &small_config()).unwrap();
        let live_before = device.live_objects();

        assert!(matches!(
            ctx.upload_buffer(&[], BufferUsageType::Storage),
            Err(EngineError::Graphics(GraphicsError::EmptyUpload { what: "buffer" }))
        ));
        let (vertices, _) = create_default_rectangle();
        assert!(matches!(
            ctx.upload_mesh(&vertices, &[]),
            Err(EngineError::Graphics(GraphicsError::EmptyUpload { what: "mesh indices" }))
        ));
        assert!(matches!(
            ctx.upload_mesh(&[], &[0, 1, 2]),
            Err(EngineError::Graphics(GraphicsError::EmptyUpload { what: "mesh vertices" }))
        ));

        assert_eq!(device.live_objects(), live_before);
        assert_eq!(device.pending_submissions(), 0);
    }

    #[test]
    fn test_cleanup_releases_everything_once() {
        let device = Arc::new(HeadlessDevice::new());
        let mut ctx = RenderContext::new(device.clone(), &Config::default()).unwrap();
        let layout = uniform_layout(&ctx);
        ctx.defer_global(Disposal::DescriptorSetLayout(layout));

        let mut storage = DescriptorLayoutBuilder::new();
        storage.add_binding(0, DescriptorKind::StorageImage);
        let storage_layout = storage.build(ctx.device(), vk::ShaderStageFlags::COMPUTE).unwrap();
        ctx.defer_global(Disposal::DescriptorSetLayout(storage_layout));
        let global = ctx.allocate_global_set(storage_layout).unwrap();

        let mesh = ctx.upload_mesh(&create_default_rectangle().0, &[0, 1, 2]).unwrap();
        ctx.defer_global(Disposal::Buffer(mesh.vertex_buffer));
        ctx.defer_global(Disposal::Buffer(mesh.index_buffer));

        for _ in 0..3 {
            ctx.draw_frame(|ctx| {
                let set = ctx.allocate_frame_set(layout)?;
                assert!(set.is_valid());
                Ok(())
            })
            .unwrap();
        }

        ctx.cleanup().unwrap();
        assert!(!global.is_valid());
        assert_eq!(device.live_objects(), 0);
        assert_eq!(device.pending_submissions(), 0);

        // 全局删除队列最后刷新
        let journal = device.journal();
        let idle = position(&journal, DeviceEvent::WaitIdle);
        let layout_destroyed = position(&journal, DeviceEvent::DestroyLayout(layout));
        assert!(idle < layout_destroyed);
        assert!(journal[layout_destroyed..].iter().all(|e| !matches!(e, DeviceEvent::DestroyPool(_))));

        ctx.cleanup().unwrap();
        drop(ctx);
        assert!(device.validation_errors().is_empty());
    }

    #[test]
    fn test_global_storage_image_released_at_cleanup() {
        let device = Arc::new(HeadlessDevice::new());
        let mut ctx = RenderContext::new(device.clone(), &small_config()).unwrap();

        let image = ctx
            .device()
            .create_image(&ImageDescriptor::new_2d(
                64,
                64,
                vk::Format::R16G16B16A16_SFLOAT,
                vk::ImageUsageFlags::STORAGE | vk::ImageUsageFlags::TRANSFER_DST,
            ))
            .unwrap();
        let image_handle = image.image;
        let view = image.view;

        let mut builder = DescriptorLayoutBuilder::new();
        builder.add_binding(0, DescriptorKind::StorageImage);
        let layout = builder.build(ctx.device(), vk::ShaderStageFlags::COMPUTE).unwrap();
        ctx.defer_global(Disposal::DescriptorSetLayout(layout));
        // 图像在布局之后入队，先于布局释放
        ctx.defer_global(Disposal::Image(image));

        let set = ctx.allocate_global_set(layout).unwrap();
        let mut writer = DescriptorWriter::new();
        writer.write_image(
            0,
            view,
            vk::Sampler::null(),
            vk::ImageLayout::GENERAL,
            DescriptorKind::StorageImage,
        );
        ctx.update_set(&mut writer, &set).unwrap();

        let writes = device.descriptor_writes(set.raw());
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].descriptor_type, vk::DescriptorType::STORAGE_IMAGE);
        assert!(matches!(
            writes[0].info,
            WriteInfo::Image(info) if info.image_view == view && info.image_layout == vk::ImageLayout::GENERAL
        ));

        ctx.cleanup().unwrap();
        assert!(!set.is_valid());
        assert_eq!(device.live_objects(), 0);

        let journal = device.journal();
        let image_destroyed = position(&journal, DeviceEvent::DestroyImage(image_handle));
        assert!(image_destroyed < position(&journal, DeviceEvent::DestroyLayout(layout)));
        assert!(device.validation_errors().is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let device = Arc::new(HeadlessDevice::new());
        let mut config = Config::default();
        config.descriptors.frame_ratios.clear();
        assert!(matches!(
            RenderContext::new(device.clone(), &config),
            Err(EngineError::Config(_))
        ));
        assert_eq!(device.live_objects(), 0);
    }
}
