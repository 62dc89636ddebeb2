//! Vulkan 设备
//!
//! 基于 `ash` 实现 [`GpuDevice`]。实例、物理设备和逻辑设备的创建不在这里，
//! 由调用者传入已经创建好的 `ash::Instance`、`ash::Device` 和图形队列。
//! 缓冲区和图像的内存由 `vk_mem`（VMA）子分配。
//!
//! 所有 `unsafe` 调用的前提相同：传入的句柄都来自同一个 `ash::Device`，
//! 并且由核心层保证在 GPU 使用结束前不会被销毁。

use ash::prelude::VkResult;
use ash::vk;
use parking_lot::Mutex;
use vk_mem::Alloc;

use super::device::{DescriptorWrite, GpuDevice, WriteInfo};
use crate::renderer::resource::{
    AllocatedBuffer, AllocatedImage, BufferDescriptor, DeviceAllocation, ImageDescriptor, MemoryType,
};
use crate::renderer::sync::SubmitInfo;

/// Vulkan 设备
///
/// `allocator` 必须在逻辑设备销毁之前释放，因此 `VulkanDevice` 要先于 `ash::Device` 被 drop。
pub struct VulkanDevice {
    allocator: vk_mem::Allocator,
    device: ash::Device,
    /// 队列访问需要外部同步
    queue: Mutex<vk::Queue>,
    queue_family_index: u32,
}

impl VulkanDevice {
    /// # 参数
    ///
    /// * `instance` - Vulkan 实例，仅用于创建内存分配器
    /// * `device` - 逻辑设备
    /// * `physical_device` - 逻辑设备所属的物理设备
    /// * `queue` - 图形队列
    /// * `queue_family_index` - 图形队列所属的队列族
    pub fn new(
        instance: &ash::Instance,
        device: ash::Device,
        physical_device: vk::PhysicalDevice,
        queue: vk::Queue,
        queue_family_index: u32,
    ) -> VkResult<Self> {
        let create_info = vk_mem::AllocatorCreateInfo::new(instance, &device, physical_device);
        let allocator = unsafe { vk_mem::Allocator::new(create_info)? };

        Ok(Self {
            allocator,
            device,
            queue: Mutex::new(queue),
            queue_family_index,
        })
    }

    pub fn raw(&self) -> &ash::Device {
        &self.device
    }

    pub fn allocator(&self) -> &vk_mem::Allocator {
        &self.allocator
    }
}

/// 按内存类型选择 VMA 的分配参数
fn allocation_info(memory_type: MemoryType) -> vk_mem::AllocationCreateInfo {
    match memory_type {
        MemoryType::DeviceLocal => vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferDevice,
            ..Default::default()
        },
        MemoryType::HostVisible | MemoryType::HostCoherent => vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::Auto,
            flags: vk_mem::AllocationCreateFlags::HOST_ACCESS_SEQUENTIAL_WRITE,
            required_flags: memory_type.required_flags(),
            ..Default::default()
        },
    }
}

impl GpuDevice for VulkanDevice {
    fn create_descriptor_set_layout(
        &self,
        bindings: &[vk::DescriptorSetLayoutBinding],
        flags: vk::DescriptorSetLayoutCreateFlags,
    ) -> VkResult<vk::DescriptorSetLayout> {
        let info = vk::DescriptorSetLayoutCreateInfo::builder()
            .bindings(bindings)
            .flags(flags);
        unsafe { self.device.create_descriptor_set_layout(&info, None) }
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        unsafe { self.device.destroy_descriptor_set_layout(layout, None) }
    }

    fn create_descriptor_pool(
        &self,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
    ) -> VkResult<vk::DescriptorPool> {
        let info = vk::DescriptorPoolCreateInfo::builder()
            .max_sets(max_sets)
            .pool_sizes(pool_sizes);
        unsafe { self.device.create_descriptor_pool(&info, None) }
    }

    fn reset_descriptor_pool(&self, pool: vk::DescriptorPool) -> VkResult<()> {
        unsafe {
            self.device
                .reset_descriptor_pool(pool, vk::DescriptorPoolResetFlags::empty())
        }
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        unsafe { self.device.destroy_descriptor_pool(pool, None) }
    }

    fn allocate_descriptor_set(
        &self,
        pool: vk::DescriptorPool,
        layout: vk::DescriptorSetLayout,
    ) -> VkResult<vk::DescriptorSet> {
        let layouts = [layout];
        let info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(pool)
            .set_layouts(&layouts);
        let sets = unsafe { self.device.allocate_descriptor_sets(&info)? };
        sets.into_iter().next().ok_or(vk::Result::ERROR_UNKNOWN)
    }

    fn update_descriptor_sets(&self, writes: &[DescriptorWrite]) {
        // 指针指向 `writes` 内部，只在本次调用期间有效
        let raw: Vec<vk::WriteDescriptorSet> = writes
            .iter()
            .map(|write| {
                let builder = vk::WriteDescriptorSet::builder()
                    .dst_set(write.dst_set)
                    .dst_binding(write.binding)
                    .descriptor_type(write.descriptor_type);
                match &write.info {
                    WriteInfo::Buffer(info) => builder.buffer_info(std::slice::from_ref(info)).build(),
                    WriteInfo::Image(info) => builder.image_info(std::slice::from_ref(info)).build(),
                }
            })
            .collect();

        unsafe { self.device.update_descriptor_sets(&raw, &[]) }
    }

    fn create_command_pool(&self) -> VkResult<vk::CommandPool> {
        let info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(self.queue_family_index)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        unsafe { self.device.create_command_pool(&info, None) }
    }

    fn allocate_command_buffer(&self, pool: vk::CommandPool) -> VkResult<vk::CommandBuffer> {
        let info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let buffers = unsafe { self.device.allocate_command_buffers(&info)? };
        buffers.into_iter().next().ok_or(vk::Result::ERROR_UNKNOWN)
    }

    fn reset_command_buffer(&self, buffer: vk::CommandBuffer) -> VkResult<()> {
        unsafe {
            self.device
                .reset_command_buffer(buffer, vk::CommandBufferResetFlags::empty())
        }
    }

    fn begin_command_buffer(&self, buffer: vk::CommandBuffer) -> VkResult<()> {
        let info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { self.device.begin_command_buffer(buffer, &info) }
    }

    fn end_command_buffer(&self, buffer: vk::CommandBuffer) -> VkResult<()> {
        unsafe { self.device.end_command_buffer(buffer) }
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        unsafe { self.device.destroy_command_pool(pool, None) }
    }

    fn cmd_copy_buffer(
        &self,
        buffer: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Buffer,
        regions: &[vk::BufferCopy],
    ) {
        unsafe { self.device.cmd_copy_buffer(buffer, src, dst, regions) }
    }

    fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let info = vk::FenceCreateInfo::builder().flags(flags);
        unsafe { self.device.create_fence(&info, None) }
    }

    fn wait_for_fence(&self, fence: vk::Fence, timeout_ns: u64) -> VkResult<()> {
        unsafe { self.device.wait_for_fences(&[fence], true, timeout_ns) }
    }

    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()> {
        unsafe { self.device.reset_fences(&[fence]) }
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        unsafe { self.device.destroy_fence(fence, None) }
    }

    fn create_semaphore(&self) -> VkResult<vk::Semaphore> {
        let info = vk::SemaphoreCreateInfo::builder();
        unsafe { self.device.create_semaphore(&info, None) }
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        unsafe { self.device.destroy_semaphore(semaphore, None) }
    }

    fn queue_submit(&self, submit: &SubmitInfo, fence: vk::Fence) -> VkResult<()> {
        let command_buffers = [submit.command_buffer];
        let (wait_semaphores, wait_stages): (Vec<_>, Vec<_>) = submit
            .wait
            .iter()
            .map(|(semaphore, stage)| (*semaphore, stage.to_vk()))
            .unzip();
        let signal_semaphores: Vec<vk::Semaphore> = submit.signal.into_iter().collect();

        let info = vk::SubmitInfo::builder()
            .command_buffers(&command_buffers)
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .signal_semaphores(&signal_semaphores)
            .build();

        let queue = self.queue.lock();
        unsafe { self.device.queue_submit(*queue, &[info], fence) }
    }

    fn device_wait_idle(&self) -> VkResult<()> {
        unsafe { self.device.device_wait_idle() }
    }

    fn create_buffer(&self, desc: &BufferDescriptor) -> VkResult<AllocatedBuffer> {
        let size = desc.aligned_size();
        let info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(desc.usage_flags())
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let (buffer, allocation) = unsafe {
            self.allocator
                .create_buffer(&info, &allocation_info(desc.memory_type))?
        };

        Ok(AllocatedBuffer {
            buffer,
            allocation: DeviceAllocation::Vma(allocation),
            size,
            memory_type: desc.memory_type,
        })
    }

    fn write_buffer(&self, buffer: &mut AllocatedBuffer, offset: u64, data: &[u8]) -> VkResult<()> {
        if !buffer.memory_type.is_host_visible() || offset + data.len() as u64 > buffer.size {
            return Err(vk::Result::ERROR_MEMORY_MAP_FAILED);
        }
        let DeviceAllocation::Vma(allocation) = &mut buffer.allocation else {
            return Err(vk::Result::ERROR_MEMORY_MAP_FAILED);
        };

        unsafe {
            let mapped = self.allocator.map_memory(allocation)? as *mut u8;
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped.add(offset as usize), data.len());

            // 一致性内存上 VMA 会跳过 flush
            let flushed = self
                .allocator
                .flush_allocation(allocation, offset as _, data.len() as _);
            self.allocator.unmap_memory(allocation);
            flushed
        }
    }

    fn destroy_buffer(&self, buffer: AllocatedBuffer) {
        let AllocatedBuffer { buffer, allocation, .. } = buffer;
        match allocation {
            DeviceAllocation::Vma(mut allocation) => unsafe {
                self.allocator.destroy_buffer(buffer, &mut allocation);
            },
            DeviceAllocation::Headless => {
                tracing::warn!(?buffer, "Buffer without VMA allocation passed to Vulkan device");
            }
        }
    }

    fn create_image(&self, desc: &ImageDescriptor) -> VkResult<AllocatedImage> {
        let info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .format(desc.format)
            .extent(desc.extent)
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(desc.usage)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        unsafe {
            let (image, mut allocation) = self
                .allocator
                .create_image(&info, &allocation_info(MemoryType::DeviceLocal))?;

            let view_info = vk::ImageViewCreateInfo::builder()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(desc.format)
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: desc.aspect,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });
            let view = match self.device.create_image_view(&view_info, None) {
                Ok(view) => view,
                Err(e) => {
                    self.allocator.destroy_image(image, &mut allocation);
                    return Err(e);
                }
            };

            Ok(AllocatedImage {
                image,
                view,
                allocation: DeviceAllocation::Vma(allocation),
                extent: desc.extent,
                format: desc.format,
            })
        }
    }

    fn destroy_image(&self, image: AllocatedImage) {
        let AllocatedImage { image, view, allocation, .. } = image;
        unsafe {
            self.device.destroy_image_view(view, None);
            match allocation {
                DeviceAllocation::Vma(mut allocation) => self.allocator.destroy_image(image, &mut allocation),
                DeviceAllocation::Headless => {
                    tracing::warn!(?image, "Image without VMA allocation passed to Vulkan device");
                }
            }
        }
    }

    fn create_sampler(&self, filter: vk::Filter) -> VkResult<vk::Sampler> {
        let info = vk::SamplerCreateInfo::builder()
            .mag_filter(filter)
            .min_filter(filter);
        unsafe { self.device.create_sampler(&info, None) }
    }

    fn destroy_sampler(&self, sampler: vk::Sampler) {
        unsafe { self.device.destroy_sampler(sampler, None) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_info_by_memory_type() {
        let local = allocation_info(MemoryType::DeviceLocal);
        assert!(matches!(local.usage, vk_mem::MemoryUsage::AutoPreferDevice));
        assert!(local.flags.is_empty());
        assert!(local.required_flags.is_empty());

        for memory_type in [MemoryType::HostVisible, MemoryType::HostCoherent] {
            let info = allocation_info(memory_type);
            assert!(matches!(info.usage, vk_mem::MemoryUsage::Auto));
            assert!(info
                .flags
                .contains(vk_mem::AllocationCreateFlags::HOST_ACCESS_SEQUENTIAL_WRITE));
            assert_eq!(info.required_flags, memory_type.required_flags());
            assert!(info.required_flags.contains(vk::MemoryPropertyFlags::HOST_VISIBLE));
        }
    }
}
