//! 资源管理模块
//!
//! 描述缓冲区、图像等 GPU 资源的创建参数以及创建后的句柄。
//! 实际的内存分配由 [`GpuDevice`](crate::gfx::GpuDevice) 完成，
//! 资源的释放则通过删除队列延迟执行。

use std::fmt;

use ash::vk;

/// 缓冲区使用类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsageType {
    /// 顶点缓冲区
    Vertex,
    /// 索引缓冲区
    Index,
    /// 常量缓冲区（Uniform Buffer）
    Constant,
    /// 存储缓冲区（Storage Buffer）
    Storage,
    /// 上传缓冲区（CPU -> GPU）
    Upload,
    /// 读回缓冲区（GPU -> CPU）
    ReadBack,
}

impl BufferUsageType {
    /// 对应的 Vulkan 用途标志
    pub fn to_vk(self) -> vk::BufferUsageFlags {
        match self {
            BufferUsageType::Vertex => vk::BufferUsageFlags::VERTEX_BUFFER,
            BufferUsageType::Index => vk::BufferUsageFlags::INDEX_BUFFER,
            BufferUsageType::Constant => vk::BufferUsageFlags::UNIFORM_BUFFER,
            BufferUsageType::Storage => vk::BufferUsageFlags::STORAGE_BUFFER,
            BufferUsageType::Upload => vk::BufferUsageFlags::TRANSFER_SRC,
            BufferUsageType::ReadBack => vk::BufferUsageFlags::TRANSFER_DST,
        }
    }
}

/// 缓冲区内存类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryType {
    /// GPU本地内存（最快，仅GPU可访问）
    DeviceLocal,
    /// CPU可见内存，写入后需要显式刷新
    HostVisible,
    /// CPU缓存一致性内存（更新频率高）
    HostCoherent,
}

impl MemoryType {
    /// 分配内存时要求的属性标志
    pub fn required_flags(self) -> vk::MemoryPropertyFlags {
        match self {
            MemoryType::DeviceLocal => vk::MemoryPropertyFlags::DEVICE_LOCAL,
            MemoryType::HostVisible => vk::MemoryPropertyFlags::HOST_VISIBLE,
            MemoryType::HostCoherent => {
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT
            }
        }
    }

    /// CPU 是否可以直接写入
    pub fn is_host_visible(self) -> bool {
        !matches!(self, MemoryType::DeviceLocal)
    }
}

/// 缓冲区描述信息
#[derive(Debug, Clone)]
pub struct BufferDescriptor {
    /// 缓冲区大小（字节）
    pub size: u64,
    /// 使用类型
    pub usage: BufferUsageType,
    /// 额外的用途标志（例如上传目标需要 `TRANSFER_DST`）
    pub extra_usage: vk::BufferUsageFlags,
    /// 内存类型
    pub memory_type: MemoryType,
    /// 调试名称（可选）
    pub name: Option<String>,
}

impl BufferDescriptor {
    /// 创建新的缓冲区描述符
    pub fn new(size: u64, usage: BufferUsageType, memory_type: MemoryType) -> Self {
        Self {
            size,
            usage,
            extra_usage: vk::BufferUsageFlags::empty(),
            memory_type,
            name: None,
        }
    }

    /// 上传用的暂存缓冲区
    pub fn staging(size: u64) -> Self {
        Self::new(size, BufferUsageType::Upload, MemoryType::HostCoherent)
            .with_name("staging")
    }

    /// 设置调试名称
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// 追加用途标志
    pub fn with_usage(mut self, usage: vk::BufferUsageFlags) -> Self {
        self.extra_usage |= usage;
        self
    }

    /// 合并后的 Vulkan 用途标志
    pub fn usage_flags(&self) -> vk::BufferUsageFlags {
        self.usage.to_vk() | self.extra_usage
    }

    /// 计算对齐后的大小（常量缓冲区对齐到256字节）
    pub fn aligned_size(&self) -> u64 {
        if self.usage == BufferUsageType::Constant {
            (self.size + 255) & !255
        } else {
            self.size
        }
    }
}

/// 资源的后备内存
pub enum DeviceAllocation {
    /// VMA 子分配
    Vma(vk_mem::Allocation),
    /// 无头设备不分配真实内存
    Headless,
}

impl fmt::Debug for DeviceAllocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceAllocation::Vma(_) => f.write_str("Vma"),
            DeviceAllocation::Headless => f.write_str("Headless"),
        }
    }
}

/// 已分配的缓冲区
///
/// 持有缓冲区句柄和其后备内存。没有 `Drop`：
/// 释放必须显式调用 `destroy_buffer` 或推入删除队列。
#[derive(Debug)]
pub struct AllocatedBuffer {
    pub buffer: vk::Buffer,
    pub allocation: DeviceAllocation,
    /// 实际分配的大小（已对齐）
    pub size: u64,
    pub memory_type: MemoryType,
}

/// 图像描述信息
#[derive(Debug, Clone)]
pub struct ImageDescriptor {
    pub extent: vk::Extent3D,
    pub format: vk::Format,
    pub usage: vk::ImageUsageFlags,
    pub aspect: vk::ImageAspectFlags,
    pub name: Option<String>,
}

impl ImageDescriptor {
    /// 创建新的 2D 图像描述符
    pub fn new_2d(width: u32, height: u32, format: vk::Format, usage: vk::ImageUsageFlags) -> Self {
        let aspect = match format {
            vk::Format::D16_UNORM | vk::Format::D32_SFLOAT | vk::Format::X8_D24_UNORM_PACK32 => {
                vk::ImageAspectFlags::DEPTH
            }
            vk::Format::D24_UNORM_S8_UINT | vk::Format::D32_SFLOAT_S8_UINT => {
                vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
            }
            _ => vk::ImageAspectFlags::COLOR,
        };

        Self {
            extent: vk::Extent3D { width, height, depth: 1 },
            format,
            usage,
            aspect,
            name: None,
        }
    }

    /// 设置调试名称
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// 已分配的图像（图像 + 内存 + 默认视图）
#[derive(Debug)]
pub struct AllocatedImage {
    pub image: vk::Image,
    pub view: vk::ImageView,
    pub allocation: DeviceAllocation,
    pub extent: vk::Extent3D,
    pub format: vk::Format,
}

/// 上传到 GPU 的网格缓冲区
#[derive(Debug)]
pub struct GpuMeshBuffers {
    pub vertex_buffer: AllocatedBuffer,
    pub index_buffer: AllocatedBuffer,
    pub index_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_descriptor_alignment() {
        let desc = BufferDescriptor::new(100, BufferUsageType::Constant, MemoryType::HostVisible);
        assert_eq!(desc.aligned_size(), 256);

        let desc2 = BufferDescriptor::new(300, BufferUsageType::Constant, MemoryType::HostVisible);
        assert_eq!(desc2.aligned_size(), 512);

        let desc3 = BufferDescriptor::new(100, BufferUsageType::Vertex, MemoryType::DeviceLocal);
        assert_eq!(desc3.aligned_size(), 100);
    }

    #[test]
    fn test_buffer_usage_flags() {
        let desc = BufferDescriptor::new(64, BufferUsageType::Index, MemoryType::DeviceLocal)
            .with_usage(vk::BufferUsageFlags::TRANSFER_DST);
        assert_eq!(
            desc.usage_flags(),
            vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
        );

        let staging = BufferDescriptor::staging(16);
        assert_eq!(staging.usage_flags(), vk::BufferUsageFlags::TRANSFER_SRC);
        assert!(staging.memory_type.is_host_visible());
        assert!(!MemoryType::DeviceLocal.is_host_visible());
    }

    #[test]
    fn test_image_aspect() {
        let depth = ImageDescriptor::new_2d(4, 4, vk::Format::D32_SFLOAT, vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT);
        assert_eq!(depth.aspect, vk::ImageAspectFlags::DEPTH);

        let color = ImageDescriptor::new_2d(4, 4, vk::Format::R16G16B16A16_SFLOAT, vk::ImageUsageFlags::STORAGE);
        assert_eq!(color.aspect, vk::ImageAspectFlags::COLOR);
        assert_eq!(color.extent.depth, 1);
    }
}
