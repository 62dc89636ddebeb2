//! 描述符写入器
//!
//! 先累积缓冲区和图像绑定，再通过一次批量更新应用到目标描述符集。
//! 每条写入自己持有数据，不存在指向内部存储的指针，容器扩容不会让写入失效。

use ash::vk;

use super::pool::{DescriptorKind, DescriptorSet};
use crate::core::error::Result;
use crate::gfx::{DescriptorWrite, GpuDevice, WriteInfo};

/// 批量描述符写入
///
/// [`update_set`](Self::update_set) 不会清空累积的写入，
/// 两批无关的写入之间必须显式调用 [`clear`](Self::clear)。
#[derive(Debug, Clone, Default)]
pub struct DescriptorWriter {
    writes: Vec<DescriptorWrite>,
}

impl DescriptorWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个缓冲区绑定
    ///
    /// # 参数
    ///
    /// * `binding` - 绑定号
    /// * `buffer` - 缓冲区句柄
    /// * `size` - 绑定的字节数
    /// * `offset` - 起始偏移
    /// * `kind` - uniform/storage（含 dynamic）缓冲区类型
    pub fn write_buffer(
        &mut self,
        binding: u32,
        buffer: vk::Buffer,
        size: u64,
        offset: u64,
        kind: DescriptorKind,
    ) -> &mut Self {
        self.writes.push(DescriptorWrite {
            dst_set: vk::DescriptorSet::null(),
            binding,
            descriptor_type: kind.to_vk(),
            info: WriteInfo::Buffer(vk::DescriptorBufferInfo {
                buffer,
                offset,
                range: size,
            }),
        });
        self
    }

    /// 追加一个图像绑定
    ///
    /// 纯采样器绑定时 `view` 为空句柄，纯图像绑定时 `sampler` 为空句柄。
    pub fn write_image(
        &mut self,
        binding: u32,
        view: vk::ImageView,
        sampler: vk::Sampler,
        layout: vk::ImageLayout,
        kind: DescriptorKind,
    ) -> &mut Self {
        self.writes.push(DescriptorWrite {
            dst_set: vk::DescriptorSet::null(),
            binding,
            descriptor_type: kind.to_vk(),
            info: WriteInfo::Image(vk::DescriptorImageInfo {
                sampler,
                image_view: view,
                image_layout: layout,
            }),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// 清空累积的写入
    pub fn clear(&mut self) {
        self.writes.clear();
    }

    /// 把所有写入指向 `set` 并一次性提交
    ///
    /// `set` 所属的池已被重置或销毁时返回 `StaleDescriptorSet`，不做任何写入。
    pub fn update_set(&mut self, device: &dyn GpuDevice, set: &DescriptorSet) -> Result<()> {
        let raw = set.require_valid()?;
        for write in self.writes.iter_mut() {
            write.dst_set = raw;
        }
        device.update_descriptor_sets(&self.writes);
        Ok(())
    }
}
