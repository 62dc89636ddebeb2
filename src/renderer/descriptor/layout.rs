//! 描述符布局构建器

use ash::vk;

use super::pool::DescriptorKind;
use crate::core::error::{GraphicsError, Result};
use crate::gfx::GpuDevice;

/// 累积 (绑定号, 描述符类型) 并构建不可变的描述符集布局
///
/// 每个绑定的描述符数量固定为 1。重复的绑定号不做检查。
#[derive(Debug, Clone, Default)]
pub struct DescriptorLayoutBuilder {
    bindings: Vec<(u32, DescriptorKind)>,
}

impl DescriptorLayoutBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_binding(&mut self, binding: u32, kind: DescriptorKind) -> &mut Self {
        self.bindings.push((binding, kind));
        self
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn clear(&mut self) {
        self.bindings.clear();
    }

    /// 以给定的着色器阶段可见性创建布局，不清空已累积的绑定
    pub fn build(&self, device: &dyn GpuDevice, stages: vk::ShaderStageFlags) -> Result<vk::DescriptorSetLayout> {
        self.build_with_flags(device, stages, vk::DescriptorSetLayoutCreateFlags::empty())
    }

    pub fn build_with_flags(
        &self,
        device: &dyn GpuDevice,
        stages: vk::ShaderStageFlags,
        flags: vk::DescriptorSetLayoutCreateFlags,
    ) -> Result<vk::DescriptorSetLayout> {
        let bindings: Vec<vk::DescriptorSetLayoutBinding> = self
            .bindings
            .iter()
            .map(|&(binding, kind)| {
                vk::DescriptorSetLayoutBinding::builder()
                    .binding(binding)
                    .descriptor_type(kind.to_vk())
                    .descriptor_count(1)
                    .stage_flags(stages)
                    .build()
            })
            .collect();

        let layout = device
            .create_descriptor_set_layout(&bindings, flags)
            .map_err(GraphicsError::creation("descriptor set layout"))?;
        Ok(layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::HeadlessDevice;

    #[test]
    fn test_build_stamps_stages_and_keeps_bindings() {
        let device = HeadlessDevice::new();
        let mut builder = DescriptorLayoutBuilder::new();
        builder
            .add_binding(0, DescriptorKind::UniformBuffer)
            .add_binding(1, DescriptorKind::CombinedImageSampler);

        let stages = vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT;
        let layout = builder.build(&device, stages).unwrap();

        let shapes = device.layout_bindings(layout).unwrap();
        assert_eq!(shapes.len(), 2);
        assert!(shapes.iter().all(|s| s.stages == stages && s.count == 1));
        assert_eq!(shapes[1].descriptor_type, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);

        // build 不清空
        assert_eq!(builder.len(), 2);
        let second = builder.build(&device, vk::ShaderStageFlags::COMPUTE).unwrap();
        assert_ne!(layout, second);

        builder.clear();
        assert!(builder.is_empty());
    }
}
