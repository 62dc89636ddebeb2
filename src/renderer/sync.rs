//! GPU 同步机制模块
//!
//! 提供帧循环和立即提交使用的同步原语描述。
//!
//! - **Fence**：CPU 等待 GPU 完成工作，是帧循环唯一的背压机制
//! - **Semaphore**：仅在 GPU 侧排序队列提交（获取图像 -> 渲染 -> 呈现）
//!
//! 等待超时视为设备挂起，不重试。

use ash::vk;

/// 每帧等待渲染 Fence 的默认超时（1 秒）
pub const FRAME_FENCE_TIMEOUT_NS: u64 = 1_000_000_000;

/// 立即提交等待 Fence 的默认超时
pub const IMMEDIATE_FENCE_TIMEOUT_NS: u64 = 9_999_999_999;

/// 管线阶段
///
/// 提交时等待 Semaphore 的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// 顶点着色器阶段
    VertexShader,
    /// 片段着色器阶段
    FragmentShader,
    /// 计算着色器阶段
    ComputeShader,
    /// 传输阶段
    Transfer,
    /// 颜色输出阶段
    ColorOutput,
    /// 所有图形阶段
    AllGraphics,
    /// 所有命令阶段
    AllCommands,
}

impl PipelineStage {
    pub fn to_vk(self) -> vk::PipelineStageFlags {
        match self {
            PipelineStage::VertexShader => vk::PipelineStageFlags::VERTEX_SHADER,
            PipelineStage::FragmentShader => vk::PipelineStageFlags::FRAGMENT_SHADER,
            PipelineStage::ComputeShader => vk::PipelineStageFlags::COMPUTE_SHADER,
            PipelineStage::Transfer => vk::PipelineStageFlags::TRANSFER,
            PipelineStage::ColorOutput => vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            PipelineStage::AllGraphics => vk::PipelineStageFlags::ALL_GRAPHICS,
            PipelineStage::AllCommands => vk::PipelineStageFlags::ALL_COMMANDS,
        }
    }
}

/// GPU 工作提交信息
///
/// 描述一次队列提交：一个命令缓冲区，最多一个等待 Semaphore 和一个 signal Semaphore。
#[derive(Debug, Clone, Copy)]
pub struct SubmitInfo {
    pub command_buffer: vk::CommandBuffer,
    /// 等待的 Semaphore 及其等待阶段
    pub wait: Option<(vk::Semaphore, PipelineStage)>,
    /// 完成后 signal 的 Semaphore
    pub signal: Option<vk::Semaphore>,
}

impl SubmitInfo {
    /// 不涉及 Semaphore 的提交（立即提交使用）
    pub fn command_only(command_buffer: vk::CommandBuffer) -> Self {
        Self {
            command_buffer,
            wait: None,
            signal: None,
        }
    }

    pub fn wait_on(mut self, semaphore: vk::Semaphore, stage: PipelineStage) -> Self {
        self.wait = Some((semaphore, stage));
        self
    }

    pub fn signal(mut self, semaphore: vk::Semaphore) -> Self {
        self.signal = Some(semaphore);
        self
    }
}

/// 单个帧槽位的同步对象
///
/// Fence 以 signaled 状态创建，这样第一次等待立即返回。
#[derive(Debug, Clone, Copy)]
pub struct FrameSync {
    /// 交换链图像获取完成
    pub swapchain_semaphore: vk::Semaphore,
    /// 渲染完成，呈现前等待
    pub render_semaphore: vk::Semaphore,
    /// 该槽位最近一次提交完成
    pub render_fence: vk::Fence,
}
