//! 命令缓冲区管理模块
//!
//! 每个帧槽位和立即提交器各自拥有一个 [`CommandContext`]：
//! 一个命令池加一个主命令缓冲区。命令池以可单独重置的方式创建，
//! 因此每次录制前只需重置命令缓冲区本身。
//!
//! # 命令缓冲区生命周期
//!
//! ```text
//! Initial --begin--> Recording --end--> Executable --submit--> Pending
//!    ^                                                            |
//!    +------------------------reset-------------------------------+
//! ```
//!
//! 处于 `Pending` 的命令缓冲区不能重置或重新录制，
//! 必须先等待其提交时附带的 Fence。

use ash::vk;

use crate::core::error::{GraphicsError, Result};
use crate::gfx::GpuDevice;

/// 命令缓冲区状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandBufferState {
    /// 初始状态
    Initial,
    /// 正在记录
    Recording,
    /// 已完成记录
    Executable,
    /// 正在执行
    Pending,
    /// 无效状态（一次性提交的命令缓冲区执行完毕后）
    Invalid,
}

impl CommandBufferState {
    /// 是否可以重置
    pub fn can_reset(self) -> bool {
        self != CommandBufferState::Pending
    }

    /// 是否可以开始录制
    pub fn can_begin(self) -> bool {
        matches!(self, CommandBufferState::Initial)
    }

    /// 是否可以提交
    pub fn can_submit(self) -> bool {
        self == CommandBufferState::Executable
    }
}

/// 命令录制上下文
///
/// 没有实现 `Drop`，由所有者在确认 GPU 空闲后调用 [`destroy`](Self::destroy)。
#[derive(Debug)]
pub struct CommandContext {
    pool: vk::CommandPool,
    buffer: vk::CommandBuffer,
}

impl CommandContext {
    /// 创建命令池并分配一个主命令缓冲区
    pub fn new(device: &dyn GpuDevice) -> Result<Self> {
        let pool = device
            .create_command_pool()
            .map_err(GraphicsError::creation("command pool"))?;

        let buffer = match device.allocate_command_buffer(pool) {
            Ok(buffer) => buffer,
            Err(result) => {
                device.destroy_command_pool(pool);
                return Err(GraphicsError::creation("command buffer")(result).into());
            }
        };

        Ok(Self { pool, buffer })
    }

    /// 命令缓冲区句柄
    pub fn buffer(&self) -> vk::CommandBuffer {
        self.buffer
    }

    pub fn pool(&self) -> vk::CommandPool {
        self.pool
    }

    /// 重置并开始录制（一次性提交）
    pub fn begin(&self, device: &dyn GpuDevice) -> Result<()> {
        device
            .reset_command_buffer(self.buffer)
            .map_err(GraphicsError::command("command buffer reset"))?;
        device
            .begin_command_buffer(self.buffer)
            .map_err(GraphicsError::command("command buffer begin"))?;
        Ok(())
    }

    /// 结束录制
    pub fn end(&self, device: &dyn GpuDevice) -> Result<()> {
        device
            .end_command_buffer(self.buffer)
            .map_err(GraphicsError::command("command buffer end"))?;
        Ok(())
    }

    /// 销毁命令池（同时释放其中的命令缓冲区）
    pub fn destroy(&self, device: &dyn GpuDevice) {
        device.destroy_command_pool(self.pool);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::HeadlessDevice;

    #[test]
    fn test_state_transitions() {
        assert!(CommandBufferState::Initial.can_begin());
        assert!(!CommandBufferState::Recording.can_begin());
        assert!(!CommandBufferState::Pending.can_reset());
        assert!(CommandBufferState::Invalid.can_reset());
        assert!(CommandBufferState::Executable.can_submit());
        assert!(!CommandBufferState::Recording.can_submit());
    }

    #[test]
    fn test_command_context_lifecycle() {
        let device = HeadlessDevice::new();
        let ctx = CommandContext::new(&device).unwrap();

        assert_eq!(device.command_buffer_state(ctx.buffer()), Some(CommandBufferState::Initial));
        ctx.begin(&device).unwrap();
        assert_eq!(device.command_buffer_state(ctx.buffer()), Some(CommandBufferState::Recording));
        ctx.end(&device).unwrap();
        assert_eq!(device.command_buffer_state(ctx.buffer()), Some(CommandBufferState::Executable));

        // 重新录制前隐式重置
        ctx.begin(&device).unwrap();
        assert_eq!(device.command_buffer_state(ctx.buffer()), Some(CommandBufferState::Recording));

        ctx.destroy(&device);
        assert_eq!(device.command_buffer_state(ctx.buffer()), None);
        assert!(device.validation_errors().is_empty());
    }
}
