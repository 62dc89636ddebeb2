//! 立即提交
//!
//! 在帧循环之外同步执行一次性 GPU 命令（例如启动时的上传）：
//! 重置 Fence 和命令缓冲区，录制调用者的命令，提交，阻塞直到 Fence 触发。
//!
//! 只有一套 Fence/命令上下文，并发调用通过互斥锁串行化。

use ash::vk;
use parking_lot::Mutex;
use tracing::{error, trace};

use super::command::CommandContext;
use super::sync::SubmitInfo;
use crate::core::error::{GraphicsError, Result};
use crate::gfx::GpuDevice;

#[derive(Debug)]
struct ImmediateResources {
    fence: vk::Fence,
    command: CommandContext,
}

/// 立即提交器
#[derive(Debug)]
pub struct ImmediateSubmitter {
    resources: Mutex<ImmediateResources>,
    timeout_ns: u64,
}

impl ImmediateSubmitter {
    pub fn new(device: &dyn GpuDevice, timeout_ns: u64) -> Result<Self> {
        let command = CommandContext::new(device)?;
        let fence = match device.create_fence(true) {
            Ok(fence) => fence,
            Err(result) => {
                command.destroy(device);
                return Err(GraphicsError::creation("immediate fence")(result).into());
            }
        };

        Ok(Self {
            resources: Mutex::new(ImmediateResources { fence, command }),
            timeout_ns,
        })
    }

    /// 录制并同步执行一批命令
    ///
    /// 返回时命令已经在 GPU 上执行完毕。等待超时视为设备挂起，返回 `GraphicsError::Timeout`。
    pub fn submit<F>(&self, device: &dyn GpuDevice, record: F) -> Result<()>
    where
        F: FnOnce(&dyn GpuDevice, vk::CommandBuffer),
    {
        let resources = self.resources.lock();
        let cmd = resources.command.buffer();

        device
            .reset_fence(resources.fence)
            .map_err(GraphicsError::command("immediate fence reset"))?;
        resources.command.begin(device)?;

        record(device, cmd);

        resources.command.end(device)?;
        device
            .queue_submit(&SubmitInfo::command_only(cmd), resources.fence)
            .map_err(GraphicsError::command("immediate submit"))?;

        device
            .wait_for_fence(resources.fence, self.timeout_ns)
            .map_err(|result| {
                error!(%result, timeout_ns = self.timeout_ns, "Immediate submit did not complete");
                GraphicsError::wait("immediate fence", self.timeout_ns)(result)
            })?;

        trace!("Immediate submit completed");
        Ok(())
    }

    /// 释放 Fence 和命令池，调用前 GPU 必须已经空闲
    pub fn destroy(&self, device: &dyn GpuDevice) {
        let resources = self.resources.lock();
        resources.command.destroy(device);
        device.destroy_fence(resources.fence);
    }
}
