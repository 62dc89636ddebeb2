//! gpu_lifetime 演示程序
//!
//! 在无头设备上跑完整的帧循环：上传一个矩形网格，每帧创建一个 uniform 缓冲区，
//! 从帧分配器分配描述符集并写入绑定，缓冲区推迟到该槽位下次复用时释放。
//!
//! # 使用方法
//!
//! ```bash
//! # 使用配置文件
//! cargo run
//!
//! # 命令行覆盖
//! cargo run -- --frames 64 --log-level debug
//! ```

use std::sync::Arc;

use anyhow::Context;
use ash::vk;
use tracing::info;

use gpu_lifetime::core::{log, Config};
use gpu_lifetime::gfx::HeadlessDevice;
use gpu_lifetime::renderer::descriptor::{DescriptorKind, DescriptorLayoutBuilder, DescriptorWriter};
use gpu_lifetime::renderer::vertex::create_default_rectangle;
use gpu_lifetime::renderer::{BufferDescriptor, BufferUsageType, Disposal, MemoryType, RenderContext};

/// 每帧 uniform 数据
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct FrameUniforms {
    tint: [f32; 4],
    frame: [u32; 4],
}

fn main() -> anyhow::Result<()> {
    // 1. 加载配置（在初始化日志之前）
    let mut config = Config::from_file_or_default("config.toml");

    // 2. 应用命令行参数
    config.apply_args(std::env::args());
    config.validate().context("Invalid configuration")?;

    // 3. 初始化日志系统
    let log_file = config
        .logging
        .file_output
        .then_some(config.logging.log_file.as_str());
    let _log_guard = log::init_logger(config.logging.level, config.logging.file_output, log_file);
    info!(version = env!("CARGO_PKG_VERSION"), frames = config.demo.frames, "gpu_lifetime starting...");

    // 4. 创建设备和渲染上下文
    let device = Arc::new(HeadlessDevice::new());
    let mut ctx = RenderContext::new(device.clone(), &config).context("Failed to initialize render context")?;

    // 5. 上传网格，关闭时释放
    let (vertices, indices) = create_default_rectangle();
    let mesh = ctx.upload_mesh(&vertices, &indices).context("Failed to upload mesh")?;
    info!(index_count = mesh.index_count, "Mesh uploaded");
    ctx.defer_global(Disposal::Buffer(mesh.vertex_buffer));
    ctx.defer_global(Disposal::Buffer(mesh.index_buffer));

    let layout = DescriptorLayoutBuilder::new()
        .add_binding(0, DescriptorKind::UniformBuffer)
        .build(ctx.device(), vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT)
        .context("Failed to build descriptor set layout")?;
    ctx.defer_global(Disposal::DescriptorSetLayout(layout));

    // 6. 帧循环
    let uniform_size = std::mem::size_of::<FrameUniforms>() as u64;
    for frame in 0..config.demo.frames {
        ctx.draw_frame(|ctx| {
            let mut uniforms = ctx.create_buffer(
                &BufferDescriptor::new(uniform_size, BufferUsageType::Constant, MemoryType::HostCoherent)
                    .with_name("frame uniforms"),
            )?;
            let data = FrameUniforms {
                tint: [1.0, 1.0, 1.0, 1.0],
                frame: [frame, 0, 0, 0],
            };
            ctx.write_buffer(&mut uniforms, 0, bytemuck::bytes_of(&data))?;

            let set = ctx.allocate_frame_set(layout)?;
            let mut writer = DescriptorWriter::new();
            writer.write_buffer(0, uniforms.buffer, uniform_size, 0, DescriptorKind::UniformBuffer);
            ctx.update_set(&mut writer, &set)?;

            ctx.defer_frame(Disposal::Buffer(uniforms));
            Ok(())
        })
        .with_context(|| format!("Frame {frame} failed"))?;
    }

    let stats = ctx.get_current_frame().descriptors.stats();
    info!(
        frames = ctx.frame_number(),
        pools_created = stats.pools_created,
        sets_per_pool = stats.sets_per_pool,
        "Frame loop finished"
    );

    // 7. 关闭
    ctx.cleanup().context("Failed to clean up render context")?;
    info!(live_objects = device.live_objects(), "Shutdown complete");
    Ok(())
}
