//! 渲染器模块
//!
//! 管理 GPU 资源的生命周期和描述符分配：
//!
//! - `frame`：帧资源环，`FRAME_OVERLAP` 个槽位轮流使用
//! - `context`：渲染上下文，驱动帧循环、立即提交和关闭流程
//! - `descriptor`：描述符布局、池、分配器和写入器
//! - `deletion`：延迟删除队列
//! - `immediate`：帧循环之外的同步提交

pub mod command;
pub mod context;
pub mod deletion;
pub mod descriptor;
pub mod frame;
pub mod immediate;
pub mod resource;
pub mod sync;
pub mod vertex;

pub use context::RenderContext;
pub use deletion::{DeletionQueue, Disposal};
pub use frame::{FrameData, FrameRing, FRAME_OVERLAP};
pub use immediate::ImmediateSubmitter;
pub use resource::{AllocatedBuffer, AllocatedImage, BufferDescriptor, BufferUsageType, GpuMeshBuffers, MemoryType};
pub use vertex::Vertex;
