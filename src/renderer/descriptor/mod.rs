//! 描述符管理模块
//!
//! 描述符集是着色器通过绑定号引用缓冲区和图像的 GPU 侧绑定表，
//! 从容量有限、只能整体重置的描述符池中分配。
//!
//! # 组成
//!
//! - [`DescriptorLayoutBuilder`]：累积绑定并构建描述符集布局
//! - [`DescriptorAllocator`]：单池、固定容量，用于启动期的全局描述符
//! - [`GrowableDescriptorAllocator`]：按需增长的池集合，每个帧槽位一个
//! - [`DescriptorWriter`]：批量写入缓冲区/图像绑定
//!
//! 池被重置或销毁时，它分配过的描述符集全部失效，
//! 通过 [`DescriptorSet::is_valid`] 可以检查。

mod allocator;
mod growable;
mod layout;
mod pool;
mod writer;

pub use allocator::DescriptorAllocator;
pub use growable::{AllocatorStats, GrowableDescriptorAllocator, MAX_SETS_PER_POOL};
pub use layout::DescriptorLayoutBuilder;
pub use pool::{pool_sizes, DescriptorKind, DescriptorPool, DescriptorSet, PoolSizeRatio};
pub use writer::DescriptorWriter;
