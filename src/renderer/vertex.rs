//! 顶点数据定义
//!
//! 顶点结构通过 `bytemuck` 直接转换为字节上传到 GPU。
//! UV 坐标拆成两个标量分别插在 `position` 和 `normal` 之后，
//! 这样在着色器的 std430 布局下整个结构按 16 字节对齐且没有填充。

use bytemuck::{Pod, Zeroable};

/// 顶点结构体
///
/// # 内存布局
///
/// | 偏移 | 字段       | 大小 |
/// |------|------------|------|
/// | 0    | `position` | 12   |
/// | 12   | `uv_x`     | 4    |
/// | 16   | `normal`   | 12   |
/// | 28   | `uv_y`     | 4    |
/// | 32   | `color`    | 16   |
///
/// 总大小：48 字节
#[repr(C)]
#[derive(Default, Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub uv_x: f32,
    pub normal: [f32; 3],
    pub uv_y: f32,
    /// RGBA，范围 0.0-1.0
    pub color: [f32; 4],
}

impl Vertex {
    /// 创建一个新顶点（法线朝 +Z，白色）
    pub fn new(position: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            uv_x: uv[0],
            normal: [0.0, 0.0, 1.0],
            uv_y: uv[1],
            color: [1.0; 4],
        }
    }

    /// 设置颜色
    pub fn with_color(mut self, color: [f32; 4]) -> Self {
        self.color = color;
        self
    }
}

/// 创建一个单位矩形（两个三角形）
///
/// # 返回值
///
/// 四个顶点和六个索引，顶点颜色分别为红、绿、蓝、白
pub fn create_default_rectangle() -> ([Vertex; 4], [u32; 6]) {
    let vertices = [
        Vertex::new([0.5, -0.5, 0.0], [1.0, 0.0]).with_color([1.0, 0.0, 0.0, 1.0]),
        Vertex::new([0.5, 0.5, 0.0], [1.0, 1.0]).with_color([0.0, 1.0, 0.0, 1.0]),
        Vertex::new([-0.5, -0.5, 0.0], [0.0, 0.0]).with_color([0.0, 0.0, 1.0, 1.0]),
        Vertex::new([-0.5, 0.5, 0.0], [0.0, 1.0]),
    ];
    let indices = [0, 1, 2, 2, 1, 3];
    (vertices, indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem;

    #[test]
    fn test_vertex_layout() {
        assert_eq!(mem::size_of::<Vertex>(), 48, "Vertex size should be 48 bytes");
        assert_eq!(mem::align_of::<Vertex>(), 4);

        let vertex = Vertex::default();
        let base = &vertex as *const Vertex as usize;
        assert_eq!(&vertex.uv_x as *const f32 as usize - base, 12);
        assert_eq!(&vertex.normal as *const [f32; 3] as usize - base, 16);
        assert_eq!(&vertex.color as *const [f32; 4] as usize - base, 32);
    }

    #[test]
    fn test_pod_bytes() {
        let (vertices, indices) = create_default_rectangle();
        let bytes: &[u8] = bytemuck::cast_slice(&vertices);
        assert_eq!(bytes.len(), 4 * 48);
        assert_eq!(bytemuck::cast_slice::<u32, u8>(&indices).len(), 24);

        let back: &[Vertex] = bytemuck::cast_slice(bytes);
        assert_eq!(back[1].uv_y, 1.0);
        assert_eq!(back[0].color, [1.0, 0.0, 0.0, 1.0]);
    }
}
