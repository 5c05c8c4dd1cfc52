//! 顶点缓冲区集合
//!
//! 展开后的三组并行数组（位置 / 法线 / 纹理坐标）各占一个 GPU 缓冲区，
//! 一次性上传，之后只保留句柄和顶点数。

use crate::core::error::{GraphicsError, Result};
use crate::geometry::expander::ExpandedGeometry;
use crate::gfx::context::{AttributeBinding, BufferHandle, GpuContext};

/// 三个属性在着色器中的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeLocations {
    pub position: u32,
    pub normal: u32,
    pub texcoord: u32,
}

/// 模型的 GPU 缓冲区
///
/// 句柄只在上下文销毁时通过 `release` 释放。
#[derive(Debug)]
pub struct GpuBufferSet {
    positions: BufferHandle,
    normals: BufferHandle,
    texcoords: BufferHandle,
    vertex_count: u32,
}

impl GpuBufferSet {
    /// 上传展开后的几何数据
    ///
    /// 中途失败时已创建的缓冲区会被销毁。
    pub fn upload<C: GpuContext + ?Sized>(context: &mut C, geometry: &ExpandedGeometry) -> Result<Self> {
        let vertex_count = u32::try_from(geometry.vertex_count()).map_err(|_| {
            GraphicsError::ResourceCreation(format!(
                "{} vertices exceed the drawable range",
                geometry.vertex_count()
            ))
        })?;

        let positions = context.create_buffer("positions", geometry.positions())?;

        let normals = match context.create_buffer("normals", geometry.normals()) {
            Ok(handle) => handle,
            Err(e) => {
                context.destroy_buffer(positions);
                return Err(e);
            }
        };

        let texcoords = match context.create_buffer("texcoords", geometry.texcoords()) {
            Ok(handle) => handle,
            Err(e) => {
                context.destroy_buffer(positions);
                context.destroy_buffer(normals);
                return Err(e);
            }
        };

        tracing::debug!("Uploaded {} vertices in 3 buffers", vertex_count);

        Ok(Self {
            positions,
            normals,
            texcoords,
            vertex_count,
        })
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn handles(&self) -> [BufferHandle; 3] {
        [self.positions, self.normals, self.texcoords]
    }

    /// 绑定三个缓冲区为并行属性
    ///
    /// 返回的守卫在离开作用域时解除所有绑定。
    pub fn bind<'a, C: GpuContext + ?Sized>(
        &self,
        context: &'a mut C,
        locations: AttributeLocations,
    ) -> Result<BoundBuffers<'a, C>> {
        let mut guard = BoundBuffers { context };
        guard.context.bind_attribute(AttributeBinding::packed(
            locations.position,
            self.positions,
            ExpandedGeometry::POSITION_COMPONENTS as u32,
        ))?;
        guard.context.bind_attribute(AttributeBinding::packed(
            locations.normal,
            self.normals,
            ExpandedGeometry::NORMAL_COMPONENTS as u32,
        ))?;
        guard.context.bind_attribute(AttributeBinding::packed(
            locations.texcoord,
            self.texcoords,
            ExpandedGeometry::TEXCOORD_COMPONENTS as u32,
        ))?;
        Ok(guard)
    }

    /// 释放三个缓冲区
    pub fn release<C: GpuContext + ?Sized>(self, context: &mut C) {
        for handle in self.handles() {
            context.destroy_buffer(handle);
        }
    }
}

/// 绑定守卫
pub struct BoundBuffers<'a, C: GpuContext + ?Sized> {
    context: &'a mut C,
}

impl<'a, C: GpuContext + ?Sized> BoundBuffers<'a, C> {
    pub fn context(&mut self) -> &mut C {
        self.context
    }
}

impl<'a, C: GpuContext + ?Sized> Drop for BoundBuffers<'a, C> {
    fn drop(&mut self) {
        self.context.unbind();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::loaders::{MeshLoader, ObjLoader};
    use crate::gfx::context::ProgramHandle;
    use crate::gfx::headless::HeadlessContext;

    const TRIANGLE: &str = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nvt 0 0\nvt 1 0\nvt 0 1\nf 1/1/1 2/2/1 3/3/1\n";

    const LOCATIONS: AttributeLocations = AttributeLocations {
        position: 0,
        normal: 1,
        texcoord: 2,
    };

    #[test]
    fn test_upload_keeps_vertex_count() {
        let geometry = ObjLoader::load_from_memory(TRIANGLE.as_bytes()).unwrap();
        let mut ctx = HeadlessContext::new();
        let buffers = GpuBufferSet::upload(&mut ctx, &geometry).unwrap();

        assert_eq!(buffers.vertex_count(), 3);
        assert_eq!(ctx.live_buffer_count(), 3);

        let [positions, normals, texcoords] = buffers.handles();
        assert_eq!(ctx.buffer_data(positions), Some(geometry.positions()));
        assert_eq!(ctx.buffer_data(normals).map(<[f32]>::len), Some(9));
        assert_eq!(ctx.buffer_data(texcoords).map(<[f32]>::len), Some(6));
    }

    #[test]
    fn test_release_destroys_all_buffers() {
        let geometry = ObjLoader::load_from_memory(TRIANGLE.as_bytes()).unwrap();
        let mut ctx = HeadlessContext::new();
        let buffers = GpuBufferSet::upload(&mut ctx, &geometry).unwrap();
        buffers.release(&mut ctx);
        assert_eq!(ctx.live_buffer_count(), 0);
    }

    #[test]
    fn test_guard_unbinds_on_drop() {
        let geometry = ObjLoader::load_from_memory(TRIANGLE.as_bytes()).unwrap();
        let mut ctx = HeadlessContext::new();
        let buffers = GpuBufferSet::upload(&mut ctx, &geometry).unwrap();

        {
            let _bound = buffers.bind(&mut ctx, LOCATIONS).unwrap();
        }

        // 守卫释放后再绘制会因为没有程序和属性而失败
        ctx.begin_frame([0.0; 4]).unwrap();
        assert!(ctx.draw_triangles(0, 3).is_err());
        assert!(ctx.use_program(ProgramHandle(999)).is_err());
    }
}
