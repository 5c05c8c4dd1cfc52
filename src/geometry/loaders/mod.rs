/// 模型加载器模块
///
/// 提供统一的模型加载接口和具体格式的实现。
///
/// # 支持的格式
///
/// - **OBJ**: Wavefront OBJ 的三角形子集（`v`/`vn`/`vt`/`f`）
///
/// # 使用示例
///
/// ```rust,no_run
/// use spin_render::geometry::loaders::{MeshLoader, ObjLoader};
/// use std::path::Path;
///
/// let geometry = ObjLoader::load_from_file(Path::new("model.obj"))?;
/// println!("三角形数: {}", geometry.triangle_count());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
use crate::core::error::{ModelLoadError, Result};
use crate::geometry::expander::ExpandedGeometry;
use std::path::Path;

pub mod obj_loader;

pub use obj_loader::ObjLoader;

/// 网格加载器 trait
///
/// 所有格式的加载器都实现此 trait。
///
/// # 实现要求
///
/// - 加载器是无状态的（使用静态方法）
/// - 返回 CPU 侧的 `ExpandedGeometry`，不涉及 GPU 资源
/// - 任何解析错误都中止加载，不返回部分模型
pub trait MeshLoader {
    /// 从文件路径加载网格
    ///
    /// # 错误
    ///
    /// - 文件不存在或无法读取
    /// - 记录格式错误、非三角形面、索引越界
    fn load_from_file(path: &Path) -> Result<ExpandedGeometry>;

    /// 从内存数据加载网格
    fn load_from_memory(data: &[u8]) -> Result<ExpandedGeometry>;

    /// 获取支持的文件扩展名列表（小写，不含点号）
    fn supported_extensions() -> &'static [&'static str];
}

/// 根据文件扩展名选择合适的加载器
pub fn load_mesh(path: &Path) -> Result<ExpandedGeometry> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .ok_or_else(|| ModelLoadError::UnsupportedFormat("cannot determine file extension".to_string()))?;

    if ObjLoader::supported_extensions().contains(&extension.as_str()) {
        ObjLoader::load_from_file(path)
    } else {
        Err(ModelLoadError::UnsupportedFormat(format!("unsupported file format: .{}", extension)).into())
    }
}
