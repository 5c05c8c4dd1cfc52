/// OBJ 文件加载器
///
/// 组合 `ModelParser` 与 `GeometryExpander`：先解析出原始属性列表与面索引，
/// 再展开为可直接上传的并行数组。原始列表只在加载期间存在。
use super::MeshLoader;
use crate::core::error::{ModelLoadError, Result};
use crate::geometry::expander::{ExpandedGeometry, GeometryExpander};
use crate::geometry::parser::ModelParser;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// OBJ 格式加载器
///
/// # 特性
///
/// - 只接受三角形面，四边形及以上直接报错（不自动三角化）
/// - 每个面顶点必须是 `position/texcoord/normal` 三元组
/// - 不翻转 UV，纹理方向在纹理上传时处理
pub struct ObjLoader;

impl ObjLoader {
    /// 从任意缓冲读取器加载
    ///
    /// 字节流只读取一次，不会被保留。
    pub fn load_from_reader<R: BufRead>(reader: R) -> Result<ExpandedGeometry> {
        let parsed = ModelParser::parse_reader(reader)?;

        tracing::debug!(
            positions = parsed.attributes.position_count(),
            normals = parsed.attributes.normal_count(),
            texcoords = parsed.attributes.texcoord_count(),
            triangles = parsed.triangle_count(),
            "OBJ records parsed"
        );

        let geometry = GeometryExpander::expand_model(&parsed)?;

        if geometry.is_empty() {
            tracing::warn!("OBJ source contains no triangle faces");
        }

        tracing::info!(
            "Loaded OBJ: {} triangles, {} draw vertices",
            geometry.triangle_count(),
            geometry.vertex_count()
        );

        Ok(geometry)
    }
}

impl MeshLoader for ObjLoader {
    fn load_from_file(path: &Path) -> Result<ExpandedGeometry> {
        if !path.exists() {
            return Err(ModelLoadError::FileNotFound(path.to_path_buf()).into());
        }

        let file = File::open(path).map_err(ModelLoadError::Io)?;
        tracing::info!("Loading model from: {}", path.display());

        Self::load_from_reader(BufReader::new(file))
    }

    fn load_from_memory(data: &[u8]) -> Result<ExpandedGeometry> {
        Self::load_from_reader(data)
    }

    fn supported_extensions() -> &'static [&'static str] {
        &["obj"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::SpinRenderError;

    const QUAD_AS_TRIANGLES: &str = "\
v -1 -1 0
v 1 -1 0
v 1 1 0
v -1 1 0
vn 0 0 1
vt 0 0
vt 1 0
vt 1 1
vt 0 1
f 1/1/1 2/2/1 3/3/1
f 1/1/1 3/3/1 4/4/1
";

    #[test]
    fn test_supported_extensions() {
        let exts = ObjLoader::supported_extensions();
        assert_eq!(exts, &["obj"]);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = ObjLoader::load_from_file(Path::new("nonexistent.obj"));
        assert!(matches!(
            result,
            Err(SpinRenderError::ModelLoad(ModelLoadError::FileNotFound(_)))
        ));
    }

    #[test]
    fn test_load_from_memory() {
        let geometry = ObjLoader::load_from_memory(QUAD_AS_TRIANGLES.as_bytes()).unwrap();

        assert_eq!(geometry.triangle_count(), 2);
        assert_eq!(geometry.positions().len(), 18);
        assert_eq!(geometry.texcoords().len(), 12);
        // 第二个三角形的第三个顶点是位置 4 / 纹理坐标 4
        assert_eq!(&geometry.positions()[15..18], &[-1.0, 1.0, 0.0]);
        assert_eq!(&geometry.texcoords()[10..12], &[0.0, 1.0]);
    }

    #[test]
    fn test_empty_input_yields_empty_geometry() {
        let geometry = ObjLoader::load_from_memory(b"").unwrap();
        assert!(geometry.is_empty());
    }

    #[test]
    fn test_errors_propagate() {
        let result = ObjLoader::load_from_memory(b"v 0 0 0\nf 1/1/1 1/1/1 1/1/1 1/1/1\n");
        assert!(matches!(
            result,
            Err(SpinRenderError::ModelLoad(ModelLoadError::UnsupportedTopology { .. }))
        ));
    }
}
