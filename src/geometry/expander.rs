/// 几何展开模块
///
/// 将索引形式的共享属性数据解析为扁平、逐面顶点复制的并行数组，
/// 可以不经索引缓冲直接上传 GPU。
use super::parser::{ParsedModel, RawAttributeLists};
use crate::core::error::ModelLoadError;

/// 展开后的几何数据
///
/// 三个并行数组中第 i 个条目对应绘制顺序中的第 i 个面顶点。
/// 构造时保证 `positions/3 == normals/3 == texcoords/2 == triangle_count*3`，
/// 字段私有，之后不可修改。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpandedGeometry {
    positions: Vec<f32>,
    normals: Vec<f32>,
    texcoords: Vec<f32>,
}

impl ExpandedGeometry {
    /// 每个位置的分量数
    pub const POSITION_COMPONENTS: usize = 3;
    /// 每个法线的分量数
    pub const NORMAL_COMPONENTS: usize = 3;
    /// 每个纹理坐标的分量数
    pub const TEXCOORD_COMPONENTS: usize = 2;

    #[inline]
    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    #[inline]
    pub fn normals(&self) -> &[f32] {
        &self.normals
    }

    #[inline]
    pub fn texcoords(&self) -> &[f32] {
        &self.texcoords
    }

    /// 面顶点（即绘制顶点）数量
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / Self::POSITION_COMPONENTS
    }

    /// 三角形数量
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.vertex_count() / 3
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// 几何展开器
pub struct GeometryExpander;

impl GeometryExpander {
    /// 展开一个解析结果
    pub fn expand_model(model: &ParsedModel) -> Result<ExpandedGeometry, ModelLoadError> {
        Self::expand(&model.attributes, &model.face_indices)
    }

    /// 按 (position, texcoord, normal) 三元组解析索引列表
    ///
    /// 任何越界索引都会中止展开并返回 `IndexOutOfRange`。
    pub fn expand(
        attributes: &RawAttributeLists,
        face_indices: &[usize],
    ) -> Result<ExpandedGeometry, ModelLoadError> {
        if face_indices.len() % 9 != 0 {
            return Err(ModelLoadError::MalformedRecord {
                line: 0,
                reason: format!(
                    "index list of length {} does not describe whole triangles",
                    face_indices.len()
                ),
            });
        }

        let vertex_count = face_indices.len() / 3;
        let mut positions = Vec::with_capacity(vertex_count * ExpandedGeometry::POSITION_COMPONENTS);
        let mut normals = Vec::with_capacity(vertex_count * ExpandedGeometry::NORMAL_COMPONENTS);
        let mut texcoords = Vec::with_capacity(vertex_count * ExpandedGeometry::TEXCOORD_COMPONENTS);

        for triplet in face_indices.chunks_exact(3) {
            let (position, texcoord, normal) = (triplet[0], triplet[1], triplet[2]);

            positions.extend_from_slice(resolve::<3>(&attributes.positions, position, "position")?);
            normals.extend_from_slice(resolve::<3>(&attributes.normals, normal, "normal")?);
            texcoords.extend_from_slice(resolve::<2>(&attributes.texcoords, texcoord, "texcoord")?);
        }

        Ok(ExpandedGeometry {
            positions,
            normals,
            texcoords,
        })
    }
}

/// 取出第 `index` 个 N 分量条目，越界时报告条目数而非浮点数个数
fn resolve<'a, const N: usize>(
    list: &'a [f32],
    index: usize,
    attribute: &'static str,
) -> Result<&'a [f32], ModelLoadError> {
    let out_of_range = || ModelLoadError::IndexOutOfRange {
        attribute,
        index,
        len: list.len() / N,
    };

    let start = index.checked_mul(N).ok_or_else(out_of_range)?;
    let end = start.checked_add(N).ok_or_else(out_of_range)?;
    list.get(start..end).ok_or_else(out_of_range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::parser::ModelParser;

    fn triangle_attributes() -> RawAttributeLists {
        RawAttributeLists {
            positions: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            normals: vec![0.0, 0.0, 1.0],
            texcoords: vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
        }
    }

    #[test]
    fn test_single_triangle_sizes_and_values() {
        let attributes = triangle_attributes();
        // (p, t, n) 三元组，三个面顶点共用一条法线
        let indices = [0, 0, 0, 1, 1, 0, 2, 2, 0];
        let geometry = GeometryExpander::expand(&attributes, &indices).unwrap();

        assert_eq!(geometry.positions().len(), 9);
        assert_eq!(geometry.normals().len(), 9);
        assert_eq!(geometry.texcoords().len(), 6);
        assert_eq!(geometry.positions(), attributes.positions.as_slice());
        assert_eq!(geometry.normals(), &[0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0]);
        assert_eq!(geometry.texcoords(), attributes.texcoords.as_slice());
        assert_eq!(geometry.triangle_count(), 1);
    }

    #[test]
    fn test_shared_vertices_are_duplicated() {
        let attributes = triangle_attributes();
        // 两个三角形复用同一组位置，展开后不共享
        let indices = [0, 0, 0, 1, 1, 0, 2, 2, 0, 2, 2, 0, 1, 1, 0, 0, 0, 0];
        let geometry = GeometryExpander::expand(&attributes, &indices).unwrap();

        assert_eq!(geometry.vertex_count(), 6);
        assert_eq!(&geometry.positions()[9..12], &[0.0, 1.0, 0.0]);
        assert_eq!(&geometry.texcoords()[10..12], &[0.0, 0.0]);
    }

    #[test]
    fn test_index_out_of_range() {
        let attributes = triangle_attributes();

        let cases: [([usize; 9], &str, usize); 3] = [
            ([0, 0, 0, 1, 1, 0, 3, 2, 0], "position", 3),
            ([0, 0, 0, 1, 1, 1, 2, 2, 0], "normal", 1),
            ([0, 0, 0, 1, 3, 0, 2, 2, 0], "texcoord", 3),
        ];

        for (indices, expected_attribute, expected_index) in cases {
            match GeometryExpander::expand(&attributes, &indices) {
                Err(ModelLoadError::IndexOutOfRange { attribute, index, .. }) => {
                    assert_eq!(attribute, expected_attribute);
                    assert_eq!(index, expected_index);
                }
                other => panic!("expected IndexOutOfRange, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_huge_index_does_not_overflow() {
        let attributes = triangle_attributes();
        let indices = [usize::MAX, 0, 0, 0, 0, 0, 0, 0, 0];
        assert!(matches!(
            GeometryExpander::expand(&attributes, &indices),
            Err(ModelLoadError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn test_partial_triangle_is_rejected() {
        let attributes = triangle_attributes();
        assert!(GeometryExpander::expand(&attributes, &[0, 0, 0]).is_err());
    }

    #[test]
    fn test_parsed_index_past_end_is_rejected() {
        // 语法正确，但引用了不存在的第 4 个位置
        let model = ModelParser::parse_str(
            "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nvt 0 0\nf 1/1/1 2/1/1 4/1/1\n",
        )
        .unwrap();

        match GeometryExpander::expand_model(&model) {
            Err(ModelLoadError::IndexOutOfRange { attribute, index, len }) => {
                assert_eq!(attribute, "position");
                assert_eq!(index, 3);
                assert_eq!(len, 3);
            }
            other => panic!("expected IndexOutOfRange, got {:?}", other),
        }
    }

    #[test]
    fn test_buffer_sizing_matches_triangle_count() {
        let attributes = triangle_attributes();
        for triangles in [0usize, 1, 5, 32] {
            let indices: Vec<usize> = [0, 0, 0, 1, 1, 0, 2, 2, 0]
                .iter()
                .copied()
                .cycle()
                .take(triangles * 9)
                .collect();
            let geometry = GeometryExpander::expand(&attributes, &indices).unwrap();

            assert_eq!(geometry.positions().len(), 3 * triangles * 3);
            assert_eq!(geometry.normals().len(), 3 * triangles * 3);
            assert_eq!(geometry.texcoords().len(), 2 * triangles * 3);
            assert_eq!(geometry.triangle_count(), triangles);
        }
    }
}
