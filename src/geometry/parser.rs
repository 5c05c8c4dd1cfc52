/// OBJ 文本解析器
///
/// 将按行组织的几何描述解析为原始属性列表（位置、法线、纹理坐标）
/// 与面顶点索引列表。只接受三角形面，源格式中的 1 基索引在此转换为 0 基。
///
/// # 支持的记录
///
/// | 记录 | 字段 |
/// |------|------|
/// | `v x y z` | 顶点位置 |
/// | `vn x y z` | 顶点法线 |
/// | `vt u v` | 纹理坐标 |
/// | `f p/t/n p/t/n p/t/n` | 三角形面 |
///
/// 其他关键字（`o`、`g`、`usemtl`、`s`、注释等）以及空行被忽略。
use crate::core::error::ModelLoadError;
use std::io::BufRead;

/// 原始属性列表
///
/// 解析过程中逐条追加，解析结束后不再修改。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawAttributeLists {
    /// 顶点位置，每 3 个浮点数一组
    pub positions: Vec<f32>,
    /// 顶点法线，每 3 个浮点数一组
    pub normals: Vec<f32>,
    /// 纹理坐标，每 2 个浮点数一组
    pub texcoords: Vec<f32>,
}

impl RawAttributeLists {
    /// 位置条目数量
    pub fn position_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// 法线条目数量
    pub fn normal_count(&self) -> usize {
        self.normals.len() / 3
    }

    /// 纹理坐标条目数量
    pub fn texcoord_count(&self) -> usize {
        self.texcoords.len() / 2
    }
}

/// 面顶点引用（0 基）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceVertexRef {
    pub position: usize,
    pub texcoord: usize,
    pub normal: usize,
}

impl FaceVertexRef {
    /// 按 (position, texcoord, normal) 顺序展开
    pub fn to_triplet(self) -> [usize; 3] {
        [self.position, self.texcoord, self.normal]
    }
}

/// 解析结果
///
/// `face_indices` 是扁平的索引列表，每个面顶点占 3 个连续元素
/// （position, texcoord, normal），每个三角形占 9 个。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedModel {
    pub attributes: RawAttributeLists,
    pub face_indices: Vec<usize>,
}

impl ParsedModel {
    /// 面顶点数量
    pub fn face_vertex_count(&self) -> usize {
        self.face_indices.len() / 3
    }

    /// 三角形数量
    pub fn triangle_count(&self) -> usize {
        self.face_vertex_count() / 3
    }

    /// 以结构化形式遍历面顶点
    pub fn face_vertices(&self) -> impl Iterator<Item = FaceVertexRef> + '_ {
        self.face_indices.chunks_exact(3).map(|c| FaceVertexRef {
            position: c[0],
            texcoord: c[1],
            normal: c[2],
        })
    }
}

/// 逐行解析器
///
/// 可以逐行喂入（`parse_line`），也可以直接解析整个读取器（`parse_reader`）。
#[derive(Debug, Default)]
pub struct ModelParser {
    model: ParsedModel,
}

impl ModelParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// 解析整个字节流
    ///
    /// 任何一行出错都会中止解析，不存在部分模型。
    pub fn parse_reader<R: BufRead>(reader: R) -> Result<ParsedModel, ModelLoadError> {
        let mut parser = Self::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(ModelLoadError::Io)?;
            parser.parse_line(idx + 1, &line)?;
        }
        Ok(parser.finish())
    }

    /// 解析内存中的文本
    pub fn parse_str(source: &str) -> Result<ParsedModel, ModelLoadError> {
        Self::parse_reader(source.as_bytes())
    }

    /// 解析单行
    ///
    /// `line_no` 为 1 基行号，只用于错误信息。
    pub fn parse_line(&mut self, line_no: usize, line: &str) -> Result<(), ModelLoadError> {
        // 行内注释之后的内容全部丢弃
        let mut tokens = line
            .split_whitespace()
            .take_while(|token| !token.starts_with('#'));

        let Some(keyword) = tokens.next() else {
            return Ok(());
        };

        match keyword {
            "v" => push_floats::<3>(&mut self.model.attributes.positions, tokens, line_no, keyword),
            "vn" => push_floats::<3>(&mut self.model.attributes.normals, tokens, line_no, keyword),
            "vt" => push_floats::<2>(&mut self.model.attributes.texcoords, tokens, line_no, keyword),
            "f" => self.parse_face(tokens, line_no),
            _ => Ok(()),
        }
    }

    /// 结束解析，交出结果
    pub fn finish(self) -> ParsedModel {
        self.model
    }

    fn parse_face<'a>(
        &mut self,
        tokens: impl Iterator<Item = &'a str>,
        line_no: usize,
    ) -> Result<(), ModelLoadError> {
        let refs: Vec<&str> = tokens.collect();

        if refs.is_empty() {
            return Err(ModelLoadError::MalformedRecord {
                line: line_no,
                reason: "face record has no vertex references".to_string(),
            });
        }
        if refs.len() != 3 {
            return Err(ModelLoadError::UnsupportedTopology {
                line: line_no,
                vertex_count: refs.len(),
            });
        }

        // 先完整解析三个引用，再一次性追加，保证出错时索引列表不被污染
        let mut triangle = [0usize; 9];
        for (slot, token) in refs.iter().enumerate() {
            let face_vertex = parse_face_vertex(token, line_no)?;
            triangle[slot * 3..slot * 3 + 3].copy_from_slice(&face_vertex.to_triplet());
        }
        self.model.face_indices.extend_from_slice(&triangle);

        Ok(())
    }
}

/// 读取 N 个浮点字段并追加；多余的字段被忽略
fn push_floats<'a, const N: usize>(
    target: &mut Vec<f32>,
    mut tokens: impl Iterator<Item = &'a str>,
    line_no: usize,
    keyword: &str,
) -> Result<(), ModelLoadError> {
    let mut values = [0.0f32; N];
    for (i, value) in values.iter_mut().enumerate() {
        let token = tokens.next().ok_or_else(|| ModelLoadError::MalformedRecord {
            line: line_no,
            reason: format!("'{}' expects {} numeric fields, found {}", keyword, N, i),
        })?;

        *value = token
            .parse::<f32>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| ModelLoadError::MalformedRecord {
                line: line_no,
                reason: format!("'{}' field {} is not a finite number: '{}'", keyword, i + 1, token),
            })?;
    }

    target.extend_from_slice(&values);
    Ok(())
}

/// 解析 `p/t/n`，并把 1 基索引转换为 0 基
fn parse_face_vertex(token: &str, line_no: usize) -> Result<FaceVertexRef, ModelLoadError> {
    let malformed = |reason: String| ModelLoadError::MalformedRecord {
        line: line_no,
        reason,
    };

    let parts: Vec<&str> = token.split('/').collect();
    if parts.len() != 3 {
        return Err(malformed(format!(
            "face vertex '{}' must be position/texcoord/normal",
            token
        )));
    }

    let mut indices = [0usize; 3];
    for (index, part) in indices.iter_mut().zip(&parts) {
        let one_based: usize = part
            .parse()
            .map_err(|_| malformed(format!("face index '{}' in '{}' is not a positive integer", part, token)))?;

        *index = one_based
            .checked_sub(1)
            .ok_or_else(|| malformed(format!("face index 0 in '{}' (indices are 1-based)", token)))?;
    }

    Ok(FaceVertexRef {
        position: indices[0],
        texcoord: indices[1],
        normal: indices[2],
    })
}
