/// 几何体加载和处理模块
///
/// 把 OBJ 文本转换为可直接上传 GPU 的并行顶点数组。
///
/// # 模块结构
///
/// - `parser`: 逐行解析，得到原始属性列表与面顶点索引
/// - `expander`: 按索引展开为逐面顶点复制的扁平数组
/// - `loaders`: 统一的加载接口（文件 / 内存 / 读取器）
///
/// # 架构设计
///
/// ```text
/// 字节流 (OBJ)
///     ↓
/// ModelParser  → RawAttributeLists + 面索引
///     ↓
/// GeometryExpander → ExpandedGeometry (CPU侧数据)
///     ↓
/// GpuBufferSet (一次性上传到GPU)
/// ```

pub mod parser;
pub mod expander;
pub mod loaders;

// 重新导出常用类型
pub use parser::{FaceVertexRef, ModelParser, ParsedModel, RawAttributeLists};
pub use expander::{ExpandedGeometry, GeometryExpander};
