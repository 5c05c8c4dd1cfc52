//! 错误处理模块
//!
//! 定义了渲染器中使用的统一错误类型。
//!
//! # 设计原则
//!
//! - 手写 `Display` 与 `Error` 实现，保持零依赖
//! - 为每种错误类型提供清晰的上下文信息（行号、索引、着色器阶段）
//! - 支持错误链（error source）
//! - 易于模式匹配：测试直接匹配具体的错误变体

use std::fmt;
use std::path::PathBuf;

use crate::gfx::context::ShaderStage;

/// 统一的 Result 类型
///
/// 所有可能返回错误的函数都应该使用这个类型。
pub type Result<T> = std::result::Result<T, SpinRenderError>;

/// SpinRender 的错误类型
#[derive(Debug)]
pub enum SpinRenderError {
    /// 配置错误
    Config(ConfigError),

    /// 图形 API 错误
    Graphics(GraphicsError),

    /// 模型加载错误
    ModelLoad(ModelLoadError),

    /// IO 错误
    Io(std::io::Error),

    /// 初始化错误
    Initialization(String),
}

/// 配置相关的错误
#[derive(Debug)]
pub enum ConfigError {
    /// 配置文件未找到
    FileNotFound(String),

    /// 配置文件解析失败
    ParseError(String),

    /// 配置值无效
    InvalidValue { field: String, reason: String },
}

/// 图形 API 相关的错误
#[derive(Debug)]
pub enum GraphicsError {
    /// 设备创建失败
    DeviceCreation(String),

    /// 表面（交换链）错误
    Surface(String),

    /// 着色器编译失败，携带编译器诊断文本
    InvalidShader { stage: ShaderStage, diagnostic: String },

    /// 着色器程序链接失败
    LinkFailure(String),

    /// 资源创建失败
    ResourceCreation(String),

    /// 渲染器尚未进入 Ready 状态
    NotReady,

    /// 绑定状态不完整或不一致（未绑定程序、属性缺失、缓冲区过小等）
    InvalidBinding(String),

    /// 渲染命令执行失败
    CommandExecution(String),
}

/// 模型加载相关的错误
#[derive(Debug)]
pub enum ModelLoadError {
    /// 文件不存在
    FileNotFound(PathBuf),

    /// 不支持的文件格式
    UnsupportedFormat(String),

    /// 记录字段数量不足或字段不是数字
    MalformedRecord { line: usize, reason: String },

    /// 非三角形面
    UnsupportedTopology { line: usize, vertex_count: usize },

    /// 面顶点引用超出属性列表范围
    IndexOutOfRange {
        attribute: &'static str,
        index: usize,
        len: usize,
    },

    /// 读取模型字节流失败
    Io(std::io::Error),
}

impl fmt::Display for SpinRenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpinRenderError::Config(e) => write!(f, "Configuration error: {}", e),
            SpinRenderError::Graphics(e) => write!(f, "Graphics error: {}", e),
            SpinRenderError::ModelLoad(e) => write!(f, "Model loading error: {}", e),
            SpinRenderError::Io(e) => write!(f, "IO error: {}", e),
            SpinRenderError::Initialization(msg) => write!(f, "Initialization error: {}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {}", path),
            ConfigError::ParseError(msg) => write!(f, "Failed to parse config: {}", msg),
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "Invalid value for '{}': {}", field, reason)
            }
        }
    }
}

impl fmt::Display for GraphicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphicsError::DeviceCreation(msg) => write!(f, "Device creation failed: {}", msg),
            GraphicsError::Surface(msg) => write!(f, "Surface error: {}", msg),
            GraphicsError::InvalidShader { stage, diagnostic } => {
                write!(f, "{} shader failed to compile:\n{}", stage, diagnostic)
            }
            GraphicsError::LinkFailure(msg) => write!(f, "Program link failed: {}", msg),
            GraphicsError::ResourceCreation(msg) => write!(f, "Resource creation failed: {}", msg),
            GraphicsError::NotReady => write!(f, "Renderer is not ready, frame rejected"),
            GraphicsError::InvalidBinding(msg) => write!(f, "Invalid binding state: {}", msg),
            GraphicsError::CommandExecution(msg) => write!(f, "Command execution failed: {}", msg),
        }
    }
}

impl fmt::Display for ModelLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelLoadError::FileNotFound(path) => {
                write!(f, "Model file not found: {}", path.display())
            }
            ModelLoadError::UnsupportedFormat(msg) => write!(f, "Unsupported model format: {}", msg),
            ModelLoadError::MalformedRecord { line, reason } => {
                write!(f, "Malformed record at line {}: {}", line, reason)
            }
            ModelLoadError::UnsupportedTopology { line, vertex_count } => write!(
                f,
                "Unsupported face topology at line {}: {} vertices (only triangles are accepted)",
                line, vertex_count
            ),
            ModelLoadError::IndexOutOfRange { attribute, index, len } => write!(
                f,
                "{} index {} out of range ({} entries)",
                attribute, index, len
            ),
            ModelLoadError::Io(e) => write!(f, "Failed to read model stream: {}", e),
        }
    }
}

impl std::error::Error for SpinRenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SpinRenderError::Io(e) => Some(e),
            SpinRenderError::Config(e) => Some(e),
            SpinRenderError::Graphics(e) => Some(e),
            SpinRenderError::ModelLoad(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for GraphicsError {}

impl std::error::Error for ModelLoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ModelLoadError::Io(e) => Some(e),
            _ => None,
        }
    }
}

// 实现 From trait 以便于错误转换
impl From<std::io::Error> for SpinRenderError {
    fn from(err: std::io::Error) -> Self {
        SpinRenderError::Io(err)
    }
}

impl From<ConfigError> for SpinRenderError {
    fn from(err: ConfigError) -> Self {
        SpinRenderError::Config(err)
    }
}

impl From<GraphicsError> for SpinRenderError {
    fn from(err: GraphicsError) -> Self {
        SpinRenderError::Graphics(err)
    }
}

impl From<ModelLoadError> for SpinRenderError {
    fn from(err: ModelLoadError) -> Self {
        SpinRenderError::ModelLoad(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_error_display_carries_line() {
        let err: SpinRenderError = ModelLoadError::MalformedRecord {
            line: 7,
            reason: "expected 3 fields".to_string(),
        }
        .into();

        let text = err.to_string();
        assert!(text.contains("line 7"));
        assert!(text.contains("expected 3 fields"));
    }

    #[test]
    fn test_every_top_level_variant_has_a_prefix() {
        let errors = [
            SpinRenderError::Config(ConfigError::ParseError("bad".to_string())),
            SpinRenderError::Graphics(GraphicsError::NotReady),
            SpinRenderError::ModelLoad(ModelLoadError::UnsupportedFormat(".fbx".to_string())),
            SpinRenderError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk")),
            SpinRenderError::Initialization("texture".to_string()),
        ];
        for err in &errors {
            // 新增变体必须在这里补上
            let prefix = match err {
                SpinRenderError::Config(_) => "Configuration error",
                SpinRenderError::Graphics(_) => "Graphics error",
                SpinRenderError::ModelLoad(_) => "Model loading error",
                SpinRenderError::Io(_) => "IO error",
                SpinRenderError::Initialization(_) => "Initialization error",
            };
            assert!(err.to_string().starts_with(prefix));
        }
    }

    #[test]
    fn test_shader_error_names_stage() {
        let err = GraphicsError::InvalidShader {
            stage: ShaderStage::Fragment,
            diagnostic: "unknown identifier".to_string(),
        };
        assert!(err.to_string().starts_with("fragment shader"));
    }
}
