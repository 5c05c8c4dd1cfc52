//! 配置管理模块
//!
//! 提供渲染器配置的加载、解析和管理功能。
//! 支持从 TOML 配置文件加载，也支持命令行参数覆盖。
//!
//! # 配置文件格式 (config.toml)
//!
//! ```toml
//! [window]
//! width = 800
//! height = 600
//! title = "SpinRender"
//! resizable = true
//!
//! [graphics]
//! api = "auto"                # auto, vulkan, metal, dx12, gl
//! gles_version = "automatic"  # automatic, "3.0", "3.1", "3.2"（仅 gl 生效）
//! render_mode = "continuous"  # continuous, on_demand
//! vsync = true
//!
//! [logging]
//! level = "info"      # trace, debug, info, warn, error
//! file_output = false
//!
//! [headless]
//! enabled = false
//! frames = 3
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::{ConfigError, Result};

/// 渲染器配置
///
/// 包含了运行所需的所有非场景配置项。
/// 可以从配置文件加载，也可以通过代码构建。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// 窗口配置
    #[serde(default)]
    pub window: WindowConfig,

    /// 图形配置
    #[serde(default)]
    pub graphics: GraphicsConfig,

    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,

    /// 无窗口模式配置
    #[serde(default)]
    pub headless: HeadlessConfig,
}

/// 窗口配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// 窗口宽度
    #[serde(default = "default_width")]
    pub width: u32,

    /// 窗口高度
    #[serde(default = "default_height")]
    pub height: u32,

    /// 窗口标题
    #[serde(default = "default_title")]
    pub title: String,

    /// 是否可调整大小
    #[serde(default = "default_resizable")]
    pub resizable: bool,
}

/// 图形配置
///
/// 上下文 API、GLES 版本与渲染模式共同构成一个配置面，
/// 连续渲染和按需重绘只是调度方式不同，渲染核心完全相同。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphicsConfig {
    /// 图形 API 选择
    #[serde(default = "default_api")]
    pub api: ContextApi,

    /// GLES 上下文版本（仅在 api = gl 时生效）
    #[serde(default = "default_gles_version")]
    pub gles_version: GlesVersion,

    /// 渲染模式
    #[serde(default = "default_render_mode")]
    pub render_mode: RenderMode,

    /// 垂直同步
    #[serde(default = "default_vsync")]
    pub vsync: bool,
}

/// 图形上下文 API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextApi {
    /// 由 wgpu 自动选择
    Auto,
    /// Vulkan
    Vulkan,
    /// Metal（仅 macOS）
    Metal,
    /// DirectX 12（仅 Windows）
    Dx12,
    /// OpenGL / OpenGL ES
    Gl,
}

/// GLES 上下文版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GlesVersion {
    #[serde(rename = "automatic")]
    Automatic,
    #[serde(rename = "3.0")]
    V3_0,
    #[serde(rename = "3.1")]
    V3_1,
    #[serde(rename = "3.2")]
    V3_2,
}

/// 帧调度模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// 激活期间每一帧都绘制
    Continuous,
    /// 仅在视口变化或显式请求时绘制
    OnDemand,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// 是否输出到文件
    #[serde(default = "default_file_output")]
    pub file_output: bool,

    /// 日志文件路径
    #[serde(default = "default_log_file")]
    pub log_file: String,
}

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// 无窗口模式配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadlessConfig {
    /// 是否以无窗口模式运行
    #[serde(default)]
    pub enabled: bool,

    /// 无窗口模式下绘制的帧数
    #[serde(default = "default_headless_frames")]
    pub frames: u32,
}

// 默认值函数
fn default_width() -> u32 { 800 }
fn default_height() -> u32 { 600 }
fn default_title() -> String { "SpinRender".to_string() }
fn default_resizable() -> bool { true }
fn default_api() -> ContextApi { ContextApi::Auto }
fn default_gles_version() -> GlesVersion { GlesVersion::Automatic }
fn default_render_mode() -> RenderMode { RenderMode::Continuous }
fn default_vsync() -> bool { true }
fn default_log_level() -> LogLevel { LogLevel::Info }
fn default_file_output() -> bool { false }
fn default_log_file() -> String { "spinrender.log".to_string() }
fn default_headless_frames() -> u32 { 3 }

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            title: default_title(),
            resizable: default_resizable(),
        }
    }
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            api: default_api(),
            gles_version: default_gles_version(),
            render_mode: default_render_mode(),
            vsync: default_vsync(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_output: default_file_output(),
            log_file: default_log_file(),
        }
    }
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            frames: default_headless_frames(),
        }
    }
}

impl Config {
    /// 从配置文件加载
    ///
    /// # 参数
    ///
    /// * `path` - 配置文件路径
    ///
    /// # 返回值
    ///
    /// 成功返回 `Config` 实例，失败返回错误
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let contents = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path_str.clone()))?;

        Self::from_toml_str(&contents)
    }

    /// 从 TOML 文本解析
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()).into())
    }

    /// 从配置文件加载，如果文件不存在则使用默认配置
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::from_file(path).unwrap_or_default()
    }

    /// 从命令行参数覆盖配置
    ///
    /// 支持的参数：
    /// - `--vulkan` / `--gl`: 指定图形 API
    /// - `--continuous` / `--on-demand`: 指定渲染模式
    /// - `--width <value>` / `--height <value>`: 设置窗口尺寸
    /// - `--headless`: 无窗口运行
    /// - `--frames <value>`: 无窗口模式的帧数
    pub fn apply_args<I>(&mut self, args: I)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|s| s.as_ref().to_string()).collect();

        if args.iter().any(|a| a == "--vulkan") {
            self.graphics.api = ContextApi::Vulkan;
        }
        if args.iter().any(|a| a == "--gl") {
            self.graphics.api = ContextApi::Gl;
        }

        if args.iter().any(|a| a == "--on-demand") {
            self.graphics.render_mode = RenderMode::OnDemand;
        }
        if args.iter().any(|a| a == "--continuous") {
            self.graphics.render_mode = RenderMode::Continuous;
        }

        if args.iter().any(|a| a == "--headless") {
            self.headless.enabled = true;
        }

        if let Some(width) = parse_flag_value(&args, "--width") {
            self.window.width = width;
        }
        if let Some(height) = parse_flag_value(&args, "--height") {
            self.window.height = height;
        }
        if let Some(frames) = parse_flag_value(&args, "--frames") {
            self.headless.frames = frames;
        }
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> Result<()> {
        // 验证窗口尺寸
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::InvalidValue {
                field: "window.width/height".to_string(),
                reason: "Window dimensions must be greater than 0".to_string(),
            }
            .into());
        }

        if self.graphics.gles_version != GlesVersion::Automatic
            && self.graphics.api != ContextApi::Gl
        {
            return Err(ConfigError::InvalidValue {
                field: "graphics.gles_version".to_string(),
                reason: "A GLES version can only be pinned when api = \"gl\"".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

fn parse_flag_value<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    let idx = args.iter().position(|a| a == flag)?;
    args.get(idx + 1)?.parse().ok()
}

impl ContextApi {
    /// 转换为 wgpu 的后端位集合
    pub fn backends(&self) -> wgpu::Backends {
        match self {
            ContextApi::Auto => wgpu::Backends::all(),
            ContextApi::Vulkan => wgpu::Backends::VULKAN,
            ContextApi::Metal => wgpu::Backends::METAL,
            ContextApi::Dx12 => wgpu::Backends::DX12,
            ContextApi::Gl => wgpu::Backends::GL,
        }
    }

    /// 获取 API 名称
    pub fn name(&self) -> &'static str {
        match self {
            ContextApi::Auto => "auto",
            ContextApi::Vulkan => "Vulkan",
            ContextApi::Metal => "Metal",
            ContextApi::Dx12 => "DirectX 12",
            ContextApi::Gl => "OpenGL",
        }
    }
}

impl GlesVersion {
    /// 转换为 wgpu 的 GLES 次版本号
    pub fn to_wgpu(self) -> wgpu::Gles3MinorVersion {
        match self {
            GlesVersion::Automatic => wgpu::Gles3MinorVersion::Automatic,
            GlesVersion::V3_0 => wgpu::Gles3MinorVersion::Version0,
            GlesVersion::V3_1 => wgpu::Gles3MinorVersion::Version1,
            GlesVersion::V3_2 => wgpu::Gles3MinorVersion::Version2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.graphics.api, ContextApi::Auto);
        assert_eq!(config.graphics.render_mode, RenderMode::Continuous);
        assert!(!config.headless.enabled);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.window.width = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_gles_version_requires_gl_api() {
        let mut config = Config::default();
        config.graphics.gles_version = GlesVersion::V3_0;
        assert!(config.validate().is_err());

        config.graphics.api = ContextApi::Gl;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = Config::from_toml_str(
            r#"
            [graphics]
            api = "gl"
            gles_version = "3.0"
            render_mode = "on_demand"
            "#,
        )
        .unwrap();

        assert_eq!(config.graphics.api, ContextApi::Gl);
        assert_eq!(config.graphics.gles_version, GlesVersion::V3_0);
        assert_eq!(config.graphics.render_mode, RenderMode::OnDemand);
        // 未出现的表使用默认值
        assert_eq!(config.window.height, 600);
    }

    #[test]
    fn test_apply_args() {
        let mut config = Config::default();
        config.apply_args(["spin_render", "--on-demand", "--width", "1024", "--headless", "--frames", "10"]);

        assert_eq!(config.graphics.render_mode, RenderMode::OnDemand);
        assert_eq!(config.window.width, 1024);
        assert!(config.headless.enabled);
        assert_eq!(config.headless.frames, 10);
    }

    #[test]
    fn test_apply_args_ignores_bad_numbers() {
        let mut config = Config::default();
        config.apply_args(["spin_render", "--height", "tall"]);
        assert_eq!(config.window.height, 600);
    }
}
