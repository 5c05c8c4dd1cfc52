//! 场景资源
//!
//! 在上下文创建前把模型字节、纹理图像和着色器源码一次性读入内存，
//! 渲染器初始化时从这里取用，每帧路径上不再做任何 IO。

use std::path::Path;

use image::RgbaImage;
use tracing::{debug, info};

use crate::core::error::{ModelLoadError, Result, SpinRenderError};
use crate::core::scene::SceneConfig;

/// 内置顶点着色器
pub const DEFAULT_VERTEX_SHADER: &str = include_str!("../renderer/shaders/mesh.vert.wgsl");

/// 内置片元着色器
pub const DEFAULT_FRAGMENT_SHADER: &str = include_str!("../renderer/shaders/mesh.frag.wgsl");

/// 渲染器初始化所需的全部输入
#[derive(Debug, Clone)]
pub struct SceneAssets {
    /// OBJ 文本字节
    pub model_source: Vec<u8>,
    /// 漫反射纹理，已按纹理坐标原点在左下角翻转
    pub texture: Option<RgbaImage>,
    pub vertex_shader: String,
    pub fragment_shader: String,
}

impl SceneAssets {
    /// 从内存中的模型文本构造，使用内置着色器、不带纹理
    pub fn from_model_source(model_source: impl Into<Vec<u8>>) -> Self {
        Self {
            model_source: model_source.into(),
            texture: None,
            vertex_shader: DEFAULT_VERTEX_SHADER.to_string(),
            fragment_shader: DEFAULT_FRAGMENT_SHADER.to_string(),
        }
    }

    pub fn with_texture(mut self, texture: RgbaImage) -> Self {
        self.texture = Some(texture);
        self
    }

    pub fn with_shaders(mut self, vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        self.vertex_shader = vertex.into();
        self.fragment_shader = fragment.into();
        self
    }

    /// 按场景配置读取所有文件
    pub fn load(scene: &SceneConfig) -> Result<Self> {
        let model_path = Path::new(&scene.model.path);
        if !model_path.exists() {
            return Err(ModelLoadError::FileNotFound(model_path.to_path_buf()).into());
        }
        let model_source = std::fs::read(model_path).map_err(ModelLoadError::Io)?;
        info!("Read model `{}` ({} bytes)", scene.model.path, model_source.len());

        let texture = match &scene.model.texture {
            Some(path) => Some(load_texture(Path::new(path))?),
            None => None,
        };

        let vertex_shader = match &scene.shaders.vertex {
            Some(path) => read_shader(path)?,
            None => DEFAULT_VERTEX_SHADER.to_string(),
        };
        let fragment_shader = match &scene.shaders.fragment {
            Some(path) => read_shader(path)?,
            None => DEFAULT_FRAGMENT_SHADER.to_string(),
        };

        Ok(Self {
            model_source,
            texture,
            vertex_shader,
            fragment_shader,
        })
    }
}

/// 读取纹理并转为 RGBA8
///
/// 图像文件的第一行在顶部，纹理坐标 v=0 在底部，所以上下翻转。
pub fn load_texture(path: &Path) -> Result<RgbaImage> {
    let image = image::open(path).map_err(|e| {
        SpinRenderError::Initialization(format!("Failed to load texture {}: {}", path.display(), e))
    })?;
    let rgba = image::imageops::flip_vertical(&image.to_rgba8());
    debug!("Loaded texture {} ({}x{})", path.display(), rgba.width(), rgba.height());
    Ok(rgba)
}

fn read_shader(path: &str) -> Result<String> {
    let source = std::fs::read_to_string(path)?;
    debug!("Read shader override `{}`", path);
    Ok(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_assets_use_builtin_shaders() {
        let assets = SceneAssets::from_model_source("v 0 0 0\n");
        assert_eq!(assets.vertex_shader, DEFAULT_VERTEX_SHADER);
        assert_eq!(assets.fragment_shader, DEFAULT_FRAGMENT_SHADER);
        assert!(assets.texture.is_none());
        assert_eq!(assets.model_source, b"v 0 0 0\n");
    }

    #[test]
    fn test_missing_model_file() {
        let mut scene = SceneConfig::default();
        scene.model.path = "does/not/exist.obj".to_string();
        assert!(matches!(
            SceneAssets::load(&scene),
            Err(SpinRenderError::ModelLoad(ModelLoadError::FileNotFound(_)))
        ));
    }

    #[test]
    fn test_builtin_assets_load() {
        let mut scene = SceneConfig::default();
        scene.model.path = concat!(env!("CARGO_MANIFEST_DIR"), "/assets/cube.obj").to_string();
        let assets = SceneAssets::load(&scene).unwrap();
        assert!(!assets.model_source.is_empty());
    }

    #[test]
    fn test_missing_texture_is_an_error() {
        assert!(load_texture(Path::new("does/not/exist.png")).is_err());
    }
}
