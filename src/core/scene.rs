//! 场景配置模块
//!
//! 定义单一模型场景的配置：模型与纹理来源、着色器覆盖、固定相机和旋转动画。
//!
//! # 配置文件格式 (scene.toml)
//!
//! ```toml
//! clear_color = [0.0, 0.0, 0.0, 1.0]
//!
//! [model]
//! path = "assets/cube.obj"
//! texture = "assets/crate.png"   # 可选
//!
//! [shaders]
//! vertex = "shaders/custom.vert.wgsl"   # 可选，缺省使用内置着色器
//!
//! [camera]
//! eye = [0.0, 0.0, 1.5]
//! target = [0.0, 0.0, 0.0]
//! up = [0.0, 1.0, 0.0]
//! near = 1.0
//! far = 10.0
//!
//! [animation]
//! degrees_per_frame = 1.0
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::error::{ConfigError, Result};
use crate::core::math::Vector3;

/// 场景配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneConfig {
    /// 清屏颜色 (RGBA)
    #[serde(default = "default_clear_color")]
    pub clear_color: [f32; 4],

    /// 模型配置
    #[serde(default)]
    pub model: ModelConfig,

    /// 着色器覆盖
    #[serde(default)]
    pub shaders: ShaderConfig,

    /// 相机配置
    #[serde(default)]
    pub camera: CameraConfig,

    /// 动画配置
    #[serde(default)]
    pub animation: AnimationConfig,
}

/// 模型配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// OBJ 文件路径
    #[serde(default = "default_model_path")]
    pub path: String,

    /// 漫反射纹理路径（可选）
    #[serde(default)]
    pub texture: Option<String>,
}

/// 着色器源文件覆盖（WGSL）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShaderConfig {
    #[serde(default)]
    pub vertex: Option<String>,

    #[serde(default)]
    pub fragment: Option<String>,
}

/// 固定相机配置
///
/// 相机参数是渲染器常量，不从模型数据推导。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// 相机位置
    #[serde(default = "default_eye")]
    pub eye: [f32; 3],

    /// 观察目标
    #[serde(default = "default_target")]
    pub target: [f32; 3],

    /// 上方向
    #[serde(default = "default_up")]
    pub up: [f32; 3],

    /// 近裁剪面距离
    #[serde(default = "default_near")]
    pub near: f32,

    /// 远裁剪面距离
    #[serde(default = "default_far")]
    pub far: f32,
}

/// 动画配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationConfig {
    /// 每帧绕 Y 轴旋转的角度（度）
    #[serde(default = "default_degrees_per_frame")]
    pub degrees_per_frame: f32,
}

fn default_clear_color() -> [f32; 4] { [0.0, 0.0, 0.0, 1.0] }
fn default_model_path() -> String { "assets/cube.obj".to_string() }
fn default_eye() -> [f32; 3] { [0.0, 0.0, 1.5] }
fn default_target() -> [f32; 3] { [0.0, 0.0, 0.0] }
fn default_up() -> [f32; 3] { [0.0, 1.0, 0.0] }
fn default_near() -> f32 { 1.0 }
fn default_far() -> f32 { 10.0 }
fn default_degrees_per_frame() -> f32 { 1.0 }

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            clear_color: default_clear_color(),
            model: ModelConfig::default(),
            shaders: ShaderConfig::default(),
            camera: CameraConfig::default(),
            animation: AnimationConfig::default(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
            texture: None,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            eye: default_eye(),
            target: default_target(),
            up: default_up(),
            near: default_near(),
            far: default_far(),
        }
    }
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            degrees_per_frame: default_degrees_per_frame(),
        }
    }
}

impl CameraConfig {
    pub fn eye(&self) -> Vector3 {
        Vector3::from(self.eye)
    }

    pub fn target(&self) -> Vector3 {
        Vector3::from(self.target)
    }

    pub fn up(&self) -> Vector3 {
        Vector3::from(self.up)
    }
}

impl SceneConfig {
    /// 从场景文件加载
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let contents = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path_str))?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()).into())
    }

    /// 从场景文件加载，如果文件不存在则使用默认场景
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::from_file(&path) {
            Ok(scene) => scene,
            Err(e) => {
                tracing::warn!("Using default scene ({})", e);
                Self::default()
            }
        }
    }

    /// 从命令行参数覆盖场景配置
    ///
    /// - `--model <path>`: 指定模型文件
    /// - `--texture <path>`: 指定纹理文件
    pub fn apply_args<I>(&mut self, args: I)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|s| s.as_ref().to_string()).collect();

        if let Some(idx) = args.iter().position(|a| a == "--model") {
            if let Some(path) = args.get(idx + 1) {
                self.model.path = path.clone();
            }
        }

        if let Some(idx) = args.iter().position(|a| a == "--texture") {
            if let Some(path) = args.get(idx + 1) {
                self.model.texture = Some(path.clone());
            }
        }
    }

    /// 验证场景配置
    pub fn validate(&self) -> Result<()> {
        let camera = &self.camera;

        if !(camera.near > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "camera.near".to_string(),
                reason: "Near plane must be positive".to_string(),
            }
            .into());
        }

        if !(camera.far > camera.near) {
            return Err(ConfigError::InvalidValue {
                field: "camera.far".to_string(),
                reason: "Far plane must lie beyond the near plane".to_string(),
            }
            .into());
        }

        if (camera.eye() - camera.target()).norm() < f32::EPSILON {
            return Err(ConfigError::InvalidValue {
                field: "camera.eye".to_string(),
                reason: "Camera eye and target must differ".to_string(),
            }
            .into());
        }

        // up 为零或与视线平行时 look-at 退化为 NaN
        let forward = camera.target() - camera.eye();
        if camera.up().cross(&forward).norm() < f32::EPSILON {
            return Err(ConfigError::InvalidValue {
                field: "camera.up".to_string(),
                reason: "Up vector must be non-zero and not parallel to the view direction".to_string(),
            }
            .into());
        }

        if !self.animation.degrees_per_frame.is_finite() {
            return Err(ConfigError::InvalidValue {
                field: "animation.degrees_per_frame".to_string(),
                reason: "Rotation step must be finite".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scene_camera() {
        let scene = SceneConfig::default();
        assert_eq!(scene.camera.eye, [0.0, 0.0, 1.5]);
        assert_eq!(scene.camera.near, 1.0);
        assert_eq!(scene.camera.far, 10.0);
        assert_eq!(scene.animation.degrees_per_frame, 1.0);
        assert!(scene.validate().is_ok());
    }

    #[test]
    fn test_parse_scene_toml() {
        let scene: SceneConfig = toml::from_str(
            r#"
            [model]
            path = "models/teapot.obj"
            texture = "models/teapot.png"

            [animation]
            degrees_per_frame = 0.5
            "#,
        )
        .unwrap();

        assert_eq!(scene.model.path, "models/teapot.obj");
        assert_eq!(scene.model.texture.as_deref(), Some("models/teapot.png"));
        assert_eq!(scene.animation.degrees_per_frame, 0.5);
        assert_eq!(scene.camera.up, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_invalid_clip_planes() {
        let mut scene = SceneConfig::default();
        scene.camera.far = 0.5;
        assert!(scene.validate().is_err());

        scene.camera.far = 10.0;
        scene.camera.near = 0.0;
        assert!(scene.validate().is_err());
    }

    #[test]
    fn test_degenerate_up_vector_is_rejected() {
        use crate::core::error::SpinRenderError;

        let mut scene = SceneConfig::default();
        // 默认视线沿 -Z，up 取 +Z 与之平行
        scene.camera.up = [0.0, 0.0, 1.0];
        assert!(matches!(
            scene.validate(),
            Err(SpinRenderError::Config(ConfigError::InvalidValue { ref field, .. })) if field == "camera.up"
        ));

        scene.camera.up = [0.0, 0.0, 0.0];
        assert!(scene.validate().is_err());

        scene.camera.up = [1.0, 1.0, 0.0];
        assert!(scene.validate().is_ok());
    }

    #[test]
    fn test_model_override_from_args() {
        let mut scene = SceneConfig::default();
        scene.apply_args(["spin_render", "--model", "other.obj"]);
        assert_eq!(scene.model.path, "other.obj");
        assert!(scene.model.texture.is_none());
    }
}
