//! 帧渲染器
//!
//! 由宿主的生命周期回调驱动：
//!
//! ```text
//! Uninitialized ──on_context_created──▶ Ready ──on_frame──▶ Rendering ─┐
//!       ▲                                                     ▲         │
//!       └──────────────on_context_destroyed───────────────────┴─on_frame┘
//! ```
//!
//! 初始化一次性完成模型解析、缓冲区上传、着色器编译链接和纹理上传；
//! 任何一步失败都会释放已创建的资源并停留在 `Uninitialized`。

use std::mem;

use tracing::{debug, info, warn};

use crate::component::{FixedCamera, Spin};
use crate::core::assets::SceneAssets;
use crate::core::error::{GraphicsError, Result};
use crate::core::math::Matrix4;
use crate::core::scene::SceneConfig;
use crate::geometry::loaders::ObjLoader;
use crate::gfx::context::{GpuContext, TextureHandle};
use crate::renderer::buffers::{AttributeLocations, GpuBufferSet};
use crate::renderer::shader::ShaderProgram;

/// MVP 矩阵 uniform 名
pub const MVP_UNIFORM: &str = "u_mvp";
/// 模型矩阵 uniform 名（可选，用于旋转法线）
pub const MODEL_UNIFORM: &str = "u_model";
/// 顶点属性名
pub const POSITION_ATTRIBUTE: &str = "a_position";
pub const NORMAL_ATTRIBUTE: &str = "a_normal";
pub const TEXCOORD_ATTRIBUTE: &str = "a_texcoord";
/// 漫反射纹理名
pub const DIFFUSE_TEXTURE: &str = "t_diffuse";

/// 渲染器对外可见的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererState {
    Uninitialized,
    Ready,
    Rendering,
}

/// 一帧的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Drawn,
    /// 视口为零或表面暂不可用，角度不前进
    Skipped,
}

/// 初始化后持有的 GPU 资源
#[derive(Debug)]
struct SceneResources {
    buffers: GpuBufferSet,
    program: ShaderProgram,
    texture: Option<TextureHandle>,
    locations: AttributeLocations,
    mvp_location: u32,
    model_location: Option<u32>,
    texture_location: Option<u32>,
}

impl SceneResources {
    fn release<C: GpuContext + ?Sized>(self, context: &mut C) {
        self.buffers.release(context);
        self.program.release(context);
        if let Some(texture) = self.texture {
            context.destroy_texture(texture);
        }
    }
}

#[derive(Debug, Default)]
enum Phase {
    #[default]
    Uninitialized,
    Ready(SceneResources),
    Rendering(SceneResources),
}

/// 帧渲染器
pub struct FrameRenderer<C: GpuContext> {
    context: C,
    camera: FixedCamera,
    spin: Spin,
    clear_color: [f32; 4],
    viewport: (u32, u32),
    phase: Phase,
}

impl<C: GpuContext> FrameRenderer<C> {
    /// 用场景配置创建渲染器，此时还没有任何 GPU 资源
    pub fn new(context: C, scene: &SceneConfig) -> Self {
        Self {
            context,
            camera: FixedCamera::from_config(&scene.camera),
            spin: Spin::new(scene.animation.degrees_per_frame),
            clear_color: scene.clear_color,
            viewport: (0, 0),
            phase: Phase::Uninitialized,
        }
    }

    pub fn state(&self) -> RendererState {
        match self.phase {
            Phase::Uninitialized => RendererState::Uninitialized,
            Phase::Ready(_) => RendererState::Ready,
            Phase::Rendering(_) => RendererState::Rendering,
        }
    }

    /// 当前旋转角度（度）
    pub fn angle(&self) -> f32 {
        self.spin.angle()
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    pub fn camera(&self) -> &FixedCamera {
        &self.camera
    }

    /// 上传后保留的绘制顶点数
    pub fn vertex_count(&self) -> Option<u32> {
        match &self.phase {
            Phase::Ready(res) | Phase::Rendering(res) => Some(res.buffers.vertex_count()),
            Phase::Uninitialized => None,
        }
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    /// 上下文创建完成：加载模型并创建所有 GPU 资源
    ///
    /// 已经初始化过时先释放旧资源。
    pub fn on_context_created(&mut self, assets: &SceneAssets) -> Result<()> {
        self.release_resources();

        info!("Initializing renderer on {} context", self.context.backend_name());

        let resources = Self::create_resources(&mut self.context, assets)?;
        info!(
            "Renderer ready: {} vertices, texture: {}",
            resources.buffers.vertex_count(),
            resources.texture.is_some()
        );
        self.phase = Phase::Ready(resources);
        Ok(())
    }

    fn create_resources(context: &mut C, assets: &SceneAssets) -> Result<SceneResources> {
        // 解析与展开在创建任何 GPU 对象之前完成
        let geometry = ObjLoader::load_from_reader(assets.model_source.as_slice())?;

        let buffers = GpuBufferSet::upload(context, &geometry)?;
        drop(geometry);

        let program = match ShaderProgram::build(context, &assets.vertex_shader, &assets.fragment_shader) {
            Ok(program) => program,
            Err(e) => {
                buffers.release(context);
                return Err(e);
            }
        };

        let (locations, mvp_location, texture_location) = match Self::resolve_interface(&program) {
            Ok(resolved) => resolved,
            Err(e) => {
                buffers.release(context);
                program.release(context);
                return Err(e);
            }
        };

        let texture = match (&assets.texture, texture_location) {
            (Some(image), Some(_)) => {
                match context.create_texture("diffuse", image.width(), image.height(), image.as_raw()) {
                    Ok(handle) => Some(handle),
                    Err(e) => {
                        buffers.release(context);
                        program.release(context);
                        return Err(e);
                    }
                }
            }
            (Some(_), None) => {
                warn!("Texture configured but the shader declares no `{}`", DIFFUSE_TEXTURE);
                None
            }
            (None, _) => None,
        };

        let model_location = program.uniform_location(MODEL_UNIFORM);

        Ok(SceneResources {
            buffers,
            program,
            texture,
            locations,
            mvp_location,
            model_location,
            texture_location,
        })
    }

    /// 查询渲染所需的属性和 uniform 位置
    fn resolve_interface(program: &ShaderProgram) -> Result<(AttributeLocations, u32, Option<u32>)> {
        let attribute = |name: &str| {
            program.attribute_location(name).ok_or_else(|| {
                GraphicsError::LinkFailure(format!("shader program has no attribute `{}`", name))
            })
        };

        let locations = AttributeLocations {
            position: attribute(POSITION_ATTRIBUTE)?,
            normal: attribute(NORMAL_ATTRIBUTE)?,
            texcoord: attribute(TEXCOORD_ATTRIBUTE)?,
        };

        let mvp_location = program.uniform_location(MVP_UNIFORM).ok_or_else(|| {
            GraphicsError::LinkFailure(format!("shader program has no uniform `{}`", MVP_UNIFORM))
        })?;

        Ok((locations, mvp_location, program.texture_location(DIFFUSE_TEXTURE)))
    }

    /// 视口尺寸变化
    pub fn on_viewport_resized(&mut self, width: u32, height: u32) {
        debug!("Viewport resized to {}x{}", width, height);
        self.viewport = (width, height);
        self.context.set_viewport(width, height);
    }

    /// 绘制一帧
    ///
    /// 未初始化时返回 `NotReady`，不会触及 GPU。
    pub fn on_frame(&mut self) -> Result<FrameOutcome> {
        let (resources, was_rendering) = match mem::take(&mut self.phase) {
            Phase::Ready(res) => (res, false),
            Phase::Rendering(res) => (res, true),
            Phase::Uninitialized => return Err(GraphicsError::NotReady.into()),
        };

        let result = self.draw(&resources);
        let drawn = matches!(result, Ok(FrameOutcome::Drawn));
        if drawn {
            self.spin.advance();
        }

        self.phase = if drawn || was_rendering {
            Phase::Rendering(resources)
        } else {
            Phase::Ready(resources)
        };

        result
    }

    /// 当前角度下的模型、视图、投影矩阵合成的 MVP
    pub fn mvp_matrix(&self) -> Option<Matrix4> {
        let (width, height) = self.viewport;
        if width == 0 || height == 0 {
            return None;
        }
        let projection = self.camera.projection_for_viewport(width, height);
        Some(projection * self.camera.view_matrix() * self.spin.model_matrix())
    }

    fn draw(&mut self, resources: &SceneResources) -> Result<FrameOutcome> {
        let Some(mvp) = self.mvp_matrix() else {
            return Ok(FrameOutcome::Skipped);
        };

        if !self.context.begin_frame(self.clear_color)? {
            return Ok(FrameOutcome::Skipped);
        }

        let drawn = self.draw_model(resources, &mvp);
        let ended = self.context.end_frame();
        drawn?;
        ended?;

        Ok(FrameOutcome::Drawn)
    }

    fn draw_model(&mut self, resources: &SceneResources, mvp: &Matrix4) -> Result<()> {
        let vertex_count = resources.buffers.vertex_count();
        if vertex_count == 0 {
            return Ok(());
        }
        let model = self.spin.model_matrix();

        self.context.use_program(resources.program.handle())?;
        let mut bound = resources.buffers.bind(&mut self.context, resources.locations)?;
        let context = bound.context();

        if let (Some(texture), Some(location)) = (resources.texture, resources.texture_location) {
            context.bind_texture(location, texture)?;
        }
        context.set_matrix_uniform(resources.mvp_location, mvp)?;
        if let Some(location) = resources.model_location {
            context.set_matrix_uniform(location, &model)?;
        }
        context.draw_triangles(0, vertex_count)
    }

    /// 上下文即将销毁：释放所有 GPU 资源
    pub fn on_context_destroyed(&mut self) {
        self.release_resources();
        info!("Renderer resources released");
    }

    fn release_resources(&mut self) {
        match mem::take(&mut self.phase) {
            Phase::Ready(res) | Phase::Rendering(res) => res.release(&mut self.context),
            Phase::Uninitialized => {}
        }
    }

    /// 宿主恢复调度帧
    pub fn on_activate(&mut self) {
        debug!("Renderer activated");
    }

    /// 宿主暂停调度帧
    pub fn on_deactivate(&mut self) {
        debug!("Renderer deactivated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{ModelLoadError, SpinRenderError};
    use crate::core::math::{constants::EPSILON, utils::matrix_approx_eq};
    use crate::core::math::matrix;
    use crate::geometry::loaders::MeshLoader;
    use crate::gfx::headless::HeadlessContext;

    const CUBE: &str = include_str!("../../assets/cube.obj");
    const TRIANGLE: &str = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nvt 0 0\nvt 1 0\nvt 0 1\nf 1/1/1 2/2/1 3/3/1\n";

    fn renderer() -> FrameRenderer<HeadlessContext> {
        FrameRenderer::new(HeadlessContext::new(), &SceneConfig::default())
    }

    fn ready_renderer(model: &str) -> FrameRenderer<HeadlessContext> {
        let mut renderer = renderer();
        renderer
            .on_context_created(&SceneAssets::from_model_source(model))
            .unwrap();
        renderer.on_viewport_resized(800, 600);
        renderer
    }

    #[test]
    fn test_frame_before_init_is_not_ready() {
        let mut renderer = renderer();
        renderer.on_viewport_resized(800, 600);

        assert!(matches!(
            renderer.on_frame(),
            Err(SpinRenderError::Graphics(GraphicsError::NotReady))
        ));
        assert_eq!(renderer.state(), RendererState::Uninitialized);
        assert_eq!(renderer.context().frames_completed(), 0);
        assert_eq!(renderer.angle(), 0.0);
    }

    #[test]
    fn test_unit_cube_end_to_end() {
        let geometry = ObjLoader::load_from_memory(CUBE.as_bytes()).unwrap();
        assert_eq!(geometry.triangle_count(), 12);
        assert_eq!(geometry.positions().len(), 108);
        assert_eq!(geometry.normals().len(), 108);
        assert_eq!(geometry.texcoords().len(), 72);

        let mut renderer = ready_renderer(CUBE);
        assert_eq!(renderer.state(), RendererState::Ready);
        assert_eq!(renderer.vertex_count(), Some(36));
        assert_eq!(renderer.context().live_buffer_count(), 3);

        assert_eq!(renderer.on_frame().unwrap(), FrameOutcome::Drawn);
        assert_eq!(renderer.state(), RendererState::Rendering);

        let draw = renderer.context().last_draw().unwrap();
        assert_eq!(draw.first, 0);
        assert_eq!(draw.count, 36);
    }

    #[test]
    fn test_model_matrix_follows_spin() {
        let mut renderer = ready_renderer(TRIANGLE);
        for _ in 0..3 {
            renderer.on_frame().unwrap();
        }

        let draws = renderer.context().draws();
        let model = draws[2].matrix(3).unwrap();
        assert!(matrix_approx_eq(model, &matrix::rotation_y_degrees(2.0), EPSILON));
        assert!(!matrix_approx_eq(draws[1].matrix(3).unwrap(), model, EPSILON));
    }

    #[test]
    fn test_first_frame_mvp_is_projection_times_view() {
        let mut renderer = ready_renderer(TRIANGLE);
        renderer.on_frame().unwrap();

        let camera = renderer.camera().clone();
        let expected = camera.projection_for_viewport(800, 600) * camera.view_matrix();
        let draw = renderer.context().last_draw().unwrap();
        let mvp = draw.matrix(0).unwrap();

        assert!(matrix_approx_eq(mvp, &expected, EPSILON));
    }

    #[test]
    fn test_angle_advances_once_per_drawn_frame() {
        let mut renderer = ready_renderer(TRIANGLE);
        for _ in 0..5 {
            renderer.on_frame().unwrap();
        }
        assert_eq!(renderer.angle(), 5.0);
        assert_eq!(renderer.context().frames_completed(), 5);

        // 第二帧使用 1 度时的模型矩阵
        let draws = renderer.context().draws();
        assert!(!matrix_approx_eq(
            draws[1].matrix(0).unwrap(),
            draws[0].matrix(0).unwrap(),
            EPSILON
        ));
    }

    #[test]
    fn test_zero_viewport_skips_frames() {
        let mut renderer = ready_renderer(TRIANGLE);
        renderer.on_viewport_resized(0, 600);

        assert_eq!(renderer.on_frame().unwrap(), FrameOutcome::Skipped);
        assert_eq!(renderer.angle(), 0.0);
        assert_eq!(renderer.state(), RendererState::Ready);
        assert!(renderer.context().draws().is_empty());

        renderer.on_viewport_resized(400, 400);
        assert_eq!(renderer.on_frame().unwrap(), FrameOutcome::Drawn);
    }

    #[test]
    fn test_aspect_comes_from_viewport() {
        let mut renderer = ready_renderer(TRIANGLE);
        renderer.on_viewport_resized(1200, 300);
        renderer.on_frame().unwrap();

        let mvp = *renderer.context().last_draw().unwrap().matrix(0).unwrap();
        let camera = renderer.camera().clone();
        let expected = camera.projection_for_viewport(1200, 300) * camera.view_matrix();
        assert!(matrix_approx_eq(&mvp, &expected, EPSILON));
        assert_eq!(renderer.context().last_draw().unwrap().viewport, (1200, 300));
    }

    #[test]
    fn test_malformed_model_leaves_renderer_uninitialized() {
        let mut renderer = renderer();
        let result = renderer.on_context_created(&SceneAssets::from_model_source("v 1 2\n"));

        assert!(matches!(
            result,
            Err(SpinRenderError::ModelLoad(ModelLoadError::MalformedRecord { line: 1, .. }))
        ));
        assert_eq!(renderer.state(), RendererState::Uninitialized);
        assert_eq!(renderer.context().live_buffer_count(), 0);
    }

    #[test]
    fn test_shader_failure_releases_buffers() {
        let mut renderer = renderer();
        let assets = SceneAssets::from_model_source(TRIANGLE)
            .with_shaders(crate::core::assets::DEFAULT_VERTEX_SHADER, "not wgsl");

        let result = renderer.on_context_created(&assets);
        assert!(matches!(
            result,
            Err(SpinRenderError::Graphics(GraphicsError::InvalidShader { .. }))
        ));
        assert_eq!(renderer.state(), RendererState::Uninitialized);
        assert_eq!(renderer.context().live_buffer_count(), 0);
        assert_eq!(renderer.context().live_program_count(), 0);
    }

    #[test]
    fn test_texture_is_bound_when_configured() {
        let mut renderer = renderer();
        let texture = image::RgbaImage::from_pixel(2, 2, image::Rgba([255, 0, 0, 255]));
        let assets = SceneAssets::from_model_source(TRIANGLE).with_texture(texture);
        renderer.on_context_created(&assets).unwrap();
        renderer.on_viewport_resized(64, 64);
        renderer.on_frame().unwrap();

        assert_eq!(renderer.context().live_texture_count(), 1);
        let draw = renderer.context().last_draw().unwrap();
        assert_eq!(draw.textures.len(), 1);
        assert!(draw.textures.contains_key(&1));
    }

    #[test]
    fn test_context_destroyed_releases_everything() {
        let mut renderer = ready_renderer(CUBE);
        renderer.on_frame().unwrap();
        renderer.on_context_destroyed();

        assert_eq!(renderer.state(), RendererState::Uninitialized);
        assert_eq!(renderer.context().live_buffer_count(), 0);
        assert_eq!(renderer.context().live_program_count(), 0);
        assert!(renderer.on_frame().is_err());
    }

    #[test]
    fn test_activation_does_not_change_state() {
        let mut renderer = ready_renderer(TRIANGLE);
        renderer.on_deactivate();
        assert_eq!(renderer.state(), RendererState::Ready);
        renderer.on_activate();
        assert_eq!(renderer.state(), RendererState::Ready);
        assert_eq!(renderer.angle(), 0.0);
    }

    #[test]
    fn test_empty_model_draws_nothing() {
        let mut renderer = ready_renderer("# nothing here\n");
        assert_eq!(renderer.on_frame().unwrap(), FrameOutcome::Drawn);
        assert!(renderer.context().draws().is_empty());
        assert_eq!(renderer.context().frames_completed(), 1);
    }
}
