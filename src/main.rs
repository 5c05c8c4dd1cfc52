//! SpinRender - 旋转模型渲染器
//!
//! 读取配置的 OBJ 模型，在窗口中用固定相机绘制，并让模型绕 Y 轴持续旋转。
//!
//! # 使用方法
//!
//! ```bash
//! # 使用配置文件（config.toml / scene.toml）
//! cargo run
//!
//! # 指定模型和纹理
//! cargo run -- --model assets/cube.obj --texture assets/crate.png
//!
//! # 强制 OpenGL 后端、按需重绘
//! cargo run -- --gl --on-demand
//!
//! # 无窗口渲染 10 帧
//! cargo run -- --headless --frames 10
//! ```
//!
//! # 架构概览
//!
//! ```text
//! ┌─────────────┐
//! │   main.rs   │  winit 事件 → 生命周期回调
//! └──────┬──────┘
//!        │
//! ┌──────▼────────┐
//! │ FrameRenderer │  MVP 计算 + 绘制
//! └──────┬────────┘
//!        │ GpuContext
//!   ┌────┴─────┐
//!   │          │
//! ┌─▼───┐  ┌───▼──────┐
//! │wgpu │  │ headless │
//! └─────┘  └──────────┘
//! ```

use anyhow::{anyhow, Context, Result};
use tracing::{debug, error, info};
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};

use spin_render::core::{log, Config, SceneAssets, SceneConfig};
use spin_render::gfx::{HeadlessContext, WgpuContext};
use spin_render::renderer::{FrameRenderer, FrameScheduler, RendererState};

/// 应用程序入口点
///
/// # 初始化流程
///
/// 1. 加载渲染器配置文件（config.toml）并应用命令行参数
/// 2. 初始化日志系统
/// 3. 加载场景配置文件（scene.toml）并应用命令行参数
/// 4. 读取模型、纹理和着色器
/// 5. 无窗口模式直接渲染 N 帧，否则进入窗口事件循环
fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    // 1. 加载配置（在初始化日志之前）
    let mut config = Config::from_file_or_default("config.toml");
    config.apply_args(&args);
    config.validate().context("Invalid configuration")?;

    // 2. 初始化日志系统
    let log_file = config
        .logging
        .file_output
        .then_some(config.logging.log_file.as_str());
    log::init_logger(config.logging.level, config.logging.file_output, log_file);
    info!(version = env!("CARGO_PKG_VERSION"), "SpinRender starting");

    // 3. 加载场景配置
    let mut scene = SceneConfig::from_file_or_default("scene.toml");
    scene.apply_args(&args);
    scene.validate().context("Invalid scene configuration")?;

    info!(
        api = config.graphics.api.name(),
        render_mode = ?config.graphics.render_mode,
        width = config.window.width,
        height = config.window.height,
        "Graphics configuration"
    );
    info!(
        model = %scene.model.path,
        texture = ?scene.model.texture,
        eye = ?scene.camera.eye,
        "Scene configuration"
    );

    // 4. 读取资源
    let assets = SceneAssets::load(&scene)
        .with_context(|| format!("Failed to load assets for {}", scene.model.path))?;

    // 5. 运行
    if config.headless.enabled {
        run_headless(&config, &scene, &assets)
    } else {
        run_windowed(config, scene, assets)
    }
}

/// 无窗口运行：渲染固定帧数后输出摘要
fn run_headless(config: &Config, scene: &SceneConfig, assets: &SceneAssets) -> Result<()> {
    info!("Running headless for {} frames", config.headless.frames);

    let mut renderer = FrameRenderer::new(HeadlessContext::new(), scene);
    renderer
        .on_context_created(assets)
        .context("Failed to initialize renderer")?;
    renderer.on_viewport_resized(config.window.width, config.window.height);
    renderer.on_activate();

    for frame in 0..config.headless.frames {
        let outcome = renderer
            .on_frame()
            .with_context(|| format!("Frame {} failed", frame))?;
        debug!(frame, ?outcome, angle = renderer.angle(), "Frame finished");
    }

    renderer.on_deactivate();

    let context = renderer.context();
    info!(
        frames = context.frames_completed(),
        draws = context.draws().len(),
        vertices = renderer.vertex_count().unwrap_or(0),
        angle = renderer.angle(),
        "Headless run finished"
    );
    if let Some(mvp) = context.last_draw().and_then(|draw| draw.matrix(0)) {
        info!("Last MVP: {:?}", mvp.as_slice());
    }

    renderer.on_context_destroyed();
    Ok(())
}

/// 窗口运行：把 winit 事件映射为渲染器生命周期回调
///
/// - `Resumed`：首次时创建 GPU 资源，之后恢复调度
/// - `Suspended`：暂停调度
/// - `Resized`：更新视口
/// - `RedrawRequested`：调度器允许时绘制一帧
/// - `AboutToWait`：连续模式下请求下一帧
/// - `CloseRequested`：释放资源并退出
fn run_windowed(config: Config, scene: SceneConfig, assets: SceneAssets) -> Result<()> {
    let event_loop = EventLoop::new().map_err(|e| anyhow!("Failed to create event loop: {}", e))?;

    let context = WgpuContext::new(&event_loop, &config).context("Failed to initialize wgpu")?;
    let mut renderer = FrameRenderer::new(context, &scene);
    let mut scheduler = FrameScheduler::new(config.graphics.render_mode);

    info!("Entering main loop...");

    event_loop
        .run(move |event, elwt| match event {
            Event::Resumed => {
                if renderer.state() == RendererState::Uninitialized {
                    if let Err(e) = renderer.on_context_created(&assets) {
                        error!("Failed to initialize renderer: {}", e);
                        elwt.exit();
                        return;
                    }
                    let size = renderer.context().window().inner_size();
                    renderer.on_viewport_resized(size.width, size.height);
                }
                renderer.on_activate();
                scheduler.activate();
                renderer.context().window().request_redraw();
            }
            Event::Suspended => {
                renderer.on_deactivate();
                scheduler.deactivate();
            }
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => {
                    info!("Close requested, shutting down...");
                    renderer.on_context_destroyed();
                    elwt.exit();
                }
                WindowEvent::Resized(size) => {
                    renderer.on_viewport_resized(size.width, size.height);
                    scheduler.request_redraw();
                    renderer.context().window().request_redraw();
                }
                WindowEvent::RedrawRequested => {
                    // 系统发起的重绘同样视为一次请求
                    scheduler.request_redraw();
                    if scheduler.should_draw() {
                        if let Err(e) = renderer.on_frame() {
                            error!("Frame failed: {}", e);
                            elwt.exit();
                        }
                    }
                }
                _ => (),
            },
            Event::AboutToWait => {
                if scheduler.wants_continuous_redraw() {
                    elwt.set_control_flow(ControlFlow::Poll);
                    renderer.context().window().request_redraw();
                } else {
                    elwt.set_control_flow(ControlFlow::Wait);
                }
            }
            _ => (),
        })
        .map_err(|e| anyhow!("Event loop error: {}", e))
}
