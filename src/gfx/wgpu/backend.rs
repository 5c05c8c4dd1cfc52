//! wgpu 后端设备管理
//!
//! 本模块负责 wgpu 图形设备的初始化和管理，包括：
//! - 按配置的上下文 API 和 GLES 版本创建 wgpu 实例
//! - 创建窗口与窗口表面
//! - 选择适配器、创建逻辑设备和命令队列
//! - 配置交换链并在视口变化时重建

use std::sync::Arc;
use tracing::{debug, error, info};
use winit::event_loop::EventLoop;
use winit::window::{Window, WindowBuilder};

use crate::core::config::Config;
use crate::core::error::{GraphicsError, Result};

/// wgpu 图形后端
///
/// 持有窗口、表面和设备，不包含任何渲染逻辑。
pub struct WgpuBackend {
    /// wgpu 实例（入口点）
    pub instance: wgpu::Instance,
    /// 窗口表面
    pub surface: wgpu::Surface<'static>,
    /// 图形适配器（GPU）
    pub adapter: wgpu::Adapter,
    /// 逻辑设备
    pub device: wgpu::Device,
    /// 命令队列
    pub queue: wgpu::Queue,
    /// 表面配置
    pub surface_config: wgpu::SurfaceConfiguration,
    /// 窗口引用
    window: Arc<Window>,
}

impl WgpuBackend {
    /// 创建窗口并初始化 wgpu 设备
    pub fn new(event_loop: &EventLoop<()>, config: &Config) -> Result<Self> {
        let graphics = &config.graphics;
        info!("Initializing wgpu backend (api: {})", graphics.api.name());

        // 1. 创建 wgpu 实例
        debug!("Creating wgpu instance");
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: graphics.api.backends(),
            dx12_shader_compiler: Default::default(),
            flags: wgpu::InstanceFlags::default(),
            gles_minor_version: graphics.gles_version.to_wgpu(),
        });

        // 2. 创建窗口
        debug!("Creating window");
        let title = format!("{} [{}]", config.window.title, graphics.api.name());
        let window = WindowBuilder::new()
            .with_title(title)
            .with_inner_size(winit::dpi::LogicalSize::new(
                config.window.width,
                config.window.height,
            ))
            .with_resizable(config.window.resizable)
            .build(event_loop)
            .map_err(|e| GraphicsError::DeviceCreation(format!("Failed to create window: {}", e)))?;

        let window = Arc::new(window);

        // 3. 创建表面
        debug!("Creating surface");
        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| GraphicsError::Surface(format!("Failed to create surface: {}", e)))?;

        // 4. 请求适配器
        debug!("Requesting adapter");
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| GraphicsError::DeviceCreation("Failed to find suitable adapter".to_string()))?;

        info!("Selected adapter: {:?}", adapter.get_info());

        // 5. 请求设备和队列，GL 后端只保证 downlevel 限制
        debug!("Requesting device and queue");
        let required_limits = if adapter.get_info().backend == wgpu::Backend::Gl {
            wgpu::Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits())
        } else {
            wgpu::Limits::default()
        };
        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Main Device"),
                required_features: wgpu::Features::empty(),
                required_limits,
            },
            None,
        ))
        .map_err(|e| GraphicsError::DeviceCreation(format!("Failed to create device: {}", e)))?;

        // 错误作用域之外的设备错误只记录日志
        device.on_uncaptured_error(Box::new(|e: wgpu::Error| {
            error!("Uncaptured wgpu error: {}", e);
        }));

        // 6. 配置表面
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| GraphicsError::Surface("Surface reports no supported formats".to_string()))?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        debug!("Surface format: {:?}", surface_format);

        let present_mode = if graphics.vsync {
            wgpu::PresentMode::AutoVsync
        } else {
            wgpu::PresentMode::AutoNoVsync
        };

        let size = window.inner_size();
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        surface.configure(&device, &surface_config);

        info!("wgpu backend initialized successfully");

        Ok(Self {
            instance,
            surface,
            adapter,
            device,
            queue,
            surface_config,
            window,
        })
    }

    /// 获取窗口引用
    pub fn window(&self) -> &Window {
        &self.window
    }

    /// 当前表面尺寸
    pub fn surface_size(&self) -> (u32, u32) {
        (self.surface_config.width, self.surface_config.height)
    }

    /// 重新配置表面（用于窗口调整），零尺寸时保持原配置
    pub fn reconfigure_surface(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface.configure(&self.device, &self.surface_config);
    }

    /// 按当前配置重新配置表面（表面丢失或过期时）
    pub fn restore_surface(&self) {
        self.surface.configure(&self.device, &self.surface_config);
    }
}
