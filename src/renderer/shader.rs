//! 着色器程序
//!
//! 把顶点 / 片元两段 WGSL 源码编译、链接成一个可执行程序。
//!
//! - **编译**：用 naga 解析并验证每个阶段，失败时返回 `InvalidShader`，
//!   携带编译器诊断文本，不会进入链接步骤
//! - **链接**：检查两个阶段的接口是否吻合，再交给 GPU 上下文创建程序；
//!   任何一步失败都返回 `LinkFailure`
//! - **反射**：链接成功后可以按名字查询属性、uniform 和纹理的位置

use naga::valid::{Capabilities, ValidationFlags, Validator};
use tracing::{debug, info};

use crate::core::error::{GraphicsError, Result};
use crate::gfx::context::{GpuContext, ProgramHandle, ShaderStage};

/// 编译后的单个着色器阶段
#[derive(Debug, Clone)]
pub struct CompiledShader {
    stage: ShaderStage,
    source: String,
    module: naga::Module,
}

impl CompiledShader {
    /// 解析并验证一段 WGSL 源码
    pub fn compile(stage: ShaderStage, source: &str) -> Result<Self> {
        let module = naga::front::wgsl::parse_str(source).map_err(|e| {
            GraphicsError::InvalidShader {
                stage,
                diagnostic: e.emit_to_string(source),
            }
        })?;

        Validator::new(ValidationFlags::all(), Capabilities::empty())
            .validate(&module)
            .map_err(|e| GraphicsError::InvalidShader {
                stage,
                diagnostic: e.as_inner().to_string(),
            })?;

        debug!("Compiled {} shader ({} bytes)", stage, source.len());

        Ok(Self {
            stage,
            source: source.to_string(),
            module,
        })
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn module(&self) -> &naga::Module {
        &self.module
    }

    /// 本阶段唯一入口点的名字
    pub fn entry_point(&self) -> Result<&str> {
        let wanted = match self.stage {
            ShaderStage::Vertex => naga::ShaderStage::Vertex,
            ShaderStage::Fragment => naga::ShaderStage::Fragment,
        };

        let mut matching = self.module.entry_points.iter().filter(|ep| ep.stage == wanted);
        match (matching.next(), matching.next()) {
            (Some(ep), None) => Ok(ep.name.as_str()),
            (None, _) => Err(GraphicsError::LinkFailure(format!(
                "{} shader has no {} entry point",
                self.stage, self.stage
            ))
            .into()),
            (Some(_), Some(_)) => Err(GraphicsError::LinkFailure(format!(
                "{} shader declares more than one {} entry point",
                self.stage, self.stage
            ))
            .into()),
        }
    }

    fn entry_function(&self) -> Result<&naga::Function> {
        let name = self.entry_point()?;
        self.module
            .entry_points
            .iter()
            .find(|ep| ep.name == name)
            .map(|ep| &ep.function)
            .ok_or_else(|| GraphicsError::LinkFailure(format!("entry point `{}` vanished", name)).into())
    }
}

/// 顶点属性槽
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSlot {
    pub name: String,
    pub location: u32,
    /// 每个顶点的 f32 分量数（2、3 或 4）
    pub components: u32,
}

/// 绑定资源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// `var<uniform> name: mat4x4<f32>`
    MatrixUniform,
    /// `texture_2d<f32>`
    Texture2d,
    /// `sampler`
    Sampler,
}

/// 绑定资源槽（全部位于 group 0）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSlot {
    pub name: String,
    pub binding: u32,
    pub kind: ResourceKind,
    pub vertex_visible: bool,
    pub fragment_visible: bool,
}

/// 链接后反射出的程序接口
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramInterface {
    pub attributes: Vec<AttributeSlot>,
    pub resources: Vec<ResourceSlot>,
}

impl ProgramInterface {
    pub fn attribute(&self, name: &str) -> Option<&AttributeSlot> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn resource(&self, name: &str) -> Option<&ResourceSlot> {
        self.resources.iter().find(|r| r.name == name)
    }

    pub fn resource_at(&self, binding: u32) -> Option<&ResourceSlot> {
        self.resources.iter().find(|r| r.binding == binding)
    }
}

/// 已链接的着色器程序
#[derive(Debug)]
pub struct ShaderProgram {
    handle: ProgramHandle,
    interface: ProgramInterface,
}

impl ShaderProgram {
    /// 编译并链接两个阶段
    ///
    /// 任一阶段编译失败都直接返回 `InvalidShader`，不会调用上下文。
    pub fn build<C: GpuContext + ?Sized>(
        context: &mut C,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Self> {
        let vertex = CompiledShader::compile(ShaderStage::Vertex, vertex_source)?;
        let fragment = CompiledShader::compile(ShaderStage::Fragment, fragment_source)?;
        Self::link(context, &vertex, &fragment)
    }

    /// 链接两个已编译的阶段
    pub fn link<C: GpuContext + ?Sized>(
        context: &mut C,
        vertex: &CompiledShader,
        fragment: &CompiledShader,
    ) -> Result<Self> {
        if vertex.stage() != ShaderStage::Vertex || fragment.stage() != ShaderStage::Fragment {
            return Err(GraphicsError::LinkFailure(
                "shader stages passed in the wrong order".to_string(),
            )
            .into());
        }

        let interface = reflect_interface(vertex, fragment)?;

        // 失败统一报告为链接错误
        let handle = context
            .create_program(vertex, fragment, &interface)
            .map_err(|e| GraphicsError::LinkFailure(e.to_string()))?;

        info!(
            "Shader program linked: {} attributes, {} resources",
            interface.attributes.len(),
            interface.resources.len()
        );

        Ok(Self { handle, interface })
    }

    pub fn handle(&self) -> ProgramHandle {
        self.handle
    }

    pub fn interface(&self) -> &ProgramInterface {
        &self.interface
    }

    /// 按名字查询顶点属性位置
    pub fn attribute_location(&self, name: &str) -> Option<u32> {
        self.interface.attribute(name).map(|a| a.location)
    }

    /// 按名字查询矩阵 uniform 的绑定位置
    pub fn uniform_location(&self, name: &str) -> Option<u32> {
        self.interface
            .resource(name)
            .filter(|r| r.kind == ResourceKind::MatrixUniform)
            .map(|r| r.binding)
    }

    /// 按名字查询纹理的绑定位置
    pub fn texture_location(&self, name: &str) -> Option<u32> {
        self.interface
            .resource(name)
            .filter(|r| r.kind == ResourceKind::Texture2d)
            .map(|r| r.binding)
    }

    /// 释放 GPU 程序
    pub fn release<C: GpuContext + ?Sized>(self, context: &mut C) {
        context.destroy_program(self.handle);
    }
}

fn link_error(message: String) -> crate::core::error::SpinRenderError {
    GraphicsError::LinkFailure(message).into()
}

/// 一个入口点的输入或输出变量
struct IoVariable {
    name: String,
    location: u32,
    inner: naga::TypeInner,
}

/// 收集函数参数（或结构体成员）上的 `@location` 绑定
fn collect_inputs(module: &naga::Module, function: &naga::Function) -> Vec<IoVariable> {
    let mut vars = Vec::new();
    for arg in &function.arguments {
        collect_binding(
            module,
            arg.name.as_deref(),
            arg.ty,
            arg.binding.as_ref(),
            &mut vars,
        );
    }
    vars
}

fn collect_outputs(module: &naga::Module, function: &naga::Function) -> Vec<IoVariable> {
    let mut vars = Vec::new();
    if let Some(result) = &function.result {
        collect_binding(module, None, result.ty, result.binding.as_ref(), &mut vars);
    }
    vars
}

fn collect_binding(
    module: &naga::Module,
    name: Option<&str>,
    ty: naga::Handle<naga::Type>,
    binding: Option<&naga::Binding>,
    vars: &mut Vec<IoVariable>,
) {
    match binding {
        Some(naga::Binding::Location { location, .. }) => vars.push(IoVariable {
            name: name.unwrap_or_default().to_string(),
            location: *location,
            inner: module.types[ty].inner.clone(),
        }),
        Some(naga::Binding::BuiltIn(_)) => {}
        None => {
            if let naga::TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    collect_binding(
                        module,
                        member.name.as_deref(),
                        member.ty,
                        member.binding.as_ref(),
                        vars,
                    );
                }
            }
        }
    }
}

/// 收集模块里所有 group 0 的绑定资源
fn collect_resources(shader: &CompiledShader) -> Result<Vec<ResourceSlot>> {
    let module = shader.module();
    let mut slots = Vec::new();

    for (_, var) in module.global_variables.iter() {
        let Some(binding) = &var.binding else {
            continue;
        };
        let name = var.name.clone().unwrap_or_default();

        if binding.group != 0 {
            return Err(link_error(format!(
                "resource `{}` is in group {}, only group 0 is supported",
                name, binding.group
            )));
        }

        let kind = match (&var.space, &module.types[var.ty].inner) {
            (
                naga::AddressSpace::Uniform,
                naga::TypeInner::Matrix {
                    columns: naga::VectorSize::Quad,
                    rows: naga::VectorSize::Quad,
                    ..
                },
            ) => ResourceKind::MatrixUniform,
            (
                naga::AddressSpace::Handle,
                naga::TypeInner::Image {
                    dim: naga::ImageDimension::D2,
                    arrayed: false,
                    class: naga::ImageClass::Sampled { multi: false, .. },
                },
            ) => ResourceKind::Texture2d,
            (naga::AddressSpace::Handle, naga::TypeInner::Sampler { comparison: false }) => {
                ResourceKind::Sampler
            }
            _ => {
                return Err(link_error(format!(
                    "resource `{}` at binding {} has an unsupported type",
                    name, binding.binding
                )))
            }
        };

        slots.push(ResourceSlot {
            name,
            binding: binding.binding,
            kind,
            vertex_visible: shader.stage() == ShaderStage::Vertex,
            fragment_visible: shader.stage() == ShaderStage::Fragment,
        });
    }

    Ok(slots)
}

/// 检查两个阶段的接口并合并为程序接口
fn reflect_interface(vertex: &CompiledShader, fragment: &CompiledShader) -> Result<ProgramInterface> {
    let vs_function = vertex.entry_function()?;
    let fs_function = fragment.entry_function()?;

    // 片元输入必须都能在顶点输出中找到同位置、同类型的变量
    let vs_outputs = collect_outputs(vertex.module(), vs_function);
    for input in collect_inputs(fragment.module(), fs_function) {
        match vs_outputs.iter().find(|o| o.location == input.location) {
            Some(output) if output.inner == input.inner => {}
            Some(_) => {
                return Err(link_error(format!(
                    "fragment input `{}` at location {} does not match the vertex output type",
                    input.name, input.location
                )))
            }
            None => {
                return Err(link_error(format!(
                    "fragment input `{}` at location {} is not written by the vertex stage",
                    input.name, input.location
                )))
            }
        }
    }

    let mut attributes = Vec::new();
    for input in collect_inputs(vertex.module(), vs_function) {
        let components = match input.inner {
            naga::TypeInner::Vector { size, .. } => size as u32,
            _ => {
                return Err(link_error(format!(
                    "vertex attribute `{}` must be a vector type",
                    input.name
                )))
            }
        };
        attributes.push(AttributeSlot {
            name: input.name,
            location: input.location,
            components,
        });
    }
    attributes.sort_by_key(|a| a.location);

    // 合并两个阶段的资源，同名资源必须落在同一绑定上
    let mut resources = collect_resources(vertex)?;
    for slot in collect_resources(fragment)? {
        if let Some(existing) = resources.iter_mut().find(|r| r.binding == slot.binding) {
            if existing.name != slot.name || existing.kind != slot.kind {
                return Err(link_error(format!(
                    "binding {} is declared as `{}` in the vertex stage and `{}` in the fragment stage",
                    slot.binding, existing.name, slot.name
                )));
            }
            existing.fragment_visible = true;
        } else if let Some(existing) = resources.iter().find(|r| r.name == slot.name) {
            return Err(link_error(format!(
                "resource `{}` is bound at {} in the vertex stage but {} in the fragment stage",
                slot.name, existing.binding, slot.binding
            )));
        } else {
            resources.push(slot);
        }
    }
    resources.sort_by_key(|r| r.binding);

    Ok(ProgramInterface {
        attributes,
        resources,
    })
}
