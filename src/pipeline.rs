//! Data-driven render pipeline: a JSON description of framebuffers and passes,
//! plus the forward scene pass that draws a bound scene into them.
//!
//! The pipeline renders offscreen only. Whoever owns it decides how the output
//! framebuffer reaches the screen: the editor samples it into a UI image, the
//! runtime window blits it, the capture tool reads it back.

use crate::device::RenderDevice;
use crate::resources::{InstanceRaw, MeshVertex, ResourceHub, DEFAULT_MATERIAL, SCENE_FORWARD_SHADER};
use crate::scene::{CameraRig, PointLightDraw, SceneId, SunLight};
use anyhow::{anyhow, Context, Result};
use bitflags::bitflags;
use glam::{Mat4, Vec3, Vec4};
use serde::Deserialize;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::fs;
use std::sync::Arc;

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Forward pass point light budget; extra lights are truncated in scene
/// order, not sorted by brightness.
pub const MAX_POINT_LIGHTS: usize = 4;

const INITIAL_INSTANCE_CAPACITY: usize = 256;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClearFlags: u8 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClearTarget {
    Color,
    Depth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DrawStage {
    Renderables,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttachmentFormat {
    #[default]
    Rgba8Srgb,
    Rgba8,
    Rgba16f,
}

impl AttachmentFormat {
    pub fn to_wgpu(self) -> wgpu::TextureFormat {
        match self {
            AttachmentFormat::Rgba8Srgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            AttachmentFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
            AttachmentFormat::Rgba16f => wgpu::TextureFormat::Rgba16Float,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FramebufferSpec {
    pub name: String,
    #[serde(default)]
    pub format: AttachmentFormat,
    #[serde(default)]
    pub depth: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PassSpec {
    pub name: String,
    #[serde(default = "default_target")]
    pub target: String,
    #[serde(default)]
    pub clear: Vec<ClearTarget>,
    #[serde(default = "default_clear_color")]
    pub clear_color: [f32; 4],
    #[serde(default)]
    pub draw: Vec<DrawStage>,
}

impl PassSpec {
    pub fn clear_flags(&self) -> ClearFlags {
        let mut flags = ClearFlags::empty();
        for target in &self.clear {
            flags |= match target {
                ClearTarget::Color => ClearFlags::COLOR,
                ClearTarget::Depth => ClearFlags::DEPTH,
            };
        }
        flags
    }

    pub fn draws_renderables(&self) -> bool {
        self.draw.contains(&DrawStage::Renderables)
    }
}

fn default_target() -> String {
    "default".to_string()
}

fn default_clear_color() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

/// Parsed pipeline description. Loading goes through
/// [`crate::resources::PipelineSourceManager`], which caches per path.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineSpec {
    #[serde(default)]
    pub framebuffers: Vec<FramebufferSpec>,
    #[serde(default)]
    pub passes: Vec<PassSpec>,
    #[serde(default = "default_target")]
    pub output: String,
}

impl PipelineSpec {
    pub fn load_file(path: &str) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("Failed to read pipeline '{path}'"))?;
        let spec: PipelineSpec = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse pipeline '{path}'"))?;
        spec.validate().with_context(|| format!("Invalid pipeline '{path}'"))?;
        Ok(spec)
    }

    pub fn validate(&self) -> Result<()> {
        if self.framebuffers.is_empty() {
            return Err(anyhow!("pipeline declares no framebuffers"));
        }
        if self.passes.is_empty() {
            return Err(anyhow!("pipeline declares no passes"));
        }
        for (i, fb) in self.framebuffers.iter().enumerate() {
            if self.framebuffers[..i].iter().any(|other| other.name == fb.name) {
                return Err(anyhow!("duplicate framebuffer '{}'", fb.name));
            }
        }
        for pass in &self.passes {
            if !self.framebuffers.iter().any(|fb| fb.name == pass.target) {
                return Err(anyhow!("pass '{}' targets unknown framebuffer '{}'", pass.name, pass.target));
            }
        }
        if !self.framebuffers.iter().any(|fb| fb.name == self.output) {
            return Err(anyhow!("output names unknown framebuffer '{}'", self.output));
        }
        Ok(())
    }
}

/// A live render target created from a [`FramebufferSpec`]. `generation`
/// changes whenever the underlying texture is recreated, so anything holding
/// a view of it (the editor's display texture) knows to rebind.
pub struct Framebuffer {
    pub name: String,
    pub color: wgpu::Texture,
    pub color_view: wgpu::TextureView,
    pub depth_view: Option<wgpu::TextureView>,
    pub size: (u32, u32),
    pub format: wgpu::TextureFormat,
    pub generation: u64,
}

struct ScenePassResources {
    globals_layout: wgpu::BindGroupLayout,
    material_layout: wgpu::BindGroupLayout,
    shader: wgpu::ShaderModule,
    globals: wgpu::Buffer,
    globals_bind_group: wgpu::BindGroup,
    instances: wgpu::Buffer,
    instance_capacity: usize,
    pipelines: HashMap<(wgpu::TextureFormat, bool), wgpu::RenderPipeline>,
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct GlobalsRaw {
    view_proj: [[f32; 4]; 4],
    ambient_color: [f32; 4],
    sun_direction: [f32; 4],
    sun_color: [f32; 4],
    fog_color: [f32; 4],
    fog_params: [f32; 4],
    point_count: [u32; 4],
    point_positions: [[f32; 4]; MAX_POINT_LIGHTS],
    point_colors: [[f32; 4]; MAX_POINT_LIGHTS],
}

impl GlobalsRaw {
    fn compose(
        rig: Option<&CameraRig>,
        aspect: f32,
        sun: Option<&SunLight>,
        points: &[PointLightDraw],
    ) -> Self {
        let mut raw: GlobalsRaw = bytemuck::Zeroable::zeroed();
        let view_proj = rig.map(|r| r.view_projection(aspect)).unwrap_or(Mat4::IDENTITY);
        raw.view_proj = view_proj.to_cols_array_2d();
        match sun {
            Some(sun) => {
                raw.ambient_color =
                    (sun.ambient_color.truncate() * sun.ambient_intensity).extend(1.0).to_array();
                raw.sun_direction = sun.direction.normalize_or_zero().extend(0.0).to_array();
                raw.sun_color =
                    (sun.diffuse_color.truncate() * sun.diffuse_intensity).extend(1.0).to_array();
                raw.fog_color = sun.fog_color.to_array();
                raw.fog_params = Vec4::new(sun.fog_density, sun.fog_bottom, sun.fog_height, 0.0).to_array();
            }
            None => {
                raw.ambient_color = [0.15, 0.15, 0.15, 1.0];
                raw.sun_direction = Vec3::NEG_Y.extend(0.0).to_array();
            }
        }
        let count = points.len().min(MAX_POINT_LIGHTS);
        raw.point_count = [count as u32, 0, 0, 0];
        for (slot, light) in points.iter().take(count).enumerate() {
            raw.point_positions[slot] = light.position.extend(light.range).to_array();
            raw.point_colors[slot] =
                (light.color.truncate() * light.intensity).extend(light.attenuation).to_array();
        }
        raw
    }
}

/// A pipeline instance: one loaded description, one optional bound scene, and
/// the framebuffers sized to the current viewport.
pub struct RenderPipeline {
    source_path: String,
    camera_slot: String,
    spec: Option<Arc<PipelineSpec>>,
    scene: Option<SceneId>,
    viewport: (u32, u32),
    framebuffers: SmallVec<[Framebuffer; 4]>,
    next_generation: u64,
    gpu: Option<ScenePassResources>,
}

impl RenderPipeline {
    pub fn new(source_path: impl Into<String>, camera_slot: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            camera_slot: camera_slot.into(),
            spec: None,
            scene: None,
            viewport: (1, 1),
            framebuffers: SmallVec::new(),
            next_generation: 1,
            gpu: None,
        }
    }

    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    /// Attempts to load the description if it is not in yet. Readiness is
    /// sticky both ways per the source manager's cache.
    pub fn ensure_ready(&mut self, resources: &mut ResourceHub) -> bool {
        if self.spec.is_none() {
            self.spec = resources.pipelines.load(&self.source_path);
        }
        self.spec.is_some()
    }

    pub fn is_ready(&self) -> bool {
        self.spec.is_some()
    }

    pub fn set_scene(&mut self, scene: Option<SceneId>) {
        self.scene = scene;
    }

    pub fn scene(&self) -> Option<SceneId> {
        self.scene
    }

    /// Sets the render size. Zero extents clamp to one texel; the actual
    /// framebuffer rebuild happens on the next [`RenderPipeline::render`].
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width.max(1), height.max(1));
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    /// Builds or resizes the framebuffers for the current viewport without
    /// encoding any passes. No-op until the description is loaded; `render`
    /// performs the same step on its own. Callers that read the output before
    /// issuing the render size the targets through here first.
    pub fn ensure_targets(&mut self, device: &wgpu::Device) {
        if let Some(spec) = self.spec.clone() {
            self.ensure_framebuffers(device, &spec);
        }
    }

    pub fn framebuffer(&self, name: &str) -> Option<&Framebuffer> {
        self.framebuffers.iter().find(|fb| fb.name == name)
    }

    /// The framebuffer the description marks as the pipeline's output.
    pub fn output(&self) -> Option<&Framebuffer> {
        let spec = self.spec.as_ref()?;
        self.framebuffer(&spec.output)
    }

    /// Runs every pass against the bound scene. Returns `Ok(false)` without
    /// touching the GPU when the description is not ready. A missing or
    /// destroyed scene is not an error; passes still clear their targets.
    pub fn render(&mut self, device: &mut RenderDevice, resources: &mut ResourceHub) -> Result<bool> {
        if !self.ensure_ready(resources) {
            return Ok(false);
        }
        let spec = match self.spec.as_ref() {
            Some(spec) => spec.clone(),
            None => return Ok(false),
        };
        let gpu_device = device.device()?.clone();
        let queue = device.queue()?.clone();
        self.ensure_framebuffers(&gpu_device, &spec);
        self.ensure_gpu(&gpu_device, resources)?;

        let mut rig = None;
        let mut draws = Vec::new();
        let mut sun = None;
        let mut points = Vec::new();
        if let Some(scene_id) = self.scene {
            if let Some(scene) = device.scene_mut(scene_id) {
                rig = scene.camera_by_slot(&self.camera_slot);
                draws = scene.collect_renderables();
                sun = scene.sun_light();
                points = scene.point_lights();
            }
        }
        let aspect = self.viewport.0 as f32 / self.viewport.1 as f32;
        let globals = GlobalsRaw::compose(rig.as_ref(), aspect, sun.as_ref(), &points);
        let can_draw = rig.is_some() && !draws.is_empty();

        if can_draw {
            // Instance matrices are staged through the frame arena before the
            // single upload into the instance buffer.
            self.ensure_instance_capacity(&gpu_device, draws.len())?;
            let staged = device.arena_mut().alloc_slice::<InstanceRaw>(draws.len());
            for (slot, draw) in draws.iter().enumerate() {
                staged[slot] = InstanceRaw { model: draw.world.to_cols_array_2d() };
            }
            let gpu = self.gpu.as_ref().context("scene pass resources missing")?;
            queue.write_buffer(&gpu.instances, 0, bytemuck::cast_slice(staged));
        }
        {
            let gpu = self.gpu.as_ref().context("scene pass resources missing")?;
            queue.write_buffer(&gpu.globals, 0, bytemuck::bytes_of(&globals));
        }

        let mut models = Vec::with_capacity(draws.len());
        if can_draw {
            for draw in &draws {
                models.push(resources.models.ensure_gpu(&draw.model)?);
            }
        }
        let material = if can_draw {
            let layout = self.gpu.as_ref().context("scene pass resources missing")?.material_layout.clone();
            Some(resources.material_bind_group(DEFAULT_MATERIAL, &layout)?)
        } else {
            None
        };

        for pass_spec in &spec.passes {
            let (format, has_depth) = {
                let fb = self
                    .framebuffer(&pass_spec.target)
                    .with_context(|| format!("framebuffer '{}' missing", pass_spec.target))?;
                (fb.format, fb.depth_view.is_some())
            };
            self.ensure_pass_pipeline(&gpu_device, format, has_depth)?;
        }

        let mut encoder = gpu_device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Scene Encoder") });
        let gpu = self.gpu.as_ref().context("scene pass resources missing")?;
        for pass_spec in &spec.passes {
            let view_slot = device.allocate_view();
            let _ = device.pass_idx(&pass_spec.name);
            let fb = self
                .framebuffer(&pass_spec.target)
                .with_context(|| format!("framebuffer '{}' missing", pass_spec.target))?;
            let flags = pass_spec.clear_flags();
            let [r, g, b, a] = pass_spec.clear_color;
            let label = format!("Pass {} (view {view_slot})", pass_spec.name);
            let depth_attachment =
                fb.depth_view.as_ref().map(|view| wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(wgpu::Operations {
                        load: if flags.contains(ClearFlags::DEPTH) {
                            wgpu::LoadOp::Clear(1.0)
                        } else {
                            wgpu::LoadOp::Load
                        },
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                });
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(&label),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &fb.color_view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: if flags.contains(ClearFlags::COLOR) {
                            wgpu::LoadOp::Clear(wgpu::Color {
                                r: r as f64,
                                g: g as f64,
                                b: b as f64,
                                a: a as f64,
                            })
                        } else {
                            wgpu::LoadOp::Load
                        },
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: depth_attachment,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            if can_draw && pass_spec.draws_renderables() {
                let pipeline = gpu
                    .pipelines
                    .get(&(fb.format, fb.depth_view.is_some()))
                    .context("pass pipeline missing")?;
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, &gpu.globals_bind_group, &[]);
                if let Some(material) = material.as_ref() {
                    pass.set_bind_group(1, &material.bind_group, &[]);
                }
                pass.set_vertex_buffer(1, gpu.instances.slice(..));
                for (slot, model) in models.iter().enumerate() {
                    pass.set_vertex_buffer(0, model.vertex_buffer.slice(..));
                    pass.set_index_buffer(model.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                    let instance = slot as u32;
                    pass.draw_indexed(0..model.index_count, 0, instance..instance + 1);
                }
            }
        }
        device.queue_commands(encoder.finish());
        Ok(true)
    }

    fn ensure_framebuffers(&mut self, device: &wgpu::Device, spec: &PipelineSpec) {
        let stale = self.framebuffers.is_empty() || self.framebuffers[0].size != self.viewport;
        if !stale {
            return;
        }
        let (width, height) = self.viewport;
        self.framebuffers.clear();
        for fb_spec in &spec.framebuffers {
            let generation = self.next_generation;
            self.next_generation += 1;
            let format = fb_spec.format.to_wgpu();
            let color = device.create_texture(&wgpu::TextureDescriptor {
                label: Some(&format!("Framebuffer {}", fb_spec.name)),
                size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            });
            let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());
            let depth_view = fb_spec.depth.then(|| {
                device
                    .create_texture(&wgpu::TextureDescriptor {
                        label: Some(&format!("Framebuffer {} Depth", fb_spec.name)),
                        size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
                        mip_level_count: 1,
                        sample_count: 1,
                        dimension: wgpu::TextureDimension::D2,
                        format: DEPTH_FORMAT,
                        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                        view_formats: &[],
                    })
                    .create_view(&wgpu::TextureViewDescriptor::default())
            });
            self.framebuffers.push(Framebuffer {
                name: fb_spec.name.clone(),
                color,
                color_view,
                depth_view,
                size: self.viewport,
                format,
                generation,
            });
        }
        log::debug!("rebuilt {} framebuffers at {width}x{height}", self.framebuffers.len());
    }

    fn ensure_gpu(&mut self, device: &wgpu::Device, resources: &mut ResourceHub) -> Result<()> {
        if self.gpu.is_some() {
            return Ok(());
        }
        let shader = resources.shaders.module(SCENE_FORWARD_SHADER)?;
        let globals_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Scene Globals Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let material_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Scene Material Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let globals = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Scene Globals"),
            size: std::mem::size_of::<GlobalsRaw>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let globals_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Scene Globals"),
            layout: &globals_layout,
            entries: &[wgpu::BindGroupEntry { binding: 0, resource: globals.as_entire_binding() }],
        });
        let instances = create_instance_buffer(device, INITIAL_INSTANCE_CAPACITY);
        self.gpu = Some(ScenePassResources {
            globals_layout,
            material_layout,
            shader,
            globals,
            globals_bind_group,
            instances,
            instance_capacity: INITIAL_INSTANCE_CAPACITY,
            pipelines: HashMap::new(),
        });
        Ok(())
    }

    fn ensure_instance_capacity(&mut self, device: &wgpu::Device, needed: usize) -> Result<()> {
        let gpu = self.gpu.as_mut().context("scene pass resources missing")?;
        if needed <= gpu.instance_capacity {
            return Ok(());
        }
        let mut capacity = gpu.instance_capacity.max(1);
        while capacity < needed {
            capacity *= 2;
        }
        gpu.instances = create_instance_buffer(device, capacity);
        gpu.instance_capacity = capacity;
        Ok(())
    }

    fn ensure_pass_pipeline(
        &mut self,
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        has_depth: bool,
    ) -> Result<()> {
        let gpu = self.gpu.as_mut().context("scene pass resources missing")?;
        if gpu.pipelines.contains_key(&(format, has_depth)) {
            return Ok(());
        }
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts: &[&gpu.globals_layout, &gpu.material_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Scene Forward Pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &gpu.shader,
                entry_point: Some("vs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[MeshVertex::layout(), InstanceRaw::layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &gpu.shader,
                entry_point: Some("fs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil: has_depth.then(|| wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });
        gpu.pipelines.insert((format, has_depth), pipeline);
        Ok(())
    }
}

fn create_instance_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Scene Instances"),
        size: (capacity * std::mem::size_of::<InstanceRaw>()) as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> PipelineSpec {
        serde_json::from_str(json).expect("parse pipeline spec")
    }

    #[test]
    fn parses_full_description_with_defaults() {
        let spec = parse(
            r#"{
                "framebuffers": [
                    {"name": "default", "depth": true},
                    {"name": "bloom", "format": "rgba16f"}
                ],
                "passes": [
                    {"name": "sky", "clear": ["color", "depth"], "clear_color": [0.1, 0.2, 0.3, 1.0]},
                    {"name": "opaque", "draw": ["renderables"]}
                ]
            }"#,
        );
        spec.validate().expect("valid spec");
        assert_eq!(spec.output, "default");
        assert_eq!(spec.framebuffers[0].format, AttachmentFormat::Rgba8Srgb);
        assert!(spec.framebuffers[0].depth);
        assert_eq!(spec.framebuffers[1].format, AttachmentFormat::Rgba16f);
        assert_eq!(spec.passes[0].target, "default");
        assert_eq!(spec.passes[0].clear_flags(), ClearFlags::COLOR | ClearFlags::DEPTH);
        assert!(!spec.passes[0].draws_renderables());
        assert!(spec.passes[1].draws_renderables());
        assert_eq!(spec.passes[1].clear_flags(), ClearFlags::empty());
        assert_eq!(spec.passes[1].clear_color, [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn validate_rejects_unknown_targets() {
        let spec = parse(
            r#"{
                "framebuffers": [{"name": "default"}],
                "passes": [{"name": "opaque", "target": "gbuffer"}]
            }"#,
        );
        let err = spec.validate().unwrap_err();
        assert!(err.to_string().contains("unknown framebuffer 'gbuffer'"));
    }

    #[test]
    fn validate_rejects_duplicate_framebuffers() {
        let spec = parse(
            r#"{
                "framebuffers": [{"name": "default"}, {"name": "default"}],
                "passes": [{"name": "opaque"}]
            }"#,
        );
        let err = spec.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate framebuffer"));
    }

    #[test]
    fn validate_rejects_unknown_output() {
        let spec = parse(
            r#"{
                "framebuffers": [{"name": "scene"}],
                "passes": [{"name": "opaque", "target": "scene"}],
                "output": "default"
            }"#,
        );
        let err = spec.validate().unwrap_err();
        assert!(err.to_string().contains("output names unknown framebuffer"));
    }

    #[test]
    fn validate_rejects_empty_descriptions() {
        assert!(parse(r#"{"passes": [{"name": "opaque"}]}"#).validate().is_err());
        assert!(parse(r#"{"framebuffers": [{"name": "default"}]}"#).validate().is_err());
    }

    #[test]
    fn attachment_formats_map_to_wgpu() {
        assert_eq!(AttachmentFormat::Rgba8Srgb.to_wgpu(), wgpu::TextureFormat::Rgba8UnormSrgb);
        assert_eq!(AttachmentFormat::Rgba8.to_wgpu(), wgpu::TextureFormat::Rgba8Unorm);
        assert_eq!(AttachmentFormat::Rgba16f.to_wgpu(), wgpu::TextureFormat::Rgba16Float);
    }

    #[test]
    fn viewport_clamps_to_one_texel() {
        let mut pipeline = RenderPipeline::new("nope.json", "main");
        assert!(!pipeline.is_ready());
        pipeline.set_viewport(0, 0);
        assert_eq!(pipeline.viewport(), (1, 1));
        pipeline.set_viewport(800, 0);
        assert_eq!(pipeline.viewport(), (800, 1));
    }

    #[test]
    fn missing_description_keeps_pipeline_not_ready() {
        let mut pipeline = RenderPipeline::new("does/not/exist.json", "main");
        let mut resources = ResourceHub::new();
        assert!(!pipeline.ensure_ready(&mut resources));
        assert!(!pipeline.is_ready());
        assert!(pipeline.output().is_none());
    }

    // Mirrors the queries `render` issues against a registered scene. The
    // scene queries take `&mut self`, so the registry lookup has to as well.
    #[test]
    fn scene_queries_resolve_through_the_device_registry() {
        use crate::config::WindowConfig;
        use crate::scene::WorldId;

        let mut device = RenderDevice::new(&WindowConfig::default());
        let id = device.create_scene(WorldId(1));
        let scene = device.scene_mut(id).expect("registered scene");
        scene.populate_demo();
        assert!(scene.camera_by_slot("main").is_some());
        assert!(scene.sun_light().is_some());
        assert_eq!(scene.collect_renderables().len(), 4);
        assert_eq!(scene.point_lights().len(), 1);
    }
}
