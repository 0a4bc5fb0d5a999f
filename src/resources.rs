//! Named resource managers behind the render device: textures, models,
//! materials, shader modules, and pipeline descriptions.
//!
//! Managers are constructed empty and become usable once [`ResourceHub::set_device`]
//! hands them GPU handles. Loads are cached by name; a load failure is logged
//! once and served from a builtin fallback so a broken asset never takes the
//! frame loop down.

use anyhow::{anyhow, Context, Result};
use glam::{Vec2, Vec3};
use serde::Deserialize;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::sync::Arc;
use wgpu::util::DeviceExt;

use crate::pipeline::PipelineSpec;

pub const WHITE_TEXTURE: &str = "builtin/white";
pub const DEFAULT_MATERIAL: &str = "materials/default";
pub const SCENE_FORWARD_SHADER: &str = "scene_forward";
pub const SURFACE_BLIT_SHADER: &str = "surface_blit";

#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl MeshVertex {
    pub fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self { position: position.to_array(), normal: normal.to_array(), uv: uv.to_array() }
    }

    pub fn layout<'a>() -> wgpu::VertexBufferLayout<'a> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: 12,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: 24,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

/// Per-instance world matrix, column major, fed as vertex locations 3 to 6.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceRaw {
    pub model: [[f32; 4]; 4],
}

impl InstanceRaw {
    pub fn layout<'a>() -> wgpu::VertexBufferLayout<'a> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<InstanceRaw>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 3,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: 16,
                    shader_location: 4,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: 32,
                    shader_location: 5,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: 48,
                    shader_location: 6,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    fn push_quad(&mut self, positions: [Vec3; 4], normal: Vec3) {
        let base = self.vertices.len() as u32;
        let uvs =
            [Vec2::new(0.0, 1.0), Vec2::new(1.0, 1.0), Vec2::new(1.0, 0.0), Vec2::new(0.0, 0.0)];
        for (position, uv) in positions.into_iter().zip(uvs) {
            self.vertices.push(MeshVertex::new(position, normal, uv));
        }
        self.indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
}

/// Unit cube centred on the origin, four vertices per face so normals stay hard.
pub fn cube_mesh() -> MeshData {
    let h = 0.5;
    let mut mesh = MeshData::default();
    mesh.push_quad(
        [
            Vec3::new(h, -h, h),
            Vec3::new(h, -h, -h),
            Vec3::new(h, h, -h),
            Vec3::new(h, h, h),
        ],
        Vec3::X,
    );
    mesh.push_quad(
        [
            Vec3::new(-h, -h, -h),
            Vec3::new(-h, -h, h),
            Vec3::new(-h, h, h),
            Vec3::new(-h, h, -h),
        ],
        Vec3::NEG_X,
    );
    mesh.push_quad(
        [
            Vec3::new(-h, h, h),
            Vec3::new(h, h, h),
            Vec3::new(h, h, -h),
            Vec3::new(-h, h, -h),
        ],
        Vec3::Y,
    );
    mesh.push_quad(
        [
            Vec3::new(-h, -h, -h),
            Vec3::new(h, -h, -h),
            Vec3::new(h, -h, h),
            Vec3::new(-h, -h, h),
        ],
        Vec3::NEG_Y,
    );
    mesh.push_quad(
        [
            Vec3::new(-h, -h, h),
            Vec3::new(h, -h, h),
            Vec3::new(h, h, h),
            Vec3::new(-h, h, h),
        ],
        Vec3::Z,
    );
    mesh.push_quad(
        [
            Vec3::new(h, -h, -h),
            Vec3::new(-h, -h, -h),
            Vec3::new(-h, h, -h),
            Vec3::new(h, h, -h),
        ],
        Vec3::NEG_Z,
    );
    mesh
}

/// Unit quad in the XZ plane facing up.
pub fn plane_mesh() -> MeshData {
    let h = 0.5;
    let mut mesh = MeshData::default();
    mesh.push_quad(
        [
            Vec3::new(-h, 0.0, h),
            Vec3::new(h, 0.0, h),
            Vec3::new(h, 0.0, -h),
            Vec3::new(-h, 0.0, -h),
        ],
        Vec3::Y,
    );
    mesh
}

#[derive(Debug, Deserialize)]
struct MeshFile {
    vertices: Vec<MeshVertexFile>,
    indices: Vec<u32>,
}

#[derive(Debug, Deserialize)]
struct MeshVertexFile {
    position: [f32; 3],
    #[serde(default = "default_normal")]
    normal: [f32; 3],
    #[serde(default)]
    uv: [f32; 2],
}

fn default_normal() -> [f32; 3] {
    [0.0, 1.0, 0.0]
}

pub fn load_mesh_file(path: &str) -> Result<MeshData> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read model '{path}'"))?;
    let file: MeshFile =
        serde_json::from_slice(&bytes).with_context(|| format!("Failed to parse model '{path}'"))?;
    let vertex_count = file.vertices.len() as u32;
    if let Some(bad) = file.indices.iter().find(|i| **i >= vertex_count) {
        return Err(anyhow!("model '{path}' index {bad} out of range ({vertex_count} vertices)"));
    }
    if file.indices.len() % 3 != 0 {
        return Err(anyhow!("model '{path}' index count {} is not a triangle list", file.indices.len()));
    }
    let vertices = file
        .vertices
        .into_iter()
        .map(|v| MeshVertex { position: v.position, normal: v.normal, uv: v.uv })
        .collect();
    Ok(MeshData { vertices, indices: file.indices })
}

pub struct GpuModel {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
}

#[derive(Default)]
pub struct ModelManager {
    device: Option<wgpu::Device>,
    gpu: HashMap<String, Arc<GpuModel>>,
    failed: HashSet<String>,
}

impl ModelManager {
    fn set_device(&mut self, device: &wgpu::Device) {
        self.device = Some(device.clone());
        self.gpu.clear();
        self.failed.clear();
    }

    /// Resolves a model key to an uploaded mesh, caching by key. Builtin keys
    /// are `primitive/cube` and `primitive/plane`; anything else is a path to
    /// a JSON model. A broken file falls back to the cube after one warning.
    pub fn ensure_gpu(&mut self, key: &str) -> Result<Arc<GpuModel>> {
        if let Some(model) = self.gpu.get(key) {
            return Ok(model.clone());
        }
        let device = self.device.as_ref().ok_or_else(|| anyhow!("GPU device not initialized"))?;
        let mesh = match key {
            "primitive/cube" => cube_mesh(),
            "primitive/plane" => plane_mesh(),
            path => match load_mesh_file(path) {
                Ok(mesh) => mesh,
                Err(err) => {
                    if self.failed.insert(path.to_string()) {
                        log::warn!("model '{path}' unavailable, using cube: {err:#}");
                    }
                    cube_mesh()
                }
            },
        };
        let model = Arc::new(upload_mesh(device, key, &mesh));
        self.gpu.insert(key.to_string(), model.clone());
        Ok(model)
    }
}

fn upload_mesh(device: &wgpu::Device, key: &str, mesh: &MeshData) -> GpuModel {
    let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("Model Vertices {key}")),
        contents: bytemuck::cast_slice(&mesh.vertices),
        usage: wgpu::BufferUsages::VERTEX,
    });
    let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("Model Indices {key}")),
        contents: bytemuck::cast_slice(&mesh.indices),
        usage: wgpu::BufferUsages::INDEX,
    });
    GpuModel { vertex_buffer, index_buffer, index_count: mesh.indices.len() as u32 }
}

#[derive(Default)]
pub struct TextureManager {
    device: Option<wgpu::Device>,
    queue: Option<wgpu::Queue>,
    sampler: Option<wgpu::Sampler>,
    views: HashMap<String, wgpu::TextureView>,
    failed: HashSet<String>,
}

impl TextureManager {
    fn set_device(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        self.device = Some(device.clone());
        self.queue = Some(queue.clone());
        self.sampler = Some(device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Default Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        }));
        self.views.clear();
        self.failed.clear();
    }

    pub fn default_sampler(&self) -> Result<&wgpu::Sampler> {
        self.sampler.as_ref().ok_or_else(|| anyhow!("GPU device not initialized"))
    }

    /// Loads a PNG by path and caches the view. `builtin/white` is always
    /// available; broken paths serve white after one warning.
    pub fn ensure_view(&mut self, key: &str) -> Result<wgpu::TextureView> {
        if let Some(view) = self.views.get(key) {
            return Ok(view.clone());
        }
        let device = self.device.as_ref().ok_or_else(|| anyhow!("GPU device not initialized"))?;
        let queue = self.queue.as_ref().ok_or_else(|| anyhow!("GPU queue not initialized"))?;
        let (pixels, width, height) = if key == WHITE_TEXTURE {
            (vec![255u8; 4], 1, 1)
        } else {
            match load_rgba_file(key) {
                Ok(loaded) => loaded,
                Err(err) => {
                    if self.failed.insert(key.to_string()) {
                        log::warn!("texture '{key}' unavailable, using white: {err:#}");
                    }
                    (vec![255u8; 4], 1, 1)
                }
            }
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&format!("Texture {key}")),
            size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.views.insert(key.to_string(), view.clone());
        Ok(view)
    }
}

fn load_rgba_file(path: &str) -> Result<(Vec<u8>, u32, u32)> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read texture '{path}'"))?;
    let img = image::load_from_memory(&bytes)
        .with_context(|| format!("Failed to decode texture '{path}'"))?
        .to_rgba8();
    let (w, h) = img.dimensions();
    Ok((img.into_raw(), w, h))
}

#[derive(Debug, Clone, Deserialize)]
pub struct MaterialDef {
    #[serde(default = "default_albedo")]
    pub albedo: [f32; 4],
    #[serde(default)]
    pub texture: Option<String>,
}

fn default_albedo() -> [f32; 4] {
    [1.0, 1.0, 1.0, 1.0]
}

impl Default for MaterialDef {
    fn default() -> Self {
        Self { albedo: default_albedo(), texture: None }
    }
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct MaterialParamsRaw {
    albedo: [f32; 4],
}

pub struct GpuMaterial {
    pub bind_group: wgpu::BindGroup,
}

#[derive(Default)]
pub struct MaterialManager {
    device: Option<wgpu::Device>,
    gpu: HashMap<String, Arc<GpuMaterial>>,
    failed: HashSet<String>,
}

impl MaterialManager {
    fn set_device(&mut self, device: &wgpu::Device) {
        self.device = Some(device.clone());
        self.gpu.clear();
        self.failed.clear();
    }

    /// Builds the bind group for a material key against the scene pass layout.
    /// `materials/default` is builtin; other keys are JSON paths with a broken
    /// file falling back to the default definition after one warning.
    ///
    /// The cache assumes one material layout per device, which holds because
    /// the layout is created once alongside the scene pass and the cache is
    /// dropped whenever the device changes.
    pub fn ensure_gpu(
        &mut self,
        key: &str,
        layout: &wgpu::BindGroupLayout,
        textures: &mut TextureManager,
    ) -> Result<Arc<GpuMaterial>> {
        if let Some(material) = self.gpu.get(key) {
            return Ok(material.clone());
        }
        let def = if key == DEFAULT_MATERIAL {
            MaterialDef::default()
        } else {
            match load_material_file(key) {
                Ok(def) => def,
                Err(err) => {
                    if self.failed.insert(key.to_string()) {
                        log::warn!("material '{key}' unavailable, using default: {err:#}");
                    }
                    MaterialDef::default()
                }
            }
        };
        let texture_key = def.texture.as_deref().unwrap_or(WHITE_TEXTURE);
        let view = textures.ensure_view(texture_key)?;
        let device = self.device.as_ref().ok_or_else(|| anyhow!("GPU device not initialized"))?;
        let params = MaterialParamsRaw { albedo: def.albedo };
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("Material Params {key}")),
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("Material {key}")),
            layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: uniform_buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(&view) },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(textures.default_sampler()?),
                },
            ],
        });
        let material = Arc::new(GpuMaterial { bind_group });
        self.gpu.insert(key.to_string(), material.clone());
        Ok(material)
    }
}

pub fn load_material_file(path: &str) -> Result<MaterialDef> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read material '{path}'"))?;
    serde_json::from_slice(&bytes).with_context(|| format!("Failed to parse material '{path}'"))
}

#[derive(Default)]
pub struct ShaderManager {
    device: Option<wgpu::Device>,
    modules: HashMap<String, wgpu::ShaderModule>,
}

impl ShaderManager {
    fn set_device(&mut self, device: &wgpu::Device) {
        self.device = Some(device.clone());
        self.modules.clear();
    }

    pub fn module(&mut self, name: &str) -> Result<wgpu::ShaderModule> {
        let device = self.device.as_ref().ok_or_else(|| anyhow!("GPU device not initialized"))?;
        match self.modules.entry(name.to_string()) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let source =
                    builtin_shader_source(name).ok_or_else(|| anyhow!("unknown shader module '{name}'"))?;
                let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(name),
                    source: wgpu::ShaderSource::Wgsl(source.into()),
                });
                Ok(entry.insert(module).clone())
            }
        }
    }
}

fn builtin_shader_source(name: &str) -> Option<&'static str> {
    match name {
        SCENE_FORWARD_SHADER => Some(include_str!("../assets/shaders/scene_forward.wgsl")),
        SURFACE_BLIT_SHADER => Some(include_str!("../assets/shaders/surface_blit.wgsl")),
        _ => None,
    }
}

enum PipelineLoadState {
    Ready(Arc<PipelineSpec>),
    Failed,
}

/// Caches parsed pipeline descriptions by path. A path that failed to load
/// stays failed (and logged once) until [`PipelineSourceManager::invalidate`].
#[derive(Default)]
pub struct PipelineSourceManager {
    specs: HashMap<String, PipelineLoadState>,
}

impl PipelineSourceManager {
    pub fn load(&mut self, path: &str) -> Option<Arc<PipelineSpec>> {
        match self.specs.entry(path.to_string()) {
            Entry::Occupied(entry) => match entry.get() {
                PipelineLoadState::Ready(spec) => Some(spec.clone()),
                PipelineLoadState::Failed => None,
            },
            Entry::Vacant(entry) => match PipelineSpec::load_file(path) {
                Ok(spec) => {
                    let spec = Arc::new(spec);
                    entry.insert(PipelineLoadState::Ready(spec.clone()));
                    Some(spec)
                }
                Err(err) => {
                    log::warn!("pipeline '{path}' unavailable: {err:#}");
                    entry.insert(PipelineLoadState::Failed);
                    None
                }
            },
        }
    }

    pub fn invalidate(&mut self, path: &str) {
        self.specs.remove(path);
    }
}

/// The managers as one unit, handed around by the app and the editor panels.
#[derive(Default)]
pub struct ResourceHub {
    device: Option<wgpu::Device>,
    pub textures: TextureManager,
    pub models: ModelManager,
    pub materials: MaterialManager,
    pub shaders: ShaderManager,
    pub pipelines: PipelineSourceManager,
}

impl ResourceHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ready(&self) -> bool {
        self.device.is_some()
    }

    pub fn set_device(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        self.device = Some(device.clone());
        self.textures.set_device(device, queue);
        self.models.set_device(device);
        self.materials.set_device(device);
        self.shaders.set_device(device);
    }

    /// Material lookup that threads the texture manager through, so a material
    /// and its texture resolve in one call.
    pub fn material_bind_group(
        &mut self,
        key: &str,
        layout: &wgpu::BindGroupLayout,
    ) -> Result<Arc<GpuMaterial>> {
        self.materials.ensure_gpu(key, layout, &mut self.textures)
    }
}
