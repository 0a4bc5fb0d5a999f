//! The render device: GPU context, swapchain surface, frame bookkeeping, and
//! ownership of the live scenes.
//!
//! Everything that must happen "once per frame" funnels through [`RenderDevice::frame`]:
//! queued command buffers are submitted, the frame index advances, and the
//! per-frame view counter and arena reset. Render passes allocate their view
//! slots and arena storage against the current frame only.

use crate::config::WindowConfig;
use crate::frame_arena::FrameArena;
use crate::interner::NameTable;
use crate::scene::{RenderScene, SceneId, WorldId};
use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::Window;

const DEFAULT_PRESENT_MODES: [wgpu::PresentMode; 1] = [wgpu::PresentMode::Fifo];

/// Hard cap on interned shader defines; indices are handed out as `u8`.
pub const MAX_SHADER_DEFINES: usize = 256;

/// Which corner of a texture the backend treats as (0, 0). OpenGL is the odd
/// one out with a bottom-left origin, so content sampled straight into a UI
/// image needs a vertical flip there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureOrigin {
    TopLeft,
    BottomLeft,
}

#[derive(Debug)]
pub struct SurfaceFrame {
    view: wgpu::TextureView,
    surface: Option<wgpu::SurfaceTexture>,
}

impl SurfaceFrame {
    fn new(surface: wgpu::SurfaceTexture) -> Self {
        let view = surface.texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { view, surface: Some(surface) }
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn present(mut self) {
        if let Some(surface) = self.surface.take() {
            surface.present();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SurfaceErrorAction {
    Reconfigure,
    Retry,
    OutOfMemory,
    Unknown,
}

struct SurfaceBlit {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    params: wgpu::Buffer,
}

pub struct RenderDevice {
    surface: Option<wgpu::Surface<'static>>,
    device: Option<wgpu::Device>,
    queue: Option<wgpu::Queue>,
    config: Option<wgpu::SurfaceConfiguration>,
    backend: Option<wgpu::Backend>,
    size: PhysicalSize<u32>,
    window: Option<Arc<Window>>,
    title: String,
    vsync: bool,
    present_modes: Vec<wgpu::PresentMode>,
    frame_index: u64,
    view_counter: u16,
    arena: FrameArena,
    passes: NameTable,
    shader_defines: NameTable,
    scenes: HashMap<SceneId, RenderScene>,
    next_scene_id: u64,
    pending: Vec<wgpu::CommandBuffer>,
    blit: Option<SurfaceBlit>,
    #[cfg(test)]
    resize_invocations: usize,
    #[cfg(test)]
    surface_error_injector: Option<wgpu::SurfaceError>,
}

impl RenderDevice {
    pub fn new(window_cfg: &WindowConfig) -> Self {
        Self {
            surface: None,
            device: None,
            queue: None,
            config: None,
            backend: None,
            size: PhysicalSize::new(window_cfg.width, window_cfg.height),
            window: None,
            title: window_cfg.title.clone(),
            vsync: window_cfg.vsync,
            present_modes: Vec::new(),
            frame_index: 0,
            view_counter: 0,
            arena: FrameArena::new(),
            passes: NameTable::new(),
            shader_defines: NameTable::new(),
            scenes: HashMap::new(),
            next_scene_id: 1,
            pending: Vec::new(),
            blit: None,
            #[cfg(test)]
            resize_invocations: 0,
            #[cfg(test)]
            surface_error_injector: None,
        }
    }

    /// Creates the window and brings up the GPU behind it. Idempotent; the
    /// event loop calls this on every `resumed`.
    pub fn ensure_window(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        if self.window.is_some() {
            return Ok(());
        }
        let attrs =
            Window::default_attributes().with_title(self.title.clone()).with_inner_size(self.size);
        let window = Arc::new(event_loop.create_window(attrs).context("Failed to create window")?);
        pollster::block_on(self.init_wgpu(&window))?;
        let inner = window.inner_size();
        if inner.width > 0 && inner.height > 0 && inner != self.size {
            self.resize(inner);
        }
        self.window = Some(window);
        Ok(())
    }

    /// GPU without a window, for capture tools and tests.
    pub async fn init_headless(&mut self) -> Result<()> {
        if self.device.is_some() {
            return Ok(());
        }
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .context("Failed to request headless adapter")?;
        self.backend = Some(adapter.get_info().backend);
        let device_desc = wgpu::DeviceDescriptor {
            label: Some("Headless Device"),
            required_features: wgpu::Features::empty(),
            required_limits: adapter.limits(),
            experimental_features: wgpu::ExperimentalFeatures::default(),
            memory_hints: wgpu::MemoryHints::default(),
            trace: wgpu::Trace::default(),
        };
        let (device, queue) =
            adapter.request_device(&device_desc).await.context("Failed to request headless device")?;
        install_fatal_handler(&device);
        self.device = Some(device);
        self.queue = Some(queue);
        if self.config.is_none() {
            self.config = Some(wgpu::SurfaceConfiguration {
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                format: wgpu::TextureFormat::Bgra8UnormSrgb,
                width: self.size.width.max(1),
                height: self.size.height.max(1),
                present_mode: wgpu::PresentMode::Fifo,
                alpha_mode: wgpu::CompositeAlphaMode::Opaque,
                view_formats: vec![],
                desired_maximum_frame_latency: 2,
            });
        }
        Ok(())
    }

    async fn init_wgpu(&mut self, window: &Arc<Window>) -> Result<()> {
        let instance = wgpu::Instance::default();
        let surface = instance.create_surface(window.clone()).context("Failed to create WGPU surface")?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("Failed to request WGPU adapter")?;
        let info = adapter.get_info();
        log::info!("render backend: {:?} on {}", info.backend, info.name);
        self.backend = Some(info.backend);
        let device_desc = wgpu::DeviceDescriptor {
            label: Some("Device"),
            required_features: wgpu::Features::empty(),
            required_limits: adapter.limits(),
            experimental_features: wgpu::ExperimentalFeatures::default(),
            memory_hints: wgpu::MemoryHints::default(),
            trace: wgpu::Trace::default(),
        };
        let (device, queue) =
            adapter.request_device(&device_desc).await.context("Failed to request WGPU device")?;
        install_fatal_handler(&device);

        let caps = surface.get_capabilities(&adapter);
        let format = Self::choose_surface_format(&caps.formats);
        let size = window.inner_size();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: self.select_present_mode(&caps.present_modes),
            alpha_mode: caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        self.surface = Some(surface);
        self.device = Some(device);
        self.queue = Some(queue);
        self.config = Some(config);
        self.present_modes = caps.present_modes.clone();
        Ok(())
    }

    pub fn device(&self) -> Result<&wgpu::Device> {
        self.device.as_ref().context("GPU device not initialized")
    }

    pub fn queue(&self) -> Result<&wgpu::Queue> {
        self.queue.as_ref().context("GPU queue not initialized")
    }

    pub fn is_initialized(&self) -> bool {
        self.device.is_some()
    }

    pub fn surface_format(&self) -> Result<wgpu::TextureFormat> {
        Ok(self.config.as_ref().context("Surface configuration missing")?.format)
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    pub fn window(&self) -> Option<&Window> {
        self.window.as_deref()
    }

    pub fn shared_window(&self) -> Option<Arc<Window>> {
        self.window.clone()
    }

    pub fn vsync_enabled(&self) -> bool {
        self.vsync
    }

    pub fn set_vsync(&mut self, enabled: bool) -> Result<()> {
        if self.vsync == enabled {
            return Ok(());
        }
        self.vsync = enabled;
        self.reconfigure_present_mode()
    }

    /// Reports which corner the backend treats as texture origin. Only OpenGL
    /// style backends are bottom-left; everything else, including the
    /// uninitialized state, is top-left.
    pub fn texture_origin(&self) -> TextureOrigin {
        self.backend.map(origin_for_backend).unwrap_or(TextureOrigin::TopLeft)
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.size = new_size;
        #[cfg(test)]
        {
            self.resize_invocations = self.resize_invocations.saturating_add(1);
        }
        if new_size.width > 0 && new_size.height > 0 {
            if let Some(config) = self.config.as_mut() {
                config.width = new_size.width;
                config.height = new_size.height;
                if let Err(err) = self.configure_surface() {
                    log::warn!("surface resize failed: {err:?}");
                }
            }
        }
    }

    pub fn acquire_surface_frame(&mut self) -> Result<SurfaceFrame> {
        #[cfg(test)]
        if let Some(err) = self.surface_error_injector.take() {
            return Err(self.handle_surface_error(&err));
        }
        if let Some(surface) = self.surface.as_ref() {
            match surface.get_current_texture() {
                Ok(frame) => Ok(SurfaceFrame::new(frame)),
                Err(err) => Err(self.handle_surface_error(&err)),
            }
        } else {
            Err(anyhow!("Surface not initialized"))
        }
    }

    fn handle_surface_error(&mut self, error: &wgpu::SurfaceError) -> anyhow::Error {
        match Self::surface_error_action(error) {
            SurfaceErrorAction::Reconfigure => {
                self.resize(self.size);
                anyhow!("Surface lost or outdated; reconfigured surface")
            }
            SurfaceErrorAction::Retry => anyhow!("Surface acquisition timed out"),
            SurfaceErrorAction::OutOfMemory => anyhow!("Surface out of memory"),
            SurfaceErrorAction::Unknown => anyhow!("Surface reported an unknown error"),
        }
    }

    fn surface_error_action(error: &wgpu::SurfaceError) -> SurfaceErrorAction {
        match error {
            wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => SurfaceErrorAction::Reconfigure,
            wgpu::SurfaceError::Timeout => SurfaceErrorAction::Retry,
            wgpu::SurfaceError::OutOfMemory => SurfaceErrorAction::OutOfMemory,
            wgpu::SurfaceError::Other => SurfaceErrorAction::Unknown,
        }
    }

    fn configure_surface(&mut self) -> Result<()> {
        let surface = self.surface.as_ref().context("Surface not initialized")?;
        let device = self.device.as_ref().context("GPU device not initialized")?;
        let config = self.config.as_mut().context("Surface configuration missing")?;
        surface.configure(device, config);
        Ok(())
    }

    fn select_present_mode(&self, modes: &[wgpu::PresentMode]) -> wgpu::PresentMode {
        if self.vsync {
            wgpu::PresentMode::Fifo
        } else {
            modes
                .iter()
                .copied()
                .find(|mode| *mode != wgpu::PresentMode::Fifo)
                .unwrap_or(wgpu::PresentMode::Fifo)
        }
    }

    fn choose_surface_format(formats: &[wgpu::TextureFormat]) -> wgpu::TextureFormat {
        formats.iter().copied().find(|f| f.is_srgb()).unwrap_or(formats[0])
    }

    fn reconfigure_present_mode(&mut self) -> Result<()> {
        if self.surface.is_none() {
            return Ok(());
        }
        let modes: &[wgpu::PresentMode] = if self.present_modes.is_empty() {
            &DEFAULT_PRESENT_MODES
        } else {
            self.present_modes.as_slice()
        };
        let present_mode = self.select_present_mode(modes);
        {
            let config = self.config.as_mut().context("Surface configuration missing")?;
            config.present_mode = present_mode;
        }
        self.configure_surface()
    }

    // --- scenes ---------------------------------------------------------

    /// Creates a scene bound to `world` and returns its id. The device owns
    /// the scene until [`RenderDevice::destroy_scene`]; callers hold only ids,
    /// so a stale handle can never dangle.
    pub fn create_scene(&mut self, world: WorldId) -> SceneId {
        let id = SceneId(self.next_scene_id);
        self.next_scene_id += 1;
        self.scenes.insert(id, RenderScene::new(world));
        log::debug!("created {id} for {world}");
        id
    }

    /// Drops the scene if it still exists. Safe to call with an id that was
    /// already destroyed.
    pub fn destroy_scene(&mut self, id: SceneId) -> bool {
        let removed = self.scenes.remove(&id).is_some();
        if removed {
            log::debug!("destroyed {id}");
        }
        removed
    }

    pub fn scene(&self, id: SceneId) -> Option<&RenderScene> {
        self.scenes.get(&id)
    }

    pub fn scene_mut(&mut self, id: SceneId) -> Option<&mut RenderScene> {
        self.scenes.get_mut(&id)
    }

    pub fn scene_count(&self) -> usize {
        self.scenes.len()
    }

    // --- per-frame state ------------------------------------------------

    /// Next free view slot this frame. Slots order passes within a frame and
    /// reset when the frame ends.
    pub fn allocate_view(&mut self) -> u16 {
        let view = self.view_counter;
        self.view_counter += 1;
        view
    }

    pub fn views_allocated(&self) -> u16 {
        self.view_counter
    }

    /// Interns a pass name; the same name always yields the same index and
    /// new names get the next index up.
    pub fn pass_idx(&mut self, name: &str) -> u16 {
        self.passes.intern(name) as u16
    }

    pub fn pass_name(&self, idx: u16) -> Option<&str> {
        self.passes.name(idx as usize)
    }

    /// Interns a shader define. Indices are `u8` with a fixed table cap, so
    /// running out is a programming error, not a runtime condition.
    pub fn shader_define_idx(&mut self, name: &str) -> u8 {
        if self.shader_defines.lookup(name).is_none() && self.shader_defines.len() >= MAX_SHADER_DEFINES {
            panic!("too many shader defines: {MAX_SHADER_DEFINES} slots, tried to add '{name}'");
        }
        self.shader_defines.intern(name) as u8
    }

    pub fn shader_define(&self, idx: u8) -> Option<&str> {
        self.shader_defines.name(idx as usize)
    }

    pub fn arena(&self) -> &FrameArena {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut FrameArena {
        &mut self.arena
    }

    /// Queues finished command buffers for submission at the next [`frame`].
    ///
    /// [`frame`]: RenderDevice::frame
    pub fn queue_commands(&mut self, commands: wgpu::CommandBuffer) {
        self.pending.push(commands);
    }

    pub fn pending_command_count(&self) -> usize {
        self.pending.len()
    }

    /// Advances the device one frame: submits everything queued since the
    /// last call, then resets the view counter and the frame arena. Returns
    /// the number of frames completed so far.
    pub fn frame(&mut self) -> u64 {
        if !self.pending.is_empty() {
            if let Some(queue) = self.queue.as_ref() {
                queue.submit(self.pending.drain(..));
            } else {
                log::error!("dropping {} command buffers: no GPU queue", self.pending.len());
                self.pending.clear();
            }
        }
        self.frame_index += 1;
        self.view_counter = 0;
        self.arena.reset();
        self.frame_index
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    // --- readback -------------------------------------------------------

    /// Copies a GPU texture into an RGBA image. Blocks until the copy lands;
    /// capture-tool plumbing, not a per-frame path.
    pub fn read_texture_rgba(&self, texture: &wgpu::Texture) -> Result<image::RgbaImage> {
        match texture.format() {
            wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Rgba8UnormSrgb => {}
            other => return Err(anyhow!("readback expects an rgba8 texture, got {other:?}")),
        }
        let device = self.device()?;
        let queue = self.queue()?;
        let width = texture.width();
        let height = texture.height();
        if width == 0 || height == 0 {
            return Err(anyhow!("readback of zero-sized texture"));
        }
        let unpadded_bytes_per_row = 4 * width;
        let padded_bytes_per_row =
            unpadded_bytes_per_row.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT) * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Buffer"),
            size: padded_bytes_per_row as u64 * height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder =
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Readback Encoder") });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        );
        queue.submit(Some(encoder.finish()));

        let slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device.poll(wgpu::PollType::wait_indefinitely()).context("Failed to wait for GPU readback")?;
        rx.recv()
            .context("GPU readback channel closed")?
            .context("Failed to map readback buffer")?;

        let mapped = slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((unpadded_bytes_per_row * height) as usize);
        for row in mapped.chunks(padded_bytes_per_row as usize) {
            pixels.extend_from_slice(&row[..unpadded_bytes_per_row as usize]);
        }
        drop(mapped);
        buffer.unmap();
        image::RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow!("readback produced a short pixel buffer"))
    }

    pub fn save_screenshot(&self, texture: &wgpu::Texture, path: &Path) -> Result<()> {
        let image = self.read_texture_rgba(texture)?;
        image.save(path).with_context(|| format!("Failed to write screenshot {}", path.display()))?;
        log::info!("wrote screenshot {}", path.display());
        Ok(())
    }

    // --- surface composition --------------------------------------------

    /// Draws the UI on top of the acquired surface frame. The encoder is
    /// queued, so the draw lands with the next [`RenderDevice::frame`].
    #[cfg(feature = "editor")]
    pub fn render_egui(
        &mut self,
        renderer: &mut egui_wgpu::Renderer,
        frame_view: &wgpu::TextureView,
        paint_jobs: &[egui::ClippedPrimitive],
        screen: &egui_wgpu::ScreenDescriptor,
    ) -> Result<()> {
        let device = self.device()?.clone();
        let queue = self.queue()?.clone();
        let mut encoder =
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Egui Encoder") });
        let mut commands = renderer.update_buffers(&device, &queue, &mut encoder, paint_jobs, screen);
        {
            let mut pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Egui Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: frame_view,
                        depth_slice: None,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color {
                                r: 0.06,
                                g: 0.065,
                                b: 0.08,
                                a: 1.0,
                            }),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                })
                .forget_lifetime();
            renderer.render(&mut pass, paint_jobs, screen);
        }
        commands.push(encoder.finish());
        self.pending.extend(commands);
        Ok(())
    }

    /// Stretches a rendered framebuffer over the surface frame, flipping
    /// vertically when the backend origin calls for it. Runtime-window path;
    /// the editor composes through the UI instead.
    pub fn blit_to_surface(
        &mut self,
        resources: &mut crate::resources::ResourceHub,
        source: &wgpu::TextureView,
        frame_view: &wgpu::TextureView,
    ) -> Result<()> {
        let flip = self.texture_origin() == TextureOrigin::BottomLeft;
        self.ensure_blit(resources)?;
        let device = self.device()?.clone();
        let queue = self.queue()?.clone();
        let blit = self.blit.as_ref().context("blit pipeline missing")?;
        queue.write_buffer(&blit.params, 0, bytemuck::bytes_of(&BlitParamsRaw::new(flip)));
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Surface Blit"),
            layout: &blit.layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(source) },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::Sampler(&blit.sampler) },
                wgpu::BindGroupEntry { binding: 2, resource: blit.params.as_entire_binding() },
            ],
        });
        let mut encoder =
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Blit Encoder") });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Surface Blit Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: frame_view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&blit.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        self.pending.push(encoder.finish());
        Ok(())
    }

    fn ensure_blit(&mut self, resources: &mut crate::resources::ResourceHub) -> Result<()> {
        if self.blit.is_some() {
            return Ok(());
        }
        let format = self.surface_format()?;
        let shader = resources.shaders.module(crate::resources::SURFACE_BLIT_SHADER)?;
        let device = self.device()?;
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Surface Blit Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Surface Blit Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Surface Blit Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Surface Blit Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let params = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Surface Blit Params"),
            size: std::mem::size_of::<BlitParamsRaw>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.blit = Some(SurfaceBlit { pipeline, layout, sampler, params });
        Ok(())
    }

    #[cfg(test)]
    pub fn resize_invocations_for_test(&self) -> usize {
        self.resize_invocations
    }

    #[cfg(test)]
    pub fn inject_surface_error_for_test(&mut self, error: wgpu::SurfaceError) {
        self.surface_error_injector = Some(error);
    }
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct BlitParamsRaw {
    flip_y: u32,
    _pad: [u32; 3],
}

impl BlitParamsRaw {
    fn new(flip: bool) -> Self {
        Self { flip_y: flip as u32, _pad: [0; 3] }
    }
}

fn origin_for_backend(backend: wgpu::Backend) -> TextureOrigin {
    match backend {
        wgpu::Backend::Gl => TextureOrigin::BottomLeft,
        _ => TextureOrigin::TopLeft,
    }
}

/// Two failure tiers: validation is a programmer error and trips a debug
/// break (panic) in debug builds, while device loss conditions abort outright.
fn install_fatal_handler(device: &wgpu::Device) {
    device.on_uncaptured_error(Arc::new(|error| match error {
        wgpu::Error::Validation { description, .. } => {
            log::error!("GPU validation failure: {description}");
            if cfg!(debug_assertions) {
                panic!("GPU validation failure: {description}");
            }
            std::process::abort();
        }
        wgpu::Error::OutOfMemory { .. } => {
            log::error!("GPU out of memory");
            std::process::abort();
        }
        wgpu::Error::Internal { description, .. } => {
            log::error!("GPU internal error: {description}");
            std::process::abort();
        }
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WindowConfig;

    fn device() -> RenderDevice {
        RenderDevice::new(&WindowConfig::default())
    }

    #[test]
    fn pass_indices_are_stable_and_increasing() {
        let mut dev = device();
        let sky = dev.pass_idx("sky");
        let opaque = dev.pass_idx("opaque");
        assert_eq!(sky, 0);
        assert_eq!(opaque, 1);
        assert_eq!(dev.pass_idx("sky"), sky);
        assert_eq!(dev.pass_name(opaque), Some("opaque"));
        assert_eq!(dev.pass_name(9), None);
    }

    #[test]
    fn shader_defines_round_trip() {
        let mut dev = device();
        let fog = dev.shader_define_idx("FOG");
        let skinned = dev.shader_define_idx("SKINNED");
        assert_eq!((fog, skinned), (0, 1));
        assert_eq!(dev.shader_define_idx("FOG"), fog);
        assert_eq!(dev.shader_define(skinned), Some("SKINNED"));
    }

    #[test]
    fn pass_and_define_tables_do_not_share_indices() {
        let mut dev = device();
        assert_eq!(dev.pass_idx("sky"), 0);
        assert_eq!(dev.shader_define_idx("FOG"), 0);
        assert_eq!(dev.pass_idx("opaque"), 1);
        assert_eq!(dev.shader_define_idx("FOG"), 0);
        assert_eq!(dev.shader_define_idx("SKINNED"), 1);
        assert_eq!(dev.pass_idx("sky"), 0);
        assert_eq!(dev.pass_name(1), Some("opaque"));
        assert_eq!(dev.shader_define(1), Some("SKINNED"));
    }

    #[test]
    #[should_panic(expected = "too many shader defines")]
    fn shader_define_table_is_capped() {
        let mut dev = device();
        for i in 0..MAX_SHADER_DEFINES {
            dev.shader_define_idx(&format!("DEFINE_{i}"));
        }
        dev.shader_define_idx("ONE_TOO_MANY");
    }

    #[test]
    fn scene_registry_hands_out_unique_ids() {
        let mut dev = device();
        let a = dev.create_scene(WorldId(1));
        let b = dev.create_scene(WorldId(2));
        assert_ne!(a, b);
        assert_eq!(dev.scene_count(), 2);
        assert!(dev.scene(a).is_some());
        assert!(dev.destroy_scene(a));
        assert!(!dev.destroy_scene(a), "double destroy is a no-op");
        assert!(dev.scene(a).is_none());
        assert_eq!(dev.scene_count(), 1);
    }

    #[test]
    fn frame_resets_views_and_arena() {
        let mut dev = device();
        assert_eq!(dev.allocate_view(), 0);
        assert_eq!(dev.allocate_view(), 1);
        let _ = dev.arena_mut().alloc_slice::<u32>(16);
        assert!(dev.arena().used() > 0);
        assert_eq!(dev.frame(), 1);
        assert_eq!(dev.views_allocated(), 0);
        assert_eq!(dev.arena().used(), 0);
        assert_eq!(dev.allocate_view(), 0, "view slots restart after the frame");
        assert_eq!(dev.frame(), 2);
    }

    #[test]
    fn lost_surface_triggers_reconfigure() {
        let mut dev = device();
        dev.inject_surface_error_for_test(wgpu::SurfaceError::Lost);
        let err = dev.acquire_surface_frame().unwrap_err();
        assert!(err.to_string().contains("reconfigured"));
        assert_eq!(dev.resize_invocations_for_test(), 1);

        dev.inject_surface_error_for_test(wgpu::SurfaceError::Timeout);
        let err = dev.acquire_surface_frame().unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert_eq!(dev.resize_invocations_for_test(), 1, "timeout must not reconfigure");
    }

    #[test]
    fn origin_depends_on_backend() {
        assert_eq!(origin_for_backend(wgpu::Backend::Gl), TextureOrigin::BottomLeft);
        assert_eq!(origin_for_backend(wgpu::Backend::Vulkan), TextureOrigin::TopLeft);
        assert_eq!(origin_for_backend(wgpu::Backend::Metal), TextureOrigin::TopLeft);
        assert_eq!(device().texture_origin(), TextureOrigin::TopLeft);
    }
}
