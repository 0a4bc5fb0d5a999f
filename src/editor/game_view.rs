use egui::load::SizedTexture;

use crate::config::RenderConfig;
use crate::device::{RenderDevice, TextureOrigin};
use crate::events::{WorldEvent, WorldEvents, WorldSubscription};
use crate::host::EditorHost;
use crate::input::{CaptureSink, InputSystem};
use crate::pipeline::RenderPipeline;
use crate::resources::ResourceHub;
use crate::scene::SceneId;

/// Registers render-target views as egui textures. Implemented over
/// `egui_wgpu::Renderer` in the app shell; tests substitute a counter.
pub trait FrameBlit {
    fn register(&mut self, device: &wgpu::Device, view: &wgpu::TextureView) -> egui::TextureId;
    fn free(&mut self, id: egui::TextureId);
}

pub struct EguiBlit<'a> {
    pub renderer: &'a mut egui_wgpu::Renderer,
}

impl FrameBlit for EguiBlit<'_> {
    fn register(&mut self, device: &wgpu::Device, view: &wgpu::TextureView) -> egui::TextureId {
        self.renderer.register_native_texture(device, view, wgpu::FilterMode::Linear)
    }

    fn free(&mut self, id: egui::TextureId) {
        self.renderer.free_texture(&id);
    }
}

/// Everything the panel needs from the shell for one tick.
pub struct GameViewDeps<'a> {
    pub device: &'a mut RenderDevice,
    pub resources: &'a mut ResourceHub,
    pub host: &'a mut dyn EditorHost,
    pub input: &'a mut InputSystem,
    pub capture: &'a mut dyn CaptureSink,
    pub blit: &'a mut dyn FrameBlit,
}

/// What a single [`GameView::show`] tick did, for the shell and for tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GameViewOutput {
    pub events_handled: usize,
    pub skipped_not_ready: bool,
    pub released_capture: bool,
    pub acquired_capture: bool,
    pub viewport: Option<(u32, u32)>,
    pub displayed: bool,
    pub controls_drawn: bool,
}

struct DisplayTexture {
    generation: u64,
    id: egui::TextureId,
}

/// Editor panel that displays the render pipeline output and owns mouse
/// capture for in-panel play. The image widget is recorded before this tick's
/// scene render is queued, but both land in the same submit with the scene
/// passes first, so the panel shows the frame being rendered.
pub struct GameView {
    pub open: bool,
    pipeline: RenderPipeline,
    subscription: Option<WorldSubscription>,
    mouse_captured: bool,
    display: Option<DisplayTexture>,
}

impl GameView {
    /// Subscribes to world lifecycle events and binds the already-active
    /// scene, if any, so a panel opened mid-session starts displaying without
    /// waiting for the next world change.
    pub fn new(render_cfg: &RenderConfig, events: &mut WorldEvents, active: Option<SceneId>) -> Self {
        let mut pipeline = RenderPipeline::new(&render_cfg.pipeline_path, &render_cfg.camera_slot);
        pipeline.set_scene(active);
        Self {
            open: true,
            pipeline,
            subscription: Some(events.subscribe()),
            mouse_captured: false,
            display: None,
        }
    }

    /// Unsubscribes and frees the display texture. Must run before the egui
    /// renderer goes away; calling it twice is harmless.
    pub fn shutdown(&mut self, events: &mut WorldEvents, blit: &mut dyn FrameBlit) {
        if let Some(subscription) = self.subscription.take() {
            events.unsubscribe(subscription.id());
        }
        if let Some(display) = self.display.take() {
            blit.free(display.id);
        }
    }

    pub fn pipeline(&self) -> &RenderPipeline {
        &self.pipeline
    }

    pub fn mouse_captured(&self) -> bool {
        self.mouse_captured
    }

    /// Toggles mouse capture. A repeated request is a no-op, so the input
    /// reset and cursor side effects fire exactly once per actual change.
    pub fn set_mouse_capture(
        &mut self,
        capture: bool,
        input: &mut InputSystem,
        sink: &mut dyn CaptureSink,
    ) {
        if self.mouse_captured == capture {
            return;
        }
        self.mouse_captured = capture;
        input.set_enabled(capture);
        sink.set_cursor_visible(!capture);
        sink.set_relative_mode(capture);
    }

    /// Runs the panel for one UI tick.
    pub fn show(&mut self, ctx: &egui::Context, deps: &mut GameViewDeps<'_>) -> GameViewOutput {
        let mut out = GameViewOutput::default();

        // Rebind first so a destroyed scene is dropped even while hidden.
        out.events_handled = self.handle_world_events();

        if !self.pipeline.ensure_ready(deps.resources) {
            out.skipped_not_ready = true;
            return out;
        }

        let escape = ctx.input(|i| i.key_pressed(egui::Key::Escape));
        let focused = ctx.input(|i| i.raw.focused);
        if self.mouse_captured
            && (escape || !deps.host.play_state().is_playing() || !focused || !self.open)
        {
            self.set_mouse_capture(false, deps.input, deps.capture);
            out.released_capture = true;
        }
        if !self.open {
            return out;
        }

        let title = if self.mouse_captured { "Game View (mouse captured)" } else { "Game View" };
        let mut open = self.open;
        let mut image_response: Option<egui::Response> = None;
        egui::Window::new(title)
            .id(egui::Id::new("game_view"))
            .open(&mut open)
            .default_size(egui::vec2(640.0, 420.0))
            .show(ctx, |ui| {
                // One text line stays reserved for the controls row below the image.
                let reserved = ui.text_style_height(&egui::TextStyle::Body) + ui.spacing().item_spacing.y;
                let Some((width, height)) = viewport_from_available(ui.available_size(), reserved)
                else {
                    return;
                };
                out.viewport = Some((width, height));
                self.pipeline.set_viewport(width, height);

                match deps.device.device() {
                    Ok(gpu) => {
                        let gpu = gpu.clone();
                        self.pipeline.ensure_targets(&gpu);
                        if let Some(id) = self.ensure_display_texture(&gpu, deps.blit) {
                            let size = egui::vec2(width as f32, height as f32);
                            let image = egui::Image::new(SizedTexture::new(id, size))
                                .uv(display_uv(deps.device.texture_origin()))
                                .sense(egui::Sense::click());
                            image_response = Some(ui.add(image));
                            out.displayed = true;
                        }
                    }
                    Err(err) => log::warn!("game view has no display device: {err:#}"),
                }

                match self.pipeline.render(deps.device, deps.resources) {
                    Ok(_) => {}
                    Err(err) => log::warn!("game view render failed: {err:#}"),
                }

                ui.horizontal(|ui| {
                    let mut paused = deps.host.is_paused();
                    if ui.checkbox(&mut paused, "Pause").changed() {
                        deps.host.set_paused(paused);
                    }
                    if paused && ui.button("Next frame").clicked() {
                        deps.host.request_step();
                    }
                    ui.label("Time multiplier");
                    let mut scale = deps.host.time_scale();
                    let response = ui.add(
                        egui::DragValue::new(&mut scale)
                            .speed(0.01)
                            .range(crate::time::MIN_TIME_MULTIPLIER..=crate::time::MAX_TIME_MULTIPLIER),
                    );
                    if response.changed() {
                        deps.host.set_time_scale(scale);
                    }
                });
                out.controls_drawn = true;
            });
        self.open = open;

        // The controls can change the host state, so re-check before keeping
        // the capture for another tick.
        if self.mouse_captured && (escape || !deps.host.play_state().is_playing()) {
            self.set_mouse_capture(false, deps.input, deps.capture);
            out.released_capture = true;
        }

        if let Some(response) = &image_response {
            let primary_pressed = ctx.input(|i| i.pointer.primary_pressed());
            if !self.mouse_captured
                && deps.host.play_state().is_playing()
                && response.hovered()
                && primary_pressed
            {
                self.set_mouse_capture(true, deps.input, deps.capture);
                out.acquired_capture = true;
            }
        }
        out
    }

    fn handle_world_events(&mut self) -> usize {
        let Some(subscription) = &self.subscription else {
            return 0;
        };
        let events = subscription.drain();
        let handled = events.len();
        for event in events {
            match event {
                WorldEvent::Created { scene, .. } => self.pipeline.set_scene(Some(scene)),
                WorldEvent::Destroyed { .. } => self.pipeline.set_scene(None),
            }
        }
        handled
    }

    /// Keeps the egui texture registration in step with the output
    /// framebuffer, re-registering whenever its generation changes.
    fn ensure_display_texture(
        &mut self,
        gpu: &wgpu::Device,
        blit: &mut dyn FrameBlit,
    ) -> Option<egui::TextureId> {
        let framebuffer = self.pipeline.output()?;
        if let Some(display) = &self.display {
            if display.generation == framebuffer.generation {
                return Some(display.id);
            }
        }
        let id = blit.register(gpu, &framebuffer.color_view);
        let generation = framebuffer.generation;
        if let Some(old) = self.display.replace(DisplayTexture { generation, id }) {
            blit.free(old.id);
        }
        Some(id)
    }
}

fn viewport_from_available(available: egui::Vec2, reserved: f32) -> Option<(u32, u32)> {
    let width = available.x.floor();
    let height = (available.y - reserved).floor();
    if width >= 1.0 && height >= 1.0 {
        Some((width as u32, height as u32))
    } else {
        None
    }
}

fn display_uv(origin: TextureOrigin) -> egui::Rect {
    match origin {
        TextureOrigin::TopLeft => {
            egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0))
        }
        // Flip V so the first texture row lands at the bottom of the widget.
        TextureOrigin::BottomLeft => {
            egui::Rect::from_min_max(egui::pos2(0.0, 1.0), egui::pos2(1.0, 0.0))
        }
    }
}
