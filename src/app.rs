use anyhow::{Context, Result};
use winit::application::ApplicationHandler;
use winit::event::{DeviceEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};

use crate::config::{AppConfig, AppConfigOverrides};
use crate::device::RenderDevice;
use crate::input::{InputEvent, InputSystem};
use crate::reflect::{register_render_components, PropertyRegistry};
use crate::resources::ResourceHub;

#[cfg(feature = "editor")]
use crate::editor::game_view::{EguiBlit, GameView, GameViewDeps};
#[cfg(feature = "editor")]
use crate::editor::inspector::Inspector;
#[cfg(feature = "editor")]
use crate::editor::EditorState;
#[cfg(feature = "editor")]
use crate::host::{EditorHost, PlayState};
#[cfg(feature = "editor")]
use crate::input::WindowCaptureSink;
#[cfg(feature = "editor")]
use egui_wgpu::{Renderer as EguiRenderer, RendererOptions, ScreenDescriptor};
#[cfg(feature = "editor")]
use egui_winit::State as EguiWinit;
#[cfg(feature = "editor")]
use std::sync::Arc;
#[cfg(feature = "editor")]
use winit::window::Window;

#[cfg(not(feature = "editor"))]
use crate::pipeline::RenderPipeline;
#[cfg(not(feature = "editor"))]
use crate::scene::SceneId;
#[cfg(not(feature = "editor"))]
use crate::scene::WorldId;
#[cfg(not(feature = "editor"))]
use crate::time::SimulationClock;

const APP_CONFIG_PATH: &str = "shrike.json";

pub async fn run() -> Result<()> {
    run_with_overrides(AppConfigOverrides::default()).await
}

/// Loads the configuration, applies command line overrides and drives the
/// winit event loop until the app closes.
pub async fn run_with_overrides(overrides: AppConfigOverrides) -> Result<()> {
    let mut config = AppConfig::load_or_default(APP_CONFIG_PATH);
    config.apply_overrides(&overrides);
    let event_loop = EventLoop::new().context("Failed to create winit event loop")?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app).context("Event loop execution failed")?;
    Ok(())
}

pub struct App {
    config: AppConfig,
    device: RenderDevice,
    resources: ResourceHub,
    registry: PropertyRegistry,
    input: InputSystem,
    should_close: bool,
    #[cfg(feature = "editor")]
    editor: EditorState,
    #[cfg(feature = "editor")]
    egui_ctx: egui::Context,
    #[cfg(feature = "editor")]
    egui_winit: Option<EguiWinit>,
    #[cfg(feature = "editor")]
    egui_renderer: Option<EguiRenderer>,
    #[cfg(feature = "editor")]
    game_view: Option<GameView>,
    #[cfg(feature = "editor")]
    inspector: Inspector,
    #[cfg(not(feature = "editor"))]
    clock: SimulationClock,
    #[cfg(not(feature = "editor"))]
    scene: Option<SceneId>,
    #[cfg(not(feature = "editor"))]
    pipeline: RenderPipeline,
}

impl App {
    pub fn new(config: AppConfig) -> Self {
        let device = RenderDevice::new(&config.window);
        let mut registry = PropertyRegistry::new();
        register_render_components(&mut registry);
        #[cfg(not(feature = "editor"))]
        let pipeline = RenderPipeline::new(&config.render.pipeline_path, &config.render.camera_slot);
        Self {
            config,
            device,
            resources: ResourceHub::new(),
            registry,
            input: InputSystem::new(),
            should_close: false,
            #[cfg(feature = "editor")]
            editor: EditorState::new(),
            #[cfg(feature = "editor")]
            egui_ctx: egui::Context::default(),
            #[cfg(feature = "editor")]
            egui_winit: None,
            #[cfg(feature = "editor")]
            egui_renderer: None,
            #[cfg(feature = "editor")]
            game_view: None,
            #[cfg(feature = "editor")]
            inspector: Inspector::new(),
            #[cfg(not(feature = "editor"))]
            clock: SimulationClock::new(),
            #[cfg(not(feature = "editor"))]
            scene: None,
            #[cfg(not(feature = "editor"))]
            pipeline,
        }
    }

    fn init_gpu_resources(&mut self) -> Result<()> {
        let device = self.device.device()?.clone();
        let queue = self.device.queue()?.clone();
        self.resources.set_device(&device, &queue);
        Ok(())
    }

    #[cfg(feature = "editor")]
    fn init_editor(&mut self) -> Result<()> {
        if self.egui_winit.is_none() {
            let window = self.device.window().context("Window missing after init")?;
            self.egui_winit = Some(EguiWinit::new(
                self.egui_ctx.clone(),
                egui::ViewportId::ROOT,
                window,
                None,
                window.theme(),
                None,
            ));
        }
        if self.egui_renderer.is_none() {
            let format = self.device.surface_format()?;
            let device = self.device.device()?;
            self.egui_renderer = Some(EguiRenderer::new(device, format, RendererOptions::default()));
        }
        if self.editor.active_world().is_none() {
            self.editor.create_world(&mut self.device);
        }
        if self.game_view.is_none() {
            let active_scene = self.editor.active_scene();
            self.game_view = Some(GameView::new(
                &self.config.render,
                &mut self.editor.events,
                active_scene,
            ));
        }
        Ok(())
    }

    #[cfg(not(feature = "editor"))]
    fn init_runtime(&mut self) {
        if self.scene.is_none() {
            let scene = self.device.create_scene(WorldId(1));
            if let Some(render_scene) = self.device.scene_mut(scene) {
                render_scene.populate_demo();
            }
            self.pipeline.set_scene(Some(scene));
            self.scene = Some(scene);
        }
    }

    #[cfg(feature = "editor")]
    fn frame(&mut self) {
        let dt = self.editor.advance_clock();
        if dt > 0.0 {
            if let Some(scene) = self.editor.active_scene() {
                if let Some(render_scene) = self.device.scene_mut(scene) {
                    render_scene.tick(dt);
                }
            }
        }
        if !self.device.is_initialized() {
            return;
        }

        let frame = match self.device.acquire_surface_frame() {
            Ok(frame) => frame,
            Err(err) => {
                log::debug!("skipping frame: {err}");
                return;
            }
        };

        let raw_input = {
            let Some(window) = self.device.window() else {
                return;
            };
            let Some(state) = self.egui_winit.as_mut() else {
                return;
            };
            state.take_egui_input(window)
        };
        let window = self.device.shared_window();

        let ctx = self.egui_ctx.clone();
        let full_output = ctx.run(raw_input, |ctx| self.editor_ui(ctx, window.clone()));

        if let (Some(window), Some(state)) = (self.device.window(), self.egui_winit.as_mut()) {
            state.handle_platform_output(window, full_output.platform_output);
        }

        let size = self.device.size();
        let screen = ScreenDescriptor {
            size_in_pixels: [size.width, size.height],
            pixels_per_point: self.egui_ctx.pixels_per_point(),
        };
        if let Some(renderer) = self.egui_renderer.as_mut() {
            if let (Ok(device), Ok(queue)) = (self.device.device(), self.device.queue()) {
                for (id, delta) in &full_output.textures_delta.set {
                    renderer.update_texture(device, queue, *id, delta);
                }
            }
            let meshes = self.egui_ctx.tessellate(full_output.shapes, screen.pixels_per_point);
            if let Err(err) = self.device.render_egui(renderer, frame.view(), &meshes, &screen) {
                log::error!("egui render failed: {err:?}");
            }
            for id in &full_output.textures_delta.free {
                renderer.free_texture(id);
            }
        }

        self.device.frame();
        frame.present();
        if let Some(window) = self.device.window() {
            window.request_redraw();
        }
        self.input.clear_frame();
    }

    /// Builds the whole editor UI for one tick: top bar, entity list, game
    /// view panel and inspector.
    #[cfg(feature = "editor")]
    fn editor_ui(&mut self, ctx: &egui::Context, window: Option<Arc<Window>>) {
        let sink = window.map(WindowCaptureSink::new);
        let mut toggle_play = false;
        let mut new_world = false;
        let mut destroy_world = false;
        let mut vsync = self.device.vsync_enabled();
        let mut vsync_changed = false;

        egui::TopBottomPanel::top("shrike_top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let playing = self.editor.play_state().is_playing();
                let play_label = if playing { "Stop" } else { "Play" };
                if ui.button(play_label).clicked() {
                    toggle_play = true;
                }
                ui.separator();
                if ui.button("New World").clicked() {
                    new_world = true;
                }
                if ui.button("Destroy World").clicked() {
                    destroy_world = true;
                }
                ui.separator();
                if let Some(game_view) = self.game_view.as_mut() {
                    ui.toggle_value(&mut game_view.open, "Game View");
                }
                ui.toggle_value(&mut self.inspector.open, "Inspector");
                ui.separator();
                if ui.checkbox(&mut vsync, "Enable VSync").changed() {
                    vsync_changed = true;
                }
                ui.separator();
                let state = match self.editor.play_state() {
                    PlayState::Editing => "editing".to_string(),
                    PlayState::Playing { paused: false } => "playing".to_string(),
                    PlayState::Playing { paused: true } => "paused".to_string(),
                };
                ui.label(format!("State: {state}  Frame arena: {} B", self.device.arena().used()));
            });
        });

        if toggle_play {
            if self.editor.play_state().is_playing() {
                self.editor.stop();
            } else {
                self.editor.play();
            }
        }
        if new_world {
            self.editor.create_world(&mut self.device);
        }
        if destroy_world {
            self.editor.destroy_world(&mut self.device);
        }
        if vsync_changed {
            if let Err(err) = self.device.set_vsync(vsync) {
                log::warn!("vsync change failed: {err:?}");
            }
        }

        egui::SidePanel::left("shrike_left_panel").default_width(260.0).show(ctx, |ui| {
            egui::CollapsingHeader::new("Entities").default_open(true).show(ui, |ui| {
                let Some(scene) = self.editor.active_scene() else {
                    ui.label("No world open.");
                    return;
                };
                let Some(render_scene) = self.device.scene_mut(scene) else {
                    ui.label("No world open.");
                    return;
                };
                egui::ScrollArea::vertical().max_height(420.0).show(ui, |ui| {
                    for (entity, name) in render_scene.list_named() {
                        let selected = self.editor.selected == Some(entity);
                        if ui.selectable_label(selected, name).clicked() {
                            self.editor.selected = if selected { None } else { Some(entity) };
                        }
                    }
                });
            });
            egui::CollapsingHeader::new("Stats").default_open(true).show(ui, |ui| {
                ui.label(format!("Frame: {}", self.device.frame_index()));
                ui.label(format!("Scenes: {}", self.device.scene_count()));
                if let Some(scene) = self.editor.active_scene() {
                    if let Some(render_scene) = self.device.scene(scene) {
                        ui.label(format!("Entities: {}", render_scene.entity_count()));
                    }
                }
                ui.label(format!("Time scale: {:.2}", self.editor.time_scale()));
            });
        });

        if let (Some(game_view), Some(renderer), Some(mut sink)) =
            (self.game_view.as_mut(), self.egui_renderer.as_mut(), sink)
        {
            let mut blit = EguiBlit { renderer };
            let mut deps = GameViewDeps {
                device: &mut self.device,
                resources: &mut self.resources,
                host: &mut self.editor,
                input: &mut self.input,
                capture: &mut sink,
                blit: &mut blit,
            };
            game_view.show(ctx, &mut deps);
        }

        let scene = self.editor.active_scene().and_then(|id| self.device.scene_mut(id));
        self.inspector.show(ctx, &self.registry, scene, self.editor.selected);
    }

    /// Runtime frame without the editor: tick, render the pipeline, blit its
    /// output to the window surface.
    #[cfg(not(feature = "editor"))]
    fn frame(&mut self) {
        let dt = self.clock.advance(true);
        if let Some(scene) = self.scene {
            if let Some(render_scene) = self.device.scene_mut(scene) {
                render_scene.tick(dt);
            }
        }
        if !self.device.is_initialized() {
            return;
        }
        let frame = match self.device.acquire_surface_frame() {
            Ok(frame) => frame,
            Err(err) => {
                log::debug!("skipping frame: {err}");
                return;
            }
        };
        let size = self.device.size();
        self.pipeline.set_viewport(size.width, size.height);
        match self.pipeline.render(&mut self.device, &mut self.resources) {
            Ok(_) => {
                if let Some(output) = self.pipeline.output() {
                    if let Err(err) = self.device.blit_to_surface(
                        &mut self.resources,
                        &output.color_view,
                        frame.view(),
                    ) {
                        log::error!("surface blit failed: {err:?}");
                    }
                }
            }
            Err(err) => log::error!("render failed: {err:?}"),
        }
        self.device.frame();
        frame.present();
        if let Some(window) = self.device.window() {
            window.request_redraw();
        }
        self.input.clear_frame();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let Err(err) = self.device.ensure_window(event_loop) {
            log::error!("window initialization failed: {err:?}");
            self.should_close = true;
            return;
        }
        if let Err(err) = self.init_gpu_resources() {
            log::error!("resource initialization failed: {err:?}");
            self.should_close = true;
            return;
        }
        #[cfg(feature = "editor")]
        if let Err(err) = self.init_editor() {
            log::error!("editor initialization failed: {err:?}");
            self.should_close = true;
            return;
        }
        #[cfg(not(feature = "editor"))]
        self.init_runtime();
        if let Some(window) = self.device.window() {
            window.request_redraw();
        }
    }

    fn window_event(&mut self, _el: &ActiveEventLoop, id: winit::window::WindowId, event: WindowEvent) {
        // egui wants the events too
        let mut consumed = false;
        let input_event = InputEvent::from_window_event(&event);
        let is_cursor_event = matches!(&input_event, InputEvent::CursorPos { .. });
        #[cfg(feature = "editor")]
        if let (Some(window), Some(state)) = (self.device.window(), self.egui_winit.as_mut()) {
            if id == window.id() {
                let resp = state.on_window_event(window, &event);
                if resp.consumed {
                    consumed = true;
                }
            }
        }
        #[cfg(not(feature = "editor"))]
        let _ = id;
        if !consumed || is_cursor_event {
            self.input.push(input_event);
        }
        if consumed {
            return;
        }

        match &event {
            WindowEvent::CloseRequested => self.should_close = true,
            WindowEvent::Resized(size) => self.device.resize(*size),
            _ => {}
        }
    }

    fn device_event(&mut self, _e: &ActiveEventLoop, _dev: winit::event::DeviceId, ev: DeviceEvent) {
        self.input.push(InputEvent::from_device_event(&ev));
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.should_close {
            #[cfg(feature = "editor")]
            if let (Some(mut game_view), Some(renderer)) =
                (self.game_view.take(), self.egui_renderer.as_mut())
            {
                let mut blit = EguiBlit { renderer };
                game_view.shutdown(&mut self.editor.events, &mut blit);
            }
            event_loop.exit();
            return;
        }
        self.frame();
    }
}
