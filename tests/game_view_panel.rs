#![cfg(feature = "editor")]

use shrike_render::config::{RenderConfig, WindowConfig};
use shrike_render::device::RenderDevice;
use shrike_render::editor::game_view::{FrameBlit, GameView, GameViewDeps};
use shrike_render::events::{WorldEvent, WorldEvents};
use shrike_render::host::{EditorHost, PlayState};
use shrike_render::input::{CaptureSink, InputEvent, InputSystem};
use shrike_render::resources::ResourceHub;
use shrike_render::scene::{SceneId, WorldId};

const SHIPPED_PIPELINE: &str = "assets/pipelines/game_view.json";

struct TestHost {
    playing: bool,
    paused: bool,
    scale: f32,
    steps: usize,
}

impl TestHost {
    fn editing() -> Self {
        Self { playing: false, paused: false, scale: 1.0, steps: 0 }
    }

    fn playing() -> Self {
        Self { playing: true, ..Self::editing() }
    }
}

impl EditorHost for TestHost {
    fn play_state(&self) -> PlayState {
        if self.playing {
            PlayState::Playing { paused: self.paused }
        } else {
            PlayState::Editing
        }
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    fn request_step(&mut self) {
        self.steps += 1;
    }

    fn time_scale(&self) -> f32 {
        self.scale
    }

    fn set_time_scale(&mut self, scale: f32) {
        self.scale = scale;
    }
}

/// Records every cursor call so tests can assert side effects fire exactly
/// once per capture change.
#[derive(Default)]
struct CountingSink {
    visible: Vec<bool>,
    relative: Vec<bool>,
}

impl CaptureSink for CountingSink {
    fn set_cursor_visible(&mut self, visible: bool) {
        self.visible.push(visible);
    }

    fn set_relative_mode(&mut self, relative: bool) {
        self.relative.push(relative);
    }
}

#[derive(Default)]
struct CountingBlit {
    registered: usize,
    freed: usize,
}

impl FrameBlit for CountingBlit {
    fn register(&mut self, _device: &wgpu::Device, _view: &wgpu::TextureView) -> egui::TextureId {
        self.registered += 1;
        egui::TextureId::User(self.registered as u64)
    }

    fn free(&mut self, _id: egui::TextureId) {
        self.freed += 1;
    }
}

fn panel_config(pipeline_path: &str) -> RenderConfig {
    RenderConfig { pipeline_path: pipeline_path.to_string(), camera_slot: "main".to_string() }
}

fn offline_device() -> RenderDevice {
    RenderDevice::new(&WindowConfig {
        title: "Game View Test".to_string(),
        width: 640,
        height: 480,
        vsync: false,
    })
}

/// Single-pass context so one `run` maps to exactly one panel tick.
fn test_ctx() -> egui::Context {
    let ctx = egui::Context::default();
    ctx.options_mut(|options| options.max_passes = std::num::NonZeroUsize::MIN);
    ctx
}

fn escape_pressed() -> egui::RawInput {
    let mut raw = egui::RawInput::default();
    raw.events.push(egui::Event::Key {
        key: egui::Key::Escape,
        physical_key: None,
        pressed: true,
        repeat: false,
        modifiers: egui::Modifiers::default(),
    });
    raw
}

#[test]
fn missing_pipeline_description_skips_the_panel() {
    let mut events = WorldEvents::new();
    let mut view = GameView::new(&panel_config("does-not-exist.json"), &mut events, None);
    let mut device = offline_device();
    let mut resources = ResourceHub::new();
    let mut host = TestHost::playing();
    let mut input = InputSystem::new();
    let mut sink = CountingSink::default();
    let mut blit = CountingBlit::default();
    let mut deps = GameViewDeps {
        device: &mut device,
        resources: &mut resources,
        host: &mut host,
        input: &mut input,
        capture: &mut sink,
        blit: &mut blit,
    };

    let ctx = test_ctx();
    let mut out = Default::default();
    let _ = ctx.run(egui::RawInput::default(), |ctx| out = view.show(ctx, &mut deps));

    assert!(out.skipped_not_ready);
    assert!(!out.displayed);
    assert!(!out.controls_drawn);
    assert_eq!(out.viewport, None);
    assert!(!view.pipeline().is_ready());
}

#[test]
fn world_events_rebind_the_displayed_scene() {
    let mut events = WorldEvents::new();
    let mut view = GameView::new(&panel_config("does-not-exist.json"), &mut events, None);
    let mut device = offline_device();
    let mut resources = ResourceHub::new();
    let mut host = TestHost::editing();
    let mut input = InputSystem::new();
    let mut sink = CountingSink::default();
    let mut blit = CountingBlit::default();
    let ctx = test_ctx();

    events.publish(WorldEvent::Created { world: WorldId(7), scene: SceneId(3) });
    let mut out = Default::default();
    let _ = ctx.run(egui::RawInput::default(), |ctx| {
        let mut deps = GameViewDeps {
            device: &mut device,
            resources: &mut resources,
            host: &mut host,
            input: &mut input,
            capture: &mut sink,
            blit: &mut blit,
        };
        out = view.show(ctx, &mut deps);
    });
    assert_eq!(out.events_handled, 1);
    assert_eq!(view.pipeline().scene(), Some(SceneId(3)));

    events.publish(WorldEvent::Destroyed { world: WorldId(7) });
    let _ = ctx.run(egui::RawInput::default(), |ctx| {
        let mut deps = GameViewDeps {
            device: &mut device,
            resources: &mut resources,
            host: &mut host,
            input: &mut input,
            capture: &mut sink,
            blit: &mut blit,
        };
        out = view.show(ctx, &mut deps);
    });
    assert_eq!(out.events_handled, 1);
    assert_eq!(view.pipeline().scene(), None, "a destroyed world leaves no scene bound");
}

#[test]
fn a_panel_created_mid_session_binds_the_active_scene() {
    let mut events = WorldEvents::new();
    let view = GameView::new(&panel_config("does-not-exist.json"), &mut events, Some(SceneId(11)));
    assert_eq!(view.pipeline().scene(), Some(SceneId(11)));
    assert_eq!(events.subscriber_count(), 1);
}

#[test]
fn escape_releases_capture_and_disables_game_input() {
    let mut events = WorldEvents::new();
    let mut view = GameView::new(&panel_config(SHIPPED_PIPELINE), &mut events, None);
    let mut device = offline_device();
    let mut resources = ResourceHub::new();
    let mut host = TestHost::playing();
    let mut input = InputSystem::new();
    let mut sink = CountingSink::default();
    let mut blit = CountingBlit::default();

    view.set_mouse_capture(true, &mut input, &mut sink);
    assert!(view.mouse_captured());
    assert!(input.is_enabled());
    input.push(InputEvent::MouseMove { dx: 3.0, dy: 1.0 });
    assert_eq!(input.mouse_delta, (3.0, 1.0));

    let mut deps = GameViewDeps {
        device: &mut device,
        resources: &mut resources,
        host: &mut host,
        input: &mut input,
        capture: &mut sink,
        blit: &mut blit,
    };
    let ctx = test_ctx();
    let mut out = Default::default();
    let _ = ctx.run(escape_pressed(), |ctx| out = view.show(ctx, &mut deps));

    assert!(out.released_capture);
    assert!(!out.skipped_not_ready);
    assert!(out.controls_drawn, "the panel stays usable after a release");
    assert!(!out.displayed, "no GPU device, so no image to show");
    assert!(!view.mouse_captured());
    assert!(!input.is_enabled());
    assert_eq!(input.mouse_delta, (0.0, 0.0), "release drops pending game input");
    assert_eq!(sink.visible, vec![false, true]);
    assert_eq!(sink.relative, vec![true, false]);
}

#[test]
fn leaving_game_mode_releases_capture() {
    let mut events = WorldEvents::new();
    let mut view = GameView::new(&panel_config(SHIPPED_PIPELINE), &mut events, None);
    let mut device = offline_device();
    let mut resources = ResourceHub::new();
    let mut host = TestHost::editing();
    let mut input = InputSystem::new();
    let mut sink = CountingSink::default();
    let mut blit = CountingBlit::default();

    view.set_mouse_capture(true, &mut input, &mut sink);

    let mut deps = GameViewDeps {
        device: &mut device,
        resources: &mut resources,
        host: &mut host,
        input: &mut input,
        capture: &mut sink,
        blit: &mut blit,
    };
    let ctx = test_ctx();
    let mut out = Default::default();
    let _ = ctx.run(egui::RawInput::default(), |ctx| out = view.show(ctx, &mut deps));

    assert!(out.released_capture);
    assert!(!view.mouse_captured());
    assert!(!input.is_enabled());
}

#[test]
fn losing_window_focus_releases_capture() {
    let mut events = WorldEvents::new();
    let mut view = GameView::new(&panel_config(SHIPPED_PIPELINE), &mut events, None);
    let mut device = offline_device();
    let mut resources = ResourceHub::new();
    let mut host = TestHost::playing();
    let mut input = InputSystem::new();
    let mut sink = CountingSink::default();
    let mut blit = CountingBlit::default();

    view.set_mouse_capture(true, &mut input, &mut sink);

    let mut deps = GameViewDeps {
        device: &mut device,
        resources: &mut resources,
        host: &mut host,
        input: &mut input,
        capture: &mut sink,
        blit: &mut blit,
    };
    let ctx = test_ctx();
    let mut raw = egui::RawInput::default();
    raw.focused = false;
    let mut out = Default::default();
    let _ = ctx.run(raw, |ctx| out = view.show(ctx, &mut deps));

    assert!(out.released_capture);
    assert!(!view.mouse_captured());
}

#[test]
fn closing_the_panel_releases_capture_without_drawing() {
    let mut events = WorldEvents::new();
    let mut view = GameView::new(&panel_config(SHIPPED_PIPELINE), &mut events, None);
    let mut device = offline_device();
    let mut resources = ResourceHub::new();
    let mut host = TestHost::playing();
    let mut input = InputSystem::new();
    let mut sink = CountingSink::default();
    let mut blit = CountingBlit::default();

    view.set_mouse_capture(true, &mut input, &mut sink);
    view.open = false;

    let mut deps = GameViewDeps {
        device: &mut device,
        resources: &mut resources,
        host: &mut host,
        input: &mut input,
        capture: &mut sink,
        blit: &mut blit,
    };
    let ctx = test_ctx();
    let mut out = Default::default();
    let _ = ctx.run(egui::RawInput::default(), |ctx| out = view.show(ctx, &mut deps));

    assert!(out.released_capture, "a hidden panel must not hold the mouse");
    assert!(!out.controls_drawn);
    assert_eq!(sink.visible, vec![false, true]);
    assert_eq!(sink.relative, vec![true, false]);
}

#[test]
fn repeated_capture_requests_fire_side_effects_once() {
    let mut events = WorldEvents::new();
    let mut view = GameView::new(&panel_config("does-not-exist.json"), &mut events, None);
    let mut input = InputSystem::new();
    let mut sink = CountingSink::default();

    view.set_mouse_capture(true, &mut input, &mut sink);
    view.set_mouse_capture(true, &mut input, &mut sink);
    assert_eq!(sink.visible, vec![false]);
    assert_eq!(sink.relative, vec![true]);
    assert!(input.is_enabled());

    view.set_mouse_capture(false, &mut input, &mut sink);
    view.set_mouse_capture(false, &mut input, &mut sink);
    assert_eq!(sink.visible, vec![false, true]);
    assert_eq!(sink.relative, vec![true, false]);
    assert!(!input.is_enabled());
}

#[test]
fn shutdown_detaches_the_subscription() {
    let mut events = WorldEvents::new();
    let mut view = GameView::new(&panel_config("does-not-exist.json"), &mut events, None);
    assert_eq!(events.subscriber_count(), 1);

    let mut blit = CountingBlit::default();
    view.shutdown(&mut events, &mut blit);
    assert_eq!(events.subscriber_count(), 0);
    assert_eq!(blit.freed, 0, "nothing was registered, nothing to free");

    // A second shutdown and further publishes are harmless.
    view.shutdown(&mut events, &mut blit);
    events.publish(WorldEvent::Destroyed { world: WorldId(1) });

    let mut device = offline_device();
    let mut resources = ResourceHub::new();
    let mut host = TestHost::editing();
    let mut input = InputSystem::new();
    let mut sink = CountingSink::default();
    let mut deps = GameViewDeps {
        device: &mut device,
        resources: &mut resources,
        host: &mut host,
        input: &mut input,
        capture: &mut sink,
        blit: &mut blit,
    };
    let ctx = test_ctx();
    let mut out = Default::default();
    let _ = ctx.run(egui::RawInput::default(), |ctx| out = view.show(ctx, &mut deps));
    assert_eq!(out.events_handled, 0);
}

#[test]
fn clicking_the_live_image_captures_the_mouse() {
    let mut device = offline_device();
    if let Err(err) = pollster::block_on(device.init_headless()) {
        eprintln!("skipping: no usable GPU adapter ({err:#})");
        return;
    }
    let mut resources = ResourceHub::new();
    let gpu = device.device().expect("device").clone();
    let queue = device.queue().expect("queue").clone();
    resources.set_device(&gpu, &queue);

    let scene = device.create_scene(WorldId(1));
    device.scene_mut(scene).expect("fresh scene").populate_demo();

    let mut events = WorldEvents::new();
    let mut view = GameView::new(&panel_config(SHIPPED_PIPELINE), &mut events, Some(scene));
    let mut host = TestHost::playing();
    let mut input = InputSystem::new();
    let mut sink = CountingSink::default();
    let mut blit = CountingBlit::default();
    let ctx = test_ctx();

    // The first sized tick builds the render targets and shows the image.
    let mut out = Default::default();
    {
        let mut deps = GameViewDeps {
            device: &mut device,
            resources: &mut resources,
            host: &mut host,
            input: &mut input,
            capture: &mut sink,
            blit: &mut blit,
        };
        let _ = ctx.run(egui::RawInput::default(), |ctx| out = view.show(ctx, &mut deps));
    }
    assert!(out.displayed, "the panel displays on its first sized tick");
    assert!(out.viewport.is_some());
    assert_eq!(blit.registered, 1);
    device.frame();

    {
        let mut deps = GameViewDeps {
            device: &mut device,
            resources: &mut resources,
            host: &mut host,
            input: &mut input,
            capture: &mut sink,
            blit: &mut blit,
        };
        let _ = ctx.run(egui::RawInput::default(), |ctx| out = view.show(ctx, &mut deps));
    }
    assert!(out.displayed);
    assert_eq!(blit.registered, 1, "the display texture is reused across ticks");
    device.frame();

    let rect = ctx
        .memory(|memory| memory.area_rect(egui::Id::new("game_view")))
        .expect("panel window rect");
    let center = rect.center();

    let mut raw = egui::RawInput::default();
    raw.events.push(egui::Event::PointerMoved(center));
    raw.events.push(egui::Event::PointerButton {
        pos: center,
        button: egui::PointerButton::Primary,
        pressed: true,
        modifiers: egui::Modifiers::default(),
    });
    {
        let mut deps = GameViewDeps {
            device: &mut device,
            resources: &mut resources,
            host: &mut host,
            input: &mut input,
            capture: &mut sink,
            blit: &mut blit,
        };
        let _ = ctx.run(raw, |ctx| out = view.show(ctx, &mut deps));
    }
    device.frame();

    assert!(out.acquired_capture, "a primary click on the image grabs the mouse");
    assert!(view.mouse_captured());
    assert!(input.is_enabled());
    assert_eq!(sink.visible, vec![false]);
    assert_eq!(sink.relative, vec![true]);
    assert_eq!(blit.registered, 1);

    view.shutdown(&mut events, &mut blit);
    assert_eq!(blit.freed, 1);
    assert_eq!(events.subscriber_count(), 0);
}
