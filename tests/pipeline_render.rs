use shrike_render::config::WindowConfig;
use shrike_render::device::RenderDevice;
use shrike_render::pipeline::RenderPipeline;
use shrike_render::resources::ResourceHub;
use shrike_render::scene::{SceneId, WorldId};

const PIPELINE_PATH: &str = "assets/pipelines/game_view.json";

/// Background clear color of the shipped pipeline after sRGB encoding.
const CLEAR_RGB: [i32; 3] = [66, 75, 93];

fn headless() -> Option<(RenderDevice, ResourceHub)> {
    let config = WindowConfig {
        title: "Headless".to_string(),
        width: 800,
        height: 600,
        vsync: false,
    };
    let mut device = RenderDevice::new(&config);
    if let Err(err) = pollster::block_on(device.init_headless()) {
        eprintln!("skipping: no usable GPU adapter ({err:#})");
        return None;
    }
    let mut resources = ResourceHub::new();
    let gpu = device.device().expect("device").clone();
    let queue = device.queue().expect("queue").clone();
    resources.set_device(&gpu, &queue);
    Some((device, resources))
}

fn demo_pipeline(device: &mut RenderDevice) -> RenderPipeline {
    let scene = device.create_scene(WorldId(1));
    device.scene_mut(scene).expect("fresh scene").populate_demo();
    let mut pipeline = RenderPipeline::new(PIPELINE_PATH, "main");
    pipeline.set_scene(Some(scene));
    pipeline.set_viewport(800, 600);
    pipeline
}

#[test]
fn render_allocates_views_and_frame_resets_them() {
    let Some((mut device, mut resources)) = headless() else {
        return;
    };
    let mut pipeline = demo_pipeline(&mut device);

    assert!(pipeline.ensure_ready(&mut resources), "shipped pipeline should load");
    let encoded = pipeline.render(&mut device, &mut resources).expect("render");
    assert!(encoded);
    assert_eq!(device.views_allocated(), 2, "sky and opaque each take a view slot");
    assert_eq!(device.pending_command_count(), 1);

    let frame = device.frame();
    assert_eq!(frame, 1);
    assert_eq!(device.views_allocated(), 0);
    assert_eq!(device.pending_command_count(), 0);
    assert_eq!(device.arena().used(), 0);

    // Pass indices persist across frames even though view slots reset.
    assert_eq!(device.pass_name(0).map(str::to_owned), Some("sky".to_string()));
    assert_eq!(device.pass_name(1).map(str::to_owned), Some("opaque".to_string()));
}

#[test]
fn clear_color_reaches_the_output_corner() {
    let Some((mut device, mut resources)) = headless() else {
        return;
    };
    let mut pipeline = demo_pipeline(&mut device);
    pipeline.render(&mut device, &mut resources).expect("render");
    device.frame();

    let output = pipeline.output().expect("output framebuffer");
    let image = device.read_texture_rgba(&output.color).expect("readback");
    assert_eq!(image.dimensions(), (800, 600));

    // Top-left corner is above the horizon, so only the clear color lands there.
    let corner = image.get_pixel(0, 0);
    for (channel, expected) in corner.0.iter().take(3).zip(CLEAR_RGB) {
        assert!(
            (*channel as i32 - expected).abs() <= 6,
            "corner pixel {:?} should be close to the clear color {CLEAR_RGB:?}",
            corner.0
        );
    }
    assert_eq!(corner.0[3], 255);
}

#[test]
fn destroying_the_scene_leaves_only_the_clear() {
    let Some((mut device, mut resources)) = headless() else {
        return;
    };
    let scene = device.create_scene(WorldId(1));
    device.scene_mut(scene).expect("fresh scene").populate_demo();
    let mut pipeline = RenderPipeline::new(PIPELINE_PATH, "main");
    pipeline.set_scene(Some(scene));
    pipeline.set_viewport(800, 600);

    pipeline.render(&mut device, &mut resources).expect("render with scene");
    device.frame();
    let output = pipeline.output().expect("output framebuffer");
    let with_scene = device.read_texture_rgba(&output.color).expect("readback");
    let center = with_scene.get_pixel(400, 300).0;
    let center_differs = center
        .iter()
        .take(3)
        .zip(CLEAR_RGB)
        .any(|(channel, expected)| (*channel as i32 - expected).abs() > 6);
    assert!(center_differs, "demo geometry should cover the image center, got {center:?}");

    assert!(device.destroy_scene(scene));
    let encoded = pipeline.render(&mut device, &mut resources).expect("render without scene");
    assert!(encoded, "a dangling scene id still clears the targets");
    device.frame();
    let output = pipeline.output().expect("output framebuffer");
    let cleared = device.read_texture_rgba(&output.color).expect("readback");
    let center = cleared.get_pixel(400, 300).0;
    for (channel, expected) in center.iter().take(3).zip(CLEAR_RGB) {
        assert!(
            (*channel as i32 - expected).abs() <= 6,
            "center should fall back to the clear color, got {center:?}"
        );
    }
}

#[test]
fn framebuffers_rebuild_only_when_the_viewport_changes() {
    let Some((mut device, mut resources)) = headless() else {
        return;
    };
    let mut pipeline = demo_pipeline(&mut device);

    pipeline.render(&mut device, &mut resources).expect("first render");
    device.frame();
    let first_generation = pipeline.output().expect("output").generation;
    let first_size = pipeline.output().expect("output").size;
    assert_eq!(first_size, (800, 600));

    pipeline.set_viewport(800, 600);
    pipeline.render(&mut device, &mut resources).expect("same-size render");
    device.frame();
    assert_eq!(
        pipeline.output().expect("output").generation,
        first_generation,
        "same viewport must not recreate the target"
    );

    pipeline.set_viewport(200, 120);
    pipeline.render(&mut device, &mut resources).expect("resized render");
    device.frame();
    let resized = pipeline.output().expect("output");
    assert!(resized.generation > first_generation);
    assert_eq!(resized.size, (200, 120));
}

#[test]
fn sized_targets_are_displayable_before_the_first_render() {
    let Some((mut device, mut resources)) = headless() else {
        return;
    };
    let mut pipeline = demo_pipeline(&mut device);
    assert!(pipeline.ensure_ready(&mut resources), "shipped pipeline should load");
    assert!(pipeline.output().is_none(), "no targets exist until they are sized");

    let gpu = device.device().expect("device").clone();
    pipeline.ensure_targets(&gpu);
    let generation = {
        let output = pipeline.output().expect("sized output framebuffer");
        assert_eq!(output.size, (800, 600));
        output.generation
    };

    pipeline.render(&mut device, &mut resources).expect("render");
    device.frame();
    assert_eq!(
        pipeline.output().expect("output").generation,
        generation,
        "rendering must reuse the targets it was handed"
    );
}

#[test]
fn screenshots_round_trip_through_png() {
    let Some((mut device, mut resources)) = headless() else {
        return;
    };
    let mut pipeline = demo_pipeline(&mut device);
    pipeline.render(&mut device, &mut resources).expect("render");
    device.frame();

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("frame.png");
    let output = pipeline.output().expect("output framebuffer");
    device.save_screenshot(&output.color, &path).expect("screenshot");

    let loaded = image::open(&path).expect("written file should decode");
    assert_eq!(loaded.width(), 800);
    assert_eq!(loaded.height(), 600);
}

#[test]
fn unknown_scene_ids_resolve_to_nothing() {
    let config = WindowConfig {
        title: "Headless".to_string(),
        width: 64,
        height: 64,
        vsync: false,
    };
    let mut device = RenderDevice::new(&config);
    let first = device.create_scene(WorldId(1));
    assert!(device.destroy_scene(first));
    assert!(!device.destroy_scene(first), "destroy is idempotent");
    let second = device.create_scene(WorldId(2));
    assert_ne!(first, second, "scene ids are never reused");
    assert!(device.scene(first).is_none());
    assert!(device.scene(second).is_some());
    assert!(device.scene(SceneId(9999)).is_none());
}
