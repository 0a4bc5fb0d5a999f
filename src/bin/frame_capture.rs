use anyhow::{anyhow, Context, Result};
use shrike_render::config::WindowConfig;
use shrike_render::device::RenderDevice;
use shrike_render::pipeline::RenderPipeline;
use shrike_render::resources::ResourceHub;
use shrike_render::scene::WorldId;
use std::env;
use std::path::PathBuf;

/// Renders the demo scene headless for a number of frames and writes the
/// pipeline output as a PNG.
fn main() -> Result<()> {
    env_logger::init();
    let args = CaptureArgs::parse(env::args().skip(1))?;
    pollster::block_on(run_capture(args))
}

#[derive(Debug)]
struct CaptureArgs {
    frames: usize,
    output: PathBuf,
    pipeline: String,
    camera_slot: String,
    size: (u32, u32),
}

impl CaptureArgs {
    fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut frames = 8usize;
        let mut output = PathBuf::from("captures/frame.png");
        let mut pipeline = "assets/pipelines/game_view.json".to_string();
        let mut camera_slot = "main".to_string();
        let mut size = (1280u32, 720u32);
        let mut iter = args.into_iter();
        while let Some(raw) = iter.next() {
            let arg = raw.into();
            match arg.as_str() {
                "--frames" => {
                    let value: String =
                        iter.next().ok_or_else(|| anyhow!("--frames requires a value"))?.into();
                    frames = value.parse().context("invalid --frames value")?;
                }
                "--output" => {
                    let value: String =
                        iter.next().ok_or_else(|| anyhow!("--output requires a value"))?.into();
                    output = PathBuf::from(value);
                }
                "--pipeline" => {
                    let value: String =
                        iter.next().ok_or_else(|| anyhow!("--pipeline requires a value"))?.into();
                    pipeline = value;
                }
                "--camera" => {
                    let value: String =
                        iter.next().ok_or_else(|| anyhow!("--camera requires a value"))?.into();
                    camera_slot = value;
                }
                "--size" => {
                    let value: String =
                        iter.next().ok_or_else(|| anyhow!("--size expects WIDTHxHEIGHT"))?.into();
                    let mut split = value.splitn(2, 'x');
                    let width = split
                        .next()
                        .unwrap_or_default()
                        .parse()
                        .context("invalid --size width")?;
                    let height = split
                        .next()
                        .ok_or_else(|| anyhow!("--size expects WIDTHxHEIGHT"))?
                        .parse()
                        .context("invalid --size height")?;
                    size = (width, height);
                }
                other => return Err(anyhow!("Unknown argument '{other}'")),
            }
        }
        if frames == 0 {
            return Err(anyhow!("--frames must be at least 1"));
        }
        if size.0 == 0 || size.1 == 0 {
            return Err(anyhow!("--size must be at least 1x1"));
        }
        Ok(Self { frames, output, pipeline, camera_slot, size })
    }
}

async fn run_capture(args: CaptureArgs) -> Result<()> {
    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    let mut device = RenderDevice::new(&WindowConfig {
        title: "Frame Capture".into(),
        width: args.size.0,
        height: args.size.1,
        vsync: false,
    });
    device.init_headless().await?;
    let mut resources = ResourceHub::new();
    {
        let gpu = device.device()?.clone();
        let queue = device.queue()?.clone();
        resources.set_device(&gpu, &queue);
    }

    let scene = device.create_scene(WorldId(1));
    if let Some(render_scene) = device.scene_mut(scene) {
        render_scene.populate_demo();
    }

    let mut pipeline = RenderPipeline::new(&args.pipeline, &args.camera_slot);
    pipeline.set_scene(Some(scene));
    pipeline.set_viewport(args.size.0, args.size.1);
    if !pipeline.ensure_ready(&mut resources) {
        return Err(anyhow!("Pipeline description '{}' failed to load", args.pipeline));
    }

    for frame in 0..args.frames {
        if let Some(render_scene) = device.scene_mut(scene) {
            render_scene.tick(1.0 / 60.0);
        }
        let encoded = pipeline
            .render(&mut device, &mut resources)
            .with_context(|| format!("rendering frame {frame}"))?;
        if !encoded {
            return Err(anyhow!("Pipeline skipped frame {frame}"));
        }
        device.frame();
    }

    let output = pipeline.output().context("Pipeline produced no output framebuffer")?;
    device.save_screenshot(&output.color, &args.output)?;
    println!("captured {} frames to {}", args.frames, args.output.display());
    Ok(())
}
