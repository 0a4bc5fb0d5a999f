pub mod app;
pub mod cli;
pub mod config;
pub mod device;
#[cfg(feature = "editor")]
pub mod editor;
pub mod events;
pub mod frame_arena;
pub mod host;
pub mod input;
pub mod interner;
pub mod pipeline;
pub mod reflect;
pub mod resources;
pub mod scene;
pub mod time;

pub use app::{run, run_with_overrides, App};
pub use device::{RenderDevice, SurfaceFrame, TextureOrigin};
pub use pipeline::RenderPipeline;
pub use resources::ResourceHub;
pub use scene::{RenderScene, SceneId, WorldId};
