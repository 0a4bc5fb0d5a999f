pub mod game_view;
pub mod inspector;

use bevy_ecs::prelude::Entity;

use crate::device::RenderDevice;
use crate::events::{WorldEvent, WorldEvents};
use crate::host::{EditorHost, PlayState};
use crate::scene::{SceneId, WorldId};
use crate::time::SimulationClock;

/// The world currently open in the editor and the render scene backing it.
#[derive(Debug, Clone, Copy)]
pub struct ActiveWorld {
    pub world: WorldId,
    pub scene: SceneId,
}

/// Editor-side session state: the open world, play mode, the simulation clock
/// and the lifecycle event bus the panels subscribe to.
pub struct EditorState {
    clock: SimulationClock,
    playing: bool,
    pub events: WorldEvents,
    active: Option<ActiveWorld>,
    next_world: u64,
    pub selected: Option<Entity>,
}

impl EditorState {
    pub fn new() -> Self {
        Self {
            clock: SimulationClock::new(),
            playing: false,
            events: WorldEvents::new(),
            active: None,
            next_world: 1,
            selected: None,
        }
    }

    pub fn active_world(&self) -> Option<ActiveWorld> {
        self.active
    }

    pub fn active_scene(&self) -> Option<SceneId> {
        self.active.map(|active| active.scene)
    }

    pub fn play(&mut self) {
        self.playing = true;
    }

    pub fn stop(&mut self) {
        self.playing = false;
        self.clock.set_paused(false);
    }

    /// Measures this tick's wall time and returns the simulation delta,
    /// honoring play mode, pause and the speed multiplier.
    pub fn advance_clock(&mut self) -> f32 {
        self.clock.advance(self.playing)
    }

    /// Closes any open world, then creates a fresh one with its render scene
    /// and demo content. Subscribers learn about both steps in order.
    pub fn create_world(&mut self, device: &mut RenderDevice) -> ActiveWorld {
        self.destroy_world(device);
        let world = WorldId(self.next_world);
        self.next_world += 1;
        let scene = device.create_scene(world);
        if let Some(render_scene) = device.scene_mut(scene) {
            render_scene.populate_demo();
        }
        let active = ActiveWorld { world, scene };
        self.active = Some(active);
        self.events.publish(WorldEvent::Created { world, scene });
        log::info!("created {world} backed by {scene}");
        active
    }

    /// Tears down the open world, notifying subscribers before the render
    /// scene disappears so they can drop their references first.
    pub fn destroy_world(&mut self, device: &mut RenderDevice) {
        let Some(active) = self.active.take() else {
            return;
        };
        self.selected = None;
        self.events.publish(WorldEvent::Destroyed { world: active.world });
        device.destroy_scene(active.scene);
        log::info!("destroyed {}", active.world);
    }
}

impl Default for EditorState {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorHost for EditorState {
    fn play_state(&self) -> PlayState {
        if self.playing {
            PlayState::Playing { paused: self.clock.paused() }
        } else {
            PlayState::Editing
        }
    }

    fn is_paused(&self) -> bool {
        self.clock.paused()
    }

    fn set_paused(&mut self, paused: bool) {
        self.clock.set_paused(paused);
    }

    fn request_step(&mut self) {
        self.clock.request_step();
    }

    fn time_scale(&self) -> f32 {
        self.clock.multiplier()
    }

    fn set_time_scale(&mut self, scale: f32) {
        self.clock.set_multiplier(scale);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn play_state_reflects_mode_and_pause() {
        let mut editor = EditorState::new();
        assert_eq!(editor.play_state(), PlayState::Editing);
        editor.play();
        assert_eq!(editor.play_state(), PlayState::Playing { paused: false });
        editor.set_paused(true);
        assert_eq!(editor.play_state(), PlayState::Playing { paused: true });
        editor.stop();
        assert_eq!(editor.play_state(), PlayState::Editing);
        assert!(!editor.is_paused(), "stop clears pause");
    }

    #[test]
    fn world_lifecycle_updates_scene_registry_and_publishes() {
        let config = crate::config::WindowConfig::default();
        let mut device = RenderDevice::new(&config);
        let mut editor = EditorState::new();
        let sub = editor.events.subscribe();

        let first = editor.create_world(&mut device);
        assert_eq!(device.scene_count(), 1);
        assert!(device.scene(first.scene).is_some());
        assert_eq!(
            sub.drain(),
            vec![WorldEvent::Created { world: first.world, scene: first.scene }]
        );

        let second = editor.create_world(&mut device);
        assert_ne!(first.world, second.world);
        assert_ne!(first.scene, second.scene);
        assert_eq!(device.scene_count(), 1, "the old scene is torn down");
        assert!(device.scene(first.scene).is_none());
        assert_eq!(
            sub.drain(),
            vec![
                WorldEvent::Destroyed { world: first.world },
                WorldEvent::Created { world: second.world, scene: second.scene },
            ]
        );

        editor.destroy_world(&mut device);
        assert_eq!(device.scene_count(), 0);
        assert!(editor.active_world().is_none());
        editor.destroy_world(&mut device);
        assert!(sub.drain().len() == 1, "destroying twice publishes once");
    }

    #[test]
    fn destroying_a_world_clears_the_selection() {
        let config = crate::config::WindowConfig::default();
        let mut device = RenderDevice::new(&config);
        let mut editor = EditorState::new();
        let active = editor.create_world(&mut device);
        let scene = device.scene_mut(active.scene).expect("scene");
        editor.selected = scene.list_named().first().map(|(entity, _)| *entity);
        assert!(editor.selected.is_some());
        editor.destroy_world(&mut device);
        assert!(editor.selected.is_none());
    }

    #[test]
    fn time_scale_round_trips_through_the_host_trait() {
        let mut editor = EditorState::new();
        editor.set_time_scale(4.0);
        assert_eq!(editor.time_scale(), 4.0);
        editor.set_time_scale(1_000.0);
        assert_eq!(editor.time_scale(), crate::time::MAX_TIME_MULTIPLIER);
    }
}
