use bevy_ecs::prelude::{Component, Entity, World};
use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
use std::fmt;

/// Identifier of an editable world. Worlds live in the editor; the render
/// device only ever sees the id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorldId(pub u64);

/// Identifier of a render scene owned by the device. Ids are never reused,
/// so a stale handle resolves to nothing instead of another world's scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SceneId(pub u64);

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "world#{}", self.0)
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scene#{}", self.0)
    }
}

#[derive(Component, Debug, Clone)]
pub struct Name(pub String);

#[derive(Component, Debug, Clone, Copy)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self { translation: Vec3::ZERO, rotation: Quat::IDENTITY, scale: Vec3::ONE }
    }
}

impl Transform {
    pub fn from_translation(translation: Vec3) -> Self {
        Self { translation, ..Self::default() }
    }

    /// Transform positioned at `eye` with -Z facing `target`.
    pub fn looking_at(eye: Vec3, target: Vec3) -> Self {
        let world = Mat4::look_at_rh(eye, target, Vec3::Y).inverse();
        let (_, rotation, translation) = world.to_scale_rotation_translation();
        Self { translation, rotation, scale: Vec3::ONE }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// Forward axis (-Z) in world space.
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }
}

#[derive(Component, Debug, Clone)]
pub struct Camera {
    pub slot: String,
    pub fov_deg: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self { slot: "main".to_string(), fov_deg: 60.0, near: 0.1, far: 10_000.0 }
    }
}

#[derive(Component, Debug, Clone)]
pub struct Renderable {
    pub model: String,
    pub casts_shadows: bool,
}

impl Default for Renderable {
    fn default() -> Self {
        Self { model: "primitive/cube".to_string(), casts_shadows: true }
    }
}

#[derive(Component, Debug, Clone)]
pub struct GlobalLight {
    pub ambient_color: Vec4,
    pub ambient_intensity: f32,
    pub diffuse_color: Vec4,
    pub diffuse_intensity: f32,
    pub fog_color: Vec4,
    pub fog_density: f32,
    pub fog_bottom: f32,
    pub fog_height: f32,
    pub shadow_cascades: Vec4,
}

impl Default for GlobalLight {
    fn default() -> Self {
        Self {
            ambient_color: Vec4::ONE,
            ambient_intensity: 0.3,
            diffuse_color: Vec4::ONE,
            diffuse_intensity: 1.0,
            fog_color: Vec4::new(0.82, 0.85, 0.9, 1.0),
            fog_density: 0.0,
            fog_bottom: 0.0,
            fog_height: 10.0,
            shadow_cascades: Vec4::new(2.0, 8.0, 25.0, 80.0),
        }
    }
}

#[derive(Component, Debug, Clone)]
pub struct PointLight {
    pub cast_shadows: bool,
    pub diffuse_color: Vec4,
    pub specular_color: Vec4,
    pub diffuse_intensity: f32,
    pub fov_deg: f32,
    pub attenuation: f32,
    pub range: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            cast_shadows: false,
            diffuse_color: Vec4::ONE,
            specular_color: Vec4::ONE,
            diffuse_intensity: 1.0,
            fov_deg: 360.0,
            attenuation: 2.0,
            range: 10.0,
        }
    }
}

/// Stochastic spawn parameters; each pair is a min/max interval.
#[derive(Component, Debug, Clone)]
pub struct ParticleEmitter {
    pub initial_life: Vec2,
    pub initial_size: Vec2,
    pub spawn_period: Vec2,
    pub age: f32,
}

impl Default for ParticleEmitter {
    fn default() -> Self {
        Self {
            initial_life: Vec2::new(1.0, 2.0),
            initial_size: Vec2::new(0.05, 0.2),
            spawn_period: Vec2::new(0.2, 0.4),
            age: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GrassPatch {
    pub mesh: String,
    pub ground: u32,
    pub density: u32,
}

#[derive(Component, Debug, Clone)]
pub struct Terrain {
    pub material: String,
    pub xz_scale: f32,
    pub height_scale: f32,
    pub grass_distance: i32,
    pub grass: Vec<GrassPatch>,
}

impl Default for Terrain {
    fn default() -> Self {
        Self {
            material: "materials/default".to_string(),
            xz_scale: 1.0,
            height_scale: 1.0,
            grass_distance: 50,
            grass: Vec::new(),
        }
    }
}

/// Demo animation tag: radians per second around Y while the simulation runs.
#[derive(Component, Debug, Clone, Copy)]
pub struct Spin(pub f32);

/// Camera parameters resolved for one render.
#[derive(Debug, Clone, Copy)]
pub struct CameraRig {
    pub world_from_camera: Mat4,
    pub fov_deg: f32,
    pub near: f32,
    pub far: f32,
}

impl CameraRig {
    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        let proj = Mat4::perspective_rh(self.fov_deg.to_radians(), aspect.max(0.01), self.near, self.far);
        proj * self.world_from_camera.inverse()
    }
}

#[derive(Debug, Clone)]
pub struct RenderableDraw {
    pub model: String,
    pub world: Mat4,
}

#[derive(Debug, Clone, Copy)]
pub struct SunLight {
    pub direction: Vec3,
    pub ambient_color: Vec4,
    pub ambient_intensity: f32,
    pub diffuse_color: Vec4,
    pub diffuse_intensity: f32,
    pub fog_color: Vec4,
    pub fog_density: f32,
    pub fog_bottom: f32,
    pub fog_height: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct PointLightDraw {
    pub position: Vec3,
    pub color: Vec4,
    pub intensity: f32,
    pub range: f32,
    pub attenuation: f32,
}

/// Render-side scene bound to one editable world. The device owns the storage;
/// everything else refers to it by `SceneId`.
pub struct RenderScene {
    world_id: WorldId,
    world: World,
}

impl RenderScene {
    pub fn new(world_id: WorldId) -> Self {
        Self { world_id, world: World::new() }
    }

    pub fn world_id(&self) -> WorldId {
        self.world_id
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn entity_count(&self) -> usize {
        self.world.entities().len() as usize
    }

    /// Spawns the starter content used by a fresh world: a main camera, sun,
    /// ground plane, a few spinning cubes, a fill light, an emitter and a
    /// terrain patch.
    pub fn populate_demo(&mut self) {
        self.world.spawn((
            Name("Main Camera".to_string()),
            Transform::looking_at(Vec3::new(4.0, 3.0, 8.0), Vec3::new(0.0, 0.5, 0.0)),
            Camera::default(),
        ));
        self.world.spawn((
            Name("Sun".to_string()),
            Transform::looking_at(Vec3::new(5.0, 8.0, 3.0), Vec3::ZERO),
            GlobalLight::default(),
        ));
        self.world.spawn((
            Name("Ground".to_string()),
            Transform { scale: Vec3::new(8.0, 1.0, 8.0), ..Transform::default() },
            Renderable { model: "primitive/plane".to_string(), casts_shadows: false },
        ));
        let cube_spots = [
            (Vec3::new(-1.5, 0.5, 0.0), 0.6),
            (Vec3::new(0.0, 0.5, 0.4), -0.9),
            (Vec3::new(1.6, 0.5, -1.2), 1.4),
        ];
        for (idx, (position, spin)) in cube_spots.into_iter().enumerate() {
            self.world.spawn((
                Name(format!("Cube {}", idx + 1)),
                Transform::from_translation(position),
                Renderable::default(),
                Spin(spin),
            ));
        }
        self.world.spawn((
            Name("Fill Light".to_string()),
            Transform::from_translation(Vec3::new(2.0, 2.5, 2.0)),
            PointLight { diffuse_color: Vec4::new(1.0, 0.85, 0.6, 1.0), ..PointLight::default() },
        ));
        self.world.spawn((
            Name("Sparks".to_string()),
            Transform::from_translation(Vec3::new(0.0, 1.5, 0.0)),
            ParticleEmitter::default(),
        ));
        self.world.spawn((Name("Terrain".to_string()), Transform::default(), Terrain::default()));
    }

    /// Advances the lightweight scene simulation.
    pub fn tick(&mut self, dt: f32) {
        let mut spinners = self.world.query::<(&Spin, &mut Transform)>();
        for (spin, mut transform) in spinners.iter_mut(&mut self.world) {
            transform.rotation = Quat::from_rotation_y(spin.0 * dt) * transform.rotation;
        }
        let mut emitters = self.world.query::<&mut ParticleEmitter>();
        for mut emitter in emitters.iter_mut(&mut self.world) {
            emitter.age += dt;
        }
    }

    pub fn camera_by_slot(&mut self, slot: &str) -> Option<CameraRig> {
        let mut cameras = self.world.query::<(&Camera, &Transform)>();
        cameras.iter(&self.world).find(|(camera, _)| camera.slot == slot).map(|(camera, transform)| {
            CameraRig {
                world_from_camera: transform.matrix(),
                fov_deg: camera.fov_deg,
                near: camera.near,
                far: camera.far,
            }
        })
    }

    pub fn collect_renderables(&mut self) -> Vec<RenderableDraw> {
        let mut renderables = self.world.query::<(&Renderable, &Transform)>();
        renderables
            .iter(&self.world)
            .map(|(renderable, transform)| RenderableDraw {
                model: renderable.model.clone(),
                world: transform.matrix(),
            })
            .collect()
    }

    pub fn sun_light(&mut self) -> Option<SunLight> {
        let mut lights = self.world.query::<(&GlobalLight, &Transform)>();
        lights.iter(&self.world).next().map(|(light, transform)| SunLight {
            direction: transform.forward(),
            ambient_color: light.ambient_color,
            ambient_intensity: light.ambient_intensity,
            diffuse_color: light.diffuse_color,
            diffuse_intensity: light.diffuse_intensity,
            fog_color: light.fog_color,
            fog_density: light.fog_density,
            fog_bottom: light.fog_bottom,
            fog_height: light.fog_height,
        })
    }

    pub fn point_lights(&mut self) -> Vec<PointLightDraw> {
        let mut lights = self.world.query::<(&PointLight, &Transform)>();
        lights
            .iter(&self.world)
            .map(|(light, transform)| PointLightDraw {
                position: transform.translation,
                color: light.diffuse_color,
                intensity: light.diffuse_intensity,
                range: light.range,
                attenuation: light.attenuation,
            })
            .collect()
    }

    /// Named entities in a stable order, for editor listings.
    pub fn list_named(&mut self) -> Vec<(Entity, String)> {
        let mut names = self.world.query::<(Entity, &Name)>();
        let mut entries: Vec<(Entity, String)> =
            names.iter(&self.world).map(|(entity, name)| (entity, name.0.clone())).collect();
        entries.sort_by_key(|(entity, _)| entity.index());
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_scene() -> RenderScene {
        let mut scene = RenderScene::new(WorldId(1));
        scene.populate_demo();
        scene
    }

    #[test]
    fn demo_scene_has_camera_sun_and_geometry() {
        let mut scene = demo_scene();
        assert!(scene.camera_by_slot("main").is_some());
        assert!(scene.camera_by_slot("background").is_none());
        assert!(scene.sun_light().is_some());
        let draws = scene.collect_renderables();
        assert_eq!(draws.len(), 4, "ground plane plus three cubes");
        assert_eq!(scene.point_lights().len(), 1);
    }

    #[test]
    fn named_listing_is_stable_and_complete() {
        let mut scene = demo_scene();
        let listed = scene.list_named();
        assert_eq!(listed.len(), 8);
        let names: Vec<&str> = listed.iter().map(|(_, n)| n.as_str()).collect();
        assert!(names.contains(&"Main Camera"));
        assert!(names.contains(&"Terrain"));
        assert_eq!(scene.list_named(), listed);
    }

    #[test]
    fn tick_spins_tagged_transforms() {
        let mut scene = demo_scene();
        let before = scene.collect_renderables();
        scene.tick(0.5);
        let after = scene.collect_renderables();
        let changed = before.iter().zip(&after).filter(|(a, b)| a.world != b.world).count();
        assert_eq!(changed, 3, "only the spinning cubes move");
    }

    #[test]
    fn looking_at_points_forward_axis_at_target() {
        let transform = Transform::looking_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        let forward = transform.forward();
        assert!((forward - Vec3::NEG_Z).length() < 1e-5);
        assert!((transform.translation - Vec3::new(0.0, 0.0, 5.0)).length() < 1e-5);
    }

    #[test]
    fn camera_rig_projects_points_in_front_of_the_camera() {
        let mut scene = demo_scene();
        let rig = scene.camera_by_slot("main").expect("main camera");
        let clip = rig.view_projection(800.0 / 600.0) * Vec4::new(0.0, 0.5, 0.0, 1.0);
        assert!(clip.w > 0.0, "target point lies in front of the camera");
    }
}
