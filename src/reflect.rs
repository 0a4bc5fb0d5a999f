//! Declarative property table over the scene components.
//!
//! The inspector reads this registry to build its widgets; gets and sets flow
//! through plain function pointers into the scene world. Registration has no
//! effect on render behaviour.

use crate::scene::{
    Camera, GlobalLight, GrassPatch, ParticleEmitter, PointLight, RenderScene, Renderable, Terrain,
};
use bevy_ecs::entity::Entity;
use glam::{Vec2, Vec4};

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Float(f32),
    Int(i32),
    Bool(bool),
    Str(String),
    Vec2(Vec2),
    Vec4(Vec4),
    Color(Vec4),
    Resource(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Model,
    Material,
}

impl ResourceKind {
    /// File filter shown next to resource pickers.
    pub fn filter_label(self) -> &'static str {
        match self {
            ResourceKind::Model => "Model (*.json)",
            ResourceKind::Material => "Material (*.json)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertyKind {
    /// `step == 0.0` leaves the widget drag speed at its default.
    Decimal { min: f32, max: f32, step: f32 },
    Int { min: i32, max: i32 },
    Bool,
    Str,
    Vec2,
    Vec4,
    Color,
    Resource { kind: ResourceKind },
}

pub type PropertyGetter = fn(&RenderScene, Entity) -> Option<PropertyValue>;
pub type PropertySetter = fn(&mut RenderScene, Entity, PropertyValue);
pub type ArrayCountFn = fn(&RenderScene, Entity) -> usize;
pub type ArrayAddFn = fn(&mut RenderScene, Entity);
pub type ArrayRemoveFn = fn(&mut RenderScene, Entity, usize);
pub type ArrayItemGetter = fn(&RenderScene, Entity, usize) -> Option<PropertyValue>;
pub type ArrayItemSetter = fn(&mut RenderScene, Entity, usize, PropertyValue);

pub struct ArrayItemDescriptor {
    pub label: &'static str,
    pub kind: PropertyKind,
    pub get: ArrayItemGetter,
    pub set: ArrayItemSetter,
}

pub enum PropertyAccess {
    Value {
        get: PropertyGetter,
        set: PropertySetter,
    },
    Array {
        count: ArrayCountFn,
        add: ArrayAddFn,
        remove: ArrayRemoveFn,
        items: Vec<ArrayItemDescriptor>,
    },
}

pub struct PropertyDescriptor {
    pub label: &'static str,
    pub kind: PropertyKind,
    pub access: PropertyAccess,
}

/// One component kind as the inspector sees it.
pub struct ComponentProperties {
    pub component: &'static str,
    pub label: &'static str,
    pub has: fn(&RenderScene, Entity) -> bool,
    pub properties: Vec<PropertyDescriptor>,
}

#[derive(Default)]
pub struct PropertyRegistry {
    components: Vec<ComponentProperties>,
}

impl PropertyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, component: ComponentProperties) {
        if let Some(existing) =
            self.components.iter_mut().find(|c| c.component == component.component)
        {
            *existing = component;
        } else {
            self.components.push(component);
        }
    }

    pub fn components(&self) -> &[ComponentProperties] {
        &self.components
    }

    /// Registered component kinds present on `entity`, in registration order.
    pub fn components_on<'a>(
        &'a self,
        scene: &'a RenderScene,
        entity: Entity,
    ) -> impl Iterator<Item = &'a ComponentProperties> + 'a {
        self.components.iter().filter(move |c| (c.has)(scene, entity))
    }
}

fn value(label: &'static str, kind: PropertyKind, get: PropertyGetter, set: PropertySetter) -> PropertyDescriptor {
    PropertyDescriptor { label, kind, access: PropertyAccess::Value { get, set } }
}

fn decimal(min: f32, max: f32, step: f32) -> PropertyKind {
    PropertyKind::Decimal { min, max, step }
}

/// Registers every component exposed by the renderer. Called once at startup.
pub fn register_render_components(registry: &mut PropertyRegistry) {
    registry.register(ComponentProperties {
        component: "particle_emitter",
        label: "Particle Emitter",
        has: |scene, entity| scene.world().get::<ParticleEmitter>(entity).is_some(),
        properties: vec![
            value(
                "Initial life",
                PropertyKind::Vec2,
                |scene, entity| {
                    scene.world().get::<ParticleEmitter>(entity).map(|e| PropertyValue::Vec2(e.initial_life))
                },
                |scene, entity, v| {
                    if let PropertyValue::Vec2(v) = v {
                        if let Some(mut e) = scene.world_mut().get_mut::<ParticleEmitter>(entity) {
                            e.initial_life = v;
                        }
                    }
                },
            ),
            value(
                "Initial size",
                PropertyKind::Vec2,
                |scene, entity| {
                    scene.world().get::<ParticleEmitter>(entity).map(|e| PropertyValue::Vec2(e.initial_size))
                },
                |scene, entity, v| {
                    if let PropertyValue::Vec2(v) = v {
                        if let Some(mut e) = scene.world_mut().get_mut::<ParticleEmitter>(entity) {
                            e.initial_size = v;
                        }
                    }
                },
            ),
            value(
                "Spawn period",
                PropertyKind::Vec2,
                |scene, entity| {
                    scene.world().get::<ParticleEmitter>(entity).map(|e| PropertyValue::Vec2(e.spawn_period))
                },
                |scene, entity, v| {
                    if let PropertyValue::Vec2(v) = v {
                        if let Some(mut e) = scene.world_mut().get_mut::<ParticleEmitter>(entity) {
                            e.spawn_period = v;
                        }
                    }
                },
            ),
        ],
    });

    registry.register(ComponentProperties {
        component: "camera",
        label: "Camera",
        has: |scene, entity| scene.world().get::<Camera>(entity).is_some(),
        properties: vec![
            value(
                "Slot",
                PropertyKind::Str,
                |scene, entity| {
                    scene.world().get::<Camera>(entity).map(|c| PropertyValue::Str(c.slot.clone()))
                },
                |scene, entity, v| {
                    if let PropertyValue::Str(v) = v {
                        if let Some(mut c) = scene.world_mut().get_mut::<Camera>(entity) {
                            c.slot = v;
                        }
                    }
                },
            ),
            value(
                "FOV",
                decimal(1.0, 179.0, 1.0),
                |scene, entity| {
                    scene.world().get::<Camera>(entity).map(|c| PropertyValue::Float(c.fov_deg))
                },
                |scene, entity, v| {
                    if let PropertyValue::Float(v) = v {
                        if let Some(mut c) = scene.world_mut().get_mut::<Camera>(entity) {
                            c.fov_deg = v;
                        }
                    }
                },
            ),
            value(
                "Near",
                decimal(0.0, f32::MAX, 0.0),
                |scene, entity| scene.world().get::<Camera>(entity).map(|c| PropertyValue::Float(c.near)),
                |scene, entity, v| {
                    if let PropertyValue::Float(v) = v {
                        if let Some(mut c) = scene.world_mut().get_mut::<Camera>(entity) {
                            c.near = v;
                        }
                    }
                },
            ),
            value(
                "Far",
                decimal(0.0, f32::MAX, 0.0),
                |scene, entity| scene.world().get::<Camera>(entity).map(|c| PropertyValue::Float(c.far)),
                |scene, entity, v| {
                    if let PropertyValue::Float(v) = v {
                        if let Some(mut c) = scene.world_mut().get_mut::<Camera>(entity) {
                            c.far = v;
                        }
                    }
                },
            ),
        ],
    });

    registry.register(ComponentProperties {
        component: "renderable",
        label: "Renderable",
        has: |scene, entity| scene.world().get::<Renderable>(entity).is_some(),
        properties: vec![value(
            "Source",
            PropertyKind::Resource { kind: ResourceKind::Model },
            |scene, entity| {
                scene.world().get::<Renderable>(entity).map(|r| PropertyValue::Resource(r.model.clone()))
            },
            |scene, entity, v| {
                if let PropertyValue::Resource(v) | PropertyValue::Str(v) = v {
                    if let Some(mut r) = scene.world_mut().get_mut::<Renderable>(entity) {
                        r.model = v;
                    }
                }
            },
        )],
    });

    registry.register(ComponentProperties {
        component: "global_light",
        label: "Global Light",
        has: |scene, entity| scene.world().get::<GlobalLight>(entity).is_some(),
        properties: vec![
            value(
                "Ambient intensity",
                decimal(0.0, 1.0, 0.05),
                |scene, entity| {
                    scene.world().get::<GlobalLight>(entity).map(|l| PropertyValue::Float(l.ambient_intensity))
                },
                |scene, entity, v| {
                    if let PropertyValue::Float(v) = v {
                        if let Some(mut l) = scene.world_mut().get_mut::<GlobalLight>(entity) {
                            l.ambient_intensity = v;
                        }
                    }
                },
            ),
            value(
                "Shadow cascades",
                PropertyKind::Vec4,
                |scene, entity| {
                    scene.world().get::<GlobalLight>(entity).map(|l| PropertyValue::Vec4(l.shadow_cascades))
                },
                |scene, entity, v| {
                    if let PropertyValue::Vec4(v) = v {
                        if let Some(mut l) = scene.world_mut().get_mut::<GlobalLight>(entity) {
                            l.shadow_cascades = v;
                        }
                    }
                },
            ),
            value(
                "Diffuse intensity",
                decimal(0.0, 1.0, 0.05),
                |scene, entity| {
                    scene.world().get::<GlobalLight>(entity).map(|l| PropertyValue::Float(l.diffuse_intensity))
                },
                |scene, entity, v| {
                    if let PropertyValue::Float(v) = v {
                        if let Some(mut l) = scene.world_mut().get_mut::<GlobalLight>(entity) {
                            l.diffuse_intensity = v;
                        }
                    }
                },
            ),
            value(
                "Fog density",
                decimal(0.0, 1.0, 0.01),
                |scene, entity| {
                    scene.world().get::<GlobalLight>(entity).map(|l| PropertyValue::Float(l.fog_density))
                },
                |scene, entity, v| {
                    if let PropertyValue::Float(v) = v {
                        if let Some(mut l) = scene.world_mut().get_mut::<GlobalLight>(entity) {
                            l.fog_density = v;
                        }
                    }
                },
            ),
            value(
                "Fog bottom",
                decimal(f32::MIN, f32::MAX, 1.0),
                |scene, entity| {
                    scene.world().get::<GlobalLight>(entity).map(|l| PropertyValue::Float(l.fog_bottom))
                },
                |scene, entity, v| {
                    if let PropertyValue::Float(v) = v {
                        if let Some(mut l) = scene.world_mut().get_mut::<GlobalLight>(entity) {
                            l.fog_bottom = v;
                        }
                    }
                },
            ),
            value(
                "Fog height",
                decimal(0.01, f32::MAX, 1.0),
                |scene, entity| {
                    scene.world().get::<GlobalLight>(entity).map(|l| PropertyValue::Float(l.fog_height))
                },
                |scene, entity, v| {
                    if let PropertyValue::Float(v) = v {
                        if let Some(mut l) = scene.world_mut().get_mut::<GlobalLight>(entity) {
                            l.fog_height = v;
                        }
                    }
                },
            ),
            value(
                "Ambient color",
                PropertyKind::Color,
                |scene, entity| {
                    scene.world().get::<GlobalLight>(entity).map(|l| PropertyValue::Color(l.ambient_color))
                },
                |scene, entity, v| {
                    if let PropertyValue::Color(v) = v {
                        if let Some(mut l) = scene.world_mut().get_mut::<GlobalLight>(entity) {
                            l.ambient_color = v;
                        }
                    }
                },
            ),
            value(
                "Diffuse color",
                PropertyKind::Color,
                |scene, entity| {
                    scene.world().get::<GlobalLight>(entity).map(|l| PropertyValue::Color(l.diffuse_color))
                },
                |scene, entity, v| {
                    if let PropertyValue::Color(v) = v {
                        if let Some(mut l) = scene.world_mut().get_mut::<GlobalLight>(entity) {
                            l.diffuse_color = v;
                        }
                    }
                },
            ),
            value(
                "Fog color",
                PropertyKind::Color,
                |scene, entity| {
                    scene.world().get::<GlobalLight>(entity).map(|l| PropertyValue::Color(l.fog_color))
                },
                |scene, entity, v| {
                    if let PropertyValue::Color(v) = v {
                        if let Some(mut l) = scene.world_mut().get_mut::<GlobalLight>(entity) {
                            l.fog_color = v;
                        }
                    }
                },
            ),
        ],
    });

    registry.register(ComponentProperties {
        component: "point_light",
        label: "Point Light",
        has: |scene, entity| scene.world().get::<PointLight>(entity).is_some(),
        properties: vec![
            value(
                "Cast shadows",
                PropertyKind::Bool,
                |scene, entity| {
                    scene.world().get::<PointLight>(entity).map(|l| PropertyValue::Bool(l.cast_shadows))
                },
                |scene, entity, v| {
                    if let PropertyValue::Bool(v) = v {
                        if let Some(mut l) = scene.world_mut().get_mut::<PointLight>(entity) {
                            l.cast_shadows = v;
                        }
                    }
                },
            ),
            value(
                "Diffuse intensity",
                decimal(0.0, 1.0, 0.05),
                |scene, entity| {
                    scene.world().get::<PointLight>(entity).map(|l| PropertyValue::Float(l.diffuse_intensity))
                },
                |scene, entity, v| {
                    if let PropertyValue::Float(v) = v {
                        if let Some(mut l) = scene.world_mut().get_mut::<PointLight>(entity) {
                            l.diffuse_intensity = v;
                        }
                    }
                },
            ),
            value(
                "Diffuse color",
                PropertyKind::Color,
                |scene, entity| {
                    scene.world().get::<PointLight>(entity).map(|l| PropertyValue::Color(l.diffuse_color))
                },
                |scene, entity, v| {
                    if let PropertyValue::Color(v) = v {
                        if let Some(mut l) = scene.world_mut().get_mut::<PointLight>(entity) {
                            l.diffuse_color = v;
                        }
                    }
                },
            ),
            value(
                "Specular color",
                PropertyKind::Color,
                |scene, entity| {
                    scene.world().get::<PointLight>(entity).map(|l| PropertyValue::Color(l.specular_color))
                },
                |scene, entity, v| {
                    if let PropertyValue::Color(v) = v {
                        if let Some(mut l) = scene.world_mut().get_mut::<PointLight>(entity) {
                            l.specular_color = v;
                        }
                    }
                },
            ),
            value(
                "FOV",
                decimal(0.0, 360.0, 5.0),
                |scene, entity| scene.world().get::<PointLight>(entity).map(|l| PropertyValue::Float(l.fov_deg)),
                |scene, entity, v| {
                    if let PropertyValue::Float(v) = v {
                        if let Some(mut l) = scene.world_mut().get_mut::<PointLight>(entity) {
                            l.fov_deg = v;
                        }
                    }
                },
            ),
            value(
                "Attenuation",
                decimal(0.0, 1000.0, 0.1),
                |scene, entity| {
                    scene.world().get::<PointLight>(entity).map(|l| PropertyValue::Float(l.attenuation))
                },
                |scene, entity, v| {
                    if let PropertyValue::Float(v) = v {
                        if let Some(mut l) = scene.world_mut().get_mut::<PointLight>(entity) {
                            l.attenuation = v;
                        }
                    }
                },
            ),
            value(
                "Range",
                decimal(0.0, f32::MAX, 1.0),
                |scene, entity| scene.world().get::<PointLight>(entity).map(|l| PropertyValue::Float(l.range)),
                |scene, entity, v| {
                    if let PropertyValue::Float(v) = v {
                        if let Some(mut l) = scene.world_mut().get_mut::<PointLight>(entity) {
                            l.range = v;
                        }
                    }
                },
            ),
        ],
    });

    registry.register(ComponentProperties {
        component: "terrain",
        label: "Terrain",
        has: |scene, entity| scene.world().get::<Terrain>(entity).is_some(),
        properties: vec![
            value(
                "Material",
                PropertyKind::Resource { kind: ResourceKind::Material },
                |scene, entity| {
                    scene.world().get::<Terrain>(entity).map(|t| PropertyValue::Resource(t.material.clone()))
                },
                |scene, entity, v| {
                    if let PropertyValue::Resource(v) | PropertyValue::Str(v) = v {
                        if let Some(mut t) = scene.world_mut().get_mut::<Terrain>(entity) {
                            t.material = v;
                        }
                    }
                },
            ),
            value(
                "XZ scale",
                decimal(0.0, f32::MAX, 0.0),
                |scene, entity| scene.world().get::<Terrain>(entity).map(|t| PropertyValue::Float(t.xz_scale)),
                |scene, entity, v| {
                    if let PropertyValue::Float(v) = v {
                        if let Some(mut t) = scene.world_mut().get_mut::<Terrain>(entity) {
                            t.xz_scale = v;
                        }
                    }
                },
            ),
            value(
                "Height scale",
                decimal(0.0, f32::MAX, 0.0),
                |scene, entity| {
                    scene.world().get::<Terrain>(entity).map(|t| PropertyValue::Float(t.height_scale))
                },
                |scene, entity, v| {
                    if let PropertyValue::Float(v) = v {
                        if let Some(mut t) = scene.world_mut().get_mut::<Terrain>(entity) {
                            t.height_scale = v;
                        }
                    }
                },
            ),
            value(
                "Grass distance",
                PropertyKind::Int { min: 0, max: i32::MAX },
                |scene, entity| {
                    scene.world().get::<Terrain>(entity).map(|t| PropertyValue::Int(t.grass_distance))
                },
                |scene, entity, v| {
                    if let PropertyValue::Int(v) = v {
                        if let Some(mut t) = scene.world_mut().get_mut::<Terrain>(entity) {
                            t.grass_distance = v;
                        }
                    }
                },
            ),
            PropertyDescriptor {
                label: "Grass",
                kind: PropertyKind::Int { min: 0, max: i32::MAX },
                access: PropertyAccess::Array {
                    count: |scene, entity| {
                        scene.world().get::<Terrain>(entity).map(|t| t.grass.len()).unwrap_or(0)
                    },
                    add: |scene, entity| {
                        if let Some(mut t) = scene.world_mut().get_mut::<Terrain>(entity) {
                            t.grass.push(GrassPatch::default());
                        }
                    },
                    remove: |scene, entity, index| {
                        if let Some(mut t) = scene.world_mut().get_mut::<Terrain>(entity) {
                            if index < t.grass.len() {
                                t.grass.remove(index);
                            }
                        }
                    },
                    items: vec![
                        ArrayItemDescriptor {
                            label: "Mesh",
                            kind: PropertyKind::Resource { kind: ResourceKind::Model },
                            get: |scene, entity, index| {
                                scene
                                    .world()
                                    .get::<Terrain>(entity)?
                                    .grass
                                    .get(index)
                                    .map(|g| PropertyValue::Resource(g.mesh.clone()))
                            },
                            set: |scene, entity, index, v| {
                                if let PropertyValue::Resource(v) | PropertyValue::Str(v) = v {
                                    if let Some(mut t) = scene.world_mut().get_mut::<Terrain>(entity) {
                                        if let Some(g) = t.grass.get_mut(index) {
                                            g.mesh = v;
                                        }
                                    }
                                }
                            },
                        },
                        ArrayItemDescriptor {
                            label: "Ground",
                            kind: PropertyKind::Int { min: 0, max: 4 },
                            get: |scene, entity, index| {
                                scene
                                    .world()
                                    .get::<Terrain>(entity)?
                                    .grass
                                    .get(index)
                                    .map(|g| PropertyValue::Int(g.ground as i32))
                            },
                            set: |scene, entity, index, v| {
                                if let PropertyValue::Int(v) = v {
                                    if let Some(mut t) = scene.world_mut().get_mut::<Terrain>(entity) {
                                        if let Some(g) = t.grass.get_mut(index) {
                                            g.ground = v.clamp(0, 4) as u32;
                                        }
                                    }
                                }
                            },
                        },
                        ArrayItemDescriptor {
                            label: "Density",
                            kind: PropertyKind::Int { min: 0, max: 1000 },
                            get: |scene, entity, index| {
                                scene
                                    .world()
                                    .get::<Terrain>(entity)?
                                    .grass
                                    .get(index)
                                    .map(|g| PropertyValue::Int(g.density as i32))
                            },
                            set: |scene, entity, index, v| {
                                if let PropertyValue::Int(v) = v {
                                    if let Some(mut t) = scene.world_mut().get_mut::<Terrain>(entity) {
                                        if let Some(g) = t.grass.get_mut(index) {
                                            g.density = v.max(0) as u32;
                                        }
                                    }
                                }
                            },
                        },
                    ],
                },
            },
        ],
    });
}
