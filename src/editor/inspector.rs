use bevy_ecs::prelude::Entity;

use crate::reflect::{PropertyAccess, PropertyKind, PropertyRegistry, PropertyValue};
use crate::scene::{Name, RenderScene};

/// Generic component editor built from the property registry. It never names
/// concrete component types; adding a component to the registry is enough to
/// make it editable here.
pub struct Inspector {
    pub open: bool,
}

impl Inspector {
    pub fn new() -> Self {
        Self { open: true }
    }

    pub fn show(
        &mut self,
        ctx: &egui::Context,
        registry: &PropertyRegistry,
        scene: Option<&mut RenderScene>,
        selected: Option<Entity>,
    ) {
        if !self.open {
            return;
        }
        let mut open = self.open;
        egui::Window::new("Inspector")
            .id(egui::Id::new("inspector"))
            .open(&mut open)
            .default_width(320.0)
            .show(ctx, |ui| {
                let (Some(scene), Some(entity)) = (scene, selected) else {
                    ui.label("Select an entity to edit its components.");
                    return;
                };
                entity_ui(ui, registry, scene, entity);
            });
        self.open = open;
    }
}

impl Default for Inspector {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn entity_ui(
    ui: &mut egui::Ui,
    registry: &PropertyRegistry,
    scene: &mut RenderScene,
    entity: Entity,
) {
    if !scene.world().entities().contains(entity) {
        ui.label("The selected entity no longer exists.");
        return;
    }
    let name = scene
        .world()
        .get::<Name>(entity)
        .map(|name| name.0.clone())
        .unwrap_or_else(|| format!("{entity:?}"));
    ui.strong(name);
    ui.separator();

    // Indices instead of the filter iterator, so the setters below can take
    // the scene mutably.
    let visible: Vec<usize> = registry
        .components()
        .iter()
        .enumerate()
        .filter(|(_, component)| (component.has)(scene, entity))
        .map(|(index, _)| index)
        .collect();
    if visible.is_empty() {
        ui.label("No editable components.");
        return;
    }

    for index in visible {
        let component = &registry.components()[index];
        egui::CollapsingHeader::new(component.label).default_open(true).show(ui, |ui| {
            for property in &component.properties {
                match &property.access {
                    PropertyAccess::Value { get, set } => {
                        let Some(value) = get(scene, entity) else {
                            continue;
                        };
                        if let Some(updated) = property_widget(ui, property.label, property.kind, value)
                        {
                            set(scene, entity, updated);
                        }
                    }
                    PropertyAccess::Array { count, add, remove, items } => {
                        let len = count(scene, entity);
                        ui.collapsing(property.label, |ui| {
                            ui.label(format!("{len} entries"));
                            let mut pending_remove = None;
                            for item_index in 0..len {
                                ui.horizontal(|ui| {
                                    ui.label(format!("#{item_index}"));
                                    if ui.button("Remove").clicked() {
                                        pending_remove = Some(item_index);
                                    }
                                });
                                for item in items {
                                    let Some(value) = (item.get)(scene, entity, item_index) else {
                                        continue;
                                    };
                                    if let Some(updated) =
                                        property_widget(ui, item.label, item.kind, value)
                                    {
                                        (item.set)(scene, entity, item_index, updated);
                                    }
                                }
                                ui.separator();
                            }
                            if ui.button("Add").clicked() {
                                add(scene, entity);
                            }
                            if let Some(item_index) = pending_remove {
                                remove(scene, entity, item_index);
                            }
                        });
                    }
                }
            }
        });
    }
}

/// Draws the widget for one property and returns the edited value, if any.
fn property_widget(
    ui: &mut egui::Ui,
    label: &str,
    kind: PropertyKind,
    value: PropertyValue,
) -> Option<PropertyValue> {
    match kind {
        PropertyKind::Decimal { min, max, step } => {
            let PropertyValue::Float(mut v) = value else {
                return None;
            };
            let mut drag = egui::DragValue::new(&mut v).range(min..=max);
            if step > 0.0 {
                drag = drag.speed(step);
            }
            let changed = ui
                .horizontal(|ui| {
                    ui.label(label);
                    ui.add(drag).changed()
                })
                .inner;
            changed.then_some(PropertyValue::Float(v))
        }
        PropertyKind::Int { min, max } => {
            let PropertyValue::Int(mut v) = value else {
                return None;
            };
            let changed = ui
                .horizontal(|ui| {
                    ui.label(label);
                    ui.add(egui::DragValue::new(&mut v).range(min..=max)).changed()
                })
                .inner;
            changed.then_some(PropertyValue::Int(v))
        }
        PropertyKind::Bool => {
            let PropertyValue::Bool(mut v) = value else {
                return None;
            };
            ui.checkbox(&mut v, label).changed().then_some(PropertyValue::Bool(v))
        }
        PropertyKind::Str => {
            let PropertyValue::Str(mut v) = value else {
                return None;
            };
            let changed = ui
                .horizontal(|ui| {
                    ui.label(label);
                    ui.text_edit_singleline(&mut v).changed()
                })
                .inner;
            changed.then_some(PropertyValue::Str(v))
        }
        PropertyKind::Vec2 => {
            let PropertyValue::Vec2(mut v) = value else {
                return None;
            };
            let changed = ui
                .horizontal(|ui| {
                    ui.label(label);
                    let x = ui.add(egui::DragValue::new(&mut v.x).speed(0.05)).changed();
                    let y = ui.add(egui::DragValue::new(&mut v.y).speed(0.05)).changed();
                    x || y
                })
                .inner;
            changed.then_some(PropertyValue::Vec2(v))
        }
        PropertyKind::Vec4 => {
            let PropertyValue::Vec4(mut v) = value else {
                return None;
            };
            let changed = ui
                .horizontal(|ui| {
                    ui.label(label);
                    let x = ui.add(egui::DragValue::new(&mut v.x).speed(0.05)).changed();
                    let y = ui.add(egui::DragValue::new(&mut v.y).speed(0.05)).changed();
                    let z = ui.add(egui::DragValue::new(&mut v.z).speed(0.05)).changed();
                    let w = ui.add(egui::DragValue::new(&mut v.w).speed(0.05)).changed();
                    x || y || z || w
                })
                .inner;
            changed.then_some(PropertyValue::Vec4(v))
        }
        PropertyKind::Color => {
            let PropertyValue::Color(v) = value else {
                return None;
            };
            let mut rgba = v.to_array();
            let changed = ui
                .horizontal(|ui| {
                    ui.label(label);
                    ui.color_edit_button_rgba_unmultiplied(&mut rgba).changed()
                })
                .inner;
            changed.then_some(PropertyValue::Color(glam::Vec4::from_array(rgba)))
        }
        PropertyKind::Resource { kind } => {
            let (PropertyValue::Resource(mut v) | PropertyValue::Str(mut v)) = value else {
                return None;
            };
            let changed = ui
                .horizontal(|ui| {
                    ui.label(label);
                    ui.add(
                        egui::TextEdit::singleline(&mut v)
                            .hint_text(kind.filter_label())
                            .desired_width(180.0),
                    )
                    .changed()
                })
                .inner;
            changed.then_some(PropertyValue::Resource(v))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::register_render_components;
    use crate::scene::WorldId;

    fn run_ui(mut body: impl FnMut(&mut egui::Ui)) {
        let ctx = egui::Context::default();
        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            egui::CentralPanel::default().show(ctx, |ui| body(ui));
        });
    }

    #[test]
    fn widgets_without_interaction_report_no_edit() {
        run_ui(|ui| {
            let out = property_widget(
                ui,
                "FOV",
                PropertyKind::Decimal { min: 1.0, max: 179.0, step: 1.0 },
                PropertyValue::Float(60.0),
            );
            assert_eq!(out, None);
        });
    }

    #[test]
    fn mismatched_value_kind_draws_nothing_and_reports_no_edit() {
        run_ui(|ui| {
            let out = property_widget(ui, "Flag", PropertyKind::Bool, PropertyValue::Float(1.0));
            assert_eq!(out, None);
        });
    }

    #[test]
    fn entity_ui_walks_every_registered_component_of_the_demo_scene() {
        let mut registry = PropertyRegistry::new();
        register_render_components(&mut registry);
        let mut scene = RenderScene::new(WorldId(1));
        scene.populate_demo();
        let entities: Vec<Entity> = scene.list_named().into_iter().map(|(e, _)| e).collect();
        run_ui(|ui| {
            for entity in &entities {
                ui.push_id(entity, |ui| entity_ui(ui, &registry, &mut scene, *entity));
            }
        });
    }

    #[test]
    fn entity_ui_survives_a_despawned_selection() {
        let registry = PropertyRegistry::new();
        let mut scene = RenderScene::new(WorldId(1));
        scene.populate_demo();
        let entity = scene.list_named()[0].0;
        scene.world_mut().despawn(entity);
        run_ui(|ui| entity_ui(ui, &registry, &mut scene, entity));
    }
}
