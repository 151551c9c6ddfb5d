//! Drawable objects and dupli instances

use crate::material::Material;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(pub u32);

/// A drawable object and its material slots
///
/// Empty slots (`None`) draw with the default material.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    pub id: ObjectId,
    pub name: String,
    /// Object color, used by materials with `use_object_color`
    pub color: [f32; 4],
    pub materials: Vec<Option<Material>>,
}

impl Object {
    pub fn new(id: ObjectId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            color: [1.0, 1.0, 1.0, 1.0],
            materials: Vec::new(),
        }
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.materials.push(Some(material));
        self
    }

    pub fn with_empty_slot(mut self) -> Self {
        self.materials.push(None);
        self
    }

    pub fn with_color(mut self, color: [f32; 4]) -> Self {
        self.color = color;
        self
    }

    /// Number of slots, never less than one (an object without materials
    /// still draws with the default material)
    pub fn material_count(&self) -> usize {
        self.materials.len().max(1)
    }
}

/// Per-instance overrides of an instanced (dupli) object
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DupliObject {
    pub index: u32,
    /// Replaces the object color for this instance
    pub color: Option<[f32; 4]>,
    pub random_id: u32,
}
