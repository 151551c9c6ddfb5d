//! Light sources and scene layers

use glam::Vec3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LightKind {
    /// Directional, infinitely far away
    Sun,
    #[default]
    Point,
    Spot,
    Hemi,
    Area,
}

/// A light in world space
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub name: String,
    pub kind: LightKind,
    pub color: [f32; 3],
    pub energy: f32,
    pub position: Vec3,
    /// Local Z axis of the light object in world space; lights shine along -Z
    pub axis: Vec3,
    /// Falloff distance
    pub distance: f32,
    /// Linear attenuation factor
    pub att1: f32,
    /// Quadratic attenuation factor
    pub att2: f32,
    /// Full cone angle in radians
    pub spot_size: f32,
    /// Cone edge softness, 0..1
    pub spot_blend: f32,
    pub visible: bool,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            name: "Light".to_string(),
            kind: LightKind::Point,
            color: [1.0, 1.0, 1.0],
            energy: 1.0,
            position: Vec3::ZERO,
            axis: Vec3::Z,
            distance: 25.0,
            att1: 0.0,
            att2: 1.0,
            spot_size: 45f32.to_radians(),
            spot_blend: 0.15,
            visible: true,
        }
    }
}

impl Light {
    pub fn sun(name: impl Into<String>, axis: Vec3) -> Self {
        Self {
            name: name.into(),
            kind: LightKind::Sun,
            axis,
            ..Default::default()
        }
    }

    pub fn point(name: impl Into<String>, position: Vec3) -> Self {
        Self {
            name: name.into(),
            kind: LightKind::Point,
            position,
            ..Default::default()
        }
    }

    pub fn spot(name: impl Into<String>, position: Vec3, axis: Vec3) -> Self {
        Self {
            name: name.into(),
            kind: LightKind::Spot,
            position,
            axis,
            ..Default::default()
        }
    }
}

/// The set of lights visible in one view layer, in layer order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SceneLayer {
    pub name: String,
    pub lights: Vec<Light>,
}

impl SceneLayer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lights: Vec::new(),
        }
    }

    pub fn with_light(mut self, light: Light) -> Self {
        self.lights.push(light);
        self
    }

    pub fn visible_lights(&self) -> impl Iterator<Item = &Light> {
        self.lights.iter().filter(|l| l.visible)
    }
}
