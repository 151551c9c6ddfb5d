//! Fixed-function light setup
//!
//! Scene lights are enabled in layer order until the light limit is reached;
//! later lights are dropped. Solid-mode lights live in view space and are
//! configured in [`crate::config::DrawConfig::lights`].

use glam::{Mat4, Vec3};
use gpu_scene::{Light, LightKind, SceneLayer};

use crate::backend::{Capability, GpuBackend, LightParams, LightType, MAX_LIGHTS};
use crate::config::SolidLight;

/// Solid-mode lights beyond this many are ignored
pub const MAX_SOLID_LIGHTS: usize = 3;

/// Backend parameters of a scene light seen through `view`
///
/// Sun lights carry the direction towards the light, spots the direction the
/// cone points along. Every other kind is a point light.
pub fn light_params(light: &Light, view: &Mat4) -> LightParams {
    let color = Vec3::from(light.color) * light.energy;
    let mut params = LightParams {
        diffuse: color,
        specular: color,
        ..Default::default()
    };

    if light.kind == LightKind::Sun {
        params.kind = LightType::Sun;
        params.direction = view.transform_vector3(light.axis).normalize_or_zero();
        return params;
    }

    params.position = view.transform_point3(light.position);
    params.constant_attenuation = 1.0;
    if light.distance > 0.0 {
        params.linear_attenuation = light.att1 / light.distance;
        params.quadratic_attenuation = light.att2 / (light.distance * light.distance);
    }
    if light.kind == LightKind::Spot {
        params.kind = LightType::Spot;
        params.direction = view.transform_vector3(-light.axis).normalize_or_zero();
        params.spot_cutoff = light.spot_size.to_degrees() * 0.5;
        params.spot_exponent = 128.0 * light.spot_blend;
    } else {
        params.kind = LightType::Point;
    }
    params
}

fn disable_all<B: GpuBackend + ?Sized>(backend: &mut B) {
    for slot in 0..MAX_LIGHTS {
        backend.set_enabled(Capability::Light(slot as u8), false);
    }
}

/// Enable the visible lights of `layer`, at most `limit` of them
///
/// Returns the number of lights enabled.
pub(crate) fn scene_object_lights<B: GpuBackend + ?Sized>(
    backend: &mut B,
    layer: &SceneLayer,
    view: &Mat4,
    ortho: bool,
    limit: usize,
) -> usize {
    disable_all(backend);
    // Perspective views need the real eye position for speculars
    backend.set_local_viewer(!ortho);

    let limit = limit.min(MAX_LIGHTS).min(backend.limits().max_lights);
    let mut count = 0;
    for light in layer.visible_lights() {
        if count == limit {
            tracing::trace!(layer = %layer.name, light = %light.name, "light limit reached");
            break;
        }
        backend.set_light(count, &light_params(light, view));
        backend.set_enabled(Capability::Light(count as u8), true);
        count += 1;
    }
    count
}

/// The built-in solid lights, used when no configured light is enabled
pub fn fallback_solid_lights() -> Vec<SolidLight> {
    crate::config::DrawConfig::default().lights
}

/// Enable the solid-mode lights, keeping their slot numbers
///
/// Returns the number of lights enabled.
pub(crate) fn default_lights<B: GpuBackend + ?Sized>(
    backend: &mut B,
    lights: &[SolidLight],
) -> usize {
    let fallback;
    let lights = if lights.iter().any(|light| light.enabled) {
        lights
    } else {
        tracing::debug!("no solid light enabled, using the built-in set");
        fallback = fallback_solid_lights();
        &fallback
    };

    backend.set_local_viewer(false);
    let mut count = 0;
    for slot in 0..MAX_LIGHTS {
        let light = lights
            .get(slot)
            .filter(|light| slot < MAX_SOLID_LIGHTS && light.enabled);
        match light {
            Some(light) => {
                let params = LightParams {
                    kind: LightType::Sun,
                    direction: Vec3::from(light.direction).normalize_or_zero(),
                    diffuse: Vec3::from(light.diffuse),
                    specular: Vec3::from(light.specular),
                    ..Default::default()
                };
                backend.set_light(slot, &params);
                backend.set_enabled(Capability::Light(slot as u8), true);
                count += 1;
            }
            None => backend.set_enabled(Capability::Light(slot as u8), false),
        }
    }
    count
}
