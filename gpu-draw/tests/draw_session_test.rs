//! Integration test for a frame of scene drawing
//!
//! Drives the public API the way a viewport draw loop does: baseline state,
//! lights, two-pass materials, texface pages, nested snapshots and picking,
//! then checks the state the backend is left in.

use glam::{Mat4, Vec3};
use gpu_draw::backend::{BlendFunc, Capability, CompareFunc};
use gpu_draw::{
    AlphaBlend, BackendCall, BindOutcome, DrawConfig, GpuBackend, GpuContext, MaterialPassParams,
    RecordingBackend, SkipReason, StateMask, TexPageOutcome,
};
use gpu_scene::{
    Image, ImageBuffer, ImageId, ImageLibrary, Light, Material, MaterialBlend, Object, ObjectId,
    SceneLayer, TexPoly,
};

fn context() -> GpuContext<RecordingBackend> {
    let mut ctx = GpuContext::new(RecordingBackend::new(), &DrawConfig::default());
    ctx.state_init();
    ctx
}

fn scene_images() -> ImageLibrary {
    let mut images = ImageLibrary::new();
    images.insert(Image::new(ImageId(1), "bricks", ImageBuffer::solid(16, 16, [150; 4])));
    images.insert(Image::new(ImageId(2), "grass", ImageBuffer::solid(8, 8, [60; 4])));
    images
}

fn house() -> Object {
    Object::new(ObjectId(1), "house")
        .with_material(Material::named("walls").with_texture(ImageId(1)))
        .with_material(Material::named("windows").with_blend(MaterialBlend::AlphaBlend, 0.5))
        .with_material(Material::named("roof"))
}

/// Draws every slot that binds and returns the bound indices
fn draw_pass(
    ctx: &mut GpuContext<RecordingBackend>,
    images: &ImageLibrary,
    object: &Object,
    params: MaterialPassParams,
) -> (Vec<usize>, bool) {
    let mut session = ctx.begin_object_materials(images, object, params);
    let mut drawn = Vec::new();
    for index in 0..object.material_count() {
        if session.bind_material(index) == BindOutcome::Bound {
            drawn.push(index);
        }
    }
    session.unbind_material();
    let deferred = session.deferred_alpha();
    session.end().expect("all materials unbound");
    (drawn, deferred)
}

#[test]
fn test_state_init_baseline() {
    let ctx = context();
    let backend = ctx.backend();
    assert_eq!(backend.depth_func(), CompareFunc::LessEqual);
    assert!(backend.depth_mask());
    assert_eq!(backend.depth_range(), [0.0, 1.0]);
    assert_eq!(backend.blend_func(), BlendFunc::ALPHA);
    assert!(backend.is_enabled(Capability::Normalize));
    assert!(backend.is_enabled(Capability::Dither));
    assert!(!backend.is_enabled(Capability::Blend));
    assert!(!backend.is_enabled(Capability::DepthTest));
    assert!(!backend.is_enabled(Capability::ProgramPointSize));
    assert!(backend.light_two_sided());
    assert_eq!(backend.enabled_lights(), 2);
    assert_eq!(backend.point_size(), 1.0);
}

#[test]
fn test_state_init_is_idempotent() {
    let mut ctx = context();
    let first = ctx.save_state(StateMask::all());
    ctx.state_init();
    assert_eq!(ctx.save_state(StateMask::all()), first);
}

#[test]
fn test_program_point_size_toggle() {
    let mut ctx = context();
    ctx.enable_program_point_size();
    assert!(ctx.backend().is_enabled(Capability::ProgramPointSize));
    ctx.disable_program_point_size();
    assert!(!ctx.backend().is_enabled(Capability::ProgramPointSize));
}

#[test]
fn test_two_pass_object_draw() {
    let images = scene_images();
    let object = house();
    let mut ctx = context();

    let first = MaterialPassParams {
        use_alpha_pass: true,
        textured: true,
        ..Default::default()
    };
    let (drawn, deferred) = draw_pass(&mut ctx, &images, &object, first);
    assert_eq!(drawn, vec![0, 1, 2]);
    assert!(deferred);

    let second = MaterialPassParams {
        is_alpha_pass: true,
        ..first
    };
    let (drawn, deferred) = draw_pass(&mut ctx, &images, &object, second);
    assert_eq!(drawn, vec![1]);
    assert!(!deferred);

    // Only the walls are textured, and their texture is reused
    assert_eq!(ctx.backend().created_textures(), 1);
    assert_eq!(ctx.material_alpha_blend(), Some(AlphaBlend::Solid));
}

#[test]
fn test_end_with_bound_material_reports_error() {
    let images = scene_images();
    let object = house();
    let mut ctx = context();
    let mut session = ctx.begin_object_materials(&images, &object, MaterialPassParams::default());
    assert_eq!(
        session.bind_material(3),
        BindOutcome::Skip(SkipReason::OutOfRange)
    );
    assert!(session.bind_material(0).is_bound());
    assert!(session.end().is_err());
    assert!(!ctx.backend().is_enabled(Capability::Lighting));
}

#[test]
fn test_snapshot_around_nested_draw() {
    let images = scene_images();
    let object = house();
    let mut ctx = context();
    ctx.backend_mut().set_enabled(Capability::DepthTest, true);
    let before = ctx.save_state(StateMask::ENABLE | StateMask::BLEND);

    let shaded = MaterialPassParams {
        glsl: true,
        ..Default::default()
    };
    ctx.with_saved_state(StateMask::ENABLE | StateMask::BLEND, |ctx| {
        let mut session = ctx.begin_object_materials(&images, &object, shaded);
        assert!(session.bind_material(1).is_bound());
        assert!(session.backend().is_enabled(Capability::Blend));
        session.backend().set_enabled(Capability::DepthTest, false);
        session.unbind_material();
        // Direct backend changes bypass the blend memo
        session.backend().set_enabled(Capability::Blend, true);
        session.end().expect("unbound");
    });

    assert_eq!(ctx.save_state(StateMask::ENABLE | StateMask::BLEND), before);
    assert!(ctx.backend().is_enabled(Capability::DepthTest));
    // The blend memo was dropped, so Solid is applied again
    assert_eq!(ctx.material_alpha_blend(), None);
    ctx.backend_mut().clear_calls();
    ctx.set_material_alpha_blend(AlphaBlend::Solid);
    assert!(!ctx.backend().calls().is_empty());
}

#[test]
fn test_nested_snapshots_restore_in_lifo_order() {
    let mut ctx = context();
    let outer = ctx.save_state(StateMask::ENABLE);
    ctx.backend_mut().set_enabled(Capability::CullFace, true);
    let inner = ctx.save_state(StateMask::ENABLE);
    ctx.backend_mut().set_enabled(Capability::ScissorTest, true);

    ctx.restore_state(&inner);
    assert!(ctx.backend().is_enabled(Capability::CullFace));
    assert!(!ctx.backend().is_enabled(Capability::ScissorTest));
    ctx.restore_state(&outer);
    assert!(!ctx.backend().is_enabled(Capability::CullFace));
}

#[test]
fn test_materials_then_texfaces() {
    let images = scene_images();
    let object = house();
    let mut ctx = context();

    let first = MaterialPassParams {
        use_alpha_pass: true,
        ..Default::default()
    };
    draw_pass(&mut ctx, &images, &object, first);

    let mut session = ctx.begin_texface(&images);
    let bricks = TexPoly::new(ImageId(1));
    let grass = TexPoly::new(ImageId(2));
    assert!(matches!(
        session.set_texture_page(Some(&bricks), true, AlphaBlend::Alpha),
        TexPageOutcome::Bound(_)
    ));
    assert!(session.set_texture_page(Some(&grass), true, AlphaBlend::Solid).is_bound());
    assert!(session.set_texture_page(Some(&grass), true, AlphaBlend::Solid).is_bound());
    session.end();

    assert!(!ctx.backend().is_enabled(Capability::Texture2D));
    assert!(!ctx.backend().is_enabled(Capability::Blend));
    let binds = ctx.backend().count_calls(|call| {
        matches!(call, BackendCall::BindTexture { unit: 0, texture: Some(_) })
    });
    assert_eq!(binds, 2);

    // Material drawing picks up cleanly after the texface pass
    let (drawn, _) = draw_pass(&mut ctx, &images, &object, first);
    assert_eq!(drawn.len(), 3);
}

#[test]
fn test_scene_lights_then_default_lights() {
    let mut ctx = context();
    let layer = (0..12).fold(SceneLayer::new("crowded"), |layer, i| {
        layer.with_light(Light::point(format!("lamp{i}"), Vec3::splat(i as f32)))
    });
    let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0));
    assert_eq!(ctx.scene_object_lights(&layer, &view, false), 8);
    assert!(ctx.backend().local_viewer());

    assert_eq!(ctx.default_lights(), 2);
    assert_eq!(ctx.backend().enabled_lights(), 2);
    assert!(!ctx.backend().local_viewer());
}

#[test]
fn test_pick_colors_round_trip() {
    let mut ctx = context();
    let encoding = ctx.select_encoding();
    for index in [1, 2, 255, 256, 70_000] {
        ctx.select_index_set(index);
        let [r, g, b, _] = ctx.backend().color();
        let packed = u32::from_le_bytes([r, g, b, 0]);
        assert_eq!(packed, ctx.select_index_get(index));
        assert_eq!(encoding.color_to_index(packed), index);
    }
}

#[test]
fn test_texture_lifecycle_across_threads() {
    let images = scene_images();
    let object = house();
    let mut ctx = context();
    let textured = MaterialPassParams {
        textured: true,
        ..Default::default()
    };
    draw_pass(&mut ctx, &images, &object, textured);
    assert_eq!(ctx.backend().live_textures(), 1);

    let handle = ctx.textures().free_queue_handle();
    std::thread::spawn(move || handle.free_image(ImageId(1)))
        .join()
        .expect("free thread");
    // Nothing happens until the owning thread flushes
    assert_eq!(ctx.backend().live_textures(), 1);
    assert_eq!(ctx.end_frame(), 1);
    assert_eq!(ctx.backend().live_textures(), 0);

    // The next draw re-creates it
    draw_pass(&mut ctx, &images, &object, textured);
    assert_eq!(ctx.backend().live_textures(), 1);
    assert_eq!(ctx.backend().created_textures(), 2);
}

#[test]
fn test_verify_image_through_context() {
    let images = scene_images();
    let mut ctx = context();
    let image = images.get(ImageId(2)).expect("grass");
    let first = ctx.verify_image(image, &Default::default()).expect("uploaded");
    let again = ctx.verify_image(image, &Default::default()).expect("cached");
    assert_eq!(first, again);
    assert_eq!(ctx.textures().len(), 1);
    assert_eq!(ctx.backend().created_textures(), 1);
}
