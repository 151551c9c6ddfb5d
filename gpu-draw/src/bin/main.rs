//! gpu-draw-probe - runs a scripted frame against the recording backend
//!
//! Draws a small scene (a lit object with an alpha-blended material, a row of
//! texface polygons with bitmap text, a pick pass) and prints which backend
//! calls the draw layer made.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use glam::{Mat4, Vec2, Vec3};
use gpu_draw::backend::{Capability, Primitive, TexturedVertex, UvTarget};
use gpu_draw::{
    AlphaBlend, BackendCall, BackendLimits, DrawConfig, GpuBackend, GpuContext,
    MaterialPassParams, RecordingBackend, StateMask,
};
use gpu_scene::{
    BitmapFont, Glyph, Image, ImageBuffer, ImageId, ImageLibrary, Light, Material, MaterialBlend,
    Object, ObjectId, SceneLayer, TexFaceMode, TexPoly,
};
use hashbrown::HashMap;

#[derive(Parser)]
#[command(name = "gpu-draw-probe")]
#[command(about = "Run a scripted frame through the draw layer and summarize backend calls")]
#[command(version)]
struct Cli {
    /// Config file (default: the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of frames to draw
    #[arg(short, long, default_value_t = 2)]
    frames: u32,

    /// Use shader materials
    #[arg(long)]
    glsl: bool,

    /// Pretend the backend has no shader support
    #[arg(long)]
    fixed_function: bool,

    /// Print every call of the last frame
    #[arg(short, long)]
    verbose: bool,
}

const QUAD: [TexturedVertex; 4] = [
    TexturedVertex {
        position: [-1.0, -1.0, 0.0],
        uv: [0.0, 0.0],
        color: [255; 4],
    },
    TexturedVertex {
        position: [1.0, -1.0, 0.0],
        uv: [1.0, 0.0],
        color: [255; 4],
    },
    TexturedVertex {
        position: [1.0, 1.0, 0.0],
        uv: [1.0, 1.0],
        color: [255; 4],
    },
    TexturedVertex {
        position: [-1.0, 1.0, 0.0],
        uv: [0.0, 1.0],
        color: [255; 4],
    },
];

const BRICKS: ImageId = ImageId(1);
const ATLAS: ImageId = ImageId(2);
const FONT: ImageId = ImageId(3);

struct Scene {
    images: ImageLibrary,
    object: Object,
    layer: SceneLayer,
    faces: Vec<TexPoly>,
}

fn build_scene() -> Scene {
    let mut images = ImageLibrary::new();
    images.insert(Image::new(BRICKS, "bricks", ImageBuffer::solid(64, 64, [180, 90, 60, 255])));
    images.insert(
        Image::new(ATLAS, "atlas", ImageBuffer::solid(32, 32, [40, 160, 40, 255]))
            .with_tiles(4, 4)
            .with_tile_animation(0, 3, 10),
    );

    let reference = Glyph {
        unicode: u16::from(b' '),
        locx: 0,
        locy: 64,
        sizex: 8,
        sizey: 8,
        advance: 8,
        ..Default::default()
    };
    let glyphs = (b'a'..=b'z')
        .enumerate()
        .map(|(i, c)| Glyph {
            unicode: u16::from(c),
            locx: (i as i32 % 8) * 8,
            locy: 64 - (i as i32 / 8) * 8,
            ..reference
        })
        .chain([reference])
        .collect();
    images.insert(Image::new(
        FONT,
        "font",
        ImageBuffer::solid(64, 64, [255; 4]).with_font(BitmapFont::new(reference, glyphs)),
    ));

    let object = Object::new(ObjectId(1), "house")
        .with_color([0.9, 0.8, 0.7, 1.0])
        .with_material(Material::named("walls").with_texture(BRICKS))
        .with_material(Material::named("windows").with_blend(MaterialBlend::AlphaBlend, 0.4))
        .with_material(Material::named("roof"));

    let layer = SceneLayer::new("main")
        .with_light(Light::sun("sun", Vec3::new(0.3, 0.2, 1.0)))
        .with_light(Light::point("porch", Vec3::new(2.0, -3.0, 1.5)))
        .with_light(Light::spot("street", Vec3::new(-4.0, 0.0, 5.0), Vec3::Z));

    let faces = vec![
        TexPoly::new(BRICKS),
        TexPoly::new(BRICKS),
        TexPoly::new(ATLAS).with_tile(1),
        TexPoly::new(FONT).with_mode(TexFaceMode::TEXT),
        TexPoly::default(),
    ];

    Scene {
        images,
        object,
        layer,
        faces,
    }
}

/// Two-pass material draw of the scene object
fn draw_object(ctx: &mut GpuContext<RecordingBackend>, scene: &Scene, glsl: bool) -> Result<()> {
    let count = scene.object.material_count();
    let first = MaterialPassParams {
        glsl,
        use_alpha_pass: true,
        textured: true,
        ..Default::default()
    };

    let mut session = ctx.begin_object_materials(&scene.images, &scene.object, first);
    for index in 0..count {
        if session.bind_material(index).is_bound() {
            session.backend().draw_textured(Primitive::Quads, &QUAD, UvTarget::TexCoord);
        }
    }
    session.unbind_material();
    let deferred = session.deferred_alpha();
    session.end()?;

    if deferred {
        let second = MaterialPassParams {
            is_alpha_pass: true,
            ..first
        };
        let mut session = ctx.begin_object_materials(&scene.images, &scene.object, second);
        for index in 0..count {
            if session.bind_material(index).is_bound() {
                session.backend().draw_textured(Primitive::Quads, &QUAD, UvTarget::TexCoord);
            }
        }
        session.unbind_material();
        session.end()?;
    }
    Ok(())
}

fn draw_texfaces(ctx: &mut GpuContext<RecordingBackend>, scene: &Scene) {
    let v_quad = QUAD.map(|v| Vec3::from(v.position));
    let uv_quad = QUAD.map(|v| Vec2::from(v.uv));

    let mut session = ctx.begin_texface(&scene.images);
    for poly in &scene.faces {
        let transparency = if poly.mode.contains(TexFaceMode::TEXT) {
            AlphaBlend::Alpha
        } else {
            AlphaBlend::Solid
        };
        let outcome = session.set_texture_page(Some(poly), true, transparency);
        tracing::trace!(?outcome, "texture page");
        if poly.mode.contains(TexFaceMode::TEXT) {
            session.render_text(poly, "hello\nworld", None, &v_quad, &uv_quad, UvTarget::TexCoord);
        } else {
            session.backend().draw_textured(Primitive::Quads, &QUAD, UvTarget::TexCoord);
        }
    }
    session.set_texture_page(None, true, AlphaBlend::Solid);
    session.end();
}

fn draw_pick_pass(ctx: &mut GpuContext<RecordingBackend>, elements: u32) {
    ctx.with_saved_state(StateMask::ENABLE | StateMask::BLEND, |ctx| {
        ctx.backend_mut().set_enabled(Capability::Lighting, false);
        for index in 1..=elements {
            ctx.select_index_set(index);
            ctx.backend_mut()
                .draw_textured(Primitive::Quads, &QUAD, UvTarget::TexCoord);
        }
    });
}

fn call_name(call: &BackendCall) -> String {
    let debug = format!("{call:?}");
    debug
        .split(['(', ' ', '{'])
        .next()
        .unwrap_or_default()
        .to_string()
}

fn summarize(calls: &[BackendCall]) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for call in calls {
        *counts.entry(call_name(call)).or_default() += 1;
    }
    let mut counts: Vec<_> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config: DrawConfig = match &cli.config {
        Some(path) => gpu_draw::config::load_from_path(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => gpu_draw::config::load(),
    };

    let backend = RecordingBackend::with_limits(BackendLimits {
        glsl: !cli.fixed_function,
        ..Default::default()
    });
    let mut ctx = GpuContext::new(backend, &config);
    ctx.state_init();

    let scene = build_scene();
    let view = Mat4::look_at_rh(Vec3::new(0.0, -10.0, 4.0), Vec3::ZERO, Vec3::Z);

    for frame in 0..cli.frames {
        ctx.backend_mut().clear_calls();
        ctx.set_clock(u64::from(frame));

        let lights = ctx.scene_object_lights(&scene.layer, &view, false);
        draw_object(&mut ctx, &scene, cli.glsl)?;
        ctx.default_lights();
        draw_texfaces(&mut ctx, &scene);
        draw_pick_pass(&mut ctx, 16);

        if let Some(atlas) = scene.images.get(ATLAS) {
            let (_, textures) = ctx.parts_mut();
            textures.update_image_time(atlas, f64::from(frame) * 0.5);
        }
        let freed = ctx.end_frame();

        let calls = ctx.backend().calls().len();
        tracing::info!(frame, lights, calls, freed, "frame done");
    }

    println!("Backend calls of the last frame:");
    for (name, count) in summarize(ctx.backend().calls()) {
        println!("  {name:<24} {count}");
    }
    if cli.verbose {
        println!();
        for call in ctx.backend().calls() {
            println!("  {call:?}");
        }
    }
    println!();
    println!(
        "{} textures live, {} bytes, {} vertices drawn in total",
        ctx.backend().live_textures(),
        ctx.backend().memory_used(),
        ctx.backend().drawn_vertices().len()
    );
    println!("Pick encoding: {:?}", ctx.select_encoding());
    Ok(())
}
