//! Tests for GpuStateValues

use super::*;
use crate::backend::{BackendCall, BlendFactor, RecordingBackend};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

const COMPARE_FUNCS: [CompareFunc; 8] = [
    CompareFunc::Never,
    CompareFunc::Less,
    CompareFunc::Equal,
    CompareFunc::LessEqual,
    CompareFunc::Greater,
    CompareFunc::NotEqual,
    CompareFunc::GreaterEqual,
    CompareFunc::Always,
];

const FACTORS: [BlendFactor; 4] = [
    BlendFactor::Zero,
    BlendFactor::One,
    BlendFactor::SrcAlpha,
    BlendFactor::OneMinusSrcAlpha,
];

fn random_rect(rng: &mut Pcg32) -> Rect {
    Rect::new(
        rng.random_range(0..100),
        rng.random_range(0..100),
        rng.random_range(1..2000),
        rng.random_range(1..2000),
    )
}

/// Put every tracked piece of state into a random configuration
fn scramble(backend: &mut RecordingBackend, rng: &mut Pcg32) {
    for cap in ENABLE_ORDER {
        backend.set_enabled(cap, rng.random());
    }
    backend.set_depth_func(COMPARE_FUNCS[rng.random_range(0..COMPARE_FUNCS.len())]);
    backend.set_depth_clear_value(rng.random_range(0.0..1.0));
    backend.set_depth_mask(rng.random());
    backend.set_viewport(random_rect(rng));
    let near = rng.random_range(0.0..0.5);
    backend.set_depth_range(near, near + rng.random_range(0.1..0.5));
    backend.set_scissor(random_rect(rng));
    let mut factor = || FACTORS[rng.random_range(0..FACTORS.len())];
    let func = BlendFunc::separate(factor(), factor(), factor(), factor());
    backend.set_blend_func(func);
}

fn all_masks() -> impl Iterator<Item = StateMask> {
    (0..32).map(StateMask::from_bits_truncate)
}

#[test]
fn test_restore_of_fresh_snapshot_is_noop() {
    let mut rng = Pcg32::seed_from_u64(0x5eed);
    for mask in all_masks() {
        let mut backend = RecordingBackend::new();
        scramble(&mut backend, &mut rng);
        let before = GpuStateValues::capture(&backend, StateMask::all());

        let saved = GpuStateValues::capture(&backend, mask);
        saved.restore(&mut backend);

        assert_eq!(
            GpuStateValues::capture(&backend, StateMask::all()),
            before,
            "mask {mask:?}"
        );
    }
}

#[test]
fn test_restore_brings_back_masked_groups() {
    let mut rng = Pcg32::seed_from_u64(42);
    for mask in all_masks() {
        let mut backend = RecordingBackend::new();
        scramble(&mut backend, &mut rng);
        let saved = GpuStateValues::capture(&backend, mask);

        scramble(&mut backend, &mut rng);
        let scrambled = GpuStateValues::capture(&backend, StateMask::all());
        saved.restore(&mut backend);
        let after = GpuStateValues::capture(&backend, StateMask::all());

        if mask.contains(StateMask::DEPTH_BUFFER) {
            assert_eq!(after.depth_func, saved.depth_func);
            assert_eq!(after.depth_clear_value, saved.depth_clear_value);
            assert_eq!(after.depth_write, saved.depth_write);
        } else {
            assert_eq!(after.depth_func, scrambled.depth_func);
            assert_eq!(after.depth_clear_value, scrambled.depth_clear_value);
            assert_eq!(after.depth_write, scrambled.depth_write);
        }

        if mask.contains(StateMask::ENABLE) {
            assert_eq!(after.enables, saved.enables, "mask {mask:?}");
        }

        if mask.contains(StateMask::VIEWPORT) {
            assert_eq!(after.viewport, saved.viewport);
            assert_eq!(after.depth_range, saved.depth_range);
        } else {
            assert_eq!(after.viewport, scrambled.viewport);
            assert_eq!(after.depth_range, scrambled.depth_range);
        }

        if mask.contains(StateMask::SCISSOR) {
            assert_eq!(after.scissor, saved.scissor);
            assert_eq!(after.scissor_test, saved.scissor_test);
        } else {
            assert_eq!(after.scissor, scrambled.scissor);
        }

        if mask.contains(StateMask::BLEND) {
            assert_eq!(after.blend, saved.blend);
            assert_eq!(after.blend_func, saved.blend_func);
        } else {
            assert_eq!(after.blend_func, scrambled.blend_func);
        }

        if mask.is_empty() {
            assert_eq!(after, scrambled);
        }
    }
}

#[test]
fn test_capture_does_not_touch_backend() {
    let mut backend = RecordingBackend::new();
    backend.clear_calls();
    let _ = GpuStateValues::capture(&backend, StateMask::all());
    assert!(backend.calls().is_empty());
}

#[test]
fn test_empty_mask_restores_nothing() {
    let mut backend = RecordingBackend::new();
    let saved = GpuStateValues::capture(&backend, StateMask::empty());
    saved.restore(&mut backend);
    assert!(backend.calls().is_empty());
}

#[test]
fn test_restore_order() {
    let mut backend = RecordingBackend::new();
    let saved = GpuStateValues::capture(&backend, StateMask::all());
    backend.clear_calls();
    saved.restore(&mut backend);

    let calls = backend.calls();
    let position = |wanted: &BackendCall| calls.iter().position(|c| c == wanted).unwrap();

    let depth_mask = position(&BackendCall::SetDepthMask(true));
    let first_enable = position(&BackendCall::SetEnabled(Capability::Blend, false));
    let viewport = position(&BackendCall::SetViewport(saved.viewport));
    let depth_range = position(&BackendCall::SetDepthRange(0.0, 1.0));
    let scissor = position(&BackendCall::SetScissor(saved.scissor));
    let blend_func = position(&BackendCall::SetBlendFunc(saved.blend_func));

    assert!(depth_mask < first_enable);
    assert!(first_enable < viewport);
    assert!(viewport < depth_range);
    assert!(depth_range < scissor);
    assert!(scissor < blend_func);

    // Scissor box goes in before the scissor test toggle of its group
    assert_eq!(
        calls[scissor + 1],
        BackendCall::SetEnabled(Capability::ScissorTest, false)
    );
}

#[test]
fn test_nested_snapshots_restore_lifo() {
    let mut backend = RecordingBackend::new();
    backend.set_viewport(Rect::new(0, 0, 100, 100));
    let outer = GpuStateValues::capture(&backend, StateMask::VIEWPORT);

    backend.set_viewport(Rect::new(10, 10, 50, 50));
    let inner = GpuStateValues::capture(&backend, StateMask::VIEWPORT);

    backend.set_viewport(Rect::new(20, 20, 5, 5));
    inner.restore(&mut backend);
    assert_eq!(backend.viewport(), Rect::new(10, 10, 50, 50));
    outer.restore(&mut backend);
    assert_eq!(backend.viewport(), Rect::new(0, 0, 100, 100));
}

#[test]
fn test_enabled_lookup() {
    let mut backend = RecordingBackend::new();
    backend.set_enabled(Capability::Light(3), true);

    let with_enable = GpuStateValues::capture(&backend, StateMask::ENABLE);
    assert_eq!(with_enable.enabled(Capability::Light(3)), Some(true));
    assert_eq!(with_enable.enabled(Capability::Light(2)), Some(false));
    assert_eq!(with_enable.enabled(Capability::Fog), None);

    let without = GpuStateValues::capture(&backend, StateMask::BLEND);
    assert_eq!(without.enabled(Capability::Light(3)), None);
}
