use std::cell::Cell;
use std::rc::Rc;

use neural_cells::config::{EngineConfig, TunableParams, BACKGROUND, MAX_MODELS};
use neural_cells::{
    CpuBackend, DebugHook, Engine, EngineError, Frame, ModelAsset, ModelCycle, RenderMode,
    Topology, ViewSize, WHOLE_FIELD,
};

const STRIDE: usize = 5;

fn still_asset() -> ModelAsset {
    ModelAsset::identity(&["a", "b", "c"], 4, 3, 3, Topology::Square)
}

/// Every firing cell gains a constant delta; alive regions grow one ring per step
fn grow_asset() -> ModelAsset {
    let mut asset = ModelAsset::identity(&["grow"], 4, 3, 3, Topology::Square);
    asset.models[0].layers[0].bias = vec![0.5, 0.25, 0.0, 1.0];
    asset
}

fn config(width: u32, height: u32, fire_rate: f32) -> EngineConfig {
    let mut config = EngineConfig::with_size(width, height);
    config.params.fire_rate = fire_rate;
    config
}

fn cell(snapshot: &[f32], width: u32, x: u32, y: u32) -> &[f32] {
    let start = (y * width + x) as usize * STRIDE;
    &snapshot[start..start + STRIDE]
}

fn frame(engine: &mut Engine<CpuBackend>, view: ViewSize, mode: RenderMode) -> Frame {
    engine.draw(view, mode).unwrap();
    engine.backend().unwrap().frame().cloned().unwrap()
}

fn background_pixel() -> [u8; 4] {
    let byte = |v: f32| (v * 255.0 + 0.5) as u8;
    [byte(BACKGROUND[0]), byte(BACKGROUND[1]), byte(BACKGROUND[2]), 255]
}

#[test]
fn test_paint_whole_field_assigns_model_and_seed() {
    let mut engine = Engine::headless(&still_asset(), config(8, 8, 0.5)).unwrap();
    engine.paint(2.0, 3.0, WHOLE_FIELD, 1).unwrap();
    engine.step().unwrap();

    let snapshot = engine.snapshot().unwrap();
    assert!(snapshot.chunks_exact(STRIDE).all(|c| c[4] == 1.0));
    assert_eq!(cell(&snapshot, 8, 2, 3), &[0.0, 0.0, 0.0, 1.0, 1.0]);
}

#[test]
fn test_paint_circle_centers_on_the_grid_point() {
    let mut engine = Engine::headless(&still_asset(), config(8, 8, 0.5)).unwrap();
    engine.paint(4.0, 4.0, 1.0, 1).unwrap();

    let snapshot = engine.snapshot().unwrap();
    let mut painted: Vec<(u32, u32)> = (0..8)
        .flat_map(|y| (0..8).map(move |x| (x, y)))
        .filter(|&(x, y)| cell(&snapshot, 8, x, y)[4] == 1.0)
        .collect();
    painted.sort();
    assert_eq!(painted, vec![(3, 3), (3, 4), (4, 3), (4, 4)]);
    // the seed lands in the cell containing the point
    assert_eq!(cell(&snapshot, 8, 4, 4), &[0.0, 0.0, 0.0, 1.0, 1.0]);
    assert_eq!(cell(&snapshot, 8, 3, 3), &[0.0, 0.0, 0.0, 0.0, 1.0]);
}

#[test]
fn test_single_seed_survives_identity_model() {
    let mut engine = Engine::headless(&still_asset(), config(4, 4, 1.0)).unwrap();
    engine.paint(0.0, 0.0, WHOLE_FIELD, 0).unwrap();
    for _ in 0..3 {
        engine.step().unwrap();
    }

    let snapshot = engine.snapshot().unwrap();
    for y in 0..4 {
        for x in 0..4 {
            let expected: [f32; STRIDE] = if (x, y) == (0, 0) {
                [0.0, 0.0, 0.0, 1.0, 0.0]
            } else {
                [0.0; STRIDE]
            };
            assert_eq!(cell(&snapshot, 4, x, y), &expected, "cell ({}, {})", x, y);
        }
    }
}

#[test]
fn test_clear_circle_shows_background_inside_only() {
    let mut engine = Engine::headless(&grow_asset(), config(16, 16, 1.0)).unwrap();
    engine.paint(8.0, 8.0, 4.0, 0).unwrap();
    for _ in 0..8 {
        engine.step().unwrap();
    }

    // 4 display pixels per cell; (34, 34) is the center of cell (8, 8)
    let view = ViewSize::new(64, 64);
    let before = frame(&mut engine, view, RenderMode::Color);
    let selectors: Vec<f32> = engine.snapshot().unwrap().chunks_exact(STRIDE).map(|c| c[4]).collect();

    engine.clear_circle(34.0, 34.0, 8.0, view).unwrap();
    let after = frame(&mut engine, view, RenderMode::Color);

    let inside = |gx: u32, gy: u32| {
        let dx = (gx as i32 - 8).abs() * 4;
        let dy = (gy as i32 - 8).abs() * 4;
        dx * dx + dy * dy < 64
    };
    for py in 0..64 {
        for px in 0..64 {
            let (gx, gy) = (px / 4, py / 4);
            if inside(gx, gy) {
                assert_eq!(after.pixel(px, py), background_pixel(), "pixel ({}, {})", px, py);
            } else {
                assert_eq!(after.pixel(px, py), before.pixel(px, py), "pixel ({}, {})", px, py);
            }
        }
    }

    // exactly on the boundary: excluded
    assert_ne!(after.pixel(10 * 4, 8 * 4), background_pixel());
    assert_ne!(before.pixel(9 * 4, 8 * 4), background_pixel());
    assert_eq!(after.pixel(9 * 4, 8 * 4), background_pixel());

    // selectors survive the clear
    let after_selectors: Vec<f32> = engine.snapshot().unwrap().chunks_exact(STRIDE).map(|c| c[4]).collect();
    assert_eq!(selectors, after_selectors);
}

#[test]
fn test_clear_circle_rejects_negative_radius() {
    let mut engine = Engine::headless(&still_asset(), config(8, 8, 0.5)).unwrap();
    engine.paint(2.0, 2.0, 0.0, 0).unwrap();
    let before = engine.snapshot().unwrap();

    let err = engine.clear_circle(2.0, 2.0, -1.0, ViewSize::new(8, 8)).unwrap_err();
    assert!(matches!(err, EngineError::InvalidGrid(_)));
    assert_eq!(engine.snapshot().unwrap(), before);
}

#[test]
fn test_disturb_on_dead_field_changes_nothing() {
    let mut engine = Engine::headless(&still_asset(), config(8, 8, 0.5)).unwrap();
    let view = ViewSize::new(16, 16);
    let before = frame(&mut engine, view, RenderMode::Color);
    let snapshot = engine.snapshot().unwrap();

    engine.disturb().unwrap();

    assert_eq!(frame(&mut engine, view, RenderMode::Color), before);
    assert_eq!(engine.snapshot().unwrap(), snapshot);
}

#[test]
fn test_disturb_touches_only_hidden_state() {
    let asset = ModelAsset::identity(&["hidden"], 6, 3, 3, Topology::Square);
    let mut engine = Engine::headless(&asset, config(8, 8, 0.5)).unwrap();
    engine.paint(4.0, 4.0, WHOLE_FIELD, 0).unwrap();

    let view = ViewSize::new(8, 8);
    let before = frame(&mut engine, view, RenderMode::Color);
    let snapshot = engine.snapshot().unwrap();

    engine.disturb().unwrap();
    let disturbed = engine.snapshot().unwrap();

    assert_eq!(frame(&mut engine, view, RenderMode::Color), before);
    for (i, (a, b)) in snapshot.iter().zip(&disturbed).enumerate() {
        let (index, channel) = (i / 7, i % 7);
        if a != b {
            assert_eq!(index, 4 * 8 + 4);
            assert!(channel == 4 || channel == 5);
        }
    }
    assert_ne!(snapshot, disturbed);
}

#[test]
fn test_model_cycle_round_trip() {
    let mut cycle = ModelCycle::new(3);
    let start = cycle.current();
    let forward: Vec<usize> = (0..3).map(|_| cycle.switch(1)).collect();
    assert_eq!(cycle.current(), start);
    assert_eq!(forward.len(), 3);
    assert_eq!(cycle.switch(-1), 2);
    assert_eq!(cycle.switch(1), start);
}

#[test]
fn test_same_seed_is_deterministic() {
    let asset = ModelAsset::random(&["x", "y"], 8, 16, Topology::Hex, 5);
    let run = || {
        let mut engine = Engine::headless(&asset, config(12, 12, 0.5)).unwrap();
        engine.paint(6.0, 6.0, WHOLE_FIELD, 1).unwrap();
        engine.paint(1.0, 1.0, 3.0, 0).unwrap();
        for _ in 0..10 {
            engine.step().unwrap();
        }
        engine.disturb().unwrap();
        engine.step().unwrap();
        engine
            .snapshot()
            .unwrap()
            .iter()
            .map(|v| v.to_bits())
            .collect::<Vec<u32>>()
    };
    assert_eq!(run(), run());
}

#[test]
fn test_json_asset_drives_the_update() {
    let json = r#"{
        "channels": 1,
        "visible_channels": 1,
        "alive_channel": 0,
        "topology": "square",
        "filters": [[1, 0, 0, 0, 0, 0, 0, 0, 0]],
        "names": ["doubler"],
        "models": [
            {
                "channels": 1,
                "layers": [
                    { "in_dim": 1, "out_dim": 1, "scale": 0.5, "weights": [130], "bias": [0.0] }
                ]
            }
        ]
    }"#;
    let asset = ModelAsset::from_json(json).unwrap();
    let mut engine = Engine::headless(&asset, config(4, 4, 1.0)).unwrap();
    engine.paint(1.0, 1.0, WHOLE_FIELD, 0).unwrap();
    engine.step().unwrap();

    let snapshot = engine.snapshot().unwrap();
    let at = |x: u32, y: u32| snapshot[((y * 4 + x) * 2) as usize];
    assert_eq!(at(1, 1), 2.0);
    assert_eq!(at(2, 1), 0.0);
}

#[test]
fn test_channel_mismatch_fails_before_ready() {
    let mut asset = still_asset();
    asset.models[1].channels = 5;
    let fired = Cell::new(false);

    let result = Engine::new(&asset, config(8, 8, 0.5), CpuBackend::new, None, |_| {
        fired.set(true)
    });
    assert!(matches!(result, Err(EngineError::AssetFormat(_))));
    assert!(!fired.get());

    let engine = Engine::new(&still_asset(), config(8, 8, 0.5), CpuBackend::new, None, |_| {
        fired.set(true)
    });
    assert!(engine.is_ok());
    assert!(fired.get());
}

#[test]
fn test_malformed_json_is_an_asset_error() {
    let err = ModelAsset::from_json("{ \"channels\": 4").unwrap_err();
    assert!(err.to_string().starts_with("Asset format error"));
}

#[test]
fn test_too_many_models_rejected() {
    let names: Vec<String> = (0..=MAX_MODELS).map(|i| format!("m{}", i)).collect();
    let refs: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
    let asset = ModelAsset::identity(&refs, 2, 1, 1, Topology::Square);
    assert!(matches!(
        Engine::headless(&asset, config(4, 4, 0.5)),
        Err(EngineError::UnsupportedModelCount { count: 257, max: 256 })
    ));
}

#[test]
fn test_invalid_model_id_leaves_field_unchanged() {
    let mut engine = Engine::headless(&still_asset(), config(8, 8, 0.5)).unwrap();
    engine.paint(3.0, 3.0, WHOLE_FIELD, 2).unwrap();
    let before = engine.snapshot().unwrap();

    let err = engine.paint(1.0, 1.0, 3.0, 3).unwrap_err();
    assert!(matches!(err, EngineError::InvalidModelId { id: 3, count: 3 }));
    assert!(!err.is_fatal());
    assert_eq!(engine.snapshot().unwrap(), before);
}

#[test]
fn test_unsupported_render_mode() {
    let mut engine = Engine::headless(&still_asset(), config(8, 8, 0.5)).unwrap();
    let view = ViewSize::new(8, 8);
    assert!(matches!(
        engine.draw(view, RenderMode::Channel(4)),
        Err(EngineError::UnsupportedRenderMode(_))
    ));
    assert!(engine.draw(view, RenderMode::Channel(3)).is_ok());
    assert!(engine.draw(view, "model".parse().unwrap()).is_ok());
    assert!("sepia".parse::<RenderMode>().is_err());
}

#[test]
fn test_hex_lattice_needs_even_height() {
    let asset = ModelAsset::identity(&["hex"], 4, 3, 3, Topology::Hex);
    assert!(matches!(
        Engine::headless(&asset, config(8, 7, 0.5)),
        Err(EngineError::InvalidGrid(_))
    ));
    assert!(Engine::headless(&asset, config(8, 8, 0.5)).is_ok());
}

#[test]
fn test_calls_after_destroy_fail() {
    let mut engine = Engine::headless(&still_asset(), config(8, 8, 0.5)).unwrap();
    engine.destroy().unwrap();
    assert!(engine.is_destroyed());

    let view = ViewSize::new(8, 8);
    assert!(matches!(engine.step(), Err(EngineError::EngineDestroyed)));
    assert!(matches!(engine.paint(0.0, 0.0, 1.0, 0), Err(EngineError::EngineDestroyed)));
    assert!(matches!(
        engine.clear_circle(0.0, 0.0, 1.0, view),
        Err(EngineError::EngineDestroyed)
    ));
    assert!(matches!(engine.disturb(), Err(EngineError::EngineDestroyed)));
    assert!(matches!(
        engine.draw(view, RenderMode::Color),
        Err(EngineError::EngineDestroyed)
    ));
    assert!(matches!(
        engine.frame(view, RenderMode::Color),
        Err(EngineError::EngineDestroyed)
    ));
    assert!(matches!(engine.reset(), Err(EngineError::EngineDestroyed)));
    assert!(matches!(engine.snapshot(), Err(EngineError::EngineDestroyed)));
    assert!(matches!(engine.destroy(), Err(EngineError::EngineDestroyed)));
}

#[test]
fn test_debug_hook_runs_before_each_step() {
    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    let hook: DebugHook = Box::new(move |params: &mut TunableParams| {
        counter.set(counter.get() + 1);
        params.fire_rate = 0.0;
    });

    let mut engine = Engine::headless_with_hook(&grow_asset(), config(8, 8, 1.0), hook).unwrap();
    engine.paint(4.0, 4.0, WHOLE_FIELD, 0).unwrap();
    let before = engine.snapshot().unwrap();

    engine.step().unwrap();
    engine.step().unwrap();

    assert_eq!(calls.get(), 2);
    assert_eq!(engine.params().fire_rate, 0.0);
    // nothing fires, so nothing changes
    assert_eq!(engine.snapshot().unwrap(), before);
}

#[test]
fn test_frame_runs_configured_steps() {
    let mut config = config(8, 8, 0.5);
    config.params.steps_per_frame = 3;
    let mut engine = Engine::headless(&still_asset(), config).unwrap();

    engine.frame(ViewSize::new(8, 8), RenderMode::Alive).unwrap();
    assert_eq!(engine.step_count(), 3);
    assert!(engine.backend().unwrap().frame().is_some());
}

#[test]
fn test_reset_kills_everything() {
    let mut engine = Engine::headless(&grow_asset(), config(8, 8, 1.0)).unwrap();
    engine.paint(4.0, 4.0, WHOLE_FIELD, 0).unwrap();
    engine.step().unwrap();
    engine.reset().unwrap();
    assert!(engine.snapshot().unwrap().iter().all(|v| *v == 0.0));
}
