use mannequin_viewer::{
    config::ViewerConfig,
    error::LoadError,
    loading::LoadState,
    resources::environment::load_environment,
    viewer::Viewer,
};

use crate::common::{
    log_capture::{capture_logs, errors},
    test_utils::{Assets, load_with_progress, loaded_viewer, padded_mannequin_glb, png_bytes, runtime},
};

mod common;

#[test]
fn environment_then_model_attaches_exactly_one_subtree() {
    let rt = runtime();
    let assets = Assets::mannequin();
    let viewer = loaded_viewer(&rt, &assets);

    assert_eq!(viewer.load_state(), LoadState::Loaded);
    assert_eq!(viewer.scene().child_count(), 1);
    assert!(viewer.scene().environment.is_some());
    let model = viewer.model().expect("model handle is set");
    assert_eq!(model.mesh_count(), 2);
    assert_eq!(model.name.as_deref(), Some("Mannequin"));
}

#[test]
fn progress_is_non_decreasing_and_ends_at_one() {
    let rt = runtime();
    let assets = Assets::mannequin();
    let (result, fractions) = load_with_progress(&rt, "mannequin.gltf", &assets.root());

    assert!(result.is_ok());
    assert!(!fractions.is_empty());
    assert!(fractions.windows(2).all(|pair| pair[0] <= pair[1]), "{fractions:?}");
    assert!(fractions.iter().all(|f| (0.0..=1.0).contains(f)));
    assert_eq!(fractions.last(), Some(&1.0));
}

#[test]
fn large_model_reports_intermediate_progress() {
    let rt = runtime();
    let assets = Assets::new();
    assets.write(
        "mannequin.glb",
        padded_mannequin_glb(&png_bytes(2, 2, [200, 10, 10, 255]), 200 * 1024),
    );
    let mut viewer = Viewer::new(ViewerConfig::default(), 800, 600);
    let invocation = viewer.begin_model_load();

    let (result, fractions) = load_with_progress(&rt, "mannequin.glb", &assets.root());
    assert!(fractions.len() >= 2, "{fractions:?}");
    assert!(fractions[0] > 0.0 && fractions[0] < 1.0, "{fractions:?}");
    assert!(fractions.windows(2).all(|pair| pair[0] < pair[1]), "{fractions:?}");
    assert_eq!(fractions.last(), Some(&1.0));

    viewer.on_model_progress(invocation, fractions[0]);
    assert_eq!(
        viewer.load_state(),
        LoadState::Loading {
            fraction: fractions[0]
        }
    );
    for fraction in &fractions[1..] {
        viewer.on_model_progress(invocation, *fraction);
    }
    assert_eq!(viewer.load_state(), LoadState::Loading { fraction: 1.0 });

    assert!(viewer.on_model_loaded(invocation, result));
    assert_eq!(viewer.load_state(), LoadState::Loaded);
    assert_eq!(viewer.model().map(|model| model.mesh_count()), Some(2));
}

#[test]
fn missing_model_leaves_the_handle_unset() {
    let rt = runtime();
    let assets = Assets::new();
    let mut viewer = Viewer::new(ViewerConfig::default(), 800, 600);
    let invocation = viewer.begin_model_load();

    let (result, fractions) = load_with_progress(&rt, "mannequin.glb", &assets.root());
    assert!(matches!(result, Err(LoadError::Fetch { .. })));
    assert!(fractions.is_empty());

    capture_logs();
    assert!(!viewer.on_model_loaded(invocation, result));
    let errors = errors();
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert!(errors[0].starts_with("An error happened while loading the mannequin"));
    assert!(viewer.model().is_none());
    assert_eq!(viewer.scene().child_count(), 0);
    assert_eq!(viewer.load_state(), LoadState::Failed);
    // The loop keeps running: updates and resizes still work
    viewer.update();
    assert!(viewer.resize(640, 480));
}

#[test]
fn corrupt_model_is_a_parse_error() {
    let rt = runtime();
    let assets = Assets::new();
    assets.write("mannequin.glb", b"glTF but not really");
    let (result, _) = load_with_progress(&rt, "mannequin.glb", &assets.root());
    assert!(matches!(result, Err(LoadError::Parse { .. })));
}

#[test]
fn reload_replaces_the_previous_model() {
    let rt = runtime();
    let assets = Assets::mannequin();
    let mut viewer = loaded_viewer(&rt, &assets);
    let first = viewer.model_handle();

    let invocation = viewer.begin_model_load();
    let (result, _) = load_with_progress(&rt, "mannequin.gltf", &assets.root());
    assert!(viewer.on_model_loaded(invocation, result));

    assert_ne!(viewer.model_handle(), first);
    assert_eq!(viewer.scene().child_count(), 1);
}

#[test]
fn duplicate_completion_does_not_add_twice() {
    let rt = runtime();
    let assets = Assets::mannequin();
    let mut viewer = Viewer::new(assets.config(), 800, 600);
    let invocation = viewer.begin_model_load();

    let (first, _) = load_with_progress(&rt, "mannequin.gltf", &assets.root());
    let (second, _) = load_with_progress(&rt, "mannequin.gltf", &assets.root());
    assert!(viewer.on_model_loaded(invocation, first));
    assert!(!viewer.on_model_loaded(invocation, second));
    assert_eq!(viewer.scene().child_count(), 1);
}

#[test]
fn failed_environment_does_not_start_the_model() {
    let rt = runtime();
    let assets = Assets::new();
    let mut viewer = Viewer::new(assets.config(), 800, 600);
    let environment = rt.block_on(load_environment("sky.hdr", &assets.root()));

    assert!(!viewer.install_environment(environment));
    assert_eq!(viewer.load_state(), LoadState::NotStarted);
}

#[test]
fn environment_background_follows_the_config() {
    use mannequin_viewer::data_structures::scene_graph::Background;

    let rt = runtime();
    let assets = Assets::mannequin();
    let config = ViewerConfig {
        background: Background::Environment,
        ..assets.config()
    };
    let mut viewer = Viewer::new(config.clone(), 800, 600);
    assert_eq!(viewer.scene().background, Background::Colour(wgpu::Color::WHITE));

    let environment = rt.block_on(load_environment(&config.hdr_path, &config.asset_root));
    assert!(viewer.install_environment(environment));
    assert_eq!(viewer.scene().background, Background::Environment);
    let env = viewer.scene().environment.as_ref().expect("installed");
    assert_eq!(env.dimensions(), (32, 16));
}
