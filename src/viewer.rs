//! Application state of the mannequin viewer.
//!
//! [`Viewer`] owns the scene, the handle of the loaded model, the camera and
//! the bookkeeping of all asynchronous operations. It is only ever touched
//! from the event loop: asynchronous tasks report back through events and
//! the event loop hands their results to the `on_*` methods below, which
//! apply them and log the outcome.

use std::sync::Arc;

use instant::Instant;

use crate::{
    camera::{OrbitCamera, OrbitController},
    config::ViewerConfig,
    data_structures::scene_graph::{Node, NodeHandle, SceneRoot},
    error::{LoadError, SwapError, TextureError},
    fabric::{FabricSwap, apply_fabric},
    loading::{LoadState, ModelLoad, Outcome},
    resources::{environment::EnvironmentMap, texture::SurfaceTexture},
    viewport::Viewport,
};

#[derive(Debug)]
pub struct Viewer {
    config: ViewerConfig,
    scene: SceneRoot,
    model: Option<NodeHandle>,
    model_load: ModelLoad,
    load_started: Option<Instant>,
    fabric: FabricSwap,
    viewport: Viewport,
    camera: OrbitCamera,
    controller: OrbitController,
}

impl Viewer {
    pub fn new(config: ViewerConfig, width: u32, height: u32) -> Self {
        let viewport = Viewport::new(width, height, config.fovy, config.znear, config.zfar);
        let camera = OrbitCamera::new(config.camera_position, config.orbit_target);
        let scene = SceneRoot::new(config.clear_colour);
        Self {
            config,
            scene,
            model: None,
            model_load: ModelLoad::new(),
            load_started: None,
            fabric: FabricSwap::new(),
            viewport,
            camera,
            controller: OrbitController::default(),
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn scene(&self) -> &SceneRoot {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut SceneRoot {
        &mut self.scene
    }

    /// The loaded mannequin, if any.
    pub fn model(&self) -> Option<&Node> {
        self.model.and_then(|handle| self.scene.get(handle))
    }

    pub fn model_handle(&self) -> Option<NodeHandle> {
        self.model
    }

    pub fn load_state(&self) -> LoadState {
        self.model_load.state()
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }

    pub fn controller_mut(&mut self) -> &mut OrbitController {
        &mut self.controller
    }

    /// Returns `false` when the new size was ignored.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        self.viewport.resize(width, height)
    }

    /// Install a loaded environment. Returns whether the model load should start.
    pub fn install_environment(&mut self, result: Result<EnvironmentMap, LoadError>) -> bool {
        match result {
            Ok(environment) => {
                let (width, height) = environment.dimensions();
                log::info!("Environment {}x{} installed", width, height);
                self.scene.environment = Some(environment);
                self.scene.background = self.config.background;
                true
            }
            Err(e) => {
                log::error!("{e}");
                if self.config.load_model_without_environment {
                    log::warn!("Loading the mannequin without environment lighting");
                }
                self.config.load_model_without_environment
            }
        }
    }

    /// Start a model load and return the id its progress and completion must carry.
    pub fn begin_model_load(&mut self) -> u64 {
        let invocation = self.model_load.begin();
        self.load_started = Some(Instant::now());
        log::info!("Loading {}", self.config.model_path);
        invocation
    }

    pub fn on_model_progress(&mut self, invocation: u64, fraction: f32) {
        if let Some(fraction) = self.model_load.progress(invocation, fraction) {
            log::info!("{:.0}% loaded", fraction * 100.0);
        }
    }

    /// Attach a finished model. Returns `true` if the scene changed.
    pub fn on_model_loaded(&mut self, invocation: u64, result: Result<Node, LoadError>) -> bool {
        match self.model_load.complete(invocation, result) {
            Outcome::Loaded(node) => {
                if let Some(previous) = self.model.take() {
                    self.scene.remove(previous);
                }
                self.model = Some(self.scene.add(node));
                log::info!("Mannequin loaded successfully");
                if let Some(started) = self.load_started.take() {
                    log::debug!("Model load took {:?}", started.elapsed());
                }
                true
            }
            Outcome::Failed(e) => {
                self.load_started = None;
                log::error!("An error happened while loading the mannequin: {e}");
                false
            }
            Outcome::Ignored => {
                log::debug!("Ignoring completion of model load #{invocation}");
                false
            }
        }
    }

    /// Guard a fabric swap. The returned generation goes along with the decode.
    pub fn request_fabric(&mut self) -> Result<u64, SwapError> {
        self.fabric
            .request(self.model.is_some())
            .inspect_err(|e| log::error!("{e}"))
    }

    /// Apply a decoded fabric to every mesh of the model. Returns the number of meshes changed.
    pub fn on_fabric_decoded(
        &mut self,
        generation: u64,
        result: Result<Arc<SurfaceTexture>, TextureError>,
    ) -> Result<usize, SwapError> {
        let applied = self.apply_decoded_fabric(generation, result);
        match &applied {
            Ok(count) => log::info!("Fabric applied to {count} meshes"),
            Err(e @ SwapError::Stale { .. }) => log::debug!("{e}"),
            Err(e) => log::error!("{e}"),
        }
        applied
    }

    fn apply_decoded_fabric(
        &mut self,
        generation: u64,
        result: Result<Arc<SurfaceTexture>, TextureError>,
    ) -> Result<usize, SwapError> {
        self.fabric.accept(generation)?;
        let texture = result?;
        let model = self
            .model
            .and_then(|handle| self.scene.get_mut(handle))
            .ok_or(SwapError::ModelNotReady)?;
        Ok(apply_fabric(model, &texture))
    }

    /// Per frame update of everything driven by user input.
    pub fn update(&mut self) {
        self.controller.update(&mut self.camera);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_without_model() {
        let viewer = Viewer::new(ViewerConfig::default(), 800, 600);
        assert!(viewer.model().is_none());
        assert_eq!(viewer.load_state(), LoadState::NotStarted);
        assert_eq!(viewer.scene().child_count(), 0);
        assert_eq!(viewer.viewport().aspect(), 800.0 / 600.0);
    }

    #[test]
    fn environment_failure_blocks_model_by_default() {
        let err = || LoadError::Fetch {
            path: "sky.hdr".into(),
            source: anyhow::anyhow!("offline"),
        };
        let mut viewer = Viewer::new(ViewerConfig::default(), 800, 600);
        assert!(!viewer.install_environment(Err(err())));
        assert!(viewer.scene().environment.is_none());

        let config = ViewerConfig {
            load_model_without_environment: true,
            ..Default::default()
        };
        let mut viewer = Viewer::new(config, 800, 600);
        assert!(viewer.install_environment(Err(err())));
    }
}
