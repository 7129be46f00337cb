//! Startup configuration.
//!
//! The viewer takes no command line arguments. Everything it needs is a fixed
//! literal collected in [`ViewerConfig::default`]. On native targets the asset
//! root can be redirected with the `MANNEQUIN_ASSET_ROOT` environment variable.

use cgmath::{Deg, Point3};

use crate::data_structures::scene_graph::Background;

/// Panoramic HDR used for image based lighting.
pub const HDR_PATH: &str =
    "https://threejs.org/examples/textures/equirectangular/venice_sunset_1k.hdr";

/// The mannequin asset, relative to the asset root.
pub const MODEL_PATH: &str = "mannequin.glb";

/// DOM id of the file input used to pick a fabric on the web.
pub const FABRIC_INPUT_ID: &str = "fabricUpload";

#[cfg(not(target_arch = "wasm32"))]
const ASSET_ROOT_ENV: &str = "MANNEQUIN_ASSET_ROOT";

#[derive(Clone, Debug)]
pub struct ViewerConfig {
    pub hdr_path: String,
    pub model_path: String,
    pub asset_root: String,
    pub camera_position: Point3<f32>,
    pub orbit_target: Point3<f32>,
    pub fovy: Deg<f32>,
    pub znear: f32,
    pub zfar: f32,
    /// Shown until the environment is installed.
    pub clear_colour: wgpu::Color,
    /// Used once the environment is installed. `Background::Environment`
    /// draws the HDR as a skybox.
    pub background: Background,
    /// Start the model load even when the environment failed to load.
    pub load_model_without_environment: bool,
    /// Scale applied to the environment irradiance.
    pub environment_intensity: f32,
}

impl ViewerConfig {
    /// Default configuration with the asset root taken from the environment when set.
    pub fn from_env() -> Self {
        #[allow(unused_mut)]
        let mut config = Self::default();
        #[cfg(not(target_arch = "wasm32"))]
        if let Ok(root) = std::env::var(ASSET_ROOT_ENV) {
            log::info!("Using asset root {root} from {ASSET_ROOT_ENV}");
            config.asset_root = root;
        }
        config
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            hdr_path: HDR_PATH.to_string(),
            model_path: MODEL_PATH.to_string(),
            asset_root: "assets".to_string(),
            camera_position: Point3::new(0.0, 1.5, 3.0),
            orbit_target: Point3::new(0.0, 1.0, 0.0),
            fovy: Deg(75.0),
            znear: 0.1,
            zfar: 1000.0,
            clear_colour: wgpu::Color::WHITE,
            background: Background::Colour(wgpu::Color::WHITE),
            load_model_without_environment: false,
            environment_intensity: 1.0,
        }
    }
}
