//! Render pipelines of the viewer.
//!
//! - `basic` builds the model pipeline and the shared pipeline helper
//! - `environment` holds the irradiance uniform used for image based lighting
//! - `skybox` draws the environment panorama as background

pub mod basic;
pub mod environment;
pub mod skybox;
