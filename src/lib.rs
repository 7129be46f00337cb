//! mannequin-viewer
//!
//! Displays a garment mannequin lit by a panoramic HDR environment, lets the
//! user orbit around it and swaps the fabric texture of every mesh at
//! runtime. Runs natively in a winit window and in the browser on a canvas.
//!
//! High-level modules
//! - `config`: fixed startup configuration
//! - `viewer`: application state, owns the scene, the model handle and the camera
//! - `loading` / `fabric`: lifecycle of model loads and fabric swaps
//! - `camera` / `viewport`: orbit camera, controls and projection
//! - `data_structures`: scene graph, transforms, vertices and GPU textures
//! - `resources`: fetching and decoding of models, textures and environments
//! - `context` / `pipelines` / `render`: GPU setup, pipelines and per frame drawing
//! - `flow`: the event loop tying it all together
//!

pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod error;
pub mod fabric;
pub mod flow;
pub mod loading;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod viewer;
pub mod viewport;
#[cfg(target_arch = "wasm32")]
pub mod web;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// Entry point when loaded as a wasm module.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn run_web() -> Result<(), wasm_bindgen::JsValue> {
    flow::run(config::ViewerConfig::from_env()).map_err(|e| JsValue::from_str(&format!("{e:#}")))
}
