//! Viewer data structures: the scene graph, transforms, vertices and GPU textures.
//!
//! - `scene_graph` holds the scene root, the model subtree and its mesh surfaces
//! - `instance` holds local and world transformations of nodes
//! - `model` contains the vertex layout and the GPU side of mesh surfaces
//! - `texture` contains GPU texture wrappers and upload helpers

pub mod instance;
pub mod model;
pub mod scene_graph;
pub mod texture;
