//! Fixtures shared by the integration tests.
//!
//! Everything is generated in code: a two mesh mannequin as `.gltf` with
//! embedded `data:` buffers or as `.glb` with its image in the binary chunk,
//! PNG fabrics and Radiance HDR skies.

use std::io::Cursor;

use base64::Engine;
use futures::channel::mpsc;
use image::{ImageFormat, Rgb, RgbaImage, codecs::hdr::HdrEncoder};
use mannequin_viewer::{
    config::ViewerConfig, data_structures::scene_graph::Node, error::LoadError,
    resources::load_model, viewer::Viewer,
};
use tempfile::TempDir;
use tokio::runtime::Runtime;

pub(crate) fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build the test runtime")
}

pub(crate) fn png_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("failed to encode png");
    bytes
}

pub(crate) fn hdr_bytes(width: usize, height: usize, value: f32) -> Vec<u8> {
    let pixels = vec![Rgb([value, value, value]); width * height];
    let mut bytes = Vec::new();
    HdrEncoder::new(&mut bytes)
        .encode(&pixels, width, height)
        .expect("failed to encode hdr");
    bytes
}

/// One triangle: positions, normals, uvs and u16 indices, padded to 104 bytes.
pub(crate) fn triangle_buffer() -> Vec<u8> {
    let mut buffer = Vec::new();
    for position in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
        position.iter().for_each(|f| buffer.extend_from_slice(&f.to_le_bytes()));
    }
    for _ in 0..3 {
        [0.0f32, 0.0, 1.0]
            .iter()
            .for_each(|f| buffer.extend_from_slice(&f.to_le_bytes()));
    }
    for uv in [[0.0f32, 0.0], [1.0, 0.0], [0.0, 1.0]] {
        uv.iter().for_each(|f| buffer.extend_from_slice(&f.to_le_bytes()));
    }
    for idx in [0u16, 1, 2] {
        buffer.extend_from_slice(&idx.to_le_bytes());
    }
    buffer.resize(104, 0);
    buffer
}

/// A mannequin group with a textured "shirt", a tinted "legs" mesh and a camera.
fn mannequin_json(buffer: &str, image: &str, extra_views: &str) -> String {
    format!(
        r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [{{ "name": "Mannequin", "nodes": [0] }}],
  "nodes": [
    {{ "name": "mannequin", "children": [1, 2, 3], "translation": [0.0, 1.0, 0.0] }},
    {{ "name": "torso", "mesh": 0 }},
    {{ "name": "legs", "mesh": 1, "translation": [0.0, -0.5, 0.0] }},
    {{ "name": "camera", "camera": 0 }}
  ],
  "cameras": [{{ "type": "perspective", "perspective": {{ "yfov": 1.0, "znear": 0.1 }} }}],
  "meshes": [
    {{ "name": "shirt", "primitives": [{{ "attributes": {{ "POSITION": 0, "NORMAL": 1, "TEXCOORD_0": 2 }}, "indices": 3, "material": 0 }}] }},
    {{ "name": "legs", "primitives": [{{ "attributes": {{ "POSITION": 0, "NORMAL": 1, "TEXCOORD_0": 2 }}, "indices": 3, "material": 1 }}] }}
  ],
  "materials": [
    {{ "name": "cotton", "pbrMetallicRoughness": {{ "baseColorTexture": {{ "index": 0 }} }} }},
    {{ "name": "denim", "pbrMetallicRoughness": {{ "baseColorFactor": [0.2, 0.2, 0.8, 1.0] }} }}
  ],
  "textures": [{{ "source": 0 }}],
  "images": [{image}],
  "buffers": [{buffer}],
  "bufferViews": [
    {{ "buffer": 0, "byteOffset": 0, "byteLength": 36, "target": 34962 }},
    {{ "buffer": 0, "byteOffset": 36, "byteLength": 36, "target": 34962 }},
    {{ "buffer": 0, "byteOffset": 72, "byteLength": 24, "target": 34962 }},
    {{ "buffer": 0, "byteOffset": 96, "byteLength": 6, "target": 34963 }}{extra_views}
  ],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3", "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] }},
    {{ "bufferView": 1, "componentType": 5126, "count": 3, "type": "VEC3" }},
    {{ "bufferView": 2, "componentType": 5126, "count": 3, "type": "VEC2" }},
    {{ "bufferView": 3, "componentType": 5123, "count": 3, "type": "SCALAR" }}
  ]
}}"#
    )
}

/// `.gltf` with the geometry and the fabric embedded as base64 data URIs.
pub(crate) fn mannequin_gltf(fabric_png: &[u8]) -> String {
    let b64 = base64::engine::general_purpose::STANDARD;
    let buffer = triangle_buffer();
    mannequin_json(
        &format!(
            r#"{{ "byteLength": {}, "uri": "data:application/octet-stream;base64,{}" }}"#,
            buffer.len(),
            b64.encode(&buffer)
        ),
        &format!(r#"{{ "uri": "data:image/png;base64,{}" }}"#, b64.encode(fabric_png)),
        "",
    )
}

/// Texture size limit of a WebGL2 device.
pub(crate) const WEBGL2_MAX_DIMENSION: u32 = 2048;

/// `.glb` whose fabric lives in a buffer view behind the geometry.
pub(crate) fn mannequin_glb(fabric_png: &[u8]) -> Vec<u8> {
    padded_mannequin_glb(fabric_png, 0)
}

/// Like [`mannequin_glb`] with the binary chunk grown to at least `min_bin_len` bytes.
pub(crate) fn padded_mannequin_glb(fabric_png: &[u8], min_bin_len: usize) -> Vec<u8> {
    let mut bin = triangle_buffer();
    let image_offset = bin.len();
    bin.extend_from_slice(fabric_png);
    if bin.len() < min_bin_len {
        bin.resize(min_bin_len, 0);
    }
    while bin.len() % 4 != 0 {
        bin.push(0);
    }
    let mut json = mannequin_json(
        &format!(r#"{{ "byteLength": {} }}"#, bin.len()),
        r#"{ "bufferView": 4, "mimeType": "image/png" }"#,
        &format!(
            r#",
    {{ "buffer": 0, "byteOffset": {}, "byteLength": {} }}"#,
            image_offset,
            fabric_png.len()
        ),
    )
    .into_bytes();
    while json.len() % 4 != 0 {
        json.push(b' ');
    }

    let total = 12 + 8 + json.len() + 8 + bin.len();
    let mut glb = Vec::with_capacity(total);
    glb.extend_from_slice(b"glTF");
    glb.extend_from_slice(&2u32.to_le_bytes());
    glb.extend_from_slice(&(total as u32).to_le_bytes());
    glb.extend_from_slice(&(json.len() as u32).to_le_bytes());
    glb.extend_from_slice(b"JSON");
    glb.extend_from_slice(&json);
    glb.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    glb.extend_from_slice(b"BIN\0");
    glb.extend_from_slice(&bin);
    glb
}

/// A temporary asset root.
pub(crate) struct Assets {
    dir: TempDir,
}

impl Assets {
    pub(crate) fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create asset dir"),
        }
    }

    pub(crate) fn root(&self) -> String {
        self.dir.path().to_string_lossy().into_owned()
    }

    pub(crate) fn write(&self, name: &str, bytes: impl AsRef<[u8]>) -> &Self {
        std::fs::write(self.dir.path().join(name), bytes).expect("failed to write asset");
        self
    }

    /// Assets holding the default mannequin and a sky.
    pub(crate) fn mannequin() -> Self {
        let assets = Self::new();
        assets
            .write("mannequin.gltf", mannequin_gltf(&png_bytes(2, 2, [200, 10, 10, 255])))
            .write("sky.hdr", hdr_bytes(32, 16, 1.5));
        assets
    }

    pub(crate) fn config(&self) -> ViewerConfig {
        ViewerConfig {
            hdr_path: "sky.hdr".to_string(),
            model_path: "mannequin.gltf".to_string(),
            asset_root: self.root(),
            ..Default::default()
        }
    }
}

/// Load `path` and collect every progress fraction that was sent.
pub(crate) fn load_with_progress(
    rt: &Runtime,
    path: &str,
    root: &str,
) -> (Result<Node, LoadError>, Vec<f32>) {
    let (tx, mut rx) = mpsc::unbounded();
    let result = rt.block_on(load_model(path, root, tx));
    let mut fractions = Vec::new();
    while let Ok(Some(fraction)) = rx.try_next() {
        fractions.push(fraction);
    }
    (result, fractions)
}

/// A viewer that went through environment and model load the way the event loop drives it.
pub(crate) fn loaded_viewer(rt: &Runtime, assets: &Assets) -> Viewer {
    let config = assets.config();
    let mut viewer = Viewer::new(config.clone(), 800, 600);
    let environment = rt.block_on(mannequin_viewer::resources::environment::load_environment(
        &config.hdr_path,
        &config.asset_root,
    ));
    assert!(viewer.install_environment(environment));
    let invocation = viewer.begin_model_load();
    let (result, fractions) = load_with_progress(rt, &config.model_path, &config.asset_root);
    for fraction in fractions {
        viewer.on_model_progress(invocation, fraction);
    }
    assert!(viewer.on_model_loaded(invocation, result));
    viewer
}
