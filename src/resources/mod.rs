use std::{
    collections::HashMap,
    io::{BufReader, Cursor},
    sync::Arc,
};

use anyhow::{Context, anyhow};
use base64::Engine;
use futures::channel::mpsc::UnboundedSender;

use crate::{
    data_structures::{
        instance::Instance,
        model::ModelVertex,
        scene_graph::{Material, MeshData, MeshSurface, Node},
    },
    error::LoadError,
    loading::Progress,
    resources::{
        fetch::{fetch_bytes, load_binary, relative_to},
        texture::SurfaceTexture,
    },
};

/**
 * This module contains all logic for loading meshes, textures and environments from external files.
 */
pub mod environment;
pub mod fetch;
pub mod texture;

/// Load a glTF or GLB model and convert its default scene into a [`Node`] subtree.
///
/// Download progress of the main file is streamed as fractions into `progress`,
/// the last value sent on success is always `1.0`.
pub async fn load_model(
    file_name: &str,
    root: &str,
    progress: UnboundedSender<f32>,
) -> Result<Node, LoadError> {
    let mut progress = Progress::new(progress);
    let bytes = fetch_bytes(file_name, root, &mut progress)
        .await
        .map_err(|source| LoadError::Fetch {
            path: file_name.to_string(),
            source,
        })?;
    let node = parse_model(bytes, file_name, root)
        .await
        .map_err(|source| LoadError::Parse {
            path: file_name.to_string(),
            source,
        })?;
    progress.finish();
    Ok(node)
}

/// Parse glTF/GLB bytes. External buffers and images are resolved next to `file_name`.
pub async fn parse_model(bytes: Vec<u8>, file_name: &str, root: &str) -> anyhow::Result<Node> {
    let gltf_reader = BufReader::new(Cursor::new(bytes));
    let gltf = gltf::Gltf::from_reader(gltf_reader)?;

    // Load buffers
    let mut buffer_data = Vec::new();
    for buffer in gltf.buffers() {
        match buffer.source() {
            gltf::buffer::Source::Bin => {
                let blob = gltf
                    .blob
                    .as_deref()
                    .ok_or_else(|| anyhow!("buffer {} refers to a missing GLB chunk", buffer.index()))?;
                buffer_data.push(blob.to_vec());
            }
            gltf::buffer::Source::Uri(uri) => {
                let bin = load_uri(uri, file_name, root)
                    .await
                    .with_context(|| format!("buffer {}", buffer.index()))?;
                buffer_data.push(bin);
            }
        }
    }

    // Decode every image once, materials sharing an image share the texture
    let mut images: HashMap<usize, Arc<SurfaceTexture>> = HashMap::new();
    for material in gltf.materials() {
        let Some(info) = material.pbr_metallic_roughness().base_color_texture() else {
            continue;
        };
        let image = info.texture().source();
        if images.contains_key(&image.index()) {
            continue;
        }
        let label = image.name().unwrap_or(file_name).to_string();
        let texture = match image.source() {
            gltf::image::Source::View { view, mime_type } => {
                let data = buffer_data
                    .get(view.buffer().index())
                    .ok_or_else(|| anyhow!("image {} has no buffer", image.index()))?;
                let bytes = data
                    .get(view.offset()..view.offset() + view.length())
                    .ok_or_else(|| anyhow!("image {} view is out of bounds", image.index()))?;
                SurfaceTexture::decode_with_format(bytes, &label, mime_type.split('/').last())?
            }
            gltf::image::Source::Uri { uri, mime_type } => {
                let bytes = load_uri(uri, file_name, root)
                    .await
                    .with_context(|| format!("image {}", image.index()))?;
                let hint = mime_type
                    .and_then(|mt| mt.split('/').last())
                    .or_else(|| uri.rsplit('.').next());
                SurfaceTexture::decode_with_format(&bytes, &label, hint)?
            }
        };
        images.insert(image.index(), Arc::new(texture));
    }

    // Load materials
    let materials: Vec<Material> = gltf
        .materials()
        .map(|material| {
            let pbr = material.pbr_metallic_roughness();
            let mut converted = Material::new(material.name().unwrap_or("material"));
            converted.base_color_factor = pbr.base_color_factor();
            converted.base_color_texture = pbr
                .base_color_texture()
                .and_then(|info| images.get(&info.texture().source().index()).cloned());
            converted
        })
        .collect();

    let scene = gltf
        .default_scene()
        .or_else(|| gltf.scenes().next())
        .ok_or_else(|| anyhow!("{file_name} contains no scene"))?;
    let children = scene
        .nodes()
        .map(|node| to_scene_node(node, &buffer_data, &materials))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let model = Node::group(Some(scene.name().unwrap_or(file_name).to_string()), children);
    log::debug!("{} contains {} mesh surfaces", file_name, model.mesh_count());
    Ok(model)
}

fn to_scene_node(
    node: gltf::scene::Node,
    buffers: &[Vec<u8>],
    materials: &[Material],
) -> anyhow::Result<Node> {
    let name = node.name().map(str::to_string);
    let mut scene_node = match node.mesh() {
        Some(mesh) => {
            let mesh_name = mesh.name().or(node.name()).unwrap_or("unknown_mesh");
            let mut surfaces = Vec::new();
            for primitive in mesh.primitives() {
                if primitive.mode() != gltf::mesh::Mode::Triangles {
                    log::warn!(
                        "Skipping primitive {} of {}: mode {:?} is not supported",
                        primitive.index(),
                        mesh_name,
                        primitive.mode()
                    );
                    continue;
                }
                let geometry = read_primitive(&primitive, buffers)?;
                let material = primitive
                    .material()
                    .index()
                    .and_then(|idx| materials.get(idx))
                    .cloned()
                    .unwrap_or_default();
                surfaces.push(Node::mesh(MeshSurface::new(mesh_name, geometry, material)));
            }
            if surfaces.len() == 1 {
                let mut single = surfaces.remove(0);
                single.name = name.or(single.name);
                single
            } else {
                Node::group(name, surfaces)
            }
        }
        None if node.camera().is_some() => Node::other(name),
        None => Node::group(name, Vec::new()),
    };

    scene_node.transform = Instance::from(node.transform());
    for child in node.children() {
        scene_node.add_child(to_scene_node(child, buffers, materials)?);
    }
    Ok(scene_node)
}

fn read_primitive(primitive: &gltf::Primitive, buffers: &[Vec<u8>]) -> anyhow::Result<MeshData> {
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));

    let mut vertices: Vec<ModelVertex> = reader
        .read_positions()
        .ok_or_else(|| anyhow!("primitive {} has no positions", primitive.index()))?
        .map(|position| ModelVertex {
            position,
            tex_coords: [0.0; 2],
            normal: [0.0, 1.0, 0.0],
        })
        .collect();

    if let Some(normals) = reader.read_normals() {
        for (vertex, normal) in vertices.iter_mut().zip(normals) {
            vertex.normal = normal;
        }
    }
    if let Some(tex_coords) = reader.read_tex_coords(0) {
        for (vertex, uv) in vertices.iter_mut().zip(tex_coords.into_f32()) {
            vertex.tex_coords = uv;
        }
    }

    let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..vertices.len() as u32).collect(),
    };
    if let Some(bad) = indices.iter().find(|&&idx| idx as usize >= vertices.len()) {
        return Err(anyhow!(
            "primitive {} references vertex {} of {}",
            primitive.index(),
            bad,
            vertices.len()
        ));
    }

    Ok(MeshData { vertices, indices })
}

/// Bytes behind a glTF URI: embedded `data:` payloads or files next to the model.
async fn load_uri(uri: &str, file_name: &str, root: &str) -> anyhow::Result<Vec<u8>> {
    match uri.strip_prefix("data:") {
        Some(data) => decode_data_uri(data),
        None => load_binary(&relative_to(file_name, uri), root).await,
    }
}

fn decode_data_uri(data: &str) -> anyhow::Result<Vec<u8>> {
    let (header, payload) = data
        .split_once(',')
        .ok_or_else(|| anyhow!("malformed data URI"))?;
    if !header.ends_with(";base64") {
        return Err(anyhow!("only base64 data URIs are supported"));
    }
    Ok(base64::engine::general_purpose::STANDARD.decode(payload)?)
}
