use std::sync::Arc;

use mannequin_viewer::{
    data_structures::scene_graph::{Node, NodeKind},
    resources::parse_model,
};

use crate::common::test_utils::{mannequin_glb, mannequin_gltf, png_bytes, runtime};

mod common;

fn find<'a>(node: &'a Node, name: &str) -> Option<&'a Node> {
    if node.name.as_deref() == Some(name) {
        return Some(node);
    }
    node.children.iter().find_map(|child| find(child, name))
}

#[test]
fn gltf_with_data_uris_keeps_hierarchy_and_materials() {
    let rt = runtime();
    let gltf = mannequin_gltf(&png_bytes(2, 2, [200, 10, 10, 255]));
    let model = rt
        .block_on(parse_model(gltf.into_bytes(), "mannequin.gltf", "assets"))
        .unwrap();

    let root = find(&model, "mannequin").unwrap();
    assert_eq!(root.transform.position.y, 1.0);
    assert!(matches!(find(&model, "camera").unwrap().kind, NodeKind::Other));

    let torso = find(&model, "torso").unwrap();
    let NodeKind::Mesh(shirt) = &torso.kind else {
        panic!("torso is not a mesh");
    };
    assert_eq!(shirt.geometry.vertices.len(), 3);
    assert_eq!(shirt.geometry.indices, vec![0, 1, 2]);
    assert_eq!(shirt.geometry.vertices[1].tex_coords, [1.0, 0.0]);
    let texture = shirt.material.base_color_texture.as_ref().unwrap();
    assert_eq!(texture.dimensions(), (2, 2));
    assert_eq!(texture.image.get_pixel(0, 0).0, [200, 10, 10, 255]);

    let legs = find(&model, "legs").unwrap();
    let NodeKind::Mesh(legs) = &legs.kind else {
        panic!("legs is not a mesh");
    };
    assert!(legs.material.base_color_texture.is_none());
    assert_eq!(legs.material.base_color_factor, [0.2, 0.2, 0.8, 1.0]);
    assert_ne!(shirt.id, legs.id);
}

#[test]
fn glb_image_is_read_from_its_buffer_view() {
    let rt = runtime();
    let glb = mannequin_glb(&png_bytes(3, 1, [10, 20, 30, 255]));
    let model = rt
        .block_on(parse_model(glb, "mannequin.glb", "assets"))
        .unwrap();

    assert_eq!(model.mesh_count(), 2);
    let textures: Vec<_> = model
        .meshes()
        .into_iter()
        .filter_map(|mesh| mesh.material.base_color_texture.clone())
        .collect();
    assert_eq!(textures.len(), 1);
    assert_eq!(textures[0].dimensions(), (3, 1));
    assert!(!textures[0].flip_y);
}

#[test]
fn world_transforms_compose_down_the_tree() {
    let rt = runtime();
    let gltf = mannequin_gltf(&png_bytes(1, 1, [0, 0, 0, 255]));
    let model = rt
        .block_on(parse_model(gltf.into_bytes(), "mannequin.gltf", "assets"))
        .unwrap();

    let mut heights = Vec::new();
    model.for_each_mesh_world(&Default::default(), &mut |mesh, world| {
        heights.push((mesh.name.clone(), world.position.y));
    });
    heights.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(heights, vec![("legs".to_string(), 0.5), ("shirt".to_string(), 1.0)]);
}

#[test]
fn shared_images_are_decoded_once() {
    let rt = runtime();
    let gltf = mannequin_gltf(&png_bytes(1, 1, [0, 0, 0, 255]))
        // Point the second material at the same image
        .replace(
            r#""baseColorFactor": [0.2, 0.2, 0.8, 1.0]"#,
            r#""baseColorTexture": { "index": 0 }"#,
        );
    let model = rt
        .block_on(parse_model(gltf.into_bytes(), "mannequin.gltf", "assets"))
        .unwrap();
    let meshes = model.meshes();
    let a = meshes[0].material.base_color_texture.as_ref().unwrap();
    let b = meshes[1].material.base_color_texture.as_ref().unwrap();
    assert!(Arc::ptr_eq(a, b));
}
