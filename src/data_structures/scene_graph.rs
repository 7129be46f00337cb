//! Scene graph and hierarchical scene organization.
//!
//! The scene is a plain CPU-side tree. [`SceneRoot`] is the single container
//! of everything that gets drawn, a loaded model is one [`Node`] subtree under
//! it. Node kinds form a closed set ([`NodeKind`]) so every walk over the tree
//! matches exhaustively instead of probing for capabilities.
//!
//! GPU resources are not owned here. The renderer mirrors every
//! [`MeshSurface`] by its [`MeshId`] and refreshes the mirror whenever a
//! [`Material`] is flagged with `needs_update`.

use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};

use crate::{
    data_structures::{instance::Instance, model::ModelVertex},
    resources::{environment::EnvironmentMap, texture::SurfaceTexture},
};

static NEXT_MESH_ID: AtomicU32 = AtomicU32::new(1);

/// Unique identity of a mesh surface for the lifetime of the process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(u32);

impl MeshId {
    pub fn next() -> Self {
        Self(NEXT_MESH_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Triangle geometry of one glTF primitive.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
}

#[derive(Clone, Debug)]
pub struct Material {
    pub name: String,
    pub base_color_factor: [f32; 4],
    /// The surface colour map. `None` renders the plain factor.
    pub base_color_texture: Option<Arc<SurfaceTexture>>,
    /// Set whenever the GPU copy of this material is out of date.
    pub needs_update: bool,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_color_factor: [1.0; 4],
            base_color_texture: None,
            needs_update: true,
        }
    }

    /// Point the surface colour at `texture` and request a GPU refresh.
    pub fn set_base_color_texture(&mut self, texture: Arc<SurfaceTexture>) {
        self.base_color_texture = Some(texture);
        self.needs_update = true;
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::new("default")
    }
}

/// A drawable surface with its own material.
#[derive(Clone, Debug)]
pub struct MeshSurface {
    pub id: MeshId,
    pub name: String,
    pub geometry: Arc<MeshData>,
    pub material: Material,
}

impl MeshSurface {
    pub fn new(name: impl Into<String>, geometry: MeshData, material: Material) -> Self {
        Self {
            id: MeshId::next(),
            name: name.into(),
            geometry: Arc::new(geometry),
            material,
        }
    }
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    Mesh(MeshSurface),
    Group,
    /// Cameras, lights and anything else that is carried but never drawn.
    Other,
}

#[derive(Clone, Debug)]
pub struct Node {
    pub name: Option<String>,
    pub transform: Instance,
    pub kind: NodeKind,
    pub children: Vec<Node>,
}

impl Node {
    pub fn group(name: Option<String>, children: Vec<Node>) -> Self {
        Self {
            name,
            transform: Instance::default(),
            kind: NodeKind::Group,
            children,
        }
    }

    pub fn mesh(surface: MeshSurface) -> Self {
        Self {
            name: Some(surface.name.clone()),
            transform: Instance::default(),
            kind: NodeKind::Mesh(surface),
            children: Vec::new(),
        }
    }

    pub fn other(name: Option<String>) -> Self {
        Self {
            name,
            transform: Instance::default(),
            kind: NodeKind::Other,
            children: Vec::new(),
        }
    }

    pub fn with_transform(mut self, transform: Instance) -> Self {
        self.transform = transform;
        self
    }

    pub fn add_child(&mut self, child: Node) {
        self.children.push(child);
    }

    /// Depth first walk over this node and all of its descendants.
    pub fn traverse(&self, visit: &mut dyn FnMut(&Node)) {
        visit(self);
        for child in &self.children {
            child.traverse(visit);
        }
    }

    pub fn traverse_mut(&mut self, visit: &mut dyn FnMut(&mut Node)) {
        visit(self);
        for child in &mut self.children {
            child.traverse_mut(visit);
        }
    }

    /// Visit every mesh surface, returns how many were visited.
    pub fn for_each_mesh_mut(&mut self, visit: &mut dyn FnMut(&mut MeshSurface)) -> usize {
        let mut visited = 0;
        self.traverse_mut(&mut |node| match &mut node.kind {
            NodeKind::Mesh(surface) => {
                visit(surface);
                visited += 1;
            }
            NodeKind::Group | NodeKind::Other => (),
        });
        visited
    }

    /// Visit every mesh surface together with its world transform.
    pub fn for_each_mesh_world(&self, parent: &Instance, visit: &mut dyn FnMut(&MeshSurface, &Instance)) {
        let world = parent * &self.transform;
        match &self.kind {
            NodeKind::Mesh(surface) => visit(surface, &world),
            NodeKind::Group | NodeKind::Other => (),
        }
        for child in &self.children {
            child.for_each_mesh_world(&world, visit);
        }
    }

    pub fn meshes(&self) -> Vec<&MeshSurface> {
        let mut meshes = Vec::new();
        collect_meshes(self, &mut meshes);
        meshes
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes().len()
    }
}

fn collect_meshes<'a>(node: &'a Node, meshes: &mut Vec<&'a MeshSurface>) {
    match &node.kind {
        NodeKind::Mesh(surface) => meshes.push(surface),
        NodeKind::Group | NodeKind::Other => (),
    }
    for child in &node.children {
        collect_meshes(child, meshes);
    }
}

/// Stable reference to a subtree attached to the [`SceneRoot`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeHandle(u64);

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Background {
    Colour(wgpu::Color),
    Environment,
}

#[derive(Debug)]
pub struct SceneRoot {
    children: Vec<(NodeHandle, Node)>,
    next_handle: u64,
    pub environment: Option<EnvironmentMap>,
    pub background: Background,
}

impl SceneRoot {
    pub fn new(background: wgpu::Color) -> Self {
        Self {
            children: Vec::new(),
            next_handle: 0,
            environment: None,
            background: Background::Colour(background),
        }
    }

    pub fn add(&mut self, node: Node) -> NodeHandle {
        let handle = NodeHandle(self.next_handle);
        self.next_handle += 1;
        self.children.push((handle, node));
        handle
    }

    pub fn remove(&mut self, handle: NodeHandle) -> Option<Node> {
        let idx = self.children.iter().position(|(h, _)| *h == handle)?;
        Some(self.children.remove(idx).1)
    }

    pub fn get(&self, handle: NodeHandle) -> Option<&Node> {
        self.children
            .iter()
            .find(|(h, _)| *h == handle)
            .map(|(_, node)| node)
    }

    pub fn get_mut(&mut self, handle: NodeHandle) -> Option<&mut Node> {
        self.children
            .iter_mut()
            .find(|(h, _)| *h == handle)
            .map(|(_, node)| node)
    }

    pub fn children(&self) -> impl Iterator<Item = &Node> {
        self.children.iter().map(|(_, node)| node)
    }

    pub fn children_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.children.iter_mut().map(|(_, node)| node)
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface(name: &str) -> MeshSurface {
        MeshSurface::new(name, MeshData::default(), Material::default())
    }

    fn tree() -> Node {
        let mut torso = Node::group(Some("torso".into()), vec![Node::mesh(surface("shirt"))]);
        torso.add_child(Node::other(Some("camera".into())));
        Node::group(None, vec![torso, Node::mesh(surface("legs"))])
    }

    #[test]
    fn walks_meshes_only() {
        let mut root = tree();
        let mut names = Vec::new();
        let visited = root.for_each_mesh_mut(&mut |mesh| names.push(mesh.name.clone()));
        assert_eq!(visited, 2);
        assert_eq!(names, vec!["shirt", "legs"]);
        assert_eq!(root.mesh_count(), 2);
    }

    #[test]
    fn mesh_ids_are_unique() {
        let a = surface("a");
        let b = surface("b");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn removed_handles_are_gone() {
        let mut scene = SceneRoot::new(wgpu::Color::WHITE);
        let first = scene.add(tree());
        let second = scene.add(tree());
        assert_ne!(first, second);
        assert!(scene.remove(first).is_some());
        assert!(scene.get(first).is_none());
        assert!(scene.get(second).is_some());
        assert_eq!(scene.child_count(), 1);
    }
}
