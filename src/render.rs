//! Per frame GPU synchronisation and drawing of the scene.
//!
//! The scene graph itself is GPU free. [`SceneRenderer`] mirrors it: every
//! mesh surface gets a [`GpuMesh`] keyed by its [`MeshId`], materials flagged
//! `needs_update` are bound again, meshes of a replaced model are dropped
//! and a freshly installed environment is uploaded once. Surface images are
//! uploaded once per shared `Arc`, so meshes sharing a fabric also share its
//! GPU texture. The panorama pixels
//! are released from the scene right after their upload.

use std::{
    collections::{HashMap, HashSet},
    iter,
    sync::Arc,
};

use crate::{
    context::Context,
    data_structures::{
        instance::Instance,
        model::{self, DrawMesh, GpuMaterial, GpuMesh},
        scene_graph::{Background, MeshId, SceneRoot},
        texture::Texture,
    },
    resources::texture::SurfaceTexture,
    pipelines::{
        basic::mk_model_pipeline,
        environment::EnvironmentUniform,
        skybox::SkyboxResources,
    },
};

pub struct SceneRenderer {
    model_pipeline: wgpu::RenderPipeline,
    material_layout: wgpu::BindGroupLayout,
    // Sampled by materials without a colour map
    fallback: Texture,
    skybox: SkyboxResources,
    meshes: HashMap<MeshId, GpuMesh>,
    textures: SharedTextures<Texture>,
    environment_installed: bool,
}

/// One value per shared surface image, e.g. its GPU texture.
///
/// Keyed by the address of the shared image. Each entry keeps a clone of the
/// `Arc` so the address cannot be reused while the entry exists.
#[derive(Debug)]
pub struct SharedTextures<T> {
    entries: HashMap<usize, (Arc<SurfaceTexture>, T)>,
    used: HashSet<usize>,
}

impl<T> SharedTextures<T> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            used: HashSet::new(),
        }
    }

    /// Keep the entry of `image` through the next [`SharedTextures::sweep`].
    pub fn mark(&mut self, image: &Arc<SurfaceTexture>) {
        self.used.insert(Arc::as_ptr(image) as usize);
    }

    /// The value of `image`, created by `upload` on first use.
    pub fn get_or_insert_with(
        &mut self,
        image: &Arc<SurfaceTexture>,
        upload: impl FnOnce(&SurfaceTexture) -> T,
    ) -> &T {
        let key = Arc::as_ptr(image) as usize;
        self.used.insert(key);
        &self
            .entries
            .entry(key)
            .or_insert_with(|| (Arc::clone(image), upload(image)))
            .1
    }

    /// Drop entries that were not marked since the last sweep.
    pub fn sweep(&mut self) {
        let used = std::mem::take(&mut self.used);
        self.entries.retain(|key, _| used.contains(key));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for SharedTextures<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SceneRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneRenderer")
            .field("meshes", &self.meshes.len())
            .field("textures", &self.textures.len())
            .field("environment_installed", &self.environment_installed)
            .finish()
    }
}

impl SceneRenderer {
    pub fn new(ctx: &Context) -> Self {
        let material_layout = model::material_layout(&ctx.device);
        let model_pipeline = mk_model_pipeline(
            &ctx.device,
            ctx.config.format,
            &material_layout,
            &ctx.camera.bind_group_layout,
            &ctx.environment.bind_group_layout,
        );
        let fallback = Texture::create_solid([255, 255, 255, 255], "white", &ctx.device, &ctx.queue);
        let skybox = SkyboxResources::new(&ctx.device, ctx.config.format, &ctx.camera.bind_group_layout);
        Self {
            model_pipeline,
            material_layout,
            fallback,
            skybox,
            meshes: HashMap::new(),
            textures: SharedTextures::new(),
            environment_installed: false,
        }
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    /// Number of distinct surface images on the GPU.
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Bring the GPU mirror up to date with `scene`.
    pub fn sync(&mut self, ctx: &mut Context, scene: &mut SceneRoot, environment_intensity: f32) {
        if !self.environment_installed {
            if let Some(environment) = scene.environment.as_mut() {
                ctx.environment.write(
                    &ctx.queue,
                    EnvironmentUniform::from_environment(environment, environment_intensity),
                );
                if let Some(pixels) = environment.release_radiance() {
                    let (width, height) = environment.dimensions();
                    let max_dimension = ctx.device.limits().max_texture_dimension_2d;
                    if width.max(height) > max_dimension {
                        log::warn!(
                            "Environment {width}x{height} exceeds the GPU limit of {max_dimension}px, no skybox"
                        );
                    } else {
                        let panorama =
                            Texture::from_environment(&ctx.device, &ctx.queue, width, height, &pixels);
                        self.skybox.set_panorama(&ctx.device, panorama);
                    }
                }
                self.environment_installed = true;
                log::debug!("Environment uploaded");
            }
        }

        let Self {
            material_layout,
            fallback,
            meshes,
            textures,
            ..
        } = self;
        let (material_layout, fallback) = (&*material_layout, &*fallback);
        let mut seen = HashSet::new();
        for node in scene.children() {
            node.for_each_mesh_world(&Instance::new(), &mut |surface, world| {
                seen.insert(surface.id);
                let image = surface.material.base_color_texture.as_ref();
                if let Some(image) = image {
                    textures.mark(image);
                }
                let rebuild = surface.material.needs_update || !meshes.contains_key(&surface.id);
                let material = rebuild.then(|| {
                    let texture = match image {
                        Some(image) => textures.get_or_insert_with(image, |image| {
                            Texture::from_surface_texture(&ctx.device, &ctx.queue, image)
                        }),
                        None => fallback,
                    };
                    GpuMaterial::new(&ctx.device, material_layout, &surface.material, texture)
                });
                match (meshes.get_mut(&surface.id), material) {
                    (Some(gpu), material) => {
                        if let Some(material) = material {
                            gpu.material = material;
                        }
                        gpu.write_transform(&ctx.queue, world);
                    }
                    (None, Some(material)) => {
                        meshes.insert(surface.id, GpuMesh::new(&ctx.device, surface, world, material));
                    }
                    (None, None) => (),
                }
            });
        }
        for node in scene.children_mut() {
            node.for_each_mesh_mut(&mut |surface| surface.material.needs_update = false);
        }
        textures.sweep();
        meshes.retain(|id, _| seen.contains(id));
    }

    pub fn render(&self, ctx: &Context, scene: &SceneRoot) -> Result<(), wgpu::SurfaceError> {
        let output = ctx.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        let draw_skybox = scene.background == Background::Environment && self.skybox.has_panorama();
        let clear_colour = match scene.background {
            Background::Colour(colour) => colour,
            Background::Environment if draw_skybox => wgpu::Color::BLACK,
            Background::Environment => wgpu::Color::WHITE,
        };

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear_colour),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &ctx.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            if draw_skybox {
                self.skybox.draw(&mut render_pass, &ctx.camera.bind_group);
            }

            render_pass.set_pipeline(&self.model_pipeline);
            for mesh in self.meshes.values() {
                render_pass.draw_mesh(mesh, &ctx.camera.bind_group, &ctx.environment.bind_group);
            }
        }

        ctx.queue.submit(iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}
