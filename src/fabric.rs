//! Runtime fabric swapping.
//!
//! A swap is guarded and numbered the moment the user picks a file. Reading
//! and decoding run off the event loop, then the result is applied to every
//! mesh of the model in one go. When a load finishes after a newer pick its
//! result is thrown away, so the fabric picked last is the one that stays on
//! the mannequin no matter how long each file takes to read.

use std::sync::Arc;

use crate::{
    data_structures::scene_graph::Node,
    error::{SwapError, TextureError},
    resources::texture::SurfaceTexture,
};

#[derive(Debug, Default)]
pub struct FabricSwap {
    latest: u64,
}

impl FabricSwap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a swap. Fails without side effects if there is no model yet.
    pub fn request(&mut self, model_ready: bool) -> Result<u64, SwapError> {
        if !model_ready {
            return Err(SwapError::ModelNotReady);
        }
        self.latest += 1;
        Ok(self.latest)
    }

    /// Check that `generation` is still the newest request.
    pub fn accept(&self, generation: u64) -> Result<(), SwapError> {
        if generation == self.latest {
            Ok(())
        } else {
            Err(SwapError::Stale {
                generation,
                latest: self.latest,
            })
        }
    }

    pub fn latest(&self) -> u64 {
        self.latest
    }
}

/// A fabric picked by the user, not read yet.
#[derive(Debug)]
pub enum FabricSource {
    /// A file dropped on the window.
    #[cfg(not(target_arch = "wasm32"))]
    Path(std::path::PathBuf),
    /// A file chosen in the page's file input.
    #[cfg(target_arch = "wasm32")]
    File(web_sys::File),
    Bytes { name: String, bytes: Vec<u8> },
}

impl FabricSource {
    pub fn name(&self) -> String {
        match self {
            #[cfg(not(target_arch = "wasm32"))]
            Self::Path(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            #[cfg(target_arch = "wasm32")]
            Self::File(file) => file.name(),
            Self::Bytes { name, .. } => name.clone(),
        }
    }

    /// Read the whole file.
    pub async fn read(self) -> Result<(String, Vec<u8>), TextureError> {
        let name = self.name();
        let bytes = match self {
            #[cfg(not(target_arch = "wasm32"))]
            Self::Path(path) => tokio::fs::read(&path)
                .await
                .map_err(|e| TextureError::Read(format!("{}: {e}", path.display())))?,
            #[cfg(target_arch = "wasm32")]
            Self::File(file) => crate::web::read_file(&file).await?,
            Self::Bytes { bytes, .. } => bytes,
        };
        Ok((name, bytes))
    }
}

/// Read and decode a picked fabric.
pub async fn load_fabric(
    source: FabricSource,
    max_dimension: u32,
) -> Result<Arc<SurfaceTexture>, TextureError> {
    let (name, bytes) = source.read().await?;
    decode_fabric(bytes, name, max_dimension).await
}

/// Decode a user selected image into a texture that can be shared by all meshes.
///
/// Images with a side above `max_dimension` are downscaled to fit.
pub async fn decode_fabric(
    bytes: Vec<u8>,
    name: String,
    max_dimension: u32,
) -> Result<Arc<SurfaceTexture>, TextureError> {
    let hint = name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    let mut texture = SurfaceTexture::decode_with_format(&bytes, &name, hint.as_deref())
        .or_else(|_| SurfaceTexture::decode(&bytes, &name))?;
    texture.fit_within(max_dimension);
    Ok(Arc::new(texture))
}

/// Put `texture` on every mesh below `model`. Returns the number of meshes changed.
pub fn apply_fabric(model: &mut Node, texture: &Arc<SurfaceTexture>) -> usize {
    model.for_each_mesh_mut(&mut |mesh| {
        mesh.material.set_base_color_texture(Arc::clone(texture));
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_without_model_do_not_count() {
        let mut swap = FabricSwap::new();
        assert!(matches!(swap.request(false), Err(SwapError::ModelNotReady)));
        assert_eq!(swap.latest(), 0);
        assert_eq!(swap.request(true).unwrap(), 1);
    }

    #[test]
    fn only_the_newest_generation_is_accepted() {
        let mut swap = FabricSwap::new();
        let first = swap.request(true).unwrap();
        let second = swap.request(true).unwrap();
        assert!(matches!(
            swap.accept(first),
            Err(SwapError::Stale { generation: 1, latest: 2 })
        ));
        assert!(swap.accept(second).is_ok());
    }
}
