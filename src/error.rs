//! Error taxonomy of the viewer.
//!
//! Every failure is reported back to the [`crate::viewer::Viewer`] which logs
//! it and stops the affected operation. Nothing is retried and nothing is
//! surfaced to the user beyond the log.

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to fetch {path}: {source}")]
    Fetch {
        path: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to decode environment {path}: {source}")]
    Environment {
        path: String,
        #[source]
        source: image::ImageError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum TextureError {
    #[error("the selected file is empty")]
    Empty,
    #[error("could not read the selected file: {0}")]
    Read(String),
    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),
}

#[derive(Debug, thiserror::Error)]
pub enum SwapError {
    #[error("Mannequin not loaded yet!")]
    ModelNotReady,
    #[error("fabric texture could not be applied: {0}")]
    Decode(#[from] TextureError),
    #[error("discarded fabric #{generation}, #{latest} was requested after it")]
    Stale { generation: u64, latest: u64 },
}
