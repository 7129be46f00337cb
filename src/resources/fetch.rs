//! Fetching raw bytes for assets.
//!
//! Paths are resolved against the asset root: on native a directory on disk,
//! on the web the `root` folder next to the page. Absolute `http(s)` URLs are
//! fetched over the network on both.

#[cfg(target_arch = "wasm32")]
use anyhow::anyhow;

use crate::loading::Progress;

#[cfg(not(target_arch = "wasm32"))]
const CHUNK_SIZE: usize = 64 * 1024;

pub fn is_remote(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://")
}

/// Resolve `uri` relative to the asset that referenced it.
pub fn relative_to(base: &str, uri: &str) -> String {
    if is_remote(uri) || uri.starts_with('/') {
        return uri.to_string();
    }
    match base.rfind('/') {
        Some(idx) => format!("{}/{}", &base[..idx], uri),
        None => uri.to_string(),
    }
}

#[cfg(target_arch = "wasm32")]
fn format_url(file_name: &str, root: &str) -> anyhow::Result<reqwest::Url> {
    let window = web_sys::window().ok_or_else(|| anyhow!("no browser window"))?;
    let origin = window
        .location()
        .origin()
        .map_err(|e| anyhow!("could not read page origin: {e:?}"))?;
    let base = reqwest::Url::parse(&format!("{}/{}/", origin, root.trim_matches('/')))?;
    // Joining an absolute URL yields that URL unchanged
    Ok(base.join(file_name)?)
}

async fn fetch_url(url: reqwest::Url, progress: &mut Progress) -> anyhow::Result<Vec<u8>> {
    let mut response = reqwest::get(url).await?.error_for_status()?;
    let total = response.content_length();
    let mut data = Vec::with_capacity(total.unwrap_or(0) as usize);
    while let Some(chunk) = response.chunk().await? {
        data.extend_from_slice(&chunk);
        progress.report(data.len() as u64, total);
    }
    Ok(data)
}

#[cfg(not(target_arch = "wasm32"))]
async fn fetch_file(path: std::path::PathBuf, progress: &mut Progress) -> anyhow::Result<Vec<u8>> {
    use tokio::io::AsyncReadExt;

    let mut file = tokio::fs::File::open(&path).await?;
    let total = file.metadata().await?.len();
    let mut data = Vec::with_capacity(total as usize);
    let mut chunk = vec![0u8; CHUNK_SIZE];
    loop {
        let read = file.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        data.extend_from_slice(&chunk[..read]);
        progress.report(data.len() as u64, Some(total));
    }
    Ok(data)
}

/// Fetch `file_name` and stream the fraction loaded into `progress`.
pub async fn fetch_bytes(
    file_name: &str,
    root: &str,
    progress: &mut Progress,
) -> anyhow::Result<Vec<u8>> {
    #[cfg(target_arch = "wasm32")]
    let data = fetch_url(format_url(file_name, root)?, progress).await?;

    #[cfg(not(target_arch = "wasm32"))]
    let data = if is_remote(file_name) {
        fetch_url(reqwest::Url::parse(file_name)?, progress).await?
    } else {
        let path = std::path::Path::new(root).join(file_name);
        fetch_file(path, progress).await?
    };

    Ok(data)
}

pub async fn load_binary(file_name: &str, root: &str) -> anyhow::Result<Vec<u8>> {
    fetch_bytes(file_name, root, &mut Progress::none()).await
}
