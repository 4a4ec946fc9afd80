use crate::prelude::*;
use slidegen_core::image::{
    fetched_resolution, plan_image, stored_resolution, ImageKind, ImagePlan, ImageResolution,
    ImageSize,
};
use std::path::{Path, PathBuf};

/// Raw HTTP response for a binary download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedBinary {
    pub status: u16,
    pub mime_type: Option<String>,
    pub data: Vec<u8>,
}

#[allow(async_fn_in_trait)]
pub trait BinaryFetch {
    async fn fetch(&self, url: &str) -> Result<FetchedBinary>;
}

/// Opaque file store addressed by id.
#[allow(async_fn_in_trait)]
pub trait ImageStore {
    /// File bytes and mime type.
    async fn get_by_id(&self, id: &str) -> Result<(Vec<u8>, String)>;
}

#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BinaryFetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedBinary> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| eyre!("Failed to fetch image: {}", e))?;

        let status = response.status().as_u16();
        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let data = response
            .bytes()
            .await
            .map_err(|e| eyre!("Failed to read image body: {}", e))?
            .to_vec();

        Ok(FetchedBinary {
            status,
            mime_type,
            data,
        })
    }
}

/// Image store backed by a directory; a file's id is its name without the
/// extension.
#[derive(Debug, Clone)]
pub struct DirImageStore {
    dir: PathBuf,
}

impl DirImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    async fn find(&self, id: &str) -> Result<PathBuf> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| eyre!("Failed to read image directory {}: {}", self.dir.display(), e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| eyre!("Failed to read image directory entry: {}", e))?
        {
            let path = entry.path();
            let matches = path.file_stem().and_then(|s| s.to_str()) == Some(id)
                || path.file_name().and_then(|s| s.to_str()) == Some(id);
            if matches && path.is_file() {
                return Ok(path);
            }
        }

        Err(eyre!("File not found in image store: {}", id))
    }
}

/// Mime type implied by a file extension.
pub fn mime_from_path(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        "txt" | "md" => "text/plain",
        "json" => "application/json",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

impl ImageStore for DirImageStore {
    async fn get_by_id(&self, id: &str) -> Result<(Vec<u8>, String)> {
        let path = self.find(id).await?;
        let data = tokio::fs::read(&path)
            .await
            .map_err(|e| eyre!("Failed to read {}: {}", path.display(), e))?;
        Ok((data, mime_from_path(&path).to_string()))
    }
}

/// Store used when no image directory is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoImageStore;

impl ImageStore for NoImageStore {
    async fn get_by_id(&self, id: &str) -> Result<(Vec<u8>, String)> {
        Err(eyre!("No image store configured for file id {}", id))
    }
}

/// Resolve an image value to bytes. Never fails; errors come back as
/// [`ImageResolution::Failed`].
pub async fn resolve_image<F: BinaryFetch, S: ImageStore>(
    fetcher: &F,
    store: &S,
    value: &str,
    size: ImageSize,
    placeholder_base: &str,
) -> ImageResolution {
    match plan_image(value, size, placeholder_base) {
        ImagePlan::Done(resolution) => resolution,
        ImagePlan::Fetch { kind, url } => match fetcher.fetch(&url).await {
            Ok(fetched) => fetched_resolution(
                kind,
                fetched.status,
                fetched.mime_type.as_deref(),
                fetched.data,
            ),
            Err(e) => ImageResolution::failed(Some(kind), e.to_string()),
        },
        ImagePlan::Lookup { id } => match store.get_by_id(&id).await {
            Ok((data, mime_type)) => stored_resolution(&mime_type, data),
            Err(e) => ImageResolution::failed(Some(ImageKind::StoreReference), e.to_string()),
        },
    }
}
