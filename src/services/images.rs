use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::errors::ServiceError;

pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// A file received from a multipart form.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Metadata of a stored image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageInfo {
    pub url: String,
    pub size: u64,
    pub content_type: String,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Outbound image collaborator. The core only keeps the returned URL.
#[async_trait]
pub trait ImageStorage: Send + Sync {
    /// Stores the file and returns its public URL.
    async fn upload(&self, upload: ImageUpload, product_id: Option<i64>) -> Result<String, ServiceError>;

    /// Removes a previously returned URL. `Ok(false)` when nothing was stored there.
    async fn delete(&self, url: &str) -> Result<bool, ServiceError>;

    /// URLs stored for `product_id`, sorted. Empty when there are none.
    async fn list(&self, product_id: i64) -> Result<Vec<String>, ServiceError>;

    /// Size, type and modification time of the image behind `url`.
    async fn info(&self, url: &str) -> Result<ImageInfo, ServiceError>;
}

/// Keeps images on the local disk under `products/<id|misc>/<uuid>.<ext>`.
#[derive(Debug, Clone)]
pub struct LocalImageStorage {
    root: PathBuf,
    public_base_url: String,
    max_bytes: usize,
}

impl LocalImageStorage {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str, max_bytes: usize) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            max_bytes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn extension_of(filename: &str) -> Result<String, ServiceError> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        if ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
            Ok(ext)
        } else {
            Err(ServiceError::Image(format!(
                "formato de imagem não suportado; use {}",
                ALLOWED_EXTENSIONS.join(", ")
            )))
        }
    }

    fn content_type_of(path: &Path) -> &'static str {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .as_deref()
        {
            Some("jpg") | Some("jpeg") => "image/jpeg",
            Some("png") => "image/png",
            Some("gif") => "image/gif",
            Some("webp") => "image/webp",
            _ => "application/octet-stream",
        }
    }

    /// Maps a public URL back to a path under `root`, refusing anything that
    /// would escape it.
    fn path_for_url(&self, url: &str) -> Option<PathBuf> {
        let prefix = format!("{}/", self.public_base_url);
        let relative = url.strip_prefix(&prefix)?;
        let relative = Path::new(relative);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return None;
        }
        Some(self.root.join(relative))
    }
}

#[async_trait]
impl ImageStorage for LocalImageStorage {
    #[instrument(skip(self, upload), fields(filename = %upload.filename, size = upload.bytes.len()))]
    async fn upload(&self, upload: ImageUpload, product_id: Option<i64>) -> Result<String, ServiceError> {
        if upload.bytes.is_empty() {
            return Err(ServiceError::Image("arquivo de imagem vazio".to_string()));
        }
        if upload.bytes.len() > self.max_bytes {
            return Err(ServiceError::Image(format!(
                "imagem excede o limite de {} bytes",
                self.max_bytes
            )));
        }
        let ext = Self::extension_of(&upload.filename)?;

        let folder = product_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "misc".to_string());
        let file_name = format!("{}.{}", Uuid::new_v4(), ext);
        let dir = self.root.join("products").join(&folder);

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ServiceError::InternalError(format!("cannot create {}: {}", dir.display(), e)))?;
        tokio::fs::write(dir.join(&file_name), &upload.bytes)
            .await
            .map_err(|e| ServiceError::InternalError(format!("cannot write image: {}", e)))?;

        let url = format!("{}/products/{}/{}", self.public_base_url, folder, file_name);
        info!(%url, "image stored");
        Ok(url)
    }

    async fn delete(&self, url: &str) -> Result<bool, ServiceError> {
        let Some(path) = self.path_for_url(url) else {
            return Ok(false);
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!(%url, "image deleted");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ServiceError::InternalError(format!(
                "cannot delete {}: {}",
                path.display(),
                e
            ))),
        }
    }

    #[instrument(skip(self))]
    async fn list(&self, product_id: i64) -> Result<Vec<String>, ServiceError> {
        let folder = product_id.to_string();
        let dir = self.root.join("products").join(&folder);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(ServiceError::InternalError(format!(
                    "cannot read {}: {}",
                    dir.display(),
                    e
                )))
            }
        };

        let mut urls = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ServiceError::InternalError(format!("cannot read {}: {}", dir.display(), e)))?
        {
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            if let (true, Some(name)) = (is_file, entry.file_name().to_str()) {
                urls.push(format!("{}/products/{}/{}", self.public_base_url, folder, name));
            }
        }
        urls.sort();
        debug!(product_id, total = urls.len(), "product images listed");
        Ok(urls)
    }

    async fn info(&self, url: &str) -> Result<ImageInfo, ServiceError> {
        let path = self
            .path_for_url(url)
            .ok_or_else(|| ServiceError::Image("URL de imagem inválida".to_string()))?;
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => return Err(ServiceError::NotFound(format!("imagem {} não encontrada", url))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ServiceError::NotFound(format!("imagem {} não encontrada", url)))
            }
            Err(e) => {
                return Err(ServiceError::InternalError(format!(
                    "cannot stat {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        Ok(ImageInfo {
            url: url.to_string(),
            size: metadata.len(),
            content_type: Self::content_type_of(&path).to_string(),
            last_modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn storage(dir: &tempfile::TempDir) -> LocalImageStorage {
        LocalImageStorage::new(dir.path(), "/uploads/", 16)
    }

    fn upload(name: &str, bytes: &'static [u8]) -> ImageUpload {
        ImageUpload {
            filename: name.to_string(),
            content_type: Some("image/png".to_string()),
            bytes: Bytes::from_static(bytes),
        }
    }

    #[tokio::test]
    async fn stores_under_product_folder_and_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(&dir);

        let url = storage.upload(upload("Foto.PNG", b"png-bytes"), Some(12)).await.unwrap();
        assert!(url.starts_with("/uploads/products/12/"));
        assert!(url.ends_with(".png"));

        let path = storage.path_for_url(&url).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"png-bytes");

        assert!(storage.delete(&url).await.unwrap());
        assert!(!storage.delete(&url).await.unwrap());
    }

    #[tokio::test]
    async fn uploads_without_product_go_to_misc() {
        let dir = tempfile::tempdir().unwrap();
        let url = storage(&dir).upload(upload("a.webp", b"x"), None).await.unwrap();
        assert!(url.starts_with("/uploads/products/misc/"));
    }

    #[tokio::test]
    async fn rejects_bad_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(&dir);
        assert_matches!(
            storage.upload(upload("a.exe", b"x"), None).await,
            Err(ServiceError::Image(_))
        );
        assert_matches!(
            storage.upload(upload("a.png", b""), None).await,
            Err(ServiceError::Image(_))
        );
        assert_matches!(
            storage.upload(upload("a.png", b"0123456789abcdefg"), None).await,
            Err(ServiceError::Image(_))
        );
    }

    #[tokio::test]
    async fn lists_only_the_products_own_images() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(&dir);
        assert!(storage.list(3).await.unwrap().is_empty());

        let a = storage.upload(upload("a.png", b"a"), Some(3)).await.unwrap();
        let b = storage.upload(upload("b.jpg", b"b"), Some(3)).await.unwrap();
        storage.upload(upload("c.png", b"c"), Some(4)).await.unwrap();

        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(storage.list(3).await.unwrap(), expected);
    }

    #[tokio::test]
    async fn info_reports_size_and_type() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(&dir);
        let url = storage.upload(upload("foto.JPG", b"jpeg-data"), Some(5)).await.unwrap();

        let info = storage.info(&url).await.unwrap();
        assert_eq!(info.url, url);
        assert_eq!(info.size, 9);
        assert_eq!(info.content_type, "image/jpeg");
        assert!(info.last_modified.is_some());

        storage.delete(&url).await.unwrap();
        assert_matches!(storage.info(&url).await, Err(ServiceError::NotFound(_)));
        assert_matches!(
            storage.info("http://cdn.example.com/a.png").await,
            Err(ServiceError::Image(_))
        );
    }

    #[tokio::test]
    async fn foreign_or_escaping_urls_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(&dir);
        assert!(!storage.delete("http://cdn.example.com/a.png").await.unwrap());
        assert!(storage.path_for_url("/uploads/../secret").is_none());
    }
}
