//! Blob storage for catalog images
//!
//! [`BlobStore`] uploads bytes and hands back a public URL that is stored on
//! the catalog record. [`MinIOClient`] is the deployed implementation;
//! [`InMemoryBlobStore`] keeps objects in process for development and tests.

mod minio_client;

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

pub use minio_client::MinIOClient;

use crate::modules::backend::BackendError;

/// Image types accepted for catalog uploads
pub const ALLOWED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

/// Maximum image size (5MB)
pub const MAX_IMAGE_SIZE: usize = 5 * 1024 * 1024;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` under `folder` and return its public URL
    async fn upload(
        &self,
        folder: &str,
        file_name: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<String, BackendError>;

    /// Remove the object behind a URL previously returned by `upload`
    async fn delete_by_url(&self, url: &str) -> Result<(), BackendError>;
}

pub fn is_image_type_allowed(content_type: &str) -> bool {
    ALLOWED_IMAGE_TYPES.contains(&content_type)
}

pub fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// `{folder}/{uuid}.{ext}`; the extension comes from the content type, else the file name
pub(crate) fn object_path(folder: &str, file_name: &str, content_type: &str) -> String {
    let extension = extension_for(content_type)
        .map(str::to_string)
        .or_else(|| {
            file_name
                .rsplit_once('.')
                .map(|(_, ext)| urlencoding::encode(&ext.to_lowercase()).into_owned())
        })
        .unwrap_or_else(|| "bin".to_string());
    format!("{}/{}.{}", folder, Uuid::new_v4(), extension)
}

/// Object store kept in process memory
pub struct InMemoryBlobStore {
    public_base_url: String,
    objects: RwLock<HashMap<String, (Vec<u8>, String)>>,
}

impl InMemoryBlobStore {
    pub fn new(public_base_url: impl Into<String>) -> Self {
        Self {
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            objects: RwLock::new(HashMap::new()),
        }
    }

    #[allow(dead_code)]
    pub async fn contains(&self, url: &str) -> bool {
        self.objects.read().await.contains_key(url)
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn upload(
        &self,
        folder: &str,
        file_name: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<String, BackendError> {
        let url = format!(
            "{}/{}",
            self.public_base_url,
            object_path(folder, file_name, content_type)
        );
        self.objects
            .write()
            .await
            .insert(url.clone(), (data, content_type.to_string()));
        Ok(url)
    }

    async fn delete_by_url(&self, url: &str) -> Result<(), BackendError> {
        self.objects.write().await.remove(url);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_path_uses_content_type_extension() {
        let path = object_path("products", "photo.JPEG", "image/png");
        assert!(path.starts_with("products/"));
        assert!(path.ends_with(".png"));
    }

    #[test]
    fn test_object_path_falls_back_to_file_name() {
        assert!(object_path("categories", "cover.Tiff", "image/tiff").ends_with(".tiff"));
        assert!(object_path("categories", "cover", "image/tiff").ends_with(".bin"));
    }

    #[test]
    fn test_allowed_image_types() {
        assert!(is_image_type_allowed("image/webp"));
        assert!(!is_image_type_allowed("application/pdf"));
    }

    #[tokio::test]
    async fn test_in_memory_upload_and_delete() {
        let store = InMemoryBlobStore::new("http://localhost:3000/blobs/");
        let url = store
            .upload("categories", "a.png", vec![1, 2, 3], "image/png")
            .await
            .unwrap();
        assert!(url.starts_with("http://localhost:3000/blobs/categories/"));
        assert!(store.contains(&url).await);

        store.delete_by_url(&url).await.unwrap();
        assert!(!store.contains(&url).await);
    }
}
