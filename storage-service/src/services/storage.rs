use async_trait::async_trait;
use chrono::Utc;
use service_core::error::AppError;
use service_core::utils::signature::{generate_blob_signature, validate_blob_signature};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<(), AppError>;
    async fn get(&self, key: &str) -> Result<Vec<u8>, AppError>;
    async fn delete(&self, key: &str) -> Result<(), AppError>;

    /// Build a time-limited download URL for `key`.
    fn presign_get(&self, key: &str, ttl_secs: u64) -> Result<String, AppError>;

    /// Check a presigned request produced by `presign_get`.
    fn verify_presigned(&self, key: &str, expires: i64, signature: &str) -> Result<(), AppError>;
}

/// Blob store backed by a directory on local disk.
pub struct LocalBlobStore {
    base_path: PathBuf,
    public_base_url: String,
    signing_secret: String,
}

impl LocalBlobStore {
    pub async fn new(
        base_path: impl Into<PathBuf>,
        public_base_url: impl Into<String>,
        signing_secret: impl Into<String>,
    ) -> Result<Self, AppError> {
        let base_path = base_path.into();
        if !base_path.exists() {
            fs::create_dir_all(&base_path).await?;
        }
        Ok(Self {
            base_path,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            signing_secret: signing_secret.into(),
        })
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, AppError> {
        let relative = Path::new(key);
        let is_plain = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));

        if !is_plain {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Invalid blob key: {}",
                key
            )));
        }
        Ok(self.base_path.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<(), AppError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, data).await.map_err(|e| {
            tracing::error!(key = %key, "Failed to write blob: {}", e);
            AppError::StorageError(anyhow::Error::new(e))
        })?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, AppError> {
        let path = self.resolve(key)?;
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(AppError::NotFound(
                anyhow::anyhow!("Blob not found: {}", key),
            )),
            Err(e) => Err(AppError::StorageError(anyhow::Error::new(e))),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::StorageError(anyhow::Error::new(e))),
        }
    }

    fn presign_get(&self, key: &str, ttl_secs: u64) -> Result<String, AppError> {
        self.resolve(key)?;
        let expires = i64::try_from(ttl_secs)
            .ok()
            .and_then(|ttl| Utc::now().timestamp().checked_add(ttl))
            .ok_or_else(|| {
                AppError::ConfigError(anyhow::anyhow!("presign ttl of {ttl_secs}s is out of range"))
            })?;
        let signature = generate_blob_signature(key, expires, &self.signing_secret)?;

        Ok(format!(
            "{}/v1/blobs/{}?expires={}&signature={}",
            self.public_base_url, key, expires, signature
        ))
    }

    fn verify_presigned(&self, key: &str, expires: i64, signature: &str) -> Result<(), AppError> {
        validate_blob_signature(
            key,
            signature,
            expires,
            Utc::now().timestamp(),
            &self.signing_secret,
        )
    }
}
