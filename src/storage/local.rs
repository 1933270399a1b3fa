use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::{
    error::{AppError, Result},
    storage::{with_deadline, BlobStorage},
};

/// Writes blobs into a directory that is served elsewhere (development setups).
pub struct LocalStorage {
    directory: PathBuf,
    public_base_url: String,
}

impl LocalStorage {
    pub fn new(directory: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            directory: directory.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn write(&self, filename: &str, data: &[u8]) -> Result<String> {
        if filename.is_empty() || filename.contains(['/', '\\']) || filename.starts_with('.') {
            return Err(AppError::Storage(format!("Invalid filename: {}", filename)));
        }

        // Ensure the target directory exists
        fs::create_dir_all(&self.directory).await.map_err(|e| {
            AppError::Storage(format!("Failed to create storage directory: {}", e))
        })?;

        let file_path = self.directory.join(filename);
        let mut file = fs::File::create(&file_path).await.map_err(|e| {
            AppError::Storage(format!("Failed to create file: {}", e))
        })?;

        file.write_all(data).await.map_err(|e| {
            AppError::Storage(format!("Failed to write file: {}", e))
        })?;
        file.flush().await.map_err(|e| {
            AppError::Storage(format!("Failed to flush file: {}", e))
        })?;

        Ok(format!("{}/{}", self.public_base_url, filename))
    }
}

#[async_trait]
impl BlobStorage for LocalStorage {
    async fn upload(&self, filename: &str, data: Vec<u8>, timeout: Duration) -> Result<String> {
        with_deadline(timeout, self.write(filename, &data)).await
    }
}
