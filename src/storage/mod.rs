use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AppError, Result};

pub mod gcs;
pub mod local;

pub use gcs::{GcsStorage, ServiceAccountKey};
pub use local::LocalStorage;

#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Stores `data` under `filename` and returns a URL it can be fetched from.
    /// Implementations must give up once `timeout` has elapsed.
    async fn upload(&self, filename: &str, data: Vec<u8>, timeout: Duration) -> Result<String>;
}

/// Runs an upload future under a deadline. Anything the future owns (HTTP
/// connections, open files) is dropped when the deadline fires.
pub(crate) async fn with_deadline<F>(timeout: Duration, upload: F) -> Result<String>
where
    F: Future<Output = Result<String>>,
{
    tokio::time::timeout(timeout, upload)
        .await
        .map_err(|_| AppError::Storage(format!("upload timed out after {}s", timeout.as_secs())))?
}
