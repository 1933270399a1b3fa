use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::{
    error::{AppError, Result},
    storage::{with_deadline, BlobStorage},
};

const UPLOAD_BASE_URL: &str = "https://storage.googleapis.com/upload/storage/v1";
const PUBLIC_BASE_URL: &str = "https://storage.googleapis.com";
const STORAGE_SCOPE: &str = "https://www.googleapis.com/auth/devstorage.read_write";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const CONTENT_TYPE: &str = "application/octet-stream";

/// The JSON key file Google issues for a service account.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key_id: String,
    pub private_key: String,
    pub token_uri: String,
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

struct CachedToken {
    value: String,
    expires_at: i64,
}

pub struct GcsStorage {
    client: reqwest::Client,
    bucket_name: String,
    key: ServiceAccountKey,
    token: RwLock<Option<CachedToken>>,
}

impl GcsStorage {
    pub fn new(bucket_name: String, key: ServiceAccountKey) -> Self {
        Self {
            client: reqwest::Client::new(),
            bucket_name,
            key,
            token: RwLock::new(None),
        }
    }

    pub fn from_key_file(bucket_name: String, path: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::Storage(format!("Failed to read service account key {}: {}", path, e))
        })?;
        let key: ServiceAccountKey = serde_json::from_str(&raw).map_err(|e| {
            AppError::Storage(format!("Invalid service account key: {}", e))
        })?;
        Ok(Self::new(bucket_name, key))
    }

    pub fn public_url(&self, filename: &str) -> String {
        format!("{}/{}/{}", PUBLIC_BASE_URL, self.bucket_name, filename)
    }

    fn sign_assertion(&self, now: i64) -> Result<String> {
        let claims = Claims {
            iss: &self.key.client_email,
            scope: STORAGE_SCOPE,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + 3600,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.key.private_key_id.clone());

        let key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| AppError::Storage(format!("Invalid service account private key: {}", e)))?;

        jsonwebtoken::encode(&header, &claims, &key)
            .map_err(|e| AppError::Storage(format!("Failed to sign token assertion: {}", e)))
    }

    async fn access_token(&self) -> Result<String> {
        let now = Utc::now().timestamp();
        {
            let cached = self.token.read().await;
            if let Some(token) = cached.as_ref().filter(|t| t.expires_at - 60 > now) {
                return Ok(token.value.clone());
            }
        }

        let assertion = self.sign_assertion(now)?;
        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Error fetching storage access token: {} {}", status, body);
            return Err(AppError::Storage(format!("Token endpoint returned {}", status)));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::Storage(format!("Invalid token response: {}", e)))?;

        let value = token.access_token.clone();
        *self.token.write().await = Some(CachedToken {
            value: token.access_token,
            expires_at: now + token.expires_in,
        });

        Ok(value)
    }

    async fn put_object(&self, filename: &str, data: Vec<u8>) -> Result<String> {
        let token = self.access_token().await?;
        let url = format!(
            "{}/b/{}/o?uploadType=media&name={}",
            UPLOAD_BASE_URL,
            self.bucket_name,
            urlencoding::encode(filename)
        );

        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .body(data)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Upload request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Error uploading {} to bucket {}: {} {}", filename, self.bucket_name, status, body);
            return Err(AppError::Storage(format!("Upload returned {}", status)));
        }

        Ok(self.public_url(filename))
    }
}

#[async_trait]
impl BlobStorage for GcsStorage {
    async fn upload(&self, filename: &str, data: Vec<u8>, timeout: Duration) -> Result<String> {
        with_deadline(timeout, self.put_object(filename, data)).await
    }
}
