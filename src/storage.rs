//! Object storage for generated documents.
//!
//! Production blobs live in a private Supabase Storage bucket; clients only
//! ever receive short-lived signed URLs.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;

use crate::config::{optional, required, ConfigError};

#[async_trait]
pub trait ObjectStorage {
    /// Upload (or overwrite) the blob at `path`.
    async fn upload_file(&self, path: &str, data: &[u8], content_type: &str)
        -> Result<(), String>;

    /// Sign a read URL for `path` that expires after `expires_in_secs`.
    async fn signed_url(&self, path: &str, expires_in_secs: u64) -> Result<String, String>;

    /// Check that the bucket is reachable with the configured credentials.
    async fn probe(&self) -> Result<(), String>;
}

#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub supabase_url: String,
    pub service_key: String,
    pub bucket_name: String,
}

impl SupabaseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            supabase_url: required("SUPABASE_URL")?
                .trim_end_matches('/')
                .to_string(),
            service_key: required("SUPABASE_SERVICE_KEY")?,
            bucket_name: optional("BUCKET_NAME").unwrap_or_else(|| "lexagen-documents".to_string()),
        })
    }
}

pub struct SupabaseStorage {
    config: SupabaseConfig,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

impl SupabaseStorage {
    pub fn new(config: SupabaseConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn object_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.config.supabase_url, self.config.bucket_name, path
        )
    }

    fn sign_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/sign/{}/{}",
            self.config.supabase_url, self.config.bucket_name, path
        )
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("Authorization", format!("Bearer {}", self.config.service_key))
            .header("apikey", &self.config.service_key)
    }
}

async fn error_body(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    format!("storage responded {}: {}", status, body)
}

#[async_trait]
impl ObjectStorage for SupabaseStorage {
    async fn upload_file(
        &self,
        path: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<(), String> {
        log::debug!("Uploading {} ({} bytes)", path, data.len());
        let response = self
            .authorized(self.client.post(self.object_url(path)))
            .header("Content-Type", content_type)
            .header("x-upsert", "true")
            .body(data.to_vec())
            .send()
            .await
            .map_err(|e| format!("upload request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(error_body(response).await);
        }
        Ok(())
    }

    async fn signed_url(&self, path: &str, expires_in_secs: u64) -> Result<String, String> {
        let response = self
            .authorized(self.client.post(self.sign_url(path)))
            .json(&serde_json::json!({ "expiresIn": expires_in_secs }))
            .send()
            .await
            .map_err(|e| format!("sign request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(error_body(response).await);
        }

        let signed: SignedUrlResponse = response
            .json()
            .await
            .map_err(|e| format!("invalid sign response: {}", e))?;

        // The API answers with a path relative to /storage/v1.
        if signed.signed_url.starts_with("http") {
            Ok(signed.signed_url)
        } else {
            Ok(format!(
                "{}/storage/v1{}",
                self.config.supabase_url, signed.signed_url
            ))
        }
    }

    async fn probe(&self) -> Result<(), String> {
        let url = format!(
            "{}/storage/v1/bucket/{}",
            self.config.supabase_url, self.config.bucket_name
        );
        let response = self
            .authorized(self.client.get(url))
            .send()
            .await
            .map_err(|e| format!("probe request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(error_body(response).await);
        }
        Ok(())
    }
}

/// Process-local storage for tests and offline runs. Signed URLs are fake
/// `memory://` links that carry the expiry.
#[derive(Default)]
pub struct InMemoryStorage {
    files: Mutex<HashMap<String, (Vec<u8>, String)>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().get(path).map(|(data, _)| data.clone())
    }

    pub fn content_type(&self, path: &str) -> Option<String> {
        self.files.lock().get(path).map(|(_, ct)| ct.clone())
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.files.lock().keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl ObjectStorage for InMemoryStorage {
    async fn upload_file(
        &self,
        path: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<(), String> {
        self.files
            .lock()
            .insert(path.to_string(), (data.to_vec(), content_type.to_string()));
        Ok(())
    }

    async fn signed_url(&self, path: &str, expires_in_secs: u64) -> Result<String, String> {
        if !self.files.lock().contains_key(path) {
            return Err(format!("object not found: {}", path));
        }
        Ok(format!("memory://{}?expiresIn={}", path, expires_in_secs))
    }

    async fn probe(&self) -> Result<(), String> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> SupabaseConfig {
        SupabaseConfig {
            supabase_url: url.to_string(),
            service_key: "service-key".to_string(),
            bucket_name: "docs".to_string(),
        }
    }

    #[test]
    fn test_object_urls() {
        let storage = SupabaseStorage::new(config("https://x.supabase.co"), reqwest::Client::new());
        assert_eq!(
            storage.object_url("documents/t/documento.pdf"),
            "https://x.supabase.co/storage/v1/object/docs/documents/t/documento.pdf"
        );
        assert_eq!(
            storage.sign_url("documents/t/preview.pdf"),
            "https://x.supabase.co/storage/v1/object/sign/docs/documents/t/preview.pdf"
        );
    }

    #[tokio::test]
    async fn test_upload_and_sign_against_mock_server() {
        let mut server = mockito::Server::new_async().await;
        let upload = server
            .mock("POST", "/storage/v1/object/docs/documents/t/documento.pdf")
            .match_header("authorization", "Bearer service-key")
            .match_header("x-upsert", "true")
            .with_status(200)
            .with_body(r#"{"Key":"docs/documents/t/documento.pdf"}"#)
            .create_async()
            .await;
        let sign = server
            .mock("POST", "/storage/v1/object/sign/docs/documents/t/documento.pdf")
            .match_body(mockito::Matcher::Json(serde_json::json!({"expiresIn": 300})))
            .with_status(200)
            .with_body(r#"{"signedURL":"/object/sign/docs/documents/t/documento.pdf?token=abc"}"#)
            .create_async()
            .await;

        let storage = SupabaseStorage::new(config(&server.url()), reqwest::Client::new());
        storage
            .upload_file("documents/t/documento.pdf", b"%PDF", "application/pdf")
            .await
            .unwrap();
        let url = storage
            .signed_url("documents/t/documento.pdf", 300)
            .await
            .unwrap();

        assert_eq!(
            url,
            format!(
                "{}/storage/v1/object/sign/docs/documents/t/documento.pdf?token=abc",
                server.url()
            )
        );
        upload.assert_async().await;
        sign.assert_async().await;
    }

    #[tokio::test]
    async fn test_upload_failure_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/storage/v1/object/docs/a")
            .with_status(403)
            .with_body("forbidden")
            .create_async()
            .await;

        let storage = SupabaseStorage::new(config(&server.url()), reqwest::Client::new());
        let err = storage
            .upload_file("a", b"x", "text/plain")
            .await
            .unwrap_err();
        assert!(err.contains("403"));
    }

    #[tokio::test]
    async fn test_in_memory_sign_requires_object() {
        let storage = InMemoryStorage::new();
        assert!(storage.signed_url("missing", 300).await.is_err());
        storage.upload_file("here", b"data", "text/plain").await.unwrap();
        assert_eq!(
            storage.signed_url("here", 300).await.unwrap(),
            "memory://here?expiresIn=300"
        );
        assert_eq!(storage.content_type("here").as_deref(), Some("text/plain"));
    }
}
