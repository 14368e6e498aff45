use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::pipeline::error::StorageError;
use crate::pipeline::traits::ArtifactStore;
use crate::utils::http::{get_http_client, summarize_error_body};

/// Azure Blob Storage container addressed by URL plus a SAS token. The
/// container is expected to allow anonymous blob reads so the returned URLs
/// resolve for the chat platform and the model.
pub struct BlobArtifactStore {
    container_url: String,
    sas_token: String,
}

impl BlobArtifactStore {
    pub fn new(container_url: &str, sas_token: &str) -> Self {
        Self {
            container_url: container_url.trim_end_matches('/').to_string(),
            sas_token: sas_token.trim_start_matches('?').to_string(),
        }
    }

    fn blob_url(&self, key: &str) -> String {
        format!("{}/{}", self.container_url, key)
    }

    fn signed(&self, blob_url: &str) -> String {
        if self.sas_token.is_empty() {
            blob_url.to_string()
        } else {
            format!("{}?{}", blob_url, self.sas_token)
        }
    }

    fn owns(&self, public_ref: &str) -> bool {
        public_ref
            .strip_prefix(&self.container_url)
            .is_some_and(|rest| rest.starts_with('/') && rest.len() > 1)
    }
}

async fn status_error(action: &str, target: &str, response: reqwest::Response) -> StorageError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let (message, body_summary) = summarize_error_body(&body);
    warn!(
        "Blob {} failed for {}: status={}, body={}",
        action, target, status, body_summary
    );
    StorageError(format!(
        "{action} of {target} failed with status {status}: {}",
        message.unwrap_or(body_summary)
    ))
}

#[async_trait]
impl ArtifactStore for BlobArtifactStore {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let blob_url = self.blob_url(key);
        let response = get_http_client()
            .put(self.signed(&blob_url))
            .header("x-ms-blob-type", "BlockBlob")
            .header("x-ms-blob-content-type", content_type)
            .header("Content-Type", content_type)
            .timeout(Duration::from_secs(60))
            .body(bytes)
            .send()
            .await
            .map_err(|err| StorageError(format!("upload of {key} failed: {err}")))?;

        if !response.status().is_success() {
            return Err(status_error("upload", key, response).await);
        }
        debug!("Uploaded blob {}", blob_url);
        Ok(blob_url)
    }

    async fn delete(&self, public_ref: &str) -> Result<(), StorageError> {
        if !self.owns(public_ref) {
            return Err(StorageError(format!("not a blob in this container: {public_ref}")));
        }
        let response = get_http_client()
            .delete(self.signed(public_ref))
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|err| StorageError(format!("delete of {public_ref} failed: {err}")))?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Err(status_error("delete", public_ref, response).await)
    }
}
