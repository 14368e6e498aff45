//! Seams to the external services the pipeline talks to.
//!
//! The orchestrator only ever holds these as `Arc<dyn ...>` handles, so tests
//! swap in in-memory doubles and deployments pick their adapters at startup.

use async_trait::async_trait;
use tracing::warn;

use crate::pipeline::error::{AnalysisError, ModelError, StorageError};
use crate::pipeline::types::AnalysisResult;

/// Caption, tags and smart-crop suggestions for one image.
#[async_trait]
pub trait VisionAnalyzer: Send + Sync {
    /// `crop_ratios` is ordered by preference; the returned smart crops keep
    /// the service's ranking.
    async fn analyze(
        &self,
        image_bytes: &[u8],
        crop_ratios: &[f32],
    ) -> Result<AnalysisResult, AnalysisError>;
}

/// One multimodal chat request: a system instruction plus an image.
#[derive(Debug, Clone, PartialEq)]
pub struct CritiqueRequest {
    pub system_prompt: String,
    /// Public URL or `data:` URL of the photo.
    pub image_ref: String,
    pub max_tokens: u32,
    pub top_p: f32,
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate_critique(&self, request: &CritiqueRequest) -> Result<String, ModelError>;
}

/// Where per-request artifacts live while the caller delivers them.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Stores `bytes` under `key` and returns a publicly resolvable reference.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str)
        -> Result<String, StorageError>;

    /// Removes a stored artifact. A missing artifact is not an error.
    async fn delete(&self, public_ref: &str) -> Result<(), StorageError>;
}

/// Cleanup never interrupts the caller: failures are logged and dropped.
pub async fn delete_best_effort(store: &dyn ArtifactStore, public_ref: &str) {
    if let Err(err) = store.delete(public_ref).await {
        warn!("Failed to delete artifact {}: {}", public_ref, err);
    }
}
