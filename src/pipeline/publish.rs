use tracing::info;

use crate::pipeline::codec::encode_jpeg;
use crate::pipeline::error::StorageError;
use crate::pipeline::orchestrator::PipelineResult;
use crate::pipeline::traits::{delete_best_effort, ArtifactStore};

pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Original,
    Adjusted,
    Annotated,
}

impl ArtifactKind {
    fn prefix(self) -> &'static str {
        match self {
            ArtifactKind::Original => "original_image",
            ArtifactKind::Adjusted => "adjusted_image",
            ArtifactKind::Annotated => "image_with_box",
        }
    }
}

/// Storage key for one artifact of one request. The request id keeps
/// concurrent requests from overwriting each other.
pub fn artifact_key(kind: ArtifactKind, request_id: &str) -> String {
    format!("{}_{}.jpg", kind.prefix(), request_id)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedArtifacts {
    pub adjusted_url: String,
    /// `None` when the request had no crop suggestion to draw.
    pub annotated_url: Option<String>,
}

/// Uploads the adjusted and annotated images. If any upload fails, whatever
/// was already stored for the request is removed again.
pub async fn publish_artifacts(
    store: &dyn ArtifactStore,
    result: &PipelineResult,
) -> Result<PublishedArtifacts, StorageError> {
    let adjusted_bytes = encode_jpeg(&result.adjusted)
        .map_err(|err| StorageError(format!("failed to encode adjusted image: {err}")))?;
    let adjusted_url = store
        .put(
            &artifact_key(ArtifactKind::Adjusted, &result.request_id),
            adjusted_bytes,
            JPEG_CONTENT_TYPE,
        )
        .await?;

    let annotated_url = match &result.annotated {
        Some(annotated) => {
            let uploaded = match encode_jpeg(annotated) {
                Ok(bytes) => {
                    store
                        .put(
                            &artifact_key(ArtifactKind::Annotated, &result.request_id),
                            bytes,
                            JPEG_CONTENT_TYPE,
                        )
                        .await
                }
                Err(err) => Err(StorageError(format!(
                    "failed to encode annotated image: {err}"
                ))),
            };
            match uploaded {
                Ok(url) => Some(url),
                Err(err) => {
                    delete_best_effort(store, &adjusted_url).await;
                    return Err(err);
                }
            }
        }
        None => None,
    };

    info!(
        "[{}] Published adjusted={} annotated={:?}",
        result.request_id, adjusted_url, annotated_url
    );
    Ok(PublishedArtifacts {
        adjusted_url,
        annotated_url,
    })
}

/// Removes a request's published images once nobody needs to fetch them.
pub async fn discard_artifacts(store: &dyn ArtifactStore, artifacts: &PublishedArtifacts) {
    delete_best_effort(store, &artifacts.adjusted_url).await;
    if let Some(annotated_url) = &artifacts.annotated_url {
        delete_best_effort(store, annotated_url).await;
    }
}
