use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::pipeline::{
    discard_artifacts, publish_artifacts, PipelineError, PipelineOrchestrator,
    PublishedArtifacts,
};

/// What a front-end needs to answer one photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoCritique {
    pub request_id: String,
    pub critique: String,
    pub artifacts: PublishedArtifacts,
}

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<PipelineOrchestrator>,
    pub max_upload_bytes: usize,
    /// How long published images stay reachable when the reader fetches
    /// them after the response (the upload page).
    pub artifact_retention: Duration,
}

impl AppState {
    pub fn new(
        orchestrator: PipelineOrchestrator,
        max_upload_bytes: usize,
        artifact_retention: Duration,
    ) -> Self {
        AppState {
            orchestrator: Arc::new(orchestrator),
            max_upload_bytes,
            artifact_retention,
        }
    }

    /// Runs the pipeline and publishes its images.
    pub async fn critique_photo(&self, image_bytes: &[u8]) -> Result<PhotoCritique, PipelineError> {
        let result = self.orchestrator.run(image_bytes).await?;
        let store = self.orchestrator.store();
        let artifacts = publish_artifacts(store.as_ref(), &result).await?;
        info!(
            "[{}] Critique ready (degraded={}, crop_suggested={})",
            result.request_id,
            result.critique.degraded,
            result.crop.is_suggested()
        );
        Ok(PhotoCritique {
            request_id: result.request_id,
            critique: result.critique.text,
            artifacts,
        })
    }

    /// Deletes published images right away, once they have been delivered.
    pub async fn release_artifacts(&self, artifacts: &PublishedArtifacts) {
        discard_artifacts(self.orchestrator.store().as_ref(), artifacts).await;
    }

    /// Deletes published images after the retention window, in the background.
    pub fn expire_artifacts(&self, artifacts: PublishedArtifacts) {
        let store = self.orchestrator.store();
        let retention = self.artifact_retention;
        tokio::spawn(async move {
            tokio::time::sleep(retention).await;
            discard_artifacts(store.as_ref(), &artifacts).await;
        });
    }
}

#[cfg(test)]
pub(crate) fn test_state(
    vision: crate::pipeline::testing::FakeVision,
    model: crate::pipeline::testing::FakeModel,
    store: Arc<crate::pipeline::testing::MemoryStore>,
) -> AppState {
    let settings = crate::pipeline::PipelineSettings {
        pacing: std::time::Duration::ZERO,
        ..crate::pipeline::PipelineSettings::default()
    };
    let orchestrator =
        PipelineOrchestrator::new(Arc::new(vision), Arc::new(model), store, settings);
    AppState::new(orchestrator, 1024 * 1024, Duration::from_secs(60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::{jpeg_fixture, FakeModel, FakeVision, MemoryStore};
    use crate::pipeline::types::{AnalysisResult, BoundingBox, Tag};

    fn analysis() -> AnalysisResult {
        AnalysisResult {
            caption: "a cat".to_string(),
            tags: vec![Tag::new("cat", 0.98)],
            smart_crops: vec![BoundingBox::new(4, 4, 32, 24)],
        }
    }

    #[tokio::test]
    async fn critique_photo_publishes_both_images() {
        let store = Arc::new(MemoryStore::default());
        let state = test_state(
            FakeVision::returning(analysis()),
            FakeModel::replying("構圖平衡"),
            store.clone(),
        );
        let outcome = state.critique_photo(&jpeg_fixture(64, 48)).await.unwrap();
        assert_eq!(outcome.critique, "構圖平衡");
        assert!(outcome.artifacts.annotated_url.is_some());
        assert_eq!(
            store.keys(),
            vec![
                format!("adjusted_image_{}.jpg", outcome.request_id),
                format!("image_with_box_{}.jpg", outcome.request_id),
            ]
        );
    }

    #[tokio::test]
    async fn analysis_failure_publishes_nothing() {
        let store = Arc::new(MemoryStore::default());
        let state = test_state(
            FakeVision::failing("quota exceeded"),
            FakeModel::replying("unused"),
            store.clone(),
        );
        let err = state.critique_photo(&jpeg_fixture(64, 48)).await.unwrap_err();
        assert_eq!(err.kind(), "analysis");
        assert!(store.keys().is_empty());
    }

    #[tokio::test]
    async fn released_images_are_deleted() {
        let store = Arc::new(MemoryStore::default());
        let state = test_state(
            FakeVision::returning(analysis()),
            FakeModel::replying("ok"),
            store.clone(),
        );
        let outcome = state.critique_photo(&jpeg_fixture(64, 48)).await.unwrap();
        state.release_artifacts(&outcome.artifacts).await;
        assert!(store.keys().is_empty());
        assert_eq!(store.deleted().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_images_survive_until_retention_ends() {
        let store = Arc::new(MemoryStore::default());
        let state = test_state(
            FakeVision::returning(analysis()),
            FakeModel::replying("ok"),
            store.clone(),
        );
        let outcome = state.critique_photo(&jpeg_fixture(64, 48)).await.unwrap();
        state.expire_artifacts(outcome.artifacts);

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(store.keys().len(), 2);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(store.keys().is_empty());
    }
}
