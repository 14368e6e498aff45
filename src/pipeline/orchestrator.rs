use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use image::RgbImage;
use tracing::{debug, info};
use uuid::Uuid;

use crate::pipeline::annotate::render_annotation;
use crate::pipeline::aspect::candidate_crop_ratios;
use crate::pipeline::codec::{decode_image, encode_jpeg};
use crate::pipeline::critique::{Critique, CritiqueComposer, CritiqueSettings};
use crate::pipeline::crop::{crop_region, select_crop, CropSelection};
use crate::pipeline::enhance::{enhance, EnhancementParams};
use crate::pipeline::error::{AnalysisError, PipelineError};
use crate::pipeline::publish::{artifact_key, ArtifactKind, JPEG_CONTENT_TYPE};
use crate::pipeline::traits::{delete_best_effort, ArtifactStore, LanguageModel, VisionAnalyzer};

/// How the language model gets to see the photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageReferenceMode {
    /// Upload the original to the artifact store and pass its public URL.
    Stored,
    /// Embed the original as a `data:` URL; nothing is uploaded.
    Inline,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub enhancement: EnhancementParams,
    pub critique: CritiqueSettings,
    /// Pause after the critique comes back. Kept from the first deployment;
    /// whether anything downstream still depends on it is unknown.
    pub pacing: Duration,
    pub image_reference: ImageReferenceMode,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            enhancement: EnhancementParams::default(),
            critique: CritiqueSettings::default(),
            pacing: Duration::from_secs(3),
            image_reference: ImageReferenceMode::Stored,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub request_id: String,
    pub critique: Critique,
    pub crop: CropSelection,
    pub adjusted: RgbImage,
    /// `None` when no crop was recommended.
    pub annotated: Option<RgbImage>,
}

pub struct PipelineOrchestrator {
    vision: Arc<dyn VisionAnalyzer>,
    store: Arc<dyn ArtifactStore>,
    composer: CritiqueComposer,
    settings: PipelineSettings,
}

impl PipelineOrchestrator {
    pub fn new(
        vision: Arc<dyn VisionAnalyzer>,
        model: Arc<dyn LanguageModel>,
        store: Arc<dyn ArtifactStore>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            vision,
            store,
            composer: CritiqueComposer::new(model, settings.critique),
            settings,
        }
    }

    pub fn store(&self) -> Arc<dyn ArtifactStore> {
        Arc::clone(&self.store)
    }

    /// Runs one request end to end. Analysis and upload failures abort with
    /// no artifacts left behind; a failed critique only degrades the text.
    pub async fn run(&self, image_bytes: &[u8]) -> Result<PipelineResult, PipelineError> {
        let request_id = Uuid::new_v4().simple().to_string();

        let original = decode_image(image_bytes)?;
        let (width, height) = original.dimensions();
        let crop_ratios = candidate_crop_ratios(width, height)?;
        info!(
            "[{}] Analyzing {}x{} image with crop ratios {:?}",
            request_id, width, height, crop_ratios
        );

        let jpeg = encode_jpeg(&original).map_err(|err| {
            AnalysisError(format!("failed to encode image for analysis: {err}"))
        })?;
        let analysis = self.vision.analyze(&jpeg, &crop_ratios).await?;
        debug!(
            "[{}] caption={:?} tags={} smart_crops={}",
            request_id,
            analysis.caption,
            analysis.tags.len(),
            analysis.smart_crops.len()
        );

        let crop = select_crop(&analysis.smart_crops, width, height);
        let adjusted = match crop {
            CropSelection::Suggested(region) => {
                enhance(&crop_region(&original, region), &self.settings.enhancement)
            }
            CropSelection::FullFrame(_) => enhance(&original, &self.settings.enhancement),
        };
        let annotated = render_annotation(&original, &crop);
        info!(
            "[{}] Crop {:?} (suggested={}), adjusted image {}x{}, annotated={}",
            request_id,
            crop.region(),
            crop.is_suggested(),
            adjusted.width(),
            adjusted.height(),
            annotated.is_some()
        );

        let critique = match self.settings.image_reference {
            ImageReferenceMode::Stored => {
                let key = artifact_key(ArtifactKind::Original, &request_id);
                let original_ref = self.store.put(&key, jpeg, JPEG_CONTENT_TYPE).await?;
                let critique = self.composer.compose(&analysis, &original_ref).await;
                // The model has fetched the photo by now; nothing else reads it.
                delete_best_effort(self.store.as_ref(), &original_ref).await;
                critique
            }
            ImageReferenceMode::Inline => {
                let data_url = format!(
                    "data:{};base64,{}",
                    JPEG_CONTENT_TYPE,
                    general_purpose::STANDARD.encode(&jpeg)
                );
                self.composer.compose(&analysis, &data_url).await
            }
        };

        if !self.settings.pacing.is_zero() {
            tokio::time::sleep(self.settings.pacing).await;
        }

        Ok(PipelineResult {
            request_id,
            critique,
            crop,
            adjusted,
            annotated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::annotate::STROKE_COLOR;
    use crate::pipeline::aspect::{LANDSCAPE_CROP_RATIOS, PORTRAIT_CROP_RATIOS};
    use crate::pipeline::testing::{jpeg_fixture, FakeModel, FakeVision, MemoryStore};
    use crate::pipeline::types::{AnalysisResult, BoundingBox, Tag};

    fn settings() -> PipelineSettings {
        PipelineSettings {
            pacing: Duration::ZERO,
            ..PipelineSettings::default()
        }
    }

    fn analysis_with_crop() -> AnalysisResult {
        AnalysisResult {
            caption: "a city skyline".to_string(),
            tags: vec![Tag::new("building", 0.99), Tag::new("sky", 0.97)],
            smart_crops: vec![BoundingBox::new(100, 50, 800, 450)],
        }
    }

    fn orchestrator(
        vision: Arc<FakeVision>,
        model: Arc<FakeModel>,
        store: Arc<MemoryStore>,
        settings: PipelineSettings,
    ) -> PipelineOrchestrator {
        PipelineOrchestrator::new(vision, model, store, settings)
    }

    #[tokio::test]
    async fn landscape_photo_is_cropped_enhanced_and_annotated() {
        let vision = Arc::new(FakeVision::returning(analysis_with_crop()));
        let model = Arc::new(FakeModel::replying("📐 構圖穩定"));
        let store = Arc::new(MemoryStore::default());
        let pipeline = orchestrator(vision.clone(), model.clone(), store.clone(), settings());

        let result = pipeline.run(&jpeg_fixture(1920, 1080)).await.unwrap();

        assert_eq!(vision.requested_ratios(), vec![LANDSCAPE_CROP_RATIOS.to_vec()]);
        assert_eq!(result.adjusted.dimensions(), (800, 450));
        let annotated = result.annotated.expect("annotated image");
        assert_eq!(annotated.dimensions(), (1920, 1080));
        assert_eq!(annotated.get_pixel(100, 50), &STROKE_COLOR);
        assert_eq!(annotated.get_pixel(900, 500), &STROKE_COLOR);
        assert_eq!(result.crop, CropSelection::Suggested(BoundingBox::new(100, 50, 800, 450)));
        assert_eq!(result.critique.text, "📐 構圖穩定");
        assert!(!result.critique.degraded);
    }

    #[tokio::test]
    async fn model_sees_stored_original_which_is_then_removed() {
        let vision = Arc::new(FakeVision::returning(analysis_with_crop()));
        let model = Arc::new(FakeModel::replying("ok"));
        let store = Arc::new(MemoryStore::default());
        let pipeline = orchestrator(vision, model.clone(), store.clone(), settings());

        let result = pipeline.run(&jpeg_fixture(640, 480)).await.unwrap();

        let requests = model.requests();
        assert_eq!(requests.len(), 1);
        let expected_key = format!("original_image_{}.jpg", result.request_id);
        assert_eq!(
            requests[0].image_ref,
            format!("{}/{}", MemoryStore::BASE, expected_key)
        );
        assert!(requests[0].system_prompt.contains("building、sky"));
        assert_eq!(store.deleted(), vec![expected_key]);
        assert!(store.keys().is_empty());
    }

    #[tokio::test]
    async fn inline_mode_skips_the_store() {
        let vision = Arc::new(FakeVision::returning(analysis_with_crop()));
        let model = Arc::new(FakeModel::replying("ok"));
        let store = Arc::new(MemoryStore::rejecting(""));
        let pipeline = orchestrator(
            vision,
            model.clone(),
            store,
            PipelineSettings {
                image_reference: ImageReferenceMode::Inline,
                ..settings()
            },
        );

        pipeline.run(&jpeg_fixture(1920, 1080)).await.unwrap();

        assert!(model.requests()[0].image_ref.starts_with("data:image/jpeg;base64,"));
    }

    #[tokio::test]
    async fn missing_crop_enhances_full_frame_without_annotation() {
        let vision = Arc::new(FakeVision::returning(AnalysisResult::default()));
        let model = Arc::new(FakeModel::replying("ok"));
        let store = Arc::new(MemoryStore::default());
        let pipeline = orchestrator(vision.clone(), model, store, settings());

        let result = pipeline.run(&jpeg_fixture(300, 400)).await.unwrap();

        assert_eq!(vision.requested_ratios(), vec![PORTRAIT_CROP_RATIOS.to_vec()]);
        assert_eq!(result.adjusted.dimensions(), (300, 400));
        assert!(result.annotated.is_none());
        assert_eq!(result.crop, CropSelection::FullFrame(BoundingBox::full(300, 400)));
    }

    #[tokio::test]
    async fn analysis_failure_aborts_without_artifacts() {
        let vision = Arc::new(FakeVision::failing("401 unauthorized"));
        let model = Arc::new(FakeModel::replying("unused"));
        let store = Arc::new(MemoryStore::default());
        let pipeline = orchestrator(vision, model.clone(), store.clone(), settings());

        let err = pipeline.run(&jpeg_fixture(64, 64)).await.unwrap_err();

        assert!(matches!(err, PipelineError::Analysis(_)));
        assert!(model.requests().is_empty());
        assert!(store.keys().is_empty());
        assert!(store.deleted().is_empty());
    }

    #[tokio::test]
    async fn model_failure_still_returns_images() {
        let vision = Arc::new(FakeVision::returning(analysis_with_crop()));
        let model = Arc::new(FakeModel::failing("transport error: connection refused"));
        let store = Arc::new(MemoryStore::default());
        let pipeline = orchestrator(vision, model, store, settings());

        let result = pipeline.run(&jpeg_fixture(1920, 1080)).await.unwrap();

        assert!(result.critique.degraded);
        assert!(result.critique.text.starts_with("系統異常，請再試一次。"));
        assert!(result.critique.text.contains("connection refused"));
        assert_eq!(result.adjusted.dimensions(), (800, 450));
        assert!(result.annotated.is_some());
    }

    #[tokio::test]
    async fn upload_failure_aborts_before_critique() {
        let vision = Arc::new(FakeVision::returning(analysis_with_crop()));
        let model = Arc::new(FakeModel::replying("unused"));
        let store = Arc::new(MemoryStore::rejecting("original_image_"));
        let pipeline = orchestrator(vision, model.clone(), store, settings());

        let err = pipeline.run(&jpeg_fixture(1920, 1080)).await.unwrap_err();

        assert!(matches!(err, PipelineError::Storage(_)));
        assert!(model.requests().is_empty());
    }

    #[tokio::test]
    async fn unreadable_bytes_are_rejected_before_analysis() {
        let vision = Arc::new(FakeVision::returning(analysis_with_crop()));
        let model = Arc::new(FakeModel::replying("unused"));
        let store = Arc::new(MemoryStore::default());
        let pipeline = orchestrator(vision.clone(), model, store, settings());

        let err = pipeline.run(b"not a photo").await.unwrap_err();

        assert!(matches!(err, PipelineError::Validation(_)));
        assert!(vision.requested_ratios().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn pacing_delay_runs_after_critique() {
        let vision = Arc::new(FakeVision::returning(AnalysisResult::default()));
        let model = Arc::new(FakeModel::replying("ok"));
        let store = Arc::new(MemoryStore::default());
        let pipeline = orchestrator(
            vision,
            model,
            store,
            PipelineSettings {
                pacing: Duration::from_secs(3),
                ..PipelineSettings::default()
            },
        );

        let started = tokio::time::Instant::now();
        pipeline.run(&jpeg_fixture(32, 32)).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(3));
    }
}
