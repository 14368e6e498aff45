//! In-memory doubles for the pipeline's external services.

use std::collections::HashMap;

use async_trait::async_trait;
use image::{Rgb, RgbImage};
use parking_lot::Mutex;

use crate::pipeline::codec::encode_jpeg;
use crate::pipeline::error::{AnalysisError, ModelError, StorageError};
use crate::pipeline::traits::{ArtifactStore, CritiqueRequest, LanguageModel, VisionAnalyzer};
use crate::pipeline::types::AnalysisResult;

pub fn jpeg_fixture(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    encode_jpeg(&image).unwrap()
}

pub struct FakeVision {
    outcome: Result<AnalysisResult, String>,
    calls: Mutex<Vec<Vec<f32>>>,
}

impl FakeVision {
    pub fn returning(result: AnalysisResult) -> Self {
        Self {
            outcome: Ok(result),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(detail: &str) -> Self {
        Self {
            outcome: Err(detail.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn requested_ratios(&self) -> Vec<Vec<f32>> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl VisionAnalyzer for FakeVision {
    async fn analyze(
        &self,
        _image_bytes: &[u8],
        crop_ratios: &[f32],
    ) -> Result<AnalysisResult, AnalysisError> {
        self.calls.lock().push(crop_ratios.to_vec());
        self.outcome.clone().map_err(AnalysisError)
    }
}

pub struct FakeModel {
    outcome: Result<String, String>,
    requests: Mutex<Vec<CritiqueRequest>>,
}

impl FakeModel {
    pub fn replying(text: &str) -> Self {
        Self {
            outcome: Ok(text.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(detail: &str) -> Self {
        Self {
            outcome: Err(detail.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CritiqueRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl LanguageModel for FakeModel {
    async fn generate_critique(&self, request: &CritiqueRequest) -> Result<String, ModelError> {
        self.requests.lock().push(request.clone());
        self.outcome.clone().map_err(ModelError)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    deleted: Mutex<Vec<String>>,
    reject_prefix: Option<String>,
}

impl MemoryStore {
    pub const BASE: &'static str = "https://cdn.test/files";

    /// Rejects every `put` whose key starts with `prefix`.
    pub fn rejecting(prefix: &str) -> Self {
        Self {
            reject_prefix: Some(prefix.to_string()),
            ..Self::default()
        }
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().get(key).cloned()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().clone()
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, StorageError> {
        if let Some(prefix) = &self.reject_prefix {
            if key.starts_with(prefix.as_str()) {
                return Err(StorageError(format!("upload of {key} rejected")));
            }
        }
        self.objects.lock().insert(key.to_string(), bytes);
        Ok(format!("{}/{}", Self::BASE, key))
    }

    async fn delete(&self, public_ref: &str) -> Result<(), StorageError> {
        let key = public_ref
            .strip_prefix(Self::BASE)
            .map(|rest| rest.trim_start_matches('/'))
            .ok_or_else(|| StorageError(format!("foreign reference {public_ref}")))?;
        self.objects.lock().remove(key);
        self.deleted.lock().push(key.to_string());
        Ok(())
    }
}
