use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::pipeline::error::AnalysisError;
use crate::pipeline::traits::VisionAnalyzer;
use crate::pipeline::types::{AnalysisResult, BoundingBox, Tag};
use crate::utils::http::{get_http_client, summarize_error_body};
use crate::utils::timing::log_service_timing;

const ANALYZE_FEATURES: &str = "caption,tags,smartCrops";

/// Azure AI Vision Image Analysis 4.0 over REST.
pub struct AzureVisionAnalyzer {
    endpoint: String,
    key: String,
    api_version: String,
}

impl AzureVisionAnalyzer {
    pub fn new(endpoint: &str, key: &str, api_version: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            key: key.to_string(),
            api_version: api_version.to_string(),
        }
    }

    fn analyze_url(&self, crop_ratios: &[f32]) -> String {
        format!(
            "{}/computervision/imageanalysis:analyze?api-version={}&features={}&smartcrops-aspect-ratios={}",
            self.endpoint,
            self.api_version,
            ANALYZE_FEATURES,
            format_ratios(crop_ratios)
        )
    }

    async fn call_analyze(
        &self,
        image_bytes: &[u8],
        crop_ratios: &[f32],
    ) -> Result<AnalysisResult, AnalysisError> {
        let response = get_http_client()
            .post(self.analyze_url(crop_ratios))
            .header("Ocp-Apim-Subscription-Key", &self.key)
            .header("Content-Type", "application/octet-stream")
            .timeout(Duration::from_secs(60))
            .body(image_bytes.to_vec())
            .send()
            .await
            .map_err(|err| AnalysisError(format!("request failed: {err}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let (message, body_summary) = summarize_error_body(&body);
            warn!(
                "Azure Vision API error: status={}, body={}",
                status, body_summary
            );
            let detail = message.unwrap_or(body_summary);
            return Err(AnalysisError(format!("status {status}: {detail}")));
        }

        let body = response
            .text()
            .await
            .map_err(|err| AnalysisError(format!("failed to read response: {err}")))?;
        let result = parse_analysis_response(&body)?;
        debug!(
            "Azure Vision returned caption={:?} tags={} smart_crops={}",
            result.caption,
            result.tags.len(),
            result.smart_crops.len()
        );
        Ok(result)
    }
}

#[async_trait]
impl VisionAnalyzer for AzureVisionAnalyzer {
    async fn analyze(
        &self,
        image_bytes: &[u8],
        crop_ratios: &[f32],
    ) -> Result<AnalysisResult, AnalysisError> {
        let metadata = json!({
            "bytes": image_bytes.len(),
            "ratios": format_ratios(crop_ratios),
        });
        log_service_timing(
            "azure_vision",
            &self.api_version,
            "image_analysis",
            Some(metadata),
            || self.call_analyze(image_bytes, crop_ratios),
        )
        .await
    }
}

/// The service accepts ratios with exactly two decimals, e.g. `1.77,1.00`.
pub fn format_ratios(crop_ratios: &[f32]) -> String {
    crop_ratios
        .iter()
        .map(|ratio| format!("{ratio:.2}"))
        .collect::<Vec<_>>()
        .join(",")
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeResponse {
    caption_result: Option<CaptionResult>,
    tags_result: Option<TagsResult>,
    smart_crops_result: Option<SmartCropsResult>,
}

#[derive(Debug, Deserialize)]
struct CaptionResult {
    text: String,
}

#[derive(Debug, Deserialize)]
struct TagsResult {
    #[serde(default)]
    values: Vec<TagValue>,
}

#[derive(Debug, Deserialize)]
struct TagValue {
    name: String,
    #[serde(default)]
    confidence: f32,
}

#[derive(Debug, Deserialize)]
struct SmartCropsResult {
    #[serde(default)]
    values: Vec<SmartCropValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SmartCropValue {
    bounding_box: WireBox,
}

#[derive(Debug, Deserialize)]
struct WireBox {
    x: i64,
    y: i64,
    w: i64,
    h: i64,
}

fn non_negative(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

impl From<WireBox> for BoundingBox {
    fn from(wire: WireBox) -> Self {
        BoundingBox::new(
            non_negative(wire.x),
            non_negative(wire.y),
            non_negative(wire.w),
            non_negative(wire.h),
        )
    }
}

pub fn parse_analysis_response(body: &str) -> Result<AnalysisResult, AnalysisError> {
    let response: AnalyzeResponse = serde_json::from_str(body)
        .map_err(|err| AnalysisError(format!("malformed response: {err}")))?;

    let caption = response
        .caption_result
        .map(|caption| caption.text.trim().to_string())
        .unwrap_or_default();
    let tags = response
        .tags_result
        .map(|tags| {
            tags.values
                .into_iter()
                .map(|tag| Tag::new(tag.name, tag.confidence))
                .collect()
        })
        .unwrap_or_default();
    let smart_crops = response
        .smart_crops_result
        .map(|crops| {
            crops
                .values
                .into_iter()
                .map(|crop| BoundingBox::from(crop.bounding_box))
                .collect()
        })
        .unwrap_or_default();

    Ok(AnalysisResult {
        caption,
        tags,
        smart_crops,
    })
}
