use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use tracing::warn;

use crate::pipeline::critique::CritiqueSettings;
use crate::pipeline::enhance::EnhancementParams;
use crate::pipeline::orchestrator::ImageReferenceMode;
use crate::pipeline::PipelineSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactStoreKind {
    Local,
    Blob,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub log_level: String,
    pub bind_addr: SocketAddr,
    pub public_base_url: String,
    pub static_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub artifact_retention_secs: u64,
    pub azure_vision_endpoint: String,
    pub azure_vision_key: String,
    pub azure_vision_api_version: String,
    pub azure_openai_endpoint: String,
    pub azure_openai_api_key: String,
    pub azure_openai_api_version: String,
    pub azure_openai_deployment: String,
    pub critique_max_tokens: u32,
    pub critique_top_p: f32,
    pub critique_pacing_ms: u64,
    pub critique_inline_image: bool,
    pub enhance_contrast: f32,
    pub enhance_brightness: f32,
    pub enhance_saturation: f32,
    pub artifact_store: ArtifactStoreKind,
    pub blob_container_url: String,
    pub blob_sas_token: String,
    pub webhook_url: String,
    pub webhook_path: String,
    pub webhook_secret: String,
}

pub static CONFIG: Lazy<Config> =
    Lazy::new(|| Config::load().expect("Failed to load configuration"));

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .map(|value| value.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_f32(name: &str, default: f32) -> f32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<f32>().ok())
        .unwrap_or(default)
}

fn env_u32(name: &str, default: u32) -> u32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(default)
}

fn normalize_artifact_store(value: &str) -> ArtifactStoreKind {
    match value.trim().to_lowercase().as_str() {
        "" | "local" | "file" | "filesystem" => ArtifactStoreKind::Local,
        "blob" | "azure" | "azure-blob" => ArtifactStoreKind::Blob,
        other => {
            warn!(
                "Unknown ARTIFACT_STORE value '{}'; defaulting to local.",
                other
            );
            ArtifactStoreKind::Local
        }
    }
}

fn normalize_webhook_path(value: String) -> String {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return "/callback".to_string();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let bind_raw = env_string("BIND_ADDR", "0.0.0.0:8000");
        let bind_addr = bind_raw
            .parse::<SocketAddr>()
            .map_err(|err| anyhow!("Invalid BIND_ADDR '{bind_raw}': {err}"))?;

        let artifact_store = normalize_artifact_store(&env_string("ARTIFACT_STORE", "local"));
        let blob_container_url = env_string("BLOB_CONTAINER_URL", "");
        if artifact_store == ArtifactStoreKind::Blob && blob_container_url.trim().is_empty() {
            return Err(anyhow!(
                "BLOB_CONTAINER_URL is required when ARTIFACT_STORE=blob"
            ));
        }

        Ok(Config {
            bot_token: env_string("BOT_TOKEN", ""),
            log_level: env_string("LOG_LEVEL", "info").to_lowercase(),
            bind_addr,
            public_base_url: env_string("PUBLIC_BASE_URL", "http://localhost:8000")
                .trim_end_matches('/')
                .to_string(),
            static_dir: PathBuf::from(env_string("STATIC_DIR", "static")),
            max_upload_bytes: env_usize("MAX_UPLOAD_BYTES", 20 * 1024 * 1024),
            artifact_retention_secs: env_u64("ARTIFACT_RETENTION_SECS", 600),
            azure_vision_endpoint: env_string("AZURE_VISION_ENDPOINT", ""),
            azure_vision_key: env_string("AZURE_VISION_KEY", ""),
            azure_vision_api_version: env_string("AZURE_VISION_API_VERSION", "2024-02-01"),
            azure_openai_endpoint: env_string("AZURE_OPENAI_ENDPOINT", ""),
            azure_openai_api_key: env_string("AZURE_OPENAI_API_KEY", ""),
            azure_openai_api_version: env_string("AZURE_OPENAI_API_VERSION", "2024-06-01"),
            azure_openai_deployment: env_string("AZURE_OPENAI_DEPLOYMENT", ""),
            critique_max_tokens: env_u32("CRITIQUE_MAX_TOKENS", 800),
            critique_top_p: env_f32("CRITIQUE_TOP_P", 0.95),
            critique_pacing_ms: env_u64("CRITIQUE_PACING_MS", 3000),
            critique_inline_image: env_bool("CRITIQUE_INLINE_IMAGE", false),
            enhance_contrast: env_f32("ENHANCE_CONTRAST", 1.20),
            enhance_brightness: env_f32("ENHANCE_BRIGHTNESS", 1.05),
            enhance_saturation: env_f32("ENHANCE_SATURATION", 1.20),
            artifact_store,
            blob_container_url,
            blob_sas_token: env_string("BLOB_SAS_TOKEN", "")
                .trim_start_matches('?')
                .to_string(),
            webhook_url: env_string("WEBHOOK_URL", ""),
            webhook_path: normalize_webhook_path(env_string("WEBHOOK_PATH", "/callback")),
            webhook_secret: env_string("WEBHOOK_SECRET", ""),
        })
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            enhancement: EnhancementParams {
                contrast: self.enhance_contrast,
                brightness: self.enhance_brightness,
                saturation: self.enhance_saturation,
            },
            critique: CritiqueSettings {
                max_tokens: self.critique_max_tokens,
                top_p: self.critique_top_p,
            },
            pacing: Duration::from_millis(self.critique_pacing_ms),
            image_reference: if self.critique_inline_image {
                ImageReferenceMode::Inline
            } else {
                ImageReferenceMode::Stored
            },
        }
    }

    pub fn webhook_enabled(&self) -> bool {
        !self.webhook_url.trim().is_empty()
    }
}

pub const CRITIQUE_SYSTEM_PROMPT: &str = r#"你是一位經驗豐富的手機攝影專家，請根據我提供的照片，給予具體的攝影教學。
{photo_tags}
請以簡潔、專業且易懂的語氣，從以下三個面向進行分析和建議：

1.  構圖與焦段 (Composition & Focal Length)：
    * 這張照片構圖表現如何？會建議運用什麼構圖法嗎? 例如：三分法、對角線構圖、框架構圖或黃金分割等等。
    * 以手機攝影的角度來看，這張照片的焦段選擇是否合適？如果想拍出更好的效果，建議使用廣角、標準或長焦鏡頭？

2.  拍攝角度 (Shooting Angle)：
    * 目前的拍攝角度（平視、仰視、俯視）有何優缺點？
    * 如果要突出主體或創造不同氛圍，建議從哪個角度重新拍攝？例如，是否應該蹲低、尋找高處、往前走幾步，或從側面拍攝？

3.  光線與曝光 (Lighting & Exposure)：
    * 這張照片的光線來源是順光、逆光還是側光？這種光線對畫面產生了什麼影響？
    * 照片的亮度與曝光是否適當？如果過亮或過暗，建議如何在手機上調整曝光補償（EV 值）？

請按照這個結構，提供具體、可執行的建議，讓一個手機攝影初學者也能輕鬆理解並應用。
請用繁體中文，並以條列式呈現，並在每個大標題前面放上相關的顏文字，語氣專業且友善，整段文字不超過一百五十個字。
"#;

pub const CRITIQUE_FALLBACK_PREFIX: &str = "系統異常，請再試一次。";

pub const REPLY_SEND_PHOTO_PROMPT: &str = "請傳送圖片進行分析";
pub const REPLY_CROP_HEADER: &str = "建議裁切範圍如下";
pub const REPLY_ADJUSTED_HEADER: &str = "調整後的圖片如下";
pub const REPLY_NO_CROP_NOTICE: &str = "沒有找到適合的智慧型裁切建議";
pub const REPLY_PIPELINE_FAILURE: &str = "圖片分析失敗，請稍後再試。";
pub const HTTP_PIPELINE_FAILURE: &str = "圖片處理失敗";
pub const HTTP_MISSING_IMAGE: &str = "請先選擇一張圖片！";
pub const HTTP_NOT_AN_IMAGE: &str = "上傳的檔案不是可辨識的圖片";
