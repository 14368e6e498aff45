use std::time::Duration;

use reqwest::StatusCode;
use tracing::{error, warn};

use crate::utils::http::{get_http_client, truncate_for_log};

/// Sniffs the MIME type of an upload from its magic bytes.
pub fn detect_mime_type(data: &[u8]) -> Option<String> {
    if data.len() > 12 {
        let ftyp = &data[4..12];
        if ftyp.starts_with(b"ftyp") {
            let brand = &ftyp[4..8];
            if brand == b"heic" || brand == b"heif" || brand == b"hevc" {
                return Some("image/heic".to_string());
            }
        }
    }

    infer::get(data).map(|kind| kind.mime_type().to_string())
}

pub fn is_image(data: &[u8]) -> bool {
    detect_mime_type(data).is_some_and(|mime| mime.starts_with("image/"))
}

const MEDIA_DOWNLOAD_MAX_ATTEMPTS: usize = 3;
const MEDIA_DOWNLOAD_BASE_DELAY_MS: u64 = 400;
const MEDIA_DOWNLOAD_ERROR_BODY_LIMIT: usize = 800;

/// Why one download attempt did not produce bytes.
#[derive(Debug)]
enum AttemptFailure {
    Transient(String),
    Permanent(String),
}

fn should_retry_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

fn retry_delay(attempt: usize) -> Duration {
    Duration::from_millis(MEDIA_DOWNLOAD_BASE_DELAY_MS << attempt)
}

async fn attempt_download(url: &str) -> Result<Vec<u8>, AttemptFailure> {
    let response = get_http_client().get(url).send().await.map_err(|err| {
        let err = err.without_url();
        let detail = format!(
            "request error: {err} (timeout={}, connect={})",
            err.is_timeout(),
            err.is_connect()
        );
        if err.is_timeout() || err.is_connect() {
            AttemptFailure::Transient(detail)
        } else {
            AttemptFailure::Permanent(detail)
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let detail = format!(
            "status {status}: {}",
            truncate_for_log(&body, MEDIA_DOWNLOAD_ERROR_BODY_LIMIT)
        );
        return Err(if should_retry_status(status) {
            AttemptFailure::Transient(detail)
        } else {
            AttemptFailure::Permanent(detail)
        });
    }

    response
        .bytes()
        .await
        .map(|bytes| bytes.to_vec())
        .map_err(|err| {
            AttemptFailure::Transient(format!("failed to read body: {}", err.without_url()))
        })
}

/// Fetches a photo over HTTP, retrying transient failures with exponential
/// backoff. The URL is kept out of the logs since chat file URLs embed the
/// bot token.
pub async fn download_media(url: &str) -> Option<Vec<u8>> {
    for attempt in 0..MEDIA_DOWNLOAD_MAX_ATTEMPTS {
        match attempt_download(url).await {
            Ok(bytes) => return Some(bytes),
            Err(AttemptFailure::Permanent(detail)) => {
                error!("Media download failed: {detail}");
                return None;
            }
            Err(AttemptFailure::Transient(detail)) => {
                warn!(
                    "Media download attempt {}/{} failed: {detail}",
                    attempt + 1,
                    MEDIA_DOWNLOAD_MAX_ATTEMPTS
                );
                if attempt + 1 < MEDIA_DOWNLOAD_MAX_ATTEMPTS {
                    tokio::time::sleep(retry_delay(attempt)).await;
                }
            }
        }
    }
    None
}
