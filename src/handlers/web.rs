use std::path::PathBuf;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{error, info, warn};

use crate::config::{HTTP_MISSING_IMAGE, HTTP_NOT_AN_IMAGE, HTTP_PIPELINE_FAILURE};
use crate::pipeline::PipelineError;
use crate::state::AppState;
use crate::storage::FILES_ROUTE;
use crate::utils::media::is_image;
use crate::utils::timing::{complete_command_timer, start_request_timer};

const INDEX_HTML: &str = include_str!("../../assets/index.html");
const IMAGE_FIELD: &str = "image";
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeResponse {
    text: String,
    boxed_image_url: Option<String>,
    adjusted_image_url: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// Upload page, JSON analysis endpoint and health check. When `files_dir` is
/// given, the local artifact directory is served under `/files` uncached.
pub fn build_router(state: AppState, files_dir: Option<PathBuf>) -> Router {
    let body_limit = state.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;
    let router = Router::new()
        .route("/", get(index))
        .route("/analyze_image", post(analyze_image))
        .route("/health", get(|| async { "ok" }))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state);

    match files_dir {
        Some(dir) => {
            let files = ServiceBuilder::new()
                .layer(SetResponseHeaderLayer::overriding(
                    header::CACHE_CONTROL,
                    HeaderValue::from_static("no-cache, no-store, must-revalidate"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::PRAGMA,
                    HeaderValue::from_static("no-cache"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::EXPIRES,
                    HeaderValue::from_static("0"),
                ))
                .service(ServeDir::new(dir));
            router.nest_service(FILES_ROUTE, files)
        }
        None => router,
    }
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn analyze_image(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut timer = start_request_timer("analyze_image");

    let mut image_bytes: Option<Vec<u8>> = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some(IMAGE_FIELD) {
                    continue;
                }
                match field.bytes().await {
                    Ok(bytes) if !bytes.is_empty() => image_bytes = Some(bytes.to_vec()),
                    Ok(_) => {}
                    Err(err) => {
                        warn!("Failed to read upload bytes: {err}");
                        complete_command_timer(&mut timer, "rejected", Some(err.body_text()));
                        return error_response(err.status(), HTTP_MISSING_IMAGE);
                    }
                }
            }
            Ok(None) => break,
            Err(err) => {
                warn!("Malformed multipart upload: {err}");
                complete_command_timer(&mut timer, "rejected", Some(err.body_text()));
                return error_response(err.status(), HTTP_MISSING_IMAGE);
            }
        }
    }

    let Some(image_bytes) = image_bytes else {
        complete_command_timer(&mut timer, "rejected", Some("missing image".to_string()));
        return error_response(StatusCode::BAD_REQUEST, HTTP_MISSING_IMAGE);
    };
    if !is_image(&image_bytes) {
        complete_command_timer(&mut timer, "rejected", Some("not an image".to_string()));
        return error_response(StatusCode::BAD_REQUEST, HTTP_NOT_AN_IMAGE);
    }

    match state.critique_photo(&image_bytes).await {
        Ok(outcome) => {
            info!("[{}] Web analysis completed", outcome.request_id);
            complete_command_timer(&mut timer, "success", Some(outcome.request_id.clone()));
            state.expire_artifacts(outcome.artifacts.clone());
            Json(AnalyzeResponse {
                text: outcome.critique,
                boxed_image_url: outcome.artifacts.annotated_url,
                adjusted_image_url: outcome.artifacts.adjusted_url,
            })
            .into_response()
        }
        Err(PipelineError::Validation(err)) => {
            warn!("Rejected web upload: {err}");
            complete_command_timer(&mut timer, "rejected", Some(err.to_string()));
            error_response(StatusCode::BAD_REQUEST, HTTP_NOT_AN_IMAGE)
        }
        Err(err) => {
            error!("Error processing image from web ({}): {err}", err.kind());
            complete_command_timer(&mut timer, "error", Some(err.kind().to_string()));
            error_response(StatusCode::INTERNAL_SERVER_ERROR, HTTP_PIPELINE_FAILURE)
        }
    }
}
