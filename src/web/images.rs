//! Image responses: upload previews, the generated card, and its download.

use axum::body::Body;
use axum::http::header::{CACHE_CONTROL, CONTENT_DISPOSITION};
use axum::http::response::Builder;
use chrono::Utc;

use super::prelude::*;
use crate::generation::{GeneratedImage, download_file_name};

const NO_STORE: &str = "no-store";

fn image_response(mime_type: &str) -> Builder {
    let content_type = HeaderValue::from_str(mime_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    Response::builder()
        .header(CONTENT_TYPE, content_type)
        .header(CACHE_CONTROL, NO_STORE)
}

pub(crate) async fn preview_handler(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Response, StudioError> {
    let preview = state
        .previews
        .get(&token)
        .ok_or_else(|| StudioError::NotFound(format!("preview {token}")))?;
    image_response(preview.mime_type)
        .body(Body::from(preview.bytes.as_ref().clone()))
        .map_err(StudioError::from)
}

async fn current_result(state: &AppState, session: &Session) -> Result<GeneratedImage, StudioError> {
    let wizard = state.wizard(session).await?;
    let locked = wizard.lock().await;
    locked
        .result()
        .cloned()
        .ok_or_else(|| StudioError::NotFound("result".to_string()))
}

fn decoded(result: &GeneratedImage) -> Result<Vec<u8>, StudioError> {
    result
        .bytes()
        .map_err(|err| StudioError::InternalServerError(format!("Undecodable result: {err}")))
}

pub(crate) async fn result_handler(
    State(state): State<AppState>,
    session: Session,
) -> Result<Response, StudioError> {
    let result = current_result(&state, &session).await?;
    let bytes = decoded(&result)?;
    image_response(&result.mime_type)
        .body(Body::from(bytes))
        .map_err(StudioError::from)
}

pub(crate) async fn download_handler(
    State(state): State<AppState>,
    session: Session,
) -> Result<Response, StudioError> {
    let result = current_result(&state, &session).await?;
    let bytes = decoded(&result)?;
    let file_name = download_file_name(Utc::now());
    info!("Serving download {}", file_name);
    image_response(&result.mime_type)
        .header(
            CONTENT_DISPOSITION,
            format!("attachment; filename=\"{file_name}\""),
        )
        .body(Body::from(bytes))
        .map_err(StudioError::from)
}
