//! Prediction endpoints
//!
//! - `POST /api/predict`: video or audio, kind from `media_kind` or the
//!   file's content type
//! - `POST /api/audio/predict`: always audio

use axum::extract::{Multipart, State};
use axum::Json;
use veritas_core::config::UploadLimits;
use veritas_core::gateway::{resolve_kind, PredictionBody, RequestFields, UploadBuffer};
use veritas_core::{MediaKind, MediaOptions, MediaRequest};

use crate::error::ApiError;
use crate::state::AppState;

/// Multipart field carrying the media bytes
const FILE_FIELD: &str = "file";

struct UploadedFile {
    bytes: Vec<u8>,
    filename: Option<String>,
    content_type: Option<String>,
}

fn upload_limit(limits: &UploadLimits, kind: Option<MediaKind>) -> usize {
    match kind {
        Some(MediaKind::Video) => limits.max_video_upload_bytes,
        Some(MediaKind::Audio) => limits.max_audio_upload_bytes,
        None => limits.max_any(),
    }
}

/// Read the form, streaming the file into a bounded buffer
async fn read_request(
    limits: &UploadLimits,
    mut multipart: Multipart,
    forced_kind: Option<MediaKind>,
) -> Result<MediaRequest, ApiError> {
    let mut fields = RequestFields::default();
    let mut file: Option<UploadedFile> = None;

    while let Some(mut field) = multipart.next_field().await.map_err(ApiError::from_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == FILE_FIELD {
            let filename = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let hint = forced_kind
                .or_else(|| content_type.as_deref().and_then(MediaKind::from_content_type));

            let mut buffer = UploadBuffer::new(upload_limit(limits, hint));
            while let Some(chunk) = field.chunk().await.map_err(ApiError::from_multipart)? {
                buffer.push(&chunk)?;
            }
            file = Some(UploadedFile {
                bytes: buffer.into_bytes(),
                filename,
                content_type,
            });
        } else {
            let value = field.text().await.map_err(ApiError::from_multipart)?;
            if !fields.set(&name, value) {
                log::debug!("Ignoring unknown form field '{}'", name);
            }
        }
    }

    let file = file.ok_or_else(|| ApiError::bad_request("Missing 'file' field"))?;
    let kind = match forced_kind {
        Some(kind) => kind,
        None => resolve_kind(
            fields.media_kind.as_deref(),
            file.content_type.as_deref(),
            file.filename.as_deref(),
        )?,
    };
    let options = MediaOptions::from_fields(kind, &fields)?;

    let mut request = MediaRequest::new(file.bytes, options);
    request.filename = file.filename;
    request.content_type = file.content_type;
    Ok(request)
}

async fn run(
    state: AppState,
    multipart: Multipart,
    forced_kind: Option<MediaKind>,
) -> Result<Json<PredictionBody>, ApiError> {
    let request = read_request(state.gateway.limits(), multipart, forced_kind).await?;
    let prediction = state.gateway.predict(request).await?;
    Ok(Json(prediction.body()))
}

/// `POST /api/predict`
pub async fn predict(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<PredictionBody>, ApiError> {
    run(state, multipart, None).await
}

/// `POST /api/audio/predict`
pub async fn predict_audio(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<PredictionBody>, ApiError> {
    run(state, multipart, Some(MediaKind::Audio)).await
}
