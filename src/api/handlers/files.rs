use crate::AppState;
use crate::api::error::{AppError, ErrorBody};
use crate::models::{ArtifactKind, FileMeta, SuccessRecord};
use crate::services::error::{FieldError, ValidationError};
use crate::services::publisher::UploadRequest;
use crate::utils::spool::{SpooledUpload, spool};
use crate::utils::validation::{parse_file_meta, validate_artifact_filename, validate_path_segment};
use axum::{
    Json,
    extract::{Multipart, Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::io::StreamReader;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct PublishResponse {
    pub message: String,
    pub filename: String,
    pub path: String,
    /// `true` when the catalog created a new record, `false` when it updated one.
    pub created: bool,
}

impl From<SuccessRecord> for PublishResponse {
    fn from(record: SuccessRecord) -> Self {
        Self {
            message: "File and data processed".to_string(),
            filename: record.filename,
            path: record.path,
            created: record.created,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct PublishFromUrlRequest {
    /// HTTP(S) location of the artifact, e.g. `https://example.org/37c3-58019-eng.vtt`
    pub url: String,
    pub recording: FileMeta,
}

fn respond(record: SuccessRecord) -> (StatusCode, Json<PublishResponse>) {
    let status = if record.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    (status, Json(record.into()))
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> AppError {
    let err_msg = e.to_string();
    if err_msg.contains("length limit exceeded") {
        AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
    } else {
        AppError::BadRequest(err_msg)
    }
}

fn missing_part(name: &str, message: &str) -> AppError {
    ValidationError::Schema(vec![FieldError::new(name, message)]).into()
}

#[utoipa::path(
    put,
    path = "/api/{conference}/events/{guid}/file",
    params(
        ("conference" = String, Path, example = "37c3"),
        ("guid" = String, Path, example = "8f2618e2-d5d9-521c-96ec-f40e807dd5af")
    ),
    request_body(
        content = Multipart,
        description = "`file`: the artifact; `meta`: `{\"recording\": {\"language\": \"eng\", \"mime_type\": \"text/vtt\"}}`"
    ),
    responses(
        (status = 201, description = "Artifact published, catalog record created", body = PublishResponse),
        (status = 200, description = "Artifact published, catalog record updated", body = PublishResponse),
        (status = 400, description = "Unsupported file or missing API key", body = ErrorBody),
        (status = 403, description = "Invalid API key", body = ErrorBody),
        (status = 404, description = "Event not found", body = ErrorBody),
        (status = 413, description = "Artifact too large", body = ErrorBody),
        (status = 422, description = "Metadata rejected", body = ErrorBody),
        (status = 502, description = "Content store or catalog unavailable", body = ErrorBody)
    ),
    security(("api_key" = [])),
    tag = "files"
)]
pub async fn upload_file(
    State(state): State<AppState>,
    Path((conference, guid)): Path<(String, String)>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<PublishResponse>), AppError> {
    validate_path_segment("conference", &conference)?;
    validate_path_segment("guid", &guid)?;

    let max_size = state.config.max_file_size as u64;
    let mut upload: Option<(String, SpooledUpload)> = None;
    let mut meta: Option<FileMeta> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();

        if name == "file" {
            let filename = field.file_name().unwrap_or_default().to_string();
            // Reject before buffering anything
            validate_artifact_filename(&filename, ArtifactKind::Subtitles)?;

            let reader = StreamReader::new(field.map_err(std::io::Error::other));
            let spooled = spool(reader, max_size).await?;
            tracing::debug!("Spooled {} ({} bytes)", filename, spooled.size);
            upload = Some((filename, spooled));
        } else if name == "meta" {
            let text = field.text().await.map_err(multipart_error)?;
            meta = Some(parse_file_meta(&text)?);
        }
    }

    let (filename, spooled) = upload.ok_or_else(|| missing_part("file", "No file provided"))?;
    let meta = meta.ok_or_else(|| missing_part("meta", "No metadata provided"))?;

    let reader = spooled
        .reader()
        .await
        .map_err(|e| AppError::Internal(format!("Failed to reopen spooled upload: {}", e)))?;

    let record = state
        .publisher
        .publish_file(UploadRequest {
            filename,
            reader: Box::new(reader),
            conference,
            event_guid: guid,
            meta,
        })
        .await?;

    Ok(respond(record))
}

#[utoipa::path(
    put,
    path = "/api/{conference}/events/{guid}/file/url",
    params(
        ("conference" = String, Path, example = "37c3"),
        ("guid" = String, Path, example = "8f2618e2-d5d9-521c-96ec-f40e807dd5af")
    ),
    request_body = PublishFromUrlRequest,
    responses(
        (status = 201, description = "Artifact published, catalog record created", body = PublishResponse),
        (status = 200, description = "Artifact published, catalog record updated", body = PublishResponse),
        (status = 400, description = "Unsupported file, unreachable source or missing API key", body = ErrorBody),
        (status = 403, description = "Invalid API key", body = ErrorBody),
        (status = 404, description = "Event not found", body = ErrorBody),
        (status = 422, description = "Metadata rejected", body = ErrorBody),
        (status = 502, description = "Content store or catalog unavailable", body = ErrorBody)
    ),
    security(("api_key" = [])),
    tag = "files"
)]
pub async fn publish_from_url(
    State(state): State<AppState>,
    Path((conference, guid)): Path<(String, String)>,
    payload: Result<Json<PublishFromUrlRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PublishResponse>), AppError> {
    validate_path_segment("conference", &conference)?;
    validate_path_segment("guid", &guid)?;

    let Json(req) = payload.map_err(|rejection| {
        AppError::from(ValidationError::Schema(vec![FieldError::general(
            rejection.body_text(),
        )]))
    })?;

    let record = state
        .publisher
        .publish_from_url(&req.url, &conference, &guid, req.recording)
        .await?;

    Ok(respond(record))
}
