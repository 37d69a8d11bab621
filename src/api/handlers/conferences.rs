use crate::AppState;
use crate::api::error::{AppError, ErrorBody};
use crate::models::{Conference, DetailedEvent, EventSummary};
use crate::services::content_store::{ListingEntry, join_path};
use crate::services::keys::{FileRecord, KeyMode, build_lookup_map, derive_key};
use crate::utils::validation::{validate_path_segment, validate_relative_dir};
use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ResolveQuery {
    /// Slug or filename to correlate, e.g. `37c3-58019-deu-Talk_hd.mp4`
    pub name: String,
}

#[derive(Serialize, ToSchema)]
pub struct ResolveResponse {
    pub name: String,
    pub key: String,
    pub conference_acronym: Option<String>,
    pub event_local_id: Option<String>,
    pub language: Option<String>,
    pub event: EventSummary,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FilesQuery {
    /// Directory below the media root, e.g. `congress/2023`
    pub dir: String,
}

#[derive(Serialize, ToSchema)]
pub struct PublishedFile {
    pub name: String,
    pub path: String,
    pub size: u64,
    pub modified: Option<u32>,
    pub language: Option<String>,
    pub key: Option<String>,
    /// Catalog entry the file belongs to, if any.
    pub event: Option<EventSummary>,
}

async fn load_conference(state: &AppState, conference: &str) -> Result<Conference, AppError> {
    validate_path_segment("conference", conference)?;
    state
        .catalog
        .conference(conference)
        .await?
        .ok_or_else(|| AppError::NotFound("Conference not found".to_string()))
}

#[utoipa::path(
    get,
    path = "/api/{conference}",
    params(("conference" = String, Path, description = "Conference acronym", example = "37c3")),
    responses(
        (status = 200, description = "Conference with its events", body = Conference),
        (status = 404, description = "Conference not found", body = ErrorBody)
    ),
    tag = "catalog"
)]
pub async fn get_conference(
    State(state): State<AppState>,
    Path(conference): Path<String>,
) -> Result<Json<Conference>, AppError> {
    Ok(Json(load_conference(&state, &conference).await?))
}

#[utoipa::path(
    get,
    path = "/api/{conference}/events/{guid}",
    params(
        ("conference" = String, Path, example = "37c3"),
        ("guid" = String, Path, example = "8f2618e2-d5d9-521c-96ec-f40e807dd5af")
    ),
    responses(
        (status = 200, description = "Event metadata", body = DetailedEvent),
        (status = 404, description = "Event not found", body = ErrorBody)
    ),
    tag = "catalog"
)]
pub async fn get_event(
    State(state): State<AppState>,
    Path((conference, guid)): Path<(String, String)>,
) -> Result<Json<DetailedEvent>, AppError> {
    validate_path_segment("conference", &conference)?;
    validate_path_segment("guid", &guid)?;

    state
        .catalog
        .event(&guid)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))
}

#[utoipa::path(
    get,
    path = "/api/{conference}/resolve",
    params(("conference" = String, Path, example = "37c3"), ResolveQuery),
    responses(
        (status = 200, description = "Catalog entry matching the name", body = ResolveResponse),
        (status = 404, description = "No matching event", body = ErrorBody)
    ),
    tag = "catalog"
)]
pub async fn resolve_name(
    State(state): State<AppState>,
    Path(conference): Path<String>,
    Query(query): Query<ResolveQuery>,
) -> Result<Json<ResolveResponse>, AppError> {
    let conference = load_conference(&state, &conference).await?;
    let lookup = build_lookup_map(&conference.events);

    let record = FileRecord::from_listing(ListingEntry {
        name: query.name.clone(),
        path: String::new(),
        size: 0,
        is_dir: false,
        modified: None,
    });
    let event = record
        .lookup(&lookup)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("No event matches '{}'", query.name)))?;

    Ok(Json(ResolveResponse {
        key: derive_key(&record.name, KeyMode::Filename),
        conference_acronym: record.conference_acronym,
        event_local_id: record.event_local_id,
        language: record.language,
        name: record.name,
        event,
    }))
}

#[utoipa::path(
    get,
    path = "/api/{conference}/files",
    params(("conference" = String, Path, example = "37c3"), FilesQuery),
    responses(
        (status = 200, description = "Published files correlated with catalog events", body = [PublishedFile]),
        (status = 400, description = "Missing API key", body = ErrorBody),
        (status = 403, description = "Invalid API key", body = ErrorBody)
    ),
    security(("api_key" = [])),
    tag = "files"
)]
pub async fn list_files(
    State(state): State<AppState>,
    Path(conference): Path<String>,
    Query(query): Query<FilesQuery>,
) -> Result<Json<Vec<PublishedFile>>, AppError> {
    validate_relative_dir(&query.dir)?;
    let conference = load_conference(&state, &conference).await?;
    let lookup = build_lookup_map(&conference.events);

    let dir = join_path(&state.publisher.layout().media_root, query.dir.trim_matches('/'));
    let listing = match state.store.list_dir(&dir).await {
        Ok(listing) => listing,
        Err(e) => {
            if e.is_connection_fault() {
                state.store.invalidate().await;
            }
            return Err(e.into());
        }
    };

    let files = listing
        .into_iter()
        .filter(|entry| !entry.is_dir)
        .map(FileRecord::from_listing)
        .map(|record| PublishedFile {
            event: record.lookup(&lookup).cloned(),
            key: record.key(),
            modified: record.raw.modified,
            language: record.language,
            name: record.name,
            path: record.storage_path,
            size: record.size,
        })
        .collect();

    Ok(Json(files))
}
