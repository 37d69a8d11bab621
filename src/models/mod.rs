use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Video {
    pub filename: String,
}

/// One talk as listed in a conference overview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EventSummary {
    pub guid: String,
    pub slug: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub date: Option<DateTime<FixedOffset>>,
    /// Preferred rendered video, absent for talks without a release.
    #[serde(default)]
    pub video: Option<Video>,
}

impl EventSummary {
    pub fn video_filename(&self) -> Option<&str> {
        self.video.as_ref().map(|v| v.filename.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Conference {
    pub id: String,
    pub title: String,
    pub events: Vec<EventSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Recording {
    pub filename: String,
    pub mime_type: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub size: Option<i64>,
    #[serde(default)]
    pub length: Option<i64>,
    #[serde(default)]
    pub high_quality: Option<bool>,
    #[serde(default)]
    pub width: Option<i32>,
    #[serde(default)]
    pub height: Option<i32>,
    #[serde(default)]
    pub recording_url: Option<String>,
}

/// Full event record as served by the catalog's public REST endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DetailedEvent {
    pub guid: String,
    pub slug: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub date: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub original_language: Option<String>,
    #[serde(default)]
    pub persons: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Location of the thumbnail on the static media host; the storage
    /// path of every auxiliary artifact is derived from it.
    #[serde(default)]
    pub thumb_url: Option<String>,
    #[serde(default)]
    pub poster_url: Option<String>,
    #[serde(default)]
    pub frontend_link: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub recordings: Vec<Recording>,
}

/// Kind of auxiliary artifact accepted for publishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Subtitles,
}

impl ArtifactKind {
    pub fn extension(self) -> &'static str {
        match self {
            ArtifactKind::Subtitles => "vtt",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ArtifactKind::Subtitles => "VTT",
        }
    }
}

/// Metadata supplied by the contributor alongside an upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, Validate)]
pub struct FileMeta {
    #[validate(length(min = 1, message = "language must not be empty"))]
    pub language: String,
    #[validate(length(min = 1, message = "mime_type must not be empty"))]
    pub mime_type: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct FileUpsertBody {
    pub recording: FileMeta,
}

/// Recording record sent to the catalog's upsert endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordingUpsert {
    pub folder: String,
    pub filename: String,
    pub mime_type: String,
    pub language: String,
    pub state: String,
}

impl RecordingUpsert {
    pub fn auto(filename: impl Into<String>, meta: &FileMeta) -> Self {
        Self {
            folder: String::new(),
            filename: filename.into(),
            mime_type: meta.mime_type.clone(),
            language: meta.language.clone(),
            state: "auto".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Result of a completed publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SuccessRecord {
    pub filename: String,
    pub path: String,
    pub created: bool,
}
