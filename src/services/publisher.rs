//! Upload orchestration: validate, resolve the destination from the catalog,
//! place the bytes on the content store, then upsert the catalog record.
//!
//! A successful transfer followed by a failed upsert leaves the artifact on
//! the store without a catalog record. Nothing is rolled back; the error
//! carries the uploaded path so the caller can retry the upsert alone.
//!
//! Bytes are written to a hidden staging file next to the destination and
//! renamed over it once complete, so a failed transfer leaves a previously
//! published artifact untouched.

use crate::models::{ArtifactKind, FileMeta, RecordingUpsert, SuccessRecord, UpsertOutcome};
use crate::services::catalog::Catalog;
use crate::services::content_store::{ArtifactWriter, ContentStore, join_path, parent_dir};
use crate::services::error::{PublishError, ResolutionError, TransferError, ValidationError};
use crate::utils::validation::{validate_artifact_filename, validate_file_meta};
use futures::TryStreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio_util::io::StreamReader;
use tracing::{error, info, warn};
use url::Url;
use uuid::Uuid;

/// Bytes moved per write to the content store.
pub const TRANSFER_CHUNK_SIZE: usize = 32 * 1024;

/// Reference suffix stripped from thumbnail URLs to obtain the base path.
const REFERENCE_SUFFIX: &str = ".jpg";

/// Mapping between public static media URLs and content store paths.
#[derive(Debug, Clone)]
pub struct MediaLayout {
    pub media_root: String,
    pub static_media_url: String,
}

/// Where an artifact is placed on the content store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub directory: String,
    pub filename: String,
    pub path: String,
}

impl MediaLayout {
    /// `https://static.media.ccc.de/media/congress/2023/58019-guid.jpg` -> `congress/2023/58019-guid`
    pub fn base_path_from_reference(&self, reference: &str) -> Option<String> {
        let base_path = reference
            .strip_prefix(&self.static_media_url)?
            .strip_suffix(REFERENCE_SUFFIX)?
            .trim_start_matches('/');

        let valid = !base_path.is_empty()
            && base_path
                .split('/')
                .all(|segment| !segment.is_empty() && segment != "." && segment != "..");
        valid.then(|| base_path.to_string())
    }

    pub fn destination(&self, base_path: &str, language: &str, kind: ArtifactKind) -> Destination {
        let relative = format!("{}-{}.{}", base_path, language, kind.extension());
        let path = join_path(&self.media_root, &relative);
        let filename = relative.rsplit('/').next().unwrap_or(&relative).to_string();
        Destination {
            directory: parent_dir(&path).to_string(),
            filename,
            path,
        }
    }
}

impl Destination {
    /// Hidden sibling of the destination that receives the bytes in flight.
    pub fn staging_path(&self) -> String {
        join_path(
            &self.directory,
            &format!(".{}.{}.part", self.filename, Uuid::new_v4().simple()),
        )
    }
}

/// One upload, alive for the duration of a single publish call.
pub struct UploadRequest<'a> {
    pub filename: String,
    pub reader: Box<dyn AsyncRead + Unpin + Send + 'a>,
    pub conference: String,
    pub event_guid: String,
    pub meta: FileMeta,
}

pub struct Publisher {
    catalog: Arc<dyn Catalog>,
    store: Arc<dyn ContentStore>,
    layout: MediaLayout,
    kind: ArtifactKind,
    max_artifact_size: u64,
    source_client: reqwest::Client,
    source_timeout: Duration,
}

impl Publisher {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        store: Arc<dyn ContentStore>,
        layout: MediaLayout,
        max_artifact_size: u64,
        source_timeout: Duration,
    ) -> Self {
        Self {
            catalog,
            store,
            layout,
            kind: ArtifactKind::Subtitles,
            max_artifact_size,
            source_client: reqwest::Client::new(),
            source_timeout,
        }
    }

    pub fn layout(&self) -> &MediaLayout {
        &self.layout
    }

    pub async fn publish_file(&self, upload: UploadRequest<'_>) -> Result<SuccessRecord, PublishError> {
        let UploadRequest {
            filename,
            reader,
            conference,
            event_guid,
            meta,
        } = upload;

        self.check_preconditions(&filename, &meta)?;
        info!(
            "Publishing {} for event {} of {} ({})",
            filename, event_guid, conference, meta.language
        );

        let destination = self.resolve_destination(&event_guid, &meta.language).await?;
        self.transfer(&destination, &filename, reader).await?;
        self.register(&event_guid, &destination, &meta).await
    }

    /// Same pipeline as [`Publisher::publish_file`], with the bytes fetched from `source`.
    pub async fn publish_from_url(
        &self,
        source: &str,
        conference: &str,
        event_guid: &str,
        meta: FileMeta,
    ) -> Result<SuccessRecord, PublishError> {
        let url = Url::parse(source).map_err(|e| {
            ValidationError::UnsupportedFile(format!("'{}' is not a valid URL: {}", source, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ValidationError::UnsupportedFile(format!(
                "Only http(s) sources are supported, got '{}'",
                url.scheme()
            ))
            .into());
        }
        let filename = url
            .path_segments()
            .and_then(|segments| segments.last())
            .unwrap_or_default()
            .to_string();

        self.check_preconditions(&filename, &meta)?;
        info!(
            "Publishing {} for event {} of {} from {}",
            filename, event_guid, conference, url
        );

        let destination = self.resolve_destination(event_guid, &meta.language).await?;

        let source_error = |message: String| PublishError::Transfer {
            path: destination.path.clone(),
            source: TransferError::Source {
                source_name: url.to_string(),
                message,
            },
        };
        let response = self
            .source_client
            .get(url.clone())
            .timeout(self.source_timeout)
            .send()
            .await
            .map_err(|e| source_error(e.to_string()))?;
        if !response.status().is_success() {
            return Err(source_error(format!("HTTP {}", response.status())));
        }

        let stream = response.bytes_stream().map_err(std::io::Error::other);
        let reader = Box::new(StreamReader::new(Box::pin(stream)));
        self.transfer(&destination, url.as_str(), reader).await?;
        self.register(event_guid, &destination, &meta).await
    }

    fn check_preconditions(&self, filename: &str, meta: &FileMeta) -> Result<(), PublishError> {
        validate_artifact_filename(filename, self.kind)?;
        validate_file_meta(meta)?;
        Ok(())
    }

    /// Derives the storage location from the event's thumbnail reference.
    pub async fn resolve_destination(
        &self,
        event_guid: &str,
        language: &str,
    ) -> Result<Destination, ResolutionError> {
        let event = self
            .catalog
            .event(event_guid)
            .await
            .map_err(ResolutionError::Catalog)?
            .ok_or_else(|| ResolutionError::EventNotFound {
                guid: event_guid.to_string(),
            })?;

        let reference = event
            .thumb_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ResolutionError::MissingReference {
                guid: event_guid.to_string(),
            })?;

        let base_path = self
            .layout
            .base_path_from_reference(reference)
            .ok_or_else(|| ResolutionError::MalformedReference {
                url: reference.to_string(),
                base: self.layout.static_media_url.clone(),
            })?;

        let destination = self.layout.destination(&base_path, language, self.kind);
        info!("Event {} resolves to {}", event_guid, destination.path);
        Ok(destination)
    }

    async fn transfer(
        &self,
        destination: &Destination,
        source_name: &str,
        reader: Box<dyn AsyncRead + Unpin + Send + '_>,
    ) -> Result<u64, PublishError> {
        match self.place(destination, source_name, reader).await {
            Ok(written) => {
                info!("Uploaded {} bytes to {}", written, destination.path);
                Ok(written)
            }
            Err(e) => {
                error!("Transfer to {} failed: {}", destination.path, e);
                if e.is_connection_fault() {
                    self.store.invalidate().await;
                }
                Err(PublishError::Transfer {
                    path: destination.path.clone(),
                    source: e,
                })
            }
        }
    }

    async fn place(
        &self,
        destination: &Destination,
        source_name: &str,
        reader: Box<dyn AsyncRead + Unpin + Send + '_>,
    ) -> Result<u64, TransferError> {
        self.store.ensure_dir(&destination.directory).await?;

        let staging = destination.staging_path();
        let mut writer = self.store.open_write(&staging).await?;
        let copied = copy_in_chunks(
            reader,
            &mut writer,
            source_name,
            &staging,
            self.max_artifact_size,
        )
        .await;
        drop(writer);

        let result = match copied {
            Ok(written) => self
                .store
                .rename(&staging, &destination.path)
                .await
                .map(|_| written),
            Err(e) => Err(e),
        };
        if result.is_err() {
            if let Err(e) = self.store.remove(&staging).await {
                warn!("Could not remove staging file {}: {}", staging, e);
            }
        }
        result
    }

    async fn register(
        &self,
        event_guid: &str,
        destination: &Destination,
        meta: &FileMeta,
    ) -> Result<SuccessRecord, PublishError> {
        let recording = RecordingUpsert::auto(destination.filename.clone(), meta);
        match self.catalog.upsert_recording(event_guid, &recording).await {
            Ok(outcome) => {
                let created = outcome == UpsertOutcome::Created;
                info!(
                    "{} recording {} for event {}",
                    if created { "Created" } else { "Updated" },
                    destination.filename,
                    event_guid
                );
                Ok(SuccessRecord {
                    filename: destination.filename.clone(),
                    path: destination.path.clone(),
                    created,
                })
            }
            Err(e) => {
                warn!(
                    "{} is on the content store but the catalog upsert failed: {}",
                    destination.path, e
                );
                Err(PublishError::Catalog {
                    path: destination.path.clone(),
                    source: e,
                })
            }
        }
    }
}

/// Streams `reader` into `writer` in [`TRANSFER_CHUNK_SIZE`] pieces and closes it.
///
/// Read failures are reported against `source_name`, write failures against `path`.
async fn copy_in_chunks(
    mut reader: Box<dyn AsyncRead + Unpin + Send + '_>,
    writer: &mut ArtifactWriter,
    source_name: &str,
    path: &str,
    max_size: u64,
) -> Result<u64, TransferError> {
    let mut buffer = vec![0u8; TRANSFER_CHUNK_SIZE];
    let mut total: u64 = 0;

    loop {
        let n = reader
            .read(&mut buffer)
            .await
            .map_err(|e| TransferError::Source {
                source_name: source_name.to_string(),
                message: e.to_string(),
            })?;
        if n == 0 {
            break;
        }

        total += n as u64;
        if total > max_size {
            return Err(TransferError::TooLarge { max: max_size });
        }

        writer
            .write_all(&buffer[..n])
            .await
            .map_err(|e| TransferError::Io {
                path: path.to_string(),
                message: e.to_string(),
            })?;
    }

    writer.shutdown().await.map_err(|e| TransferError::Io {
        path: path.to_string(),
        message: e.to_string(),
    })?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> MediaLayout {
        MediaLayout {
            media_root: "/srv/static/media".to_string(),
            static_media_url: "https://static.media.ccc.de/media/".to_string(),
        }
    }

    #[test]
    fn test_base_path_from_reference() {
        let layout = layout();
        assert_eq!(
            layout
                .base_path_from_reference(
                    "https://static.media.ccc.de/media/congress/2023/58019-8f2618e2-d5d9-521c-96ec-f40e807dd5af.jpg"
                )
                .as_deref(),
            Some("congress/2023/58019-8f2618e2-d5d9-521c-96ec-f40e807dd5af")
        );
        assert_eq!(
            layout.base_path_from_reference("https://elsewhere.example/media/congress/a.jpg"),
            None
        );
        assert_eq!(
            layout.base_path_from_reference("https://static.media.ccc.de/media/congress/a.png"),
            None
        );
        assert_eq!(
            layout.base_path_from_reference("https://static.media.ccc.de/media/../etc/a.jpg"),
            None
        );
        assert_eq!(
            layout.base_path_from_reference("https://static.media.ccc.de/media/.jpg"),
            None
        );
    }

    #[test]
    fn test_destination() {
        let destination =
            layout().destination("congress/2023/58019-guid", "eng", ArtifactKind::Subtitles);
        assert_eq!(destination.filename, "58019-guid-eng.vtt");
        assert_eq!(destination.directory, "/srv/static/media/congress/2023");
        assert_eq!(destination.path, "/srv/static/media/congress/2023/58019-guid-eng.vtt");
    }

    #[test]
    fn test_staging_path_is_hidden_sibling() {
        let destination =
            layout().destination("congress/2023/58019-guid", "eng", ArtifactKind::Subtitles);
        let staging = destination.staging_path();

        assert_eq!(parent_dir(&staging), destination.directory);
        assert!(staging.starts_with("/srv/static/media/congress/2023/.58019-guid-eng.vtt."));
        assert!(staging.ends_with(".part"));
        assert_ne!(staging, destination.staging_path());
    }
}
