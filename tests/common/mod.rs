#![allow(dead_code)]

use async_trait::async_trait;
use publishing_gateway::config::GatewayConfig;
use publishing_gateway::models::{
    Conference, DetailedEvent, EventSummary, RecordingUpsert, UpsertOutcome, Video,
};
use publishing_gateway::services::catalog::Catalog;
use publishing_gateway::services::content_store::{ArtifactWriter, ContentStore, ListingEntry};
use publishing_gateway::services::error::{CatalogError, FieldError, TransferError};
use publishing_gateway::services::publisher::{MediaLayout, Publisher};
use publishing_gateway::{AppState, create_app};
use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::AsyncWrite;

pub const GUID: &str = "8f2618e2-d5d9-521c-96ec-f40e807dd5af";
pub const STATIC_MEDIA_URL: &str = "https://static.media.ccc.de/media/";
pub const MEDIA_ROOT: &str = "/srv/static/media";

#[derive(Clone)]
pub enum UpsertBehaviour {
    Created,
    Updated,
    Reject(Vec<FieldError>),
    Status(u16),
}

pub struct MockCatalog {
    pub conferences: HashMap<String, Conference>,
    pub events: HashMap<String, DetailedEvent>,
    pub upsert_behaviour: Mutex<UpsertBehaviour>,
    pub conference_calls: AtomicUsize,
    pub event_calls: AtomicUsize,
    pub upserts: Mutex<Vec<(String, RecordingUpsert)>>,
}

impl MockCatalog {
    pub fn new() -> Self {
        let mut events = HashMap::new();
        events.insert(
            GUID.to_string(),
            detailed_event(
                GUID,
                Some("https://static.media.ccc.de/media/congress/2023/58019-8f2618e2-d5d9-521c-96ec-f40e807dd5af.jpg"),
            ),
        );

        let mut conferences = HashMap::new();
        conferences.insert(
            "37c3".to_string(),
            Conference {
                id: "37c3".to_string(),
                title: "37th Chaos Communication Congress".to_string(),
                events: vec![
                    summary(
                        GUID,
                        "37c3-58019-nsu-watch-aufklaren-einmischen",
                        Some("37c3-58019-deu-NSU-Watch_Aufklaren_Einmischen_hd.mp4"),
                    ),
                    summary(
                        "0dd09d2c-8f4a-5b5e-9c59-1d0d3c7f0b11",
                        "lightning-talks-day-2",
                        Some("37c3-lightning-talks-day-2_hd.mp4"),
                    ),
                ],
            },
        );

        Self {
            conferences,
            events,
            upsert_behaviour: Mutex::new(UpsertBehaviour::Created),
            conference_calls: AtomicUsize::new(0),
            event_calls: AtomicUsize::new(0),
            upserts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_upsert(self, behaviour: UpsertBehaviour) -> Self {
        *self.upsert_behaviour.lock().unwrap() = behaviour;
        self
    }

    pub fn with_event(mut self, event: DetailedEvent) -> Self {
        self.events.insert(event.guid.clone(), event);
        self
    }

    pub fn total_calls(&self) -> usize {
        self.conference_calls.load(Ordering::SeqCst)
            + self.event_calls.load(Ordering::SeqCst)
            + self.upserts.lock().unwrap().len()
    }

    pub fn upsert_count(&self) -> usize {
        self.upserts.lock().unwrap().len()
    }
}

#[async_trait]
impl Catalog for MockCatalog {
    async fn conference(&self, acronym: &str) -> Result<Option<Conference>, CatalogError> {
        self.conference_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.conferences.get(acronym).cloned())
    }

    async fn event(&self, guid: &str) -> Result<Option<DetailedEvent>, CatalogError> {
        self.event_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.events.get(guid).cloned())
    }

    async fn upsert_recording(
        &self,
        guid: &str,
        recording: &RecordingUpsert,
    ) -> Result<UpsertOutcome, CatalogError> {
        self.upserts
            .lock()
            .unwrap()
            .push((guid.to_string(), recording.clone()));

        match self.upsert_behaviour.lock().unwrap().clone() {
            UpsertBehaviour::Created => Ok(UpsertOutcome::Created),
            UpsertBehaviour::Updated => Ok(UpsertOutcome::Updated),
            UpsertBehaviour::Reject(errors) => Err(CatalogError::Rejected { errors }),
            UpsertBehaviour::Status(status) => Err(CatalogError::Status {
                status,
                body: "upstream failure".to_string(),
            }),
        }
    }
}

pub fn summary(guid: &str, slug: &str, video: Option<&str>) -> EventSummary {
    EventSummary {
        guid: guid.to_string(),
        slug: slug.to_string(),
        title: slug.to_string(),
        date: None,
        video: video.map(|filename| Video {
            filename: filename.to_string(),
        }),
    }
}

pub fn detailed_event(guid: &str, thumb_url: Option<&str>) -> DetailedEvent {
    DetailedEvent {
        guid: guid.to_string(),
        slug: "37c3-58019-nsu-watch-aufklaren-einmischen".to_string(),
        title: "NSU-Watch".to_string(),
        subtitle: None,
        date: None,
        link: None,
        description: None,
        original_language: Some("deu".to_string()),
        persons: vec![],
        tags: vec![],
        thumb_url: thumb_url.map(str::to_string),
        poster_url: None,
        frontend_link: None,
        url: None,
        recordings: vec![],
    }
}

/// In-memory content store. Opening a file creates it empty, like SFTP `create`;
/// the written bytes land once the writer is shut down.
#[derive(Default)]
pub struct MemoryStore {
    pub files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    pub dirs: Mutex<Vec<String>>,
    pub listings: HashMap<String, Vec<ListingEntry>>,
    pub fail_writes: AtomicBool,
    pub unreachable: AtomicBool,
    pub ensure_dir_calls: AtomicUsize,
    pub open_calls: AtomicUsize,
    pub invalidations: AtomicUsize,
    pub largest_write: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listing(mut self, dir: &str, entries: Vec<ListingEntry>) -> Self {
        self.listings.insert(dir.to_string(), entries);
        self
    }

    pub fn total_calls(&self) -> usize {
        self.ensure_dir_calls.load(Ordering::SeqCst) + self.open_calls.load(Ordering::SeqCst)
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(path).cloned()
    }

    pub fn with_file(self, path: &str, content: &[u8]) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_vec());
        self
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<_> = self.files.lock().unwrap().keys().cloned().collect();
        paths.sort();
        paths
    }
}

struct MemoryWriter {
    path: String,
    buffer: Vec<u8>,
    fail: bool,
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    largest_write: Arc<AtomicUsize>,
}

impl AsyncWrite for MemoryWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.fail {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "connection reset",
            )));
        }
        self.largest_write.fetch_max(buf.len(), Ordering::SeqCst);
        self.buffer.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        this.files
            .lock()
            .unwrap()
            .insert(this.path.clone(), std::mem::take(&mut this.buffer));
        Poll::Ready(Ok(()))
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn ensure_dir(&self, dir: &str) -> Result<(), TransferError> {
        self.ensure_dir_calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(TransferError::Connect {
                host: "memory".to_string(),
                message: "connection refused".to_string(),
            });
        }
        self.dirs.lock().unwrap().push(dir.to_string());
        Ok(())
    }

    async fn open_write(&self, path: &str) -> Result<ArtifactWriter, TransferError> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), Vec::new());
        Ok(Box::pin(MemoryWriter {
            path: path.to_string(),
            buffer: Vec::new(),
            fail: self.fail_writes.load(Ordering::SeqCst),
            files: self.files.clone(),
            largest_write: self.largest_write.clone(),
        }))
    }

    async fn list_dir(&self, dir: &str) -> Result<Vec<ListingEntry>, TransferError> {
        self.listings
            .get(dir)
            .cloned()
            .ok_or_else(|| TransferError::Io {
                path: dir.to_string(),
                message: "no such file".to_string(),
            })
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), TransferError> {
        let mut files = self.files.lock().unwrap();
        let content = files.remove(from).ok_or_else(|| TransferError::Io {
            path: from.to_string(),
            message: "no such file".to_string(),
        })?;
        files.insert(to.to_string(), content);
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<(), TransferError> {
        self.files
            .lock()
            .unwrap()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| TransferError::Io {
                path: path.to_string(),
                message: "no such file".to_string(),
            })
    }

    async fn health_check(&self) -> bool {
        !self.unreachable.load(Ordering::SeqCst)
    }

    async fn invalidate(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn layout() -> MediaLayout {
    MediaLayout {
        media_root: MEDIA_ROOT.to_string(),
        static_media_url: STATIC_MEDIA_URL.to_string(),
    }
}

pub fn publisher(catalog: Arc<MockCatalog>, store: Arc<MemoryStore>, max_size: u64) -> Publisher {
    Publisher::new(catalog, store, layout(), max_size, Duration::from_secs(5))
}

pub fn listing_entry(dir: &str, name: &str, size: u64) -> ListingEntry {
    ListingEntry {
        name: name.to_string(),
        path: format!("{}/{}", dir, name),
        size,
        is_dir: false,
        modified: Some(1_703_980_800),
    }
}

pub fn test_app(catalog: Arc<MockCatalog>, store: Arc<MemoryStore>) -> axum::Router {
    let config = GatewayConfig {
        media_root: MEDIA_ROOT.to_string(),
        static_media_url: STATIC_MEDIA_URL.to_string(),
        ..GatewayConfig::development()
    };
    let publisher = Arc::new(publisher(
        catalog.clone(),
        store.clone(),
        config.max_file_size as u64,
    ));

    create_app(AppState {
        config,
        catalog,
        store,
        publisher,
    })
}
