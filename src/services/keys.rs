//! Correlation of talk slugs and artifact filenames with catalog entries.
//!
//! Catalog slugs and rendered video filenames are produced independently
//! (`37c3-58019-nsu-watch-...` vs `37c3-58019-deu-NSU-Watch_..._hd.mp4`), so
//! both are reduced to a record key of the form `{acronym}-{local_id}` when
//! the second segment is numeric, and indexed under both forms otherwise.

use crate::models::EventSummary;
use crate::services::content_store::ListingEntry;
use std::collections::HashMap;

const DELIMITER: char = '-';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMode {
    Slug,
    /// Rendered video filename; quality suffix and extension are dropped on fallback.
    Filename,
}

/// Record key -> catalog entry. Built per conference query, never cached.
pub type LookupMap<'a> = HashMap<String, &'a EventSummary>;

/// Derives the record key for a slug or filename.
///
/// Malformed identifiers are not an error: anything without a numeric
/// second segment keys under itself.
pub fn derive_key(identifier: &str, mode: KeyMode) -> String {
    let mut segments = identifier.split(DELIMITER);
    if let (Some(acronym), Some(local_id)) = (segments.next(), segments.next()) {
        if is_decimal(local_id) {
            return format!("{acronym}{DELIMITER}{local_id}");
        }
    }

    match mode {
        KeyMode::Slug => identifier.to_string(),
        KeyMode::Filename => strip_video_suffix(identifier).to_string(),
    }
}

/// Indexes every event under its slug key and, where it differs, under the
/// key of its preferred video filename. Later events win on collisions.
pub fn build_lookup_map(events: &[EventSummary]) -> LookupMap<'_> {
    let mut map = HashMap::with_capacity(events.len());
    for event in events {
        let key = derive_key(&event.slug, KeyMode::Slug);
        let alt_key = event
            .video_filename()
            .map(|filename| derive_key(filename, KeyMode::Filename));
        map.insert(key.clone(), event);
        if let Some(alt_key) = alt_key.filter(|alt| *alt != key) {
            map.insert(alt_key, event);
        }
    }
    map
}

fn is_decimal(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

fn strip_video_suffix(name: &str) -> &str {
    match name.strip_suffix(".mp4") {
        Some(stem) => stem
            .strip_suffix("_hd")
            .or_else(|| stem.strip_suffix("_sd"))
            .unwrap_or(stem),
        None => name,
    }
}

/// An artifact found on the content store, e.g.
/// `camp2023-57136-eng-Lightning_Talks_Session_1_opus.vtt`.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
    pub name: String,
    pub storage_path: String,
    pub size: u64,
    pub conference_acronym: Option<String>,
    pub event_local_id: Option<String>,
    pub language: Option<String>,
    pub raw: ListingEntry,
}

impl FileRecord {
    pub fn from_listing(entry: ListingEntry) -> Self {
        let segments: Vec<&str> = entry.name.split(DELIMITER).collect();
        let (conference_acronym, event_local_id, language) = match segments.as_slice() {
            [acronym, local_id, language, ..] => (
                Some(acronym.to_string()),
                Some(local_id.to_string()),
                Some(language.to_string()),
            ),
            _ => (None, None, None),
        };

        Self {
            name: entry.name.clone(),
            storage_path: entry.path.clone(),
            size: entry.size,
            conference_acronym,
            event_local_id,
            language,
            raw: entry,
        }
    }

    pub fn key(&self) -> Option<String> {
        match (&self.conference_acronym, &self.event_local_id) {
            (Some(acronym), Some(local_id)) => Some(format!("{acronym}{DELIMITER}{local_id}")),
            _ => None,
        }
    }

    /// Finds the catalog entry this artifact belongs to.
    pub fn lookup<'a>(&self, map: &LookupMap<'a>) -> Option<&'a EventSummary> {
        map.get(&derive_key(&self.name, KeyMode::Filename))
            .or_else(|| self.key().and_then(|key| map.get(&key)))
            .copied()
    }
}
