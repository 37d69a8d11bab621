use crate::models::{Conference, DetailedEvent, EventSummary, RecordingUpsert, UpsertOutcome};
use crate::services::error::{CatalogError, FieldError};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use url::Url;

const CONFERENCE_QUERY: &str = "query Conference($slug: ID!) { \
    conference(id: $slug) { id title \
    events: lectures { nodes { guid slug title date video: videoPreferred { filename } } } } }";

/// Upstream system of record for conferences, events and recordings.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Conference with its event list, `None` when unknown.
    async fn conference(&self, acronym: &str) -> Result<Option<Conference>, CatalogError>;

    async fn event(&self, guid: &str) -> Result<Option<DetailedEvent>, CatalogError>;

    /// Create-or-update of a recording attached to the event `guid`.
    async fn upsert_recording(
        &self,
        guid: &str,
        recording: &RecordingUpsert,
    ) -> Result<UpsertOutcome, CatalogError>;
}

/// HTTP client for the voctoweb catalog (GraphQL, public REST and private API).
pub struct VoctowebCatalog {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
}

#[derive(Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Deserialize)]
struct ConferenceData {
    conference: Option<ConferenceNode>,
}

#[derive(Deserialize)]
struct ConferenceNode {
    id: String,
    title: String,
    events: Nodes<EventSummary>,
}

#[derive(Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct Nodes<T> {
    #[serde(default)]
    nodes: Vec<T>,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    guid: &'a str,
    recording: &'a RecordingUpsert,
}

impl VoctowebCatalog {
    pub fn new(base_url: &str, api_key: String, timeout: Duration) -> Result<Self, CatalogError> {
        let base_url = Url::parse(base_url).map_err(|e| CatalogError::Url(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(CatalogError::Url(base_url.to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("publishing-gateway/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, CatalogError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CatalogError::Url(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn error_for(response: reqwest::Response) -> CatalogError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(
            "Catalog responded with {}: {}",
            status,
            body.lines().next().unwrap_or_default()
        );
        CatalogError::Status { status, body }
    }
}

#[async_trait]
impl Catalog for VoctowebCatalog {
    async fn conference(&self, acronym: &str) -> Result<Option<Conference>, CatalogError> {
        let variables = serde_json::json!({ "slug": acronym }).to_string();
        let response = self
            .http
            .get(self.endpoint(&["graphql"])?)
            .query(&[("query", CONFERENCE_QUERY), ("variables", variables.as_str())])
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(Self::error_for(response).await);
        }

        let body: GraphQlResponse<ConferenceData> = response.json().await?;
        let messages: Vec<String> = body.errors.into_iter().map(|e| e.message).collect();
        let Some(data) = body.data else {
            return Err(CatalogError::Query(messages.join("; ")));
        };
        if !messages.is_empty() {
            tracing::warn!("Catalog query for {} reported errors: {:?}", acronym, messages);
        }

        Ok(data.conference.map(|node| Conference {
            id: node.id,
            title: node.title,
            events: node.events.nodes,
        }))
    }

    async fn event(&self, guid: &str) -> Result<Option<DetailedEvent>, CatalogError> {
        let response = self
            .http
            .get(self.endpoint(&["public", "events", guid])?)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(Some(response.json().await?)),
            StatusCode::NOT_FOUND => Ok(None),
            _ => Err(Self::error_for(response).await),
        }
    }

    async fn upsert_recording(
        &self,
        guid: &str,
        recording: &RecordingUpsert,
    ) -> Result<UpsertOutcome, CatalogError> {
        let response = self
            .http
            .post(self.endpoint(&["api", "recordings"])?)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Token token={}", self.api_key),
            )
            .json(&UpsertRequest { guid, recording })
            .send()
            .await?;

        match response.status() {
            StatusCode::CREATED => Ok(UpsertOutcome::Created),
            StatusCode::OK => Ok(UpsertOutcome::Updated),
            StatusCode::UNPROCESSABLE_ENTITY => {
                let body = response.text().await.unwrap_or_default();
                Err(CatalogError::Rejected {
                    errors: parse_validation_errors(&body),
                })
            }
            _ => Err(Self::error_for(response).await),
        }
    }
}

/// Flattens a 422 body into field errors.
///
/// Accepts Rails-style `{"field": ["msg", ..]}` maps, optionally wrapped in
/// an `errors` key, lists of strings or `{"message": ..}` objects, and plain text.
pub fn parse_validation_errors(body: &str) -> Vec<FieldError> {
    let mut errors = Vec::new();
    match serde_json::from_str::<Value>(body) {
        Ok(value) => collect_errors(None, &value, &mut errors),
        Err(_) if !body.trim().is_empty() => errors.push(FieldError::general(body.trim())),
        Err(_) => {}
    }
    if errors.is_empty() {
        errors.push(FieldError::general("catalog rejected the record"));
    }
    errors
}

fn collect_errors(field: Option<&str>, value: &Value, out: &mut Vec<FieldError>) {
    let push = |out: &mut Vec<FieldError>, message: String| {
        out.push(FieldError {
            field: field.map(str::to_string),
            message,
        })
    };

    match value {
        Value::String(message) => push(out, message.clone()),
        Value::Array(items) => {
            for item in items {
                collect_errors(field, item, out);
            }
        }
        Value::Object(map) => {
            if let Some(Value::String(message)) = map.get("message") {
                push(out, message.clone());
            } else if let Some(inner) = map.get("errors") {
                collect_errors(field, inner, out);
            } else {
                for (key, inner) in map {
                    collect_errors(Some(key), inner, out);
                }
            }
        }
        Value::Null => {}
        other => push(out, other.to_string()),
    }
}
