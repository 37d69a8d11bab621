//! Error taxonomy for the publishing pipeline.
//!
//! Every variant of [`PublishError`] belongs to exactly one step of the
//! pipeline, so callers can tell which remote system failed and retry only
//! that part.

use serde::Serialize;
use std::fmt;
use thiserror::Error;
use utoipa::ToSchema;

/// A single problem with an input or upstream record, optionally tied to a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FieldError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: Some(field.into()),
            message: message.into(),
        }
    }

    pub fn general(message: impl Into<String>) -> Self {
        Self {
            field: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{}: {}", field, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Input rejected before any remote system was contacted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0}")]
    UnsupportedFile(String),

    #[error("metadata does not match the expected schema")]
    Schema(Vec<FieldError>),
}

impl ValidationError {
    pub fn field_errors(&self) -> Vec<FieldError> {
        match self {
            ValidationError::UnsupportedFile(msg) => vec![FieldError::new("file", msg.clone())],
            ValidationError::Schema(errors) => errors.clone(),
        }
    }
}

/// Failures of the content store transport.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("could not connect to content store {host}: {message}")]
    Connect { host: String, message: String },

    #[error("content store refused the credentials for user {user}")]
    Authentication { user: String },

    #[error("content store I/O failed for {path}: {message}")]
    Io { path: String, message: String },

    #[error("could not read source {source_name}: {message}")]
    Source {
        source_name: String,
        message: String,
    },

    #[error("artifact exceeds the maximum size of {max} bytes")]
    TooLarge { max: u64 },
}

impl TransferError {
    /// Errors after which a cached store connection can no longer be trusted.
    pub fn is_connection_fault(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::Connect { .. })
    }
}

/// Failures talking to the catalog service.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// HTTP 422 from the upsert endpoint.
    #[error("catalog rejected the record")]
    Rejected { errors: Vec<FieldError> },

    #[error("catalog responded with HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("catalog query failed: {0}")]
    Query(String),

    #[error("invalid catalog URL: {0}")]
    Url(String),

    #[error("catalog request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// The destination path for an upload could not be derived.
#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("event {guid} not found")]
    EventNotFound { guid: String },

    #[error("event {guid} has no thumbnail reference to derive a storage path from")]
    MissingReference { guid: String },

    #[error("thumbnail reference {url} is not below {base}")]
    MalformedReference { url: String, base: String },

    #[error("event lookup failed: {0}")]
    Catalog(#[source] CatalogError),
}

/// Pipeline step a [`PublishError`] originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PublishStep {
    Validate,
    Resolve,
    Transfer,
    Upsert,
}

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("invalid upload: {0}")]
    Validation(#[from] ValidationError),

    #[error("could not resolve destination: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("transfer to {path} failed: {source}")]
    Transfer {
        path: String,
        #[source]
        source: TransferError,
    },

    /// The bytes are on the content store but the catalog does not know them.
    #[error("{path} was uploaded but registering it failed: {source}")]
    Catalog {
        path: String,
        #[source]
        source: CatalogError,
    },
}

impl PublishError {
    pub fn step(&self) -> PublishStep {
        match self {
            PublishError::Validation(_) => PublishStep::Validate,
            PublishError::Resolution(_) => PublishStep::Resolve,
            PublishError::Transfer { .. } => PublishStep::Transfer,
            PublishError::Catalog { .. } => PublishStep::Upsert,
        }
    }
}
