use crate::services::error::{
    CatalogError, FieldError, PublishError, PublishStep, ResolutionError, TransferError,
    ValidationError,
};
use crate::utils::spool::SpoolError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Error envelope: `{"errors": [{"message": ...}]}`
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub errors: Vec<FieldError>,
    /// Pipeline step that failed, for publish requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<PublishStep>,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Please provide an API key")]
    MissingApiKey,

    #[error("The provided API key is not valid")]
    InvalidApiKey,

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

impl From<SpoolError> for AppError {
    fn from(e: SpoolError) -> Self {
        match e {
            SpoolError::TooLarge { .. } => AppError::PayloadTooLarge(e.to_string()),
            SpoolError::Read(_) => AppError::BadRequest(e.to_string()),
            SpoolError::Io(_) => AppError::Internal(e.to_string()),
        }
    }
}

fn message(msg: impl Into<String>) -> Vec<FieldError> {
    vec![FieldError::general(msg)]
}

fn validation_response(e: &ValidationError) -> (StatusCode, Vec<FieldError>) {
    match e {
        ValidationError::UnsupportedFile(msg) => (StatusCode::BAD_REQUEST, message(msg.clone())),
        ValidationError::Schema(errors) => (StatusCode::UNPROCESSABLE_ENTITY, errors.clone()),
    }
}

fn catalog_response(e: &CatalogError) -> (StatusCode, Vec<FieldError>) {
    match e {
        CatalogError::Rejected { errors } => (StatusCode::UNPROCESSABLE_ENTITY, errors.clone()),
        CatalogError::Status { status, .. } => (
            StatusCode::BAD_GATEWAY,
            message(format!("Catalog responded with HTTP {}", status)),
        ),
        _ => {
            tracing::error!("Catalog error: {}", e);
            (StatusCode::BAD_GATEWAY, message("Catalog service unavailable"))
        }
    }
}

fn transfer_response(e: &TransferError) -> (StatusCode, Vec<FieldError>) {
    match e {
        TransferError::TooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, message(e.to_string())),
        TransferError::Source { .. } => (StatusCode::BAD_REQUEST, message(e.to_string())),
        _ => {
            tracing::error!("Content store error: {}", e);
            (StatusCode::BAD_GATEWAY, message("Content store unavailable"))
        }
    }
}

fn publish_response(e: &PublishError) -> (StatusCode, Vec<FieldError>) {
    match e {
        PublishError::Validation(v) => validation_response(v),
        PublishError::Resolution(ResolutionError::EventNotFound { .. }) => {
            (StatusCode::NOT_FOUND, message(e.to_string()))
        }
        PublishError::Resolution(ResolutionError::Catalog(c)) => catalog_response(c),
        PublishError::Resolution(_) => {
            tracing::error!("Resolution error: {}", e);
            (StatusCode::BAD_GATEWAY, message(e.to_string()))
        }
        PublishError::Transfer { source, .. } => transfer_response(source),
        PublishError::Catalog { path, source } => {
            let (status, mut errors) = catalog_response(source);
            errors.push(FieldError::general(format!(
                "{} was uploaded but is not registered in the catalog",
                path.rsplit('/').next().unwrap_or(path)
            )));
            (status, errors)
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, errors) = match &self {
            AppError::MissingApiKey => (StatusCode::BAD_REQUEST, message(self.to_string())),
            AppError::InvalidApiKey => (StatusCode::FORBIDDEN, message(self.to_string())),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, message(msg.clone())),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, message(msg.clone())),
            AppError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, message(msg.clone())),
            AppError::Validation(e) => validation_response(e),
            AppError::Publish(e) => publish_response(e),
            AppError::Catalog(e) => catalog_response(e),
            AppError::Transfer(e) => transfer_response(e),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, message("Internal Server Error"))
            }
        };

        let step = match &self {
            AppError::Publish(e) => Some(e.step()),
            _ => None,
        };

        (status, Json(ErrorBody { errors, step })).into_response()
    }
}
