use crate::AppState;
use crate::api::error::AppError;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

/// Extracts the API key from `Token <key>`, `Token token=<key>` or `token=<key>`.
fn api_key_from_header(value: &str) -> Option<&str> {
    let value = value.trim();
    let key = if let Some(rest) = value.strip_prefix("Token ") {
        let rest = rest.trim();
        rest.strip_prefix("token=").unwrap_or(rest)
    } else {
        value.strip_prefix("token=")?
    };
    let key = key.trim();
    (!key.is_empty()).then_some(key)
}

pub async fn api_key_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let api_key = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(api_key_from_header)
        .ok_or(AppError::MissingApiKey)?;

    if !state.config.is_allowed_key(api_key) {
        tracing::warn!("Rejected request to {} with unknown API key", req.uri().path());
        return Err(AppError::InvalidApiKey);
    }

    Ok(next.run(req).await)
}
