pub mod api;
pub mod config;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use crate::config::GatewayConfig;
use crate::services::catalog::Catalog;
use crate::services::content_store::ContentStore;
use crate::services::publisher::Publisher;
use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, put},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

/// Multipart framing and the `meta` part on top of the artifact itself.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::conferences::get_conference,
        api::handlers::conferences::get_event,
        api::handlers::conferences::resolve_name,
        api::handlers::conferences::list_files,
        api::handlers::files::upload_file,
        api::handlers::files::publish_from_url,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::error::ErrorBody,
            api::handlers::conferences::ResolveResponse,
            api::handlers::conferences::PublishedFile,
            api::handlers::files::PublishResponse,
            api::handlers::files::PublishFromUrlRequest,
            api::handlers::health::HealthResponse,
            models::Conference,
            models::EventSummary,
            models::Video,
            models::DetailedEvent,
            models::Recording,
            models::FileMeta,
            models::FileUpsertBody,
            services::error::FieldError,
            services::error::PublishStep,
        )
    ),
    modifiers(&ApiKeyAddon),
    tags(
        (name = "catalog", description = "Conference and event lookups"),
        (name = "files", description = "Artifact publishing endpoints"),
        (name = "system", description = "Service health")
    )
)]
pub struct ApiDoc;

struct ApiKeyAddon;

impl Modify for ApiKeyAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                    "Authorization",
                    "Token <key>",
                ))),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: GatewayConfig,
    pub catalog: Arc<dyn Catalog>,
    pub store: Arc<dyn ContentStore>,
    pub publisher: Arc<Publisher>,
}

pub fn create_app(state: AppState) -> Router {
    let protected = Router::new()
        .route(
            "/api/:conference/events/:guid/file",
            put(api::handlers::files::upload_file),
        )
        .route(
            "/api/:conference/events/:guid/file/url",
            put(api::handlers::files::publish_from_url),
        )
        .route("/api/:conference/files", get(api::handlers::conferences::list_files))
        .layer(from_fn_with_state(
            state.clone(),
            api::middleware::auth::api_key_middleware,
        ));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/", get(api::handlers::health::root))
        .route("/health", get(api::handlers::health::health_check))
        .route("/api/:conference", get(api::handlers::conferences::get_conference))
        .route(
            "/api/:conference/events/:guid",
            get(api::handlers::conferences::get_event),
        )
        .route(
            "/api/:conference/resolve",
            get(api::handlers::conferences::resolve_name),
        )
        .merge(protected)
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers(Any),
        )
        .layer(axum::extract::DefaultBodyLimit::max(
            state.config.max_file_size + MULTIPART_OVERHEAD,
        ))
        .with_state(state)
}
