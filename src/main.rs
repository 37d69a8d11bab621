use clap::Parser;
use dotenvy::dotenv;
use publishing_gateway::config::GatewayConfig;
use publishing_gateway::infrastructure::{setup_catalog, setup_content_store};
use publishing_gateway::services::publisher::{MediaLayout, Publisher};
use publishing_gateway::{AppState, create_app};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "::")]
    host: IpAddr,

    /// Port for the API server
    #[arg(short, long, env = "PORT", default_value_t = 5005)]
    port: u16,

    /// Use the development preset (catalog test instance, API key "dev-key")
    #[arg(long)]
    dev: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "publishing_gateway=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting publishing gateway...");

    let config = if args.dev {
        GatewayConfig::development()
    } else {
        GatewayConfig::from_env()
    };
    info!(
        "🛡️  Max artifact size={}MB, {} API key(s) allowed",
        config.max_file_size / 1024 / 1024,
        config.allowed_keys.len()
    );

    let catalog = setup_catalog(&config)?;
    let store = setup_content_store(&config);
    let publisher = Arc::new(Publisher::new(
        catalog.clone(),
        store.clone(),
        MediaLayout {
            media_root: config.media_root.clone(),
            static_media_url: config.static_media_url.clone(),
        },
        config.max_file_size as u64,
        config.http_timeout,
    ));

    let state = AppState {
        config,
        catalog,
        store,
        publisher,
    };

    let app = create_app(state).layer(
        TraceLayer::new_for_http()
            .make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            })
            .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                info!("📥 {} {}", request.method(), request.uri());
            })
            .on_response(
                |response: &axum::http::Response<_>,
                 latency: std::time::Duration,
                 _span: &tracing::Span| {
                    info!(
                        "📤 Finished in {:?} with status {}",
                        latency,
                        response.status()
                    );
                },
            ),
    );

    let addr = SocketAddr::new(args.host, args.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("✅ Server ready at http://{}", addr);
    info!("📖 Swagger UI: http://{}/swagger-ui", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("🛑 Server shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, starting graceful shutdown...");
        },
    }
}
