pub mod sftp;

use crate::config::GatewayConfig;
use crate::services::catalog::{Catalog, VoctowebCatalog};
use crate::services::content_store::ContentStore;
use sftp::{SftpContentStore, SftpSettings};
use std::sync::Arc;
use tracing::info;

pub fn setup_catalog(config: &GatewayConfig) -> anyhow::Result<Arc<dyn Catalog>> {
    info!("📚 Catalog: {}", config.catalog_url);
    if config.catalog_api_key.is_empty() {
        tracing::warn!("VOCTOWEB_API_KEY is not set, catalog upserts will be rejected");
    }

    let catalog = VoctowebCatalog::new(
        &config.catalog_url,
        config.catalog_api_key.clone(),
        config.http_timeout,
    )?;
    Ok(Arc::new(catalog))
}

/// The connection itself is established lazily on first use.
pub fn setup_content_store(config: &GatewayConfig) -> Arc<dyn ContentStore> {
    info!(
        "☁️  Content store: sftp://{}@{}:{}{}",
        config.sftp_user, config.sftp_host, config.sftp_port, config.media_root
    );

    Arc::new(SftpContentStore::new(SftpSettings {
        host: config.sftp_host.clone(),
        port: config.sftp_port,
        user: config.sftp_user.clone(),
        key_path: config.sftp_key_path.clone(),
        strict_host_keys: config.sftp_strict_host_keys,
        connect_timeout: config.sftp_timeout,
    }))
}
