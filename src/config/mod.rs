use std::collections::HashSet;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Gateway configuration, loaded once at startup
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Content store SFTP host (default: "upload.media.ccc.de")
    pub sftp_host: String,

    /// Content store SFTP port (default: 22)
    pub sftp_port: u16,

    /// Content store SFTP user (default: "cdn-app")
    pub sftp_user: String,

    /// Private key used to authenticate against the content store
    pub sftp_key_path: PathBuf,

    /// Refuse hosts missing from known_hosts (default: false)
    pub sftp_strict_host_keys: bool,

    /// Root directory on the content store that mirrors `static_media_url`
    pub media_root: String,

    /// Public base URL of the static media host (default: "https://static.media.ccc.de/media/")
    pub static_media_url: String,

    /// Catalog service base URL (default: "https://media.ccc.de")
    pub catalog_url: String,

    /// Token for the catalog's private API
    pub catalog_api_key: String,

    /// API keys accepted from contributors
    pub allowed_keys: HashSet<String>,

    /// Maximum artifact size in bytes (default: 16 MB)
    pub max_file_size: usize,

    /// Timeout for catalog and source HTTP requests
    pub http_timeout: Duration,

    /// Timeout for establishing the content store connection
    pub sftp_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            sftp_host: "upload.media.ccc.de".to_string(),
            sftp_port: 22,
            sftp_user: "cdn-app".to_string(),
            sftp_key_path: default_key_path(),
            sftp_strict_host_keys: false,
            media_root: "/srv/static/media".to_string(),
            static_media_url: "https://static.media.ccc.de/media/".to_string(),
            catalog_url: "https://media.ccc.de".to_string(),
            catalog_api_key: String::new(),
            allowed_keys: HashSet::new(),
            max_file_size: 16 * 1024 * 1024, // 16 MB
            http_timeout: Duration::from_secs(30),
            sftp_timeout: Duration::from_secs(30),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            sftp_host: env::var("SFTP_UPLOAD_HOST").unwrap_or(default.sftp_host),

            sftp_port: env::var("SFTP_UPLOAD_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.sftp_port),

            sftp_user: env::var("SFTP_UPLOAD_USER").unwrap_or(default.sftp_user),

            sftp_key_path: env::var("SFTP_UPLOAD_KEY")
                .map(PathBuf::from)
                .unwrap_or(default.sftp_key_path),

            sftp_strict_host_keys: env::var("SFTP_KNOWN_HOSTS_STRICT")
                .map(|v| parse_flag(&v))
                .unwrap_or(default.sftp_strict_host_keys),

            media_root: env::var("CDN_MEDIA_ROOT").unwrap_or(default.media_root),

            static_media_url: env::var("STATIC_MEDIA_URL").unwrap_or(default.static_media_url),

            catalog_url: env::var("VOCTOWEB_URL").unwrap_or(default.catalog_url),

            catalog_api_key: env::var("VOCTOWEB_API_KEY").unwrap_or(default.catalog_api_key),

            allowed_keys: env::var("ALLOWED_API_KEYS")
                .map(|v| parse_key_list(&v))
                .unwrap_or(default.allowed_keys),

            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            http_timeout: env::var("HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default.http_timeout),

            sftp_timeout: env::var("SFTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default.sftp_timeout),
        }
    }

    /// Config for development against the catalog test instance
    pub fn development() -> Self {
        Self {
            catalog_url: "https://media.test.c3voc.de".to_string(),
            allowed_keys: parse_key_list("dev-key"),
            ..Self::default()
        }
    }

    pub fn is_allowed_key(&self, key: &str) -> bool {
        self.allowed_keys.contains(key)
    }
}

fn default_key_path() -> PathBuf {
    env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/root"))
        .join(".ssh")
        .join("id_ed25519")
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes")
}

fn parse_key_list(value: &str) -> HashSet<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.sftp_host, "upload.media.ccc.de");
        assert_eq!(config.sftp_user, "cdn-app");
        assert_eq!(config.catalog_url, "https://media.ccc.de");
        assert!(config.allowed_keys.is_empty());
        assert!(!config.is_allowed_key(""));
    }

    #[test]
    fn test_development_config() {
        let config = GatewayConfig::development();
        assert_eq!(config.catalog_url, "https://media.test.c3voc.de");
        assert!(config.is_allowed_key("dev-key"));
    }

    #[test]
    fn test_parse_key_list() {
        let keys = parse_key_list(" alpha, beta ,,gamma ");
        assert_eq!(keys.len(), 3);
        assert!(keys.contains("beta"));
        assert!(parse_key_list("").is_empty());
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag("1"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag("0"));
    }
}
