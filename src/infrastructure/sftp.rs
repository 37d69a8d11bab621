use crate::services::content_store::{ArtifactWriter, ContentStore, ListingEntry, join_path};
use crate::services::error::TransferError;
use async_trait::async_trait;
use russh::client;
use russh_keys::key;
use russh_sftp::client::SftpSession;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::AsyncWrite;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct SftpSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub key_path: PathBuf,
    pub strict_host_keys: bool,
    pub connect_timeout: Duration,
}

/// File operations on an established remote session.
#[async_trait]
pub trait RemoteFs: Send + Sync + 'static {
    async fn create_dir(&self, path: &str) -> Result<(), TransferError>;
    async fn try_exists(&self, path: &str) -> Result<bool, TransferError>;
    /// Opens `path` for writing, truncating it.
    async fn create(&self, path: &str) -> Result<ArtifactWriter, TransferError>;
    async fn read_dir(&self, dir: &str) -> Result<Vec<ListingEntry>, TransferError>;
    async fn rename(&self, from: &str, to: &str) -> Result<(), TransferError>;
    async fn remove_file(&self, path: &str) -> Result<(), TransferError>;
    /// `true` once the underlying transport has gone away.
    fn is_closed(&self) -> bool;
}

/// Establishes remote sessions for [`SftpContentStore`].
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Session: RemoteFs;

    fn host(&self) -> &str;

    fn timeout(&self) -> Duration;

    async fn connect(&self) -> Result<Self::Session, TransferError>;
}

/// Accepts servers listed in `~/.ssh/known_hosts`; unknown hosts are
/// accepted unless strict, changed keys never are.
struct KnownHostsVerifier {
    host: String,
    port: u16,
    strict: bool,
}

#[async_trait]
impl client::Handler for KnownHostsVerifier {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &key::PublicKey,
    ) -> Result<bool, Self::Error> {
        match russh_keys::check_known_hosts(&self.host, self.port, server_public_key) {
            Ok(true) => Ok(true),
            Ok(false) if !self.strict => {
                warn!(
                    "Host key for {}:{} is not in known_hosts, accepting it",
                    self.host, self.port
                );
                Ok(true)
            }
            Ok(false) => {
                error!("Host key for {}:{} is unknown, refusing", self.host, self.port);
                Ok(false)
            }
            Err(e) => {
                error!("Host key check for {} failed: {}", self.host, e);
                Ok(false)
            }
        }
    }
}

/// SSH session carrying an SFTP channel; the handle must outlive the channel.
pub struct SshSession {
    ssh: client::Handle<KnownHostsVerifier>,
    sftp: SftpSession,
}

fn io_error(path: &str, e: impl std::fmt::Display) -> TransferError {
    TransferError::Io {
        path: path.to_string(),
        message: e.to_string(),
    }
}

#[async_trait]
impl RemoteFs for SshSession {
    async fn create_dir(&self, path: &str) -> Result<(), TransferError> {
        self.sftp.create_dir(path).await.map_err(|e| io_error(path, e))
    }

    async fn try_exists(&self, path: &str) -> Result<bool, TransferError> {
        self.sftp.try_exists(path).await.map_err(|e| io_error(path, e))
    }

    async fn create(&self, path: &str) -> Result<ArtifactWriter, TransferError> {
        let file = self.sftp.create(path).await.map_err(|e| io_error(path, e))?;
        Ok(Box::pin(file))
    }

    async fn read_dir(&self, dir: &str) -> Result<Vec<ListingEntry>, TransferError> {
        let entries = self.sftp.read_dir(dir).await.map_err(|e| io_error(dir, e))?;
        Ok(entries
            .filter(|entry| !matches!(entry.file_name().as_str(), "." | ".."))
            .map(|entry| {
                let name = entry.file_name();
                let metadata = entry.metadata();
                ListingEntry {
                    path: join_path(dir, &name),
                    size: metadata.size.unwrap_or(0),
                    is_dir: metadata.is_dir(),
                    modified: metadata.mtime,
                    name,
                }
            })
            .collect())
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), TransferError> {
        self.sftp.rename(from, to).await.map_err(|e| io_error(to, e))
    }

    async fn remove_file(&self, path: &str) -> Result<(), TransferError> {
        self.sftp.remove_file(path).await.map_err(|e| io_error(path, e))
    }

    fn is_closed(&self) -> bool {
        self.ssh.is_closed()
    }
}

/// Connects with public key authentication and opens the `sftp` subsystem.
pub struct SshConnector {
    settings: SftpSettings,
}

impl SshConnector {
    fn connect_error(&self, message: impl Into<String>) -> TransferError {
        TransferError::Connect {
            host: self.settings.host.clone(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl Connector for SshConnector {
    type Session = SshSession;

    fn host(&self) -> &str {
        &self.settings.host
    }

    fn timeout(&self) -> Duration {
        self.settings.connect_timeout
    }

    async fn connect(&self) -> Result<SshSession, TransferError> {
        let SftpSettings {
            host, port, user, ..
        } = &self.settings;
        info!("Establishing SFTP connection to {}@{}:{}", user, host, port);

        // Keepalives stop the server and the inactivity timer from dropping an idle session
        let config = Arc::new(client::Config {
            keepalive_interval: Some(Duration::from_secs(30)),
            keepalive_max: 3,
            ..Default::default()
        });
        let verifier = KnownHostsVerifier {
            host: host.clone(),
            port: *port,
            strict: self.settings.strict_host_keys,
        };

        let mut ssh = client::connect(config, (host.as_str(), *port), verifier)
            .await
            .map_err(|e| self.connect_error(format!("SSH negotiation failed: {e}")))?;

        let key_pair = russh_keys::load_secret_key(&self.settings.key_path, None).map_err(|e| {
            self.connect_error(format!(
                "could not load key {}: {e}",
                self.settings.key_path.display()
            ))
        })?;
        let authenticated = ssh
            .authenticate_publickey(user.as_str(), Arc::new(key_pair))
            .await
            .map_err(|e| self.connect_error(format!("authentication failed: {e}")))?;
        if !authenticated {
            return Err(TransferError::Authentication { user: user.clone() });
        }

        let channel = ssh
            .channel_open_session()
            .await
            .map_err(|e| self.connect_error(e.to_string()))?;
        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| self.connect_error(e.to_string()))?;
        let sftp = SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| self.connect_error(format!("SFTP subsystem unavailable: {e}")))?;

        info!("SFTP connection established to {}", host);
        Ok(SshSession { ssh, sftp })
    }
}

/// Remote file that keeps its session alive until dropped.
struct RemoteFile<S> {
    file: ArtifactWriter,
    _session: Arc<S>,
}

impl<S> AsyncWrite for RemoteFile<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.file.as_mut().poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.file.as_mut().poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.file.as_mut().poll_shutdown(cx)
    }
}

/// Content store reached over SFTP.
///
/// The session is opened on first use and shared by all callers; the
/// mutex makes concurrent first use wait for a single establishment. A
/// session whose transport has closed is replaced on the next call.
pub struct SftpContentStore<C: Connector = SshConnector> {
    connector: C,
    session: Mutex<Option<Arc<C::Session>>>,
}

impl SftpContentStore<SshConnector> {
    pub fn new(settings: SftpSettings) -> Self {
        Self::with_connector(SshConnector { settings })
    }
}

impl<C: Connector> SftpContentStore<C> {
    pub fn with_connector(connector: C) -> Self {
        Self {
            connector,
            session: Mutex::new(None),
        }
    }

    async fn session(&self) -> Result<Arc<C::Session>, TransferError> {
        let mut slot = self.session.lock().await;
        if let Some(session) = slot.as_ref() {
            if !session.is_closed() {
                return Ok(session.clone());
            }
            warn!("SFTP connection to {} was closed, reconnecting", self.connector.host());
            *slot = None;
        }

        let session = tokio::time::timeout(self.connector.timeout(), self.connector.connect())
            .await
            .map_err(|_| TransferError::Connect {
                host: self.connector.host().to_string(),
                message: "connection timed out".to_string(),
            })??;
        let session = Arc::new(session);
        *slot = Some(session.clone());
        Ok(session)
    }
}

#[async_trait]
impl<C: Connector> ContentStore for SftpContentStore<C> {
    async fn ensure_dir(&self, dir: &str) -> Result<(), TransferError> {
        let session = self.session().await?;
        let absolute = dir.starts_with('/');

        let mut current = String::new();
        for segment in dir.split('/').filter(|s| !s.is_empty()) {
            current = if current.is_empty() && !absolute {
                segment.to_string()
            } else {
                join_path(&current, segment)
            };
            if let Err(e) = session.create_dir(&current).await {
                // mkdir fails for existing directories; only a missing one is fatal
                if !session.try_exists(&current).await? {
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    async fn open_write(&self, path: &str) -> Result<ArtifactWriter, TransferError> {
        let session = self.session().await?;
        let file = session.create(path).await?;
        Ok(Box::pin(RemoteFile {
            file,
            _session: session,
        }))
    }

    async fn list_dir(&self, dir: &str) -> Result<Vec<ListingEntry>, TransferError> {
        let mut listing = self.session().await?.read_dir(dir).await?;
        listing.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(listing)
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), TransferError> {
        let session = self.session().await?;
        if let Err(e) = session.rename(from, to).await {
            // SFTPv3 servers refuse to rename over an existing file
            if !session.try_exists(to).await? {
                return Err(e);
            }
            session.remove_file(to).await?;
            session.rename(from, to).await?;
        }
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<(), TransferError> {
        self.session().await?.remove_file(path).await
    }

    async fn health_check(&self) -> bool {
        self.session().await.is_ok()
    }

    async fn invalidate(&self) {
        if self.session.lock().await.take().is_some() {
            warn!("Dropping SFTP connection to {}", self.connector.host());
        }
    }
}
