//! Types for torrent client operations.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::metainfo::InfoHash;

/// Errors that can occur during torrent client operations.
#[derive(Debug, Error)]
pub enum TorrentClientError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Torrent not found in client: {0}")]
    TorrentNotFound(String),

    #[error("Torrent is not complete: {0}")]
    NotComplete(String),

    #[error("New torrent already exists in client: {0}")]
    TorrentExistsInClient(String),

    #[error("Invalid torrent data: {0}")]
    InvalidTorrent(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TorrentClientError {
    /// Maps a transport-level reqwest failure.
    pub(crate) fn transport(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TorrentClientError::Timeout
        } else if e.is_connect() {
            TorrentClientError::ConnectionFailed(e.to_string())
        } else {
            TorrentClientError::ApiError(e.to_string())
        }
    }
}

/// What the client knows about a torrent it already has.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientTorrentInfo {
    /// Content is fully present on disk.
    pub complete: bool,
    /// Label (Deluge) or category (qBittorrent); `None` when unset.
    pub label: Option<String>,
    pub save_path: String,
}

/// Request to seed a regenerated torrent from an existing torrent's data.
#[derive(Debug, Clone)]
pub struct InjectRequest {
    /// Infohash of the torrent whose content is already downloaded.
    pub source_info_hash: InfoHash,
    /// The regenerated `.torrent` file.
    pub torrent_path: PathBuf,
    /// The tool's own label, combined with the source torrent's label.
    pub label: String,
    /// Save path to use instead of the source torrent's.
    pub save_path_override: Option<String>,
}

/// Trait for torrent client backends.
#[async_trait]
pub trait TorrentClient: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Authenticate and discover optional capabilities.
    async fn setup(&self) -> Result<(), TorrentClientError>;

    /// Look up a torrent by infohash.
    async fn get_torrent_info(
        &self,
        info_hash: &InfoHash,
    ) -> Result<ClientTorrentInfo, TorrentClientError>;

    /// Add the regenerated torrent in seed mode next to the source's data.
    /// Returns the infohash of the added torrent.
    async fn inject_torrent(&self, request: &InjectRequest)
        -> Result<InfoHash, TorrentClientError>;
}
