//! Torrent client abstraction.
//!
//! Injection hands a regenerated torrent to a running client so it seeds
//! from the data the source torrent already downloaded. Both backends share
//! the session contract in [`session`].

mod credentials;
mod deluge;
mod naming;
mod qbittorrent;
pub mod session;
mod types;

pub use credentials::ClientUrl;
pub use deluge::{DelugeCall, DelugeClient, DelugeSession};
pub use naming::{determine_label, injected_file_name, INJECTED_FILE_SUFFIX};
pub use qbittorrent::{QBittorrentClient, QbitCall, QbitSession};
pub use types::*;

use std::path::Path;
use std::sync::Arc;

use crate::config::{InjectionConfig, TorrentClientBackend};
use crate::metainfo::{InfoHash, TorrentMetadata};

/// Builds the configured backend. Does not contact it; call `setup` for that.
pub fn create_torrent_client(
    config: &InjectionConfig,
) -> Result<Arc<dyn TorrentClient>, TorrentClientError> {
    match config.client {
        TorrentClientBackend::Deluge => Ok(Arc::new(DelugeClient::new(config)?)),
        TorrentClientBackend::Qbittorrent => Ok(Arc::new(QBittorrentClient::new(config)?)),
    }
}

/// Reads a torrent file and computes its infohash locally.
pub(crate) async fn read_torrent_file(
    path: &Path,
) -> Result<(Vec<u8>, InfoHash), TorrentClientError> {
    let data = tokio::fs::read(path).await.map_err(|e| {
        TorrentClientError::InvalidTorrent(format!("failed to read {}: {}", path.display(), e))
    })?;
    let hash = TorrentMetadata::from_bytes(&data)
        .and_then(|meta| meta.info_hash())
        .map_err(|e| TorrentClientError::InvalidTorrent(format!("{}: {}", path.display(), e)))?;
    Ok((data, hash))
}
