//! Mock torrent client for testing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::metainfo::InfoHash;
use crate::torrent_client::{
    determine_label, read_torrent_file, ClientTorrentInfo, InjectRequest, TorrentClient,
    TorrentClientError,
};

/// A recorded injection for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedInjection {
    pub request: InjectRequest,
    /// Infohash computed from the injected file.
    pub info_hash: InfoHash,
    /// Label the torrent was given.
    pub label: String,
    pub save_path: String,
    pub timestamp: DateTime<Utc>,
}

/// Mock implementation of the TorrentClient trait.
///
/// Holds an in-memory torrent table and applies the same completeness,
/// duplicate and label rules as the real backends.
///
/// # Example
///
/// ```rust,ignore
/// let client = MockTorrentClient::new();
/// client.add_mock_torrent(source_hash, ClientTorrentInfo { complete: true, .. }).await;
///
/// client.inject_torrent(&request).await?;
/// assert_eq!(client.injected_torrents().await.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MockTorrentClient {
    torrents: Arc<RwLock<HashMap<InfoHash, ClientTorrentInfo>>>,
    injected: Arc<RwLock<Vec<RecordedInjection>>>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<RwLock<Option<TorrentClientError>>>,
    setup_calls: Arc<RwLock<u32>>,
}

impl MockTorrentClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a torrent.
    pub async fn add_mock_torrent(&self, info_hash: InfoHash, info: ClientTorrentInfo) {
        self.torrents.write().await.insert(info_hash, info);
    }

    /// A complete torrent seeded from `save_path`.
    pub async fn add_complete_torrent(&self, info_hash: InfoHash, label: Option<&str>, save_path: &str) {
        self.add_mock_torrent(
            info_hash,
            ClientTorrentInfo {
                complete: true,
                label: label.map(str::to_string),
                save_path: save_path.to_string(),
            },
        )
        .await;
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: TorrentClientError) {
        *self.next_error.write().await = Some(error);
    }

    pub async fn injected_torrents(&self) -> Vec<RecordedInjection> {
        self.injected.read().await.clone()
    }

    pub async fn has_torrent(&self, info_hash: &InfoHash) -> bool {
        self.torrents.read().await.contains_key(info_hash)
    }

    pub async fn torrent_count(&self) -> usize {
        self.torrents.read().await.len()
    }

    pub async fn setup_calls(&self) -> u32 {
        *self.setup_calls.read().await
    }

    async fn take_error(&self) -> Option<TorrentClientError> {
        self.next_error.write().await.take()
    }
}

#[async_trait]
impl TorrentClient for MockTorrentClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn setup(&self) -> Result<(), TorrentClientError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        *self.setup_calls.write().await += 1;
        Ok(())
    }

    async fn get_torrent_info(
        &self,
        info_hash: &InfoHash,
    ) -> Result<ClientTorrentInfo, TorrentClientError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        self.torrents
            .read()
            .await
            .get(info_hash)
            .cloned()
            .ok_or_else(|| TorrentClientError::TorrentNotFound(info_hash.to_lowercase_hex()))
    }

    async fn inject_torrent(&self, request: &InjectRequest) -> Result<InfoHash, TorrentClientError> {
        let source = self.get_torrent_info(&request.source_info_hash).await?;
        if !source.complete {
            return Err(TorrentClientError::NotComplete(
                request.source_info_hash.to_string(),
            ));
        }

        let (_, info_hash) = read_torrent_file(&request.torrent_path).await?;
        if self.has_torrent(&info_hash).await {
            return Err(TorrentClientError::TorrentExistsInClient(
                info_hash.to_lowercase_hex(),
            ));
        }

        let label = determine_label(source.label.as_deref(), &request.label);
        let save_path = request
            .save_path_override
            .clone()
            .unwrap_or(source.save_path);

        self.add_mock_torrent(
            info_hash,
            ClientTorrentInfo {
                complete: true,
                label: Some(label.clone()),
                save_path: save_path.clone(),
            },
        )
        .await;
        self.injected.write().await.push(RecordedInjection {
            request: request.clone(),
            info_hash,
            label,
            save_path,
            timestamp: Utc::now(),
        });

        Ok(info_hash)
    }
}
