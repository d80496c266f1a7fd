//! Mock tracker lookup for testing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::metainfo::InfoHash;
use crate::tracker::Tracker;
use crate::tracker_api::{LookupResult, TrackerLookup};

/// Mock implementation of the TrackerLookup trait.
///
/// Answers from scripted per-hash results and records every lookup.
/// Hashes without a scripted result are reported as `NotFoundForHash`.
#[derive(Debug)]
pub struct MockTrackerLookup {
    tracker: Tracker,
    announce_url: String,
    site_url: String,
    results: Arc<RwLock<HashMap<InfoHash, LookupResult>>>,
    /// If set, every lookup without a scripted result returns this.
    fallback: Arc<RwLock<Option<LookupResult>>>,
    calls: Arc<RwLock<Vec<InfoHash>>>,
}

impl MockTrackerLookup {
    pub fn new(tracker: Tracker) -> Self {
        Self {
            tracker,
            announce_url: tracker.announce_url("mockpasskey"),
            site_url: tracker.default_site_url().to_string(),
            results: Arc::new(RwLock::new(HashMap::new())),
            fallback: Arc::new(RwLock::new(None)),
            calls: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Script the result for one infohash.
    pub async fn set_result(&self, info_hash: InfoHash, result: LookupResult) {
        self.results.write().await.insert(info_hash, result);
    }

    /// Script a `Found` result for one infohash.
    pub async fn set_found(&self, info_hash: InfoHash, torrent_id: u64, file_path: &str) {
        self.set_result(
            info_hash,
            LookupResult::Found {
                torrent_id,
                file_path: file_path.to_string(),
            },
        )
        .await;
    }

    /// Result for every infohash without a scripted one.
    pub async fn set_fallback(&self, result: LookupResult) {
        *self.fallback.write().await = Some(result);
    }

    /// Infohashes looked up so far, in order.
    pub async fn calls(&self) -> Vec<InfoHash> {
        self.calls.read().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }
}

#[async_trait]
impl TrackerLookup for MockTrackerLookup {
    fn tracker(&self) -> Tracker {
        self.tracker
    }

    fn announce_url(&self) -> &str {
        &self.announce_url
    }

    fn site_url(&self) -> &str {
        &self.site_url
    }

    async fn find(&self, info_hash: &InfoHash) -> LookupResult {
        self.calls.write().await.push(*info_hash);

        if let Some(result) = self.results.read().await.get(info_hash) {
            return result.clone();
        }
        if let Some(result) = self.fallback.read().await.as_ref() {
            return result.clone();
        }
        LookupResult::NotFoundForHash {
            reason: "bad hash parameter".to_string(),
        }
    }
}
