//! Tracker lookup collaborators.
//!
//! The regeneration engine only sees the [`TrackerLookup`] trait and the
//! three-way [`LookupResult`]. How a tracker's error responses map onto
//! "wrong hash" versus "something else went wrong" is decided by each
//! implementation.

mod gazelle;
mod html;
mod rate_limiter;

pub use gazelle::GazelleClient;
pub use html::html_unescape;
pub use rate_limiter::{RateLimiter, TokenBucket};

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::metainfo::InfoHash;
use crate::tracker::Tracker;

/// Outcome of looking up an infohash on a tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum LookupResult {
    /// The tracker hosts a torrent with this infohash.
    Found { torrent_id: u64, file_path: String },
    /// No torrent with this infohash. The next source flag may still match.
    NotFoundForHash { reason: String },
    /// Any other failure. Aborts the current regeneration.
    Other { message: String },
}

/// Errors raised while setting up a tracker API client.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("{tracker} API request failed: {message}")]
    Request { tracker: Tracker, message: String },

    #[error("{tracker} rejected the API key: {message}")]
    Unauthorized { tracker: Tracker, message: String },

    #[error("unexpected {tracker} API response: {message}")]
    InvalidResponse { tracker: Tracker, message: String },
}

/// Looks up torrents on one tracker by infohash.
#[async_trait]
pub trait TrackerLookup: Send + Sync {
    fn tracker(&self) -> Tracker;

    /// The user's personal announce URL on this tracker.
    fn announce_url(&self) -> &str;

    /// Base site URL, used to build torrent permalinks.
    fn site_url(&self) -> &str;

    async fn find(&self, info_hash: &InfoHash) -> LookupResult;
}

/// One lookup collaborator per tracker.
#[derive(Clone)]
pub struct TrackerLookups {
    red: Arc<dyn TrackerLookup>,
    ops: Arc<dyn TrackerLookup>,
}

impl TrackerLookups {
    pub fn new(red: Arc<dyn TrackerLookup>, ops: Arc<dyn TrackerLookup>) -> Self {
        Self { red, ops }
    }

    pub fn for_tracker(&self, tracker: Tracker) -> &dyn TrackerLookup {
        match tracker {
            Tracker::Red => self.red.as_ref(),
            Tracker::Ops => self.ops.as_ref(),
        }
    }
}

impl std::fmt::Debug for TrackerLookups {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerLookups")
            .field("red", &self.red.site_url())
            .field("ops", &self.ops.site_url())
            .finish()
    }
}

/// Permalink of a torrent on a Gazelle site.
pub fn torrent_permalink(site_url: &str, torrent_id: u64) -> String {
    format!(
        "{}/torrents.php?torrentid={}",
        site_url.trim_end_matches('/'),
        torrent_id
    )
}
