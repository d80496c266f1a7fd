//! Test doubles and fixtures for the engine and injection layers.
//!
//! # Example
//!
//! ```rust,ignore
//! use crosstag_core::testing::{fixtures, MockTrackerLookup};
//! use crosstag_core::tracker::Tracker;
//!
//! let ops = MockTrackerLookup::new(Tracker::Ops);
//! let source = fixtures::torrent("Album", Some("RED"), None);
//! let candidate = source.with_source_flag(Tracker::Ops.creation_flags()[0])?;
//! ops.set_found(candidate.info_hash()?, 123, "Album").await;
//! ```

mod mock_torrent_client;
mod mock_tracker_lookup;

pub use mock_torrent_client::{MockTorrentClient, RecordedInjection};
pub use mock_tracker_lookup::MockTrackerLookup;

/// Synthetic `.torrent` builders.
pub mod fixtures {
    use std::path::{Path, PathBuf};

    use crate::bencode::{Dict, Value};
    use crate::metainfo::{InfoHash, TorrentMetadata};

    /// A single-file torrent named `name`. Different names give different
    /// infohashes.
    pub fn torrent(name: &str, source: Option<&str>, announce: Option<&str>) -> TorrentMetadata {
        let mut info = Dict::new();
        info.insert("length", Value::Integer(1024 * 1024));
        info.insert("name", Value::string(name));
        info.insert("piece length", Value::Integer(262_144));
        info.insert(
            "pieces",
            Value::Bytes(InfoHash::digest(name.as_bytes()).as_bytes().to_vec()),
        );
        if let Some(source) = source {
            info.insert("source", Value::string(source));
        }

        let mut root = Dict::new();
        if let Some(announce) = announce {
            root.insert("announce", Value::string(announce));
        }
        root.insert("created by", Value::string("crosstag-tests"));
        root.insert("info", Value::Dict(info));
        TorrentMetadata::from_dict(root)
    }

    /// A fast-resume sidecar listing `trackers` as one tier each.
    pub fn fastresume(trackers: &[&str]) -> TorrentMetadata {
        let tiers = trackers
            .iter()
            .map(|url| Value::List(vec![Value::string(url)]))
            .collect();

        let mut root = Dict::new();
        root.insert("trackers", Value::List(tiers));
        TorrentMetadata::from_dict(root)
    }

    /// Writes `meta` to `dir/file_name`, creating `dir` if needed.
    pub async fn write_torrent(dir: &Path, file_name: &str, meta: &TorrentMetadata) -> PathBuf {
        let path = dir.join(file_name);
        meta.write(&path).await.expect("failed to write fixture torrent");
        path
    }
}
