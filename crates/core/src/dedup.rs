//! Content-addressed index of existing torrent files.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::metainfo::{InfoHash, TorrentMetadata};

/// Infohash → path of every decodable `.torrent` under a directory.
///
/// Built once per scan and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct DedupIndex {
    entries: HashMap<InfoHash, PathBuf>,
}

impl DedupIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Indexes every `.torrent` file below `dir`. Files that fail to decode
    /// are skipped.
    pub async fn scan_dir(dir: &Path) -> std::io::Result<Self> {
        let mut entries = HashMap::new();

        for path in torrent_files(dir).await? {
            let hash = match TorrentMetadata::read(&path)
                .await
                .and_then(|meta| meta.info_hash())
            {
                Ok(hash) => hash,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Skipping undecodable torrent");
                    continue;
                }
            };
            entries.entry(hash).or_insert(path);
        }

        debug!(dir = %dir.display(), count = entries.len(), "Built dedup index");
        Ok(Self { entries })
    }

    pub fn get(&self, hash: &InfoHash) -> Option<&Path> {
        self.entries.get(hash).map(PathBuf::as_path)
    }

    pub fn contains(&self, hash: &InfoHash) -> bool {
        self.entries.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(InfoHash, PathBuf)> for DedupIndex {
    fn from_iter<I: IntoIterator<Item = (InfoHash, PathBuf)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Every `.torrent` file below `dir`, recursively, in sorted path order.
pub async fn torrent_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&current).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_type = entry.file_type().await?;

            if file_type.is_dir() {
                pending.push(path);
            } else if is_torrent_file(&path) {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

fn is_torrent_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("torrent"))
}
