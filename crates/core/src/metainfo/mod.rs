//! Torrent metadata: infohashes, source flags and the fields the
//! regeneration engine rewrites.

mod error;
mod info_hash;
mod torrent;

pub use error::MetainfoError;
pub use info_hash::InfoHash;
pub use torrent::{SourceFlag, TorrentMetadata};

use std::path::{Path, PathBuf};

/// Path of the fast-resume sidecar qBittorrent keeps next to a torrent in
/// its `BT_backup` directory.
pub fn fastresume_path(torrent_path: &Path) -> PathBuf {
    torrent_path.with_extension("fastresume")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fastresume_path() {
        assert_eq!(
            fastresume_path(Path::new("/bt/ABCDEF.torrent")),
            PathBuf::from("/bt/ABCDEF.fastresume")
        );
    }
}
