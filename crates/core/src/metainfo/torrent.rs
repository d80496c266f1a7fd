use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::bencode::{self, Dict, Value};

use super::error::MetainfoError;
use super::info_hash::InfoHash;

/// A tracker-specific tag stored in `info.source`.
///
/// The blank flag writes an empty `source`, which still hashes differently
/// from a torrent that has no `source` key at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceFlag(&'static str);

impl SourceFlag {
    pub const BLANK: SourceFlag = SourceFlag("");

    pub const fn new(flag: &'static str) -> Self {
        Self(flag)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }

    pub fn as_bytes(&self) -> &'static [u8] {
        self.0.as_bytes()
    }

    pub fn is_blank(&self) -> bool {
        self.0.is_empty()
    }
}

/// Sibling of `path` used while writing. Its extension keeps it out of
/// `.torrent` directory scans.
fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

impl fmt::Display for SourceFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// A decoded `.torrent` (or fast-resume) file.
///
/// The root dictionary keeps its decoded key order, so an unmodified file
/// re-encodes to exactly the bytes it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorrentMetadata {
    root: Dict,
}

impl TorrentMetadata {
    pub fn from_bytes(data: &[u8]) -> Result<Self, MetainfoError> {
        match bencode::decode(data)? {
            Value::Dict(root) => Ok(Self { root }),
            _ => Err(MetainfoError::NotADictionary),
        }
    }

    pub fn from_dict(root: Dict) -> Self {
        Self { root }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        bencode::encode(&Value::Dict(self.root.clone()))
    }

    pub async fn read(path: &Path) -> Result<Self, MetainfoError> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|source| MetainfoError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_bytes(&data)
    }

    /// Writes the encoded file, creating parent directories as needed.
    pub async fn write(&self, path: &Path) -> Result<(), MetainfoError> {
        let write_err = |source| MetainfoError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        // Readers never see a partial file at `path`.
        let partial = partial_path(path);
        if let Err(e) = tokio::fs::write(&partial, self.to_bytes()).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(write_err(e));
        }
        if let Err(e) = tokio::fs::rename(&partial, path).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(write_err(e));
        }
        Ok(())
    }

    pub fn root(&self) -> &Dict {
        &self.root
    }

    pub fn info(&self) -> Option<&Dict> {
        self.root.get(b"info").and_then(Value::as_dict)
    }

    pub fn info_hash(&self) -> Result<InfoHash, MetainfoError> {
        let info = self.root.get(b"info").ok_or(MetainfoError::MissingInfo)?;
        if info.as_dict().is_none() {
            return Err(MetainfoError::MissingInfo);
        }
        Ok(InfoHash::digest(&bencode::encode(info)))
    }

    /// Returns a copy with `info.source` set to `flag`. `self` is left
    /// untouched.
    pub fn with_source_flag(&self, flag: SourceFlag) -> Result<Self, MetainfoError> {
        let mut copy = self.clone();
        let info = copy
            .root
            .get_mut(b"info")
            .and_then(Value::as_dict_mut)
            .ok_or(MetainfoError::MissingInfo)?;

        info.insert("source", Value::Bytes(flag.as_bytes().to_vec()));
        Ok(copy)
    }

    pub fn source(&self) -> Option<&[u8]> {
        self.info()?.get(b"source").and_then(Value::as_bytes)
    }

    pub fn name(&self) -> Option<&str> {
        self.info()?.get(b"name").and_then(Value::as_str)
    }

    pub fn comment(&self) -> Option<&str> {
        self.root.get(b"comment").and_then(Value::as_str)
    }

    pub fn announce(&self) -> Option<&str> {
        self.root.get(b"announce").and_then(Value::as_str)
    }

    /// Every tracker URL the file mentions: `announce`, then the flattened
    /// `announce-list`, then the flattened `trackers` list that fast-resume
    /// files carry instead of `announce`.
    pub fn announce_urls(&self) -> Vec<&[u8]> {
        const URL_KEYS: [&[u8]; 3] = [b"announce", b"announce-list", b"trackers"];

        let mut urls = Vec::new();
        for key in URL_KEYS {
            if let Some(value) = self.root.get(key) {
                flatten_bytes(value, &mut urls);
            }
        }
        urls
    }

    pub fn set_announce(&mut self, url: &str) {
        self.root.insert("announce", Value::string(url));
    }

    pub fn set_comment(&mut self, comment: &str) {
        self.root.insert("comment", Value::string(comment));
    }

    pub fn clear_announce_list(&mut self) {
        self.root.remove(b"announce-list");
    }
}

fn flatten_bytes<'a>(value: &'a Value, out: &mut Vec<&'a [u8]>) {
    match value {
        Value::Bytes(bytes) => out.push(bytes),
        Value::List(items) => {
            for item in items {
                flatten_bytes(item, out);
            }
        }
        _ => {}
    }
}
