use std::path::PathBuf;

use thiserror::Error;

use crate::bencode::BencodeError;

/// Errors raised while reading, interpreting or writing torrent metadata.
#[derive(Debug, Error)]
pub enum MetainfoError {
    #[error("invalid bencoding: {0}")]
    Bencode(#[from] BencodeError),

    #[error("torrent root is not a dictionary")]
    NotADictionary,

    #[error("torrent has no info dictionary")]
    MissingInfo,

    #[error("invalid info hash: {0}")]
    InvalidInfoHash(String),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
