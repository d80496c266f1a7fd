use std::fmt;
use std::str::FromStr;

use sha1::{Digest, Sha1};

use super::error::MetainfoError;

/// SHA-1 digest of a bencoded info dictionary.
///
/// Displays as 40 uppercase hex characters, the form tracker APIs expect.
/// Torrent clients key their torrents by the lowercase form.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InfoHash([u8; 20]);

impl InfoHash {
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Hashes already-encoded info dictionary bytes.
    pub fn digest(encoded_info: &[u8]) -> Self {
        Self(Sha1::digest(encoded_info).into())
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn to_lowercase_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(self.0))
    }
}

impl fmt::Debug for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InfoHash({})", self)
    }
}

impl FromStr for InfoHash {
    type Err = MetainfoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != 40 {
            return Err(MetainfoError::InvalidInfoHash(s.to_string()));
        }

        let mut bytes = [0u8; 20];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|_| MetainfoError::InvalidInfoHash(s.to_string()))?;
        Ok(Self(bytes))
    }
}
