use std::fmt;

use reqwest::Url;

use super::TorrentClientError;

/// A client URL split into the credential-free endpoint and its embedded
/// username and password.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientUrl {
    pub endpoint: String,
    pub username: String,
    pub password: String,
}

impl ClientUrl {
    /// Parses `url`. With `base_path` the endpoint is the origin joined with
    /// it, otherwise the origin plus the URL's own path.
    pub fn parse(url: &str, base_path: Option<&str>) -> Result<Self, TorrentClientError> {
        let parsed = Url::parse(url)
            .map_err(|e| TorrentClientError::Internal(format!("invalid client URL: {}", e)))?;

        let origin = parsed.origin().ascii_serialization();
        let path = base_path.unwrap_or_else(|| parsed.path());
        let path = path.trim_end_matches('/');
        let endpoint = if path.is_empty() {
            origin
        } else if path.starts_with('/') {
            format!("{}{}", origin, path)
        } else {
            format!("{}/{}", origin, path)
        };

        Ok(Self {
            endpoint,
            username: decode(parsed.username())?,
            password: decode(parsed.password().unwrap_or(""))?,
        })
    }

    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

impl fmt::Debug for ClientUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientUrl")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn decode(component: &str) -> Result<String, TorrentClientError> {
    urlencoding::decode(component)
        .map(|s| s.into_owned())
        .map_err(|e| TorrentClientError::Internal(format!("invalid client URL credentials: {}", e)))
}
