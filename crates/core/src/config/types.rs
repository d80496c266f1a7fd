use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::tracker::Tracker;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub red: TrackerApiConfig,
    pub ops: TrackerApiConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub injection: Option<InjectionConfig>,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    pub fn tracker(&self, tracker: Tracker) -> &TrackerApiConfig {
        match tracker {
            Tracker::Red => &self.red,
            Tracker::Ops => &self.ops,
        }
    }
}

/// Tracker API configuration (one per tracker)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackerApiConfig {
    pub api_key: String,
    /// Site URL (defaults to the tracker's public site)
    #[serde(default)]
    pub site_url: Option<String>,
    /// Request timeout in seconds (default: 15)
    #[serde(default = "default_tracker_timeout")]
    pub timeout_secs: u64,
    /// Retries for transport errors, 5xx and 429 (default: 5)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Requests allowed per window (default: RED 10, OPS 5)
    #[serde(default)]
    pub rate_limit_requests: Option<u32>,
    /// Rate limit window in seconds (default: 10)
    #[serde(default)]
    pub rate_limit_window_secs: Option<u64>,
}

impl TrackerApiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            site_url: None,
            timeout_secs: default_tracker_timeout(),
            max_retries: default_max_retries(),
            rate_limit_requests: None,
            rate_limit_window_secs: None,
        }
    }

    pub fn site_url_for(&self, tracker: Tracker) -> &str {
        self.site_url
            .as_deref()
            .unwrap_or_else(|| tracker.default_site_url())
    }

    pub fn rate_limit_for(&self, tracker: Tracker) -> (u32, Duration) {
        let default_requests = match tracker {
            Tracker::Red => 10,
            Tracker::Ops => 5,
        };
        (
            self.rate_limit_requests.unwrap_or(default_requests),
            Duration::from_secs(self.rate_limit_window_secs.unwrap_or(10)),
        )
    }
}

fn default_tracker_timeout() -> u64 {
    15
}

fn default_max_retries() -> u32 {
    5
}

/// Input/output locations
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsConfig {
    /// Directory of source torrents (directory scans and the webhook)
    #[serde(default)]
    pub input_directory: Option<PathBuf>,
    #[serde(default = "default_output_directory")]
    pub output_directory: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input_directory: None,
            output_directory: default_output_directory(),
        }
    }
}

fn default_output_directory() -> PathBuf {
    PathBuf::from("./output")
}

/// Available torrent clients for injection
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TorrentClientBackend {
    Deluge,
    #[serde(alias = "qbit")]
    Qbittorrent,
}

impl TorrentClientBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            TorrentClientBackend::Deluge => "deluge",
            TorrentClientBackend::Qbittorrent => "qbittorrent",
        }
    }
}

/// Torrent client injection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InjectionConfig {
    pub client: TorrentClientBackend,
    /// Client URL with embedded credentials, e.g. `http://:pass@localhost:8112/json`
    pub url: String,
    /// Label/category given to injected torrents (default: "crosstag")
    #[serde(default = "default_label")]
    pub label: String,
    #[serde(default)]
    pub save_path_override: Option<String>,
    /// Request timeout in seconds (default: 10)
    #[serde(default = "default_client_timeout")]
    pub timeout_secs: u64,
    /// Also inject torrents that were already in the output directory
    #[serde(default)]
    pub inject_existing: bool,
}

impl InjectionConfig {
    pub fn new(client: TorrentClientBackend, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            label: default_label(),
            save_path_override: None,
            timeout_secs: default_client_timeout(),
            inject_existing: false,
        }
    }
}

fn default_label() -> String {
    "crosstag".to_string()
}

fn default_client_timeout() -> u64 {
    10
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    9713
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub red: SanitizedTrackerConfig,
    pub ops: SanitizedTrackerConfig,
    pub paths: PathsConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub injection: Option<SanitizedInjectionConfig>,
    pub server: ServerConfig,
}

/// Sanitized tracker config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedTrackerConfig {
    pub site_url: String,
    pub api_key_configured: bool,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub rate_limit_requests: u32,
    pub rate_limit_window_secs: u64,
}

/// Sanitized injection config (credentials stripped from the URL)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedInjectionConfig {
    pub client: String,
    pub url: String,
    pub credentials_configured: bool,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_path_override: Option<String>,
    pub timeout_secs: u64,
    pub inject_existing: bool,
}

impl SanitizedTrackerConfig {
    fn new(tracker: Tracker, config: &TrackerApiConfig) -> Self {
        let (requests, window) = config.rate_limit_for(tracker);
        Self {
            site_url: config.site_url_for(tracker).to_string(),
            api_key_configured: !config.api_key.is_empty(),
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
            rate_limit_requests: requests,
            rate_limit_window_secs: window.as_secs(),
        }
    }
}

impl From<&InjectionConfig> for SanitizedInjectionConfig {
    fn from(config: &InjectionConfig) -> Self {
        let (url, credentials_configured) = match reqwest::Url::parse(&config.url) {
            Ok(mut parsed) => {
                let has_credentials =
                    !parsed.username().is_empty() || parsed.password().is_some();
                let _ = parsed.set_username("");
                let _ = parsed.set_password(None);
                (parsed.to_string(), has_credentials)
            }
            Err(_) => ("<invalid url>".to_string(), false),
        };

        Self {
            client: config.client.as_str().to_string(),
            url,
            credentials_configured,
            label: config.label.clone(),
            save_path_override: config.save_path_override.clone(),
            timeout_secs: config.timeout_secs,
            inject_existing: config.inject_existing,
        }
    }
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            red: SanitizedTrackerConfig::new(Tracker::Red, &config.red),
            ops: SanitizedTrackerConfig::new(Tracker::Ops, &config.ops),
            paths: config.paths.clone(),
            injection: config.injection.as_ref().map(SanitizedInjectionConfig::from),
            server: config.server.clone(),
        }
    }
}
