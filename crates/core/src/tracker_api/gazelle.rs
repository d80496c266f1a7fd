//! Gazelle JSON API client (`ajax.php`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::TrackerApiConfig;
use crate::metainfo::InfoHash;
use crate::tracker::Tracker;

use super::html::html_unescape;
use super::rate_limiter::RateLimiter;
use super::{LookupError, LookupResult, TrackerLookup};

const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Error strings Gazelle returns when no torrent has the requested hash.
const NOT_FOUND_ERRORS: &[&str] = &["bad hash parameter", "bad parameters"];

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    response: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct IndexResponse {
    passkey: String,
}

#[derive(Debug, Deserialize)]
struct TorrentResponse {
    torrent: TorrentDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TorrentDetails {
    id: u64,
    file_path: String,
}

enum RequestFailure {
    Unauthorized(String),
    Failed(String),
}

/// Tracker lookup backed by a Gazelle site's JSON API.
pub struct GazelleClient {
    tracker: Tracker,
    client: Client,
    site_url: String,
    announce_url: String,
    rate_limiter: RateLimiter,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl GazelleClient {
    /// Build a client without contacting the tracker.
    ///
    /// The announce URL stays empty until [`GazelleClient::resolve_announce_url`].
    pub fn new(tracker: Tracker, config: &TrackerApiConfig) -> Result<Self, LookupError> {
        let mut auth = HeaderValue::from_str(&authorization_value(tracker, &config.api_key))
            .map_err(|_| LookupError::Unauthorized {
                tracker,
                message: "API key contains invalid characters".to_string(),
            })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| LookupError::Request {
                tracker,
                message: e.to_string(),
            })?;

        let (requests, window) = config.rate_limit_for(tracker);

        Ok(Self {
            tracker,
            client,
            site_url: config.site_url_for(tracker).trim_end_matches('/').to_string(),
            announce_url: String::new(),
            rate_limiter: RateLimiter::new(requests, window),
            max_retries: config.max_retries,
            retry_base_delay: Duration::from_secs(1),
        })
    }

    /// Build a client and verify the API key by resolving the announce URL.
    pub async fn connect(tracker: Tracker, config: &TrackerApiConfig) -> Result<Self, LookupError> {
        Self::new(tracker, config)?.resolve_announce_url().await
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// Fetches the account's passkey and derives the personal announce URL.
    pub async fn resolve_announce_url(mut self) -> Result<Self, LookupError> {
        let tracker = self.tracker;
        let response = self
            .request(&[("action", "index")])
            .await
            .map_err(|failure| match failure {
                RequestFailure::Unauthorized(message) => {
                    LookupError::Unauthorized { tracker, message }
                }
                RequestFailure::Failed(message) => LookupError::Request { tracker, message },
            })?;

        if response.status != "success" {
            return Err(LookupError::Unauthorized {
                tracker,
                message: response.error.unwrap_or_else(|| response.status.clone()),
            });
        }

        let index: IndexResponse = response
            .response
            .ok_or_else(|| "missing response object".to_string())
            .and_then(|value| serde_json::from_value(value).map_err(|e| e.to_string()))
            .map_err(|message| LookupError::InvalidResponse { tracker, message })?;

        self.announce_url = tracker.announce_url(&index.passkey);
        info!(tracker = %tracker, "Connected to tracker API");
        Ok(self)
    }

    async fn request(&self, params: &[(&str, &str)]) -> Result<ApiResponse, RequestFailure> {
        let url = format!("{}/ajax.php", self.site_url);
        let mut attempt = 0;

        loop {
            self.rate_limiter.acquire().await;
            debug!(tracker = %self.tracker, ?params, attempt, "Gazelle API request");

            let failure = match self.client.get(&url).query(params).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                        return Err(RequestFailure::Unauthorized(format!("HTTP {}", status)));
                    }

                    if is_retryable(status) {
                        format!("HTTP {}", status)
                    } else {
                        let body = response
                            .text()
                            .await
                            .map_err(|e| RequestFailure::Failed(e.to_string()))?;
                        return serde_json::from_str(&body).map_err(|_| {
                            RequestFailure::Failed(format!(
                                "HTTP {}: {}",
                                status,
                                body.chars().take(200).collect::<String>()
                            ))
                        });
                    }
                }
                Err(e) if e.is_timeout() => "request timed out".to_string(),
                Err(e) => e.to_string(),
            };

            if attempt >= self.max_retries {
                return Err(RequestFailure::Failed(format!(
                    "{} (gave up after {} attempts)",
                    failure,
                    attempt + 1
                )));
            }

            let wait = backoff(self.retry_base_delay, attempt);
            warn!(
                tracker = %self.tracker,
                error = %failure,
                retry_in_ms = wait.as_millis() as u64,
                "Gazelle API request failed, retrying"
            );
            tokio::time::sleep(wait).await;
            attempt += 1;
        }
    }
}

#[async_trait]
impl TrackerLookup for GazelleClient {
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
        let hash = info_hash.to_string();
        let response = match self
            .request(&[("action", "torrent"), ("hash", hash.as_str())])
            .await
        {
            Ok(response) => response,
            Err(RequestFailure::Unauthorized(message) | RequestFailure::Failed(message)) => {
                return LookupResult::Other { message };
            }
        };

        classify(response)
    }
}

fn classify(response: ApiResponse) -> LookupResult {
    if response.status != "success" {
        let error = response.error.unwrap_or_else(|| response.status.clone());
        let normalized = error.trim().to_lowercase();

        return if NOT_FOUND_ERRORS.contains(&normalized.as_str()) {
            LookupResult::NotFoundForHash { reason: error }
        } else {
            LookupResult::Other { message: error }
        };
    }

    let parsed = response
        .response
        .ok_or_else(|| "missing response object".to_string())
        .and_then(|value| {
            serde_json::from_value::<TorrentResponse>(value).map_err(|e| e.to_string())
        });

    match parsed {
        Ok(TorrentResponse { torrent }) => LookupResult::Found {
            torrent_id: torrent.id,
            file_path: html_unescape(&torrent.file_path),
        },
        Err(message) => LookupResult::Other {
            message: format!("unexpected torrent response: {}", message),
        },
    }
}

/// Orpheus expects the `token` scheme; Redacted takes the bare key.
fn authorization_value(tracker: Tracker, api_key: &str) -> String {
    match tracker {
        Tracker::Red => api_key.to_string(),
        Tracker::Ops => format!("token {}", api_key),
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

fn backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
        .min(MAX_BACKOFF)
}
