//! Deluge Web UI JSON-RPC client.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::InjectionConfig;
use crate::metainfo::InfoHash;

use super::credentials::ClientUrl;
use super::naming::{determine_label, injected_file_name};
use super::session::{CallError, SessionCell, SessionContract};
use super::{read_torrent_file, ClientTorrentInfo, InjectRequest, TorrentClient, TorrentClientError};

/// JSON-RPC error code Deluge uses for an unauthenticated session.
const AUTH_ERROR_CODE: i64 = 1;

const LABEL_PLUGIN: &str = "Label";

/// Message of the error Deluge raises when adding a torrent it already has.
const ALREADY_IN_SESSION: &str = "already in session";

const TORRENT_FIELDS: [&str; 5] = ["state", "progress", "total_remaining", "label", "save_path"];

/// An authenticated Deluge Web UI session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelugeSession {
    cookie: String,
    label_plugin: bool,
}

/// One JSON-RPC method invocation.
#[derive(Debug, Clone)]
pub struct DelugeCall {
    method: &'static str,
    params: Value,
}

impl DelugeCall {
    fn new(method: &'static str, params: Value) -> Self {
        Self { method, params }
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    #[serde(default)]
    message: String,
    code: i64,
}

#[derive(Debug, Deserialize)]
struct DelugeTorrent {
    #[serde(default)]
    state: String,
    #[serde(default)]
    progress: f64,
    #[serde(default)]
    total_remaining: Option<i64>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    save_path: String,
}

impl DelugeTorrent {
    fn is_complete(&self) -> bool {
        self.state == "Seeding" || self.progress >= 100.0 || self.total_remaining.unwrap_or(0) == 0
    }

    fn into_info(self) -> ClientTorrentInfo {
        ClientTorrentInfo {
            complete: self.is_complete(),
            label: self.label.filter(|l| !l.is_empty()),
            save_path: self.save_path,
        }
    }
}

/// Deluge client speaking to the Web UI's `/json` endpoint.
pub struct DelugeClient {
    http: Client,
    url: ClientUrl,
    next_id: AtomicU64,
    session: SessionCell<DelugeSession>,
}

impl DelugeClient {
    pub fn new(config: &InjectionConfig) -> Result<Self, TorrentClientError> {
        let url = ClientUrl::parse(&config.url, None)?;
        if url.password.is_empty() {
            return Err(TorrentClientError::AuthenticationFailed(
                "the Deluge URL must include a password (e.g. http://:<PASSWORD>@localhost:8112/json)"
                    .to_string(),
            ));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TorrentClientError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            url,
            next_id: AtomicU64::new(0),
            session: SessionCell::new(),
        })
    }

    /// Sends one request; returns the decoded body and the session cookie
    /// if the response set one.
    async fn send(
        &self,
        cookie: Option<&str>,
        call: &DelugeCall,
    ) -> Result<(RpcResponse, Option<String>), TorrentClientError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        debug!(method = call.method, id, "Deluge RPC");

        let mut request = self.http.post(&self.url.endpoint).json(&json!({
            "method": call.method,
            "params": call.params,
            "id": id,
        }));
        if let Some(cookie) = cookie {
            request = request.header(COOKIE, cookie);
        }

        let response = request.send().await.map_err(TorrentClientError::transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TorrentClientError::ApiError(format!(
                "Deluge method {} returned HTTP {}",
                call.method, status
            )));
        }

        let set_cookie = response
            .headers()
            .get(SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let body: RpcResponse = response.json().await.map_err(|e| {
            TorrentClientError::ApiError(format!(
                "Deluge method {} response was not JSON-RPC: {}",
                call.method, e
            ))
        })?;

        Ok((body, set_cookie))
    }

    /// A call made during login, where a session rejection is an
    /// authentication failure rather than a retry trigger.
    async fn login_call(
        &self,
        cookie: Option<&str>,
        call: DelugeCall,
    ) -> Result<(Value, Option<String>), TorrentClientError> {
        let (body, set_cookie) = self.send(cookie, &call).await?;
        match body.error {
            Some(err) if err.code == AUTH_ERROR_CODE => Err(TorrentClientError::AuthenticationFailed(
                format!("Deluge rejected {}: {}", call.method, err.message),
            )),
            Some(err) => Err(TorrentClientError::ApiError(format!(
                "Deluge method {} returned an error: {}",
                call.method, err.message
            ))),
            None => Ok((body.result, set_cookie)),
        }
    }

    async fn label_plugin_enabled(&self) -> bool {
        self.session
            .current()
            .await
            .is_some_and(|session| session.label_plugin)
    }

    /// Assigns `label`, creating it first if Deluge does not know it yet.
    async fn set_label(&self, info_hash: &InfoHash, label: &str) -> Result<(), TorrentClientError> {
        let labels = self.call(&DelugeCall::new("label.get_labels", json!([]))).await?;
        let known = labels
            .as_array()
            .is_some_and(|labels| labels.iter().any(|l| l.as_str() == Some(label)));

        if !known {
            self.call(&DelugeCall::new("label.add", json!([label]))).await?;
        }

        self.call(&DelugeCall::new(
            "label.set_torrent",
            json!([info_hash.to_lowercase_hex(), label]),
        ))
        .await?;
        Ok(())
    }
}

#[async_trait]
impl SessionContract for DelugeClient {
    type Session = DelugeSession;
    type Call = DelugeCall;
    type Reply = Value;

    fn backend_name(&self) -> &'static str {
        "deluge"
    }

    fn session_cell(&self) -> &SessionCell<DelugeSession> {
        &self.session
    }

    async fn establish(&self) -> Result<DelugeSession, TorrentClientError> {
        let (authenticated, cookie) = self
            .login_call(None, DelugeCall::new("auth.login", json!([self.url.password])))
            .await?;
        if authenticated != Value::Bool(true) {
            return Err(TorrentClientError::AuthenticationFailed(
                "reached the Deluge RPC endpoint but the password was rejected".to_string(),
            ));
        }
        let cookie = cookie.ok_or_else(|| {
            TorrentClientError::AuthenticationFailed(
                "Deluge accepted the login but set no session cookie".to_string(),
            )
        })?;

        let (connected, _) = self
            .login_call(Some(&cookie), DelugeCall::new("web.connected", json!([])))
            .await?;
        if connected != Value::Bool(true) {
            return Err(TorrentClientError::ConnectionFailed(
                "the Deluge Web UI is not connected to a daemon".to_string(),
            ));
        }

        let (plugins, _) = self
            .login_call(Some(&cookie), DelugeCall::new("core.get_enabled_plugins", json!([])))
            .await?;
        let label_plugin = plugins
            .as_array()
            .is_some_and(|plugins| plugins.iter().any(|p| p.as_str() == Some(LABEL_PLUGIN)));
        debug!(label_plugin, "Deluge capabilities discovered");

        Ok(DelugeSession {
            cookie,
            label_plugin,
        })
    }

    async fn dispatch(&self, session: &DelugeSession, call: &DelugeCall) -> Result<Value, CallError> {
        let (body, _) = self.send(Some(&session.cookie), call).await?;
        match body.error {
            Some(err) if err.code == AUTH_ERROR_CODE => Err(CallError::SessionInvalid),
            Some(err) => Err(CallError::Failed(TorrentClientError::ApiError(format!(
                "Deluge method {} returned an error: {}",
                call.method, err.message
            )))),
            None => Ok(body.result),
        }
    }
}

#[async_trait]
impl TorrentClient for DelugeClient {
    fn name(&self) -> &str {
        "deluge"
    }

    async fn setup(&self) -> Result<(), TorrentClientError> {
        SessionContract::setup(self).await.map(|_| ())
    }

    async fn get_torrent_info(
        &self,
        info_hash: &InfoHash,
    ) -> Result<ClientTorrentInfo, TorrentClientError> {
        let hash = info_hash.to_lowercase_hex();
        let result = self
            .call(&DelugeCall::new(
                "web.update_ui",
                json!([TORRENT_FIELDS, { "hash": hash }]),
            ))
            .await?;

        let torrents = result.get("torrents").ok_or_else(|| {
            TorrentClientError::ApiError("Deluge returned no torrents object".to_string())
        })?;
        let torrent = torrents
            .get(&hash)
            .filter(|t| !t.is_null())
            .ok_or_else(|| TorrentClientError::TorrentNotFound(hash.clone()))?;

        let torrent: DelugeTorrent = serde_json::from_value(torrent.clone()).map_err(|e| {
            TorrentClientError::ApiError(format!("unexpected torrent status from Deluge: {}", e))
        })?;

        Ok(torrent.into_info())
    }

    async fn inject_torrent(&self, request: &InjectRequest) -> Result<InfoHash, TorrentClientError> {
        let source = self.get_torrent_info(&request.source_info_hash).await?;
        if !source.complete {
            return Err(TorrentClientError::NotComplete(request.source_info_hash.to_string()));
        }

        let (data, new_hash) = read_torrent_file(&request.torrent_path).await?;
        let save_path = request
            .save_path_override
            .clone()
            .unwrap_or_else(|| source.save_path.clone());

        let added = match self
            .call(&DelugeCall::new(
                "core.add_torrent_file",
                json!([
                    injected_file_name(&request.torrent_path),
                    base64::engine::general_purpose::STANDARD.encode(&data),
                    {
                        "download_location": save_path,
                        "seed_mode": true,
                        "add_paused": false,
                    },
                ]),
            ))
            .await
        {
            Err(TorrentClientError::ApiError(message)) if message.contains(ALREADY_IN_SESSION) => {
                return Err(TorrentClientError::TorrentExistsInClient(new_hash.to_lowercase_hex()));
            }
            other => other?,
        };
        if added.is_null() {
            return Err(TorrentClientError::TorrentExistsInClient(new_hash.to_lowercase_hex()));
        }

        if self.label_plugin_enabled().await {
            let label = determine_label(source.label.as_deref(), &request.label);
            self.set_label(&new_hash, &label).await?;
        }

        info!(info_hash = %new_hash, save_path = %save_path, "Injected torrent into Deluge");
        Ok(new_hash)
    }
}
