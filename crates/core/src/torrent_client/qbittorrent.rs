//! qBittorrent Web API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::COOKIE;
use reqwest::{multipart, Client, StatusCode};
use serde::Deserialize;
use tracing::info;

use crate::config::InjectionConfig;
use crate::metainfo::InfoHash;

use super::credentials::ClientUrl;
use super::naming::{determine_label, injected_file_name};
use super::session::{CallError, SessionCell, SessionContract};
use super::{read_torrent_file, ClientTorrentInfo, InjectRequest, TorrentClient, TorrentClientError};

const SESSION_COOKIE: &str = "SID";

/// An authenticated qBittorrent session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QbitSession {
    sid: String,
}

/// The Web API endpoints this client uses.
#[derive(Debug, Clone)]
pub enum QbitCall {
    TorrentsInfo {
        hashes: String,
    },
    TorrentsAdd {
        file_name: String,
        data: Vec<u8>,
        fields: Vec<(&'static str, String)>,
    },
}

impl QbitCall {
    fn path(&self) -> &'static str {
        match self {
            QbitCall::TorrentsInfo { .. } => "torrents/info",
            QbitCall::TorrentsAdd { .. } => "torrents/add",
        }
    }
}

/// qBittorrent torrent info response (only the fields we read).
#[derive(Debug, Deserialize)]
struct QBTorrentInfo {
    #[serde(default)]
    progress: f64,
    #[serde(default)]
    state: String,
    #[serde(default)]
    completion_on: i64,
    #[serde(default)]
    category: String,
    #[serde(default)]
    save_path: String,
}

impl QBTorrentInfo {
    fn is_complete(&self) -> bool {
        self.progress >= 1.0
            || matches!(self.state.as_str(), "pausedUP" | "stoppedUP")
            || self.completion_on > 0
    }

    fn into_info(self) -> ClientTorrentInfo {
        ClientTorrentInfo {
            complete: self.is_complete(),
            label: if self.category.is_empty() {
                None
            } else {
                Some(self.category)
            },
            save_path: self.save_path,
        }
    }
}

/// qBittorrent client implementation.
pub struct QBittorrentClient {
    http: Client,
    url: ClientUrl,
    session: SessionCell<QbitSession>,
}

impl QBittorrentClient {
    pub fn new(config: &InjectionConfig) -> Result<Self, TorrentClientError> {
        let url = ClientUrl::parse(&config.url, Some("/api/v2"))?;
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TorrentClientError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            url,
            session: SessionCell::new(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.url.endpoint, path)
    }
}

#[async_trait]
impl SessionContract for QBittorrentClient {
    type Session = QbitSession;
    type Call = QbitCall;
    type Reply = String;

    fn backend_name(&self) -> &'static str {
        "qbittorrent"
    }

    fn session_cell(&self) -> &SessionCell<QbitSession> {
        &self.session
    }

    async fn establish(&self) -> Result<QbitSession, TorrentClientError> {
        let mut params = Vec::new();
        if self.url.has_credentials() {
            params.push(("username", self.url.username.as_str()));
            params.push(("password", self.url.password.as_str()));
        }

        let response = self
            .http
            .post(self.endpoint("auth/login"))
            .form(&params)
            .send()
            .await
            .map_err(TorrentClientError::transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TorrentClientError::AuthenticationFailed(format!(
                "qBittorrent login returned HTTP {}",
                status
            )));
        }

        let sid = response
            .cookies()
            .find(|c| c.name() == SESSION_COOKIE)
            .map(|c| c.value().to_string())
            .filter(|sid| !sid.is_empty());

        match sid {
            Some(sid) => Ok(QbitSession { sid }),
            None => Err(TorrentClientError::AuthenticationFailed(
                "invalid username or password".to_string(),
            )),
        }
    }

    async fn dispatch(&self, session: &QbitSession, call: &QbitCall) -> Result<String, CallError> {
        let request = self
            .http
            .post(self.endpoint(call.path()))
            .header(COOKIE, format!("{}={}", SESSION_COOKIE, session.sid));

        // Multipart bodies are consumed on send, so the form is rebuilt for
        // each attempt.
        let request = match call {
            QbitCall::TorrentsInfo { hashes } => request.form(&[("hashes", hashes.as_str())]),
            QbitCall::TorrentsAdd {
                file_name,
                data,
                fields,
            } => {
                let part = multipart::Part::bytes(data.clone())
                    .file_name(file_name.clone())
                    .mime_str("application/x-bittorrent")
                    .map_err(|e| TorrentClientError::InvalidTorrent(e.to_string()))?;
                let form = fields
                    .iter()
                    .fold(multipart::Form::new().part("torrents", part), |form, (k, v)| {
                        form.text(*k, v.clone())
                    });
                request.multipart(form)
            }
        };

        let response = request.send().await.map_err(TorrentClientError::transport)?;

        let status = response.status();
        if status == StatusCode::FORBIDDEN {
            return Err(CallError::SessionInvalid);
        }
        if !status.is_success() {
            return Err(CallError::Failed(TorrentClientError::ApiError(format!(
                "qBittorrent request to '{}' failed: HTTP {}",
                call.path(),
                status
            ))));
        }

        response
            .text()
            .await
            .map_err(|e| CallError::Failed(TorrentClientError::ApiError(e.to_string())))
    }
}

#[async_trait]
impl TorrentClient for QBittorrentClient {
    fn name(&self) -> &str {
        "qbittorrent"
    }

    async fn setup(&self) -> Result<(), TorrentClientError> {
        SessionContract::setup(self).await.map(|_| ())
    }

    async fn get_torrent_info(
        &self,
        info_hash: &InfoHash,
    ) -> Result<ClientTorrentInfo, TorrentClientError> {
        let hash = info_hash.to_lowercase_hex();
        let body = self
            .call(&QbitCall::TorrentsInfo {
                hashes: hash.clone(),
            })
            .await?;

        if body.trim().is_empty() {
            return Err(TorrentClientError::TorrentNotFound(hash));
        }
        let torrents: Vec<QBTorrentInfo> = serde_json::from_str(&body).map_err(|e| {
            TorrentClientError::ApiError(format!("Failed to parse response: {}", e))
        })?;

        torrents
            .into_iter()
            .next()
            .map(QBTorrentInfo::into_info)
            .ok_or(TorrentClientError::TorrentNotFound(hash))
    }

    async fn inject_torrent(&self, request: &InjectRequest) -> Result<InfoHash, TorrentClientError> {
        let source = self.get_torrent_info(&request.source_info_hash).await?;
        if !source.complete {
            return Err(TorrentClientError::NotComplete(request.source_info_hash.to_string()));
        }

        // qBittorrent has no lookup by pending file, so check the new
        // infohash before uploading.
        let (data, new_hash) = read_torrent_file(&request.torrent_path).await?;
        match self.get_torrent_info(&new_hash).await {
            Ok(_) => {
                return Err(TorrentClientError::TorrentExistsInClient(
                    new_hash.to_lowercase_hex(),
                ))
            }
            Err(TorrentClientError::TorrentNotFound(_)) => {}
            Err(e) => return Err(e),
        }

        let save_path = request
            .save_path_override
            .clone()
            .unwrap_or_else(|| source.save_path.clone());
        let category = determine_label(source.label.as_deref(), &request.label);

        let call = QbitCall::TorrentsAdd {
            file_name: injected_file_name(&request.torrent_path),
            data,
            fields: vec![
                // Automatic management would move the torrent away from
                // the save path.
                ("autoTMM", "false".to_string()),
                ("category", category),
                ("tags", request.label.clone()),
                ("savepath", save_path.clone()),
                ("skip_checking", "true".to_string()),
                ("paused", "false".to_string()),
                ("stopped", "false".to_string()),
            ],
        };

        let body = self.call(&call).await?;
        if body.trim() != "Ok." {
            return Err(TorrentClientError::ApiError(format!(
                "qBittorrent refused the torrent: {}",
                body.chars().take(100).collect::<String>()
            )));
        }

        info!(info_hash = %new_hash, save_path = %save_path, "Injected torrent into qBittorrent");
        Ok(new_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TorrentClientBackend;

    fn qb_info(progress: f64, state: &str, completion_on: i64) -> QBTorrentInfo {
        QBTorrentInfo {
            progress,
            state: state.to_string(),
            completion_on,
            category: String::new(),
            save_path: "/downloads".to_string(),
        }
    }

    #[test]
    fn test_completion_rules() {
        assert!(qb_info(1.0, "uploading", 0).is_complete());
        assert!(qb_info(0.5, "pausedUP", 0).is_complete());
        assert!(qb_info(0.5, "stoppedUP", 0).is_complete());
        assert!(qb_info(0.5, "stalledDL", 1703980800).is_complete());
        assert!(!qb_info(0.5, "downloading", 0).is_complete());
    }

    #[test]
    fn test_category_maps_to_label() {
        let mut info = qb_info(1.0, "uploading", 0);
        info.category = "music".to_string();
        assert_eq!(info.into_info().label.as_deref(), Some("music"));

        assert_eq!(qb_info(1.0, "uploading", 0).into_info().label, None);
    }

    #[test]
    fn test_deserialize_ignores_unknown_fields() {
        let json = r#"[{"hash":"abc","progress":1,"state":"uploading","completion_on":0,"category":"","save_path":"/d","name":"x"}]"#;
        let parsed: Vec<QBTorrentInfo> = serde_json::from_str(json).unwrap();
        assert!(parsed[0].is_complete());
    }

    #[test]
    fn test_endpoint_uses_api_base() {
        let config =
            InjectionConfig::new(TorrentClientBackend::Qbittorrent, "http://admin:pw@localhost:8080");
        let client = QBittorrentClient::new(&config).unwrap();
        assert_eq!(
            client.endpoint("torrents/info"),
            "http://localhost:8080/api/v2/torrents/info"
        );
    }
}
