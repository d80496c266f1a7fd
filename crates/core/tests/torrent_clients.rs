//! Injection client integration tests.
//!
//! Each test runs the real Deluge or qBittorrent client against an
//! in-process axum server that mimics the backend's Web API:
//! - Login, cookie replay and capability discovery
//! - Bounded re-authentication when the session is rejected
//! - Duplicate guards, label handling and the add request itself

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::{Form, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tempfile::TempDir;

use crosstag_core::{
    config::{InjectionConfig, TorrentClientBackend},
    metainfo::{InfoHash, TorrentMetadata},
    testing::fixtures,
    torrent_client::{DelugeClient, InjectRequest, QBittorrentClient, TorrentClient},
    TorrentClientError, Tracker,
};

async fn spawn(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind mock server");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// A completed source torrent and its regenerated OPS copy on disk.
struct Injectable {
    _dir: TempDir,
    source_hash: InfoHash,
    new_hash: InfoHash,
    new_path: PathBuf,
}

async fn injectable() -> Injectable {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let source = fixtures::torrent("foo", Some("RED"), None);
    let target: TorrentMetadata = source
        .with_source_flag(Tracker::Ops.creation_flags()[0])
        .unwrap();
    let new_path = fixtures::write_torrent(dir.path(), "foo [OPS].torrent", &target).await;

    Injectable {
        _dir: dir,
        source_hash: source.info_hash().unwrap(),
        new_hash: target.info_hash().unwrap(),
        new_path,
    }
}

fn inject_request(fixture: &Injectable) -> InjectRequest {
    InjectRequest {
        source_info_hash: fixture.source_hash,
        torrent_path: fixture.new_path.clone(),
        label: "crosstag".to_string(),
        save_path_override: None,
    }
}

// ---------------------------------------------------------------------------
// Deluge
// ---------------------------------------------------------------------------

#[derive(Default)]
struct DelugeBackend {
    logins: u32,
    update_ui_calls: u32,
    /// 1-based `web.update_ui` calls answered with an auth error.
    reject_update_ui: Vec<u32>,
    label_plugin: bool,
    torrents: HashMap<String, Value>,
    labels: Vec<String>,
    add_result: Value,
    /// Error message returned by `core.add_torrent_file` instead of a result.
    add_error: Option<String>,
    calls: Vec<(String, Value, Option<String>)>,
}

type DelugeState = Arc<Mutex<DelugeBackend>>;

async fn deluge_rpc(
    State(state): State<DelugeState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let method = body["method"].as_str().unwrap_or_default().to_string();
    let params = body["params"].clone();
    let cookie = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let mut backend = state.lock().unwrap();
    backend
        .calls
        .push((method.clone(), params.clone(), cookie.clone()));

    let reply = |result: Value| json!({ "id": body["id"], "result": result, "error": null });

    match method.as_str() {
        "auth.login" => {
            if params[0] != "secret" {
                return Json(reply(json!(false))).into_response();
            }
            backend.logins += 1;
            let set_cookie = format!("_session_id=s{}; Expires=Never; Path=/json", backend.logins);
            ([(header::SET_COOKIE, set_cookie)], Json(reply(json!(true)))).into_response()
        }
        _ if cookie != Some(format!("_session_id=s{}", backend.logins)) => Json(json!({
            "id": body["id"],
            "result": null,
            "error": { "message": "Not authenticated", "code": 1 },
        }))
        .into_response(),
        "web.connected" => Json(reply(json!(true))).into_response(),
        "core.get_enabled_plugins" => {
            let plugins = if backend.label_plugin {
                json!(["Label", "Scheduler"])
            } else {
                json!(["Scheduler"])
            };
            Json(reply(plugins)).into_response()
        }
        "web.update_ui" => {
            backend.update_ui_calls += 1;
            if backend.reject_update_ui.contains(&backend.update_ui_calls) {
                return Json(json!({
                    "id": body["id"],
                    "result": null,
                    "error": { "message": "Not authenticated", "code": 1 },
                }))
                .into_response();
            }
            let hash = params[1]["hash"].as_str().unwrap_or_default();
            let torrents: serde_json::Map<String, Value> = backend
                .torrents
                .get(hash)
                .map(|t| (hash.to_string(), t.clone()))
                .into_iter()
                .collect();
            Json(reply(json!({ "torrents": torrents, "stats": {} }))).into_response()
        }
        "core.add_torrent_file" => match &backend.add_error {
            Some(message) => Json(json!({
                "id": body["id"],
                "result": null,
                "error": { "message": message, "code": 4 },
            }))
            .into_response(),
            None => Json(reply(backend.add_result.clone())).into_response(),
        },
        "label.get_labels" => Json(reply(json!(backend.labels))).into_response(),
        "label.add" => {
            let label = params[0].as_str().unwrap_or_default().to_string();
            backend.labels.push(label);
            Json(reply(Value::Null)).into_response()
        }
        "label.set_torrent" => Json(reply(Value::Null)).into_response(),
        _ => Json(json!({
            "id": body["id"],
            "result": null,
            "error": { "message": "Unknown method", "code": 2 },
        }))
        .into_response(),
    }
}

async fn deluge_server(backend: DelugeBackend) -> (DelugeClient, DelugeState) {
    let state: DelugeState = Arc::new(Mutex::new(backend));
    let router = Router::new()
        .route("/json", post(deluge_rpc))
        .with_state(state.clone());
    let addr = spawn(router).await;

    let config = InjectionConfig::new(
        TorrentClientBackend::Deluge,
        format!("http://:secret@{}/json", addr),
    );
    (DelugeClient::new(&config).unwrap(), state)
}

fn deluge_torrent(state: &str, progress: f64, label: &str) -> Value {
    let total_remaining = if progress >= 100.0 { 0 } else { 1000 };
    json!({
        "state": state,
        "progress": progress,
        "total_remaining": total_remaining,
        "label": label,
        "save_path": "/data/music",
    })
}

#[tokio::test]
async fn test_deluge_setup_discovers_label_plugin() {
    let (client, state) = deluge_server(DelugeBackend {
        label_plugin: true,
        ..Default::default()
    })
    .await;

    client.setup().await.unwrap();

    let backend = state.lock().unwrap();
    let methods: Vec<_> = backend.calls.iter().map(|(m, _, _)| m.as_str()).collect();
    assert_eq!(
        methods,
        vec!["auth.login", "web.connected", "core.get_enabled_plugins"]
    );
    // The login cookie is replayed on later calls.
    assert_eq!(backend.calls[1].2.as_deref(), Some("_session_id=s1"));
}

#[tokio::test]
async fn test_deluge_wrong_password_fails_setup() {
    let state: DelugeState = Arc::new(Mutex::new(DelugeBackend::default()));
    let router = Router::new()
        .route("/json", post(deluge_rpc))
        .with_state(state.clone());
    let addr = spawn(router).await;
    let config = InjectionConfig::new(
        TorrentClientBackend::Deluge,
        format!("http://:wrong@{}/json", addr),
    );
    let client = DelugeClient::new(&config).unwrap();

    let err = client.setup().await.unwrap_err();

    assert!(matches!(err, TorrentClientError::AuthenticationFailed(_)));
}

#[tokio::test]
async fn test_deluge_reauthenticates_once_on_rejected_session() {
    let fixture = injectable().await;
    let hash = fixture.source_hash.to_lowercase_hex();
    let (client, state) = deluge_server(DelugeBackend {
        reject_update_ui: vec![2],
        torrents: HashMap::from([(hash, deluge_torrent("Seeding", 100.0, ""))]),
        ..Default::default()
    })
    .await;
    client.setup().await.unwrap();

    client.get_torrent_info(&fixture.source_hash).await.unwrap();
    let info = client.get_torrent_info(&fixture.source_hash).await.unwrap();

    assert!(info.complete);
    assert_eq!(info.label, None);
    assert_eq!(info.save_path, "/data/music");
    let backend = state.lock().unwrap();
    assert_eq!(backend.logins, 2);
    assert_eq!(backend.update_ui_calls, 3);
}

#[tokio::test]
async fn test_deluge_second_rejection_is_authentication_error() {
    let fixture = injectable().await;
    let hash = fixture.source_hash.to_lowercase_hex();
    let (client, state) = deluge_server(DelugeBackend {
        reject_update_ui: vec![2, 3, 4],
        torrents: HashMap::from([(hash, deluge_torrent("Seeding", 100.0, ""))]),
        ..Default::default()
    })
    .await;
    client.setup().await.unwrap();
    client.get_torrent_info(&fixture.source_hash).await.unwrap();

    let err = client
        .get_torrent_info(&fixture.source_hash)
        .await
        .unwrap_err();

    assert!(matches!(err, TorrentClientError::AuthenticationFailed(_)));
    let backend = state.lock().unwrap();
    assert_eq!(backend.logins, 2);
    assert_eq!(backend.update_ui_calls, 3);
}

#[tokio::test]
async fn test_deluge_unknown_torrent() {
    let fixture = injectable().await;
    let (client, _state) = deluge_server(DelugeBackend::default()).await;

    let err = client
        .get_torrent_info(&fixture.source_hash)
        .await
        .unwrap_err();

    assert!(matches!(err, TorrentClientError::TorrentNotFound(_)));
}

#[tokio::test]
async fn test_deluge_inject_adds_in_seed_mode_and_labels() {
    let fixture = injectable().await;
    let hash = fixture.source_hash.to_lowercase_hex();
    let (client, state) = deluge_server(DelugeBackend {
        label_plugin: true,
        torrents: HashMap::from([(hash, deluge_torrent("Seeding", 100.0, "music"))]),
        labels: vec!["music".to_string()],
        add_result: json!(fixture.new_hash.to_lowercase_hex()),
        ..Default::default()
    })
    .await;
    client.setup().await.unwrap();

    let new_hash = client.inject_torrent(&inject_request(&fixture)).await.unwrap();

    assert_eq!(new_hash, fixture.new_hash);
    let backend = state.lock().unwrap();
    let (_, params, _) = backend
        .calls
        .iter()
        .find(|(m, _, _)| m == "core.add_torrent_file")
        .expect("torrent was not added");
    assert_eq!(params[0], "foo [OPS].crosstag.torrent");
    assert_eq!(params[2]["download_location"], "/data/music");
    assert_eq!(params[2]["seed_mode"], true);
    assert_eq!(params[2]["add_paused"], false);

    assert_eq!(backend.labels, vec!["music", "music.crosstag"]);
    let (_, params, _) = backend
        .calls
        .iter()
        .find(|(m, _, _)| m == "label.set_torrent")
        .expect("label was not set");
    assert_eq!(params[0], fixture.new_hash.to_lowercase_hex());
    assert_eq!(params[1], "music.crosstag");
}

#[tokio::test]
async fn test_deluge_inject_without_label_plugin_skips_labels() {
    let fixture = injectable().await;
    let hash = fixture.source_hash.to_lowercase_hex();
    let (client, state) = deluge_server(DelugeBackend {
        torrents: HashMap::from([(hash, deluge_torrent("Seeding", 100.0, ""))]),
        add_result: json!(fixture.new_hash.to_lowercase_hex()),
        ..Default::default()
    })
    .await;
    client.setup().await.unwrap();

    client.inject_torrent(&inject_request(&fixture)).await.unwrap();

    let backend = state.lock().unwrap();
    assert!(!backend.calls.iter().any(|(m, _, _)| m.starts_with("label.")));
}

#[tokio::test]
async fn test_deluge_inject_rejects_incomplete_source() {
    let fixture = injectable().await;
    let hash = fixture.source_hash.to_lowercase_hex();
    let (client, state) = deluge_server(DelugeBackend {
        torrents: HashMap::from([(hash, deluge_torrent("Downloading", 40.0, ""))]),
        ..Default::default()
    })
    .await;

    let err = client
        .inject_torrent(&inject_request(&fixture))
        .await
        .unwrap_err();

    assert!(matches!(err, TorrentClientError::NotComplete(_)));
    let backend = state.lock().unwrap();
    assert!(!backend.calls.iter().any(|(m, _, _)| m == "core.add_torrent_file"));
}

#[tokio::test]
async fn test_deluge_duplicate_add_is_exists_in_client() {
    let fixture = injectable().await;
    let hash = fixture.source_hash.to_lowercase_hex();
    let (client, _state) = deluge_server(DelugeBackend {
        torrents: HashMap::from([(hash, deluge_torrent("Seeding", 100.0, ""))]),
        add_result: Value::Null,
        ..Default::default()
    })
    .await;

    let err = client
        .inject_torrent(&inject_request(&fixture))
        .await
        .unwrap_err();

    assert!(matches!(err, TorrentClientError::TorrentExistsInClient(_)));
}

#[tokio::test]
async fn test_deluge_already_in_session_error_is_exists_in_client() {
    let fixture = injectable().await;
    let hash = fixture.source_hash.to_lowercase_hex();
    let (client, _state) = deluge_server(DelugeBackend {
        torrents: HashMap::from([(hash, deluge_torrent("Seeding", 100.0, ""))]),
        add_error: Some(format!(
            "Torrent already in session ({}).",
            fixture.new_hash.to_lowercase_hex()
        )),
        ..Default::default()
    })
    .await;

    let err = client
        .inject_torrent(&inject_request(&fixture))
        .await
        .unwrap_err();

    assert!(
        matches!(&err, TorrentClientError::TorrentExistsInClient(h) if *h == fixture.new_hash.to_lowercase_hex()),
        "{:?}",
        err
    );
}

#[tokio::test]
async fn test_deluge_other_add_errors_are_api_errors() {
    let fixture = injectable().await;
    let hash = fixture.source_hash.to_lowercase_hex();
    let (client, _state) = deluge_server(DelugeBackend {
        torrents: HashMap::from([(hash, deluge_torrent("Seeding", 100.0, ""))]),
        add_error: Some("Unable to add torrent".to_string()),
        ..Default::default()
    })
    .await;

    let err = client
        .inject_torrent(&inject_request(&fixture))
        .await
        .unwrap_err();

    assert!(matches!(err, TorrentClientError::ApiError(_)));
}

// ---------------------------------------------------------------------------
// qBittorrent
// ---------------------------------------------------------------------------

#[derive(Default)]
struct QbitBackend {
    logins: u32,
    /// Number of upcoming `torrents/info` calls answered with 403.
    forbid_info: u32,
    torrents: HashMap<String, Value>,
    info_calls: u32,
    adds: Vec<Bytes>,
}

type QbitState = Arc<Mutex<QbitBackend>>;

async fn qbit_login(
    State(state): State<QbitState>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let valid = form.get("username").map(String::as_str) == Some("admin")
        && form.get("password").map(String::as_str) == Some("pw");
    if !valid {
        return "Fails.".into_response();
    }

    let mut backend = state.lock().unwrap();
    backend.logins += 1;
    let cookie = format!("SID=sid{}; HttpOnly; SameSite=Strict; path=/", backend.logins);
    ([(header::SET_COOKIE, cookie)], "Ok.").into_response()
}

fn qbit_authorized(backend: &QbitBackend, headers: &HeaderMap) -> bool {
    let expected = format!("SID=sid{}", backend.logins);
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == expected)
}

async fn qbit_info(
    State(state): State<QbitState>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let mut backend = state.lock().unwrap();
    backend.info_calls += 1;
    if backend.forbid_info > 0 {
        backend.forbid_info -= 1;
        return (StatusCode::FORBIDDEN, "Forbidden").into_response();
    }
    if !qbit_authorized(&backend, &headers) {
        return (StatusCode::FORBIDDEN, "Forbidden").into_response();
    }

    let hash = form.get("hashes").cloned().unwrap_or_default();
    let torrents: Vec<Value> = backend.torrents.get(&hash).cloned().into_iter().collect();
    Json(torrents).into_response()
}

async fn qbit_add(State(state): State<QbitState>, headers: HeaderMap, body: Bytes) -> Response {
    let mut backend = state.lock().unwrap();
    if !qbit_authorized(&backend, &headers) {
        return (StatusCode::FORBIDDEN, "Forbidden").into_response();
    }
    backend.adds.push(body);
    "Ok.".into_response()
}

async fn qbit_server(backend: QbitBackend, credentials: &str) -> (QBittorrentClient, QbitState) {
    let state: QbitState = Arc::new(Mutex::new(backend));
    let router = Router::new()
        .route("/api/v2/auth/login", post(qbit_login))
        .route("/api/v2/torrents/info", post(qbit_info))
        .route("/api/v2/torrents/add", post(qbit_add))
        .with_state(state.clone());
    let addr = spawn(router).await;

    let config = InjectionConfig::new(
        TorrentClientBackend::Qbittorrent,
        format!("http://{}@{}", credentials, addr),
    );
    (QBittorrentClient::new(&config).unwrap(), state)
}

fn qbit_torrent(progress: f64, state: &str, category: &str) -> Value {
    json!({
        "hash": "ignored",
        "name": "foo",
        "progress": progress,
        "state": state,
        "completion_on": 0,
        "category": category,
        "save_path": "/downloads/music",
    })
}

#[tokio::test]
async fn test_qbit_bad_credentials_fail_setup() {
    let (client, _state) = qbit_server(QbitBackend::default(), "admin:wrong").await;

    let err = client.setup().await.unwrap_err();

    assert!(matches!(err, TorrentClientError::AuthenticationFailed(_)));
}

#[tokio::test]
async fn test_qbit_existing_new_hash_is_not_uploaded() {
    let fixture = injectable().await;
    let (client, state) = qbit_server(
        QbitBackend {
            torrents: HashMap::from([
                (
                    fixture.source_hash.to_lowercase_hex(),
                    qbit_torrent(1.0, "uploading", "music"),
                ),
                (
                    fixture.new_hash.to_lowercase_hex(),
                    qbit_torrent(1.0, "uploading", "music.crosstag"),
                ),
            ]),
            ..Default::default()
        },
        "admin:pw",
    )
    .await;

    let err = client
        .inject_torrent(&inject_request(&fixture))
        .await
        .unwrap_err();

    assert!(matches!(err, TorrentClientError::TorrentExistsInClient(_)));
    assert!(state.lock().unwrap().adds.is_empty());
}

#[tokio::test]
async fn test_qbit_inject_uploads_with_category_and_save_path() {
    let fixture = injectable().await;
    let (client, state) = qbit_server(
        QbitBackend {
            torrents: HashMap::from([(
                fixture.source_hash.to_lowercase_hex(),
                qbit_torrent(0.5, "pausedUP", "music"),
            )]),
            ..Default::default()
        },
        "admin:pw",
    )
    .await;
    client.setup().await.unwrap();

    let mut request = inject_request(&fixture);
    request.save_path_override = Some("/seed".to_string());
    let new_hash = client.inject_torrent(&request).await.unwrap();

    assert_eq!(new_hash, fixture.new_hash);
    let backend = state.lock().unwrap();
    assert_eq!(backend.adds.len(), 1);
    let body = String::from_utf8_lossy(&backend.adds[0]);
    assert!(body.contains("foo [OPS].crosstag.torrent"));
    for (name, value) in [
        ("autoTMM", "false"),
        ("category", "music.crosstag"),
        ("tags", "crosstag"),
        ("savepath", "/seed"),
        ("skip_checking", "true"),
        ("paused", "false"),
    ] {
        let field = format!("name=\"{}\"\r\n\r\n{}\r\n", name, value);
        assert!(body.contains(&field), "missing form field {}", name);
    }
}

#[tokio::test]
async fn test_qbit_incomplete_source_is_rejected() {
    let fixture = injectable().await;
    let (client, state) = qbit_server(
        QbitBackend {
            torrents: HashMap::from([(
                fixture.source_hash.to_lowercase_hex(),
                qbit_torrent(0.5, "downloading", ""),
            )]),
            ..Default::default()
        },
        "admin:pw",
    )
    .await;

    let err = client
        .inject_torrent(&inject_request(&fixture))
        .await
        .unwrap_err();

    assert!(matches!(err, TorrentClientError::NotComplete(_)));
    assert!(state.lock().unwrap().adds.is_empty());
}

#[tokio::test]
async fn test_qbit_forbidden_triggers_single_reauthentication() {
    let fixture = injectable().await;
    let (client, state) = qbit_server(
        QbitBackend {
            torrents: HashMap::from([(
                fixture.source_hash.to_lowercase_hex(),
                qbit_torrent(1.0, "uploading", ""),
            )]),
            ..Default::default()
        },
        "admin:pw",
    )
    .await;
    client.setup().await.unwrap();
    state.lock().unwrap().forbid_info = 1;

    let info = client.get_torrent_info(&fixture.source_hash).await.unwrap();

    assert!(info.complete);
    let backend = state.lock().unwrap();
    assert_eq!(backend.logins, 2);
    assert_eq!(backend.info_calls, 2);
}

#[tokio::test]
async fn test_qbit_repeated_forbidden_is_authentication_error() {
    let fixture = injectable().await;
    let (client, state) = qbit_server(QbitBackend::default(), "admin:pw").await;
    client.setup().await.unwrap();
    state.lock().unwrap().forbid_info = 2;

    let err = client
        .get_torrent_info(&fixture.source_hash)
        .await
        .unwrap_err();

    assert!(matches!(err, TorrentClientError::AuthenticationFailed(_)));
    assert_eq!(state.lock().unwrap().info_calls, 2);
}
