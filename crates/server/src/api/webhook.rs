//! Completion webhook: regenerate one torrent, addressed by infohash.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use crosstag_core::{
    scan_info_hash, scanner::describe, GenerateError, Generated, InfoHash, ScanError,
    ScanOutcome, TorrentClientError, Tracker,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body sent by the torrent client when a download completes
#[derive(Debug, Deserialize)]
pub struct WebhookRequest {
    /// Infohash of the completed torrent (40 hex characters, any case)
    pub infohash: String,
}

/// Result of processing one webhook
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub outcome: ScanOutcome,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracker: Option<Tracker>,
    /// The generated (or previously generated) torrent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
}

/// Error response for requests that were never processed
#[derive(Debug, Serialize)]
pub struct WebhookErrorResponse {
    pub error: String,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn webhook(
    State(state): State<Arc<AppState>>,
    Json(body): Json<WebhookRequest>,
) -> Result<(StatusCode, Json<WebhookResponse>), (StatusCode, Json<WebhookErrorResponse>)> {
    let info_hash: InfoHash = body.infohash.parse().map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(WebhookErrorResponse {
                error: format!("{}", e),
            }),
        )
    })?;

    let result = {
        let _guard = state.lock_scans().await;
        scan_info_hash(
            &info_hash,
            state.input_directory(),
            state.output_directory(),
            state.lookups(),
            state.injector(),
        )
        .await
    };

    let status = status_for(&result);
    let outcome = ScanOutcome::classify(&result);
    let (message, output) = describe(&result);

    if status.is_server_error() {
        warn!(info_hash = %info_hash, status = status.as_u16(), error = %message, "Webhook failed");
    } else {
        info!(info_hash = %info_hash, outcome = outcome.as_str(), "{}", message);
    }

    Ok((
        status,
        Json(WebhookResponse {
            outcome,
            message,
            tracker: result.as_ref().ok().map(|generated| generated.tracker),
            output,
        }),
    ))
}

/// Maps a processing result to the webhook's HTTP status.
pub fn status_for(result: &Result<Generated, ScanError>) -> StatusCode {
    match result {
        Ok(generated) if generated.already_existed => StatusCode::OK,
        Ok(_) => StatusCode::CREATED,
        Err(ScanError::UnknownInfoHash(_)) => StatusCode::NOT_FOUND,
        Err(ScanError::Generate(e)) => match e {
            GenerateError::TorrentNotFound { .. } => StatusCode::NOT_FOUND,
            GenerateError::AlreadyExists { .. } => StatusCode::CONFLICT,
            GenerateError::UnknownTracker { .. } | GenerateError::Decode { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            GenerateError::Lookup { .. } => StatusCode::BAD_GATEWAY,
            GenerateError::Write { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        },
        Err(ScanError::Injection(TorrentClientError::TorrentExistsInClient(_))) => {
            StatusCode::CONFLICT
        }
        Err(ScanError::Injection(_)) => StatusCode::BAD_GATEWAY,
        Err(ScanError::MissingInput(_) | ScanError::MissingInputDirectory(_) | ScanError::Io { .. }) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
