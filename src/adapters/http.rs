//! HTTP adapter — axum routes over [`CloudService`].
//!
//! | Route                         | Caller   | Purpose                         |
//! |-------------------------------|----------|---------------------------------|
//! | `POST /device/checkin`        | device   | signed envelope → work + FOTA   |
//! | `POST /upload`                | device   | telemetry compression report    |
//! | `POST /firmware/upload`       | operator | multipart image upload          |
//! | `GET  /firmware`              | operator | catalog manifests               |
//! | `POST /fota/queue`            | operator | start a delivery                |
//! | `GET/DELETE /fota/:device_id` | operator | session status / abort          |
//! | `POST /config`, `/command`    | operator | fill a device mailbox           |
//! | `GET  /devices/:device_id`    | operator | device summary                  |
//! | `GET  /data`, `/api/latest_data`, `/compression_report` | operator | telemetry |
//! | `GET  /health`                | any      | liveness                        |
//!
//! Every authentication failure maps to the same `401` body.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::error;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::app::commands::OperatorCommand;
use crate::app::service::{CloudService, Health};
use crate::error::{Error, FotaError, StorageError};
use crate::firmware::Manifest;
use crate::registry::DeviceStatus;
use crate::rpc::messages::CheckInResponse;
use crate::rpc::ota::SessionStatus;
use crate::telemetry::{LATEST_REPORTS, LatestReports, TelemetryRecord, UploadReceipt};

/// Headroom for multipart framing on top of the firmware size limit.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

type ApiResult<T> = Result<T, Error>;

/// Build the full router.
pub fn router(service: Arc<CloudService>) -> Router {
    let body_limit = usize::try_from(service.config().max_firmware_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        // Device channel
        .route("/device/checkin", post(check_in))
        .route("/upload", post(upload_telemetry))
        // Firmware and FOTA
        .route("/firmware/upload", post(upload_firmware))
        .route("/firmware", get(list_firmware))
        .route("/fota/queue", post(queue_update))
        .route("/fota/:device_id", get(session_status).delete(abort_update))
        // Mailboxes and device state
        .route("/config", post(queue_config))
        .route("/command", post(queue_command))
        .route("/devices/:device_id", get(device_status))
        // Telemetry views
        .route("/data", get(telemetry_records))
        .route("/api/latest_data", get(latest_reports))
        .route("/compression_report", get(compression_reports))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(service)
}

// ── Error mapping ────────────────────────────────────────────

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match self {
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::UnknownDevice
            | Self::Fota(FotaError::UnknownFirmware | FotaError::SessionNotFound)
            | Self::Storage(StorageError::NotFound) => StatusCode::NOT_FOUND,
            Self::Fota(FotaError::SessionActive | FotaError::DuplicateVersion) => {
                StatusCode::CONFLICT
            }
            Self::Fota(FotaError::InvalidChunkSize | FotaError::InvalidSize)
            | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Fota(FotaError::ChunkReadFailure) | Self::Storage(_) | Self::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = match self {
            // Never reveal which check failed.
            Self::Auth(_) => "authentication failed".to_string(),
            Self::BadRequest(msg) => msg.to_string(),
            other => other.to_string(),
        };
        if status.is_server_error() {
            error!("http: {}", message);
        }

        (status, Json(json!({ "status": "error", "message": message }))).into_response()
    }
}

/// Run blocking work off the async workers: blob I/O, and anything that
/// takes a device lock, since a check-in may hold one across a chunk read.
async fn blocking<T, F>(work: F) -> ApiResult<T>
where
    F: FnOnce() -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.unwrap_or_else(|e| {
        error!("http: blocking task failed: {}", e);
        Err(Error::Storage(StorageError::Io))
    })
}

// ── Device channel ───────────────────────────────────────────

async fn check_in(
    State(svc): State<Arc<CloudService>>,
    body: Bytes,
) -> ApiResult<Json<CheckInResponse>> {
    blocking(move || svc.check_in(&body)).await.map(Json)
}

async fn upload_telemetry(
    State(svc): State<Arc<CloudService>>,
    body: Bytes,
) -> ApiResult<Json<UploadReceipt>> {
    let payload: Value =
        serde_json::from_slice(&body).map_err(|_| Error::BadRequest("Invalid JSON"))?;
    svc.ingest_telemetry(payload).map(Json)
}

// ── Firmware and FOTA ────────────────────────────────────────

async fn upload_firmware(
    State(svc): State<Arc<CloudService>>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Manifest>)> {
    let malformed = |_| Error::BadRequest("malformed multipart body");

    let mut file: Option<Bytes> = None;
    let mut version: Option<String> = None;
    let mut chunk_size: Option<u32> = None;

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => file = Some(field.bytes().await.map_err(malformed)?),
            Some("version") => version = Some(field.text().await.map_err(malformed)?),
            Some("chunk_size") => {
                let text = field.text().await.map_err(malformed)?;
                let size = text
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| Error::BadRequest("chunk_size must be a positive integer"))?;
                chunk_size = Some(size);
            }
            _ => {}
        }
    }

    let file = file.ok_or(Error::BadRequest("missing file"))?;
    let version = version.ok_or(Error::BadRequest("missing version"))?;
    let manifest =
        blocking(move || svc.upload_firmware(version.trim(), &file, chunk_size)).await?;
    Ok((StatusCode::CREATED, Json(manifest)))
}

async fn list_firmware(State(svc): State<Arc<CloudService>>) -> Json<Vec<Manifest>> {
    Json(svc.list_firmware())
}

#[derive(Deserialize)]
struct QueueUpdateRequest {
    device_id: String,
    version: String,
}

async fn queue_update(
    State(svc): State<Arc<CloudService>>,
    Json(req): Json<QueueUpdateRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let reply = json!({ "status": "queued", "device_id": req.device_id, "version": req.version });
    let cmd = OperatorCommand::QueueUpdate {
        device_id: req.device_id,
        version: req.version,
    };
    blocking(move || svc.handle_command(cmd)).await?;
    Ok((StatusCode::ACCEPTED, Json(reply)))
}

async fn session_status(
    State(svc): State<Arc<CloudService>>,
    Path(device_id): Path<String>,
) -> ApiResult<Json<SessionStatus>> {
    blocking(move || svc.session_status(&device_id)).await.map(Json)
}

async fn abort_update(
    State(svc): State<Arc<CloudService>>,
    Path(device_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let reply = json!({ "status": "aborted", "device_id": device_id });
    blocking(move || svc.handle_command(OperatorCommand::AbortUpdate { device_id })).await?;
    Ok(Json(reply))
}

// ── Mailboxes and device state ───────────────────────────────

#[derive(Deserialize)]
struct QueueConfigRequest {
    device_id: String,
    config: Value,
}

#[derive(Deserialize)]
struct QueueCommandRequest {
    device_id: String,
    command: Value,
}

async fn queue_config(
    State(svc): State<Arc<CloudService>>,
    Json(req): Json<QueueConfigRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let reply = json!({ "status": "queued", "device_id": req.device_id });
    let cmd = OperatorCommand::QueueConfig {
        device_id: req.device_id,
        config: req.config,
    };
    blocking(move || svc.handle_command(cmd)).await?;
    Ok((StatusCode::ACCEPTED, Json(reply)))
}

async fn queue_command(
    State(svc): State<Arc<CloudService>>,
    Json(req): Json<QueueCommandRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let reply = json!({ "status": "queued", "device_id": req.device_id });
    let cmd = OperatorCommand::QueueCommand {
        device_id: req.device_id,
        command: req.command,
    };
    blocking(move || svc.handle_command(cmd)).await?;
    Ok((StatusCode::ACCEPTED, Json(reply)))
}

async fn device_status(
    State(svc): State<Arc<CloudService>>,
    Path(device_id): Path<String>,
) -> ApiResult<Json<DeviceStatus>> {
    blocking(move || svc.device_status(&device_id)).await.map(Json)
}

// ── Telemetry views ──────────────────────────────────────────

async fn telemetry_records(State(svc): State<Arc<CloudService>>) -> Json<Vec<TelemetryRecord>> {
    Json(svc.telemetry().records())
}

async fn latest_reports(State(svc): State<Arc<CloudService>>) -> Json<LatestReports> {
    Json(svc.telemetry().latest(LATEST_REPORTS))
}

async fn compression_reports(State(svc): State<Arc<CloudService>>) -> Json<Vec<Value>> {
    Json(svc.telemetry().reports())
}

async fn health(State(svc): State<Arc<CloudService>>) -> Json<Health> {
    Json(svc.health())
}
