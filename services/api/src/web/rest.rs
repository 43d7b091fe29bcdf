//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::protocol::{
    CardView, DrawRequest, DrawResponse, ExportResponse, HistoryItem, HistoryQuery,
    HistoryResponse, ReadingView, SaveResponse,
};
use crate::web::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use std::sync::Arc;
use tarot_journal_core::history::PageLoad;
use tarot_journal_core::lifecycle::{LifecycleError, FALLBACK_REPORT_HTML};
use tarot_journal_core::ports::PortError;
use tracing::error;
use utoipa::OpenApi;
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        draw_handler,
        save_handler,
        export_handler,
        history_handler,
        get_reading_handler,
    ),
    components(
        schemas(
            DrawRequest,
            DrawResponse,
            ReadingView,
            CardView,
            SaveResponse,
            ExportResponse,
            HistoryResponse,
            HistoryItem,
        )
    ),
    tags(
        (name = "Tarot Journal API", description = "API endpoints for the tarot reading journal.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Helpers
//=========================================================================================

/// One operation per session at a time: a request arriving while another is
/// in flight is rejected, not queued.
const BUSY: (StatusCode, &str) = (StatusCode::CONFLICT, "另一個操作正在進行中，請稍候");

fn lifecycle_status(err: &LifecycleError) -> (StatusCode, String) {
    match err {
        LifecycleError::EmptyQuestion => (StatusCode::BAD_REQUEST, "請輸入心中疑惑".to_string()),
        LifecycleError::Busy => (BUSY.0, BUSY.1.to_string()),
        LifecycleError::NotReady => {
            (StatusCode::CONFLICT, "目前沒有可操作的解讀".to_string())
        }
        LifecycleError::Interpretation(_) | LifecycleError::Port(_) => {
            (StatusCode::BAD_GATEWAY, "外部服務暫時無法使用".to_string())
        }
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Start a new reading: draw three cards and request an interpretation.
///
/// A failed interpretation is terminal for the attempt and is reported with
/// the fixed fallback text rather than an error status; the user re-draws
/// to retry.
#[utoipa::path(
    post,
    path = "/readings/draw",
    request_body = DrawRequest,
    responses(
        (status = 200, description = "Reading drawn; interpretation either succeeded or fell back", body = DrawResponse),
        (status = 400, description = "Empty question"),
        (status = 401, description = "Missing or invalid x-user-id header"),
        (status = 409, description = "Another operation is in flight")
    )
)]
pub async fn draw_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(request): Json<DrawRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session = app_state.user_session(user_id).await;
    let mut lifecycle = session
        .lifecycle
        .try_lock()
        .map_err(|_| (BUSY.0, BUSY.1.to_string()))?;

    match lifecycle.begin(&request.question).await {
        Ok(reading) => Ok(Json(DrawResponse {
            reading: Some(ReadingView::from_reading(reading)),
            fallback_html: None,
        })),
        Err(LifecycleError::Interpretation(e)) => {
            error!(%user_id, "interpretation failed: {e}");
            Ok(Json(DrawResponse {
                reading: None,
                fallback_html: Some(FALLBACK_REPORT_HTML.to_string()),
            }))
        }
        Err(e) => Err(lifecycle_status(&e)),
    }
}

/// Persist the current reading. Idempotent: repeated saves update the same
/// record rather than creating a second one.
#[utoipa::path(
    post,
    path = "/readings/save",
    responses(
        (status = 200, description = "Reading saved", body = SaveResponse),
        (status = 401, description = "Missing or invalid x-user-id header"),
        (status = 409, description = "No interpreted reading, or another operation is in flight"),
        (status = 502, description = "The document store rejected the save")
    )
)]
pub async fn save_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session = app_state.user_session(user_id).await;
    let mut lifecycle = session
        .lifecycle
        .try_lock()
        .map_err(|_| (BUSY.0, BUSY.1.to_string()))?;

    match lifecycle.save().await {
        Ok(reading_id) => Ok(Json(SaveResponse { reading_id })),
        Err(e) => {
            error!(%user_id, "save failed: {e}");
            Err(lifecycle_status(&e))
        }
    }
}

/// Export the current reading: save it first when it has no durable id,
/// render the report to a document, upload it, and attach the URL.
#[utoipa::path(
    post,
    path = "/readings/export",
    responses(
        (status = 200, description = "Document uploaded and linked", body = ExportResponse),
        (status = 401, description = "Missing or invalid x-user-id header"),
        (status = 409, description = "No interpreted reading, or another operation is in flight"),
        (status = 502, description = "A step of the export pipeline failed")
    )
)]
pub async fn export_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session = app_state.user_session(user_id).await;
    let mut lifecycle = session
        .lifecycle
        .try_lock()
        .map_err(|_| (BUSY.0, BUSY.1.to_string()))?;

    match lifecycle.export().await {
        Ok(report) => Ok(Json(ExportResponse::new(
            report.reading_id,
            report.url,
            report.save,
        ))),
        Err(e) => {
            error!(%user_id, "export failed: {e}");
            Err(lifecycle_status(&e))
        }
    }
}

/// Load one page of the user's reading history, newest first.
///
/// `?refresh=true` replaces the displayed list; otherwise the next page is
/// appended. A request arriving while a load is already in flight is a
/// no-op and answers with the unchanged list and `applied: false`.
#[utoipa::path(
    get,
    path = "/readings/history",
    params(
        ("refresh" = Option<bool>, Query, description = "Replace the list and restart from the newest reading.")
    ),
    responses(
        (status = 200, description = "The displayed history list", body = HistoryResponse),
        (status = 401, description = "Missing or invalid x-user-id header"),
        (status = 502, description = "The document store rejected the query")
    )
)]
pub async fn history_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session = app_state.user_session(user_id).await;

    match session.history.load(query.refresh).await {
        Ok(PageLoad::Applied(snapshot)) => Ok(Json(HistoryResponse {
            items: snapshot.items.iter().map(HistoryItem::from_stored).collect(),
            has_more: snapshot.has_more,
            applied: true,
        })),
        Ok(PageLoad::Suppressed) => {
            let snapshot = session.history.snapshot();
            Ok(Json(HistoryResponse {
                items: snapshot.items.iter().map(HistoryItem::from_stored).collect(),
                has_more: snapshot.has_more,
                applied: false,
            }))
        }
        Err(e) => {
            error!(%user_id, "history load failed: {e}");
            Err((StatusCode::BAD_GATEWAY, "載入歷史紀錄失敗".to_string()))
        }
    }
}

/// Reopen a persisted reading: reconstructs the in-memory reading from the
/// stored record (unknown card ids fall back to the default entry with a
/// logged warning) and makes it the session's current reading.
#[utoipa::path(
    get,
    path = "/readings/{id}",
    params(
        ("id" = Uuid, Path, description = "Durable id of the reading.")
    ),
    responses(
        (status = 200, description = "The reconstructed reading", body = ReadingView),
        (status = 401, description = "Missing or invalid x-user-id header"),
        (status = 404, description = "No such reading for this user"),
        (status = 409, description = "Another operation is in flight")
    )
)]
pub async fn get_reading_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let stored = app_state.repository.get_by_id(id).await.map_err(|e| match e {
        PortError::NotFound(_) => (StatusCode::NOT_FOUND, "找不到此紀錄".to_string()),
        other => {
            error!(%user_id, "reading fetch failed: {other}");
            (StatusCode::BAD_GATEWAY, "載入紀錄失敗".to_string())
        }
    })?;
    // Readings are private to their owner.
    if stored.user_id != user_id {
        return Err((StatusCode::NOT_FOUND, "找不到此紀錄".to_string()));
    }

    let session = app_state.user_session(user_id).await;
    let mut lifecycle = session
        .lifecycle
        .try_lock()
        .map_err(|_| (BUSY.0, BUSY.1.to_string()))?;

    match lifecycle.replay(&stored) {
        Ok(reading) => Ok(Json(ReadingView::from_reading(reading))),
        Err(e) => Err(lifecycle_status(&e)),
    }
}
