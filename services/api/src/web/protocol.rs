//! services/api/src/web/protocol.rs
//!
//! Request and response payloads exchanged between the browser client and
//! the API server.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tarot_journal_core::domain::{DrawnCard, Reading, StoredReading};
use tarot_journal_core::lifecycle::ExportSave;
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Requests
//=========================================================================================

/// Starts a new reading.
#[derive(Deserialize, Debug, ToSchema)]
pub struct DrawRequest {
    /// The user's question. Must not be empty or whitespace-only.
    pub question: String,
}

/// Query parameters for a history page load.
#[derive(Deserialize, Debug, Default)]
pub struct HistoryQuery {
    /// When true, replaces the displayed list and restarts from the newest
    /// reading; otherwise continues after the last-seen record.
    #[serde(default)]
    pub refresh: bool,
}

//=========================================================================================
// Responses
//=========================================================================================

/// One drawn card as shown to the client.
#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CardView {
    pub card_id: String,
    pub name: String,
    pub name_cn: String,
    pub position: String,
    pub position_cn: String,
    pub is_reversed: bool,
    pub summary: String,
    pub image_url: String,
}

impl CardView {
    fn from_drawn(drawn: &DrawnCard) -> Self {
        Self {
            card_id: drawn.card.id.clone(),
            name: drawn.card.name.clone(),
            name_cn: drawn.card.name_cn.clone(),
            position: drawn.position.as_str().to_string(),
            position_cn: drawn.position.label_cn().to_string(),
            is_reversed: drawn.is_reversed,
            summary: drawn.summary().to_string(),
            image_url: drawn.card.image_url.clone(),
        }
    }
}

/// A full reading as shown to the client.
#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReadingView {
    /// Durable identifier; absent until the reading is first saved.
    pub id: Option<Uuid>,
    pub question: String,
    pub cards: Vec<CardView>,
    pub report_html: String,
    pub download_url: Option<String>,
}

impl ReadingView {
    pub fn from_reading(reading: &Reading) -> Self {
        Self {
            id: reading.id,
            question: reading.question.clone(),
            cards: reading.cards.iter().map(CardView::from_drawn).collect(),
            report_html: reading.report_html.clone(),
            download_url: reading.download_url.clone(),
        }
    }
}

/// The outcome of a draw request. A failed interpretation still answers
/// 200 with the fixed fallback report; the attempt is terminal and the
/// client invites a re-draw.
#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DrawResponse {
    pub reading: Option<ReadingView>,
    /// Present only when the interpretation failed.
    pub fallback_html: Option<String>,
}

#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveResponse {
    pub reading_id: Uuid,
}

#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExportResponse {
    pub reading_id: Uuid,
    pub download_url: String,
    /// True when the export had to save the reading first because it had
    /// no durable id yet.
    pub saved_first: bool,
}

impl ExportResponse {
    pub fn new(reading_id: Uuid, download_url: String, save: ExportSave) -> Self {
        Self {
            reading_id,
            download_url,
            saved_first: matches!(save, ExportSave::SavedFirst),
        }
    }
}

/// One history list entry.
#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub id: Uuid,
    pub question: String,
    pub report_text: String,
    pub download_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl HistoryItem {
    pub fn from_stored(stored: &StoredReading) -> Self {
        Self {
            id: stored.id,
            question: stored.question.clone(),
            report_text: stored.report_text.clone(),
            download_url: stored.download_url.clone(),
            created_at: stored.created_at,
        }
    }
}

/// The displayed history list after a page-load request.
#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub items: Vec<HistoryItem>,
    pub has_more: bool,
    /// False when the request was suppressed because another load for this
    /// user was already in flight; `items` is then the unchanged list.
    pub applied: bool,
}
