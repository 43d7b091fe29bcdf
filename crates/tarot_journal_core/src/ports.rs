//! crates/tarot_journal_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core to be independent of the managed services behind them: the document
//! store, the interpretation model, and the export pipeline.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{Interpretation, Reading, ReadingRecord, StoredReading};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services
/// (e.g., database, network, model API).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Response did not match the required shape: {0}")]
    MalformedResponse(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Pagination Types
//=========================================================================================

/// An opaque marker identifying the last-seen record of a page, used to
/// continue a creation-time-descending query strictly after that record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.created_at.to_rfc3339(), self.id)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid cursor")]
pub struct InvalidCursor;

impl FromStr for Cursor {
    type Err = InvalidCursor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ts, id) = s.split_once('|').ok_or(InvalidCursor)?;
        Ok(Cursor {
            created_at: DateTime::parse_from_rfc3339(ts)
                .map_err(|_| InvalidCursor)?
                .with_timezone(&Utc),
            id: Uuid::parse_str(id).map_err(|_| InvalidCursor)?,
        })
    }
}

/// One page of a user's reading history, newest first.
#[derive(Debug, Clone)]
pub struct ReadingPage {
    pub items: Vec<StoredReading>,
    /// Cursor for the next page; present whenever items were returned.
    pub next_cursor: Option<Cursor>,
    /// True when a full page came back, i.e. more records may follow.
    pub has_more: bool,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The document store holding persisted readings, keyed by user.
#[async_trait]
pub trait ReadingRepository: Send + Sync {
    /// Appends a new reading and returns its durable identifier.
    async fn append(&self, record: ReadingRecord) -> PortResult<Uuid>;

    /// Replaces the mutable fields of an existing reading. Used by repeated
    /// saves of the same reading, which update rather than duplicate.
    async fn update(&self, id: Uuid, record: ReadingRecord) -> PortResult<()>;

    /// One page of a user's readings ordered by creation time descending,
    /// starting strictly after `cursor` when it is given.
    async fn query_page(
        &self,
        user_id: Uuid,
        cursor: Option<Cursor>,
        limit: u32,
    ) -> PortResult<ReadingPage>;

    async fn get_by_id(&self, id: Uuid) -> PortResult<StoredReading>;

    /// The single follow-up partial update after a successful export:
    /// attaches the blob URL to the persisted reading.
    async fn attach_export_url(&self, id: Uuid, url: &str) -> PortResult<()>;
}

/// The external interpretation model: one prompt in, one strictly
/// structured object out. No retry policy is owned on this side.
#[async_trait]
pub trait InterpretationService: Send + Sync {
    async fn interpret(&self, prompt: &str) -> PortResult<Interpretation>;
}

/// Renders a reading's report into a binary document.
#[async_trait]
pub trait ReportRenderer: Send + Sync {
    async fn render(&self, reading: &Reading) -> PortResult<Vec<u8>>;
}

/// Blob storage for exported documents, keyed by user and reading id.
/// Returns a durable retrieval URL.
#[async_trait]
pub trait BlobStorage: Send + Sync {
    async fn upload(&self, user_id: Uuid, reading_id: Uuid, document: Vec<u8>)
        -> PortResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_round_trips_through_display() {
        let cursor = Cursor {
            created_at: "2026-08-29T10:30:00Z".parse().unwrap(),
            id: Uuid::new_v4(),
        };
        let parsed: Cursor = cursor.to_string().parse().unwrap();
        assert_eq!(parsed, cursor);
    }

    #[test]
    fn malformed_cursors_are_rejected() {
        assert!("".parse::<Cursor>().is_err());
        assert!("not-a-date|not-a-uuid".parse::<Cursor>().is_err());
        assert!("2026-08-29T10:30:00Z".parse::<Cursor>().is_err());
    }
}
