//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete
//! implementation of the `ReadingRepository` port from the `core` crate.
//! It handles all interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tarot_journal_core::domain::{CardRef, ReadingRecord, StoredReading};
use tarot_journal_core::ports::{Cursor, PortError, PortResult, ReadingPage, ReadingRepository};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `ReadingRepository` port.
#[derive(Clone)]
pub struct SqlxReadingRepository {
    pool: PgPool,
}

impl SqlxReadingRepository {
    /// Creates a new `SqlxReadingRepository`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ReadingRow {
    id: Uuid,
    user_id: Uuid,
    question: String,
    cards: Json<Vec<CardRef>>,
    report_text: String,
    report_html: String,
    download_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ReadingRow {
    fn to_domain(self) -> StoredReading {
        StoredReading {
            id: self.id,
            user_id: self.user_id,
            question: self.question,
            cards: self.cards.0,
            report_text: self.report_text,
            report_html: self.report_html,
            // Older rows stored an empty string before exports existed.
            download_url: self.download_url.filter(|u| !u.is_empty()),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const READING_COLUMNS: &str =
    "id, user_id, question, cards, report_text, report_html, download_url, created_at, updated_at";

//=========================================================================================
// `ReadingRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl ReadingRepository for SqlxReadingRepository {
    async fn append(&self, record: ReadingRecord) -> PortResult<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO readings (id, user_id, question, cards, report_text, report_html) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(id)
        .bind(record.user_id)
        .bind(&record.question)
        .bind(Json(&record.cards))
        .bind(&record.report_text)
        .bind(&record.report_html)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(id)
    }

    async fn update(&self, id: Uuid, record: ReadingRecord) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE readings \
             SET question = $2, cards = $3, report_text = $4, report_html = $5, updated_at = now() \
             WHERE id = $1 AND user_id = $6",
        )
        .bind(id)
        .bind(&record.question)
        .bind(Json(&record.cards))
        .bind(&record.report_text)
        .bind(&record.report_html)
        .bind(record.user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Reading {} not found", id)));
        }
        Ok(())
    }

    async fn query_page(
        &self,
        user_id: Uuid,
        cursor: Option<Cursor>,
        limit: u32,
    ) -> PortResult<ReadingPage> {
        let rows: Vec<ReadingRow> = match cursor {
            Some(cursor) => {
                sqlx::query_as(&format!(
                    "SELECT {READING_COLUMNS} FROM readings \
                     WHERE user_id = $1 AND (created_at, id) < ($2, $3) \
                     ORDER BY created_at DESC, id DESC LIMIT $4"
                ))
                .bind(user_id)
                .bind(cursor.created_at)
                .bind(cursor.id)
                .bind(i64::from(limit))
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as(&format!(
                    "SELECT {READING_COLUMNS} FROM readings \
                     WHERE user_id = $1 \
                     ORDER BY created_at DESC, id DESC LIMIT $2"
                ))
                .bind(user_id)
                .bind(i64::from(limit))
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let has_more = rows.len() as u32 == limit;
        let next_cursor = rows.last().map(|row| Cursor {
            created_at: row.created_at,
            id: row.id,
        });
        let items = rows.into_iter().map(ReadingRow::to_domain).collect();

        Ok(ReadingPage {
            items,
            next_cursor,
            has_more,
        })
    }

    async fn get_by_id(&self, id: Uuid) -> PortResult<StoredReading> {
        let row: ReadingRow = sqlx::query_as(&format!(
            "SELECT {READING_COLUMNS} FROM readings WHERE id = $1"
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Reading {} not found", id)),
            _ => PortError::Unexpected(e.to_string()),
        })?;

        Ok(row.to_domain())
    }

    async fn attach_export_url(&self, id: Uuid, url: &str) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE readings SET download_url = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(url)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Reading {} not found", id)));
        }
        Ok(())
    }
}
