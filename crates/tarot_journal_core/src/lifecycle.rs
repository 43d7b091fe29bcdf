//! crates/tarot_journal_core/src/lifecycle.rs
//!
//! The reading lifecycle state machine. One `ReadingSession` tracks a single
//! reading's progress from drawn through interpreting to ready, and then
//! coordinates saves and exports through the injected ports. A session
//! processes at most one operation at a time; new draw requests are rejected
//! while an interpretation, save, or export is in flight.

use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::domain::{DrawnCard, Reading, ReadingRecord, StoredReading};
use crate::draw;
use crate::ports::{
    BlobStorage, InterpretationService, PortError, ReadingRepository, ReportRenderer,
};
use crate::report;

/// The fixed user-facing report shown when an interpretation attempt fails.
/// The failure is terminal for that attempt; the user must re-draw to retry.
pub const FALLBACK_REPORT_HTML: &str =
    "<p class=\"report-error\">大師現在正在冥想中，請稍後再試。（連線錯誤）</p>";

/// Where a session currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No active reading.
    Idle,
    /// The draw engine is producing the spread. Transient: a draw cannot
    /// suspend, so this is never observed across an await point.
    Drawing,
    /// Waiting on the external interpretation call.
    Interpreting,
    /// An interpreted reading is available for display, save, or export.
    Ready,
    /// A persistence call is in flight. Returns to `Ready` either way.
    Saving,
    /// An export (render, upload, partial update) is in flight.
    Exporting,
    /// The interpretation attempt failed. Absorbing for this reading;
    /// only a fresh draw leaves this state.
    Failed,
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// The question was empty or whitespace-only. No state transition.
    #[error("question must not be empty")]
    EmptyQuestion,
    /// Another operation for this session is already in flight.
    #[error("another operation is already in flight")]
    Busy,
    /// There is no interpreted reading to save or export.
    #[error("no interpreted reading is available")]
    NotReady,
    /// The interpretation call failed; the session is now `Failed`.
    #[error("interpretation failed: {0}")]
    Interpretation(#[source] PortError),
    #[error(transparent)]
    Port(#[from] PortError),
}

/// How an export satisfied its requires-a-durable-id precondition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportSave {
    /// The reading had already been saved; its existing record was used.
    UsedExisting,
    /// The reading had no durable id yet, so the export saved it first.
    SavedFirst,
}

/// The outcome of a successful export.
#[derive(Debug)]
pub struct ExportReport {
    pub reading_id: Uuid,
    /// Durable retrieval URL of the uploaded document.
    pub url: String,
    pub save: ExportSave,
    /// The rendered document, offered for local retrieval.
    pub document: Vec<u8>,
}

/// A single user session's reading lifecycle. Owns the in-memory reading
/// exclusively until persistence; afterwards the repository is the system
/// of record and the in-memory copy is a projection.
pub struct ReadingSession {
    user_id: Uuid,
    catalog: Arc<Catalog>,
    repository: Arc<dyn ReadingRepository>,
    interpreter: Arc<dyn InterpretationService>,
    renderer: Arc<dyn ReportRenderer>,
    blobs: Arc<dyn BlobStorage>,
    phase: Phase,
    reading: Option<Reading>,
}

impl ReadingSession {
    pub fn new(
        user_id: Uuid,
        catalog: Arc<Catalog>,
        repository: Arc<dyn ReadingRepository>,
        interpreter: Arc<dyn InterpretationService>,
        renderer: Arc<dyn ReportRenderer>,
        blobs: Arc<dyn BlobStorage>,
    ) -> Self {
        Self {
            user_id,
            catalog,
            repository,
            interpreter,
            renderer,
            blobs,
            phase: Phase::Idle,
            reading: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The current in-memory reading, if one has been interpreted or replayed.
    pub fn reading(&self) -> Option<&Reading> {
        self.reading.as_ref()
    }

    fn in_flight(&self) -> bool {
        matches!(
            self.phase,
            Phase::Drawing | Phase::Interpreting | Phase::Saving | Phase::Exporting
        )
    }

    /// Starts a new reading: validates the question, draws a spread, and
    /// requests one interpretation. On success the session is `Ready`; on
    /// any interpretation failure it is `Failed` and the caller should show
    /// [`FALLBACK_REPORT_HTML`].
    pub async fn begin(&mut self, question: &str) -> Result<&Reading, LifecycleError> {
        if self.in_flight() {
            return Err(LifecycleError::Busy);
        }
        let question = question.trim();
        if question.is_empty() {
            return Err(LifecycleError::EmptyQuestion);
        }

        self.phase = Phase::Drawing;
        self.reading = None;
        let cards = draw::draw_spread(&self.catalog);
        self.phase = Phase::Interpreting;

        let prompt = report::build_prompt(question, &cards);
        let interpretation = match self.interpreter.interpret(&prompt).await {
            Ok(parsed) if !parsed.interpretation.trim().is_empty() => parsed,
            Ok(_) => {
                self.phase = Phase::Failed;
                warn!(user_id = %self.user_id, "interpretation response had an empty narrative");
                return Err(LifecycleError::Interpretation(PortError::MalformedResponse(
                    "empty narrative".to_string(),
                )));
            }
            Err(e) => {
                self.phase = Phase::Failed;
                error!(user_id = %self.user_id, "interpretation call failed: {e}");
                return Err(LifecycleError::Interpretation(e));
            }
        };

        let report_html = report::compose_report_html(&interpretation);
        let report_text = report::strip_html(&report_html);
        info!(user_id = %self.user_id, "reading interpreted");

        self.phase = Phase::Ready;
        Ok(self.reading.insert(Reading {
            id: None,
            user_id: self.user_id,
            question: question.to_string(),
            cards,
            report_text,
            report_html,
            download_url: None,
        }))
    }

    /// Persists the current reading. Idempotent: the first save appends and
    /// assigns the durable id, later saves update that same record. On
    /// failure the session returns to `Ready` with its state unchanged.
    pub async fn save(&mut self) -> Result<Uuid, LifecycleError> {
        if self.in_flight() {
            return Err(LifecycleError::Busy);
        }
        if self.phase != Phase::Ready {
            return Err(LifecycleError::NotReady);
        }

        self.phase = Phase::Saving;
        let result = self.persist().await;
        self.phase = Phase::Ready;
        Ok(result?)
    }

    /// Exports the current reading: ensures a durable id (saving first when
    /// there is none), renders the report to a document, uploads it, and
    /// attaches the retrieval URL to the persisted record — strictly in that
    /// order. Any step's failure aborts the remaining steps and returns the
    /// session to `Ready`.
    pub async fn export(&mut self) -> Result<ExportReport, LifecycleError> {
        if self.in_flight() {
            return Err(LifecycleError::Busy);
        }
        if self.phase != Phase::Ready {
            return Err(LifecycleError::NotReady);
        }

        self.phase = Phase::Exporting;
        let result = self.export_steps().await;
        self.phase = Phase::Ready;
        result
    }

    /// Rebuilds the in-memory reading from a persisted record, resolving
    /// card references against the catalog. Unknown identifiers are
    /// substituted with the default entry and logged as reconstruction
    /// warnings. The session becomes `Ready`, so the replayed reading can
    /// be re-saved or exported.
    pub fn replay(&mut self, stored: &StoredReading) -> Result<&Reading, LifecycleError> {
        if self.in_flight() {
            return Err(LifecycleError::Busy);
        }

        let mut cards = Vec::with_capacity(stored.cards.len());
        for card_ref in &stored.cards {
            let (card, substituted) = self.catalog.resolve(&card_ref.card_id);
            if substituted {
                warn!(
                    reading_id = %stored.id,
                    card_id = %card_ref.card_id,
                    "unknown card id during history reconstruction; substituted default entry"
                );
            }
            cards.push(DrawnCard {
                card: card.clone(),
                is_reversed: card_ref.is_reversed,
                position: card_ref.position,
            });
        }

        // Older records may predate the rich-text report; wrap the plain text.
        let report_html = if stored.report_html.is_empty() {
            format!("<p>{}</p>", stored.report_text)
        } else {
            stored.report_html.clone()
        };

        self.phase = Phase::Ready;
        Ok(self.reading.insert(Reading {
            id: Some(stored.id),
            user_id: stored.user_id,
            question: stored.question.clone(),
            cards,
            report_text: stored.report_text.clone(),
            report_html,
            download_url: stored.download_url.clone(),
        }))
    }

    async fn persist(&mut self) -> Result<Uuid, PortError> {
        let reading = self
            .reading
            .as_mut()
            .ok_or_else(|| PortError::Unexpected("no reading in memory".to_string()))?;
        let record = ReadingRecord {
            user_id: reading.user_id,
            question: reading.question.clone(),
            cards: reading.cards.iter().map(DrawnCard::to_ref).collect(),
            report_text: reading.report_text.clone(),
            report_html: reading.report_html.clone(),
        };

        match reading.id {
            Some(id) => {
                self.repository.update(id, record).await?;
                info!(reading_id = %id, "reading updated");
                Ok(id)
            }
            None => {
                let id = self.repository.append(record).await?;
                reading.id = Some(id);
                info!(reading_id = %id, "reading saved");
                Ok(id)
            }
        }
    }

    async fn export_steps(&mut self) -> Result<ExportReport, LifecycleError> {
        let save = if self.reading.as_ref().ok_or(LifecycleError::NotReady)?.id.is_some() {
            ExportSave::UsedExisting
        } else {
            self.persist().await?;
            ExportSave::SavedFirst
        };

        let reading = self.reading.as_ref().ok_or(LifecycleError::NotReady)?;
        let reading_id = reading
            .id
            .ok_or_else(|| PortError::Unexpected("missing durable id after save".to_string()))?;

        let document = self.renderer.render(reading).await?;
        let url = self
            .blobs
            .upload(reading.user_id, reading_id, document.clone())
            .await?;
        self.repository.attach_export_url(reading_id, &url).await?;

        if let Some(reading) = self.reading.as_mut() {
            reading.download_url = Some(url.clone());
        }
        info!(reading_id = %reading_id, "reading exported");

        Ok(ExportReport {
            reading_id,
            url,
            save,
            document,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CardRef, Interpretation, Position};
    use crate::ports::{Cursor, PortResult, ReadingPage};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Shared log of external calls, used to assert strict ordering.
    type CallLog = Arc<Mutex<Vec<String>>>;

    struct StubInterpreter {
        fail: bool,
    }

    #[async_trait]
    impl InterpretationService for StubInterpreter {
        async fn interpret(&self, _prompt: &str) -> PortResult<Interpretation> {
            if self.fail {
                return Err(PortError::Unexpected("network error".to_string()));
            }
            Ok(Interpretation {
                interpretation: "<p>三張牌共同指向轉機。</p>".to_string(),
                advice: vec!["保持耐心".to_string(), "主動溝通".to_string()],
                closing: "星光會指引你。".to_string(),
            })
        }
    }

    struct FakeRepository {
        log: CallLog,
        appended: Mutex<Vec<(Uuid, ReadingRecord)>>,
        updated: Mutex<Vec<(Uuid, ReadingRecord)>>,
        attached: Mutex<Vec<(Uuid, String)>>,
        fail_append: bool,
    }

    impl FakeRepository {
        fn new(log: CallLog) -> Self {
            Self {
                log,
                appended: Mutex::new(Vec::new()),
                updated: Mutex::new(Vec::new()),
                attached: Mutex::new(Vec::new()),
                fail_append: false,
            }
        }
    }

    #[async_trait]
    impl ReadingRepository for FakeRepository {
        async fn append(&self, record: ReadingRecord) -> PortResult<Uuid> {
            if self.fail_append {
                return Err(PortError::Unexpected("store unavailable".to_string()));
            }
            self.log.lock().unwrap().push("append".to_string());
            let id = Uuid::new_v4();
            self.appended.lock().unwrap().push((id, record));
            Ok(id)
        }

        async fn update(&self, id: Uuid, record: ReadingRecord) -> PortResult<()> {
            self.log.lock().unwrap().push("update".to_string());
            self.updated.lock().unwrap().push((id, record));
            Ok(())
        }

        async fn query_page(
            &self,
            _user_id: Uuid,
            _cursor: Option<Cursor>,
            _limit: u32,
        ) -> PortResult<ReadingPage> {
            unimplemented!("not used by lifecycle tests")
        }

        async fn get_by_id(&self, id: Uuid) -> PortResult<StoredReading> {
            Err(PortError::NotFound(id.to_string()))
        }

        async fn attach_export_url(&self, id: Uuid, url: &str) -> PortResult<()> {
            self.log.lock().unwrap().push("attach".to_string());
            self.attached.lock().unwrap().push((id, url.to_string()));
            Ok(())
        }
    }

    struct FakeRenderer {
        log: CallLog,
    }

    #[async_trait]
    impl ReportRenderer for FakeRenderer {
        async fn render(&self, reading: &Reading) -> PortResult<Vec<u8>> {
            self.log.lock().unwrap().push("render".to_string());
            Ok(reading.report_html.clone().into_bytes())
        }
    }

    struct FakeBlobStore {
        log: CallLog,
        fail: bool,
    }

    #[async_trait]
    impl BlobStorage for FakeBlobStore {
        async fn upload(
            &self,
            user_id: Uuid,
            reading_id: Uuid,
            _document: Vec<u8>,
        ) -> PortResult<String> {
            if self.fail {
                return Err(PortError::Unexpected("upload failed".to_string()));
            }
            self.log.lock().unwrap().push("upload".to_string());
            Ok(format!("https://blobs.test/readings/{user_id}/{reading_id}.html"))
        }
    }

    struct Fixture {
        log: CallLog,
        repository: Arc<FakeRepository>,
        session: ReadingSession,
    }

    fn fixture(interpreter_fails: bool) -> Fixture {
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let repository = Arc::new(FakeRepository::new(log.clone()));
        let session = ReadingSession::new(
            Uuid::new_v4(),
            Arc::new(Catalog::standard()),
            repository.clone(),
            Arc::new(StubInterpreter {
                fail: interpreter_fails,
            }),
            Arc::new(FakeRenderer { log: log.clone() }),
            Arc::new(FakeBlobStore {
                log: log.clone(),
                fail: false,
            }),
        );
        Fixture {
            log,
            repository,
            session,
        }
    }

    #[tokio::test]
    async fn empty_question_is_rejected_without_a_transition() {
        let mut fx = fixture(false);
        for question in ["", "   ", "\n\t"] {
            let err = fx.session.begin(question).await.unwrap_err();
            assert!(matches!(err, LifecycleError::EmptyQuestion));
            assert_eq!(fx.session.phase(), Phase::Idle);
            assert!(fx.session.reading().is_none());
        }
    }

    #[tokio::test]
    async fn successful_draw_produces_a_ready_reading_with_all_report_parts() {
        let mut fx = fixture(false);
        let reading = fx.session.begin("我最近的工作運勢如何？").await.unwrap();

        assert_eq!(reading.cards.len(), 3);
        let ids: HashSet<&str> = reading.cards.iter().map(|d| d.card.id.as_str()).collect();
        assert_eq!(ids.len(), 3);
        let positions: Vec<Position> = reading.cards.iter().map(|d| d.position).collect();
        assert_eq!(positions, Position::SPREAD.to_vec());

        assert!(reading.report_html.contains("三張牌共同指向轉機"));
        assert!(reading.report_html.contains("<li>保持耐心</li>"));
        assert!(reading.report_html.contains("星光會指引你"));
        assert!(reading.report_text.contains("主動溝通"));
        assert!(reading.id.is_none());
        assert_eq!(fx.session.phase(), Phase::Ready);
    }

    #[tokio::test]
    async fn interpretation_failure_is_terminal_and_persists_nothing() {
        let mut fx = fixture(true);
        let err = fx.session.begin("工作運勢？").await.unwrap_err();

        assert!(matches!(err, LifecycleError::Interpretation(_)));
        assert_eq!(fx.session.phase(), Phase::Failed);
        assert!(fx.session.reading().is_none());
        assert!(fx.log.lock().unwrap().is_empty());
        assert!(FALLBACK_REPORT_HTML.contains("大師現在正在冥想中"));

        // Saving or exporting a failed attempt is refused.
        assert!(matches!(
            fx.session.save().await.unwrap_err(),
            LifecycleError::NotReady
        ));

        // A fresh draw is permitted from Failed (it fails again with this stub).
        let err = fx.session.begin("再試一次").await.unwrap_err();
        assert!(matches!(err, LifecycleError::Interpretation(_)));
        assert_eq!(fx.session.phase(), Phase::Failed);
    }

    #[tokio::test]
    async fn repeated_saves_update_the_same_record() {
        let mut fx = fixture(false);
        fx.session.begin("前途如何？").await.unwrap();

        let first = fx.session.save().await.unwrap();
        let second = fx.session.save().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(fx.repository.appended.lock().unwrap().len(), 1);
        let updated = fx.repository.updated.lock().unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].0, first);
        assert_eq!(fx.session.phase(), Phase::Ready);
    }

    #[tokio::test]
    async fn saved_record_carries_card_refs_and_stripped_text() {
        let mut fx = fixture(false);
        fx.session.begin("前途如何？").await.unwrap();
        fx.session.save().await.unwrap();

        let appended = fx.repository.appended.lock().unwrap();
        let record = &appended[0].1;
        assert_eq!(record.cards.len(), 3);
        assert_eq!(record.cards[0].position, Position::Past);
        assert!(!record.report_text.contains('<'));
        assert!(record.report_html.contains("<li>"));
    }

    #[tokio::test]
    async fn export_without_prior_save_persists_first_then_uploads_then_attaches() {
        let mut fx = fixture(false);
        fx.session.begin("前途如何？").await.unwrap();

        let report = fx.session.export().await.unwrap();
        assert_eq!(report.save, ExportSave::SavedFirst);
        assert_eq!(
            *fx.log.lock().unwrap(),
            vec!["append", "render", "upload", "attach"]
        );
        assert_eq!(fx.repository.attached.lock().unwrap()[0].0, report.reading_id);
        assert_eq!(
            fx.session.reading().unwrap().download_url.as_deref(),
            Some(report.url.as_str())
        );
        assert!(!report.document.is_empty());
    }

    #[tokio::test]
    async fn export_after_a_save_reuses_the_existing_record() {
        let mut fx = fixture(false);
        fx.session.begin("前途如何？").await.unwrap();
        let saved_id = fx.session.save().await.unwrap();

        let report = fx.session.export().await.unwrap();
        assert_eq!(report.save, ExportSave::UsedExisting);
        assert_eq!(report.reading_id, saved_id);
        assert_eq!(fx.repository.appended.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_upload_aborts_the_partial_update_and_returns_to_ready() {
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let repository = Arc::new(FakeRepository::new(log.clone()));
        let mut session = ReadingSession::new(
            Uuid::new_v4(),
            Arc::new(Catalog::standard()),
            repository.clone(),
            Arc::new(StubInterpreter { fail: false }),
            Arc::new(FakeRenderer { log: log.clone() }),
            Arc::new(FakeBlobStore {
                log: log.clone(),
                fail: true,
            }),
        );

        session.begin("前途如何？").await.unwrap();
        let err = session.export().await.unwrap_err();
        assert!(matches!(err, LifecycleError::Port(_)));

        // The implicit save and the render happened; no partial update did.
        assert_eq!(*log.lock().unwrap(), vec!["append", "render"]);
        assert!(repository.attached.lock().unwrap().is_empty());
        assert_eq!(session.phase(), Phase::Ready);
        assert!(session.reading().unwrap().download_url.is_none());
    }

    #[tokio::test]
    async fn failed_save_returns_to_ready_with_state_unchanged() {
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let mut repository = FakeRepository::new(log.clone());
        repository.fail_append = true;
        let mut session = ReadingSession::new(
            Uuid::new_v4(),
            Arc::new(Catalog::standard()),
            Arc::new(repository),
            Arc::new(StubInterpreter { fail: false }),
            Arc::new(FakeRenderer { log: log.clone() }),
            Arc::new(FakeBlobStore { log, fail: false }),
        );

        session.begin("前途如何？").await.unwrap();
        assert!(session.save().await.is_err());
        assert_eq!(session.phase(), Phase::Ready);
        assert!(session.reading().unwrap().id.is_none());
    }

    #[tokio::test]
    async fn replay_substitutes_unknown_card_ids() {
        let mut fx = fixture(false);
        let stored = StoredReading {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            question: "舊的問題".to_string(),
            cards: vec![
                CardRef {
                    card_id: "maj_13".to_string(),
                    is_reversed: true,
                    position: Position::Past,
                },
                CardRef {
                    card_id: "retired_card".to_string(),
                    is_reversed: false,
                    position: Position::Present,
                },
                CardRef {
                    card_id: "swords_2".to_string(),
                    is_reversed: false,
                    position: Position::Future,
                },
            ],
            report_text: "舊的報告".to_string(),
            report_html: String::new(),
            download_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let reading = fx.session.replay(&stored).unwrap();
        assert_eq!(reading.id, Some(stored.id));
        assert_eq!(reading.cards[0].card.id, "maj_13");
        // Unknown id fell back to the first catalog entry.
        assert_eq!(reading.cards[1].card.id, "maj_0");
        // Missing rich text is wrapped from the plain text.
        assert_eq!(reading.report_html, "<p>舊的報告</p>");
        assert_eq!(fx.session.phase(), Phase::Ready);
    }
}
