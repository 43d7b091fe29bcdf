//! crates/tarot_journal_core/src/history.rs
//!
//! Paginated reading history for one user: a thin wrapper over the
//! repository port that owns the displayed list, the continuation cursor,
//! and the at-most-one-in-flight-load guard.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::warn;
use uuid::Uuid;

use crate::domain::StoredReading;
use crate::ports::{Cursor, PortResult, ReadingRepository};

/// Fixed page size for history queries.
pub const PAGE_SIZE: u32 = 12;

/// The outcome of a page-load request.
#[derive(Debug)]
pub enum PageLoad {
    /// The page was fetched and applied; this is the full displayed list.
    Applied(PageSnapshot),
    /// Another load for this pager was already in flight; nothing was
    /// fetched and nothing was applied.
    Suppressed,
}

/// A snapshot of the displayed history list after a load.
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    pub items: Vec<StoredReading>,
    pub has_more: bool,
}

struct PagerState {
    items: Vec<StoredReading>,
    cursor: Option<Cursor>,
    has_more: bool,
}

/// Clears the in-flight flag when dropped, so the guard is released on
/// every exit path, including the caller dropping the load future
/// mid-await.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// One user's paginated history view, newest reading first.
pub struct HistoryPager {
    repository: Arc<dyn ReadingRepository>,
    user_id: Uuid,
    in_flight: AtomicBool,
    state: Mutex<PagerState>,
}

impl HistoryPager {
    pub fn new(repository: Arc<dyn ReadingRepository>, user_id: Uuid) -> Self {
        Self {
            repository,
            user_id,
            in_flight: AtomicBool::new(false),
            state: Mutex::new(PagerState {
                items: Vec::new(),
                cursor: None,
                has_more: true,
            }),
        }
    }

    /// Loads one page. A refresh replaces the displayed list and restarts
    /// from the newest reading; a continuation appends the page after the
    /// last-seen cursor. Concurrent calls while a load is in flight are
    /// suppressed so the displayed list never receives duplicate appends.
    pub async fn load(&self, refresh: bool) -> PortResult<PageLoad> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            warn!(user_id = %self.user_id, "history load suppressed; another load is in flight");
            return Ok(PageLoad::Suppressed);
        }
        let _in_flight = InFlightGuard(&self.in_flight);

        let cursor = if refresh {
            None
        } else {
            self.state.lock().expect("pager state poisoned").cursor.clone()
        };

        let page = self
            .repository
            .query_page(self.user_id, cursor, PAGE_SIZE)
            .await?;

        let mut state = self.state.lock().expect("pager state poisoned");
        if refresh {
            state.items.clear();
            state.cursor = None;
        }
        state.items.extend(page.items);
        // An empty continuation keeps the previous cursor so a later
        // load does not restart from the top.
        if page.next_cursor.is_some() {
            state.cursor = page.next_cursor;
        }
        state.has_more = page.has_more;
        Ok(PageLoad::Applied(PageSnapshot {
            items: state.items.clone(),
            has_more: state.has_more,
        }))
    }

    /// The currently displayed list.
    pub fn snapshot(&self) -> PageSnapshot {
        let state = self.state.lock().expect("pager state poisoned");
        PageSnapshot {
            items: state.items.clone(),
            has_more: state.has_more,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ReadingRecord;
    use crate::ports::{PortError, ReadingPage};
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use std::collections::HashSet;
    use tokio::sync::Notify;

    fn stored(user_id: Uuid, age_seconds: i64) -> StoredReading {
        let at = Utc::now() - Duration::seconds(age_seconds);
        StoredReading {
            id: Uuid::new_v4(),
            user_id,
            question: format!("question {age_seconds}"),
            cards: Vec::new(),
            report_text: String::new(),
            report_html: String::new(),
            download_url: None,
            created_at: at,
            updated_at: at,
        }
    }

    /// An in-memory repository with keyset pagination, newest first.
    struct MemoryRepository {
        readings: Mutex<Vec<StoredReading>>,
    }

    impl MemoryRepository {
        fn with_readings(user_id: Uuid, count: i64) -> Self {
            // Newest first: smaller age sorts earlier.
            let readings = (0..count).map(|i| stored(user_id, i)).collect();
            Self {
                readings: Mutex::new(readings),
            }
        }

        fn set_readings(&self, readings: Vec<StoredReading>) {
            *self.readings.lock().unwrap() = readings;
        }
    }

    #[async_trait]
    impl ReadingRepository for MemoryRepository {
        async fn append(&self, _record: ReadingRecord) -> PortResult<Uuid> {
            unimplemented!("not used by pagination tests")
        }

        async fn update(&self, _id: Uuid, _record: ReadingRecord) -> PortResult<()> {
            unimplemented!("not used by pagination tests")
        }

        async fn query_page(
            &self,
            user_id: Uuid,
            cursor: Option<Cursor>,
            limit: u32,
        ) -> PortResult<ReadingPage> {
            let items: Vec<StoredReading> = self
                .readings
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.user_id == user_id)
                .filter(|r| match &cursor {
                    Some(c) => r.created_at < c.created_at,
                    None => true,
                })
                .take(limit as usize)
                .cloned()
                .collect();
            let next_cursor = items.last().map(|r| Cursor {
                created_at: r.created_at,
                id: r.id,
            });
            let has_more = items.len() == limit as usize;
            Ok(ReadingPage {
                items,
                next_cursor,
                has_more,
            })
        }

        async fn get_by_id(&self, id: Uuid) -> PortResult<StoredReading> {
            Err(PortError::NotFound(id.to_string()))
        }

        async fn attach_export_url(&self, _id: Uuid, _url: &str) -> PortResult<()> {
            unimplemented!("not used by pagination tests")
        }
    }

    /// A repository whose query blocks until released, to exercise the
    /// in-flight guard.
    struct GatedRepository {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl ReadingRepository for GatedRepository {
        async fn append(&self, _record: ReadingRecord) -> PortResult<Uuid> {
            unimplemented!()
        }

        async fn update(&self, _id: Uuid, _record: ReadingRecord) -> PortResult<()> {
            unimplemented!()
        }

        async fn query_page(
            &self,
            _user_id: Uuid,
            _cursor: Option<Cursor>,
            _limit: u32,
        ) -> PortResult<ReadingPage> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(ReadingPage {
                items: Vec::new(),
                next_cursor: None,
                has_more: false,
            })
        }

        async fn get_by_id(&self, id: Uuid) -> PortResult<StoredReading> {
            Err(PortError::NotFound(id.to_string()))
        }

        async fn attach_export_url(&self, _id: Uuid, _url: &str) -> PortResult<()> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn two_pages_are_ordered_and_disjoint() {
        let user_id = Uuid::new_v4();
        let repository = Arc::new(MemoryRepository::with_readings(user_id, 30));
        let pager = HistoryPager::new(repository, user_id);

        let first = match pager.load(true).await.unwrap() {
            PageLoad::Applied(snapshot) => snapshot,
            PageLoad::Suppressed => panic!("first load was suppressed"),
        };
        assert_eq!(first.items.len(), 12);
        assert!(first.has_more);

        let last_seen = first.items.last().unwrap().created_at;
        let second = match pager.load(false).await.unwrap() {
            PageLoad::Applied(snapshot) => snapshot,
            PageLoad::Suppressed => panic!("second load was suppressed"),
        };
        assert_eq!(second.items.len(), 24);

        // The continuation is strictly after the last-seen creation time.
        assert!(second.items[12..]
            .iter()
            .all(|r| r.created_at < last_seen));
        let ids: HashSet<Uuid> = second.items.iter().map(|r| r.id).collect();
        assert_eq!(ids.len(), 24, "duplicate ids across pages");

        // Newest first throughout.
        assert!(second
            .items
            .windows(2)
            .all(|w| w[0].created_at > w[1].created_at));
    }

    #[tokio::test]
    async fn refresh_replaces_the_displayed_list() {
        let user_id = Uuid::new_v4();
        let repository = Arc::new(MemoryRepository::with_readings(user_id, 5));
        let pager = HistoryPager::new(repository, user_id);

        for _ in 0..2 {
            match pager.load(true).await.unwrap() {
                PageLoad::Applied(snapshot) => {
                    assert_eq!(snapshot.items.len(), 5);
                    assert!(!snapshot.has_more);
                }
                PageLoad::Suppressed => panic!("load was suppressed"),
            }
        }
        assert_eq!(pager.snapshot().items.len(), 5);
    }

    #[tokio::test]
    async fn short_final_page_reports_no_more() {
        let user_id = Uuid::new_v4();
        let repository = Arc::new(MemoryRepository::with_readings(user_id, 15));
        let pager = HistoryPager::new(repository, user_id);

        pager.load(true).await.unwrap();
        match pager.load(false).await.unwrap() {
            PageLoad::Applied(snapshot) => {
                assert_eq!(snapshot.items.len(), 15);
                assert!(!snapshot.has_more);
            }
            PageLoad::Suppressed => panic!("load was suppressed"),
        }
    }

    #[tokio::test]
    async fn other_users_readings_are_not_visible() {
        let user_id = Uuid::new_v4();
        let repository = MemoryRepository::with_readings(user_id, 3);
        repository
            .readings
            .lock()
            .unwrap()
            .extend((0..3).map(|i| stored(Uuid::new_v4(), i)));
        let pager = HistoryPager::new(Arc::new(repository), user_id);

        match pager.load(true).await.unwrap() {
            PageLoad::Applied(snapshot) => {
                assert_eq!(snapshot.items.len(), 3);
                assert!(snapshot.items.iter().all(|r| r.user_id == user_id));
            }
            PageLoad::Suppressed => panic!("load was suppressed"),
        }
    }

    #[tokio::test]
    async fn empty_refresh_clears_the_continuation_cursor() {
        let user_id = Uuid::new_v4();
        let repository = Arc::new(MemoryRepository::with_readings(user_id, 30));
        let pager = HistoryPager::new(repository.clone(), user_id);

        pager.load(true).await.unwrap();

        // All readings disappear; a refresh shows an empty list.
        repository.set_readings(Vec::new());
        match pager.load(true).await.unwrap() {
            PageLoad::Applied(snapshot) => assert!(snapshot.items.is_empty()),
            PageLoad::Suppressed => panic!("refresh was suppressed"),
        }

        // New readings are newer than the pre-refresh cursor; a continuation
        // must see them rather than filter against a stale cursor.
        repository.set_readings((0..3).map(|i| stored(user_id, i)).collect());
        match pager.load(false).await.unwrap() {
            PageLoad::Applied(snapshot) => assert_eq!(snapshot.items.len(), 3),
            PageLoad::Suppressed => panic!("load was suppressed"),
        }
    }

    #[tokio::test]
    async fn cancelled_load_releases_the_guard() {
        let repository = Arc::new(GatedRepository {
            entered: Notify::new(),
            release: Notify::new(),
        });
        let pager = Arc::new(HistoryPager::new(repository.clone(), Uuid::new_v4()));

        // Drop a load while it is inside the repository call, as happens
        // when the client disconnects mid-request.
        let background = {
            let pager = pager.clone();
            tokio::spawn(async move { pager.load(true).await })
        };
        repository.entered.notified().await;
        background.abort();
        assert!(background.await.unwrap_err().is_cancelled());

        // A later load proceeds instead of being suppressed forever.
        let background = {
            let pager = pager.clone();
            tokio::spawn(async move { pager.load(true).await })
        };
        repository.entered.notified().await;
        repository.release.notify_one();
        assert!(matches!(
            background.await.unwrap().unwrap(),
            PageLoad::Applied(_)
        ));
    }

    #[tokio::test]
    async fn concurrent_load_is_suppressed() {
        let repository = Arc::new(GatedRepository {
            entered: Notify::new(),
            release: Notify::new(),
        });
        let pager = Arc::new(HistoryPager::new(repository.clone(), Uuid::new_v4()));

        let background = {
            let pager = pager.clone();
            tokio::spawn(async move { pager.load(true).await })
        };

        // Wait until the first load is inside the repository call.
        repository.entered.notified().await;

        let second = pager.load(true).await.unwrap();
        assert!(matches!(second, PageLoad::Suppressed));

        repository.release.notify_one();
        let first = background.await.unwrap().unwrap();
        assert!(matches!(first, PageLoad::Applied(_)));

        // The guard is released; a later load proceeds again.
        let background = {
            let pager = pager.clone();
            tokio::spawn(async move { pager.load(true).await })
        };
        repository.entered.notified().await;
        repository.release.notify_one();
        assert!(matches!(
            background.await.unwrap().unwrap(),
            PageLoad::Applied(_)
        ));
    }
}
