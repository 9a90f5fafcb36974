//! Change poller
//!
//! The [`ChangePoller`] owns all mutable pipeline state of one account: the
//! sync cursor, the dedup cache and whether the last cursor save failed.
//!
//! ## Cycle Flow
//!
//! 1. **Cursor**: in-memory value, else the stored one, else a fresh start
//!    cursor (bootstrap, no history is replayed)
//! 2. **Fetch**: the change page since the cursor
//! 3. **Root**: look up the Clients folder by name
//! 4. **Classify**: resolve and classify each candidate change
//! 5. **Dedup**: keep candidates outside the TTL window, evict expired entries
//! 6. **Bookkeeping**: adopt and persist the next cursor, return the report
//!
//! ## Cursor Policy
//!
//! The in-memory cursor is authoritative. The durable copy is advisory: it
//! is read once when the poller has no cursor yet, and a failed save is
//! retried on the next cycle instead of failing the current one.
//!
//! Failures in steps 1 to 3 abort the cycle before anything is mutated, so
//! the cursor and dedup cache stay exactly as they were.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn, Instrument};

use drivewatch_core::config::PipelineConfig;
use drivewatch_core::domain::{AccountId, AncestorEntry, ClassifiedEvent, Cursor, CycleId, FileId};
use drivewatch_core::ports::{ICursorStore, IRemoteStore, RemoteStoreError};
use drivewatch_core::usecases::{
    AncestorResolver, DedupCache, PatternClassifier, RelevancePolicy, ResolveError,
    DEFAULT_DEDUP_TTL,
};

use crate::PipelineError;

/// Default name of the folder holding one sub-folder per client
pub const DEFAULT_ROOT_FOLDER: &str = "Clientes";

// ============================================================================
// CycleReport
// ============================================================================

/// A file that was excluded from a cycle because it could not be resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub file_id: FileId,
    pub error: PipelineError,
}

/// Result of one completed cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle_id: CycleId,
    /// Events to forward to the sinks, in change-feed order
    pub events: Vec<ClassifiedEvent>,
    /// Changes in the fetched page
    pub changes_received: usize,
    /// Removed, metadata-less, duplicate or irrelevant changes
    pub skipped: usize,
    /// Changes whose ancestry has no marker folder
    pub unmatched: usize,
    pub failures: Vec<FileFailure>,
    /// Candidates dropped by the dedup cache
    pub suppressed: usize,
    /// Dedup entries evicted at the end of the cycle
    pub evicted: usize,
    pub cursor_advanced: bool,
    /// The cycle only obtained a start cursor
    pub bootstrapped: bool,
    pub duration_ms: u64,
}

impl CycleReport {
    fn new(cycle_id: CycleId) -> Self {
        Self {
            cycle_id,
            events: Vec::new(),
            changes_received: 0,
            skipped: 0,
            unmatched: 0,
            failures: Vec::new(),
            suppressed: 0,
            evicted: 0,
            cursor_advanced: false,
            bootstrapped: false,
            duration_ms: 0,
        }
    }
}

enum CursorState {
    Ready(Cursor),
    Bootstrapped(Cursor),
}

// ============================================================================
// ChangePoller
// ============================================================================

/// Per-account orchestrator of the poll cycle
///
/// Not shareable across tasks by itself; wrap it in a
/// [`PipelineRunner`](crate::runner::PipelineRunner) to serialize triggers.
pub struct ChangePoller {
    account_id: AccountId,
    remote: Arc<dyn IRemoteStore>,
    cursor_store: Arc<dyn ICursorStore>,
    classifier: PatternClassifier,
    dedup: DedupCache,
    relevance: RelevancePolicy,
    root_folder_name: String,
    cursor: Option<Cursor>,
    persist_pending: bool,
}

impl ChangePoller {
    /// Creates a poller with default pipeline settings and no cursor
    pub fn new(
        account_id: AccountId,
        remote: Arc<dyn IRemoteStore>,
        cursor_store: Arc<dyn ICursorStore>,
    ) -> Self {
        Self {
            account_id,
            remote,
            cursor_store,
            classifier: PatternClassifier::default(),
            dedup: DedupCache::new(DEFAULT_DEDUP_TTL),
            relevance: RelevancePolicy::Any,
            root_folder_name: DEFAULT_ROOT_FOLDER.to_string(),
            cursor: None,
            persist_pending: false,
        }
    }

    /// Creates a poller configured from the `pipeline` section
    pub fn from_config(
        account_id: AccountId,
        remote: Arc<dyn IRemoteStore>,
        cursor_store: Arc<dyn ICursorStore>,
        config: &PipelineConfig,
    ) -> Self {
        Self::new(account_id, remote, cursor_store)
            .with_classifier(PatternClassifier::new(config.marker_folder_name.clone()))
            .with_dedup_ttl(config.dedup_ttl())
            .with_relevance(config.relevance.policy())
            .with_root_folder_name(config.root_folder_name.clone())
    }

    pub fn with_classifier(mut self, classifier: PatternClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Replaces the dedup cache with an empty one using `ttl`
    pub fn with_dedup_ttl(mut self, ttl: Duration) -> Self {
        self.dedup = DedupCache::new(ttl);
        self
    }

    pub fn with_relevance(mut self, relevance: RelevancePolicy) -> Self {
        self.relevance = relevance;
        self
    }

    pub fn with_root_folder_name(mut self, name: impl Into<String>) -> Self {
        self.root_folder_name = name.into();
        self
    }

    pub fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    /// The authoritative cursor, if one has been loaded or bootstrapped
    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    /// True while the in-memory cursor has not reached the cursor store
    pub fn persist_pending(&self) -> bool {
        self.persist_pending
    }

    pub fn dedup(&self) -> &DedupCache {
        &self.dedup
    }

    /// Forgets the cursor in memory and in the store
    ///
    /// The next cycle bootstraps from a fresh start cursor. The dedup cache
    /// is kept.
    pub async fn resync(&mut self) -> Result<(), PipelineError> {
        self.cursor_store
            .clear()
            .await
            .map_err(|e| PipelineError::PersistenceFailed(format!("{e:#}")))?;
        self.cursor = None;
        self.persist_pending = false;
        info!(account = %self.account_id, "Cursor cleared, next cycle will bootstrap");
        Ok(())
    }

    /// Runs one cycle at the current time
    pub async fn run_cycle(&mut self) -> Result<CycleReport, PipelineError> {
        self.run_cycle_at(Utc::now()).await
    }

    /// Runs one cycle, using `now` for relevance and dedup decisions
    ///
    /// # Errors
    ///
    /// - [`PipelineError::PersistenceFailed`] if the stored cursor cannot be read
    /// - [`PipelineError::ProviderUnavailable`] if the start cursor, the
    ///   change page or the root lookup fails
    /// - [`PipelineError::RootNotResolved`] if the Clients folder is missing
    pub async fn run_cycle_at(&mut self, now: DateTime<Utc>) -> Result<CycleReport, PipelineError> {
        let cycle_id = CycleId::new();
        let span = tracing::info_span!("cycle", account = %self.account_id, cycle_id = %cycle_id);
        self.cycle(cycle_id, now).instrument(span).await
    }

    async fn cycle(
        &mut self,
        cycle_id: CycleId,
        now: DateTime<Utc>,
    ) -> Result<CycleReport, PipelineError> {
        let started = Instant::now();
        let mut report = CycleReport::new(cycle_id);

        // Step 1: cursor
        let cursor = match self.ensure_cursor().await? {
            CursorState::Ready(cursor) => cursor,
            CursorState::Bootstrapped(cursor) => {
                info!(cursor = %cursor, "Bootstrapped from start cursor, history not replayed");
                report.bootstrapped = true;
                report.duration_ms = started.elapsed().as_millis() as u64;
                return Ok(report);
            }
        };

        // Step 2: change page
        let page = self
            .remote
            .list_changes_since(&cursor)
            .await
            .map_err(|e| PipelineError::ProviderUnavailable(e.to_string()))?;
        report.changes_received = page.events.len();
        debug!(cursor = %cursor, changes = page.events.len(), "Fetched change page");

        // Step 3: Clients root
        let root_id = match self.remote.find_folder_by_name(&self.root_folder_name).await {
            Ok(id) => id,
            Err(RemoteStoreError::NotFound(_)) => {
                return Err(PipelineError::RootNotResolved(self.root_folder_name.clone()))
            }
            Err(e) => return Err(PipelineError::ProviderUnavailable(e.to_string())),
        };
        let root = AncestorEntry::new(root_id, self.root_folder_name.clone(), Vec::new());

        // Step 4: resolve and classify
        let remote = Arc::clone(&self.remote);
        let mut resolver = AncestorResolver::new(remote.as_ref());
        let mut seen: HashSet<FileId> = HashSet::new();
        let mut candidates = Vec::new();

        for change in &page.events {
            let file_id = &change.file_id;

            let Some(meta) = change.candidate_meta() else {
                debug!(file_id = %file_id, removed = change.removed, "Skipping change without metadata");
                report.skipped += 1;
                continue;
            };

            if !seen.insert(file_id.clone()) {
                debug!(file_id = %file_id, "Skipping repeated change in page");
                report.skipped += 1;
                continue;
            }

            if !self.relevance.is_relevant(meta, now) {
                debug!(file_id = %file_id, name = %meta.name, "Skipping change outside relevance window");
                report.skipped += 1;
                continue;
            }

            let chain = match resolver.resolve_chain_to_root(file_id, &root).await {
                Ok(chain) => chain,
                Err(e) => {
                    let error = file_error(file_id, e);
                    warn!(file_id = %file_id, error = %error, "Excluding file, ancestry not resolved");
                    report.failures.push(FileFailure {
                        file_id: file_id.clone(),
                        error,
                    });
                    continue;
                }
            };

            match self.classifier.classify(&chain).into_event(file_id.clone()) {
                Some(event) => {
                    debug!(file_id = %file_id, client = %event.client_name, "Change classified");
                    candidates.push(event);
                }
                None => {
                    debug!(file_id = %file_id, depth = chain.len(), "Change outside client pattern");
                    report.unmatched += 1;
                }
            }
        }
        debug!(fetches = resolver.fetch_count(), "Ancestor resolution finished");

        // Step 5: dedup
        let now_ms = now.timestamp_millis();
        for event in candidates {
            if self.dedup.should_emit(&event.file_id, now_ms) {
                report.events.push(event);
            } else {
                debug!(file_id = %event.file_id, "Suppressed by dedup window");
                report.suppressed += 1;
            }
        }
        report.evicted = self.dedup.evict_expired(now_ms);

        // Step 6: cursor bookkeeping
        if let Some(next) = page.next_cursor {
            if next != cursor {
                debug!(from = %cursor, to = %next, "Advancing cursor");
                self.cursor = Some(next.clone());
                self.persist(&next).await;
                report.cursor_advanced = true;
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            changes = report.changes_received,
            emitted = report.events.len(),
            skipped = report.skipped,
            unmatched = report.unmatched,
            failures = report.failures.len(),
            suppressed = report.suppressed,
            cursor_advanced = report.cursor_advanced,
            duration_ms = report.duration_ms,
            "Cycle completed"
        );

        Ok(report)
    }

    async fn ensure_cursor(&mut self) -> Result<CursorState, PipelineError> {
        if let Some(cursor) = self.cursor.clone() {
            if self.persist_pending {
                debug!(cursor = %cursor, "Retrying cursor save");
                self.persist(&cursor).await;
            }
            return Ok(CursorState::Ready(cursor));
        }

        let stored = self
            .cursor_store
            .load()
            .await
            .map_err(|e| PipelineError::PersistenceFailed(format!("{e:#}")))?;

        if let Some(cursor) = stored {
            debug!(cursor = %cursor, "Loaded stored cursor");
            self.cursor = Some(cursor.clone());
            return Ok(CursorState::Ready(cursor));
        }

        let start = self
            .remote
            .get_start_cursor()
            .await
            .map_err(|e| PipelineError::ProviderUnavailable(e.to_string()))?;
        self.cursor = Some(start.clone());
        self.persist(&start).await;
        Ok(CursorState::Bootstrapped(start))
    }

    /// Saves `cursor`; a failure is logged and leaves the save pending
    async fn persist(&mut self, cursor: &Cursor) {
        match self.cursor_store.save(cursor).await {
            Ok(()) => self.persist_pending = false,
            Err(e) => {
                warn!(cursor = %cursor, error = %format!("{e:#}"), "Failed to persist cursor, retrying next cycle");
                self.persist_pending = true;
            }
        }
    }
}

fn file_error(file_id: &FileId, error: ResolveError) -> PipelineError {
    match error {
        ResolveError::Remote(RemoteStoreError::NotFound(_)) => PipelineError::NotFound(file_id.clone()),
        ResolveError::Remote(RemoteStoreError::Unavailable(msg)) => {
            PipelineError::ProviderUnavailable(msg)
        }
        ResolveError::CycleDetected(at) => PipelineError::BrokenHierarchy(at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    use chrono::TimeZone;
    use drivewatch_core::domain::{ChangeEvent, ChangePage, FileMeta};

    // ------------------------------------------------------------------
    // Fakes
    // ------------------------------------------------------------------

    #[derive(Default)]
    struct FakeRemote {
        items: Mutex<HashMap<String, AncestorEntry>>,
        pages: Mutex<HashMap<String, ChangePage>>,
        root: Mutex<Option<(String, FileId)>>,
        list_unavailable: AtomicBool,
        root_unavailable: AtomicBool,
        timeouts: Mutex<HashSet<String>>,
        list_calls: AtomicUsize,
        metadata_calls: AtomicUsize,
    }

    impl FakeRemote {
        fn folder(&self, id: &str, name: &str, parent: Option<&str>) {
            let parents = parent.map(|p| vec![fid(p)]).unwrap_or_default();
            self.items
                .lock()
                .unwrap()
                .insert(id.to_string(), AncestorEntry::new(fid(id), name, parents));
        }

        fn page(&self, cursor: &str, events: Vec<ChangeEvent>, next: &str) {
            self.pages
                .lock()
                .unwrap()
                .insert(cursor.to_string(), ChangePage::new(events, Some(cur(next))));
        }

        fn remove_item(&self, id: &str) {
            self.items.lock().unwrap().remove(id);
        }

        fn time_out(&self, id: &str) {
            self.timeouts.lock().unwrap().insert(id.to_string());
        }
    }

    #[async_trait::async_trait]
    impl IRemoteStore for FakeRemote {
        async fn get_start_cursor(&self) -> Result<Cursor, RemoteStoreError> {
            Ok(cur("start"))
        }

        async fn list_changes_since(&self, cursor: &Cursor) -> Result<ChangePage, RemoteStoreError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            if self.list_unavailable.load(Ordering::SeqCst) {
                return Err(RemoteStoreError::Unavailable("connection reset".into()));
            }
            Ok(self
                .pages
                .lock()
                .unwrap()
                .get(cursor.as_str())
                .cloned()
                .unwrap_or_else(|| ChangePage::new(Vec::new(), Some(cursor.clone()))))
        }

        async fn get_metadata(&self, file_id: &FileId) -> Result<AncestorEntry, RemoteStoreError> {
            self.metadata_calls.fetch_add(1, Ordering::SeqCst);
            if self.timeouts.lock().unwrap().contains(file_id.as_str()) {
                return Err(RemoteStoreError::Unavailable("request timed out".into()));
            }
            self.items
                .lock()
                .unwrap()
                .get(file_id.as_str())
                .cloned()
                .ok_or_else(|| RemoteStoreError::NotFound(file_id.to_string()))
        }

        async fn find_folder_by_name(&self, name: &str) -> Result<FileId, RemoteStoreError> {
            if self.root_unavailable.load(Ordering::SeqCst) {
                return Err(RemoteStoreError::Unavailable("503 backend error".into()));
            }
            match self.root.lock().unwrap().as_ref() {
                Some((root_name, id)) if root_name == name => Ok(id.clone()),
                _ => Err(RemoteStoreError::NotFound(name.to_string())),
            }
        }
    }

    #[derive(Default)]
    struct MemoryCursorStore {
        cursor: Mutex<Option<Cursor>>,
        fail_save: AtomicBool,
        fail_load: AtomicBool,
        saves: AtomicUsize,
    }

    impl MemoryCursorStore {
        fn stored(&self) -> Option<Cursor> {
            self.cursor.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl ICursorStore for MemoryCursorStore {
        async fn load(&self) -> anyhow::Result<Option<Cursor>> {
            if self.fail_load.load(Ordering::SeqCst) {
                anyhow::bail!("database is locked");
            }
            Ok(self.stored())
        }

        async fn save(&self, cursor: &Cursor) -> anyhow::Result<()> {
            if self.fail_save.load(Ordering::SeqCst) {
                anyhow::bail!("disk I/O error");
            }
            self.saves.fetch_add(1, Ordering::SeqCst);
            *self.cursor.lock().unwrap() = Some(cursor.clone());
            Ok(())
        }

        async fn clear(&self) -> anyhow::Result<()> {
            *self.cursor.lock().unwrap() = None;
            Ok(())
        }
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn fid(s: &str) -> FileId {
        FileId::new(s.to_string()).unwrap()
    }

    fn cur(s: &str) -> Cursor {
        Cursor::new(s.to_string()).unwrap()
    }

    fn t0() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn change(id: &str) -> ChangeEvent {
        ChangeEvent::updated(fid(id), FileMeta::new(id, vec![fid("month")]))
    }

    /// Clientes / ClienteX / Movimentação contábil / 2024 / 2024-03 / f1..f5
    /// plus Clientes / Outros / misc (no marker)
    fn client_tree() -> FakeRemote {
        let remote = FakeRemote::default();
        *remote.root.lock().unwrap() = Some(("Clientes".to_string(), fid("root")));
        remote.folder("client", "ClienteX", Some("root"));
        remote.folder("marker", "Movimentação contábil", Some("client"));
        remote.folder("year", "2024", Some("marker"));
        remote.folder("month", "2024-03", Some("year"));
        for i in 1..=5 {
            remote.folder(&format!("f{i}"), &format!("doc{i}.pdf"), Some("month"));
        }
        remote.folder("other", "Outros", Some("root"));
        remote.folder("misc", "notes.txt", Some("other"));
        remote
    }

    struct Harness {
        remote: Arc<FakeRemote>,
        store: Arc<MemoryCursorStore>,
        poller: ChangePoller,
    }

    fn harness(remote: FakeRemote, stored: Option<&str>) -> Harness {
        let remote = Arc::new(remote);
        let store = Arc::new(MemoryCursorStore::default());
        *store.cursor.lock().unwrap() = stored.map(cur);
        let poller = ChangePoller::new(
            AccountId::new("office".into()).unwrap(),
            remote.clone(),
            store.clone(),
        );
        Harness {
            remote,
            store,
            poller,
        }
    }

    // ------------------------------------------------------------------
    // Tests
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_first_run_bootstraps_without_listing() {
        let mut h = harness(client_tree(), None);

        let report = h.poller.run_cycle_at(t0()).await.unwrap();

        assert!(report.bootstrapped);
        assert!(report.events.is_empty());
        assert_eq!(h.poller.cursor(), Some(&cur("start")));
        assert_eq!(h.store.stored(), Some(cur("start")));
        assert_eq!(h.remote.list_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_matching_change_is_emitted_and_cursor_advances() {
        let remote = client_tree();
        remote.page("1", vec![change("f1")], "2");
        let mut h = harness(remote, Some("1"));

        let report = h.poller.run_cycle_at(t0()).await.unwrap();

        assert_eq!(report.events.len(), 1);
        let event = &report.events[0];
        assert_eq!(event.file_id, fid("f1"));
        assert_eq!(event.client_name, "ClienteX");
        assert_eq!(event.year, "2024");
        assert_eq!(event.month, "2024-03");
        assert!(report.cursor_advanced);
        assert_eq!(h.poller.cursor(), Some(&cur("2")));
        assert_eq!(h.store.stored(), Some(cur("2")));
    }

    #[tokio::test]
    async fn test_quiet_cycle_is_idempotent() {
        let remote = client_tree();
        remote.page("1", vec![change("f1")], "2");
        let mut h = harness(remote, Some("1"));

        h.poller.run_cycle_at(t0()).await.unwrap();
        let dedup_before = h.poller.dedup().len();
        let saves_before = h.store.saves.load(Ordering::SeqCst);

        let report = h
            .poller
            .run_cycle_at(t0() + chrono::Duration::seconds(12))
            .await
            .unwrap();

        assert!(report.events.is_empty());
        assert!(!report.cursor_advanced);
        assert_eq!(h.poller.cursor(), Some(&cur("2")));
        assert_eq!(h.poller.dedup().len(), dedup_before);
        assert_eq!(h.store.saves.load(Ordering::SeqCst), saves_before);
    }

    #[tokio::test]
    async fn test_repeat_within_ttl_is_suppressed_then_emitted_after() {
        let remote = client_tree();
        remote.page("1", vec![change("f1")], "2");
        remote.page("2", vec![change("f1")], "3");
        remote.page("3", vec![change("f1")], "4");
        let mut h = harness(remote, Some("1"));

        let first = h.poller.run_cycle_at(t0()).await.unwrap();
        let second = h
            .poller
            .run_cycle_at(t0() + chrono::Duration::seconds(60))
            .await
            .unwrap();
        let third = h
            .poller
            .run_cycle_at(t0() + chrono::Duration::seconds(300))
            .await
            .unwrap();

        assert_eq!(first.events.len(), 1);
        assert!(second.events.is_empty());
        assert_eq!(second.suppressed, 1);
        assert_eq!(third.events.len(), 1);
        assert_eq!(h.poller.cursor(), Some(&cur("4")));
    }

    #[tokio::test]
    async fn test_unmatched_change_emits_nothing() {
        let remote = client_tree();
        remote.page(
            "1",
            vec![ChangeEvent::updated(
                fid("misc"),
                FileMeta::new("notes.txt", vec![fid("other")]),
            )],
            "2",
        );
        let mut h = harness(remote, Some("1"));

        let report = h.poller.run_cycle_at(t0()).await.unwrap();

        assert!(report.events.is_empty());
        assert_eq!(report.unmatched, 1);
        assert!(h.poller.dedup().is_empty());
        assert!(report.cursor_advanced);
    }

    #[tokio::test]
    async fn test_marker_folder_change_uses_sentinels() {
        let remote = client_tree();
        remote.folder("y-client", "ClienteY", Some("root"));
        remote.folder("y-marker", "Movimentação contábil", Some("y-client"));
        remote.page(
            "1",
            vec![ChangeEvent::updated(
                fid("y-marker"),
                FileMeta::new("Movimentação contábil", vec![fid("y-client")]),
            )],
            "2",
        );
        let mut h = harness(remote, Some("1"));

        let report = h.poller.run_cycle_at(t0()).await.unwrap();

        assert_eq!(report.events.len(), 1);
        assert_eq!(report.events[0].client_name, "ClienteY");
        assert_eq!(report.events[0].year, "N/C");
        assert_eq!(report.events[0].month, "N/C");
    }

    #[tokio::test]
    async fn test_missing_file_excludes_only_that_file() {
        let remote = client_tree();
        remote.remove_item("f3");
        remote.page(
            "1",
            (1..=5).map(|i| change(&format!("f{i}"))).collect(),
            "2",
        );
        let mut h = harness(remote, Some("1"));

        let report = h.poller.run_cycle_at(t0()).await.unwrap();

        let emitted: Vec<_> = report.events.iter().map(|e| e.file_id.as_str()).collect();
        assert_eq!(emitted, vec!["f1", "f2", "f4", "f5"]);
        assert_eq!(
            report.failures,
            vec![FileFailure {
                file_id: fid("f3"),
                error: PipelineError::NotFound(fid("f3")),
            }]
        );
        assert!(report.cursor_advanced);
        assert_eq!(h.store.stored(), Some(cur("2")));
    }

    #[tokio::test]
    async fn test_timed_out_lookup_excludes_only_that_file() {
        let remote = client_tree();
        remote.time_out("f2");
        remote.page("1", vec![change("f1"), change("f2"), change("f3")], "2");
        let mut h = harness(remote, Some("1"));

        let report = h.poller.run_cycle_at(t0()).await.unwrap();

        let emitted: Vec<_> = report.events.iter().map(|e| e.file_id.as_str()).collect();
        assert_eq!(emitted, vec!["f1", "f3"]);
        assert_eq!(
            report.failures,
            vec![FileFailure {
                file_id: fid("f2"),
                error: PipelineError::ProviderUnavailable("request timed out".into()),
            }]
        );
        assert!(report.cursor_advanced);
        assert_eq!(h.store.stored(), Some(cur("2")));
    }

    #[tokio::test]
    async fn test_parent_loop_is_reported_as_broken_hierarchy() {
        let remote = client_tree();
        remote.folder("f2", "doc2.pdf", Some("loop_a"));
        remote.folder("loop_a", "A", Some("loop_b"));
        remote.folder("loop_b", "B", Some("loop_a"));
        remote.page("1", vec![change("f1"), change("f2")], "2");
        let mut h = harness(remote, Some("1"));

        let report = h.poller.run_cycle_at(t0()).await.unwrap();

        assert_eq!(report.events.len(), 1);
        assert_eq!(report.events[0].file_id, fid("f1"));
        assert_eq!(
            report.failures,
            vec![FileFailure {
                file_id: fid("f2"),
                error: PipelineError::BrokenHierarchy(fid("loop_a")),
            }]
        );
        assert_eq!(h.store.stored(), Some(cur("2")));
    }

    #[tokio::test]
    async fn test_root_lookup_outage_aborts_and_keeps_state() {
        let remote = client_tree();
        remote.page("1", vec![change("f1")], "2");
        let mut h = harness(remote, Some("1"));
        h.remote.root_unavailable.store(true, Ordering::SeqCst);

        let err = h.poller.run_cycle_at(t0()).await.unwrap_err();

        assert!(matches!(err, PipelineError::ProviderUnavailable(ref msg) if msg.contains("503")));
        assert_eq!(h.poller.cursor(), Some(&cur("1")));
        assert_eq!(h.store.stored(), Some(cur("1")));
        assert!(h.poller.dedup().is_empty());

        h.remote.root_unavailable.store(false, Ordering::SeqCst);
        let report = h.poller.run_cycle_at(t0()).await.unwrap();
        assert_eq!(report.events.len(), 1);
        assert_eq!(h.store.stored(), Some(cur("2")));
    }

    #[tokio::test]
    async fn test_missing_root_aborts_and_keeps_state() {
        let remote = client_tree();
        *remote.root.lock().unwrap() = None;
        remote.page("1", vec![change("f1")], "2");
        let mut h = harness(remote, Some("1"));

        let err = h.poller.run_cycle_at(t0()).await.unwrap_err();

        assert_eq!(err, PipelineError::RootNotResolved("Clientes".into()));
        assert_eq!(h.store.stored(), Some(cur("1")));
        assert_eq!(h.poller.cursor(), Some(&cur("1")));
        assert!(h.poller.dedup().is_empty());
    }

    #[tokio::test]
    async fn test_page_fetch_failure_aborts_and_keeps_state() {
        let remote = client_tree();
        remote.page("1", vec![change("f1")], "2");
        let mut h = harness(remote, Some("1"));
        h.remote.list_unavailable.store(true, Ordering::SeqCst);

        let err = h.poller.run_cycle_at(t0()).await.unwrap_err();
        assert!(matches!(err, PipelineError::ProviderUnavailable(_)));
        assert_eq!(h.poller.cursor(), Some(&cur("1")));

        // Same page is processed once the store recovers
        h.remote.list_unavailable.store(false, Ordering::SeqCst);
        let report = h.poller.run_cycle_at(t0()).await.unwrap();
        assert_eq!(report.events.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_save_is_retried_next_cycle() {
        let remote = client_tree();
        remote.page("1", vec![change("f1")], "2");
        let mut h = harness(remote, Some("1"));
        h.store.fail_save.store(true, Ordering::SeqCst);

        let report = h.poller.run_cycle_at(t0()).await.unwrap();
        assert_eq!(report.events.len(), 1);
        assert_eq!(h.poller.cursor(), Some(&cur("2")));
        assert!(h.poller.persist_pending());
        assert_eq!(h.store.stored(), Some(cur("1")));

        h.store.fail_save.store(false, Ordering::SeqCst);
        h.poller
            .run_cycle_at(t0() + chrono::Duration::seconds(12))
            .await
            .unwrap();
        assert!(!h.poller.persist_pending());
        assert_eq!(h.store.stored(), Some(cur("2")));
    }

    #[tokio::test]
    async fn test_load_failure_is_fatal() {
        let mut h = harness(client_tree(), Some("1"));
        h.store.fail_load.store(true, Ordering::SeqCst);

        let err = h.poller.run_cycle_at(t0()).await.unwrap_err();

        assert!(matches!(err, PipelineError::PersistenceFailed(_)));
        assert!(h.poller.cursor().is_none());
        assert_eq!(h.remote.list_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_duplicates_and_removals_are_skipped() {
        let remote = client_tree();
        remote.page(
            "1",
            vec![
                change("f1"),
                ChangeEvent::removed(fid("gone")),
                change("f1"),
                change("f2"),
            ],
            "2",
        );
        let mut h = harness(remote, Some("1"));

        let report = h.poller.run_cycle_at(t0()).await.unwrap();

        assert_eq!(report.changes_received, 4);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.events.len(), 2);
    }

    #[tokio::test]
    async fn test_shared_ancestors_fetched_once_per_cycle() {
        let remote = client_tree();
        remote.page("1", vec![change("f1"), change("f2")], "2");
        let mut h = harness(remote, Some("1"));

        h.poller.run_cycle_at(t0()).await.unwrap();

        // f1, month, year, marker, client, then only f2
        assert_eq!(h.remote.metadata_calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_created_within_policy_filters_old_files() {
        let remote = client_tree();
        let fresh = FileMeta::new("doc1.pdf", vec![fid("month")])
            .with_created_at(t0() - chrono::Duration::seconds(5));
        let stale = FileMeta::new("doc2.pdf", vec![fid("month")])
            .with_created_at(t0() - chrono::Duration::hours(2));
        remote.page(
            "1",
            vec![
                ChangeEvent::updated(fid("f1"), fresh),
                ChangeEvent::updated(fid("f2"), stale),
            ],
            "2",
        );
        let h = harness(remote, Some("1"));
        let mut poller = h
            .poller
            .with_relevance(RelevancePolicy::CreatedWithin(Duration::from_secs(10)));

        let report = poller.run_cycle_at(t0()).await.unwrap();

        assert_eq!(report.events.len(), 1);
        assert_eq!(report.events[0].file_id, fid("f1"));
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test]
    async fn test_resync_bootstraps_again() {
        let mut h = harness(client_tree(), Some("1"));
        h.poller.run_cycle_at(t0()).await.unwrap();

        h.poller.resync().await.unwrap();
        assert!(h.poller.cursor().is_none());
        assert!(h.store.stored().is_none());

        let report = h.poller.run_cycle_at(t0()).await.unwrap();
        assert!(report.bootstrapped);
        assert_eq!(h.store.stored(), Some(cur("start")));
    }

    #[tokio::test]
    async fn test_custom_root_name() {
        let remote = client_tree();
        *remote.root.lock().unwrap() = Some(("Clients".to_string(), fid("root")));
        remote.page("1", vec![change("f1")], "2");
        let h = harness(remote, Some("1"));
        let mut poller = h.poller.with_root_folder_name("Clients");

        let report = poller.run_cycle_at(t0()).await.unwrap();

        assert_eq!(report.events.len(), 1);
    }
}
