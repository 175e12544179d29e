// Hotedit - Active statement tracking for live-edit debugging
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! The per-debugging-session span table.
//!
//! A [`TrackingSession`] maps file paths to the tracking spans of the active
//! statements in that file. Entries are created by the bulk initializer started
//! with the session, by per-document initializers triggered when the host opens
//! a document, and by adjusted-span requests. Whichever writer gets to a file
//! first wins; later initializers leave the entry alone. An initializer whose
//! file is closed while it waits on the provider drops its result.
//!
//! The table mutex is only held for map lookups and replacements, never across
//! provider or host calls. Entries are replaced as whole arrays, so a reader that
//! cloned an entry always sees a consistent set of spans.

use std::{
    collections::{HashMap, HashSet},
    future::Future,
    path::{Path, PathBuf},
    sync::{Arc, Weak},
};

use hotedit_common::{
    hotedit_assert, ActiveStatementSpan, Document, DocumentEventListener, DocumentId,
    HostWorkspace, Solution, SubscriptionId, TextSnapshot,
};
use itertools::Itertools;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, trace};

use super::{create_tracking_spans, reconcile, to_active_statement_spans, TrackingSpan};
use crate::{
    fault::report_unless_cancelled, ActiveStatementSpanLookup, FaultReporter, SpanProviderAdapter,
    TrackingConfig, TrackingError, TrackingResult,
};

/// Tracked spans per file, plus a counter per file bumped on every close.
///
/// Initializers capture the close generation of a file before asking the
/// provider and drop their result if the file was closed in the meantime.
#[derive(Default)]
struct SpanTable {
    spans: HashMap<PathBuf, Arc<[TrackingSpan]>>,
    close_generations: HashMap<PathBuf, u64>,
}

impl SpanTable {
    fn close_generation(&self, path: &Path) -> u64 {
        self.close_generations.get(path).copied().unwrap_or_default()
    }

    /// Removes the entry of `path` and invalidates in-flight initializers for it.
    fn close(&mut self, path: &Path) -> bool {
        *self.close_generations.entry(path.to_path_buf()).or_default() += 1;
        self.spans.remove(path).is_some()
    }

    fn clear(&mut self) {
        self.spans.clear();
        self.close_generations.clear();
    }
}

fn empty_spans() -> Arc<[TrackingSpan]> {
    Arc::from(Vec::new())
}

/// State of one debugging session's active statement tracking.
pub struct TrackingSession {
    workspace: Arc<dyn HostWorkspace>,
    provider: SpanProviderAdapter,
    fault_reporter: Arc<dyn FaultReporter>,
    tracking_spans: Mutex<SpanTable>,
    cancellation: CancellationToken,
    tasks: TaskTracker,
    runtime: Handle,
    subscription: Mutex<Option<SubscriptionId>>,
    track_opened_documents: bool,
}

/// Forwards host notifications to a session without keeping it alive.
struct SessionListener {
    session: Weak<TrackingSession>,
}

impl DocumentEventListener for SessionListener {
    fn document_opened(&self, document: &Document) {
        if let Some(session) = self.session.upgrade() {
            session.on_document_opened(document);
        }
    }

    fn document_closed(&self, document: &Document) {
        if let Some(session) = self.session.upgrade() {
            session.on_document_closed(document);
        }
    }
}

impl TrackingSession {
    /// Creates a session. Background work is spawned on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// If called outside of a Tokio runtime.
    pub fn new(
        workspace: Arc<dyn HostWorkspace>,
        provider: SpanProviderAdapter,
        fault_reporter: Arc<dyn FaultReporter>,
        config: &TrackingConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            workspace,
            provider,
            fault_reporter,
            tracking_spans: Mutex::new(SpanTable::default()),
            cancellation: CancellationToken::new(),
            tasks: TaskTracker::new(),
            runtime: Handle::current(),
            subscription: Mutex::new(None),
            track_opened_documents: config.track_opened_documents,
        })
    }

    /// Subscribes to document events and starts initializing the documents
    /// open in `solution` in the background.
    pub fn start(self: &Arc<Self>, solution: Solution) {
        let listener = Arc::new(SessionListener { session: Arc::downgrade(self) });
        *self.subscription.lock() = Some(self.workspace.subscribe(listener));

        debug!(documents = solution.len(), "starting active statement tracking");
        let session = self.clone();
        self.spawn("start", async move { session.initialize_open_documents(solution).await });
    }

    fn spawn<F>(&self, operation: &'static str, work: F)
    where
        F: Future<Output = TrackingResult<()>> + Send + 'static,
    {
        let reporter = self.fault_reporter.clone();
        self.tasks.spawn_on(
            async move {
                if let Err(error) = work.await {
                    report_unless_cancelled(reporter.as_ref(), operation, error);
                }
            },
            &self.runtime,
        );
    }

    /// The trackable compile-time document behind `id`, if any.
    fn trackable_document<'a>(
        &self,
        solution: &'a Solution,
        id: DocumentId,
    ) -> Option<&'a Document> {
        let Some(mapped) = self.workspace.map_to_compile_time_document(solution, id) else {
            trace!(%id, "document has no compile-time counterpart");
            return None;
        };
        let document = solution.document(mapped)?;
        if !document.is_trackable() {
            trace!(%id, kind = ?document.kind, "document cannot be tracked");
            return None;
        }
        Some(document)
    }

    async fn initialize_open_documents(&self, solution: Solution) -> TrackingResult<()> {
        // taken before reading the open set so a close racing with it is detected
        let generations = self.tracking_spans.lock().close_generations.clone();
        let mut seen = HashSet::new();
        let documents = self
            .workspace
            .open_document_ids()
            .into_iter()
            .filter_map(|id| self.trackable_document(&solution, id))
            .filter(|document| seen.insert(document.id))
            .collect::<Vec<_>>();
        if documents.is_empty() {
            debug!("no open documents to track");
            return Ok(());
        }

        let ids = documents.iter().map(|d| d.id).collect::<Vec<_>>();
        let baseline = tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => return Err(TrackingError::Cancelled),
            result = self.provider.baseline_spans(&solution, &ids) => result?,
        };
        let Some(baseline) = baseline else {
            return Ok(());
        };

        let mut table = self.tracking_spans.lock();
        if self.cancellation.is_cancelled() {
            return Err(TrackingError::Cancelled);
        }
        for (document, spans) in documents.into_iter().zip(baseline) {
            let generation = document
                .file_path
                .as_deref()
                .and_then(|path| generations.get(path).copied())
                .unwrap_or_default();
            insert_if_absent(&mut table, document, &spans, generation);
        }
        debug!(files = table.spans.len(), "initialized active statement tracking");
        Ok(())
    }

    /// Starts initializing `document` if it is not tracked yet. Returns immediately.
    pub fn on_document_opened(self: &Arc<Self>, document: &Document) {
        if !self.track_opened_documents || self.cancellation.is_cancelled() {
            return;
        }
        let session = self.clone();
        let document_id = document.id;
        self.spawn("document opened", async move {
            session.initialize_document(document_id).await
        });
    }

    async fn initialize_document(&self, document_id: DocumentId) -> TrackingResult<()> {
        let solution = self.workspace.current_solution();
        let Some(document) = self.trackable_document(&solution, document_id) else {
            return Ok(());
        };
        let Some(path) = document.file_path.as_deref() else {
            return Ok(());
        };
        let generation = {
            let table = self.tracking_spans.lock();
            if table.spans.contains_key(path) {
                trace!(?path, "file already tracked");
                return Ok(());
            }
            table.close_generation(path)
        };
        if !self.workspace.open_document_ids().contains(&document_id) {
            trace!(%document_id, "document closed before initialization");
            return Ok(());
        }

        let baseline = tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => return Err(TrackingError::Cancelled),
            result = self.provider.document_baseline(&solution, document.id) => result?,
        };
        let Some(spans) = baseline else {
            return Ok(());
        };

        let mut table = self.tracking_spans.lock();
        if self.cancellation.is_cancelled() {
            return Err(TrackingError::Cancelled);
        }
        insert_if_absent(&mut table, document, &spans, generation);
        Ok(())
    }

    /// Stops tracking the file of `document`.
    pub fn on_document_closed(&self, document: &Document) {
        let Some(path) = document.file_path.as_deref() else {
            return;
        };
        if self.tracking_spans.lock().close(path) {
            debug!(?path, "stopped tracking closed document");
        }
    }

    /// Tracked spans of a file, resolved against its current text in `solution`.
    ///
    /// The document is `document_id` when given, else the document backed by
    /// `file_path`. Returns an empty list when the file is not tracked or the
    /// spans cannot be resolved against that text.
    pub fn get_spans(
        &self,
        solution: &Solution,
        document_id: Option<DocumentId>,
        file_path: &Path,
    ) -> Vec<ActiveStatementSpan> {
        let Some(spans) = self.tracking_spans.lock().spans.get(file_path).cloned() else {
            return Vec::new();
        };

        let document = match document_id {
            Some(id) => solution.document(id),
            None => solution
                .document_ids_with_file_path(file_path)
                .first()
                .and_then(|id| solution.document(*id)),
        };
        let Some(snapshot) = document.and_then(|d| d.text.as_ref()) else {
            trace!(?file_path, "no text for tracked file");
            return Vec::new();
        };

        to_active_statement_spans(&spans, snapshot).unwrap_or_else(|| {
            trace!(?file_path, version = snapshot.version(), "tracked spans do not map to text");
            Vec::new()
        })
    }

    /// Asks the provider for the spans of `document` in `snapshot` and merges
    /// them into the table.
    ///
    /// When the provider cannot determine the spans the previously tracked spans
    /// are returned unchanged.
    pub async fn get_adjusted_tracking_spans(
        &self,
        document: &Document,
        snapshot: &TextSnapshot,
    ) -> Arc<[TrackingSpan]> {
        let Some(path) = document.file_path.as_deref() else {
            return empty_spans();
        };
        if !document.kind.supports_tracking() {
            return empty_spans();
        }

        let adjusted = tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => return empty_spans(),
            result = self.provider.adjusted_spans(document, snapshot, self) => result,
        };
        let adjusted = adjusted.unwrap_or_else(|error| {
            report_unless_cancelled(self.fault_reporter.as_ref(), "adjust spans", error);
            None
        });

        let mut table = self.tracking_spans.lock();
        if self.cancellation.is_cancelled() {
            return empty_spans();
        }
        let Some(adjusted) = adjusted else {
            trace!(?path, "adjusted spans undetermined, keeping tracked spans");
            return table.spans.get(path).cloned().unwrap_or_else(empty_spans);
        };

        assert_unique_ordinals(path, &adjusted);
        let updated = match table.spans.get(path) {
            Some(old) => reconcile(old, &adjusted, snapshot),
            None => create_tracking_spans(snapshot, &adjusted),
        };
        table.spans.insert(path.to_path_buf(), updated.clone());
        updated
    }

    /// Cancels background work, unsubscribes from the host and clears the table.
    pub fn end(&self) {
        self.cancellation.cancel();
        self.tasks.close();
        if let Some(subscription) = self.subscription.lock().take() {
            self.workspace.unsubscribe(subscription);
        }
        self.tracking_spans.lock().clear();
        debug!("ended active statement tracking");
    }

    /// Whether [`end`](Self::end) was called.
    pub fn is_ended(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Waits for every background initializer spawned so far.
    pub async fn wait_for_background_work(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        if !self.is_ended() {
            self.tasks.reopen();
            // an end() between the check and the reopen must leave the tracker closed
            if self.is_ended() {
                self.tasks.close();
            }
        }
    }

    /// Whether new background initializers can still be spawned.
    pub fn accepts_background_work(&self) -> bool {
        !self.tasks.is_closed()
    }

    /// Paths of the tracked files, sorted.
    pub fn tracked_files(&self) -> Vec<PathBuf> {
        self.tracking_spans.lock().spans.keys().cloned().sorted().collect()
    }
}

impl ActiveStatementSpanLookup for TrackingSession {
    fn spans(&self, document_id: Option<DocumentId>, file_path: &Path) -> Vec<ActiveStatementSpan> {
        self.get_spans(&self.workspace.current_solution(), document_id, file_path)
    }
}

fn assert_unique_ordinals(path: &Path, spans: &[ActiveStatementSpan]) {
    hotedit_assert!(
        spans.iter().map(|s| s.ordinal).all_unique(),
        "duplicate active statement ordinals for {path:?}"
    );
}

/// Creates the entry of `document` from `spans` unless the file is already tracked
/// or was closed after `generation` was read.
fn insert_if_absent(
    table: &mut SpanTable,
    document: &Document,
    spans: &[ActiveStatementSpan],
    generation: u64,
) {
    let (Some(path), Some(snapshot)) = (document.file_path.as_deref(), document.text.as_ref())
    else {
        return;
    };
    if spans.is_empty() {
        return;
    }
    if table.spans.contains_key(path) {
        trace!(?path, "file already tracked, keeping existing spans");
        return;
    }
    if table.close_generation(path) != generation {
        trace!(?path, "file closed while initializing, dropping baseline");
        return;
    }

    assert_unique_ordinals(path, spans);
    trace!(?path, count = spans.len(), "tracking active statements");
    table.spans.insert(path.to_path_buf(), create_tracking_spans(snapshot, spans));
}
