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

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use hotedit_common::{
    ActiveStatementSpan, Document, DocumentId, HostWorkspace, Solution, TextSnapshot,
};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::info;

use super::{to_active_statement_spans, TrackingSession};
use crate::{
    ActiveStatementSpanProvider, FaultReporter, SpanProviderAdapter, TracingFaultReporter,
    TrackingConfig,
};

/// Notification sent when tracking starts or ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingChanged {
    /// A session was installed
    Started,
    /// The session was ended
    Ended,
}

/// Entry point of active statement tracking for one workspace.
///
/// The service is inert until [`start_tracking`](Self::start_tracking) installs
/// a session; queries made without a session return nothing.
pub struct ActiveStatementTrackingService {
    workspace: Arc<dyn HostWorkspace>,
    config: TrackingConfig,
    fault_reporter: Arc<dyn FaultReporter>,
    session: Mutex<Option<Arc<TrackingSession>>>,
    changed: broadcast::Sender<TrackingChanged>,
}

impl ActiveStatementTrackingService {
    /// Creates a service reporting faults through `tracing`.
    pub fn new(workspace: Arc<dyn HostWorkspace>, config: TrackingConfig) -> Self {
        let (changed, _) = broadcast::channel(config.notification_capacity.max(1));
        Self {
            workspace,
            config,
            fault_reporter: Arc::new(TracingFaultReporter),
            session: Mutex::new(None),
            changed,
        }
    }

    /// Replaces the fault reporter used by future sessions.
    pub fn with_fault_reporter(mut self, fault_reporter: Arc<dyn FaultReporter>) -> Self {
        self.fault_reporter = fault_reporter;
        self
    }

    /// Configuration of the service.
    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    /// Subscribes to [`TrackingChanged`] notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<TrackingChanged> {
        self.changed.subscribe()
    }

    /// Whether a session is installed.
    pub fn is_tracking(&self) -> bool {
        self.session.lock().is_some()
    }

    fn session(&self) -> Option<Arc<TrackingSession>> {
        self.session.lock().clone()
    }

    /// Starts tracking the documents open in `solution`.
    ///
    /// # Panics
    ///
    /// If tracking has already started, or when called outside of a Tokio runtime.
    pub fn start_tracking(
        &self,
        solution: Solution,
        provider: Arc<dyn ActiveStatementSpanProvider>,
    ) {
        {
            let mut slot = self.session.lock();
            assert!(slot.is_none(), "active statement tracking has already started");

            let session = TrackingSession::new(
                self.workspace.clone(),
                SpanProviderAdapter::new(provider, self.config.baseline_batch_size),
                self.fault_reporter.clone(),
                &self.config,
            );
            session.start(solution);
            *slot = Some(session);
        }

        info!("active statement tracking started");
        let _ = self.changed.send(TrackingChanged::Started);
    }

    /// Ends tracking and discards all tracked spans.
    ///
    /// # Panics
    ///
    /// If tracking has not been started.
    pub fn end_tracking(&self) {
        let session = self.session.lock().take();
        let Some(session) = session else {
            panic!("active statement tracking has not been started");
        };
        session.end();

        info!("active statement tracking ended");
        let _ = self.changed.send(TrackingChanged::Ended);
    }

    /// Tracked spans of a file, see [`TrackingSession::get_spans`].
    pub fn get_spans(
        &self,
        solution: &Solution,
        document_id: Option<DocumentId>,
        file_path: &Path,
    ) -> Vec<ActiveStatementSpan> {
        self.session()
            .map(|session| session.get_spans(solution, document_id, file_path))
            .unwrap_or_default()
    }

    /// Latest spans of `document` in `snapshot`, recomputed by the provider.
    pub async fn get_adjusted_spans(
        &self,
        document: &Document,
        snapshot: &TextSnapshot,
    ) -> Vec<ActiveStatementSpan> {
        let Some(session) = self.session() else {
            return Vec::new();
        };
        let spans = session.get_adjusted_tracking_spans(document, snapshot).await;
        to_active_statement_spans(&spans, snapshot).unwrap_or_default()
    }

    /// Waits for the background initializers of the current session.
    pub async fn wait_for_background_work(&self) {
        if let Some(session) = self.session() {
            session.wait_for_background_work().await;
        }
    }

    /// Tracked file paths of the current session, sorted.
    pub fn tracked_files(&self) -> Vec<PathBuf> {
        self.session().map(|session| session.tracked_files()).unwrap_or_default()
    }
}
