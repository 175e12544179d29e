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


//! Test utilities for integration tests

use std::{path::Path, sync::Arc, time::Duration};

use eyre::{eyre, Result};
use hotedit_common::{
    ActiveStatementFlags, ActiveStatementSpan, DocumentId, HostWorkspace, InMemoryWorkspace,
    LinePosition, TextChange, TextSnapshot,
};
use hotedit_engine::{
    ActiveStatementTrackingService, FaultReporter, ScriptedSpanProvider, TrackingConfig,
    TrackingError,
};
use parking_lot::Mutex;

/// Initialization utilities for tests
pub mod init {
    /// Initialize logging for an integration test
    pub fn init_test_environment() {
        hotedit_common::logging::ensure_test_logging(None);
    }
}

/// Source text and span builders
pub mod source {
    use super::*;

    /// `count` lines of the form `    statement_<iii>();`, all of the same width
    pub fn numbered_lines(count: usize) -> String {
        (0..count).map(|i| format!("    statement_{i:03}();\n")).collect()
    }

    /// A span over the statement on `line` of [`numbered_lines`] text
    pub fn statement(ordinal: u32, line: u32, flags: ActiveStatementFlags) -> ActiveStatementSpan {
        let span = format!("{line}:4-{line}:20");
        ActiveStatementSpan::new(ordinal, span.parse().expect("valid span"), flags)
    }

    /// [`statement`] with the leaf-frame flag
    pub fn leaf(ordinal: u32, line: u32) -> ActiveStatementSpan {
        statement(ordinal, line, ActiveStatementFlags::LEAF_FRAME)
    }
}

/// Polls `condition` until it holds, panicking after five seconds
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let polling = async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), polling)
        .await
        .expect("condition not reached within five seconds");
}

/// Fault reporter that keeps every report for later inspection
#[derive(Debug, Default)]
pub struct CollectingReporter {
    faults: Mutex<Vec<String>>,
}

impl CollectingReporter {
    /// Reports received so far, formatted as `<operation>: <error>`
    pub fn faults(&self) -> Vec<String> {
        self.faults.lock().clone()
    }
}

impl FaultReporter for CollectingReporter {
    fn report(&self, operation: &'static str, error: &TrackingError) {
        self.faults.lock().push(format!("{operation}: {error}"));
    }
}

/// A tracking service wired to an in-memory workspace and a scripted provider
pub struct TrackingHarness {
    /// The host workspace
    pub workspace: Arc<InMemoryWorkspace>,
    /// The debugger stand-in
    pub provider: Arc<ScriptedSpanProvider>,
    /// Faults reported by the service
    pub reporter: Arc<CollectingReporter>,
    /// The service under test
    pub service: Arc<ActiveStatementTrackingService>,
}

impl TrackingHarness {
    /// Creates a harness with the default configuration
    pub fn new() -> Self {
        Self::with_config(TrackingConfig::default())
    }

    /// Creates a harness with `config`
    pub fn with_config(config: TrackingConfig) -> Self {
        init::init_test_environment();
        let workspace = Arc::new(InMemoryWorkspace::new());
        let provider = Arc::new(ScriptedSpanProvider::new());
        let reporter = Arc::new(CollectingReporter::default());
        let service = ActiveStatementTrackingService::new(workspace.clone(), config)
            .with_fault_reporter(reporter.clone());
        Self { workspace, provider, reporter, service: Arc::new(service) }
    }

    /// Adds an open source document at `path`
    pub fn open_source(&self, path: &str, text: &str) -> Result<DocumentId> {
        let id = self.workspace.add_source_document(path, text);
        self.workspace.open_document(id)?;
        Ok(id)
    }

    /// Starts tracking the current solution and waits for the initial baselines
    pub async fn start(&self) {
        self.start_without_waiting();
        self.service.wait_for_background_work().await;
    }

    /// Starts tracking without waiting for the background initializers
    pub fn start_without_waiting(&self) {
        self.service.start_tracking(self.workspace.current_solution(), self.provider.clone());
    }

    /// Tracked spans of `path` in the current solution
    pub fn spans(&self, path: &str) -> Vec<ActiveStatementSpan> {
        self.service.get_spans(&self.workspace.current_solution(), None, Path::new(path))
    }

    /// Inserts `text` at the start of `line`
    pub fn insert_at_line(&self, id: DocumentId, line: u32, text: &str) -> Result<TextSnapshot> {
        let snapshot = self.current_text(id)?;
        let offset = snapshot.offset(LinePosition::new(line, 0));
        self.workspace.edit_document(id, vec![TextChange::insert(offset, text)])
    }

    /// Asks the service for the adjusted spans of `id` in its current text
    pub async fn adjust(&self, id: DocumentId) -> Result<Vec<ActiveStatementSpan>> {
        let document = self.workspace.document(id).ok_or_else(|| eyre!("no document {id}"))?;
        let snapshot = document.text.clone().ok_or_else(|| eyre!("document {id} has no text"))?;
        Ok(self.service.get_adjusted_spans(&document, &snapshot).await)
    }

    fn current_text(&self, id: DocumentId) -> Result<TextSnapshot> {
        self.workspace
            .buffer(id)
            .map(|buffer| buffer.current_snapshot())
            .ok_or_else(|| eyre!("document {id} has no text"))
    }
}

impl Default for TrackingHarness {
    fn default() -> Self {
        Self::new()
    }
}
