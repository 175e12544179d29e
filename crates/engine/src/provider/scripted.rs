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
    collections::{HashMap, HashSet, VecDeque},
    path::{Path, PathBuf},
};

use eyre::{bail, Result};
use futures::future::BoxFuture;
use hotedit_common::{ActiveStatementSpan, Document, DocumentId, Solution, TextSnapshot};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::trace;

use super::{ActiveStatementSpanLookup, ActiveStatementSpanProvider};

#[derive(Default)]
struct Script {
    baselines: HashMap<PathBuf, Vec<ActiveStatementSpan>>,
    queued_baselines: HashMap<PathBuf, VecDeque<Vec<ActiveStatementSpan>>>,
    baseline_arrivals: usize,
    adjustments: HashMap<PathBuf, VecDeque<Vec<ActiveStatementSpan>>>,
    pending_failure: Option<String>,
    baseline_requests: Vec<usize>,
    cross_file_observations: Vec<(PathBuf, Vec<ActiveStatementSpan>)>,
}

/// Which baseline requests may proceed. Requests are numbered in arrival order.
#[derive(Debug, Default)]
struct BaselineGate {
    held_from: Option<usize>,
    released: HashSet<usize>,
}

impl BaselineGate {
    fn admits(&self, request: usize) -> bool {
        self.held_from
            .is_none_or(|from| request < from || self.released.contains(&request))
    }
}

/// An in-memory span provider driven by a script.
///
/// Baselines are keyed by file path, with optional one-shot baselines queued in
/// front. Baseline requests can be held and released one by one. Adjusted spans
/// are served from a per-path queue; an empty queue answers "cannot determine".
/// While computing adjusted spans the provider queries the lookup for every
/// other scripted file and records what it saw.
pub struct ScriptedSpanProvider {
    script: Mutex<Script>,
    in_break_state: Mutex<bool>,
    baseline_gate: watch::Sender<BaselineGate>,
}

impl Default for ScriptedSpanProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedSpanProvider {
    /// Creates a provider in break state with no spans.
    pub fn new() -> Self {
        let (baseline_gate, _) = watch::channel(BaselineGate::default());
        Self {
            script: Mutex::new(Script::default()),
            in_break_state: Mutex::new(true),
            baseline_gate,
        }
    }

    /// Sets the baseline spans reported for `path`.
    pub fn set_baseline(&self, path: impl Into<PathBuf>, spans: Vec<ActiveStatementSpan>) {
        self.script.lock().baselines.insert(path.into(), spans);
    }

    /// Queues a one-shot baseline for `path`, served before the one set with
    /// [`set_baseline`](Self::set_baseline).
    pub fn queue_baseline(&self, path: impl Into<PathBuf>, spans: Vec<ActiveStatementSpan>) {
        self.script.lock().queued_baselines.entry(path.into()).or_default().push_back(spans);
    }

    /// Queues the result of the next adjusted-spans request for `path`.
    pub fn push_adjustment(&self, path: impl Into<PathBuf>, spans: Vec<ActiveStatementSpan>) {
        self.script.lock().adjustments.entry(path.into()).or_default().push_back(spans);
    }

    /// Enters or leaves the break state. Outside of it, baselines report nothing to track.
    pub fn set_break_state(&self, in_break_state: bool) {
        *self.in_break_state.lock() = in_break_state;
    }

    /// Makes the next provider call fail with `message`.
    pub fn fail_next(&self, message: impl Into<String>) {
        self.script.lock().pending_failure = Some(message.into());
    }

    /// Holds baseline requests arriving from now on until they are released.
    pub fn hold_baselines(&self) {
        let from = self.script.lock().baseline_arrivals;
        self.baseline_gate.send_modify(|gate| {
            gate.held_from.get_or_insert(from);
        });
    }

    /// Lets the held request with arrival number `request` proceed.
    pub fn release_baseline_request(&self, request: usize) {
        self.baseline_gate.send_modify(|gate| {
            gate.released.insert(request);
        });
    }

    /// Lets held and future baseline requests proceed.
    pub fn release_baselines(&self) {
        self.baseline_gate.send_replace(BaselineGate::default());
    }

    /// Number of baseline requests that arrived so far, held ones included.
    pub fn baseline_arrivals(&self) -> usize {
        self.script.lock().baseline_arrivals
    }

    /// Sizes of the baseline requests received so far.
    pub fn baseline_requests(&self) -> Vec<usize> {
        self.script.lock().baseline_requests.clone()
    }

    /// Cross-file spans observed through the lookup during adjusted requests.
    pub fn cross_file_observations(&self) -> Vec<(PathBuf, Vec<ActiveStatementSpan>)> {
        self.script.lock().cross_file_observations.clone()
    }

    fn take_failure(&self) -> Result<()> {
        match self.script.lock().pending_failure.take() {
            Some(message) => bail!("{message}"),
            None => Ok(()),
        }
    }

    fn baseline_for(&self, solution: &Solution, id: DocumentId) -> Vec<ActiveStatementSpan> {
        let Some(path) = solution.document(id).and_then(|d| d.file_path.as_deref()) else {
            return Vec::new();
        };
        let mut script = self.script.lock();
        if let Some(spans) = script.queued_baselines.get_mut(path).and_then(VecDeque::pop_front) {
            return spans;
        }
        script.baselines.get(path).cloned().unwrap_or_default()
    }
}

impl ActiveStatementSpanProvider for ScriptedSpanProvider {
    fn base_active_statement_spans<'a>(
        &'a self,
        solution: &'a Solution,
        document_ids: &'a [DocumentId],
    ) -> BoxFuture<'a, Result<Option<Vec<Vec<ActiveStatementSpan>>>>> {
        Box::pin(async move {
            let request = {
                let mut script = self.script.lock();
                script.baseline_arrivals += 1;
                script.baseline_arrivals - 1
            };
            let mut gate = self.baseline_gate.subscribe();
            if gate.wait_for(|gate| gate.admits(request)).await.is_err() {
                bail!("baseline gate closed");
            }

            self.script.lock().baseline_requests.push(document_ids.len());
            self.take_failure()?;
            if !*self.in_break_state.lock() {
                return Ok(None);
            }
            trace!(documents = document_ids.len(), "serving scripted baselines");
            Ok(Some(document_ids.iter().map(|id| self.baseline_for(solution, *id)).collect()))
        })
    }

    fn adjusted_active_statement_spans<'a>(
        &'a self,
        document: &'a Document,
        _snapshot: &'a TextSnapshot,
        lookup: &'a dyn ActiveStatementSpanLookup,
    ) -> BoxFuture<'a, Result<Vec<ActiveStatementSpan>>> {
        Box::pin(async move {
            self.take_failure()?;
            let Some(path) = document.file_path.as_deref() else {
                return Ok(Vec::new());
            };

            let others = self
                .script
                .lock()
                .baselines
                .keys()
                .filter(|p| p.as_path() != path)
                .cloned()
                .collect::<Vec<_>>();
            let observations = others
                .into_iter()
                .map(|other| {
                    let spans = lookup.spans(None, &other);
                    (other, spans)
                })
                .collect::<Vec<_>>();

            let mut script = self.script.lock();
            script.cross_file_observations.extend(observations);
            Ok(next_adjustment(&mut script.adjustments, path))
        })
    }
}

fn next_adjustment(
    adjustments: &mut HashMap<PathBuf, VecDeque<Vec<ActiveStatementSpan>>>,
    path: &Path,
) -> Vec<ActiveStatementSpan> {
    adjustments.get_mut(path).and_then(VecDeque::pop_front).unwrap_or_default()
}
