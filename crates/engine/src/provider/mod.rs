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

//! The boundary to the debugger backend that knows where active statements are.
//!
//! The backend answers two questions:
//!
//! - the baseline spans of a set of documents, positionally aligned with the
//!   request, or nothing at all when the debuggee is not stopped
//! - the adjusted spans of one document against a given text snapshot, where an
//!   empty answer means the backend cannot currently map the document
//!
//! [`SpanProviderAdapter`] turns those answers into the shapes the tracking
//! session consumes and validates the positional contract.

mod scripted;
pub use scripted::*;

use std::{path::Path, sync::Arc};

use eyre::Result;
use futures::future::BoxFuture;
use hotedit_common::{ActiveStatementSpan, Document, DocumentId, Solution, TextSnapshot};
use tracing::{debug, trace};

use crate::{TrackingError, TrackingResult};

/// Current tracked spans of other documents, offered to the backend while it
/// computes adjusted spans. Active statements may refer to call sites in other
/// files, so the backend can call back into the tracker re-entrantly.
pub trait ActiveStatementSpanLookup: Send + Sync {
    /// Tracked spans of the document `document_id` (if known) backed by `file_path`.
    fn spans(&self, document_id: Option<DocumentId>, file_path: &Path) -> Vec<ActiveStatementSpan>;
}

/// The debugger backend.
pub trait ActiveStatementSpanProvider: Send + Sync {
    /// Baseline spans for `document_ids`, one array per id in the same order.
    ///
    /// `None` means the debuggee is not in a break state.
    fn base_active_statement_spans<'a>(
        &'a self,
        solution: &'a Solution,
        document_ids: &'a [DocumentId],
    ) -> BoxFuture<'a, Result<Option<Vec<Vec<ActiveStatementSpan>>>>>;

    /// Spans of `document` recomputed against `snapshot`.
    ///
    /// An empty result means the spans cannot currently be determined.
    fn adjusted_active_statement_spans<'a>(
        &'a self,
        document: &'a Document,
        snapshot: &'a TextSnapshot,
        lookup: &'a dyn ActiveStatementSpanLookup,
    ) -> BoxFuture<'a, Result<Vec<ActiveStatementSpan>>>;
}

/// Adapts an [`ActiveStatementSpanProvider`] to the tracking session.
#[derive(Clone)]
pub struct SpanProviderAdapter {
    provider: Arc<dyn ActiveStatementSpanProvider>,
    batch_size: usize,
}

impl SpanProviderAdapter {
    /// Wraps `provider`. A `batch_size` of zero requests all documents at once.
    pub fn new(provider: Arc<dyn ActiveStatementSpanProvider>, batch_size: usize) -> Self {
        Self { provider, batch_size }
    }

    /// Baseline spans for `document_ids`, aligned with the request.
    ///
    /// Returns `None` when the provider reports that there is nothing to track.
    pub async fn baseline_spans(
        &self,
        solution: &Solution,
        document_ids: &[DocumentId],
    ) -> TrackingResult<Option<Vec<Vec<ActiveStatementSpan>>>> {
        let batch_size =
            if self.batch_size == 0 { document_ids.len().max(1) } else { self.batch_size };

        let mut spans = Vec::with_capacity(document_ids.len());
        for batch in document_ids.chunks(batch_size) {
            trace!(documents = batch.len(), "requesting baseline active statements");
            let Some(batch_spans) =
                self.provider.base_active_statement_spans(solution, batch).await?
            else {
                debug!("provider reports no break state");
                return Ok(None);
            };
            if batch_spans.len() != batch.len() {
                return Err(TrackingError::MisalignedBaseline {
                    expected: batch.len(),
                    actual: batch_spans.len(),
                });
            }
            spans.extend(batch_spans);
        }
        Ok(Some(spans))
    }

    /// Baseline spans of a single document.
    pub async fn document_baseline(
        &self,
        solution: &Solution,
        document_id: DocumentId,
    ) -> TrackingResult<Option<Vec<ActiveStatementSpan>>> {
        Ok(self
            .baseline_spans(solution, &[document_id])
            .await?
            .and_then(|spans| spans.into_iter().next()))
    }

    /// Adjusted spans of `document`, or `None` when the provider cannot determine them.
    pub async fn adjusted_spans(
        &self,
        document: &Document,
        snapshot: &TextSnapshot,
        lookup: &dyn ActiveStatementSpanLookup,
    ) -> TrackingResult<Option<Vec<ActiveStatementSpan>>> {
        let spans =
            self.provider.adjusted_active_statement_spans(document, snapshot, lookup).await?;
        Ok((!spans.is_empty()).then_some(spans))
    }
}
