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

//! Tracking spans: active statement ranges that follow text edits.
//!
//! A [`TrackingSpan`] is anchored to the text snapshot it was created in and can
//! be resolved against any later snapshot of the same buffer. Tracking is
//! edge-exclusive: text typed exactly at either boundary stays outside the span,
//! while edits strictly inside it grow or shrink it.

use std::sync::Arc;

use hotedit_common::{
    ActiveStatementFlags, ActiveStatementId, ActiveStatementSpan, DocumentId, LinePositionSpan,
    PointTrackingMode, TextSnapshot, TextSpan,
};

/// An active statement whose range follows edits of its document.
#[derive(Debug, Clone)]
pub struct TrackingSpan {
    anchor: TextSnapshot,
    span: TextSpan,
    ordinal: ActiveStatementId,
    flags: ActiveStatementFlags,
    unmapped_document_id: Option<DocumentId>,
}

impl TrackingSpan {
    /// Anchors `statement` in `snapshot`. Its line span is clamped into the text.
    pub fn new(snapshot: &TextSnapshot, statement: &ActiveStatementSpan) -> Self {
        Self {
            anchor: snapshot.clone(),
            span: snapshot.text_span(statement.line_span),
            ordinal: statement.ordinal,
            flags: statement.flags,
            unmapped_document_id: statement.unmapped_document_id,
        }
    }

    /// Identity of the statement.
    pub fn ordinal(&self) -> ActiveStatementId {
        self.ordinal
    }

    /// Debugger flags of the statement.
    pub fn flags(&self) -> ActiveStatementFlags {
        self.flags
    }

    /// Document the statement is reported against, for mapped documents.
    pub fn unmapped_document_id(&self) -> Option<DocumentId> {
        self.unmapped_document_id
    }

    /// Snapshot the span was created in.
    pub fn anchor(&self) -> &TextSnapshot {
        &self.anchor
    }

    /// Range in `snapshot`, or `None` if `snapshot` is not the anchor or a later
    /// version of the same buffer.
    pub fn resolve(&self, snapshot: &TextSnapshot) -> Option<TextSpan> {
        let start =
            self.anchor.translate_offset(self.span.start, snapshot, PointTrackingMode::Positive)?;
        let end =
            self.anchor.translate_offset(self.span.end, snapshot, PointTrackingMode::Negative)?;
        Some(TextSpan::new(start, end.max(start)))
    }

    /// Line range in `snapshot`.
    pub fn resolve_line_span(&self, snapshot: &TextSnapshot) -> Option<LinePositionSpan> {
        self.resolve(snapshot).map(|span| snapshot.line_span(span))
    }

    /// The statement as seen in `snapshot`.
    pub fn to_active_statement_span(&self, snapshot: &TextSnapshot) -> Option<ActiveStatementSpan> {
        Some(ActiveStatementSpan {
            ordinal: self.ordinal,
            line_span: self.resolve_line_span(snapshot)?,
            flags: self.flags,
            unmapped_document_id: self.unmapped_document_id,
        })
    }
}

/// Anchors each of `statements` in `snapshot`, preserving order and metadata.
pub fn create_tracking_spans(
    snapshot: &TextSnapshot,
    statements: &[ActiveStatementSpan],
) -> Arc<[TrackingSpan]> {
    statements.iter().map(|statement| TrackingSpan::new(snapshot, statement)).collect()
}

/// Resolves a whole span array, or `None` if any span cannot be resolved in `snapshot`.
pub fn to_active_statement_spans(
    spans: &[TrackingSpan],
    snapshot: &TextSnapshot,
) -> Option<Vec<ActiveStatementSpan>> {
    spans.iter().map(|span| span.to_active_statement_span(snapshot)).collect()
}
