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

//! Merging freshly computed spans into tracked spans.

use std::sync::Arc;

use hotedit_common::{ActiveStatementSpan, TextSnapshot};
use tracing::trace;

use super::TrackingSpan;

/// Updates `old` with the spans the backend computed against `snapshot`.
///
/// Statement `i` of `new` corresponds to tracking span `i` of `old`. A tracking
/// span is replaced only when its resolved range in `snapshot` differs from the
/// range of the new span, or when it cannot be resolved there at all. If no span
/// is replaced, `old` itself is returned.
///
/// # Panics
///
/// If the arrays differ in length, or if any pair differs in ordinal or flags.
pub fn reconcile(
    old: &Arc<[TrackingSpan]>,
    new: &[ActiveStatementSpan],
    snapshot: &TextSnapshot,
) -> Arc<[TrackingSpan]> {
    assert_eq!(
        old.len(),
        new.len(),
        "active statement count changed from {} to {} within a session",
        old.len(),
        new.len()
    );

    let mut updated: Option<Vec<TrackingSpan>> = None;
    for (i, (tracked, statement)) in old.iter().zip(new).enumerate() {
        assert_eq!(
            tracked.ordinal(),
            statement.ordinal,
            "active statement {i} changed ordinal"
        );
        assert_eq!(tracked.flags(), statement.flags, "active statement {i} changed flags");

        let current = tracked.resolve(snapshot);
        let expected = snapshot.text_span(statement.line_span);
        if current == Some(expected) {
            continue;
        }

        trace!(
            ordinal = %statement.ordinal,
            ?current,
            %expected,
            "replacing tracking span"
        );
        updated.get_or_insert_with(|| old.to_vec())[i] = TrackingSpan::new(snapshot, statement);
    }

    match updated {
        Some(spans) => spans.into(),
        None => old.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::create_tracking_spans;
    use hotedit_common::{ActiveStatementFlags, LinePositionSpan, TextBuffer, TextChange};

    fn statement(ordinal: u32, span: &str, flags: ActiveStatementFlags) -> ActiveStatementSpan {
        ActiveStatementSpan::new(ordinal, span.parse().unwrap(), flags)
    }

    fn baseline() -> Vec<ActiveStatementSpan> {
        vec![
            statement(0, "1:4-1:10", ActiveStatementFlags::LEAF_FRAME),
            statement(1, "4:4-4:11", ActiveStatementFlags::NON_LEAF_FRAME),
        ]
    }

    fn text() -> &'static str {
        "fn main() {\n    foo();\n}\nfn foo() {\n    bar(1);\n}\n"
    }

    #[test]
    fn test_unchanged_spans_return_the_same_array() {
        let buffer = TextBuffer::new(text());
        let v0 = buffer.current_snapshot();
        let spans = create_tracking_spans(&v0, &baseline());

        let v1 = buffer.edit(TextChange::insert(0, "// header\n")).unwrap();
        let moved = baseline()
            .into_iter()
            .map(|s| ActiveStatementSpan {
                line_span: format!(
                    "{}:{}-{}:{}",
                    s.line_span.start.line + 1,
                    s.line_span.start.character,
                    s.line_span.end.line + 1,
                    s.line_span.end.character
                )
                .parse()
                .unwrap(),
                ..s
            })
            .collect::<Vec<_>>();

        let reconciled = reconcile(&spans, &moved, &v1);
        assert!(Arc::ptr_eq(&reconciled, &spans));
    }

    #[test]
    fn test_only_moved_spans_are_replaced() {
        let buffer = TextBuffer::new(text());
        let v0 = buffer.current_snapshot();
        let spans = create_tracking_spans(&v0, &baseline());

        let mut new = baseline();
        new[1].line_span = "4:4-4:10".parse().unwrap();
        let reconciled = reconcile(&spans, &new, &v0);

        assert!(!Arc::ptr_eq(&reconciled, &spans));
        assert_eq!(reconciled.len(), 2);
        assert_eq!(reconciled[0].anchor(), spans[0].anchor());
        assert_eq!(
            reconciled[1].to_active_statement_span(&v0).unwrap().line_span,
            "4:4-4:10".parse::<LinePositionSpan>().unwrap()
        );
        assert_eq!(reconciled[1].ordinal(), spans[1].ordinal());
        // the original array is untouched
        assert_eq!(
            spans[1].to_active_statement_span(&v0).unwrap().line_span,
            "4:4-4:11".parse::<LinePositionSpan>().unwrap()
        );
    }

    #[test]
    fn test_unresolvable_spans_are_reanchored() {
        let spans = create_tracking_spans(&TextBuffer::new(text()).current_snapshot(), &baseline());
        let other = TextBuffer::new(text()).current_snapshot();

        let reconciled = reconcile(&spans, &baseline(), &other);
        assert!(reconciled.iter().all(|s| s.anchor() == &other));
        assert_eq!(
            crate::tracking::to_active_statement_spans(&reconciled, &other),
            Some(baseline())
        );
    }

    #[test]
    #[should_panic(expected = "active statement count changed")]
    fn test_length_mismatch_panics() {
        let snapshot = TextBuffer::new(text()).current_snapshot();
        let spans = create_tracking_spans(&snapshot, &baseline());
        reconcile(&spans, &baseline()[..1], &snapshot);
    }

    #[test]
    #[should_panic(expected = "changed ordinal")]
    fn test_ordinal_mismatch_panics() {
        let snapshot = TextBuffer::new(text()).current_snapshot();
        let spans = create_tracking_spans(&snapshot, &baseline());
        let mut new = baseline();
        new.swap(0, 1);
        reconcile(&spans, &new, &snapshot);
    }

    #[test]
    #[should_panic(expected = "changed flags")]
    fn test_flag_mismatch_panics() {
        let snapshot = TextBuffer::new(text()).current_snapshot();
        let spans = create_tracking_spans(&snapshot, &baseline());
        let mut new = baseline();
        new[0].flags |= ActiveStatementFlags::STALE;
        reconcile(&spans, &new, &snapshot);
    }
}
