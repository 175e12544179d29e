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

//! Versioned text buffers.
//!
//! A [`TextBuffer`] is the live, editable text behind an open document. Every
//! edit produces a new immutable [`TextSnapshot`] and appends the applied change
//! set to the buffer's history, so that a position taken in an older snapshot can
//! be carried forward to any newer snapshot of the same buffer. This is what
//! lets tracked spans follow the user's typing without re-asking the debugger.
//!
//! Offsets are byte offsets into UTF-8 text and must fall on character
//! boundaries. Line/character positions count Unicode scalar values.

use std::{
    fmt::Debug,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tracing::trace;

use crate::types::{LinePosition, LinePositionSpan, TextSpan};

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a [`TextBuffer`]. Snapshots of different buffers are never comparable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(u64);

impl BufferId {
    fn next() -> Self {
        Self(NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// How a single point moves when text is inserted exactly at it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PointTrackingMode {
    /// The point stays after the inserted text.
    Positive,
    /// The point stays before the inserted text.
    Negative,
}

/// Replacement of `span` (in the coordinates of the text before the edit) by `new_text`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextChange {
    /// Replaced range of the old text.
    pub span: TextSpan,
    /// Text inserted in place of `span`.
    pub new_text: String,
}

impl TextChange {
    /// Replaces `span` with `new_text`.
    pub fn replace(span: TextSpan, new_text: impl Into<String>) -> Self {
        Self { span, new_text: new_text.into() }
    }

    /// Inserts `text` at `offset`.
    pub fn insert(offset: usize, text: impl Into<String>) -> Self {
        Self::replace(TextSpan::empty(offset), text)
    }

    /// Deletes `span`.
    pub fn delete(span: TextSpan) -> Self {
        Self::replace(span, String::new())
    }

    /// Length difference introduced by the change.
    pub fn delta(&self) -> isize {
        self.new_text.len() as isize - self.span.len() as isize
    }
}

/// Reasons a change set cannot be applied to a snapshot.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TextError {
    /// The change reaches past the end of the text.
    #[error("change {span} is out of bounds for text of length {len}")]
    OutOfBounds {
        /// Offending span
        span: TextSpan,
        /// Length of the text
        len: usize,
    },
    /// Changes in one set must be sorted and must not overlap.
    #[error("change {second} overlaps or precedes change {first}")]
    Overlapping {
        /// Earlier change
        first: TextSpan,
        /// Later change
        second: TextSpan,
    },
    /// An offset splits a multi-byte character.
    #[error("offset {offset} is not on a character boundary")]
    NotCharBoundary {
        /// Offending offset
        offset: usize,
    },
}

/// Change sets indexed by the version they start from.
type History = Arc<RwLock<Vec<Arc<[TextChange]>>>>;

/// An immutable version of a [`TextBuffer`]'s content.
#[derive(Clone)]
pub struct TextSnapshot {
    buffer: BufferId,
    version: u32,
    text: Arc<str>,
    line_starts: Arc<[usize]>,
    history: History,
}

impl Debug for TextSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextSnapshot")
            .field("buffer", &self.buffer)
            .field("version", &self.version)
            .field("len", &self.text.len())
            .finish()
    }
}

impl PartialEq for TextSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.buffer == other.buffer && self.version == other.version
    }
}

impl Eq for TextSnapshot {}

impl TextSnapshot {
    fn new(buffer: BufferId, version: u32, text: Arc<str>, history: History) -> Self {
        let line_starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect::<Vec<_>>()
            .into();
        Self { buffer, version, text, line_starts, history }
    }

    /// Buffer this snapshot belongs to.
    pub fn buffer_id(&self) -> BufferId {
        self.buffer
    }

    /// Version number within the buffer, starting at zero.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Full text of the snapshot.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Length of the text in bytes.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Whether the text is empty.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Number of lines. An empty text has one (empty) line.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Byte range of `line` without its line break.
    fn line_bounds(&self, line: usize) -> (usize, usize) {
        let start = self.line_starts[line];
        let mut end = self.line_starts.get(line + 1).copied().unwrap_or(self.text.len());
        let bytes = self.text.as_bytes();
        if end > start && bytes[end - 1] == b'\n' {
            end -= 1;
            if end > start && bytes[end - 1] == b'\r' {
                end -= 1;
            }
        }
        (start, end)
    }

    fn floor_char_boundary(&self, offset: usize) -> usize {
        let mut offset = offset.min(self.text.len());
        while !self.text.is_char_boundary(offset) {
            offset -= 1;
        }
        offset
    }

    /// Converts a byte offset into a line/character position.
    ///
    /// Offsets past the end are clamped to the end of the text.
    pub fn line_position(&self, offset: usize) -> LinePosition {
        let offset = self.floor_char_boundary(offset);
        let line = self.line_starts.partition_point(|&start| start <= offset) - 1;
        let character = self.text[self.line_starts[line]..offset].chars().count();
        LinePosition::new(line as u32, character as u32)
    }

    /// Converts a line/character position into a byte offset.
    ///
    /// Lines past the end map to the end of the text; characters past the end of
    /// a line map to the end of that line (before its line break).
    pub fn offset(&self, position: LinePosition) -> usize {
        let line = position.line as usize;
        if line >= self.line_count() {
            return self.text.len();
        }
        let (start, end) = self.line_bounds(line);
        self.text[start..end]
            .char_indices()
            .nth(position.character as usize)
            .map(|(i, _)| start + i)
            .unwrap_or(end)
    }

    /// Converts a byte span into a line span.
    pub fn line_span(&self, span: TextSpan) -> LinePositionSpan {
        LinePositionSpan::new(self.line_position(span.start), self.line_position(span.end))
    }

    /// Converts a line span into a byte span, clamping both ends into the text.
    pub fn text_span(&self, span: LinePositionSpan) -> TextSpan {
        let start = self.offset(span.start);
        let end = self.offset(span.end).max(start);
        TextSpan::new(start, end)
    }

    /// Text covered by `span`.
    pub fn slice(&self, span: TextSpan) -> &str {
        &self.text[span.start.min(self.len())..span.end.min(self.len())]
    }

    /// Whether points of this snapshot can be carried forward to `target`.
    pub fn can_translate_to(&self, target: &Self) -> bool {
        self.buffer == target.buffer && self.version <= target.version
    }

    /// Carries `offset` in this snapshot forward to `target`.
    ///
    /// Returns `None` when `target` belongs to another buffer or is older than this
    /// snapshot.
    pub fn translate_offset(
        &self,
        offset: usize,
        target: &Self,
        mode: PointTrackingMode,
    ) -> Option<usize> {
        if !self.can_translate_to(target) {
            return None;
        }
        let history = self.history.read();
        let mut offset = offset.min(self.text.len());
        for changes in &history[self.version as usize..target.version as usize] {
            offset = translate_through(offset, changes, mode);
        }
        Some(offset)
    }

    /// Applies `changes` to this snapshot's text without recording a version.
    fn apply_changes(&self, changes: &[TextChange]) -> Result<String, TextError> {
        let mut previous: Option<TextSpan> = None;
        for change in changes {
            let span = change.span;
            if span.end > self.text.len() {
                return Err(TextError::OutOfBounds { span, len: self.text.len() });
            }
            for offset in [span.start, span.end] {
                if !self.text.is_char_boundary(offset) {
                    return Err(TextError::NotCharBoundary { offset });
                }
            }
            if let Some(first) = previous {
                if span.start < first.end || (span.start == first.start && first.is_empty()) {
                    return Err(TextError::Overlapping { first, second: span });
                }
            }
            previous = Some(span);
        }

        let capacity = changes.iter().fold(self.text.len() as isize, |acc, c| acc + c.delta());
        let mut text = String::with_capacity(capacity.max(0) as usize);
        let mut cursor = 0;
        for change in changes {
            text.push_str(&self.text[cursor..change.span.start]);
            text.push_str(&change.new_text);
            cursor = change.span.end;
        }
        text.push_str(&self.text[cursor..]);
        Ok(text)
    }
}

/// Moves `offset` through one sorted, non-overlapping change set.
///
/// A point inside a replaced range first collapses onto the start of the range;
/// the inserted text is then placed after it (negative) or before it (positive).
fn translate_through(offset: usize, changes: &[TextChange], mode: PointTrackingMode) -> usize {
    let shift = |point: usize, delta: isize| (point as isize + delta) as usize;

    let mut delta: isize = 0;
    for change in changes {
        if offset < change.span.start {
            break;
        }
        if offset > change.span.end {
            delta += change.delta();
            continue;
        }
        let start = shift(change.span.start, delta);
        return match mode {
            PointTrackingMode::Positive => start + change.new_text.len(),
            PointTrackingMode::Negative => start,
        };
    }
    shift(offset, delta)
}

struct BufferState {
    current: TextSnapshot,
}

/// The live, editable text behind a document.
///
/// Cloning a buffer yields another handle to the same text.
#[derive(Clone)]
pub struct TextBuffer {
    id: BufferId,
    state: Arc<Mutex<BufferState>>,
}

impl Debug for TextBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextBuffer")
            .field("id", &self.id)
            .field("version", &self.state.lock().current.version)
            .finish()
    }
}

impl TextBuffer {
    /// Creates a buffer whose version zero holds `text`.
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        let id = BufferId::next();
        let history: History = Arc::new(RwLock::new(Vec::new()));
        let current = TextSnapshot::new(id, 0, text.into(), history);
        Self { id, state: Arc::new(Mutex::new(BufferState { current })) }
    }

    /// Identity of the buffer.
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// Latest snapshot.
    pub fn current_snapshot(&self) -> TextSnapshot {
        self.state.lock().current.clone()
    }

    /// Applies a sorted, non-overlapping change set and returns the new snapshot.
    ///
    /// An empty change set still produces a new version.
    pub fn apply(&self, changes: Vec<TextChange>) -> Result<TextSnapshot, TextError> {
        let mut state = self.state.lock();
        let text = state.current.apply_changes(&changes)?;
        let version = state.current.version + 1;
        let history = state.current.history.clone();
        history.write().push(changes.into());
        state.current = TextSnapshot::new(self.id, version, text.into(), history);
        trace!(buffer = ?self.id, version, "applied text change set");
        Ok(state.current.clone())
    }

    /// Applies a single change.
    pub fn edit(&self, change: TextChange) -> Result<TextSnapshot, TextError> {
        self.apply(vec![change])
    }
}
