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

//! Source positions in line/character form and in byte-offset form.
//!
//! Lines and characters are zero-based. A character counts Unicode scalar values
//! within a line, so a [`LinePosition`] stays meaningful independently of the
//! encoding used by the host. [`TextSpan`] is the byte-offset counterpart used
//! when resolving positions against a concrete text snapshot.

use std::{cmp::Ordering, fmt::Display, ops::Range, str::FromStr};

use eyre::{bail, eyre, Error, Result};
use serde::{Deserialize, Serialize};

/// A zero-based `(line, character)` position in a text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinePosition {
    /// Zero-based line number.
    pub line: u32,
    /// Zero-based character offset within the line.
    pub character: u32,
}

impl LinePosition {
    /// Creates a new position.
    pub const fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

impl PartialOrd for LinePosition {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LinePosition {
    fn cmp(&self, other: &Self) -> Ordering {
        self.line.cmp(&other.line).then(self.character.cmp(&other.character))
    }
}

impl Display for LinePosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{})", self.line, self.character)
    }
}

/// A span between two [`LinePosition`]s. `start` never comes after `end`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinePositionSpan {
    /// Inclusive start position.
    pub start: LinePosition,
    /// Exclusive end position.
    pub end: LinePosition,
}

impl LinePositionSpan {
    /// Creates a span, panicking if `end` precedes `start`.
    pub fn new(start: LinePosition, end: LinePosition) -> Self {
        assert!(start <= end, "span end {end} precedes start {start}");
        Self { start, end }
    }

    /// Whether the span covers no text.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl Display for LinePositionSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}-{})", self.start, self.end)
    }
}

impl FromStr for LinePositionSpan {
    type Err = Error;

    /// Parses `line:col-line:col`, e.g. `10:4-10:21`.
    fn from_str(s: &str) -> Result<Self> {
        let (start, end) = s.trim().split_once('-').ok_or_else(|| {
            eyre!("Invalid span format. Expected <line>:<col>-<line>:<col>, got: {s}")
        })?;

        let parse_position = |p: &str| -> Result<LinePosition> {
            let (line, character) = p
                .split_once(':')
                .ok_or_else(|| eyre!("Invalid position format. Expected <line>:<col>, got: {p}"))?;
            let line = line.trim().parse::<u32>().map_err(|e| eyre!("Invalid line: {e}"))?;
            let character =
                character.trim().parse::<u32>().map_err(|e| eyre!("Invalid column: {e}"))?;
            Ok(LinePosition::new(line, character))
        };

        let start = parse_position(start)?;
        let end = parse_position(end)?;
        if end < start {
            bail!("Span end {end} precedes start {start}");
        }

        Ok(Self { start, end })
    }
}

/// A half-open byte range `[start, end)` into a text snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextSpan {
    /// Inclusive start offset in bytes.
    pub start: usize,
    /// Exclusive end offset in bytes.
    pub end: usize,
}

impl TextSpan {
    /// Creates a span, panicking if `end` precedes `start`.
    pub fn new(start: usize, end: usize) -> Self {
        assert!(start <= end, "span end {end} precedes start {start}");
        Self { start, end }
    }

    /// Creates an empty span at `offset`.
    pub const fn empty(offset: usize) -> Self {
        Self { start: offset, end: offset }
    }

    /// Length of the span in bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the span covers no text.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `offset` lies in `[start, end)`.
    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }

    /// Whether two spans share at least one byte.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start.max(other.start) < self.end.min(other.end)
    }
}

impl From<Range<usize>> for TextSpan {
    fn from(range: Range<usize>) -> Self {
        Self::new(range.start, range.end)
    }
}

impl From<TextSpan> for Range<usize> {
    fn from(span: TextSpan) -> Self {
        span.start..span.end
    }
}

impl Display for TextSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}..{})", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_position_ordering() {
        assert!(LinePosition::new(1, 9) < LinePosition::new(2, 0));
        assert!(LinePosition::new(2, 1) > LinePosition::new(2, 0));
        assert_eq!(LinePosition::new(3, 3).cmp(&LinePosition::new(3, 3)), Ordering::Equal);
    }

    #[test]
    fn test_parse_line_span() {
        let span: LinePositionSpan = "10:4-10:21".parse().unwrap();
        assert_eq!(span.start, LinePosition::new(10, 4));
        assert_eq!(span.end, LinePosition::new(10, 21));
        assert_eq!(span.to_string(), "[(10,4)-(10,21))");

        assert!("10:4".parse::<LinePositionSpan>().is_err());
        assert!("10:4-9:0".parse::<LinePositionSpan>().is_err());
        assert!("a:4-10:0".parse::<LinePositionSpan>().is_err());
    }

    #[test]
    #[should_panic(expected = "precedes start")]
    fn test_inverted_text_span_panics() {
        let _ = TextSpan::new(5, 4);
    }

    #[test]
    fn test_text_span_overlap() {
        let a = TextSpan::new(5, 10);
        assert!(a.overlaps(&TextSpan::new(9, 12)));
        assert!(!a.overlaps(&TextSpan::new(10, 12)));
        assert!(!a.overlaps(&TextSpan::empty(7)));
        assert!(a.contains(5));
        assert!(!a.contains(10));
        assert_eq!(a.len(), 5);
    }
}
