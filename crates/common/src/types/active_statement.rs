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

//! Active statements as reported by the debugger backend.
//!
//! An active statement is a source location where some thread of the debuggee is
//! currently executing. The backend reports them per document as
//! [`ActiveStatementSpan`]s, which are plain values detached from any text
//! snapshot. Identity within a document is carried by the [`ActiveStatementId`]
//! ordinal and never changes for the lifetime of a debugging session.

use std::{
    fmt::Display,
    ops::{BitOr, BitOrAssign},
    str::FromStr,
};

use eyre::{bail, Error, Result};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::types::{DocumentId, LinePositionSpan};

/// Ordinal of an active statement within its document.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ActiveStatementId(pub u32);

impl Display for ActiveStatementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-statement flags reported by the debugger.
///
/// The bit values follow the debugger's wire contract and must not be renumbered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ActiveStatementFlags(u8);

impl ActiveStatementFlags {
    /// No flags set.
    pub const NONE: Self = Self(0);
    /// The innermost frame of some thread is at this statement.
    pub const LEAF_FRAME: Self = Self(1);
    /// The statement was partially executed when the debuggee stopped.
    pub const PARTIALLY_EXECUTED: Self = Self(1 << 1);
    /// The statement belongs to code outside the user's project.
    pub const NON_USER_CODE: Self = Self(1 << 2);
    /// The method containing the statement matches the latest committed version.
    pub const METHOD_UP_TO_DATE: Self = Self(1 << 3);
    /// Some thread has a non-innermost frame at this statement.
    pub const NON_LEAF_FRAME: Self = Self(1 << 4);
    /// The statement refers to a method version that has since been replaced.
    pub const STALE: Self = Self(1 << 5);

    const NAMES: [(Self, &'static str); 6] = [
        (Self::LEAF_FRAME, "leaf-frame"),
        (Self::PARTIALLY_EXECUTED, "partially-executed"),
        (Self::NON_USER_CODE, "non-user-code"),
        (Self::METHOD_UP_TO_DATE, "method-up-to-date"),
        (Self::NON_LEAF_FRAME, "non-leaf-frame"),
        (Self::STALE, "stale"),
    ];

    /// Raw bit representation.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Builds flags from raw bits, dropping unknown bits.
    pub const fn from_bits_truncate(bits: u8) -> Self {
        Self(bits & 0b11_1111)
    }

    /// Whether every flag in `other` is also set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether no flag is set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Shorthand for `contains(LEAF_FRAME)`.
    pub const fn is_leaf_frame(self) -> bool {
        self.contains(Self::LEAF_FRAME)
    }
}

impl BitOr for ActiveStatementFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ActiveStatementFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl Display for ActiveStatementFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        let names = Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .join("|");
        write!(f, "{names}")
    }
}

impl FromStr for ActiveStatementFlags {
    type Err = Error;

    /// Parses `|`- or `,`-separated flag names, e.g. `leaf-frame|method-up-to-date`.
    fn from_str(s: &str) -> Result<Self> {
        let mut flags = Self::NONE;
        for name in s.split(['|', ',']).map(str::trim).filter(|n| !n.is_empty()) {
            if name == "none" {
                continue;
            }
            match Self::NAMES.iter().find(|(_, known)| *known == name) {
                Some((flag, _)) => flags |= *flag,
                None => bail!("Unknown active statement flag: {name}"),
            }
        }
        Ok(flags)
    }
}

impl TryFrom<String> for ActiveStatementFlags {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ActiveStatementFlags> for String {
    fn from(value: ActiveStatementFlags) -> Self {
        value.to_string()
    }
}

/// An active statement location reported for one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActiveStatementSpan {
    /// Stable identity of the statement within its document.
    pub ordinal: ActiveStatementId,
    /// Position of the statement in the document's text.
    pub line_span: LinePositionSpan,
    /// Debugger flags of the statement.
    pub flags: ActiveStatementFlags,
    /// Document the statement originally maps to, when the tracked document is a
    /// generated or mapped view of another document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unmapped_document_id: Option<DocumentId>,
}

impl ActiveStatementSpan {
    /// Creates a span without an unmapped document reference.
    pub fn new(ordinal: u32, line_span: LinePositionSpan, flags: ActiveStatementFlags) -> Self {
        Self { ordinal: ActiveStatementId(ordinal), line_span, flags, unmapped_document_id: None }
    }

    /// Sets the unmapped document reference.
    pub fn with_unmapped_document(mut self, document_id: DocumentId) -> Self {
        self.unmapped_document_id = Some(document_id);
        self
    }

    /// Whether some thread's innermost frame sits at this statement.
    pub fn is_leaf(&self) -> bool {
        self.flags.is_leaf_frame()
    }
}

impl Display for ActiveStatementSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.ordinal, self.line_span, self.flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LinePosition;

    #[test]
    fn test_flags_roundtrip_through_names() {
        let flags = ActiveStatementFlags::LEAF_FRAME | ActiveStatementFlags::METHOD_UP_TO_DATE;
        assert_eq!(flags.to_string(), "leaf-frame|method-up-to-date");
        assert_eq!("method-up-to-date, leaf-frame".parse::<ActiveStatementFlags>().unwrap(), flags);
        assert_eq!("none".parse::<ActiveStatementFlags>().unwrap(), ActiveStatementFlags::NONE);
        assert_eq!(ActiveStatementFlags::NONE.to_string(), "none");
        assert!("leaf".parse::<ActiveStatementFlags>().is_err());
    }

    #[test]
    fn test_flag_bits_match_wire_values() {
        assert_eq!(ActiveStatementFlags::LEAF_FRAME.bits(), 1);
        assert_eq!(ActiveStatementFlags::METHOD_UP_TO_DATE.bits(), 8);
        assert_eq!(ActiveStatementFlags::NON_LEAF_FRAME.bits(), 16);
        assert_eq!(ActiveStatementFlags::from_bits_truncate(0xff).bits(), 0b11_1111);
    }

    #[test]
    fn test_span_serializes_flags_by_name() {
        let span = ActiveStatementSpan::new(
            0,
            LinePositionSpan::new(LinePosition::new(10, 4), LinePosition::new(10, 12)),
            ActiveStatementFlags::LEAF_FRAME,
        );
        let json = serde_json::to_value(span).unwrap();
        assert_eq!(json["flags"], "leaf-frame");
        assert_eq!(json["ordinal"], 0);
        assert!(json.get("unmapped_document_id").is_none());

        let back: ActiveStatementSpan = serde_json::from_value(json).unwrap();
        assert_eq!(back, span);
        assert!(back.is_leaf());
    }
}
