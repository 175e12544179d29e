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
    fmt::Display,
    sync::atomic::{AtomicU64, Ordering},
};

use serde::{Deserialize, Serialize};

static NEXT_DOCUMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a document in the host workspace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(u64);

impl DocumentId {
    /// Allocates a fresh identifier.
    pub fn next() -> Self {
        Self(NEXT_DOCUMENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl From<DocumentId> for u64 {
    fn from(value: DocumentId) -> Self {
        value.0
    }
}

impl Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "doc#{}", self.0)
    }
}

/// What kind of document the host is showing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentKind {
    /// A regular source file that is part of the compilation.
    #[default]
    Source,
    /// A design-time view (generated or projected) that maps onto a compile-time document.
    DesignTime,
    /// A document of a language or project kind that does not support live editing.
    Foreign,
}

impl DocumentKind {
    /// Whether active statements may be tracked in documents of this kind.
    pub fn supports_tracking(&self) -> bool {
        matches!(self, Self::Source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_ids_are_unique() {
        let a = DocumentId::next();
        let b = DocumentId::next();
        assert_ne!(a, b);
        assert!(u64::from(b) > u64::from(a));
    }

    #[test]
    fn test_only_source_documents_are_trackable() {
        assert!(DocumentKind::Source.supports_tracking());
        assert!(!DocumentKind::DesignTime.supports_tracking());
        assert!(!DocumentKind::Foreign.supports_tracking());
    }
}
