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

//! The host workspace contract.
//!
//! The tracking engine never owns documents. It observes them through a
//! [`HostWorkspace`]: an immutable [`Solution`] snapshot for lookups, the set of
//! documents currently open in editors, and synchronous open/close notifications
//! delivered to registered [`DocumentEventListener`]s.
//!
//! [`InMemoryWorkspace`] is a complete host backed by [`TextBuffer`]s. The CLI
//! replays scenarios against it and the test suites drive it directly.

use std::{
    collections::{BTreeSet, HashMap},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use eyre::{eyre, Result};
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::{
    text::{TextBuffer, TextChange, TextSnapshot},
    types::{DocumentId, DocumentKind},
};

/// A document as seen in one [`Solution`] snapshot.
#[derive(Debug, Clone)]
pub struct Document {
    /// Identity of the document.
    pub id: DocumentId,
    /// Display name.
    pub name: String,
    /// Path of the backing file, if any.
    pub file_path: Option<PathBuf>,
    /// Kind of the document.
    pub kind: DocumentKind,
    /// Text of the document, if it has been loaded.
    pub text: Option<TextSnapshot>,
}

impl Document {
    /// Whether the document has a path, a loaded text and a trackable kind.
    pub fn is_trackable(&self) -> bool {
        self.file_path.is_some() && self.text.is_some() && self.kind.supports_tracking()
    }
}

/// An immutable snapshot of all documents known to the host.
///
/// Cloning is cheap; updates return a new solution and leave the original untouched.
#[derive(Debug, Clone, Default)]
pub struct Solution {
    documents: Arc<HashMap<DocumentId, Document>>,
}

impl Solution {
    /// Creates an empty solution.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a document.
    pub fn document(&self, id: DocumentId) -> Option<&Document> {
        self.documents.get(&id)
    }

    /// All documents, ordered by id.
    pub fn documents(&self) -> Vec<&Document> {
        let mut documents = self.documents.values().collect::<Vec<_>>();
        documents.sort_by_key(|d| d.id);
        documents
    }

    /// Ids of the documents backed by `path`, ordered by id.
    pub fn document_ids_with_file_path(&self, path: &Path) -> Vec<DocumentId> {
        let mut ids = self
            .documents
            .values()
            .filter(|d| d.file_path.as_deref() == Some(path))
            .map(|d| d.id)
            .collect::<Vec<_>>();
        ids.sort();
        ids
    }

    /// Returns a solution with `document` added or replaced.
    pub fn with_document(&self, document: Document) -> Self {
        let mut documents = (*self.documents).clone();
        documents.insert(document.id, document);
        Self { documents: Arc::new(documents) }
    }

    /// Returns a solution in which `id` carries `text`.
    ///
    /// Unknown ids leave the solution unchanged.
    pub fn with_document_text(&self, id: DocumentId, text: TextSnapshot) -> Self {
        match self.documents.get(&id) {
            Some(document) => self.with_document(Document { text: Some(text), ..document.clone() }),
            None => self.clone(),
        }
    }

    /// Number of documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the solution has no documents.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Receives document lifecycle notifications from a [`HostWorkspace`].
///
/// Callbacks run synchronously on the thread that opened or closed the
/// document and must not block.
pub trait DocumentEventListener: Send + Sync {
    /// A document was opened in an editor.
    fn document_opened(&self, document: &Document);

    /// A document was closed.
    fn document_closed(&self, document: &Document);
}

/// Handle returned by [`HostWorkspace::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// The host IDE's document model.
pub trait HostWorkspace: Send + Sync {
    /// Current solution snapshot.
    fn current_solution(&self) -> Solution;

    /// Documents currently open in editors.
    fn open_document_ids(&self) -> Vec<DocumentId>;

    /// Registers a listener for open/close notifications.
    fn subscribe(&self, listener: Arc<dyn DocumentEventListener>) -> SubscriptionId;

    /// Removes a listener. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);

    /// Maps a design-time document onto the compile-time document it projects.
    ///
    /// Returns `id` itself for documents that are not design-time views, and
    /// `None` when there is no compile-time counterpart.
    fn map_to_compile_time_document(&self, solution: &Solution, id: DocumentId)
        -> Option<DocumentId>;
}

#[derive(Default)]
struct WorkspaceState {
    solution: Solution,
    buffers: HashMap<DocumentId, TextBuffer>,
    open: BTreeSet<DocumentId>,
    design_time: HashMap<DocumentId, DocumentId>,
}

/// In-memory [`HostWorkspace`] whose documents are backed by [`TextBuffer`]s.
#[derive(Default)]
pub struct InMemoryWorkspace {
    state: RwLock<WorkspaceState>,
    listeners: RwLock<Vec<(SubscriptionId, Arc<dyn DocumentEventListener>)>>,
    next_subscription: AtomicU64,
}

impl InMemoryWorkspace {
    /// Creates an empty workspace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a closed document. A `None` text leaves the document unloaded.
    pub fn add_document(
        &self,
        name: impl Into<String>,
        file_path: Option<PathBuf>,
        kind: DocumentKind,
        text: Option<&str>,
    ) -> DocumentId {
        let id = DocumentId::next();
        let buffer = text.map(TextBuffer::new);
        let document = Document {
            id,
            name: name.into(),
            file_path,
            kind,
            text: buffer.as_ref().map(TextBuffer::current_snapshot),
        };

        let mut state = self.state.write();
        state.solution = state.solution.with_document(document);
        if let Some(buffer) = buffer {
            state.buffers.insert(id, buffer);
        }
        debug!(%id, "added document");
        id
    }

    /// Adds a closed source document backed by `path`.
    pub fn add_source_document(&self, path: impl Into<PathBuf>, text: &str) -> DocumentId {
        let path = path.into();
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        self.add_document(name, Some(path), DocumentKind::Source, Some(text))
    }

    /// Declares `design_time` to be a projection of `compile_time`.
    pub fn map_design_time_document(&self, design_time: DocumentId, compile_time: DocumentId) {
        self.state.write().design_time.insert(design_time, compile_time);
    }

    /// Current snapshot of a document.
    pub fn document(&self, id: DocumentId) -> Option<Document> {
        self.state.read().solution.document(id).cloned()
    }

    /// Live buffer of a document.
    pub fn buffer(&self, id: DocumentId) -> Option<TextBuffer> {
        self.state.read().buffers.get(&id).cloned()
    }

    /// Whether the document is open.
    pub fn is_open(&self, id: DocumentId) -> bool {
        self.state.read().open.contains(&id)
    }

    /// Opens a document and notifies listeners. Opening an open document is a no-op.
    pub fn open_document(&self, id: DocumentId) -> Result<()> {
        let document = {
            let mut state = self.state.write();
            let document = state
                .solution
                .document(id)
                .cloned()
                .ok_or_else(|| eyre!("Unknown document: {id}"))?;
            if !state.open.insert(id) {
                return Ok(());
            }
            document
        };

        debug!(%id, name = %document.name, "document opened");
        for listener in self.listeners_snapshot() {
            listener.document_opened(&document);
        }
        Ok(())
    }

    /// Closes a document and notifies listeners. Closing a closed document is a no-op.
    pub fn close_document(&self, id: DocumentId) -> Result<()> {
        let document = {
            let mut state = self.state.write();
            let document = state
                .solution
                .document(id)
                .cloned()
                .ok_or_else(|| eyre!("Unknown document: {id}"))?;
            if !state.open.remove(&id) {
                return Ok(());
            }
            document
        };

        debug!(%id, name = %document.name, "document closed");
        for listener in self.listeners_snapshot() {
            listener.document_closed(&document);
        }
        Ok(())
    }

    /// Applies a change set to a document's buffer and publishes the new text.
    pub fn edit_document(&self, id: DocumentId, changes: Vec<TextChange>) -> Result<TextSnapshot> {
        let mut state = self.state.write();
        let buffer =
            state.buffers.get(&id).ok_or_else(|| eyre!("Document {id} has no text buffer"))?;
        let snapshot = buffer.apply(changes)?;
        state.solution = state.solution.with_document_text(id, snapshot.clone());
        trace!(%id, version = snapshot.version(), "document edited");
        Ok(snapshot)
    }

    fn listeners_snapshot(&self) -> Vec<Arc<dyn DocumentEventListener>> {
        self.listeners.read().iter().map(|(_, l)| l.clone()).collect()
    }
}

impl HostWorkspace for InMemoryWorkspace {
    fn current_solution(&self) -> Solution {
        self.state.read().solution.clone()
    }

    fn open_document_ids(&self) -> Vec<DocumentId> {
        self.state.read().open.iter().copied().collect()
    }

    fn subscribe(&self, listener: Arc<dyn DocumentEventListener>) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners.write().retain(|(existing, _)| *existing != id);
    }

    fn map_to_compile_time_document(
        &self,
        solution: &Solution,
        id: DocumentId,
    ) -> Option<DocumentId> {
        let document = solution.document(id)?;
        match document.kind {
            DocumentKind::DesignTime => self.state.read().design_time.get(&id).copied(),
            _ => Some(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingListener {
        events: Mutex<Vec<(&'static str, DocumentId)>>,
    }

    impl DocumentEventListener for RecordingListener {
        fn document_opened(&self, document: &Document) {
            self.events.lock().push(("opened", document.id));
        }

        fn document_closed(&self, document: &Document) {
            self.events.lock().push(("closed", document.id));
        }
    }

    #[test]
    fn test_open_close_notifies_listeners_once() {
        let workspace = InMemoryWorkspace::new();
        let listener = Arc::new(RecordingListener::default());
        let subscription = workspace.subscribe(listener.clone());
        let id = workspace.add_source_document("/src/A.cs", "class A {}\n");

        workspace.open_document(id).unwrap();
        workspace.open_document(id).unwrap();
        assert_eq!(workspace.open_document_ids(), vec![id]);
        workspace.close_document(id).unwrap();
        workspace.close_document(id).unwrap();
        assert!(workspace.open_document_ids().is_empty());

        workspace.unsubscribe(subscription);
        workspace.open_document(id).unwrap();
        assert_eq!(*listener.events.lock(), vec![("opened", id), ("closed", id)]);
    }

    #[test]
    fn test_unknown_document_is_an_error() {
        let workspace = InMemoryWorkspace::new();
        let other = InMemoryWorkspace::new().add_source_document("/x", "");
        assert!(workspace.open_document(other).is_err());
        assert!(workspace.edit_document(other, vec![]).is_err());
    }

    #[test]
    fn test_edit_publishes_new_solution() {
        let workspace = InMemoryWorkspace::new();
        let id = workspace.add_source_document("/src/A.cs", "abc");
        let before = workspace.current_solution();

        let snapshot = workspace.edit_document(id, vec![TextChange::insert(3, "d")]).unwrap();
        let after = workspace.current_solution();

        assert_eq!(before.document(id).unwrap().text.as_ref().unwrap().text(), "abc");
        assert_eq!(after.document(id).unwrap().text.as_ref(), Some(&snapshot));
        assert_eq!(workspace.buffer(id).unwrap().current_snapshot().text(), "abcd");
    }

    #[test]
    fn test_document_lookup_by_path() {
        let workspace = InMemoryWorkspace::new();
        let a = workspace.add_source_document("/src/A.cs", "");
        let _b = workspace.add_source_document("/src/B.cs", "");
        let solution = workspace.current_solution();

        assert_eq!(solution.document_ids_with_file_path(Path::new("/src/A.cs")), vec![a]);
        assert!(solution.document_ids_with_file_path(Path::new("/src/C.cs")).is_empty());
        assert_eq!(solution.len(), 2);
    }

    #[test]
    fn test_design_time_mapping() {
        let workspace = InMemoryWorkspace::new();
        let compiled = workspace.add_source_document("/src/Page.razor.g.cs", "");
        let design = workspace.add_document(
            "Page.razor",
            Some("/src/Page.razor".into()),
            DocumentKind::DesignTime,
            Some(""),
        );
        let unmapped = workspace.add_document("Other.razor", None, DocumentKind::DesignTime, None);
        workspace.map_design_time_document(design, compiled);
        let solution = workspace.current_solution();

        assert_eq!(workspace.map_to_compile_time_document(&solution, design), Some(compiled));
        assert_eq!(workspace.map_to_compile_time_document(&solution, compiled), Some(compiled));
        assert_eq!(workspace.map_to_compile_time_document(&solution, unmapped), None);
        assert!(!solution.document(unmapped).unwrap().is_trackable());
    }

    #[test]
    fn test_with_document_text_ignores_unknown_ids() {
        let solution = Solution::new();
        let snapshot = TextBuffer::new("x").current_snapshot();
        let updated = solution.with_document_text(DocumentId::next(), snapshot);
        assert!(updated.is_empty());
    }
}
