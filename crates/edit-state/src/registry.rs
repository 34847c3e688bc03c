//! Path-keyed registry of open documents.
//!
//! Operations are keyed by the unresolved path string the caller used, but identity is
//! symlink-resolved: two different path strings naming the same real file share one
//! document. Lookups try the unresolved name first and fall back to resolved identity;
//! resolution failures (a path that does not exist on disk) degrade to string identity.
//!
//! The map is read-mostly: lookups share a read lock, registration and removal take the
//! write lock as a single-writer barrier.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::document::Document;

fn resolve(path: &str) -> PathBuf {
    std::fs::canonicalize(Path::new(path)).unwrap_or_else(|_| PathBuf::from(path))
}

struct Entry {
    resolved: PathBuf,
    document: Arc<Document>,
}

/// Concurrent path → document map.
#[derive(Default)]
pub struct DocumentMap {
    entries: RwLock<HashMap<String, Entry>>,
}

impl DocumentMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a document by path: by unresolved name first, then by resolved identity.
    pub fn get(&self, path: &str) -> Option<Arc<Document>> {
        let entries = self.entries.read();
        if let Some(entry) = entries.get(path) {
            return Some(entry.document.clone());
        }
        let resolved = resolve(path);
        entries
            .values()
            .find(|entry| entry.resolved == resolved)
            .map(|entry| entry.document.clone())
    }

    /// Register a document under `path`, replacing and returning any document previously
    /// registered under the same identity.
    pub fn insert(&self, path: &str, document: Arc<Document>) -> Option<Arc<Document>> {
        let resolved = resolve(path);
        let mut entries = self.entries.write();
        // The same real file may be registered under a different unresolved name.
        let alias = entries
            .iter()
            .find(|(name, entry)| *name != path && entry.resolved == resolved)
            .map(|(name, _)| name.clone());
        let mut replaced = alias.and_then(|name| entries.remove(&name)).map(|e| e.document);
        if let Some(previous) = entries.insert(
            path.to_string(),
            Entry {
                resolved,
                document,
            },
        ) {
            replaced = Some(previous.document);
        }
        replaced
    }

    /// Remove the document registered under `path` (unresolved name first, then resolved
    /// identity).
    pub fn remove(&self, path: &str) -> Option<Arc<Document>> {
        let mut entries = self.entries.write();
        if let Some(entry) = entries.remove(path) {
            return Some(entry.document);
        }
        let resolved = resolve(path);
        let name = entries
            .iter()
            .find(|(_, entry)| entry.resolved == resolved)
            .map(|(name, _)| name.clone())?;
        entries.remove(&name).map(|entry| entry.document)
    }

    /// Number of registered documents.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` when no document is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result as EngineResult;
    use crate::frontend::{
        AnalysisOutcome, AnalysisScheduler, CancelFlag, ParsedSyntax, SemanticAnalysis,
        SyntaxParser,
    };
    use crate::history::Snapshot;

    struct NullParser;

    impl SyntaxParser for NullParser {
        fn parse_syntax(&self, _snapshot: &Snapshot) -> ParsedSyntax {
            ParsedSyntax::default()
        }
    }

    struct NoAnalysis;

    impl SemanticAnalysis for NoAnalysis {
        fn analyze(
            &self,
            _snapshot: &Snapshot,
            _cancel: &CancelFlag,
        ) -> EngineResult<AnalysisOutcome> {
            Ok(AnalysisOutcome::default())
        }
    }

    fn document(name: &str) -> Arc<Document> {
        Arc::new(Document::open(
            name,
            "",
            Arc::new(NullParser),
            Arc::new(NoAnalysis),
            Arc::new(AnalysisScheduler::new()),
        ))
    }

    #[test]
    fn test_insert_and_get_by_unresolved_name() {
        let map = DocumentMap::new();
        assert!(map.is_empty());
        map.insert("/nonexistent/a.src", document("a"));
        assert_eq!(map.len(), 1);
        let found = map.get("/nonexistent/a.src").unwrap();
        assert_eq!(found.name(), "a");
        assert!(map.get("/nonexistent/other.src").is_none());
    }

    #[test]
    fn test_reinsert_replaces_previous_document() {
        let map = DocumentMap::new();
        map.insert("/nonexistent/a.src", document("first"));
        let replaced = map.insert("/nonexistent/a.src", document("second"));
        assert_eq!(replaced.unwrap().name(), "first");
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("/nonexistent/a.src").unwrap().name(), "second");
    }

    #[test]
    fn test_remove_by_name() {
        let map = DocumentMap::new();
        map.insert("/nonexistent/a.src", document("a"));
        let removed = map.remove("/nonexistent/a.src");
        assert!(removed.is_some());
        assert!(map.get("/nonexistent/a.src").is_none());
    }

    #[test]
    fn test_symlink_paths_share_one_document() {
        let dir = std::env::temp_dir().join(format!("edit-state-registry-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let real = dir.join("real.src");
        std::fs::write(&real, "x").unwrap();
        let link = dir.join("link.src");
        let _ = std::fs::remove_file(&link);
        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(&real, &link).unwrap();
            let map = DocumentMap::new();
            map.insert(real.to_str().unwrap(), document("real"));
            let via_link = map.get(link.to_str().unwrap());
            assert_eq!(via_link.unwrap().name(), "real");
            // Removing through the alias evicts the shared document.
            assert!(map.remove(link.to_str().unwrap()).is_some());
            assert!(map.get(real.to_str().unwrap()).is_none());
        }
        let _ = std::fs::remove_file(&link);
        let _ = std::fs::remove_file(&real);
        let _ = std::fs::remove_dir(&dir);
    }
}
